mod command;
mod journal;
mod settling;

use std::time::Duration;

pub use self::{command::Command, journal::Journal, settling::Settling};
use crate::{
    labware::{LabwareAlias, Location, Mount},
    prelude::*,
    quantity::{FlowRate, Microliters, Millimeters},
};

/// Pipette as it gets mounted on the robot.
#[derive(Clone, Debug)]
pub struct Instrument {
    pub kind: String,
    pub mount: Mount,
    pub tip_racks: Vec<LabwareAlias>,
    pub tip_capacity: Microliters,
}

/// Command primitives of the liquid-handling robot.
///
/// Every call either succeeds or the whole run is invalid: callers propagate errors
/// and never retry.
pub trait Robot {
    fn load_labware(&mut self, alias: &LabwareAlias, kind: &str, slot: u8) -> Result;

    fn load_instrument(&mut self, instrument: &Instrument) -> Result;

    fn has_tip(&self, mount: Mount) -> bool;

    fn pick_up_tip(&mut self, mount: Mount) -> Result;

    fn drop_tip(&mut self, mount: Mount) -> Result;

    fn aspirate(&mut self, mount: Mount, volume: Microliters, location: &Location) -> Result;

    fn dispense(
        &mut self,
        mount: Mount,
        volume: Microliters,
        location: &Location,
        rate: FlowRate,
    ) -> Result;

    fn move_to(&mut self, mount: Mount, location: &Location) -> Result;

    /// Touch the tip against the wall of the well it is currently in.
    fn touch_tip(&mut self, mount: Mount, v_offset: Millimeters, radius: f64) -> Result;

    fn delay(&mut self, duration: Duration) -> Result;
}
