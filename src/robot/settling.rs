use std::time::Duration;

use crate::{
    labware::{LabwareAlias, Location, Mount},
    prelude::*,
    quantity::{FlowRate, Microliters, Millimeters},
    robot::{Instrument, Robot},
};

/// Waits the fixed settle time after every motion or liquid-handling command.
///
/// Setup calls and explicit delays pass through untouched.
pub struct Settling<R> {
    inner: R,
    settle: Duration,
}

impl<R: Robot> Settling<R> {
    pub const fn new(inner: R, settle: Duration) -> Self {
        Self { inner, settle }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn settle(&mut self) -> Result {
        if self.settle.is_zero() { Ok(()) } else { self.inner.delay(self.settle) }
    }
}

impl<R: Robot> Robot for Settling<R> {
    fn load_labware(&mut self, alias: &LabwareAlias, kind: &str, slot: u8) -> Result {
        self.inner.load_labware(alias, kind, slot)
    }

    fn load_instrument(&mut self, instrument: &Instrument) -> Result {
        self.inner.load_instrument(instrument)
    }

    fn has_tip(&self, mount: Mount) -> bool {
        self.inner.has_tip(mount)
    }

    fn pick_up_tip(&mut self, mount: Mount) -> Result {
        self.inner.pick_up_tip(mount)?;
        self.settle()
    }

    fn drop_tip(&mut self, mount: Mount) -> Result {
        self.inner.drop_tip(mount)?;
        self.settle()
    }

    fn aspirate(&mut self, mount: Mount, volume: Microliters, location: &Location) -> Result {
        self.inner.aspirate(mount, volume, location)?;
        self.settle()
    }

    fn dispense(
        &mut self,
        mount: Mount,
        volume: Microliters,
        location: &Location,
        rate: FlowRate,
    ) -> Result {
        self.inner.dispense(mount, volume, location, rate)?;
        self.settle()
    }

    fn move_to(&mut self, mount: Mount, location: &Location) -> Result {
        self.inner.move_to(mount, location)?;
        self.settle()
    }

    fn touch_tip(&mut self, mount: Mount, v_offset: Millimeters, radius: f64) -> Result {
        self.inner.touch_tip(mount, v_offset, radius)?;
        self.settle()
    }

    fn delay(&mut self, duration: Duration) -> Result {
        self.inner.delay(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::{Command, Journal};

    #[test]
    fn test_settles_after_motion_only() {
        let mut robot = Settling::new(Journal::default(), Duration::from_millis(250));
        robot.load_labware(&"tips".into(), "opentrons_96_filtertiprack_200ul", 4).unwrap();
        robot
            .load_instrument(&Instrument {
                kind: "p300_single_gen2".to_owned(),
                mount: Mount::Right,
                tip_racks: vec!["tips".into()],
                tip_capacity: Microliters(200.0),
            })
            .unwrap();
        robot.pick_up_tip(Mount::Right).unwrap();
        assert!(robot.has_tip(Mount::Right));
        robot.drop_tip(Mount::Right).unwrap();

        let commands = robot.into_inner().into_commands();
        assert_eq!(commands.len(), 6);
        assert!(!commands[0].is_delay());
        assert!(!commands[1].is_delay());
        assert_eq!(commands[2], Command::PickUpTip { mount: Mount::Right });
        assert_eq!(commands[3], Command::Delay { seconds: 0.25 });
        assert_eq!(commands[5], Command::Delay { seconds: 0.25 });
    }

    #[test]
    fn test_zero_settle_time() {
        let mut robot = Settling::new(Journal::default(), Duration::ZERO);
        robot.delay(Duration::from_secs(1)).unwrap();
        assert_eq!(robot.into_inner().into_commands(), [Command::Delay { seconds: 1.0 }]);
    }
}
