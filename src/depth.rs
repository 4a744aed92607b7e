//! Volume-to-depth model: how deep the tip goes into a source vessel for a given remaining volume.
//!
//! Conical vessels are calibrated by two points: at `volume_step` the liquid surface sits at
//! `offset + step` from the rim, at `volume_offset` it sits at `offset`. In between the surface
//! is assumed to follow a straight line. Below the lower point the tip goes to a fixed clearance
//! above the bottom instead.

mod model;
mod profile;

pub use self::{
    model::{DeadVolume, DepthModel, DepthSettings, Formula},
    profile::{Calibration, Vessel, VesselProfile, VesselProfiles},
};
