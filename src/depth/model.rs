use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    depth::{Calibration, Vessel, VesselProfile, VesselProfiles},
    labware::{Anchor, Location, Point},
    prelude::*,
    quantity::{Microliters, Milliliters, Millimeters},
};

/// How the two calibration points turn into a line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    /// Walk down from the rim by the missing capacity: `offset + step - (max - volume) × slope`.
    #[default]
    Capacity,

    /// Line through `(volume_offset, offset)` and `(volume_step, offset + step)`.
    Legacy,
}

impl Formula {
    /// Height of the liquid surface relative to the rim, `volume` is already clamped.
    fn height(self, calibration: &Calibration, volume: Milliliters) -> Millimeters {
        let span = (calibration.volume_step - calibration.volume_offset).0;
        match self {
            Self::Capacity => {
                let slope = -calibration.step / span;
                let intercept = calibration.offset + calibration.step;
                intercept + slope * (calibration.max_volume - volume).0
            }
            Self::Legacy => {
                let slope = calibration.step / span;
                let intercept = calibration.offset - slope * calibration.volume_offset.0;
                slope * volume.0 + intercept
            }
        }
    }
}

/// Liquid that cannot be reached and gets subtracted from the estimate first.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadVolume {
    Flat(Microliters),

    /// Fraction of the vessel's working capacity.
    FractionOfCapacity(f64),
}

impl Default for DeadVolume {
    fn default() -> Self {
        Self::FractionOfCapacity(0.03)
    }
}

impl DeadVolume {
    fn of(self, calibration: &Calibration) -> Microliters {
        match self {
            Self::Flat(volume) => volume,
            Self::FractionOfCapacity(fraction) => Microliters::from(calibration.max_volume) * fraction,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Builder)]
pub struct DepthSettings {
    #[serde(default)]
    #[builder(default)]
    pub formula: Formula,

    #[serde(default)]
    #[builder(default)]
    pub dead_volume: DeadVolume,

    /// Clearance above the bottom of a nearly empty vessel.
    #[serde(default = "DepthSettings::default_fallback_bottom_clearance")]
    #[builder(default = DepthSettings::default_fallback_bottom_clearance())]
    pub fallback_bottom_clearance: Millimeters,
}

impl Default for DepthSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DepthSettings {
    const fn default_fallback_bottom_clearance() -> Millimeters {
        Millimeters(2.0)
    }
}

#[must_use]
#[derive(Clone, Debug)]
pub struct DepthModel {
    pub settings: DepthSettings,
    pub profiles: VesselProfiles,
}

impl DepthModel {
    pub const fn new(settings: DepthSettings, profiles: VesselProfiles) -> Self {
        Self { settings, profiles }
    }

    /// Where to put the tip to withdraw from a vessel holding the `remaining` volume.
    pub fn anchor(&self, profile: &VesselProfile, remaining: Microliters) -> Anchor {
        let calibration = match profile {
            VesselProfile::Tube { bottom_clearance } => return Anchor::Bottom(*bottom_clearance),
            VesselProfile::Conical(calibration) => calibration,
        };
        let volume =
            Milliliters::from(remaining - self.settings.dead_volume.of(calibration));
        if volume <= calibration.volume_offset {
            return Anchor::Bottom(self.settings.fallback_bottom_clearance);
        }
        let height = self.settings.formula.height(calibration, volume.min(calibration.max_volume));
        Anchor::Top(height.round_to_hundredths())
    }

    pub fn locate(&self, vessel: &Vessel, remaining: Microliters) -> Result<Location> {
        let profile = self.profiles.get(&vessel.profile)?;
        let anchor = self.anchor(profile, remaining);
        debug!(well = %vessel.well, %remaining, %anchor, "located the liquid surface");
        Ok(Location {
            labware: vessel.labware.clone(),
            well: vessel.well,
            anchor,
            offset: Point::default(),
        })
    }
}
