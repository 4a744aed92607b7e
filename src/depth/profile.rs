use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use crate::{
    labware::{LabwareAlias, WellName},
    prelude::*,
    quantity::{Milliliters, Millimeters},
};

/// Two-point calibration of a conical vessel.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Below this volume the model falls back to a fixed clearance above the bottom.
    pub volume_offset: Milliliters,

    /// Upper calibration volume.
    pub volume_step: Milliliters,

    /// Tip depth relative to the rim at `volume_offset`.
    pub offset: Millimeters,

    /// Additional travel between the two calibration points.
    pub step: Millimeters,

    /// Working capacity, larger volumes are treated as this one.
    #[serde(alias = "maxVolume")]
    pub max_volume: Milliliters,
}

impl Calibration {
    pub fn validate(&self) -> Result {
        ensure!(
            self.volume_offset < self.volume_step,
            "volume offset ({}) must be below the volume step ({})",
            self.volume_offset,
            self.volume_step,
        );
        ensure!(self.max_volume.0 > 0.0, "max volume must be positive, got {}", self.max_volume);
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VesselProfile {
    /// Calibrated tube, the tip follows the liquid surface down.
    Conical(Calibration),

    /// Small tube without a calibration, the tip always goes near the bottom.
    Tube {
        #[serde(default = "VesselProfile::default_tube_bottom_clearance")]
        bottom_clearance: Millimeters,
    },
}

impl VesselProfile {
    const fn default_tube_bottom_clearance() -> Millimeters {
        Millimeters(5.0)
    }
}

/// Named vessel profiles.
#[must_use]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VesselProfiles(BTreeMap<String, VesselProfile>);

impl VesselProfiles {
    /// Calibrations of the tubes in use on our deck.
    pub fn builtin() -> Self {
        Self(BTreeMap::from([
            (
                "GREINER_50mL".to_owned(),
                VesselProfile::Conical(Calibration {
                    volume_offset: Milliliters(5.0),
                    volume_step: Milliliters(50.0),
                    offset: Millimeters(-93.25),
                    step: Millimeters(81.1),
                    max_volume: Milliliters(50.0),
                }),
            ),
            (
                "USA_1.5mL".to_owned(),
                VesselProfile::Conical(Calibration {
                    volume_offset: Milliliters(0.1),
                    volume_step: Milliliters(1.5),
                    offset: Millimeters(-31.1),
                    step: Millimeters(26.8),
                    max_volume: Milliliters(1.5),
                }),
            ),
            (
                "VMR_15mL".to_owned(),
                VesselProfile::Conical(Calibration {
                    volume_offset: Milliliters(2.0),
                    volume_step: Milliliters(15.0),
                    offset: Millimeters(-93.2),
                    step: Millimeters(83.5),
                    max_volume: Milliliters(15.0),
                }),
            ),
            (
                "Sample_2mL".to_owned(),
                VesselProfile::Tube { bottom_clearance: VesselProfile::default_tube_bottom_clearance() },
            ),
        ]))
    }

    /// Add or replace profiles.
    pub fn with_overrides(mut self, overrides: Self) -> Self {
        self.0.extend(overrides.0);
        self
    }

    pub fn get(&self, name: &str) -> Result<&VesselProfile> {
        self.0.get(name).with_context(|| format!("unknown vessel profile `{name}`"))
    }

    pub fn validate(&self) -> Result {
        for (name, profile) in &self.0 {
            if let VesselProfile::Conical(calibration) = profile {
                calibration.validate().with_context(|| format!("invalid vessel profile `{name}`"))?;
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, VesselProfile> {
        self.0.iter()
    }
}

/// Source vessel placed on the deck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub labware: LabwareAlias,
    pub well: WellName,

    /// Vessel profile name.
    #[serde(rename = "vessel")]
    pub profile: String,
}
