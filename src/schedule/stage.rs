use serde::Deserialize;

use crate::{
    prelude::*,
    quantity::{FlowRate, Microliters, Millimeters},
    recipe::Source,
    schedule::Pipette,
};

/// Stirring every reservoir after the passes: draw from it and give it back along a half circle.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MixStage {
    pub pipette: String,

    /// Number of dispense points along the half circle.
    #[serde(default = "MixStage::default_laps")]
    pub laps: u32,

    /// Drawn volume, a full tip when unset.
    #[serde(default)]
    pub volume: Option<Microliters>,

    /// Depth relative to the dispense depth.
    #[serde(default = "MixStage::default_depth_offset")]
    pub depth_offset: Millimeters,

    #[serde(default = "MixStage::default_rate")]
    pub rate: FlowRate,
}

impl MixStage {
    const fn default_laps() -> u32 {
        8
    }

    const fn default_depth_offset() -> Millimeters {
        Millimeters(-2.5)
    }

    const fn default_rate() -> FlowRate {
        FlowRate(0.5)
    }

    pub fn volume(&self, pipette: &Pipette) -> Microliters {
        self.volume.unwrap_or(pipette.tip.capacity)
    }

    pub fn validate(&self, pipette: &Pipette) -> Result {
        ensure!(self.laps != 0, "mixing needs at least one lap");
        let volume = self.volume(pipette);
        ensure!(volume.is_positive(), "mixing volume must be positive, got {volume}");
        ensure!(
            volume <= pipette.tip.capacity,
            "mixing {volume} does not fit into a {} tip",
            pipette.tip.capacity,
        );
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropMode {
    /// Sample and reservoir solution travel together in one tip, blown out and touched off.
    #[default]
    Combined,

    /// Sample into every growth well first, then the reservoir solution on top of it.
    Separate,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropTips {
    #[default]
    PerWell,

    /// One tip for all the wells, so that crystals seed from well to well.
    Shared,
}

/// Setting the sitting drop: sample plus the well's own solution into the central growth well.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DropStage {
    pub pipette: String,
    pub sample: Source,

    #[serde(default)]
    pub mode: DropMode,

    #[serde(default)]
    pub tips: DropTips,

    /// Preload the tip reserve from the sample before the first drop of each tip.
    #[serde(default)]
    pub preload_reserve: bool,

    /// Sample volume, the same volume of the reservoir solution joins it.
    #[serde(default = "DropStage::default_volume")]
    pub volume: Microliters,

    /// Dispensed volume relative to the aspirated mixture, so that the tip gets blown out.
    #[serde(default = "DropStage::default_overshoot")]
    pub overshoot: f64,

    /// Depth below the growth well center.
    #[serde(default = "DropStage::default_growth_well_depth")]
    pub growth_well_depth: Millimeters,

    #[serde(default = "DropStage::default_rate")]
    pub rate: FlowRate,

    #[serde(default = "DropStage::default_touch_radius")]
    pub touch_radius: f64,

    /// Touch-tip height relative to the growth well depth.
    #[serde(default = "DropStage::default_touch_offset")]
    pub touch_offset: Millimeters,
}

impl DropStage {
    const fn default_volume() -> Microliters {
        Microliters(2.5)
    }

    const fn default_overshoot() -> f64 {
        1.25
    }

    const fn default_growth_well_depth() -> Millimeters {
        Millimeters(-1.5)
    }

    const fn default_rate() -> FlowRate {
        FlowRate(0.5)
    }

    const fn default_touch_radius() -> f64 {
        0.125
    }

    const fn default_touch_offset() -> Millimeters {
        Millimeters(-2.5)
    }

    /// Most liquid the tip ever holds.
    fn peak_load(&self, pipette: &Pipette) -> Microliters {
        let reserve = if self.preload_reserve { pipette.tip.reserve } else { Microliters::ZERO };
        match self.mode {
            DropMode::Combined => reserve + self.volume * 2.0,
            DropMode::Separate => reserve + self.volume,
        }
    }

    pub fn validate(&self, pipette: &Pipette) -> Result {
        ensure!(self.volume.is_positive(), "drop volume must be positive");
        let peak_load = self.peak_load(pipette);
        ensure!(
            peak_load <= pipette.tip.capacity,
            "drops need {peak_load} in a {} tip",
            pipette.tip.capacity,
        );
        Ok(())
    }
}
