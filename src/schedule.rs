mod pass;
mod reservoir;
mod split;
mod stage;

use std::{
    collections::{BTreeMap, btree_map::Entry},
    f64::consts::PI,
    time::Duration,
};

use bon::Builder;
use serde::Deserialize;
use serde_with::{DurationSecondsWithFrac, serde_as};

pub use self::{
    pass::{Pass, Pipette, PipetteChoice, TipPolicy},
    reservoir::Reservoir,
    split::{Split, Tip},
    stage::{DropMode, DropStage, DropTips, MixStage},
};
use crate::{
    depth::DepthModel,
    labware::{LabwareAlias, Location, Mount, Point, WellName},
    prelude::*,
    quantity::{FlowRate, Microliters, Millimeters},
    recipe::Demands,
    robot::Robot,
};

/// Fixed motion constants of the dispensing moves.
#[serde_as]
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Builder)]
pub struct Motion {
    /// Height above the rim when moving over a well.
    #[serde(default = "Motion::default_approach_height")]
    #[builder(default = Motion::default_approach_height())]
    pub approach_height: Millimeters,

    /// Dispense depth relative to the well center.
    #[serde(default = "Motion::default_dispense_depth")]
    #[builder(default = Motion::default_dispense_depth())]
    pub dispense_depth: Millimeters,

    /// Distance from the well center to the reservoir, along Y.
    #[serde(default = "Motion::default_lateral_offset")]
    #[builder(default = Motion::default_lateral_offset())]
    pub lateral_offset: Millimeters,

    #[serde(default = "Motion::default_dispense_rate")]
    #[builder(default = Motion::default_dispense_rate())]
    pub dispense_rate: FlowRate,

    /// Pause after every motion or liquid-handling command.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "Motion::default_settle")]
    #[builder(default = Motion::default_settle())]
    pub settle: Duration,
}

impl Default for Motion {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Motion {
    const fn default_approach_height() -> Millimeters {
        Millimeters(10.0)
    }

    const fn default_dispense_depth() -> Millimeters {
        Millimeters(-11.0)
    }

    const fn default_lateral_offset() -> Millimeters {
        Millimeters(5.5)
    }

    const fn default_dispense_rate() -> FlowRate {
        FlowRate(0.8)
    }

    const fn default_settle() -> Duration {
        Duration::from_millis(250)
    }
}

/// Drives the robot through the transfers and threads the source estimates through them.
#[derive(Builder)]
pub struct Scheduler<'a, R> {
    robot: &'a mut R,
    depth: &'a DepthModel,
    pipettes: &'a BTreeMap<String, Pipette>,

    /// Destination plate.
    plate: &'a LabwareAlias,

    motion: Motion,

    #[builder(skip)]
    n_tips: usize,
}

impl<'a, R: Robot> Scheduler<'a, R> {
    /// Tips picked up so far.
    pub const fn n_tips(&self) -> usize {
        self.n_tips
    }

    fn pick_up_tip(&mut self, pipette: &Pipette) -> Result {
        if self.robot.has_tip(pipette.mount) {
            self.robot.drop_tip(pipette.mount)?;
        }
        self.robot.pick_up_tip(pipette.mount)?;
        self.n_tips += 1;
        Ok(())
    }

    fn pipette(&self, name: &str) -> Result<&'a Pipette> {
        self.pipettes.get(name).with_context(|| format!("unknown pipette `{name}`"))
    }

    /// Above the well's reservoir.
    fn above(&self, well: WellName) -> Location {
        Location::top(self.plate, well, self.motion.approach_height)
            .moved(Point::new(0.0, self.motion.lateral_offset.0, 0.0))
    }

    /// Inside the well's reservoir.
    fn inside(&self, well: WellName) -> Location {
        Location::center(self.plate, well).moved(Point::new(
            0.0,
            self.motion.lateral_offset.0,
            self.motion.dispense_depth.0,
        ))
    }

    /// Withdraw from the source at the depth of the surface left after the withdrawal.
    fn withdraw(
        &mut self,
        pipette: &Pipette,
        volume: Microliters,
        reservoir: Reservoir,
    ) -> Result<Reservoir> {
        let reservoir = reservoir.withdraw(volume);
        let location = self.depth.locate(&reservoir.vessel, reservoir.remaining)?;
        self.robot.aspirate(pipette.mount, volume, &location)?;
        Ok(reservoir)
    }

    /// Deliver the target volume into the well in equal runs.
    ///
    /// The pipette must already hold a tip with its reserve.
    pub fn transfer(
        &mut self,
        pipette: &Pipette,
        well: WellName,
        target: Microliters,
        mut reservoir: Reservoir,
    ) -> Result<Reservoir> {
        let split = Split::new(target, pipette.tip.usable_capacity()?);
        if split.runs == 0 {
            return Ok(reservoir);
        }
        debug!(%well, %target, runs = split.runs, volume = %split.volume, "Transferring…");
        let above = self.above(well);
        let inside = self.inside(well);
        for _ in 0..split.runs {
            reservoir = self.withdraw(pipette, split.volume, reservoir)?;
            self.robot.move_to(pipette.mount, &above)?;
            self.robot.dispense(pipette.mount, split.volume, &inside, self.motion.dispense_rate)?;
            self.robot.move_to(pipette.mount, &above)?;
        }
        Ok(reservoir)
    }

    /// Replace the held tip with a fresh one and preload its reserve from the source.
    pub fn acquire_tip(&mut self, pipette: &Pipette, reservoir: Reservoir) -> Result<Reservoir> {
        self.pick_up_tip(pipette)?;
        if pipette.tip.reserve.is_positive() {
            self.withdraw(pipette, pipette.tip.reserve, reservoir)
        } else {
            Ok(reservoir)
        }
    }

    /// Distribute one liquid across the wells.
    ///
    /// Tips are picked up as they are needed, and every tip of the pass is dropped at the end.
    #[instrument(skip_all, name = "Filling…", fields(liquid = %pass.liquid))]
    pub fn fill(
        &mut self,
        pass: &Pass,
        demands: &Demands,
        mut reservoir: Reservoir,
    ) -> Result<Reservoir> {
        // Row that the current tip of each pipette was picked up for:
        let mut tip_rows = BTreeMap::<&str, char>::new();
        let mut n_wells = 0_usize;
        let mut n_tips = 0_usize;

        for (well, demand) in demands {
            let target = demand.get(&pass.liquid);
            if !target.is_positive() {
                continue;
            }
            let name = pass.pipette.select(*well);
            let pipette = self.pipette(name)?;
            let needs_tip = match tip_rows.entry(name) {
                Entry::Vacant(entry) => {
                    entry.insert(well.row);
                    true
                }
                Entry::Occupied(mut entry) => {
                    let row_changed = *entry.get() != well.row;
                    entry.insert(well.row);
                    pass.tips == TipPolicy::PerRow && row_changed
                }
            };
            if needs_tip {
                reservoir = self.acquire_tip(pipette, reservoir)?;
                n_tips += 1;
            }
            reservoir = self.transfer(pipette, *well, target, reservoir)?;
            n_wells += 1;
        }

        for name in tip_rows.keys() {
            let mount = self.pipette(name)?.mount;
            if self.robot.has_tip(mount) {
                self.robot.drop_tip(mount)?;
            }
        }
        info!(n_wells, n_tips, remaining = %reservoir.remaining, "Filled");
        Ok(reservoir)
    }

    /// Stir the reservoir of the well: draw a tip of it and give it back along a half circle.
    pub fn mix(&mut self, stage: &MixStage, well: WellName) -> Result {
        let pipette = self.pipette(&stage.pipette)?;
        let mount = pipette.mount;
        let volume = stage.volume(pipette);
        let depth = (self.motion.dispense_depth + stage.depth_offset).0;
        let lateral_offset = self.motion.lateral_offset.0;
        self.pick_up_tip(pipette)?;

        let above = self.above(well);
        self.robot.move_to(mount, &above)?;
        let inside = Location::center(self.plate, well).moved(Point::new(0.0, lateral_offset, depth));
        self.robot.aspirate(mount, volume, &inside)?;
        self.robot.move_to(mount, &above)?;

        let lap_volume = volume / f64::from(stage.laps);
        let slice = PI / f64::from(stage.laps);
        for lap in 0..stage.laps {
            let angle = -slice * f64::from(lap);
            let (x, y) = (angle.cos() * lateral_offset, angle.sin() * lateral_offset);
            if lap == 0 {
                let approach = Location::top(self.plate, well, self.motion.approach_height)
                    .moved(Point::new(x, y, 0.0));
                self.robot.move_to(mount, &approach)?;
            }
            let location = Location::center(self.plate, well).moved(Point::new(x, y, depth));
            self.robot.dispense(mount, lap_volume, &location, stage.rate)?;
        }
        self.robot.drop_tip(mount)?;
        debug!(%well, laps = stage.laps, "Mixed");
        Ok(())
    }

    /// Set the drops in the growth wells and return the updated sample estimate.
    #[instrument(skip_all, name = "Setting the drops…", fields(mode = ?stage.mode, tips = ?stage.tips))]
    pub fn set_drops(
        &mut self,
        stage: &DropStage,
        wells: &[WellName],
        mut sample: Reservoir,
    ) -> Result<Reservoir> {
        let pipette = self.pipette(&stage.pipette)?;
        let needs_tip = |index: usize| index == 0 || stage.tips == DropTips::PerWell;
        match stage.mode {
            DropMode::Combined => {
                for (index, well) in wells.iter().enumerate() {
                    if needs_tip(index) {
                        sample = self.acquire_drop_tip(stage, pipette, sample)?;
                    }
                    sample = self.set_drop(stage, pipette, *well, sample)?;
                }
            }
            DropMode::Separate => {
                for (index, well) in wells.iter().enumerate() {
                    if needs_tip(index) {
                        sample = self.acquire_drop_tip(stage, pipette, sample)?;
                    }
                    sample = self.withdraw(pipette, stage.volume, sample)?;
                    let growth_well = self.growth_well(stage, *well);
                    self.robot.dispense(pipette.mount, stage.volume, &growth_well, stage.rate)?;
                }
                for (index, well) in wells.iter().enumerate() {
                    if needs_tip(index) {
                        self.pick_up_tip(pipette)?;
                    }
                    self.draw_reservoir_solution(stage, pipette.mount, *well)?;
                    let growth_well = self.growth_well(stage, *well);
                    self.robot.dispense(pipette.mount, stage.volume, &growth_well, stage.rate)?;
                }
            }
        }
        if self.robot.has_tip(pipette.mount) {
            self.robot.drop_tip(pipette.mount)?;
        }
        info!(n_drops = wells.len(), remaining = %sample.remaining, "Set the drops");
        Ok(sample)
    }

    fn acquire_drop_tip(
        &mut self,
        stage: &DropStage,
        pipette: &Pipette,
        sample: Reservoir,
    ) -> Result<Reservoir> {
        if stage.preload_reserve {
            self.acquire_tip(pipette, sample)
        } else {
            self.pick_up_tip(pipette)?;
            Ok(sample)
        }
    }

    fn growth_well(&self, stage: &DropStage, well: WellName) -> Location {
        Location::center(self.plate, well).moved(Point::new(0.0, 0.0, stage.growth_well_depth.0))
    }

    /// Go down into the well's reservoir and draw the drop volume of it.
    fn draw_reservoir_solution(&mut self, stage: &DropStage, mount: Mount, well: WellName) -> Result {
        let above = self.above(well);
        let into_reservoir = Location::top(self.plate, well, self.motion.dispense_depth)
            .moved(Point::new(0.0, self.motion.lateral_offset.0, 0.0));
        let inside = self.inside(well);
        self.robot.move_to(mount, &above)?;
        self.robot.move_to(mount, &into_reservoir)?;
        self.robot.aspirate(mount, stage.volume, &inside)?;
        self.robot.move_to(mount, &above)
    }

    /// Sample and reservoir solution into the growth well in one go, the tip must already be there.
    fn set_drop(
        &mut self,
        stage: &DropStage,
        pipette: &Pipette,
        well: WellName,
        sample: Reservoir,
    ) -> Result<Reservoir> {
        let mount = pipette.mount;
        let sample = self.withdraw(pipette, stage.volume, sample)?;
        self.draw_reservoir_solution(stage, mount, well)?;
        let growth_well = self.growth_well(stage, well);
        self.robot.dispense(mount, stage.volume * (2.0 * stage.overshoot), &growth_well, stage.rate)?;
        self.robot.touch_tip(mount, stage.growth_well_depth + stage.touch_offset, stage.touch_radius)?;
        debug!(%well, remaining = %sample.remaining, "Set the drop");
        Ok(sample)
    }
}
