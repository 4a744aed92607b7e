use std::collections::BTreeMap;

use bon::Builder;
use serde::Serialize;

use crate::{
    depth::Vessel,
    labware::{LabwareAlias, WellName},
    prelude::*,
    protocol::Protocol,
    quantity::Microliters,
    recipe::Source,
    robot::Robot,
    schedule::{Reservoir, Scheduler},
};

/// Source vessel as it looks after the run.
#[derive(Clone, Debug, Serialize)]
pub struct SourceReport {
    /// Liquids drawn from the vessel.
    pub liquids: Vec<String>,

    pub vessel: Vessel,
    pub initial: Microliters,
    pub remaining: Microliters,
}

impl SourceReport {
    pub fn used(&self) -> Microliters {
        self.initial - self.remaining
    }

    pub fn is_overdrawn(&self) -> bool {
        self.remaining < Microliters::ZERO
    }
}

#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub sources: Vec<SourceReport>,
    pub n_wells: usize,
    pub n_tips: usize,
}

impl Report {
    pub fn overdrawn(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|source| source.is_overdrawn())
    }
}

/// Source vessels are identified by their position on the deck.
type SourceKey = (LabwareAlias, WellName);

/// Running estimate of a source together with what the report needs to know about it.
struct Stock {
    liquids: Vec<String>,
    initial: Microliters,
    reservoir: Reservoir,
}

impl Stock {
    fn new(name: &str, source: &Source) -> Self {
        let initial = Microliters::from(source.initial_volume);
        Self {
            liquids: vec![name.to_owned()],
            initial,
            reservoir: Reservoir::new(source.vessel.clone(), initial),
        }
    }

    fn into_report(self) -> SourceReport {
        SourceReport {
            liquids: self.liquids,
            vessel: self.reservoir.vessel,
            initial: self.initial,
            remaining: self.reservoir.remaining,
        }
    }
}

/// Runs a whole protocol against a robot.
#[derive(Builder)]
pub struct Runner<'a> {
    protocol: &'a Protocol,

    /// Wells to fill, in the filling order.
    wells: &'a [WellName],
}

impl Runner<'_> {
    #[instrument(skip_all, name = "Running…", fields(protocol = %self.protocol.name, n_wells = self.wells.len()))]
    pub fn run<R: Robot>(self, robot: &mut R) -> Result<Report> {
        let protocol = self.protocol;
        for labware in &protocol.labware {
            robot.load_labware(&labware.alias, &labware.kind, labware.slot)?;
        }
        for pipette in protocol.pipettes.values() {
            robot.load_instrument(&pipette.instrument())?;
        }

        let demands = protocol.recipe().demands(self.wells)?;
        let mut stocks = BTreeMap::<SourceKey, Stock>::new();
        for liquid in &protocol.liquids {
            let key = (liquid.source.vessel.labware.clone(), liquid.source.vessel.well);
            stocks
                .entry(key)
                .and_modify(|stock| stock.liquids.push(liquid.name.clone()))
                .or_insert_with(|| Stock::new(&liquid.name, &liquid.source));
        }

        let depth = protocol.depth_model();
        let mut scheduler = Scheduler::builder()
            .robot(robot)
            .depth(&depth)
            .pipettes(&protocol.pipettes)
            .plate(&protocol.plate.labware)
            .motion(protocol.motion)
            .build();

        for pass in &protocol.passes {
            let source = &protocol.liquid(&pass.liquid)?.source;
            let stock = stocks
                .get_mut(&(source.vessel.labware.clone(), source.vessel.well))
                .with_context(|| format!("no stock of `{}`", pass.liquid))?;
            stock.reservoir = scheduler.fill(pass, &demands, stock.reservoir.clone())?;
        }

        let mut sources: Vec<SourceReport> = stocks.into_values().map(Stock::into_report).collect();

        if let Some(stage) = &protocol.mix {
            for well in self.wells {
                scheduler.mix(stage, *well)?;
            }
            info!(n_wells = self.wells.len(), "Mixed the reservoirs");
        }

        if let Some(stage) = &protocol.drop {
            let mut sample = Stock::new("sample", &stage.sample);
            sample.reservoir = scheduler.set_drops(stage, self.wells, sample.reservoir)?;
            sources.push(sample.into_report());
        }

        let n_tips = scheduler.n_tips();
        for pipette in protocol.pipettes.values() {
            if robot.has_tip(pipette.mount) {
                robot.drop_tip(pipette.mount)?;
            }
        }

        let report = Report { sources, n_wells: self.wells.len(), n_tips };
        for source in report.overdrawn() {
            warn!(liquids = ?source.liquids, remaining = %source.remaining, "Overdrawn source");
        }
        info!(n_tips, "Done");
        Ok(report)
    }
}
