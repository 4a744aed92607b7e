use std::{
    collections::{BTreeMap, BTreeSet, btree_map::Entry},
    fs,
    path::Path,
};

use itertools::Itertools;
use serde::Deserialize;

use crate::{
    depth::{DepthModel, DepthSettings, VesselProfiles},
    labware::{LabwareAlias, WellName},
    prelude::*,
    quantity::Microliters,
    recipe::{Liquid, Recipe, Source},
    schedule::{DropStage, MixStage, Motion, Pass, Pipette},
};

/// Labware placed on a deck slot.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Labware {
    pub alias: LabwareAlias,

    /// Labware definition name, for example `hamptonresearch_24_wellplate_24x500ul_jd`.
    pub kind: String,

    pub slot: u8,
}

/// Destination plate.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Plate {
    pub labware: LabwareAlias,
    pub rows: Vec<char>,
    pub columns: u8,

    /// Total volume of every well, shared between the liquids.
    pub well_volume: Microliters,

    /// Only fill these wells, the whole plate when unset.
    #[serde(default)]
    pub wells: Option<Vec<WellName>>,
}

impl Plate {
    /// All wells, row by row.
    pub fn all_wells(&self) -> Vec<WellName> {
        self.rows
            .iter()
            .cartesian_product(1..=self.columns)
            .map(|(row, column)| WellName::new(*row, column))
            .collect()
    }

    pub fn contains(&self, well: WellName) -> bool {
        self.rows.contains(&well.row) && (1..=self.columns).contains(&well.column)
    }
}

/// One protocol variant: deck, instruments, liquids, and the order of the passes.
#[derive(Clone, Debug, Deserialize)]
pub struct Protocol {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub plate: Plate,

    #[serde(default)]
    pub motion: Motion,

    #[serde(default)]
    pub depth: DepthSettings,

    /// Additional or replaced vessel profiles.
    #[serde(default)]
    pub vessels: VesselProfiles,

    pub labware: Vec<Labware>,
    pub pipettes: BTreeMap<String, Pipette>,
    pub liquids: Vec<Liquid>,
    pub passes: Vec<Pass>,

    /// Stir every reservoir after the passes.
    #[serde(default)]
    pub mix: Option<MixStage>,

    #[serde(default)]
    pub drop: Option<DropStage>,
}

impl Protocol {
    #[instrument(skip_all, name = "Loading the protocol…", fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let protocol = Self::parse(&text).with_context(|| format!("invalid protocol `{}`", path.display()))?;
        info!(name = %protocol.name, n_passes = protocol.passes.len(), "Loaded");
        Ok(protocol)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let protocol: Self = toml::from_str(text)?;
        protocol.validate()?;
        Ok(protocol)
    }

    /// Built-in vessel profiles with the protocol's own on top.
    pub fn profiles(&self) -> VesselProfiles {
        VesselProfiles::builtin().with_overrides(self.vessels.clone())
    }

    pub fn depth_model(&self) -> DepthModel {
        DepthModel::new(self.depth, self.profiles())
    }

    pub fn recipe(&self) -> Recipe<'_> {
        Recipe { liquids: &self.liquids, well_volume: self.plate.well_volume }
    }

    pub fn liquid(&self, name: &str) -> Result<&Liquid> {
        self.liquids
            .iter()
            .find(|liquid| liquid.name == name)
            .with_context(|| format!("unknown liquid `{name}`"))
    }

    pub fn pipette(&self, name: &str) -> Result<&Pipette> {
        self.pipettes.get(name).with_context(|| format!("unknown pipette `{name}`"))
    }

    /// Wells to fill, in the filling order.
    pub fn wells(&self) -> Vec<WellName> {
        self.plate.wells.clone().unwrap_or_else(|| self.plate.all_wells())
    }

    /// Restrict the run to the wells, keeping the plate order.
    pub fn select_wells(&self, wells: &[WellName]) -> Result<Vec<WellName>> {
        for well in wells {
            ensure!(self.plate.contains(*well), "well {well} is not on the plate");
        }
        Ok(self.wells().into_iter().filter(|well| wells.contains(well)).collect())
    }

    fn validate(&self) -> Result {
        let profiles = self.profiles();
        profiles.validate()?;

        let mut aliases = BTreeSet::new();
        let mut slots = BTreeSet::new();
        for labware in &self.labware {
            ensure!(aliases.insert(&labware.alias), "labware `{}` is defined twice", labware.alias);
            ensure!(slots.insert(labware.slot), "slot {} is taken twice", labware.slot);
        }
        let ensure_loaded = |alias: &LabwareAlias| -> Result {
            ensure!(aliases.contains(alias), "unknown labware `{alias}`");
            Ok(())
        };
        let ensure_source = |source: &Source| -> Result {
            ensure_loaded(&source.vessel.labware)?;
            profiles.get(&source.vessel.profile)?;
            Ok(())
        };

        ensure_loaded(&self.plate.labware)?;
        ensure!(
            self.plate.rows.iter().all(char::is_ascii_uppercase),
            "plate rows must be uppercase letters",
        );
        ensure!(self.plate.columns != 0, "the plate has no columns");
        if let Some(wells) = &self.plate.wells {
            for well in wells {
                ensure!(self.plate.contains(*well), "well {well} is not on the plate");
            }
        }

        let mut mounts = BTreeSet::new();
        for (name, pipette) in &self.pipettes {
            ensure!(mounts.insert(pipette.mount), "pipette `{name}` shares the {:?} mount", pipette.mount);
            for tip_rack in &pipette.tip_racks {
                ensure_loaded(tip_rack)?;
            }
            pipette.tip.usable_capacity().with_context(|| format!("pipette `{name}`"))?;
        }

        self.recipe().validate()?;
        let mut sources = BTreeMap::new();
        for liquid in &self.liquids {
            ensure_source(&liquid.source).with_context(|| format!("liquid `{}`", liquid.name))?;
            let key = (&liquid.source.vessel.labware, liquid.source.vessel.well);
            match sources.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert(&liquid.source);
                }
                Entry::Occupied(entry) => ensure!(
                    *entry.get() == &liquid.source,
                    "liquid `{}` shares its source with a different vessel or volume",
                    liquid.name,
                ),
            }
        }

        for pass in &self.passes {
            self.liquid(&pass.liquid)?;
            for name in pass.pipette.names() {
                self.pipette(name)?;
            }
        }

        if let Some(stage) = &self.mix {
            stage.validate(self.pipette(&stage.pipette)?).context("mixing")?;
        }
        if let Some(stage) = &self.drop {
            stage.validate(self.pipette(&stage.pipette)?).context("drops")?;
            ensure_source(&stage.sample).context("drop sample")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        depth::{DeadVolume, Formula},
        labware::Mount,
        quantity::{FlowRate, Milliliters, Millimeters},
        schedule::{DropMode, DropTips, PipetteChoice, TipPolicy},
    };

    const HEWL: &str = include_str!("../protocols/hewl.toml");
    const CJ: &str = include_str!("../protocols/cj.toml");
    const COLORS: &str = include_str!("../protocols/colors.toml");

    #[test]
    fn test_parse_hewl() {
        let protocol = Protocol::parse(HEWL).unwrap();
        assert_eq!(protocol.motion, Motion::default());
        assert_eq!(protocol.depth.formula, Formula::Capacity);
        assert_eq!(protocol.depth.dead_volume, DeadVolume::FractionOfCapacity(0.03));
        assert_eq!(protocol.wells().len(), 24);
        assert_eq!(protocol.pipettes["p300"].mount, Mount::Right);
        assert_eq!(protocol.passes.len(), 5);
        assert_eq!(protocol.passes[0].tips, TipPolicy::PerRow);
        assert_eq!(
            protocol.passes[4].pipette,
            PipetteChoice::ByColumn {
                through_column: 4,
                then: "p300".to_owned(),
                otherwise: "p10".to_owned(),
            },
        );
        let drop = protocol.drop.as_ref().unwrap();
        assert_eq!(drop.volume, Microliters(2.5));
        assert_eq!(drop.sample.initial_volume, Milliliters(0.9));
        assert_eq!(drop.mode, DropMode::Combined);
        assert!(protocol.mix.is_none());
    }

    #[test]
    fn test_parse_cj() {
        let protocol = Protocol::parse(CJ).unwrap();
        assert_eq!(protocol.liquid("AmmSulf").unwrap().source.initial_volume, Milliliters(11.0));
        assert_eq!(protocol.passes.len(), 4);
    }

    #[test]
    fn test_parse_colors() {
        let protocol = Protocol::parse(COLORS).unwrap();
        assert_eq!(protocol.depth.formula, Formula::Legacy);
        assert_eq!(protocol.depth.dead_volume, DeadVolume::Flat(Microliters(1000.0)));
        assert_eq!(protocol.motion.approach_height, Millimeters(8.0));
        assert_eq!(protocol.motion.dispense_depth, Millimeters(-10.0));
        assert_eq!(protocol.motion.dispense_rate, FlowRate(0.5));
        assert_eq!(protocol.motion.settle, Duration::from_millis(250));
        assert_eq!(protocol.wells().len(), 24);
        assert_eq!(protocol.wells()[4], WellName::new('B', 1));
        let mix = protocol.mix.as_ref().unwrap();
        assert_eq!(mix.laps, 8);
        assert_eq!(mix.volume(&protocol.pipettes["p300"]), Microliters(200.0));
        let drop = protocol.drop.as_ref().unwrap();
        assert_eq!(drop.mode, DropMode::Separate);
        assert_eq!(drop.tips, DropTips::Shared);
        assert!(drop.preload_reserve);
    }

    #[test]
    fn test_all_wells_row_by_row() {
        let protocol = Protocol::parse(HEWL).unwrap();
        let wells = protocol.plate.all_wells();
        assert_eq!(wells[0], WellName::new('A', 1));
        assert_eq!(wells[5], WellName::new('A', 6));
        assert_eq!(wells[6], WellName::new('B', 1));
        assert_eq!(wells[23], WellName::new('D', 6));
    }

    #[test]
    fn test_select_wells() {
        let protocol = Protocol::parse(HEWL).unwrap();
        let wells = protocol
            .select_wells(&[WellName::new('B', 3), WellName::new('A', 1)])
            .unwrap();
        assert_eq!(wells, [WellName::new('A', 1), WellName::new('B', 3)]);
        assert!(protocol.select_wells(&[WellName::new('E', 1)]).is_err());
        assert!(protocol.select_wells(&[WellName::new('A', 7)]).is_err());
    }

    #[test]
    fn test_unknown_vessel_profile() {
        let text = HEWL.replace("\"VMR_15mL\"", "\"BEAKER_1L\"");
        assert!(Protocol::parse(&text).is_err());
    }

    #[test]
    fn test_unknown_pipette() {
        let text = HEWL.replace("otherwise = \"p10\"", "otherwise = \"p20\"");
        assert!(Protocol::parse(&text).is_err());
    }

    #[test]
    fn test_unknown_liquid() {
        let text = HEWL.replace("liquid = \"precip\"", "liquid = \"glycerol\"");
        assert!(Protocol::parse(&text).is_err());
    }

    #[test]
    fn test_exhausted_tip() {
        let text = HEWL.replace("reserve = 2.0", "reserve = 10.0");
        assert!(Protocol::parse(&text).is_err());
    }

    #[test]
    fn test_shared_source_conflict() {
        let text = HEWL.replace(
            "well = \"A4\", vessel = \"GREINER_50mL\", volume_ml = 40.0",
            "well = \"A3\", vessel = \"GREINER_50mL\", volume_ml = 30.0",
        );
        assert_ne!(text, HEWL);
        assert!(Protocol::parse(&text).is_err());
    }

    #[test]
    fn test_oversized_drop() {
        let text = COLORS.replace("volume = 5.0", "volume = 9.0");
        assert!(Protocol::parse(&text).is_err());
    }

    #[test]
    fn test_unknown_mix_pipette() {
        let text = COLORS.replace("[mix]\npipette = \"p300\"", "[mix]\npipette = \"p1000\"");
        assert_ne!(text, COLORS);
        assert!(Protocol::parse(&text).is_err());
    }
}
