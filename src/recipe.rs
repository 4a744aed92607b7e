use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    depth::Vessel,
    labware::WellName,
    prelude::*,
    quantity::{Microliters, Milliliters},
};

/// Well totals closer than that count as equal.
const TOLERANCE: Microliters = Microliters(1e-6);

/// How much of a liquid goes into a well.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Constant(Microliters),

    /// Linear in the row index (`A` = 0) and the column index (`1` = 0).
    Gradient {
        start: Microliters,

        #[serde(default)]
        row_step: Microliters,

        #[serde(default)]
        column_step: Microliters,
    },

    /// Whatever is left up to the well volume.
    Remainder,
}

impl Rule {
    fn volume(self, well: WellName) -> Option<Microliters> {
        match self {
            Self::Constant(volume) => Some(volume),
            Self::Gradient { start, row_step, column_step } => Some(
                start
                    + row_step * f64::from(well.row_index())
                    + column_step * f64::from(well.column - 1),
            ),
            Self::Remainder => None,
        }
    }
}

/// Where a liquid comes from and how much of it is there at the start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(flatten)]
    pub vessel: Vessel,

    #[serde(rename = "volume_ml")]
    pub initial_volume: Milliliters,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Liquid {
    pub name: String,
    pub source: Source,
    pub volume: Rule,

    /// Only these rows get the liquid, all rows when unset.
    #[serde(default)]
    pub rows: Option<Vec<char>>,
}

impl Liquid {
    fn applies_to(&self, well: WellName) -> bool {
        self.rows.as_ref().is_none_or(|rows| rows.contains(&well.row))
    }
}

/// Target volume of every liquid for a single destination well.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WellDemand(BTreeMap<String, Microliters>);

impl WellDemand {
    /// Target volume of the liquid, zero when the well does not get it.
    pub fn get(&self, liquid: &str) -> Microliters {
        self.0.get(liquid).copied().unwrap_or(Microliters::ZERO)
    }

    pub fn total(&self) -> Microliters {
        self.0.values().copied().sum()
    }
}

pub type Demands = Vec<(WellName, WellDemand)>;

#[must_use]
pub struct Recipe<'a> {
    pub liquids: &'a [Liquid],
    pub well_volume: Microliters,
}

impl Recipe<'_> {
    pub fn validate(&self) -> Result {
        let n_remainders =
            self.liquids.iter().filter(|liquid| liquid.volume == Rule::Remainder).count();
        ensure!(n_remainders <= 1, "only one liquid may take the remainder, got {n_remainders}");
        if let Some(name) = self.liquids.iter().map(|liquid| &liquid.name).duplicates().next() {
            bail!("liquid `{name}` is defined twice");
        }
        Ok(())
    }

    /// Build the demand of each well, in the order of the wells.
    pub fn demands(&self, wells: &[WellName]) -> Result<Demands> {
        self.validate()?;
        wells.iter().map(|well| Ok((*well, self.demand(*well)?))).collect()
    }

    fn demand(&self, well: WellName) -> Result<WellDemand> {
        let mut demand = WellDemand::default();
        let mut remainder = None;
        for liquid in self.liquids {
            let volume = if liquid.applies_to(well) {
                match liquid.volume.volume(well) {
                    Some(volume) => volume,
                    None => {
                        remainder = Some(&liquid.name);
                        continue;
                    }
                }
            } else {
                Microliters::ZERO
            };
            ensure!(volume >= Microliters::ZERO, "{well}: negative volume {volume} of `{}`", liquid.name);
            demand.0.insert(liquid.name.clone(), volume);
        }

        let total = demand.total();
        if let Some(name) = remainder {
            let volume = self.well_volume - total;
            ensure!(
                volume >= -TOLERANCE,
                "{well}: {total} already exceed the well volume of {}",
                self.well_volume,
            );
            demand.0.insert(name.clone(), volume.max(Microliters::ZERO));
        } else {
            ensure!(
                (total - self.well_volume).0.abs() <= TOLERANCE.0,
                "{well}: liquids add up to {total} instead of {}",
                self.well_volume,
            );
        }
        Ok(demand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liquid(name: &str, volume: Rule, rows: Option<&str>) -> Liquid {
        Liquid {
            name: name.to_owned(),
            source: Source {
                vessel: Vessel {
                    labware: "colors".into(),
                    well: WellName::new('A', 1),
                    profile: "GREINER_50mL".to_owned(),
                },
                initial_volume: Milliliters(40.0),
            },
            volume,
            rows: rows.map(|rows| rows.chars().collect()),
        }
    }

    /// Buffers by row, a water gradient by column and the precipitant on top.
    fn hewl() -> Vec<Liquid> {
        vec![
            liquid("buffer46", Rule::Constant(Microliters(50.0)), Some("A")),
            liquid("buffer47", Rule::Constant(Microliters(50.0)), Some("B")),
            liquid("buffer48", Rule::Constant(Microliters(50.0)), Some("CD")),
            liquid(
                "water",
                Rule::Gradient {
                    start: Microliters(50.0),
                    row_step: Microliters::ZERO,
                    column_step: Microliters(-10.0),
                },
                None,
            ),
            liquid("precip", Rule::Remainder, None),
        ]
    }

    #[test]
    fn test_hewl_demands() {
        let liquids = hewl();
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        let wells = [WellName::new('A', 1), WellName::new('C', 6), WellName::new('D', 3)];
        let demands = recipe.demands(&wells).unwrap();

        assert_eq!(demands.len(), 3);
        let (well, a1) = &demands[0];
        assert_eq!(*well, WellName::new('A', 1));
        assert_eq!(a1.get("buffer46"), Microliters(50.0));
        assert_eq!(a1.get("buffer47"), Microliters::ZERO);
        assert_eq!(a1.get("water"), Microliters(50.0));
        assert_eq!(a1.get("precip"), Microliters(300.0));

        let (_, c6) = &demands[1];
        assert_eq!(c6.get("buffer48"), Microliters(50.0));
        assert_eq!(c6.get("water"), Microliters::ZERO);
        assert_eq!(c6.get("precip"), Microliters(350.0));

        let (_, d3) = &demands[2];
        assert_eq!(d3.get("buffer48"), Microliters(50.0));
        assert_eq!(d3.get("water"), Microliters(30.0));

        for (_, demand) in &demands {
            assert_eq!(demand.total(), Microliters(400.0));
        }
    }

    #[test]
    fn test_matrix_demands() {
        let liquids = vec![
            liquid(
                "magenta",
                Rule::Gradient {
                    start: Microliters::ZERO,
                    row_step: Microliters(30.0),
                    column_step: Microliters::ZERO,
                },
                None,
            ),
            liquid(
                "blue",
                Rule::Gradient {
                    start: Microliters::ZERO,
                    row_step: Microliters::ZERO,
                    column_step: Microliters(50.0),
                },
                None,
            ),
            liquid("water", Rule::Remainder, None),
        ];
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        let demands = recipe.demands(&[WellName::new('F', 4)]).unwrap();
        let (_, f4) = &demands[0];
        assert_eq!(f4.get("magenta"), Microliters(150.0));
        assert_eq!(f4.get("blue"), Microliters(150.0));
        assert_eq!(f4.get("water"), Microliters(100.0));
    }

    #[test]
    fn test_negative_gradient() {
        let liquids = vec![
            liquid(
                "water",
                Rule::Gradient {
                    start: Microliters(25.0),
                    row_step: Microliters::ZERO,
                    column_step: Microliters(-5.0),
                },
                None,
            ),
            liquid("precip", Rule::Remainder, None),
        ];
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        assert!(recipe.demands(&[WellName::new('A', 6)]).is_ok());
        assert!(recipe.demands(&[WellName::new('A', 7)]).is_err());
    }

    #[test]
    fn test_overfull_well() {
        let liquids = vec![
            liquid("buffer", Rule::Constant(Microliters(450.0)), None),
            liquid("precip", Rule::Remainder, None),
        ];
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        assert!(recipe.demands(&[WellName::new('A', 1)]).is_err());
    }

    #[test]
    fn test_incomplete_well() {
        let liquids = vec![liquid("buffer", Rule::Constant(Microliters(40.0)), None)];
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        assert!(recipe.demands(&[WellName::new('A', 1)]).is_err());
    }

    #[test]
    fn test_two_remainders() {
        let liquids =
            vec![liquid("water", Rule::Remainder, None), liquid("precip", Rule::Remainder, None)];
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_duplicate_liquid() {
        let liquids = vec![
            liquid("water", Rule::Constant(Microliters(200.0)), None),
            liquid("water", Rule::Constant(Microliters(200.0)), None),
        ];
        let recipe = Recipe { liquids: &liquids, well_volume: Microliters(400.0) };
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_deserialize_liquid() {
        let liquid: Liquid = toml::from_str(
            r#"
            name = "water"
            source = { labware = "colors", well = "B3", vessel = "GREINER_50mL", volume_ml = 40.0 }
            volume = { gradient = { start = 50.0, column_step = -10.0 } }
            "#,
        )
        .unwrap();
        assert_eq!(liquid.source.vessel.well, WellName::new('B', 3));
        assert_eq!(liquid.source.initial_volume, Milliliters(40.0));
        assert_eq!(
            liquid.volume,
            Rule::Gradient {
                start: Microliters(50.0),
                row_step: Microliters::ZERO,
                column_step: Microliters(-10.0),
            },
        );

        let liquid: Liquid = toml::from_str(
            r#"
            name = "precip"
            source = { labware = "colors", well = "B2", vessel = "VMR_15mL", volume_ml = 14.0 }
            volume = "remainder"
            rows = ["C", "D"]
            "#,
        )
        .unwrap();
        assert_eq!(liquid.volume, Rule::Remainder);
        assert_eq!(liquid.rows, Some(vec!['C', 'D']));
    }
}
