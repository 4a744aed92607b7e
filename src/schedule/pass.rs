use serde::{Deserialize, Serialize};

use crate::{
    labware::{LabwareAlias, Mount, WellName},
    robot::Instrument,
    schedule::Tip,
};

/// Pipette together with the tips it is loaded with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pipette {
    /// Robot instrument model, for example `p300_single_gen2`.
    pub kind: String,

    pub mount: Mount,
    pub tip_racks: Vec<LabwareAlias>,

    #[serde(flatten)]
    pub tip: Tip,
}

impl Pipette {
    pub fn instrument(&self) -> Instrument {
        Instrument {
            kind: self.kind.clone(),
            mount: self.mount,
            tip_racks: self.tip_racks.clone(),
            tip_capacity: self.tip.capacity,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipPolicy {
    /// One tip per pipette for the whole pass.
    #[default]
    PerPass,

    /// Fresh tip whenever the destination row changes.
    PerRow,
}

/// Which pipette serves a well.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipetteChoice {
    Fixed(String),

    /// Static column threshold: the large pipette for the first columns and the small one after.
    ByColumn { through_column: u8, then: String, otherwise: String },
}

impl PipetteChoice {
    pub fn select(&self, well: WellName) -> &str {
        match self {
            Self::Fixed(name) => name.as_str(),
            Self::ByColumn { through_column, then, otherwise } => {
                if well.column <= *through_column { then.as_str() } else { otherwise.as_str() }
            }
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Fixed(name) => vec![name.as_str()],
            Self::ByColumn { then, otherwise, .. } => vec![then.as_str(), otherwise.as_str()],
        }
    }
}

/// One liquid distributed across all the wells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    pub liquid: String,
    pub pipette: PipetteChoice,

    #[serde(default)]
    pub tips: TipPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Microliters;

    #[test]
    fn test_select_by_column() {
        let choice = PipetteChoice::ByColumn {
            through_column: 4,
            then: "p300".to_owned(),
            otherwise: "p10".to_owned(),
        };
        assert_eq!(choice.select(WellName::new('A', 1)), "p300");
        assert_eq!(choice.select(WellName::new('D', 4)), "p300");
        assert_eq!(choice.select(WellName::new('B', 5)), "p10");
    }

    #[test]
    fn test_deserialize_pass() {
        let pass: Pass = toml::from_str(
            r#"
            liquid = "buffer46"
            pipette = "p300"
            tips = "per_row"
            "#,
        )
        .unwrap();
        assert_eq!(pass.pipette, PipetteChoice::Fixed("p300".to_owned()));
        assert_eq!(pass.tips, TipPolicy::PerRow);

        let pass: Pass = toml::from_str(
            r#"
            liquid = "water"
            pipette = { through_column = 1, then = "p300", otherwise = "p10" }
            "#,
        )
        .unwrap();
        assert_eq!(pass.pipette.select(WellName::new('A', 2)), "p10");
        assert_eq!(pass.tips, TipPolicy::PerPass);
    }

    #[test]
    fn test_deserialize_pipette() {
        let pipette: Pipette = toml::from_str(
            r#"
            kind = "p10_single"
            mount = "left"
            tip_racks = ["tips_10ul"]
            capacity = 10.0
            reserve = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(pipette.mount, Mount::Left);
        assert_eq!(pipette.tip, Tip { capacity: Microliters(10.0), reserve: Microliters(2.0) });
        assert_eq!(pipette.instrument().tip_capacity, Microliters(10.0));
    }
}
