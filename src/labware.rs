use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::{prelude::*, quantity::Millimeters};

/// Well coordinate on a labware grid, for example `B4`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct WellName {
    pub row: char,
    pub column: u8,
}

impl WellName {
    pub const fn new(row: char, column: u8) -> Self {
        Self { row, column }
    }

    /// Zero-based row index, `A` is 0.
    pub const fn row_index(self) -> u32 {
        self.row as u32 - 'A' as u32
    }
}

impl Display for WellName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

impl FromStr for WellName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let row = chars.next().with_context(|| format!("empty well name `{s}`"))?;
        ensure!(row.is_ascii_uppercase(), "well `{s}` must start with an uppercase row letter");
        let column = chars
            .as_str()
            .parse::<u8>()
            .with_context(|| format!("well `{s}` must end with a column number"))?;
        ensure!(column != 0, "well `{s}`: columns are numbered from 1");
        Ok(Self { row, column })
    }
}

/// Deck alias of a loaded labware, for example `crystal_plate`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabwareAlias(pub String);

impl Display for LabwareAlias {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LabwareAlias {
    fn from(alias: &str) -> Self {
        Self(alias.to_owned())
    }
}

#[derive(Debug, Hash, Ord, PartialOrd, Serialize, Deserialize, clap::ValueEnum, enumset::EnumSetType)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
}

/// Lateral and vertical displacement in millimetres.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,

    #[serde(default)]
    pub y: f64,

    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Reference point inside a well.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "anchor", content = "z", rename_all = "snake_case")]
pub enum Anchor {
    /// Relative to the rim, negative is deeper.
    Top(Millimeters),

    /// Relative to the bottom, positive is higher.
    Bottom(Millimeters),

    Center,
}

impl Display for Anchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Top(z) => write!(f, "top({})", z.0),
            Self::Bottom(z) => write!(f, "bottom({})", z.0),
            Self::Center => f.write_str("center()"),
        }
    }
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub labware: LabwareAlias,
    pub well: WellName,
    #[serde(flatten)]
    pub anchor: Anchor,
    pub offset: Point,
}

impl Location {
    pub fn top(labware: &LabwareAlias, well: WellName, z: Millimeters) -> Self {
        Self::new(labware, well, Anchor::Top(z))
    }

    pub fn bottom(labware: &LabwareAlias, well: WellName, z: Millimeters) -> Self {
        Self::new(labware, well, Anchor::Bottom(z))
    }

    pub fn center(labware: &LabwareAlias, well: WellName) -> Self {
        Self::new(labware, well, Anchor::Center)
    }

    fn new(labware: &LabwareAlias, well: WellName, anchor: Anchor) -> Self {
        Self { labware: labware.clone(), well, anchor, offset: Point::default() }
    }

    /// Shift the location, offsets accumulate.
    pub fn moved(mut self, by: Point) -> Self {
        self.offset.x += by.x;
        self.offset.y += by.y;
        self.offset.z += by.z;
        self
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}].{}", self.labware, self.well, self.anchor)?;
        if self.offset != Point::default() {
            write!(f, " + {}", self.offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_name() {
        assert_eq!("B4".parse::<WellName>().unwrap(), WellName::new('B', 4));
        assert_eq!("D12".parse::<WellName>().unwrap(), WellName::new('D', 12));
    }

    #[test]
    fn test_parse_malformed_well_name() {
        assert!("".parse::<WellName>().is_err());
        assert!("b4".parse::<WellName>().is_err());
        assert!("A".parse::<WellName>().is_err());
        assert!("A0".parse::<WellName>().is_err());
        assert!("4B".parse::<WellName>().is_err());
    }

    #[test]
    fn test_row_index() {
        assert_eq!(WellName::new('A', 1).row_index(), 0);
        assert_eq!(WellName::new('D', 1).row_index(), 3);
    }

    #[test]
    fn test_moved_accumulates() {
        let location = Location::center(&LabwareAlias::from("plate"), WellName::new('A', 1))
            .moved(Point::new(0.0, 5.5, 0.0))
            .moved(Point::new(0.0, 0.0, -11.0));
        assert_eq!(location.offset, Point::new(0.0, 5.5, -11.0));
    }

    #[test]
    fn test_display() {
        let location = Location::top(&LabwareAlias::from("plate"), WellName::new('C', 2), Millimeters(10.0))
            .moved(Point::new(0.0, 5.5, 0.0));
        assert_eq!(location.to_string(), "plate[C2].top(10) + (0, 5.5, 0)");
    }
}
