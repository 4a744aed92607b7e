use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::{
    labware::{LabwareAlias, Location, Mount},
    quantity::{FlowRate, Microliters, Millimeters},
};

/// Single recorded robot command.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    LoadLabware { alias: LabwareAlias, kind: String, slot: u8 },
    LoadInstrument { kind: String, mount: Mount, tip_racks: Vec<LabwareAlias> },
    PickUpTip { mount: Mount },
    DropTip { mount: Mount },
    Aspirate { mount: Mount, volume: Microliters, location: Location },
    Dispense { mount: Mount, volume: Microliters, location: Location, rate: FlowRate },
    MoveTo { mount: Mount, location: Location },
    TouchTip { mount: Mount, v_offset: Millimeters, radius: f64 },
    Delay { seconds: f64 },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadLabware { .. } => "load labware",
            Self::LoadInstrument { .. } => "load instrument",
            Self::PickUpTip { .. } => "pick up tip",
            Self::DropTip { .. } => "drop tip",
            Self::Aspirate { .. } => "aspirate",
            Self::Dispense { .. } => "dispense",
            Self::MoveTo { .. } => "move to",
            Self::TouchTip { .. } => "touch tip",
            Self::Delay { .. } => "delay",
        }
    }

    pub const fn mount(&self) -> Option<Mount> {
        match self {
            Self::LoadInstrument { mount, .. }
            | Self::PickUpTip { mount }
            | Self::DropTip { mount }
            | Self::Aspirate { mount, .. }
            | Self::Dispense { mount, .. }
            | Self::MoveTo { mount, .. }
            | Self::TouchTip { mount, .. } => Some(*mount),
            Self::LoadLabware { .. } | Self::Delay { .. } => None,
        }
    }

    pub const fn volume(&self) -> Option<Microliters> {
        match self {
            Self::Aspirate { volume, .. } | Self::Dispense { volume, .. } => Some(*volume),
            _ => None,
        }
    }

    pub const fn location(&self) -> Option<&Location> {
        match self {
            Self::Aspirate { location, .. }
            | Self::Dispense { location, .. }
            | Self::MoveTo { location, .. } => Some(location),
            _ => None,
        }
    }

    #[cfg(test)]
    pub const fn is_delay(&self) -> bool {
        matches!(self, Self::Delay { .. })
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())?;
        if let Some(mount) = self.mount() {
            write!(f, " [{mount:?}]")?;
        }
        match self {
            Self::LoadLabware { alias, kind, slot } => write!(f, " {alias} = {kind} @ {slot}"),
            Self::LoadInstrument { kind, tip_racks, .. } => {
                write!(f, " {kind} with {} tip rack(s)", tip_racks.len())
            }
            Self::Aspirate { volume, location, .. } => write!(f, " {volume} at {location}"),
            Self::Dispense { volume, location, rate, .. } => {
                write!(f, " {volume} at {location} ({rate})")
            }
            Self::MoveTo { location, .. } => write!(f, " {location}"),
            Self::TouchTip { v_offset, radius, .. } => write!(f, " {v_offset}, radius {radius}"),
            Self::Delay { seconds } => write!(f, " {seconds} s"),
            Self::PickUpTip { .. } | Self::DropTip { .. } => Ok(()),
        }
    }
}
