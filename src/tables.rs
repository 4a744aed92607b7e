use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    depth::{VesselProfile, VesselProfiles},
    labware::Anchor,
    quantity::{Microliters, Milliliters},
    recipe::{Demands, Liquid},
    robot::Command,
    run::Report,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn volume_cell(volume: Microliters) -> Cell {
    let cell = Cell::new(format!("{:.2}", volume.0)).set_alignment(CellAlignment::Right);
    if volume.is_positive() { cell } else { cell.add_attribute(Attribute::Dim) }
}

pub fn build_recipe_table(liquids: &[Liquid], demands: &Demands) -> Table {
    let mut table = new_table();
    table.set_header(
        std::iter::once("Well")
            .chain(liquids.iter().map(|liquid| liquid.name.as_str()))
            .chain(std::iter::once("Total")),
    );
    for (well, demand) in demands {
        table.add_row(
            std::iter::once(Cell::new(well).add_attribute(Attribute::Bold))
                .chain(liquids.iter().map(|liquid| volume_cell(demand.get(&liquid.name))))
                .chain(std::iter::once(volume_cell(demand.total()))),
        );
    }
    table
}

pub fn build_plan_table(commands: &[Command]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["#", "Command", "Mount", "Volume", "Location"]);
    for (index, command) in commands.iter().enumerate() {
        let name = match command {
            Command::Aspirate { .. } => Cell::new(command.name()).fg(Color::Cyan),
            Command::Dispense { .. } => Cell::new(command.name()).fg(Color::Green),
            Command::PickUpTip { .. } | Command::DropTip { .. } => {
                Cell::new(command.name()).fg(Color::DarkYellow)
            }
            Command::Delay { seconds } => {
                Cell::new(format!("delay {seconds} s")).add_attribute(Attribute::Dim)
            }
            _ => Cell::new(command.name()),
        };
        let details = match command {
            Command::LoadLabware { alias, kind, slot } => format!("{alias} = {kind} @ {slot}"),
            Command::LoadInstrument { kind, tip_racks, .. } => {
                let tip_racks: Vec<String> = tip_racks.iter().map(ToString::to_string).collect();
                format!("{kind} [{}]", tip_racks.join(", "))
            }
            Command::TouchTip { v_offset, radius, .. } => format!("{v_offset}, radius {radius}"),
            _ => command.location().map(ToString::to_string).unwrap_or_default(),
        };
        table.add_row(vec![
            Cell::new(index + 1).add_attribute(Attribute::Dim),
            name,
            Cell::new(command.mount().map(|mount| format!("{mount:?}")).unwrap_or_default()),
            command.volume().map_or_else(|| Cell::new(""), volume_cell),
            Cell::new(details),
        ]);
    }
    table
}

pub fn build_sources_table(report: &Report) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Liquids", "Vessel", "Location", "Initial", "Used", "Remaining"]);
    for source in &report.sources {
        table.add_row(vec![
            Cell::new(source.liquids.join(", ")).add_attribute(Attribute::Bold),
            Cell::new(&source.vessel.profile),
            Cell::new(format!("{}[{}]", source.vessel.labware, source.vessel.well)),
            volume_cell(source.initial),
            volume_cell(source.used()),
            Cell::new(format!("{:.2}", source.remaining.0))
                .set_alignment(CellAlignment::Right)
                .fg(if source.is_overdrawn() { Color::Red } else { Color::Green }),
        ]);
    }
    table
}

pub fn build_vessels_table(profiles: &VesselProfiles) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Name",
        "Kind",
        "Volume offset",
        "Volume step",
        "Offset",
        "Step",
        "Max volume",
    ]);
    for (name, profile) in profiles.iter() {
        let mut row = vec![Cell::new(name).add_attribute(Attribute::Bold)];
        match profile {
            VesselProfile::Conical(calibration) => {
                row.push(Cell::new("conical"));
                row.extend(
                    [
                        calibration.volume_offset.to_string(),
                        calibration.volume_step.to_string(),
                        calibration.offset.to_string(),
                        calibration.step.to_string(),
                        calibration.max_volume.to_string(),
                    ]
                    .into_iter()
                    .map(|value| Cell::new(value).set_alignment(CellAlignment::Right)),
                );
            }
            VesselProfile::Tube { bottom_clearance } => {
                row.push(Cell::new("tube"));
                row.push(
                    Cell::new(format!("bottom + {bottom_clearance}"))
                        .add_attribute(Attribute::Dim),
                );
            }
        }
        table.add_row(row);
    }
    table
}

pub fn build_depth_table(vessel: &str, anchors: &[(Milliliters, Anchor)]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Vessel", "Volume", "Tip"]);
    for (volume, anchor) in anchors {
        table.add_row(vec![
            Cell::new(vessel),
            Cell::new(volume).set_alignment(CellAlignment::Right),
            Cell::new(anchor).fg(match anchor {
                Anchor::Top(_) => Color::Green,
                Anchor::Bottom(_) => Color::DarkYellow,
                Anchor::Center => Color::Reset,
            }),
        ]);
    }
    table
}

