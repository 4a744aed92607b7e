use std::{
    fs::File,
    io::{BufWriter, Write, stdout},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum};

use crate::{
    depth::{DeadVolume, DepthModel, DepthSettings, Formula, VesselProfiles},
    labware::WellName,
    prelude::*,
    protocol::Protocol,
    quantity::{Microliters, Milliliters},
    robot::{Journal, Settling},
    run::Runner,
    tables::{
        build_depth_table,
        build_plan_table,
        build_recipe_table,
        build_sources_table,
        build_vessels_table,
    },
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Dry-run a protocol and print the robot commands.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),

    /// Look into the parts of a protocol.
    #[clap(name = "inspect")]
    Inspect(InspectArgs),
}

impl Command {
    pub fn run(self) -> Result {
        match self {
            Self::Plan(args) => args.run(),
            Self::Inspect(args) => args.run(),
        }
    }
}

#[derive(Parser)]
pub struct ProtocolArgs {
    /// Protocol TOML file.
    #[clap(long = "protocol", env = "DROPPER_PROTOCOL")]
    pub path: PathBuf,

    /// Only fill these wells, comma-separated.
    #[clap(long, value_delimiter = ',', num_args = 1..)]
    pub wells: Vec<WellName>,
}

impl ProtocolArgs {
    fn load(&self) -> Result<(Protocol, Vec<WellName>)> {
        let protocol = Protocol::load(&self.path)?;
        let wells =
            if self.wells.is_empty() { protocol.wells() } else { protocol.select_wells(&self.wells)? };
        Ok((protocol, wells))
    }
}

#[derive(Copy, Clone, ValueEnum)]
pub enum Format {
    /// Human-readable tables.
    Table,

    /// One JSON command per line.
    Json,
}

#[derive(Parser)]
pub struct PlanArgs {
    #[clap(flatten)]
    protocol: ProtocolArgs,

    #[clap(long, value_enum, default_value = "table", env = "DROPPER_FORMAT")]
    format: Format,

    /// Write the plan to the file instead of the standard output.
    #[clap(long)]
    output: Option<PathBuf>,

    /// Leave the settle delays out of the plan.
    #[clap(long)]
    no_settle: bool,
}

impl PlanArgs {
    fn run(self) -> Result {
        let (protocol, wells) = self.protocol.load()?;
        let settle = if self.no_settle { Duration::ZERO } else { protocol.motion.settle };
        let mut robot = Settling::new(Journal::default(), settle);
        let report = Runner::builder().protocol(&protocol).wells(&wells).build().run(&mut robot)?;
        let journal = robot.into_inner();
        info!(n_commands = journal.commands().len(), n_tips = journal.n_tips_used(), "Planned");
        let commands = journal.into_commands();

        let mut writer = open_output(self.output.as_deref())?;
        match self.format {
            Format::Table => {
                writeln!(writer, "{}", build_plan_table(&commands))?;
                writeln!(writer, "{}", build_sources_table(&report))?;
            }
            Format::Json => {
                for command in &commands {
                    serde_json::to_writer(&mut writer, command)?;
                    writeln!(writer)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create `{}`", path.display()))?,
        )),
        None => Box::new(stdout().lock()),
    })
}

#[derive(Parser)]
pub struct InspectArgs {
    #[command(subcommand)]
    command: InspectCommand,
}

impl InspectArgs {
    fn run(self) -> Result {
        match self.command {
            InspectCommand::Recipe(args) => args.run(),
            InspectCommand::Depth(args) => args.run(),
            InspectCommand::Vessels(args) => args.run(),
        }
    }
}

#[derive(Subcommand)]
pub enum InspectCommand {
    /// Print the volume of every liquid in every well.
    Recipe(InspectRecipeArgs),

    /// Evaluate the depth model for a vessel.
    Depth(InspectDepthArgs),

    /// List the vessel profiles.
    Vessels(InspectVesselsArgs),
}

#[derive(Parser)]
pub struct InspectRecipeArgs {
    #[clap(flatten)]
    protocol: ProtocolArgs,
}

impl InspectRecipeArgs {
    fn run(self) -> Result {
        let (protocol, wells) = self.protocol.load()?;
        let demands = protocol.recipe().demands(&wells)?;
        println!("{}", build_recipe_table(&protocol.liquids, &demands));
        Ok(())
    }
}

#[derive(Parser)]
pub struct InspectDepthArgs {
    /// Vessel profile name, for example `GREINER_50mL`.
    #[clap(long)]
    vessel: String,

    /// Remaining volumes in millilitres, comma-separated.
    #[clap(long = "volume-ml", value_delimiter = ',', num_args = 1.., required = true)]
    volumes: Vec<Milliliters>,

    #[clap(long, value_enum, default_value = "capacity")]
    formula: Formula,

    /// Flat dead volume in microlitres.
    #[clap(long = "dead-volume-ul", conflicts_with = "dead_volume_fraction")]
    dead_volume_ul: Option<Microliters>,

    /// Dead volume as a fraction of the vessel capacity.
    #[clap(long = "dead-volume-fraction")]
    dead_volume_fraction: Option<f64>,

    /// Take the vessel profiles from the protocol as well.
    #[clap(long = "protocol", env = "DROPPER_PROTOCOL")]
    protocol: Option<PathBuf>,
}

impl InspectDepthArgs {
    fn run(self) -> Result {
        let dead_volume = match (self.dead_volume_ul, self.dead_volume_fraction) {
            (Some(volume), _) => DeadVolume::Flat(volume),
            (None, Some(fraction)) => DeadVolume::FractionOfCapacity(fraction),
            (None, None) => DeadVolume::default(),
        };
        let settings = DepthSettings::builder().formula(self.formula).dead_volume(dead_volume).build();
        let model = DepthModel::new(settings, load_profiles(self.protocol.as_deref())?);
        let profile = model.profiles.get(&self.vessel)?;
        let anchors: Vec<_> = self
            .volumes
            .into_iter()
            .map(|volume| (volume, model.anchor(profile, Microliters::from(volume))))
            .collect();
        println!("{}", build_depth_table(&self.vessel, &anchors));
        Ok(())
    }
}

#[derive(Parser)]
pub struct InspectVesselsArgs {
    /// Take the vessel profiles from the protocol as well.
    #[clap(long = "protocol", env = "DROPPER_PROTOCOL")]
    protocol: Option<PathBuf>,
}

impl InspectVesselsArgs {
    fn run(self) -> Result {
        println!("{}", build_vessels_table(&load_profiles(self.protocol.as_deref())?));
        Ok(())
    }
}

fn load_profiles(protocol: Option<&Path>) -> Result<VesselProfiles> {
    match protocol {
        Some(path) => Ok(Protocol::load(path)?.profiles()),
        None => Ok(VesselProfiles::builtin()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_plan() {
        let args = Args::try_parse_from([
            "dropper",
            "plan",
            "--protocol",
            "protocols/hewl.toml",
            "--wells",
            "A1,B2",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Plan(args) = args.command else { panic!("expected the plan command") };
        assert_eq!(args.protocol.wells, [WellName::new('A', 1), WellName::new('B', 2)]);
        assert!(matches!(args.format, Format::Json));
    }

    #[test]
    fn test_parse_depth() {
        let args = Args::try_parse_from([
            "dropper",
            "inspect",
            "depth",
            "--vessel",
            "GREINER_50mL",
            "--volume-ml",
            "26.5,40",
            "--formula",
            "legacy",
        ])
        .unwrap();
        let Command::Inspect(InspectArgs { command: InspectCommand::Depth(args) }) = args.command else {
            panic!("expected the depth command");
        };
        assert_eq!(args.volumes, [Milliliters(26.5), Milliliters(40.0)]);
        assert_eq!(args.formula, Formula::Legacy);
    }
}
