#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod cli;
mod depth;
mod labware;
mod prelude;
mod protocol;
mod quantity;
mod recipe;
mod robot;
mod run;
mod schedule;
mod tables;

use clap::{Parser, crate_version};

use crate::{cli::Args, prelude::*};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().with_writer(std::io::stderr).init();
    info!(version = crate_version!(), "Starting…");
    Args::parse().command.run()
}
