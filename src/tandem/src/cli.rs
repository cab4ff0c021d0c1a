use clap::{Parser, Subcommand};

use crate::cmd::*;

mod args;

/// The CLI interface for the Tandem application.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// The selected command.
    #[clap(subcommand)]
    pub command: TandemCommand,

    #[clap(flatten)]
    pub verbosity: args::Verbosity,
}

/// The top-level commands supported by Tandem.
#[derive(Debug, Subcommand)]
pub enum TandemCommand {
    Copy(copy::FileCopy),
    Vector(vector::Vector),
}

impl Command for TandemCommand {
    fn handle(self) -> eyre::Result<()> {
        match self {
            Self::Copy(copy) => copy.handle(),
            Self::Vector(vector) => vector.handle(),
        }
    }
}
