//! Command-line arguments.

use clap::{Parser, Subcommand};
use common::AggregateId;

#[derive(Parser, Debug)]
#[command(
    name = "planet-admin",
    about = "Inspect planets and maintain their snapshots",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Print the snapshot state of every planet
    List,

    /// Print a planet's current state, including events its snapshot has not absorbed
    Show { planet_id: AggregateId },

    /// Print a planet's snapshot state as stored
    Initial { planet_id: AggregateId },

    /// Print a planet's events in log order
    History { planet_id: AggregateId },

    /// Compare every snapshot with a full replay of its history
    Verify,

    /// Recompute snapshots from the log
    Rebuild {
        /// Rebuild only this planet
        planet_id: Option<AggregateId>,

        #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(usize))]
        concurrency: usize,
    },
}
