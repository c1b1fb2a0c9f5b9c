use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "contrib",
    version,
    about = "Aggregate contributions from several services into one JSON file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch from every enabled source and reconcile with the existing snapshot.
    Gather {
        /// Path to the JSON/YAML config file.
        #[arg(long, env = "CONTRIB_CONFIG")]
        config: PathBuf,

        /// Snapshot path override (else `outputFile` from the config).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate the config file without contacting any service.
    Validate {
        #[arg(long, env = "CONTRIB_CONFIG")]
        config: PathBuf,
    },

    /// Print the parsed config (the GitHub token is only reported as set or unset).
    Config {
        #[arg(long, env = "CONTRIB_CONFIG")]
        config: PathBuf,
    },
}
