//! CLI definitions.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cordon",
    version,
    about = "Policy-enveloped agent control plane for a single project workspace"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP control plane
    Serve {
        /// TCP port to listen on (default 3001)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Classify a workspace path offline, with the same engine the server uses
    CheckPath {
        /// Path to classify (absolute or workspace-relative)
        path: String,
    },

    /// Validate a command offline against the deny/allow pattern sets
    CheckCommand {
        /// Command string to validate
        command: String,
    },
}
