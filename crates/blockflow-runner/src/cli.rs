use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Validate and run block workflow scenes
#[derive(Parser, Debug)]
#[command(name = "blockflow", version, about, long_about = None)]
pub struct Cli {
    /// Runner configuration file (default: ./blockflow.json if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every block of a scene in dependency order
    Run {
        /// Scene JSON file
        scene: PathBuf,
        /// Start the run at this instance
        #[arg(long, conflicts_with = "downstream")]
        start: Option<String>,
        /// Re-run only this instance and the blocks that depend on it
        #[arg(long)]
        downstream: Option<String>,
        /// Write instance states and outputs back to the scene file
        #[arg(short, long)]
        write: bool,
    },
    /// Check a scene without running it
    Validate {
        scene: PathBuf,
    },
    /// Return every instance of a scene to idle
    Reset {
        scene: PathBuf,
        #[arg(short, long)]
        write: bool,
    },
    /// List the available block types
    Catalog {
        /// Only this category (trigger, action, condition, transformer, ai, output)
        #[arg(long)]
        category: Option<String>,
    },
}
