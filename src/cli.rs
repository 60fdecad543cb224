use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pubforge")]
#[command(author, version, about = "Collect, validate, publish and finalize files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect files into a publish tree and print it
    Collect {
        /// Files or folders to collect
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Save the collected tree to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Collect files and run validation only
    Validate {
        /// Files or folders to collect
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Collect files, then validate, publish and finalize them
    Run {
        /// Files or folders to collect
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Run every phase without registering anything
        #[arg(long)]
        dry_run: bool,

        /// Save the tree after the run to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Run all phases on a previously saved tree
    RunTree {
        /// Saved tree file
        #[arg(required = true)]
        file: PathBuf,

        /// Run every phase without registering anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a saved tree
    Show {
        /// Saved tree file
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Validate configuration file
    CheckConfig {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
