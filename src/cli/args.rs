//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Browse expect/actual declarations of a multiplatform project and watch them change
#[derive(Parser, Debug)]
#[command(name = "sharetree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true, env = "SHARETREE_PROJECT_DIR", value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the project and print its shared-elements tree
    Tree,

    /// Compare the trees of two project directories
    Diff {
        /// Directory holding the old state
        #[arg(value_hint = ValueHint::DirPath)]
        old: PathBuf,
        /// Directory holding the new state
        #[arg(value_hint = ValueHint::DirPath)]
        new: PathBuf,
    },

    /// Keep a live tree and print every incremental update
    Watch {
        /// Seconds between refreshes, 0 = manual only (default: from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,

    /// Print a commented config template
    Template,
}
