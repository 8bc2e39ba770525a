// src/cli.rs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Applies a performance profile to this machine and undoes it later.
#[derive(Parser, Debug)]
#[command(name = "perf_tool", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Backup state file
    #[arg(long, global = true, env = "PERF_TOOL_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Directory with additional profile files
    #[arg(long, global = true, env = "PERF_TOOL_PROFILES")]
    pub profiles_dir: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show whether a backup exists and what it holds
    Status,

    /// List available profiles
    Profiles,

    /// Capture current settings and apply a profile
    Optimize {
        /// Profile id, or path to a profile file
        profile: String,

        /// Run even though a backup from an earlier optimize exists
        #[arg(long)]
        force: bool,
    },

    /// Return every captured setting to its original value
    Restore,

    /// Delete the backup without restoring anything
    DiscardBackup,

    /// Trim the working sets of running processes
    FreeRam,
}
