//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

pub mod commands;

/// ljdump - incremental journal archiver
///
/// Mirrors journal entries, comments and userpics into a local directory.
/// Rerunning only fetches what changed since the last run.
#[derive(Parser, Debug)]
#[command(name = "ljdump", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: ./ljdump.json if present)
    #[arg(long, global = true, env = "LJDUMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory to write the archive into (default: .)
    #[arg(long, global = true, env = "LJDUMP_DUMP_DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Server base URL
    #[arg(long, global = true, env = "LJDUMP_SERVER")]
    pub server: Option<String>,

    /// Account to log in as
    #[arg(long, global = true, env = "LJDUMP_USERNAME")]
    pub username: Option<String>,

    /// Journal to archive; repeat for several (default: the account's own)
    #[arg(long = "journal", global = true)]
    pub journals: Vec<String>,

    /// File whose first line is the password, or - for stdin
    #[arg(long, global = true, env = "LJDUMP_PASSWORD_FILE")]
    pub password_file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Fetch everything new since the last run (default)
    Dump,

    /// Show what the archive holds without contacting the server
    Status,

    /// Print version information
    Version,
}

impl Cli {
    /// Config values given as flags or environment variables.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config: self.config.clone(),
            dump_dir: self.dump_dir.clone(),
            server: self.server.clone(),
            username: self.username.clone(),
            journals: self.journals.clone(),
            password_file: self.password_file.clone(),
        }
    }
}
