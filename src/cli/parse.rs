//! CLI parse: clap types for twinsync. No behavior; definitions only.

use crate::logging::{LogFormat, LogOutput};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// twinsync CLI - Bidirectional filesystem synchronization
#[derive(Parser, Debug)]
#[command(name = "twinsync")]
#[command(about = "Bidirectional three-way filesystem synchronization")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<LogOutput>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize two directories
    Sync {
        /// Alpha endpoint root
        alpha: PathBuf,
        /// Beta endpoint root
        beta: PathBuf,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
        /// Additional ignore patterns
        #[arg(short = 'i', long = "ignore")]
        ignores: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List sessions with stored state
    Sessions,
    /// Forget the stored state of a session
    Forget {
        /// Session identifier (as shown by `sessions`)
        session: String,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Benchmark scanning and state serialization for a directory
    Bench {
        /// Directory (or file) to scan
        path: PathBuf,
        /// Ignore patterns
        #[arg(short = 'i', long = "ignore")]
        ignores: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
