// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::StorageMode;

/// Command-line arguments for `journey`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "journey",
    version,
    about = "Work through coding courses: automated checks, sequential unlocks, saved progress.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the course catalog (TOML).
    ///
    /// Default: `journey.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "journey.toml", global = true)]
    pub catalog: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOURNEY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Override the catalog's storage mode ("file" or "memory").
    #[arg(long, value_name = "MODE", global = true)]
    pub storage: Option<StorageMode>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List courses with their size and your progress.
    Courses,

    /// Show every task of a course with its unlock status.
    Status {
        #[arg(long, value_name = "ID")]
        course: String,
    },

    /// Run a task's checks once against a source file.
    Check {
        #[arg(long, value_name = "ID")]
        course: String,
        #[arg(long, value_name = "ID")]
        task: String,
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Re-run checks whenever the source file is saved.
    ///
    /// Starts at `--task`, or where you left off.
    Watch {
        #[arg(long, value_name = "ID")]
        course: String,
        #[arg(long, value_name = "ID")]
        task: Option<String>,
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Merge completions exported from the server (JSON).
    Sync {
        /// Only merge completions for this course.
        #[arg(long, value_name = "ID")]
        course: Option<String>,
        #[arg(long, value_name = "PATH")]
        remote: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
