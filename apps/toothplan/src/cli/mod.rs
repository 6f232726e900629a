//! # Toothplan CLI Module
//!
//! This module implements the CLI interface for toothplan.
//!
//! ## Available Commands
//!
//! - `organize` - Build a staged plan from findings
//! - `validate` - Check a plan for errors and warnings
//! - `totals` - Show per-stage and overall time and cost
//! - `classify` - Show the urgency tier for a condition/treatment pair
//! - `edit` - Apply a script of editor operations to a plan

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toothplan_core::PlanError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Toothplan - dental treatment-stage organizer
///
/// Turns clinical findings into staged treatment plans and checks them
/// against clinical ordering rules.
#[derive(Parser, Debug)]
#[command(name = "toothplan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file (organizer tables and clinic pricing)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a staged plan from a findings file
    Organize {
        /// Path to a JSON array of findings
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate a plan
    Validate {
        /// Path to the plan (JSON array of stages)
        #[arg(short, long)]
        file: PathBuf,

        /// Plan format (wire, internal)
        #[arg(short = 't', long, default_value = "wire")]
        format: String,
    },

    /// Show stage and plan totals
    Totals {
        /// Path to the plan (JSON array of stages)
        #[arg(short, long)]
        file: PathBuf,

        /// Plan format (wire, internal)
        #[arg(short = 't', long, default_value = "wire")]
        format: String,

        /// Per-stage time limit in minutes (defaults to the configured value)
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// Classify a condition/treatment pair
    Classify {
        /// Clinical condition, e.g. "abscess"
        #[arg(long)]
        condition: String,

        /// Planned treatment, e.g. "root canal treatment"
        #[arg(long)]
        treatment: String,
    },

    /// Apply a JSON script of editor operations to a plan
    Edit {
        /// Path to the plan (JSON array of stages)
        #[arg(short, long)]
        file: PathBuf,

        /// Path to the operations script (JSON array)
        #[arg(short, long)]
        ops: PathBuf,

        /// Plan format (wire, internal)
        #[arg(short = 't', long, default_value = "wire")]
        format: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), PlanError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Organize { file } => cmd_organize(&config, json_mode, &file),
        Commands::Validate { file, format } => cmd_validate(&config, json_mode, &file, &format),
        Commands::Totals {
            file,
            format,
            threshold,
        } => cmd_totals(&config, json_mode, &file, &format, threshold),
        Commands::Classify {
            condition,
            treatment,
        } => cmd_classify(&config, json_mode, &condition, &treatment),
        Commands::Edit { file, ops, format } => {
            cmd_edit(&config, json_mode, &file, &ops, &format)
        }
    }
}
