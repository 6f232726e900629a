//! # Toothplan
//!
//! Command-line host for the toothplan-core treatment-stage organizer.
//!
//! ## Usage
//!
//! ```bash
//! # Build a staged plan from findings
//! toothplan organize -f findings.json
//!
//! # Check a saved plan
//! toothplan validate -f plan.json -t wire
//!
//! # Totals with a custom per-visit limit
//! toothplan totals -f plan.json --threshold 120
//!
//! # Apply a script of edits
//! toothplan --json-mode edit -f plan.json -o ops.json
//! ```

use clap::Parser;
use toothplan::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // TOOTHPLAN_LOG_FORMAT=json enables machine-parseable output. Logs go to
    // stderr so stdout stays clean for plan output.
    let log_format = std::env::var("TOOTHPLAN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "toothplan=debug,toothplan_core=debug"
    } else {
        "toothplan=info,toothplan_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        eprintln!("toothplan v{}", env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
