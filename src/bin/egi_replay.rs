//! EGI Replay Binary
//!
//! Loads a replay script (a starting graph in interchange form plus a list
//! of transformations), applies every step through a [`Lineage`] and prints
//! the final graph as a sealed interchange document.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//! - `EGI_ALLOW_SAME_CONTEXT_DEITERATION`: accept de-iteration within one context
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin egi_replay -- script.json > result.json
//! ```

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use egi_kernel::{
    interchange, Calculus, CalculusConfig, HistoryConfig, Lineage, ReplayScript,
};

/// Initialize the tracing subscriber with JSON or pretty format, on stderr.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "egi_replay=info,egi_kernel=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn run(path: &str) -> Result<String, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    let script = ReplayScript::from_json(&json)?;
    let config = CalculusConfig::from_env();
    info!(
        steps = script.steps.len(),
        params_hash = %config.params_hash(),
        "Loaded replay script"
    );

    let lineage = Lineage::new(
        script.initial_graph()?,
        Calculus::new(config),
        HistoryConfig::default(),
    );
    for (index, transformation) in script.transformations()?.iter().enumerate() {
        let commit = lineage.apply_to_head(transformation).map_err(|e| {
            error!(step = index, rule = %transformation.rule(), error = %e, "Replay step failed");
            e
        })?;
        info!(
            step = index,
            version = commit.version,
            rule = %transformation.rule(),
            created = commit.created.len(),
            removed = commit.removed.len(),
            "Step applied"
        );
    }

    let (_, graph) = lineage.current();
    Ok(interchange::to_json(&graph)?)
}

fn main() -> ExitCode {
    init_tracing();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: egi_replay <script.json>");
        return ExitCode::from(2);
    };

    match run(&path) {
        Ok(document) => {
            println!("{document}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, path = %path, "Replay failed");
            ExitCode::FAILURE
        }
    }
}
