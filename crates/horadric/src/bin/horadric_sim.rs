//! # Scenario Runner
//!
//! Replays a scenario against the simulated game and logs every decision.
//!
//! ```text
//! horadric_sim [SCENARIO.toml] [RULES.toml] [VISITS]
//! ```
//!
//! Without arguments the bundled gem ladder scenario runs once.
//! Set `RUST_LOG=debug` to see classifier and resolver decisions.

use std::process::ExitCode;

use horadric::{run_scenario, DEMO_RULES, DEMO_SCENARIO};
use tracing::{error, info};

fn read_or(path: Option<&String>, fallback: &str) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("read {path}: {e}")),
        None => Ok(fallback.to_string()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let inputs = read_or(args.first(), DEMO_SCENARIO).and_then(|s| Ok((s, read_or(args.get(1), DEMO_RULES)?)));
    let (scenario, rules) = match inputs {
        Ok(inputs) => inputs,
        Err(e) => {
            error!(error = %e, "cannot read inputs");
            return ExitCode::FAILURE;
        }
    };
    let visits = args.get(2).and_then(|v| v.parse().ok()).unwrap_or(1);

    match run_scenario(&scenario, &rules, visits) {
        Ok(outcome) => {
            if let Some(cube) = &outcome.report.cube {
                info!(crafted = ?cube.crafted, failed = ?cube.failed, "cube summary");
            }
            if let Some(mule) = &outcome.report.switch_to {
                info!(mule = %mule, "switch to mule requested");
            }
            info!(
                actions = outcome.game.log().len(),
                notifications = outcome.notifications,
                "scenario finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "scenario failed");
            ExitCode::FAILURE
        }
    }
}
