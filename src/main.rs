//! oddsim — deterministic sports-betting backtesting engine.
//!
//! Entry point. Loads the scenario configuration, initialises structured
//! logging, replays the configured season, and logs the headline metrics
//! (optionally writing the full report to disk).

use anyhow::{bail, Result};
use tracing::info;

use oddsim::config::AppConfig;
use oddsim::engine::simulate;
use oddsim::storage;

const BANNER: &str = r#"
  ___  ____  ____  ____ ___ __  __
 / _ \|  _ \|  _ \/ ___|_ _|  \/  |
| | | | | | | | | \___ \| || |\/| |
| |_| | |_| | |_| |___) | || |  | |
 \___/|____/|____/|____/___|_|  |_|

  Deterministic sports-betting backtester
"#;

fn main() -> Result<()> {
    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        scenario = %cfg.scenario.name,
        fixtures_file = %cfg.scenario.fixtures_file,
        strategy = ?cfg.request.strategy_type,
        staking = ?cfg.request.staking_method,
        starting_bankroll = %cfg.request.starting_bankroll,
        multiple_legs = cfg.request.multiple_legs,
        "Scenario loaded"
    );

    if !storage::fixtures_exist(&cfg.scenario.fixtures_file) {
        bail!("Fixtures file not found: {}", cfg.scenario.fixtures_file);
    }
    let matches = storage::load_matches(&cfg.scenario.fixtures_file)?;

    let result = simulate(&matches, &cfg.request)?;

    info!(
        final_bankroll = %result.final_bankroll,
        roi_percent = %result.metrics.roi_percent,
        total_bets = result.metrics.total_bets,
        total_wins = result.metrics.total_wins,
        total_losses = result.metrics.total_losses,
        strike_rate_percent = %result.metrics.strike_rate_percent,
        max_drawdown_percent = %result.max_drawdown_percent,
        longest_win_streak = result.metrics.longest_win_streak,
        longest_loss_streak = result.metrics.longest_loss_streak,
        "Simulation finished"
    );

    if let Some(report_file) = &cfg.scenario.report_file {
        storage::save_report(&result, report_file)?;
        info!(path = %report_file, "Report written");
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// - In development (RUST_LOG set), uses human-readable format.
/// - With ODDSIM_LOG_JSON set, uses structured JSON logging to stdout.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oddsim=info"));

    let json_logging = std::env::var("ODDSIM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
