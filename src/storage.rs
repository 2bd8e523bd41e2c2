//! Fixture and report persistence.
//!
//! Loads historical match fixtures from a JSON file and writes simulation
//! reports back out as JSON. The engine itself never touches the
//! filesystem; these helpers exist for the binary and for research
//! scripts.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::SimulationResult;
use crate::types::Match;

/// Load a match list from a JSON file and sort it by kickoff, upholding
/// the engine's non-decreasing-kickoff input contract regardless of how
/// the file was produced.
pub fn load_matches(path: &str) -> Result<Vec<Match>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures from {path}"))?;

    let mut matches: Vec<Match> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse fixtures from {path}"))?;

    matches.sort_by_key(|m| m.kickoff);

    info!(path, count = matches.len(), "Fixtures loaded");
    Ok(matches)
}

/// Write a simulation report to a JSON file.
pub fn save_report(result: &SimulationResult, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(result)
        .context("Failed to serialise simulation report")?;

    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write report to {path}"))?;

    debug!(path, final_bankroll = %result.final_bankroll, "Report saved");
    Ok(())
}

/// Whether a fixtures file exists at the given path.
pub fn fixtures_exist(path: &str) -> bool {
    Path::new(path).exists()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{SimulationRequest, StakingMethod, StrategyType};
    use crate::types::Outcome;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn temp_path(name: &str) -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("oddsim_test_{}_{}.json", name, uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    fn sample_matches() -> Vec<Match> {
        let mut early = Match::sample("A", "B", Outcome::Home);
        let mut late = Match::sample("C", "D", Outcome::Away);
        late.kickoff = early.kickoff + Duration::days(2);
        early.home_goals = 1;
        vec![early, late]
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_path("fixtures");
        let matches = sample_matches();
        std::fs::write(&path, serde_json::to_string(&matches).unwrap()).unwrap();

        let loaded = load_matches(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].home_team, "A");
        assert_eq!(loaded[0].home_goals, 1);
        assert_eq!(loaded[1].away_team, "D");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_sorts_by_kickoff() {
        let path = temp_path("unsorted");
        let mut matches = sample_matches();
        matches.reverse(); // file stores the later match first
        std::fs::write(&path, serde_json::to_string(&matches).unwrap()).unwrap();

        let loaded = load_matches(&path).unwrap();
        assert!(loaded[0].kickoff < loaded[1].kickoff);
        assert_eq!(loaded[0].home_team, "A");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(load_matches("/tmp/oddsim_does_not_exist_xyz.json").is_err());
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let path = temp_path("malformed");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(load_matches(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_report() {
        let request = SimulationRequest {
            league: "Test League".to_string(),
            season: "2025".to_string(),
            strategy_type: StrategyType::Home,
            selection: None,
            rule_expression: None,
            staking_method: StakingMethod::Fixed,
            fixed_stake: Some(dec!(100)),
            percent_stake: None,
            kelly_fraction: None,
            starting_bankroll: dec!(1000),
            multiple_legs: 1,
            min_odds: None,
            min_edge: None,
        };
        let result = crate::engine::simulate(&sample_matches(), &request).unwrap();

        let path = temp_path("report");
        save_report(&result, &path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("final_bankroll").is_some());
        assert!(parsed.get("total_bets").is_some());
        assert!(parsed.get("bets").is_some());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_fixtures_exist() {
        assert!(!fixtures_exist("/tmp/oddsim_definitely_missing.json"));
        let path = temp_path("exists");
        std::fs::write(&path, "[]").unwrap();
        assert!(fixtures_exist(&path));
        std::fs::remove_file(&path).unwrap();
    }
}
