//! Parameter sweep driver.
//!
//! Runs one fixture set through a list of request variants and collects
//! the headline numbers per variant. Every run is an independent engine
//! instance with its own state, so variants could be dispatched in
//! parallel by a caller; this driver keeps the simple sequential shape.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::engine::simulate;
use crate::request::SimulationRequest;
use crate::types::{Match, SimError};

/// Result row for one swept variant.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    /// Caller-supplied label for the variant (e.g. "min_edge=0.05").
    pub label: String,
    pub final_bankroll: Decimal,
    pub roi_percent: Decimal,
    pub total_bets: usize,
}

/// A set of labelled request variants to run over one fixture list.
pub struct ParameterSweep<'a> {
    matches: &'a [Match],
    variants: Vec<(String, SimulationRequest)>,
}

impl<'a> ParameterSweep<'a> {
    pub fn new(matches: &'a [Match]) -> Self {
        Self { matches, variants: Vec::new() }
    }

    /// Add a labelled variant.
    pub fn variant(mut self, label: impl Into<String>, request: SimulationRequest) -> Self {
        self.variants.push((label.into(), request));
        self
    }

    /// Add variants derived from a base request, one per parameter value.
    pub fn grid<T: std::fmt::Display>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = T>,
        base: &SimulationRequest,
        apply: impl Fn(&mut SimulationRequest, &T),
    ) -> Self {
        for value in values {
            let mut request = base.clone();
            apply(&mut request, &value);
            self.variants.push((format!("{name}={value}"), request));
        }
        self
    }

    /// Run every variant. Fails fast on the first invalid request — a bad
    /// grid is a configuration error, not a data edge.
    pub fn run(self) -> Result<Vec<SweepOutcome>, SimError> {
        let mut outcomes = Vec::with_capacity(self.variants.len());

        for (label, request) in &self.variants {
            let result = simulate(self.matches, request)?;
            info!(
                label,
                roi = %result.metrics.roi_percent,
                bets = result.metrics.total_bets,
                final_bankroll = %result.final_bankroll,
                "Sweep variant finished"
            );
            outcomes.push(SweepOutcome {
                label: label.clone(),
                final_bankroll: result.final_bankroll,
                roi_percent: result.metrics.roi_percent,
                total_bets: result.metrics.total_bets,
            });
        }

        Ok(outcomes)
    }

    /// Run every variant and sort best ROI first.
    pub fn rank_by_roi(self) -> Result<Vec<SweepOutcome>, SimError> {
        let mut outcomes = self.run()?;
        outcomes.sort_by(|a, b| b.roi_percent.cmp(&a.roi_percent));
        Ok(outcomes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{StakingMethod, StrategyType};
    use crate::types::Outcome;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn edge_request(min_edge: Decimal) -> SimulationRequest {
        SimulationRequest {
            league: "Test League".to_string(),
            season: "2025".to_string(),
            strategy_type: StrategyType::Edge,
            selection: Some(Outcome::Home),
            rule_expression: None,
            staking_method: StakingMethod::Fixed,
            fixed_stake: Some(dec!(100)),
            percent_stake: None,
            kelly_fraction: None,
            starting_bankroll: dec!(1000),
            multiple_legs: 1,
            min_odds: None,
            min_edge: Some(min_edge),
        }
    }

    fn matches_with_edge() -> Vec<Match> {
        // Odds 2.0, model 0.6: the edge is exactly 0.1.
        (0..3)
            .map(|i| {
                let mut m = Match::sample(&format!("H{i}"), &format!("A{i}"), Outcome::Home);
                m.kickoff += Duration::days(i);
                m.model_home_prob = Some(dec!(0.6));
                m
            })
            .collect()
    }

    #[test]
    fn test_grid_sweeps_min_edge() {
        let matches = matches_with_edge();
        let base = edge_request(Decimal::ZERO);

        let outcomes = ParameterSweep::new(&matches)
            .grid("min_edge", [dec!(0.05), dec!(0.15)], &base, |req, v| {
                req.min_edge = Some(*v)
            })
            .run()
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].label, "min_edge=0.05");
        assert_eq!(outcomes[0].total_bets, 3); // edge 0.1 > 0.05
        assert_eq!(outcomes[1].total_bets, 0); // edge 0.1 < 0.15
    }

    #[test]
    fn test_rank_by_roi_sorts_descending() {
        let matches = matches_with_edge();

        let ranked = ParameterSweep::new(&matches)
            .variant("blocked", edge_request(dec!(0.15)))
            .variant("betting", edge_request(dec!(0.05)))
            .rank_by_roi()
            .unwrap();

        // All home wins at 2.0: betting beats sitting out.
        assert_eq!(ranked[0].label, "betting");
        assert!(ranked[0].roi_percent > ranked[1].roi_percent);
    }

    #[test]
    fn test_invalid_variant_fails_fast() {
        let matches = matches_with_edge();
        let mut bad = edge_request(dec!(0.05));
        bad.starting_bankroll = Decimal::ZERO;

        let result = ParameterSweep::new(&matches)
            .variant("bad", bad)
            .run();
        assert!(matches!(result, Err(SimError::Validation(_))));
    }

    #[test]
    fn test_empty_sweep() {
        let matches = matches_with_edge();
        let outcomes = ParameterSweep::new(&matches).run().unwrap();
        assert!(outcomes.is_empty());
    }
}
