//! Simulation request schema and up-front validation.
//!
//! A `SimulationRequest` fully describes one backtest run: which strategy
//! to use, how to stake, and the starting conditions. Validation happens
//! once, before the engine is built; a validated request can never fail a
//! run at runtime.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Outcome, SimError};

// ---------------------------------------------------------------------------
// Enumerated fields
// ---------------------------------------------------------------------------

/// Which strategy variant the run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    Home,
    Edge,
    Rules,
}

/// How stakes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakingMethod {
    Fixed,
    Percent,
    Kelly,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Configuration for a single simulation run.
///
/// `league` and `season` are selection criteria for the match source; the
/// engine itself does not read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub league: String,
    pub season: String,

    pub strategy_type: StrategyType,
    /// Required for `edge`; optional for `rules` (defaults to home).
    #[serde(default)]
    pub selection: Option<Outcome>,
    /// Required for `rules`; compiled when the strategy is built.
    #[serde(default)]
    pub rule_expression: Option<String>,

    pub staking_method: StakingMethod,
    #[serde(default)]
    pub fixed_stake: Option<Decimal>,
    /// Fraction of the current bankroll, in (0, 1].
    #[serde(default)]
    pub percent_stake: Option<Decimal>,
    /// Fractional Kelly multiplier, in (0, 1]. 0.5 = half Kelly.
    #[serde(default)]
    pub kelly_fraction: Option<Decimal>,

    pub starting_bankroll: Decimal,
    /// Parlay size; 1 = singles, 2 = doubles, etc.
    #[serde(default = "default_multiple_legs")]
    pub multiple_legs: usize,

    /// Per-leg odds filter, applied iff present. Must be > 1 when set.
    #[serde(default)]
    pub min_odds: Option<Decimal>,
    /// Edge-strategy threshold (strict comparison).
    #[serde(default)]
    pub min_edge: Option<Decimal>,
}

fn default_multiple_legs() -> usize {
    1
}

impl SimulationRequest {
    /// Check the cross-field rules that the schema alone cannot express.
    ///
    /// Rule expressions are only checked for presence here; compiling them
    /// (and rejecting unsafe ones) happens when the strategy is built.
    pub fn validate(&self) -> Result<(), SimError> {
        match self.strategy_type {
            StrategyType::Edge => {
                if self.selection.is_none() {
                    return Err(SimError::Validation(
                        "selection is required for strategy_type='edge'".into(),
                    ));
                }
                if self.min_edge.is_none() {
                    return Err(SimError::Validation(
                        "min_edge is required for strategy_type='edge'".into(),
                    ));
                }
            }
            StrategyType::Rules => {
                if self.rule_expression.is_none() {
                    return Err(SimError::Validation(
                        "rule_expression is required for strategy_type='rules'".into(),
                    ));
                }
            }
            StrategyType::Home => {}
        }

        match self.staking_method {
            StakingMethod::Fixed => {
                if self.fixed_stake.is_none() {
                    return Err(SimError::Validation(
                        "fixed_stake is required for staking_method='fixed'".into(),
                    ));
                }
            }
            StakingMethod::Percent => {
                let Some(pct) = self.percent_stake else {
                    return Err(SimError::Validation(
                        "percent_stake is required for staking_method='percent'".into(),
                    ));
                };
                if pct <= Decimal::ZERO || pct > Decimal::ONE {
                    return Err(SimError::Validation(
                        "percent_stake must be in (0, 1]".into(),
                    ));
                }
            }
            StakingMethod::Kelly => {
                let Some(fraction) = self.kelly_fraction else {
                    return Err(SimError::Validation(
                        "kelly_fraction is required for staking_method='kelly'".into(),
                    ));
                };
                if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
                    return Err(SimError::Validation(
                        "kelly_fraction must be in (0, 1]".into(),
                    ));
                }
            }
        }

        if self.starting_bankroll <= Decimal::ZERO {
            return Err(SimError::Validation("starting_bankroll must be > 0".into()));
        }
        if self.multiple_legs < 1 {
            return Err(SimError::Validation("multiple_legs must be >= 1".into()));
        }
        if let Some(min_odds) = self.min_odds {
            if min_odds <= Decimal::ONE {
                return Err(SimError::Validation(
                    "min_odds must be > 1 (decimal odds)".into(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// A valid fixed-stake always-home request, the baseline for variations.
    fn base_request() -> SimulationRequest {
        SimulationRequest {
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
        }
    }

    #[test]
    fn test_valid_base_request() {
        assert!(base_request().validate().is_ok());
    }

    #[test]
    fn test_edge_requires_selection_and_min_edge() {
        let mut req = base_request();
        req.strategy_type = StrategyType::Edge;
        assert!(req.validate().is_err());

        req.selection = Some(Outcome::Home);
        assert!(req.validate().is_err());

        req.min_edge = Some(dec!(0.05));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rules_requires_expression() {
        let mut req = base_request();
        req.strategy_type = StrategyType::Rules;
        assert!(req.validate().is_err());

        req.rule_expression = Some("home_points > away_points".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_fixed_requires_stake() {
        let mut req = base_request();
        req.fixed_stake = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_percent_stake_range() {
        let mut req = base_request();
        req.staking_method = StakingMethod::Percent;
        assert!(req.validate().is_err()); // missing

        req.percent_stake = Some(dec!(0.05));
        assert!(req.validate().is_ok());

        req.percent_stake = Some(Decimal::ZERO);
        assert!(req.validate().is_err());

        req.percent_stake = Some(dec!(1.0));
        assert!(req.validate().is_ok()); // inclusive upper bound

        req.percent_stake = Some(dec!(1.01));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_kelly_fraction_range() {
        let mut req = base_request();
        req.staking_method = StakingMethod::Kelly;
        assert!(req.validate().is_err()); // missing

        req.kelly_fraction = Some(dec!(0.5));
        assert!(req.validate().is_ok());

        req.kelly_fraction = Some(dec!(-0.5));
        assert!(req.validate().is_err());

        req.kelly_fraction = Some(dec!(2));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_bankroll_must_be_positive() {
        let mut req = base_request();
        req.starting_bankroll = Decimal::ZERO;
        assert!(req.validate().is_err());

        req.starting_bankroll = dec!(-100);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_multiple_legs_minimum() {
        let mut req = base_request();
        req.multiple_legs = 0;
        assert!(req.validate().is_err());

        req.multiple_legs = 2;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_min_odds_must_exceed_one() {
        let mut req = base_request();
        req.min_odds = Some(dec!(1.0));
        assert!(req.validate().is_err());

        req.min_odds = Some(dec!(1.01));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_deserializes_from_json() {
        let req: SimulationRequest = serde_json::from_str(
            r#"{
                "league": "Premier-League",
                "season": "2526",
                "strategy_type": "edge",
                "selection": "H",
                "staking_method": "kelly",
                "kelly_fraction": 0.5,
                "starting_bankroll": 1000,
                "multiple_legs": 2,
                "min_edge": 0.05
            }"#,
        )
        .unwrap();

        assert_eq!(req.strategy_type, StrategyType::Edge);
        assert_eq!(req.selection, Some(Outcome::Home));
        assert_eq!(req.staking_method, StakingMethod::Kelly);
        assert_eq!(req.multiple_legs, 2);
        assert!(req.min_odds.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validation_error_names_field() {
        let mut req = base_request();
        req.starting_bankroll = Decimal::ZERO;
        let err = req.validate().unwrap_err();
        assert!(format!("{err}").contains("starting_bankroll"));
    }
}
