//! Strategy layer — decides, per match, whether to back an outcome.
//!
//! A strategy is a tagged variant rather than a trait object: the three
//! variants are known at compile time and dispatch is a match inside
//! `evaluate`. Rule strategies carry their expression pre-compiled, so an
//! unsafe or malformed rule fails at construction, never mid-run.

pub mod expr;
pub mod staking;

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use tracing::debug;

use crate::context::RollingContext;
use crate::request::{SimulationRequest, StrategyType};
use crate::types::{Decision, Match, Outcome, SimError};

use self::expr::{CompiledRule, Value};

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A betting strategy: home-banker baseline, model-edge filter, or a
/// user-authored rule expression.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Backs the home side on every match. Baseline / smoke-test strategy.
    AlwaysHome,
    /// Backs `selection` when the model's probability beats the odds-implied
    /// probability by strictly more than `min_edge`.
    Edge { selection: Outcome, min_edge: Decimal },
    /// Backs `selection` when the compiled rule evaluates truthy against
    /// the match's form features.
    Rule { program: CompiledRule, selection: Outcome },
}

impl Strategy {
    /// Build the strategy a validated request asks for. Compiles the rule
    /// expression for `rules`, surfacing `SimError::UnsafeExpression`.
    pub fn from_request(request: &SimulationRequest) -> Result<Self, SimError> {
        match request.strategy_type {
            StrategyType::Home => Ok(Strategy::AlwaysHome),
            StrategyType::Edge => {
                let selection = request.selection.ok_or_else(|| {
                    SimError::Validation("selection is required for strategy_type='edge'".into())
                })?;
                let min_edge = request.min_edge.ok_or_else(|| {
                    SimError::Validation("min_edge is required for strategy_type='edge'".into())
                })?;
                Ok(Strategy::Edge { selection, min_edge })
            }
            StrategyType::Rules => {
                let expression = request.rule_expression.as_deref().ok_or_else(|| {
                    SimError::Validation(
                        "rule_expression is required for strategy_type='rules'".into(),
                    )
                })?;
                let program = expr::compile(expression)?;
                Ok(Strategy::Rule {
                    program,
                    selection: request.selection.unwrap_or(Outcome::Home),
                })
            }
        }
    }

    /// Decide whether to bet on this match given the form context.
    pub fn evaluate(&self, m: &Match, context: &RollingContext) -> Decision {
        match self {
            Strategy::AlwaysHome => Decision::bet(Outcome::Home),
            Strategy::Edge { selection, min_edge } => {
                evaluate_edge(m, *selection, *min_edge)
            }
            Strategy::Rule { program, selection } => {
                evaluate_rule(m, context, program, *selection)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Edge strategy
// ---------------------------------------------------------------------------

fn evaluate_edge(m: &Match, selection: Outcome, min_edge: Decimal) -> Decision {
    let odds = m.odds_for(selection);
    let Some(model_prob) = m.model_prob_for(selection) else {
        return Decision::no_bet();
    };
    if odds <= Decimal::ZERO {
        return Decision::no_bet();
    }

    let implied = Decimal::ONE / odds;
    let edge = model_prob - implied;

    // Strictly above the threshold, not at it.
    if edge > min_edge {
        debug!(
            match_id = %m.id,
            %selection,
            edge = %edge.round_dp(4),
            %min_edge,
            "Edge detected"
        );
        Decision::bet(selection)
    } else {
        Decision::no_bet()
    }
}

// ---------------------------------------------------------------------------
// Rule strategy
// ---------------------------------------------------------------------------

/// Build the rule's variable environment: every *present* form feature plus
/// the match aliases. Absent features are left unbound, so a rule that
/// touches one fails at evaluation and the strategy declines.
fn rule_env(m: &Match, context: &RollingContext) -> HashMap<String, Value> {
    let features = context.features_for_match(m);
    let mut env = HashMap::new();

    let mut bind_num = |name: &str, value: Option<f64>| {
        if let Some(v) = value {
            env.insert(name.to_string(), Value::Num(v));
        }
    };

    bind_num("home_win_rate", features.home_win_rate.and_then(|d| d.to_f64()));
    bind_num("away_win_rate", features.away_win_rate.and_then(|d| d.to_f64()));
    bind_num("home_points", features.home_points.map(f64::from));
    bind_num("away_points", features.away_points.map(f64::from));
    bind_num("home_goal_diff", features.home_goal_diff.map(|v| v as f64));
    bind_num("away_goal_diff", features.away_goal_diff.map(|v| v as f64));
    bind_num("points_diff", features.points_diff.map(f64::from));
    bind_num("goal_diff_diff", features.goal_diff_diff.map(|v| v as f64));

    bind_num("home_goals", Some(f64::from(m.home_goals)));
    bind_num("away_goals", Some(f64::from(m.away_goals)));
    bind_num("home_win_odds", m.home_win_odds.to_f64());
    bind_num("draw_odds", m.draw_odds.to_f64());
    bind_num("away_win_odds", m.away_win_odds.to_f64());

    env.insert("home_team".to_string(), Value::Str(m.home_team.clone()));
    env.insert("away_team".to_string(), Value::Str(m.away_team.clone()));

    env
}

fn evaluate_rule(
    m: &Match,
    context: &RollingContext,
    program: &CompiledRule,
    selection: Outcome,
) -> Decision {
    let env = rule_env(m, context);

    // Any runtime failure (typically an absent feature) means "no bet".
    match program.eval_truthy(&env) {
        Ok(true) => Decision::bet(selection),
        Ok(false) => Decision::no_bet(),
        Err(err) => {
            debug!(
                match_id = %m.id,
                rule = program.source(),
                error = %err,
                "Rule evaluation failed — declining"
            );
            Decision::no_bet()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
