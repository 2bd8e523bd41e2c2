//! Shared types for the backtesting engine.
//!
//! These types form the data model used across all modules: the immutable
//! match record, bet lifecycle types, and the domain error enum. They are
//! designed to be stable so that context, strategy, and engine modules can
//! depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[cfg(test)]
use rust_decimal_macros::dec;

/// Convert an f64 to Decimal at API boundaries.
/// Returns Decimal::ZERO for NaN/Infinity.
pub fn d(val: f64) -> Decimal {
    Decimal::from_f64_retain(val).unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Full-time result and bet selection: home win, draw, or away win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "H")]
    Home,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "A")]
    Away,
}

impl Outcome {
    /// All outcomes, in market-display order.
    pub const ALL: &'static [Outcome] = &[Outcome::Home, Outcome::Draw, Outcome::Away];
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Home => write!(f, "H"),
            Outcome::Draw => write!(f, "D"),
            Outcome::Away => write!(f, "A"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" | "h" => Ok(Outcome::Home),
            "D" | "d" => Ok(Outcome::Draw),
            "A" | "a" => Ok(Outcome::Away),
            _ => Err(anyhow::anyhow!("Unknown outcome: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A completed historical match with closing odds and optional model
/// probabilities. Immutable once loaded; identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub league: String,
    pub season: String,
    /// Kickoff time — the monotone key the engine walks. Ties allowed.
    pub kickoff: DateTime<Utc>,

    pub home_team: String,
    pub away_team: String,

    pub home_goals: u32,
    pub away_goals: u32,
    /// Full-time result. Consistency with the goals is an input invariant.
    pub result: Outcome,

    /// Decimal (European) odds per outcome.
    pub home_win_odds: Decimal,
    pub draw_odds: Decimal,
    pub away_win_odds: Decimal,

    /// Per-outcome model probabilities. Independent point estimates; the
    /// triple need not sum to 1.
    pub model_home_prob: Option<Decimal>,
    pub model_draw_prob: Option<Decimal>,
    pub model_away_prob: Option<Decimal>,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} v {} ({}-{} {}) H={} D={} A={}",
            self.kickoff.format("%Y-%m-%d %H:%M"),
            self.league,
            self.home_team,
            self.away_team,
            self.home_goals,
            self.away_goals,
            self.result,
            self.home_win_odds,
            self.draw_odds,
            self.away_win_odds,
        )
    }
}

impl Match {
    /// Decimal odds for the given outcome.
    pub fn odds_for(&self, outcome: Outcome) -> Decimal {
        match outcome {
            Outcome::Home => self.home_win_odds,
            Outcome::Draw => self.draw_odds,
            Outcome::Away => self.away_win_odds,
        }
    }

    /// Model probability for the given outcome, when the model supplied one.
    pub fn model_prob_for(&self, outcome: Outcome) -> Option<Decimal> {
        match outcome {
            Outcome::Home => self.model_home_prob,
            Outcome::Draw => self.model_draw_prob,
            Outcome::Away => self.model_away_prob,
        }
    }

    /// Whether the given team played in this match.
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// The winning team name, or None for a draw.
    pub fn winner(&self) -> Option<&str> {
        match self.result {
            Outcome::Home => Some(&self.home_team),
            Outcome::Away => Some(&self.away_team),
            Outcome::Draw => None,
        }
    }

    /// Helper to build a test match with sensible defaults.
    #[cfg(test)]
    pub fn sample(home: &str, away: &str, result: Outcome) -> Self {
        Match {
            id: Uuid::new_v4(),
            league: "Test League".to_string(),
            season: "2025".to_string(),
            kickoff: DateTime::parse_from_rfc3339("2025-01-01T15:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: 2,
            away_goals: 0,
            result,
            home_win_odds: dec!(2.0),
            draw_odds: dec!(3.5),
            away_win_odds: dec!(4.0),
            model_home_prob: None,
            model_draw_prob: None,
            model_away_prob: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy decision
// ---------------------------------------------------------------------------

/// What a strategy wants to do with a single match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub place_bet: bool,
    /// Required iff `place_bet`.
    pub selection: Option<Outcome>,
}

impl Decision {
    /// Bet on the given outcome.
    pub fn bet(selection: Outcome) -> Self {
        Decision { place_bet: true, selection: Some(selection) }
    }

    /// Decline this match.
    pub fn no_bet() -> Self {
        Decision { place_bet: false, selection: None }
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// One match + selection within a bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetLeg {
    #[serde(rename = "match")]
    pub fixture: Match,
    pub selection: Outcome,
}

impl BetLeg {
    /// Whether this leg's selection matched the full-time result.
    pub fn is_win(&self) -> bool {
        self.fixture.result == self.selection
    }

    /// The decimal odds backing this leg.
    pub fn odds(&self) -> Decimal {
        self.fixture.odds_for(self.selection)
    }
}

/// An open (unsettled) bet. Single when it has one leg, an accumulator
/// otherwise. Mutated only by settlement, which consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub legs: Vec<BetLeg>,
    pub stake: Decimal,
    /// Product of per-leg decimal odds.
    pub combined_odds: Decimal,
    /// Latest leg kickoff — the bet matures once the clock passes this.
    pub settles_at: DateTime<Utc>,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legs: Vec<String> = self
            .legs
            .iter()
            .map(|l| format!("{} v {} ({})", l.fixture.home_team, l.fixture.away_team, l.selection))
            .collect();
        write!(
            f,
            "{} leg(s) [{}] stake={:.2} odds={:.2}",
            self.legs.len(),
            legs.join(", "),
            self.stake,
            self.combined_odds,
        )
    }
}

impl Bet {
    /// A bet wins only if every leg wins.
    pub fn is_win(&self) -> bool {
        self.legs.iter().all(BetLeg::is_win)
    }

    /// Gross return if the bet wins (stake included).
    pub fn potential_return(&self) -> Decimal {
        self.stake * self.combined_odds
    }

    /// All team names across the legs, home and away interleaved.
    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.legs
            .iter()
            .flat_map(|l| [l.fixture.home_team.as_str(), l.fixture.away_team.as_str()])
    }
}

/// A bet resolved against the true results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledBet {
    pub legs: Vec<BetLeg>,
    pub stake: Decimal,
    pub combined_odds: Decimal,
    pub is_win: bool,
    /// Gross credit back to the bankroll (0 on a loss).
    pub return_amount: Decimal,
    /// `return_amount - stake`; negative on a loss.
    pub profit: Decimal,
    pub settled_at: DateTime<Utc>,
}

impl fmt::Display for SettledBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} leg(s) stake={:.2} odds={:.2} profit={:+.2}",
            if self.is_win { "WON" } else { "LOST" },
            self.legs.len(),
            self.stake,
            self.combined_odds,
            self.profit,
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Domain-specific error types for the engine.
///
/// Both variants surface at construction time: a run over a validated
/// request never fails (data-edge conditions skip the bet, not the run).
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Invalid simulation request: {0}")]
    Validation(String),

    #[error("Unsafe rule expression: {0}")]
    UnsafeExpression(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
