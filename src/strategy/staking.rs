//! Stake sizing.
//!
//! Computes the stake for a priced combination under the request's staking
//! method: flat stakes, a fixed percentage of the current bankroll, or
//! fractional Kelly against the model's combined win probability. Returns
//! `None` whenever no stake is defined; the engine treats that as "do not
//! place".

use rust_decimal::Decimal;
use tracing::debug;

use crate::request::{SimulationRequest, StakingMethod};

// ---------------------------------------------------------------------------
// Stake policy
// ---------------------------------------------------------------------------

/// Staking method with its parameter resolved from a validated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakePolicy {
    /// The same amount on every bet.
    Fixed(Decimal),
    /// A fraction of the bankroll at placement time.
    Percent(Decimal),
    /// Fractional Kelly: the optimal bankroll fraction scaled down by a
    /// multiplier in (0, 1].
    Kelly(Decimal),
}

impl StakePolicy {
    /// Resolve the policy from a validated request. The validator has
    /// already guaranteed the matching parameter is present and in range.
    pub fn from_request(request: &SimulationRequest) -> Self {
        match request.staking_method {
            StakingMethod::Fixed => {
                StakePolicy::Fixed(request.fixed_stake.unwrap_or(Decimal::ZERO))
            }
            StakingMethod::Percent => {
                StakePolicy::Percent(request.percent_stake.unwrap_or(Decimal::ZERO))
            }
            StakingMethod::Kelly => {
                StakePolicy::Kelly(request.kelly_fraction.unwrap_or(Decimal::ZERO))
            }
        }
    }

    /// Whether this policy needs model probabilities at pricing time.
    pub fn needs_model_prob(&self) -> bool {
        matches!(self, StakePolicy::Kelly(_))
    }

    /// Size a stake for a priced combination.
    ///
    /// Kelly formula: f* = (b·p − (1−p)) / b with b = combined_odds − 1.
    /// Returns None when the stake is undefined: Kelly without a combined
    /// probability, no payout (b ≤ 0), or a non-positive Kelly fraction.
    pub fn stake(
        &self,
        bankroll: Decimal,
        combined_odds: Decimal,
        combined_prob: Option<Decimal>,
    ) -> Option<Decimal> {
        match self {
            StakePolicy::Fixed(amount) => Some(*amount),
            StakePolicy::Percent(pct) => Some(bankroll * pct),
            StakePolicy::Kelly(multiplier) => {
                let p = combined_prob?;

                let b = combined_odds - Decimal::ONE;
                if b <= Decimal::ZERO {
                    debug!(%combined_odds, "No payout at these odds — no stake");
                    return None;
                }

                let f = (b * p - (Decimal::ONE - p)) / b;
                if f <= Decimal::ZERO {
                    debug!(%f, %p, %combined_odds, "Negative Kelly — no stake");
                    return None;
                }

                Some(bankroll * f * multiplier)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
