//! Bet settlement and drawdown accounting.
//!
//! Settlement resolves matured bets against the true results: a bet wins
//! only if every leg's selection matched, winnings are credited gross, and
//! the team locks the bet held are released. Drawdown is observed only at
//! settlement points — placement converts cash to open exposure, it does
//! not move equity.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{Bet, SettledBet};

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Settle every active bet whose `settles_at` has been reached (or all of
/// them when `settle_all` is set, for end-of-run cleanup). Credits the
/// bankroll, releases team locks, and returns the settled bets in the order
/// they were held.
pub fn settle_matured(
    active: &mut Vec<Bet>,
    now: DateTime<Utc>,
    bankroll: &mut Decimal,
    team_locks: &mut HashSet<String>,
    settle_all: bool,
) -> Vec<SettledBet> {
    let mut settled = Vec::new();

    active.retain_mut(|bet| {
        if !settle_all && bet.settles_at > now {
            return true;
        }

        let is_win = bet.is_win();
        let return_amount = if is_win { bet.potential_return() } else { Decimal::ZERO };
        let profit = return_amount - bet.stake;
        *bankroll += return_amount;

        for team in bet.teams() {
            team_locks.remove(team);
        }

        debug!(
            legs = bet.legs.len(),
            is_win,
            stake = %bet.stake,
            %return_amount,
            bankroll = %bankroll,
            "Bet settled"
        );

        settled.push(SettledBet {
            legs: std::mem::take(&mut bet.legs),
            stake: bet.stake,
            combined_odds: bet.combined_odds,
            is_win,
            return_amount,
            profit,
            settled_at: bet.settles_at,
        });

        false
    });

    settled
}

// ---------------------------------------------------------------------------
// Drawdown
// ---------------------------------------------------------------------------

/// Running peak-to-trough tracker over the bankroll.
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    peak: Decimal,
    max_drawdown: Decimal,
}

impl DrawdownTracker {
    pub fn new(initial_bankroll: Decimal) -> Self {
        Self { peak: initial_bankroll, max_drawdown: Decimal::ZERO }
    }

    /// Observe the bankroll after a settlement pass.
    pub fn observe(&mut self, bankroll: Decimal) {
        if bankroll > self.peak {
            self.peak = bankroll;
        }
        if self.peak == Decimal::ZERO {
            return;
        }
        let drawdown = (self.peak - bankroll) / self.peak;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }

    /// Worst observed decline from peak, as a fraction.
    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
