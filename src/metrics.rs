//! Aggregate performance metrics.
//!
//! A pure function over the settled-bet log. All percentage and money
//! figures are rounded to 2 decimal places here, at the boundary; the
//! engine's internal accounting stays unrounded.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::types::SettledBet;

/// Headline performance figures for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub total_bets: usize,
    pub total_wins: usize,
    pub total_losses: usize,
    pub strike_rate_percent: Decimal,
    pub total_staked: Decimal,
    pub total_profit: Decimal,
    pub average_odds: Decimal,
    pub longest_win_streak: u32,
    pub longest_loss_streak: u32,
    pub roi_percent: Decimal,
}

/// Aggregate a run's settled bets. An empty log produces all zeros rather
/// than dividing by anything.
pub fn calculate_metrics(
    settled_bets: &[SettledBet],
    starting_bankroll: Decimal,
    final_bankroll: Decimal,
) -> Metrics {
    let total_bets = settled_bets.len();
    let total_wins = settled_bets.iter().filter(|b| b.is_win).count();
    let total_losses = total_bets - total_wins;

    let total_staked: Decimal = settled_bets.iter().map(|b| b.stake).sum();
    let total_profit: Decimal = settled_bets.iter().map(|b| b.profit).sum();

    let strike_rate = if total_bets > 0 {
        Decimal::from(total_wins) / Decimal::from(total_bets) * dec!(100)
    } else {
        Decimal::ZERO
    };

    let average_odds = if total_bets > 0 {
        settled_bets.iter().map(|b| b.combined_odds).sum::<Decimal>() / Decimal::from(total_bets)
    } else {
        Decimal::ZERO
    };

    let roi = if starting_bankroll > Decimal::ZERO {
        (final_bankroll - starting_bankroll) / starting_bankroll * dec!(100)
    } else {
        Decimal::ZERO
    };

    // Streaks: single pass in settlement order; a win resets the loss
    // counter and vice versa.
    let mut longest_win_streak = 0u32;
    let mut longest_loss_streak = 0u32;
    let mut current_wins = 0u32;
    let mut current_losses = 0u32;
    for bet in settled_bets {
        if bet.is_win {
            current_wins += 1;
            current_losses = 0;
        } else {
            current_losses += 1;
            current_wins = 0;
        }
        longest_win_streak = longest_win_streak.max(current_wins);
        longest_loss_streak = longest_loss_streak.max(current_losses);
    }

    Metrics {
        total_bets,
        total_wins,
        total_losses,
        strike_rate_percent: strike_rate.round_dp(2),
        total_staked: total_staked.round_dp(2),
        total_profit: total_profit.round_dp(2),
        average_odds: average_odds.round_dp(2),
        longest_win_streak,
        longest_loss_streak,
        roi_percent: roi.round_dp(2),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
