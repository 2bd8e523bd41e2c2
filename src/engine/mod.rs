//! Simulation engine — replays a season as it would have unfolded.
//!
//! Matches arrive in kickoff order and are processed in batches sharing a
//! kickoff. Each batch settles matured bets first, then asks the strategy
//! about every match whose teams are free, builds at most one bet (single
//! or accumulator) from the eligible selections, and finally feeds the
//! batch into the rolling context so later matches can see it as form.
//!
//! One run is a pure function of `(matches, request, strategy)`: the engine
//! owns all of its state, touches no I/O, and two runs over identical
//! inputs produce identical output.

pub mod settlement;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::context::RollingContext;
use crate::metrics::{calculate_metrics, Metrics};
use crate::request::SimulationRequest;
use crate::strategy::staking::StakePolicy;
use crate::strategy::Strategy;
use crate::types::{Bet, BetLeg, Match, Outcome, SettledBet, SimError};

use self::settlement::{settle_matured, DrawdownTracker};

// ---------------------------------------------------------------------------
// Result schema
// ---------------------------------------------------------------------------

/// Everything a run produces: the settled-bet log (in settlement order)
/// plus aggregate performance. Decimals are rounded to 2 places.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub bets: Vec<SettledBet>,
    pub final_bankroll: Decimal,
    pub max_drawdown_percent: Decimal,
    #[serde(flatten)]
    pub metrics: Metrics,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One replay over a season. Owns its bankroll, open bets, team locks,
/// settled log, and form context exclusively; nothing survives the run.
pub struct SimulationEngine {
    request: SimulationRequest,
    strategy: Strategy,
    staking: StakePolicy,

    context: RollingContext,
    bankroll: Decimal,
    active_bets: Vec<Bet>,
    settled_bets: Vec<SettledBet>,
    team_locks: HashSet<String>,
    drawdown: DrawdownTracker,
}

impl SimulationEngine {
    /// Build an engine for a validated request and a constructed strategy.
    pub fn new(request: SimulationRequest, strategy: Strategy) -> Self {
        let bankroll = request.starting_bankroll;
        let staking = StakePolicy::from_request(&request);
        Self {
            request,
            strategy,
            staking,
            context: RollingContext::default(),
            bankroll,
            active_bets: Vec::new(),
            settled_bets: Vec::new(),
            team_locks: HashSet::new(),
            drawdown: DrawdownTracker::new(bankroll),
        }
    }

    /// Replay the season. `matches` must be in non-decreasing kickoff
    /// order; ties form a batch and are processed together.
    pub fn run(mut self, matches: &[Match]) -> SimulationResult {
        let mut start = 0;
        while start < matches.len() {
            let kickoff = matches[start].kickoff;
            let mut end = start + 1;
            while end < matches.len() && matches[end].kickoff == kickoff {
                end += 1;
            }

            self.settle_at(kickoff, false);
            self.process_batch(&matches[start..end]);
            start = end;
        }

        // Force-settle whatever is still open so the log is complete and
        // the final bankroll includes all winnings.
        if let Some(last) = matches.last() {
            self.settle_at(last.kickoff, true);
        }

        let metrics = calculate_metrics(
            &self.settled_bets,
            self.request.starting_bankroll,
            self.bankroll,
        );

        SimulationResult {
            bets: self.settled_bets,
            final_bankroll: self.bankroll.round_dp(2),
            max_drawdown_percent: (self.drawdown.max_drawdown() * dec!(100)).round_dp(2),
            metrics,
        }
    }

    fn settle_at(&mut self, kickoff: DateTime<Utc>, settle_all: bool) {
        let newly_settled = settle_matured(
            &mut self.active_bets,
            kickoff,
            &mut self.bankroll,
            &mut self.team_locks,
            settle_all,
        );
        self.settled_bets.extend(newly_settled);
        self.drawdown.observe(self.bankroll);
    }

    fn process_batch(&mut self, batch: &[Match]) {
        let mut eligible: Vec<(&Match, Outcome)> = Vec::new();

        for m in batch {
            if self.team_locks.contains(&m.home_team) || self.team_locks.contains(&m.away_team) {
                continue;
            }

            let decision = self.strategy.evaluate(m, &self.context);
            if let (true, Some(selection)) = (decision.place_bet, decision.selection) {
                eligible.push((m, selection));
            }
        }

        if eligible.len() >= self.request.multiple_legs {
            if let Some(combo) = first_disjoint_combo(&eligible, self.request.multiple_legs) {
                self.try_place(&combo);
            }
        }

        // The context always sees the whole batch, but only after the
        // placement attempt: a batch can never bet on its own results.
        for m in batch {
            self.context.update(m);
        }
    }

    /// Price the combination, compute the stake, and place the bet. Any
    /// data-edge condition abandons the whole combination for this batch;
    /// the run continues.
    fn try_place(&mut self, combo: &[(&Match, Outcome)]) {
        let mut combined_odds = Decimal::ONE;
        let mut combined_prob = Some(Decimal::ONE);

        for (m, selection) in combo {
            let odds = m.odds_for(*selection);

            if let Some(min_odds) = self.request.min_odds {
                if odds < min_odds {
                    debug!(match_id = %m.id, %odds, %min_odds, "Leg below min_odds — combination abandoned");
                    return;
                }
            }
            // Decimal odds at or below 1 pay nothing; bad input data, not a
            // reason to abort the run.
            if odds <= Decimal::ONE {
                debug!(match_id = %m.id, %odds, "Invalid odds — combination abandoned");
                return;
            }
            combined_odds *= odds;

            if self.staking.needs_model_prob() {
                match m.model_prob_for(*selection) {
                    Some(prob) => {
                        combined_prob = combined_prob.map(|acc| acc * prob);
                    }
                    None => {
                        debug!(match_id = %m.id, %selection, "No model probability for Kelly leg — combination abandoned");
                        return;
                    }
                }
            }
        }

        let combined_prob = if self.staking.needs_model_prob() { combined_prob } else { None };

        let Some(stake) = self.staking.stake(self.bankroll, combined_odds, combined_prob) else {
            return;
        };
        if stake <= Decimal::ZERO || stake > self.bankroll {
            debug!(%stake, bankroll = %self.bankroll, "Unplayable stake — combination abandoned");
            return;
        }

        let legs: Vec<BetLeg> = combo
            .iter()
            .map(|(m, selection)| BetLeg { fixture: (*m).clone(), selection: *selection })
            .collect();
        let settles_at = legs.iter().map(|l| l.fixture.kickoff).max().expect("combo is non-empty");

        for (m, _) in combo {
            self.team_locks.insert(m.home_team.clone());
            self.team_locks.insert(m.away_team.clone());
        }
        self.bankroll -= stake;

        let bet = Bet { legs, stake, combined_odds, settles_at };
        debug!(bet = %bet, bankroll = %self.bankroll, "Bet placed");
        self.active_bets.push(bet);
    }
}

/// Run a full simulation: validate the request, build the strategy, replay.
pub fn simulate(
    matches: &[Match],
    request: &SimulationRequest,
) -> Result<SimulationResult, SimError> {
    request.validate()?;
    let strategy = Strategy::from_request(request)?;
    Ok(SimulationEngine::new(request.clone(), strategy).run(matches))
}

// ---------------------------------------------------------------------------
// Combination building
// ---------------------------------------------------------------------------

/// First combination of `k` eligible selections, in lexicographic order of
/// the eligibility list, in which no team appears twice. None when every
/// combination repeats a team.
fn first_disjoint_combo<'a>(
    eligible: &[(&'a Match, Outcome)],
    k: usize,
) -> Option<Vec<(&'a Match, Outcome)>> {
    let n = eligible.len();
    if k == 0 || n < k {
        return None;
    }

    let mut idx: Vec<usize> = (0..k).collect();
    'combos: loop {
        let mut teams = HashSet::with_capacity(2 * k);
        let disjoint = idx.iter().all(|&i| {
            let (m, _) = eligible[i];
            teams.insert(m.home_team.as_str()) && teams.insert(m.away_team.as_str())
        });
        if disjoint {
            return Some(idx.iter().map(|&i| eligible[i]).collect());
        }

        // Advance to the next k-combination of 0..n.
        let mut i = k;
        while i > 0 {
            i -= 1;
            if idx[i] < i + n - k {
                idx[i] += 1;
                for j in i + 1..k {
                    idx[j] = idx[j - 1] + 1;
                }
                continue 'combos;
            }
        }
        return None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
