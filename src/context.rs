//! Rolling form context.
//!
//! Tracks, per team, a bounded FIFO of the most recent matches that team
//! played, and derives simple form features (win rate, points, goal
//! difference) from that window. Fed by the engine *after* each kickoff
//! batch is processed, so a strategy can never see the current batch's own
//! results.

use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;

use crate::types::{Match, Outcome};

/// Default form window: last five matches per team.
pub const DEFAULT_WINDOW: usize = 5;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Form features for one upcoming match, derived from both teams' windows.
///
/// Every field is `None` until the corresponding team has at least one
/// match of history; the diffs are `None` when either operand is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFeatures {
    pub home_win_rate: Option<Decimal>,
    pub away_win_rate: Option<Decimal>,
    pub home_points: Option<i32>,
    pub away_points: Option<i32>,
    pub home_goal_diff: Option<i64>,
    pub away_goal_diff: Option<i64>,
    pub points_diff: Option<i32>,
    pub goal_diff_diff: Option<i64>,
}

// ---------------------------------------------------------------------------
// Rolling context
// ---------------------------------------------------------------------------

/// Per-team bounded history of recently played matches.
#[derive(Debug, Clone)]
pub struct RollingContext {
    window: usize,
    team_history: HashMap<String, VecDeque<Match>>,
}

impl Default for RollingContext {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RollingContext {
    pub fn new(window: usize) -> Self {
        Self { window, team_history: HashMap::new() }
    }

    /// Append a played match to both teams' windows, evicting the oldest
    /// entry once a window is full.
    pub fn update(&mut self, m: &Match) {
        for team in [&m.home_team, &m.away_team] {
            let history = self.team_history.entry(team.clone()).or_default();
            if history.len() == self.window {
                history.pop_front();
            }
            history.push_back(m.clone());
        }
    }

    /// The team's recent matches, oldest first. Empty for unseen teams.
    pub fn recent(&self, team: &str) -> Vec<&Match> {
        self.team_history
            .get(team)
            .map(|h| h.iter().collect())
            .unwrap_or_default()
    }

    /// Fraction of recent matches the team won. None with no history.
    pub fn win_rate(&self, team: &str) -> Option<Decimal> {
        let matches = self.recent(team);
        if matches.is_empty() {
            return None;
        }
        let wins = matches.iter().filter(|m| m.winner() == Some(team)).count();
        Some(Decimal::from(wins) / Decimal::from(matches.len()))
    }

    /// League points over the window from the team's perspective
    /// (3 win / 1 draw / 0 loss). None with no history.
    pub fn points(&self, team: &str) -> Option<i32> {
        let matches = self.recent(team);
        if matches.is_empty() {
            return None;
        }
        let pts = matches
            .iter()
            .map(|m| match m.result {
                Outcome::Draw => 1,
                _ if m.winner() == Some(team) => 3,
                _ => 0,
            })
            .sum();
        Some(pts)
    }

    /// Goals scored minus conceded over the window, from the team's
    /// perspective. None with no history.
    pub fn goal_diff(&self, team: &str) -> Option<i64> {
        let matches = self.recent(team);
        if matches.is_empty() {
            return None;
        }
        let gd = matches
            .iter()
            .map(|m| {
                let (for_goals, against) = if m.home_team == team {
                    (m.home_goals, m.away_goals)
                } else {
                    (m.away_goals, m.home_goals)
                };
                i64::from(for_goals) - i64::from(against)
            })
            .sum();
        Some(gd)
    }

    /// Derive the full feature set for an upcoming match. Absent values
    /// propagate into the diffs.
    pub fn features_for_match(&self, m: &Match) -> MatchFeatures {
        let home_points = self.points(&m.home_team);
        let away_points = self.points(&m.away_team);
        let home_goal_diff = self.goal_diff(&m.home_team);
        let away_goal_diff = self.goal_diff(&m.away_team);

        MatchFeatures {
            home_win_rate: self.win_rate(&m.home_team),
            away_win_rate: self.win_rate(&m.away_team),
            home_points,
            away_points,
            home_goal_diff,
            away_goal_diff,
            points_diff: home_points.zip(away_points).map(|(h, a)| h - a),
            goal_diff_diff: home_goal_diff.zip(away_goal_diff).map(|(h, a)| h - a),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
