//! End-to-end simulation scenarios.
//!
//! Deterministic seasons built by hand, replayed through the public
//! `simulate` entry point, with exact expectations on the result schema.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use oddsim::engine::{simulate, SimulationResult};
use oddsim::request::{SimulationRequest, StakingMethod, StrategyType};
use oddsim::types::{Match, Outcome, SimError};

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

fn season_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T15:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// All scenario matches share the same prices: H=2.0, D=3.5, A=4.0, with a
/// 2-0 home scoreline unless the result says otherwise.
fn make_match(home: &str, away: &str, day: i64, result: Outcome) -> Match {
    Match {
        id: Uuid::new_v4(),
        league: "Test League".to_string(),
        season: "2025".to_string(),
        kickoff: season_start() + Duration::days(day),
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

fn make_match_with_model(home: &str, away: &str, day: i64, result: Outcome, home_prob: Decimal) -> Match {
    let mut m = make_match(home, away, day, result);
    m.model_home_prob = Some(home_prob);
    m
}

fn base_request(strategy_type: StrategyType) -> SimulationRequest {
    SimulationRequest {
        league: "Test League".to_string(),
        season: "2025".to_string(),
        strategy_type,
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

fn run(matches: &[Match], request: &SimulationRequest) -> SimulationResult {
    simulate(matches, request).expect("request should be valid")
}

// ---------------------------------------------------------------------------
// Scenario fixtures
// ---------------------------------------------------------------------------

#[test]
fn fixed_singles_all_wins() {
    let matches = vec![
        make_match("A", "B", 0, Outcome::Home),
        make_match("C", "D", 1, Outcome::Home),
        make_match("E", "F", 2, Outcome::Home),
        make_match("G", "H", 3, Outcome::Home),
    ];
    let result = run(&matches, &base_request(StrategyType::Home));

    assert_eq!(result.metrics.total_bets, 4);
    assert_eq!(result.final_bankroll, dec!(1400));
    assert_eq!(result.metrics.roi_percent, dec!(40.00));
    assert_eq!(result.max_drawdown_percent, dec!(0.00));
    assert_eq!(result.bets.len(), 4);
    assert!(result.bets.iter().all(|b| b.is_win));
    assert_eq!(result.metrics.total_wins, 4);
    assert_eq!(result.metrics.total_losses, 0);
    assert_eq!(result.metrics.strike_rate_percent, dec!(100.00));
    assert_eq!(result.metrics.total_profit, dec!(400));
    assert_eq!(result.metrics.average_odds, dec!(2.00));
    assert_eq!(result.metrics.longest_win_streak, 4);
    assert_eq!(result.metrics.longest_loss_streak, 0);
}

#[test]
fn edge_strategy_places_bet() {
    // Odds 2.0 imply 0.5; the model says 0.6 → edge 0.1 beats 0.05.
    let matches = vec![make_match_with_model("A", "B", 0, Outcome::Home, dec!(0.6))];
    let mut request = base_request(StrategyType::Edge);
    request.selection = Some(Outcome::Home);
    request.min_edge = Some(dec!(0.05));

    let result = run(&matches, &request);
    assert_eq!(result.metrics.total_bets, 1);
    assert_eq!(result.final_bankroll, dec!(1100));
}

#[test]
fn edge_strategy_blocks_bet_when_edge_too_small() {
    let matches = vec![make_match_with_model("A", "B", 0, Outcome::Home, dec!(0.6))];
    let mut request = base_request(StrategyType::Edge);
    request.selection = Some(Outcome::Home);
    request.min_edge = Some(dec!(0.2));

    let result = run(&matches, &request);
    assert_eq!(result.metrics.total_bets, 0);
    assert_eq!(result.final_bankroll, dec!(1000));
}

#[test]
fn kelly_single_win() {
    // b = 1, p = 0.6 → f = 0.2 → stake 200; the win returns 400.
    let matches = vec![make_match_with_model("A", "B", 0, Outcome::Home, dec!(0.6))];
    let mut request = base_request(StrategyType::Edge);
    request.selection = Some(Outcome::Home);
    request.min_edge = Some(Decimal::ZERO);
    request.staking_method = StakingMethod::Kelly;
    request.fixed_stake = None;
    request.kelly_fraction = Some(dec!(1.0));

    let result = run(&matches, &request);
    assert_eq!(result.metrics.total_bets, 1);
    assert_eq!(result.bets[0].stake, dec!(200));
    assert_eq!(result.final_bankroll, dec!(1200));
    assert_eq!(result.metrics.total_profit, dec!(200));
    assert_eq!(result.metrics.roi_percent, dec!(20.00));
}

#[test]
fn two_leg_accumulator_same_kickoff() {
    let matches = vec![
        make_match("A", "B", 0, Outcome::Home),
        make_match("C", "D", 0, Outcome::Home),
    ];
    let mut request = base_request(StrategyType::Home);
    request.multiple_legs = 2;

    let result = run(&matches, &request);
    assert_eq!(result.metrics.total_bets, 1);
    assert_eq!(result.bets[0].legs.len(), 2);
    assert_eq!(result.bets[0].combined_odds, dec!(4.0));
    assert_eq!(result.bets[0].return_amount, dec!(400));
    assert_eq!(result.final_bankroll, dec!(1300));
    assert_eq!(result.metrics.total_profit, dec!(300));
    assert_eq!(result.metrics.roi_percent, dec!(30.00));
}

#[test]
fn rule_strategy_bets_on_truthy_history() {
    // A won, B lost; next day the rule home_points > away_points holds.
    let matches = vec![
        make_match("A", "X", 0, Outcome::Home),
        make_match("Y", "B", 1, Outcome::Home),
        make_match("A", "B", 2, Outcome::Home),
    ];
    let mut request = base_request(StrategyType::Rules);
    request.rule_expression = Some("home_points > away_points".to_string());
    request.selection = Some(Outcome::Home);

    let result = run(&matches, &request);
    assert_eq!(result.metrics.total_bets, 1);
    assert_eq!(result.bets[0].legs[0].fixture.home_team, "A");
    assert_eq!(result.final_bankroll, dec!(1100));
}

#[test]
fn rule_strategy_declines_on_falsy_history() {
    // Roles swapped: A lost, B won — the rule never fires.
    let matches = vec![
        make_match("A", "X", 0, Outcome::Away),
        make_match("Y", "B", 1, Outcome::Away),
        make_match("A", "B", 2, Outcome::Home),
    ];
    let mut request = base_request(StrategyType::Rules);
    request.rule_expression = Some("home_points > away_points".to_string());
    request.selection = Some(Outcome::Home);

    let result = run(&matches, &request);
    assert_eq!(result.metrics.total_bets, 0);
    assert_eq!(result.final_bankroll, dec!(1000));
}

// ---------------------------------------------------------------------------
// Run invariants
// ---------------------------------------------------------------------------

/// A mixed season: wins, losses, a draw, same-day fixtures, repeat teams.
fn mixed_season() -> Vec<Match> {
    vec![
        make_match("A", "B", 0, Outcome::Home),
        make_match("C", "D", 0, Outcome::Away),
        make_match("E", "F", 1, Outcome::Draw),
        make_match("B", "C", 2, Outcome::Home),
        make_match("A", "D", 3, Outcome::Away),
        make_match("F", "E", 3, Outcome::Home),
        make_match("D", "A", 5, Outcome::Home),
    ]
}

#[test]
fn bankroll_equals_start_plus_settled_profit() {
    for legs in [1, 2] {
        let mut request = base_request(StrategyType::Home);
        request.multiple_legs = legs;
        let result = run(&mixed_season(), &request);

        let profit: Decimal = result.bets.iter().map(|b| b.profit).sum();
        assert_eq!(result.final_bankroll, (dec!(1000) + profit).round_dp(2));
    }
}

#[test]
fn wins_and_losses_partition_the_log() {
    let result = run(&mixed_season(), &base_request(StrategyType::Home));
    assert_eq!(result.metrics.total_bets, result.bets.len());
    assert_eq!(
        result.metrics.total_bets,
        result.metrics.total_wins + result.metrics.total_losses
    );
}

#[test]
fn every_bet_has_exact_leg_count_with_distinct_teams() {
    let mut request = base_request(StrategyType::Home);
    request.multiple_legs = 2;
    let result = run(&mixed_season(), &request);

    for bet in &result.bets {
        assert_eq!(bet.legs.len(), 2);
        let mut teams: Vec<&str> = bet
            .legs
            .iter()
            .flat_map(|l| [l.fixture.home_team.as_str(), l.fixture.away_team.as_str()])
            .collect();
        let before = teams.len();
        teams.sort_unstable();
        teams.dedup();
        assert_eq!(teams.len(), before, "a team repeats within a bet");
    }
}

#[test]
fn drawdown_stays_within_bounds() {
    let losing_season: Vec<Match> = (0..6)
        .map(|i| make_match(&format!("H{i}"), &format!("A{i}"), i, Outcome::Away))
        .collect();
    let result = run(&losing_season, &base_request(StrategyType::Home));

    assert!(result.max_drawdown_percent >= Decimal::ZERO);
    assert!(result.max_drawdown_percent <= dec!(100));
    assert_eq!(result.max_drawdown_percent, dec!(60.00)); // six lost stakes
}

#[test]
fn rerun_is_bit_identical() {
    let matches = mixed_season();
    let request = base_request(StrategyType::Home);

    let first = serde_json::to_string(&run(&matches, &request)).unwrap();
    let second = serde_json::to_string(&run(&matches, &request)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn settlement_order_is_chronological() {
    let result = run(&mixed_season(), &base_request(StrategyType::Home));
    for pair in result.bets.windows(2) {
        assert!(pair[0].settled_at <= pair[1].settled_at);
    }
}

// ---------------------------------------------------------------------------
// Error surface
// ---------------------------------------------------------------------------

#[test]
fn invalid_request_is_rejected_up_front() {
    let mut request = base_request(StrategyType::Home);
    request.starting_bankroll = Decimal::ZERO;
    let err = simulate(&[], &request).unwrap_err();
    assert!(matches!(err, SimError::Validation(_)));
}

#[test]
fn unsafe_rule_expressions_never_run() {
    let matches = vec![make_match("A", "B", 0, Outcome::Home)];

    for expression in [
        "__import__('os')",
        "open('/etc/passwd')",
        "match.result",
        "teams[0]",
        "x = 1",
        "lambda m: 1",
    ] {
        let mut request = base_request(StrategyType::Rules);
        request.rule_expression = Some(expression.to_string());
        let err = simulate(&matches, &request).unwrap_err();
        assert!(
            matches!(err, SimError::UnsafeExpression(_)),
            "expected {expression:?} to be rejected, got {err:?}"
        );
    }
}

#[test]
fn rule_runtime_failures_do_not_abort_the_run() {
    // home_points is unbound on day 0 and the rule divides by a feature
    // that can be zero — none of that may kill the run.
    let matches = vec![
        make_match("A", "B", 0, Outcome::Home),
        make_match("A", "C", 1, Outcome::Home),
    ];
    let mut request = base_request(StrategyType::Rules);
    request.rule_expression = Some("10 / away_points > 2".to_string());

    let result = run(&matches, &request);
    // Day 0: unbound. Day 1: C unseen, still unbound. Zero bets, no panic.
    assert_eq!(result.metrics.total_bets, 0);
    assert_eq!(result.final_bankroll, dec!(1000));
}

// ---------------------------------------------------------------------------
// Result schema
// ---------------------------------------------------------------------------

#[test]
fn result_serialises_with_flat_metric_keys() {
    let result = run(
        &[make_match("A", "B", 0, Outcome::Home)],
        &base_request(StrategyType::Home),
    );
    let json = serde_json::to_value(&result).unwrap();

    for key in [
        "bets",
        "final_bankroll",
        "max_drawdown_percent",
        "total_bets",
        "total_wins",
        "total_losses",
        "strike_rate_percent",
        "total_staked",
        "total_profit",
        "average_odds",
        "longest_win_streak",
        "longest_loss_streak",
        "roi_percent",
    ] {
        assert!(json.get(key).is_some(), "missing result key {key}");
    }
}
