//! Round settlement tests
//!
//! The scored-set rule, stake compounding, elimination, idempotent
//! re-settlement, round monotonicity and result syncing.


use survivor_pool::{
    EntryStatus, GameStatus, PoolError, SimulatedScores, TableScores, TicketStatus,
};
use test_helpers::*;

// ============================================================================
// SCORED SET SEMANTICS
// ============================================================================

#[test]
fn test_pick_fails_unless_both_teams_score() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    for user_id in 1..=3 {
        fund(&pool, user_id, 10.0);
    }
    let e1 = pool.join(1, game_id, 1.0, 1).unwrap();
    let e2 = pool.join(2, game_id, 1.0, 1).unwrap();
    let e3 = pool.join(3, game_id, 1.0, 1).unwrap();

    let fixtures = make_round(
        &pool,
        game_id,
        1,
        &[
            ("Arsenal", "Chelsea"),
            ("Liverpool", "Tottenham"),
            ("Newcastle", "Brighton"),
        ],
    );
    let arsenal = team_id(&pool, "Arsenal");
    let chelsea = team_id(&pool, "Chelsea");
    let liverpool = team_id(&pool, "Liverpool");
    let newcastle = team_id(&pool, "Newcastle");

    pool.submit_pick(e1.id, 1, 1, arsenal, liverpool).unwrap();
    pool.submit_pick(e2.id, 1, 1, arsenal, chelsea).unwrap();
    pool.submit_pick(e3.id, 1, 1, arsenal, newcastle).unwrap();

    // Arsenal 2-0 Chelsea, Liverpool 0-0 Tottenham, Newcastle 1-0 Brighton
    score_round(&pool, &fixtures, &[(2, 0), (0, 0), (1, 0)]);
    let outcome = pool.settle_round(game_id, 1).unwrap();

    assert_eq!(outcome.scored_team_ids, vec![arsenal, newcastle]);
    assert_eq!(outcome.tickets_passed, 1);
    assert_eq!(outcome.tickets_out, 2);

    // Liverpool never scored: out
    assert_eq!(pool.entry(e1.id).unwrap().status, EntryStatus::Out);
    // Chelsea blanked even though its fixture produced goals: out
    assert_eq!(pool.entry(e2.id).unwrap().status, EntryStatus::Out);
    // Both Arsenal and Newcastle scored: stake compounds
    let survivor = pool.entry(e3.id).unwrap();
    assert_eq!(survivor.status, EntryStatus::Active);
    assert_eq!(survivor.tickets[0].stake_amount, 1.5);
}

#[test]
fn test_no_pick_ticket_is_carried_forward() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 3.0, 1).unwrap();

    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea")]);
    score_round(&pool, &fixtures, &[(2, 2)]);
    let outcome = pool.settle_round(game_id, 1).unwrap();

    assert_eq!(outcome.tickets_passed, 0);
    assert_eq!(outcome.tickets_out, 0);
    let stored = pool.entry(entry.id).unwrap();
    assert_eq!(stored.status, EntryStatus::Active);
    assert_eq!(stored.tickets[0].stake_amount, 3.0, "no pick, no change");
    assert_eq!(stored.tickets[0].status, TicketStatus::Active);
}

#[test]
fn test_entry_out_only_when_all_tickets_out() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 1.0, 2).unwrap();

    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea"), ("Liverpool", "Tottenham")]);
    let arsenal = team_id(&pool, "Arsenal");
    let chelsea = team_id(&pool, "Chelsea");
    let liverpool = team_id(&pool, "Liverpool");
    let tottenham = team_id(&pool, "Tottenham");

    pool.submit_pick(entry.id, 1, 1, arsenal, chelsea).unwrap();
    pool.submit_pick(entry.id, 2, 1, liverpool, tottenham).unwrap();
    // Arsenal blanks, Liverpool and Tottenham both score
    score_round(&pool, &fixtures, &[(0, 3), (1, 2)]);
    pool.settle_round(game_id, 1).unwrap();

    let stored = pool.entry(entry.id).unwrap();
    assert_eq!(stored.status, EntryStatus::Active, "one live ticket keeps the entry in");
    assert_eq!(stored.tickets[0].status, TicketStatus::Out);
    assert_eq!(stored.tickets[0].stake_amount, 1.0, "frozen, not compounded");
    assert_eq!(stored.tickets[1].stake_amount, 1.5);

    // A pick on the dead ticket is rejected next round
    make_round(&pool, game_id, 2, &[("Newcastle", "Brighton")]);
    let newcastle = team_id(&pool, "Newcastle");
    let brighton = team_id(&pool, "Brighton");
    let err = pool.submit_pick(entry.id, 1, 2, newcastle, brighton).unwrap_err();
    assert!(matches!(err, PoolError::TicketNotActive { ticket_index: 1, .. }));
}

#[test]
fn test_all_tickets_out_puts_entry_out() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 1.0, 2).unwrap();

    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea"), ("Liverpool", "Tottenham")]);
    let arsenal = team_id(&pool, "Arsenal");
    let chelsea = team_id(&pool, "Chelsea");
    let liverpool = team_id(&pool, "Liverpool");
    let tottenham = team_id(&pool, "Tottenham");

    pool.submit_pick(entry.id, 1, 1, arsenal, chelsea).unwrap();
    pool.submit_pick(entry.id, 2, 1, liverpool, tottenham).unwrap();
    score_round(&pool, &fixtures, &[(0, 0), (0, 0)]);
    let outcome = pool.settle_round(game_id, 1).unwrap();

    assert_eq!(outcome.entries_out, 1);
    let stored = pool.entry(entry.id).unwrap();
    assert_eq!(stored.status, EntryStatus::Out);

    let err = pool.cash_out(entry.id).unwrap_err();
    assert!(matches!(err, PoolError::EntryNotActive(_)), "nothing left to cash out");
}

// ============================================================================
// COMPOUNDING
// ============================================================================

#[test]
fn test_stake_compounds_per_survived_round() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 8.0, 1).unwrap();

    let rounds = [
        ("Arsenal", "Chelsea"),
        ("Liverpool", "Tottenham"),
        ("Newcastle", "Brighton"),
    ];
    for (round, (home, away)) in rounds.iter().enumerate() {
        let round = round as u32 + 1;
        let fixtures = make_round(&pool, game_id, round, &[(home, away)]);
        let home_id = team_id(&pool, home);
        let away_id = team_id(&pool, away);
        pool.submit_pick(entry.id, 1, round, home_id, away_id).unwrap();
        score_round(&pool, &fixtures, &[(1, 1)]);
        pool.settle_round(game_id, round).unwrap();
    }

    let stored = pool.entry(entry.id).unwrap();
    let expected = 8.0 * 1.5f64.powi(3);
    assert!(
        (stored.tickets[0].stake_amount - expected).abs() < 1e-9,
        "stake follows s x 1.5^k: {} vs {}",
        stored.tickets[0].stake_amount,
        expected
    );
    assert_eq!(stored.tickets[0].rounds_survived, 3);
}

// ============================================================================
// IDEMPOTENCE & ROUND MONOTONICITY
// ============================================================================

#[test]
fn test_settling_a_round_twice_changes_nothing() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 2.0, 1).unwrap();

    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea")]);
    let arsenal = team_id(&pool, "Arsenal");
    let chelsea = team_id(&pool, "Chelsea");
    pool.submit_pick(entry.id, 1, 1, arsenal, chelsea).unwrap();
    score_round(&pool, &fixtures, &[(1, 1)]);

    let first = pool.settle_round(game_id, 1).unwrap();
    assert!(!first.already_settled);
    assert_eq!(first.tickets_passed, 1);

    let second = pool.settle_round(game_id, 1).unwrap();
    assert!(second.already_settled, "repeat trigger is a no-op");
    assert_eq!(second.tickets_passed, 0);

    let game = pool.game(game_id).unwrap();
    assert_eq!(game.current_round, 2, "round advanced exactly once");
    let stored = pool.entry(entry.id).unwrap();
    assert_eq!(stored.tickets[0].stake_amount, 3.0, "stake compounded exactly once");
}

#[test]
fn test_future_round_cannot_settle() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);

    let err = pool.settle_round(game_id, 3).unwrap_err();
    assert!(matches!(
        err,
        PoolError::RoundNotOpen { requested: 3, current: 1 }
    ));
}

#[test]
fn test_settlement_requires_all_scores() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea"), ("Liverpool", "Tottenham")]);
    pool.set_final_score(fixtures[0].id, 1, 0).unwrap();

    let err = pool.settle_round(game_id, 1).unwrap_err();
    assert!(matches!(err, PoolError::ScoresMissing { .. }));
    assert_eq!(pool.game(game_id).unwrap().current_round, 1, "nothing applied");
}

#[test]
fn test_game_finishes_after_last_round() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 2);

    for round in 1..=2 {
        let fixtures = make_round(&pool, game_id, round, &[("Arsenal", "Chelsea")]);
        score_round(&pool, &fixtures, &[(1, 0)]);
        let outcome = pool.settle_round(game_id, round).unwrap();
        assert_eq!(outcome.game_finished, round == 2);
    }

    let game = pool.game(game_id).unwrap();
    assert_eq!(game.status, GameStatus::Finished);
    assert_eq!(game.current_round, 3);

    // Settled rounds stay no-ops, the next round never opens
    assert!(pool.settle_round(game_id, 2).unwrap().already_settled);
    let err = pool.settle_round(game_id, 3).unwrap_err();
    assert!(matches!(err, PoolError::GameNotActive(_)));
}

#[test]
fn test_cashed_out_entry_is_not_settled() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 2.0, 1).unwrap();

    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea")]);
    let arsenal = team_id(&pool, "Arsenal");
    let chelsea = team_id(&pool, "Chelsea");
    pool.submit_pick(entry.id, 1, 1, arsenal, chelsea).unwrap();
    pool.cash_out(entry.id).unwrap();

    score_round(&pool, &fixtures, &[(1, 1)]);
    let outcome = pool.settle_round(game_id, 1).unwrap();

    assert_eq!(outcome.tickets_passed, 0, "cashed-out stakes never compound");
    let stored = pool.entry(entry.id).unwrap();
    assert_eq!(stored.status, EntryStatus::CashedOut);
    assert_eq!(stored.tickets[0].stake_amount, 2.0);
}

// ============================================================================
// RESULT SYNC
// ============================================================================

#[test]
fn test_sync_round_results_from_feed_table() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea"), ("Liverpool", "Tottenham")]);
    pool.update_schedule(fixtures[0].id, None, Some("feed-1")).unwrap();
    pool.update_schedule(fixtures[1].id, None, Some("feed-2")).unwrap();

    let mut feed = TableScores::new();
    feed.insert("feed-1", 2, 1);
    feed.insert("feed-2", 0, 0);

    let filled = pool.sync_round_results(game_id, 1, &feed).unwrap();
    assert_eq!(filled, 2);

    let synced = pool.fixtures_for_round(game_id, 1).unwrap();
    assert_eq!(synced[0].home_goals, Some(2));
    assert_eq!(synced[1].away_goals, Some(0));

    // A second sync finds nothing left to fill
    assert_eq!(pool.sync_round_results(game_id, 1, &feed).unwrap(), 0);
    pool.settle_round(game_id, 1).unwrap();
}

#[test]
fn test_sync_failure_leaves_no_partial_scores() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea"), ("Liverpool", "Tottenham")]);
    pool.update_schedule(fixtures[0].id, None, Some("feed-1")).unwrap();
    pool.update_schedule(fixtures[1].id, None, Some("feed-2")).unwrap();

    // Feed only knows the first fixture
    let mut feed = TableScores::new();
    feed.insert("feed-1", 2, 1);

    let err = pool.sync_round_results(game_id, 1, &feed).unwrap_err();
    assert!(matches!(err, PoolError::SourceUnavailable(_)));

    for fixture in pool.fixtures_for_round(game_id, 1).unwrap() {
        assert!(fixture.home_goals.is_none(), "sync is all-or-nothing");
    }
}

#[test]
fn test_simulator_scores_whole_round() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea"), ("Liverpool", "Tottenham")]);

    let filled = pool.sync_round_results(game_id, 1, &SimulatedScores::new()).unwrap();
    assert_eq!(filled, 2);

    for fixture in pool.fixtures_for_round(game_id, 1).unwrap() {
        assert!(fixture.home_goals.unwrap() <= 4);
        assert!(fixture.away_goals.unwrap() <= 4);
    }
    pool.settle_round(game_id, 1).unwrap();
    assert_eq!(pool.game(game_id).unwrap().current_round, 2);
}
