//! Balance service tests
//!
//! Deposit idempotency, withdrawal limits, and the achievements that ride
//! along with money movements.


use survivor_pool::{AchievementKey, PoolError};
use test_helpers::*;

// ============================================================================
// DEPOSIT TESTS
// ============================================================================

#[test]
fn test_deposit_credits_balance() {
    let (_dir, pool) = open_pool();

    assert_eq!(pool.balance_of(1), 0.0, "unknown user holds zero");
    assert!(pool.apply_deposit(1, 12.5, "tx-a").unwrap());
    assert_eq!(pool.balance_of(1), 12.5);
    assert!(pool.apply_deposit(1, 2.5, "tx-b").unwrap());
    assert_eq!(pool.balance_of(1), 15.0);
}

#[test]
fn test_deposit_applies_at_most_once_per_key() {
    let (_dir, pool) = open_pool();

    assert!(pool.apply_deposit(1, 10.0, "tx-1").unwrap());
    assert!(!pool.apply_deposit(1, 10.0, "tx-1").unwrap(), "replay is ignored");
    assert_eq!(pool.balance_of(1), 10.0, "credited exactly once");

    // Same key replayed with a different amount still does nothing
    assert!(!pool.apply_deposit(1, 99.0, "tx-1").unwrap());
    assert_eq!(pool.balance_of(1), 10.0);
}

#[test]
fn test_deposit_rejects_non_positive_amount() {
    let (_dir, pool) = open_pool();

    let err = pool.apply_deposit(1, 0.0, "tx-zero").unwrap_err();
    assert!(matches!(err, PoolError::InvalidAmount(_)));
    let err = pool.apply_deposit(1, -5.0, "tx-neg").unwrap_err();
    assert!(matches!(err, PoolError::InvalidAmount(_)));
}

// ============================================================================
// WITHDRAWAL TESTS
// ============================================================================

#[test]
fn test_withdraw_debits_balance() {
    let (_dir, pool) = open_pool();
    fund(&pool, 1, 10.0);

    let remaining = pool.withdraw(1, 4.0).unwrap();
    assert_eq!(remaining, 6.0);
    assert_eq!(pool.balance_of(1), 6.0);
}

#[test]
fn test_withdraw_below_minimum_rejected() {
    let (_dir, pool) = open_pool();
    fund(&pool, 1, 10.0);

    let err = pool.withdraw(1, 0.05).unwrap_err();
    assert!(matches!(err, PoolError::WithdrawBelowMinimum { .. }));
    assert_eq!(pool.balance_of(1), 10.0);
}

#[test]
fn test_withdraw_over_balance_rejected() {
    let (_dir, pool) = open_pool();
    fund(&pool, 1, 3.0);

    let err = pool.withdraw(1, 5.0).unwrap_err();
    assert!(matches!(err, PoolError::InsufficientBalance { .. }));
    assert_eq!(pool.balance_of(1), 3.0, "no debit applied");
}

#[test]
fn test_withdraw_unknown_user_rejected() {
    let (_dir, pool) = open_pool();

    let err = pool.withdraw(42, 1.0).unwrap_err();
    assert!(matches!(err, PoolError::UserNotFound(42)));
}

// ============================================================================
// REGISTRATION
// ============================================================================

#[test]
fn test_register_user_is_get_or_create() {
    let (_dir, pool) = open_pool();

    let user = pool.register_user(1, Some("alice")).unwrap();
    assert_eq!(user.username.as_deref(), Some("alice"));
    assert_eq!(user.balance, 0.0);

    fund(&pool, 1, 5.0);
    let again = pool.register_user(1, Some("renamed")).unwrap();
    assert_eq!(again.username.as_deref(), Some("alice"), "existing name kept");
    assert_eq!(again.balance, 5.0, "re-registration never resets balance");
}

// ============================================================================
// ACHIEVEMENTS
// ============================================================================

#[test]
fn test_first_bet_and_first_loss_unlock() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);

    let entry = pool.join(1, game_id, 1.0, 1).unwrap();
    let user = pool.user(1).unwrap().unwrap();
    assert!(user.has_achievement(AchievementKey::FirstBet));
    assert!(!user.has_achievement(AchievementKey::FirstLoss));

    let fixtures = make_round(&pool, game_id, 1, &[("Arsenal", "Chelsea")]);
    let arsenal = team_id(&pool, "Arsenal");
    let chelsea = team_id(&pool, "Chelsea");
    pool.submit_pick(entry.id, 1, 1, arsenal, chelsea).unwrap();
    score_round(&pool, &fixtures, &[(0, 0)]);
    pool.settle_round(game_id, 1).unwrap();

    let user = pool.user(1).unwrap().unwrap();
    assert!(user.has_achievement(AchievementKey::FirstLoss));
}

#[test]
fn test_cash_out_tier_unlocks_at_100() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 150.0);

    let entry = pool.join(1, game_id, 120.0, 1).unwrap();
    pool.cash_out(entry.id).unwrap();

    let user = pool.user(1).unwrap().unwrap();
    assert!(user.has_achievement(AchievementKey::CashedOut100));
    assert!(!user.has_achievement(AchievementKey::CashedOut500));
}

#[test]
fn test_survived_five_rounds_unlocks() {
    let (_dir, pool) = open_pool();
    let game_id = seed_game(&pool, 10);
    fund(&pool, 1, 10.0);
    let entry = pool.join(1, game_id, 1.0, 1).unwrap();

    let rounds = [
        ("Arsenal", "Chelsea"),
        ("Liverpool", "Tottenham"),
        ("Newcastle", "Brighton"),
        ("Fulham", "Everton"),
        ("Brentford", "Wolves"),
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

    let user = pool.user(1).unwrap().unwrap();
    assert!(user.has_achievement(AchievementKey::Survived5Rounds));
    let stored = pool.entry(entry.id).unwrap();
    assert_eq!(stored.tickets[0].rounds_survived, 5);
}
