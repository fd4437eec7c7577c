//! Round settlement.
//!
//! One settlement per (game, round), applied as a single store
//! transaction:
//! 1. Every fixture of the round must carry a final score (the result
//!    sync fills gaps beforehand, from a live feed or the simulator).
//! 2. The scored set is binary — a team is in iff it netted at least one
//!    goal this round. A 0-0 fixture contributes neither team.
//! 3. A ticket's pick passes iff both teams are in the scored set: pass
//!    multiplies the stake, fail freezes the ticket. Tickets without a
//!    pick this round are carried forward untouched.
//! 4. The round counter advances exactly once; past the last round the
//!    game finishes.
//!
//! The round counter is re-read inside the write transaction, so two
//! concurrent triggers for the same round cannot both apply: the loser of
//! the race sees an advanced counter and reports a no-op repeat.

use std::collections::BTreeSet;

use tracing::info;

use crate::achievements::AchievementKey;
use crate::error::{PoolError, PoolResult};
use crate::model::{
    Entry, EntryStatus, Fixture, FixtureStatus, Game, GameStatus, SettlementOutcome, TicketStatus,
    User,
};
use crate::results::ResultSource;
use crate::storage::{get_record, put_record, scan_records, ENTRIES, FIXTURES, GAMES, USERS};

use super::{now_ts, SurvivorPool};

/// Teams that scored at least once across `fixtures`.
pub(crate) fn scored_team_ids(fixtures: &[Fixture]) -> BTreeSet<u64> {
    let mut scored = BTreeSet::new();
    for fixture in fixtures {
        if fixture.home_goals.unwrap_or(0) >= 1 {
            scored.insert(fixture.home_team_id);
        }
        if fixture.away_goals.unwrap_or(0) >= 1 {
            scored.insert(fixture.away_team_id);
        }
    }
    scored
}

impl SurvivorPool {
    // ========================================================================
    // RESULT SYNC
    // ========================================================================

    /// Fill in final scores for every fixture of the round that has not
    /// reported yet, using `source`. A source failure aborts the whole
    /// sync — fixtures are never left half-scored by one call.
    pub fn sync_round_results(
        &self,
        game_id: u64,
        round_number: u32,
        source: &dyn ResultSource,
    ) -> PoolResult<u32> {
        let write_txn = self.store.begin_write()?;
        let filled = {
            let games = write_txn.open_table(GAMES)?;
            let mut fixtures = write_txn.open_table(FIXTURES)?;

            let game: Option<Game> = get_record(&games, game_id)?;
            if game.is_none() {
                return Err(PoolError::GameNotFound(game_id));
            }

            let round_fixtures: Vec<Fixture> = scan_records(&fixtures)?
                .into_iter()
                .filter(|f: &Fixture| f.game_id == game_id && f.round_number == round_number)
                .collect();

            let mut filled = 0u32;
            for mut fixture in round_fixtures {
                if fixture.is_terminal() && fixture.has_final_score() {
                    continue;
                }
                let result = source.result_for(&fixture)?;
                fixture.home_goals = Some(result.home_goals);
                fixture.away_goals = Some(result.away_goals);
                fixture.status = FixtureStatus::Finished;
                put_record(&mut fixtures, fixture.id, &fixture)?;
                filled += 1;
            }
            filled
        };
        write_txn.commit()?;

        info!(game_id, round = round_number, filled, "Round results synced");
        Ok(filled)
    }

    // ========================================================================
    // SETTLEMENT
    // ========================================================================

    /// Apply the round's outcomes: evaluate every pick, compound or freeze
    /// stakes, and advance the round counter — all in one transaction.
    ///
    /// Settling a round that already settled is a safe no-op; settling a
    /// future round is rejected.
    pub fn settle_round(&self, game_id: u64, round_number: u32) -> PoolResult<SettlementOutcome> {
        let write_txn = self.store.begin_write()?;
        let outcome = {
            let mut games = write_txn.open_table(GAMES)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut users = write_txn.open_table(USERS)?;
            let fixtures = write_txn.open_table(FIXTURES)?;

            let mut game: Game =
                get_record(&games, game_id)?.ok_or(PoolError::GameNotFound(game_id))?;

            let round_fixtures: Vec<Fixture> = scan_records(&fixtures)?
                .into_iter()
                .filter(|f: &Fixture| f.game_id == game_id && f.round_number == round_number)
                .collect();
            let scored = scored_team_ids(&round_fixtures);

            // Re-check under the write lock: if another trigger for this
            // round committed first, the counter has moved past us.
            if round_number < game.current_round {
                return Ok(SettlementOutcome {
                    game_id,
                    round_number,
                    scored_team_ids: scored.iter().copied().collect(),
                    tickets_passed: 0,
                    tickets_out: 0,
                    entries_out: 0,
                    game_finished: game.status == GameStatus::Finished,
                    already_settled: true,
                });
            }
            if !game.is_active() {
                return Err(PoolError::GameNotActive(game_id));
            }
            if round_number > game.current_round {
                return Err(PoolError::RoundNotOpen {
                    requested: round_number,
                    current: game.current_round,
                });
            }

            for fixture in &round_fixtures {
                if !fixture.has_final_score() {
                    return Err(PoolError::ScoresMissing {
                        fixture_id: fixture.id,
                    });
                }
            }

            let mut tickets_passed = 0u32;
            let mut tickets_out = 0u32;
            let mut entries_out = 0u32;
            let now = now_ts();

            let game_entries: Vec<Entry> = scan_records(&entries)?
                .into_iter()
                .filter(|e: &Entry| e.game_id == game_id)
                .collect();

            for mut entry in game_entries {
                if !entry.is_active() {
                    continue;
                }

                let mut changed = false;
                let mut unlock_keys: Vec<AchievementKey> = Vec::new();

                for ticket in entry.tickets.iter_mut() {
                    if !ticket.is_active() {
                        continue;
                    }
                    // No pick this round: neither passes nor fails
                    let Some(pick) = ticket.pick_for(round_number).copied() else {
                        continue;
                    };

                    if scored.contains(&pick.team_a) && scored.contains(&pick.team_b) {
                        ticket.stake_amount *= self.config.survival_multiplier;
                        ticket.rounds_survived += 1;
                        tickets_passed += 1;
                        if ticket.rounds_survived >= 5 {
                            unlock_keys.push(AchievementKey::Survived5Rounds);
                        }
                    } else {
                        ticket.status = TicketStatus::Out;
                        tickets_out += 1;
                        unlock_keys.push(AchievementKey::FirstLoss);
                    }
                    changed = true;
                }

                if !changed {
                    continue;
                }
                if !entry.has_active_tickets() {
                    entry.status = EntryStatus::Out;
                    entries_out += 1;
                }
                put_record(&mut entries, entry.id, &entry)?;

                if !unlock_keys.is_empty() {
                    let holder: Option<User> = get_record(&users, entry.user_id)?;
                    if let Some(mut user) = holder {
                        let mut unlocked = false;
                        for key in unlock_keys {
                            unlocked |= user.unlock(key, now);
                        }
                        if unlocked {
                            put_record(&mut users, entry.user_id, &user)?;
                        }
                    }
                }
            }

            game.current_round += 1;
            let game_finished = game.current_round > game.rounds_total;
            if game_finished {
                game.status = GameStatus::Finished;
            }
            put_record(&mut games, game_id, &game)?;

            SettlementOutcome {
                game_id,
                round_number,
                scored_team_ids: scored.iter().copied().collect(),
                tickets_passed,
                tickets_out,
                entries_out,
                game_finished,
                already_settled: false,
            }
        };
        write_txn.commit()?;

        info!(
            game_id,
            round = round_number,
            passed = outcome.tickets_passed,
            out = outcome.tickets_out,
            entries_out = outcome.entries_out,
            finished = outcome.game_finished,
            "Round settled"
        );
        Ok(outcome)
    }
}
