//! Games, users, entries, tickets and picks.
//!
//! The ledger owns the canonical state of a user's participation: joining
//! debits the balance and mints the entry's tickets in one transaction,
//! picks are validated against the round's fixtures and the ticket's
//! burned-team history, and cash-out is a one-shot conversion of the
//! remaining active stakes back into balance.

use std::collections::BTreeSet;

use chrono::Utc;
use redb::ReadableTable;
use tracing::info;

use crate::achievements::{cash_out_tiers, AchievementKey};
use crate::error::{PoolError, PoolResult};
use crate::model::{
    Entry, EntryOverview, EntryStatus, Fixture, Game, GameStatus, Pick, Ticket, TicketStatus, User,
};
use crate::storage::{
    get_record, next_id, put_record, scan_records, COUNTERS, COUNTER_ENTRIES, COUNTER_GAMES,
    ENTRIES, ENTRY_INDEX, FIXTURES, GAMES, USERS,
};

use super::{now_ts, SurvivorPool};

impl SurvivorPool {
    // ========================================================================
    // GAMES & USERS
    // ========================================================================

    /// Create a new game. `rounds_total` defaults to the configured round
    /// count; `start_offset` maps round 1 onto an external matchday when
    /// the schedule mirrors a live league.
    pub fn create_game(
        &self,
        title: &str,
        rounds_total: Option<u32>,
        start_offset: Option<u32>,
    ) -> PoolResult<Game> {
        let write_txn = self.store.begin_write()?;
        let game = {
            let mut games = write_txn.open_table(GAMES)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let id = next_id(&mut counters, COUNTER_GAMES)?;
            let game = Game {
                id,
                title: title.to_string(),
                rounds_total: rounds_total.unwrap_or(self.config.default_rounds_total),
                current_round: 1,
                status: GameStatus::Active,
                start_offset,
            };
            put_record(&mut games, id, &game)?;
            game
        };
        write_txn.commit()?;

        info!(game_id = game.id, title = %game.title, rounds = game.rounds_total, "Game created");
        Ok(game)
    }

    /// Get-or-create a user record. A username supplied later fills in a
    /// blank one but never overwrites an existing name.
    pub fn register_user(&self, user_id: u64, username: Option<&str>) -> PoolResult<User> {
        let write_txn = self.store.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let existing: Option<User> = get_record(&users, user_id)?;
            let mut user = existing.unwrap_or_else(|| User::new(user_id, None));
            if user.username.is_none() {
                user.username = username.map(str::to_string);
            }
            put_record(&mut users, user_id, &user)?;
            user
        };
        write_txn.commit()?;

        self.store.cache_balance(user_id, user.balance);
        Ok(user)
    }

    // ========================================================================
    // JOIN
    // ========================================================================

    /// Buy into a game: debit `stake_per_ticket × ticket_count` and create
    /// the entry with its tickets. One entry per (user, game).
    pub fn join(
        &self,
        user_id: u64,
        game_id: u64,
        stake_per_ticket: f64,
        ticket_count: u32,
    ) -> PoolResult<Entry> {
        if ticket_count == 0 {
            return Err(PoolError::InvalidTicketCount);
        }
        if stake_per_ticket < self.config.min_stake {
            return Err(PoolError::InvalidStake {
                stake: stake_per_ticket,
                minimum: self.config.min_stake,
            });
        }
        let total = self
            .config
            .round_money(stake_per_ticket * ticket_count as f64);

        let write_txn = self.store.begin_write()?;
        let (entry, new_balance) = {
            let mut users = write_txn.open_table(USERS)?;
            let games = write_txn.open_table(GAMES)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut index = write_txn.open_table(ENTRY_INDEX)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let game: Game =
                get_record(&games, game_id)?.ok_or(PoolError::GameNotFound(game_id))?;
            if !game.is_active() {
                return Err(PoolError::GameNotActive(game_id));
            }
            if index.get((user_id, game_id))?.is_some() {
                return Err(PoolError::AlreadyJoined { user_id, game_id });
            }

            let existing: Option<User> = get_record(&users, user_id)?;
            let mut user = existing.unwrap_or_else(|| User::new(user_id, None));
            if user.balance < total {
                return Err(PoolError::InsufficientBalance {
                    available: user.balance,
                    required: total,
                });
            }
            user.balance = self.config.round_money(user.balance - total);
            user.unlock(AchievementKey::FirstBet, now_ts());

            let entry_id = next_id(&mut counters, COUNTER_ENTRIES)?;
            let tickets = (1..=ticket_count)
                .map(|ticket_index| Ticket {
                    ticket_index,
                    stake_amount: stake_per_ticket,
                    status: TicketStatus::Active,
                    rounds_survived: 0,
                    picks: Vec::new(),
                })
                .collect();
            let entry = Entry {
                id: entry_id,
                user_id,
                game_id,
                status: EntryStatus::Active,
                legacy_stake: None,
                tickets,
            };

            put_record(&mut entries, entry_id, &entry)?;
            index.insert((user_id, game_id), entry_id)?;
            put_record(&mut users, user_id, &user)?;
            (entry, user.balance)
        };
        write_txn.commit()?;

        self.store.cache_balance(user_id, new_balance);
        info!(
            user_id,
            game_id,
            entry_id = entry.id,
            tickets = ticket_count,
            stake = stake_per_ticket,
            "Entry joined"
        );
        Ok(entry)
    }

    // ========================================================================
    // PICKS
    // ========================================================================

    /// Record a ticket's pick of two teams for the game's current round.
    /// Resubmitting replaces that round's pick; the replaced teams are
    /// freed again for this ticket.
    pub fn submit_pick(
        &self,
        entry_id: u64,
        ticket_index: u32,
        round_number: u32,
        team_a: u64,
        team_b: u64,
    ) -> PoolResult<Pick> {
        if team_a == team_b {
            return Err(PoolError::DuplicateTeamChoice);
        }

        let write_txn = self.store.begin_write()?;
        let pick = {
            let mut entries = write_txn.open_table(ENTRIES)?;
            let games = write_txn.open_table(GAMES)?;
            let fixtures = write_txn.open_table(FIXTURES)?;

            let mut entry: Entry =
                get_record(&entries, entry_id)?.ok_or(PoolError::EntryNotFound(entry_id))?;
            if !entry.is_active() {
                return Err(PoolError::EntryNotActive(entry_id));
            }

            let game: Game = get_record(&games, entry.game_id)?
                .ok_or(PoolError::GameNotFound(entry.game_id))?;
            if !game.is_active() {
                return Err(PoolError::GameNotActive(game.id));
            }
            if round_number != game.current_round {
                return Err(PoolError::RoundClosed(round_number));
            }

            let round_fixtures: Vec<Fixture> = scan_records(&fixtures)?
                .into_iter()
                .filter(|f: &Fixture| f.game_id == game.id && f.round_number == round_number)
                .collect();

            // Picks close at the round's earliest kickoff
            if let Some(deadline) = round_fixtures.iter().filter_map(|f| f.kickoff_utc).min() {
                if Utc::now() >= deadline {
                    return Err(PoolError::RoundClosed(round_number));
                }
            }

            let playing: BTreeSet<u64> = round_fixtures
                .iter()
                .flat_map(|f| [f.home_team_id, f.away_team_id])
                .collect();
            for team_id in [team_a, team_b] {
                if !playing.contains(&team_id) {
                    return Err(PoolError::UnknownTeam(team_id));
                }
            }

            {
                let ticket = entry.ticket(ticket_index).ok_or(PoolError::TicketNotFound {
                    entry_id,
                    ticket_index,
                })?;
                if !ticket.is_active() {
                    return Err(PoolError::TicketNotActive {
                        entry_id,
                        ticket_index,
                    });
                }
                let used = ticket.used_team_ids_excluding(round_number);
                for team_id in [team_a, team_b] {
                    if used.contains(&team_id) {
                        return Err(PoolError::TeamAlreadyUsed(team_id));
                    }
                }
            }

            let pick = Pick {
                round_number,
                team_a,
                team_b,
            };
            let ticket = entry
                .ticket_mut(ticket_index)
                .ok_or(PoolError::TicketNotFound {
                    entry_id,
                    ticket_index,
                })?;
            ticket.picks.retain(|p| p.round_number != round_number);
            ticket.picks.push(pick);

            put_record(&mut entries, entry_id, &entry)?;
            pick
        };
        write_txn.commit()?;

        info!(
            entry_id,
            ticket_index,
            round = round_number,
            team_a,
            team_b,
            "Pick recorded"
        );
        Ok(pick)
    }

    // ========================================================================
    // CASH-OUT
    // ========================================================================

    /// Convert the entry's still-active stakes into balance. One-shot: the
    /// entry leaves `Active` and a second call is rejected.
    pub fn cash_out(&self, entry_id: u64) -> PoolResult<f64> {
        let write_txn = self.store.begin_write()?;
        let (user_id, payout, new_balance) = {
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut users = write_txn.open_table(USERS)?;

            let mut entry: Entry =
                get_record(&entries, entry_id)?.ok_or(PoolError::EntryNotFound(entry_id))?;
            if !entry.is_active() {
                return Err(PoolError::EntryNotActive(entry_id));
            }

            let payout = self.config.round_money(entry.active_stake_total());
            entry.status = EntryStatus::CashedOut;

            let existing: Option<User> = get_record(&users, entry.user_id)?;
            let mut user = existing.unwrap_or_else(|| User::new(entry.user_id, None));
            user.balance = self.config.round_money(user.balance + payout);
            let now = now_ts();
            for key in cash_out_tiers(payout) {
                user.unlock(key, now);
            }

            put_record(&mut entries, entry_id, &entry)?;
            put_record(&mut users, entry.user_id, &user)?;
            (entry.user_id, payout, user.balance)
        };
        write_txn.commit()?;

        self.store.cache_balance(user_id, new_balance);
        info!(entry_id, user_id, payout, "Entry cashed out");
        Ok(payout)
    }

    // ========================================================================
    // OVERVIEW
    // ========================================================================

    /// All of a user's entries with their game context, newest first.
    pub fn entries_for_user(&self, user_id: u64) -> PoolResult<Vec<EntryOverview>> {
        let read_txn = self.store.begin_read()?;
        let index = read_txn.open_table(ENTRY_INDEX)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let games = read_txn.open_table(GAMES)?;

        let mut overview = Vec::new();
        for row in index.range((user_id, 0u64)..=(user_id, u64::MAX))? {
            let (_, entry_id) = row?;
            let entry: Option<Entry> = get_record(&entries, entry_id.value())?;
            let Some(entry) = entry else { continue };
            let game: Option<Game> = get_record(&games, entry.game_id)?;
            let Some(game) = game else { continue };
            overview.push(EntryOverview {
                entry_id: entry.id,
                game_id: game.id,
                game_title: game.title,
                current_round: game.current_round,
                rounds_total: game.rounds_total,
                entry_status: entry.status,
                game_status: game.status,
                active_stake: entry.active_stake_total(),
            });
        }
        overview.sort_by(|a, b| b.entry_id.cmp(&a.entry_id));
        Ok(overview)
    }
}
