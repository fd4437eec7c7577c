// ============================================================================
// SURVIVOR POOL - ENGINE
// ============================================================================
//
// The engine is the one write path into the store. Operations are grouped:
// - catalog.rs:    team pool and fixture schedule
// - ledger.rs:     games, users, entries, tickets, picks, cash-out
// - settlement.rs: round settlement and result syncing
// - balance.rs:    deposits, withdrawals, balance reads
//
// Every operation is a fire-and-complete call wrapped in a single store
// transaction: concurrent callers observe either the fully-applied or
// fully-unapplied effect, never a partial one.
//
// ============================================================================

mod balance;
mod catalog;
mod ledger;
mod settlement;

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::model::{Entry, Game, Team, Ticket, TicketStatus, User};
use crate::storage::{get_record, put_record, scan_records, PoolStore, ENTRIES, GAMES, TEAMS, USERS};

pub use balance::DepositRecord;

/// The survivor pool engine.
///
/// `Clone` is cheap (shared store handles); every method takes `&self` and
/// is safe to call from many request handlers at once.
#[derive(Clone)]
pub struct SurvivorPool {
    pub(crate) store: PoolStore,
    pub(crate) config: PoolConfig,
}

impl SurvivorPool {
    /// Open (or create) the engine's store under `path`.
    pub fn open(path: &str, config: PoolConfig) -> PoolResult<Self> {
        let store = PoolStore::open(path)?;
        info!(
            multiplier = config.survival_multiplier,
            min_stake = config.min_stake,
            "Survivor pool engine ready"
        );
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn game(&self, game_id: u64) -> PoolResult<Game> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(GAMES)?;
        let game: Option<Game> = get_record(&table, game_id)?;
        game.ok_or(PoolError::GameNotFound(game_id))
    }

    pub fn entry(&self, entry_id: u64) -> PoolResult<Entry> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;
        let entry: Option<Entry> = get_record(&table, entry_id)?;
        entry.ok_or(PoolError::EntryNotFound(entry_id))
    }

    pub fn user(&self, user_id: u64) -> PoolResult<Option<User>> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        get_record(&table, user_id)
    }

    /// All teams in the pool, ordered by id.
    pub fn teams(&self) -> PoolResult<Vec<Team>> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(TEAMS)?;
        let mut teams: Vec<Team> = scan_records(&table)?;
        teams.sort_by_key(|t| t.id);
        Ok(teams)
    }

    // ========================================================================
    // MIGRATION
    // ========================================================================

    /// Backfill pre-ticket entries: any entry that still carries a legacy
    /// single stake and no tickets gets one synthesized ticket holding that
    /// stake. Run once at startup, outside the request path; re-running is
    /// a no-op.
    pub fn migrate_legacy_entries(&self) -> PoolResult<usize> {
        let write_txn = self.store.begin_write()?;
        let migrated = {
            let mut entries_table = write_txn.open_table(ENTRIES)?;
            let records: Vec<Entry> = scan_records(&entries_table)?;

            let mut migrated = 0usize;
            for mut entry in records {
                if !entry.tickets.is_empty() {
                    continue;
                }
                let Some(stake) = entry.legacy_stake else {
                    continue;
                };
                entry.tickets.push(Ticket {
                    ticket_index: 1,
                    stake_amount: stake,
                    status: TicketStatus::Active,
                    rounds_survived: 0,
                    picks: Vec::new(),
                });
                entry.legacy_stake = None;
                put_record(&mut entries_table, entry.id, &entry)?;
                migrated += 1;
            }
            migrated
        };
        write_txn.commit()?;

        if migrated > 0 {
            info!(migrated, "Legacy single-stake entries backfilled");
        }
        Ok(migrated)
    }
}

/// Unix timestamp in seconds.
pub(crate) fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
