// ============================================================================
// SURVIVOR POOL - STORAGE LAYER
// ============================================================================
//
// One shared logical store for every engine record:
// - ReDB: ACID-compliant embedded database (MVCC, single writer)
// - DashMap: lock-free balance cache for hot reads
//
// Every externally-triggered operation runs inside a single ReDB write
// transaction; the balance cache is refreshed only after a successful
// commit. Records are stored as JSON values keyed by numeric id, with an
// auxiliary (user, game) index for entries and a counters table for id
// allocation.
//
// CONCURRENCY MODEL:
// - Reads: lock-free balance lookups via DashMap, MVCC snapshots via ReDB
// - Writes: serialized by ReDB's single-writer transaction, which is what
//   makes the settlement round check-and-advance race-free
//
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use redb::{
    Database, ReadTransaction, ReadableTable, Table, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::{PoolError, PoolResult};
use crate::model::User;

// ============================================================================
// TABLE DEFINITIONS
// ============================================================================

/// Player accounts: user id → User (JSON)
pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Team pool: team id → Team (JSON)
pub(crate) const TEAMS: TableDefinition<u64, &[u8]> = TableDefinition::new("teams");

/// Unique-name index: team name → team id
pub(crate) const TEAMS_BY_NAME: TableDefinition<&str, u64> =
    TableDefinition::new("teams_by_name");

/// Games: game id → Game (JSON)
pub(crate) const GAMES: TableDefinition<u64, &[u8]> = TableDefinition::new("games");

/// Fixtures: fixture id → Fixture (JSON)
pub(crate) const FIXTURES: TableDefinition<u64, &[u8]> = TableDefinition::new("fixtures");

/// Entries with their tickets and picks: entry id → Entry (JSON)
pub(crate) const ENTRIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entries");

/// One-entry-per-(user, game) index: (user id, game id) → entry id
pub(crate) const ENTRY_INDEX: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("entries_by_user_game");

/// Applied deposits, keyed by idempotency key (JSON record)
pub(crate) const DEPOSITS: TableDefinition<&str, &[u8]> = TableDefinition::new("deposits");

/// Id allocation counters: entity name → last issued id
pub(crate) const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub(crate) const COUNTER_TEAMS: &str = "teams";
pub(crate) const COUNTER_GAMES: &str = "games";
pub(crate) const COUNTER_FIXTURES: &str = "fixtures";
pub(crate) const COUNTER_ENTRIES: &str = "entries";

// ============================================================================
// POOL STORE
// ============================================================================

/// Storage handle shared by all engine operations.
///
/// # Thread safety
/// - `Clone` is cheap (Arc handles)
/// - `cached_balance()` is lock-free
/// - writers are serialized by ReDB's MVCC (single writer, many readers)
#[derive(Clone)]
pub struct PoolStore {
    db: Arc<Database>,

    /// In-memory balance cache, refreshed after each committed write
    balances: Arc<DashMap<u64, f64>>,
}

impl PoolStore {
    /// Create or open the store under `path`.
    pub fn open(path: &str) -> PoolResult<Self> {
        std::fs::create_dir_all(Path::new(path))
            .map_err(|e| PoolError::Storage(e.to_string()))?;

        let db = Database::create(format!("{}/survivor.redb", path))?;

        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(TEAMS)?;
            let _ = write_txn.open_table(TEAMS_BY_NAME)?;
            let _ = write_txn.open_table(GAMES)?;
            let _ = write_txn.open_table(FIXTURES)?;
            let _ = write_txn.open_table(ENTRIES)?;
            let _ = write_txn.open_table(ENTRY_INDEX)?;
            let _ = write_txn.open_table(DEPOSITS)?;
            let _ = write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;

        // Load existing balances into the cache
        let balances: Arc<DashMap<u64, f64>> = Arc::new(DashMap::new());
        {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(USERS)?;
            for row in table.iter()? {
                let (_, value) = row?;
                let user: User = serde_json::from_slice(value.value())?;
                balances.insert(user.id, user.balance);
            }
        }

        info!(path = %path, users = balances.len(), "Store opened");

        Ok(Self {
            db: Arc::new(db),
            balances,
        })
    }

    pub fn begin_write(&self) -> PoolResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    pub fn begin_read(&self) -> PoolResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    /// Lock-free balance lookup; `None` when the user has no record yet.
    #[inline]
    pub fn cached_balance(&self, user_id: u64) -> Option<f64> {
        self.balances.get(&user_id).map(|b| *b)
    }

    /// Refresh the cache entry for a user. Call AFTER a successful commit.
    pub fn cache_balance(&self, user_id: u64, balance: f64) {
        self.balances.insert(user_id, balance);
    }
}

// ============================================================================
// RECORD HELPERS
// ============================================================================

/// Read and decode one JSON record from an id-keyed table.
pub(crate) fn get_record<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> PoolResult<Option<T>> {
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

/// Encode and write one JSON record into an id-keyed table.
pub(crate) fn put_record<T: Serialize>(
    table: &mut Table<'_, u64, &'static [u8]>,
    id: u64,
    value: &T,
) -> PoolResult<()> {
    let bytes = serde_json::to_vec(value)?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}

/// Decode every record of an id-keyed table.
pub(crate) fn scan_records<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> PoolResult<Vec<T>> {
    let mut records = Vec::new();
    for row in table.iter()? {
        let (_, value) = row?;
        records.push(serde_json::from_slice(value.value())?);
    }
    Ok(records)
}

/// Allocate the next id for an entity family. Ids start at 1.
pub(crate) fn next_id(
    counters: &mut Table<'_, &'static str, u64>,
    family: &str,
) -> PoolResult<u64> {
    let next = counters.get(family)?.map(|v| v.value()).unwrap_or(0) + 1;
    counters.insert(family, next)?;
    Ok(next)
}

// ============================================================================
// TESTS
// ============================================================================
