//! Engine error types.
//!
//! Every public operation returns `PoolResult<T>`. Errors fall into four
//! families: validation (bad input, rejected before any state change),
//! state conflicts (entry/ticket/game not in the required status), missing
//! records, and storage failures. A failed operation never leaves partial
//! state behind; the enclosing write transaction is simply dropped.

use serde::Serialize;

/// Result type for all engine operations
pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub enum PoolError {
    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------
    #[error("Stake {stake} is below the minimum stake {minimum}")]
    InvalidStake { stake: f64, minimum: f64 },

    #[error("Ticket count must be at least 1")]
    InvalidTicketCount,

    #[error("Amount must be positive: {0}")]
    InvalidAmount(f64),

    #[error("A pick must name two different teams")]
    DuplicateTeamChoice,

    // ------------------------------------------------------------------
    // State conflicts
    // ------------------------------------------------------------------
    #[error("User {user_id} already has an entry in game {game_id}")]
    AlreadyJoined { user_id: u64, game_id: u64 },

    #[error("Game {0} is not active")]
    GameNotActive(u64),

    #[error("Entry {0} is not active")]
    EntryNotActive(u64),

    #[error("Ticket {ticket_index} of entry {entry_id} is not active")]
    TicketNotActive { entry_id: u64, ticket_index: u32 },

    #[error("Round {0} is closed for picks")]
    RoundClosed(u32),

    #[error("Round {requested} is not open for settlement (current round: {current})")]
    RoundNotOpen { requested: u32, current: u32 },

    #[error("Fixture {fixture_id} has no final score yet")]
    ScoresMissing { fixture_id: u64 },

    #[error("Team {0} was already used by this ticket in an earlier round")]
    TeamAlreadyUsed(u64),

    #[error("Withdrawal {amount} is below the minimum {minimum}")]
    WithdrawBelowMinimum { amount: f64, minimum: f64 },

    // ------------------------------------------------------------------
    // Funds
    // ------------------------------------------------------------------
    #[error("Insufficient balance: have {available:.2}, need {required:.2}")]
    InsufficientBalance { available: f64, required: f64 },

    // ------------------------------------------------------------------
    // Missing records
    // ------------------------------------------------------------------
    #[error("Game not found: {0}")]
    GameNotFound(u64),

    #[error("Entry not found: {0}")]
    EntryNotFound(u64),

    #[error("Ticket {ticket_index} not found on entry {entry_id}")]
    TicketNotFound { entry_id: u64, ticket_index: u32 },

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Fixture not found: {0}")]
    FixtureNotFound(u64),

    #[error("User not found: {0}")]
    UserNotFound(u64),

    #[error("Team {0} is not playing in this round")]
    UnknownTeam(u64),

    // ------------------------------------------------------------------
    // Collaborators / infrastructure
    // ------------------------------------------------------------------
    #[error("Result source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<redb::DatabaseError> for PoolError {
    fn from(e: redb::DatabaseError) -> Self {
        PoolError::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for PoolError {
    fn from(e: redb::TransactionError) -> Self {
        PoolError::Storage(e.to_string())
    }
}

impl From<redb::TableError> for PoolError {
    fn from(e: redb::TableError) -> Self {
        PoolError::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for PoolError {
    fn from(e: redb::StorageError) -> Self {
        PoolError::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for PoolError {
    fn from(e: redb::CommitError) -> Self {
        PoolError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(e: serde_json::Error) -> Self {
        PoolError::Storage(format!("serialization: {}", e))
    }
}
