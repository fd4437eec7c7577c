//! Survivor Pool Engine
//!
//! Round-based survivor pool: a player joins a game by staking on one or
//! more tickets, picks two teams per ticket each round, and survives the
//! round only when both picked teams score. Survival compounds the
//! ticket's stake by a fixed multiplier; failure freezes it. Cashing out
//! converts the remaining active stakes back into spendable balance.
//!
//! ## Architecture
//!
//! - **Storage**: ReDB (ACID, MVCC) + DashMap (lock-free balance cache)
//! - **Engine**: one write transaction per operation; the settlement
//!   round counter is checked-and-advanced inside the transaction so a
//!   round can never settle twice
//! - **Results**: pluggable [`ResultSource`] strategies — random
//!   simulator fallback or a feed-backed table
//! - **Observability**: `tracing` structured logs
//!
//! The chat-bot, web app, identity and payment rails live elsewhere and
//! talk to this crate through the typed call/result API on
//! [`SurvivorPool`].

pub mod achievements;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod results;
pub mod storage;

pub use achievements::{Achievement, AchievementKey};
pub use config::PoolConfig;
pub use engine::{DepositRecord, SurvivorPool};
pub use error::{PoolError, PoolResult};
pub use model::{
    Entry, EntryOverview, EntryStatus, Fixture, FixtureStatus, Game, GameStatus, Pick,
    SettlementOutcome, Team, Ticket, TicketStatus, User,
};
pub use results::{FixtureResult, ResultSource, SimulatedScores, TableScores};
pub use storage::PoolStore;
