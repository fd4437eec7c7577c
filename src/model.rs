//! Domain records persisted by the engine.
//!
//! An [`Entry`] record carries its tickets (and each ticket its picks)
//! inline, so every mutation of a user's position in a game is a single
//! record write. The ticket list is the only stake representation;
//! `legacy_stake` survives solely until the one-time migration backfills it
//! into a synthesized first ticket.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::Achievement;

// ============================================================================
// TEAMS & FIXTURES
// ============================================================================

/// A team in the selectable pool. Immutable once created; unique by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
}

/// Lifecycle of a scheduled fixture, as reported by the result feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureStatus {
    Scheduled,
    InPlay,
    Finished,
    Postponed,
}

/// A pairing of two teams in one round of a game.
///
/// Goals are filled in once, when the round's results arrive (live sync or
/// simulation). Overwriting them is only meaningful before the owning round
/// settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u64,
    pub game_id: u64,
    pub round_number: u32,
    pub home_team_id: u64,
    pub away_team_id: u64,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    /// Kickoff UTC; the earliest kickoff of a round is the pick deadline.
    pub kickoff_utc: Option<DateTime<Utc>>,
    /// Identifier of this fixture at the external result feed
    pub external_ref: Option<String>,
    pub status: FixtureStatus,
}

impl Fixture {
    pub fn has_final_score(&self) -> bool {
        self.home_goals.is_some() && self.away_goals.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status == FixtureStatus::Finished
    }
}

// ============================================================================
// GAMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Finished,
}

/// A survivor game: a fixed number of rounds, one settlement per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: u64,
    pub title: String,
    pub rounds_total: u32,
    /// 1-based; advanced exactly once per settled round. After the final
    /// settlement it rests at `rounds_total + 1` with status `Finished`.
    pub current_round: u32,
    pub status: GameStatus,
    /// External matchday the game's round 1 maps onto, when the schedule
    /// is mirrored from a live league.
    pub start_offset: Option<u32>,
}

impl Game {
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }
}

// ============================================================================
// ENTRIES, TICKETS, PICKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Active,
    Out,
    CashedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Out,
}

/// The two teams a ticket backs to each score in a given round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pick {
    pub round_number: u32,
    pub team_a: u64,
    pub team_b: u64,
}

impl Pick {
    pub fn teams(&self) -> [u64; 2] {
        [self.team_a, self.team_b]
    }
}

/// One independent stake path within an entry.
///
/// Each round the ticket picks two fresh teams; teams used in any earlier
/// round are burned for the rest of the ticket's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// 1-based position within the entry, assigned at join, immutable
    pub ticket_index: u32,
    /// Current stake; multiplied on every survived round, frozen on `Out`
    pub stake_amount: f64,
    pub status: TicketStatus,
    pub rounds_survived: u32,
    pub picks: Vec<Pick>,
}

impl Ticket {
    pub fn is_active(&self) -> bool {
        self.status == TicketStatus::Active
    }

    pub fn pick_for(&self, round_number: u32) -> Option<&Pick> {
        self.picks.iter().find(|p| p.round_number == round_number)
    }

    /// All team ids this ticket has ever picked.
    pub fn used_team_ids(&self) -> BTreeSet<u64> {
        self.picks.iter().flat_map(|p| p.teams()).collect()
    }

    /// Team ids used in rounds other than `round_number`. A resubmission
    /// replaces that round's pick, so its teams don't count against reuse.
    pub fn used_team_ids_excluding(&self, round_number: u32) -> BTreeSet<u64> {
        self.picks
            .iter()
            .filter(|p| p.round_number != round_number)
            .flat_map(|p| p.teams())
            .collect()
    }
}

/// A user's participation in one game, holding one or more tickets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: u64,
    pub user_id: u64,
    pub game_id: u64,
    pub status: EntryStatus,
    /// Pre-ticket single-stake value; cleared when the migration
    /// synthesizes a ticket from it
    pub legacy_stake: Option<f64>,
    pub tickets: Vec<Ticket>,
}

impl Entry {
    pub fn is_active(&self) -> bool {
        self.status == EntryStatus::Active
    }

    pub fn ticket(&self, ticket_index: u32) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.ticket_index == ticket_index)
    }

    pub fn ticket_mut(&mut self, ticket_index: u32) -> Option<&mut Ticket> {
        self.tickets
            .iter_mut()
            .find(|t| t.ticket_index == ticket_index)
    }

    pub fn has_active_tickets(&self) -> bool {
        self.tickets.iter().any(|t| t.is_active())
    }

    /// Sum of still-active tickets' stakes; falls back to the legacy
    /// single-stake field for entries the migration has not touched yet.
    pub fn active_stake_total(&self) -> f64 {
        if self.tickets.is_empty() {
            return self.legacy_stake.unwrap_or(0.0);
        }
        self.tickets
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.stake_amount)
            .sum()
    }
}

// ============================================================================
// USERS
// ============================================================================

/// A player account. Balance moves only at join, cash-out, deposit and
/// withdrawal time, never per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl User {
    pub fn new(id: u64, username: Option<String>) -> Self {
        Self {
            id,
            username,
            balance: 0.0,
            achievements: Vec::new(),
        }
    }
}

// ============================================================================
// OPERATION RESULTS
// ============================================================================

/// One row of the "my entries" overview.
#[derive(Debug, Clone, Serialize)]
pub struct EntryOverview {
    pub entry_id: u64,
    pub game_id: u64,
    pub game_title: String,
    pub current_round: u32,
    pub rounds_total: u32,
    pub entry_status: EntryStatus,
    pub game_status: GameStatus,
    pub active_stake: f64,
}

/// What one `settle_round` call did.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub game_id: u64,
    pub round_number: u32,
    /// Teams that scored at least once in this round's fixtures
    pub scored_team_ids: Vec<u64>,
    pub tickets_passed: u32,
    pub tickets_out: u32,
    pub entries_out: u32,
    pub game_finished: bool,
    /// True when the round had already been settled and this call changed
    /// nothing
    pub already_settled: bool,
}
