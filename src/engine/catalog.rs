//! Team pool and fixture schedule.
//!
//! Teams are immutable and unique by name. Fixtures belong to a (game,
//! round) pair; their goals are written by the result sync or by an
//! explicit score submission. Overwriting a score is legal while the
//! owning round is still open — callers must not do it after settlement,
//! and the engine logs a warning when they do.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use tracing::{info, warn};

use crate::error::{PoolError, PoolResult};
use crate::model::{Fixture, FixtureStatus, Game, Team};
use crate::storage::{
    get_record, next_id, put_record, scan_records, COUNTERS, COUNTER_FIXTURES, COUNTER_TEAMS,
    ENTRIES, FIXTURES, GAMES, TEAMS, TEAMS_BY_NAME,
};

use super::SurvivorPool;

/// Default pool seeded into an empty store.
const DEFAULT_TEAMS: [&str; 20] = [
    "Arsenal",
    "Manchester City",
    "Liverpool",
    "Chelsea",
    "Manchester United",
    "Tottenham",
    "Newcastle",
    "Aston Villa",
    "Brighton",
    "West Ham",
    "Crystal Palace",
    "Wolves",
    "Bournemouth",
    "Fulham",
    "Brentford",
    "Everton",
    "Nottingham Forest",
    "Leeds",
    "Leicester City",
    "Southampton",
];

impl SurvivorPool {
    // ========================================================================
    // TEAMS
    // ========================================================================

    /// Insert new teams into the pool; names already present are skipped.
    pub fn add_teams(&self, names: &[&str]) -> PoolResult<Vec<Team>> {
        let write_txn = self.store.begin_write()?;
        let added = {
            let mut teams = write_txn.open_table(TEAMS)?;
            let mut by_name = write_txn.open_table(TEAMS_BY_NAME)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let mut added = Vec::new();
            for name in names {
                let name = name.trim();
                if name.is_empty() || by_name.get(name)?.is_some() {
                    continue;
                }
                let id = next_id(&mut counters, COUNTER_TEAMS)?;
                let team = Team {
                    id,
                    name: name.to_string(),
                };
                put_record(&mut teams, id, &team)?;
                by_name.insert(name, id)?;
                added.push(team);
            }
            added
        };
        write_txn.commit()?;

        info!(added = added.len(), requested = names.len(), "Teams added");
        Ok(added)
    }

    /// Seed the default team pool if no teams exist yet.
    pub fn seed_default_teams(&self) -> PoolResult<usize> {
        let empty = {
            let read_txn = self.store.begin_read()?;
            read_txn.open_table(TEAMS)?.iter()?.next().is_none()
        };
        if !empty {
            return Ok(0);
        }
        Ok(self.add_teams(&DEFAULT_TEAMS)?.len())
    }

    // ========================================================================
    // FIXTURES
    // ========================================================================

    /// Create the fixtures of one round from (home, away) team-name pairs.
    /// No goals are set; kickoff times and external refs arrive later via
    /// [`SurvivorPool::update_schedule`].
    pub fn create_fixtures(
        &self,
        game_id: u64,
        round_number: u32,
        pairings: &[(&str, &str)],
    ) -> PoolResult<Vec<Fixture>> {
        let write_txn = self.store.begin_write()?;
        let created = {
            let games = write_txn.open_table(GAMES)?;
            let by_name = write_txn.open_table(TEAMS_BY_NAME)?;
            let mut fixtures = write_txn.open_table(FIXTURES)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let game: Option<Game> = get_record(&games, game_id)?;
            if game.is_none() {
                return Err(PoolError::GameNotFound(game_id));
            }

            let mut created = Vec::new();
            for (home_name, away_name) in pairings {
                let home_team_id = by_name
                    .get(home_name.trim())?
                    .map(|v| v.value())
                    .ok_or_else(|| PoolError::TeamNotFound(home_name.trim().to_string()))?;
                let away_team_id = by_name
                    .get(away_name.trim())?
                    .map(|v| v.value())
                    .ok_or_else(|| PoolError::TeamNotFound(away_name.trim().to_string()))?;

                let id = next_id(&mut counters, COUNTER_FIXTURES)?;
                let fixture = Fixture {
                    id,
                    game_id,
                    round_number,
                    home_team_id,
                    away_team_id,
                    home_goals: None,
                    away_goals: None,
                    kickoff_utc: None,
                    external_ref: None,
                    status: FixtureStatus::Scheduled,
                };
                put_record(&mut fixtures, id, &fixture)?;
                created.push(fixture);
            }
            created
        };
        write_txn.commit()?;

        info!(
            game_id,
            round = round_number,
            fixtures = created.len(),
            "Round fixtures created"
        );
        Ok(created)
    }

    /// Record the final score of a fixture and mark it finished. Live sync
    /// may overwrite a previously set score as long as the owning round has
    /// not settled yet.
    pub fn set_final_score(
        &self,
        fixture_id: u64,
        home_goals: u32,
        away_goals: u32,
    ) -> PoolResult<Fixture> {
        let write_txn = self.store.begin_write()?;
        let fixture = {
            let mut fixtures = write_txn.open_table(FIXTURES)?;
            let games = write_txn.open_table(GAMES)?;

            let mut fixture: Fixture = get_record(&fixtures, fixture_id)?
                .ok_or(PoolError::FixtureNotFound(fixture_id))?;

            let game: Option<Game> = get_record(&games, fixture.game_id)?;
            if let Some(game) = game {
                if fixture.round_number < game.current_round {
                    warn!(
                        fixture_id,
                        round = fixture.round_number,
                        current_round = game.current_round,
                        "Score written for an already-settled round; stakes are unaffected"
                    );
                }
            }

            fixture.home_goals = Some(home_goals);
            fixture.away_goals = Some(away_goals);
            fixture.status = FixtureStatus::Finished;
            put_record(&mut fixtures, fixture_id, &fixture)?;
            fixture
        };
        write_txn.commit()?;

        info!(
            fixture_id,
            home_goals, away_goals, "Final score recorded"
        );
        Ok(fixture)
    }

    /// Attach kickoff time and/or external feed reference to a fixture.
    pub fn update_schedule(
        &self,
        fixture_id: u64,
        kickoff_utc: Option<DateTime<Utc>>,
        external_ref: Option<&str>,
    ) -> PoolResult<Fixture> {
        let write_txn = self.store.begin_write()?;
        let fixture = {
            let mut fixtures = write_txn.open_table(FIXTURES)?;
            let mut fixture: Fixture = get_record(&fixtures, fixture_id)?
                .ok_or(PoolError::FixtureNotFound(fixture_id))?;

            if kickoff_utc.is_some() {
                fixture.kickoff_utc = kickoff_utc;
            }
            if let Some(external_ref) = external_ref {
                fixture.external_ref = Some(external_ref.to_string());
            }
            put_record(&mut fixtures, fixture_id, &fixture)?;
            fixture
        };
        write_txn.commit()?;
        Ok(fixture)
    }

    /// Fixtures of one round, ordered by id.
    pub fn fixtures_for_round(&self, game_id: u64, round_number: u32) -> PoolResult<Vec<Fixture>> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(FIXTURES)?;
        let mut fixtures: Vec<Fixture> = scan_records(&table)?
            .into_iter()
            .filter(|f: &Fixture| f.game_id == game_id && f.round_number == round_number)
            .collect();
        fixtures.sort_by_key(|f| f.id);
        Ok(fixtures)
    }

    // ========================================================================
    // TEAM AVAILABILITY
    // ========================================================================

    /// Every team id a ticket has picked so far, across all rounds.
    pub fn teams_used_by(&self, entry_id: u64, ticket_index: u32) -> PoolResult<BTreeSet<u64>> {
        let read_txn = self.store.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        let entry: crate::model::Entry =
            get_record(&entries, entry_id)?.ok_or(PoolError::EntryNotFound(entry_id))?;
        let ticket = entry.ticket(ticket_index).ok_or(PoolError::TicketNotFound {
            entry_id,
            ticket_index,
        })?;
        Ok(ticket.used_team_ids())
    }

    /// Teams a ticket can still pick in a round: everyone playing in the
    /// round's fixtures, minus the ticket's burned teams. Ordered by id.
    pub fn available_teams_for(
        &self,
        entry_id: u64,
        ticket_index: u32,
        round_number: u32,
    ) -> PoolResult<Vec<Team>> {
        let read_txn = self.store.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        let fixtures = read_txn.open_table(FIXTURES)?;
        let teams = read_txn.open_table(TEAMS)?;

        let entry: crate::model::Entry =
            get_record(&entries, entry_id)?.ok_or(PoolError::EntryNotFound(entry_id))?;
        let ticket = entry.ticket(ticket_index).ok_or(PoolError::TicketNotFound {
            entry_id,
            ticket_index,
        })?;
        let used = ticket.used_team_ids();

        let round_fixtures: Vec<Fixture> = scan_records(&fixtures)?
            .into_iter()
            .filter(|f: &Fixture| f.game_id == entry.game_id && f.round_number == round_number)
            .collect();
        let playing: BTreeSet<u64> = round_fixtures
            .iter()
            .flat_map(|f| [f.home_team_id, f.away_team_id])
            .collect();

        let mut available = Vec::new();
        for team_id in playing.difference(&used) {
            let team: Option<Team> = get_record(&teams, *team_id)?;
            if let Some(team) = team {
                available.push(team);
            }
        }
        available.sort_by_key(|t| t.id);
        Ok(available)
    }
}
