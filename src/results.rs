//! External result sources.
//!
//! Settlement never fetches scores itself; a [`ResultSource`] fills in
//! fixture goals beforehand. Two implementations ship with the engine: the
//! random fallback used when no live feed covers a round, and a fixed table
//! standing in for a live feed keyed by external fixture reference. A real
//! feed client is a drop-in third implementation of the same trait.

use std::collections::HashMap;

use rand::Rng;

use crate::error::{PoolError, PoolResult};
use crate::model::Fixture;

/// Final score reported for one fixture.
#[derive(Debug, Clone, Copy)]
pub struct FixtureResult {
    pub home_goals: u32,
    pub away_goals: u32,
}

/// Supplies final scores for fixtures that have not reported yet.
pub trait ResultSource {
    fn result_for(&self, fixture: &Fixture) -> PoolResult<FixtureResult>;
}

// ============================================================================
// SIMULATED SCORES
// ============================================================================

/// Random score generator, the fallback when no live feed is wired up.
///
/// Goal counts are drawn per side from a distribution that favors low
/// scores: roughly 30% blanks, and four goals only a few percent of the
/// time, so "both teams scored" stays a real gamble.
#[derive(Debug, Default)]
pub struct SimulatedScores;

impl SimulatedScores {
    pub fn new() -> Self {
        Self
    }
}

fn sample_goals(rng: &mut impl Rng) -> u32 {
    match rng.gen_range(0..100u32) {
        0..=29 => 0,
        30..=59 => 1,
        60..=79 => 2,
        80..=92 => 3,
        _ => 4,
    }
}

impl ResultSource for SimulatedScores {
    fn result_for(&self, _fixture: &Fixture) -> PoolResult<FixtureResult> {
        let mut rng = rand::thread_rng();
        Ok(FixtureResult {
            home_goals: sample_goals(&mut rng),
            away_goals: sample_goals(&mut rng),
        })
    }
}

// ============================================================================
// TABLE SCORES
// ============================================================================

/// Fixed result table keyed by a fixture's `external_ref`.
///
/// Stands in for a live feed: the sync path treats a missing entry the same
/// way it treats an unreachable feed.
#[derive(Debug, Default)]
pub struct TableScores {
    results: HashMap<String, FixtureResult>,
}

impl TableScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, external_ref: impl Into<String>, home_goals: u32, away_goals: u32) {
        self.results.insert(
            external_ref.into(),
            FixtureResult {
                home_goals,
                away_goals,
            },
        );
    }
}

impl ResultSource for TableScores {
    fn result_for(&self, fixture: &Fixture) -> PoolResult<FixtureResult> {
        let external_ref = fixture
            .external_ref
            .as_deref()
            .ok_or_else(|| {
                PoolError::SourceUnavailable(format!(
                    "fixture {} has no external reference",
                    fixture.id
                ))
            })?;
        self.results
            .get(external_ref)
            .copied()
            .ok_or_else(|| {
                PoolError::SourceUnavailable(format!("no result for fixture ref {}", external_ref))
            })
    }
}
