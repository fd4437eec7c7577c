//! Player achievements, unlocked as side effects of engine operations.

use serde::{Deserialize, Serialize};

use crate::model::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKey {
    /// First entry purchased
    FirstBet,
    /// First ticket eliminated
    FirstLoss,
    /// Single cash-out of 100 or more
    CashedOut100,
    /// Single cash-out of 500 or more
    CashedOut500,
    /// A ticket survived five rounds
    Survived5Rounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub key: AchievementKey,
    /// Unix timestamp (seconds)
    pub unlocked_at: u64,
}

impl User {
    pub fn has_achievement(&self, key: AchievementKey) -> bool {
        self.achievements.iter().any(|a| a.key == key)
    }

    /// Unlock `key` if the user does not hold it yet. Returns true when the
    /// achievement was newly unlocked.
    pub fn unlock(&mut self, key: AchievementKey, now: u64) -> bool {
        if self.has_achievement(key) {
            return false;
        }
        self.achievements.push(Achievement {
            key,
            unlocked_at: now,
        });
        true
    }
}

/// Achievement tiers for a cash-out of `amount`.
pub fn cash_out_tiers(amount: f64) -> Vec<AchievementKey> {
    let mut keys = Vec::new();
    if amount >= 100.0 {
        keys.push(AchievementKey::CashedOut100);
    }
    if amount >= 500.0 {
        keys.push(AchievementKey::CashedOut500);
    }
    keys
}
