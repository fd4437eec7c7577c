//! Balance & payout service.
//!
//! A thin money ledger over the user table: deposits arrive from the
//! payment collaborator with an idempotency key and apply at most once,
//! withdrawals are gated by a configured minimum, and reads come from the
//! lock-free cache. Join and cash-out move money inside their own
//! transactions in the ledger module, never here.

use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PoolError, PoolResult};
use crate::model::User;
use crate::storage::{get_record, put_record, DEPOSITS, USERS};

use super::{now_ts, SurvivorPool};

/// An applied deposit, kept so a replayed confirmation cannot credit twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRecord {
    pub idempotency_key: String,
    pub user_id: u64,
    pub amount: f64,
    pub applied_at: u64,
}

impl SurvivorPool {
    /// Spendable balance of a user. Lock-free on the hot path; a cache
    /// miss falls through to the store. Unknown users hold zero.
    pub fn balance_of(&self, user_id: u64) -> f64 {
        if let Some(balance) = self.store.cached_balance(user_id) {
            return balance;
        }
        let loaded = self
            .store
            .begin_read()
            .and_then(|read_txn| {
                let table = read_txn.open_table(USERS)?;
                let user: Option<User> = get_record(&table, user_id)?;
                Ok(user.map(|u| u.balance))
            });
        match loaded {
            Ok(Some(balance)) => {
                self.store.cache_balance(user_id, balance);
                balance
            }
            _ => 0.0,
        }
    }

    /// Credit a confirmed deposit, at most once per idempotency key.
    /// Returns false when the key was seen before (no state change).
    pub fn apply_deposit(
        &self,
        user_id: u64,
        amount: f64,
        idempotency_key: &str,
    ) -> PoolResult<bool> {
        if amount <= 0.0 {
            return Err(PoolError::InvalidAmount(amount));
        }

        let write_txn = self.store.begin_write()?;
        let applied = {
            let mut deposits = write_txn.open_table(DEPOSITS)?;
            if deposits.get(idempotency_key)?.is_some() {
                warn!(key = %idempotency_key, user_id, "Deposit replayed, ignoring");
                None
            } else {
                let mut users = write_txn.open_table(USERS)?;
                let existing: Option<User> = get_record(&users, user_id)?;
                let mut user = existing.unwrap_or_else(|| User::new(user_id, None));
                user.balance = self.config.round_money(user.balance + amount);
                put_record(&mut users, user_id, &user)?;

                let record = DepositRecord {
                    idempotency_key: idempotency_key.to_string(),
                    user_id,
                    amount,
                    applied_at: now_ts(),
                };
                let bytes = serde_json::to_vec(&record)?;
                deposits.insert(idempotency_key, bytes.as_slice())?;
                Some(user.balance)
            }
        };
        write_txn.commit()?;

        match applied {
            Some(new_balance) => {
                self.store.cache_balance(user_id, new_balance);
                info!(user_id, amount, new_balance, "Deposit applied");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Debit a withdrawal request. Returns the remaining balance.
    pub fn withdraw(&self, user_id: u64, amount: f64) -> PoolResult<f64> {
        if amount <= 0.0 {
            return Err(PoolError::InvalidAmount(amount));
        }
        if amount < self.config.min_withdrawal {
            return Err(PoolError::WithdrawBelowMinimum {
                amount,
                minimum: self.config.min_withdrawal,
            });
        }

        let write_txn = self.store.begin_write()?;
        let new_balance = {
            let mut users = write_txn.open_table(USERS)?;
            let existing: Option<User> = get_record(&users, user_id)?;
            let mut user = existing.ok_or(PoolError::UserNotFound(user_id))?;
            if user.balance < amount {
                return Err(PoolError::InsufficientBalance {
                    available: user.balance,
                    required: amount,
                });
            }
            user.balance = self.config.round_money(user.balance - amount);
            put_record(&mut users, user_id, &user)?;
            user.balance
        };
        write_txn.commit()?;

        self.store.cache_balance(user_id, new_balance);
        info!(user_id, amount, new_balance, "Withdrawal debited");
        Ok(new_balance)
    }
}
