// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Account table access.

use super::Database;
use crate::{
    error::StoreError,
    models::{Account, AccountRecord},
};

impl Database {
    /// Load every provisioned account.
    pub async fn load_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let mut result = self
            .db
            .query("SELECT apikey, email, otpkey, plan, allocated, used, end_at FROM accounts")
            .await?;
        let records: Vec<AccountRecord> = result.take(0)?;

        Ok(records.into_iter().map(Account::from).collect())
    }

    /// Create or replace an account by access key.
    pub async fn put_account(&self, account: &Account) -> Result<(), StoreError> {
        self.db
            .query("DELETE accounts WHERE apikey = $apikey; CREATE accounts CONTENT $record;")
            .bind(("apikey", account.apikey.clone()))
            .bind(("record", AccountRecord::from(account)))
            .await?
            .check()?;

        Ok(())
    }

    /// Add granted requests to the stored usage counter.
    pub async fn add_usage(&self, apikey: &str, delta: i64) -> Result<(), StoreError> {
        self.db
            .query("UPDATE accounts SET used += $delta WHERE apikey = $apikey")
            .bind(("delta", delta))
            .bind(("apikey", apikey.to_string()))
            .await?
            .check()?;

        Ok(())
    }
}
