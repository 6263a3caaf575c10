// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Access key validation against an in-memory account snapshot.
//!
//! The snapshot is an immutable map behind an `Arc`, replaced wholesale on
//! reload. Usage counters live outside the map in their own `Arc` so a key
//! that survives a reload keeps counting on the same atomic, and a grant
//! racing the swap is never lost.

use crate::{
    db::Database,
    error::{AuthError, StoreError},
    models::Account,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Usage counter for one access key.
#[derive(Debug)]
pub struct UsageCounter {
    /// Granted requests, including those not yet written back
    used: AtomicI64,
    /// Portion of `used` known to be in the store
    persisted: AtomicI64,
}

impl UsageCounter {
    fn new(stored: i64) -> Self {
        Self {
            used: AtomicI64::new(stored),
            persisted: AtomicI64::new(stored),
        }
    }

    /// Adopt a freshly loaded stored value, keeping unflushed grants.
    fn rebase(&self, stored: i64) {
        let previous = self.persisted.swap(stored, Ordering::SeqCst);
        self.used.fetch_add(stored - previous, Ordering::SeqCst);
    }

    fn pending(&self) -> i64 {
        self.used.load(Ordering::SeqCst) - self.persisted.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Entry {
    allocated: i64,
    end: DateTime<Utc>,
    usage: Arc<UsageCounter>,
}

/// A granted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Usage after this request
    pub used: i64,
    pub allocated: i64,
}

impl Grant {
    pub fn remaining(&self) -> i64 {
        (self.allocated - self.used).max(0)
    }
}

/// Validates access keys and meters their usage.
#[derive(Default)]
pub struct AccessGateway {
    snapshot: RwLock<Arc<HashMap<String, Entry>>>,
    /// Serialises flush and reload
    sync: Mutex<()>,
}

impl AccessGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorize one request for `key` at the current time.
    pub async fn authorize(&self, key: &str) -> Result<Grant, AuthError> {
        self.authorize_at(key, Utc::now()).await
    }

    /// Authorize one request for `key` as of `now`.
    ///
    /// Expiry is checked before quota. A grant increments usage atomically;
    /// it succeeds while usage is below the allocation, so the request that
    /// brings usage to exactly `allocated` is the last one granted.
    pub async fn authorize_at(&self, key: &str, now: DateTime<Utc>) -> Result<Grant, AuthError> {
        let snapshot = self.snapshot.read().await.clone();

        let Some(entry) = snapshot.get(key) else {
            debug!("Unknown access key");
            return Err(AuthError::InvalidKey);
        };

        if entry.end <= now {
            debug!(end = %entry.end, "Account period expired");
            return Err(AuthError::Expired);
        }

        let allocated = entry.allocated;
        match entry
            .usage
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < allocated).then_some(used + 1)
            }) {
            Ok(previous) => Ok(Grant {
                used: previous + 1,
                allocated,
            }),
            Err(used) => {
                debug!(used, allocated, "Usage limit reached");
                Err(AuthError::QuotaExceeded)
            }
        }
    }

    /// Current usage for `key`, including unflushed grants.
    pub async fn usage(&self, key: &str) -> Option<i64> {
        let snapshot = self.snapshot.read().await.clone();
        snapshot
            .get(key)
            .map(|entry| entry.usage.used.load(Ordering::SeqCst))
    }

    /// Swap in a new snapshot built from `accounts`.
    ///
    /// Keys present in both snapshots keep their counter; the stored usage
    /// is adopted and grants not yet flushed are carried over.
    pub async fn replace(&self, accounts: Vec<Account>) {
        let current = self.snapshot.read().await.clone();

        let mut next = HashMap::with_capacity(accounts.len());
        for account in accounts {
            let usage = match current.get(&account.apikey) {
                Some(entry) => {
                    entry.usage.rebase(account.used);
                    Arc::clone(&entry.usage)
                }
                None => Arc::new(UsageCounter::new(account.used)),
            };
            next.insert(
                account.apikey,
                Entry {
                    allocated: account.allocated,
                    end: account.end,
                    usage,
                },
            );
        }

        let count = next.len();
        *self.snapshot.write().await = Arc::new(next);
        info!(accounts = count, "Account snapshot replaced");
    }

    /// Write unflushed usage back to the store.
    pub async fn flush(&self, db: &Database) -> Result<(), StoreError> {
        let _sync = self.sync.lock().await;
        self.flush_locked(db).await
    }

    async fn flush_locked(&self, db: &Database) -> Result<(), StoreError> {
        let snapshot = self.snapshot.read().await.clone();
        let mut flushed = 0usize;

        for (key, entry) in snapshot.iter() {
            let delta = entry.usage.pending();
            if delta <= 0 {
                continue;
            }
            db.add_usage(key, delta).await?;
            entry.usage.persisted.fetch_add(delta, Ordering::SeqCst);
            flushed += 1;
        }

        if flushed > 0 {
            debug!(keys = flushed, "Usage flushed");
        }
        Ok(())
    }

    /// Flush usage, then reload the snapshot from the store.
    pub async fn reload(&self, db: &Database) -> Result<(), StoreError> {
        let _sync = self.sync.lock().await;
        self.flush_locked(db).await?;
        let accounts = db.load_accounts().await?;
        self.replace(accounts).await;
        Ok(())
    }

    /// Reload on a fixed interval until the task is aborted.
    pub fn spawn_reload(self: Arc<Self>, db: Database, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately; startup already loaded.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = self.reload(&db).await {
                    warn!(error = %e, detail = e.detail(), "Account reload failed");
                }
            }
        })
    }
}
