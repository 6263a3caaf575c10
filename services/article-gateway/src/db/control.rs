// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Control table access: per-(target, topic) delivery cursors.

use super::Database;
use crate::{
    error::StoreError,
    models::{ConsumerCursor, ControlRecord, Watermark},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Idle lock entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per (target, topic).
///
/// Holding the guard makes cursor initialisation, the article select and
/// the cursor advance a single unit for that key.
#[derive(Default)]
pub struct CursorLocks {
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl CursorLocks {
    pub async fn acquire(&self, target: &str, topic: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > PRUNE_THRESHOLD {
                // Only the map holds a reference to idle entries.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry((target.to_string(), topic.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Deserialize)]
struct TargetRow {
    target: String,
}

const CONTROL_FIELDS: &str =
    "target, topic, cursor_at, cursor_uid, updated_at, platform, is_live, note";

impl Database {
    /// Take the cursor lock for (target, topic).
    pub async fn lock_cursor(&self, target: &str, topic: &str) -> OwnedMutexGuard<()> {
        self.cursor_locks.acquire(target, topic).await
    }

    /// Fetch the cursor for (target, topic), if one exists.
    pub async fn find_cursor(
        &self,
        target: &str,
        topic: &str,
    ) -> Result<Option<ConsumerCursor>, StoreError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {CONTROL_FIELDS} FROM control WHERE target = $target AND topic = $topic"
            ))
            .bind(("target", target.to_string()))
            .bind(("topic", topic.to_string()))
            .await?;
        let records: Vec<ControlRecord> = result.take(0)?;

        Ok(records.into_iter().next().map(ConsumerCursor::from))
    }

    /// Fetch the cursor for (target, topic), creating it on first contact
    /// one day behind `now`.
    pub async fn ensure_cursor(
        &self,
        target: &str,
        topic: &str,
        platform: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumerCursor, StoreError> {
        if let Some(cursor) = self.find_cursor(target, topic).await? {
            return Ok(cursor);
        }

        let record = ControlRecord {
            target: target.to_string(),
            topic: topic.to_string(),
            cursor_at: Watermark::initial(now).at,
            cursor_uid: 0,
            updated_at: now.timestamp_micros(),
            platform: platform.to_string(),
            is_live: true,
            note: "Created on first touch".to_string(),
        };

        let created = self
            .db
            .query("CREATE control CONTENT $record")
            .bind(("record", record.clone()))
            .await
            .and_then(|response| response.check())
            .map_err(StoreError::from);

        match created {
            Ok(_) => {
                info!(%target, %topic, %platform, "Control record created");
                Ok(record.into())
            }
            // Another process created it between our read and write.
            Err(StoreError::ConstraintViolation(_)) => self
                .find_cursor(target, topic)
                .await?
                .ok_or_else(|| StoreError::QueryFailure("control record vanished".to_string())),
            Err(e) => Err(e),
        }
    }

    /// Move the cursor forward to `mark`.
    ///
    /// The update only applies when `mark` is past the stored position, so
    /// a stale writer can never move a cursor backwards. Returns whether
    /// the cursor moved.
    pub async fn advance_cursor(
        &self,
        target: &str,
        topic: &str,
        mark: Watermark,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut result = self
            .db
            .query(format!(
                "UPDATE control SET cursor_at = $at, cursor_uid = $uid, updated_at = $now \
                 WHERE target = $target AND topic = $topic \
                 AND (cursor_at < $at OR (cursor_at = $at AND cursor_uid < $uid)) \
                 RETURN {CONTROL_FIELDS}"
            ))
            .bind(("at", mark.at))
            .bind(("uid", mark.uid))
            .bind(("now", now.timestamp_micros()))
            .bind(("target", target.to_string()))
            .bind(("topic", topic.to_string()))
            .await?;
        let updated: Vec<ControlRecord> = result.take(0)?;

        debug!(%target, %topic, at = mark.at, uid = mark.uid, moved = !updated.is_empty(), "Cursor advance");
        Ok(!updated.is_empty())
    }

    /// Mark a cursor live or dormant.
    pub async fn set_cursor_live(
        &self,
        target: &str,
        topic: &str,
        live: bool,
    ) -> Result<(), StoreError> {
        self.db
            .query("UPDATE control SET is_live = $live WHERE target = $target AND topic = $topic")
            .bind(("live", live))
            .bind(("target", target.to_string()))
            .bind(("topic", topic.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    /// Targets with a live cursor on `platform`, sorted and de-duplicated.
    pub async fn live_targets(&self, platform: &str) -> Result<Vec<String>, StoreError> {
        let mut result = self
            .db
            .query("SELECT target FROM control WHERE platform = $platform AND is_live = true")
            .bind(("platform", platform.to_string()))
            .await?;
        let rows: Vec<TargetRow> = result.take(0)?;

        let mut targets: Vec<String> = rows.into_iter().map(|row| row.target).collect();
        targets.sort();
        targets.dedup();
        Ok(targets)
    }
}
