// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Data models for articles, accounts and consumer cursors.
//!
//! `*Record` types mirror stored rows, with timestamps as integer
//! microseconds since the epoch. The remaining types are what the rest of
//! the service works with.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Convert a stored microsecond timestamp back to a UTC datetime.
pub fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
}

/// An ingested content item, as delivered to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub uid: i64,
    pub title: String,
    #[serde(rename = "desc")]
    pub content: String,
    pub author: String,
    pub email: String,
    pub topic: String,
    pub cat: String,
    pub link: String,
    pub detail: Value,
    pub rating: i64,
    pub created: DateTime<Utc>,
}

impl Article {
    /// Cursor position of this article.
    pub fn watermark(&self) -> Watermark {
        Watermark {
            at: self.created.timestamp_micros(),
            uid: self.uid,
        }
    }
}

/// Stored article row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub uid: i64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub email: String,
    pub topic: String,
    pub cat: String,
    pub link: String,
    #[serde(default)]
    pub detail: Value,
    #[serde(default)]
    pub rating: i64,
    pub created: i64,
}

impl From<ArticleRecord> for Article {
    fn from(r: ArticleRecord) -> Self {
        Self {
            uid: r.uid,
            title: r.title,
            content: r.body,
            author: r.author,
            email: r.email,
            topic: r.topic,
            cat: r.cat,
            link: r.link,
            detail: r.detail,
            rating: r.rating,
            created: from_micros(r.created),
        }
    }
}

/// Article handed over by the ingestion pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewArticle {
    pub topic: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub email: String,
    pub cat: String,
    pub link: String,
    /// Extracted image URL, stored under `detail.img`
    #[serde(default)]
    pub image: String,
}

/// A provisioned access key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub apikey: String,
    pub email: String,
    pub otpkey: String,
    pub plan: String,
    pub allocated: i64,
    pub used: i64,
    pub end: DateTime<Utc>,
}

/// Stored account row. `end_at` holds the subscription end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub apikey: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otpkey: String,
    #[serde(default)]
    pub plan: String,
    pub allocated: i64,
    #[serde(default)]
    pub used: i64,
    pub end_at: i64,
}

impl From<AccountRecord> for Account {
    fn from(r: AccountRecord) -> Self {
        Self {
            apikey: r.apikey,
            email: r.email,
            otpkey: r.otpkey,
            plan: r.plan,
            allocated: r.allocated,
            used: r.used,
            end: from_micros(r.end_at),
        }
    }
}

impl From<&Account> for AccountRecord {
    fn from(a: &Account) -> Self {
        Self {
            apikey: a.apikey.clone(),
            email: a.email.clone(),
            otpkey: a.otpkey.clone(),
            plan: a.plan.clone(),
            allocated: a.allocated,
            used: a.used,
            end_at: a.end.timestamp_micros(),
        }
    }
}

/// Position in the article stream: creation time, then uid for ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    /// Creation time in microseconds since the epoch
    pub at: i64,
    pub uid: i64,
}

impl Watermark {
    /// Watermark handed to a target on first contact: one day back.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            at: (now - Duration::days(1)).timestamp_micros(),
            uid: 0,
        }
    }
}

/// Per-(target, topic) delivery cursor, the "control" record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerCursor {
    pub target: String,
    pub topic: String,
    /// Creation time of the most recently delivered article
    pub timestamp: DateTime<Utc>,
    /// Uid of the most recently delivered article, 0 before the first delivery
    pub last_uid: i64,
    pub last_update: DateTime<Utc>,
    pub platform: String,
    pub live: bool,
    pub note: String,
}

impl ConsumerCursor {
    pub fn watermark(&self) -> Watermark {
        Watermark {
            at: self.timestamp.timestamp_micros(),
            uid: self.last_uid,
        }
    }
}

/// Stored control row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRecord {
    pub target: String,
    pub topic: String,
    pub cursor_at: i64,
    #[serde(default)]
    pub cursor_uid: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub note: String,
}

impl From<ControlRecord> for ConsumerCursor {
    fn from(r: ControlRecord) -> Self {
        Self {
            target: r.target,
            topic: r.topic,
            timestamp: from_micros(r.cursor_at),
            last_uid: r.cursor_uid,
            last_update: from_micros(r.updated_at),
            platform: r.platform,
            live: r.is_live,
            note: r.note,
        }
    }
}
