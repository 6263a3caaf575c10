// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Store-backed fixtures on the in-process engine.

use super::generators;
use article_gateway::{
    config::{Config, DeliveryConfig},
    db::Database,
    delivery::Delivery,
    models::{Account, NewArticle},
};
use chrono::{DateTime, Duration, Utc};

/// Fresh, empty in-memory store.
pub async fn memory_db() -> Database {
    Database::connect_memory()
        .await
        .expect("in-memory store should start")
}

/// Insert `article` with a fixed creation time, returning its uid.
pub async fn insert_at(db: &Database, article: &NewArticle, created: DateTime<Utc>) -> i64 {
    db.insert_article_at(article, created)
        .await
        .expect("insert should succeed")
        .expect("article should not be a duplicate")
}

/// Insert `count` articles for `topic`, `step` apart starting at `start`.
/// Numbering starts at `first` so links stay unique across calls.
pub async fn seed(
    db: &Database,
    topic: &str,
    first: usize,
    count: usize,
    start: DateTime<Utc>,
    step: Duration,
) -> Vec<i64> {
    let mut uids = Vec::with_capacity(count);
    for i in 0..count {
        let article = generators::article(topic, first + i);
        uids.push(insert_at(db, &article, start + step * i as i32).await);
    }
    uids
}

pub fn delivery(db: &Database) -> Delivery {
    Delivery::new(db.clone(), DeliveryConfig::default())
}

pub fn delivery_with(db: &Database, config: DeliveryConfig) -> Delivery {
    Delivery::new(db.clone(), config)
}

pub fn account(key: &str, allocated: i64, used: i64, end: DateTime<Utc>) -> Account {
    Account {
        apikey: key.to_string(),
        email: format!("{key}@example.com"),
        otpkey: String::new(),
        plan: "standard".to_string(),
        allocated,
        used,
        end,
    }
}

/// Configuration for HTTP tests: no cool-down, generous global bucket.
pub fn open_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.rate_per_sec = 1_000.0;
    config.rate_limit.burst = 1_000;
    config.rate_limit.cooldown_secs = 0;
    config
}
