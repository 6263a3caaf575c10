// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SurrealDB integration for articles, accounts and consumer cursors.
//!
//! The engine is chosen by endpoint: `ws://` reaches a SurrealDB server,
//! `mem://` runs the in-process engine.

mod accounts;
mod articles;
mod control;
pub mod query;

use crate::{config::DatabaseConfig, error::StoreError};
use std::sync::Arc;
use surrealdb::{
    engine::any::{self, Any},
    opt::auth::Root,
    Surreal,
};
use tokio::sync::Mutex;
use tracing::info;

pub use control::CursorLocks;
pub use query::{ArticleQuery, Column, Order};

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    db: Surreal<Any>,
    /// Serialises cursor read-modify-write per (target, topic)
    cursor_locks: Arc<CursorLocks>,
    /// Serialises uid assignment for inserts from this process
    insert_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Connect using the configured endpoint and credentials.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let db = any::connect(config.endpoint.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        Self::init_schema(&db).await?;
        info!(endpoint = %config.endpoint, "Connected to article store");

        Ok(Self {
            db,
            cursor_locks: Arc::new(CursorLocks::default()),
            insert_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Connect to a fresh in-process engine.
    pub async fn connect_memory() -> Result<Self, StoreError> {
        Self::connect(&DatabaseConfig {
            endpoint: "mem://".to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    /// Initialize database schema
    async fn init_schema(db: &Surreal<Any>) -> Result<(), StoreError> {
        db.query(
            r#"
            DEFINE TABLE IF NOT EXISTS accounts SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS accounts_apikey ON accounts COLUMNS apikey UNIQUE;

            DEFINE TABLE IF NOT EXISTS articles SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS articles_uid ON articles COLUMNS uid UNIQUE;
            DEFINE INDEX IF NOT EXISTS articles_topic_link ON articles COLUMNS topic, link UNIQUE;
            DEFINE INDEX IF NOT EXISTS articles_topic_created ON articles COLUMNS topic, created;

            DEFINE TABLE IF NOT EXISTS control SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS control_target_topic ON control COLUMNS target, topic UNIQUE;
            DEFINE INDEX IF NOT EXISTS control_platform ON control COLUMNS platform;
        "#,
        )
        .await?
        .check()?;

        Ok(())
    }
}
