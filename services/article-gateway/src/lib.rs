// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Article Gateway
//!
//! Quota-gated HTTP access to ingested articles:
//!
//! - Global token bucket plus a per-source cool-down that delays, never rejects
//! - Access keys checked against an atomically swapped account snapshot
//! - Per-(target, topic) delivery cursors advanced under a per-key lock
//! - Id-relative paging and parameterised title/body search

pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod reply;
pub mod validator;

pub use config::Config;
pub use db::Database;
pub use delivery::{Delivery, Filter, Mode, Page};
pub use error::{AppError, AuthError, StoreError, ValidationError};
pub use gateway::AccessGateway;
pub use limiter::{CooldownOutcome, RateLimitResult, RateLimiter};
pub use reply::Reply;
