// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the article gateway

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub use crate::validator::ValidationError;

/// Access key rejections. Every variant maps to 401.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access key is invalid")]
    InvalidKey,

    #[error("Account period expired")]
    Expired,

    #[error("Usage Limit Reached")]
    QuotaExceeded,
}

/// Backing store failures.
///
/// The carried detail is for logs only; `Display` never includes it so
/// query text and driver messages stay server-side.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable")]
    Connectivity(String),

    #[error("Duplicate content")]
    ConstraintViolation(String),

    #[error("Store query failed")]
    QueryFailure(String),
}

impl StoreError {
    /// Driver detail, for logging.
    pub fn detail(&self) -> &str {
        match self {
            Self::Connectivity(d) | Self::ConstraintViolation(d) | Self::QueryFailure(d) => d,
        }
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        let detail = err.to_string();
        match err {
            surrealdb::Error::Db(surrealdb::error::Db::IndexExists { .. }) => {
                Self::ConstraintViolation(detail)
            }
            // Remote engines only hand back the server's message.
            surrealdb::Error::Api(_) if detail.contains("already contains") => {
                Self::ConstraintViolation(detail)
            }
            surrealdb::Error::Api(_) => Self::Connectivity(detail),
            _ => Self::QueryFailure(detail),
        }
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Too many requests")]
    RateLimited { retry_after: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transport status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) | Self::Store(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
