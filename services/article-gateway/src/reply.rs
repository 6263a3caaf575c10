// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome to wire mapping.
//!
//! | outcome                      | code | body          |
//! |------------------------------|------|---------------|
//! | articles found               | 200  | JSON array    |
//! | empty, cursor path           | 204  | none          |
//! | empty, browsing              | 206  | `[]`          |
//! | validation or store failure  | 400  | error text    |
//! | bad, expired or spent key    | 401  | error text    |
//! | rate limited                 | 429  | error text    |

use crate::{
    delivery::{Mode, Page},
    error::AppError,
};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

const EMPTY: &str = "[]";

/// Transport-agnostic reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub code: u16,
    pub msg: String,
    /// Whole seconds a rate-limited caller should wait
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl Reply {
    pub fn from_page(page: &Page) -> Self {
        if page.is_empty() {
            let code = match page.mode {
                Mode::Cursor => StatusCode::NO_CONTENT,
                Mode::Browse => StatusCode::PARTIAL_CONTENT,
            };
            return Self::new(code, EMPTY.to_string());
        }

        match serde_json::to_string(&page.articles) {
            Ok(json) => Self::new(StatusCode::OK, json),
            Err(e) => Self::from_error(&AppError::Internal(e.to_string())),
        }
    }

    /// Error reply. Store and internal details are logged, never returned.
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::Store(store) => {
                warn!(error = %store, detail = store.detail(), "Store failure");
            }
            AppError::Internal(detail) => warn!(%detail, "Internal failure"),
            _ => {}
        }

        let msg = match err {
            AppError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        let retry_after = match err {
            AppError::RateLimited { retry_after } => {
                // Round up so a client honouring the header never retries early.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        };

        Self {
            code: err.status().as_u16(),
            msg,
            retry_after,
        }
    }

    pub fn from_result(result: &crate::error::Result<Page>) -> Self {
        match result {
            Ok(page) => Self::from_page(page),
            Err(err) => Self::from_error(err),
        }
    }

    fn new(code: StatusCode, msg: String) -> Self {
        Self {
            code: code.as_u16(),
            msg,
            retry_after: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::BAD_REQUEST)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.status();

        // 204 carries no body at the HTTP level.
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let content_type = if status.is_success() {
            "application/json"
        } else {
            "text/plain; charset=utf-8"
        };

        let mut response = (
            status,
            [(header::CONTENT_TYPE, content_type)],
            self.msg,
        )
            .into_response();

        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
