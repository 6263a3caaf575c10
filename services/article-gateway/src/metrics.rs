// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the article API.
//!
//! - `gateway_requests_total{outcome}`: API requests by response class
//! - `gateway_cooldown_holds_total`: requests held by the per-source cool-down

use prometheus::{CounterVec, Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Request outcome label values.
pub mod outcome {
    pub const DATA: &str = "data";
    pub const EMPTY: &str = "empty";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const ERROR: &str = "error";
}

/// Registered gateway metrics.
pub struct Metrics {
    registry: Registry,
    requests_total: CounterVec,
    cooldown_holds_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("gateway_requests_total", "Total API requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let cooldown_holds_total = IntCounter::new(
            "gateway_cooldown_holds_total",
            "Requests delayed by the per-source cool-down",
        )?;
        registry.register(Box::new(cooldown_holds_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            cooldown_holds_total,
        })
    }

    pub fn record(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_hold(&self) {
        self.cooldown_holds_total.inc();
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
