// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures for the article gateway integration tests.
//!
//! Each test binary uses a different subset.
#![allow(dead_code)]

pub mod fixtures;
pub mod generators;
