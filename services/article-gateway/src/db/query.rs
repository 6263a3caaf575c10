// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Parameterised article query construction.
//!
//! Query text is assembled only from fixed fragments and generated
//! parameter names. Caller-supplied values (topics, ids, search terms) are
//! carried in the binding map and never appear in the text itself.

use crate::models::Watermark;
use serde_json::{Map, Value};

/// Fields selected for every article query.
pub const ARTICLE_FIELDS: &str =
    "uid, title, body, author, email, topic, cat, link, detail, rating, created";

/// Text columns that term filters may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    Body,
    Cat,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
            Self::Cat => "cat",
        }
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Creation time ascending, uid breaking ties
    CreatedAsc,
    /// Creation time descending, uid breaking ties
    CreatedDesc,
    UidAsc,
    UidDesc,
}

impl Order {
    fn clause(self) -> &'static str {
        match self {
            Self::CreatedAsc => "ORDER BY created ASC, uid ASC",
            Self::CreatedDesc => "ORDER BY created DESC, uid DESC",
            Self::UidAsc => "ORDER BY uid ASC",
            Self::UidDesc => "ORDER BY uid DESC",
        }
    }
}

/// A select over the articles table.
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    clauses: Vec<String>,
    bindings: Map<String, Value>,
    order: Order,
    limit: u32,
}

impl ArticleQuery {
    pub fn new(order: Order, limit: u32) -> Self {
        Self {
            clauses: Vec::new(),
            bindings: Map::new(),
            order,
            limit,
        }
    }

    /// Restrict to one topic.
    pub fn topic(mut self, topic: &str) -> Self {
        let p = self.bind(topic);
        self.clauses.push(format!("topic = {p}"));
        self
    }

    pub fn uid_eq(mut self, uid: i64) -> Self {
        let p = self.bind(uid);
        self.clauses.push(format!("uid = {p}"));
        self
    }

    pub fn uid_after(mut self, uid: i64) -> Self {
        let p = self.bind(uid);
        self.clauses.push(format!("uid > {p}"));
        self
    }

    pub fn uid_before(mut self, uid: i64) -> Self {
        let p = self.bind(uid);
        self.clauses.push(format!("uid < {p}"));
        self
    }

    /// Articles strictly after a cursor position.
    pub fn after(mut self, mark: Watermark) -> Self {
        let at = self.bind(mark.at);
        let uid = self.bind(mark.uid);
        self.clauses
            .push(format!("(created > {at} OR (created = {at} AND uid > {uid}))"));
        self
    }

    /// Articles strictly before a cursor position.
    pub fn before(mut self, mark: Watermark) -> Self {
        let at = self.bind(mark.at);
        let uid = self.bind(mark.uid);
        self.clauses
            .push(format!("(created < {at} OR (created = {at} AND uid < {uid}))"));
        self
    }

    /// Require `column` to contain any of `terms`. No terms, no restriction.
    ///
    /// Terms are expected lower-cased; the column is lower-cased server-side.
    pub fn matching(mut self, column: Column, terms: &[String]) -> Self {
        if terms.is_empty() {
            return self;
        }
        let alternatives: Vec<String> = terms
            .iter()
            .map(|term| {
                let p = self.bind(term.as_str());
                format!("string::contains(string::lowercase({}), {p})", column.name())
            })
            .collect();
        self.clauses.push(format!("({})", alternatives.join(" OR ")));
        self
    }

    pub fn bindings(&self) -> &Map<String, Value> {
        &self.bindings
    }

    /// `SELECT` statement text.
    pub fn select_text(&self) -> String {
        format!(
            "SELECT {ARTICLE_FIELDS} FROM articles{} {} LIMIT {}",
            self.where_text(),
            self.order.clause(),
            self.limit
        )
    }

    /// Counting statement text; ordering and limit do not apply.
    pub fn count_text(&self) -> String {
        format!(
            "SELECT count() AS total FROM articles{} GROUP ALL",
            self.where_text()
        )
    }

    fn where_text(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn bind(&mut self, value: impl Into<Value>) -> String {
        let name = format!("p{}", self.bindings.len());
        self.bindings.insert(name.clone(), value.into());
        format!("${name}")
    }
}
