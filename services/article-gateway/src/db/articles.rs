// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Article table access.

use super::{query::ArticleQuery, Database};
use crate::{
    error::StoreError,
    models::{Article, ArticleRecord, NewArticle},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct UidRow {
    uid: i64,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

impl Database {
    /// Run an article select.
    pub async fn select_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, StoreError> {
        let text = query.select_text();
        debug!(query = %text, "Selecting articles");

        let mut result = self.db.query(text).bind(query.bindings().clone()).await?;
        let records: Vec<ArticleRecord> = result.take(0)?;

        Ok(records.into_iter().map(Article::from).collect())
    }

    /// Count the rows an article query would match, ignoring its limit.
    pub async fn count_articles(&self, query: &ArticleQuery) -> Result<u64, StoreError> {
        let mut result = self
            .db
            .query(query.count_text())
            .bind(query.bindings().clone())
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;

        Ok(rows.first().map_or(0, |row| row.total))
    }

    /// Insert an article stamped with the current time.
    ///
    /// Returns `None` when the (topic, link) pair already exists; duplicates
    /// are an expected ingestion outcome, not an error.
    pub async fn insert_article(&self, article: &NewArticle) -> Result<Option<i64>, StoreError> {
        self.insert_article_at(article, Utc::now()).await
    }

    /// Insert an article with an explicit creation time.
    pub async fn insert_article_at(
        &self,
        article: &NewArticle,
        created: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        let _guard = self.insert_lock.lock().await;

        let mut result = self
            .db
            .query("SELECT uid FROM articles ORDER BY uid DESC LIMIT 1")
            .await?;
        let last: Vec<UidRow> = result.take(0)?;
        let uid = last.first().map_or(1, |row| row.uid + 1);

        let record = ArticleRecord {
            uid,
            title: truncate_chars(&article.title, 128),
            body: article.content.clone(),
            author: article.author.clone(),
            email: article.email.clone(),
            topic: article.topic.clone(),
            cat: truncate_chars(&article.cat, 512),
            link: normalize_link(&article.link),
            detail: serde_json::json!({ "img": article.image }),
            rating: 0,
            created: created.timestamp_micros(),
        };

        let outcome = self
            .db
            .query("CREATE articles CONTENT $record")
            .bind(("record", record))
            .await
            .and_then(|response| response.check());

        match outcome.map_err(StoreError::from) {
            Ok(_) => {
                info!(uid, topic = %article.topic, "Article inserted");
                Ok(Some(uid))
            }
            Err(StoreError::ConstraintViolation(_)) => {
                info!(topic = %article.topic, link = %article.link, "Duplicate article skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Normalize a link for duplicate detection (drop fragment, lowercase host).
fn normalize_link(link: &str) -> String {
    match url::Url::parse(link) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            if let Some(host) = parsed.host_str().map(str::to_lowercase) {
                // Cannot fail: the host was just read from a valid URL.
                let _ = parsed.set_host(Some(&host));
            }
            parsed.to_string()
        }
        Err(_) => link.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_link() {
        assert_eq!(
            normalize_link("https://News.Example.COM/story/1?ref=rss#top"),
            "https://news.example.com/story/1?ref=rss"
        );
        assert_eq!(normalize_link("  not a url "), "not a url");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
