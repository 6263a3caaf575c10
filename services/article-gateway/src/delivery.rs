// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Article delivery: the per-consumer cursor protocol plus id-relative and
//! search-based browsing.
//!
//! Forward cursor fetches (`next`, `next_message`) run under the
//! (target, topic) cursor lock: initialise, select and advance form one
//! unit, so concurrent callers sharing a cursor neither overlap nor skip.
//! Everything else is read-only with respect to cursors.

use crate::{
    config::DeliveryConfig,
    db::{ArticleQuery, Column, Database, Order},
    error::Result,
    models::{Article, ConsumerCursor, Watermark},
    validator::{clamp_limit, filter_terms, keyword_terms, parse_article_id, search_terms},
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// How an empty result should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cursor path: empty means no new content
    Cursor,
    /// Browsing path: empty means nothing matched
    Browse,
}

/// Articles returned by one delivery operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub articles: Vec<Article>,
    pub mode: Mode,
}

impl Page {
    fn cursor(articles: Vec<Article>) -> Self {
        Self {
            articles,
            mode: Mode::Cursor,
        }
    }

    fn browse(articles: Vec<Article>) -> Self {
        Self {
            articles,
            mode: Mode::Browse,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Content and category restrictions, each an OR of terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    keywords: Vec<String>,
    categories: Vec<String>,
}

impl Filter {
    /// No restriction.
    pub fn none() -> Self {
        Self::default()
    }

    /// Comma-separated terms matched against the article body.
    pub fn content(filter: &str) -> Self {
        Self {
            keywords: filter_terms(filter),
            categories: Vec::new(),
        }
    }

    /// Add comma-separated terms matched against the category tags.
    pub fn with_categories(mut self, categories: &str) -> Self {
        self.categories = filter_terms(categories);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.categories.is_empty()
    }

    fn apply(&self, query: ArticleQuery) -> ArticleQuery {
        query
            .matching(Column::Body, &self.keywords)
            .matching(Column::Cat, &self.categories)
    }
}

/// Render an article as a chat message.
pub fn render_message(article: &Article, include_body: bool) -> String {
    if include_body {
        format!(
            "*{}*\n _{}_ [{}]",
            article.title, article.content, article.link
        )
    } else {
        format!("*{}*\n [{}]", article.title, article.link)
    }
}

/// The delivery engine.
#[derive(Clone)]
pub struct Delivery {
    db: Database,
    config: DeliveryConfig,
}

impl Delivery {
    pub fn new(db: Database, config: DeliveryConfig) -> Self {
        Self { db, config }
    }

    fn clamp(&self, limit: u32) -> Result<u32> {
        Ok(clamp_limit(limit, self.config.max_limit)?)
    }

    /// Articles after the caller's cursor, oldest first. Advances the cursor
    /// to the last article returned.
    pub async fn next(&self, target: &str, topic: &str, limit: u32, filter: &Filter) -> Result<Page> {
        self.next_at(target, topic, limit, filter, Utc::now()).await
    }

    /// `next` with an explicit clock, which sets the initial cursor of a
    /// target seen for the first time.
    pub async fn next_at(
        &self,
        target: &str,
        topic: &str,
        limit: u32,
        filter: &Filter,
        now: DateTime<Utc>,
    ) -> Result<Page> {
        let limit = self.clamp(limit)?;
        let articles = self
            .forward(target, &self.config.default_platform, topic, now, |mark| {
                filter.apply(
                    ArticleQuery::new(Order::CreatedAsc, limit)
                        .topic(topic)
                        .after(mark),
                )
            })
            .await?;

        Ok(Page::cursor(articles))
    }

    /// Articles before the caller's cursor, newest first. Never moves the
    /// cursor.
    pub async fn prev(&self, target: &str, topic: &str, limit: u32, filter: &Filter) -> Result<Page> {
        self.prev_at(target, topic, limit, filter, Utc::now()).await
    }

    pub async fn prev_at(
        &self,
        target: &str,
        topic: &str,
        limit: u32,
        filter: &Filter,
        now: DateTime<Utc>,
    ) -> Result<Page> {
        let limit = self.clamp(limit)?;
        let cursor = {
            let _guard = self.db.lock_cursor(target, topic).await;
            self.db
                .ensure_cursor(target, topic, &self.config.default_platform, now)
                .await?
        };

        let query = filter.apply(
            ArticleQuery::new(Order::CreatedDesc, limit)
                .topic(topic)
                .before(cursor.watermark()),
        );
        Ok(Page::browse(self.db.select_articles(&query).await?))
    }

    /// Single article by uid.
    pub async fn by_id(&self, article_id: &str) -> Result<Page> {
        let uid = parse_article_id(article_id)?;
        let query = ArticleQuery::new(Order::UidAsc, 1).uid_eq(uid);
        Ok(Page::browse(self.db.select_articles(&query).await?))
    }

    /// Articles with a uid above `article_id`, ascending.
    pub async fn next_by_id(
        &self,
        article_id: &str,
        limit: u32,
        filter: &Filter,
        topic: &str,
    ) -> Result<Page> {
        let uid = parse_article_id(article_id)?;
        let limit = self.clamp(limit)?;
        let query = filter.apply(
            ArticleQuery::new(Order::UidAsc, limit)
                .uid_after(uid)
                .topic(topic),
        );
        Ok(Page::browse(self.db.select_articles(&query).await?))
    }

    /// Articles with a uid below `article_id`, descending.
    pub async fn prev_by_id(
        &self,
        article_id: &str,
        limit: u32,
        filter: &Filter,
        topic: &str,
    ) -> Result<Page> {
        let uid = parse_article_id(article_id)?;
        let limit = self.clamp(limit)?;
        let query = filter.apply(
            ArticleQuery::new(Order::UidDesc, limit)
                .uid_before(uid)
                .topic(topic),
        );
        Ok(Page::browse(self.db.select_articles(&query).await?))
    }

    /// Percent-encoded title search; whitespace-separated terms are ORed.
    pub async fn by_title(&self, search: &str, limit: u32, topic: &str) -> Result<Page> {
        self.search(Column::Title, search, limit, topic).await
    }

    /// Percent-encoded body search; whitespace-separated terms are ORed.
    pub async fn by_content(&self, search: &str, limit: u32, topic: &str) -> Result<Page> {
        self.search(Column::Body, search, limit, topic).await
    }

    async fn search(&self, column: Column, search: &str, limit: u32, topic: &str) -> Result<Page> {
        let terms = search_terms(search)?;
        let limit = self.clamp(limit)?;
        debug!(?column, terms = terms.len(), %topic, "Searching articles");

        let query = ArticleQuery::new(Order::CreatedDesc, limit)
            .topic(topic)
            .matching(column, &terms);
        Ok(Page::browse(self.db.select_articles(&query).await?))
    }

    /// Newest articles for a topic by uid, without touching any cursor.
    pub async fn latest_by_filter(&self, limit: u32, filter: &Filter, topic: &str) -> Result<Page> {
        let limit = self.clamp(limit)?;
        let query = filter.apply(ArticleQuery::new(Order::UidDesc, limit).topic(topic));
        Ok(Page::browse(self.db.select_articles(&query).await?))
    }

    /// Deliver the next single article as a rendered message.
    ///
    /// A keyword longer than three characters restricts to titles matching
    /// any of its words. Advances the cursor like `next`.
    pub async fn next_message(
        &self,
        target: &str,
        platform: &str,
        topic: &str,
        keyword: Option<&str>,
    ) -> Result<Option<String>> {
        let terms = keyword.map(keyword_terms).unwrap_or_default();
        let articles = self
            .forward(target, platform, topic, Utc::now(), |mark| {
                ArticleQuery::new(Order::CreatedAsc, 1)
                    .topic(topic)
                    .after(mark)
                    .matching(Column::Title, &terms)
            })
            .await?;

        Ok(articles
            .first()
            .map(|article| render_message(article, self.config.include_body)))
    }

    /// How many articles for `topic` are past the caller's cursor.
    ///
    /// A target without a cursor is counted from where its cursor would
    /// start; no cursor is created.
    pub async fn behind(&self, target: &str, topic: &str) -> Result<u64> {
        let mark = match self.db.find_cursor(target, topic).await? {
            Some(cursor) => cursor.watermark(),
            None => Watermark::initial(Utc::now()),
        };
        let query = ArticleQuery::new(Order::CreatedAsc, 1).topic(topic).after(mark);
        Ok(self.db.count_articles(&query).await?)
    }

    /// Targets with a live cursor on `platform`.
    pub async fn live_targets(&self, platform: &str) -> Result<Vec<String>> {
        Ok(self.db.live_targets(platform).await?)
    }

    /// Current cursor for (target, topic), if any.
    pub async fn cursor(&self, target: &str, topic: &str) -> Result<Option<ConsumerCursor>> {
        Ok(self.db.find_cursor(target, topic).await?)
    }

    /// Locked initialise, select, advance.
    async fn forward<F>(
        &self,
        target: &str,
        platform: &str,
        topic: &str,
        now: DateTime<Utc>,
        build: F,
    ) -> Result<Vec<Article>>
    where
        F: FnOnce(Watermark) -> ArticleQuery,
    {
        let _guard = self.db.lock_cursor(target, topic).await;

        let cursor = self.db.ensure_cursor(target, topic, platform, now).await?;
        let articles = self.db.select_articles(&build(cursor.watermark())).await?;

        if let Some(last) = articles.last() {
            let mark = last.watermark();
            self.db.advance_cursor(target, topic, mark, now).await?;
            info!(
                %target,
                %topic,
                delivered = articles.len(),
                last_uid = mark.uid,
                "Cursor advanced"
            );
        }

        Ok(articles)
    }
}
