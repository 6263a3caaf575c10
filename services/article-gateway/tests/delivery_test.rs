// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Delivery engine tests against the in-process store.

mod harness;

use article_gateway::{
    config::DeliveryConfig,
    delivery::{Filter, Mode},
    error::{AppError, ValidationError},
    models::Watermark,
};
use chrono::{Duration, Utc};
use harness::{fixtures, generators};
use std::collections::HashSet;

#[tokio::test]
async fn test_new_target_sees_last_day_ascending() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();

    // Too old, inside the window, and another topic.
    fixtures::seed(&db, "general", 0, 3, now - Duration::hours(30), Duration::minutes(1)).await;
    let fresh =
        fixtures::seed(&db, "general", 100, 12, now - Duration::hours(20), Duration::minutes(1))
            .await;
    fixtures::seed(&db, "sport", 200, 2, now - Duration::hours(1), Duration::minutes(1)).await;

    let delivery = fixtures::delivery(&db);
    let page = delivery
        .next_at("key-1", "general", 10, &Filter::none(), now)
        .await
        .unwrap();

    let uids: Vec<i64> = page.articles.iter().map(|a| a.uid).collect();
    assert_eq!(uids, fresh[..10].to_vec());
    assert!(page
        .articles
        .windows(2)
        .all(|w| w[0].created <= w[1].created));
    assert!(page
        .articles
        .iter()
        .all(|a| a.topic == "general" && a.created > now - Duration::hours(24)));

    let cursor = delivery.cursor("key-1", "general").await.unwrap().unwrap();
    assert_eq!(cursor.timestamp, page.articles[9].created);
    assert_eq!(cursor.last_uid, fresh[9]);
    assert_eq!(cursor.platform, "API");
    assert!(cursor.live);
}

#[tokio::test]
async fn test_sequential_next_never_overlaps() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    let uids =
        fixtures::seed(&db, "general", 0, 7, now - Duration::hours(2), Duration::minutes(5)).await;
    let delivery = fixtures::delivery(&db);

    let first = delivery.next("k", "general", 4, &Filter::none()).await.unwrap();
    let second = delivery.next("k", "general", 4, &Filter::none()).await.unwrap();
    let third = delivery.next("k", "general", 4, &Filter::none()).await.unwrap();

    let first: Vec<i64> = first.articles.iter().map(|a| a.uid).collect();
    assert_eq!(first, uids[..4].to_vec());
    let second_uids: Vec<i64> = second.articles.iter().map(|a| a.uid).collect();
    assert_eq!(second_uids, uids[4..].to_vec());

    let cursor = delivery.cursor("k", "general").await.unwrap().unwrap();
    assert_eq!(cursor.timestamp, second.articles[2].created);

    assert!(third.is_empty());
    assert_eq!(third.mode, Mode::Cursor);
}

#[tokio::test]
async fn test_prev_does_not_move_cursor() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    let uids =
        fixtures::seed(&db, "general", 0, 9, now - Duration::hours(3), Duration::minutes(10)).await;
    let delivery = fixtures::delivery(&db);

    delivery.next("k", "general", 3, &Filter::none()).await.unwrap();
    let before = delivery.cursor("k", "general").await.unwrap().unwrap();

    let history = delivery.prev("k", "general", 5, &Filter::none()).await.unwrap();
    let history: Vec<i64> = history.articles.iter().map(|a| a.uid).collect();
    assert_eq!(history, vec![uids[1], uids[0]]);

    let after = delivery.cursor("k", "general").await.unwrap().unwrap();
    assert_eq!(before.watermark(), after.watermark());

    let next = delivery.next("k", "general", 3, &Filter::none()).await.unwrap();
    let next: Vec<i64> = next.articles.iter().map(|a| a.uid).collect();
    assert_eq!(next, uids[3..6].to_vec());
}

#[tokio::test]
async fn test_prev_on_empty_history_is_browsing_empty() {
    let db = fixtures::memory_db().await;
    let delivery = fixtures::delivery(&db);

    let page = delivery.prev("k", "general", 5, &Filter::none()).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(page.mode, Mode::Browse);
}

#[tokio::test]
async fn test_equal_timestamps_are_delivered_once() {
    let db = fixtures::memory_db().await;
    let at = Utc::now() - Duration::hours(1);
    let mut uids = Vec::new();
    for n in 0..5 {
        uids.push(fixtures::insert_at(&db, &generators::article("general", n), at).await);
    }
    let delivery = fixtures::delivery(&db);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let page = delivery.next("k", "general", 2, &Filter::none()).await.unwrap();
        seen.extend(page.articles.iter().map(|a| a.uid));
    }
    assert_eq!(seen, uids);

    let cursor = delivery.cursor("k", "general").await.unwrap().unwrap();
    assert_eq!(
        cursor.watermark(),
        Watermark {
            at: at.timestamp_micros(),
            uid: uids[4]
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_next_skips_nothing() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    let uids =
        fixtures::seed(&db, "general", 0, 30, now - Duration::hours(5), Duration::minutes(3)).await;
    let delivery = fixtures::delivery(&db);

    let mut delivered = Vec::new();
    loop {
        let (a, b) = tokio::join!(
            {
                let delivery = delivery.clone();
                tokio::spawn(async move { delivery.next("k", "general", 4, &Filter::none()).await })
            },
            {
                let delivery = delivery.clone();
                tokio::spawn(async move { delivery.next("k", "general", 4, &Filter::none()).await })
            }
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        if a.is_empty() && b.is_empty() {
            break;
        }
        delivered.extend(a.articles.iter().map(|x| x.uid));
        delivered.extend(b.articles.iter().map(|x| x.uid));
    }

    let unique: HashSet<i64> = delivered.iter().copied().collect();
    assert_eq!(unique.len(), delivered.len(), "no article delivered twice");
    assert_eq!(unique, uids.into_iter().collect::<HashSet<_>>());
}

#[tokio::test]
async fn test_limit_is_clamped_and_zero_rejected() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    fixtures::seed(&db, "general", 0, 8, now - Duration::hours(1), Duration::minutes(1)).await;
    let delivery = fixtures::delivery_with(
        &db,
        DeliveryConfig {
            max_limit: 5,
            ..DeliveryConfig::default()
        },
    );

    let page = delivery.next("k", "general", 50, &Filter::none()).await.unwrap();
    assert_eq!(page.articles.len(), 5);

    let err = delivery
        .latest_by_filter(0, &Filter::none(), "general")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::InvalidLimit(_))
    ));
}

#[tokio::test]
async fn test_malformed_id_is_a_validation_error() {
    let db = fixtures::memory_db().await;
    let delivery = fixtures::delivery(&db);

    for bad in ["abc", "1 OR 1=1", "-4", ""] {
        let err = delivery.by_id(bad).await.unwrap_err();
        assert!(
            matches!(err, AppError::Validation(ValidationError::MalformedId(_))),
            "{bad:?} should be rejected before querying"
        );
    }
    assert!(matches!(
        delivery
            .next_by_id("x", 5, &Filter::none(), "general")
            .await
            .unwrap_err(),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn test_id_pagination_and_lookup() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    let uids =
        fixtures::seed(&db, "general", 0, 6, now - Duration::hours(1), Duration::minutes(1)).await;
    fixtures::seed(&db, "sport", 50, 2, now - Duration::hours(1), Duration::minutes(1)).await;
    let delivery = fixtures::delivery(&db);

    let single = delivery.by_id(&uids[2].to_string()).await.unwrap();
    assert_eq!(single.articles.len(), 1);
    assert_eq!(single.articles[0].uid, uids[2]);
    assert_eq!(single.articles[0].detail["img"], "https://news.example.com/img/2.png");

    let forward = delivery
        .next_by_id(&uids[2].to_string(), 2, &Filter::none(), "general")
        .await
        .unwrap();
    let forward: Vec<i64> = forward.articles.iter().map(|a| a.uid).collect();
    assert_eq!(forward, vec![uids[3], uids[4]]);

    let backward = delivery
        .prev_by_id(&uids[2].to_string(), 10, &Filter::none(), "general")
        .await
        .unwrap();
    let backward: Vec<i64> = backward.articles.iter().map(|a| a.uid).collect();
    assert_eq!(backward, vec![uids[1], uids[0]]);

    let missing = delivery.by_id("999999").await.unwrap();
    assert!(missing.is_empty());
    assert_eq!(missing.mode, Mode::Browse);

    // Id browsing leaves no cursor behind.
    assert!(delivery.live_targets("API").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_filters_match_any_term() {
    let db = fixtures::memory_db().await;
    let at = Utc::now() - Duration::hours(1);
    let step = Duration::minutes(1);
    let btc = generators::article_with("crypto", 1, "Markets", "Bitcoin rallies", "markets");
    let eth = generators::article_with("crypto", 2, "Chains", "ETH upgrade ships", "tech");
    let other = generators::article_with("crypto", 3, "Misc", "Nothing to see", "markets");
    let a = fixtures::insert_at(&db, &btc, at).await;
    let b = fixtures::insert_at(&db, &eth, at + step).await;
    let c = fixtures::insert_at(&db, &other, at + step * 2).await;
    let delivery = fixtures::delivery(&db);

    let page = delivery
        .latest_by_filter(10, &Filter::content("bitcoin, Eth"), "crypto")
        .await
        .unwrap();
    let uids: Vec<i64> = page.articles.iter().map(|x| x.uid).collect();
    assert_eq!(uids, vec![b, a]);

    let tagged = delivery
        .latest_by_filter(10, &Filter::none().with_categories("markets"), "crypto")
        .await
        .unwrap();
    let uids: Vec<i64> = tagged.articles.iter().map(|x| x.uid).collect();
    assert_eq!(uids, vec![c, a]);

    let both = delivery
        .next("k", "crypto", 10, &Filter::content("bitcoin,eth").with_categories("tech"))
        .await
        .unwrap();
    let uids: Vec<i64> = both.articles.iter().map(|x| x.uid).collect();
    assert_eq!(uids, vec![b]);

    let none = delivery
        .latest_by_filter(10, &Filter::content("dogecoin"), "crypto")
        .await
        .unwrap();
    assert!(none.is_empty());
    assert_eq!(none.mode, Mode::Browse);
}

#[tokio::test]
async fn test_search_decodes_and_ors_terms() {
    let db = fixtures::memory_db().await;
    let at = Utc::now() - Duration::hours(2);
    let step = Duration::minutes(1);
    let rust = generators::article_with("tech", 1, "Rust 2.0 released", "Compilers", "");
    let tokio = generators::article_with("tech", 2, "Tokio turns ten", "Async runtimes", "");
    let go = generators::article_with("tech", 3, "Go news", "It's about rust, really", "");
    let a = fixtures::insert_at(&db, &rust, at).await;
    let b = fixtures::insert_at(&db, &tokio, at + step).await;
    let c = fixtures::insert_at(&db, &go, at + step * 2).await;
    let delivery = fixtures::delivery(&db);

    let titles = delivery.by_title("RUST%20tokio", 10, "tech").await.unwrap();
    let uids: Vec<i64> = titles.articles.iter().map(|x| x.uid).collect();
    assert_eq!(uids, vec![b, a]);

    let bodies = delivery.by_content("it%27s+nothing", 10, "tech").await.unwrap();
    let uids: Vec<i64> = bodies.articles.iter().map(|x| x.uid).collect();
    assert_eq!(uids, vec![c]);

    // Injection attempts are just terms that match nothing.
    let hostile = delivery
        .by_title("%27%20OR%201%3D1%20--", 10, "tech")
        .await
        .unwrap();
    assert!(hostile.is_empty());

    assert!(matches!(
        delivery.by_title("50%", 10, "tech").await.unwrap_err(),
        AppError::Validation(ValidationError::UndecodableSearch)
    ));
}

#[tokio::test]
async fn test_duplicate_insert_is_swallowed() {
    let db = fixtures::memory_db().await;
    let article = generators::article("general", 1);

    let first = db.insert_article(&article).await.unwrap();
    let second = db.insert_article(&article).await.unwrap();
    assert!(first.is_some());
    assert_eq!(second, None);

    // Same link under another topic is a different article.
    let elsewhere = generators::article_with("sport", 1, "Headline 1", "", "");
    let moved = article_gateway::models::NewArticle {
        link: article.link.clone(),
        ..elsewhere
    };
    assert!(db.insert_article(&moved).await.unwrap().is_some());
}

#[tokio::test]
async fn test_next_message_renders_and_advances() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    let at = now - Duration::hours(1);
    let plain = generators::article_with("general", 1, "Weather", "Sunny all week", "");
    let rust = generators::article_with("general", 2, "Rust conference", "Talks announced", "");
    fixtures::insert_at(&db, &plain, at).await;
    fixtures::insert_at(&db, &rust, at + Duration::minutes(1)).await;

    let delivery = fixtures::delivery(&db);
    let message = delivery
        .next_message("channel-9", "Telegram", "general", None)
        .await
        .unwrap();
    assert_eq!(
        message.as_deref(),
        Some("*Weather*\n _Sunny all week_ [https://news.example.com/general/1]")
    );
    assert_eq!(delivery.behind("channel-9", "general").await.unwrap(), 1);
    assert_eq!(
        delivery.live_targets("Telegram").await.unwrap(),
        vec!["channel-9".to_string()]
    );

    let brief = fixtures::delivery_with(
        &db,
        DeliveryConfig {
            include_body: false,
            ..DeliveryConfig::default()
        },
    );
    let keyword = brief
        .next_message("channel-10", "Telegram", "general", Some("rust news"))
        .await
        .unwrap();
    assert_eq!(
        keyword.as_deref(),
        Some("*Rust conference*\n [https://news.example.com/general/2]")
    );

    let drained = delivery
        .next_message("channel-10", "Telegram", "general", Some("rust news"))
        .await
        .unwrap();
    assert_eq!(drained, None);
}

#[tokio::test]
async fn test_behind_counts_without_creating_cursor() {
    let db = fixtures::memory_db().await;
    let now = Utc::now();
    fixtures::seed(&db, "general", 0, 4, now - Duration::hours(2), Duration::minutes(1)).await;
    fixtures::seed(&db, "general", 10, 2, now - Duration::hours(48), Duration::minutes(1)).await;
    let delivery = fixtures::delivery(&db);

    assert_eq!(delivery.behind("fresh", "general").await.unwrap(), 4);
    assert!(delivery.cursor("fresh", "general").await.unwrap().is_none());

    delivery.next("fresh", "general", 3, &Filter::none()).await.unwrap();
    assert_eq!(delivery.behind("fresh", "general").await.unwrap(), 1);
}

#[tokio::test]
async fn test_dormant_targets_are_not_listed() {
    let db = fixtures::memory_db().await;
    let delivery = fixtures::delivery(&db);

    delivery.next_message("a", "Slack", "general", None).await.unwrap();
    delivery.next_message("b", "Slack", "general", None).await.unwrap();
    delivery.next_message("b", "Slack", "sport", None).await.unwrap();
    delivery.next_message("c", "Telegram", "general", None).await.unwrap();

    db.set_cursor_live("a", "general", false).await.unwrap();
    assert_eq!(
        delivery.live_targets("Slack").await.unwrap(),
        vec!["b".to_string()]
    );
}
