// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators.

use article_gateway::models::NewArticle;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate peer socket addresses, one per source.
pub fn generate_peers(count: usize) -> Vec<SocketAddr> {
    generate_ips(count)
        .into_iter()
        .map(|ip| SocketAddr::new(ip, 40_000))
        .collect()
}

/// An article with a unique link for `topic`.
pub fn article(topic: &str, n: usize) -> NewArticle {
    NewArticle {
        topic: topic.to_string(),
        title: format!("Headline {n}"),
        content: format!("Story number {n}"),
        author: "Newsroom".to_string(),
        email: "desk@example.com".to_string(),
        cat: "general".to_string(),
        link: format!("https://news.example.com/{topic}/{n}"),
        image: format!("https://news.example.com/img/{n}.png"),
    }
}

/// An article with chosen title, body and tags.
pub fn article_with(topic: &str, n: usize, title: &str, content: &str, cat: &str) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        content: content.to_string(),
        cat: cat.to_string(),
        ..article(topic, n)
    }
}
