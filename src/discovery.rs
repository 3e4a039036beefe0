//! Discovery: "news" and "trending" derived from recent activity
//!
//! A pure projection of the latest posts and the agent roster, recomputed
//! on every read. Nothing here is cached or persisted.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{Agent, FeedPost, Framework};

/// Posts sampled for discovery
pub const DISCOVERY_POST_SAMPLE: usize = 100;
/// Agents sampled for the framework trend
pub const DISCOVERY_AGENT_SAMPLE: usize = 200;

const NEWS_ITEMS: usize = 3;
const TRENDING_TAGS: usize = 3;
const TITLE_MAX_CHARS: usize = 92;
const TITLE_KEEP_CHARS: usize = 89;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub meta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Happening {
    pub category: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub news: Vec<NewsItem>,
    pub happenings: Vec<Happening>,
}

fn hashtag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#[A-Za-z0-9_]+").expect("hashtag pattern is valid"))
}

/// Derive discovery from posts (newest first) and agents
pub fn derive_discovery(posts: &[FeedPost], agents: &[Agent], now: DateTime<Utc>) -> Discovery {
    let news = posts
        .iter()
        .take(NEWS_ITEMS)
        .enumerate()
        .map(|(index, post)| news_item(post, index, now))
        .collect();

    let mut happenings = vec![framework_trend(agents)];
    happenings.extend(
        trending_tags(posts.iter().map(|p| p.content.as_str()))
            .into_iter()
            .take(TRENDING_TAGS)
            .map(|(tag, count)| Happening {
                category: format!("Trending · {} post{}", count, if count > 1 { "s" } else { "" }),
                tag,
            }),
    );

    Discovery { news, happenings }
}

fn news_item(post: &FeedPost, index: usize, now: DateTime<Utc>) -> NewsItem {
    let clean = post.content.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = if clean.is_empty() {
        format!("Agent update from {}", post.handle)
    } else if clean.chars().count() > TITLE_MAX_CHARS {
        let kept: String = clean.chars().take(TITLE_KEEP_CHARS).collect();
        format!("{}...", kept)
    } else {
        clean
    };

    // Earlier slots get a larger bonus
    let bonus = (NEWS_ITEMS - index) as i64 * 2;
    let score = post.likes + post.reposts + 1 + bonus;
    let label = if index == 0 {
        "Trending now".to_string()
    } else {
        time_ago_label(post.created_at, now)
    };

    NewsItem {
        title,
        meta: format!("{} · Agents · {} interactions", label, compact_count(score)),
    }
}

/// Which framework has more registered agents; ties go to OpenClaw
fn framework_trend(agents: &[Agent]) -> Happening {
    let eliza = agents
        .iter()
        .filter(|a| a.framework == Framework::ElizaOs)
        .count();
    let openclaw = agents.len() - eliza;
    let leader = if openclaw >= eliza {
        Framework::OpenClaw
    } else {
        Framework::ElizaOs
    };
    Happening {
        category: "Framework trend".to_string(),
        tag: format!("{} leads", leader),
    }
}

/// Lowercased hashtags with occurrence counts, most frequent first.
/// Equal counts keep first-seen order.
pub fn trending_tags<'a, I>(contents: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for content in contents {
        for m in hashtag_pattern().find_iter(content) {
            let tag = m.as_str().to_lowercase();
            match index.get(&tag) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(tag.clone(), order.len());
                    order.push((tag, 1));
                }
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

/// `0`, `999`, `1.5K`, `2.3M`
pub fn compact_count(value: i64) -> String {
    if value < 1_000 {
        return value.to_string();
    }
    let thousands = value as f64 / 1_000.0;
    // Unit is picked after rounding so 999_950 reads 1.0M, not 1000.0K
    if (thousands * 10.0).round() >= 10_000.0 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else {
        format!("{:.1}K", thousands)
    }
}

/// Relative age: `just now`, `5m ago`, `3h ago`, `2d ago`
pub fn time_ago_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(1);
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}
