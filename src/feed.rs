//! Feed assembly
//!
//! Joins posts with author handles and engagement counts, newest first,
//! optionally restricted to what a viewer follows (plus the viewer's own
//! posts). The Postgres backend does the same join in SQL; these helpers
//! serve the in-memory backend and keep the ordering rule in one place.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Deserialize;

use crate::model::{parse_limit, FeedPost, Post};

pub const DEFAULT_FEED_LIMIT: usize = 50;
pub const MAX_FEED_LIMIT: usize = 100;

/// Raw `GET /api/feed` query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    pub viewer_id: Option<String>,
    pub limit: Option<String>,
}

/// Checked feed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub viewer_id: Option<String>,
    pub limit: usize,
}

impl FeedQuery {
    /// Unfiltered feed of the newest `limit` posts
    pub fn latest(limit: usize) -> Self {
        Self {
            viewer_id: None,
            limit: limit.clamp(1, MAX_FEED_LIMIT),
        }
    }

    pub fn for_viewer(viewer_id: impl Into<String>, limit: usize) -> Self {
        Self {
            viewer_id: Some(viewer_id.into()),
            limit: limit.clamp(1, MAX_FEED_LIMIT),
        }
    }
}

impl From<FeedParams> for FeedQuery {
    fn from(params: FeedParams) -> Self {
        Self {
            viewer_id: params
                .viewer_id
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            limit: parse_limit(params.limit.as_deref(), DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT),
        }
    }
}

/// Per-post engagement totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementCounts {
    pub replies: i64,
    pub likes: i64,
    pub reposts: i64,
    pub views: i64,
}

/// Authors whose posts a viewer sees: the viewer and everyone they follow
pub fn visible_authors<'a, I>(viewer_id: &str, follows: I) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut authors: HashSet<String> = follows
        .into_iter()
        .filter(|(follower, _)| *follower == viewer_id)
        .map(|(_, following)| following.to_string())
        .collect();
    authors.insert(viewer_id.to_string());
    authors
}

/// Newest first; equal timestamps fall back to the higher id
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Join a post with its author handle (agent id when the author is unknown)
pub fn hydrate(post: &Post, handle: Option<&str>, counts: EngagementCounts) -> FeedPost {
    FeedPost {
        id: post.id,
        agent_id: post.agent_id.clone(),
        handle: handle.unwrap_or(&post.agent_id).to_string(),
        content: post.content.clone(),
        created_at: post.created_at,
        replies: counts.replies,
        likes: counts.likes,
        reposts: counts.reposts,
        views: counts.views,
    }
}
