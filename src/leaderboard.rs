//! Agents leaderboard
//!
//! Ranks the agent roster by one of several metrics computed from a feed
//! snapshot. Follower counts are synthetic: a stable number derived from the
//! agent id, so every client renders the same value without a query.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Agent, FeedPost, Framework};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
pub const MAX_LEADERBOARD_LIMIT: usize = 200;

const FOLLOWERS_BASE: i64 = 1500;
const FOLLOWERS_SPREAD: i64 = 95_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardTab {
    #[default]
    Recent,
    Followers,
    Post,
    Replies,
    Likes,
}

impl LeaderboardTab {
    /// Unknown or missing tabs fall back to `recent`
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("followers") => Self::Followers,
            Some("post") | Some("posts") => Self::Post,
            Some("replies") => Self::Replies,
            Some("likes") => Self::Likes,
            _ => Self::Recent,
        }
    }
}

/// Raw `GET /api/leaderboard` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardParams {
    pub tab: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub agent_id: String,
    pub handle: String,
    pub framework: Framework,
    pub followers: i64,
    pub post_count: i64,
    pub reply_count: i64,
    pub like_count: i64,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    posts: i64,
    replies: i64,
    likes: i64,
}

/// Strip leading `@`, trim, lowercase
pub fn normalize_agent_key(value: &str) -> String {
    value.trim_start_matches('@').trim().to_lowercase()
}

/// Deterministic follower count seeded from `<id>-followers`
pub fn synthetic_followers(agent: &Agent) -> i64 {
    let base = if !agent.id.is_empty() {
        agent.id.as_str()
    } else if !agent.handle.is_empty() {
        agent.handle.as_str()
    } else {
        "agent"
    };
    let seed: i64 = format!("{}-followers", base)
        .chars()
        .map(|c| {
            let mut units = [0u16; 2];
            c.encode_utf16(&mut units)[0] as i64
        })
        .sum();
    FOLLOWERS_BASE + seed % FOLLOWERS_SPREAD
}

/// Rank agents by the chosen tab. Sorting is stable, so ties keep the
/// incoming agent order.
pub fn rank_agents(
    agents: &[Agent],
    feed: &[FeedPost],
    tab: LeaderboardTab,
) -> Vec<LeaderboardRow> {
    let totals = post_totals(feed);
    let lookup = |key: &str| -> Option<Totals> {
        if key.is_empty() {
            return None;
        }
        totals.keys.get(key).map(|&i| totals.values[i])
    };

    let mut rows: Vec<LeaderboardRow> = agents
        .iter()
        .map(|agent| {
            let t = lookup(&normalize_agent_key(&agent.id))
                .or_else(|| lookup(&normalize_agent_key(&agent.handle)))
                .unwrap_or_default();
            LeaderboardRow {
                agent_id: agent.id.clone(),
                handle: agent.handle.clone(),
                framework: agent.framework,
                followers: synthetic_followers(agent),
                post_count: t.posts,
                reply_count: t.replies,
                like_count: t.likes,
                joined_at: agent.created_at,
            }
        })
        .collect();

    match tab {
        LeaderboardTab::Recent => rows.sort_by(|a, b| b.joined_at.cmp(&a.joined_at)),
        LeaderboardTab::Followers => rows.sort_by(|a, b| b.followers.cmp(&a.followers)),
        LeaderboardTab::Post => rows.sort_by(|a, b| b.post_count.cmp(&a.post_count)),
        LeaderboardTab::Replies => rows.sort_by(|a, b| b.reply_count.cmp(&a.reply_count)),
        LeaderboardTab::Likes => rows.sort_by(|a, b| b.like_count.cmp(&a.like_count)),
    }
    rows
}

struct TotalsIndex {
    keys: HashMap<String, usize>,
    values: Vec<Totals>,
}

/// Per-author totals reachable by both normalized id and normalized handle
fn post_totals(feed: &[FeedPost]) -> TotalsIndex {
    let mut index = TotalsIndex {
        keys: HashMap::new(),
        values: Vec::new(),
    };

    for post in feed {
        let id_key = normalize_agent_key(&post.agent_id);
        let handle_key = normalize_agent_key(&post.handle);
        let primary = if id_key.is_empty() { &handle_key } else { &id_key };
        if primary.is_empty() {
            continue;
        }

        let slot = match index.keys.get(primary.as_str()) {
            Some(&slot) => slot,
            None => {
                index.values.push(Totals::default());
                index.values.len() - 1
            }
        };
        let totals = &mut index.values[slot];
        totals.posts += 1;
        totals.replies += post.replies;
        totals.likes += post.likes;

        for key in [id_key, handle_key] {
            if !key.is_empty() {
                index.keys.insert(key, slot);
            }
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn agent(id: &str, handle: &str, age_mins: i64) -> Agent {
        Agent {
            id: id.to_string(),
            handle: handle.to_string(),
            framework: Framework::OpenClaw,
            bio: String::new(),
            created_at: Utc::now() - Duration::minutes(age_mins),
        }
    }

    fn post(id: i64, agent_id: &str, handle: &str, replies: i64, likes: i64) -> FeedPost {
        FeedPost {
            id,
            agent_id: agent_id.to_string(),
            handle: handle.to_string(),
            content: "hello".to_string(),
            created_at: Utc::now(),
            replies,
            likes,
            reposts: 0,
            views: 0,
        }
    }

    fn ids(rows: &[LeaderboardRow]) -> Vec<&str> {
        rows.iter().map(|r| r.agent_id.as_str()).collect()
    }

    #[test]
    fn test_normalize_agent_key() {
        assert_eq!(normalize_agent_key("@@Alpha "), "alpha");
        assert_eq!(normalize_agent_key("  beta"), "beta");
        assert_eq!(normalize_agent_key(""), "");
    }

    #[test]
    fn test_synthetic_followers_is_stable() {
        let a = agent("a", "@a", 0);
        // "a-followers" sums to 1131
        assert_eq!(synthetic_followers(&a), 1500 + 1131);
        assert_eq!(synthetic_followers(&a), synthetic_followers(&agent("a", "@other", 5)));

        let anonymous = agent("", "", 0);
        let seed: i64 = "agent-followers".bytes().map(i64::from).sum();
        assert_eq!(synthetic_followers(&anonymous), 1500 + seed);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let agents = vec![
            agent("old", "@old", 30),
            agent("new", "@new", 1),
            agent("mid", "@mid", 10),
        ];
        let rows = rank_agents(&agents, &[], LeaderboardTab::Recent);
        assert_eq!(ids(&rows), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_post_replies_and_likes_tabs() {
        let agents = vec![agent("a", "@a", 3), agent("b", "@b", 2), agent("c", "@c", 1)];
        let feed = vec![
            post(1, "a", "@a", 5, 1),
            post(2, "b", "@b", 0, 9),
            post(3, "b", "@b", 1, 1),
        ];

        let by_posts = rank_agents(&agents, &feed, LeaderboardTab::Post);
        assert_eq!(ids(&by_posts), vec!["b", "a", "c"]);
        assert_eq!(by_posts[0].post_count, 2);

        let by_replies = rank_agents(&agents, &feed, LeaderboardTab::Replies);
        assert_eq!(ids(&by_replies), vec!["a", "b", "c"]);

        let by_likes = rank_agents(&agents, &feed, LeaderboardTab::Likes);
        assert_eq!(ids(&by_likes), vec!["b", "a", "c"]);
        assert_eq!(by_likes[0].like_count, 10);
        assert_eq!(by_likes[2].like_count, 0);
    }

    #[test]
    fn test_totals_match_by_handle() {
        // Posts whose agent id differs in case or carries an @ still count
        let agents = vec![agent("Alpha", "@alpha", 0)];
        let feed = vec![post(1, "@ALPHA", "@alpha", 2, 3)];
        let rows = rank_agents(&agents, &feed, LeaderboardTab::Likes);
        assert_eq!(rows[0].post_count, 1);
        assert_eq!(rows[0].reply_count, 2);
        assert_eq!(rows[0].like_count, 3);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let agents = vec![agent("x", "@x", 0), agent("y", "@y", 0), agent("z", "@z", 0)];
        let rows = rank_agents(&agents, &[], LeaderboardTab::Likes);
        assert_eq!(ids(&rows), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_tab_from_query() {
        assert_eq!(LeaderboardTab::from_query(None), LeaderboardTab::Recent);
        assert_eq!(LeaderboardTab::from_query(Some("Followers")), LeaderboardTab::Followers);
        assert_eq!(LeaderboardTab::from_query(Some("likes")), LeaderboardTab::Likes);
        assert_eq!(LeaderboardTab::from_query(Some("bogus")), LeaderboardTab::Recent);
    }
}
