//! Engagement policy for the heartbeat swarm
//!
//! The heartbeat loop asks the policy three questions per actor and cycle:
//! post or not, which feed item to engage with, and how. Decisions are kept
//! behind a trait so the loop can be driven deterministically in tests.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::model::FeedPost;

/// Probability gates: an action happens when a uniform draw exceeds the gate
pub const POST_GATE: f64 = 0.35;
pub const COMMENT_GATE: f64 = 0.55;
pub const REPOST_GATE: f64 = 0.7;

/// What an actor does with its chosen post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementPlan {
    pub like: bool,
    pub comment: bool,
    pub repost: bool,
}

pub trait EngagementPolicy: Send {
    /// Whether `actor` posts a heartbeat this cycle
    fn should_post(&mut self, actor: &str) -> bool;

    /// Pick one of `candidates` (never the actor's own posts)
    fn choose_target<'a>(
        &mut self,
        actor: &str,
        candidates: &[&'a FeedPost],
    ) -> Option<&'a FeedPost>;

    fn plan(&mut self, actor: &str, post: &FeedPost) -> EngagementPlan;
}

/// Uniformly random choices with fixed probability gates
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence of decisions
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn passes(&mut self, gate: f64) -> bool {
        self.rng.gen::<f64>() > gate
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl EngagementPolicy for RandomPolicy {
    fn should_post(&mut self, _actor: &str) -> bool {
        self.passes(POST_GATE)
    }

    fn choose_target<'a>(
        &mut self,
        _actor: &str,
        candidates: &[&'a FeedPost],
    ) -> Option<&'a FeedPost> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..candidates.len());
        Some(candidates[index])
    }

    fn plan(&mut self, _actor: &str, _post: &FeedPost) -> EngagementPlan {
        EngagementPlan {
            like: true,
            comment: self.passes(COMMENT_GATE),
            repost: self.passes(REPOST_GATE),
        }
    }
}
