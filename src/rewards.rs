//! Side effects of a vote: points, level-up badges, daily streak and the
//! quorum-based reputation recomputation.
//!
//! Updates for the same user run under a per-user async lock, so two
//! concurrent votes cannot lose each other's points.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};

use crate::scoring::reputation::{
    level_for_points, levels_crossed, points_to_next_level, reputation_accuracy, reputation_weight,
};
use crate::scoring::VoteTally;
use crate::storage::{Store, StoreError, UserRecord, VoteRecord};

pub const POINTS_PER_VOTE: u32 = 10;

/// Prune idle per-user locks once the map grows past this.
const LOCK_MAP_SOFT_CAP: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    pub points_awarded: u32,
    pub points: u32,
    pub level: u32,
    pub new_badges: Vec<String>,
    pub streak: u32,
    pub reputation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub user_id: String,
    pub level: u32,
    pub points: u32,
    pub points_to_next_level: u32,
    pub reputation: f64,
    pub total_votes: u32,
    /// Per-voter weight by vote count. Reported only; community scores do not use it.
    pub vote_weight: f64,
    pub badges_count: usize,
    pub streak: u32,
}

#[derive(Default)]
pub struct RewardLedger {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if map.len() > LOCK_MAP_SOFT_CAP {
            map.retain(|_, l| Arc::strong_count(l) > 1);
        }
        map.entry(user_id.to_string()).or_default().clone()
    }

    /// Store the vote and apply all rewards for its author.
    pub async fn record_vote(
        &self,
        store: &dyn Store,
        vote: VoteRecord,
    ) -> Result<VoteOutcome, StoreError> {
        let lock = self.lock_for(&vote.user_id);
        let _guard = lock.lock().await;

        let Some(mut user) = store.get_user(&vote.user_id).await? else {
            return Err(StoreError::NotFound(format!("user `{}`", vote.user_id)));
        };
        let voted_on = vote.created_at.date_naive();
        store.save_vote(vote).await?;
        counter!("factflow_votes_total").increment(1);

        let new_badges = apply_points(&mut user, POINTS_PER_VOTE);
        user.streak = advance_streak(user.last_vote_on, user.streak, voted_on);
        user.last_vote_on = Some(voted_on);

        if let Some(r) = recompute_reputation(store, &user.user_id).await? {
            user.reputation = r;
        }

        let outcome = VoteOutcome {
            points_awarded: POINTS_PER_VOTE,
            points: user.points,
            level: user.level,
            new_badges,
            streak: user.streak,
            reputation: user.reputation,
        };
        if !outcome.new_badges.is_empty() {
            info!(user_id = %user.user_id, level = user.level, "user levelled up");
        }
        store.update_user(user).await?;
        Ok(outcome)
    }
}

/// Add points, recompute the level, and award `level_<n>` once per level crossed.
/// Returns the badges granted by this call.
pub fn apply_points(user: &mut UserRecord, points: u32) -> Vec<String> {
    let old_level = user.level.max(1);
    user.points = user.points.saturating_add(points);
    user.level = level_for_points(user.points);

    let mut granted = Vec::new();
    for level in levels_crossed(old_level, user.level) {
        let badge = format!("level_{level}");
        if !user.badges.contains(&badge) {
            user.badges.push(badge.clone());
            granted.push(badge);
        }
    }
    granted
}

/// Same day keeps the streak, the next day extends it, any gap restarts at 1.
pub fn advance_streak(last: Option<NaiveDate>, streak: u32, today: NaiveDate) -> u32 {
    match last {
        Some(d) if d == today => streak.max(1),
        Some(d) if d.succ_opt() == Some(today) => streak.saturating_add(1),
        _ => 1,
    }
}

/// Accuracy of the user's votes against quorate majorities, `None` if nothing qualifies.
pub async fn recompute_reputation(
    store: &dyn Store,
    user_id: &str,
) -> Result<Option<f64>, StoreError> {
    let votes = store.votes_by_user(user_id).await?;
    let mut tallies: HashMap<String, VoteTally> = HashMap::new();
    let mut history = Vec::with_capacity(votes.len());
    for v in votes {
        let tally = match tallies.get(&v.article_id) {
            Some(t) => *t,
            None => {
                let t = store.get_votes(&v.article_id).await?;
                tallies.insert(v.article_id.clone(), t);
                t
            }
        };
        history.push((v.vote, tally));
    }
    let accuracy = reputation_accuracy(history);
    debug!(%user_id, ?accuracy, articles = tallies.len(), "reputation recomputed");
    Ok(accuracy)
}

pub async fn user_stats(store: &dyn Store, user_id: &str) -> Result<Option<UserStats>, StoreError> {
    let Some(user) = store.get_user(user_id).await? else {
        return Ok(None);
    };
    let total_votes = store.get_user_vote_count(user_id).await?;
    Ok(Some(UserStats {
        user_id: user.user_id.clone(),
        level: user.level,
        points: user.points,
        points_to_next_level: points_to_next_level(user.points),
        reputation: user.reputation,
        total_votes,
        vote_weight: reputation_weight(total_votes),
        badges_count: user.badges.len(),
        streak: user.streak,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn badges_awarded_once_per_level() {
        let mut u = UserRecord::new("ana", "ana@example.com", "h");
        u.points = 95;
        assert_eq!(apply_points(&mut u, 10), vec!["level_2".to_string()]);
        assert_eq!(u.level, 2);
        assert!(apply_points(&mut u, 10).is_empty());

        // a big jump crosses several levels at once
        let granted = apply_points(&mut u, 200);
        assert_eq!(granted, vec!["level_3".to_string(), "level_4".to_string()]);
        assert_eq!(u.level, 4);
    }

    #[test]
    fn existing_badge_is_not_duplicated() {
        let mut u = UserRecord::new("ana", "ana@example.com", "h");
        u.badges.push("level_2".into());
        u.points = 90;
        assert!(apply_points(&mut u, 10).is_empty());
        assert_eq!(u.badges.len(), 1);
    }

    #[test]
    fn streak_rules() {
        assert_eq!(advance_streak(None, 0, day("2025-03-01")), 1);
        assert_eq!(advance_streak(Some(day("2025-03-01")), 1, day("2025-03-01")), 1);
        assert_eq!(advance_streak(Some(day("2025-03-01")), 4, day("2025-03-02")), 5);
        assert_eq!(advance_streak(Some(day("2025-03-01")), 4, day("2025-03-05")), 1);
    }
}
