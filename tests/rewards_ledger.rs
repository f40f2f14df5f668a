// tests/rewards_ledger.rs
//
// Vote rewards end to end on the in-memory store: points, levels, streak and
// the quorum rule for reputation.

use std::sync::Arc;

use factflow_backend::rewards::{user_stats, RewardLedger, POINTS_PER_VOTE};
use factflow_backend::storage::{MemoryStore, Store, StoreError, UserRecord, VoteRecord};

async fn seeded_user(store: &MemoryStore, name: &str) -> String {
    let u = UserRecord::new(name, format!("{name}@example.com"), "h");
    let id = u.user_id.clone();
    store.create_user(u).await.unwrap();
    id
}

#[tokio::test]
async fn below_quorum_keeps_prior_reputation() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new();
    let ana = seeded_user(&store, "ana").await;

    let out = ledger
        .record_vote(&store, VoteRecord::new("a1", &ana, -1))
        .await
        .unwrap();
    assert_eq!(out.points_awarded, POINTS_PER_VOTE);
    assert_eq!(out.reputation, 0.5, "no quorate article yet");
}

#[tokio::test]
async fn quorate_majority_drives_reputation() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new();
    let ana = seeded_user(&store, "ana").await;

    // Four others say credible.
    for i in 0..4 {
        let other = seeded_user(&store, &format!("voter{i}")).await;
        ledger
            .record_vote(&store, VoteRecord::new("a1", &other, 1))
            .await
            .unwrap();
    }

    // Fifth vote reaches quorum; ana is with the majority.
    let out = ledger
        .record_vote(&store, VoteRecord::new("a1", &ana, 1))
        .await
        .unwrap();
    assert_eq!(out.reputation, 1.0);

    let stats = user_stats(&store, &ana).await.unwrap().unwrap();
    assert_eq!(stats.total_votes, 1);
    assert_eq!(stats.points, POINTS_PER_VOTE);
    assert_eq!(stats.points_to_next_level, 90);
    assert!((0.0..=1.0).contains(&stats.reputation));
}

#[tokio::test]
async fn tenth_vote_reaches_level_two() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new();
    let ana = seeded_user(&store, "ana").await;

    let mut last = None;
    for i in 0..10 {
        last = Some(
            ledger
                .record_vote(&store, VoteRecord::new(format!("a{i}"), &ana, 1))
                .await
                .unwrap(),
        );
    }
    let last = last.unwrap();
    assert_eq!(last.points, 100);
    assert_eq!(last.level, 2);
    assert_eq!(last.new_badges, vec!["level_2".to_string()]);
    assert_eq!(last.streak, 1, "all votes on the same day");
}

#[tokio::test]
async fn unknown_voter_is_not_found_and_nothing_is_stored() {
    let store = MemoryStore::new();
    let ledger = RewardLedger::new();
    let res = ledger
        .record_vote(&store, VoteRecord::new("a1", "ghost", 1))
        .await;
    assert!(matches!(res, Err(StoreError::NotFound(_))));
    assert_eq!(store.get_votes("a1").await.unwrap().total, 0);
}

#[tokio::test]
async fn concurrent_votes_by_one_user_all_count() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(RewardLedger::new());
    let ana = seeded_user(&store, "ana").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let (store, ledger, ana) = (store.clone(), ledger.clone(), ana.clone());
        handles.push(tokio::spawn(async move {
            ledger
                .record_vote(store.as_ref(), VoteRecord::new(format!("a{i}"), &ana, 1))
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let user = store.get_user(&ana).await.unwrap().unwrap();
    assert_eq!(user.points, 8 * POINTS_PER_VOTE);
}
