//! Concurrency tests for the turn arbiter
//!
//! Many interviewers bid for the floor at once from worker threads; only one
//! may ever win until the holder gives the floor back.

use std::sync::Arc;

use futures::future::join_all;
use panel_engine::arbiter::{TurnArbiter, TurnState};
use tokio::sync::Barrier;

const BIDDERS: usize = 16;

fn names() -> Vec<String> {
    (0..BIDDERS).map(|i| format!("agent-{}", i)).collect()
}

/// Release every bidder at once and return who was granted the floor
async fn contend(arbiter: &Arc<TurnArbiter>) -> Vec<String> {
    let barrier = Arc::new(Barrier::new(BIDDERS));
    let handles: Vec<_> = names()
        .into_iter()
        .map(|name| {
            let arbiter = Arc::clone(arbiter);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                arbiter.request_turn(&name).await.then_some(name)
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .filter_map(|result| result.unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_grant_exactly_one() {
    let arbiter = Arc::new(TurnArbiter::new(names()));

    for _ in 0..20 {
        let winners = contend(&arbiter).await;
        assert_eq!(winners.len(), 1, "winners: {:?}", winners);
        assert_eq!(
            arbiter.snapshot().await,
            TurnState::Held(winners[0].clone())
        );

        // Still held: a second wave is refused outright
        assert!(contend(&arbiter).await.is_empty());

        assert!(arbiter.release_turn(&winners[0]).await);
        assert!(arbiter.is_free().await);
    }

    assert_eq!(arbiter.total_turns().await, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stale_releases_keep_the_holder() {
    let arbiter = Arc::new(TurnArbiter::new(names()));
    assert!(arbiter.request_turn("agent-0").await);

    let handles: Vec<_> = names()
        .into_iter()
        .skip(1)
        .map(|name| {
            let arbiter = Arc::clone(&arbiter);
            tokio::spawn(async move { arbiter.release_turn(&name).await })
        })
        .collect();

    for released in join_all(handles).await {
        assert!(!released.unwrap());
    }
    assert_eq!(arbiter.current_speaker().await.as_deref(), Some("agent-0"));
}
