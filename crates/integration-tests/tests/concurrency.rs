//! Concurrent writers against one thread aggregate.

mod common;

use std::sync::Arc;

use common::{engines, BOARD};
use mb_core::models::Outcome;
use tokio::task::JoinSet;

const PASSWORD: &str = "pw";
const WRITERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replies_all_land_and_bump_once_each() {
    for (backend, engine) in engines().await {
        let engine = Arc::new(engine);
        let id = engine.create_thread(BOARD, "busy", PASSWORD).await.unwrap().to_string();

        let mut writers = JoinSet::new();
        for n in 0..WRITERS {
            let engine = engine.clone();
            let id = id.clone();
            writers.spawn(async move {
                engine
                    .create_reply(BOARD, &id, &format!("reply {n}"), PASSWORD)
                    .await
            });
        }
        while let Some(result) = writers.join_next().await {
            assert_eq!(result.unwrap().unwrap(), Outcome::Applied, "{backend}");
        }

        let full = engine.get_full_thread(BOARD, &id).await.unwrap();
        assert_eq!(full.replies.len(), WRITERS, "{backend}");

        let mut texts: Vec<_> = full.replies.iter().map(|r| r.text.clone()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), WRITERS, "{backend}: a reply was lost or duplicated");

        let newest = full.replies.iter().map(|r| r.created_on).max().unwrap();
        assert_eq!(full.bumped_on, newest, "{backend}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_report_and_delete_never_resurrect_a_thread() {
    for (backend, engine) in engines().await {
        let engine = Arc::new(engine);
        let id = engine.create_thread(BOARD, "doomed", PASSWORD).await.unwrap().to_string();

        let reporter = {
            let (engine, id) = (engine.clone(), id.clone());
            tokio::spawn(async move { engine.report_thread(BOARD, &id).await })
        };
        let deleter = {
            let (engine, id) = (engine.clone(), id.clone());
            tokio::spawn(async move { engine.delete_thread(BOARD, &id, PASSWORD).await })
        };

        let reported = reporter.await.unwrap().unwrap();
        let deleted = deleter.await.unwrap().unwrap();

        assert_eq!(deleted, Outcome::Applied, "{backend}");
        assert!(matches!(reported, Outcome::Applied | Outcome::NotFound));
        assert!(engine.get_full_thread(BOARD, &id).await.is_err(), "{backend}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reply_deletions_each_remove_their_own_reply() {
    for (backend, engine) in engines().await {
        let engine = Arc::new(engine);
        let id = engine.create_thread(BOARD, "pruned", PASSWORD).await.unwrap().to_string();
        for n in 0..8 {
            engine
                .create_reply(BOARD, &id, &format!("reply {n}"), PASSWORD)
                .await
                .unwrap();
        }

        let replies = engine.get_full_thread(BOARD, &id).await.unwrap().replies;
        let (doomed, kept) = replies.split_at(4);

        let mut deleters = JoinSet::new();
        for reply in doomed {
            let (engine, id, reply_id) = (engine.clone(), id.clone(), reply.id.to_string());
            deleters.spawn(async move { engine.delete_reply(BOARD, &id, &reply_id, PASSWORD).await });
        }
        while let Some(result) = deleters.join_next().await {
            assert_eq!(result.unwrap().unwrap(), Outcome::Applied, "{backend}");
        }

        let remaining: Vec<_> = engine
            .get_full_thread(BOARD, &id)
            .await
            .unwrap()
            .replies
            .into_iter()
            .map(|r| r.id)
            .collect();
        let expected: Vec<_> = kept.iter().map(|r| r.id).collect();
        assert_eq!(remaining, expected, "{backend}");
    }
}
