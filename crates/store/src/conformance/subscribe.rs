use std::future::Future;

use serde_json::json;

use super::{expect_eq, TestResult};
use crate::{Action, RecordStore, Transaction};

pub(super) async fn run_subscribe_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "subscribe",
            "events_filtered_by_prefix",
            events_filtered_by_prefix(factory().await).await,
        ),
        TestResult::from_result(
            "subscribe",
            "events_follow_commit_order",
            events_follow_commit_order(factory().await).await,
        ),
        TestResult::from_result(
            "subscribe",
            "delete_event_carries_old_value",
            delete_event_carries_old_value(factory().await).await,
        ),
    ]
}

async fn events_filtered_by_prefix<S: RecordStore>(store: S) -> Result<(), String> {
    let mut sub = store.subscribe("vlr-catalog/");
    store
        .update("vnfr-catalog/1", json!(1))
        .await
        .map_err(|e| e.to_string())?;
    store
        .update("vlr-catalog/1", json!(2))
        .await
        .map_err(|e| e.to_string())?;
    let ev = sub.recv().await.map_err(|e| e.to_string())?;
    expect_eq("path", ev.path.as_str(), "vlr-catalog/1")?;
    expect_eq("action", ev.action, Action::Create)
}

async fn events_follow_commit_order<S: RecordStore>(store: S) -> Result<(), String> {
    let mut sub = store.subscribe("");
    let txn = Transaction::new()
        .add_update("a", json!(1))
        .add_update("b", json!(2));
    store.execute(txn).await.map_err(|e| e.to_string())?;
    store.update("a", json!(3)).await.map_err(|e| e.to_string())?;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let ev = sub.recv().await.map_err(|e| e.to_string())?;
        seen.push((ev.path, ev.action, ev.value));
    }
    expect_eq(
        "event sequence",
        seen,
        vec![
            ("a".to_string(), Action::Create, json!(1)),
            ("b".to_string(), Action::Create, json!(2)),
            ("a".to_string(), Action::Update, json!(3)),
        ],
    )
}

async fn delete_event_carries_old_value<S: RecordStore>(store: S) -> Result<(), String> {
    store
        .create("vnfr/1", json!({"op": "running"}))
        .await
        .map_err(|e| e.to_string())?;
    let mut sub = store.subscribe("vnfr/");
    store.delete("vnfr/1").await.map_err(|e| e.to_string())?;
    let ev = sub.recv().await.map_err(|e| e.to_string())?;
    expect_eq("action", ev.action, Action::Delete)?;
    expect_eq("value", ev.value, json!({"op": "running"}))
}
