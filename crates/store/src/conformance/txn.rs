use std::future::Future;

use serde_json::json;

use super::{expect_eq, TestResult};
use crate::{RecordStore, StoreError, Transaction, TxnResponse};

pub(super) async fn run_txn_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "txn",
            "multi_path_commit_is_visible",
            multi_path_commit_is_visible(factory().await).await,
        ),
        TestResult::from_result(
            "txn",
            "failed_op_rolls_back_everything",
            failed_op_rolls_back_everything(factory().await).await,
        ),
        TestResult::from_result(
            "txn",
            "read_sees_earlier_ops",
            read_sees_earlier_ops(factory().await).await,
        ),
        TestResult::from_result(
            "txn",
            "failed_txn_emits_no_events",
            failed_txn_emits_no_events(factory().await).await,
        ),
    ]
}

async fn multi_path_commit_is_visible<S: RecordStore>(store: S) -> Result<(), String> {
    let txn = Transaction::new()
        .add_create("vnfr/1", json!("a"))
        .add_create("vnfr/2", json!("b"));
    let responses = store.execute(txn).await.map_err(|e| e.to_string())?;
    expect_eq("response count", responses.len(), 2)?;
    expect_eq(
        "vnfr/2",
        store.read("vnfr/2").await.map_err(|e| e.to_string())?,
        Some(json!("b")),
    )
}

async fn failed_op_rolls_back_everything<S: RecordStore>(store: S) -> Result<(), String> {
    store
        .create("vnfr/taken", json!(0))
        .await
        .map_err(|e| e.to_string())?;
    let txn = Transaction::new()
        .add_create("vnfr/new", json!(1))
        .add_update("vnfr/taken", json!(2))
        .add_create("vnfr/taken", json!(3));
    match store.execute(txn).await {
        Err(StoreError::AlreadyExists { .. }) => {}
        other => return Err(format!("expected AlreadyExists, got {:?}", other)),
    }
    expect_eq(
        "vnfr/new not written",
        store.read("vnfr/new").await.map_err(|e| e.to_string())?,
        None,
    )?;
    expect_eq(
        "vnfr/taken untouched",
        store.read("vnfr/taken").await.map_err(|e| e.to_string())?,
        Some(json!(0)),
    )
}

async fn read_sees_earlier_ops<S: RecordStore>(store: S) -> Result<(), String> {
    let txn = Transaction::new()
        .add_update("vlr/x", json!({"n": 1}))
        .add_read("vlr/x")
        .add_delete("vlr/x")
        .add_read("vlr/x");
    let responses = store.execute(txn).await.map_err(|e| e.to_string())?;
    expect_eq(
        "read after update",
        &responses[1],
        &TxnResponse::Value(Some(json!({"n": 1}))),
    )?;
    expect_eq("read after delete", &responses[3], &TxnResponse::Value(None))
}

async fn failed_txn_emits_no_events<S: RecordStore>(store: S) -> Result<(), String> {
    let mut sub = store.subscribe("vnfr/");
    let txn = Transaction::new()
        .add_create("vnfr/a", json!(1))
        .add_delete("vnfr/missing");
    if store.execute(txn).await.is_ok() {
        return Err("delete of missing path should fail the transaction".into());
    }
    store
        .update("vnfr/marker", json!(true))
        .await
        .map_err(|e| e.to_string())?;
    let first = sub.recv().await.map_err(|e| e.to_string())?;
    expect_eq("first event path", first.path.as_str(), "vnfr/marker")
}
