use std::future::Future;

use serde_json::json;

use super::{expect_eq, TestResult};
use crate::{RecordStore, StoreError};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "crud",
            "create_then_read",
            create_then_read(factory().await).await,
        ),
        TestResult::from_result(
            "crud",
            "double_create_returns_already_exists",
            double_create_returns_already_exists(factory().await).await,
        ),
        TestResult::from_result(
            "crud",
            "update_upserts",
            update_upserts(factory().await).await,
        ),
        TestResult::from_result(
            "crud",
            "delete_missing_returns_not_found",
            delete_missing_returns_not_found(factory().await).await,
        ),
        TestResult::from_result(
            "crud",
            "list_matches_prefix_only",
            list_matches_prefix_only(factory().await).await,
        ),
    ]
}

async fn create_then_read<S: RecordStore>(store: S) -> Result<(), String> {
    store
        .create("nsr/1", json!({"state": "init"}))
        .await
        .map_err(|e| e.to_string())?;
    let got = store.read("nsr/1").await.map_err(|e| e.to_string())?;
    expect_eq("read after create", got, Some(json!({"state": "init"})))?;
    let missing = store.read("nsr/2").await.map_err(|e| e.to_string())?;
    expect_eq("read of absent path", missing, None)
}

async fn double_create_returns_already_exists<S: RecordStore>(store: S) -> Result<(), String> {
    store
        .create("nsr/1", json!(1))
        .await
        .map_err(|e| e.to_string())?;
    match store.create("nsr/1", json!(2)).await {
        Err(StoreError::AlreadyExists { path }) => expect_eq("error path", path.as_str(), "nsr/1"),
        other => Err(format!("expected AlreadyExists, got {:?}", other)),
    }?;
    let got = store.read("nsr/1").await.map_err(|e| e.to_string())?;
    expect_eq("original value kept", got, Some(json!(1)))
}

async fn update_upserts<S: RecordStore>(store: S) -> Result<(), String> {
    store
        .update("vlr/a", json!("first"))
        .await
        .map_err(|e| e.to_string())?;
    store
        .update("vlr/a", json!("second"))
        .await
        .map_err(|e| e.to_string())?;
    let got = store.read("vlr/a").await.map_err(|e| e.to_string())?;
    expect_eq("value after two updates", got, Some(json!("second")))
}

async fn delete_missing_returns_not_found<S: RecordStore>(store: S) -> Result<(), String> {
    match store.delete("vnfr/none").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn list_matches_prefix_only<S: RecordStore>(store: S) -> Result<(), String> {
    for (path, v) in [("vnfr/1", 1), ("vnfr/2", 2), ("vnfrx/3", 3), ("vlr/1", 4)] {
        store.create(path, json!(v)).await.map_err(|e| e.to_string())?;
    }
    let listed = store.list("vnfr/").await.map_err(|e| e.to_string())?;
    let keys: Vec<String> = listed.into_iter().map(|(k, _)| k).collect();
    expect_eq(
        "listed keys",
        keys,
        vec!["vnfr/1".to_string(), "vnfr/2".to_string()],
    )
}
