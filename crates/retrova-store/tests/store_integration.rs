#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use retrova_core::{Filter, Payload, RetrovaError};
use retrova_store::VectorStore;
use serde_json::json;

fn payload(content: &str, source: &str) -> Payload {
    [
        ("content".to_string(), json!(content)),
        ("source".to_string(), json!(source)),
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// 1. Concurrent first-time creation resolves to one definition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_get_or_create_yields_one_collection() {
    let store = Arc::new(VectorStore::in_memory());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.get_or_create_collection("docs", 3).await
        }));
    }

    for handle in handles {
        let collection = handle.await.unwrap().unwrap();
        assert_eq!(collection.name(), "docs");
        assert_eq!(collection.dimension(), 3);
    }
    assert_eq!(store.collection_names().await, ["docs"]);

    // Every handle addresses the same state.
    let c = store.get_collection("docs").await.unwrap();
    c.insert("a", vec![1.0, 0.0, 0.0], Payload::new()).await.unwrap();
    let again = store.get_collection("docs").await.unwrap();
    assert_eq!(again.count().await, 1);
}

// ---------------------------------------------------------------------------
// 2. The query example: docs(dim=3), a=[1,0,0], b=[0,1,0]
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_returns_nearest_point_with_unit_similarity() {
    let store = VectorStore::in_memory();
    let docs = store.get_or_create_collection("docs", 3).await.unwrap();
    docs.insert("a", vec![1.0, 0.0, 0.0], Payload::new()).await.unwrap();
    docs.insert("b", vec![0.0, 1.0, 0.0], Payload::new()).await.unwrap();

    let hits = docs.query(&[1.0, 0.0, 0.0], 1, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].point.id, "a");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// 3. Filtered queries compose with the DSL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn filtered_query_spans_and_or_composition() {
    let store = VectorStore::in_memory();
    let docs = store.get_or_create_collection("docs", 2).await.unwrap();
    docs.insert("a", vec![1.0, 0.0], payload("alpha", "x.md")).await.unwrap();
    docs.insert("b", vec![1.0, 0.0], payload("beta", "y.md")).await.unwrap();
    docs.insert("c", vec![1.0, 0.0], payload("gamma", "z.md")).await.unwrap();

    let filter = Filter::Or(vec![
        Filter::eq("source", "x.md"),
        Filter::eq("source", "y.md"),
    ]);
    let hits = docs.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
    let mut ids: Vec<String> = hits.into_iter().map(|h| h.point.id).collect();
    ids.sort();
    assert_eq!(ids, ["a", "b"]);

    let none = Filter::And(vec![
        Filter::eq("source", "x.md"),
        Filter::eq("source", "y.md"),
    ]);
    assert!(docs.query(&[1.0, 0.0], 10, Some(&none)).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Persistence: contents survive a close/reopen cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reopened_store_restores_points_and_keyword_index() {
    let tmp = tempfile::tempdir().unwrap();

    {
        let store = VectorStore::open(tmp.path()).await.unwrap();
        let docs = store.get_or_create_collection("docs", 2).await.unwrap();
        docs.insert("a", vec![1.0, 0.0], payload("ferrous metallurgy", "x.md"))
            .await
            .unwrap();
        docs.upsert("a", vec![0.0, 1.0], payload("ceramic glazing", "x.md"))
            .await
            .unwrap();
        docs.insert("b", vec![1.0, 0.0], payload("orbital mechanics", "y.md"))
            .await
            .unwrap();
        docs.delete("b").await.unwrap();
    }

    let store = VectorStore::open(tmp.path()).await.unwrap();
    let docs = store.get_collection("docs").await.unwrap();
    assert_eq!(docs.dimension(), 2);
    assert_eq!(docs.count().await, 1);

    let point = docs.get("a").await.unwrap();
    assert_eq!(point.embedding, vec![0.0, 1.0]);
    assert_eq!(point.payload_str("content"), Some("ceramic glazing"));

    // The keyword index is rebuilt from the restored points.
    assert_eq!(docs.keyword_search("ceramic", 5).await.len(), 1);
    assert!(docs.keyword_search("ferrous", 5).await.is_empty());
    assert!(docs.keyword_search("orbital", 5).await.is_empty());
}

// ---------------------------------------------------------------------------
// 5. A persistent store refuses a conflicting dimension after reopen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reopened_store_keeps_dimension_contract() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let store = VectorStore::open(tmp.path()).await.unwrap();
        store.get_or_create_collection("docs", 1536).await.unwrap();
    }

    let store = VectorStore::open(tmp.path()).await.unwrap();
    let err = store.get_or_create_collection("docs", 768).await.unwrap_err();
    assert!(matches!(
        err,
        RetrovaError::DimensionMismatch { expected: 1536, actual: 768, .. }
    ));
}

// ---------------------------------------------------------------------------
// 6. Mutations to different ids from concurrent tasks all land
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_inserts_to_distinct_ids_do_not_conflict() {
    let store = Arc::new(VectorStore::in_memory());
    let docs = store.get_or_create_collection("docs", 2).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let docs = docs.clone();
        handles.push(tokio::spawn(async move {
            docs.insert(format!("p{i}"), vec![1.0, 0.0], Payload::new()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(docs.count().await, 32);
}
