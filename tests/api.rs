//! HTTP round trip: events posted to the intake are projected and served.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};

use flake_indexer::api;
use flake_indexer::app_state::AppState;
use flake_indexer::domain::PairAccount;
use flake_indexer::pipeline::{DeadLetterLog, Projector, ProjectorSettings};
use flake_indexer::projection::{EngineSettings, ProjectionEngine};
use flake_indexer::service::QueryService;
use flake_indexer::source::StaticAccountReader;
use flake_indexer::store::{InMemoryViewStore, Views};

#[tokio::test]
async fn posted_events_show_up_in_listings() {
    let Ok(data_dir) = tempfile::tempdir() else {
        panic!("tempdir");
    };
    let accounts = Arc::new(StaticAccountReader::new());
    accounts.insert(
        "pair-a",
        PairAccount {
            creator: "creator".to_string(),
            ticker: "ATT".to_string(),
            ..PairAccount::default()
        },
    );
    let views = Views::new(Arc::new(InMemoryViewStore::new()), Duration::from_secs(1));
    let engine = ProjectionEngine::new(views.clone(), accounts, EngineSettings::default());
    let projector = Projector::new(
        engine,
        DeadLetterLog::in_dir(data_dir.path()),
        ProjectorSettings::default(),
    );

    let (ingest, events) = mpsc::channel(64);
    let (stop, stopped) = watch::channel(false);
    let projector = tokio::spawn(projector.run(events, stopped));

    let state = AppState {
        query_service: Arc::new(QueryService::new(views)),
        ingest,
    };
    let app = api::build_router().with_state(state);
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");
    let batch = json!([
        {"kind": "PairCreated", "slot": 1,
         "payload": {"pairId": 1, "pairKey": "pair-a", "creator": "creator", "basePrice": 40000}},
        {"kind": "SwapExecuted", "slot": 2,
         "payload": {"isBuy": true, "amountIn": "1000", "amountOut": "500000", "user": "u1", "pairKey": "pair-a"}},
        {"kind": "RequestSubmitted", "slot": 3,
         "payload": {"pairKey": "pair-a", "user": "u1", "requestIndex": 0, "adText": "gm"}},
    ]);
    let Ok(response) = client.post(format!("{base}/api/v1/events")).json(&batch).send().await else {
        panic!("post events");
    };
    assert_eq!(response.status().as_u16(), 202);

    // Stopping the projector flushes its reorder buffer.
    assert!(stop.send(true).is_ok());
    let Ok(stats) = projector.await else {
        panic!("projector task");
    };
    assert_eq!(stats.applied, 3);

    let pairs = get_json(&client, &format!("{base}/api/v1/pairs")).await;
    assert_eq!(pairs.pointer("/items/0/supply"), Some(&json!("500000")));
    assert_eq!(pairs.pointer("/items/0/buys"), Some(&json!(1)));

    let swaps = get_json(&client, &format!("{base}/api/v1/swaps?pairKey=pair-a")).await;
    assert_eq!(swaps.pointer("/items/0/tokenOut"), Some(&json!("ATT")));

    let requests = get_json(&client, &format!("{base}/api/v1/requests")).await;
    assert_eq!(requests.pointer("/items/0/creator"), Some(&json!("creator")));
    assert_eq!(requests.pointer("/items/0/status"), Some(&json!("Pending")));

    let markets = get_json(&client, &format!("{base}/api/markets")).await;
    assert_eq!(markets.get("totalPages"), Some(&json!(1)));
}

async fn get_json(client: &reqwest::Client, url: &str) -> Value {
    let Ok(response) = client.get(url).send().await else {
        panic!("GET {url}");
    };
    assert!(response.status().is_success(), "GET {url}: {}", response.status());
    let Ok(body) = response.json::<Value>().await else {
        panic!("GET {url}: body is not JSON");
    };
    body
}
