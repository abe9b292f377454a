//! Integration tests for the HTTP API.
//!
//! Drives the axum router in-process with a scripted delivery capability, so
//! no network or push service is involved.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use webpush_relay::notifications::{DeliveryOutcome, PushDelivery, PushSubscription};
use webpush_relay::server::{router, AppState};
use webpush_relay::{SubscriptionRegistry, SubscriptionStore};

const PUBLIC_KEY: &str = "BPublicKeyForTests";

/// Delivery double answering per endpoint, Delivered by default.
#[derive(Default)]
struct ScriptedDelivery {
    outcomes: HashMap<String, DeliveryOutcome>,
}

#[async_trait]
impl PushDelivery for ScriptedDelivery {
    async fn deliver(&self, subscription: &PushSubscription, _payload: &[u8]) -> DeliveryOutcome {
        self.outcomes
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(DeliveryOutcome::Delivered)
    }
}

struct TestApp {
    app: Router,
    registry: Arc<SubscriptionRegistry>,
    state_file: std::path::PathBuf,
    _dir: TempDir,
}

fn setup(delivery: ScriptedDelivery) -> TestApp {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("data/subscriptions.json");
    let registry = Arc::new(SubscriptionRegistry::open(SubscriptionStore::new(&state_file)));
    let state = AppState::new(Arc::clone(&registry), Arc::new(delivery), PUBLIC_KEY);
    let app = router(state, dir.path());
    TestApp {
        app,
        registry,
        state_file,
        _dir: dir,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn subscription(endpoint: &str) -> Value {
    json!({ "endpoint": endpoint, "keys": { "p256dh": "BBp...==", "auth": "xyz=" } })
}

#[tokio::test]
async fn test_public_key_endpoint() {
    let t = setup(ScriptedDelivery::default());
    let (status, body) = call(&t.app, "GET", "/api/vapid-public-key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "publicKey": PUBLIC_KEY }));
}

#[tokio::test]
async fn test_subscribe_unsubscribe_flow() {
    let t = setup(ScriptedDelivery::default());
    let endpoint = "https://push.example/abc";

    let (status, body) = call(&t.app, "POST", "/api/subscribe", Some(subscription(endpoint))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(t.registry.count(), 1);

    let on_disk = SubscriptionStore::new(&t.state_file).load().unwrap();
    assert_eq!(on_disk[endpoint], PushSubscription::new(endpoint, "BBp...==", "xyz="));

    let (status, body) =
        call(&t.app, "POST", "/api/unsubscribe", Some(json!({ "endpoint": endpoint }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(t.registry.count(), 0);

    let (status, body) =
        call(&t.app, "POST", "/api/unsubscribe", Some(json!({ "endpoint": endpoint }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_found");
    assert_eq!(t.registry.count(), 0);
}

#[tokio::test]
async fn test_client_input_errors_are_400() {
    let t = setup(ScriptedDelivery::default());

    let (status, body) = call(&t.app, "POST", "/api/subscribe", Some(json!({ "endpoint": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = call(&t.app, "POST", "/api/subscribe", Some(subscription(""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        call(&t.app, "POST", "/api/unsubscribe", Some(json!({ "endpoint": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&t.app, "POST", "/api/push", Some(json!({ "body": "no title" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(t.registry.count(), 0);
}

#[tokio::test]
async fn test_push_counts_and_evicts_gone() {
    let gone = "https://push.example/gone";
    let flaky = "https://push.example/flaky";
    let delivery = ScriptedDelivery {
        outcomes: HashMap::from([
            (gone.to_string(), DeliveryOutcome::Gone),
            (flaky.to_string(), DeliveryOutcome::Retryable),
        ]),
    };
    let t = setup(delivery);

    for endpoint in [gone, flaky, "https://push.example/a", "https://push.example/b"] {
        let (status, _) = call(&t.app, "POST", "/api/subscribe", Some(subscription(endpoint))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(
        &t.app,
        "POST",
        "/api/push",
        Some(json!({ "title": "Hi", "body": "There", "url": "/inbox" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["success"], 2);
    assert_eq!(body["failed"], 2);
    assert_eq!(body["removed"], 1);
    assert_eq!(body["total"], 3);

    assert!(!t.registry.contains(gone));
    assert!(t.registry.contains(flaky));
    let on_disk = SubscriptionStore::new(&t.state_file).load().unwrap();
    assert_eq!(on_disk.len(), 3);
    assert!(!on_disk.contains_key(gone));
}

#[tokio::test]
async fn test_push_with_no_subscriptions() {
    let t = setup(ScriptedDelivery::default());
    let (status, body) =
        call(&t.app, "POST", "/api/push", Some(json!({ "title": "Hi", "body": "" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], 0);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_health_reports_count() {
    let t = setup(ScriptedDelivery::default());
    call(&t.app, "POST", "/api/subscribe", Some(subscription("https://push.example/1"))).await;

    let (status, body) = call(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "subscriptions": 1 }));
}

#[tokio::test]
async fn test_concurrent_subscribes_all_land() {
    let t = setup(ScriptedDelivery::default());

    let requests = (0..25).map(|i| {
        let app = t.app.clone();
        tokio::spawn(async move {
            call(
                &app,
                "POST",
                "/api/subscribe",
                Some(subscription(&format!("https://push.example/{i}"))),
            )
            .await
            .0
        })
    });
    for handle in requests.collect::<Vec<_>>() {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(t.registry.count(), 25);
    assert_eq!(SubscriptionStore::new(&t.state_file).load().unwrap().len(), 25);
}
