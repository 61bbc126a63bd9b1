use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use engagement_tracker::ContentKind;
use serde_json::Value;
use signal_dispatch::{
    HttpTransport, IdRef, SelectedText, SignalBatch, Transport, TransportError, WireElement,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use url::Url;

type Received = Arc<Mutex<Vec<Value>>>;

async fn accept(State(received): State<Received>, Json(body): Json<Value>) -> StatusCode {
    received.lock().await.push(body);
    StatusCode::NO_CONTENT
}

async fn reject() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn spawn_collector() -> (Url, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/collect", post(accept))
        .route("/broken", post(reject))
        .with_state(received.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (Url::parse(&format!("http://{addr}/")).expect("url"), received)
}

fn batch() -> SignalBatch {
    SignalBatch {
        profile: IdRef::new("profile-9"),
        session: IdRef::new("session-9"),
        source: IdRef::new("source-9"),
        url: "https://news.test/story".into(),
        elements: vec![WireElement {
            id: "4a12d7ac".into(),
            tag: "h1".into(),
            kind: ContentKind::Header,
            content: "Welcome".into(),
            duration: 5_200,
            mouse_over_duration: 0,
            click_count: 0,
            selected_text: SelectedText::One(None),
            duplicate_count: 1,
            boost: BTreeMap::new(),
        }],
    }
}

#[tokio::test]
async fn post_delivers_json_body() {
    let (base, received) = spawn_collector().await;
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    transport
        .post(&base.join("collect").unwrap(), &batch())
        .await
        .expect("post");

    let bodies = received.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["profile"]["id"], "profile-9");
    assert_eq!(bodies[0]["elements"][0]["type"], "header");
    assert_eq!(bodies[0]["elements"][0]["duration"], 5_200);
}

#[tokio::test]
async fn server_error_is_reported_as_status() {
    let (base, _) = spawn_collector().await;
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let err = transport
        .post(&base.join("broken").unwrap(), &batch())
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Status(500));
}

#[tokio::test]
async fn beacon_is_delivered_in_the_background() {
    let (base, received) = spawn_collector().await;
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    transport
        .beacon(&base.join("collect").unwrap(), &batch())
        .expect("beacon accepted");
    assert!(transport.settle(Duration::from_secs(5)).await);
    assert_eq!(received.lock().await.len(), 1);

    let refused = transport.beacon(&base.join("collect").unwrap(), &batch());
    assert!(matches!(refused, Err(TransportError::BeaconRefused(_))));
}
