mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use pricefeed_backend::models::price::{parse_timestamp, Network, PriceRecord, Provenance};
use pricefeed_backend::services::cache::CacheStrategy;

use crate::common::build_context;

const TOKEN_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const TOKEN_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn record(token: &str, network: Network, ts: DateTime<Utc>, usd: f64) -> PriceRecord {
    PriceRecord {
        token: token.to_lowercase(),
        network,
        timestamp: ts,
        usd,
        last_updated: ts,
        symbol: None,
        name: None,
        decimals: None,
        total_supply: None,
        logo_uri: None,
        provenance: Provenance::FromApi,
        interpolation: None,
    }
}

fn resolve_request(token: &str, network: &str, timestamp: Option<&str>) -> Request<Body> {
    let mut body = json!({ "token": token, "network": network });
    if let Some(ts) = timestamp {
        body["timestamp"] = json!(ts);
    }
    Request::builder()
        .method("POST")
        .uri("/api/tokens")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Scenario 1: a pre-populated cache entry is served tagged fromCache, and
/// a mixed-case token address hits the same key.
#[tokio::test]
async fn tier1_cache_hit() {
    let ctx = build_context();
    let key = ctx
        .state
        .cache
        .price_key(Network::Ethereum, TOKEN_A, None);
    ctx.state
        .cache
        .set(
            &key,
            record(TOKEN_A, Network::Ethereum, Utc::now(), 1.23),
            CacheStrategy::Hot,
        )
        .await;

    let response = ctx
        .router
        .oneshot(resolve_request(&TOKEN_A.to_uppercase().replace("0X", "0x"), "ethereum", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["usd"], 1.23);
    assert_eq!(json["data"]["provenance"], "fromCache");
}

/// Scenario 2: a durable row is served tagged fromDB and re-populates the
/// cache with the warm strategy.
#[tokio::test]
async fn tier2_store_hit_repopulates_cache() {
    let ctx = build_context();
    let ts = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
    ctx.state
        .store
        .store_price(&record(TOKEN_B, Network::Polygon, ts, 2.50))
        .await
        .unwrap();

    let response = ctx
        .router
        .clone()
        .oneshot(resolve_request(TOKEN_B, "polygon", Some("2024-01-01T00:00:00Z")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["usd"], 2.5);
    assert_eq!(json["data"]["provenance"], "fromDB");

    let key = ctx.state.cache.price_key(Network::Polygon, TOKEN_B, Some(ts));
    assert!(ctx.state.cache.exists(&key).await);

    // A second read now comes from the cache.
    let response = ctx
        .router
        .oneshot(resolve_request(TOKEN_B, "polygon", Some("2024-01-01T00:00:00Z")))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"]["provenance"], "fromCache");
}

/// Scenario 3: an oracle answer is written through to store and cache, and
/// the new token's registry entry appears with its discovered creation date.
#[tokio::test]
async fn tier3_oracle_hit_writes_through_and_registers_token() {
    let ctx = build_context();
    ctx.source.set_price(TOKEN_A, Network::Ethereum, None, 10.0);
    ctx.source.set_creation_date(
        TOKEN_A,
        Network::Ethereum,
        parse_timestamp("2020-06-01T00:00:00Z").unwrap(),
    );

    let response = ctx
        .router
        .oneshot(resolve_request(TOKEN_A, "ethereum", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["usd"], 10.0);
    assert_eq!(json["data"]["provenance"], "fromAPI");
    assert_eq!(json["data"]["symbol"], "TST");

    // Write-through: the store has the record.
    assert_eq!(ctx.store.price_count(), 1);
    let key = ctx.state.cache.price_key(Network::Ethereum, TOKEN_A, None);
    assert!(ctx.state.cache.exists(&key).await);

    // Token discovery runs in a detached task.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let entry = ctx
        .state
        .store
        .get_token(TOKEN_A, Network::Ethereum)
        .await
        .unwrap()
        .expect("token should be registered");
    assert_eq!(
        entry.creation_date,
        Some(parse_timestamp("2020-06-01T00:00:00Z").unwrap())
    );
}

/// Scenario 4: with stored neighbors at 10 and 20 USD bracketing the target
/// and a silent oracle, the midpoint resolves to exactly 15 by linear
/// interpolation and is persisted with interpolated = true.
#[tokio::test]
async fn tier4_linear_interpolation() {
    let ctx = build_context();
    let t0 = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
    let t2 = parse_timestamp("2024-01-03T00:00:00Z").unwrap();
    ctx.state
        .store
        .store_price(&record(TOKEN_B, Network::Ethereum, t0, 10.0))
        .await
        .unwrap();
    ctx.state
        .store
        .store_price(&record(TOKEN_B, Network::Ethereum, t2, 20.0))
        .await
        .unwrap();

    let response = ctx
        .router
        .oneshot(resolve_request(TOKEN_B, "ethereum", Some("2024-01-02T00:00:00Z")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["usd"], 15.0);
    assert_eq!(json["data"]["provenance"], "interpolated");
    assert_eq!(json["data"]["method"], "linear");

    // timeConfidence = 1 at the midpoint, volatilityConfidence = 1 - 10/15
    let confidence = json["data"]["confidence"].as_f64().unwrap();
    let expected = (1.0 + (1.0 - 10.0 / 15.0)) / 2.0;
    assert!((confidence - expected).abs() < 1e-9);
    assert!(confidence >= 0.3);
    assert_eq!(json["data"]["dataPointsUsed"].as_array().unwrap().len(), 2);

    // The synthesized record is persisted and flagged.
    let t1 = parse_timestamp("2024-01-02T00:00:00Z").unwrap();
    let stored = ctx
        .state
        .store
        .get_price(TOKEN_B, Network::Ethereum, Some(t1))
        .await
        .unwrap()
        .expect("interpolation should be persisted");
    assert!(stored.is_interpolated());
}

/// Scenario 5: nothing anywhere - the request is deferred with a 202 and
/// exactly one job lands in the price queue.
#[tokio::test]
async fn tier5_defers_to_queue() {
    let ctx = build_context();

    let response = ctx
        .router
        .oneshot(resolve_request(TOKEN_A, "ethereum", Some("2024-01-02T00:00:00Z")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["queued"], true);
    assert!(json.get("data").is_none());

    let counts = ctx.state.price_queue.counts();
    assert_eq!(counts.waiting, 1);
}

/// A stale cached interpolation must defer to a non-interpolated row that
/// has since landed in the store.
#[tokio::test]
async fn cached_interpolation_defers_to_durable_row() {
    let ctx = build_context();
    let ts = parse_timestamp("2024-01-02T00:00:00Z").unwrap();

    let mut interpolated = record(TOKEN_B, Network::Ethereum, ts, 14.0);
    interpolated.provenance = Provenance::Interpolated;
    interpolated.interpolation = Some(pricefeed_backend::models::price::InterpolationDetails {
        method: pricefeed_backend::models::price::InterpolationMethod::Linear,
        confidence: 0.5,
        data_points_used: vec![],
    });
    let key = ctx.state.cache.price_key(Network::Ethereum, TOKEN_B, Some(ts));
    ctx.state
        .cache
        .set(&key, interpolated, CacheStrategy::Interpolated)
        .await;

    // An authoritative row lands durably afterwards.
    ctx.state
        .store
        .store_price(&record(TOKEN_B, Network::Ethereum, ts, 15.0))
        .await
        .unwrap();

    let response = ctx
        .router
        .oneshot(resolve_request(TOKEN_B, "ethereum", Some("2024-01-02T00:00:00Z")))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["data"]["usd"], 15.0);
    assert_eq!(json["data"]["provenance"], "fromDB");
}

#[tokio::test]
async fn validation_rejects_bad_inputs() {
    let ctx = build_context();

    // Short token
    let response = ctx
        .router
        .clone()
        .oneshot(resolve_request("0xabc", "ethereum", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unsupported network
    let response = ctx
        .router
        .clone()
        .oneshot(resolve_request(TOKEN_A, "solana", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unparseable timestamp
    let response = ctx
        .router
        .clone()
        .oneshot(resolve_request(TOKEN_A, "ethereum", Some("yesterday")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was enqueued for rejected requests.
    assert_eq!(ctx.state.price_queue.counts().waiting, 0);
}

#[tokio::test]
async fn store_outage_is_surfaced_not_masked() {
    let ctx = build_context();
    ctx.store.fail.store(true, std::sync::atomic::Ordering::SeqCst);

    let response = ctx
        .router
        .oneshot(resolve_request(TOKEN_A, "ethereum", Some("2024-01-02T00:00:00Z")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_reflects_store_state() {
    let ctx = build_context();

    let response = ctx
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["services"]["database"], true);
    assert_eq!(json["services"]["queues"], true);

    ctx.store.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let response = ctx
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn queue_status_reports_both_queues() {
    let ctx = build_context();
    ctx.state.price_queue.enqueue(
        pricefeed_backend::services::queue::PriceJob {
            token: TOKEN_A.to_string(),
            network: Network::Ethereum,
            timestamp: None,
        },
        10,
    );

    let response = ctx
        .router
        .oneshot(
            Request::builder()
                .uri("/api/queue/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["priceQueue"]["waiting"], 1);
    assert_eq!(json["batchQueue"]["waiting"], 0);
}

#[tokio::test]
async fn history_endpoint_returns_stored_range() {
    let ctx = build_context();
    for (day, usd) in [(1, 10.0), (2, 11.0), (3, 12.0)] {
        let ts = parse_timestamp(&format!("2024-01-0{}T00:00:00Z", day)).unwrap();
        ctx.state
            .store
            .store_price(&record(TOKEN_B, Network::Ethereum, ts, usd))
            .await
            .unwrap();
    }

    let uri = format!(
        "/api/tokens/{}/history?network=ethereum&start=2024-01-01T00:00:00Z&end=2024-01-02T23:59:59Z",
        TOKEN_B
    );
    let response = ctx
        .router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"][0]["usd"], 10.0);
    assert_eq!(json["data"][1]["usd"], 11.0);
}
