//! End-to-end scenarios exercising the dispatcher/cache/data-service stack
//! together, as opposed to the unit tests colocated with each module.

use market_intel_server::cache::{Cache, CachedValue};
use market_intel_server::config::Settings;
use market_intel_server::data_service::DataService;
use market_intel_server::dispatcher::Dispatcher;
use market_intel_server::models::Outcome;
use market_intel_server::notifications::LoggingNotificationSink;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn dispatcher_with_rate_limit(requests: u32) -> Dispatcher {
    let settings = Settings::from_map(HashMap::new());
    let service = DataService::new(&settings, Arc::new(Cache::new()));
    Dispatcher::new(service, requests, Duration::from_secs(60), Arc::new(LoggingNotificationSink))
}

#[tokio::test]
async fn tam_baseline_matches_the_documented_defaults() {
    let dispatcher = dispatcher_with_rate_limit(100);
    let response = dispatcher.dispatch("tam_calculator", json!({}), "scenario-client").await;
    assert!(!response.is_error);

    let result: Value = serde_json::from_str(&response.content[0].text).unwrap();
    // baseMarketSize=10e9, annualGrowthRate=0.15, projectionYears=5
    let expected = 10e9 * 1.15f64.powi(5);
    let actual = result["calculatedTam"].as_f64().unwrap();
    assert!((actual - expected).abs() / expected < 1e-9);
}

#[tokio::test]
async fn tam_with_segmentation_scales_only_the_final_year() {
    let dispatcher = dispatcher_with_rate_limit(100);
    let response = dispatcher
        .dispatch(
            "tam_calculator",
            json!({
                "baseMarketSize": 10_000.0,
                "annualGrowthRate": 0.05,
                "projectionYears": 8,
                "segmentationAdjustments": { "factor": 0.8, "rationale": "enterprise-only slice" },
            }),
            "scenario-client",
        )
        .await;
    assert!(!response.is_error);

    let result: Value = serde_json::from_str(&response.content[0].text).unwrap();
    let unscaled_final_year = 10_000.0 * 1.05f64.powi(8);
    let expected = unscaled_final_year * 0.8;
    let actual = result["calculatedTam"].as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-6);

    // the year-by-year series itself is unscaled; only the headline figure
    // reflects the segmentation factor.
    let year_by_year = result["yearByYear"].as_array().unwrap();
    let last_year_value = year_by_year.last().unwrap()[1].as_f64().unwrap();
    assert!((last_year_value - unscaled_final_year).abs() < 1e-6);
}

#[tokio::test]
async fn concurrent_misses_on_the_same_key_coalesce_onto_one_fetch() {
    let cache = Arc::new(Cache::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch(
                    "alpha_vantage:OVERVIEW:AAPL",
                    Duration::from_secs(60),
                    Duration::from_secs(60),
                    Duration::from_secs(60),
                    Duration::from_secs(60),
                    Duration::from_secs(60),
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(15)).await;
                        Outcome::Success(json!({ "symbol": "AAPL" }))
                    },
                )
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.unwrap()["symbol"], json!("AAPL"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "only one fetch should have run");

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1, "only the caller that actually fetched counts as a miss");
    assert_eq!(stats.hits, 9, "the other nine coalesced onto that fetch and count as hits");
}

#[tokio::test]
async fn rate_limit_short_circuits_before_the_handler_runs() {
    let dispatcher = dispatcher_with_rate_limit(2);
    let args = json!({});

    let first = dispatcher.dispatch("tam_calculator", args.clone(), "rate-limited-client").await;
    let second = dispatcher.dispatch("tam_calculator", args.clone(), "rate-limited-client").await;
    let third = dispatcher.dispatch("tam_calculator", args, "rate-limited-client").await;

    assert!(!first.is_error);
    assert!(!second.is_error);
    assert!(third.is_error);
    assert!(third.content[0].text.contains("rate limited"));

    // a different client has its own window and isn't affected.
    let other_client = dispatcher.dispatch("tam_calculator", json!({}), "another-client").await;
    assert!(!other_client.is_error);
}

#[tokio::test]
async fn disabled_adapter_produces_a_classified_error_not_a_panic() {
    let dispatcher = dispatcher_with_rate_limit(100);
    // no FRED_API_KEY is configured, so this adapter is unavailable.
    let response = dispatcher
        .dispatch("fred_getSeriesObservations", json!({ "seriesId": "GDP" }), "scenario-client")
        .await;
    assert!(response.is_error);
    assert!(!response.content[0].text.is_empty());
}

#[tokio::test]
async fn industry_search_reports_partial_failure_when_one_source_is_unavailable() {
    let settings = Settings::from_map(HashMap::new());
    let service = DataService::new(&settings, Arc::new(Cache::new()));

    // AlphaVantage has no key and bails before making a network call; Census
    // and WorldBank search against a small built-in catalog and always
    // succeed, so the result should carry both real results and one error.
    let result = service.search_industries("technology software", None, 10, 0.0, None).await;

    assert!(!result.results.is_empty(), "Census/WorldBank catalog results should still come through");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].source_name, "AlphaVantage");
    assert!(result.results.iter().all(|i| i.source_details != vec!["AlphaVantage".to_string()]));
}

#[tokio::test]
async fn cache_snapshot_survives_a_simulated_restart() {
    let path = std::env::temp_dir().join("market-intel-scenario-snapshot.json");
    let cache = Cache::new();
    cache
        .set("worldBank:indicator:US:NY.GDP.MKTP.CD", CachedValue::Value(json!({"value": 1.0})), Duration::from_secs(120))
        .await;
    cache.persist_snapshot(&path).await.unwrap();

    let restarted = Cache::new();
    restarted.load_snapshot(&path).await.unwrap();
    assert_eq!(
        restarted.get("worldBank:indicator:US:NY.GDP.MKTP.CD").await,
        Some(Some(json!({"value": 1.0})))
    );

    let _ = std::fs::remove_file(&path);
}
