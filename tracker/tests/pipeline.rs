//! End-to-end pipeline over in-memory collaborators wired the way the
//! binary wires the production ones.

#![allow(clippy::unwrap_used)] // Test code

use order_tracker::app;
use order_tracker::config::Config;
use order_tracker_core::{
    Carrier, ExtractError, Known, OrderNumber, OrderStore, ShipmentStatus, SourceError,
};
use order_tracker_runtime::{OrderTracker, RetryingExtractor, RetryingSource, RetryingStore, Stage};
use order_tracker_testing::fixtures::{UPS_TRACKING, record, tracked_record};
use order_tracker_testing::mocks::{
    InMemoryOrderStore, ScriptedEmailSource, ScriptedExtractor, test_clock,
};
use std::sync::Arc;

fn config() -> Config {
    Config::from_vars(|_| None).unwrap()
}

fn tracker(
    source: ScriptedEmailSource,
    extractor: ScriptedExtractor,
    store: Arc<InMemoryOrderStore>,
) -> OrderTracker {
    let policy = app::retry_policy(&config().retry);
    OrderTracker::new(
        Arc::new(RetryingSource::new(Arc::new(source), policy.clone())),
        Arc::new(RetryingExtractor::new(Arc::new(extractor), policy.clone())),
        Arc::new(RetryingStore::new(store, policy)),
        Arc::new(test_clock()),
    )
}

#[tokio::test]
async fn run_then_find_then_set_transshipment() {
    let store = Arc::new(InMemoryOrderStore::new());
    let source = ScriptedEmailSource::new()
        .with_message("m1", "A100 confirmed")
        .with_message("m2", "A100 shipped")
        .with_message("m3", "A100 late confirmation")
        .with_message("m4", "B200 confirmed")
        .with_message("m5", "newsletter");
    let extractor = ScriptedExtractor::new()
        .with_record_for("A100 confirmed", record("A100", ShipmentStatus::Confirmed, "01/01/24"))
        .with_record_for(
            "A100 shipped",
            tracked_record("A100", ShipmentStatus::Shipped, "01/03/24", UPS_TRACKING, Carrier::Ups),
        )
        .with_record_for(
            "A100 late confirmation",
            record("A100", ShipmentStatus::Confirmed, "01/02/24"),
        )
        .with_record_for("B200 confirmed", record("B200", ShipmentStatus::Confirmed, "01/04/24"));
    // Transient failures are absorbed by the retry policy.
    store.fail_next_lookups(2);

    let report = tracker(source, extractor, store.clone()).run().await.unwrap();

    assert_eq!(report.listed, 5);
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.stale, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id.as_str(), "m5");
    assert_eq!(report.failures[0].error.stage(), Stage::Extract);

    let mut out = Vec::new();
    let awaiting = app::find(store.as_ref(), None, &mut out).await.unwrap();
    assert_eq!(awaiting, 1);
    assert!(String::from_utf8(out).unwrap().contains(UPS_TRACKING));

    app::set_transshipment(store.as_ref(), "A100", "DHL", "PKG-1")
        .await
        .unwrap();

    let shipment = store
        .find_shipment_by_number(OrderNumber::new("A100"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Shipped);
    assert_eq!(shipment.tracking_number, Known::new(UPS_TRACKING));
    assert_eq!(shipment.trans_carrier, Known::new("DHL"));
    let mut out = Vec::new();
    assert_eq!(app::find(store.as_ref(), None, &mut out).await.unwrap(), 0);
}

#[tokio::test]
async fn unauthorized_services_fail_items_without_retrying() {
    let store = Arc::new(InMemoryOrderStore::new());
    let source = ScriptedEmailSource::new()
        .with_decode_error("m1", SourceError::Unauthorized("token revoked".to_string()))
        .with_message("m2", "A100 confirmed");
    let extractor = Arc::new(
        ScriptedExtractor::new().with_error_for("A100 confirmed", ExtractError::Unauthorized),
    );

    let policy = app::retry_policy(&config().retry);
    let tracker = OrderTracker::new(
        Arc::new(RetryingSource::new(Arc::new(source), policy.clone())),
        Arc::new(RetryingExtractor::new(extractor.clone(), policy.clone())),
        Arc::new(RetryingStore::new(store.clone(), policy)),
        Arc::new(test_clock()),
    );

    let report = tracker.run().await.unwrap();

    let stages: Vec<Stage> = report.failures.iter().map(|f| f.error.stage()).collect();
    assert_eq!(stages, vec![Stage::Decode, Stage::Extract]);
    assert_eq!(extractor.calls(), 1);
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn listing_failure_aborts_the_run() {
    let source = ScriptedEmailSource::new().with_message("m1", "A100 confirmed");
    for _ in 0..5 {
        source.fail_next_listing(SourceError::Unavailable("connection reset".to_string()));
    }

    let result = tracker(
        source,
        ScriptedExtractor::new(),
        Arc::new(InMemoryOrderStore::new()),
    )
    .run()
    .await;

    assert!(result.is_err());
}
