//! Command implementations and dependency wiring.
//!
//! Every collaborator is built here, owned by the command that uses it and
//! dropped when the command returns.

use crate::config::{Config, RetryConfig, RunSecrets};
use anyhow::{Context, bail};
use order_tracker_anthropic::{AnthropicClient, AnthropicOrderExtractor};
use order_tracker_core::environment::SystemClock;
use order_tracker_core::{Known, OrderNumber, OrderStore, ShipmentFilter};
use order_tracker_gmail::{GmailClient, GmailCredentials};
use order_tracker_postgres::PostgresOrderStore;
use order_tracker_runtime::{
    OrderTracker, RetryPolicy, RetryingExtractor, RetryingSource, RetryingStore, RunReport,
};
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// The configured retry policy: fixed delay, bounded attempts.
#[must_use]
pub fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy::fixed(config.max_attempts, config.delay)
}

/// Connect to the order store.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn connect_store(config: &Config) -> anyhow::Result<PostgresOrderStore> {
    info!("Connecting to order store...");
    let store = PostgresOrderStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await
    .context("connecting to the order store")?
    .with_query_timeout(config.database.query_timeout);
    info!("Order store connected");
    Ok(store)
}

/// Wrap a store in the configured retry policy.
#[must_use]
pub fn retrying_store(config: &Config, store: Arc<dyn OrderStore>) -> Arc<dyn OrderStore> {
    Arc::new(RetryingStore::new(store, retry_policy(&config.retry)))
}

/// Build the run orchestrator over Gmail, Anthropic and `store`.
///
/// # Errors
///
/// Returns an error if the Gmail client cannot be set up.
pub fn build_tracker(
    config: &Config,
    secrets: RunSecrets,
    store: Arc<dyn OrderStore>,
) -> anyhow::Result<OrderTracker> {
    let policy = retry_policy(&config.retry);

    let gmail = GmailClient::new(GmailCredentials {
        client_id: secrets.gmail_client_id,
        client_secret: secrets.gmail_client_secret,
        refresh_token: secrets.gmail_refresh_token,
    })
    .context("setting up the Gmail client")?
    .with_user_id(config.gmail.user_id.clone())
    .with_strip_links(config.gmail.strip_links)
    .context("setting up the Gmail client")?;

    let extractor = AnthropicOrderExtractor::new(AnthropicClient::new(secrets.anthropic_api_key))
        .with_model(config.extraction.model.clone())
        .with_max_tokens(config.extraction.max_tokens);

    Ok(OrderTracker::new(
        Arc::new(RetryingSource::new(Arc::new(gmail), policy.clone())),
        Arc::new(RetryingExtractor::new(Arc::new(extractor), policy.clone())),
        Arc::new(RetryingStore::new(store, policy)),
        Arc::new(SystemClock),
    ))
}

/// `run`: process unread emails once and print the report.
///
/// # Errors
///
/// Returns an error if secrets are missing, a collaborator cannot be set up,
/// or unread messages cannot be listed.
pub async fn run(config: &Config, out: &mut impl Write) -> anyhow::Result<RunReport> {
    let secrets = config.run_secrets()?;
    let store = Arc::new(connect_store(config).await?);

    let tracker = build_tracker(config, secrets, store.clone())?;
    let result = tracker.run().await;
    store.close().await;

    let report = result.context("processing unread emails")?;
    write_report(&report, out)?;
    Ok(report)
}

/// `find`: print matching shipment entries as JSON, one per line.
///
/// # Errors
///
/// Returns an error if the query fails or output cannot be written.
pub async fn find(
    store: &dyn OrderStore,
    filter: Option<ShipmentFilter>,
    out: &mut impl Write,
) -> anyhow::Result<usize> {
    let filter = filter.unwrap_or_else(ShipmentFilter::awaiting_transshipment);
    let entries = store
        .find_shipments_by_filter(filter)
        .await
        .context("querying shipment entries")?;

    for entry in &entries {
        writeln!(out, "{}", serde_json::to_string(entry)?)?;
    }
    Ok(entries.len())
}

/// `set-transshipment`: overwrite the transshipment leg of one order.
///
/// # Errors
///
/// Returns an error if the write fails or no shipment entry exists.
pub async fn set_transshipment(
    store: &dyn OrderStore,
    number: &str,
    trans_carrier: &str,
    package_number: &str,
) -> anyhow::Result<()> {
    let number = OrderNumber::new(number);
    if !number.is_usable() {
        bail!("order number {number:?} is not usable");
    }

    let outcome = store
        .set_transshipment(
            number.clone(),
            Known::new(trans_carrier),
            Known::new(package_number),
        )
        .await
        .with_context(|| format!("setting transshipment for order {number}"))?;

    if !outcome.is_applied() {
        bail!("no shipment entry for order {number}");
    }
    Ok(())
}

/// Human-readable run summary.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn write_report(report: &RunReport, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "Processed {} email(s): {} created, {} updated, {} stale, {} failed",
        report.listed,
        report.created,
        report.updated,
        report.stale,
        report.failures.len()
    )?;
    for failure in &report.failures {
        writeln!(out, "  {failure}")?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use order_tracker_core::{DetailsEntry, ShipmentEntry, ShipmentStatus};
    use order_tracker_runtime::{FailedMessage, StageError};
    use order_tracker_testing::fixtures::record;
    use order_tracker_testing::mocks::InMemoryOrderStore;
    use std::time::Duration;

    fn seeded_store() -> InMemoryOrderStore {
        let store = InMemoryOrderStore::new();
        for (number, status) in [
            ("A100", ShipmentStatus::Shipped),
            ("A200", ShipmentStatus::Confirmed),
            ("A300", ShipmentStatus::Delivered),
        ] {
            let record = record(number, status, "01/03/24");
            store.seed_details(DetailsEntry::from_record(&record));
            store.seed_shipment(ShipmentEntry::from_record(&record));
        }
        store
    }

    #[test]
    fn retry_policy_is_fixed() {
        let policy = retry_policy(&RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        });

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn find_defaults_to_awaiting_transshipment() {
        let store = seeded_store();
        let mut out = Vec::new();

        let count = find(&store, None, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(count, 2);
        assert!(printed.contains("\"A100\""));
        assert!(printed.contains("\"A300\""));
        assert!(!printed.contains("\"A200\""));
        assert_eq!(printed.lines().count(), 2);
    }

    #[tokio::test]
    async fn set_transshipment_then_no_longer_awaiting() {
        let store = seeded_store();

        set_transshipment(&store, "A100", "DHL", "PKG-1").await.unwrap();

        let shipment = store.shipment(&OrderNumber::new("A100")).unwrap();
        assert_eq!(shipment.trans_carrier, Known::new("DHL"));
        assert_eq!(shipment.package_number, Known::new("PKG-1"));
        let mut out = Vec::new();
        assert_eq!(find(&store, None, &mut out).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn set_transshipment_on_unknown_order_fails() {
        let store = seeded_store();

        let error = set_transshipment(&store, "Z999", "DHL", "PKG-1")
            .await
            .unwrap_err();

        assert!(error.to_string().contains("no shipment entry for order Z999"));
    }

    #[tokio::test]
    async fn set_transshipment_rejects_unusable_number() {
        let store = seeded_store();

        assert!(set_transshipment(&store, "Unknown", "DHL", "PKG-1").await.is_err());
        assert_eq!(store.write_calls(), 0);
    }

    #[test]
    fn report_lists_failures() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let report = RunReport {
            started_at: at,
            finished_at: at,
            listed: 3,
            created: 1,
            updated: 1,
            stale: 0,
            failures: vec![FailedMessage {
                id: order_tracker_core::MessageId::new("m3"),
                error: StageError::Extract(order_tracker_core::ExtractError::RateLimited),
            }],
        };
        let mut out = Vec::new();

        write_report(&report, &mut out).unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("Processed 3 email(s): 1 created, 1 updated, 0 stale, 1 failed"));
        assert!(printed.contains("m3"));
    }
}
