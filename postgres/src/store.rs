//! `PostgreSQL`-backed order store.

use crate::filter::shipment_query;
use order_tracker_core::store::StoreFuture;
use order_tracker_core::{
    Carrier, DetailsDelta, DetailsEntry, Known, OrderItem, OrderNumber, OrderStore,
    ShipmentDelta, ShipmentEntry, ShipmentFilter, ShipmentStatus, StoreError, WriteOutcome,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgQueryResult, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use std::future::Future;
use std::time::Duration;

/// Default bound on a single query (the shipment lookup in particular).
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

const SHIPMENT_COLUMNS: &str =
    "number, last_update, status, tracking_number, carrier, trans_carrier, package_number";

/// PostgreSQL-backed order store.
///
/// Stores the two collections in the `order_details` and `order_shipment`
/// tables (see `migrations/`). Every query is bounded by `query_timeout`;
/// an expired bound surfaces as [`StoreError::Timeout`].
///
/// # Example
///
/// ```ignore
/// use order_tracker_postgres::PostgresOrderStore;
///
/// let store = PostgresOrderStore::connect(&database_url, 5, Duration::from_secs(30)).await?;
/// store.migrate().await?;
///
/// let pending = store
///     .find_shipments_by_filter(ShipmentFilter::awaiting_transshipment())
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct PostgresOrderStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresOrderStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Connect to `database_url` with a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the connection cannot be established.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Set the per-query time bound.
    #[must_use]
    pub const fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Create or upgrade the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Look up the details entry for an order number.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails or a row cannot be decoded.
    pub async fn find_details_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<DetailsEntry>, StoreError> {
        let row = self
            .bounded(
                "find_details_by_number",
                sqlx::query(
                    "SELECT number, brand, date, total, items, status
                     FROM order_details
                     WHERE number = $1",
                )
                .bind(number.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(details_from_row).transpose()
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        query: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.map_err(store_error),
            Err(_) => Err(StoreError::Timeout(format!(
                "{operation} exceeded {}ms",
                self.query_timeout.as_millis()
            ))),
        }
    }
}

impl OrderStore for PostgresOrderStore {
    fn find_shipment_by_number(
        &self,
        number: OrderNumber,
    ) -> StoreFuture<'_, Option<ShipmentEntry>> {
        Box::pin(async move {
            let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM order_shipment WHERE number = $1");
            let row = self
                .bounded(
                    "find_shipment_by_number",
                    sqlx::query(&sql)
                        .bind(number.as_str())
                        .fetch_optional(&self.pool),
                )
                .await?;

            row.as_ref().map(shipment_from_row).transpose()
        })
    }

    fn insert_details(&self, entry: DetailsEntry) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let result = self
                .bounded(
                    "insert_details",
                    sqlx::query(
                        "INSERT INTO order_details (number, brand, date, total, items, status)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         ON CONFLICT (number) DO NOTHING",
                    )
                    .bind(entry.number.as_str())
                    .bind(&entry.brand)
                    .bind(entry.date)
                    .bind(&entry.total)
                    .bind(Json(&entry.items))
                    .bind(entry.status.as_str())
                    .execute(&self.pool),
                )
                .await?;

            Ok(outcome(&result))
        })
    }

    fn insert_shipment(&self, entry: ShipmentEntry) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let result = self
                .bounded(
                    "insert_shipment",
                    sqlx::query(
                        "INSERT INTO order_shipment
                            (number, last_update, status, tracking_number, carrier,
                             trans_carrier, package_number)
                         VALUES ($1, $2, $3, $4, $5, $6, $7)
                         ON CONFLICT (number) DO NOTHING",
                    )
                    .bind(entry.number.as_str())
                    .bind(entry.last_update)
                    .bind(entry.status.as_str())
                    .bind(entry.tracking_number.as_str())
                    .bind(entry.carrier.as_str())
                    .bind(entry.trans_carrier.as_str())
                    .bind(entry.package_number.as_str())
                    .execute(&self.pool),
                )
                .await?;

            Ok(outcome(&result))
        })
    }

    fn update_details(
        &self,
        number: OrderNumber,
        delta: DetailsDelta,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let result = match delta.status {
                Some(status) => {
                    self.bounded(
                        "update_details",
                        sqlx::query("UPDATE order_details SET status = $1 WHERE number = $2")
                            .bind(status.as_str())
                            .bind(number.as_str())
                            .execute(&self.pool),
                    )
                    .await?
                }
                // Nothing to set; report whether the entry exists.
                None => {
                    self.bounded(
                        "update_details",
                        sqlx::query("SELECT 1 FROM order_details WHERE number = $1")
                            .bind(number.as_str())
                            .execute(&self.pool),
                    )
                    .await?
                }
            };

            Ok(outcome(&result))
        })
    }

    fn update_shipment(
        &self,
        number: OrderNumber,
        delta: ShipmentDelta,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let mut query = shipment_update(&number, &delta);
            let result = self
                .bounded("update_shipment", query.build().execute(&self.pool))
                .await?;

            Ok(outcome(&result))
        })
    }

    fn find_shipments_by_filter(
        &self,
        filter: ShipmentFilter,
    ) -> StoreFuture<'_, Vec<ShipmentEntry>> {
        Box::pin(async move {
            let mut query = shipment_query(SHIPMENT_COLUMNS, &filter);
            let rows = self
                .bounded("find_shipments_by_filter", query.build().fetch_all(&self.pool))
                .await?;

            rows.iter().map(shipment_from_row).collect()
        })
    }

    fn set_transshipment(
        &self,
        number: OrderNumber,
        trans_carrier: Known,
        package_number: Known,
    ) -> StoreFuture<'_, WriteOutcome> {
        Box::pin(async move {
            let result = self
                .bounded(
                    "set_transshipment",
                    sqlx::query(
                        "UPDATE order_shipment
                         SET trans_carrier = $1, package_number = $2
                         WHERE number = $3",
                    )
                    .bind(trans_carrier.as_str())
                    .bind(package_number.as_str())
                    .bind(number.as_str())
                    .execute(&self.pool),
                )
                .await?;

            tracing::info!(
                number = %number,
                trans_carrier = %trans_carrier,
                package_number = %package_number,
                applied = result.rows_affected() > 0,
                "Transshipment set"
            );
            Ok(outcome(&result))
        })
    }
}

/// `UPDATE order_shipment` writing only the fields present in `delta`.
pub(crate) fn shipment_update(
    number: &OrderNumber,
    delta: &ShipmentDelta,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("UPDATE order_shipment SET last_update = ");
    query.push_bind(delta.last_update);
    if let Some(status) = delta.status {
        query.push(", status = ").push_bind(status.as_str());
    }
    if let Some(tracking) = &delta.tracking {
        query
            .push(", tracking_number = ")
            .push_bind(tracking.tracking_number.as_str().to_string())
            .push(", carrier = ")
            .push_bind(tracking.carrier.as_str());
    }
    query
        .push(" WHERE number = ")
        .push_bind(number.as_str().to_string());
    query
}

fn outcome(result: &PgQueryResult) -> WriteOutcome {
    if result.rows_affected() > 0 {
        WriteOutcome::Applied
    } else {
        WriteOutcome::NotApplied
    }
}

fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(error.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => StoreError::Serialization(error.to_string()),
        _ => StoreError::Database(error.to_string()),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(store_error)
}

fn invalid_value(error: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(error.to_string())
}

fn shipment_from_row(row: &PgRow) -> Result<ShipmentEntry, StoreError> {
    let status: String = column(row, "status")?;
    let carrier: String = column(row, "carrier")?;

    Ok(ShipmentEntry {
        number: OrderNumber::new(column::<String>(row, "number")?),
        last_update: column(row, "last_update")?,
        status: ShipmentStatus::parse(&status).map_err(invalid_value)?,
        tracking_number: Known::new(column::<String>(row, "tracking_number")?),
        carrier: Carrier::parse(&carrier).map_err(invalid_value)?,
        trans_carrier: Known::new(column::<String>(row, "trans_carrier")?),
        package_number: Known::new(column::<String>(row, "package_number")?),
    })
}

fn details_from_row(row: &PgRow) -> Result<DetailsEntry, StoreError> {
    let status: String = column(row, "status")?;
    let Json(items): Json<Vec<OrderItem>> = column(row, "items")?;

    Ok(DetailsEntry {
        brand: column(row, "brand")?,
        date: column(row, "date")?,
        number: OrderNumber::new(column::<String>(row, "number")?),
        total: column(row, "total")?,
        items,
        status: ShipmentStatus::parse(&status).map_err(invalid_value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use order_tracker_core::TrackingAssignment;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap_or_default()
    }

    #[test]
    fn touch_only_sets_last_update() {
        let query = shipment_update(&OrderNumber::new("A100"), &ShipmentDelta::touch(jan(3)));
        assert_eq!(
            query.sql(),
            "UPDATE order_shipment SET last_update = $1 WHERE number = $2"
        );
    }

    #[test]
    fn full_delta_sets_status_and_tracking_together() {
        let delta = ShipmentDelta {
            last_update: jan(3),
            status: Some(ShipmentStatus::Shipped),
            tracking: Some(TrackingAssignment {
                tracking_number: Known::new("1Z9999999999999999"),
                carrier: Carrier::Ups,
            }),
        };

        let query = shipment_update(&OrderNumber::new("A100"), &delta);

        assert_eq!(
            query.sql(),
            "UPDATE order_shipment SET last_update = $1, status = $2, \
             tracking_number = $3, carrier = $4 WHERE number = $5"
        );
    }

    #[test]
    fn connection_errors_are_transient() {
        assert!(store_error(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!store_error(sqlx::Error::RowNotFound).is_transient());
        assert!(matches!(
            store_error(sqlx::Error::ColumnNotFound("status".to_string())),
            StoreError::Serialization(_)
        ));
    }
}
