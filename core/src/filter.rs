//! Filter expressions over shipment entries.
//!
//! A [`ShipmentFilter`] is a small boolean expression tree. It is evaluated
//! in memory by [`ShipmentFilter::matches`] and compiled to SQL by the
//! Postgres store; both read field values through [`ShipmentField::value_of`]
//! semantics, so they agree on canonical spellings (`shipped`, `UPS`,
//! `Unknown`, ISO dates).
//!
//! Filters serialize as externally tagged JSON:
//!
//! ```json
//! {"and": [
//!     {"eq": {"field": "trans_carrier", "value": "Unknown"}},
//!     {"or": [
//!         {"eq": {"field": "status", "value": "shipped"}},
//!         {"eq": {"field": "status", "value": "delivered"}}
//!     ]}
//! ]}
//! ```

use crate::order::{ShipmentEntry, ShipmentStatus, UNKNOWN};
use serde::{Deserialize, Serialize};

/// A filterable column of the order-shipment collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentField {
    /// Order number
    Number,
    /// Last update date (ISO `YYYY-MM-DD`)
    LastUpdate,
    /// Shipment status
    Status,
    /// Tracking number
    TrackingNumber,
    /// Carrier
    Carrier,
    /// Transshipment carrier
    TransCarrier,
    /// Transshipment package number
    PackageNumber,
}

impl ShipmentField {
    /// Storage column name for this field.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::LastUpdate => "last_update",
            Self::Status => "status",
            Self::TrackingNumber => "tracking_number",
            Self::Carrier => "carrier",
            Self::TransCarrier => "trans_carrier",
            Self::PackageNumber => "package_number",
        }
    }

    /// Canonical string value of this field in an entry.
    #[must_use]
    pub fn value_of(self, entry: &ShipmentEntry) -> String {
        match self {
            Self::Number => entry.number.to_string(),
            Self::LastUpdate => entry.last_update.format("%Y-%m-%d").to_string(),
            Self::Status => entry.status.as_str().to_string(),
            Self::TrackingNumber => entry.tracking_number.to_string(),
            Self::Carrier => entry.carrier.as_str().to_string(),
            Self::TransCarrier => entry.trans_carrier.to_string(),
            Self::PackageNumber => entry.package_number.to_string(),
        }
    }
}

/// Boolean filter over shipment entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentFilter {
    /// All sub-filters match (an empty list matches everything)
    And(Vec<ShipmentFilter>),
    /// Any sub-filter matches (an empty list matches nothing)
    Or(Vec<ShipmentFilter>),
    /// The sub-filter does not match
    Not(Box<ShipmentFilter>),
    /// Field equals value
    Eq {
        /// Field to compare
        field: ShipmentField,
        /// Canonical value to compare against
        value: String,
    },
}

impl ShipmentFilter {
    /// `field == value`
    #[must_use]
    pub fn eq(field: ShipmentField, value: impl Into<String>) -> Self {
        Self::Eq {
            field,
            value: value.into(),
        }
    }

    /// `status == status`
    #[must_use]
    pub fn status_is(status: ShipmentStatus) -> Self {
        Self::eq(ShipmentField::Status, status.as_str())
    }

    /// Negate a filter.
    #[must_use]
    pub fn negate(filter: Self) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Shipments that have left the merchant but have no transshipment leg yet.
    ///
    /// `trans_carrier == Unknown AND (status == shipped OR status == delivered)`
    #[must_use]
    pub fn awaiting_transshipment() -> Self {
        Self::And(vec![
            Self::eq(ShipmentField::TransCarrier, UNKNOWN),
            Self::Or(vec![
                Self::status_is(ShipmentStatus::Shipped),
                Self::status_is(ShipmentStatus::Delivered),
            ]),
        ])
    }

    /// Evaluate the filter against one entry.
    #[must_use]
    pub fn matches(&self, entry: &ShipmentEntry) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
            Self::Eq { field, value } => field.value_of(entry) == *value,
        }
    }
}
