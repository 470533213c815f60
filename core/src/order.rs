//! Order data model.
//!
//! An [`OrderRecord`] is what the extraction client produces from one email. It is
//! persisted as two projections keyed by the same [`OrderNumber`]:
//!
//! - [`DetailsEntry`]: what was bought (brand, date, total, items) plus the current status
//! - [`ShipmentEntry`]: where the package is (status, tracking, transshipment leg)
//!
//! Updates to existing entries are expressed as partial deltas ([`DetailsDelta`],
//! [`ShipmentDelta`]) so that a store only ever writes the fields that changed.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Sentinel spelling for "not yet determined".
pub const UNKNOWN: &str = "Unknown";

/// Date formats accepted from extraction output, tried in order.
const DATE_FORMATS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Errors raised when an extracted record cannot be accepted.
///
/// All variants are data errors: retrying the same input cannot fix them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The model output was not a well-formed order record.
    #[error("Malformed order record: {0}")]
    Malformed(String),

    /// The order number is absent, empty, or the `Unknown` sentinel.
    #[error("Order number is missing")]
    MissingNumber,

    /// Status outside `confirmed | canceled | shipped | delivered`.
    #[error("Unrecognized order status: {0}")]
    UnknownStatus(String),

    /// Carrier outside `UPS | Fedex | Unknown`.
    #[error("Unrecognized carrier: {0}")]
    UnknownCarrier(String),

    /// Date that matches none of the accepted formats.
    #[error("Invalid order date: {0}")]
    InvalidDate(String),
}

/// Business key identifying one purchase order across both collections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Creates a new `OrderNumber`, trimming surrounding whitespace.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        let number = number.into();
        Self(number.trim().to_string())
    }

    /// Returns the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this number can serve as an identity key.
    ///
    /// Empty numbers and the `Unknown` sentinel would collapse unrelated orders
    /// into one entry, so neither is usable.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.0.is_empty() && !self.0.eq_ignore_ascii_case(UNKNOWN)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for OrderNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(Self::new)
    }
}

/// Shipment status of an order.
///
/// Variants are declared in rank order, so the derived `Ord` agrees with
/// [`rank`](Self::rank): `confirmed < canceled < shipped < delivered`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ShipmentStatus {
    /// Order was placed and acknowledged by the merchant
    Confirmed,
    /// Order was canceled before shipping
    Canceled,
    /// Package handed to a carrier (a tracking number is known)
    Shipped,
    /// Package arrived
    Delivered,
}

impl ShipmentStatus {
    /// All statuses in rank order.
    pub const ALL: [Self; 4] = [Self::Confirmed, Self::Canceled, Self::Shipped, Self::Delivered];

    /// Shipment rank used for monotonicity checks.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Confirmed => 0,
            Self::Canceled => 1,
            Self::Shipped => 2,
            Self::Delivered => 3,
        }
    }

    /// Convert status to its stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Canceled => "canceled",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
        }
    }

    /// Parse status from its string representation (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownStatus`] if the string is not one of the four statuses.
    pub fn parse(s: &str) -> Result<Self, RecordError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "canceled" => Ok(Self::Canceled),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            _ => Err(RecordError::UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for ShipmentStatus {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parcel carrier recognised from the tracking number format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Carrier {
    /// United Parcel Service (18 characters starting with `1Z`)
    #[serde(rename = "UPS")]
    Ups,
    /// FedEx (12 digits)
    #[serde(rename = "Fedex")]
    Fedex,
    /// Not determined yet
    #[default]
    Unknown,
}

impl Carrier {
    /// Convert carrier to its stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ups => "UPS",
            Self::Fedex => "Fedex",
            Self::Unknown => UNKNOWN,
        }
    }

    /// Parse a carrier name (case-insensitive).
    ///
    /// `None` and the empty string are read as [`Carrier::Unknown`]; older
    /// prompts used `None` for "no carrier".
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownCarrier`] for any other name.
    pub fn parse(s: &str) -> Result<Self, RecordError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ups" => Ok(Self::Ups),
            "fedex" => Ok(Self::Fedex),
            "unknown" | "none" | "" => Ok(Self::Unknown),
            _ => Err(RecordError::UnknownCarrier(s.to_string())),
        }
    }
}

impl TryFrom<String> for Carrier {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A free-text value that may still be the `Unknown` sentinel.
///
/// Serialized as the plain string, with the sentinel spelled `Unknown`. The
/// sentinel is an explicit value, distinct from a missing field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Known {
    /// Not determined yet
    #[default]
    Unknown,
    /// A determined value
    Value(String),
}

impl Known {
    /// Wrap a value, mapping blanks and the sentinel spelling to [`Known::Unknown`].
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN) {
            Self::Unknown
        } else {
            Self::Value(trimmed.to_string())
        }
    }

    /// Whether this is still the sentinel.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The determined value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Unknown => None,
            Self::Value(value) => Some(value),
        }
    }

    /// String representation, `Unknown` for the sentinel.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.value().unwrap_or(UNKNOWN)
    }
}

impl From<String> for Known {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Known {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Known> for String {
    fn from(value: Known) -> Self {
        match value {
            Known::Unknown => UNKNOWN.to_string(),
            Known::Value(value) => value,
        }
    }
}

impl fmt::Display for Known {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Known {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(Self::new)
    }
}

/// One purchased item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item name
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub name: String,
    /// Item color
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub color: String,
    /// Item size
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub size: String,
    /// Item quantity (kept textual, models emit both `2` and `"2"`)
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub quantity: String,
}

impl OrderItem {
    /// Creates a new item
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            size: size.into(),
            quantity: quantity.into(),
        }
    }
}

/// A structured order as produced by the extraction client.
///
/// Field names on the wire are the ones the extraction prompt asks for
/// (`"tracking number"`, `"item"`, ...), and the date is `mm/dd/yy`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Merchant brand
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub brand: String,
    /// Order number (identity key)
    #[serde(default)]
    pub number: OrderNumber,
    /// Date the email was received
    #[serde(with = "mdy_date")]
    pub date: NaiveDate,
    /// Order total as printed in the email
    #[serde(default = "unknown", deserialize_with = "lenient_string")]
    pub total: String,
    /// Status stated by the email
    pub status: ShipmentStatus,
    /// Tracking number, `Unknown` if the email has none
    #[serde(rename = "tracking number", alias = "tracking_number", default)]
    pub tracking_number: Known,
    /// Carrier derived from the tracking number
    #[serde(default)]
    pub carrier: Carrier,
    /// Purchased items in email order
    #[serde(rename = "item", alias = "items", default)]
    pub items: Vec<OrderItem>,
}

impl OrderRecord {
    /// Parse a record from raw model output.
    ///
    /// Markdown code fences and any chatter around the JSON object are ignored;
    /// the first complete object starting at the first `{` is parsed.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Malformed`] if no JSON object can be parsed (this
    /// includes out-of-vocabulary status, carrier and date values), or
    /// [`RecordError::MissingNumber`] if the order number is unusable.
    pub fn from_model_output(output: &str) -> Result<Self, RecordError> {
        let Some(start) = output.find('{') else {
            return Err(RecordError::Malformed(
                "no JSON object in model output".to_string(),
            ));
        };

        let record: Self = serde_json::Deserializer::from_str(&output[start..])
            .into_iter::<Self>()
            .next()
            .ok_or_else(|| RecordError::Malformed("no JSON object in model output".to_string()))?
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingNumber`] if the order number is empty or `Unknown`.
    pub fn validate(&self) -> Result<(), RecordError> {
        if !self.number.is_usable() {
            return Err(RecordError::MissingNumber);
        }
        Ok(())
    }
}

/// Persisted projection of an order's purchase details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsEntry {
    /// Merchant brand
    pub brand: String,
    /// Date of the first sighting
    pub date: NaiveDate,
    /// Order number (identity key)
    pub number: OrderNumber,
    /// Order total
    pub total: String,
    /// Purchased items
    pub items: Vec<OrderItem>,
    /// Latest accepted status
    pub status: ShipmentStatus,
}

impl DetailsEntry {
    /// Project a record into a new details entry.
    #[must_use]
    pub fn from_record(record: &OrderRecord) -> Self {
        Self {
            brand: record.brand.clone(),
            date: record.date,
            number: record.number.clone(),
            total: record.total.clone(),
            items: record.items.clone(),
            status: record.status,
        }
    }
}

/// Persisted tracking-focused projection of an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentEntry {
    /// Order number (identity key)
    pub number: OrderNumber,
    /// Date of the latest accepted record
    pub last_update: NaiveDate,
    /// Latest accepted status
    pub status: ShipmentStatus,
    /// First known tracking number
    pub tracking_number: Known,
    /// Carrier for `tracking_number`
    pub carrier: Carrier,
    /// Carrier of the transshipment leg (set manually)
    pub trans_carrier: Known,
    /// Package number on the transshipment leg (set manually)
    pub package_number: Known,
}

impl ShipmentEntry {
    /// Project a record into a new shipment entry.
    ///
    /// Tracking and carrier are copied as-is; the transshipment leg starts unknown.
    #[must_use]
    pub fn from_record(record: &OrderRecord) -> Self {
        Self {
            number: record.number.clone(),
            last_update: record.date,
            status: record.status,
            tracking_number: record.tracking_number.clone(),
            carrier: record.carrier,
            trans_carrier: Known::Unknown,
            package_number: Known::Unknown,
        }
    }

    /// Overwrite the transshipment leg.
    pub fn set_transshipment(&mut self, trans_carrier: Known, package_number: Known) {
        self.trans_carrier = trans_carrier;
        self.package_number = package_number;
    }
}

/// Partial update of a [`DetailsEntry`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetailsDelta {
    /// New status, if it changed
    pub status: Option<ShipmentStatus>,
}

impl DetailsDelta {
    /// Whether there is nothing to write.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
    }

    /// Apply the delta to an in-memory entry.
    pub fn apply_to(&self, entry: &mut DetailsEntry) {
        if let Some(status) = self.status {
            entry.status = status;
        }
    }
}

/// Tracking number and carrier, always written together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingAssignment {
    /// Tracking number
    pub tracking_number: Known,
    /// Carrier for the tracking number
    pub carrier: Carrier,
}

/// Partial update of a [`ShipmentEntry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShipmentDelta {
    /// New last-update date (always written)
    pub last_update: NaiveDate,
    /// New status, if it changed
    pub status: Option<ShipmentStatus>,
    /// First real tracking number, if one just became known
    pub tracking: Option<TrackingAssignment>,
}

impl ShipmentDelta {
    /// A delta that only moves the last-update date.
    #[must_use]
    pub const fn touch(last_update: NaiveDate) -> Self {
        Self {
            last_update,
            status: None,
            tracking: None,
        }
    }

    /// Apply the delta to an in-memory entry.
    pub fn apply_to(&self, entry: &mut ShipmentEntry) {
        entry.last_update = self.last_update;
        if let Some(status) = self.status {
            entry.status = status;
        }
        if let Some(tracking) = &self.tracking {
            entry.tracking_number = tracking.tracking_number.clone();
            entry.carrier = tracking.carrier;
        }
    }
}

/// Parse a date in any of the accepted extraction formats.
///
/// # Errors
///
/// Returns [`RecordError::InvalidDate`] if no format matches.
pub fn parse_order_date(s: &str) -> Result<NaiveDate, RecordError> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .ok_or_else(|| RecordError::InvalidDate(s.to_string()))
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Accept a JSON string or number, `null` reads as `Unknown`.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(unknown()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

mod mdy_date {
    use super::parse_order_date;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%m/%d/%y").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_order_date(&raw).map_err(serde::de::Error::custom)
    }
}
