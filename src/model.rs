//! Store API data shapes

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Order status as exchanged with the store endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Approved,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Approved => "approved",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase order.
///
/// Every field is optional on the wire; the suite deliberately sends
/// incomplete and out-of-range orders to probe server-side validation.
/// Absent fields are sent as explicit nulls and unknown fields are ignored
/// when deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub pet_id: Option<i64>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(
        default,
        serialize_with = "ship_date::serialize",
        deserialize_with = "ship_date::deserialize"
    )]
    pub ship_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub complete: Option<bool>,
}

impl Order {
    pub fn builder() -> OrderBuilder {
        OrderBuilder::default()
    }
}

/// Fluent construction of [`Order`] values for scenario data
#[derive(Debug, Clone, Default)]
pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    pub fn id(mut self, id: i64) -> Self {
        self.order.id = Some(id);
        self
    }

    pub fn pet_id(mut self, pet_id: i64) -> Self {
        self.order.pet_id = Some(pet_id);
        self
    }

    pub fn quantity(mut self, quantity: i32) -> Self {
        self.order.quantity = Some(quantity);
        self
    }

    pub fn ship_date(mut self, ship_date: DateTime<FixedOffset>) -> Self {
        self.order.ship_date = Some(ship_date);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.order.status = Some(status);
        self
    }

    pub fn complete(mut self, complete: bool) -> Self {
        self.order.complete = Some(complete);
        self
    }

    pub fn build(self) -> Order {
        self.order
    }
}

/// Ship dates go out as RFC 3339 with millisecond precision. The public
/// Petstore answers with offsets written as `+0000`, which RFC 3339 parsing
/// rejects, so both spellings are accepted on the way in.
mod ship_date {
    use super::*;

    const SERVER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

    pub fn serialize<S>(value: &Option<DateTime<FixedOffset>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, false)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) => DateTime::parse_from_rfc3339(&text)
                .or_else(|_| DateTime::parse_from_str(&text, SERVER_FORMAT))
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid shipDate '{}': {}", text, e))),
        }
    }
}

/// Error body returned by the store endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: i32, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            error_type: Some(error_type.into()),
            message: Some(message.into()),
        }
    }
}

/// Pet counts keyed by status name.
///
/// Counts are kept as optional signed values so that nulls and negative
/// numbers survive deserialization and can be reported by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    counts: BTreeMap<String, Option<i64>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, status: impl Into<String>, count: i64) -> Self {
        self.counts.insert(status.into(), Some(count));
        self
    }

    /// Count for `status`, treating absent and null entries as zero
    pub fn count(&self, status: &str) -> i64 {
        self.counts.get(status).copied().flatten().unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<i64>)> {
        self.counts.iter().map(|(status, count)| (status.as_str(), *count))
    }

    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, Option<i64>)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (String, Option<i64>)>>(iter: I) -> Self {
        Self { counts: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn absent_fields_are_sent_as_null() {
        let order = Order::builder().pet_id(1).quantity(1).build();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": null,
                "petId": 1,
                "quantity": 1,
                "shipDate": null,
                "status": null,
                "complete": null
            })
        );
    }

    #[test]
    fn explicit_nulls_read_back_as_absent() {
        let order: Order = serde_json::from_str(r#"{"petId": null, "quantity": 2, "status": null}"#).unwrap();
        assert_eq!(order, Order::builder().quantity(2).build());
    }

    #[test]
    fn full_order_uses_wire_names() {
        let ship_date = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .unwrap();
        let order = Order::builder()
            .pet_id(10)
            .quantity(2)
            .ship_date(ship_date)
            .status(OrderStatus::Approved)
            .complete(false)
            .build();

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["shipDate"], "2024-05-01T12:30:00.000+02:00");
        assert_eq!(json["status"], "approved");
        assert_eq!(json["complete"], false);
    }

    #[test]
    fn parses_server_offset_without_colon_and_ignores_unknown_fields() {
        let body = r#"{
            "id": 9223372036854775807,
            "petId": 1,
            "quantity": 1,
            "shipDate": "2024-05-01T10:00:00.000+0000",
            "status": "placed",
            "complete": true,
            "extra": "ignored"
        }"#;

        let order: Order = serde_json::from_str(body).unwrap();
        assert_eq!(order.id, Some(i64::MAX));
        assert_eq!(order.status, Some(OrderStatus::Placed));
        assert_eq!(order.complete, Some(true));
        let ship_date = order.ship_date.unwrap();
        assert_eq!(ship_date.offset().local_minus_utc(), 0);
        assert_eq!(ship_date.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn error_response_maps_type_field() {
        let error: ErrorResponse =
            serde_json::from_str(r#"{"code": 1, "type": "error", "message": "Order not found"}"#).unwrap();
        assert_eq!(error, ErrorResponse::new(1, "error", "Order not found"));
    }

    #[test]
    fn inventory_defaults_missing_and_null_counts_to_zero() {
        let inventory: Inventory =
            serde_json::from_str(r#"{"available": 7, "pending": null, "sold": 2}"#).unwrap();
        assert_eq!(inventory.count("available"), 7);
        assert_eq!(inventory.count("pending"), 0);
        assert_eq!(inventory.count("unknown"), 0);
        assert_eq!(inventory.len(), 3);
    }
}
