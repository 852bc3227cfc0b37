//! Stateless checks over responses, orders and inventories
//!
//! Multi-condition checks collect every violation through [`SoftAssertions`]
//! and report them together instead of stopping at the first one.

use std::time::Duration;

use crate::client::{ApiResponse, JSON_CONTENT_TYPE};
use crate::error::{fail, AssertionError, Result};
use crate::model::{ErrorResponse, Inventory, Order};

pub mod headers {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const SERVER: &str = "Server";
    pub const DATE: &str = "Date";
    pub const CORS_ORIGIN: &str = "Access-Control-Allow-Origin";
    pub const CORS_METHODS: &str = "Access-Control-Allow-Methods";
    pub const CORS_HEADERS: &str = "Access-Control-Allow-Headers";
}

/// Upper bound for a single call's wall-clock time
pub const MAX_RESPONSE_TIME: Duration = Duration::from_millis(5000);

pub const ERROR_TYPE: &str = "error";
pub const ORDER_NOT_FOUND_MESSAGE: &str = "Order not found";

/// Pet statuses an inventory is expected to report at least one of
pub const EXPECTED_PET_STATUSES: [&str; 3] = ["available", "pending", "sold"];

/// Expected server identity in the extended header checks
pub const EXPECTED_SERVER: &str = "Jetty";

/// Collects failed checks and reports them all at once
#[derive(Debug, Default)]
pub struct SoftAssertions {
    failures: Vec<String>,
}

impl SoftAssertions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> &mut Self {
        if !condition {
            self.failures.push(message.into());
        }
        self
    }

    pub fn check_eq<T: PartialEq + std::fmt::Debug>(
        &mut self,
        actual: T,
        expected: T,
        message: &str,
    ) -> &mut Self {
        if actual != expected {
            self.failures
                .push(format!("{} expected [{:?}] but found [{:?}]", message, expected, actual));
        }
        self
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Fails with every recorded violation, if any
    pub fn assert_all(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(AssertionError::Soft { failures: self.failures }.into())
        }
    }
}

/// Fail with `message` unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        fail(message)
    }
}

/// Fail unless `actual == expected`
pub fn ensure_eq<T: PartialEq + std::fmt::Debug>(actual: T, expected: T, message: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        fail(format!("{} expected [{:?}] but found [{:?}]", message, expected, actual))
    }
}

/// Non-empty, every count present and non-negative, every status name non-blank
pub fn validate_inventory(inventory: &Inventory) -> Result<()> {
    ensure(!inventory.is_empty(), "Inventory should not be empty")?;

    let mut soft = SoftAssertions::new();
    for (status, count) in inventory.entries() {
        match count {
            Some(count) => {
                soft.check(count >= 0, format!("Count for '{}' should be non-negative, got {}", status, count));
            }
            None => {
                soft.check(false, format!("Count for '{}' should not be null", status));
            }
        }
        soft.check(!status.trim().is_empty(), "Status name should not be empty");
    }
    soft.assert_all()?;

    log::debug!("Inventory validation completed for {} statuses", inventory.len());
    Ok(())
}

/// At least one of the well-known pet statuses must be present
pub fn validate_expected_statuses(inventory: &Inventory) -> Result<()> {
    validate_inventory(inventory)?;

    let has_expected = inventory
        .statuses()
        .any(|status| EXPECTED_PET_STATUSES.contains(&status));
    ensure(
        has_expected,
        format!(
            "Inventory should contain at least one expected pet status from {:?}, but found: {:?}",
            EXPECTED_PET_STATUSES,
            inventory.statuses().collect::<Vec<_>>()
        ),
    )
}

/// Both inventories are valid and report only non-negative counts
pub fn validate_consistency(first: &Inventory, second: &Inventory) -> Result<()> {
    validate_inventory(first)?;
    validate_inventory(second)?;

    let mut soft = SoftAssertions::new();
    for (label, inventory) in [("first call", first), ("second call", second)] {
        for (status, count) in inventory.entries() {
            soft.check(
                count.unwrap_or(0) >= 0,
                format!("Status '{}' count should be non-negative ({})", status, label),
            );
        }
    }
    soft.assert_all()
}

/// 200, a JSON `Content-Type` and a `Date` header
pub fn validate_common_response_headers(response: &ApiResponse) -> Result<()> {
    ensure_eq(response.status_code, 200, "Status code should be 200")?;

    let content_type = response.header(headers::CONTENT_TYPE);
    let mut soft = SoftAssertions::new();
    soft.check(content_type.is_some(), "Content-Type header should be present")
        .check(
            content_type.is_some_and(|value| value.contains(JSON_CONTENT_TYPE)),
            "Content-Type should be application/json",
        )
        .check(response.header(headers::DATE).is_some(), "Date header should be present");
    soft.assert_all()
}

/// Common header checks plus CORS and server identity
pub fn validate_response_headers(response: &ApiResponse) -> Result<()> {
    validate_common_response_headers(response)?;

    let server = response.header(headers::SERVER);
    let mut soft = SoftAssertions::new();
    soft.check_eq(response.header(headers::CORS_ORIGIN), Some("*"), "CORS origin should allow all")
        .check(
            response.header(headers::CORS_METHODS).is_some(),
            "CORS methods header should be present",
        )
        .check(
            response.header(headers::CORS_HEADERS).is_some(),
            "CORS headers should be present",
        )
        .check(server.is_some(), "Server header should be present")
        .check(
            server.is_some_and(|value| value.contains(EXPECTED_SERVER)),
            "Server should be Jetty",
        );
    soft.assert_all()?;

    log::info!("All header validations passed");
    Ok(())
}

/// A single call must finish under [`MAX_RESPONSE_TIME`]
pub fn validate_response_time(elapsed: Duration) -> Result<()> {
    ensure(
        elapsed < MAX_RESPONSE_TIME,
        format!(
            "Response time should be less than {}ms, actual: {}ms",
            MAX_RESPONSE_TIME.as_millis(),
            elapsed.as_millis()
        ),
    )
}

/// Compare a returned order with the one submitted.
///
/// When the submitted order carries a non-zero id the ids must match,
/// otherwise any positive id is accepted. Pet id and quantity must match;
/// status and completion flag are only compared when they were submitted.
pub fn assert_order_match(expected: &Order, actual: &Order, context: &str) -> Result<()> {
    match expected.id {
        Some(id) if id != 0 => ensure_eq(actual.id, Some(id), &format!("{} - Order ID should match", context))?,
        _ => {
            let id = actual
                .id
                .ok_or_else(|| AssertionError::failed(format!("{} - Order ID should be assigned", context)))?;
            ensure(id > 0, format!("{} - Order ID should be positive, got {}", context, id))?;
        }
    }

    ensure_eq(actual.pet_id, expected.pet_id, &format!("{} - Pet ID should match", context))?;
    ensure_eq(actual.quantity, expected.quantity, &format!("{} - Quantity should match", context))?;

    if expected.status.is_some() {
        ensure_eq(actual.status, expected.status, &format!("{} - Status should match", context))?;
    }
    if expected.complete.is_some() {
        ensure_eq(
            actual.complete,
            expected.complete,
            &format!("{} - Complete flag should match", context),
        )?;
    }
    Ok(())
}

/// Exact 404; when the body carries an error object it must describe a
/// missing order
pub fn assert_error_response(response: &ApiResponse) -> Result<()> {
    ensure_eq(response.status_code, 404, "Status code should be 404")?;

    if response.body_text().contains("code") {
        let error: ErrorResponse = response.json()?;
        ensure_eq(error.error_type.as_deref(), Some(ERROR_TYPE), "Error type should match")?;
        ensure_eq(
            error.message.as_deref(),
            Some(ORDER_NOT_FOUND_MESSAGE),
            "Error message should match",
        )?;
    }
    Ok(())
}
