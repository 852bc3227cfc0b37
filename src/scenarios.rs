//! Store scenarios
//!
//! Each [`Scenario`] is one check against the store endpoints, carrying its
//! own input row. Scenarios are grouped into the inventory and order suites.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::error::{fail, Result};
use crate::model::{Order, OrderStatus};
use crate::orchestrator::StoreTestContext;
use crate::validation::{self, ensure, ensure_eq};

pub const NON_EXISTENT_ORDER_ID: i64 = 999_999;

/// Rate limiting probe: give up after this many requests
pub const RATE_LIMIT_MAX_REQUESTS: usize = 30;
/// Rate limiting probe: successes required before any throttling
pub const RATE_LIMIT_MIN_SUCCESSES: usize = 5;
/// Rate limiting probe: pause between requests
pub const RATE_LIMIT_REQUEST_INTERVAL: Duration = Duration::from_millis(10);
pub const TOO_MANY_REQUESTS: u16 = 429;

const INVENTORY_CONSISTENCY_DELAY: Duration = Duration::from_millis(100);
const LARGE_ORDER_QUANTITY: i32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    Inventory,
    Order,
}

impl std::fmt::Display for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Suite::Inventory => write!(f, "inventory"),
            Suite::Order => write!(f, "order"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Scenario {
    GetInventorySuccess,
    InventoryAfterOrderPlacement,
    InventoryResponseTime,
    InventoryContainsExpectedStatuses,
    InventoryDataConsistency,
    InventoryResponseHeaders,

    PlaceOrderSuccess { order: Order },
    CompleteOrderLifecycle,
    PlaceOrderPerformance,
    GetOrderWithInvalidId { order_id: i64, case: &'static str },
    DeleteOrderWithInvalidId { order_id: i64, case: &'static str },
    OrderValidationBehavior { order: Order, description: &'static str },
    PlaceOrderWithInvalidData { order: Order, case: &'static str },
    GetNonExistentOrderErrorResponse,
    PlaceOrderEdgeCase { order: Order, case: &'static str },
    LargeOrderQuantities,
    OrderDataConsistency,
    RateLimiting,
}

impl Scenario {
    pub fn suite(&self) -> Suite {
        match self {
            Scenario::GetInventorySuccess
            | Scenario::InventoryAfterOrderPlacement
            | Scenario::InventoryResponseTime
            | Scenario::InventoryContainsExpectedStatuses
            | Scenario::InventoryDataConsistency
            | Scenario::InventoryResponseHeaders => Suite::Inventory,
            _ => Suite::Order,
        }
    }

    /// Identifier, with the input row's label for parameterized scenarios
    pub fn name(&self) -> String {
        match self {
            Scenario::GetInventorySuccess => "get_inventory_success".into(),
            Scenario::InventoryAfterOrderPlacement => "inventory_after_order_placement".into(),
            Scenario::InventoryResponseTime => "inventory_response_time".into(),
            Scenario::InventoryContainsExpectedStatuses => "inventory_contains_expected_statuses".into(),
            Scenario::InventoryDataConsistency => "inventory_data_consistency".into(),
            Scenario::InventoryResponseHeaders => "inventory_response_headers".into(),
            Scenario::PlaceOrderSuccess { order } => format!(
                "place_order_success[petId={:?}, quantity={:?}]",
                order.pet_id, order.quantity
            ),
            Scenario::CompleteOrderLifecycle => "complete_order_lifecycle".into(),
            Scenario::PlaceOrderPerformance => "place_order_performance".into(),
            Scenario::GetOrderWithInvalidId { case, .. } => format!("get_order_with_invalid_id[{}]", case),
            Scenario::DeleteOrderWithInvalidId { case, .. } => format!("delete_order_with_invalid_id[{}]", case),
            Scenario::OrderValidationBehavior { description, .. } => {
                format!("order_validation_behavior[{}]", description)
            }
            Scenario::PlaceOrderWithInvalidData { case, .. } => format!("place_order_with_invalid_data[{}]", case),
            Scenario::GetNonExistentOrderErrorResponse => "get_non_existent_order_error_response".into(),
            Scenario::PlaceOrderEdgeCase { case, .. } => format!("place_order_edge_case[{}]", case),
            Scenario::LargeOrderQuantities => "large_order_quantities".into(),
            Scenario::OrderDataConsistency => "order_data_consistency".into(),
            Scenario::RateLimiting => "rate_limiting".into(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::GetInventorySuccess => "GET /store/inventory returns a valid response",
            Scenario::InventoryAfterOrderPlacement => "Inventory reflects a newly placed order",
            Scenario::InventoryResponseTime => "Inventory response time is acceptable",
            Scenario::InventoryContainsExpectedStatuses => "Inventory contains expected pet statuses",
            Scenario::InventoryDataConsistency => "Inventory data is consistent between calls",
            Scenario::InventoryResponseHeaders => "Inventory response carries the expected headers",
            Scenario::PlaceOrderSuccess { .. } => "POST /store/order creates orders with valid data",
            Scenario::CompleteOrderLifecycle => "Order lifecycle: create, retrieve, delete",
            Scenario::PlaceOrderPerformance => "Order placement response time is acceptable",
            Scenario::GetOrderWithInvalidId { .. } => "GET /store/order/{orderId} handles invalid ids",
            Scenario::DeleteOrderWithInvalidId { .. } => "DELETE /store/order/{orderId} handles invalid ids",
            Scenario::OrderValidationBehavior { .. } => "Document which invalid orders the API accepts",
            Scenario::PlaceOrderWithInvalidData { .. } => "POST /store/order rejects invalid order data with 4xx",
            Scenario::GetNonExistentOrderErrorResponse => "GET of a non-existent order returns a proper error",
            Scenario::PlaceOrderEdgeCase { .. } => "Orders with boundary values are accepted",
            Scenario::LargeOrderQuantities => "Large order quantities are handled gracefully",
            Scenario::OrderDataConsistency => "Order data stays consistent across reads",
            Scenario::RateLimiting => "API rate limiting behaviour",
        }
    }

    pub async fn run(&self, ctx: &mut StoreTestContext) -> Result<()> {
        match self {
            Scenario::GetInventorySuccess => {
                let response = ctx.execute_inventory_request().await?;
                ctx.validate_inventory_response(&response)?;
                Ok(())
            }
            Scenario::InventoryAfterOrderPlacement => {
                let before = ctx.retrieve_inventory().await?;
                let order = ctx.create_valid_order();
                let response = ctx.place_test_order(&order).await?;
                ctx.validate_inventory_changes(&before, &response).await
            }
            Scenario::InventoryResponseTime => {
                let elapsed = ctx.measure_inventory_response_time().await?;
                ctx.validate_performance_results(elapsed)
            }
            Scenario::InventoryContainsExpectedStatuses => {
                let inventory = ctx.retrieve_inventory().await?;
                validation::validate_expected_statuses(&inventory)
            }
            Scenario::InventoryDataConsistency => {
                let first = ctx.retrieve_inventory().await?;
                ctx.add_test_delay(INVENTORY_CONSISTENCY_DELAY).await?;
                let second = ctx.retrieve_inventory().await?;
                validation::validate_consistency(&first, &second)
            }
            Scenario::InventoryResponseHeaders => {
                let response = ctx.execute_inventory_request().await?;
                validation::validate_response_headers(&response)
            }

            Scenario::PlaceOrderSuccess { order } => {
                log::info!(
                    "Testing order placement with petId: {:?}, quantity: {:?}",
                    order.pet_id,
                    order.quantity
                );
                let response = ctx.execute_order_placement(order).await?;
                ctx.validate_successful_order_creation(&response, order)?;
                Ok(())
            }
            Scenario::CompleteOrderLifecycle => {
                let order = Order::builder()
                    .pet_id(10)
                    .quantity(2)
                    .ship_date(Utc::now().fixed_offset())
                    .status(OrderStatus::Placed)
                    .complete(false)
                    .build();
                ctx.run_order_lifecycle(&order).await
            }
            Scenario::PlaceOrderPerformance => {
                let order = ctx.create_valid_order();
                let elapsed = ctx.measure_order_placement_time(&order).await?;
                ctx.validate_performance_results(elapsed)
            }
            Scenario::GetOrderWithInvalidId { order_id, case } => {
                log::info!("Testing GET order with invalid ID: {} ({})", order_id, case);
                let response = ctx.execute_get_order_request(*order_id).await?;
                ctx.validate_invalid_order_response(&response, case, "GET")
            }
            Scenario::DeleteOrderWithInvalidId { order_id, case } => {
                log::info!("Testing DELETE order with invalid ID: {} ({})", order_id, case);
                let response = ctx.execute_delete_order_request(*order_id).await?;
                ctx.validate_invalid_order_response(&response, case, "DELETE")
            }
            Scenario::OrderValidationBehavior { order, description } => {
                log::info!("Testing validation case: {}", description);
                match ctx.api().place_order(order).await {
                    Ok(response) => ctx.handle_order_validation_response(&response, description),
                    Err(e) => log::error!(
                        "Exception occurred during validation test for {}: {}",
                        description,
                        e
                    ),
                }
                Ok(())
            }
            Scenario::PlaceOrderWithInvalidData { order, case } => {
                log::info!("Testing order placement with invalid data: {}", case);
                let response = ctx.execute_order_placement_with_invalid_data(order, case).await?;
                ctx.validate_invalid_data_rejection(&response, case)
            }
            Scenario::GetNonExistentOrderErrorResponse => {
                log::info!("Testing GET request for non-existent order ID: {}", NON_EXISTENT_ORDER_ID);
                let response = ctx.execute_get_order_request(NON_EXISTENT_ORDER_ID).await?;
                validation::assert_error_response(&response)
            }
            Scenario::PlaceOrderEdgeCase { order, case } => {
                log::info!("Testing order placement with edge case: {}", case);
                let response = ctx.api().place_order(order).await?;
                ensure(
                    response.is_success(),
                    format!(
                        "Edge case '{}' should be accepted but got status: {}",
                        case, response.status_code
                    ),
                )?;
                log::info!("API accepted order with {}", case);
                ctx.track_order_for_cleanup(&response);
                Ok(())
            }
            Scenario::LargeOrderQuantities => {
                let order = Order::builder().pet_id(1).quantity(LARGE_ORDER_QUANTITY).build();
                let response = ctx.api().place_order(&order).await?;
                if response.status_code < 300 {
                    log::info!("API accepted large quantity order");
                    ctx.track_order_for_cleanup(&response);
                } else {
                    log::info!("API rejected large quantity with status: {}", response.status_code);
                }
                Ok(())
            }
            Scenario::OrderDataConsistency => order_data_consistency(ctx).await,
            Scenario::RateLimiting => rate_limiting(ctx).await,
        }
    }
}

async fn order_data_consistency(ctx: &mut StoreTestContext) -> Result<()> {
    let original = Order::builder()
        .pet_id(42)
        .quantity(3)
        .ship_date((Utc::now() + ChronoDuration::days(5)).fixed_offset())
        .status(OrderStatus::Placed)
        .complete(false)
        .build();

    let response = ctx.api().place_order(&original).await?;
    ctx.track_order_for_cleanup(&response);
    let order_id = match response.json::<Order>()?.id {
        Some(id) => id,
        None => return fail(format!("Created order has no id (status {})", response.status_code)),
    };

    for _ in 0..3 {
        let retrieved: Order = ctx.execute_get_order_request(order_id).await?.json()?;
        ensure_eq(retrieved.pet_id, original.pet_id, "Pet ID should remain consistent")?;
        ensure_eq(retrieved.quantity, original.quantity, "Quantity should remain consistent")?;
        ensure_eq(retrieved.status, original.status, "Status should remain consistent")?;
    }
    Ok(())
}

async fn rate_limiting(ctx: &mut StoreTestContext) -> Result<()> {
    log::info!(
        "Testing API rate limiting behavior - Max requests: {}, Request interval: {}ms",
        RATE_LIMIT_MAX_REQUESTS,
        RATE_LIMIT_REQUEST_INTERVAL.as_millis()
    );

    let mut statuses = Vec::with_capacity(RATE_LIMIT_MAX_REQUESTS);
    let mut rate_limit_hit = false;

    for request_number in 1..=RATE_LIMIT_MAX_REQUESTS {
        let order = Order::builder().pet_id(1).quantity(1).build();
        let response = ctx.api().place_order(&order).await?;
        statuses.push(response.status_code);

        if response.status_code == TOO_MANY_REQUESTS {
            log::info!("Rate limiting activated after {} requests (Expected behavior)", request_number);
            rate_limit_hit = true;
            break;
        } else if response.status_code < 300 {
            ctx.track_order_for_cleanup(&response);
            log::debug!("Request {}: Success (Status: {})", request_number, response.status_code);
        } else {
            log::warn!("Request {}: Unexpected error (Status: {})", request_number, response.status_code);
        }

        if request_number < RATE_LIMIT_MAX_REQUESTS {
            ctx.add_test_delay(RATE_LIMIT_REQUEST_INTERVAL).await?;
        }
    }

    let success_count = statuses.iter().filter(|status| (200..300).contains(*status)).count();
    let error_count = statuses
        .iter()
        .filter(|status| **status >= 400 && **status != TOO_MANY_REQUESTS)
        .count();

    log::info!(
        "Rate limiting test results - Total requests: {}, Successful: {}, Rate limited: {}, Other errors: {}",
        statuses.len(),
        success_count,
        u8::from(rate_limit_hit),
        error_count
    );

    ensure(
        success_count >= RATE_LIMIT_MIN_SUCCESSES,
        format!(
            "Expected at least {} successful requests before rate limiting, but got {}",
            RATE_LIMIT_MIN_SUCCESSES, success_count
        ),
    )?;

    if !rate_limit_hit {
        log::warn!(
            "Rate limiting was not triggered after {} requests - may indicate missing rate limiting or high limits",
            RATE_LIMIT_MAX_REQUESTS
        );
    }
    Ok(())
}

// Input rows

pub fn valid_order_data() -> Vec<Order> {
    let now = Utc::now();
    vec![
        Order::builder()
            .id(0)
            .pet_id(1)
            .quantity(2)
            .status(OrderStatus::Placed)
            .complete(true)
            .build(),
        Order::builder().pet_id(5).quantity(1).build(),
        Order::builder()
            .pet_id(10)
            .quantity(5)
            .ship_date((now + ChronoDuration::days(7)).fixed_offset())
            .status(OrderStatus::Approved)
            .complete(false)
            .build(),
        Order::builder()
            .pet_id(3)
            .quantity(1)
            .ship_date((now - ChronoDuration::days(1)).fixed_offset())
            .status(OrderStatus::Delivered)
            .complete(true)
            .build(),
    ]
}

pub fn invalid_order_ids() -> Vec<(i64, &'static str)> {
    vec![
        (-1, "Negative order ID"),
        (0, "Zero order ID"),
        (NON_EXISTENT_ORDER_ID, "Non-existent order ID"),
        (i64::MAX, "Maximum long value order ID"),
    ]
}

pub fn invalid_order_data() -> Vec<(Order, &'static str)> {
    vec![
        (Order::builder().quantity(1).build(), "Null pet ID"),
        (Order::builder().pet_id(-1).quantity(1).build(), "Negative pet ID"),
        (Order::builder().pet_id(0).quantity(1).build(), "Zero pet ID"),
        (Order::builder().pet_id(i64::MAX).quantity(1).build(), "Extreme pet ID"),
        (Order::builder().pet_id(1).quantity(0).build(), "Zero quantity"),
        (Order::builder().pet_id(1).quantity(-5).build(), "Negative quantity"),
        (Order::builder().pet_id(1).quantity(i32::MAX).build(), "Extreme quantity"),
        (Order::builder().pet_id(1).quantity(1).build(), "Null status"),
        (Order::default(), "All required fields missing"),
    ]
}

pub fn edge_case_order_data() -> Vec<(Order, &'static str)> {
    let now = Utc::now();
    vec![
        (
            Order::builder()
                .pet_id(1)
                .quantity(1)
                .ship_date((now - ChronoDuration::days(10)).fixed_offset())
                .build(),
            "Recent past ship date",
        ),
        (
            Order::builder()
                .pet_id(1)
                .quantity(1)
                .ship_date((now - ChronoDuration::days(365)).fixed_offset())
                .build(),
            "Old past ship date",
        ),
        (Order::builder().pet_id(1).quantity(i32::MAX).build(), "Maximum quantity"),
    ]
}

pub fn inventory_suite() -> Vec<Scenario> {
    vec![
        Scenario::GetInventorySuccess,
        Scenario::InventoryAfterOrderPlacement,
        Scenario::InventoryResponseTime,
        Scenario::InventoryContainsExpectedStatuses,
        Scenario::InventoryDataConsistency,
        Scenario::InventoryResponseHeaders,
    ]
}

pub fn order_suite() -> Vec<Scenario> {
    let mut scenarios: Vec<Scenario> = valid_order_data()
        .into_iter()
        .map(|order| Scenario::PlaceOrderSuccess { order })
        .collect();

    scenarios.push(Scenario::CompleteOrderLifecycle);
    scenarios.push(Scenario::PlaceOrderPerformance);

    for (order_id, case) in invalid_order_ids() {
        scenarios.push(Scenario::GetOrderWithInvalidId { order_id, case });
    }
    for (order_id, case) in invalid_order_ids() {
        scenarios.push(Scenario::DeleteOrderWithInvalidId { order_id, case });
    }
    for (order, description) in invalid_order_data() {
        scenarios.push(Scenario::OrderValidationBehavior { order, description });
    }
    for (order, case) in invalid_order_data() {
        scenarios.push(Scenario::PlaceOrderWithInvalidData { order, case });
    }

    scenarios.push(Scenario::GetNonExistentOrderErrorResponse);

    for (order, case) in edge_case_order_data() {
        scenarios.push(Scenario::PlaceOrderEdgeCase { order, case });
    }

    scenarios.push(Scenario::LargeOrderQuantities);
    scenarios.push(Scenario::OrderDataConsistency);
    scenarios.push(Scenario::RateLimiting);
    scenarios
}

/// Scenarios for `suite`, or every scenario when `None`
pub fn scenarios_for(suite: Option<Suite>) -> Vec<Scenario> {
    match suite {
        Some(Suite::Inventory) => inventory_suite(),
        Some(Suite::Order) => order_suite(),
        None => inventory_suite().into_iter().chain(order_suite()).collect(),
    }
}
