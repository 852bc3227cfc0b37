mod mocks;

use mocks::{init_test_environment, MockPetstore, StoreBehavior};
use petstore_suite::scenarios::{self, Scenario, Suite};
use petstore_suite::{ScenarioRunner, StoreApi};
use std::sync::Arc;
use std::time::Duration;

fn runner_for(server: &MockPetstore) -> ScenarioRunner {
    let api: Arc<dyn StoreApi> = Arc::new(server.client());
    ScenarioRunner::new(api, "test").with_processing_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn permissive_store_only_fails_invalid_data_scenarios() {
    init_test_environment();
    let server = MockPetstore::start().await;
    let runner = runner_for(&server);

    let all = scenarios::scenarios_for(None);
    let summary = runner.run(&all).await;

    assert_eq!(summary.results.len(), all.len());
    let failed: Vec<&str> = summary.failures().map(|r| r.name.as_str()).collect();
    assert_eq!(failed.len(), scenarios::invalid_order_data().len(), "failures: {:?}", failed);
    assert!(failed.iter().all(|name| name.starts_with("place_order_with_invalid_data[")));
    assert!(summary
        .failures()
        .all(|r| r.error_message.as_deref().unwrap_or_default().contains("validation gap")));
    assert!(!summary.is_successful());

    // every created order was deleted again
    assert!(server.stored_order_ids().is_empty());
    assert!(summary.results.iter().all(|r| r.cleanup_failures == 0));
}

#[tokio::test]
async fn validating_store_passes_invalid_data_scenarios() {
    init_test_environment();
    let server = MockPetstore::start_with(StoreBehavior {
        validate_orders: true,
        ..StoreBehavior::default()
    })
    .await;
    let runner = runner_for(&server);

    let invalid: Vec<Scenario> = scenarios::invalid_order_data()
        .into_iter()
        .map(|(order, case)| Scenario::PlaceOrderWithInvalidData { order, case })
        .collect();
    let summary = runner.run(&invalid).await;

    assert!(summary.is_successful(), "{}", summary.render_text());
    assert_eq!(summary.passed, invalid.len());
    assert_eq!(server.stored_order_ids(), Vec::<i64>::new());
}

#[tokio::test]
async fn inventory_suite_passes() {
    init_test_environment();
    let server = MockPetstore::start().await;
    let summary = runner_for(&server).run(&scenarios::scenarios_for(Some(Suite::Inventory))).await;

    assert!(summary.is_successful(), "{}", summary.render_text());
    assert!(summary.results.iter().all(|r| r.suite == Suite::Inventory));
    assert!(server.inventory_requests() >= 6);
}

#[tokio::test]
async fn rate_limit_after_enough_successes_passes() {
    init_test_environment();
    let server = MockPetstore::start_with(StoreBehavior {
        rate_limit_after: Some(8),
        ..StoreBehavior::default()
    })
    .await;

    let result = runner_for(&server).run_scenario(&Scenario::RateLimiting).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(server.placements(), 9);
    assert_eq!(result.cleanup_attempted, 8);
    assert!(server.stored_order_ids().is_empty());
}

#[tokio::test]
async fn rate_limit_before_enough_successes_fails() {
    init_test_environment();
    let server = MockPetstore::start_with(StoreBehavior {
        rate_limit_after: Some(3),
        ..StoreBehavior::default()
    })
    .await;

    let result = runner_for(&server).run_scenario(&Scenario::RateLimiting).await;

    assert!(!result.success);
    assert!(result
        .error_message
        .unwrap()
        .contains("Expected at least 5 successful requests before rate limiting, but got 3"));
    assert_eq!(result.cleanup_attempted, 3);
}

#[tokio::test]
async fn cleanup_failures_are_reported_without_failing_the_scenario() {
    init_test_environment();
    let server = MockPetstore::start_with(StoreBehavior {
        delete_status: Some(500),
        ..StoreBehavior::default()
    })
    .await;

    let result = runner_for(&server).run_scenario(&Scenario::LargeOrderQuantities).await;

    assert!(result.success);
    assert_eq!(result.cleanup_attempted, 1);
    assert_eq!(result.cleanup_failures, 1);
}

#[tokio::test]
async fn cancelled_run_stops_before_the_next_scenario() {
    init_test_environment();
    let server = MockPetstore::start().await;
    let runner = runner_for(&server);
    runner.cancellation().cancel();

    let summary = runner.run(&scenarios::inventory_suite()).await;

    assert!(summary.interrupted);
    assert!(summary.results.is_empty());
    assert!(!summary.is_successful());
    assert_eq!(server.inventory_requests(), 0);
}

#[tokio::test]
async fn summary_json_lists_each_scenario() {
    init_test_environment();
    let server = MockPetstore::start().await;
    let summary = runner_for(&server)
        .run(&[Scenario::GetInventorySuccess, Scenario::GetNonExistentOrderErrorResponse])
        .await;

    let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(json["environment"], "test");
    assert_eq!(json["passed"], 2);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["results"][0]["name"], "get_inventory_success");
    assert_eq!(json["results"][1]["suite"], "order");
}
