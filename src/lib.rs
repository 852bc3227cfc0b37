//! Petstore Store Suite - functional checks for the Petstore store endpoints
//!
//! This crate drives the `/store/inventory` and `/store/order` endpoints through
//! a typed client, tracks the orders each scenario creates so they are deleted
//! afterwards, and reports per-scenario outcomes.

pub mod error;
pub mod config;
pub mod model;
pub mod retry;
pub mod client;
pub mod validation;
pub mod orchestrator;
pub mod scenarios;
pub mod runner;
pub mod cli;

// Re-export commonly used types
pub use error::{AssertionError, ProtocolError, Result, StoreTestError};
pub use config::{Settings, SettingsSource};
pub use model::{ErrorResponse, Inventory, Order, OrderBuilder, OrderStatus};
pub use retry::{retry, retry_with_cancellation, sleep_cancellable, CancellationToken, Interrupted, RetryPolicy};
pub use client::{ApiResponse, RequestSpec, ResponseSpec, StoreApi, StoreClient};
pub use orchestrator::{CleanupOutcome, CleanupReport, StoreTestContext};
pub use scenarios::{Scenario, Suite};
pub use runner::{RunSummary, ScenarioResult, ScenarioRunner};

/// Current version of the suite
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the suite
pub const NAME: &str = env!("CARGO_PKG_NAME");
