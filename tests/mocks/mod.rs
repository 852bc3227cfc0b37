#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use petstore_suite::{ApiResponse, ErrorResponse, Inventory, Order, ProtocolError, RetryPolicy, Settings, StoreApi, StoreClient};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use warp::http::{Response, StatusCode};
use warp::Filter;

static INIT: Once = Once::new();

/// Initialize logging once for all tests in a binary
pub fn init_test_environment() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

// Mock of the store transport, for failure paths a real server cannot produce
mock! {
    pub StoreApi {}

    #[async_trait]
    impl StoreApi for StoreApi {
        async fn get_inventory(&self) -> Result<ApiResponse, ProtocolError>;
        async fn place_order(&self, order: &Order) -> Result<ApiResponse, ProtocolError>;
        async fn get_order_by_id(&self, order_id: i64) -> Result<ApiResponse, ProtocolError>;
        async fn delete_order(&self, order_id: i64) -> Result<ApiResponse, ProtocolError>;
        fn retry_policy(&self) -> RetryPolicy;
    }
}

/// Short retry used throughout the tests
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10))
}

pub fn order_response(order: &Order) -> ApiResponse {
    ApiResponse::new(200, serde_json::to_vec(order).unwrap()).with_header("Content-Type", "application/json")
}

/// How the in-memory store answers
#[derive(Debug, Clone)]
pub struct StoreBehavior {
    /// Reject incomplete or out-of-range orders with 400
    pub validate_orders: bool,
    /// Answer 429 to every placement after this many
    pub rate_limit_after: Option<usize>,
    /// Answer every delete with this status instead of deleting
    pub delete_status: Option<u16>,
    pub inventory: BTreeMap<String, i64>,
}

impl Default for StoreBehavior {
    fn default() -> Self {
        let inventory = [("available", 120), ("pending", 7), ("sold", 31), ("string", 2)]
            .into_iter()
            .map(|(status, count)| (status.to_string(), count))
            .collect();
        Self {
            validate_orders: false,
            rate_limit_after: None,
            delete_status: None,
            inventory,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    orders: HashMap<i64, Order>,
    next_id: i64,
    placements: usize,
    inventory_requests: usize,
    deleted: Vec<i64>,
    last_order_body: Option<serde_json::Value>,
}

type SharedState = Arc<Mutex<StoreState>>;

/// In-process Petstore store serving `/store/inventory` and `/store/order`
pub struct MockPetstore {
    addr: SocketAddr,
    state: SharedState,
    server_handle: tokio::task::JoinHandle<()>,
}

impl MockPetstore {
    pub async fn start() -> Self {
        Self::start_with(StoreBehavior::default()).await
    }

    pub async fn start_with(behavior: StoreBehavior) -> Self {
        let state: SharedState = Arc::new(Mutex::new(StoreState {
            next_id: 1,
            ..StoreState::default()
        }));
        let behavior = Arc::new(behavior);

        let with_state = {
            let state = state.clone();
            warp::any().map(move || state.clone())
        };
        let with_behavior = warp::any().map(move || behavior.clone());

        let inventory = warp::path!("store" / "inventory")
            .and(warp::get())
            .and(with_state.clone())
            .and(with_behavior.clone())
            .map(|state: SharedState, behavior: Arc<StoreBehavior>| {
                state.lock().unwrap().inventory_requests += 1;
                json_reply(StatusCode::OK, &behavior.inventory)
            });

        let place = warp::path!("store" / "order")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_state.clone())
            .and(with_behavior.clone())
            .map(|body: serde_json::Value, state: SharedState, behavior: Arc<StoreBehavior>| {
                let mut state = state.lock().unwrap();
                state.placements += 1;
                state.last_order_body = Some(body.clone());

                if let Some(limit) = behavior.rate_limit_after {
                    if state.placements > limit {
                        return json_reply(
                            StatusCode::TOO_MANY_REQUESTS,
                            &ErrorResponse::new(429, "error", "Too many requests"),
                        );
                    }
                }
                let order: Order = match serde_json::from_value(body) {
                    Ok(order) => order,
                    Err(_) => {
                        return json_reply(StatusCode::BAD_REQUEST, &ErrorResponse::new(400, "error", "bad input"))
                    }
                };
                if behavior.validate_orders && !is_acceptable(&order) {
                    return json_reply(StatusCode::BAD_REQUEST, &ErrorResponse::new(400, "error", "Invalid Order"));
                }

                let mut created = order;
                let id = match created.id {
                    Some(id) if id != 0 => id,
                    _ => {
                        let id = state.next_id;
                        state.next_id += 1;
                        id
                    }
                };
                created.id = Some(id);
                state.orders.insert(id, created.clone());
                json_reply(StatusCode::OK, &created)
            });

        let get = warp::path!("store" / "order" / i64)
            .and(warp::get())
            .and(with_state.clone())
            .map(|order_id: i64, state: SharedState| {
                let stored = state.lock().unwrap().orders.get(&order_id).cloned();
                match stored {
                    Some(order) => json_reply(StatusCode::OK, &order),
                    None => not_found(),
                }
            });

        let delete = warp::path!("store" / "order" / i64)
            .and(warp::delete())
            .and(with_state.clone())
            .and(with_behavior.clone())
            .map(|order_id: i64, state: SharedState, behavior: Arc<StoreBehavior>| {
                let mut state = state.lock().unwrap();
                if let Some(status) = behavior.delete_status {
                    let status = StatusCode::from_u16(status).unwrap();
                    return json_reply(status, &ErrorResponse::new(status.as_u16() as i32, "error", "forced"));
                }
                match state.orders.remove(&order_id) {
                    Some(_) => {
                        state.deleted.push(order_id);
                        json_reply(
                            StatusCode::OK,
                            &ErrorResponse::new(200, "unknown", order_id.to_string()),
                        )
                    }
                    None => not_found(),
                }
            });

        let routes = inventory.or(place).unify().or(get).unify().or(delete).unify();

        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        let server_handle = tokio::spawn(server);

        Self {
            addr,
            state,
            server_handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn settings(&self) -> Settings {
        let mut settings = Settings::built_in("test").with_base_url(self.base_url());
        settings.request_timeout = Duration::from_secs(5);
        settings.connection_timeout = Duration::from_secs(2);
        settings
    }

    pub fn client(&self) -> StoreClient {
        StoreClient::new(&self.settings()).unwrap().with_retry_policy(fast_retry())
    }

    /// Orders currently stored
    pub fn stored_order_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.state.lock().unwrap().orders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn deleted_order_ids(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// Raw JSON of the most recent placement request
    pub fn last_order_body(&self) -> Option<serde_json::Value> {
        self.state.lock().unwrap().last_order_body.clone()
    }

    pub fn placements(&self) -> usize {
        self.state.lock().unwrap().placements
    }

    pub fn inventory_requests(&self) -> usize {
        self.state.lock().unwrap().inventory_requests
    }
}

impl Drop for MockPetstore {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

fn is_acceptable(order: &Order) -> bool {
    let pet_ok = order.pet_id.is_some_and(|id| (1..=1_000_000).contains(&id));
    let quantity_ok = order.quantity.is_some_and(|q| (1..=1_000).contains(&q));
    pet_ok && quantity_ok && order.status.is_some()
}

fn not_found() -> Response<String> {
    json_reply(StatusCode::NOT_FOUND, &ErrorResponse::new(1, "error", "Order not found"))
}

fn json_reply<T: Serialize>(status: StatusCode, body: &T) -> Response<String> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("server", "Jetty(9.2.9.v20150224)")
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-methods", "GET, POST, DELETE, PUT")
        .header("access-control-allow-headers", "Content-Type, api_key, Authorization")
        .body(serde_json::to_string(body).unwrap())
        .unwrap()
}

/// Inventory with the given counts
pub fn inventory(entries: &[(&str, i64)]) -> Inventory {
    entries
        .iter()
        .map(|(status, count)| (status.to_string(), Some(*count)))
        .collect()
}
