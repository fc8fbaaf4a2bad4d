//! In-memory stand-in for the payments API.
//!
//! Implements the subset the client core exercises: form-encoded POST
//! bodies, bearer auth, idempotency-key replay and the JSON error envelope.
//! `MockState` exposes fault knobs so tests can provoke transient failures,
//! including a committed write whose reply is lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SEED_CUSTOMER: &str = "cus_seed";
pub const SEED_EVENT: &str = "evt_seed";
pub const SEED_ACCOUNT: &str = "acct_seed";

const CURRENCIES: &[&str] = &["aud", "cad", "chf", "eur", "gbp", "hrk", "jpy", "usd"];

type Params = Vec<(String, String)>;
type ApiResponse = (StatusCode, Json<Value>);

#[derive(Clone)]
struct Stored {
    params: Params,
    status: StatusCode,
    body: Value,
}

/// Server state plus fault-injection knobs.
#[derive(Default)]
pub struct MockState {
    charges: RwLock<Vec<Value>>,
    customers: RwLock<HashMap<String, Value>>,
    accounts: RwLock<HashMap<String, Value>>,
    events: RwLock<HashMap<String, Value>>,
    replies: RwLock<HashMap<String, Stored>>,
    seen_keys: RwLock<Vec<Option<String>>>,
    requests: AtomicU32,
    fail_before_commit: AtomicU32,
    fail_after_commit: AtomicU32,
    rate_limited: AtomicU32,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        let customer = json!({
            "id": SEED_CUSTOMER,
            "object": "customer",
            "created": 1475761243,
            "livemode": false,
            "email": "jenny.rosen@example.com",
            "description": null,
            "default_source": "card_seed",
            "sources": {
                "object": "list",
                "url": format!("/v1/customers/{SEED_CUSTOMER}/sources"),
                "has_more": false,
                "data": [card("card_seed", Some(SEED_CUSTOMER))]
            },
            "metadata": {}
        });
        let event = json!({
            "id": SEED_EVENT,
            "object": "event",
            "type": "customer.created",
            "created": 1475761243,
            "livemode": false,
            "pending_webhooks": 0,
            "data": {"object": customer.clone()},
            "request": null
        });
        let account = json!({
            "id": SEED_ACCOUNT,
            "object": "account",
            "email": "owner@example.com",
            "legal_entity": {"first_name": "Jenny", "address": {"country": "HR"}},
            "metadata": {}
        });
        Arc::new(Self {
            customers: RwLock::new(HashMap::from([(SEED_CUSTOMER.to_string(), customer)])),
            events: RwLock::new(HashMap::from([(SEED_EVENT.to_string(), event)])),
            accounts: RwLock::new(HashMap::from([(SEED_ACCOUNT.to_string(), account)])),
            ..Self::default()
        })
    }

    /// Answer the next `n` requests with 500 before touching any data.
    pub fn fail_next(&self, n: u32) {
        self.fail_before_commit.store(n, Ordering::SeqCst);
    }

    /// Apply the next `n` writes, then answer them with 500 anyway.
    pub fn lose_next_replies(&self, n: u32) {
        self.fail_after_commit.store(n, Ordering::SeqCst);
    }

    /// Answer the next `n` requests with 429.
    pub fn rate_limit_next(&self, n: u32) {
        self.rate_limited.store(n, Ordering::SeqCst);
    }

    /// Total requests received.
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn charge_count(&self) -> usize {
        self.charges.read().await.len()
    }

    /// Idempotency-Key header of every request, in arrival order.
    pub async fn seen_keys(&self) -> Vec<Option<String>> {
        self.seen_keys.read().await.clone()
    }
}

pub fn app() -> Router {
    app_with_state(MockState::new())
}

pub fn app_with_state(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/v1/charges", post(create_charge).get(list_charges))
        .route("/v1/charges/{id}", get(retrieve_charge))
        .route(
            "/v1/customers/{id}",
            get(retrieve_customer).post(update_customer).delete(delete_customer),
        )
        .route("/v1/accounts/{id}", post(update_account))
        .route("/v1/events/{id}", get(retrieve_event))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: Arc<MockState>) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn error(status: StatusCode, kind: &str, message: &str, param: Option<&str>, code: Option<&str>) -> ApiResponse {
    let mut body = Map::new();
    body.insert("type".to_string(), json!(kind));
    body.insert("message".to_string(), json!(message));
    if let Some(param) = param {
        body.insert("param".to_string(), json!(param));
    }
    if let Some(code) = code {
        body.insert("code".to_string(), json!(code));
    }
    (status, Json(json!({ "error": body })))
}

fn no_such(kind: &str, id: &str) -> ApiResponse {
    error(
        StatusCode::NOT_FOUND,
        "invalid_request_error",
        &format!("No such {kind}: {id}"),
        Some("id"),
        Some("resource_missing"),
    )
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..14])
}

fn card(id: &str, customer: Option<&str>) -> Value {
    json!({
        "object": "card",
        "id": id,
        "brand": "Visa",
        "last4": "4242",
        "exp_month": 8,
        "exp_year": 2030,
        "country": "US",
        "name": null,
        "customer": customer,
        "metadata": {}
    })
}

/// Auth and fault knobs shared by every route.
async fn gate(state: &MockState, headers: &HeaderMap) -> Result<Option<String>, ApiResponse> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen_keys.write().await.push(key.clone());

    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer sk_test_"));
    if !authorized {
        return Err(error(
            StatusCode::UNAUTHORIZED,
            "invalid_request_error",
            "Invalid API Key provided",
            None,
            None,
        ));
    }
    if take(&state.rate_limited) {
        return Err(error(
            StatusCode::TOO_MANY_REQUESTS,
            "invalid_request_error",
            "Too many requests hit the API too quickly.",
            None,
            Some("rate_limit"),
        ));
    }
    if take(&state.fail_before_commit) {
        return Err(internal_error());
    }
    Ok(key)
}

fn internal_error() -> ApiResponse {
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "api_error",
        "An unknown error occurred",
        None,
        None,
    )
}

/// Decrement `counter` if positive; true when a fault should fire.
fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Run a write at most once per idempotency key.
async fn idempotent<F>(state: &MockState, key: Option<String>, params: Params, write: F) -> ApiResponse
where
    F: std::future::Future<Output = ApiResponse>,
{
    if let Some(key) = &key {
        if let Some(stored) = state.replies.read().await.get(key).cloned() {
            if stored.params != params {
                return error(
                    StatusCode::BAD_REQUEST,
                    "idempotency_error",
                    &format!("Keys for idempotent requests can only be used with the same parameters they were first used with. Try using a key other than '{key}' if you meant to execute a different request."),
                    None,
                    None,
                );
            }
            return (stored.status, Json(stored.body));
        }
    }

    let (status, Json(body)) = write.await;
    if let Some(key) = key {
        state.replies.write().await.insert(
            key,
            Stored {
                params,
                status,
                body: body.clone(),
            },
        );
    }
    if take(&state.fail_after_commit) {
        return internal_error();
    }
    (status, Json(body))
}

fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Rebuild nested objects from bracket keys; `metadata[a]=b` becomes
/// `{"metadata": {"a": "b"}}` and `expand[]` keys are skipped.
fn nest(params: &Params) -> Map<String, Value> {
    let mut root = Map::new();
    'params: for (key, value) in params {
        let segments: Vec<&str> = key
            .split(|c| c == '[' || c == ']')
            .filter(|s| !s.is_empty())
            .collect();
        if key.ends_with("[]") || segments.is_empty() {
            continue;
        }
        let mut node = &mut root;
        for segment in &segments[..segments.len() - 1] {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            let Some(map) = child.as_object_mut() else {
                continue 'params;
            };
            node = map;
        }
        node.insert(segments[segments.len() - 1].to_string(), json!(value));
    }
    root
}

fn metadata(params: &Params) -> Value {
    let nested = nest(params);
    nested.get("metadata").cloned().unwrap_or_else(|| json!({}))
}

async fn create_charge(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> ApiResponse {
    let key = match gate(&state, &headers).await {
        Ok(key) => key,
        Err(response) => return response,
    };
    let write = build_charge(&state, params.clone());
    idempotent(&state, key, params, write).await
}

async fn build_charge(state: &MockState, params: Params) -> ApiResponse {
    let Some(amount) = param(&params, "amount") else {
        return error(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "Missing required param: amount.",
            Some("amount"),
            Some("parameter_missing"),
        );
    };
    let Ok(amount) = amount.parse::<i64>() else {
        return error(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "Invalid integer: amount",
            Some("amount"),
            Some("parameter_invalid_integer"),
        );
    };
    let currency = param(&params, "currency").unwrap_or_default();
    if !CURRENCIES.contains(&currency) {
        return error(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            &format!("Invalid currency: {currency}"),
            Some("currency"),
            None,
        );
    }

    let customer = param(&params, "customer");
    let source = match (param(&params, "source"), customer) {
        (Some("tok_visa"), _) => card(&new_id("card"), customer),
        (Some("tok_chargeDeclined"), _) => {
            let (status, Json(mut body)) = error(
                StatusCode::PAYMENT_REQUIRED,
                "card_error",
                "Your card was declined.",
                None,
                Some("card_declined"),
            );
            body["error"]["decline_code"] = json!("generic_decline");
            return (status, Json(body));
        }
        (Some(other), _) => {
            return error(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                &format!("No such token: {other}"),
                Some("source"),
                Some("resource_missing"),
            );
        }
        (None, Some(id)) => match state.customers.read().await.get(id) {
            Some(_) => card("card_seed", Some(id)),
            None => return no_such("customer", id),
        },
        (None, None) => {
            return error(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "Must provide source or customer.",
                None,
                Some("parameter_missing"),
            );
        }
    };

    let captured = param(&params, "capture") != Some("false");
    let charge = json!({
        "id": new_id("ch"),
        "object": "charge",
        "amount": amount,
        "currency": currency,
        "created": now(),
        "paid": true,
        "captured": captured,
        "refunded": false,
        "status": "succeeded",
        "livemode": false,
        "source": source,
        "customer": customer,
        "description": param(&params, "description"),
        "receipt_email": param(&params, "receipt_email"),
        "failure_code": null,
        "failure_message": null,
        "metadata": metadata(&params)
    });
    state.charges.write().await.push(charge.clone());
    (StatusCode::OK, Json(charge))
}

async fn list_charges(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResponse {
    if let Err(response) = gate(&state, &headers).await {
        return response;
    }
    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(10)
        .clamp(1, 100);
    let charges = state.charges.read().await;
    let matching: Vec<&Value> = charges
        .iter()
        .rev()
        .filter(|c| match query.get("customer") {
            Some(id) => c["customer"] == json!(id),
            None => true,
        })
        .collect();
    let page: Vec<Value> = matching.iter().take(limit).map(|c| (*c).clone()).collect();
    (
        StatusCode::OK,
        Json(json!({
            "object": "list",
            "url": "/v1/charges",
            "has_more": matching.len() > limit,
            "data": page
        })),
    )
}

async fn retrieve_charge(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    if let Err(response) = gate(&state, &headers).await {
        return response;
    }
    let charges = state.charges.read().await;
    match charges.iter().find(|c| c["id"] == json!(id)) {
        Some(charge) => (StatusCode::OK, Json(charge.clone())),
        None => no_such("charge", &id),
    }
}

async fn retrieve_customer(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    if let Err(response) = gate(&state, &headers).await {
        return response;
    }
    match state.customers.read().await.get(&id) {
        Some(customer) => (StatusCode::OK, Json(customer.clone())),
        None => no_such("customer", &id),
    }
}

async fn update_customer(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(params): Form<Params>,
) -> ApiResponse {
    let key = match gate(&state, &headers).await {
        Ok(key) => key,
        Err(response) => return response,
    };
    let write = async {
        let mut customers = state.customers.write().await;
        let Some(customer) = customers.get_mut(&id) else {
            return no_such("customer", &id);
        };
        for field in ["email", "description", "default_source"] {
            if let Some(value) = param(&params, field) {
                customer[field] = json!(value);
            }
        }
        if let Some(Value::Object(update)) = nest(&params).get("metadata") {
            let mut merged = customer["metadata"].as_object().cloned().unwrap_or_default();
            merged.extend(update.clone());
            customer["metadata"] = Value::Object(merged);
        }
        (StatusCode::OK, Json(customer.clone()))
    };
    idempotent(&state, key, params.clone(), write).await
}

async fn delete_customer(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    if let Err(response) = gate(&state, &headers).await {
        return response;
    }
    match state.customers.write().await.remove(&id) {
        Some(_) => (StatusCode::OK, Json(json!({"id": id, "object": "customer", "deleted": true}))),
        None => no_such("customer", &id),
    }
}

async fn update_account(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Form(params): Form<Params>,
) -> ApiResponse {
    let key = match gate(&state, &headers).await {
        Ok(key) => key,
        Err(response) => return response,
    };
    if let Some(day) = param(&params, "legal_entity[dob][day]") {
        if !day.parse::<u32>().is_ok_and(|d| (1..=31).contains(&d)) {
            return error(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "Invalid day of birth",
                Some("legal_entity[dob][day]"),
                Some("parameter_invalid_integer"),
            );
        }
    }
    let write = async {
        let mut accounts = state.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return no_such("account", &id);
        };
        merge(account, Value::Object(nest(&params)));
        (StatusCode::OK, Json(account.clone()))
    };
    idempotent(&state, key, params.clone(), write).await
}

/// Deep-merge `update` into `target`, numeric strings under `dob` becoming numbers.
fn merge(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(target), Value::Object(update)) => {
            for (key, value) in update {
                let slot = target.entry(key.clone()).or_insert(Value::Null);
                if value.is_object() && slot.is_object() {
                    merge(slot, value);
                } else if value.is_object() {
                    *slot = Value::Object(Map::new());
                    merge(slot, value);
                } else {
                    *slot = value;
                }
            }
            if let Some(Value::Object(dob)) = target
                .get_mut("legal_entity")
                .and_then(|le| le.get_mut("dob"))
            {
                for part in dob.values_mut() {
                    if let Some(n) = part.as_str().and_then(|s| s.parse::<u32>().ok()) {
                        *part = json!(n);
                    }
                }
            }
        }
        (target, update) => *target = update,
    }
}

async fn retrieve_event(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    if let Err(response) = gate(&state, &headers).await {
        return response;
    }
    match state.events.read().await.get(&id) {
        Some(event) => (StatusCode::OK, Json(event.clone())),
        None => no_such("event", &id),
    }
}
