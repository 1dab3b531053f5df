//! API route handlers.
//!
//! Request bodies are read as raw bytes and decoded here, so malformed JSON
//! gets the same `{ "error": ... }` shape as every other failure.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::types::{
    Driver, DriverPatch, GreenCartError, NewDriver, NewOrder, NewRoute, Order, OrderPatch, Route,
    RoutePatch, SimulationParams, SimulationRecord, SimulationResult,
};

type ApiResult<T> = Result<T, GreenCartError>;

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    let raw: &[u8] = if body.is_empty() { b"{}" } else { body.as_ref() };
    serde_json::from_slice(raw)
        .map_err(|e| GreenCartError::Validation(format!("Invalid request body: {e}")))
}

/// Run CPU-heavy work (password hashing) off the async workers.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GreenCartError::Internal(e.into()))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    #[serde(flatten)]
    pub result: SimulationResult,
    pub simulation_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Credentials {
    fn required(self) -> ApiResult<(String, String)> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => Ok((u.trim().to_string(), p)),
            _ => Err(GreenCartError::Validation(
                "Username and password required".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// GET /
pub async fn banner() -> &'static str {
    "GreenCart Logistics API is running"
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let (username, password) = parse_body::<Credentials>(&body)?.required()?;
    let hash = blocking(move || hash_password(&password)).await??;
    let user = state.store.create_user(&username, &hash).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user_id: user.id,
        }),
    ))
}

/// POST /api/login
pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<LoginResponse>> {
    let (username, password) = parse_body::<Credentials>(&body)?.required()?;
    let invalid = || GreenCartError::Unauthorized("Invalid credentials".into());

    let user = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or_else(invalid)?;
    let stored = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &stored)).await? {
        return Err(invalid());
    }

    let token = state.tokens.issue(&user)?;
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// GET /api/drivers
pub async fn list_drivers(_: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<Driver>>> {
    Ok(Json(state.store.list_drivers().await?))
}

/// POST /api/drivers
pub async fn create_driver(
    _: AuthUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Driver>)> {
    let input: NewDriver = parse_body(&body)?;
    Ok((StatusCode::CREATED, Json(state.store.create_driver(input).await?)))
}

/// PUT /api/drivers/:id
pub async fn update_driver(
    _: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Driver>> {
    let patch: DriverPatch = parse_body(&body)?;
    Ok(Json(state.store.update_driver(&id, patch).await?))
}

/// DELETE /api/drivers/:id
pub async fn delete_driver(
    _: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.store.delete_driver(&id).await?;
    Ok(MessageResponse::new("Driver deleted"))
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// GET /api/routes
pub async fn list_routes(_: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<Route>>> {
    Ok(Json(state.store.list_routes().await?))
}

/// POST /api/routes
pub async fn create_route(
    _: AuthUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Route>)> {
    let input: NewRoute = parse_body(&body)?;
    Ok((StatusCode::CREATED, Json(state.store.create_route(input).await?)))
}

/// PUT /api/routes/:id
pub async fn update_route(
    _: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Route>> {
    let patch: RoutePatch = parse_body(&body)?;
    Ok(Json(state.store.update_route(&id, patch).await?))
}

/// DELETE /api/routes/:id
pub async fn delete_route(
    _: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.store.delete_route(&id).await?;
    Ok(MessageResponse::new("Route deleted"))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// GET /api/orders
pub async fn list_orders(_: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.store.list_orders().await?))
}

/// POST /api/orders
pub async fn create_order(
    _: AuthUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let input: NewOrder = parse_body(&body)?;
    Ok((StatusCode::CREATED, Json(state.store.create_order(input).await?)))
}

/// PUT /api/orders/:id
pub async fn update_order(
    _: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Order>> {
    let patch: OrderPatch = parse_body(&body)?;
    Ok(Json(state.store.update_order(&id, patch).await?))
}

/// DELETE /api/orders/:id
pub async fn delete_order(
    _: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.store.delete_order(&id).await?;
    Ok(MessageResponse::new("Order deleted"))
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// POST /api/simulate
pub async fn simulate(
    user: AuthUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SimulateResponse>> {
    let params: SimulationParams = parse_body(&body)?;
    let record = state.simulations.run_simulation(&user.user_id, &params).await?;
    Ok(Json(SimulateResponse {
        result: record.result,
        simulation_id: record.id,
    }))
}

/// GET /api/simulations
pub async fn list_simulations(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SimulationRecord>>> {
    Ok(Json(state.simulations.list_results_for_user(&user.user_id).await?))
}
