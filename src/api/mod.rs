//! HTTP API: Axum router over the simulation service and the catalog.
//!
//! Every `/api` route except register and login requires a bearer token.
//! CORS is open so a separately hosted frontend can call in.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    extract::FromRef,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::TokenIssuer;
use crate::engine::BusinessRules;
use crate::service::SimulationService;
use crate::storage::SqliteStore;
use crate::types::{GreenCartError, SimulationResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub simulations: Arc<SimulationService>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(store: SqliteStore, tokens: TokenIssuer, rules: BusinessRules) -> Self {
        let simulations = SimulationService::new(Arc::new(store.clone()), rules);
        Self {
            store,
            simulations: Arc::new(simulations),
            tokens: Arc::new(tokens),
        }
    }
}

impl FromRef<AppState> for Arc<TokenIssuer> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(routes::banner))
        .route("/health", get(routes::health))
        // Accounts
        .route("/api/register", post(routes::register))
        .route("/api/login", post(routes::login))
        // Catalog
        .route("/api/drivers", get(routes::list_drivers).post(routes::create_driver))
        .route("/api/drivers/:id", put(routes::update_driver).delete(routes::delete_driver))
        .route("/api/routes", get(routes::list_routes).post(routes::create_route))
        .route("/api/routes/:id", put(routes::update_route).delete(routes::delete_route))
        .route("/api/orders", get(routes::list_orders).post(routes::create_order))
        .route("/api/orders/:id", put(routes::update_order).delete(routes::delete_order))
        // Simulation
        .route("/api/simulate", post(routes::simulate))
        .route("/api/simulations", get(routes::list_simulations))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<SimulationResult>,
}

impl IntoResponse for GreenCartError {
    fn into_response(self) -> Response {
        let (status, error, result) = match self {
            GreenCartError::Validation(msg) | GreenCartError::Conflict(msg) => {
                (StatusCode::BAD_REQUEST, msg, None)
            }
            GreenCartError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            e @ GreenCartError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string(), None),
            GreenCartError::Persistence { result, reason } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Simulation completed but could not be recorded: {reason}"),
                Some(*result),
            ),
            e @ (GreenCartError::Storage(_) | GreenCartError::Internal(_)) => {
                error!(error = %format!("{e:#}"), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string(), None)
            }
        };
        (status, Json(ErrorBody { error, result })).into_response()
    }
}
