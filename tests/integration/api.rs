//! HTTP flows through the full router.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use secrecy::Secret;
use serde_json::{json, Value};
use tower::ServiceExt;

use greencart::api::{build_router, AppState};
use greencart::auth::TokenIssuer;
use greencart::engine::BusinessRules;
use greencart::storage::SqliteStore;

async fn app() -> Router {
    let store = SqliteStore::in_memory().await.unwrap();
    let tokens = TokenIssuer::new(Secret::new("integration-secret".into()), 3600);
    build_router(AppState::new(store, tokens, BusinessRules::default()))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login_as(app: &Router, username: &str) -> String {
    let creds = json!({"username": username, "password": "s3cret-pass"});
    let (status, _) = call(app, Method::POST, "/api/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(app, Method::POST, "/api/login", None, Some(creds)).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn banner_and_health() {
    let app = app().await;
    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    assert_eq!(&body[..], b"GreenCart Logistics API is running");

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_and_login() {
    let app = app().await;
    let creds = json!({"username": "alice", "password": "wonderland"});

    let (status, body) = call(&app, Method::POST, "/api/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["userId"].as_str().unwrap().to_string();
    assert!(body["message"].is_string());

    let (status, body) = call(&app, Method::POST, "/api/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already exists");

    let (status, body) = call(&app, Method::POST, "/api/register", None, Some(json!({"username": "bob"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username and password required");

    let wrong = json!({"username": "alice", "password": "nope"});
    let (status, body) = call(&app, Method::POST, "/api/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let unknown = json!({"username": "mallory", "password": "wonderland"});
    let (status, body) = call(&app, Method::POST, "/api/login", None, Some(unknown)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, body) = call(&app, Method::POST, "/api/login", None, Some(creds)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], user_id.as_str());
    assert_eq!(body["username"], "alice");
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app().await;

    let (status, body) = call(&app, Method::GET, "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, body) = call(&app, Method::GET, "/api/orders", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let (status, _) = call(&app, Method::POST, "/api/simulate", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn route_crud() {
    let app = app().await;
    let token = login_as(&app, "dispatcher").await;
    let t = Some(token.as_str());

    let new_route = json!({"route_id": 4, "distance_km": 13, "traffic_level": "Low", "base_time_min": 52});
    let (status, created) = call(&app, Method::POST, "/api/routes", t, Some(new_route)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, listed) = call(&app, Method::GET, "/api/routes", t, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let uri = format!("/api/routes/{id}");
    let (status, updated) = call(&app, Method::PUT, &uri, t, Some(json!({"traffic_level": "High"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["traffic_level"], "High");
    assert_eq!(updated["base_time_min"], 52);

    let (status, _) = call(&app, Method::PUT, "/api/routes/missing", t, Some(json!({"base_time_min": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::DELETE, &uri, t, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, _) = call(&app, Method::DELETE, &uri, t, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let app = app().await;
    let token = login_as(&app, "dispatcher").await;
    let t = Some(token.as_str());

    let (status, body) = call(&app, Method::POST, "/api/drivers", t, Some(json!({"name": "Amit"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "All fields required");

    let (status, _) = call(&app, Method::POST, "/api/routes", t, Some(json!({"route_id": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_traffic = json!({"route_id": 1, "distance_km": 5, "traffic_level": "high", "base_time_min": 10});
    let (status, _) = call(&app, Method::POST, "/api/routes", t, Some(bad_traffic)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_time = json!({"order_id": 1, "value_rs": 100, "route_id": 1, "delivery_time": "25:00"});
    let (status, _) = call(&app, Method::POST, "/api/orders", t, Some(bad_time)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_reference_data_is_rejected() {
    let app = app().await;
    let token = login_as(&app, "dispatcher").await;
    let t = Some(token.as_str());

    let long_trip = json!({"route_id": 1, "distance_km": 5, "traffic_level": "Low", "base_time_min": 4294967295u64});
    let (status, body) = call(&app, Method::POST, "/api/routes", t, Some(long_trip)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("base_time_min"));

    let far = json!({"route_id": 1, "distance_km": 100001, "traffic_level": "High", "base_time_min": 30});
    let (status, body) = call(&app, Method::POST, "/api/routes", t, Some(far)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("distance_km"));

    let pricey = json!({"order_id": 1, "value_rs": 2000000000u64, "route_id": 1, "delivery_time": "10:00"});
    let (status, body) = call(&app, Method::POST, "/api/orders", t, Some(pricey)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("value_rs"));

    // updates are held to the same limits
    let ok = json!({"route_id": 1, "distance_km": 10, "traffic_level": "Medium", "base_time_min": 30});
    let (_, created) = call(&app, Method::POST, "/api/routes", t, Some(ok)).await;
    let uri = format!("/api/routes/{}", created["id"].as_str().unwrap());
    let (status, _) = call(&app, Method::PUT, &uri, t, Some(json!({"base_time_min": 100000}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = json!({"order_id": 1, "value_rs": 1200, "route_id": 1, "delivery_time": "09:25"});
    let (_, created) = call(&app, Method::POST, "/api/orders", t, Some(order)).await;
    let uri = format!("/api/orders/{}", created["id"].as_str().unwrap());
    let (status, _) = call(&app, Method::PUT, &uri, t, Some(json!({"value_rs": -1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the stored data still simulates cleanly
    let request = json!({"num_drivers": 1, "start_time": "09:00", "max_hours": 10});
    let (status, result) = call(&app, Method::POST, "/api/simulate", t, Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["total_profit"].as_f64(), Some(1150.0));
}

#[tokio::test]
async fn driver_crud() {
    let app = app().await;
    let token = login_as(&app, "dispatcher").await;
    let t = Some(token.as_str());

    let driver = json!({"name": "Priya", "shift_hours": 6, "past_week_hours": [10, 9, 6, 6, 6, 7, 6]});
    let (status, created) = call(&app, Method::POST, "/api/drivers", t, Some(driver)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["past_week_hours"].as_array().unwrap().len(), 7);

    let uri = format!("/api/drivers/{}", created["id"].as_str().unwrap());
    let (status, updated) = call(&app, Method::PUT, &uri, t, Some(json!({"shift_hours": 8}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["shift_hours"], 8);
    assert_eq!(updated["name"], "Priya");
}

#[tokio::test]
async fn simulate_and_list_history() {
    let app = app().await;
    let token = login_as(&app, "manager").await;
    let t = Some(token.as_str());

    let route = json!({"route_id": 1, "distance_km": 10, "traffic_level": "Medium", "base_time_min": 30});
    let (status, _) = call(&app, Method::POST, "/api/routes", t, Some(route)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = json!({"order_id": 1, "value_rs": 1200, "route_id": 1, "delivery_time": "09:25"});
    let (status, _) = call(&app, Method::POST, "/api/orders", t, Some(order)).await;
    assert_eq!(status, StatusCode::CREATED);

    let request = json!({"num_drivers": 1, "start_time": "09:00", "max_hours": 10});
    let (status, result) = call(&app, Method::POST, "/api/simulate", t, Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["total_profit"].as_f64(), Some(1150.0));
    assert_eq!(result["efficiency_score"].as_f64(), Some(100.0));
    assert_eq!(result["on_time_deliveries"], 1);
    assert_eq!(result["total_bonus"].as_f64(), Some(0.0));
    assert_eq!(result["total_fuel_cost"].as_f64(), Some(50.0));
    assert!(result["fatigued_drivers"].as_array().unwrap().is_empty());
    let simulation_id = result["simulation_id"].as_str().unwrap().to_string();

    let (status, history) = call(&app, Method::GET, "/api/simulations", t, None).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], simulation_id.as_str());
    assert_eq!(history[0]["start_time"], "09:00");
    assert_eq!(history[0]["total_profit"].as_f64(), Some(1150.0));

    // another account sees nothing
    let other = login_as(&app, "auditor").await;
    let (_, history) = call(&app, Method::GET, "/api/simulations", Some(other.as_str()), None).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn simulate_validation_errors() {
    let app = app().await;
    let token = login_as(&app, "manager").await;
    let t = Some(token.as_str());

    let cases = [
        (json!({"start_time": "09:00", "max_hours": 8}), "All parameters required"),
        (json!({"num_drivers": "abc", "start_time": "09:00", "max_hours": 8}), "Parameters must be positive numbers"),
        (json!({"num_drivers": 2, "start_time": "09:00", "max_hours": -1}), "Parameters must be positive numbers"),
        (json!({"num_drivers": 2, "start_time": "24:15", "max_hours": 8}), "Invalid start time format (HH:MM)"),
    ];
    for (request, message) in cases {
        let (status, body) = call(&app, Method::POST, "/api/simulate", t, Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], message);
    }

    let (_, history) = call(&app, Method::GET, "/api/simulations", t, None).await;
    assert!(history.as_array().unwrap().is_empty());
}
