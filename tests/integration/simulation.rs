//! Simulation runs against a seeded SQLite store.

use std::sync::Arc;

use greencart::engine::BusinessRules;
use greencart::service::SimulationService;
use greencart::storage::{SimulationStore, SqliteStore};
use greencart::types::{GreenCartError, NewOrder, NewRoute, SimulationParams, TrafficLevel};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

fn route(route_id: i64, distance_km: Decimal, traffic_level: TrafficLevel, base_time_min: u32) -> NewRoute {
    NewRoute {
        route_id,
        distance_km,
        traffic_level,
        base_time_min,
    }
}

fn order(order_id: i64, value_rs: Decimal, route_id: i64, at: &str) -> NewOrder {
    NewOrder {
        order_id,
        value_rs,
        route_id,
        delivery_time: at.parse().unwrap(),
    }
}

fn params(v: serde_json::Value) -> SimulationParams {
    serde_json::from_value(v).unwrap()
}

async fn service_over(routes: Vec<NewRoute>, orders: Vec<NewOrder>) -> (SqliteStore, SimulationService) {
    let store = SqliteStore::in_memory().await.unwrap();
    store.insert_routes(routes).await.unwrap();
    store.insert_orders(orders).await.unwrap();
    let service = SimulationService::new(Arc::new(store.clone()), BusinessRules::default());
    (store, service)
}

#[tokio::test]
async fn two_drivers_mixed_outcomes() {
    let (_, service) = service_over(
        vec![
            route(1, dec!(10), TrafficLevel::Medium, 30),
            route(2, dec!(20), TrafficLevel::High, 60),
        ],
        vec![
            // driver 1: on time, high value
            order(1, dec!(1200), 1, "09:30"),
            // driver 2: 15 minutes late on a high-traffic route
            order(2, dec!(500), 2, "09:45"),
            // driver 1: unknown route, ignored
            order(3, dec!(800), 9, "10:00"),
            // driver 2: starts at 10:00, late again
            order(4, dec!(2000), 1, "10:05"),
        ],
    )
    .await;

    let record = service
        .run_simulation(
            "manager",
            &params(json!({"num_drivers": 2, "start_time": "09:00", "max_hours": 10})),
        )
        .await
        .unwrap();
    let r = &record.result;

    assert_eq!(r.on_time_deliveries, 1);
    assert_eq!(r.late_deliveries, 2);
    assert_eq!(r.total_bonus, dec!(120));
    assert_eq!(r.total_penalties, dec!(100));
    assert_eq!(r.total_fuel_cost, dec!(240));
    assert_eq!(r.total_profit, dec!(3480));
    assert!((r.efficiency_score - 100.0 / 3.0).abs() < 1e-9);
    assert!(r.fatigued_drivers.is_empty());
}

#[tokio::test]
async fn cap_rejection_charges_fuel_and_flags_fatigue() {
    let (_, service) = service_over(
        vec![route(3, dec!(5), TrafficLevel::Low, 250)],
        vec![
            order(1, dec!(100), 3, "23:00"),
            order(2, dec!(100), 3, "23:00"),
            order(3, dec!(100), 3, "23:00"),
        ],
    )
    .await;

    let record = service
        .run_simulation(
            "manager",
            &params(json!({"num_drivers": 1, "start_time": "06:00", "max_hours": 9})),
        )
        .await
        .unwrap();
    let r = &record.result;

    assert_eq!(r.on_time_deliveries, 2);
    assert_eq!(r.late_deliveries, 0);
    // third trip is refused but still fuelled
    assert_eq!(r.total_fuel_cost, dec!(75));
    assert_eq!(r.total_profit, dec!(150));
    assert_eq!(r.fatigued_drivers, vec!["Driver 1".to_string()]);
}

#[tokio::test]
async fn empty_snapshot_scores_zero() {
    let (_, service) = service_over(Vec::new(), Vec::new()).await;

    let record = service
        .run_simulation(
            "manager",
            &params(json!({"num_drivers": 3, "start_time": "08:00", "max_hours": 8})),
        )
        .await
        .unwrap();
    assert_eq!(record.result.efficiency_score, 0.0);
    assert_eq!(record.result.total_profit, Decimal::ZERO);
}

#[tokio::test]
async fn rejected_request_is_not_recorded() {
    let (store, service) = service_over(
        vec![route(1, dec!(10), TrafficLevel::Medium, 30)],
        vec![order(1, dec!(1200), 1, "09:25")],
    )
    .await;

    let err = service
        .run_simulation(
            "manager",
            &params(json!({"num_drivers": 2, "start_time": "9am", "max_hours": 8})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GreenCartError::Validation(_)));
    assert!(store.list_simulations("manager").await.unwrap().is_empty());
}

#[tokio::test]
async fn history_is_per_user_and_newest_first() {
    let (_, service) = service_over(
        vec![route(1, dec!(10), TrafficLevel::Medium, 30)],
        vec![order(1, dec!(1200), 1, "09:25")],
    )
    .await;

    let first = service
        .run_simulation(
            "alice",
            &params(json!({"num_drivers": 1, "start_time": "09:00", "max_hours": 8})),
        )
        .await
        .unwrap();
    let second = service
        .run_simulation(
            "alice",
            &params(json!({"num_drivers": 2, "start_time": "10:00", "max_hours": 4})),
        )
        .await
        .unwrap();
    service
        .run_simulation(
            "bob",
            &params(json!({"num_drivers": 1, "start_time": "09:00", "max_hours": 8})),
        )
        .await
        .unwrap();

    let history = service.list_results_for_user("alice").await.unwrap();
    let ids: Vec<_> = history.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    assert_eq!(history[0].num_drivers, 2);
    assert_eq!(history[0].start_time.to_string(), "10:00");
    assert_eq!(history[1].result, first.result);
}
