//! CRUD over the reference data: drivers, routes, and orders.
//!
//! Entities are addressed by their storage `id`. Listing returns rows in
//! insertion order, which is the order the simulation deals orders in.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::{decimal_col, json_col, parsed_col, u32_col, SqliteStore};
use crate::types::{
    Driver, DriverPatch, GreenCartError, NewDriver, NewOrder, NewRoute, Order, OrderPatch, Route,
    RoutePatch,
};

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn not_found(kind: &'static str, id: &str) -> GreenCartError {
    GreenCartError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn driver_from_row(row: &SqliteRow) -> Result<Driver, GreenCartError> {
    Ok(Driver {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        shift_hours: u32_col(row, "shift_hours")?,
        past_week_hours: json_col(row, "past_week_hours")?,
    })
}

fn route_from_row(row: &SqliteRow) -> Result<Route, GreenCartError> {
    Ok(Route {
        id: row.try_get("id")?,
        route_id: row.try_get("route_id")?,
        distance_km: decimal_col(row, "distance_km")?,
        traffic_level: parsed_col(row, "traffic_level")?,
        base_time_min: u32_col(row, "base_time_min")?,
    })
}

fn order_from_row(row: &SqliteRow) -> Result<Order, GreenCartError> {
    Ok(Order {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        value_rs: decimal_col(row, "value_rs")?,
        route_id: row.try_get("route_id")?,
        delivery_time: parsed_col(row, "delivery_time")?,
    })
}

fn hours_json(hours: &[u32]) -> Result<String, GreenCartError> {
    serde_json::to_string(hours).map_err(|e| GreenCartError::Internal(e.into()))
}

impl SqliteStore {
    // -- Drivers -------------------------------------------------------------

    pub async fn list_drivers(&self) -> Result<Vec<Driver>, GreenCartError> {
        sqlx::query("SELECT * FROM drivers ORDER BY seq")
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(driver_from_row)
            .collect()
    }

    pub async fn get_driver(&self, id: &str) -> Result<Option<Driver>, GreenCartError> {
        sqlx::query("SELECT * FROM drivers WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .as_ref()
            .map(driver_from_row)
            .transpose()
    }

    pub async fn create_driver(&self, input: NewDriver) -> Result<Driver, GreenCartError> {
        let (name, shift_hours, past_week_hours) = input.into_parts()?;
        let driver = Driver {
            id: new_id(),
            name,
            shift_hours,
            past_week_hours,
        };
        self.write_driver(&driver, true).await?;
        debug!(id = %driver.id, name = %driver.name, "Driver created");
        Ok(driver)
    }

    pub async fn update_driver(&self, id: &str, patch: DriverPatch) -> Result<Driver, GreenCartError> {
        let mut driver = self.get_driver(id).await?.ok_or_else(|| not_found("Driver", id))?;
        patch.apply(&mut driver);
        self.write_driver(&driver, false).await?;
        Ok(driver)
    }

    pub async fn delete_driver(&self, id: &str) -> Result<(), GreenCartError> {
        self.delete_from("drivers", "Driver", id).await
    }

    pub async fn count_drivers(&self) -> Result<i64, GreenCartError> {
        self.count("drivers").await
    }

    async fn write_driver(&self, driver: &Driver, insert: bool) -> Result<(), GreenCartError> {
        let sql = if insert {
            "INSERT INTO drivers (name, shift_hours, past_week_hours, id) VALUES (?, ?, ?, ?)"
        } else {
            "UPDATE drivers SET name = ?, shift_hours = ?, past_week_hours = ? WHERE id = ?"
        };
        sqlx::query(sql)
            .bind(&driver.name)
            .bind(i64::from(driver.shift_hours))
            .bind(hours_json(&driver.past_week_hours)?)
            .bind(&driver.id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Insert many drivers in one transaction.
    pub async fn insert_drivers(&self, drivers: Vec<NewDriver>) -> Result<usize, GreenCartError> {
        let mut tx = self.pool().begin().await?;
        let count = drivers.len();
        for input in drivers {
            let (name, shift_hours, past_week_hours) = input.into_parts()?;
            sqlx::query(
                "INSERT INTO drivers (id, name, shift_hours, past_week_hours) VALUES (?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(name)
            .bind(i64::from(shift_hours))
            .bind(hours_json(&past_week_hours)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    // -- Routes --------------------------------------------------------------

    pub async fn list_routes(&self) -> Result<Vec<Route>, GreenCartError> {
        sqlx::query("SELECT * FROM routes ORDER BY seq")
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(route_from_row)
            .collect()
    }

    pub async fn get_route(&self, id: &str) -> Result<Option<Route>, GreenCartError> {
        sqlx::query("SELECT * FROM routes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .as_ref()
            .map(route_from_row)
            .transpose()
    }

    pub async fn create_route(&self, input: NewRoute) -> Result<Route, GreenCartError> {
        input.validate()?;
        let route = Route {
            id: new_id(),
            route_id: input.route_id,
            distance_km: input.distance_km,
            traffic_level: input.traffic_level,
            base_time_min: input.base_time_min,
        };
        self.write_route(&route, true).await?;
        debug!(id = %route.id, route_id = route.route_id, "Route created");
        Ok(route)
    }

    pub async fn update_route(&self, id: &str, patch: RoutePatch) -> Result<Route, GreenCartError> {
        let mut route = self.get_route(id).await?.ok_or_else(|| not_found("Route", id))?;
        patch.apply(&mut route)?;
        self.write_route(&route, false).await?;
        Ok(route)
    }

    pub async fn delete_route(&self, id: &str) -> Result<(), GreenCartError> {
        self.delete_from("routes", "Route", id).await
    }

    pub async fn count_routes(&self) -> Result<i64, GreenCartError> {
        self.count("routes").await
    }

    async fn write_route(&self, route: &Route, insert: bool) -> Result<(), GreenCartError> {
        let sql = if insert {
            "INSERT INTO routes (route_id, distance_km, traffic_level, base_time_min, id) VALUES (?, ?, ?, ?, ?)"
        } else {
            "UPDATE routes SET route_id = ?, distance_km = ?, traffic_level = ?, base_time_min = ? WHERE id = ?"
        };
        sqlx::query(sql)
            .bind(route.route_id)
            .bind(route.distance_km.to_string())
            .bind(route.traffic_level.to_string())
            .bind(i64::from(route.base_time_min))
            .bind(&route.id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn insert_routes(&self, routes: Vec<NewRoute>) -> Result<usize, GreenCartError> {
        let mut tx = self.pool().begin().await?;
        let count = routes.len();
        for input in routes {
            input.validate()?;
            sqlx::query(
                "INSERT INTO routes (id, route_id, distance_km, traffic_level, base_time_min) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(input.route_id)
            .bind(input.distance_km.to_string())
            .bind(input.traffic_level.to_string())
            .bind(i64::from(input.base_time_min))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    // -- Orders --------------------------------------------------------------

    pub async fn list_orders(&self) -> Result<Vec<Order>, GreenCartError> {
        sqlx::query("SELECT * FROM orders ORDER BY seq")
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(order_from_row)
            .collect()
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>, GreenCartError> {
        sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .as_ref()
            .map(order_from_row)
            .transpose()
    }

    pub async fn create_order(&self, input: NewOrder) -> Result<Order, GreenCartError> {
        input.validate()?;
        let order = Order {
            id: new_id(),
            order_id: input.order_id,
            value_rs: input.value_rs,
            route_id: input.route_id,
            delivery_time: input.delivery_time,
        };
        self.write_order(&order, true).await?;
        debug!(id = %order.id, order_id = order.order_id, "Order created");
        Ok(order)
    }

    pub async fn update_order(&self, id: &str, patch: OrderPatch) -> Result<Order, GreenCartError> {
        let mut order = self.get_order(id).await?.ok_or_else(|| not_found("Order", id))?;
        patch.apply(&mut order)?;
        self.write_order(&order, false).await?;
        Ok(order)
    }

    pub async fn delete_order(&self, id: &str) -> Result<(), GreenCartError> {
        self.delete_from("orders", "Order", id).await
    }

    pub async fn count_orders(&self) -> Result<i64, GreenCartError> {
        self.count("orders").await
    }

    async fn write_order(&self, order: &Order, insert: bool) -> Result<(), GreenCartError> {
        let sql = if insert {
            "INSERT INTO orders (order_id, value_rs, route_id, delivery_time, id) VALUES (?, ?, ?, ?, ?)"
        } else {
            "UPDATE orders SET order_id = ?, value_rs = ?, route_id = ?, delivery_time = ? WHERE id = ?"
        };
        sqlx::query(sql)
            .bind(order.order_id)
            .bind(order.value_rs.to_string())
            .bind(order.route_id)
            .bind(order.delivery_time.to_string())
            .bind(&order.id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn insert_orders(&self, orders: Vec<NewOrder>) -> Result<usize, GreenCartError> {
        let mut tx = self.pool().begin().await?;
        let count = orders.len();
        for input in orders {
            input.validate()?;
            sqlx::query(
                "INSERT INTO orders (id, order_id, value_rs, route_id, delivery_time) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(input.order_id)
            .bind(input.value_rs.to_string())
            .bind(input.route_id)
            .bind(input.delivery_time.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    // -- Shared --------------------------------------------------------------

    async fn delete_from(&self, table: &str, kind: &'static str, id: &str) -> Result<(), GreenCartError> {
        let done = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(not_found(kind, id));
        }
        debug!(table, id, "Row deleted");
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<i64, GreenCartError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get("n")?)
    }
}
