//! Simulation service: validate, snapshot, simulate, record.
//!
//! Ties the engine to its storage collaborator. Validation happens before
//! any data is read; the engine runs over an in-memory snapshot; the result
//! is recorded against the caller afterwards.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::engine::simulator::route_table;
use crate::engine::{BusinessRules, Simulator};
use crate::storage::SimulationStore;
use crate::types::{GreenCartError, SimulationParams, SimulationRecord, SimulationRequest};

pub struct SimulationService {
    store: Arc<dyn SimulationStore>,
    simulator: Simulator,
}

impl SimulationService {
    pub fn new(store: Arc<dyn SimulationStore>, rules: BusinessRules) -> Self {
        Self {
            store,
            simulator: Simulator::new(rules),
        }
    }

    /// Validate raw parameters and run a simulation for `user_id`.
    pub async fn run_simulation(
        &self,
        user_id: &str,
        params: &SimulationParams,
    ) -> Result<SimulationRecord, GreenCartError> {
        let request = params.validate().inspect_err(|e| {
            warn!(user_id, error = %e, "Simulation request rejected");
        })?;
        self.run_request(user_id, &request).await
    }

    /// Run an already-validated request.
    ///
    /// If the result cannot be recorded the error still carries it, so the
    /// caller can show it or retry the write.
    pub async fn run_request(
        &self,
        user_id: &str,
        request: &SimulationRequest,
    ) -> Result<SimulationRecord, GreenCartError> {
        let orders = self.store.load_orders().await?;
        let routes = route_table(self.store.load_routes().await?);

        let report = self.simulator.run(request, &orders, &routes);
        let record = SimulationRecord::new(user_id, request, report.result);

        if let Err(e) = self.store.save_simulation(&record).await {
            error!(user_id, simulation_id = %record.id, error = %format!("{e:#}"), "Failed to record simulation");
            return Err(GreenCartError::Persistence {
                result: Box::new(record.result),
                reason: format!("{e:#}"),
            });
        }

        info!(
            user_id,
            simulation_id = %record.id,
            result = %record.result,
            "Simulation recorded"
        );
        Ok(record)
    }

    /// A user's past runs, newest first.
    pub async fn list_results_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<SimulationRecord>, GreenCartError> {
        Ok(self.store.list_simulations(user_id).await?)
    }
}
