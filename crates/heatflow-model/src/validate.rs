use tracing::debug;

use crate::error::{PlanError, Quantity};
use crate::problem::TransportProblem;

/// Aggregate supply and demand of a problem that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub total_supply: f64,
    pub total_demand: f64,
}

impl Balance {
    /// Supply left over once every demand is met.
    pub fn slack(&self) -> f64 {
        self.total_supply - self.total_demand
    }

    pub fn is_balanced(&self, tolerance: f64) -> bool {
        self.slack().abs() <= tolerance * self.total_supply.abs().max(1.0)
    }
}

/// Run every check that has to pass before a model is built.
pub fn validate(problem: &TransportProblem) -> Result<Balance, PlanError> {
    check_quantities(problem)?;
    check_feasibility(&problem.supply, &problem.demand)
}

/// Reject negative or non-finite supply, demand, or cost entries.
pub fn check_quantities(problem: &TransportProblem) -> Result<(), PlanError> {
    let entries = problem
        .supply
        .iter()
        .enumerate()
        .map(|(i, &v)| (Quantity::Supply(i), v))
        .chain(problem.demand.iter().enumerate().map(|(j, &v)| (Quantity::Demand(j), v)))
        .chain(problem.cost.iter().enumerate().flat_map(|(i, row)| {
            row.iter().enumerate().map(move |(j, &v)| (Quantity::Cost(i, j), v))
        }));

    for (quantity, value) in entries {
        if !value.is_finite() || value < 0.0 {
            return Err(PlanError::InvalidQuantity { quantity, value });
        }
    }
    Ok(())
}

/// Aggregate supply must cover aggregate demand. Equal totals are the
/// balanced case and pass.
pub fn check_feasibility(supply: &[f64], demand: &[f64]) -> Result<Balance, PlanError> {
    let total_supply: f64 = supply.iter().sum();
    let total_demand: f64 = demand.iter().sum();

    if total_demand > total_supply {
        return Err(PlanError::Infeasible {
            total_supply,
            total_demand,
        });
    }

    debug!(total_supply, total_demand, "aggregate supply covers demand");
    Ok(Balance {
        total_supply,
        total_demand,
    })
}
