use std::fmt;

use heatflow_solver::SolutionStatus;
use thiserror::Error;

/// Pipeline stage that raised a [`PlanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    ModelBuild,
    Solve,
    Interpretation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validation => "validation",
            Stage::ModelBuild => "model build",
            Stage::Solve => "solve",
            Stage::Interpretation => "interpretation",
        };
        f.write_str(s)
    }
}

/// An input entry named by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Supply(usize),
    Demand(usize),
    Cost(usize, usize),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Supply(i) => write!(f, "supply[{}]", i),
            Quantity::Demand(j) => write!(f, "demand[{}]", j),
            Quantity::Cost(i, j) => write!(f, "cost[{}][{}]", i, j),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("validation: total_demand {total_demand} exceeds total_supply {total_supply}")]
    Infeasible { total_supply: f64, total_demand: f64 },
    #[error("validation: {quantity} = {value} must be a finite, non-negative number")]
    InvalidQuantity { quantity: Quantity, value: f64 },
    #[error("model build: {what} has length {found}, expected {expected}")]
    DimensionMismatch { what: String, expected: usize, found: usize },
    #[error("solve: engine '{engine}' finished with status {status}")]
    SolveFailed { engine: &'static str, status: SolutionStatus },
    #[error("interpretation: engine returned {found} primal values for {expected} routes")]
    MalformedSolution { expected: usize, found: usize },
    #[error("interpretation: route ({from}, {to}) carries {value}, below the x >= 0 bound")]
    NegativeFlow { from: usize, to: usize, value: f64 },
    #[error(
        "interpretation: recomputed cost {recomputed} differs from reported objective {reported} (relative error {relative_error:e})"
    )]
    CostMismatch { recomputed: f64, reported: f64, relative_error: f64 },
}

impl PlanError {
    pub fn stage(&self) -> Stage {
        match self {
            PlanError::Infeasible { .. } | PlanError::InvalidQuantity { .. } => Stage::Validation,
            PlanError::DimensionMismatch { .. } => Stage::ModelBuild,
            PlanError::SolveFailed { .. } => Stage::Solve,
            PlanError::MalformedSolution { .. }
            | PlanError::NegativeFlow { .. }
            | PlanError::CostMismatch { .. } => Stage::Interpretation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_stage_and_quantities() {
        let err = PlanError::Infeasible { total_supply: 2.0, total_demand: 8.0 };
        assert_eq!(err.stage(), Stage::Validation);
        assert_eq!(err.to_string(), "validation: total_demand 8 exceeds total_supply 2");

        let err = PlanError::InvalidQuantity { quantity: Quantity::Cost(1, 0), value: -3.0 };
        assert!(err.to_string().contains("cost[1][0] = -3"));

        let err = PlanError::SolveFailed { engine: "simplex", status: SolutionStatus::Unbounded };
        assert_eq!(err.stage(), Stage::Solve);
        assert!(err.to_string().contains("unbounded"));

        let err = PlanError::NegativeFlow { from: 0, to: 1, value: -5.0 };
        assert_eq!(err.stage(), Stage::Interpretation);
        assert!(err.to_string().contains("route (0, 1) carries -5"));
    }
}
