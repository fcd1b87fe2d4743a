use heatflow_solver::{Solution, SolutionStatus};
use tracing::debug;

use crate::error::PlanError;
use crate::problem::TransportProblem;

/// How much of a source's capacity the optimal plan uses.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceUsage {
    pub supply: f64,
    pub used: f64,
    /// Capacity left unused
    pub spare: f64,
    /// `used / supply`; 0.0 for a source with no supply
    pub utilization: f64,
}

/// How much a consumer receives in total.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumerService {
    pub demand: f64,
    pub received: f64,
    /// `demand - received`; zero up to solver tolerance
    pub shortfall: f64,
}

/// Independent recomputation of the plan's cost against the engine's objective.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostCheck {
    pub recomputed: f64,
    pub reported: f64,
    pub relative_error: f64,
    pub tolerance: f64,
}

impl CostCheck {
    pub fn new(recomputed: f64, reported: f64, tolerance: f64) -> Self {
        let relative_error = (recomputed - reported).abs() / reported.abs().max(1.0);
        Self {
            recomputed,
            reported,
            relative_error,
            tolerance,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.relative_error <= self.tolerance
    }
}

/// Structured reading of an optimal solve.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionReport {
    /// `allocation[i][j]`: quantity shipped from source `i` to consumer `j`
    pub allocation: Vec<Vec<f64>>,
    pub sources: Vec<SourceUsage>,
    pub consumers: Vec<ConsumerService>,
    /// `fulfillment[i][j]`: share of consumer `j`'s demand served by source
    /// `i`; 0.0 for a consumer with no demand
    pub fulfillment: Vec<Vec<f64>>,
    /// Cost recomputed from `allocation`
    pub total_cost: f64,
    /// Objective value reported by the engine
    pub objective_value: f64,
    pub cost_check: CostCheck,
}

impl DistributionReport {
    pub fn total_allocated(&self) -> f64 {
        self.allocation.iter().flatten().sum()
    }
}

/// Turn the engine's flat primal vector into a [`DistributionReport`].
///
/// Fails with `SolveFailed` on any non-optimal status and with
/// `CostMismatch` when the recomputed cost disagrees with the reported
/// objective beyond `cost_tolerance` (relative). Primal values in
/// `[-flow_tolerance, 0)` are treated as zero; anything lower, or NaN, is
/// a `NegativeFlow`.
pub fn interpret(
    problem: &TransportProblem,
    solution: &Solution,
    engine: &'static str,
    cost_tolerance: f64,
    flow_tolerance: f64,
) -> Result<DistributionReport, PlanError> {
    if solution.status != SolutionStatus::Optimal {
        return Err(PlanError::SolveFailed {
            engine,
            status: solution.status,
        });
    }

    let layout = problem.layout();
    if solution.values.len() != layout.num_routes() {
        return Err(PlanError::MalformedSolution {
            expected: layout.num_routes(),
            found: solution.values.len(),
        });
    }

    if let Some(k) = solution.values.iter().position(|&x| x.is_nan() || x < -flow_tolerance) {
        let (from, to) = layout.route(k);
        return Err(PlanError::NegativeFlow {
            from,
            to,
            value: solution.values[k],
        });
    }

    // Engines honor x >= 0 only up to their tolerance
    let allocation: Vec<Vec<f64>> = (0..layout.num_sources)
        .map(|i| {
            layout
                .source_routes(i)
                .map(|k| solution.values[k].max(0.0))
                .collect()
        })
        .collect();

    let sources: Vec<SourceUsage> = allocation
        .iter()
        .zip(&problem.supply)
        .map(|(row, &supply)| {
            let used: f64 = row.iter().sum();
            SourceUsage {
                supply,
                used,
                spare: supply - used,
                utilization: if supply > 0.0 { used / supply } else { 0.0 },
            }
        })
        .collect();

    let consumers: Vec<ConsumerService> = problem
        .demand
        .iter()
        .enumerate()
        .map(|(j, &demand)| {
            let received: f64 = allocation.iter().map(|row| row[j]).sum();
            ConsumerService {
                demand,
                received,
                shortfall: demand - received,
            }
        })
        .collect();

    let fulfillment: Vec<Vec<f64>> = allocation
        .iter()
        .map(|row| {
            row.iter()
                .zip(&problem.demand)
                .map(|(&amount, &demand)| if demand > 0.0 { amount / demand } else { 0.0 })
                .collect()
        })
        .collect();

    let total_cost: f64 = allocation
        .iter()
        .zip(&problem.cost)
        .flat_map(|(amounts, costs)| amounts.iter().zip(costs).map(|(x, c)| x * c))
        .sum();

    let cost_check = CostCheck::new(total_cost, solution.objective_value, cost_tolerance);
    debug!(
        recomputed = total_cost,
        reported = solution.objective_value,
        relative_error = cost_check.relative_error,
        "cost cross-check"
    );
    if !cost_check.is_consistent() {
        return Err(PlanError::CostMismatch {
            recomputed: total_cost,
            reported: solution.objective_value,
            relative_error: cost_check.relative_error,
        });
    }

    Ok(DistributionReport {
        allocation,
        sources,
        consumers,
        fulfillment,
        total_cost,
        objective_value: solution.objective_value,
        cost_check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransportProblem {
        TransportProblem::new(
            vec![vec![8.0, 2.0], vec![12.0, 2.0], vec![5.0, 1.0]],
            vec![2.0, 10.0, 3.0],
            vec![5.0, 3.0],
        )
    }

    #[test]
    fn test_allocation_and_statistics() {
        // x[0][0]=2, x[1][1]=3, x[2][0]=3 -> 16 + 6 + 15 = 37
        let solution = Solution::optimal(vec![2.0, 0.0, 0.0, 3.0, 3.0, 0.0], 37.0, 4);

        let report = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap();

        assert_eq!(report.allocation, vec![vec![2.0, 0.0], vec![0.0, 3.0], vec![3.0, 0.0]]);
        assert_eq!(report.total_cost, 37.0);
        assert_eq!(report.objective_value, 37.0);
        assert!(report.cost_check.is_consistent());

        assert_eq!(report.sources[0].utilization, 1.0);
        assert_eq!(report.sources[1].used, 3.0);
        assert_eq!(report.sources[1].spare, 7.0);
        assert!((report.sources[1].utilization - 0.3).abs() < 1e-12);

        assert_eq!(report.consumers[0].received, 5.0);
        assert_eq!(report.consumers[1].shortfall, 0.0);

        assert!((report.fulfillment[0][0] - 0.4).abs() < 1e-12);
        assert!((report.fulfillment[2][0] - 0.6).abs() < 1e-12);
        assert_eq!(report.fulfillment[1][1], 1.0);
        assert_eq!(report.total_allocated(), 8.0);
    }

    #[test]
    fn test_zero_demand_and_zero_supply_are_defined() {
        let problem = TransportProblem::new(vec![vec![1.0, 1.0], vec![1.0, 1.0]], vec![0.0, 4.0], vec![0.0, 4.0]);
        let solution = Solution::optimal(vec![0.0, 0.0, 0.0, 4.0], 4.0, 1);

        let report = interpret(&problem, &solution, "test", 1e-6, 1e-7).unwrap();

        assert_eq!(report.sources[0].utilization, 0.0);
        assert_eq!(report.fulfillment[0][0], 0.0);
        assert_eq!(report.fulfillment[1][0], 0.0);
        assert_eq!(report.fulfillment[1][1], 1.0);
        assert!(report.fulfillment.iter().flatten().all(|f| f.is_finite()));
    }

    #[test]
    fn test_non_optimal_status_fails() {
        for solution in [Solution::infeasible(), Solution::unbounded(), Solution::error()] {
            let err = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap_err();
            assert_eq!(
                err,
                PlanError::SolveFailed {
                    engine: "test",
                    status: solution.status
                }
            );
        }
    }

    #[test]
    fn test_cost_mismatch_detected() {
        let solution = Solution::optimal(vec![2.0, 0.0, 0.0, 3.0, 3.0, 0.0], 30.0, 4);

        let err = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap_err();

        match err {
            PlanError::CostMismatch {
                recomputed,
                reported,
                relative_error,
            } => {
                assert_eq!(recomputed, 37.0);
                assert_eq!(reported, 30.0);
                assert!((relative_error - 7.0 / 30.0).abs() < 1e-12);
            }
            other => panic!("expected cost mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_objective_is_a_mismatch() {
        let solution = Solution::optimal(vec![2.0, 0.0, 0.0, 3.0, 3.0, 0.0], f64::NAN, 4);

        let err = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap_err();

        assert!(matches!(err, PlanError::CostMismatch { .. }));
    }

    #[test]
    fn test_short_primal_vector_rejected() {
        let solution = Solution::optimal(vec![1.0; 4], 0.0, 0);

        let err = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap_err();

        assert_eq!(err, PlanError::MalformedSolution { expected: 6, found: 4 });
    }

    #[test]
    fn test_solver_noise_clamped() {
        let solution = Solution::optimal(vec![2.0, -1e-12, 0.0, 3.0, 3.0, 0.0], 37.0, 4);

        let report = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap();

        assert_eq!(report.allocation[0][1], 0.0);
    }

    #[test]
    fn test_negative_flow_beyond_tolerance_rejected() {
        // A zero-cost route keeps the cost check blind to the bad value
        let problem = TransportProblem::new(vec![vec![0.0, 1.0], vec![1.0, 1.0]], vec![10.0, 10.0], vec![2.0, 3.0]);
        let solution = Solution::optimal(vec![-5.0, 3.0, 0.0, 0.0], 3.0, 1);

        let err = interpret(&problem, &solution, "test", 1e-6, 1e-7).unwrap_err();

        assert_eq!(err, PlanError::NegativeFlow { from: 0, to: 0, value: -5.0 });
        assert_eq!(err.stage(), crate::error::Stage::Interpretation);
    }

    #[test]
    fn test_flow_tolerance_bounds_the_clamp() {
        let solution = Solution::optimal(vec![2.0, -1e-5, 0.0, 3.0, 3.0, 0.0], 37.0, 4);

        let err = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap_err();
        assert!(matches!(err, PlanError::NegativeFlow { from: 0, to: 1, .. }));

        let report = interpret(&sample(), &solution, "test", 1e-6, 1e-4).unwrap();
        assert_eq!(report.allocation[0][1], 0.0);
    }

    #[test]
    fn test_nan_flow_rejected() {
        let solution = Solution::optimal(vec![2.0, 0.0, 0.0, 3.0, f64::NAN, 0.0], 37.0, 4);

        let err = interpret(&sample(), &solution, "test", 1e-6, 1e-7).unwrap_err();

        assert!(matches!(err, PlanError::NegativeFlow { from: 2, to: 0, .. }));
    }
}
