use heatflow_solver::{LpEngine, Solver};
use tracing::{debug, instrument, warn};

use crate::builder::build_model;
use crate::error::PlanError;
use crate::interpret::{interpret, DistributionReport};
use crate::problem::TransportProblem;
use crate::validate::validate;

/// Runs validation, model construction, the engine, and interpretation in
/// sequence. Holds no per-problem state, so one planner can serve any
/// number of problems, from any number of threads if the engine allows.
#[derive(Debug, Clone)]
pub struct Planner<E> {
    engine: E,
    /// Relative tolerance for the recomputed-cost check
    cost_tolerance: f64,
    /// How far below zero a primal value may sit and still read as zero
    flow_tolerance: f64,
}

impl Default for Planner<Solver> {
    fn default() -> Self {
        Self::new(Solver::default())
    }
}

impl<E: LpEngine> Planner<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            cost_tolerance: 1e-6,
            flow_tolerance: 1e-7,
        }
    }

    pub fn with_cost_tolerance(mut self, tol: f64) -> Self {
        self.cost_tolerance = tol;
        self
    }

    pub fn with_flow_tolerance(mut self, tol: f64) -> Self {
        self.flow_tolerance = tol;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Find the minimum-cost allocation for `problem`.
    #[instrument(
        skip_all,
        fields(
            sources = problem.num_sources(),
            consumers = problem.num_consumers(),
            engine = self.engine.name()
        )
    )]
    pub fn plan(&self, problem: &TransportProblem) -> Result<DistributionReport, PlanError> {
        let result = self.run(problem);
        if let Err(e) = &result {
            warn!(stage = %e.stage(), error = %e, "planning failed");
        }
        result
    }

    fn run(&self, problem: &TransportProblem) -> Result<DistributionReport, PlanError> {
        let balance = validate(problem)?;
        let model = build_model(problem)?;
        debug!(
            demand_rows = ?model.demand_rows,
            capacity_rows = ?model.capacity_rows,
            nonzeros = model.num_nonzeros(),
            "model ready"
        );

        let solution = self.engine.solve(&model.problem);
        debug!(
            status = %solution.status,
            iterations = solution.iterations,
            objective = solution.objective_value,
            "engine finished"
        );

        let report = interpret(
            problem,
            &solution,
            self.engine.name(),
            self.cost_tolerance,
            self.flow_tolerance,
        )?;
        debug!(
            total_cost = report.total_cost,
            allocated = report.total_allocated(),
            slack = balance.slack(),
            "plan ready"
        );
        Ok(report)
    }
}
