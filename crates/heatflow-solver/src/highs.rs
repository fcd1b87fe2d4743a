//! HiGHS engine via good_lp.
//!
//! Maps the bounded sparse-row [`LpProblem`] onto good_lp's expression
//! model and hands it to the HiGHS backend.

use good_lp::solvers::highs::highs;
use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution as _, SolverModel, Variable};
use tracing::{debug, warn};

use crate::engine::LpEngine;
use crate::problem::LpProblem;
use crate::solution::Solution;

/// HiGHS-based LP engine.
#[derive(Debug, Default, Clone)]
pub struct HighsEngine;

impl HighsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl LpEngine for HighsEngine {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.validate() {
            warn!(error = %e, "rejecting malformed LP problem");
            return Solution::error();
        }

        if problem.num_variables() == 0 {
            let satisfied = problem.rows.iter().all(|b| b.lower <= 0.0 && 0.0 <= b.upper);
            return if satisfied {
                Solution::optimal(Vec::new(), 0.0, 0)
            } else {
                Solution::infeasible()
            };
        }

        let mut vars = variables!();
        let columns: Vec<Variable> = problem
            .columns
            .iter()
            .map(|bounds| {
                let mut v = variable();
                if bounds.lower.is_finite() {
                    v = v.min(bounds.lower);
                }
                if bounds.upper.is_finite() {
                    v = v.max(bounds.upper);
                }
                vars.add(v)
            })
            .collect();

        let objective: Expression = columns
            .iter()
            .zip(&problem.objective.coefficients)
            .map(|(&v, &c)| c * v)
            .sum();

        let mut model = if problem.objective.minimize {
            vars.minimise(objective).using(highs)
        } else {
            vars.maximise(objective).using(highs)
        };

        for (r, bounds) in problem.rows.iter().enumerate() {
            let lhs: Expression = problem.matrix.row(r).map(|(k, c)| c * columns[k]).sum();

            let (lower, upper) = (bounds.lower, bounds.upper);
            if bounds.is_fixed() {
                model = model.with(constraint!(lhs == lower));
                continue;
            }
            if lower.is_finite() {
                let floor = lhs.clone();
                model = model.with(constraint!(floor >= lower));
            }
            if upper.is_finite() {
                model = model.with(constraint!(lhs <= upper));
            }
        }

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = columns.iter().map(|&v| solution.value(v)).collect();
                let objective_value: f64 = values
                    .iter()
                    .zip(&problem.objective.coefficients)
                    .map(|(x, c)| x * c)
                    .sum();
                Solution::optimal(values, objective_value, 0)
            }
            Err(ResolutionError::Infeasible) => Solution::infeasible(),
            Err(ResolutionError::Unbounded) => Solution::unbounded(),
            Err(e) => {
                debug!(error = %e, "highs failed");
                Solution::error()
            }
        }
    }
}
