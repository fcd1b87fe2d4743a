use std::ops::Range;

use heatflow_solver::{Bounds, LpProblem, Objective, SparseMatrix};
use tracing::debug;

use crate::error::PlanError;
use crate::problem::{RouteLayout, TransportProblem};

/// LP form of a [`TransportProblem`] together with the index bookkeeping
/// needed to read the solution back.
#[derive(Debug, Clone)]
pub struct TransportModel {
    pub layout: RouteLayout,
    pub problem: LpProblem,
    /// One equality row per consumer
    pub demand_rows: Range<usize>,
    /// One capacity row per source
    pub capacity_rows: Range<usize>,
}

impl TransportModel {
    pub fn num_rows(&self) -> usize {
        self.problem.num_constraints()
    }

    pub fn num_nonzeros(&self) -> usize {
        self.problem.matrix.num_nonzeros()
    }
}

/// Build the minimum-cost LP: one non-negative variable per route, demand
/// rows `sum_i x[i][j] = demand[j]` first, then capacity rows
/// `sum_j x[i][j] <= supply[i]`.
pub fn build_model(problem: &TransportProblem) -> Result<TransportModel, PlanError> {
    check_dimensions(problem)?;

    let layout = problem.layout();
    let n_vars = layout.num_routes();
    let n_rows = layout.num_consumers + layout.num_sources;

    // Row-major flattening matches RouteLayout::index
    let objective = Objective {
        coefficients: problem.cost.iter().flatten().copied().collect(),
        minimize: true,
    };
    let columns = vec![Bounds::non_negative(); n_vars];

    let mut rows = Vec::with_capacity(n_rows);
    let mut matrix = SparseMatrix::with_capacity(n_rows, 2 * n_vars);

    for (j, &demand) in problem.demand.iter().enumerate() {
        matrix.push_row(layout.consumer_routes(j).map(|k| (k, 1.0)));
        rows.push(Bounds::fixed(demand));
    }
    for (i, &supply) in problem.supply.iter().enumerate() {
        matrix.push_row(layout.source_routes(i).map(|k| (k, 1.0)));
        rows.push(Bounds::at_most(supply));
    }

    debug!(
        variables = n_vars,
        rows = n_rows,
        nonzeros = matrix.num_nonzeros(),
        "built transportation model"
    );

    Ok(TransportModel {
        layout,
        problem: LpProblem::new(objective, columns, rows, matrix),
        demand_rows: 0..layout.num_consumers,
        capacity_rows: layout.num_consumers..n_rows,
    })
}

/// The cost matrix must have one row per source and one column per consumer.
fn check_dimensions(problem: &TransportProblem) -> Result<(), PlanError> {
    if problem.cost.len() != problem.num_sources() {
        return Err(PlanError::DimensionMismatch {
            what: "cost".to_string(),
            expected: problem.num_sources(),
            found: problem.cost.len(),
        });
    }
    for (i, row) in problem.cost.iter().enumerate() {
        if row.len() != problem.num_consumers() {
            return Err(PlanError::DimensionMismatch {
                what: format!("cost[{}]", i),
                expected: problem.num_consumers(),
                found: row.len(),
            });
        }
    }
    Ok(())
}
