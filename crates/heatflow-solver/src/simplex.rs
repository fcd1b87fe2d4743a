use tracing::{debug, trace, warn};

use crate::engine::LpEngine;
use crate::problem::{LpProblem, Objective};
use crate::solution::Solution;

/// Simplex solver for linear programming problems
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum pivots, across both phases, before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
        }
    }
}

impl LpEngine for Solver {
    fn name(&self) -> &'static str {
        "simplex"
    }

    fn solve(&self, problem: &LpProblem) -> Solution {
        Solver::solve(self, problem)
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Solve the LP problem using the two-phase simplex method
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.validate() {
            warn!(error = %e, "rejecting malformed LP problem");
            return Solution::error();
        }

        let form = match self.standardize(problem) {
            Ok(form) => form,
            Err(solution) => return solution,
        };

        let mut tableau = self.build_tableau(&form, &problem.objective);
        let mut iterations = 0;

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau, &mut iterations) {
                PhaseOne::Feasible => {}
                PhaseOne::Infeasible => {
                    debug!(iterations, "phase 1 left artificial variables in the basis");
                    return Solution::infeasible().with_iterations(iterations);
                }
                PhaseOne::IterationLimit => {
                    warn!(iterations, "iteration limit reached in phase 1");
                    return Solution::error().with_iterations(iterations);
                }
            }
        }

        // Phase 2: Optimize
        match self.phase2(&mut tableau, &mut iterations) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => {
                debug!(iterations, "no leaving row for an improving column");
                return Solution::unbounded().with_iterations(iterations);
            }
            SimplexResult::IterationLimit => {
                warn!(iterations, "iteration limit reached in phase 2");
                return Solution::error().with_iterations(iterations);
            }
        }

        debug!(iterations, "simplex reached an optimal basis");
        self.extract_solution(&tableau, &form, problem, iterations)
    }

    /// Rewrite bounded columns and rows as `=`, `<=`, `>=` rows over
    /// columns shifted to a zero lower bound.
    fn standardize(&self, problem: &LpProblem) -> Result<StandardForm, Solution> {
        let n_vars = problem.num_variables();
        let mut shifts = Vec::with_capacity(n_vars);
        let mut rows = Vec::with_capacity(problem.num_constraints());

        for (k, bounds) in problem.columns.iter().enumerate() {
            if bounds.lower > bounds.upper || bounds.lower == f64::INFINITY {
                debug!(column = k, "column bounds cross");
                return Err(Solution::infeasible());
            }
            if !bounds.lower.is_finite() {
                warn!(column = k, "columns without a finite lower bound are not supported");
                return Err(Solution::error());
            }
            shifts.push(bounds.lower);
            if bounds.upper.is_finite() {
                rows.push(StandardRow {
                    entries: vec![(k, 1.0)],
                    op: ConstraintOp::Le,
                    rhs: bounds.upper - bounds.lower,
                });
            }
        }

        for (r, bounds) in problem.rows.iter().enumerate() {
            if bounds.lower > bounds.upper
                || bounds.lower == f64::INFINITY
                || bounds.upper == f64::NEG_INFINITY
            {
                debug!(row = r, "row bounds cross");
                return Err(Solution::infeasible());
            }

            let mut entries: Vec<(usize, f64)> = Vec::with_capacity(problem.matrix.row_len(r));
            entries.extend(problem.matrix.row(r).filter(|&(_, v)| v != 0.0));
            let shift: f64 = entries.iter().map(|&(k, v)| v * shifts[k]).sum();

            if bounds.is_fixed() {
                rows.push(StandardRow {
                    entries,
                    op: ConstraintOp::Eq,
                    rhs: bounds.lower - shift,
                });
                continue;
            }

            if bounds.lower.is_finite() {
                let rhs = bounds.lower - shift;
                // Non-negative activity already satisfies a non-positive floor.
                let implied = rhs <= 0.0 && entries.iter().all(|&(_, v)| v >= 0.0);
                if !implied {
                    rows.push(StandardRow {
                        entries: entries.clone(),
                        op: ConstraintOp::Ge,
                        rhs,
                    });
                }
            }
            if bounds.upper.is_finite() {
                rows.push(StandardRow {
                    entries,
                    op: ConstraintOp::Le,
                    rhs: bounds.upper - shift,
                });
            }
        }

        Ok(StandardForm { n_vars, shifts, rows })
    }

    fn build_tableau(&self, form: &StandardForm, objective: &Objective) -> Tableau {
        let n_vars = form.n_vars;
        let n_constraints = form.rows.len();

        // Normalize to non-negative right-hand sides
        let rows: Vec<StandardRow> = form.rows.iter().map(StandardRow::normalized).collect();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;

        for row in &rows {
            match row.op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, row) in rows.iter().enumerate() {
            for &(j, coef) in &row.entries {
                tableau.data[i][j] += coef;
            }
            tableau.data[i][total_cols - 1] = row.rhs;

            match row.op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Objective row (last row). The tableau maximizes, so minimization
        // stores -c; a positive entry marks an improving column.
        let obj_row = n_constraints;
        for (j, &coef) in objective.coefficients.iter().enumerate() {
            tableau.data[obj_row][j] = if objective.minimize { -coef } else { coef };
        }

        tableau
    }

    fn phase1(&self, tableau: &mut Tableau, iterations: &mut usize) -> PhaseOne {
        let n_constraints = tableau.obj_row();
        let n_cols = tableau.data[0].len();
        let art_start = tableau.art_start();

        let orig_obj = tableau.data[n_constraints].clone();

        // Maximize -sum(artificials)
        tableau.data[n_constraints].fill(0.0);
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, art_start, iterations) {
            SimplexResult::Optimal => {}
            // The auxiliary objective is bounded by zero
            SimplexResult::Unbounded | SimplexResult::IterationLimit => return PhaseOne::IterationLimit,
        }

        let rhs_col = tableau.rhs_col();
        let scale = 1.0
            + (0..n_constraints)
                .map(|i| tableau.data[i][rhs_col].abs())
                .fold(0.0, f64::max);
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col] > self.tolerance * scale {
                return PhaseOne::Infeasible;
            }
        }

        self.drive_out_artificials(tableau, iterations);

        // Restore original objective and price out basic variables
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        PhaseOne::Feasible
    }

    /// Pivot zero-level artificials out of the basis so phase 2 pivots
    /// cannot push them positive. Rows with no candidate column are
    /// linear combinations of the others and stay inert.
    fn drive_out_artificials(&self, tableau: &mut Tableau, iterations: &mut usize) {
        let art_start = tableau.art_start();
        for i in 0..tableau.obj_row() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            match (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance) {
                Some(col) => {
                    self.pivot(tableau, i, col);
                    *iterations += 1;
                }
                None => trace!(row = i, "redundant constraint row"),
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau, iterations: &mut usize) -> SimplexResult {
        // Artificial columns never re-enter
        let exclude_from = tableau.art_start();
        self.iterate(tableau, exclude_from, iterations)
    }

    fn iterate(&self, tableau: &mut Tableau, exclude_from: usize, iterations: &mut usize) -> SimplexResult {
        loop {
            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from) else {
                return SimplexResult::Optimal;
            };
            if *iterations >= self.max_iterations {
                return SimplexResult::IterationLimit;
            }
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return SimplexResult::Unbounded;
            };
            trace!(row = pivot_row, col = pivot_col, "pivot");
            self.pivot(tableau, pivot_row, pivot_col);
            *iterations += 1;
        }
    }

    /// Bland's rule: the lowest-index improving column.
    fn find_pivot_column(&self, tableau: &Tableau, exclude_from: usize) -> Option<usize> {
        let obj_row = tableau.obj_row();
        (0..exclude_from).find(|&j| tableau.data[obj_row][j] > self.tolerance)
    }

    /// Minimum ratio test, ties broken by the lowest basic variable index.
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.rhs_col();

        let mut best: Option<(usize, f64)> = None;
        for i in 0..tableau.obj_row() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match best {
                None => true,
                Some((row, min_ratio)) => {
                    ratio < min_ratio - self.tolerance
                        || ((ratio - min_ratio).abs() <= self.tolerance
                            && tableau.basic_vars[i] < tableau.basic_vars[row])
                }
            };
            if better {
                best = Some((i, ratio));
            }
        }

        best.map(|(row, _)| row)
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        let pivot_row = tableau.data[row].clone();
        for i in 0..n_rows {
            if i == row {
                continue;
            }
            let factor = tableau.data[i][col];
            if factor == 0.0 {
                continue;
            }
            for (cell, &p) in tableau.data[i].iter_mut().zip(&pivot_row) {
                *cell -= factor * p;
            }
        }
    }

    fn extract_solution(
        &self,
        tableau: &Tableau,
        form: &StandardForm,
        problem: &LpProblem,
        iterations: usize,
    ) -> Solution {
        let rhs_col = tableau.rhs_col();

        let mut shifted = vec![0.0; tableau.n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < tableau.n_vars {
                shifted[basic] = tableau.data[i][rhs_col];
            }
        }

        let values: Vec<f64> = shifted
            .iter()
            .zip(&form.shifts)
            .map(|(&x, &lower)| lower + x.max(0.0))
            .collect();

        let objective_value: f64 = values
            .iter()
            .zip(&problem.objective.coefficients)
            .map(|(x, c)| x * c)
            .sum();

        Solution::optimal(values, objective_value, iterations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

#[derive(Debug, Clone)]
struct StandardRow {
    entries: Vec<(usize, f64)>,
    op: ConstraintOp,
    rhs: f64,
}

impl StandardRow {
    fn normalized(&self) -> Self {
        if self.rhs >= 0.0 {
            return self.clone();
        }
        let op = match self.op {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        };
        Self {
            entries: self.entries.iter().map(|&(j, v)| (j, -v)).collect(),
            op,
            rhs: -self.rhs,
        }
    }
}

/// Problem over shifted columns `x' = x - lower`, all `x' >= 0`.
struct StandardForm {
    n_vars: usize,
    shifts: Vec<f64>,
    rows: Vec<StandardRow>,
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl Tableau {
    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn rhs_col(&self) -> usize {
        self.data[0].len() - 1
    }

    fn art_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

enum SimplexResult {
    Optimal,
    Unbounded,
    IterationLimit,
}

enum PhaseOne {
    Feasible,
    Infeasible,
    IterationLimit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Bounds, SparseMatrix};
    use crate::solution::SolutionStatus;

    fn dense_problem(costs: &[f64], minimize: bool, columns: Vec<Bounds>, rows: &[(&[f64], Bounds)]) -> LpProblem {
        let mut matrix = SparseMatrix::new();
        for (coefficients, _) in rows {
            matrix.push_row(coefficients.iter().copied().enumerate().filter(|&(_, v)| v != 0.0));
        }
        LpProblem::new(
            Objective { coefficients: costs.to_vec(), minimize },
            columns,
            rows.iter().map(|(_, b)| *b).collect(),
            matrix,
        )
    }

    fn at_most(upper: f64) -> Bounds {
        Bounds::between(f64::NEG_INFINITY, upper)
    }

    fn at_least(lower: f64) -> Bounds {
        Bounds::between(lower, f64::INFINITY)
    }

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        //   x, y >= 0
        // Optimal: x=3, y=1, obj=11
        let problem = dense_problem(
            &[3.0, 2.0],
            false,
            vec![Bounds::non_negative(); 2],
            &[
                (&[1.0, 1.0], at_most(4.0)),
                (&[1.0, 0.0], at_most(3.0)),
                (&[0.0, 1.0], at_most(3.0)),
            ],
        );

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 11.0).abs() < 1e-6, "obj = {} (expected 11)", solution.objective_value);
    }

    #[test]
    fn test_minimization_with_column_bounds() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   0 <= x <= 3, 0 <= y <= 3
        // Optimal: x=3, y=1, obj=9
        let problem = dense_problem(
            &[2.0, 3.0],
            true,
            vec![Bounds::at_most(3.0); 2],
            &[(&[1.0, 1.0], at_least(4.0))],
        );

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 9.0).abs() < 1e-6, "obj = {} (expected 9)", solution.objective_value);
    }

    #[test]
    fn test_shifted_lower_bounds() {
        // Minimize x + 2y with x >= 2, 1 <= y <= 5, x + y >= 4
        // Optimal: x=3, y=1, obj=5
        let problem = dense_problem(
            &[1.0, 2.0],
            true,
            vec![at_least(2.0), Bounds::between(1.0, 5.0)],
            &[(&[1.0, 1.0], at_least(4.0))],
        );

        let solution = Solver::new().solve(&problem);

        assert!(solution.is_optimal());
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {}", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {}", solution.values[1]);
        assert!((solution.objective_value - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        // x >= 5
        // x <= 3
        let problem = dense_problem(
            &[1.0],
            true,
            vec![Bounds::non_negative()],
            &[(&[1.0], at_least(5.0)), (&[1.0], at_most(3.0))],
        );

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_crossed_bounds_are_infeasible() {
        let problem = dense_problem(&[1.0], true, vec![Bounds::between(5.0, 3.0)], &[]);
        assert_eq!(Solver::new().solve(&problem).status, SolutionStatus::Infeasible);

        let problem = dense_problem(
            &[1.0],
            true,
            vec![Bounds::non_negative()],
            &[(&[1.0], Bounds::between(2.0, 1.0))],
        );
        assert_eq!(Solver::new().solve(&problem).status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        // Maximize x subject to x - y <= 1
        let problem = dense_problem(
            &[1.0, 0.0],
            false,
            vec![Bounds::non_negative(); 2],
            &[(&[1.0, -1.0], at_most(1.0))],
        );

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_redundant_equalities() {
        // Balanced 2x2 transportation: one equality row is implied by the others.
        let problem = dense_problem(
            &[1.0, 2.0, 2.0, 1.0],
            true,
            vec![Bounds::non_negative(); 4],
            &[
                (&[1.0, 1.0, 0.0, 0.0], Bounds::fixed(1.0)),
                (&[0.0, 0.0, 1.0, 1.0], Bounds::fixed(1.0)),
                (&[1.0, 0.0, 1.0, 0.0], Bounds::fixed(1.0)),
                (&[0.0, 1.0, 0.0, 1.0], Bounds::fixed(1.0)),
            ],
        );

        let solution = Solver::new().solve(&problem);

        assert!(solution.is_optimal());
        assert!((solution.objective_value - 2.0).abs() < 1e-6, "obj = {}", solution.objective_value);
        assert!((solution.values[0] - 1.0).abs() < 1e-6);
        assert!((solution.values[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_free_column_is_an_error() {
        let problem = dense_problem(&[1.0], true, vec![Bounds::free()], &[(&[1.0], at_least(1.0))]);
        assert_eq!(Solver::new().solve(&problem).status, SolutionStatus::Error);
    }

    #[test]
    fn test_iteration_limit_is_an_error() {
        let problem = dense_problem(
            &[3.0, 2.0],
            false,
            vec![Bounds::non_negative(); 2],
            &[(&[1.0, 1.0], at_most(4.0))],
        );

        let solution = Solver::new().with_max_iterations(0).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Error);
    }

    #[test]
    fn test_malformed_problem_is_an_error() {
        let problem = LpProblem::new(
            Objective { coefficients: vec![1.0, 1.0], minimize: true },
            vec![Bounds::non_negative()],
            Vec::new(),
            SparseMatrix::new(),
        );
        assert_eq!(Solver::new().solve(&problem).status, SolutionStatus::Error);
    }

    #[test]
    fn test_no_variables() {
        let problem = dense_problem(&[], true, Vec::new(), &[(&[], Bounds::at_most(3.0))]);

        let solution = Solver::new().solve(&problem);

        assert!(solution.is_optimal());
        assert!(solution.values.is_empty());
        assert_eq!(solution.objective_value, 0.0);
    }
}
