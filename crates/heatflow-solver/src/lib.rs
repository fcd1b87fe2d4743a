mod engine;
#[cfg(feature = "highs")]
mod highs;
mod problem;
mod simplex;
mod solution;

pub use engine::LpEngine;
#[cfg(feature = "highs")]
pub use highs::HighsEngine;
pub use problem::{Bounds, LpProblem, Objective, ProblemError, SparseMatrix};
pub use simplex::Solver;
pub use solution::{Solution, SolutionStatus};
