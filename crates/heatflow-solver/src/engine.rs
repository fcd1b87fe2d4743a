use crate::problem::LpProblem;
use crate::solution::Solution;

/// A capability that solves [`LpProblem`]s.
///
/// Callers only rely on the contract: when the returned status is
/// `Optimal`, `values` has one entry per column and satisfies every column
/// and row bound to the engine's tolerance. How the optimum is found is up
/// to the implementation. Engines must be usable from several threads at
/// once, either by being stateless per call or by synchronizing internally.
pub trait LpEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Solve the problem. Failures are reported through the status.
    fn solve(&self, problem: &LpProblem) -> Solution;
}

impl<E: LpEngine + ?Sized> LpEngine for &E {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(&self, problem: &LpProblem) -> Solution {
        (**self).solve(problem)
    }
}
