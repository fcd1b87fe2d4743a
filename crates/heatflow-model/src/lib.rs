//! Minimum-cost heat distribution as a transportation LP.
//!
//! A [`TransportProblem`] is validated, turned into a sparse LP, solved by
//! any [`LpEngine`](heatflow_solver::LpEngine), and read back into a
//! [`DistributionReport`]. [`Planner`] chains the stages.

pub mod builder;
pub mod error;
pub mod interpret;
pub mod planner;
pub mod problem;
pub mod validate;

pub use builder::{build_model, TransportModel};
pub use error::{PlanError, Quantity, Stage};
pub use interpret::{interpret, ConsumerService, CostCheck, DistributionReport, SourceUsage};
pub use planner::Planner;
pub use problem::{RouteLayout, TransportProblem};
pub use validate::{check_feasibility, check_quantities, validate, Balance};
