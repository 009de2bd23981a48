//! The constraint graph and solver (§4.3, §4.4).

pub mod graph;
pub mod solver;

pub use graph::{ConflictCheck, ConstraintGraph};
pub use solver::SolveReport;
