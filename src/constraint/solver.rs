//! Simplified constraint solver (§4.4).
//!
//! Evaluates rather than solves: entity positions are never moved here.
//! Each constraint's `satisfaction_status` is refreshed from its current
//! residual and an aggregate report is returned. A full Newton solver
//! could replace this later provided it only mutates entities through
//! the store's update path, so the journal stays authoritative.

use crate::store::{Constraint, SatisfactionStatus};

use super::graph::ConstraintGraph;

/// Outcome of evaluating every constraint in a graph.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveReport {
    pub converged: bool,
    pub iterations: u32,
    pub total_residual: f64,
    pub updated: Vec<Constraint>,
}

/// Evaluate every constraint's satisfaction status against `graph` and
/// report aggregate convergence.
///
/// `tolerance` gates the aggregate `converged` flag; each constraint is
/// still judged against its own per-constraint tolerance.
#[must_use]
pub fn evaluate(
    graph: &ConstraintGraph,
    constraints: &[Constraint],
    tolerance: f64,
) -> SolveReport {
    let mut updated = Vec::with_capacity(constraints.len());
    let mut sum_sq = 0.0;

    for constraint in constraints {
        let residual = graph.residual(constraint).unwrap_or(f64::INFINITY);
        sum_sq += residual * residual;
        let mut next = constraint.clone();
        next.satisfaction_status = if residual < constraint.tolerance {
            SatisfactionStatus::Satisfied
        } else {
            SatisfactionStatus::Violated
        };
        updated.push(next);
    }

    let total_residual = sum_sq.sqrt();
    SolveReport {
        converged: total_residual < tolerance,
        // This evaluator is single-pass by construction (§4.4 permits a
        // simplified evaluator); a future Newton solver would report its
        // actual iteration count here.
        iterations: 1,
        total_residual,
        updated,
    }
}
