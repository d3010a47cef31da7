//! This crate solves non-linear programming problems (NLPs) of the form
//!
//! ```txt
//!       min f(x)
//!        x
//! ```
//!
//! subject to
//!
//! ```txt
//!       cl <= c(x) <= cu    (general constraints)
//!       xl <= x <= xu       (variable bounds)
//! ```
//!
//! where `f` and `c` are twice continuously differentiable and possibly
//! nonconvex. Rather than a single algorithm, it is a solver framework:
//! three pluggable ingredients are composed around a central
//! iterate-refinement loop,
//!
//! * a *globalization mechanism* (line search, trust region, or their
//!   hybrid) that controls the step length or trust-region radius,
//! * a *constraint relaxation strategy* (two-phase feasibility
//!   restoration, or l1 relaxation with Byrd's penalty steering) that
//!   keeps the subproblems well posed,
//! * a *subproblem* (QP, LP, or primal-dual interior point) that produces
//!   a candidate direction from a local model,
//!
//! together with a filter or l1-merit acceptance test. The combination is
//! selected at runtime from a flat option map; the `ipopt`, `filtersqp`
//! and `byrd` presets reproduce well-known solvers.

mod direction;
mod driver;
mod error;
mod filter;
mod hessian;
mod iterate;
mod linsol;
mod math;
mod mechanism;
mod options;
mod problem;
mod qpsolve;
mod relaxation;
mod scaling;
mod sparse;
mod statistics;
mod strategy;
mod subproblem;
#[cfg(test)]
mod tests;

pub use direction::{
    ActiveBounds, ActiveSet, ConstraintPartition, ConstraintSide, Direction, SubproblemStatus,
};
pub use driver::{EvaluationCounts, Outcome, Solver, TerminationStatus};
pub use error::Fault;
pub use filter::Filter;
pub use hessian::{HessianKind, HessianModel};
pub use iterate::{Iterate, Multipliers, Progress, Residuals};
pub use linsol::{DenseLdl, SymmetricIndefiniteSolver};
pub use math::{dot, norm, norm_1, norm_inf, NormKind};
pub use mechanism::{GlobalizationMechanism, LineSearch, TrustLineSearch, TrustRegion};
pub use options::Options;
pub use problem::{constraint_violation, subset_violation, Problem, Range};
pub use qpsolve::{InteriorPointQp, LpSolver, QpSolver};
pub use relaxation::{ConstraintRelaxation, FeasibilityRestoration, L1Relaxation, Phase};
pub use scaling::{Evaluations, ScaledProblem, Scaling};
pub use sparse::{SparseVector, SymmetricCoo};
pub use statistics::Statistics;
pub use strategy::{FilterStrategy, GlobalizationStrategy, MeritStrategy};
pub use subproblem::{
    LocalModel, LpSubproblem, PredictedReduction, PrimalDualSubproblem, QpSubproblem, Subproblem,
};
