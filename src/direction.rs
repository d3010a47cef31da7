use crate::iterate::Multipliers;

/// Outcome reported by a QP/LP/linear backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubproblemStatus {
    Optimal,
    UnboundedProblem,
    BoundInconsistency,
    Infeasible,
    IncorrectParameter,
    LpInsufficientSpace,
    HessianInsufficientSpace,
    SparseInsufficientSpace,
    MaxRestartsReached,
    Undefined,
}

/// Feasibility of a constraint in the linearized subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSide {
    Feasible,
    InfeasibleLower,
    InfeasibleUpper,
}

/// Partition of the constraints by violation side, produced when the
/// subproblem is infeasible.
#[derive(Debug, Clone)]
pub struct ConstraintPartition {
    pub feasible: Vec<usize>,
    pub infeasible: Vec<usize>,
    pub side: Vec<ConstraintSide>,
}

impl ConstraintPartition {
    pub fn feasible(number_constraints: usize) -> Self {
        Self {
            feasible: (0..number_constraints).collect(),
            infeasible: Vec::new(),
            side: vec![ConstraintSide::Feasible; number_constraints],
        }
    }
}

/// Indices sitting at their lower/upper bound in the subproblem solution.
#[derive(Debug, Clone, Default)]
pub struct ActiveBounds {
    pub at_lower: Vec<usize>,
    pub at_upper: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    pub bounds: ActiveBounds,
    pub constraints: ActiveBounds,
}

/// Primal-dual step produced by a subproblem.
///
/// The multipliers are dual displacements: the backend's estimates minus
/// the current iterate's multipliers, so that adding them at full step
/// recovers the estimates. The globalization mechanism advances
/// `current + alpha*displacement` when it applies a partial step.
#[derive(Debug, Clone)]
pub struct Direction {
    pub x: Vec<f64>,
    pub multipliers: Multipliers,
    pub active_set: ActiveSet,
    pub constraint_partition: Option<ConstraintPartition>,
    pub status: SubproblemStatus,
    /// Infinity norm of the primal step on the original variables.
    pub norm: f64,
    /// Subproblem model objective at the step.
    pub objective: f64,
    /// Objective multiplier the subproblem was built with.
    pub objective_multiplier: f64,
    pub is_relaxed: bool,
}

impl Direction {
    pub fn with_dimensions(number_variables: usize, number_constraints: usize) -> Self {
        Self {
            x: vec![0.0; number_variables],
            multipliers: Multipliers::zeros(number_variables, number_constraints),
            active_set: ActiveSet::default(),
            constraint_partition: None,
            status: SubproblemStatus::Undefined,
            norm: 0.0,
            objective: 0.0,
            objective_multiplier: 1.0,
            is_relaxed: false,
        }
    }
}
