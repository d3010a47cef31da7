use itertools::izip;

use crate::error::Fault;
use crate::math::{norm_1, NormKind};
use crate::scaling::ScaledProblem;
use crate::sparse::SparseVector;

/// Lagrange multipliers and dual variables attached to an iterate.
#[derive(Debug, Clone)]
pub struct Multipliers {
    /// Multipliers on the general constraints (length q).
    pub constraints: Vec<f64>,
    /// Multipliers on the variable lower bounds (nonnegative).
    pub lower_bounds: Vec<f64>,
    /// Multipliers on the variable upper bounds (nonpositive).
    pub upper_bounds: Vec<f64>,
    /// Objective multiplier in [0, 1]; 0 in feasibility restoration.
    pub objective: f64,
}

impl Multipliers {
    pub fn zeros(number_variables: usize, number_constraints: usize) -> Self {
        Self {
            constraints: vec![0.0; number_constraints],
            lower_bounds: vec![0.0; number_variables],
            upper_bounds: vec![0.0; number_variables],
            objective: 1.0,
        }
    }

    /// Fritz-John test: some multiplier is significantly nonzero.
    pub fn not_all_zero(&self, number_variables: usize, tolerance: f64) -> bool {
        for &multiplier in &self.constraints {
            if tolerance < multiplier.abs() {
                return true;
            }
        }
        for i in 0..number_variables {
            if tolerance < (self.lower_bounds[i] + self.upper_bounds[i]).abs() {
                return true;
            }
        }
        false
    }

    pub fn norm_1(&self) -> f64 {
        norm_1(&self.constraints) + norm_1(&self.lower_bounds) + norm_1(&self.upper_bounds)
    }
}

/// First-order residuals of an accepted iterate, in the scaled space.
#[derive(Debug, Clone)]
pub struct Residuals {
    pub infeasibility: f64,
    pub optimality_stationarity: f64,
    pub feasibility_stationarity: f64,
    pub optimality_complementarity: f64,
    pub feasibility_complementarity: f64,
    /// Dual-magnitude scalings dividing the residuals in the termination test.
    pub stationarity_scaling: f64,
    pub complementarity_scaling: f64,
}

impl Default for Residuals {
    fn default() -> Self {
        Self {
            infeasibility: f64::INFINITY,
            optimality_stationarity: f64::INFINITY,
            feasibility_stationarity: f64::INFINITY,
            optimality_complementarity: f64::INFINITY,
            feasibility_complementarity: f64::INFINITY,
            stationarity_scaling: 1.0,
            complementarity_scaling: 1.0,
        }
    }
}

/// Pair of measures consumed by the globalization strategies.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub infeasibility: f64,
    pub objective: f64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            infeasibility: f64::INFINITY,
            objective: f64::INFINITY,
        }
    }
}

/// Primal-dual point with lazily memoized evaluations.
///
/// A cached quantity is recomputed only when absent; replacing the primal
/// point invalidates every cache. Residuals are recomputed when an iterate
/// is accepted, never during tentative trials.
pub struct Iterate {
    pub x: Vec<f64>,
    pub multipliers: Multipliers,
    objective: Option<f64>,
    constraints: Option<Vec<f64>>,
    objective_gradient: Option<SparseVector>,
    constraint_jacobian: Option<Vec<SparseVector>>,
    pub lagrangian_gradient: Vec<f64>,
    pub residuals: Residuals,
    pub progress: Progress,
}

impl Iterate {
    pub fn new(x: Vec<f64>, multipliers: Multipliers) -> Self {
        let n = x.len();
        Self {
            x,
            multipliers,
            objective: None,
            constraints: None,
            objective_gradient: None,
            constraint_jacobian: None,
            lagrangian_gradient: vec![0.0; n],
            residuals: Residuals::default(),
            progress: Progress::default(),
        }
    }

    /// Replaces the primal point, invalidating every cached evaluation.
    pub fn set_primal(&mut self, x: Vec<f64>) {
        self.x = x;
        self.objective = None;
        self.constraints = None;
        self.objective_gradient = None;
        self.constraint_jacobian = None;
    }

    pub fn is_objective_computed(&self) -> bool {
        self.objective.is_some()
    }

    /// Cached constraint values, without triggering an evaluation.
    pub fn cached_constraints(&self) -> Option<&[f64]> {
        self.constraints.as_deref()
    }

    pub fn evaluate_objective(&mut self, problem: &ScaledProblem) -> Result<f64, Fault> {
        if let Some(objective) = self.objective {
            return Ok(objective);
        }
        let objective = problem.evaluate_objective(&self.x)?;
        self.objective = Some(objective);
        Ok(objective)
    }

    pub fn evaluate_constraints(&mut self, problem: &ScaledProblem) -> Result<&[f64], Fault> {
        if self.constraints.is_none() {
            let mut c = vec![0.0; problem.number_constraints()];
            problem.evaluate_constraints(&self.x, &mut c)?;
            self.constraints = Some(c);
        }
        Ok(self.constraints.as_deref().unwrap_or(&[]))
    }

    pub fn evaluate_objective_gradient(
        &mut self,
        problem: &ScaledProblem,
    ) -> Result<&SparseVector, Fault> {
        if self.objective_gradient.is_none() {
            let mut gradient = SparseVector::with_capacity(problem.number_variables());
            problem.evaluate_objective_gradient(&self.x, &mut gradient)?;
            self.objective_gradient = Some(gradient);
        }
        Ok(self.objective_gradient.as_ref().unwrap())
    }

    pub fn evaluate_constraint_jacobian(
        &mut self,
        problem: &ScaledProblem,
    ) -> Result<&[SparseVector], Fault> {
        if self.constraint_jacobian.is_none() {
            let mut rows = vec![SparseVector::new(); problem.number_constraints()];
            problem.evaluate_constraint_jacobian(&self.x, &mut rows)?;
            self.constraint_jacobian = Some(rows);
        }
        Ok(self.constraint_jacobian.as_deref().unwrap())
    }

    /// Fills `self.lagrangian_gradient` with
    /// `sigma*Df - sum_j lambda_j*Dc_j - (z_L + z_U)`, restricted to the
    /// first n coordinates. The multipliers are supplied by the caller so a
    /// direction's duals can be probed without touching the iterate's own.
    pub fn evaluate_lagrangian_gradient(
        &mut self,
        problem: &ScaledProblem,
        objective_multiplier: f64,
        constraint_multipliers: &[f64],
        lower_bound_multipliers: &[f64],
        upper_bound_multipliers: &[f64],
    ) -> Result<(), Fault> {
        let n = problem.number_variables();
        self.lagrangian_gradient.iter_mut().for_each(|g| *g = 0.0);

        if objective_multiplier != 0.0 {
            self.evaluate_objective_gradient(problem)?;
            if let Some(gradient) = &self.objective_gradient {
                for (i, derivative) in gradient.iter() {
                    if i < n {
                        self.lagrangian_gradient[i] += objective_multiplier * derivative;
                    }
                }
            }
        }
        for i in 0..n {
            self.lagrangian_gradient[i] -= lower_bound_multipliers[i] + upper_bound_multipliers[i];
        }
        self.evaluate_constraint_jacobian(problem)?;
        if let Some(jacobian) = &self.constraint_jacobian {
            for (j, row) in jacobian.iter().enumerate() {
                let multiplier_j = constraint_multipliers[j];
                if multiplier_j != 0.0 {
                    for (i, derivative) in row.iter() {
                        if i < n {
                            self.lagrangian_gradient[i] -= multiplier_j * derivative;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Recomputes the residual block for this iterate, given the objective
    /// multiplier that produced it.
    pub fn compute_residuals(
        &mut self,
        problem: &ScaledProblem,
        objective_multiplier: f64,
        norm: NormKind,
    ) -> Result<(), Fault> {
        let n = problem.number_variables();
        let q = problem.number_constraints();

        self.evaluate_constraints(problem)?;
        let c = self.constraints.clone().unwrap_or_default();
        self.residuals.infeasibility = problem.constraint_violation(&c, norm);

        let multipliers = self.multipliers.clone();
        // stationarity, with the optimality multiplier (1 if in restoration)
        let sigma = if 0.0 < objective_multiplier {
            objective_multiplier
        } else {
            1.0
        };
        self.evaluate_lagrangian_gradient(
            problem,
            sigma,
            &multipliers.constraints,
            &multipliers.lower_bounds,
            &multipliers.upper_bounds,
        )?;
        self.residuals.optimality_stationarity = norm.of(&self.lagrangian_gradient);

        // stationarity of the feasibility problem (zero objective multiplier)
        self.evaluate_lagrangian_gradient(
            problem,
            0.0,
            &multipliers.constraints,
            &multipliers.lower_bounds,
            &multipliers.upper_bounds,
        )?;
        self.residuals.feasibility_stationarity = norm.of(&self.lagrangian_gradient);

        self.residuals.optimality_complementarity =
            complementarity_error(problem, &self.x, &c, &multipliers, false);
        self.residuals.feasibility_complementarity =
            complementarity_error(problem, &self.x, &c, &multipliers, true);

        // IPOPT-style dual scalings: large multipliers relax the test
        let s_max = 100.0;
        let dual_norm = multipliers.norm_1();
        let bound_norm = norm_1(&multipliers.lower_bounds) + norm_1(&multipliers.upper_bounds);
        self.residuals.stationarity_scaling =
            f64::max(s_max, dual_norm / (q + 2 * n).max(1) as f64) / s_max;
        self.residuals.complementarity_scaling =
            f64::max(s_max, bound_norm / (2 * n).max(1) as f64) / s_max;
        Ok(())
    }
}

/// Complementary slackness error. The feasibility flavor uses the
/// restoration convention where violated constraints carry multipliers
/// +1 (lower side) or -1 (upper side) at a stationary point.
pub(crate) fn complementarity_error(
    problem: &ScaledProblem,
    x: &[f64],
    c: &[f64],
    multipliers: &Multipliers,
    feasibility: bool,
) -> f64 {
    let mut error = 0.0;
    for (i, range) in problem.variable_bounds().iter().enumerate() {
        if range.lower.is_finite() {
            error += (multipliers.lower_bounds[i] * (x[i] - range.lower)).abs();
        }
        if range.upper.is_finite() {
            error += (multipliers.upper_bounds[i] * (x[i] - range.upper)).abs();
        }
    }
    for (&cj, range, &multiplier_j) in izip!(c, problem.constraint_bounds(), &multipliers.constraints)
    {
        if cj < range.lower {
            let gap = range.lower - cj;
            if feasibility {
                error += ((1.0 - multiplier_j) * gap).abs();
            } else {
                error += (multiplier_j * gap).abs();
            }
        } else if range.upper < cj {
            let gap = cj - range.upper;
            if feasibility {
                error += ((1.0 + multiplier_j) * gap).abs();
            } else {
                error += (multiplier_j * gap).abs();
            }
        } else if range.lower.is_finite() && 0.0 < multiplier_j {
            error += (multiplier_j * (cj - range.lower)).abs();
        } else if range.upper.is_finite() && multiplier_j < 0.0 {
            error += (multiplier_j * (cj - range.upper)).abs();
        }
    }
    error
}
