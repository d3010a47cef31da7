use std::cell::Cell;

use log::debug;

use crate::error::Fault;
use crate::math::NormKind;
use crate::problem::{self, Problem, Range};
use crate::sparse::{SparseVector, SymmetricCoo};

/// Multiplicative scalings for the objective and each constraint, chosen
/// once from the gradient magnitudes at the initial point and then frozen.
#[derive(Debug, Clone)]
pub struct Scaling {
    objective: f64,
    constraints: Vec<f64>,
}

impl Scaling {
    const THRESHOLD: f64 = 100.0;

    pub fn uniform(number_constraints: usize) -> Self {
        Self {
            objective: 1.0,
            constraints: vec![1.0; number_constraints],
        }
    }

    /// `g = threshold / max(threshold, ||gradient||_inf)`, so the scaled
    /// gradients are O(1) and a zero gradient is preserved exactly.
    pub fn from_initial_gradients(
        objective_gradient: &SparseVector,
        constraint_jacobian: &[SparseVector],
    ) -> Self {
        let scale = |norm: f64| Self::THRESHOLD / f64::max(Self::THRESHOLD, norm);
        let scaling = Self {
            objective: scale(objective_gradient.norm_inf()),
            constraints: constraint_jacobian
                .iter()
                .map(|row| scale(row.norm_inf()))
                .collect(),
        };
        debug!("objective scaling: {:e}", scaling.objective);
        scaling
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn constraint(&self, j: usize) -> f64 {
        self.constraints[j]
    }
}

/// Process-wide evaluation counters (increment-only).
#[derive(Debug, Default)]
pub struct Evaluations {
    pub objective: Cell<usize>,
    pub constraints: Cell<usize>,
    pub jacobian: Cell<usize>,
    pub hessian: Cell<usize>,
}

/// View of a [`Problem`] with the scalings applied to every evaluation
/// before any strategy sees it, and with the evaluation counters attached.
///
/// The constraint bounds are scaled along with the constraints so that
/// feasibility is preserved by the scaling.
pub struct ScaledProblem<'a> {
    inner: &'a dyn Problem,
    scaling: Scaling,
    pub evaluations: Evaluations,
    variable_bounds: Vec<Range>,
    constraint_bounds: Vec<Range>,
}

impl<'a> ScaledProblem<'a> {
    /// Computes the scalings from the gradients at `x0` and freezes them.
    pub fn new(inner: &'a dyn Problem, x0: &[f64]) -> Result<Self, Fault> {
        let n = inner.number_variables();
        let q = inner.number_constraints();
        let mut objective_gradient = SparseVector::with_capacity(n);
        inner.objective_gradient(x0, &mut objective_gradient)?;
        let mut jacobian = vec![SparseVector::new(); q];
        inner.constraint_jacobian(x0, &mut jacobian)?;
        let scaling = Scaling::from_initial_gradients(&objective_gradient, &jacobian);

        let constraint_bounds = inner
            .constraint_bounds()
            .iter()
            .enumerate()
            .map(|(j, range)| {
                Range::new(
                    range.lower * scaling.constraint(j),
                    range.upper * scaling.constraint(j),
                )
            })
            .collect();

        let scaled = Self {
            inner,
            scaling,
            evaluations: Evaluations::default(),
            variable_bounds: inner.variable_bounds(),
            constraint_bounds,
        };
        scaled.evaluations.jacobian.set(1);
        Ok(scaled)
    }

    /// View with unit scalings; used where only the problem metadata is
    /// needed (factory sizing).
    pub fn with_uniform_scaling(inner: &'a dyn Problem) -> Self {
        Self {
            scaling: Scaling::uniform(inner.number_constraints()),
            evaluations: Evaluations::default(),
            variable_bounds: inner.variable_bounds(),
            constraint_bounds: inner.constraint_bounds(),
            inner,
        }
    }

    pub fn number_variables(&self) -> usize {
        self.inner.number_variables()
    }

    pub fn number_constraints(&self) -> usize {
        self.inner.number_constraints()
    }

    pub fn objective_sign(&self) -> f64 {
        self.inner.objective_sign()
    }

    pub fn hessian_nonzero_capacity(&self) -> usize {
        self.inner.hessian_nonzero_capacity()
    }

    pub fn variable_bounds(&self) -> &[Range] {
        &self.variable_bounds
    }

    /// Constraint bounds in the scaled space.
    pub fn constraint_bounds(&self) -> &[Range] {
        &self.constraint_bounds
    }

    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    pub fn evaluate_objective(&self, x: &[f64]) -> Result<f64, Fault> {
        self.evaluations.objective.set(self.evaluations.objective.get() + 1);
        let objective = self.inner.objective(x)? * self.scaling.objective();
        if objective.is_nan() {
            return Err(Fault::evaluation("objective", "NaN value"));
        }
        Ok(objective)
    }

    pub fn evaluate_constraints(&self, x: &[f64], c: &mut [f64]) -> Result<(), Fault> {
        self.evaluations.constraints.set(self.evaluations.constraints.get() + 1);
        self.inner.constraints(x, c)?;
        for (j, cj) in c.iter_mut().enumerate() {
            *cj *= self.scaling.constraint(j);
            if cj.is_nan() {
                return Err(Fault::evaluation("constraints", format!("NaN in c[{j}]")));
            }
        }
        Ok(())
    }

    pub fn evaluate_objective_gradient(
        &self,
        x: &[f64],
        gradient: &mut SparseVector,
    ) -> Result<(), Fault> {
        gradient.clear();
        self.inner.objective_gradient(x, gradient)?;
        gradient.scale(self.scaling.objective());
        if gradient.iter().any(|(_, v)| v.is_nan()) {
            return Err(Fault::evaluation("objective gradient", "NaN value"));
        }
        Ok(())
    }

    pub fn evaluate_constraint_jacobian(
        &self,
        x: &[f64],
        rows: &mut [SparseVector],
    ) -> Result<(), Fault> {
        self.evaluations.jacobian.set(self.evaluations.jacobian.get() + 1);
        for row in rows.iter_mut() {
            row.clear();
        }
        self.inner.constraint_jacobian(x, rows)?;
        for (j, row) in rows.iter_mut().enumerate() {
            row.scale(self.scaling.constraint(j));
            if row.iter().any(|(_, v)| v.is_nan()) {
                return Err(Fault::evaluation(
                    "constraint Jacobian",
                    format!("NaN in row {j}"),
                ));
            }
        }
        Ok(())
    }

    /// Hessian of the scaled Lagrangian: the objective multiplier and the
    /// constraint multipliers absorb the respective scalings.
    pub fn evaluate_lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        constraint_multipliers: &[f64],
        hessian: &mut SymmetricCoo,
    ) -> Result<(), Fault> {
        self.evaluations.hessian.set(self.evaluations.hessian.get() + 1);
        let scaled_objective_multiplier = objective_multiplier * self.scaling.objective();
        let scaled_multipliers: Vec<f64> = constraint_multipliers
            .iter()
            .enumerate()
            .map(|(j, &m)| m * self.scaling.constraint(j))
            .collect();
        self.inner
            .lagrangian_hessian(x, scaled_objective_multiplier, &scaled_multipliers, hessian)?;
        Ok(())
    }

    /// Violation of scaled constraint values against the scaled bounds.
    pub fn constraint_violation(&self, c: &[f64], norm: NormKind) -> f64 {
        problem::constraint_violation(c, &self.constraint_bounds, norm)
    }

    pub fn subset_violation(&self, c: &[f64], subset: &[usize]) -> f64 {
        problem::subset_violation(c, &self.constraint_bounds, subset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_preserves_zero() {
        let gradient = SparseVector::new();
        let scaling = Scaling::from_initial_gradients(&gradient, &[]);
        assert_eq!(scaling.objective(), 1.0);
    }

    #[test]
    fn large_gradients_scaled_to_threshold() {
        let mut gradient = SparseVector::new();
        gradient.set(0, 1e6);
        let mut row = SparseVector::new();
        row.set(1, -4e2);
        let scaling = Scaling::from_initial_gradients(&gradient, &[row]);
        assert_eq!(scaling.objective(), 1e-4);
        assert_eq!(scaling.constraint(0), 0.25);
    }

    #[test]
    fn moderate_gradients_unscaled() {
        let mut gradient = SparseVector::new();
        gradient.set(0, 5.0);
        let scaling = Scaling::from_initial_gradients(&gradient, &[]);
        assert_eq!(scaling.objective(), 1.0);
    }
}
