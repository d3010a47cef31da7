//! Models of the Lagrangian Hessian used by the active-set subproblems.

use log::debug;

use crate::error::Fault;
use crate::math::{dot, norm};
use crate::linsol::{DenseLdl, SymmetricIndefiniteSolver};
use crate::scaling::ScaledProblem;
use crate::sparse::SymmetricCoo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianKind {
    Exact,
    Bfgs,
    Sr1,
    Zero,
}

impl HessianKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "exact" => Some(HessianKind::Exact),
            "BFGS" => Some(HessianKind::Bfgs),
            "SR1" => Some(HessianKind::Sr1),
            "zero" => Some(HessianKind::Zero),
            _ => None,
        }
    }
}

/// Exact or quasi-Newton Hessian of the Lagrangian, with inertia-driven
/// convexification so the model handed to the QP backend is positive
/// definite.
pub struct HessianModel {
    kind: HessianKind,
    dimension: usize,
    matrix: SymmetricCoo,
    convexify: bool,
    evaluations: usize,
    /// Dense quasi-Newton approximation (BFGS/SR1 only).
    approximation: Vec<f64>,
    previous: Option<(Vec<f64>, Vec<f64>)>,
}

impl HessianModel {
    const REGULARIZATION_SEED: f64 = 1e-4;
    const REGULARIZATION_LIMIT: f64 = 1e4;

    pub fn new(kind: HessianKind, dimension: usize, capacity: usize, convexify: bool) -> Self {
        let mut approximation = vec![0.0; dimension * dimension];
        if matches!(kind, HessianKind::Bfgs | HessianKind::Sr1) {
            for i in 0..dimension {
                approximation[i * dimension + i] = 1.0;
            }
        }
        Self {
            kind,
            dimension,
            matrix: SymmetricCoo::with_capacity(dimension, capacity, true),
            convexify,
            evaluations: 0,
            approximation,
            previous: None,
        }
    }

    pub fn matrix(&self) -> &SymmetricCoo {
        &self.matrix
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations
    }

    /// Rebuilds the model at `x` for the given multipliers.
    pub fn evaluate(
        &mut self,
        problem: &ScaledProblem,
        x: &[f64],
        objective_multiplier: f64,
        constraint_multipliers: &[f64],
    ) -> Result<(), Fault> {
        self.matrix.reset();
        match self.kind {
            HessianKind::Exact => {
                problem.evaluate_lagrangian_hessian(
                    x,
                    objective_multiplier,
                    constraint_multipliers,
                    &mut self.matrix,
                )?;
                self.evaluations += 1;
            }
            HessianKind::Zero => {}
            HessianKind::Bfgs | HessianKind::Sr1 => {
                let n = self.dimension;
                for i in 0..n {
                    for j in 0..=i {
                        let value = self.approximation[i * n + j];
                        if value != 0.0 {
                            self.matrix.insert(value, i, j);
                        }
                    }
                }
            }
        }
        if self.matrix.iter().any(|(_, _, v)| v.is_nan()) {
            return Err(Fault::evaluation("Lagrangian Hessian", "NaN value"));
        }
        if self.convexify {
            self.regularize()?;
        }
        Ok(())
    }

    /// Inertia correction `H <- H + delta*I` with doubling `delta` until the
    /// matrix is positive definite.
    fn regularize(&mut self) -> Result<(), Fault> {
        let mut solver = DenseLdl::new(self.dimension);
        self.matrix.set_regularization(|_| 0.0);
        solver.factorize(&self.matrix)?;
        if solver.inertia() == (self.dimension, 0, 0) {
            return Ok(());
        }
        let mut delta = Self::REGULARIZATION_SEED;
        loop {
            self.matrix.set_regularization(|_| delta);
            solver.factorize(&self.matrix)?;
            if solver.inertia() == (self.dimension, 0, 0) {
                debug!("Hessian regularized with delta = {:e}", delta);
                return Ok(());
            }
            delta *= 2.0;
            if delta > Self::REGULARIZATION_LIMIT {
                return Err(Fault::Inertia {
                    limit: Self::REGULARIZATION_LIMIT,
                });
            }
        }
    }

    /// Feeds an accepted iterate to the quasi-Newton update.
    pub fn register_accepted(&mut self, x: &[f64], lagrangian_gradient: &[f64]) {
        if !matches!(self.kind, HessianKind::Bfgs | HessianKind::Sr1) {
            return;
        }
        let n = self.dimension;
        if let Some((previous_x, previous_gradient)) = &self.previous {
            let s: Vec<f64> = x.iter().zip(previous_x).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = lagrangian_gradient
                .iter()
                .zip(previous_gradient)
                .map(|(a, b)| a - b)
                .collect();
            match self.kind {
                HessianKind::Bfgs => {
                    let ys = dot(&y, &s);
                    if ys > 1e-10 * norm(&y) * norm(&s) {
                        let mut bs = vec![0.0; n];
                        for i in 0..n {
                            bs[i] = dot(&self.approximation[i * n..(i + 1) * n], &s);
                        }
                        let sbs = dot(&s, &bs);
                        if sbs > 0.0 {
                            for i in 0..n {
                                for j in 0..n {
                                    self.approximation[i * n + j] +=
                                        y[i] * y[j] / ys - bs[i] * bs[j] / sbs;
                                }
                            }
                        }
                    }
                }
                HessianKind::Sr1 => {
                    let mut r = y.clone();
                    for i in 0..n {
                        r[i] -= dot(&self.approximation[i * n..(i + 1) * n], &s);
                    }
                    let rs = dot(&r, &s);
                    if rs.abs() > 1e-8 * norm(&r) * norm(&s) {
                        for i in 0..n {
                            for j in 0..n {
                                self.approximation[i * n + j] += r[i] * r[j] / rs;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        self.previous = Some((x.to_vec(), lagrangian_gradient.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indefinite_matrix_convexified() {
        struct Saddle;
        impl crate::problem::Problem for Saddle {
            fn number_variables(&self) -> usize {
                2
            }
            fn number_constraints(&self) -> usize {
                0
            }
            fn variable_bounds(&self) -> Vec<crate::problem::Range> {
                vec![crate::problem::Range::UNBOUNDED; 2]
            }
            fn constraint_bounds(&self) -> Vec<crate::problem::Range> {
                vec![]
            }
            fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
                Ok(x[0] * x[0] - x[1] * x[1])
            }
            fn constraints(&self, _x: &[f64], _c: &mut [f64]) -> Result<(), Fault> {
                Ok(())
            }
            fn objective_gradient(
                &self,
                x: &[f64],
                g: &mut crate::sparse::SparseVector,
            ) -> Result<(), Fault> {
                g.set(0, 2.0 * x[0]);
                g.set(1, -2.0 * x[1]);
                Ok(())
            }
            fn constraint_jacobian(
                &self,
                _x: &[f64],
                _rows: &mut [crate::sparse::SparseVector],
            ) -> Result<(), Fault> {
                Ok(())
            }
            fn lagrangian_hessian(
                &self,
                _x: &[f64],
                objective_multiplier: f64,
                _constraint_multipliers: &[f64],
                hessian: &mut SymmetricCoo,
            ) -> Result<(), Fault> {
                hessian.insert(2.0 * objective_multiplier, 0, 0);
                hessian.insert(-2.0 * objective_multiplier, 1, 1);
                Ok(())
            }
        }

        let saddle = Saddle;
        let problem = ScaledProblem::new(&saddle, &[0.0, 0.0]).unwrap();
        let mut model = HessianModel::new(HessianKind::Exact, 2, 4, true);
        model.evaluate(&problem, &[0.0, 0.0], 1.0, &[]).unwrap();

        let mut solver = DenseLdl::new(2);
        solver.factorize(model.matrix()).unwrap();
        assert_eq!(solver.inertia(), (2, 0, 0));
    }

    #[test]
    fn bfgs_update_captures_curvature() {
        let mut model = HessianModel::new(HessianKind::Bfgs, 1, 1, false);
        // f(x) = 2x^2: gradient 4x, curvature 4
        model.register_accepted(&[0.0], &[0.0]);
        model.register_accepted(&[1.0], &[4.0]);
        assert!((model.approximation[0] - 4.0).abs() < 1e-12);
    }
}
