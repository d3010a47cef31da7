use std::iter::zip;

use float_cmp::assert_approx_eq;
use full::Arr;

use crate::{
    Fault, Options, Problem, Range, Solver, SparseVector, SymmetricCoo, TerminationStatus,
};

/// Hock & Schittkowski test problem #71:
///
/// ```txt
///     min x1*x4*(x1 + x2 + x3) + x3
///     s.t. x1*x2*x3*x4 >= 25
///          x1^2 + x2^2 + x3^2 + x4^2 = 40
///          1 <= x <= 5
/// ```
struct HockSchittkowski71 {}

impl Problem for HockSchittkowski71 {
    fn number_variables(&self) -> usize {
        4
    }

    fn number_constraints(&self) -> usize {
        2
    }

    fn variable_bounds(&self) -> Vec<Range> {
        vec![Range::new(1.0, 5.0); 4]
    }

    fn constraint_bounds(&self) -> Vec<Range> {
        vec![Range::lower_bounded(25.0), Range::equality(40.0)]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
        Ok(x[0] * x[3] * x[..3].iter().sum::<f64>() + x[2])
    }

    fn constraints(&self, x: &[f64], c: &mut [f64]) -> Result<(), Fault> {
        let x = Arr::with_vec(x.to_vec());
        c[0] = x.prod();
        c[1] = x.pow(2).sum();
        Ok(())
    }

    fn objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) -> Result<(), Fault> {
        gradient.set(0, x[0] * x[3] + x[3] * x[..3].iter().sum::<f64>());
        gradient.set(1, x[0] * x[3]);
        gradient.set(2, x[0] * x[3] + 1.0);
        gradient.set(3, x[0] * x[..3].iter().sum::<f64>());
        Ok(())
    }

    fn constraint_jacobian(&self, x: &[f64], rows: &mut [SparseVector]) -> Result<(), Fault> {
        let x = Arr::with_vec(x.to_vec());
        let prod = x.prod();
        for (i, &xi) in x.vec().iter().enumerate() {
            rows[0].set(i, prod / xi);
            rows[1].set(i, 2.0 * xi);
        }
        Ok(())
    }

    fn lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        constraint_multipliers: &[f64],
        hessian: &mut SymmetricCoo,
    ) -> Result<(), Fault> {
        let sigma = objective_multiplier;
        let (lambda1, lambda2) = (constraint_multipliers[0], constraint_multipliers[1]);

        // sigma * D2f
        hessian.insert(sigma * 2.0 * x[3], 0, 0);
        hessian.insert(sigma * x[3] - lambda1 * x[2] * x[3], 1, 0);
        hessian.insert(sigma * x[3] - lambda1 * x[1] * x[3], 2, 0);
        hessian.insert(
            sigma * (2.0 * x[0] + x[1] + x[2]) - lambda1 * x[1] * x[2],
            3,
            0,
        );
        hessian.insert(-lambda1 * x[0] * x[3], 2, 1);
        hessian.insert(sigma * x[0] - lambda1 * x[0] * x[2], 3, 1);
        hessian.insert(sigma * x[0] - lambda1 * x[0] * x[1], 3, 2);
        // -lambda2 * D2c2 = -2*lambda2*I
        for i in 0..4 {
            hessian.insert(-2.0 * lambda2, i, i);
        }
        Ok(())
    }
}

#[test]
fn constrained_4d_nonlinear() {
    let problem = HockSchittkowski71 {};
    let options = Options::preset("filtersqp").unwrap();
    let mut solver = Solver::from_options(&problem, &options).unwrap();
    let outcome = solver.solve(&problem, vec![1.0, 5.0, 5.0, 1.0]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::FeasibleKktPoint);
    assert_approx_eq!(f64, outcome.objective, 17.0140173, epsilon = 1e-5);
    assert!(outcome.infeasibility <= 1e-6);
    assert!(zip(
        &outcome.iterate.x,
        vec![1.0, 4.7429994, 3.8211503, 1.3794082]
    )
    .all(|(a, b)| (a - b).abs() < 1e-5));
}
