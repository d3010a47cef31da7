use std::iter::zip;

use float_cmp::assert_approx_eq;

use crate::{
    Fault, Options, Problem, Range, Solver, SparseVector, SymmetricCoo, TerminationStatus,
};

/// Bound-constrained quadratic
///
/// ```txt
///     min 1/2||x||^2 + b'x,  x >= 0,  b = (-1, 2)
/// ```
///
/// with solution x* = (1, 0) and lower-bound duals z_L* = (0, 2).
struct BoundedQuadratic {}

const B: [f64; 2] = [-1.0, 2.0];

impl Problem for BoundedQuadratic {
    fn number_variables(&self) -> usize {
        2
    }

    fn number_constraints(&self) -> usize {
        0
    }

    fn variable_bounds(&self) -> Vec<Range> {
        vec![Range::lower_bounded(0.0); 2]
    }

    fn constraint_bounds(&self) -> Vec<Range> {
        vec![]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
        Ok(0.5 * (x[0] * x[0] + x[1] * x[1]) + B[0] * x[0] + B[1] * x[1])
    }

    fn constraints(&self, _x: &[f64], _c: &mut [f64]) -> Result<(), Fault> {
        Ok(())
    }

    fn objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) -> Result<(), Fault> {
        gradient.set(0, x[0] + B[0]);
        gradient.set(1, x[1] + B[1]);
        Ok(())
    }

    fn constraint_jacobian(&self, _x: &[f64], _rows: &mut [SparseVector]) -> Result<(), Fault> {
        Ok(())
    }

    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        objective_multiplier: f64,
        _constraint_multipliers: &[f64],
        hessian: &mut SymmetricCoo,
    ) -> Result<(), Fault> {
        hessian.insert(objective_multiplier, 0, 0);
        hessian.insert(objective_multiplier, 1, 1);
        Ok(())
    }
}

#[test]
fn active_set_solution_in_few_iterations() {
    let problem = BoundedQuadratic {};
    let options = Options::preset("filtersqp").unwrap();
    let mut solver = Solver::from_options(&problem, &options).unwrap();
    let outcome = solver.solve(&problem, vec![0.0, 0.0]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::FeasibleKktPoint);
    assert!(outcome.major_iterations <= 3, "took {} iterations", outcome.major_iterations);
    zip(&outcome.iterate.x, vec![1.0, 0.0])
        .for_each(|(a, b)| assert_approx_eq!(f64, *a, b, epsilon = 1e-6));
    zip(&outcome.iterate.multipliers.lower_bounds, vec![0.0, 2.0])
        .for_each(|(a, b)| assert_approx_eq!(f64, *a, b, epsilon = 1e-5));

    // the active bound is hit exactly
    assert_eq!(outcome.iterate.x[1], 0.0);
}

#[test]
fn interior_point_agrees() {
    let problem = BoundedQuadratic {};
    let options = Options::preset("ipopt").unwrap();
    let mut solver = Solver::from_options(&problem, &options).unwrap();
    let outcome = solver.solve(&problem, vec![0.5, 0.5]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::FeasibleKktPoint);
    assert_approx_eq!(f64, outcome.iterate.x[0], 1.0, epsilon = 1e-4);
    assert_approx_eq!(f64, outcome.iterate.x[1], 0.0, epsilon = 1e-4);
    assert_approx_eq!(f64, outcome.objective, -0.5, epsilon = 1e-4);
}
