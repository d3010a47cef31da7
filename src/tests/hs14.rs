use float_cmp::assert_approx_eq;

use crate::{
    Fault, Options, Problem, Range, Solver, SparseVector, SymmetricCoo, TerminationStatus,
};

/// Hock & Schittkowski test problem #14:
///
/// ```txt
///     min (x1 - 2)^2 + (x2 - 1)^2
///     s.t. x1 - 2*x2 + 1 = 0
///          -x1^2/4 - x2^2 + 1 >= 0
/// ```
struct HockSchittkowski14 {}

impl Problem for HockSchittkowski14 {
    fn number_variables(&self) -> usize {
        2
    }

    fn number_constraints(&self) -> usize {
        2
    }

    fn variable_bounds(&self) -> Vec<Range> {
        vec![Range::UNBOUNDED; 2]
    }

    fn constraint_bounds(&self) -> Vec<Range> {
        vec![Range::equality(0.0), Range::lower_bounded(0.0)]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
        Ok((x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2))
    }

    fn constraints(&self, x: &[f64], c: &mut [f64]) -> Result<(), Fault> {
        c[0] = x[0] - 2.0 * x[1] + 1.0;
        c[1] = -x[0].powi(2) / 4.0 - x[1].powi(2) + 1.0;
        Ok(())
    }

    fn objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) -> Result<(), Fault> {
        gradient.set(0, 2.0 * (x[0] - 2.0));
        gradient.set(1, 2.0 * (x[1] - 1.0));
        Ok(())
    }

    fn constraint_jacobian(&self, x: &[f64], rows: &mut [SparseVector]) -> Result<(), Fault> {
        rows[0].set(0, 1.0);
        rows[0].set(1, -2.0);
        rows[1].set(0, -x[0] / 2.0);
        rows[1].set(1, -2.0 * x[1]);
        Ok(())
    }

    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        objective_multiplier: f64,
        constraint_multipliers: &[f64],
        hessian: &mut SymmetricCoo,
    ) -> Result<(), Fault> {
        let lambda2 = constraint_multipliers[1];
        hessian.insert(2.0 * objective_multiplier + lambda2 / 2.0, 0, 0);
        hessian.insert(2.0 * objective_multiplier + 2.0 * lambda2, 1, 1);
        Ok(())
    }
}

#[test]
fn filter_preset() {
    let problem = HockSchittkowski14 {};
    let options = Options::preset("filtersqp").unwrap();
    let mut solver = Solver::from_options(&problem, &options).unwrap();
    let outcome = solver.solve(&problem, vec![2.0, 2.0]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::FeasibleKktPoint);
    assert_approx_eq!(f64, outcome.objective, 1.3934650, epsilon = 1e-5);
    assert!(outcome.infeasibility <= 1e-6);
}

#[test]
fn byrd_preset() {
    let problem = HockSchittkowski14 {};
    let options = Options::preset("byrd").unwrap();
    let mut solver = Solver::from_options(&problem, &options).unwrap();
    let outcome = solver.solve(&problem, vec![2.0, 2.0]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::FeasibleKktPoint);
    assert_approx_eq!(f64, outcome.objective, 1.3934650, epsilon = 1e-5);

    // the penalty parameter never increases and stays positive here
    let penalty = outcome.penalty_parameter.unwrap();
    assert!(0.0 < penalty && penalty <= 1.0, "penalty = {penalty:e}");
}
