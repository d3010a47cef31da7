use float_cmp::assert_approx_eq;

use crate::{
    Fault, Options, Problem, Range, Solver, SparseVector, SymmetricCoo, TerminationStatus,
};

/// Inconsistent toy problem: min x subject to x >= 1 and x <= 0. The
/// solver is expected to certify infeasibility by converging to a
/// stationary point of the constraint violation, which is 1 everywhere
/// between the two bounds.
struct InconsistentBounds {}

impl Problem for InconsistentBounds {
    fn number_variables(&self) -> usize {
        1
    }

    fn number_constraints(&self) -> usize {
        2
    }

    fn variable_bounds(&self) -> Vec<Range> {
        vec![Range::UNBOUNDED]
    }

    fn constraint_bounds(&self) -> Vec<Range> {
        vec![Range::lower_bounded(1.0), Range::upper_bounded(0.0)]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
        Ok(x[0])
    }

    fn constraints(&self, x: &[f64], c: &mut [f64]) -> Result<(), Fault> {
        c[0] = x[0];
        c[1] = x[0];
        Ok(())
    }

    fn objective_gradient(&self, _x: &[f64], gradient: &mut SparseVector) -> Result<(), Fault> {
        gradient.set(0, 1.0);
        Ok(())
    }

    fn constraint_jacobian(&self, _x: &[f64], rows: &mut [SparseVector]) -> Result<(), Fault> {
        rows[0].set(0, 1.0);
        rows[1].set(0, 1.0);
        Ok(())
    }

    fn lagrangian_hessian(
        &self,
        _x: &[f64],
        _objective_multiplier: f64,
        _constraint_multipliers: &[f64],
        _hessian: &mut SymmetricCoo,
    ) -> Result<(), Fault> {
        Ok(())
    }
}

#[test]
fn infeasibility_certified() {
    let problem = InconsistentBounds {};
    let options = Options::preset("filtersqp").unwrap();
    let mut solver = Solver::from_options(&problem, &options).unwrap();
    let outcome = solver.solve(&problem, vec![2.0]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::InfeasibleKktPoint);
    assert_approx_eq!(f64, outcome.infeasibility, 1.0, epsilon = 1e-6);
    // the minimum of the violation lies between the two bounds
    assert!(-1e-6 <= outcome.iterate.x[0] && outcome.iterate.x[0] <= 1.0 + 1e-6);
}
