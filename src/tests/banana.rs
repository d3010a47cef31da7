use crate::{
    Fault, Options, Problem, Range, Solver, SparseVector, SymmetricCoo, TerminationStatus,
};

/// 2-dimensional unconstrained optimization of Rosenbrock's "banana"
/// function:
///
/// ```txt
///     f(x) = 100(x_2 - x_1^2)^2 + (1 - x_1)^2
/// ```
///
/// https://en.wikipedia.org/wiki/Rosenbrock_function
struct UnconstrainedBananaFunction {}

impl Problem for UnconstrainedBananaFunction {
    fn number_variables(&self) -> usize {
        2
    }

    fn number_constraints(&self) -> usize {
        0
    }

    fn variable_bounds(&self) -> Vec<Range> {
        vec![Range::UNBOUNDED; 2]
    }

    fn constraint_bounds(&self) -> Vec<Range> {
        vec![]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
        let a = 100.0;
        Ok(a * (x[1] - x[0].powi(2)).powi(2) + (1.0 - x[0]).powi(2))
    }

    fn constraints(&self, _x: &[f64], _c: &mut [f64]) -> Result<(), Fault> {
        Ok(())
    }

    fn objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) -> Result<(), Fault> {
        let a = 100.0;
        gradient.set(0, 4.0 * a * (x[0].powi(3) - x[0] * x[1]) + 2.0 * x[0] - 2.0);
        gradient.set(1, 2.0 * a * (x[1] - x[0].powi(2)));
        Ok(())
    }

    fn constraint_jacobian(&self, _x: &[f64], _rows: &mut [SparseVector]) -> Result<(), Fault> {
        Ok(())
    }

    fn lagrangian_hessian(
        &self,
        x: &[f64],
        objective_multiplier: f64,
        _constraint_multipliers: &[f64],
        hessian: &mut SymmetricCoo,
    ) -> Result<(), Fault> {
        let a = 100.0;
        hessian.insert(
            objective_multiplier * (12.0 * a * x[0].powi(2) - 4.0 * a * x[1] + 2.0),
            0,
            0,
        );
        hessian.insert(objective_multiplier * (-4.0 * a * x[0]), 1, 0);
        hessian.insert(objective_multiplier * 2.0 * a, 1, 1);
        Ok(())
    }
}

fn solve_with(options: &Options) {
    let problem = UnconstrainedBananaFunction {};
    let mut solver = Solver::from_options(&problem, options).unwrap();
    let outcome = solver.solve(&problem, vec![-1.2, 1.0]).unwrap();

    assert_eq!(outcome.status, TerminationStatus::FeasibleKktPoint);
    assert!(
        (outcome.iterate.x[0] - 1.0).abs() < 1e-6,
        "x[0] = {}",
        outcome.iterate.x[0]
    );
    assert!(
        (outcome.iterate.x[1] - 1.0).abs() < 1e-6,
        "x[1] = {}",
        outcome.iterate.x[1]
    );
    assert!(outcome.objective.abs() <= 1e-10, "f = {:e}", outcome.objective);
}

#[test]
fn unconstrained_banana_filtersqp() {
    solve_with(&Options::preset("filtersqp").unwrap());
}

#[test]
fn unconstrained_banana_interior_point() {
    solve_with(&Options::preset("ipopt").unwrap());
}

#[test]
fn unconstrained_banana_trust_line_search() {
    let mut options = Options::preset("filtersqp").unwrap();
    options.set("mechanism", "TLS");
    solve_with(&options);
}

#[test]
fn unconstrained_banana_l1_merit() {
    solve_with(&Options::preset("byrd").unwrap());
}
