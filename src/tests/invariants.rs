use crate::iterate::{Iterate, Multipliers};
use crate::scaling::ScaledProblem;
use crate::{
    Fault, NormKind, Options, Problem, Range, Solver, SparseVector, SymmetricCoo,
    TerminationStatus,
};

/// min x1^2 + x2^2 subject to x1 + x2 = 1; used to probe the evaluation
/// caches and the termination classifier.
struct Probe {}

impl Problem for Probe {
    fn number_variables(&self) -> usize {
        2
    }

    fn number_constraints(&self) -> usize {
        1
    }

    fn variable_bounds(&self) -> Vec<Range> {
        vec![Range::UNBOUNDED; 2]
    }

    fn constraint_bounds(&self) -> Vec<Range> {
        vec![Range::equality(1.0)]
    }

    fn objective(&self, x: &[f64]) -> Result<f64, Fault> {
        Ok(x[0] * x[0] + x[1] * x[1])
    }

    fn constraints(&self, x: &[f64], c: &mut [f64]) -> Result<(), Fault> {
        c[0] = x[0] + x[1];
        Ok(())
    }

    fn objective_gradient(&self, x: &[f64], gradient: &mut SparseVector) -> Result<(), Fault> {
        gradient.set(0, 2.0 * x[0]);
        gradient.set(1, 2.0 * x[1]);
        Ok(())
    }

    fn constraint_jacobian(&self, _x: &[f64], rows: &mut [SparseVector]) -> Result<(), Fault> {
        rows[0].set(0, 1.0);
        rows[0].set(1, 1.0);
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
        hessian.insert(2.0 * objective_multiplier, 1, 1);
        Ok(())
    }
}

#[test]
fn evaluations_memoized_until_primal_changes() {
    let probe = Probe {};
    let problem = ScaledProblem::new(&probe, &[0.0, 0.0]).unwrap();
    let mut iterate = Iterate::new(vec![1.0, 2.0], Multipliers::zeros(2, 1));

    let before = problem.evaluations.objective.get();
    assert_eq!(iterate.evaluate_objective(&problem).unwrap(), 5.0);
    assert_eq!(iterate.evaluate_objective(&problem).unwrap(), 5.0);
    assert_eq!(problem.evaluations.objective.get(), before + 1);

    iterate.evaluate_constraints(&problem).unwrap();
    iterate.evaluate_constraints(&problem).unwrap();
    assert_eq!(problem.evaluations.constraints.get(), 1);

    // a fresh primal point invalidates every cache
    iterate.set_primal(vec![0.0, 0.0]);
    assert!(iterate.cached_constraints().is_none());
    assert_eq!(iterate.evaluate_objective(&problem).unwrap(), 0.0);
    assert_eq!(problem.evaluations.objective.get(), before + 2);
}

#[test]
fn cached_values_match_fresh_evaluations() {
    let probe = Probe {};
    let problem = ScaledProblem::new(&probe, &[0.0, 0.0]).unwrap();
    let mut iterate = Iterate::new(vec![3.0, -1.0], Multipliers::zeros(2, 1));

    iterate.evaluate_constraints(&problem).unwrap();
    let cached = iterate.cached_constraints().unwrap().to_vec();
    let mut fresh = vec![0.0; 1];
    problem.evaluate_constraints(&[3.0, -1.0], &mut fresh).unwrap();
    assert_eq!(cached, fresh);
}

fn solver() -> Solver {
    Solver::from_options(&Probe {}, &Options::default()).unwrap()
}

fn converged_iterate(objective_multiplier: f64) -> Iterate {
    let mut iterate = Iterate::new(vec![0.5, 0.5], Multipliers::zeros(2, 1));
    iterate.multipliers.objective = objective_multiplier;
    iterate.multipliers.constraints[0] = 1.0;
    iterate.residuals.infeasibility = 0.0;
    iterate.residuals.optimality_stationarity = 1e-9;
    iterate.residuals.feasibility_stationarity = 1.0;
    iterate.residuals.optimality_complementarity = 1e-9;
    iterate.residuals.feasibility_complementarity = 1e-9;
    iterate
}

#[test]
fn kkt_classification_requires_positive_objective_multiplier() {
    let probe = Probe {};
    let problem = ScaledProblem::new(&probe, &[0.0, 0.0]).unwrap();
    let solver = solver();

    let iterate = converged_iterate(1.0);
    assert_eq!(
        solver.check_termination(&problem, &iterate, 1.0),
        TerminationStatus::FeasibleKktPoint
    );

    // a zero objective multiplier cannot yield a KKT point
    let iterate = converged_iterate(0.0);
    assert_ne!(
        solver.check_termination(&problem, &iterate, 1.0),
        TerminationStatus::FeasibleKktPoint
    );
}

#[test]
fn infeasible_stationary_point_classified() {
    let probe = Probe {};
    let problem = ScaledProblem::new(&probe, &[0.0, 0.0]).unwrap();
    let solver = solver();

    let mut iterate = Iterate::new(vec![0.5, 0.5], Multipliers::zeros(2, 1));
    iterate.residuals.infeasibility = 1.0;
    iterate.residuals.optimality_stationarity = 1.0;
    iterate.residuals.feasibility_stationarity = 1e-9;
    iterate.residuals.optimality_complementarity = 1.0;
    iterate.residuals.feasibility_complementarity = 1e-9;
    assert_eq!(
        solver.check_termination(&problem, &iterate, 1.0),
        TerminationStatus::InfeasibleKktPoint
    );
}

#[test]
fn small_steps_classified_by_feasibility() {
    let probe = Probe {};
    let problem = ScaledProblem::new(&probe, &[0.0, 0.0]).unwrap();
    let solver = solver();

    let mut iterate = Iterate::new(vec![0.5, 0.5], Multipliers::zeros(2, 1));
    iterate.residuals.infeasibility = 0.0;
    assert_eq!(
        solver.check_termination(&problem, &iterate, 1e-12),
        TerminationStatus::FeasibleSmallStep
    );
    iterate.residuals.infeasibility = 1.0;
    assert_eq!(
        solver.check_termination(&problem, &iterate, 1e-12),
        TerminationStatus::InfeasibleSmallStep
    );
}

#[test]
fn residual_norm_option_selects_the_norm() {
    let mut options = Options::default();
    options.set("residual_norm", "L_INF");
    assert_eq!(options.residual_norm().unwrap(), NormKind::LInf);
    options.set("residual_norm", "L7");
    assert!(options.residual_norm().is_err());
}
