use log::debug;

use crate::iterate::{Iterate, Progress};
use crate::options::Options;
use crate::strategy::GlobalizationStrategy;

/// Armijo sufficient decrease of the l1 merit function
/// `phi_mu = mu*f + h`, with no state between iterations.
pub struct MeritStrategy {
    /// Armijo fraction in (0, 1/2).
    armijo_fraction: f64,
}

impl MeritStrategy {
    pub fn from_options(options: &Options) -> anyhow::Result<Self> {
        Ok(Self {
            armijo_fraction: options.get_f64("armijo_decrease_fraction")?,
        })
    }
}

impl GlobalizationStrategy for MeritStrategy {
    fn initialize(&mut self, _first_iterate: &Iterate) {}

    fn check_acceptance(
        &mut self,
        current: &Progress,
        trial: &Progress,
        objective_multiplier: f64,
        predicted_reduction: f64,
    ) -> bool {
        let merit_current = objective_multiplier * current.objective + current.infeasibility;
        let merit_trial = objective_multiplier * trial.objective + trial.infeasibility;
        let actual_reduction = merit_current - merit_trial;
        debug!(
            "merit reduction: actual {:e}, predicted {:e}",
            actual_reduction, predicted_reduction
        );
        actual_reduction >= self.armijo_fraction * f64::max(0.0, predicted_reduction)
            && actual_reduction >= 0.0
    }

    fn reset(&mut self) {}

    fn notify(&mut self, _iterate: &Iterate) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(h: f64, f: f64) -> Progress {
        Progress {
            infeasibility: h,
            objective: f,
        }
    }

    #[test]
    fn sufficient_decrease_accepted() {
        let mut strategy = MeritStrategy {
            armijo_fraction: 1e-8,
        };
        // phi = f + h drops from 3 to 1
        assert!(strategy.check_acceptance(&progress(1.0, 2.0), &progress(0.5, 0.5), 1.0, 1.0));
    }

    #[test]
    fn merit_increase_rejected() {
        let mut strategy = MeritStrategy {
            armijo_fraction: 1e-8,
        };
        assert!(!strategy.check_acceptance(&progress(1.0, 2.0), &progress(2.0, 2.0), 1.0, 1.0));
    }

    #[test]
    fn fraction_of_prediction_required() {
        let mut strategy = MeritStrategy {
            armijo_fraction: 0.5,
        };
        // actual reduction 0.1 < 0.5 * predicted 1.0
        assert!(!strategy.check_acceptance(&progress(1.0, 2.0), &progress(0.95, 1.95), 1.0, 1.0));
    }
}
