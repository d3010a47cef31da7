use log::debug;

use crate::filter::Filter;
use crate::iterate::{Iterate, Progress};
use crate::options::Options;
use crate::strategy::GlobalizationStrategy;

/// Filter-based acceptance with a switching condition between f-type and
/// h-type steps.
pub struct FilterStrategy {
    filter: Filter,
    /// Sufficient-reduction constant of the switching condition.
    sufficient_reduction: f64,
    /// Exponent of the switching condition.
    switching_exponent: f64,
    /// Armijo fraction for f-type steps.
    armijo_fraction: f64,
}

impl FilterStrategy {
    pub fn from_options(options: &Options) -> anyhow::Result<Self> {
        Ok(Self {
            filter: Filter::new(
                options.get_f64("filter_Beta")?,
                options.get_f64("filter_Gamma")?,
            ),
            sufficient_reduction: 1e-4,
            switching_exponent: 2.0,
            armijo_fraction: options.get_f64("armijo_decrease_fraction")?,
        })
    }
}

impl GlobalizationStrategy for FilterStrategy {
    fn initialize(&mut self, first_iterate: &Iterate) {
        self.filter.reset();
        self.filter
            .set_upper_bound(first_iterate.progress.infeasibility);
    }

    fn check_acceptance(
        &mut self,
        current: &Progress,
        trial: &Progress,
        objective_multiplier: f64,
        predicted_reduction: f64,
    ) -> bool {
        let (h, f) = (current.infeasibility, current.objective);
        let (h_trial, f_trial) = (trial.infeasibility, trial.objective);

        if !self.filter.acceptable(h_trial, f_trial) {
            debug!("trial ({:e}, {:e}) rejected by the filter", h_trial, f_trial);
            return false;
        }

        let scaled_reduction = objective_multiplier * predicted_reduction;
        let switching = scaled_reduction > 0.0
            && scaled_reduction >= self.sufficient_reduction * h.powf(self.switching_exponent);
        if switching {
            // f-type step: Armijo decrease on the objective, filter untouched
            let accept = f - f_trial >= self.armijo_fraction * scaled_reduction;
            debug!("f-type step: {}", accept);
            accept
        } else {
            // h-type step: augment the filter with the shrunk current pair
            self.filter
                .add(h - self.filter.gamma * h, f - self.filter.gamma * h);
            debug!("h-type step accepted");
            true
        }
    }

    fn acceptable_pair(&self, infeasibility: f64, objective: f64) -> bool {
        self.filter.acceptable(infeasibility, objective)
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn notify(&mut self, iterate: &Iterate) {
        if self.filter.upper_bound().is_infinite() {
            self.filter.set_upper_bound(iterate.progress.infeasibility);
        }
        self.filter
            .add(iterate.progress.infeasibility, iterate.progress.objective);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::Multipliers;

    fn strategy() -> FilterStrategy {
        FilterStrategy::from_options(&Options::default()).unwrap()
    }

    fn progress(h: f64, f: f64) -> Progress {
        Progress {
            infeasibility: h,
            objective: f,
        }
    }

    fn iterate_with_progress(h: f64, f: f64) -> Iterate {
        let mut iterate = Iterate::new(vec![0.0], Multipliers::zeros(1, 0));
        iterate.progress = progress(h, f);
        iterate
    }

    #[test]
    fn f_type_step_requires_armijo_decrease() {
        let mut strategy = strategy();
        strategy.initialize(&iterate_with_progress(0.0, 10.0));
        // unconstrained: switching holds whenever the prediction is positive
        assert!(strategy.check_acceptance(&progress(0.0, 10.0), &progress(0.0, 9.0), 1.0, 1.0));
        assert!(!strategy.check_acceptance(&progress(0.0, 10.0), &progress(0.0, 10.0), 1.0, 1.0));
    }

    #[test]
    fn h_type_step_augments_filter() {
        let mut strategy = strategy();
        strategy.initialize(&iterate_with_progress(1.0, 10.0));
        // no predicted reduction: h-type; the (shrunk) current pair enters
        assert!(strategy.check_acceptance(&progress(1.0, 10.0), &progress(0.5, 10.5), 0.0, 0.0));
        // a pair dominated by the recorded (1.0, 10.0) margin is now rejected
        assert!(!strategy.acceptable_pair(2.0, 11.0));
        assert!(strategy.acceptable_pair(0.4, 11.0));
    }

    #[test]
    fn reset_clears_history() {
        let mut strategy = strategy();
        strategy.initialize(&iterate_with_progress(1.0, 10.0));
        strategy.notify(&iterate_with_progress(1.0, 10.0));
        assert!(!strategy.acceptable_pair(2.0, 11.0));
        strategy.reset();
        assert!(strategy.acceptable_pair(2.0, 11.0));
    }
}
