//! Pareto-dominance memory over (infeasibility, objective) pairs.

/// Filter of (h, f) pairs with an upper envelope on the infeasibility.
///
/// Invariant: no stored pair dominates another; inserting a pair removes
/// every older pair it dominates. Entries are kept sorted by increasing h.
#[derive(Debug, Clone)]
pub struct Filter {
    entries: Vec<(f64, f64)>,
    upper_bound: f64,
    /// Envelope shrink factor (beta).
    pub beta: f64,
    /// Dominance margin factor (gamma).
    pub gamma: f64,
}

impl Filter {
    const INITIAL_UPPER_BOUND: f64 = 1e2;
    const UPPER_BOUND_FACTOR: f64 = 1.25;

    pub fn new(beta: f64, gamma: f64) -> Self {
        Self {
            entries: Vec::new(),
            upper_bound: f64::INFINITY,
            beta,
            gamma,
        }
    }

    /// Clears the contents and the envelope.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.upper_bound = f64::INFINITY;
    }

    /// Sets the envelope from the infeasibility of the starting point.
    pub fn set_upper_bound(&mut self, infeasibility: f64) {
        self.upper_bound = f64::max(
            Self::INITIAL_UPPER_BOUND,
            Self::UPPER_BOUND_FACTOR * infeasibility,
        );
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    /// A pair is acceptable when it is below the shrunk envelope and no
    /// stored pair dominates it within the margins.
    pub fn acceptable(&self, infeasibility: f64, objective: f64) -> bool {
        if infeasibility > self.beta * self.upper_bound {
            return false;
        }
        !self.entries.iter().any(|&(h_i, f_i)| {
            h_i <= infeasibility && f_i <= objective + self.gamma * h_i
        })
    }

    /// Inserts a pair, removing every stored pair it dominates.
    pub fn add(&mut self, infeasibility: f64, objective: f64) {
        self.entries
            .retain(|&(h_i, f_i)| !(infeasibility <= h_i && objective <= f_i));
        let position = self
            .entries
            .iter()
            .position(|&(h_i, _)| infeasibility < h_i)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, (infeasibility, objective));
    }

    /// Smallest stored infeasibility; infinite when empty.
    pub fn minimum_infeasibility(&self) -> f64 {
        self.entries
            .first()
            .map(|&(h, _)| h)
            .unwrap_or(f64::INFINITY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> Filter {
        let mut filter = Filter::new(0.99999, 1e-5);
        filter.set_upper_bound(1.0);
        filter
    }

    #[test]
    fn dominated_pairs_removed_on_insert() {
        let mut filter = filter();
        filter.add(1.0, 5.0);
        filter.add(2.0, 4.0);
        filter.add(0.5, 3.0); // dominates neither
        assert_eq!(filter.len(), 3);
        filter.add(0.4, 2.0); // dominates (0.5, 3.0), (1.0, 5.0), (2.0, 4.0)
        assert_eq!(filter.len(), 1);
        assert_eq!(filter.minimum_infeasibility(), 0.4);
    }

    #[test]
    fn no_stored_pair_dominates_another() {
        let mut filter = filter();
        for &(h, f) in &[(3.0, 1.0), (2.0, 2.0), (1.0, 3.0), (2.5, 1.5), (0.1, 9.0)] {
            filter.add(h, f);
            // the invariant holds after every insertion
            let entries: Vec<(f64, f64)> = filter.entries.clone();
            for (a, &(h_a, f_a)) in entries.iter().enumerate() {
                for (b, &(h_b, f_b)) in entries.iter().enumerate() {
                    if a != b {
                        assert!(!(h_a <= h_b && f_a <= f_b), "{:?} dominates {:?}", (h_a, f_a), (h_b, f_b));
                    }
                }
            }
        }
    }

    #[test]
    fn envelope_rejects_large_infeasibility() {
        let filter = filter();
        assert!(!filter.acceptable(150.0, 0.0));
        assert!(filter.acceptable(50.0, 0.0));
    }

    #[test]
    fn dominated_point_rejected() {
        let mut filter = filter();
        filter.add(1.0, 1.0);
        assert!(!filter.acceptable(1.5, 1.5));
        assert!(filter.acceptable(0.5, 2.0));
        assert!(filter.acceptable(1.5, 0.5));
    }

    #[test]
    fn envelope_survives_insertions() {
        let mut filter = filter();
        let bound = filter.upper_bound();
        filter.add(0.5, 1.0);
        filter.add(0.2, 2.0);
        assert_eq!(filter.upper_bound(), bound);
    }
}
