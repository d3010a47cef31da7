use crate::direction::SubproblemStatus;

/// Failures raised by the iteration engine and its collaborators.
///
/// Evaluation and solver faults are caught by the globalization mechanism,
/// which treats them as a rejected trial and shrinks the step length or
/// trust-region radius. Step failures surface to the driver, which returns
/// the last accepted iterate with a non-optimal status.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error("evaluation of {quantity} failed: {reason}")]
    Evaluation {
        quantity: &'static str,
        reason: String,
    },

    #[error("subproblem solver returned {status:?}")]
    Solver { status: SubproblemStatus },

    #[error("line-search step length fell below {limit:e}")]
    StepUnderflow { limit: f64 },

    #[error("trust-region radius fell below {limit:e}")]
    RadiusUnderflow { limit: f64 },

    #[error("globalization iteration limit ({limit}) reached without acceptance")]
    StepIterationOverflow { limit: usize },

    #[error("Hessian could not be convexified (regularization exceeded {limit:e})")]
    Inertia { limit: f64 },

    #[error("factorization failed: {0}")]
    Factorization(&'static str),
}

impl Fault {
    pub fn evaluation(quantity: &'static str, reason: impl Into<String>) -> Self {
        Fault::Evaluation {
            quantity,
            reason: reason.into(),
        }
    }

    /// A fault the mechanism may absorb as a plain rejection of the trial.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Fault::Evaluation { .. } | Fault::Solver { .. } | Fault::Factorization(_)
        )
    }
}
