use log::info;

/// One row of the per-iteration statistics table, emitted through the
/// logging facade.
#[derive(Debug, Default)]
pub struct Statistics {
    pub major: usize,
    pub minor: usize,
    pub step_norm: f64,
    pub objective: Option<f64>,
    pub infeasibility: f64,
    pub complementarity: f64,
    pub stationarity: f64,
    /// Phase (restoration variants) or penalty parameter (l1 variant).
    pub phase: Option<String>,
    phase_label: &'static str,
    header_emitted: bool,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the last column; set by the constraint relaxation strategy.
    pub fn set_phase_label(&mut self, label: &'static str) {
        self.phase_label = label;
    }

    pub fn new_line(&mut self, major: usize) {
        self.major = major;
        self.minor = 0;
        self.phase = None;
    }

    pub fn emit(&mut self) {
        if !self.header_emitted {
            info!(
                "{:>5} {:>5} {:>12} {:>14} {:>13} {:>15} {:>13} {:>12}",
                "major",
                "minor",
                "step norm",
                "objective",
                "primal infeas",
                "complementarity",
                "stationarity",
                self.phase_label,
            );
            self.header_emitted = true;
        }
        let objective = match self.objective {
            Some(objective) => format!("{:>14.7e}", objective),
            None => format!("{:>14}", "-"),
        };
        info!(
            "{:>5} {:>5} {:>12.5e} {} {:>13.5e} {:>15.5e} {:>13.5e} {:>12}",
            self.major,
            self.minor,
            self.step_norm,
            objective,
            self.infeasibility,
            self.complementarity,
            self.stationarity,
            self.phase.as_deref().unwrap_or("-"),
        );
    }
}
