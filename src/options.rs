use std::collections::BTreeMap;

use anyhow::Context;

use crate::math::NormKind;

/// Flat key/value configuration map.
///
/// Presets seed the map with a known-good combination of ingredients;
/// later explicit entries override. Unknown keys are accepted so frontends
/// can pass options through unmodified.
#[derive(Debug, Clone)]
pub struct Options {
    map: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        let mut options = Self {
            map: BTreeMap::new(),
        };
        for (key, value) in [
            ("mechanism", "TR"),
            ("constraint-relaxation", "feasibility-restoration"),
            ("strategy", "filter"),
            ("subproblem", "QP"),
            ("tolerance", "1e-6"),
            ("max_iterations", "300"),
            ("small_step_factor", "100"),
            ("filter_Beta", "0.99999"),
            ("filter_Gamma", "1e-5"),
            ("armijo_decrease_fraction", "1e-4"),
            ("LS_backtracking_ratio", "0.5"),
            ("TR_radius", "10"),
            ("l1_relaxation_initial_parameter", "1"),
            ("l1_relaxation_epsilon1", "0.1"),
            ("l1_relaxation_epsilon2", "0.1"),
            ("l1_relaxation_decrease_factor", "10"),
            ("proximal_coefficient", "1e-8"),
            ("residual_norm", "L1"),
            ("hessian_model", "exact"),
            ("restoration_entry_check", "on"),
        ] {
            options.map.insert(key.to_string(), value.to_string());
        }
        options
    }
}

impl Options {
    /// Shortcuts for state-of-the-art combinations.
    pub fn preset(name: &str) -> anyhow::Result<Self> {
        let mut options = Self::default();
        match name {
            "ipopt" => {
                options.set("mechanism", "LS");
                options.set("constraint-relaxation", "feasibility-restoration");
                options.set("strategy", "filter");
                options.set("subproblem", "primal_dual_interior_point");
                options.set("filter_Beta", "0.99999");
                options.set("filter_Gamma", "1e-5");
                options.set("armijo_decrease_fraction", "1e-4");
                options.set("LS_backtracking_ratio", "0.5");
            }
            "filtersqp" => {
                options.set("mechanism", "TR");
                options.set("constraint-relaxation", "feasibility-restoration");
                options.set("strategy", "filter");
                options.set("subproblem", "QP");
            }
            "byrd" => {
                options.set("mechanism", "LS");
                options.set("constraint-relaxation", "l1-relaxation");
                options.set("strategy", "l1-penalty");
                options.set("subproblem", "QP");
                options.set("l1_relaxation_initial_parameter", "1");
                options.set("LS_backtracking_ratio", "0.5");
                options.set("armijo_decrease_fraction", "1e-8");
                options.set("l1_relaxation_epsilon1", "0.1");
                options.set("l1_relaxation_epsilon2", "0.1");
                options.set("tolerance", "1e-6");
            }
            other => anyhow::bail!("unknown preset {other:?}"),
        }
        Ok(options)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> anyhow::Result<f64> {
        let value = self
            .get(key)
            .with_context(|| format!("option {key:?} is not set"))?;
        value
            .parse()
            .with_context(|| format!("option {key:?} has unparseable value {value:?}"))
    }

    pub fn get_usize(&self, key: &str) -> anyhow::Result<usize> {
        let value = self
            .get(key)
            .with_context(|| format!("option {key:?} is not set"))?;
        value
            .parse()
            .with_context(|| format!("option {key:?} has unparseable value {value:?}"))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("on") | Some("true") | Some("yes") => true,
            Some("off") | Some("false") | Some("no") => false,
            _ => default,
        }
    }

    pub fn residual_norm(&self) -> anyhow::Result<NormKind> {
        match self.get_str("residual_norm", "L1") {
            "L1" => Ok(NormKind::L1),
            "L2" => Ok(NormKind::L2),
            "L_INF" => Ok(NormKind::LInf),
            other => anyhow::bail!("unknown residual norm {other:?}"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_then_override() {
        let mut options = Options::preset("byrd").unwrap();
        assert_eq!(options.get("strategy"), Some("l1-penalty"));
        options.set("strategy", "filter");
        assert_eq!(options.get("strategy"), Some("filter"));
    }

    #[test]
    fn unknown_keys_accepted() {
        let mut options = Options::default();
        options.set("some_future_option", "42");
        assert_eq!(options.get("some_future_option"), Some("42"));
    }

    #[test]
    fn unknown_preset_rejected() {
        assert!(Options::preset("unheard-of").is_err());
    }

    #[test]
    fn unparseable_value_is_an_error() {
        let mut options = Options::default();
        options.set("tolerance", "very small");
        assert!(options.get_f64("tolerance").is_err());
    }
}
