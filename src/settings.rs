use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::report::ReportScope;
use crate::stats::monte_carlo::{SimulationParams, StepDistribution};

/// Number of histogram selectors offered on the dashboard.
pub const CHART_COUNT_RANGE: std::ops::RangeInclusive<usize> = 2..=12;
pub const DEFAULT_CHART_COUNT: usize = 6;

// ---------------------------------------------------------------------------
// Persisted user preferences
// ---------------------------------------------------------------------------

/// Preferences stored by eframe between sessions under `eframe::APP_KEY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_file: Option<PathBuf>,
    pub chart_count: usize,
    pub report_scope: ReportScope,
    pub distribution: StepDistribution,
    pub steps: usize,
    pub initial_value: f64,
    pub simulations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let sim = SimulationParams::default();
        Self {
            last_file: None,
            chart_count: DEFAULT_CHART_COUNT,
            report_scope: ReportScope::default(),
            distribution: StepDistribution::default(),
            steps: sim.steps,
            initial_value: sim.initial_value,
            simulations: sim.simulations,
        }
    }
}

impl Settings {
    /// Clamp values edited outside the app back into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        use crate::stats::monte_carlo::{INITIAL_VALUE_RANGE, SIMULATIONS_RANGE, STEPS_RANGE};

        self.chart_count = self
            .chart_count
            .clamp(*CHART_COUNT_RANGE.start(), *CHART_COUNT_RANGE.end());
        self.steps = self.steps.clamp(*STEPS_RANGE.start(), *STEPS_RANGE.end());
        self.simulations = self
            .simulations
            .clamp(*SIMULATIONS_RANGE.start(), *SIMULATIONS_RANGE.end());
        self.initial_value = if self.initial_value.is_finite() {
            self.initial_value
                .clamp(*INITIAL_VALUE_RANGE.start(), *INITIAL_VALUE_RANGE.end())
        } else {
            SimulationParams::default().initial_value
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let s: Settings = serde_json::from_str(r#"{"chart_count": 4}"#).unwrap();
        assert_eq!(s.chart_count, 4);
        assert_eq!(s.steps, 100);
        assert_eq!(s.simulations, 10_000);
        assert_eq!(s.distribution, StepDistribution::Gaussian);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let s = Settings {
            chart_count: 40,
            steps: 1,
            initial_value: f64::NAN,
            simulations: 5,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(s.chart_count, 12);
        assert_eq!(s.steps, 10);
        assert_eq!(s.initial_value, 1.0);
        assert_eq!(s.simulations, 100);
    }

    #[test]
    fn round_trips_through_json() {
        let s = Settings {
            last_file: Some(PathBuf::from("signals.xlsx")),
            distribution: StepDistribution::StudentT,
            report_scope: ReportScope::AllNumericColumns,
            ..Settings::default()
        };
        let back: Settings = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert_eq!(back, s);
    }
}
