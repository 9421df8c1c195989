use std::path::{Path, PathBuf};

use crate::color::ColorMap;
use crate::data::filter::{Condition, Filter, FilterChain, FilterViews, Probabilities};
use crate::data::model::{CellValue, ColumnKind, SignalTable};
use crate::report::{self, MetricsPanel, ReportRequest, ReportScope};
use crate::settings::{CHART_COUNT_RANGE, Settings};
use crate::stats::histogram::Histogram;
use crate::stats::metrics::TradeMetrics;
use crate::stats::monte_carlo::{
    FittedDistribution, SimulationParams, SimulationResult, StepDistribution, simulate,
};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    SignalAnalyzer,
    MonteCarlo,
}

/// Filter 1 narrows the table, filter 2 narrows the result of filter 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    A,
    B,
}

/// What a metrics panel can show for its column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricsOutcome {
    NotNumeric,
    NoData,
    Ready(TradeMetrics),
}

/// Inputs of the Monte Carlo tab.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorInputs {
    pub column: Option<String>,
    pub distribution: StepDistribution,
    pub params: SimulationParams,
}

/// A finished run together with what produced it.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub column: String,
    pub fitted: FittedDistribution,
    pub result: SimulationResult,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded table (None until user loads a file).
    pub dataset: Option<SignalTable>,

    /// Path of the loaded file.
    pub file_path: Option<PathBuf>,

    /// The two-stage filter chain (None until a table is loaded).
    pub filters: Option<FilterChain>,

    /// Rows passing each stage (cached; recomputed in full on every change).
    pub views: FilterViews,

    pub probabilities: Probabilities,

    /// Colours for the values of categorical filter columns, per stage.
    pub color_maps: [Option<ColorMap>; 2],

    /// Columns summarised by the "No SC-In" and "SC-In" metrics panels.
    pub metric_columns: [Option<String>; 2],

    pub chart_count: usize,

    /// Column picked in each histogram selector (at least `chart_count` long).
    pub chart_columns: Vec<String>,

    pub show_table: bool,

    pub report_scope: ReportScope,

    pub simulator: SimulatorInputs,

    pub simulation: Option<SimulationRun>,

    pub tab: Tab,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), None)
    }
}

impl AppState {
    /// Initial state from persisted preferences; `seed` fixes simulation RNGs.
    pub fn from_settings(settings: &Settings, seed: Option<u64>) -> Self {
        let settings = settings.clone().sanitized();
        Self {
            dataset: None,
            file_path: None,
            filters: None,
            views: FilterViews::default(),
            probabilities: Probabilities::default(),
            color_maps: [None, None],
            metric_columns: [None, None],
            chart_count: settings.chart_count,
            chart_columns: Vec::new(),
            show_table: false,
            report_scope: settings.report_scope,
            simulator: SimulatorInputs {
                column: None,
                distribution: settings.distribution,
                params: SimulationParams {
                    steps: settings.steps,
                    initial_value: settings.initial_value,
                    simulations: settings.simulations,
                    seed,
                },
            },
            simulation: None,
            tab: Tab::default(),
            status_message: None,
        }
    }

    /// Preferences worth keeping for the next session.
    pub fn settings(&self) -> Settings {
        Settings {
            last_file: self.file_path.clone(),
            chart_count: self.chart_count,
            report_scope: self.report_scope,
            distribution: self.simulator.distribution,
            steps: self.simulator.params.steps,
            initial_value: self.simulator.params.initial_value,
            simulations: self.simulator.params.simulations,
        }
    }

    /// Load a file and make it the current table; errors go to the status line.
    pub fn open_path(&mut self, path: &Path) {
        match crate::data::loader::load_file(path) {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} rows with columns {:?} from {}",
                    dataset.len(),
                    dataset.column_names,
                    path.display()
                );
                self.file_path = Some(path.to_path_buf());
                self.set_dataset(dataset);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Ingest a newly loaded table, initialise filters and selections.
    pub fn set_dataset(&mut self, dataset: SignalTable) {
        let first_col = dataset.column_names.first().cloned().unwrap_or_default();
        self.filters = Some(FilterChain {
            first: Filter::for_column(&dataset, &first_col),
            second: Filter::for_column(&dataset, &first_col),
        });

        let numeric = dataset.numeric_columns();
        let default_metric = numeric.first().or(dataset.column_names.first()).cloned();
        self.metric_columns = [default_metric.clone(), default_metric];
        self.chart_columns = default_chart_columns(&numeric, *CHART_COUNT_RANGE.end());
        self.simulator.column = numeric.first().cloned();
        self.simulation = None;

        self.dataset = Some(dataset);
        self.rebuild_color_maps();
        self.refilter();
        self.status_message = None;
    }

    pub fn filter(&self, stage: Stage) -> Option<&Filter> {
        let chain = self.filters.as_ref()?;
        Some(match stage {
            Stage::A => &chain.first,
            Stage::B => &chain.second,
        })
    }

    /// Mutable access to a stage's condition; call [`Self::refilter`] afterwards.
    pub fn condition_mut(&mut self, stage: Stage) -> Option<&mut Condition> {
        let chain = self.filters.as_mut()?;
        Some(match stage {
            Stage::A => &mut chain.first.condition,
            Stage::B => &mut chain.second.condition,
        })
    }

    /// Recompute both views and the probabilities after any filter change.
    pub fn refilter(&mut self) {
        let (Some(ds), Some(chain)) = (&self.dataset, &self.filters) else {
            self.views = FilterViews::default();
            self.probabilities = Probabilities::default();
            return;
        };
        self.views = chain.run(ds);
        self.probabilities = Probabilities::from_views(&self.views, ds.len());
    }

    /// Point a stage at another column, resetting it to that column's defaults.
    pub fn set_filter_column(&mut self, stage: Stage, column: &str) {
        let (Some(ds), Some(chain)) = (&self.dataset, &mut self.filters) else {
            return;
        };
        let fresh = Filter::for_column(ds, column);
        log::debug!("filter {stage:?} -> {fresh}");
        match stage {
            Stage::A => chain.first = fresh,
            Stage::B => chain.second = fresh,
        }
        self.rebuild_color_maps();
        self.refilter();
    }

    /// Toggle a single value in a categorical stage.
    pub fn toggle_filter_value(&mut self, stage: Stage, value: &CellValue) {
        if let Some(Condition::OneOf(selected)) = self.condition_mut(stage) {
            if !selected.remove(value) {
                selected.insert(value.clone());
            }
        }
        self.refilter();
    }

    /// Drop every selected value of a categorical stage (shows all rows).
    pub fn clear_selection(&mut self, stage: Stage) {
        if let Some(Condition::OneOf(selected)) = self.condition_mut(stage) {
            selected.clear();
        }
        self.refilter();
    }

    fn rebuild_color_maps(&mut self) {
        let maps = [Stage::A, Stage::B].map(|stage| {
            let ds = self.dataset.as_ref()?;
            let col = &self.filter(stage)?.column;
            if ds.kind(col) != Some(ColumnKind::Categorical) {
                return None;
            }
            ds.unique(col).map(|vals| ColorMap::new(col, vals))
        });
        self.color_maps = maps;
    }

    pub fn color_map(&self, stage: Stage) -> Option<&ColorMap> {
        let idx = match stage {
            Stage::A => 0,
            Stage::B => 1,
        };
        self.color_maps[idx].as_ref()
    }

    // -- Derived views --

    /// Metrics of `metric_columns[slot]` over view B.
    pub fn metrics(&self, slot: usize) -> MetricsOutcome {
        let (Some(ds), Some(Some(column))) = (&self.dataset, self.metric_columns.get(slot)) else {
            return MetricsOutcome::NoData;
        };
        if ds.kind(column) != Some(ColumnKind::Numeric) {
            return MetricsOutcome::NotNumeric;
        }
        let values = ds.numeric_values(column, &self.views.stage_b);
        match TradeMetrics::compute(&values, self.views.stage_b.len()) {
            Some(m) => MetricsOutcome::Ready(m),
            None => MetricsOutcome::NoData,
        }
    }

    pub fn set_chart_count(&mut self, count: usize) {
        self.chart_count = count.clamp(*CHART_COUNT_RANGE.start(), *CHART_COUNT_RANGE.end());
    }

    /// Columns of the histograms currently on screen, in chart order.
    pub fn visible_chart_columns(&self) -> &[String] {
        let n = self.chart_count.min(self.chart_columns.len());
        &self.chart_columns[..n]
    }

    /// Histogram of `column` over view B.
    pub fn histogram(&self, column: &str) -> Option<Histogram> {
        let ds = self.dataset.as_ref()?;
        let rows = &self.views.stage_b;
        Histogram::freedman_diaconis(&ds.numeric_values(column, rows), rows.len())
    }

    // -- Report --

    pub fn report_request(&self) -> Option<ReportRequest> {
        let ds = self.dataset.as_ref()?;
        let chain = self.filters.as_ref()?;
        let metrics = (0..2)
            .map(|slot| MetricsPanel {
                column: self.metric_columns[slot].clone().unwrap_or_default(),
                metrics: match self.metrics(slot) {
                    MetricsOutcome::Ready(m) => Some(m),
                    _ => None,
                },
            })
            .collect();
        Some(ReportRequest {
            first_filter: chain.first.to_string(),
            second_filter: chain.second.to_string(),
            total_rows: ds.len(),
            stage_a_rows: self.views.stage_a.len(),
            stage_b_rows: self.views.stage_b.len(),
            probabilities: self.probabilities,
            metrics,
            histogram_columns: self.report_scope.columns(ds, self.visible_chart_columns()),
        })
    }

    /// Write the PDF report for the current selections to `path`.
    pub fn export_report(&mut self, path: &Path) {
        let (Some(ds), Some(request)) = (&self.dataset, self.report_request()) else {
            return;
        };
        match report::write_pdf(&request, ds, &self.views.stage_b, path) {
            Ok(()) => {
                self.status_message = Some(format!("Report saved to {}", path.display()));
            }
            Err(e) => {
                log::error!("Failed to write report: {e:#}");
                self.status_message = Some(format!("Error generating PDF report: {e:#}"));
            }
        }
    }

    // -- Monte Carlo --

    /// Fit the selected column over the full table and simulate.
    pub fn run_simulation(&mut self) {
        let (Some(ds), Some(column)) = (&self.dataset, self.simulator.column.clone()) else {
            return;
        };
        let sample = ds.all_numeric_values(&column);
        let outcome = FittedDistribution::fit(self.simulator.distribution, &sample).and_then(|fitted| {
            let result = simulate(&fitted, &self.simulator.params)?;
            Ok(SimulationRun {
                column: column.clone(),
                fitted,
                result,
            })
        });
        match outcome {
            Ok(run) => {
                self.simulation = Some(run);
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Monte Carlo simulation failed: {e:#}");
                self.simulation = None;
                self.status_message = Some(format!("Error running Monte Carlo simulation: {e:#}"));
            }
        }
    }
}

/// Chart `i` shows numeric column `i` (cycling when there are fewer columns).
fn default_chart_columns(numeric: &[String], count: usize) -> Vec<String> {
    if numeric.is_empty() {
        return Vec::new();
    }
    (0..count).map(|i| numeric[i % numeric.len()].clone()).collect()
}
