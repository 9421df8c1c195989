use eframe::egui::{self, ComboBox, DragValue, RichText, ScrollArea, Slider, Ui};
use egui_extras::{Column, DatePickerButton, TableBuilder};

use crate::data::filter::{Condition, LowerBound, UpperBound};
use crate::data::model::ColumnKind;
use crate::report::ReportScope;
use crate::settings::CHART_COUNT_RANGE;
use crate::state::{AppState, MetricsOutcome, Stage};
use crate::ui::{panels, plot};

const CHARTS_PER_ROW: usize = 6;

// ---------------------------------------------------------------------------
// "Signal Analyzer" tab
// ---------------------------------------------------------------------------

pub fn signal_analyzer(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.columns(3, |cols: &mut [Ui]| {
                cols[0].heading("Filter A");
                filter_editor(&mut cols[0], state, Stage::A);
                cols[1].heading("Filter B");
                filter_editor(&mut cols[1], state, Stage::B);
                cols[2].heading("Metrics");
                cols[2].columns(2, |metric_cols: &mut [Ui]| {
                    metrics_panel(&mut metric_cols[0], state, 0);
                    metrics_panel(&mut metric_cols[1], state, 1);
                });
            });

            ui.separator();

            if state.views.stage_b.is_empty() {
                ui.label("No data matches the selected filters");
                return;
            }

            data_table(ui, state);
            ui.separator();
            histograms(ui, state);
            ui.separator();
            report_controls(ui, state);
        });
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

fn filter_editor(ui: &mut Ui, state: &mut AppState, stage: Stage) {
    let Some(ds) = &state.dataset else {
        return;
    };
    let columns = ds.column_names.clone();
    let Some(current) = state.filter(stage).map(|f| f.column.clone()) else {
        return;
    };

    ui.label(match stage {
        Stage::A => "Select the header to filter 1",
        Stage::B => "Select the header to filter 2",
    });
    let mut picked = None;
    ComboBox::from_id_salt(("filter_column", stage))
        .selected_text(&current)
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for col in &columns {
                if ui.selectable_label(*col == current, col).clicked() {
                    picked = Some(col.clone());
                }
            }
        });
    if let Some(col) = picked {
        state.set_filter_column(stage, &col);
    }

    let Some(column) = state.filter(stage).map(|f| f.column.clone()) else {
        return;
    };
    match state.dataset.as_ref().and_then(|ds| ds.kind(&column)) {
        Some(ColumnKind::Numeric) => range_editor(ui, state, stage, &column),
        Some(ColumnKind::DateTime) => date_editor(ui, state, stage, &column),
        Some(ColumnKind::Categorical) => value_picker(ui, state, stage, &column),
        None => {}
    }

    ui.add_space(4.0);
    let p = state.probabilities;
    match stage {
        Stage::A => {
            ui.label(RichText::new(format!("P(A): {:.2}%", p.p_a)).strong());
        }
        Stage::B => {
            ui.horizontal(|ui: &mut Ui| {
                ui.label(RichText::new(format!("P(B): {:.2}%", p.p_b)).strong());
                ui.separator();
                ui.label(RichText::new(format!("P(B|A): {:.2}%", p.p_b_given_a)).strong());
            });
        }
    }
}

fn range_editor(ui: &mut Ui, state: &mut AppState, stage: Stage, column: &str) {
    let Some((lo, hi)) = state.dataset.as_ref().and_then(|ds| ds.numeric_range(column)) else {
        return;
    };
    let speed = ((hi - lo) / 200.0).max(0.01);
    let mut changed = false;

    if let Some(Condition::Range {
        min,
        lower,
        max,
        upper,
    }) = state.condition_mut(stage)
    {
        ui.columns(2, |cols: &mut [Ui]| {
            ComboBox::from_id_salt(("lower_bound", stage))
                .selected_text(lower.label())
                .show_ui(&mut cols[0], |ui: &mut Ui| {
                    for b in LowerBound::ALL {
                        changed |= ui.selectable_value(lower, b, b.label()).changed();
                    }
                });
            cols[0].label(format!("Value ({lo:.2} : {hi:.2})"));
            changed |= cols[0]
                .add(DragValue::new(min).range(lo..=hi).speed(speed).max_decimals(2))
                .changed();

            ComboBox::from_id_salt(("upper_bound", stage))
                .selected_text(upper.label())
                .show_ui(&mut cols[1], |ui: &mut Ui| {
                    for b in UpperBound::ALL {
                        changed |= ui.selectable_value(upper, b, b.label()).changed();
                    }
                });
            cols[1].label(format!("Value ({lo:.2} : {hi:.2})"));
            changed |= cols[1]
                .add(DragValue::new(max).range(lo..=hi).speed(speed).max_decimals(2))
                .changed();
        });
        changed |= ui.add(Slider::new(min, lo..=hi).show_value(false)).changed();
        changed |= ui.add(Slider::new(max, lo..=hi).show_value(false)).changed();
    }

    if changed {
        state.refilter();
    }
}

fn date_editor(ui: &mut Ui, state: &mut AppState, stage: Stage, column: &str) {
    let (start_id, end_id) = match stage {
        Stage::A => ("filter_a_start", "filter_a_end"),
        Stage::B => ("filter_b_start", "filter_b_end"),
    };
    let mut changed = false;

    ui.label(format!("Select the date range for \"{column}\""));
    if let Some(Condition::DateRange { start, end }) = state.condition_mut(stage) {
        ui.horizontal(|ui: &mut Ui| {
            changed |= ui.add(DatePickerButton::new(start).id_salt(start_id)).changed();
            ui.label("–");
            changed |= ui.add(DatePickerButton::new(end).id_salt(end_id)).changed();
        });
    }

    if changed {
        state.refilter();
    }
}

fn value_picker(ui: &mut Ui, state: &mut AppState, stage: Stage, column: &str) {
    let Some(values) = state.dataset.as_ref().and_then(|ds| ds.unique(column)).cloned() else {
        return;
    };
    let selected = match state.filter(stage).map(|f| &f.condition) {
        Some(Condition::OneOf(set)) => set.clone(),
        _ => return,
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("Select values for \"{column}\""));
        if !selected.is_empty() && ui.small_button("Clear").clicked() {
            state.clear_selection(stage);
        }
    });

    let mut toggled = None;
    ScrollArea::vertical()
        .id_salt(("values", stage))
        .max_height(160.0)
        .show(ui, |ui: &mut Ui| {
            for val in &values {
                let mut text = RichText::new(val.to_string());
                if let Some(cm) = state.color_map(stage) {
                    text = text.color(cm.color_for(val));
                }
                let mut checked = selected.contains(val);
                if ui.checkbox(&mut checked, text).changed() {
                    toggled = Some(val.clone());
                }
            }
        });
    if let Some(val) = toggled {
        state.toggle_filter_value(stage, &val);
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

fn metrics_panel(ui: &mut Ui, state: &mut AppState, slot: usize) {
    let Some(columns) = state.dataset.as_ref().map(|ds| ds.column_names.clone()) else {
        return;
    };
    ui.label(if slot == 0 {
        "Select column for metrics (No SC-In)"
    } else {
        "Select column for metrics (SC-In)"
    });
    let current = state.metric_columns[slot].clone().unwrap_or_default();
    ComboBox::from_id_salt(("metrics", slot))
        .selected_text(&current)
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for col in &columns {
                if ui.selectable_label(*col == current, col).clicked() {
                    state.metric_columns[slot] = Some(col.clone());
                }
            }
        });

    match state.metrics(slot) {
        MetricsOutcome::NotNumeric => {
            ui.label("Select numeric column");
        }
        MetricsOutcome::NoData => {
            ui.label("No data available");
        }
        MetricsOutcome::Ready(m) => {
            egui::Grid::new(("metrics_grid", slot))
                .striped(true)
                .num_columns(2)
                .show(ui, |ui: &mut Ui| {
                    for (label, value) in m.rows() {
                        let headline = matches!(label, "Win Rate" | "Net Win" | "SQN");
                        let (l, v) = (RichText::new(label), RichText::new(value));
                        if headline {
                            ui.label(l.strong());
                            ui.label(v.strong());
                        } else {
                            ui.label(l);
                            ui.label(v);
                        }
                        ui.end_row();
                    }
                });
        }
    }
}

// ---------------------------------------------------------------------------
// Data table
// ---------------------------------------------------------------------------

fn data_table(ui: &mut Ui, state: &mut AppState) {
    if ui.button("Show/Hide Data Table").clicked() {
        state.show_table = !state.show_table;
    }
    if !state.show_table {
        return;
    }
    let Some(ds) = &state.dataset else {
        return;
    };
    let rows = &state.views.stage_b;

    ui.push_id("data_table", |ui: &mut Ui| {
        ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .max_scroll_height(300.0)
                .columns(Column::auto().at_least(60.0), ds.column_names.len())
                .header(20.0, |mut header| {
                    for name in &ds.column_names {
                        header.col(|ui: &mut Ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(18.0, rows.len(), |mut row| {
                        let cells = &ds.rows[rows[row.index()]];
                        for cell in cells {
                            row.col(|ui: &mut Ui| {
                                ui.label(cell.to_string());
                            });
                        }
                    });
                });
        });
    });
}

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

fn histograms(ui: &mut Ui, state: &mut AppState) {
    let Some(numeric) = state.dataset.as_ref().map(|ds| ds.numeric_columns()) else {
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.heading("Histograms");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui: &mut Ui| {
            let mut count = state.chart_count;
            ComboBox::from_id_salt("num_histograms")
                .selected_text(count.to_string())
                .width(50.0)
                .show_ui(ui, |ui: &mut Ui| {
                    for n in CHART_COUNT_RANGE {
                        ui.selectable_value(&mut count, n, n.to_string());
                    }
                });
            ui.label("Num of Charts");
            state.set_chart_count(count);
        });
    });

    if numeric.is_empty() {
        ui.label("No numeric columns to chart");
        return;
    }

    let count = state.chart_count.min(state.chart_columns.len());
    for row_start in (0..count).step_by(CHARTS_PER_ROW) {
        ui.columns(CHARTS_PER_ROW, |cols: &mut [Ui]| {
            for (slot, i) in (row_start..count.min(row_start + CHARTS_PER_ROW)).enumerate() {
                let ui = &mut cols[slot];
                let selected = &mut state.chart_columns[i];
                ComboBox::from_id_salt(("chart", i))
                    .selected_text(selected.as_str())
                    .width(ui.available_width())
                    .show_ui(ui, |ui: &mut Ui| {
                        for col in &numeric {
                            ui.selectable_value(selected, col.clone(), col);
                        }
                    });

                let column = state.chart_columns[i].clone();
                ui.label(RichText::new(format!("Distribution of \"{column}\"")).strong());
                match state.histogram(&column) {
                    Some(hist) => plot::histogram_plot(ui, i, &hist),
                    None => {
                        ui.label("No values");
                    }
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// PDF report
// ---------------------------------------------------------------------------

fn report_controls(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Report Type");
        ComboBox::from_id_salt("report_scope")
            .selected_text(state.report_scope.label())
            .show_ui(ui, |ui: &mut Ui| {
                for scope in ReportScope::ALL {
                    ui.selectable_value(&mut state.report_scope, scope, scope.label());
                }
            })
            .response
            .on_hover_text(
                "Choose whether to include only the visible histograms or all numeric columns in the report",
            );

        if ui.button("Generate PDF Report").clicked() {
            panels::save_report_dialog(state);
        }
    });
}
