use eframe::egui::{self, ComboBox, DragValue, RichText, Ui};

use crate::state::AppState;
use crate::stats::monte_carlo::{
    INITIAL_VALUE_RANGE, SIMULATIONS_RANGE, STEPS_RANGE, StepDistribution,
};
use crate::ui::plot;

const CAVEATS: &[(&str, &str)] = &[
    (
        "Price-structure systems",
        "Trade order carries the edge in price-action systems; shuffling it invalidates the strategy.",
    ),
    (
        "High win-rate, curve-fitted systems",
        "A history accurate enough to look curve-fitted is only repeated by resampling it.",
    ),
    (
        "Self-correcting systems",
        "An always-in-market system closes a long by opening a short, so two longs never follow each other.",
    ),
    (
        "Long-term trend following",
        "Long-horizon trades depend on fundamentals that change over time; random order ignores that.",
    ),
    (
        "Large trade history",
        "With many trades some simulated sequences draw down the whole initial capital.",
    ),
    (
        "Position-sizing dependent systems",
        "Scaling in and out makes the trade sequence part of the expectancy.",
    ),
];

const GUIDELINE: &str = "If the edge depends on trade order in any form, the simulation will mislead. \
Simple systems without such a dependency can use it to estimate worst-case drawdowns and the equity envelope.";

pub fn monte_carlo_tab(ui: &mut Ui, state: &mut AppState) {
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Monte Carlo Simulation");
            egui::CollapsingHeader::new("Problems with Monte Carlo simulation")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    for (title, detail) in CAVEATS {
                        ui.label(RichText::new(*title).strong());
                        ui.label(*detail);
                        ui.add_space(4.0);
                    }
                    ui.label(RichText::new(GUIDELINE).italics());
                });
            ui.separator();

            controls(ui, state);
            ui.separator();

            let Some(run) = &state.simulation else {
                ui.label("Pick a column and run the simulation.");
                return;
            };

            let summary = run.result.summary();
            ui.horizontal(|ui: &mut Ui| {
                for (label, value) in [
                    ("Maximum Drawdown", summary.max_drawdown),
                    ("Median Value", summary.median_value),
                    ("Mean Value", summary.mean_value),
                ] {
                    ui.group(|ui: &mut Ui| {
                        ui.vertical(|ui: &mut Ui| {
                            ui.label(label);
                            ui.label(RichText::new(format!("{value:.2}")).size(20.0).strong());
                        });
                    });
                }
            });
            ui.label(
                RichText::new(format!(
                    "\"{}\": {} · {} simulations · seed {}",
                    run.column,
                    run.fitted.describe(),
                    run.result.simulations,
                    run.result.seed
                ))
                .weak(),
            );

            plot::monte_carlo_plot(ui, &run.result);
        });
}

fn controls(ui: &mut Ui, state: &mut AppState) {
    let numeric = state
        .dataset
        .as_ref()
        .map(|ds| ds.numeric_columns())
        .unwrap_or_default();

    egui::Grid::new("monte_carlo_controls")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui: &mut Ui| {
            ui.label("Select column for analysis");
            let current = state.simulator.column.clone().unwrap_or_default();
            ComboBox::from_id_salt("mc_column")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in &numeric {
                        if ui.selectable_label(*col == current, col).clicked() {
                            state.simulator.column = Some(col.clone());
                        }
                    }
                });
            ui.end_row();

            ui.label("Distribution");
            ComboBox::from_id_salt("mc_distribution")
                .selected_text(state.simulator.distribution.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for d in StepDistribution::ALL {
                        ui.selectable_value(&mut state.simulator.distribution, d, d.label());
                    }
                });
            ui.end_row();

            let params = &mut state.simulator.params;
            ui.label("Number of steps");
            ui.add(DragValue::new(&mut params.steps).range(STEPS_RANGE));
            ui.end_row();

            ui.label("Initial value");
            ui.add(
                DragValue::new(&mut params.initial_value)
                    .range(INITIAL_VALUE_RANGE)
                    .speed(0.1)
                    .max_decimals(2),
            );
            ui.end_row();

            ui.label("Number of simulations");
            ui.add(
                DragValue::new(&mut params.simulations)
                    .range(SIMULATIONS_RANGE)
                    .speed(100.0),
            );
            ui.end_row();
        });

    ui.add_space(6.0);
    let ready = state.simulator.column.is_some();
    if ui
        .add_enabled(ready, egui::Button::new("Run Monte Carlo Simulation"))
        .clicked()
    {
        state.run_simulation();
    }
}
