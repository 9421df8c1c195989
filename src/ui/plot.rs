use eframe::egui::{Color32, Stroke, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, LineStyle, Plot, PlotPoints, Polygon};

use crate::color::{bar_color, to_color32};
use crate::stats::histogram::Histogram;
use crate::stats::monte_carlo::SimulationResult;

// ---------------------------------------------------------------------------
// Histogram (one per chart selector)
// ---------------------------------------------------------------------------

/// Render a histogram; hovering a bar shows its `[start, end)` label and count.
pub fn histogram_plot(ui: &mut Ui, id: usize, hist: &Histogram) {
    let width = if hist.bin_width > 0.0 {
        hist.bin_width * 0.5
    } else {
        0.5
    };
    let bars: Vec<Bar> = hist
        .bins
        .iter()
        .map(|bin| {
            Bar::new(bin.center(), bin.count as f64)
                .width(width)
                .fill(to_color32(bar_color(bin)))
                .name(bin.label())
        })
        .collect();

    Plot::new(("histogram", id))
        .height(220.0)
        .y_axis_label("Frequency")
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
}

// ---------------------------------------------------------------------------
// Monte Carlo equity paths
// ---------------------------------------------------------------------------

fn series(values: &[f64]) -> PlotPoints {
    values
        .iter()
        .enumerate()
        .map(|(k, &v)| [k as f64, v])
        .collect()
}

/// Sample paths, the min–max band and the mean / worst / best trajectories.
pub fn monte_carlo_plot(ui: &mut Ui, result: &SimulationResult) {
    let faint = Color32::from_rgba_unmultiplied(128, 128, 128, 26);
    let band = Color32::from_rgba_unmultiplied(0, 0, 255, 51);

    Plot::new("monte_carlo_plot")
        .legend(Legend::default())
        .x_axis_label("Trade #")
        .y_axis_label("Equity")
        .height(ui.available_height().max(400.0))
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            // The band is drawn as one trapezoid per step: egui_plot polygons must be convex.
            for k in 1..result.min.len() {
                let quad: PlotPoints = vec![
                    [(k - 1) as f64, result.min[k - 1]],
                    [k as f64, result.min[k]],
                    [k as f64, result.max[k]],
                    [(k - 1) as f64, result.max[k - 1]],
                ]
                .into();
                plot_ui.polygon(
                    Polygon::new(quad)
                        .fill_color(band)
                        .stroke(Stroke::NONE)
                        .name("Range"),
                );
            }

            for path in &result.sample_paths {
                plot_ui.line(Line::new(series(path)).color(faint).width(0.5));
            }

            plot_ui.line(
                Line::new(series(&result.mean))
                    .name("Most Likely Range")
                    .color(Color32::BLUE)
                    .width(2.0),
            );
            plot_ui.line(
                Line::new(series(&result.min))
                    .name("Worst Case")
                    .color(Color32::RED)
                    .style(LineStyle::dashed_loose())
                    .width(1.0),
            );
            plot_ui.line(
                Line::new(series(&result.max))
                    .name("Best Case")
                    .color(Color32::GREEN)
                    .style(LineStyle::dashed_loose())
                    .width(1.0),
            );
        });
}
