use eframe::egui::{self, Color32, RichText, Ui};

use crate::data::loader::SUPPORTED_EXTENSIONS;
use crate::report::DEFAULT_FILE_NAME;
use crate::state::{AppState, Tab};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        if state.dataset.is_none() {
            return;
        }

        ui.separator();
        ui.selectable_value(&mut state.tab, Tab::SignalAnalyzer, "Signal Analyzer");
        ui.selectable_value(&mut state.tab, Tab::MonteCarlo, "Monte Carlo Analysis");
        ui.separator();

        if let Some(path) = &state.file_path {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ui.label(format!("Selected file: {name}"));
        }
        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} rows loaded, {} after filters",
                ds.len(),
                state.views.stage_b.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GREEN
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// Landing screen
// ---------------------------------------------------------------------------

/// Shown until a table is loaded.
pub fn welcome(ui: &mut Ui, state: &mut AppState) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.add_space(ui.available_height() * 0.3);
        ui.heading(RichText::new("Signal Analyzer Dashboard").strong().size(28.0));
        ui.add_space(12.0);
        if ui.button("Select Excel file").clicked() {
            open_file_dialog(state);
        }
        if let Some(msg) = &state.status_message {
            ui.add_space(8.0);
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open signal data")
        .add_filter("Supported files", SUPPORTED_EXTENSIONS)
        .add_filter("Excel", &["xlsx", "xlsm", "xls"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open_path(&path);
    }
}

pub fn save_report_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save PDF report")
        .set_file_name(DEFAULT_FILE_NAME)
        .add_filter("PDF", &["pdf"])
        .save_file();

    if let Some(path) = file {
        state.export_report(&path);
    }
}
