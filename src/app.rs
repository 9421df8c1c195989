use std::path::PathBuf;

use eframe::{Storage, egui};

use crate::settings::Settings;
use crate::state::{AppState, Tab};
use crate::ui::{analyzer, monte_carlo, panels};
use crate::Cli;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct SignalAnalyzerApp {
    pub state: AppState,
}

impl SignalAnalyzerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, cli: Cli) -> Self {
        let settings: Settings = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();
        let mut state = AppState::from_settings(&settings, cli.seed);

        if let Some(path) = startup_file(cli.file, settings.last_file) {
            log::info!("Opening {}", path.display());
            state.open_path(&path);
        }

        Self { state }
    }
}

/// A file given on the command line wins; the last session's file is reopened if it still exists.
fn startup_file(cli_file: Option<PathBuf>, last_file: Option<PathBuf>) -> Option<PathBuf> {
    cli_file.or_else(|| last_file.filter(|p| p.exists()))
}

impl eframe::App for SignalAnalyzerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Central panel: active tab ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.dataset.is_none() {
                panels::welcome(ui, &mut self.state);
                return;
            }
            match self.state.tab {
                Tab::SignalAnalyzer => analyzer::signal_analyzer(ui, &mut self.state),
                Tab::MonteCarlo => monte_carlo::monte_carlo_tab(ui, &mut self.state),
            }
        });
    }

    fn save(&mut self, storage: &mut dyn Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.state.settings());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let last = dir.path().join("last.csv");
        std::fs::write(&last, "R\n1\n").unwrap();

        let cli = PathBuf::from("given.csv");
        assert_eq!(startup_file(Some(cli.clone()), Some(last.clone())), Some(cli));
        assert_eq!(startup_file(None, Some(last.clone())), Some(last));
    }

    #[test]
    fn missing_last_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(startup_file(None, Some(dir.path().join("gone.xlsx"))), None);
        assert_eq!(startup_file(None, None), None);
    }
}
