mod app;
mod color;
mod data;
mod report;
mod settings;
mod state;
mod stats;
mod ui;

use std::path::PathBuf;

use app::SignalAnalyzerApp;
use clap::Parser;
use eframe::egui;
use env_logger::Env;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Trading-signal dashboard", long_about = None)]
pub struct Cli {
    /// Signal table to open at start-up (xlsx, xls, csv, json or parquet).
    pub file: Option<PathBuf>,

    /// Seed for Monte Carlo runs; omit for a fresh seed each run.
    #[arg(long)]
    pub seed: Option<u64>,
}

fn main() -> eframe::Result {
    env_logger::Builder::from_env(Env::default().default_filter_or("signal_analyzer=info")).init();

    let cli = Cli::parse();
    log::debug!("{cli:?}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Signal Analyzer",
        options,
        Box::new(|cc| Ok(Box::new(SignalAnalyzerApp::new(cc, cli)))),
    )
}
