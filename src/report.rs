//! PDF export of the current analysis: filter summary, the two metrics
//! panels and one histogram per selected column.

use std::path::Path;

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Rect, Rgb,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::{bar_color, to_unit_rgb};
use crate::data::filter::Probabilities;
use crate::data::model::{ColumnKind, SignalTable};
use crate::stats::histogram::Histogram;
use crate::stats::metrics::TradeMetrics;

pub const DEFAULT_FILE_NAME: &str = "signal_analyzer_report.pdf";

// A4, millimetres.
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const ROW_H: f32 = 7.0;
const CHART_W: f32 = 88.0;
const CHART_H: f32 = 53.0;
const CHART_GAP: f32 = 8.0;

const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] printpdf::Error),
    #[error("writing report: {0}")]
    Io(#[from] std::io::Error),
}

/// Which columns get a histogram in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportScope {
    #[default]
    VisibleHistograms,
    AllNumericColumns,
}

impl ReportScope {
    pub const ALL: [ReportScope; 2] = [ReportScope::VisibleHistograms, ReportScope::AllNumericColumns];

    pub fn label(self) -> &'static str {
        match self {
            ReportScope::VisibleHistograms => "Visible Histograms Only",
            ReportScope::AllNumericColumns => "All Numeric Columns",
        }
    }

    /// Resolve the histogram columns: the charts on screen (numeric only, in
    /// chart order) or every numeric column of the table.
    pub fn columns(self, table: &SignalTable, visible: &[String]) -> Vec<String> {
        match self {
            ReportScope::VisibleHistograms => visible
                .iter()
                .filter(|c| table.kind(c) == Some(ColumnKind::Numeric))
                .cloned()
                .collect(),
            ReportScope::AllNumericColumns => table.numeric_columns(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsPanel {
    pub column: String,
    /// `None` when the column is not numeric or the view is empty.
    pub metrics: Option<TradeMetrics>,
}

/// Everything the report shows, captured from the dashboard state.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub first_filter: String,
    pub second_filter: String,
    pub total_rows: usize,
    pub stage_a_rows: usize,
    pub stage_b_rows: usize,
    pub probabilities: Probabilities,
    pub metrics: Vec<MetricsPanel>,
    pub histogram_columns: Vec<String>,
}

impl ReportRequest {
    fn filter_rows(&self) -> Vec<[String; 2]> {
        let p = &self.probabilities;
        vec![
            ["Filter Information".into(), String::new()],
            ["Filter 1".into(), self.first_filter.clone()],
            ["Total Records".into(), self.total_rows.to_string()],
            ["Records after Filter 1".into(), self.stage_a_rows.to_string()],
            ["P(A)".into(), format!("{:.2}%", p.p_a)],
            ["Filter 2".into(), self.second_filter.clone()],
            ["Records after Filter 2".into(), self.stage_b_rows.to_string()],
            ["P(B)".into(), format!("{:.2}%", p.p_b)],
            ["P(B|A)".into(), format!("{:.2}%", p.p_b_given_a)],
        ]
    }
}

/// Render the report for the rows in `view_b` and write it to `path`.
pub fn write_pdf(
    request: &ReportRequest,
    table: &SignalTable,
    view_b: &[usize],
    path: &Path,
) -> Result<(), ReportError> {
    let bytes = render_pdf(request, table, view_b)?;
    std::fs::write(path, bytes)?;
    log::info!(
        "wrote report with {} histograms to {}",
        request.histogram_columns.len(),
        path.display()
    );
    Ok(())
}

/// Render the report into memory.
pub fn render_pdf(
    request: &ReportRequest,
    table: &SignalTable,
    view_b: &[usize],
) -> Result<Vec<u8>, ReportError> {
    let mut pdf = PdfWriter::new("Signal Analyzer Report")?;

    // ---- Page 1: filters and metrics ----
    pdf.title("Signal Analyzer Report", 20.0);
    pdf.cursor -= 6.0;

    let filter_rows = request.filter_rows();
    let top = pdf.cursor;
    pdf.table(30.0, top, [53.0, 88.0], &filter_rows);
    pdf.cursor = top - ROW_H * filter_rows.len() as f32 - 10.0;

    let top = pdf.cursor;
    let mut deepest = top;
    for (slot, panel) in request.metrics.iter().take(2).enumerate() {
        let x = 20.0 + slot as f32 * 95.0;
        let mut rows = vec![[format!("Metrics for {}", panel.column), String::new()]];
        match &panel.metrics {
            Some(m) => rows.extend(m.rows().into_iter().map(|(k, v)| [k.to_string(), v])),
            None => rows.push(["No data available".into(), String::new()]),
        }
        pdf.table(x, top, [52.0, 28.0], &rows);
        deepest = deepest.min(top - ROW_H * rows.len() as f32);
    }
    pdf.cursor = deepest;

    // ---- Histograms, two per row ----
    if !request.histogram_columns.is_empty() {
        pdf.new_page();
        pdf.title("Histograms", 20.0);
        pdf.cursor -= 6.0;

        for pair in request.histogram_columns.chunks(2) {
            if pdf.cursor - CHART_H < MARGIN {
                pdf.new_page();
            }
            let top = pdf.cursor;
            for (slot, column) in pair.iter().enumerate() {
                let x = MARGIN + 2.0 + slot as f32 * (CHART_W + CHART_GAP);
                let values = table.numeric_values(column, view_b);
                let hist = Histogram::freedman_diaconis(&values, view_b.len());
                pdf.histogram(x, top, column, hist.as_ref());
            }
            pdf.cursor = top - CHART_H - CHART_GAP;
        }
    }

    pdf.finish()
}

// ---------------------------------------------------------------------------
// Drawing helpers over printpdf
// ---------------------------------------------------------------------------

struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Top of the free area on the current page, measured from the bottom.
    cursor: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self, ReportError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor: PAGE_H - MARGIN,
        })
    }

    fn finish(self) -> Result<Vec<u8>, ReportError> {
        Ok(self.doc.save_to_bytes()?)
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_H - MARGIN;
    }

    fn fill(&self, (r, g, b): (f32, f32, f32)) {
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    fn rect(&self, x: f32, y: f32, w: f32, h: f32) {
        self.layer.add_rect(Rect::new(Mm(x), Mm(y), Mm(x + w), Mm(y + h)));
    }

    fn text(&self, s: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(s, size, Mm(x), Mm(y), font);
    }

    /// Rough Helvetica width, good enough for centring.
    fn text_width(s: &str, size: f32) -> f32 {
        s.chars().count() as f32 * size * 0.5 * PT_TO_MM
    }

    fn title(&mut self, s: &str, size: f32) {
        let baseline = self.cursor - size * PT_TO_MM;
        self.fill(BLACK);
        self.text(s, size, (PAGE_W - Self::text_width(s, size)) / 2.0, baseline, true);
        self.cursor = baseline;
    }

    /// Two-column table with a grey header row and beige body, top-left at (x, top).
    fn table(&self, x: f32, top: f32, widths: [f32; 2], rows: &[[String; 2]]) {
        for (r, row) in rows.iter().enumerate() {
            let y = top - ROW_H * (r + 1) as f32;
            let header = r == 0;
            let mut cx = x;
            for (c, cell) in row.iter().enumerate() {
                let w = widths[c];
                self.fill(BLACK);
                self.rect(cx, y, w, ROW_H);
                self.fill(if header { GREY } else { BEIGE });
                self.rect(cx + 0.25, y + 0.25, w - 0.5, ROW_H - 0.5);

                let size = if header { 10.0 } else { 9.0 };
                self.fill(if header { WHITE_SMOKE } else { BLACK });
                self.text(&fit(cell, w - 3.0, size), size, cx + 1.5, y + 2.2, header);
                cx += w;
            }
        }
    }

    /// One histogram in a `CHART_W` x `CHART_H` box whose top-left is (x, top).
    fn histogram(&self, x: f32, top: f32, column: &str, hist: Option<&Histogram>) {
        let title = format!("Distribution of \"{column}\"");
        self.fill(BLACK);
        self.text(
            &fit(&title, CHART_W, 10.0),
            10.0,
            x + (CHART_W - Self::text_width(&title, 10.0).min(CHART_W)) / 2.0,
            top - 4.0,
            true,
        );

        let Some(hist) = hist else {
            self.text("No data", 9.0, x + CHART_W / 2.0 - 6.0, top - CHART_H / 2.0, false);
            return;
        };

        let plot_x = x + 8.0;
        let plot_w = CHART_W - 10.0;
        let plot_y = top - CHART_H + 8.0;
        let plot_h = CHART_H - 16.0;
        let max_count = hist.max_count().max(1) as f32;
        let slot = plot_w / hist.bins.len() as f32;

        for (i, bin) in hist.bins.iter().enumerate() {
            let h = bin.count as f32 / max_count * plot_h;
            if h > 0.0 {
                self.fill(to_unit_rgb(bar_color(bin)));
                self.rect(plot_x + i as f32 * slot + slot * 0.1, plot_y, slot * 0.8, h);
            }
        }

        self.fill(BLACK);
        self.rect(plot_x, plot_y - 0.3, plot_w, 0.3);
        self.rect(plot_x - 0.3, plot_y, 0.3, plot_h);
        self.text(&format!("{}", hist.max_count()), 7.0, x, plot_y + plot_h - 2.0, false);
        self.text("0", 7.0, x + 4.0, plot_y, false);
        if let (Some(first), Some(last)) = (hist.bins.first(), hist.bins.last()) {
            self.text(&format!("{:.1}", first.start), 7.0, plot_x, plot_y - 4.0, false);
            let end = format!("{:.1}", last.end);
            self.text(&end, 7.0, plot_x + plot_w - Self::text_width(&end, 7.0), plot_y - 4.0, false);
        }
        self.text("Value", 8.0, plot_x + plot_w / 2.0 - 4.0, plot_y - 7.0, false);
    }
}

const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const GREY: (f32, f32, f32) = (0.5, 0.5, 0.5);
const BEIGE: (f32, f32, f32) = (0.96, 0.96, 0.86);
const WHITE_SMOKE: (f32, f32, f32) = (0.96, 0.96, 0.96);

/// Truncate `s` with an ellipsis so it roughly fits `width` millimetres.
fn fit(s: &str, width: f32, size: f32) -> String {
    let max_chars = (width / (size * 0.5 * PT_TO_MM)).floor() as usize;
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    fn table() -> SignalTable {
        SignalTable::from_rows(
            vec!["Symbol".into(), "R".into(), "MFE".into()],
            (0..40)
                .map(|i| {
                    vec![
                        CellValue::Text(if i % 2 == 0 { "ES" } else { "NQ" }.into()),
                        CellValue::Float((i % 7) as f64 - 3.0),
                        CellValue::Float(i as f64 / 4.0),
                    ]
                })
                .collect(),
        )
    }

    fn request(table: &SignalTable, columns: Vec<String>) -> ReportRequest {
        let all: Vec<usize> = (0..table.len()).collect();
        let values = table.numeric_values("R", &all);
        ReportRequest {
            first_filter: "Symbol (all values)".into(),
            second_filter: "R >= -3.00 and <= 3.00".into(),
            total_rows: table.len(),
            stage_a_rows: table.len(),
            stage_b_rows: table.len(),
            probabilities: Probabilities {
                p_a: 100.0,
                p_b: 100.0,
                p_b_given_a: 100.0,
            },
            metrics: vec![
                MetricsPanel {
                    column: "R".into(),
                    metrics: TradeMetrics::compute(&values, values.len()),
                },
                MetricsPanel {
                    column: "Symbol".into(),
                    metrics: None,
                },
            ],
            histogram_columns: columns,
        }
    }

    #[test]
    fn scope_resolves_histogram_columns() {
        let t = table();
        let visible = vec!["MFE".to_string(), "Symbol".to_string(), "R".to_string()];
        assert_eq!(
            ReportScope::VisibleHistograms.columns(&t, &visible),
            vec!["MFE".to_string(), "R".to_string()]
        );
        assert_eq!(
            ReportScope::AllNumericColumns.columns(&t, &visible),
            vec!["R".to_string(), "MFE".to_string()]
        );
    }

    #[test]
    fn filter_rows_show_all_three_probabilities() {
        let t = table();
        let rows = request(&t, Vec::new()).filter_rows();
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[2], ["Total Records".to_string(), "40".to_string()]);
        assert_eq!(rows[8], ["P(B|A)".to_string(), "100.00%".to_string()]);
    }

    #[test]
    fn writes_a_pdf_file() {
        let t = table();
        let all: Vec<usize> = (0..t.len()).collect();
        let columns = vec!["R".to_string(), "MFE".to_string(), "R".to_string()];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE_NAME);

        write_pdf(&request(&t, columns), &t, &all, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    /// Page objects in a rendered document (`/Type /Page`, not `/Pages`).
    fn page_count(bytes: &[u8]) -> usize {
        let text = String::from_utf8_lossy(bytes);
        let mut count = 0;
        let mut rest = text.as_ref();
        while let Some(pos) = rest.find("/Type") {
            rest = rest[pos + "/Type".len()..].trim_start();
            if rest.starts_with("/Page") && !rest.starts_with("/Pages") {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn many_histograms_spill_onto_more_pages() {
        let t = table();
        let all: Vec<usize> = (0..t.len()).collect();
        let pages = |n: usize| {
            let columns = vec!["R".to_string(); n];
            page_count(&render_pdf(&request(&t, columns), &t, &all).unwrap())
        };
        assert_eq!(pages(0), 1);
        assert_eq!(pages(2), 2);
        assert!(pages(12) >= 3);
        assert!(pages(24) > pages(12));
    }

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(200);
        let out = fit(&long, 30.0, 9.0);
        assert!(out.ends_with("..."));
        assert!(out.len() < long.len());
        assert_eq!(fit("short", 30.0, 9.0), "short");
    }
}
