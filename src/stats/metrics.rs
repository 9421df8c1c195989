use std::collections::BTreeMap;

use statrs::statistics::{Data, Median, Statistics};

// ---------------------------------------------------------------------------
// Trade performance metrics for one column of the filtered view
// ---------------------------------------------------------------------------

/// Performance summary of a column holding per-trade results in R multiples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeMetrics {
    /// Share of rows with a positive result, in percent.
    pub win_rate: f64,
    pub net_win: f64,
    pub total_win: f64,
    pub total_loss: f64,
    /// System Quality Number: `mean / std_dev * sqrt(total)`.
    pub sqn: f64,
    pub std_dev: f64,
    pub median: f64,
    pub mode: f64,
    pub mean: f64,
}

impl TradeMetrics {
    /// Compute metrics from the non-missing `values` of a view of `total` rows.
    ///
    /// Rows whose value is missing still count toward `total` (and so lower the
    /// win rate), matching how the view size is shown next to the filters.
    /// Returns `None` for an empty view.
    pub fn compute(values: &[f64], total: usize) -> Option<Self> {
        if total == 0 {
            return None;
        }

        let wins = values.iter().filter(|&&v| v > 0.0).count();
        let total_win: f64 = values.iter().filter(|&&v| v > 0.0).sum();
        let total_loss: f64 = values.iter().filter(|&&v| v < 0.0).sum();

        let (mean, std_dev, median) = match values.len() {
            0 => (0.0, 0.0, 0.0),
            1 => (values[0], 0.0, values[0]),
            _ => (
                values.iter().mean(),
                values.iter().std_dev(),
                Data::new(values.to_vec()).median(),
            ),
        };

        let sqn = if std_dev == 0.0 {
            0.0
        } else {
            mean / std_dev * (total as f64).sqrt()
        };

        Some(TradeMetrics {
            win_rate: wins as f64 / total as f64 * 100.0,
            net_win: total_win + total_loss,
            total_win,
            total_loss,
            sqn,
            std_dev,
            median,
            mode: mode(values).unwrap_or(0.0),
            mean,
        })
    }

    /// `(label, formatted value)` rows in display order.
    pub fn rows(&self) -> [(&'static str, String); 9] {
        [
            ("Win Rate", format!("{:.2}%", self.win_rate)),
            ("Net Win", format!("{:.2} R", self.net_win)),
            ("Total Win", format!("{:.2} R", self.total_win)),
            ("Total Loss", format!("{:.2} R", self.total_loss)),
            ("SQN", format!("{:.2}", self.sqn)),
            ("StdDev", format!("{:.2}", self.std_dev)),
            ("Median R", format!("{:.2}", self.median)),
            ("Mode", format!("{:.2}", self.mode)),
            ("Avrg R", format!("{:.2}", self.mean)),
        ]
    }
}

/// Most frequent value; the smallest one wins ties.
fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for &v in values {
        // -0.0 and 0.0 are the same trade result.
        let v = if v == 0.0 { 0.0 } else { v };
        counts.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then(vb.total_cmp(va)))
        .map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn win_loss_sums_and_rate() {
        let values = [2.0, -1.0, 3.0, -1.0, 0.0];
        let m = TradeMetrics::compute(&values, values.len()).unwrap();
        assert!(close(m.win_rate, 40.0));
        assert!(close(m.total_win, 5.0));
        assert!(close(m.total_loss, -2.0));
        assert!(close(m.net_win, 3.0));
        assert!(close(m.mean, 0.6));
        assert!(close(m.median, 0.0));
        assert!(close(m.mode, -1.0));
    }

    #[test]
    fn sqn_uses_sample_std_dev() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let m = TradeMetrics::compute(&values, 4).unwrap();
        // sample std of 1..=4 is sqrt(5/3)
        let std = (5.0f64 / 3.0).sqrt();
        assert!(close(m.std_dev, std));
        assert!(close(m.sqn, 2.5 / std * 2.0));
    }

    #[test]
    fn missing_values_count_toward_total() {
        let m = TradeMetrics::compute(&[1.0, -1.0], 4).unwrap();
        assert!(close(m.win_rate, 25.0));
    }

    #[test]
    fn degenerate_inputs() {
        assert!(TradeMetrics::compute(&[], 0).is_none());

        let single = TradeMetrics::compute(&[1.5], 1).unwrap();
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(single.sqn, 0.0);
        assert_eq!(single.median, 1.5);

        let all_missing = TradeMetrics::compute(&[], 3).unwrap();
        assert_eq!(all_missing.win_rate, 0.0);
        assert_eq!(all_missing.mode, 0.0);
    }

    #[test]
    fn mode_prefers_smallest_on_ties() {
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn rows_are_formatted_for_display() {
        let m = TradeMetrics::compute(&[2.0, -1.0], 2).unwrap();
        let rows = m.rows();
        assert_eq!(rows[0], ("Win Rate", "50.00%".to_string()));
        assert_eq!(rows[1], ("Net Win", "1.00 R".to_string()));
    }
}
