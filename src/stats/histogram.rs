// ---------------------------------------------------------------------------
// Freedman-Diaconis histogram
// ---------------------------------------------------------------------------

/// One half-open bin `[start, end)`; the last bin also holds the maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

impl Bin {
    pub fn label(&self) -> String {
        format!("[{:.1}, {:.1})", self.start, self.end)
    }

    /// Bins starting below zero are drawn in the loss colour.
    pub fn is_negative(&self) -> bool {
        self.start < 0.0
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bins: Vec<Bin>,
    pub bin_width: f64,
}

impl Histogram {
    /// Bin `values` with width `2 * IQR * n^(-1/3)`.
    ///
    /// `rows` is the size of the view the values came from; rows where the
    /// column is missing still count towards `n`. A zero IQR falls back to a tenth of the range, and a constant sample
    /// yields a single bin holding every value. `None` for an empty sample;
    /// non-finite values are ignored.
    pub fn freedman_diaconis(values: &[f64], rows: usize) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let sample_size = rows.max(n);
        let min = sorted[0];
        let max = sorted[n - 1];
        let range = max - min;

        if range == 0.0 {
            return Some(Histogram {
                bins: vec![Bin {
                    start: min,
                    end: max,
                    count: n,
                }],
                bin_width: 0.0,
            });
        }

        let iqr = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);
        let mut width = 2.0 * iqr * (sample_size as f64).powf(-1.0 / 3.0);
        if width <= 0.0 {
            width = range / 10.0;
        }

        let num_bins = ((range / width).ceil() as usize).max(1);
        let step = range / num_bins as f64;
        let edge = |i: usize| {
            if i == num_bins {
                max
            } else {
                min + step * i as f64
            }
        };

        let mut bins: Vec<Bin> = (0..num_bins)
            .map(|i| Bin {
                start: edge(i),
                end: edge(i + 1),
                count: 0,
            })
            .collect();

        for &v in &sorted {
            let idx = (((v - min) / step).floor() as usize).min(num_bins - 1);
            bins[idx].count += 1;
        }

        Some(Histogram {
            bins,
            bin_width: step,
        })
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    pub fn max_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

/// Linear-interpolation quantile of an ascending slice (`0 <= q <= 1`).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_interpolate_linearly() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&s, 0.25), 1.75);
        assert_eq!(quantile_sorted(&s, 0.75), 3.25);
        assert_eq!(quantile_sorted(&s, 0.5), 2.5);
    }

    #[test]
    fn bins_cover_the_range_and_count_every_value() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 10.0 - 3.0).collect();
        let h = Histogram::freedman_diaconis(&values, values.len()).unwrap();

        // IQR = 4.95, n = 100 -> width = 9.9 / 100^(1/3) ~ 2.13 -> ceil(9.9 / 2.13) = 5
        assert_eq!(h.bins.len(), 5);
        assert_eq!(h.total(), 100);
        assert_eq!(h.bins[0].start, -3.0);
        assert_eq!(h.bins.last().unwrap().end, values[99]);
        for pair in h.bins.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn missing_rows_count_towards_bin_width() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 10.0 - 3.0).collect();
        // n = 800 -> width = 9.9 / 800^(1/3) ~ 1.07 -> ceil(9.9 / 1.07) = 10
        let h = Histogram::freedman_diaconis(&values, 800).unwrap();
        assert_eq!(h.bins.len(), 10);
        assert_eq!(h.total(), 100);
    }

    #[test]
    fn negative_bins_are_flagged() {
        let h = Histogram::freedman_diaconis(&[-2.0, -1.0, 0.5, 1.0, 2.0, 3.0], 6).unwrap();
        assert!(h.bins[0].is_negative());
        assert!(!h.bins.last().unwrap().is_negative());
    }

    #[test]
    fn zero_iqr_falls_back_to_tenth_of_range() {
        let mut values = vec![1.0; 20];
        values.push(11.0);
        let h = Histogram::freedman_diaconis(&values, values.len()).unwrap();
        assert_eq!(h.bins.len(), 10);
        assert_eq!(h.bins[0].count, 20);
        assert_eq!(h.bins[9].count, 1);
    }

    #[test]
    fn constant_sample_is_one_bin() {
        let h = Histogram::freedman_diaconis(&[2.0, 2.0, 2.0], 3).unwrap();
        assert_eq!(h.bins.len(), 1);
        assert_eq!(h.bins[0].count, 3);
    }

    #[test]
    fn empty_sample_has_no_histogram() {
        assert!(Histogram::freedman_diaconis(&[], 4).is_none());
        assert!(Histogram::freedman_diaconis(&[f64::NAN], 1).is_none());
    }

    #[test]
    fn labels_use_one_decimal() {
        let b = Bin {
            start: -1.26,
            end: 0.5,
            count: 3,
        };
        assert_eq!(b.label(), "[-1.3, 0.5)");
    }
}
