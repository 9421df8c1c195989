use std::collections::BTreeSet;
use std::fmt;

use chrono::{Days, NaiveDate, NaiveTime};

use super::model::{CellValue, ColumnKind, SignalTable};

// ---------------------------------------------------------------------------
// Bound operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LowerBound {
    /// `value >= min`
    #[default]
    AtLeast,
    /// `value > min`
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpperBound {
    /// `value <= max`
    #[default]
    AtMost,
    /// `value < max`
    Below,
}

impl LowerBound {
    pub const ALL: [LowerBound; 2] = [LowerBound::AtLeast, LowerBound::Above];

    fn admits(self, value: f64, min: f64) -> bool {
        match self {
            LowerBound::AtLeast => value >= min,
            LowerBound::Above => value > min,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LowerBound::AtLeast => "Greater than or equal to",
            LowerBound::Above => "Greater than",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            LowerBound::AtLeast => ">=",
            LowerBound::Above => ">",
        }
    }
}

impl UpperBound {
    pub const ALL: [UpperBound; 2] = [UpperBound::AtMost, UpperBound::Below];

    fn admits(self, value: f64, max: f64) -> bool {
        match self {
            UpperBound::AtMost => value <= max,
            UpperBound::Below => value < max,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UpperBound::AtMost => "Less than or equal to",
            UpperBound::Below => "Less than",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            UpperBound::AtMost => "<=",
            UpperBound::Below => "<",
        }
    }
}

// ---------------------------------------------------------------------------
// Condition: the predicate applied to one column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Pass-through.
    Any,
    /// Numeric interval; missing values never pass.
    Range {
        min: f64,
        lower: LowerBound,
        max: f64,
        upper: UpperBound,
    },
    /// Whole-day inclusive date interval; missing values never pass.
    DateRange { start: NaiveDate, end: NaiveDate },
    /// Value membership. An empty set means "no filter".
    OneOf(BTreeSet<CellValue>),
}

impl Condition {
    fn admits(&self, cell: &CellValue) -> bool {
        match self {
            Condition::Any => true,
            Condition::Range {
                min,
                lower,
                max,
                upper,
            } => cell
                .as_f64()
                .is_some_and(|v| lower.admits(v, *min) && upper.admits(v, *max)),
            Condition::DateRange { start, end } => {
                let from = start.and_time(NaiveTime::MIN);
                let until = end
                    .checked_add_days(Days::new(1))
                    .map(|d| d.and_time(NaiveTime::MIN));
                cell.as_datetime()
                    .is_some_and(|v| v >= from && until.map_or(true, |u| v < u))
            }
            Condition::OneOf(selected) => selected.is_empty() || selected.contains(cell),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter: a condition bound to a column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub condition: Condition,
}

impl Filter {
    /// The default (everything passes) condition for the column's kind.
    pub fn for_column(table: &SignalTable, column: &str) -> Self {
        let condition = match table.kind(column) {
            Some(ColumnKind::Numeric) => match table.numeric_range(column) {
                Some((min, max)) => Condition::Range {
                    min,
                    lower: LowerBound::AtLeast,
                    max,
                    upper: UpperBound::AtMost,
                },
                None => Condition::Any,
            },
            Some(ColumnKind::DateTime) => match table.date_range(column) {
                Some((start, end)) => Condition::DateRange { start, end },
                None => Condition::Any,
            },
            Some(ColumnKind::Categorical) => Condition::OneOf(BTreeSet::new()),
            None => Condition::Any,
        };
        Filter {
            column: column.to_string(),
            condition,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col = &self.column;
        match &self.condition {
            Condition::Any => write!(f, "{col} (all rows)"),
            Condition::Range {
                min,
                lower,
                max,
                upper,
            } => write!(
                f,
                "{col} {} {min:.2} and {} {max:.2}",
                lower.symbol(),
                upper.symbol()
            ),
            Condition::DateRange { start, end } => write!(f, "{col} from {start} to {end}"),
            Condition::OneOf(set) if set.is_empty() => write!(f, "{col} (all values)"),
            Condition::OneOf(set) => {
                let values: Vec<String> = set.iter().map(|v| v.to_string()).collect();
                write!(f, "{col} in [{}]", values.join(", "))
            }
        }
    }
}

/// Return the subset of `base` (row indices) that pass `filter`, in order.
/// A column the table does not have passes everything through.
pub fn apply(table: &SignalTable, base: &[usize], filter: &Filter) -> Vec<usize> {
    let Some(col) = table.column_index(&filter.column) else {
        return base.to_vec();
    };
    base.iter()
        .copied()
        .filter(|&i| {
            table
                .rows
                .get(i)
                .is_some_and(|row| filter.condition.admits(&row[col]))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Two-stage chain and its probability readouts
// ---------------------------------------------------------------------------

/// Row indices surviving each stage. `stage_b` is always a subset of `stage_a`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterViews {
    pub stage_a: Vec<usize>,
    pub stage_b: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub first: Filter,
    pub second: Filter,
}

impl FilterChain {
    /// Run both stages from scratch over the full table.
    pub fn run(&self, table: &SignalTable) -> FilterViews {
        let all: Vec<usize> = (0..table.len()).collect();
        let stage_a = apply(table, &all, &self.first);
        let stage_b = apply(table, &stage_a, &self.second);
        log::debug!(
            "filter chain: {} rows -> A {} -> B {}",
            table.len(),
            stage_a.len(),
            stage_b.len()
        );
        FilterViews { stage_a, stage_b }
    }
}

/// Percentages shown next to the filters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Probabilities {
    /// Rows passing filter 1 over all rows.
    pub p_a: f64,
    /// Rows passing both filters over all rows.
    pub p_b: f64,
    /// Rows passing both filters over rows passing filter 1.
    pub p_b_given_a: f64,
}

impl Probabilities {
    pub fn from_views(views: &FilterViews, total_rows: usize) -> Self {
        fn percent(part: usize, whole: usize) -> f64 {
            if whole == 0 {
                0.0
            } else {
                part as f64 / whole as f64 * 100.0
            }
        }
        Probabilities {
            p_a: percent(views.stage_a.len(), total_rows),
            p_b: percent(views.stage_b.len(), total_rows),
            p_b_given_a: percent(views.stage_b.len(), views.stage_a.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;

    fn at(s: &str) -> CellValue {
        CellValue::DateTime(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    fn table() -> SignalTable {
        SignalTable::from_rows(
            vec!["Date".into(), "Symbol".into(), "R".into()],
            vec![
                vec![at("2024-01-01 09:30:00"), CellValue::Text("ES".into()), CellValue::Float(-1.0)],
                vec![at("2024-01-02 15:00:00"), CellValue::Text("NQ".into()), CellValue::Float(0.5)],
                vec![at("2024-01-03 10:00:00"), CellValue::Text("ES".into()), CellValue::Float(2.0)],
                vec![at("2024-01-04 10:00:00"), CellValue::Text("CL".into()), CellValue::Null],
            ],
        )
    }

    fn range(min: f64, lower: LowerBound, max: f64, upper: UpperBound) -> Filter {
        Filter {
            column: "R".into(),
            condition: Condition::Range {
                min,
                lower,
                max,
                upper,
            },
        }
    }

    #[test]
    fn default_filters_pass_every_non_missing_row() {
        let t = table();
        let all = [0, 1, 2, 3];
        assert_eq!(apply(&t, &all, &Filter::for_column(&t, "R")), vec![0, 1, 2]);
        assert_eq!(apply(&t, &all, &Filter::for_column(&t, "Symbol")), vec![0, 1, 2, 3]);
        assert_eq!(apply(&t, &all, &Filter::for_column(&t, "Date")), vec![0, 1, 2, 3]);
    }

    #[test]
    fn strict_and_inclusive_bounds_differ_at_the_edges() {
        let t = table();
        let all = [0, 1, 2, 3];
        let inclusive = range(-1.0, LowerBound::AtLeast, 2.0, UpperBound::AtMost);
        let strict = range(-1.0, LowerBound::Above, 2.0, UpperBound::Below);
        assert_eq!(apply(&t, &all, &inclusive), vec![0, 1, 2]);
        assert_eq!(apply(&t, &all, &strict), vec![1]);
    }

    #[test]
    fn date_range_includes_the_whole_end_day() {
        let t = table();
        let f = Filter {
            column: "Date".into(),
            condition: Condition::DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            },
        };
        assert_eq!(apply(&t, &[0, 1, 2, 3], &f), vec![1, 2]);
    }

    #[test]
    fn categorical_selection_narrows_rows() {
        let t = table();
        let f = Filter {
            column: "Symbol".into(),
            condition: Condition::OneOf([CellValue::Text("ES".into())].into_iter().collect()),
        };
        assert_eq!(apply(&t, &[0, 1, 2, 3], &f), vec![0, 2]);
    }

    #[test]
    fn chain_narrows_monotonically_and_reports_probabilities() {
        let t = table();
        let chain = FilterChain {
            first: Filter {
                column: "Symbol".into(),
                condition: Condition::OneOf([CellValue::Text("ES".into())].into_iter().collect()),
            },
            second: range(0.0, LowerBound::Above, 10.0, UpperBound::AtMost),
        };
        let views = chain.run(&t);
        assert_eq!(views.stage_a, vec![0, 2]);
        assert_eq!(views.stage_b, vec![2]);
        assert!(views.stage_b.iter().all(|i| views.stage_a.contains(i)));

        let p = Probabilities::from_views(&views, t.len());
        assert_eq!(p.p_a, 50.0);
        assert_eq!(p.p_b, 25.0);
        assert_eq!(p.p_b_given_a, 50.0);
    }

    #[test]
    fn empty_views_yield_zero_probabilities() {
        let views = FilterViews::default();
        assert_eq!(Probabilities::from_views(&views, 0), Probabilities::default());
        assert_eq!(Probabilities::from_views(&views, 10).p_b_given_a, 0.0);
    }

    #[test]
    fn unknown_column_passes_through() {
        let t = table();
        let f = Filter {
            column: "Missing".into(),
            condition: Condition::Any,
        };
        assert_eq!(apply(&t, &[3, 1], &f), vec![3, 1]);
    }

    #[test]
    fn descriptions_are_readable() {
        let f = range(-1.0, LowerBound::AtLeast, 2.0, UpperBound::Below);
        assert_eq!(f.to_string(), "R >= -1.00 and < 2.00");
    }
}
