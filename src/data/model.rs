use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

// ---------------------------------------------------------------------------
// CellValue – a single cell of the signal table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common spreadsheet dtypes.
/// Using `BTreeSet` downstream so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn rank(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) | Float(_) => 2,
                Text(_) => 3,
                DateTime(_) => 4,
            }
        }
        let ra = rank(self);
        let rb = rank(other);
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            // Integers and floats share a rank so mixed numeric columns sort by value.
            (Integer(a), Float(b)) => (*a as f64).total_cmp(b).then(std::cmp::Ordering::Less),
            (Float(a), Integer(b)) => a.total_cmp(&(*b as f64)).then(std::cmp::Ordering::Greater),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(d) if d.time() == NaiveTime::MIN => {
                write!(f, "{}", d.format("%Y-%m-%d"))
            }
            CellValue::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Numeric value of the cell; `NaN` counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the cell holds no usable value.
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Null) || matches!(self, CellValue::Float(v) if v.is_nan())
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – how a column is filtered and summarised
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    DateTime,
    Categorical,
}

impl ColumnKind {
    /// Infer the kind from the non-missing cells of a column.
    fn infer<'a>(cells: impl Iterator<Item = &'a CellValue>) -> Self {
        let mut numeric = 0usize;
        let mut dates = 0usize;
        let mut other = 0usize;
        for cell in cells {
            match cell {
                c if c.is_missing() => {}
                CellValue::Integer(_) | CellValue::Float(_) => numeric += 1,
                CellValue::DateTime(_) => dates += 1,
                _ => other += 1,
            }
        }
        match (numeric, dates, other) {
            (n, 0, 0) if n > 0 => ColumnKind::Numeric,
            (0, d, 0) if d > 0 => ColumnKind::DateTime,
            _ => ColumnKind::Categorical,
        }
    }
}

// ---------------------------------------------------------------------------
// SignalTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed table with pre-computed column indices.
#[derive(Debug, Clone)]
pub struct SignalTable {
    /// Column names in file order.
    pub column_names: Vec<String>,
    /// All rows; every row has exactly `column_names.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
    /// Inferred kind per column (same order as `column_names`).
    pub kinds: Vec<ColumnKind>,
    /// For each column the sorted set of unique values.
    pub unique_values: Vec<BTreeSet<CellValue>>,
}

impl SignalTable {
    /// Build column indices from the loaded rows.
    pub fn from_rows(column_names: Vec<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = column_names.len();
        for row in &mut rows {
            row.resize(width, CellValue::Null);
        }

        let mut kinds = Vec::with_capacity(width);
        let mut unique_values = Vec::with_capacity(width);
        for col in 0..width {
            kinds.push(ColumnKind::infer(rows.iter().map(|r| &r[col])));
            unique_values.push(
                rows.iter()
                    .map(|r| r[col].clone())
                    .collect::<BTreeSet<_>>(),
            );
        }

        SignalTable {
            column_names,
            rows,
            kinds,
            unique_values,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.column_index(name).map(|i| self.kinds[i])
    }

    pub fn unique(&self, name: &str) -> Option<&BTreeSet<CellValue>> {
        self.column_index(name).map(|i| &self.unique_values[i])
    }

    /// Names of all numeric columns, in file order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.column_names
            .iter()
            .zip(&self.kinds)
            .filter(|(_, k)| **k == ColumnKind::Numeric)
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Non-missing numeric values of `name` for the given rows, in row order.
    pub fn numeric_values(&self, name: &str, indices: &[usize]) -> Vec<f64> {
        let Some(col) = self.column_index(name) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|&i| self.rows.get(i)?[col].as_f64())
            .collect()
    }

    /// Every non-missing numeric value of `name`.
    pub fn all_numeric_values(&self, name: &str) -> Vec<f64> {
        let all: Vec<usize> = (0..self.len()).collect();
        self.numeric_values(name, &all)
    }

    /// (min, max) of a numeric column over the whole table.
    pub fn numeric_range(&self, name: &str) -> Option<(f64, f64)> {
        let col = self.column_index(name)?;
        self.rows
            .iter()
            .filter_map(|r| r[col].as_f64())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Earliest and latest date of a datetime column over the whole table.
    pub fn date_range(&self, name: &str) -> Option<(NaiveDate, NaiveDate)> {
        let col = self.column_index(name)?;
        let mut dates = self.rows.iter().filter_map(|r| r[col].as_datetime());
        let first = dates.next()?;
        let (lo, hi) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some((lo.date(), hi.date()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> CellValue {
        CellValue::DateTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_time(NaiveTime::MIN),
        )
    }

    fn sample() -> SignalTable {
        SignalTable::from_rows(
            vec!["date".into(), "r".into(), "side".into()],
            vec![
                vec![date(2024, 1, 3), CellValue::Float(1.5), CellValue::Text("long".into())],
                vec![date(2024, 1, 1), CellValue::Integer(-1), CellValue::Text("short".into())],
                vec![CellValue::Null, CellValue::Float(f64::NAN)],
            ],
        )
    }

    #[test]
    fn kinds_are_inferred_from_non_missing_cells() {
        let t = sample();
        assert_eq!(t.kind("date"), Some(ColumnKind::DateTime));
        assert_eq!(t.kind("r"), Some(ColumnKind::Numeric));
        assert_eq!(t.kind("side"), Some(ColumnKind::Categorical));
        assert_eq!(t.numeric_columns(), vec!["r".to_string()]);
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let t = sample();
        assert_eq!(t.rows[2].len(), 3);
        assert_eq!(t.rows[2][2], CellValue::Null);
    }

    #[test]
    fn ranges_skip_missing_values() {
        let t = sample();
        assert_eq!(t.numeric_range("r"), Some((-1.0, 1.5)));
        assert_eq!(t.numeric_values("r", &[0, 1, 2]), vec![1.5, -1.0]);
        let (lo, hi) = t.date_range("date").unwrap();
        assert_eq!(lo, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(hi, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn mixed_integer_and_float_sort_by_value() {
        let mut set = BTreeSet::new();
        set.insert(CellValue::Float(2.5));
        set.insert(CellValue::Integer(1));
        set.insert(CellValue::Integer(3));
        let ordered: Vec<String> = set.iter().map(|v| v.to_string()).collect();
        assert_eq!(ordered, vec!["1", "2.5000", "3"]);
    }

    #[test]
    fn midnight_datetimes_display_as_dates() {
        assert_eq!(date(2024, 5, 6).to_string(), "2024-05-06");
    }
}
