use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result, bail};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring common Pandas dtypes.
/// Ordered so cells can key a `BTreeMap` / `BTreeSet`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    Null,
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
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64` for plotting.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// JSON representation used by the converters.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            CellValue::String(s) | CellValue::Date(s) => Value::String(s.clone()),
            CellValue::Integer(i) => Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Null => Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – a loaded rectangular dataset
// ---------------------------------------------------------------------------

/// Column-named rows, every row as wide as the header.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table, padding short rows with nulls and rejecting long ones.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let width = columns.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (i, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                bail!("Row {i} has {} cells but the header has {width}", row.len());
            }
            row.resize(width, CellValue::Null);
            padded.push(row);
        }
        Ok(Table {
            columns,
            rows: padded,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("Column '{name}' not found (have: {:?})", self.columns))
    }

    /// All cells of a column rendered as text.
    pub fn text_column(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].to_string()).collect())
    }

    /// All cells of a column as numbers; nulls become NaN, text is an error.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, r)| match &r[idx] {
                CellValue::Null => Ok(f64::NAN),
                v => v
                    .as_f64()
                    .with_context(|| format!("Row {i}, column '{name}': '{v}' is not a number")),
            })
            .collect()
    }

    /// Columns whose non-null cells are all numeric.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                self.rows
                    .iter()
                    .all(|r| r[*i].is_null() || r[*i].as_f64().is_some())
            })
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Distinct values of a column in first-seen order, with their row indices.
    pub fn group_rows(&self, name: &str) -> Result<Vec<(String, Vec<usize>)>> {
        let idx = self.column_index(name)?;
        let mut order: Vec<(String, Vec<usize>)> = Vec::new();
        let mut position: BTreeMap<String, usize> = BTreeMap::new();
        for (row_no, row) in self.rows.iter().enumerate() {
            let label = row[idx].to_string();
            match position.get(&label) {
                Some(&p) => order[p].1.push(row_no),
                None => {
                    position.insert(label.clone(), order.len());
                    order.push((label, vec![row_no]));
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    #[test]
    fn short_rows_are_padded() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![s("x")], vec![s("y"), CellValue::Integer(2)]],
        )
        .unwrap();
        assert_eq!(table.rows[0], vec![s("x"), CellValue::Null]);
        assert!(Table::new(vec!["a".into()], vec![vec![s("x"), s("y")]]).is_err());
    }

    #[test]
    fn grouping_keeps_first_seen_order() {
        let table = Table::new(
            vec!["tumor".into(), "n".into()],
            vec![
                vec![s("Neuroblastoma"), CellValue::Integer(3)],
                vec![s("Glioma"), CellValue::Integer(1)],
                vec![s("Neuroblastoma"), CellValue::Float(2.5)],
            ],
        )
        .unwrap();

        let groups = table.group_rows("tumor").unwrap();
        assert_eq!(groups[0], ("Neuroblastoma".to_string(), vec![0, 2]));
        assert_eq!(groups[1], ("Glioma".to_string(), vec![1]));
        assert_eq!(table.numeric_column("n").unwrap(), vec![3.0, 1.0, 2.5]);
        assert_eq!(table.numeric_columns(), vec!["n".to_string()]);
        assert!(table.numeric_column("tumor").is_err());
    }
}
