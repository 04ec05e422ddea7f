//! In-memory tables and the exact comparison used to judge parser output.
//!
//! Reference tables are read from CSV with pandas' default inference rules, so a
//! DataFrame produced by a generated parser can be compared dtype for dtype.

use std::fmt;

use serde_json::Value;

pub const DTYPE_INT: &str = "int64";
pub const DTYPE_FLOAT: &str = "float64";
pub const DTYPE_BOOL: &str = "bool";
pub const DTYPE_OBJECT: &str = "object";

/// Strings pandas `read_csv` treats as missing by default.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];
const TRUE_VALUES: &[&str] = &["True", "TRUE", "true"];
const FALSE_VALUES: &[&str] = &["False", "FALSE", "false"];

static NULL_CELL: Cell = Cell::Null;

/// A single table value. `Null` covers NaN, None and NaT alike.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Decode a JSON value emitted by the parser helper.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Cell::Float(f)
                } else {
                    Cell::Text(n.to_string())
                }
            }
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NaN"),
            Cell::Bool(true) => write!(f, "True"),
            Cell::Bool(false) => write!(f, "False"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v:?}"),
            Cell::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// A column-ordered table with per-column dtype names.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    /// One dtype name per column (`int64`, `float64`, `bool`, `object`, ...).
    pub dtypes: Vec<String>,
    /// Whether the row index is the default `0..n` range.
    pub default_index: bool,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table from raw string records, inferring each column's dtype.
    pub fn infer(columns: Vec<String>, records: &[Vec<String>]) -> Self {
        let mut cells: Vec<Vec<Cell>> = vec![Vec::with_capacity(columns.len()); records.len()];
        let mut dtypes = Vec::with_capacity(columns.len());

        for col in 0..columns.len() {
            let raw: Vec<&str> = records
                .iter()
                .map(|record| record.get(col).map(String::as_str).unwrap_or(""))
                .collect();
            let (dtype, values) = infer_column(&raw);
            dtypes.push(dtype.to_string());
            for (row, value) in values.into_iter().enumerate() {
                cells[row].push(value);
            }
        }

        Self {
            columns,
            dtypes,
            default_index: true,
            rows: cells,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `(row, col)`, or `Null` when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&NULL_CELL)
    }

    pub fn dtype(&self, col: usize) -> &str {
        self.dtypes.get(col).map(String::as_str).unwrap_or("")
    }
}

fn is_na(raw: &str) -> bool {
    NA_VALUES.contains(&raw)
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    if TRUE_VALUES.contains(&raw) {
        Some(true)
    } else if FALSE_VALUES.contains(&raw) {
        Some(false)
    } else {
        None
    }
}

/// Infer one column the way pandas `read_csv` does with default options.
fn infer_column(raw: &[&str]) -> (&'static str, Vec<Cell>) {
    if raw.is_empty() {
        return (DTYPE_OBJECT, Vec::new());
    }
    let has_missing = raw.iter().any(|value| is_na(value));
    let present = || raw.iter().filter(|value| !is_na(value));

    if !has_missing && raw.iter().all(|value| parse_int(value).is_some()) {
        let cells = raw
            .iter()
            .map(|value| parse_int(value).map(Cell::Int).unwrap_or(Cell::Null))
            .collect();
        return (DTYPE_INT, cells);
    }

    if present().all(|value| parse_float(value).is_some()) {
        let cells = raw
            .iter()
            .map(|value| {
                if is_na(value) {
                    Cell::Null
                } else {
                    parse_float(value).map(Cell::Float).unwrap_or(Cell::Null)
                }
            })
            .collect();
        return (DTYPE_FLOAT, cells);
    }

    if !has_missing && raw.iter().all(|value| parse_bool(value).is_some()) {
        let cells = raw
            .iter()
            .map(|value| parse_bool(value).map(Cell::Bool).unwrap_or(Cell::Null))
            .collect();
        return (DTYPE_BOOL, cells);
    }

    let cells = raw
        .iter()
        .map(|value| {
            if is_na(value) {
                Cell::Null
            } else {
                Cell::Text((*value).to_string())
            }
        })
        .collect();
    (DTYPE_OBJECT, cells)
}

/// First structural difference between a reference table and a produced table.
///
/// Variants are ordered by priority: a column difference hides everything else,
/// then the row count, then dtypes, the index, and finally cell values.
#[derive(Debug, Clone, PartialEq)]
pub enum TableDiff {
    Columns {
        expected: Vec<String>,
        got: Vec<String>,
    },
    RowCount {
        expected: usize,
        got: usize,
    },
    Dtype {
        rows: usize,
        column: String,
        expected: String,
        got: String,
    },
    Index {
        rows: usize,
    },
    Cell {
        rows: usize,
        row: usize,
        column: String,
        expected: Cell,
        got: Cell,
    },
}

impl fmt::Display for TableDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableDiff::Columns { expected, got } => write!(
                f,
                "Column mismatch. Expected: {}, Got: {}",
                py_list(expected),
                py_list(got)
            ),
            TableDiff::RowCount { expected, got } => write!(
                f,
                "Data mismatch. Expected {expected} rows, got {got} rows"
            ),
            TableDiff::Dtype {
                rows,
                column,
                expected,
                got,
            } => write!(
                f,
                "Data mismatch. Expected {rows} rows, got {rows} rows; column '{column}' has dtype {got}, expected {expected}"
            ),
            TableDiff::Index { rows } => write!(
                f,
                "Data mismatch. Expected {rows} rows, got {rows} rows; index is not the default RangeIndex (use reset_index(drop=True))"
            ),
            TableDiff::Cell {
                rows,
                row,
                column,
                expected,
                got,
            } => write!(
                f,
                "Data mismatch. Expected {rows} rows, got {rows} rows; first difference at row {row}, column '{column}': expected {expected}, got {got}"
            ),
        }
    }
}

fn py_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Text columns are `object` before pandas 3 and `str` after; `string` is the
/// opt-in extension dtype. All of them hold the same values.
fn dtype_family(dtype: &str) -> &str {
    match dtype {
        "str" | "string" => DTYPE_OBJECT,
        other if other.starts_with("string[") => DTYPE_OBJECT,
        other => other,
    }
}

/// Compare `got` against `expected` for exact structural equality.
///
/// Returns `None` when the tables are equal: same columns in the same order,
/// same row count, same dtypes, default index, and equal cells (missing values
/// compare equal to each other).
pub fn compare_tables(expected: &Table, got: &Table) -> Option<TableDiff> {
    if expected.columns != got.columns {
        return Some(TableDiff::Columns {
            expected: expected.columns.clone(),
            got: got.columns.clone(),
        });
    }

    let rows = expected.row_count();
    if rows != got.row_count() {
        return Some(TableDiff::RowCount {
            expected: rows,
            got: got.row_count(),
        });
    }

    for (col, name) in expected.columns.iter().enumerate() {
        if dtype_family(expected.dtype(col)) != dtype_family(got.dtype(col)) {
            return Some(TableDiff::Dtype {
                rows,
                column: name.clone(),
                expected: expected.dtype(col).to_string(),
                got: got.dtype(col).to_string(),
            });
        }
    }

    if !expected.default_index || !got.default_index {
        return Some(TableDiff::Index { rows });
    }

    for row in 0..rows {
        for (col, name) in expected.columns.iter().enumerate() {
            let want = expected.cell(row, col);
            let have = got.cell(row, col);
            if want != have {
                return Some(TableDiff::Cell {
                    rows,
                    row,
                    column: name.clone(),
                    expected: want.clone(),
                    got: have.clone(),
                });
            }
        }
    }

    None
}
