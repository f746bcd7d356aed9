//! In-memory tables loaded from delimited text files
//!
//! A table is loaded once and never mutated. Cell types are inferred per cell:
//! integers, floats, booleans, empty cells (null), and everything else as text.
//! A numeric column that holds any float or any empty cell is widened to floats.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::core::{Result, TabletalkError};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Infer the scalar type of a raw CSV field
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Scalar::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Scalar::Int(i);
        }
        // "nan" and "inf" parse as f64 but are names, not numbers
        if raw.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = raw.parse::<f64>() {
                return Scalar::Float(f);
            }
        }
        match raw {
            "True" | "true" | "TRUE" => Scalar::Bool(true),
            "False" | "false" | "FALSE" => Scalar::Bool(false),
            _ => Scalar::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NaN"),
            Scalar::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

/// An immutable table: ordered columns and ordered rows
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Build a table from columns and rows, checking every row has one value per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(TabletalkError::data(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Load a CSV file with a header row
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(TabletalkError::data(format!(
                "{} does not exist or is not a file",
                path.display()
            )));
        }

        let file = File::open(path).map_err(|e| {
            TabletalkError::data(format!("cannot open {}: {}", path.display(), e))
        })?;

        let table = Self::from_reader(file)
            .map_err(|e| TabletalkError::data(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns.len(),
            "Loaded dataset"
        );

        Ok(table)
    }

    /// Parse CSV from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()
            .map_err(|e| TabletalkError::data(format!("unreadable header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(TabletalkError::data("missing header row"));
        }

        let mut rows: Vec<Vec<Scalar>> = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| TabletalkError::data(format!("malformed row: {}", e)))?;
            rows.push(record.iter().map(Scalar::parse).collect());
        }

        for col in 0..columns.len() {
            widen_numeric_column(&mut rows, col);
        }

        Self::new(columns, rows)
    }

    /// Column names in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in file order
    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Turn the integers of `col` into floats when the column also holds floats or nulls
fn widen_numeric_column(rows: &mut [Vec<Scalar>], col: usize) {
    let cells = || rows.iter().filter_map(|row| row.get(col));

    let numeric = cells().all(|v| matches!(v, Scalar::Null | Scalar::Int(_) | Scalar::Float(_)));
    let has_int = cells().any(|v| matches!(v, Scalar::Int(_)));
    let has_float_or_null = cells().any(|v| v.is_null() || matches!(v, Scalar::Float(_)));

    if !(numeric && has_int && has_float_or_null) {
        return;
    }

    for row in rows.iter_mut() {
        if let Some(cell) = row.get_mut(col) {
            if let Scalar::Int(i) = *cell {
                *cell = Scalar::Float(i as f64);
            }
        }
    }
}
