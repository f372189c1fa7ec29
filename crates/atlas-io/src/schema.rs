//! Column and table types for tabular payloads
//!
//! Both flat CSV tables and the attribute part of vector datasets are held
//! as a [`DataTable`]: an ordered list of named, typed columns of equal
//! length.

use serde::{Deserialize, Serialize};

use crate::codec::{IoError, IoResult};

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Float64,
    Int32,
    Int64,
    Bool,
    String,
}

impl ColumnType {
    /// Size in bytes for fixed-width types
    pub fn byte_size(&self) -> Option<usize> {
        match self {
            ColumnType::Float64 => Some(8),
            ColumnType::Int32 => Some(4),
            ColumnType::Int64 => Some(8),
            ColumnType::Bool => Some(1),
            ColumnType::String => None,
        }
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Float64 | ColumnType::Int32 | ColumnType::Int64
        )
    }
}

/// A column of data
#[derive(Debug, Clone, PartialEq)]
pub enum DataColumn {
    Float64(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    String(Vec<String>),
}

impl DataColumn {
    /// Get the column type
    pub fn dtype(&self) -> ColumnType {
        match self {
            DataColumn::Float64(_) => ColumnType::Float64,
            DataColumn::Int32(_) => ColumnType::Int32,
            DataColumn::Int64(_) => ColumnType::Int64,
            DataColumn::Bool(_) => ColumnType::Bool,
            DataColumn::String(_) => ColumnType::String,
        }
    }

    /// Get the number of elements
    pub fn len(&self) -> usize {
        match self {
            DataColumn::Float64(v) => v.len(),
            DataColumn::Int32(v) => v.len(),
            DataColumn::Int64(v) => v.len(),
            DataColumn::Bool(v) => v.len(),
            DataColumn::String(v) => v.len(),
        }
    }

    /// Check if the column is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to f64 (for numeric types)
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            DataColumn::Float64(v) => Some(v.clone()),
            DataColumn::Int32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            DataColumn::Int64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// Render one cell as text.
    ///
    /// Missing floats (NaN) render as an empty string. Other floats use the
    /// shortest representation that parses back to the same value and always
    /// carry a fractional part or exponent, so a whole-valued float column is
    /// not re-inferred as integers.
    pub fn format_cell(&self, row: usize) -> Option<String> {
        match self {
            DataColumn::Float64(v) => v.get(row).map(|x| {
                if x.is_nan() {
                    String::new()
                } else {
                    format!("{:?}", x)
                }
            }),
            DataColumn::Int32(v) => v.get(row).map(|x| x.to_string()),
            DataColumn::Int64(v) => v.get(row).map(|x| x.to_string()),
            DataColumn::Bool(v) => v.get(row).map(|x| x.to_string()),
            DataColumn::String(v) => v.get(row).cloned(),
        }
    }
}

/// An in-memory table with named columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    names: Vec<String>,
    columns: Vec<DataColumn>,
}

impl DataTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    ///
    /// Fails if the name is already taken or the length disagrees with the
    /// columns already present.
    pub fn add_column(&mut self, name: impl Into<String>, data: DataColumn) -> IoResult<()> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(IoError::InvalidFormat(format!("duplicate column: {}", name)));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != data.len() {
                return Err(IoError::ShapeMismatch {
                    expected: first.len(),
                    actual: data.len(),
                });
            }
        }
        self.names.push(name);
        self.columns.push(data);
        Ok(())
    }

    /// Builder-style [`add_column`](Self::add_column)
    pub fn with_column(mut self, name: impl Into<String>, data: DataColumn) -> IoResult<Self> {
        self.add_column(name, data)?;
        Ok(self)
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Option<&DataColumn> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Get a mutable column by name.
    ///
    /// Edits may change a column's length; writers call
    /// [`check_lengths`](Self::check_lengths) before touching the disk.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut DataColumn> {
        let index = self.column_index(name)?;
        Some(&mut self.columns[index])
    }

    /// Remove a column by name
    pub fn remove_column(&mut self, name: &str) -> Option<DataColumn> {
        let index = self.column_index(name)?;
        self.names.remove(index);
        Some(self.columns.remove(index))
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<&str> {
        self.names.iter().map(|s| s.as_str()).collect()
    }

    /// Iterate over `(name, column)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataColumn)> {
        self.names
            .iter()
            .map(|s| s.as_str())
            .zip(self.columns.iter())
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if the table has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Fail with `ShapeMismatch` if any column's length differs from the
    /// first column's
    pub fn check_lengths(&self) -> IoResult<()> {
        let expected = self.num_rows();
        match self.columns.iter().find(|c| c.len() != expected) {
            Some(ragged) => Err(IoError::ShapeMismatch {
                expected,
                actual: ragged.len(),
            }),
            None => Ok(()),
        }
    }
}
