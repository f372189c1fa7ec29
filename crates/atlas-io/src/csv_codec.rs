//! CSV table codec with type inference

use crate::codec::{ensure_exists, IoError, IoResult, PayloadCodec};
use crate::schema::{ColumnType, DataColumn, DataTable};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// CSV codec.
///
/// Reading expects a header row. Writing always emits a header row and
/// never an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvCodec {
    delimiter: u8,
}

impl CsvCodec {
    /// Comma-separated values
    pub fn new() -> Self {
        Self::with_delimiter(b',')
    }

    /// Tab-separated values
    pub fn tsv() -> Self {
        Self::with_delimiter(b'\t')
    }

    /// Use a custom field delimiter
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Pick a codec from a file extension (`tsv` selects tabs)
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => Self::tsv(),
            _ => Self::new(),
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl Default for CsvCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCodec for CsvCodec {
    type Payload = DataTable;

    fn read(&self, path: &Path) -> IoResult<DataTable> {
        ensure_exists(path)?;

        let file = File::open(path).map_err(|e| IoError::OpenFailed(e.to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

        let mut values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for result in reader.records() {
            let record = result?;
            for (i, column) in values.iter_mut().enumerate() {
                column.push(record.get(i).unwrap_or_default().to_string());
            }
        }

        let mut table = DataTable::new();
        for (name, raw) in headers.into_iter().zip(values) {
            let dtype = infer_type(&raw);
            table.add_column(name, parse_column(&raw, dtype))?;
        }

        Ok(table)
    }

    fn write(&self, table: &DataTable, path: &Path) -> IoResult<()> {
        table.check_lengths()?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        if !table.is_empty() {
            writer.write_record(table.column_names())?;
        }

        for row in 0..table.num_rows() {
            let record: Vec<String> = table
                .iter()
                .map(|(_, column)| column.format_cell(row).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn format_name(&self) -> &'static str {
        if self.delimiter == b'\t' {
            "TSV"
        } else {
            "CSV"
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "tsv"]
    }
}

/// Infer column type from its values.
///
/// Integers require every cell to be filled; a column of numbers with gaps
/// becomes `Float64` with NaN in the gaps. A column whose cells are all
/// empty is all gaps, so it reads as `Float64` NaN too.
fn infer_type(values: &[String]) -> ColumnType {
    if values.is_empty() {
        return ColumnType::String;
    }

    let non_empty: Vec<&str> = values
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    if non_empty.is_empty() {
        return ColumnType::Float64;
    }

    let has_gaps = non_empty.len() < values.len();

    if !has_gaps && non_empty.iter().all(|s| s.parse::<i64>().is_ok()) {
        return ColumnType::Int64;
    }

    if non_empty.iter().all(|s| s.parse::<f64>().is_ok()) {
        return ColumnType::Float64;
    }

    if !has_gaps
        && non_empty.iter().all(|s| {
            matches!(
                s.to_lowercase().as_str(),
                "true" | "false" | "yes" | "no"
            )
        })
    {
        return ColumnType::Bool;
    }

    ColumnType::String
}

/// Parse column values into a DataColumn
fn parse_column(values: &[String], dtype: ColumnType) -> DataColumn {
    match dtype {
        ColumnType::Float64 => DataColumn::Float64(
            values
                .iter()
                .map(|s| s.parse().unwrap_or(f64::NAN))
                .collect(),
        ),
        ColumnType::Int32 => {
            DataColumn::Int32(values.iter().map(|s| s.parse().unwrap_or(0)).collect())
        }
        ColumnType::Int64 => {
            DataColumn::Int64(values.iter().map(|s| s.parse().unwrap_or(0)).collect())
        }
        ColumnType::Bool => DataColumn::Bool(
            values
                .iter()
                .map(|s| matches!(s.to_lowercase().as_str(), "true" | "yes"))
                .collect(),
        ),
        ColumnType::String => DataColumn::String(values.to_vec()),
    }
}
