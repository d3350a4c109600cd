use std::io::Read;
use std::path::Path;
use thiserror::Error;

use tidybank_core::RawRow;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("No data rows")]
    NoDataRows,
}

/// Raw input file: original column names plus one `RawRow` per data line.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn column_name(&self, column: usize) -> &str {
        self.headers.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

pub fn read_csv<R: Read>(data: R, delimiter: u8) -> Result<RawTable, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.iter().map(|s| s.trim().to_string()).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = RawRow::new(record.iter().map(|s| s.to_string()).collect());
        if row.is_empty() {
            continue;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(CsvError::NoDataRows);
    }

    Ok(RawTable { headers, rows })
}

pub fn read_csv_file(path: &Path, delimiter: u8) -> Result<RawTable, CsvError> {
    let file = std::fs::File::open(path)?;
    read_csv(file, delimiter)
}
