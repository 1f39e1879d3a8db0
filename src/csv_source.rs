//! Reading import files into a [`RawTable`].
//!
//! Cells are kept as text; interpretation happens in validation.

use std::io::Read;
use std::path::Path;

use anyhow::Context;

use crate::models::RawTable;

/// Load a header row plus data rows from a CSV reader.
///
/// Short rows are padded with empty cells so every row lines up with the
/// headers.
pub fn load_table<R: Read>(reader: R) -> anyhow::Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line_num, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at line {}", line_num + 2))?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.len() < headers.len() {
            row.resize(headers.len(), String::new());
        }
        rows.push(row);
    }

    Ok(RawTable::new(headers, rows))
}

pub fn load_table_file(path: &Path) -> anyhow::Result<RawTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;
    load_table(file)
}
