//! Read a CSV export into a [`Table`], whatever its encoding.

use std::fs;
use std::path::Path;
use tally_core::Result;

use super::encoding::decode_bytes;
use crate::types::Table;

/// Read a CSV file. The first non-empty line is the header row.
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    let bytes = fs::read(path.as_ref())?;
    parse_table(&decode_bytes(&bytes))
}

/// Parse CSV text. Rows of the wrong width are padded or truncated.
pub fn parse_table(text: &str) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = Table::new(headers);

    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let cells = record.iter().map(str::to_string).collect();
        match record.position() {
            Some(pos) => table.push_row_at(pos.line() as usize, cells),
            None => table.push_row(cells),
        }
    }

    Ok(table)
}
