//! Write the classified table: input columns plus Category and Confidence.

use std::io;
use std::path::Path;
use tally_core::{ClassifiedRow, Result};

use crate::types::{Table, columns};

/// Build the output table. Rows are emitted in the order of `classified`;
/// input rows without a classification (rejected rows) are dropped. Existing
/// Category / Confidence columns are overwritten in place.
pub fn classified_table(input: &Table, classified: &[ClassifiedRow]) -> Table {
    let mut out = Table::new(input.headers.clone());
    let cat_col = out.ensure_column(columns::CATEGORY);
    let conf_col = out.ensure_column(columns::CONFIDENCE);

    for row in classified {
        let Some(cells) = input.rows.get(row.transaction.index) else {
            continue;
        };
        let mut cells = cells.clone();
        cells.resize(out.headers.len(), String::new());
        cells[cat_col] = row.classification.category.to_string();
        cells[conf_col] = row.classification.confidence.to_string();
        out.rows.push(cells);
    }
    out
}

pub fn write_table<W: io::Write>(writer: W, table: &Table) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    // Written explicitly so an empty table still gets its header line
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_classified(
    path: impl AsRef<Path>,
    input: &Table,
    classified: &[ClassifiedRow],
) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_table(io::BufWriter::new(file), &classified_table(input, classified))
}
