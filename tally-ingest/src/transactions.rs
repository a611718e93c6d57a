//! Typed views over a [`Table`]: raw transactions for the classifier and
//! spend records for the analyzer.

use tally_core::{Category, Error, RawTransaction, Result, SpendRecord};
use tracing::debug;

use crate::parsers::{parse_amount, parse_date};
use crate::types::{Table, columns};

/// Extract classifier input. Requires Description and Amount; Date is optional.
/// Validation of individual rows is left to the caller.
pub fn raw_transactions(table: &Table) -> Result<Vec<RawTransaction>> {
    let idx = table.require(&[columns::DESCRIPTION, columns::AMOUNT])?;
    let (desc_col, amount_col) = (idx[0], idx[1]);
    let date_col = table.column(columns::DATE);

    Ok((0..table.len())
        .map(|i| RawTransaction {
            index: i,
            line: table.line(i),
            description: table.cell(i, desc_col).trim().to_string(),
            amount: parse_amount(table.cell(i, amount_col)),
            date: date_col.and_then(|c| parse_date(table.cell(i, c))),
        })
        .collect())
}

/// Analyzer input extracted from a classified table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendTable {
    pub records: Vec<SpendRecord>,
    /// Whether the table carries a Confidence column
    pub has_confidence: bool,
    /// Rows dropped for an unparseable date or amount
    pub skipped: usize,
}

/// Extract analyzer input. Requires Date, Amount and Category.
///
/// Rows with an unusable date or amount are skipped and counted. A blank or
/// unknown category is fatal: the table was not produced by the classifier
/// or has been edited by hand.
pub fn spend_records(table: &Table) -> Result<SpendTable> {
    let idx = table.require(&[columns::DATE, columns::AMOUNT, columns::CATEGORY])?;
    let (date_col, amount_col, cat_col) = (idx[0], idx[1], idx[2]);
    let conf_col = table.column(columns::CONFIDENCE);

    let mut out = SpendTable {
        has_confidence: conf_col.is_some(),
        ..SpendTable::default()
    };

    for i in 0..table.len() {
        let line = table.line(i);
        let Some(date) = parse_date(table.cell(i, date_col)) else {
            debug!(line, value = table.cell(i, date_col), "skipping row with unparseable date");
            out.skipped += 1;
            continue;
        };
        let Some(amount) = parse_amount(table.cell(i, amount_col)) else {
            debug!(line, value = table.cell(i, amount_col), "skipping row with unparseable amount");
            out.skipped += 1;
            continue;
        };

        let label = table.cell(i, cat_col).trim();
        if label.is_empty() {
            return Err(Error::InvalidRow {
                line,
                reason: "missing category; run classify first".to_string(),
            });
        }
        let category: Category = label
            .parse()
            .map_err(|reason| Error::InvalidRow { line, reason })?;

        let mut record = SpendRecord::new(date, amount, category);
        if let Some(c) = conf_col {
            // Blank or junk confidence reads as 0
            record = record.with_confidence(table.cell(i, c).trim().parse().unwrap_or(0.0));
        }
        out.records.push(record);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_table;
    use chrono::NaiveDate;

    #[test]
    fn test_raw_transactions_parses_cells() {
        let t = parse_table(
            "Date,Description,Amount\n\
             2024-01-05, Coffee Shop ,$4.50\n\
             bad-date,Rent Payment,\n",
        )
        .unwrap();
        let raw = raw_transactions(&t).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].description, "Coffee Shop");
        assert_eq!(raw[0].amount, Some(4.5));
        assert_eq!(raw[0].date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(raw[1].amount, None);
        assert_eq!(raw[1].date, None);
        assert_eq!(raw[1].index, 1);
        assert_eq!(raw[1].line, 3);
    }

    #[test]
    fn test_lines_skip_over_blank_records() {
        let t = parse_table("Date,Amount,Category
2024-01-05,4.50,Food
,,

2024-01-06,3.00,
")
            .unwrap();
        match spend_records(&t) {
            Err(Error::InvalidRow { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected InvalidRow, got {other:?}"),
        }
        let raw = raw_transactions(&parse_table("Description,Amount
,,
Coffee,
").unwrap()).unwrap();
        assert_eq!(raw[0].line, 3);
    }

    #[test]
    fn test_raw_transactions_requires_columns() {
        let t = parse_table("Date,Memo\n2024-01-05,x\n").unwrap();
        match raw_transactions(&t) {
            Err(Error::MissingColumns { missing, found }) => {
                assert_eq!(missing, vec!["Description", "Amount"]);
                assert_eq!(found, vec!["Date", "Memo"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_spend_records_requires_category_column() {
        let t = parse_table("Date,Description,Amount\n2024-01-05,Coffee,4.50\n").unwrap();
        assert!(matches!(spend_records(&t), Err(Error::MissingColumns { .. })));
    }

    #[test]
    fn test_spend_records_skips_bad_dates_and_amounts() {
        let t = parse_table(
            "Date,Amount,Category\n\
             2024-01-05,4.50,Food\n\
             ,9.00,Food\n\
             2024-02-01,abc,Food\n",
        )
        .unwrap();
        let st = spend_records(&t).unwrap();
        assert_eq!(st.records.len(), 1);
        assert_eq!(st.skipped, 2);
        assert!(!st.has_confidence);
        assert_eq!(st.records[0].confidence, None);
    }

    #[test]
    fn test_spend_records_blank_category_is_fatal() {
        let t = parse_table("Date,Amount,Category\n2024-01-05,4.50,\n").unwrap();
        match spend_records(&t) {
            Err(Error::InvalidRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidRow, got {other:?}"),
        }
    }

    #[test]
    fn test_spend_records_unknown_category_is_fatal() {
        let t = parse_table("Date,Amount,Category\n2024-01-05,4.50,Dining\n").unwrap();
        assert!(matches!(spend_records(&t), Err(Error::InvalidRow { .. })));
    }

    #[test]
    fn test_spend_records_reads_confidence() {
        let t = parse_table(
            "Date,Amount,Category,Confidence\n\
             2024-01-05,4.50,food,0.9\n\
             2024-01-06,3.00,Unclassified,\n",
        )
        .unwrap();
        let st = spend_records(&t).unwrap();
        assert!(st.has_confidence);
        assert_eq!(st.records[0].category, Category::Food);
        assert_eq!(st.records[0].confidence, Some(0.9));
        assert_eq!(st.records[1].category, Category::Unclassified);
        assert_eq!(st.records[1].confidence, Some(0.0));
    }
}
