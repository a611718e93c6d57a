//! tally-ingest: CSV table reading (encoding, amounts, dates) and classified-table writing.

pub mod parsers;
pub mod transactions;
pub mod types;
pub mod writer;

pub use parsers::{parse_table, read_table};
pub use transactions::{SpendTable, raw_transactions, spend_records};
pub use types::{Table, columns};
pub use writer::{classified_table, write_classified, write_table};
