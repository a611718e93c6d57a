//! tally-core: taxonomy, transaction types and errors shared by the tally crates

pub mod error;
pub mod finance;
pub mod time;
pub mod transaction;

pub use error::{Error, Result};
pub use finance::{Category, Classification};
pub use time::YearMonth;
pub use transaction::{ClassifiedRow, RawTransaction, SpendRecord, Transaction};

/// Cache-key derivation for transaction descriptions
pub mod normalize {
    /// Normalize a description into its cache key:
    /// trimmed, internal whitespace collapsed, lowercased.
    pub fn cache_key(description: &str) -> String {
        description
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

}

pub use normalize::cache_key;
