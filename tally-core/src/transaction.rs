//! Transaction rows as they flow through classify and analyze

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::finance::{Category, Classification};

/// A row as read from the input table, before validation.
///
/// `amount` is `None` when the cell was empty or not a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// 0-based index into the table's data rows
    pub index: usize,
    /// 1-based line in the source file
    pub line: usize,
    pub description: String,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
}

impl RawTransaction {

    /// Check the classifier's input constraint: non-empty description, positive amount.
    pub fn validate(&self) -> Result<Transaction> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(Error::InvalidRow {
                line: self.line,
                reason: "empty description".to_string(),
            });
        }

        let amount = match self.amount {
            Some(a) if a.is_finite() && a > 0.0 => a,
            Some(a) => {
                return Err(Error::InvalidRow {
                    line: self.line,
                    reason: format!("amount must be positive, got {a}"),
                });
            }
            None => {
                return Err(Error::InvalidRow {
                    line: self.line,
                    reason: "missing or unparseable amount".to_string(),
                });
            }
        };

        Ok(Transaction {
            index: self.index,
            line: self.line,
            description: description.to_string(),
            amount,
            date: self.date,
        })
    }
}

/// A validated transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub index: usize,
    pub line: usize,
    pub description: String,
    /// Always positive
    pub amount: f64,
    pub date: Option<NaiveDate>,
}

/// A transaction with its assigned category, produced by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub transaction: Transaction,
    pub classification: Classification,
}

/// One row of a classified table as the analyzer sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: Category,
    /// Present only when the table carries a Confidence column
    pub confidence: Option<f64>,
}

impl SpendRecord {
    pub fn new(date: NaiveDate, amount: f64, category: Category) -> Self {
        Self {
            date,
            amount,
            category,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Magnitude of the amount; refunds and charges both count as spend.
    pub fn spend(&self) -> f64 {
        self.amount.abs()
    }
}
