//! Cache-first transaction classifier.
//!
//! For each row: normalize the description, answer from the cache when
//! possible, otherwise ask the [`CategoryService`] (one retry), validate the
//! reply against the taxonomy, store it and flush the cache before moving on.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tally_core::{
    ClassifiedRow, Classification, Error, RawTransaction, Result, Transaction, cache_key,
};
use tracing::{debug, info, warn};

use crate::cache::CategoryCache;
use crate::prompt::Query;
use crate::response::parse_reply;

/// The external classification service. Returns the raw reply text;
/// parsing and validation happen in the classifier.
pub trait CategoryService {
    fn complete(&self, query: &Query<'_>) -> Result<String>;
}

impl<S: CategoryService + ?Sized> CategoryService for &S {
    fn complete(&self, query: &Query<'_>) -> Result<String> {
        (**self).complete(query)
    }
}

/// What to do with rows that fail the input constraint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowPolicy {
    /// Log the row and leave it out of the output
    #[default]
    Skip,
    /// Fail the whole run
    Abort,
}

/// What to do when the service still fails after the retry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServicePolicy {
    /// Mark the row `Unclassified` (not cached) and continue
    #[default]
    MarkUnclassified,
    /// Fail the whole run
    Abort,
}

impl FromStr for RowPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(RowPolicy::Skip),
            "abort" => Ok(RowPolicy::Abort),
            other => Err(format!("unknown row policy {other:?} (expected skip|abort)")),
        }
    }
}

impl fmt::Display for RowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RowPolicy::Skip => "skip",
            RowPolicy::Abort => "abort",
        })
    }
}

impl FromStr for ServicePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mark-unclassified" | "unclassified" => Ok(ServicePolicy::MarkUnclassified),
            "abort" => Ok(ServicePolicy::Abort),
            other => Err(format!(
                "unknown service policy {other:?} (expected mark-unclassified|abort)"
            )),
        }
    }
}

impl fmt::Display for ServicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServicePolicy::MarkUnclassified => "mark-unclassified",
            ServicePolicy::Abort => "abort",
        })
    }
}

/// Outcome of one classifier run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyReport {
    /// Classified rows in input order (skipped rows absent)
    pub rows: Vec<ClassifiedRow>,
    pub total: usize,
    pub cached: usize,
    pub classified: usize,
    pub unclassified: usize,
    pub skipped: usize,
    /// Requests sent to the service, retries included
    pub external_calls: usize,
}

pub struct Classifier<C, S> {
    cache: C,
    service: S,
    row_policy: RowPolicy,
    service_policy: ServicePolicy,
    external_calls: usize,
    /// Keys whose classification failed this run; answered with the sentinel
    /// without asking again so one description never gets two outcomes.
    failed: HashSet<String>,
}

impl<C: CategoryCache, S: CategoryService> Classifier<C, S> {
    pub fn new(cache: C, service: S) -> Self {
        Self {
            cache,
            service,
            row_policy: RowPolicy::default(),
            service_policy: ServicePolicy::default(),
            external_calls: 0,
            failed: HashSet::new(),
        }
    }

    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    pub fn with_service_policy(mut self, policy: ServicePolicy) -> Self {
        self.service_policy = policy;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn into_cache(self) -> C {
        self.cache
    }

    /// Requests sent to the service so far
    pub fn external_calls(&self) -> usize {
        self.external_calls
    }

    /// Classify one description. Cache hits never reach the service; a fresh
    /// result is cached and flushed before it is returned.
    pub fn classify(&mut self, description: &str, amount: f64) -> Result<Classification> {
        let key = cache_key(description);
        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, category = %hit.category, "cache hit");
            return Ok(hit);
        }

        let query = Query {
            description: description.trim(),
            amount,
        };
        let classification = match self.ask(&query) {
            Ok(c) => c,
            Err(e) if e.is_retryable() => {
                warn!(key = %key, error = %e, "classification failed, retrying once");
                self.ask(&query)?
            }
            Err(e) => return Err(e),
        };

        info!(key = %key, category = %classification.category, confidence = classification.confidence, "classified");
        self.cache.put(key, classification);
        self.cache.flush()?;
        Ok(classification)
    }

    fn ask(&mut self, query: &Query<'_>) -> Result<Classification> {
        self.external_calls += 1;
        let reply = self.service.complete(query)?;
        parse_reply(&reply)
    }

    /// Classify every row, applying the row and service policies.
    pub fn run(&mut self, rows: &[RawTransaction]) -> Result<ClassifyReport> {
        let calls_before = self.external_calls;
        let mut report = ClassifyReport {
            total: rows.len(),
            ..ClassifyReport::default()
        };

        for raw in rows {
            let txn = match raw.validate() {
                Ok(t) => t,
                Err(e) => match self.row_policy {
                    RowPolicy::Skip => {
                        warn!(error = %e, "skipping invalid row");
                        report.skipped += 1;
                        continue;
                    }
                    RowPolicy::Abort => return Err(e),
                },
            };

            let was_cached = self.cache.get(&cache_key(&txn.description)).is_some();
            let classification = self.classify_row(&txn)?;

            if classification.category.is_sentinel() {
                report.unclassified += 1;
            } else if was_cached {
                report.cached += 1;
            } else {
                report.classified += 1;
            }
            report.rows.push(ClassifiedRow {
                transaction: txn,
                classification,
            });
        }

        // The cache is flushed after every insert; this catches stores that batch.
        self.cache.flush()?;
        report.external_calls = self.external_calls - calls_before;
        Ok(report)
    }

    fn classify_row(&mut self, txn: &Transaction) -> Result<Classification> {
        let key = cache_key(&txn.description);
        if self.failed.contains(&key) {
            return Ok(Classification::unclassified());
        }

        match self.classify(&txn.description, txn.amount) {
            Ok(c) => Ok(c),
            Err(e) if e.is_retryable() => match self.service_policy {
                ServicePolicy::MarkUnclassified => {
                    warn!(line = txn.line, error = %e, "marking row unclassified");
                    self.failed.insert(key);
                    Ok(Classification::unclassified())
                }
                ServicePolicy::Abort => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use tally_core::Category;

    /// Scripted service: pops replies in order, counts calls.
    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<Result<String>>>,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl CategoryService for Scripted {
        fn complete(&self, _query: &Query<'_>) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Service("script exhausted".into())))
        }
    }

    fn ok(category: &str) -> Result<String> {
        Ok(format!(r#"{{"category": "{category}", "confidence": 0.9}}"#))
    }

    fn raw(index: usize, description: &str, amount: f64) -> RawTransaction {
        RawTransaction {
            index,
            line: index + 2,
            description: description.to_string(),
            amount: Some(amount),
            date: None,
        }
    }

    #[test]
    fn test_second_classify_is_a_cache_hit() {
        let service = Scripted::new(vec![ok("Food")]);
        let mut c = Classifier::new(MemoryCache::new(), &service);

        let first = c.classify("Coffee Shop", 4.5).unwrap();
        let second = c.classify("  coffee   shop", 4.75).unwrap();
        assert_eq!(first, second);
        assert_eq!(service.calls.get(), 1);
        assert_eq!(c.external_calls(), 1);
    }

    #[test]
    fn test_cached_key_never_calls_service() {
        let cache = MemoryCache::with_entries([(
            "rent payment".to_string(),
            Classification::new(Category::Housing, 1.0),
        )]);
        let service = Scripted::new(vec![]);
        let mut c = Classifier::new(cache, &service);

        let got = c.classify("Rent Payment", 1200.0).unwrap();
        assert_eq!(got.category, Category::Housing);
        assert_eq!(service.calls.get(), 0);
    }

    #[test]
    fn test_retries_once_then_succeeds() {
        let service = Scripted::new(vec![ok("Dining"), ok("Food")]);
        let mut c = Classifier::new(MemoryCache::new(), &service);

        let got = c.classify("Coffee Shop", 4.5).unwrap();
        assert_eq!(got.category, Category::Food);
        assert_eq!(service.calls.get(), 2);
        assert_eq!(c.cache().len(), 1);
    }

    #[test]
    fn test_gives_up_after_one_retry() {
        let service = Scripted::new(vec![
            Err(Error::Service("timeout".into())),
            Err(Error::Service("timeout".into())),
            ok("Food"),
        ]);
        let mut c = Classifier::new(MemoryCache::new(), &service);

        assert!(matches!(c.classify("Coffee Shop", 4.5), Err(Error::Service(_))));
        assert_eq!(service.calls.get(), 2);
        assert!(c.cache().is_empty());
    }

    #[test]
    fn test_run_dedups_descriptions() {
        let service = Scripted::new(vec![ok("Food"), ok("Housing")]);
        let mut c = Classifier::new(MemoryCache::new(), &service);
        let rows = vec![
            raw(0, "Coffee Shop", 4.5),
            raw(1, "Coffee Shop", 4.75),
            raw(2, "Rent Payment", 1200.0),
        ];

        let report = c.run(&rows).unwrap();
        assert_eq!(report.external_calls, 2);
        assert_eq!(report.classified, 2);
        assert_eq!(report.cached, 1);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[1].classification.category, Category::Food);
        assert_eq!(report.rows[2].classification.category, Category::Housing);
        assert_eq!(c.cache().len(), 2);
    }

    #[test]
    fn test_run_skips_invalid_rows() {
        let service = Scripted::new(vec![ok("Food")]);
        let mut c = Classifier::new(MemoryCache::new(), &service);
        let mut missing = raw(1, "Tea", 0.0);
        missing.amount = None;
        let rows = vec![raw(0, "", 3.0), missing, raw(2, "Refund", -4.0), raw(3, "Coffee", 4.5)];

        let report = c.run(&rows).unwrap();
        assert_eq!(report.skipped, 3);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].transaction.index, 3);
        assert_eq!(service.calls.get(), 1);
    }

    #[test]
    fn test_run_aborts_on_invalid_row() {
        let service = Scripted::new(vec![ok("Food")]);
        let mut c = Classifier::new(MemoryCache::new(), &service).with_row_policy(RowPolicy::Abort);
        let rows = vec![raw(0, "Coffee", 4.5), raw(1, "", 3.0)];

        match c.run(&rows) {
            Err(Error::InvalidRow { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected InvalidRow, got {other:?}"),
        }
        // The row classified before the abort is kept
        assert_eq!(c.cache().len(), 1);
    }

    #[test]
    fn test_run_marks_unclassified_and_continues() {
        let service = Scripted::new(vec![
            Err(Error::Service("down".into())),
            Err(Error::Service("down".into())),
            ok("Housing"),
        ]);
        let mut c = Classifier::new(MemoryCache::new(), &service);
        let rows = vec![
            raw(0, "Coffee Shop", 4.5),
            raw(1, "Coffee Shop", 4.75),
            raw(2, "Rent Payment", 1200.0),
        ];

        let report = c.run(&rows).unwrap();
        assert_eq!(report.unclassified, 2);
        assert_eq!(report.classified, 1);
        assert_eq!(report.rows[0].classification, Classification::unclassified());
        assert_eq!(report.rows[1].classification, Classification::unclassified());
        // Failed description asked twice (one retry), not again for its second row
        assert_eq!(service.calls.get(), 3);
        assert_eq!(c.cache().len(), 1);
        assert!(c.cache().get("coffee shop").is_none());
    }

    #[test]
    fn test_run_aborts_on_service_error() {
        let service = Scripted::new(vec![
            Err(Error::Service("401 unauthorized".into())),
            Err(Error::Service("401 unauthorized".into())),
        ]);
        let mut c = Classifier::new(MemoryCache::new(), &service)
            .with_service_policy(ServicePolicy::Abort);

        assert!(matches!(c.run(&[raw(0, "Coffee", 4.5)]), Err(Error::Service(_))));
    }

    #[test]
    fn test_empty_input() {
        let service = Scripted::new(vec![]);
        let mut c = Classifier::new(MemoryCache::new(), &service);
        let report = c.run(&[]).unwrap();
        assert_eq!(report, ClassifyReport::default());
        assert_eq!(service.calls.get(), 0);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Skip".parse::<RowPolicy>(), Ok(RowPolicy::Skip));
        assert_eq!("abort".parse::<ServicePolicy>(), Ok(ServicePolicy::Abort));
        assert_eq!(
            "mark-unclassified".parse::<ServicePolicy>(),
            Ok(ServicePolicy::MarkUnclassified)
        );
        assert!("retry".parse::<RowPolicy>().is_err());
        assert_eq!(ServicePolicy::MarkUnclassified.to_string(), "mark-unclassified");
    }
}
