//! Spending summaries over a classified table.
//!
//! The three chart summaries (by category, by month, category share) are
//! computed independently from the same filtered rows, so category totals,
//! month totals and the grand total always agree.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use tally_core::{Category, SpendRecord, YearMonth};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.60;

/// Row filters applied before aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Rows below this confidence are dropped (only when the table has confidences)
    pub min_confidence: f64,
    /// Categories left out entirely
    pub exclude: Vec<Category>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            exclude: vec![Category::Transfer],
        }
    }
}

impl AnalysisOptions {
    /// Keep every row
    pub fn unfiltered() -> Self {
        Self {
            min_confidence: 0.0,
            exclude: Vec::new(),
        }
    }

    fn keeps(&self, record: &SpendRecord) -> bool {
        if self.exclude.contains(&record.category) {
            return false;
        }
        match record.confidence {
            Some(c) => c >= self.min_confidence,
            None => true,
        }
    }
}

/// Headline numbers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub rows: usize,
    pub months: usize,
    pub total: f64,
    /// `None` when there are no months
    pub monthly_average: Option<f64>,
}

/// Change from the second-to-last month to the last month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthOverMonth {
    pub previous: YearMonth,
    pub last: YearMonth,
    pub delta: f64,
    /// `None` when the previous month's spend is zero
    pub percent: Option<f64>,
}

/// Last-month spend against the category's average over prior months
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swing {
    pub category: Category,
    pub last_month: f64,
    pub prior_average: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    /// Descending by total
    pub by_category: Vec<(Category, f64)>,
    /// Chronological
    pub by_month: Vec<(YearMonth, f64)>,
    /// Same order as `by_category`; fractions summing to 1
    pub shares: Vec<(Category, f64)>,
    pub overview: Overview,
    /// Rows removed by the filters
    pub filtered_out: usize,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.overview.total
    }

    /// Top `n` shares with the remainder folded into an "Other" bucket.
    pub fn top_shares(&self, n: usize) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .shares
            .iter()
            .take(n)
            .map(|(c, s)| (c.to_string(), *s))
            .collect();
        let other: f64 = self.shares.iter().skip(n).map(|(_, s)| s).sum();
        if other > 0.0 {
            out.push(("Other".to_string(), other));
        }
        out
    }
}

/// Filter `records` and compute every summary.
pub fn analyze(records: &[SpendRecord], options: &AnalysisOptions) -> Analysis {
    let kept: Vec<&SpendRecord> = records.iter().filter(|r| options.keeps(r)).collect();

    let by_category = category_totals(&kept);
    let by_month = month_totals(&kept);
    let total: f64 = kept.iter().map(|r| r.spend()).sum();
    let shares = category_shares(&by_category, total);

    let months = by_month.len();
    Analysis {
        overview: Overview {
            rows: kept.len(),
            months,
            total,
            monthly_average: (months > 0).then(|| total / months as f64),
        },
        by_category,
        by_month,
        shares,
        filtered_out: records.len() - kept.len(),
    }
}

fn category_totals(records: &[&SpendRecord]) -> Vec<(Category, f64)> {
    let mut totals: HashMap<Category, f64> = HashMap::new();
    for r in records {
        *totals.entry(r.category).or_insert(0.0) += r.spend();
    }
    // Categories with no spend are left out, like empty ones
    let mut out: Vec<(Category, f64)> = totals.into_iter().filter(|(_, t)| *t > 0.0).collect();
    // Ties broken by taxonomy order so output is stable
    out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    out
}

fn month_totals(records: &[&SpendRecord]) -> Vec<(YearMonth, f64)> {
    let mut totals: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for r in records {
        *totals.entry(YearMonth::of(r.date)).or_insert(0.0) += r.spend();
    }
    totals.into_iter().collect()
}

fn category_shares(by_category: &[(Category, f64)], total: f64) -> Vec<(Category, f64)> {
    if total <= 0.0 {
        return Vec::new();
    }
    by_category.iter().map(|(c, t)| (*c, t / total)).collect()
}

/// Last month against the one before it; needs two months of data.
pub fn month_over_month(analysis: &Analysis) -> Option<MonthOverMonth> {
    let n = analysis.by_month.len();
    if n < 2 {
        return None;
    }
    let (previous, prev_total) = analysis.by_month[n - 2];
    let (last, last_total) = analysis.by_month[n - 1];
    let delta = last_total - prev_total;
    Some(MonthOverMonth {
        previous,
        last,
        delta,
        percent: (prev_total != 0.0).then(|| delta / prev_total * 100.0),
    })
}

/// Per-category overspend in the last month versus the average of all prior
/// months, largest first. Needs three months of data.
pub fn largest_swings(records: &[SpendRecord], options: &AnalysisOptions) -> Vec<Swing> {
    let kept: Vec<&SpendRecord> = records.iter().filter(|r| options.keeps(r)).collect();
    let months = month_totals(&kept);
    if months.len() < 3 {
        return Vec::new();
    }
    let last = months[months.len() - 1].0;
    let prior_months = (months.len() - 1) as f64;

    let mut last_sum: HashMap<Category, f64> = HashMap::new();
    let mut prior_sum: HashMap<Category, f64> = HashMap::new();
    for r in &kept {
        let bucket = if YearMonth::of(r.date) == last {
            &mut last_sum
        } else {
            &mut prior_sum
        };
        *bucket.entry(r.category).or_insert(0.0) += r.spend();
    }

    // Only categories seen in both periods are compared
    let mut swings: Vec<Swing> = last_sum
        .iter()
        .filter_map(|(c, last_month)| {
            let prior_average = prior_sum.get(c)? / prior_months;
            Some(Swing {
                category: *c,
                last_month: *last_month,
                prior_average,
                delta: last_month - prior_average,
            })
        })
        .collect();
    swings.sort_by(|a, b| b.delta.total_cmp(&a.delta).then(a.category.cmp(&b.category)));
    swings
}
