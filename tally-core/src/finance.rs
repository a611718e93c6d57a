//! Spending taxonomy and classification results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Spending categories. The first fourteen variants form the taxonomy the
/// classification service chooses from; `Unclassified` is a local sentinel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Income,
    Transfer,
    Housing,
    Transportation,
    Food,
    Health,
    Shopping,
    Entertainment,
    Travel,
    Financial,
    Education,
    Gifts,
    Business,
    Misc,
    /// Assigned when the service could not produce a valid label.
    /// Never cached, never offered to the service.
    Unclassified,
}

impl Category {
    /// Labels the classification service is allowed to return
    pub const TAXONOMY: [Category; 14] = [
        Category::Income,
        Category::Transfer,
        Category::Housing,
        Category::Transportation,
        Category::Food,
        Category::Health,
        Category::Shopping,
        Category::Entertainment,
        Category::Travel,
        Category::Financial,
        Category::Education,
        Category::Gifts,
        Category::Business,
        Category::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Income => "Income",
            Category::Transfer => "Transfer",
            Category::Housing => "Housing",
            Category::Transportation => "Transportation",
            Category::Food => "Food",
            Category::Health => "Health",
            Category::Shopping => "Shopping",
            Category::Entertainment => "Entertainment",
            Category::Travel => "Travel",
            Category::Financial => "Financial",
            Category::Education => "Education",
            Category::Gifts => "Gifts",
            Category::Business => "Business",
            Category::Misc => "Misc",
            Category::Unclassified => "Unclassified",
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Category::Unclassified)
    }

    /// Match a label against the taxonomy only (the sentinel is rejected).
    pub fn from_taxonomy(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::TAXONOMY
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; accepts the sentinel so classified tables round-trip.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(Category::Unclassified.as_str()) {
            return Ok(Category::Unclassified);
        }
        Category::from_taxonomy(s).ok_or_else(|| format!("unknown category: {s:?}"))
    }
}

/// A category together with the service's confidence in it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub category: Category,
    /// 0.0 - 1.0
    pub confidence: f64,
}

impl Classification {
    pub fn new(category: Category, confidence: f64) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unclassified() -> Self {
        Self {
            category: Category::Unclassified,
            confidence: 0.0,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        !self.category.is_sentinel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_excludes_sentinel() {
        assert!(!Category::TAXONOMY.contains(&Category::Unclassified));
        assert_eq!(Category::from_taxonomy("unclassified"), None);
    }

    #[test]
    fn test_from_taxonomy_is_case_insensitive() {
        assert_eq!(Category::from_taxonomy("food"), Some(Category::Food));
        assert_eq!(Category::from_taxonomy("  TRANSPORTATION "), Some(Category::Transportation));
        assert_eq!(Category::from_taxonomy("Dining"), None);
    }

    #[test]
    fn test_from_str_accepts_sentinel() {
        assert_eq!("Unclassified".parse::<Category>(), Ok(Category::Unclassified));
        assert_eq!("misc".parse::<Category>(), Ok(Category::Misc));
        assert!("Groceries".parse::<Category>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for c in Category::TAXONOMY {
            assert_eq!(c.to_string().parse::<Category>(), Ok(c));
        }
    }

    #[test]
    fn test_classification_clamps_confidence() {
        assert_eq!(Classification::new(Category::Food, 1.7).confidence, 1.0);
        assert_eq!(Classification::new(Category::Food, -0.2).confidence, 0.0);
        assert!(!Classification::unclassified().is_cacheable());
        assert!(Classification::new(Category::Misc, 0.2).is_cacheable());
    }
}
