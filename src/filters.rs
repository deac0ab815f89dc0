//! Composable display filters over the remaining candidate pool.
//!
//! A filter dimension that is unset is the identity predicate: the explicit
//! "show all" policy, not an error state. Dimensions combine with logical
//! AND; the free-text match is a case-insensitive substring check across the
//! item name and project id. Filtering never mutates the pool.

use crate::catalog::LineItem;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub text: String,
    pub section: Option<String>,
    pub year: Option<i32>,
    pub funding_source: Option<String>,
    pub funding_secured: Option<bool>,
}

/// Case-insensitive substring containment.
fn within(source: &str, target: &str) -> bool {
    source.to_lowercase().contains(&target.to_lowercase())
}

impl FilterState {
    pub fn matches(&self, item: &LineItem) -> bool {
        self.matches_text(item)
            && self.matches_section(item)
            && self.matches_year(item)
            && self.matches_funding_source(item)
            && self.matches_funding_secured(item)
    }

    /// Apply the whole pipeline to a pool, preserving its order.
    pub fn apply<'a>(&self, items: &'a [LineItem]) -> Vec<&'a LineItem> {
        items.iter().filter(|item| self.matches(item)).collect()
    }

    fn matches_text(&self, item: &LineItem) -> bool {
        if self.text.is_empty() {
            return true;
        }
        within(&item.name, &self.text) || within(&item.project_id.to_string(), &self.text)
    }

    fn matches_section(&self, item: &LineItem) -> bool {
        match &self.section {
            Some(section) if !section.is_empty() => within(&item.section, section),
            _ => true,
        }
    }

    fn matches_year(&self, item: &LineItem) -> bool {
        match self.year {
            Some(year) => item.phase_year == Some(year),
            None => true,
        }
    }

    fn matches_funding_source(&self, item: &LineItem) -> bool {
        match &self.funding_source {
            Some(source) if !source.is_empty() => within(&item.funding_source, source),
            _ => true,
        }
    }

    fn matches_funding_secured(&self, item: &LineItem) -> bool {
        match self.funding_secured {
            Some(secured) => item.funding_secured == secured,
            None => true,
        }
    }
}
