//! Aggregate totals over a portfolio's line items.
//!
//! Every function here is a pure fold over the item slice: no state, no side
//! effects, recomputed in full after each portfolio mutation. Ordered maps
//! keep the output deterministic for display and export.

use crate::catalog::LineItem;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sentinel bucket for items missing a grouping key.
pub const NA_BUCKET: &str = "N/A";

/// Derived totals for a portfolio. Never mutated independently; always a
/// function of the current line-item sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub budget_impact: f64,
    pub estimated_cost_by_year: BTreeMap<String, f64>,
    pub funded_amount_by_year: BTreeMap<String, f64>,
    pub zone_cost_by_year: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Totals {
    pub fn calculate(items: &[LineItem]) -> Self {
        Totals {
            budget_impact: items.iter().map(|item| item.budget).sum(),
            estimated_cost_by_year: total_by_key(
                items,
                |item| year_bucket(item.phase_year),
                |item| item.budget,
            ),
            funded_amount_by_year: funded_amount_by_year(items),
            zone_cost_by_year: zone_cost_by_year(items),
        }
    }
}

fn year_bucket(year: Option<i32>) -> String {
    year.map(|y| y.to_string())
        .unwrap_or_else(|| NA_BUCKET.to_string())
}

/// Group items by a key and accumulate an addend per group. Items without a
/// key land in the `"N/A"` bucket.
pub fn total_by_key<K, A>(items: &[LineItem], key: K, addend: A) -> BTreeMap<String, f64>
where
    K: Fn(&LineItem) -> String,
    A: Fn(&LineItem) -> f64,
{
    let mut results: BTreeMap<String, f64> = BTreeMap::new();
    for item in items {
        *results.entry(key(item)).or_insert(0.0) += addend(item);
    }
    results
}

/// Merge each item's own year-to-amount funding breakdown additively into one
/// running map. This is a fold of folds, not a single-level group-by.
fn funded_amount_by_year(items: &[LineItem]) -> BTreeMap<String, f64> {
    let mut results: BTreeMap<String, f64> = BTreeMap::new();
    for item in items {
        for (year, amount) in &item.funded_amount_by_year {
            *results.entry(year.clone()).or_insert(0.0) += amount;
        }
    }
    results
}

/// Two-level grouping: year, then zone name, to summed cost. Full precision
/// is kept here; rounding happens at the display/CSV boundary.
fn zone_cost_by_year(items: &[LineItem]) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut year_totals: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for item in items {
        let year = year_bucket(item.phase_year);
        let zone_totals = year_totals.entry(year).or_default();
        for (zone, cost) in &item.cost_by_zone {
            *zone_totals.entry(zone.clone()).or_insert(0.0) += cost;
        }
    }
    year_totals
}
