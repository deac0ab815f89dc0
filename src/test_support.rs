//! Shared fixtures for unit tests.

use crate::catalog::{LineItem, PhaseRef, PortfolioRecord};
use crate::planner::Planner;
use std::collections::BTreeMap;

/// Baseline line item with a recognizable name and a 100.0 budget; `tweak`
/// adjusts whatever the test cares about.
pub fn line_item(key: u64, tweak: impl FnOnce(&mut LineItem)) -> LineItem {
    let mut item = LineItem {
        key,
        project_id: key,
        phase_id: key + 1000,
        name: format!("Item {key}"),
        description: "No description available.".to_string(),
        notes: String::new(),
        section: "General".to_string(),
        category: "Maintenance".to_string(),
        budget: 100.0,
        score: "1.00".to_string(),
        phase: "Design".to_string(),
        phase_year: Some(2024),
        estimated_bid_quarter: String::new(),
        status: "active".to_string(),
        project_manager: String::new(),
        countywide: false,
        funding_source: "Grant".to_string(),
        funding_amount: 100.0,
        funding_year: Some(2024),
        funding_secured: false,
        zones: Vec::new(),
        house_districts: Vec::new(),
        senate_districts: Vec::new(),
        commissioner_districts: Vec::new(),
        cost_by_zone: BTreeMap::new(),
        funded_amount_by_year: BTreeMap::new(),
        assets: BTreeMap::new(),
    };
    tweak(&mut item);
    item
}

pub fn catalog_of(keys: &[u64]) -> Vec<LineItem> {
    keys.iter().map(|&key| line_item(key, |_| {})).collect()
}

/// A persisted portfolio record referencing the given line-item keys, with
/// 1-based sequence numbers in the given order.
pub fn record(id: u64, name: &str, keys: &[u64]) -> PortfolioRecord {
    PortfolioRecord {
        id,
        name: name.to_string(),
        phases: keys
            .iter()
            .enumerate()
            .map(|(index, &key)| PhaseRef {
                phase: key + 1000,
                phase_funding_stream: key,
                sequence: (index + 1) as u32,
            })
            .collect(),
    }
}

/// Planner over the given catalog with an always-yes confirmation gate.
pub fn planner_with(
    catalog: Vec<LineItem>,
    portfolios: Vec<PortfolioRecord>,
    selected: Option<PortfolioRecord>,
) -> Planner {
    Planner::new(catalog, portfolios, selected, 1, Box::new(|_: &str| true))
}
