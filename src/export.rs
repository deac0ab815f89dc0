//! Client-side CSV export of the current portfolio.
//!
//! One row per line item, in portfolio order. Zone-cost and asset columns are
//! dynamic: the header carries the union of zones/asset types across the
//! whole portfolio, and items without a value leave the cell blank.

use crate::catalog::{LineItem, Region};
use crate::planner::Portfolio;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io;

const FIXED_COLUMNS: &[&str] = &[
    "name",
    "funding_year",
    "funding_amount",
    "funding_source",
    "funding_secured",
    "budget",
    "estimated_bid_quarter",
    "section",
    "category",
    "project_manager",
    "phase",
    "status",
    "description",
    "notes",
    "score",
    "countywide",
    "zones",
    "house_districts",
    "senate_districts",
    "commissioner_districts",
];

const KEY_COLUMNS: &[&str] = &["phase_funding_id", "project_id", "phase_id"];

/// `<portfolio-name-with-spaces-as-hyphens>-<ISO date>.csv`
pub fn export_filename(portfolio_name: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}.csv",
        portfolio_name.replace(' ', "-"),
        date.format("%Y-%m-%d")
    )
}

/// Header plus one row of cells per portfolio item.
pub fn export_rows(portfolio: &Portfolio) -> (Vec<String>, Vec<Vec<String>>) {
    let asset_types: BTreeSet<String> = portfolio
        .items
        .iter()
        .flat_map(|item| item.assets.keys().cloned())
        .collect();
    let zones: BTreeSet<String> = portfolio
        .items
        .iter()
        .flat_map(|item| item.cost_by_zone.keys().cloned())
        .collect();

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(asset_types.iter().cloned());
    header.extend(zones.iter().map(|zone| zone_column(zone)));
    header.extend(KEY_COLUMNS.iter().map(|c| c.to_string()));

    let rows = portfolio
        .items
        .iter()
        .map(|item| item_row(item, &asset_types, &zones))
        .collect();

    (header, rows)
}

/// Write the export to any sink. Row count always equals the portfolio's
/// current item count.
pub fn write_csv<W: io::Write>(portfolio: &Portfolio, writer: W) -> Result<(), csv::Error> {
    let (header, rows) = export_rows(portfolio);
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&header)?;
    for row in rows {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn zone_column(zone: &str) -> String {
    format!("cost_by_{}_zone", zone.to_lowercase())
}

fn item_row(item: &LineItem, asset_types: &BTreeSet<String>, zones: &BTreeSet<String>) -> Vec<String> {
    let mut row = vec![
        item.name.clone(),
        year_cell(item.funding_year),
        item.funding_amount.to_string(),
        item.funding_source.clone(),
        if item.funding_secured { "Yes" } else { "No" }.to_string(),
        item.budget.to_string(),
        item.estimated_bid_quarter.clone(),
        item.section.clone(),
        item.category.clone(),
        item.project_manager.clone(),
        item.phase.clone(),
        item.status.clone(),
        strip_newlines(&item.description),
        strip_newlines(&item.notes),
        item.score.clone(),
        item.countywide.to_string(),
        join_names(&item.zones),
        join_names(&item.house_districts),
        join_names(&item.senate_districts),
        join_names(&item.commissioner_districts),
    ];

    for asset_type in asset_types {
        row.push(
            item.assets
                .get(asset_type)
                .map(|names| names.join(";"))
                .unwrap_or_default(),
        );
    }

    // Zone costs are rounded to whole dollars for display
    for zone in zones {
        row.push(
            item.cost_by_zone
                .get(zone)
                .map(|cost| (cost.round() as i64).to_string())
                .unwrap_or_default(),
        );
    }

    row.push(item.key.to_string());
    row.push(item.project_id.to_string());
    row.push(item.phase_id.to_string());
    row
}

fn year_cell(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn strip_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn join_names(regions: &[Region]) -> String {
    regions
        .iter()
        .map(|region| region.name.as_str())
        .collect::<Vec<_>>()
        .join(";")
}
