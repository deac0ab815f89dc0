//! Inbound snapshot models and catalog flattening
//!
//! This module handles:
//! - Deserializing the server-provided page snapshot (projects, saved
//!   portfolios, selected portfolio, owning user)
//! - Flattening project records into one line item per funding stream

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server-provided page snapshot. The planner is initialized from this value
/// alone; there is no ambient global state.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerProps {
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub portfolios: Vec<PortfolioRecord>,
    #[serde(default)]
    pub selected_portfolio: Option<PortfolioRecord>,
    pub user: u64,
}

impl PlannerProps {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A persisted portfolio as the server returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub phases: Vec<PhaseRef>,
}

/// One phase reference inside a persisted portfolio. `phase_funding_stream`
/// is the line-item key; `sequence` is the 1-based saved order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRef {
    pub phase: u64,
    pub phase_funding_stream: u64,
    pub sequence: u32,
}

/// A zone or district association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: u64,
    pub name: String,
}

/// One capital project as served in the snapshot, with its nested funding
/// streams. Flattened into `LineItem`s before the planner ever sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRecord {
    pub pk: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_budget: f64,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub phase_year: Option<i32>,
    #[serde(default)]
    pub estimated_bid_quarter: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_manager: Option<String>,
    #[serde(default)]
    pub countywide: bool,
    #[serde(default)]
    pub zones: Vec<Region>,
    #[serde(default)]
    pub house_districts: Vec<Region>,
    #[serde(default)]
    pub senate_districts: Vec<Region>,
    #[serde(default)]
    pub commissioner_districts: Vec<Region>,
    #[serde(default)]
    pub cost_by_zone: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64_map")]
    pub funded_amount_by_year: BTreeMap<String, f64>,
    #[serde(default)]
    pub assets: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub funding_streams: Vec<FundingStream>,
}

/// One funding source/year/amount record attached to a project phase.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingStream {
    pub id: u64,
    #[serde(default)]
    pub source_type: String,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub budget: f64,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub funding_secured: bool,
}

/// One (project, phase, funding stream) tuple as displayed in the planner
/// tables. Identity is `key` (the funding-stream id); membership tests never
/// use structural equality. Immutable once loaded for a session.
#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    pub key: u64,
    pub project_id: u64,
    pub phase_id: u64,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub section: String,
    pub category: String,
    pub budget: f64,
    pub score: String,
    pub phase: String,
    pub phase_year: Option<i32>,
    pub estimated_bid_quarter: String,
    pub status: String,
    pub project_manager: String,
    pub countywide: bool,
    pub funding_source: String,
    pub funding_amount: f64,
    pub funding_year: Option<i32>,
    pub funding_secured: bool,
    pub zones: Vec<Region>,
    pub house_districts: Vec<Region>,
    pub senate_districts: Vec<Region>,
    pub commissioner_districts: Vec<Region>,
    pub cost_by_zone: BTreeMap<String, f64>,
    pub funded_amount_by_year: BTreeMap<String, f64>,
    pub assets: BTreeMap<String, Vec<String>>,
}

impl LineItem {
    fn from_stream(project: &ProjectRecord, funding: &FundingStream) -> Self {
        LineItem {
            key: funding.id,
            project_id: project.project_id,
            phase_id: project.pk,
            name: project.name.clone(),
            description: project
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "No description available.".to_string()),
            notes: project.notes.clone().unwrap_or_default(),
            section: project.section.clone(),
            category: project.category.clone(),
            budget: project.total_budget,
            score: project
                .total_score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "N/A".to_string()),
            phase: project
                .phase
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
            phase_year: project.phase_year,
            estimated_bid_quarter: project.estimated_bid_quarter.clone().unwrap_or_default(),
            status: project.status.clone().unwrap_or_default(),
            project_manager: project.project_manager.clone().unwrap_or_default(),
            countywide: project.countywide,
            funding_source: funding.source_type.clone(),
            funding_amount: funding.budget,
            funding_year: funding.year,
            funding_secured: funding.funding_secured,
            zones: project.zones.clone(),
            house_districts: project.house_districts.clone(),
            senate_districts: project.senate_districts.clone(),
            commissioner_districts: project.commissioner_districts.clone(),
            cost_by_zone: project.cost_by_zone.clone(),
            funded_amount_by_year: project.funded_amount_by_year.clone(),
            assets: project.assets.clone(),
        }
    }
}

/// Flatten project records into one line item per funding stream. A project
/// without funding streams contributes no line items.
pub fn flatten_catalog(projects: &[ProjectRecord]) -> Vec<LineItem> {
    projects
        .iter()
        .flat_map(|project| {
            project
                .funding_streams
                .iter()
                .map(|funding| LineItem::from_stream(project, funding))
        })
        .collect()
}

/// Distinct section names in first-seen catalog order, for the section picker.
pub fn section_names(catalog: &[LineItem]) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    for item in catalog {
        if !item.section.is_empty() && !sections.contains(&item.section) {
            sections.push(item.section.clone());
        }
    }
    sections
}

// Helper to allow numeric fields to arrive as a number, a numeric string, or
// null. Parse failures contribute 0 rather than poisoning the load.
fn lenient_f64(v: &serde_json::Value) -> f64 {
    match v {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(lenient_f64(&v))
}

fn deserialize_lenient_f64_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, lenient_f64(&v)))
            .collect()),
        _ => Ok(BTreeMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_json() -> serde_json::Value {
        json!({
            "projects": [
                {
                    "pk": 11,
                    "project_id": 1,
                    "name": "Trail Rehab",
                    "description": null,
                    "section": "Trails",
                    "category": "Rehabilitation",
                    "total_budget": "1500.50",
                    "total_score": 7.126,
                    "phase": "Construction",
                    "phase_year": 2024,
                    "countywide": false,
                    "zones": [{"id": 1, "name": "North"}],
                    "cost_by_zone": {"North": 1500.5},
                    "funded_amount_by_year": {"2024": "1000", "2025": 500},
                    "funding_streams": [
                        {"id": 101, "source_type": "Grant", "budget": "1000", "year": 2024, "funding_secured": true},
                        {"id": 102, "source_type": "Bond", "budget": 500.5, "year": 2025, "funding_secured": false}
                    ]
                },
                {
                    "pk": 12,
                    "project_id": 2,
                    "name": "Dam Repair",
                    "total_budget": "not a number",
                    "funding_streams": [
                        {"id": 103, "source_type": "Levy", "budget": 200}
                    ]
                }
            ],
            "portfolios": [],
            "selected_portfolio": null,
            "user": 42
        })
    }

    #[test]
    fn flattens_one_line_item_per_funding_stream() {
        let props: PlannerProps = serde_json::from_value(snapshot_json()).unwrap();
        let catalog = flatten_catalog(&props.projects);

        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.iter().map(|i| i.key).collect::<Vec<_>>(),
            vec![101, 102, 103]
        );

        let first = &catalog[0];
        assert_eq!(first.name, "Trail Rehab");
        assert_eq!(first.phase_id, 11);
        assert_eq!(first.funding_source, "Grant");
        assert_eq!(first.funding_amount, 1000.0);
        assert!(first.funding_secured);
        // Sibling streams share the parent project's attributes
        assert_eq!(catalog[1].budget, catalog[0].budget);
    }

    #[test]
    fn lenient_numbers_and_defaults() {
        let props: PlannerProps = serde_json::from_value(snapshot_json()).unwrap();
        let catalog = flatten_catalog(&props.projects);

        // String budget parses; unparseable budget contributes 0
        assert_eq!(catalog[0].budget, 1500.5);
        assert_eq!(catalog[2].budget, 0.0);

        // Mixed string/number funding map parses leniently
        assert_eq!(catalog[0].funded_amount_by_year.get("2024"), Some(&1000.0));
        assert_eq!(catalog[0].funded_amount_by_year.get("2025"), Some(&500.0));

        // Missing text fields fall back to display defaults
        assert_eq!(catalog[0].description, "No description available.");
        assert_eq!(catalog[2].phase, "N/A");
        assert_eq!(catalog[0].score, "7.13");
        assert_eq!(catalog[2].score, "N/A");
    }

    #[test]
    fn section_names_are_distinct_in_first_seen_order() {
        let props: PlannerProps = serde_json::from_value(snapshot_json()).unwrap();
        let catalog = flatten_catalog(&props.projects);
        assert_eq!(section_names(&catalog), vec!["Trails".to_string()]);
    }
}
