//! End-to-end flow: server snapshot in, reconciled portfolio and CSV out.

use cip_planner::export::{export_filename, write_csv};
use cip_planner::{Action, FilterState, Planner, PlannerProps};
use std::collections::HashSet;

fn snapshot() -> &'static str {
    r#"{
        "user": 42,
        "projects": [
            {
                "pk": 11,
                "project_id": 1,
                "name": "Trail Rehabilitation",
                "description": "Resurface the north loop.\r\nPhase two of three.",
                "section": "Trails",
                "category": "Rehabilitation",
                "total_budget": "1200",
                "total_score": 8.5,
                "phase": "Construction",
                "phase_year": 2024,
                "countywide": false,
                "zones": [{"id": 1, "name": "North"}],
                "cost_by_zone": {"North": 1200.0},
                "funded_amount_by_year": {"2024": 800, "2025": 400},
                "funding_streams": [
                    {"id": 101, "source_type": "Grant", "budget": 800, "year": 2024, "funding_secured": true},
                    {"id": 102, "source_type": "Bond", "budget": 400, "year": 2025, "funding_secured": false}
                ]
            },
            {
                "pk": 12,
                "project_id": 2,
                "name": "Dam Spillway Repair",
                "section": "Dams",
                "category": "Repair",
                "total_budget": 5000,
                "total_score": 6.0,
                "phase": "Design",
                "phase_year": null,
                "countywide": true,
                "zones": [{"id": 2, "name": "South"}],
                "cost_by_zone": {"South": 5000.0},
                "funded_amount_by_year": {"2024": 1000},
                "funding_streams": [
                    {"id": 103, "source_type": "Levy", "budget": 5000, "year": 2024, "funding_secured": false}
                ]
            }
        ],
        "portfolios": [
            {
                "id": 7,
                "name": "Last Year Plan",
                "phases": [
                    {"phase": 12, "phase_funding_stream": 103, "sequence": 1}
                ]
            }
        ],
        "selected_portfolio": null
    }"#
}

fn planner() -> Planner {
    let props = PlannerProps::from_json(snapshot()).unwrap();
    Planner::from_props(props, Box::new(|_: &str| true))
}

fn keys(items: &[cip_planner::LineItem]) -> Vec<u64> {
    items.iter().map(|item| item.key).collect()
}

#[test]
fn builds_and_reconciles_a_plan() {
    let mut planner = planner();
    assert_eq!(keys(planner.remaining()), vec![101, 102, 103]);

    planner.apply(Action::AddItem { key: 103 }).unwrap();
    planner.apply(Action::AddItem { key: 101 }).unwrap();

    assert_eq!(keys(&planner.portfolio().items), vec![103, 101]);
    assert_eq!(keys(planner.remaining()), vec![102]);
    assert!(planner.unsaved_changes());

    // Totals recompute on every mutation
    let totals = &planner.portfolio().totals;
    assert_eq!(totals.budget_impact, 6200.0);
    assert_eq!(totals.estimated_cost_by_year.get("2024"), Some(&1200.0));
    assert_eq!(totals.estimated_cost_by_year.get("N/A"), Some(&5000.0));
    assert_eq!(totals.funded_amount_by_year.get("2024"), Some(&1800.0));
    assert_eq!(totals.funded_amount_by_year.get("2025"), Some(&400.0));

    // Remove puts the item back at its catalog position
    planner.apply(Action::RemoveItem { key: 103 }).unwrap();
    assert_eq!(keys(planner.remaining()), vec![102, 103]);

    let catalog: HashSet<u64> = keys(planner.catalog()).into_iter().collect();
    let partitioned: HashSet<u64> = keys(planner.remaining())
        .into_iter()
        .chain(keys(&planner.portfolio().items))
        .collect();
    assert_eq!(catalog, partitioned);
}

#[test]
fn selects_a_saved_portfolio_and_exports_it() {
    let mut planner = planner();
    planner.apply(Action::SelectPortfolio { id: 7 }).unwrap();

    assert_eq!(planner.portfolio().id, Some(7));
    assert_eq!(keys(&planner.portfolio().items), vec![103]);
    assert!(!planner.unsaved_changes());

    let mut buffer = Vec::new();
    write_csv(planner.portfolio(), &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();

    // header + exactly one row per line item
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("Dam Spillway Repair"));
    assert!(text.contains("cost_by_south_zone"));

    let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
    assert_eq!(
        export_filename(&planner.portfolio().name, date),
        "Last-Year-Plan-2026-08-30.csv"
    );
}

#[test]
fn filtering_is_display_only() {
    let mut planner = planner();
    planner
        .apply(Action::SetFilter {
            filter: FilterState {
                section: Some("Trails".to_string()),
                ..Default::default()
            },
        })
        .unwrap();

    assert_eq!(planner.visible_remaining().len(), 2);
    assert_eq!(planner.remaining().len(), 3);

    // Clearing the filter shows everything again
    planner
        .apply(Action::SetFilter { filter: FilterState::default() })
        .unwrap();
    assert_eq!(planner.visible_remaining().len(), 3);
}

#[test]
fn newline_stripping_reaches_the_csv() {
    let mut planner = planner();
    planner.apply(Action::AddItem { key: 101 }).unwrap();

    let mut buffer = Vec::new();
    write_csv(planner.portfolio(), &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert!(text.contains("Resurface the north loop. Phase two of three."));
}
