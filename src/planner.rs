//! Portfolio/remaining reconciliation.
//!
//! The planner holds the full immutable catalog plus two derived views: the
//! in-progress portfolio and the remaining candidate pool. Every catalog line
//! item belongs to exactly one of the two at all times. All mutation flows
//! through `apply` with an explicit `Action`, so state transitions are
//! serialized and there are no stale reads across re-renders.

use crate::catalog::{flatten_catalog, section_names, LineItem, PlannerProps, PortfolioRecord};
use crate::filters::FilterState;
use crate::totals::Totals;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

const DISCARD_PROMPT: &str = "The current portfolio has unsaved changes. Are you \
sure you want to switch portfolios? Changes you made may not be saved.";

/// A named plan under construction. `id` is absent until the server assigns
/// one on first save. Item order is addition order and determines the
/// persisted 1-based sequence numbers.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    pub id: Option<u64>,
    pub name: String,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub unsaved_changes: bool,
}

/// Confirmation capability for discarding unsaved changes. Injected so the
/// reconciler is testable without a real dialog.
pub trait ConfirmDiscard {
    fn confirm_discard(&self, message: &str) -> bool;
}

impl<F> ConfirmDiscard for F
where
    F: Fn(&str) -> bool,
{
    fn confirm_discard(&self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    AddItem { key: u64 },
    RemoveItem { key: u64 },
    SelectPortfolio { id: u64 },
    NewPortfolio,
    SetName { name: String },
    SetFilter { filter: FilterState },
    SaveStarted,
    SaveSucceeded { record: PortfolioRecord },
    SaveFailed,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlannerError {
    #[error("line item {key} is not in the remaining pool")]
    NotInRemaining { key: u64 },
    #[error("line item {key} is not in the portfolio")]
    NotInPortfolio { key: u64 },
    #[error("no saved portfolio with id {id}")]
    UnknownPortfolio { id: u64 },
    #[error("operation cancelled: unsaved changes kept")]
    DiscardDeclined,
    #[error("a save is already in flight")]
    SaveInFlight,
}

pub struct Planner {
    catalog: Vec<LineItem>,
    remaining: Vec<LineItem>,
    portfolio: Portfolio,
    portfolios: Vec<PortfolioRecord>,
    sections: Vec<String>,
    filter: FilterState,
    save_in_flight: bool,
    user: u64,
    confirm: Box<dyn ConfirmDiscard>,
}

impl Planner {
    /// Build planner state from the server snapshot. If the snapshot carries
    /// a previously selected portfolio, state is rehydrated from it.
    pub fn from_props(props: PlannerProps, confirm: Box<dyn ConfirmDiscard>) -> Self {
        let catalog = flatten_catalog(&props.projects);
        Planner::new(
            catalog,
            props.portfolios,
            props.selected_portfolio,
            props.user,
            confirm,
        )
    }

    pub fn new(
        catalog: Vec<LineItem>,
        portfolios: Vec<PortfolioRecord>,
        selected: Option<PortfolioRecord>,
        user: u64,
        confirm: Box<dyn ConfirmDiscard>,
    ) -> Self {
        let sections = section_names(&catalog);

        let (portfolio, remaining) = match &selected {
            Some(record) => hydrate(record, &catalog),
            None => (Portfolio::default(), catalog.clone()),
        };

        Planner {
            catalog,
            remaining,
            portfolio,
            portfolios,
            sections,
            filter: FilterState::default(),
            save_in_flight: false,
            user,
            confirm,
        }
    }

    pub fn catalog(&self) -> &[LineItem] {
        &self.catalog
    }

    pub fn remaining(&self) -> &[LineItem] {
        &self.remaining
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn portfolios(&self) -> &[PortfolioRecord] {
        &self.portfolios
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn user(&self) -> u64 {
        self.user
    }

    pub fn unsaved_changes(&self) -> bool {
        self.portfolio.unsaved_changes
    }

    pub fn save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    /// The remaining pool as currently displayed, with the full filter
    /// pipeline applied.
    pub fn visible_remaining(&self) -> Vec<&LineItem> {
        self.filter.apply(&self.remaining)
    }

    /// The portfolio as currently displayed. Only the section dimension
    /// narrows this view; text search applies to candidates alone.
    pub fn visible_portfolio(&self) -> Vec<&LineItem> {
        let section_only = FilterState {
            section: self.filter.section.clone(),
            ..Default::default()
        };
        section_only.apply(&self.portfolio.items)
    }

    /// Apply one action to the planner state. Contract violations are
    /// rejected with a typed error and leave state untouched.
    pub fn apply(&mut self, action: Action) -> Result<(), PlannerError> {
        match action {
            Action::AddItem { key } => self.add_item(key),
            Action::RemoveItem { key } => self.remove_item(key),
            Action::SelectPortfolio { id } => self.select_portfolio(id),
            Action::NewPortfolio => self.new_portfolio(),
            Action::SetName { name } => {
                // A rename is unsaved work too; without the flag it would
                // slip past the discard gate.
                self.portfolio.name = name;
                self.portfolio.unsaved_changes = true;
                Ok(())
            }
            Action::SetFilter { filter } => {
                self.filter = filter;
                Ok(())
            }
            Action::SaveStarted => self.save_started(),
            Action::SaveSucceeded { record } => {
                self.save_succeeded(record);
                Ok(())
            }
            Action::SaveFailed => {
                self.save_in_flight = false;
                Ok(())
            }
        }
    }

    fn add_item(&mut self, key: u64) -> Result<(), PlannerError> {
        let position = self
            .remaining
            .iter()
            .position(|item| item.key == key)
            .ok_or(PlannerError::NotInRemaining { key })?;

        let item = self.remaining.remove(position);
        self.portfolio.items.push(item);
        self.portfolio.totals = Totals::calculate(&self.portfolio.items);
        self.portfolio.unsaved_changes = true;
        Ok(())
    }

    fn remove_item(&mut self, key: u64) -> Result<(), PlannerError> {
        if !self.portfolio.items.iter().any(|item| item.key == key) {
            return Err(PlannerError::NotInPortfolio { key });
        }

        self.portfolio.items.retain(|item| item.key != key);

        // Remaining is rebuilt from scratch as catalog minus portfolio, by
        // key. Incremental re-insertion can duplicate items or drift out of
        // catalog order; the full recompute is O(catalog) and the catalog
        // tops out in the low thousands.
        let in_portfolio: HashSet<u64> =
            self.portfolio.items.iter().map(|item| item.key).collect();
        self.remaining = self
            .catalog
            .iter()
            .filter(|item| !in_portfolio.contains(&item.key))
            .cloned()
            .collect();

        self.portfolio.totals = Totals::calculate(&self.portfolio.items);
        self.portfolio.unsaved_changes = true;
        Ok(())
    }

    fn select_portfolio(&mut self, id: u64) -> Result<(), PlannerError> {
        self.gate_unsaved_changes()?;

        let record = self
            .portfolios
            .iter()
            .find(|portfolio| portfolio.id == id)
            .ok_or(PlannerError::UnknownPortfolio { id })?;

        let (portfolio, remaining) = hydrate(record, &self.catalog);
        debug!(portfolio = id, items = portfolio.items.len(), "hydrated portfolio");
        self.portfolio = portfolio;
        self.remaining = remaining;
        Ok(())
    }

    fn new_portfolio(&mut self) -> Result<(), PlannerError> {
        self.gate_unsaved_changes()?;
        self.portfolio = Portfolio::default();
        self.remaining = self.catalog.clone();
        Ok(())
    }

    fn save_started(&mut self) -> Result<(), PlannerError> {
        if self.save_in_flight {
            return Err(PlannerError::SaveInFlight);
        }
        self.save_in_flight = true;
        Ok(())
    }

    fn save_succeeded(&mut self, record: PortfolioRecord) {
        self.portfolio.id = Some(record.id);
        self.portfolio.unsaved_changes = false;
        self.save_in_flight = false;

        match self.portfolios.iter_mut().find(|p| p.id == record.id) {
            Some(existing) => *existing = record,
            None => self.portfolios.push(record),
        }
    }

    fn gate_unsaved_changes(&self) -> Result<(), PlannerError> {
        if self.portfolio.unsaved_changes && !self.confirm.confirm_discard(DISCARD_PROMPT) {
            return Err(PlannerError::DiscardDeclined);
        }
        Ok(())
    }
}

/// Reconstruct portfolio state from a persisted record plus the full catalog.
///
/// The catalog is partitioned by the record's referenced funding-stream keys.
/// Both partitions keep the catalog's relative order; the persisted
/// `sequence` field is not re-applied on load. Freshly loaded state counts
/// as saved.
pub fn hydrate(record: &PortfolioRecord, catalog: &[LineItem]) -> (Portfolio, Vec<LineItem>) {
    let selected: HashSet<u64> = record
        .phases
        .iter()
        .map(|phase| phase.phase_funding_stream)
        .collect();

    let (items, remaining): (Vec<LineItem>, Vec<LineItem>) = catalog
        .iter()
        .cloned()
        .partition(|item| selected.contains(&item.key));

    let portfolio = Portfolio {
        id: Some(record.id),
        name: record.name.clone(),
        totals: Totals::calculate(&items),
        items,
        unsaved_changes: false,
    };

    (portfolio, remaining)
}
