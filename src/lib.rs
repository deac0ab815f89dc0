//! Portfolio planning engine for a capital-improvement dashboard.
//!
//! Staff assemble project phases from a catalog into a named 5-year plan.
//! This crate owns the client-side state: the catalog/portfolio/remaining
//! reconciliation, derived budget totals, display filters, CSV export, and
//! the HTTP gateway to the server that owns persistence.

pub mod api;
pub mod catalog;
pub mod export;
pub mod filters;
pub mod planner;
pub mod totals;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, Message, Tag};
pub use catalog::{LineItem, PlannerProps, PortfolioRecord};
pub use filters::FilterState;
pub use planner::{Action, ConfirmDiscard, Planner, PlannerError, Portfolio};
pub use totals::Totals;
