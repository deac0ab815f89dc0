//! HTTP gateway to the dashboard server.
//!
//! This module handles:
//! - Creating/updating portfolios (the save path of the planner)
//! - Searching the geographic asset catalog
//! - Attaching, deleting and promoting phase assets, and the countywide flag
//!
//! All requests are same-origin JSON carrying the `X-CSRFTOKEN` header read
//! from the session cookie. Failures are converted into typed errors at the
//! call site; there is no retry and no global handler. The caller decides
//! what to show the user via `Message`.

use crate::catalog::PortfolioRecord;
use crate::planner::Portfolio;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("CSRF token is not a valid header value")]
    InvalidCsrfToken,
}

/// User-facing notice, tagged the way the dashboard renders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Success,
    Danger,
}

impl Message {
    pub fn success(text: impl Into<String>) -> Self {
        Message { text: text.into(), tag: Tag::Success }
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Message { text: text.into(), tag: Tag::Danger }
    }

    /// Danger message for a failed call, prefixed with the caller's context
    /// sentence.
    pub fn failure(context: &str, error: &ApiError) -> Self {
        Message::danger(format!("{context} {error}"))
    }
}

static CSRF_COOKIE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|;\s*)csrftoken=([^;]+)").expect("valid cookie pattern"));

/// Extract the CSRF token from a cookie header string.
pub fn csrf_token_from_cookie(cookies: &str) -> Option<String> {
    CSRF_COOKIE
        .captures(cookies)
        .and_then(|caps| caps.get(1))
        .map(|token| token.as_str().to_string())
}

/// Wire shape of a portfolio save request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioPayload {
    pub name: String,
    pub user: u64,
    pub phases: Vec<PhasePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasePayload {
    pub phase_funding_stream: u64,
    pub sequence: u32,
    pub phase: u64,
}

impl PortfolioPayload {
    /// Re-index the current item order as 1-based sequence numbers. This
    /// ordered pairing is how phase order within a plan is persisted.
    pub fn from_portfolio(portfolio: &Portfolio, user: u64) -> Self {
        PortfolioPayload {
            name: portfolio.name.clone(),
            user,
            phases: portfolio
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| PhasePayload {
                    phase_funding_stream: item.key,
                    sequence: (index + 1) as u32,
                    phase: item.phase_id,
                })
                .collect(),
        }
    }
}

/// One drawn/selected geometry to attach to a phase.
#[derive(Debug, Clone, Serialize)]
pub struct LocalAssetPayload {
    pub asset_id: String,
    pub asset_type: String,
    pub asset_name: String,
    pub geom: Value,
    pub phase: u64,
}

/// GeoJSON search results. Geometries pass through as opaque JSON; clipping
/// is someone else's job.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub geometry: Value,
}

impl FeatureCollection {
    /// Zero features is informational, not an error.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, csrf_token: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-CSRFTOKEN",
            HeaderValue::from_str(csrf_token).map_err(|_| ApiError::InvalidCsrfToken)?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(ApiClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create or update a portfolio, depending on whether it already has a
    /// server-assigned id. Returns the authoritative record; the caller feeds
    /// it back into the planner as `SaveSucceeded` (or `SaveFailed` on error,
    /// which keeps the unsaved-changes flag set).
    pub async fn save_portfolio(
        &self,
        portfolio: &Portfolio,
        user: u64,
    ) -> Result<PortfolioRecord, ApiError> {
        let payload = PortfolioPayload::from_portfolio(portfolio, user);

        let request = match portfolio.id {
            Some(id) => self.client.patch(self.url(&format!("/portfolios/{id}/"))),
            None => self.client.post(self.url("/portfolios/")),
        };

        let response = request.json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await.unwrap_or_default()));
        }

        Ok(response.json().await?)
    }

    /// Search the geographic asset catalog by free text and asset type.
    pub async fn search_assets(
        &self,
        query: &str,
        asset_type: &str,
    ) -> Result<FeatureCollection, ApiError> {
        let response = self
            .client
            .get(self.url("/assets/"))
            .query(&[("q", query), ("asset_type", asset_type)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await.unwrap_or_default()));
        }

        let collection: FeatureCollection = response.json().await?;
        if collection.is_empty() {
            warn!(query, asset_type, "asset search returned no features");
        }
        Ok(collection)
    }

    /// Attach drawn/selected geometries to a phase.
    pub async fn save_local_assets(
        &self,
        assets: &[LocalAssetPayload],
    ) -> Result<Message, ApiError> {
        let response = self
            .client
            .post(self.url("/local-assets/"))
            .json(&assets)
            .send()
            .await?;
        expect_status(response, StatusCode::CREATED).await?;
        Ok(Message::success("Assets successfully saved."))
    }

    /// Remove one attached asset.
    pub async fn delete_local_asset(&self, asset_id: u64) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/local-assets/{asset_id}")))
            .send()
            .await?;
        expect_status(response, StatusCode::NO_CONTENT).await
    }

    /// Move all assets from one phase to another.
    pub async fn promote_phase_assets(
        &self,
        new_phase_id: u64,
        old_phase_id: u64,
    ) -> Result<Message, ApiError> {
        let response = self
            .client
            .post(self.url("/projects/phases/promote/assets/"))
            .json(&serde_json::json!({
                "new_phase_id": new_phase_id,
                "old_phase_id": old_phase_id,
            }))
            .send()
            .await?;
        expect_status(response, StatusCode::CREATED).await?;
        Ok(Message::success("Assets successfully promoted to new phase."))
    }

    /// Set or unset a phase's countywide flag.
    pub async fn set_countywide(
        &self,
        countywide: bool,
        phase_id: u64,
    ) -> Result<Message, ApiError> {
        let response = self
            .client
            .post(self.url("/projects/phases/assets/countywide/"))
            .json(&serde_json::json!({
                "countywide": countywide,
                "phase_id": phase_id,
            }))
            .send()
            .await?;
        expect_status(response, StatusCode::CREATED).await?;
        Ok(Message::success("Countywide successfully changed for phase."))
    }
}

async fn expect_status(response: reqwest::Response, expected: StatusCode) -> Result<(), ApiError> {
    let status = response.status();
    if status != expected {
        return Err(status_error(status, response.text().await.unwrap_or_default()));
    }
    Ok(())
}

/// Build a status error, flattening a structured validation body
/// (`[{field: [messages]}]`) into one human-readable string when present.
fn status_error(status: StatusCode, body: String) -> ApiError {
    let detail = match serde_json::from_str::<Vec<BTreeMap<String, Vec<String>>>>(&body) {
        Ok(errors) => flatten_validation_errors(&errors),
        Err(_) => body,
    };
    ApiError::Status { status, detail }
}

fn flatten_validation_errors(errors: &[BTreeMap<String, Vec<String>>]) -> String {
    let mut message = String::new();
    for error in errors {
        for (field, messages) in error {
            message.push_str(&format!("Error for field: {field}. {}", messages.join(" ")));
        }
    }
    message
}
