//! Search service seam and the retrying wrapper around it.

use crate::config::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use u_layout_core::{Error, LayoutJson, Result};

/// A candidate historical layout returned by the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    #[serde(default)]
    pub room_type: String,
    #[serde(default)]
    pub score: f64,
    /// The layout as a JSON string ([`LayoutJson`]).
    pub layout_json_string: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_image: Option<String>,
}

impl SearchResult {
    /// Parses the embedded layout.
    pub fn layout(&self) -> Result<LayoutJson> {
        LayoutJson::parse(&self.layout_json_string)
    }
}

/// Whole-house template query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSearchQuery {
    pub k: usize,
    pub area: f64,
    pub bedroom_num: u32,
    pub livingroom_num: u32,
    pub bathroom_num: u32,
    #[serde(default)]
    pub excluded_region: Vec<String>,
}

/// Room-type estimation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTypeQuery {
    #[serde(rename = "floorOuterWKT")]
    pub floor_outer_wkt: String,
    pub source: String,
}

/// One room-type estimate; the id starts with the room type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeEstimate {
    pub room_id: String,
}

/// Per-room layout query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSearchQuery {
    pub room_id: String,
    pub room_types: Vec<String>,
    #[serde(rename = "floorOuterWKT")]
    pub floor_outer_wkt: String,
    pub area: f64,
    pub k: usize,
    pub strict_mode: bool,
    pub origin: String,
}

/// Parts of a room id of the form `"{roomType}-{rest}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomIdParts {
    pub room_type: String,
    pub rest: String,
}

/// Splits a room id at its first `-`.
pub fn destructure_room_id(room_id: &str) -> RoomIdParts {
    match room_id.split_once('-') {
        Some((room_type, rest)) => RoomIdParts {
            room_type: room_type.to_string(),
            rest: rest.to_string(),
        },
        None => RoomIdParts {
            room_type: room_id.to_string(),
            rest: String::new(),
        },
    }
}

/// The candidate-layout search service.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn design_search(&self, query: &DesignSearchQuery) -> Result<Vec<SearchResult>>;

    async fn estimate_room_type(&self, query: &RoomTypeQuery) -> Result<Vec<RoomTypeEstimate>>;

    async fn layout_search(&self, query: &LayoutSearchQuery) -> Result<Vec<SearchResult>>;
}

/// Retries failed search calls with exponential backoff.
pub struct RetryingSearchService {
    inner: Arc<dyn SearchService>,
    policy: RetryPolicy,
}

impl RetryingSearchService {
    pub fn new(inner: Arc<dyn SearchService>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_external() && attempt < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    log::warn!(
                        "{} failed (attempt {} of {}): {}; retrying in {:?}",
                        operation,
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl SearchService for RetryingSearchService {
    async fn design_search(&self, query: &DesignSearchQuery) -> Result<Vec<SearchResult>> {
        self.retry("design_search", || self.inner.design_search(query))
            .await
    }

    async fn estimate_room_type(&self, query: &RoomTypeQuery) -> Result<Vec<RoomTypeEstimate>> {
        self.retry("estimate_room_type", || self.inner.estimate_room_type(query))
            .await
    }

    async fn layout_search(&self, query: &LayoutSearchQuery) -> Result<Vec<SearchResult>> {
        self.retry("layout_search", || self.inner.layout_search(query))
            .await
    }
}

/// Search failures that are not already typed become [`Error::Search`].
pub fn search_error(message: impl Into<String>) -> Error {
    Error::Search(message.into())
}
