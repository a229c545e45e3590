//! # U-Layout Session
//!
//! Layout session orchestration for the U-Layout engine.
//!
//! A [`LayoutSession`] drives one target room through search, apply,
//! iterative completion and shuffle, coordinating the constraint extractor
//! with an external [`SearchService`] and [`Solver`](u_layout_core::Solver).
//!
//! ## Core Components
//!
//! - **Session**: [`LayoutSession`] - single-writer state machine per room
//! - **Category manager**: [`CategoryManager`] - interchangeable category clusters
//! - **Search seam**: [`SearchService`] and the backoff wrapper [`RetryingSearchService`]
//! - **Solvers**: [`ReplaySolver`] and the [`IdentitySolver`] passthrough
//! - **Events**: [`SessionEvent`] broadcast to subscribers
//!
//! ## Concurrency
//!
//! At most one of `search`, `apply`, `complete_layout`, `shuffle` and
//! `apply_inspiration` runs at a time; a second call fails with
//! [`Error::OperationInFlight`]. `clear()` and `dispose()` bump the session
//! generation so results of operations still running are discarded.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use u_layout_session::{LayoutSession, ReplaySolver, SessionConfig, SessionPhase};
//! # use async_trait::async_trait;
//! # use u_layout_session::search::*;
//! # use u_layout_core::Result;
//! # struct NoSearch;
//! # #[async_trait]
//! # impl SearchService for NoSearch {
//! #     async fn design_search(&self, _: &DesignSearchQuery) -> Result<Vec<SearchResult>> { Ok(vec![]) }
//! #     async fn estimate_room_type(&self, _: &RoomTypeQuery) -> Result<Vec<RoomTypeEstimate>> { Ok(vec![]) }
//! #     async fn layout_search(&self, _: &LayoutSearchQuery) -> Result<Vec<SearchResult>> { Ok(vec![]) }
//! # }
//!
//! let session = LayoutSession::new(
//!     Arc::new(NoSearch),
//!     Arc::new(ReplaySolver::new()),
//!     SessionConfig::new().with_k(3),
//! );
//! assert_eq!(session.phase(), SessionPhase::Idle);
//! session.dispose().unwrap();
//! assert!(session.dispose().is_err());
//! ```

pub mod category;
pub mod config;
pub mod events;
pub mod search;
pub mod session;
pub mod solver;

// Re-exports
pub use category::{CategoryGroup, CategoryManager, CategoryStatus};
pub use config::{RetryPolicy, SessionConfig};
pub use events::{SessionEvent, SessionPhase};
pub use search::{
    destructure_room_id, search_error, DesignSearchQuery, LayoutSearchQuery, RetryingSearchService,
    RoomIdParts, RoomTypeEstimate, RoomTypeQuery, SearchResult, SearchService,
};
pub use session::{
    ApplyMode, ApplyResult, CompletionContext, CompletionStatus, InspirationData, LayoutSession,
    SearchOptions, ShuffleMode, ShuffleOutcome,
};
pub use solver::{containment_report, IdentitySolver, ReplaySolver};
pub use u_layout_core::{Error, Result};
