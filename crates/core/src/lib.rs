//! # U-Layout Core
//!
//! Core data model and abstractions for the U-Layout constraint extraction
//! and layout-session engine.
//!
//! This crate provides the types shared by the extractor and the session
//! orchestrator: dump formats exchanged with external services, the
//! constraint graph and its serializable snapshot, geometry primitives and
//! the solver seam.
//!
//! ## Core Components
//!
//! - **Dump formats**: [`ContentDump`], [`FloorDump`], [`LayoutJson`], [`GroupInfo`]
//! - **Constraint model**: [`Constraint`], [`FaceType`], [`AxisGroup`], [`ConstraintKind`]
//! - **Graph**: [`ConstraintGraph`] (arena keyed by id) and [`ConstraintGraphDump`]
//! - **Geometry**: [`Frame`], [`Extents`], [`Aabb3D`]
//! - **Solver trait**: [`Solver`] - async seam to the placement optimizer
//!
//! ## Configuration
//!
//! Use [`ExtractConfig`] to configure extraction:
//!
//! ```rust
//! use u_layout_core::ExtractConfig;
//!
//! let config = ExtractConfig::new()
//!     .with_tolerance(1e-4)
//!     .with_max_match_distance(3.0)
//!     .with_parallel_regions(false);
//! assert_eq!(config.default_region_type, "Bed");
//! ```
//!
//! ## Round trip
//!
//! ```rust
//! use u_layout_core::{ConstraintGraph, FloorDump, RoomMeta};
//!
//! let floor = FloorDump::rectangle("room-1", "Bedroom", 4.0, 3.5, 2.8);
//! let graph = ConstraintGraph::new(RoomMeta::from_floor(&floor));
//! let loaded = ConstraintGraph::load(graph.dump()).unwrap();
//! assert_eq!(loaded, graph);
//! ```

pub mod config;
pub mod constraint;
pub mod dump;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod result;
pub mod solver;

// Re-exports
pub use config::ExtractConfig;
pub use constraint::{face_id, AxisGroup, Constraint, ConstraintKind, FaceType};
pub use dump::{
    Bound, ContentDump, ContentType, FloorDump, GroupInfo, LayoutJson, OuterCurve, RawPath2dDump,
};
pub use error::{Error, Result};
pub use geometry::{Aabb3D, Extents, Frame, DEFAULT_TOLERANCE};
pub use graph::{
    AnchorPass, ConstraintGraph, ConstraintGraphDump, ItemConstraintObject, ItemObjectDump,
    RegionObject, RegionType, RoomMeta,
};
pub use result::{Extraction, ExtractionReport, PartialMatch, UnresolvedHost};
pub use solver::{RoomEntityObject, SolveOutcome, Solver};
