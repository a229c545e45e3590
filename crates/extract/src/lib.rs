//! # U-Layout Extract
//!
//! Spatial constraint extraction for the U-Layout engine.
//!
//! Given a room boundary and the items placed in it, the extractor builds a
//! constraint graph describing how each item sits relative to its host item
//! or to the room.
//!
//! ## Pipeline
//!
//! 1. **Regioning**: a [`Grouping`] partitions items into regions
//! 2. **Host pass**: items whose `hostTag` names a peer's `tag` are anchored to it
//! 3. **Rule pass**: the [`ItemRule`] table anchors items to typed references
//! 4. **Region pass**: remaining items are anchored to the room
//!
//! Every anchoring computes face pairs on all three axis groups; a source
//! only receives constraints when all three match.
//!
//! ## Example
//!
//! ```rust
//! use u_layout_core::{ContentDump, FloorDump};
//! use u_layout_extract::ConstraintsExtractor;
//!
//! let floor = FloorDump::rectangle("room-1", "Bedroom", 5.0, 4.0, 2.8);
//! let bed = ContentDump::new("bed-1", "furniture/bed", [2.0, 2.0, 0.5])
//!     .with_position(2.5, 2.9, 0.0)
//!     .with_tag("bed");
//! let extraction = ConstraintsExtractor::default()
//!     .execute_by_dumps(&floor, &[bed])
//!     .unwrap();
//! assert_eq!(extraction.graph.item("bed-1").unwrap().constraints.len(), 3);
//! ```

pub mod body;
pub mod container;
pub mod extractor;
pub mod pass;
pub mod region;
pub mod rules;

// Re-exports
pub use body::{compute_faces, face_distance, faces_overlap, Face, MatchOutcome, SharedFrame};
pub use container::SpatialContainer;
pub use extractor::ConstraintsExtractor;
pub use pass::{ExtractionPass, HostPass, PartialGraph, RegionPass, RulePass};
pub use region::{Grouping, GroupingOutcome, RegionGroup, TagGrouping};
pub use rules::{bed_rules, FinderRegistry, ItemRule, NEAREST_FINDER};
pub use u_layout_core::{Error, Result};
