//! The solver seam: turns a constraint graph plus a target room into
//! concrete placements.

use crate::dump::{ContentDump, FloorDump};
use crate::graph::ConstraintGraph;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The room the placements were resolved against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntityObject {
    pub id: String,
    pub room_type: String,
    pub floor: FloorDump,
}

impl RoomEntityObject {
    pub fn from_floor(floor: &FloorDump) -> Self {
        Self {
            id: floor.tag.clone(),
            room_type: floor.room_type.clone(),
            floor: floor.clone(),
        }
    }
}

/// Result of a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutcome {
    /// Placed items, in graph order.
    #[serde(rename = "targetCOs")]
    pub target_cos: Vec<ContentDump>,
    pub room_entity_object: RoomEntityObject,
    /// Ids of placed items whose bounds leave the room.
    #[serde(default)]
    pub out_of_room: Vec<String>,
}

impl SolveOutcome {
    /// Looks up a placed item by id.
    pub fn placed(&self, id: &str) -> Option<&ContentDump> {
        self.target_cos.iter().find(|d| d.entity_id == id)
    }
}

/// Trait for constraint solvers.
///
/// Implementations must be deterministic: solving an unchanged graph
/// against an unchanged room yields the same placements.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Solves `graph` against `room`.
    async fn solve(&self, graph: &ConstraintGraph, room: &FloorDump) -> Result<SolveOutcome>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "solver"
    }
}
