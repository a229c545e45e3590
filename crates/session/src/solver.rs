//! Reference solvers.
//!
//! [`ReplaySolver`] reproduces every `DistanceAsIs` offset against the new
//! room; [`IdentitySolver`] returns the items where they are.

use async_trait::async_trait;
use nalgebra::Vector3;
use std::collections::HashMap;
use u_layout_core::{
    AnchorPass, Constraint, ConstraintGraph, ConstraintKind, ContentDump, FloorDump, Frame,
    ItemConstraintObject, Result, RoomEntityObject, SolveOutcome, Solver, DEFAULT_TOLERANCE,
};
use u_layout_extract::{compute_faces, face_distance, SpatialContainer};

/// Returns every item unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySolver;

#[async_trait]
impl Solver for IdentitySolver {
    async fn solve(&self, graph: &ConstraintGraph, room: &FloorDump) -> Result<SolveOutcome> {
        let placed: Vec<ContentDump> = graph.items().iter().map(|i| i.dump.clone()).collect();
        Ok(SolveOutcome {
            out_of_room: containment_report(&placed, room, DEFAULT_TOLERANCE),
            target_cos: placed,
            room_entity_object: RoomEntityObject::from_floor(room),
        })
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Replays measured offsets: room-anchored items first, then dependents
/// once their target is placed.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySolver {
    tolerance: f64,
}

impl Default for ReplaySolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ReplaySolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Places every item of `graph` in `room`, synchronously.
    pub fn place(&self, graph: &ConstraintGraph, room: &FloorDump) -> Vec<ContentDump> {
        let room_container = SpatialContainer::from_floor(room, self.tolerance);
        let mut placed: HashMap<String, ContentDump> = HashMap::new();
        let mut pending: Vec<&ItemConstraintObject> = Vec::new();

        for item in graph.items() {
            match item.anchor {
                Some(AnchorPass::Region) => {
                    let mut dump = item.dump.clone();
                    for c in &item.constraints {
                        replay(&mut dump, c, &room_container);
                    }
                    placed.insert(item.id.clone(), dump);
                }
                Some(_) if item.has_constraints() => pending.push(item),
                _ => {
                    placed.insert(item.id.clone(), item.dump.clone());
                }
            }
        }

        // Dependents follow their targets; chains resolve over several rounds.
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|item| {
                let Some(target_id) = item.constraints.first().map(|c| c.target_id.as_str())
                else {
                    return false;
                };
                let Some(target) = placed.get(target_id) else {
                    return true;
                };
                let target = SpatialContainer::from_content(target);
                let mut dump = item.dump.clone();
                for c in &item.constraints {
                    replay(&mut dump, c, &target);
                }
                placed.insert(item.id.clone(), dump);
                false
            });
            if pending.len() == before {
                for item in pending.drain(..) {
                    log::warn!("item {} depends on an unplaced target, kept as-is", item.id);
                    placed.insert(item.id.clone(), item.dump.clone());
                }
            }
        }

        graph
            .items()
            .iter()
            .filter_map(|item| placed.remove(&item.id))
            .collect()
    }
}

#[async_trait]
impl Solver for ReplaySolver {
    async fn solve(&self, graph: &ConstraintGraph, room: &FloorDump) -> Result<SolveOutcome> {
        let placed = self.place(graph, room);
        let out_of_room = containment_report(&placed, room, self.tolerance);
        if !out_of_room.is_empty() {
            log::warn!("{} items leave room '{}'", out_of_room.len(), room.tag);
        }
        Ok(SolveOutcome {
            target_cos: placed,
            room_entity_object: RoomEntityObject::from_floor(room),
            out_of_room,
        })
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Moves `dump` along the constraint's source normal until the measured
/// offset to `target` equals the stored one.
fn replay(dump: &mut ContentDump, constraint: &Constraint, target: &SpatialContainer) {
    if constraint.kind != ConstraintKind::DistanceAsIs {
        log::debug!("skipping constraint {} of kind {}", constraint.id, constraint.kind);
        return;
    }
    let reference = Frame::identity();
    let source = SpatialContainer::from_content(dump);
    let source_faces = compute_faces(&source, &reference);
    let target_faces = compute_faces(target, &reference);
    let (Some(sf), Some(tf)) = (
        source_faces.iter().find(|f| f.face_type == constraint.self_face),
        target_faces.iter().find(|f| f.face_type == constraint.target_face),
    ) else {
        return;
    };
    let delta = face_distance(sf, tf) - constraint.signed_distance;
    translate(dump, &(sf.normal * delta));
}

/// Translates a dump and all of its members.
fn translate(dump: &mut ContentDump, offset: &Vector3<f64>) {
    dump.set_position([dump.x + offset.x, dump.y + offset.y, dump.z + offset.z]);
    for child in &mut dump.children {
        translate(child, offset);
    }
}

/// Ids of items whose world bounds leave the room's bounds.
pub fn containment_report(placed: &[ContentDump], room: &FloorDump, tolerance: f64) -> Vec<String> {
    let bounds = SpatialContainer::from_floor(room, tolerance)
        .world_aabb()
        .expand(tolerance.max(1e-9));
    placed
        .iter()
        .filter(|d| !SpatialContainer::from_content(d).world_aabb().is_within(&bounds))
        .map(|d| d.entity_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use u_layout_extract::ConstraintsExtractor;

    fn bedroom(tag: &str, width: f64, depth: f64) -> FloorDump {
        FloorDump::rectangle(tag, "Bedroom", width, depth, 2.8).with_curve_tags(2, ["bedWallFace"])
    }

    fn graph() -> ConstraintGraph {
        let bed = ContentDump::new("bed", "bed", [2.0, 2.0, 0.5])
            .with_position(3.0, 3.5, 0.0)
            .with_tag("bed")
            .with_host_tag("bedWallFace");
        let ns = ContentDump::new("ns", "nightstand", [0.5, 0.5, 0.5])
            .with_position(4.55, 4.25, 0.0)
            .with_host_tag("bed");
        ConstraintsExtractor::default()
            .execute_by_dumps(&bedroom("small", 6.0, 5.0), &[bed, ns])
            .unwrap()
            .ensure_anchored()
            .unwrap()
    }

    #[tokio::test]
    async fn test_replay_in_same_room_is_stable() {
        let graph = graph();
        let outcome = ReplaySolver::new()
            .solve(&graph, &bedroom("small", 6.0, 5.0))
            .await
            .unwrap();
        let ns = outcome.placed("ns").unwrap();
        assert_relative_eq!(ns.x, 4.55, epsilon = 1e-9);
        assert_relative_eq!(ns.y, 4.25, epsilon = 1e-9);
        assert!(outcome.out_of_room.is_empty());
    }

    #[tokio::test]
    async fn test_replay_follows_the_back_wall() {
        let graph = graph();
        let outcome = ReplaySolver::new()
            .solve(&graph, &bedroom("large", 8.0, 7.0))
            .await
            .unwrap();
        let bed = outcome.placed("bed").unwrap();
        let ns = outcome.placed("ns").unwrap();
        // The bed keeps 0.5 to the back wall and 2.0 to the left wall.
        assert_relative_eq!(bed.y, 5.5, epsilon = 1e-9);
        assert_relative_eq!(bed.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(ns.x - bed.x, 1.55, epsilon = 1e-9);
        assert_relative_eq!(ns.y - bed.y, 0.75, epsilon = 1e-9);
        assert_eq!(outcome.room_entity_object.id, "large");
    }

    #[tokio::test]
    async fn test_identity_passthrough_and_containment() {
        let graph = graph();
        let outcome = IdentitySolver
            .solve(&graph, &bedroom("tiny", 3.0, 3.0))
            .await
            .unwrap();
        assert_eq!(outcome.target_cos.len(), 2);
        assert_eq!(outcome.placed("bed").unwrap().x, 3.0);
        assert_eq!(outcome.out_of_room, vec!["bed", "ns"]);
    }

    #[test]
    fn test_translate_moves_group_members() {
        let child = ContentDump::new("c", "chair", [1.0, 1.0, 1.0]).with_position(1.0, 0.0, 0.0);
        let mut group = ContentDump::new("g", "group", [0.0; 3]).with_children(vec![child]);
        translate(&mut group, &Vector3::new(0.5, 1.0, 0.0));
        assert_eq!(group.x, 0.5);
        assert_eq!(group.children[0].x, 1.5);
        assert_eq!(group.children[0].y, 1.0);
    }
}
