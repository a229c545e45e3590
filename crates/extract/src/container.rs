//! Geometric frame adapter: a uniform view over single items, item groups
//! and room boundaries.

use geo::{Area, BoundingRect, Coord, LineString, Polygon};
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;
use u_layout_core::{Aabb3D, ContentDump, Extents, FloorDump, Frame, ItemConstraintObject};

/// A single placed item.
#[derive(Debug, Clone)]
pub struct SingleItem {
    id: String,
    frame: Frame,
    size: [f64; 3],
    extents: OnceLock<Extents>,
}

/// A group of items; member frames are world frames.
#[derive(Debug, Clone)]
pub struct ItemGroup {
    id: String,
    frame: Frame,
    members: Vec<SpatialContainer>,
    extents: OnceLock<Extents>,
}

/// A room boundary.
#[derive(Debug, Clone)]
pub struct RoomBoundary {
    id: String,
    frame: Frame,
    outline: Vec<(f64, f64)>,
    height: f64,
    tolerance: f64,
    extents: OnceLock<Extents>,
}

/// Anything that can be measured against: an item, a group or a room.
#[derive(Debug, Clone)]
pub enum SpatialContainer {
    Single(SingleItem),
    Group(ItemGroup),
    Room(RoomBoundary),
}

impl SpatialContainer {
    /// Adapts a content dump; dumps with children become groups.
    pub fn from_content(dump: &ContentDump) -> Self {
        Self::from_content_with_id(dump.entity_id.clone(), dump)
    }

    /// Adapts an item wrapper.
    pub fn from_item(item: &ItemConstraintObject) -> Self {
        Self::from_content_with_id(item.id.clone(), &item.dump)
    }

    fn from_content_with_id(id: String, dump: &ContentDump) -> Self {
        if dump.is_group() {
            SpatialContainer::Group(ItemGroup {
                id,
                frame: dump.frame(),
                members: dump.children.iter().map(Self::from_content).collect(),
                extents: OnceLock::new(),
            })
        } else {
            SpatialContainer::Single(SingleItem {
                id,
                frame: dump.frame(),
                size: dump.size(),
                extents: OnceLock::new(),
            })
        }
    }

    /// Adapts a room boundary. The frame sits at the centre of the outline's
    /// bounding box, at floor level.
    pub fn from_floor(floor: &FloorDump, tolerance: f64) -> Self {
        let outline = floor.outer_polygon();
        let center = outline_polygon(&outline)
            .bounding_rect()
            .map(|rect| rect.center())
            .unwrap_or(Coord { x: 0.0, y: 0.0 });
        SpatialContainer::Room(RoomBoundary {
            id: floor.tag.clone(),
            frame: Frame::at(Vector3::new(center.x, center.y, 0.0)),
            outline,
            height: floor.layer_height,
            tolerance,
            extents: OnceLock::new(),
        })
    }

    pub fn id(&self) -> &str {
        match self {
            SpatialContainer::Single(c) => &c.id,
            SpatialContainer::Group(c) => &c.id,
            SpatialContainer::Room(c) => &c.id,
        }
    }

    /// Local-to-world frame.
    pub fn frame(&self) -> &Frame {
        match self {
            SpatialContainer::Single(c) => &c.frame,
            SpatialContainer::Group(c) => &c.frame,
            SpatialContainer::Room(c) => &c.frame,
        }
    }

    /// Bounding extents in the local frame, computed on first use.
    pub fn extents(&self) -> &Extents {
        match self {
            SpatialContainer::Single(c) => c
                .extents
                .get_or_init(|| Extents::bottom_centered(c.size)),
            SpatialContainer::Group(c) => c.extents.get_or_init(|| group_extents(c)),
            SpatialContainer::Room(c) => c.extents.get_or_init(|| room_extents(c)),
        }
    }

    /// Child containers; empty for single items and rooms.
    pub fn children(&self) -> &[SpatialContainer] {
        match self {
            SpatialContainer::Group(c) => &c.members,
            _ => &[],
        }
    }

    pub fn is_room(&self) -> bool {
        matches!(self, SpatialContainer::Room(_))
    }

    /// Returns true when the footprint is too small to match any face.
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        self.extents().is_degenerate(tolerance)
    }

    /// Box corners in world coordinates.
    pub fn world_corners(&self) -> Vec<Point3<f64>> {
        let frame = self.frame();
        self.extents()
            .corners()
            .iter()
            .map(|c| frame.to_parent(c))
            .collect()
    }

    /// World-space bounding box.
    pub fn world_aabb(&self) -> Aabb3D {
        Aabb3D::from_extents(self.extents(), self.frame())
    }
}

fn group_extents(group: &ItemGroup) -> Extents {
    let local: Vec<Point3<f64>> = group
        .members
        .iter()
        .flat_map(|m| m.world_corners())
        .map(|p| group.frame.to_local(&p))
        .collect();
    Extents::from_points(&local).unwrap_or_else(Extents::zero)
}

fn room_extents(room: &RoomBoundary) -> Extents {
    if room.outline.len() < 3 {
        return Extents::zero();
    }
    let polygon = outline_polygon(&room.outline);
    if polygon.unsigned_area() <= room.tolerance {
        return Extents::zero();
    }
    match polygon.bounding_rect() {
        Some(rect) => {
            let hw = rect.width() * 0.5;
            let hd = rect.height() * 0.5;
            Extents::new([-hw, -hd, 0.0], [hw, hd, room.height.max(0.0)])
        }
        None => Extents::zero(),
    }
}

/// Builds a geo polygon from an outline.
pub(crate) fn outline_polygon(outline: &[(f64, f64)]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = outline.iter().map(|&(x, y)| Coord { x, y }).collect();
    Polygon::new(LineString::from(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use u_layout_core::DEFAULT_TOLERANCE;

    #[test]
    fn test_single_item_extents() {
        let dump = ContentDump::new("bed", "bed", [2.0, 1.8, 0.5]).with_position(1.0, 1.0, 0.0);
        let c = SpatialContainer::from_content(&dump);
        assert_eq!(c.id(), "bed");
        assert_eq!(c.extents().max, [1.0, 0.9, 0.5]);
        assert!(c.children().is_empty());
        let aabb = c.world_aabb();
        assert_relative_eq!(aabb.min[0], 0.0);
        assert_relative_eq!(aabb.max[1], 1.9);
    }

    #[test]
    fn test_group_extents_cover_members() {
        let a = ContentDump::new("a", "chair", [1.0, 1.0, 1.0]).with_position(-1.0, 0.0, 0.0);
        let b = ContentDump::new("b", "chair", [1.0, 1.0, 2.0]).with_position(1.0, 0.0, 0.0);
        let group = ContentDump::new("g", "group", [0.0; 3])
            .with_position(0.0, 0.0, 0.0)
            .with_children(vec![a, b]);
        let c = SpatialContainer::from_content(&group);
        assert_eq!(c.children().len(), 2);
        let ext = c.extents();
        assert_relative_eq!(ext.min[0], -1.5);
        assert_relative_eq!(ext.max[0], 1.5);
        assert_relative_eq!(ext.max[2], 2.0);
    }

    #[test]
    fn test_room_frame_and_extents() {
        let floor = FloorDump::rectangle("room", "Bedroom", 4.0, 3.0, 2.8);
        let c = SpatialContainer::from_floor(&floor, DEFAULT_TOLERANCE);
        assert!(c.is_room());
        assert_relative_eq!(c.frame().position().x, 2.0);
        assert_relative_eq!(c.frame().position().y, 1.5);
        assert_eq!(c.extents().min, [-2.0, -1.5, 0.0]);
        assert_eq!(c.extents().max, [2.0, 1.5, 2.8]);
    }

    #[test]
    fn test_degenerate_room_has_zero_extents() {
        let floor = FloorDump::from_polygon("flat", "", &[(0.0, 0.0), (4.0, 0.0), (8.0, 0.0)], 2.8);
        let c = SpatialContainer::from_floor(&floor, DEFAULT_TOLERANCE);
        assert_eq!(*c.extents(), Extents::zero());
        assert!(c.is_degenerate(DEFAULT_TOLERANCE));

        let tiny = FloorDump::from_polygon("tiny", "", &[(0.0, 0.0), (1.0, 0.0)], 2.8);
        assert!(SpatialContainer::from_floor(&tiny, DEFAULT_TOLERANCE).is_degenerate(DEFAULT_TOLERANCE));
    }
}
