//! Regioning: partitions raw items into regions and maps room face tags.

use crate::container::{outline_polygon, SpatialContainer};
use geo::Winding;
use std::collections::BTreeMap;
use u_layout_core::{
    face_id, Aabb3D, ContentDump, ExtractConfig, FaceType, FloorDump, GroupInfo, RegionType,
};

/// Items assigned to one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGroup {
    pub id: String,
    pub region_type: RegionType,
    pub dumps: Vec<ContentDump>,
}

/// Result of grouping: regions plus per-region metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupingOutcome {
    pub groups: Vec<RegionGroup>,
    pub group_infos: Vec<GroupInfo>,
}

/// Partitions items into regions.
pub trait Grouping: Send + Sync {
    fn group(
        &self,
        floor: &FloorDump,
        dumps: &[ContentDump],
        config: &ExtractConfig,
    ) -> GroupingOutcome;
}

/// Groups items by their `groupType`; items without one join the default
/// region type. Regions appear in first-seen order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagGrouping;

impl Grouping for TagGrouping {
    fn group(
        &self,
        _floor: &FloorDump,
        dumps: &[ContentDump],
        config: &ExtractConfig,
    ) -> GroupingOutcome {
        let mut order: Vec<String> = Vec::new();
        let mut members: BTreeMap<String, Vec<ContentDump>> = BTreeMap::new();
        for dump in dumps {
            let key = dump
                .group_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| config.default_region_type.clone());
            if !members.contains_key(&key) {
                order.push(key.clone());
            }
            members.entry(key).or_default().push(dump.clone());
        }

        let mut outcome = GroupingOutcome::default();
        for (index, key) in order.into_iter().enumerate() {
            let dumps = members.remove(&key).unwrap_or_default();
            let id = format!("region-{}", index);
            outcome.group_infos.push(group_info(&id, &key, &dumps));
            outcome.groups.push(RegionGroup {
                id,
                region_type: RegionType::from(key),
                dumps,
            });
        }
        outcome
    }
}

/// Builds the metadata record of one region.
pub fn group_info(id: &str, group_type: &str, dumps: &[ContentDump]) -> GroupInfo {
    let mut categories: Vec<String> = Vec::new();
    for cat in dumps.iter().flat_map(|d| d.categories.iter()) {
        if !categories.contains(cat) {
            categories.push(cat.clone());
        }
    }
    let bounds = dumps
        .iter()
        .map(|d| SpatialContainer::from_content(d).world_aabb())
        .reduce(|a, b| {
            Aabb3D::new(
                [a.min[0].min(b.min[0]), a.min[1].min(b.min[1]), a.min[2].min(b.min[2])],
                [a.max[0].max(b.max[0]), a.max[1].max(b.max[1]), a.max[2].max(b.max[2])],
            )
        });
    let (x_length, y_length) = bounds
        .map(|b| (b.max[0] - b.min[0], b.max[1] - b.min[1]))
        .unwrap_or((0.0, 0.0));
    GroupInfo {
        id: id.to_string(),
        group_type: group_type.to_string(),
        categories,
        member_ids: dumps.iter().map(|d| d.entity_id.clone()).collect(),
        x_length,
        y_length,
    }
}

/// Maps every symbolic tag of a floor to a room face id.
///
/// Outer curves map to the bounding-box side their outward normal points
/// to; floor tags map to the bottom face and ceiling tags to the top face.
pub fn room_face_tags(floor: &FloorDump) -> BTreeMap<String, String> {
    let room_id = floor.tag.as_str();
    let mut tags = BTreeMap::new();

    let polygon = outline_polygon(&floor.outer_polygon());
    let ccw = polygon.exterior().is_ccw();

    for curve in &floor.world_raw_path2d_dump.outer {
        if curve.face_tags.is_empty() {
            continue;
        }
        let dx = curve.end[0] - curve.start[0];
        let dy = curve.end[1] - curve.start[1];
        if curve.length_squared() == 0.0 {
            log::warn!("zero-length curve in '{}' carries face tags", room_id);
            continue;
        }
        let (nx, ny) = if ccw { (dy, -dx) } else { (-dy, dx) };
        let face = if nx.abs() >= ny.abs() {
            if nx > 0.0 {
                FaceType::Right
            } else {
                FaceType::Left
            }
        } else if ny > 0.0 {
            FaceType::Back
        } else {
            FaceType::Front
        };
        for tag in &curve.face_tags {
            tags.insert(tag.clone(), face_id(room_id, face));
        }
    }
    for tag in &floor.floor_tags {
        tags.insert(tag.clone(), face_id(room_id, FaceType::Bottom));
    }
    for tag in &floor.ceiling_tags {
        tags.insert(tag.clone(), face_id(room_id, FaceType::Top));
    }
    tags
}
