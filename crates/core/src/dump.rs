//! Plain, versionable dump records exchanged with the search service,
//! the solver and persistence.
//!
//! Field names follow the layout JSON produced by the historical layout
//! store (`seekId`, `XLength`, `worldRawPath2dDump`, ...).

use crate::error::{Error, Result};
use crate::geometry::Frame;
use serde::{Deserialize, Serialize};

/// Hierarchical content-type descriptor, e.g. `"furniture/bed/double"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(pub String);

impl ContentType {
    /// Creates a content type from its path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns true when any `/`-separated segment equals `kind`
    /// (ASCII case-insensitive).
    pub fn is_type_of(&self, kind: &str) -> bool {
        self.0
            .split('/')
            .any(|segment| segment.eq_ignore_ascii_case(kind))
    }

    /// Returns the raw path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One placed catalog item (or a group of items when `children` is non-empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDump {
    /// Catalog identifier.
    #[serde(default)]
    pub seek_id: String,
    /// Catalog categories the item belongs to.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Content type path.
    #[serde(default)]
    pub content_type: ContentType,
    /// The item's own symbolic name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Symbolic name of the item or room face this item depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_tag: Option<String>,
    /// Entity identifier, unique within one layout.
    pub entity_id: String,
    /// Bottom-centre X.
    pub x: f64,
    /// Bottom-centre Y.
    pub y: f64,
    /// Bottom elevation.
    pub z: f64,
    #[serde(rename = "XScale", default = "default_scale")]
    pub x_scale: f64,
    #[serde(rename = "YScale", default = "default_scale")]
    pub y_scale: f64,
    #[serde(rename = "ZScale", default = "default_scale")]
    pub z_scale: f64,
    /// Physical width.
    #[serde(rename = "XLength")]
    pub x_length: f64,
    /// Physical depth.
    #[serde(rename = "YLength")]
    pub y_length: f64,
    /// Physical height.
    #[serde(rename = "ZLength")]
    pub z_length: f64,
    /// Rotation around X in degrees.
    #[serde(rename = "XRotation", default)]
    pub x_rotation: f64,
    /// Rotation around Y in degrees.
    #[serde(rename = "YRotation", default)]
    pub y_rotation: f64,
    /// Rotation around Z in degrees.
    #[serde(rename = "ZRotation", default)]
    pub z_rotation: f64,
    /// Group type for grouped elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// Member dumps (world poses) when this dump describes a group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentDump>,
}

fn default_scale() -> f64 {
    1.0
}

impl ContentDump {
    /// Creates a dump for a box-shaped item at the origin.
    pub fn new(
        entity_id: impl Into<String>,
        content_type: impl Into<String>,
        size: [f64; 3],
    ) -> Self {
        Self {
            seek_id: String::new(),
            categories: Vec::new(),
            content_type: ContentType::new(content_type),
            tag: None,
            host_tag: None,
            entity_id: entity_id.into(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
            z_scale: 1.0,
            x_length: size[0],
            y_length: size[1],
            z_length: size[2],
            x_rotation: 0.0,
            y_rotation: 0.0,
            z_rotation: 0.0,
            group_type: None,
            children: Vec::new(),
        }
    }

    /// Sets the bottom-centre position.
    pub fn with_position(mut self, x: f64, y: f64, z: f64) -> Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    /// Sets the rotation around Z in degrees.
    pub fn with_z_rotation(mut self, degrees: f64) -> Self {
        self.z_rotation = degrees;
        self
    }

    /// Sets the item's own tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the host tag.
    pub fn with_host_tag(mut self, host_tag: impl Into<String>) -> Self {
        self.host_tag = Some(host_tag.into());
        self
    }

    /// Sets the catalog categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the group type.
    pub fn with_group_type(mut self, group_type: impl Into<String>) -> Self {
        self.group_type = Some(group_type.into());
        self
    }

    /// Sets the member dumps, turning this dump into a group.
    pub fn with_children(mut self, children: Vec<ContentDump>) -> Self {
        self.children = children;
        self
    }

    /// Returns true when this dump describes a group of items.
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Physical size along X, Y, Z.
    pub fn size(&self) -> [f64; 3] {
        [self.x_length, self.y_length, self.z_length]
    }

    /// The item's frame in world coordinates.
    pub fn frame(&self) -> Frame {
        Frame::from_pose(
            [self.x, self.y, self.z],
            [self.x_rotation, self.y_rotation, self.z_rotation],
        )
    }

    /// Moves the bottom centre to `position`; rotation is unchanged.
    pub fn set_position(&mut self, position: [f64; 3]) {
        self.x = position[0];
        self.y = position[1];
        self.z = position[2];
    }
}

/// Axis-aligned 2D bound of a floor, in plan coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bound {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// One straight segment of a floor's outer boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OuterCurve {
    /// Segment start point.
    pub start: [f64; 2],
    /// Segment end point.
    pub end: [f64; 2],
    /// Symbolic wall tags carried by this segment.
    #[serde(default)]
    pub face_tags: Vec<String>,
}

impl OuterCurve {
    /// Creates an untagged segment.
    pub fn new(start: [f64; 2], end: [f64; 2]) -> Self {
        Self {
            start,
            end,
            face_tags: Vec::new(),
        }
    }

    /// Squared length of the segment.
    pub fn length_squared(&self) -> f64 {
        let dx = self.end[0] - self.start[0];
        let dy = self.end[1] - self.start[1];
        dx * dx + dy * dy
    }
}

/// Outer and hole boundaries of a floor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPath2dDump {
    #[serde(default)]
    pub outer: Vec<OuterCurve>,
    #[serde(default)]
    pub holes: Vec<Vec<OuterCurve>>,
}

/// A room boundary dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorDump {
    /// Room identifier.
    pub tag: String,
    /// Plan bound.
    #[serde(default)]
    pub bound: Bound,
    /// Floor-to-ceiling height.
    #[serde(default = "default_layer_height")]
    pub layer_height: f64,
    /// Room type (e.g. `"Bedroom"`); empty when unknown.
    #[serde(default)]
    pub room_type: String,
    /// Boundary curves.
    #[serde(default)]
    pub world_raw_path2d_dump: RawPath2dDump,
    /// Tags resolving to the floor (bottom) face.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub floor_tags: Vec<String>,
    /// Tags resolving to the ceiling (top) face.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ceiling_tags: Vec<String>,
}

fn default_layer_height() -> f64 {
    2.8
}

impl FloorDump {
    /// Creates a floor from a closed polygon (last vertex connects to the first).
    pub fn from_polygon(
        tag: impl Into<String>,
        room_type: impl Into<String>,
        vertices: &[(f64, f64)],
        layer_height: f64,
    ) -> Self {
        let n = vertices.len();
        let outer = (0..n)
            .map(|i| {
                let a = vertices[i];
                let b = vertices[(i + 1) % n];
                OuterCurve::new([a.0, a.1], [b.0, b.1])
            })
            .collect();
        let mut floor = Self {
            tag: tag.into(),
            bound: Bound::default(),
            layer_height,
            room_type: room_type.into(),
            world_raw_path2d_dump: RawPath2dDump {
                outer,
                holes: Vec::new(),
            },
            floor_tags: Vec::new(),
            ceiling_tags: Vec::new(),
        };
        floor.bound = floor.compute_bound();
        floor
    }

    /// Creates a rectangular floor with its lower-left corner at the origin.
    pub fn rectangle(
        tag: impl Into<String>,
        room_type: impl Into<String>,
        width: f64,
        depth: f64,
        layer_height: f64,
    ) -> Self {
        Self::from_polygon(
            tag,
            room_type,
            &[(0.0, 0.0), (width, 0.0), (width, depth), (0.0, depth)],
            layer_height,
        )
    }

    /// Adds face tags to the outer curve at `index`.
    pub fn with_curve_tags<I, S>(mut self, index: usize, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(curve) = self.world_raw_path2d_dump.outer.get_mut(index) {
            curve.face_tags.extend(tags.into_iter().map(Into::into));
        }
        self
    }

    /// Adds tags resolving to the floor face.
    pub fn with_floor_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.floor_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds tags resolving to the ceiling face.
    pub fn with_ceiling_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ceiling_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Outer polygon vertices (curve start points in order).
    pub fn outer_polygon(&self) -> Vec<(f64, f64)> {
        self.world_raw_path2d_dump
            .outer
            .iter()
            .map(|c| (c.start[0], c.start[1]))
            .collect()
    }

    /// Number of outer curves.
    pub fn num_outer_curves(&self) -> usize {
        self.world_raw_path2d_dump.outer.len()
    }

    /// Bound computed from the outer polygon.
    pub fn compute_bound(&self) -> Bound {
        let pts = self.outer_polygon();
        if pts.is_empty() {
            return Bound::default();
        }
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in pts {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Bound {
            left: min_x,
            top: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Unsigned area of the outer polygon.
    pub fn area(&self) -> f64 {
        let pts = self.outer_polygon();
        if pts.len() < 3 {
            return 0.0;
        }
        let twice: f64 = (0..pts.len())
            .map(|i| {
                let (x0, y0) = pts[i];
                let (x1, y1) = pts[(i + 1) % pts.len()];
                x0 * y1 - x1 * y0
            })
            .sum();
        twice.abs() * 0.5
    }

    /// Outer polygon as WKT, as expected by the search service.
    pub fn outer_wkt(&self) -> String {
        let pts = self.outer_polygon();
        if pts.len() < 3 {
            return "POLYGON EMPTY".to_string();
        }
        let mut coords: Vec<String> = pts.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
        coords.push(format!("{} {}", pts[0].0, pts[0].1));
        format!("POLYGON(({}))", coords.join(", "))
    }
}

/// Metadata describing one region (group) of a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: String,
    pub group_type: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub x_length: f64,
    #[serde(default)]
    pub y_length: f64,
}

/// A complete historical layout: the room it was designed for plus its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutJson {
    pub floor_dump: FloorDump,
    #[serde(default)]
    pub content_dumps: Vec<ContentDump>,
}

impl LayoutJson {
    /// Parses a layout from its JSON string form.
    pub fn parse(json: &str) -> Result<Self> {
        let layout: LayoutJson = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Checks that entity ids are unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for dump in &self.content_dumps {
            if !seen.insert(dump.entity_id.as_str()) {
                return Err(Error::InvalidDump(format!(
                    "duplicate entity id '{}' in layout",
                    dump.entity_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_is_type_of() {
        let ct = ContentType::new("furniture/Bed/double");
        assert!(ct.is_type_of("bed"));
        assert!(ct.is_type_of("double"));
        assert!(!ct.is_type_of("nightstand"));
    }

    #[test]
    fn test_content_dump_json_field_names() {
        let dump = ContentDump::new("e1", "bed", [2.0, 1.8, 0.5])
            .with_tag("bed")
            .with_categories(["cat-bed"]);
        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["entityId"], "e1");
        assert_eq!(json["XLength"], 2.0);
        assert_eq!(json["contentType"], "bed");
        assert!(json.get("hostTag").is_none());

        let back: ContentDump = serde_json::from_value(json).unwrap();
        assert_eq!(back, dump);
    }

    #[test]
    fn test_content_dump_scale_defaults() {
        let json = r#"{"entityId":"n1","x":0,"y":0,"z":0,"XLength":1,"YLength":1,"ZLength":1}"#;
        let dump: ContentDump = serde_json::from_str(json).unwrap();
        assert_eq!(dump.x_scale, 1.0);
        assert!(dump.tag.is_none());
        assert!(!dump.is_group());
    }

    #[test]
    fn test_floor_rectangle_bound_and_wkt() {
        let floor = FloorDump::rectangle("room", "Bedroom", 4.0, 3.0, 2.8);
        assert_eq!(floor.num_outer_curves(), 4);
        assert_eq!(floor.bound.width, 4.0);
        assert_eq!(floor.bound.height, 3.0);
        assert_eq!(floor.outer_wkt(), "POLYGON((0 0, 4 0, 4 3, 0 3, 0 0))");
        assert_eq!(floor.area(), 12.0);
    }

    #[test]
    fn test_floor_tags() {
        let floor = FloorDump::rectangle("room", "Bedroom", 4.0, 3.0, 2.8)
            .with_curve_tags(1, ["bedWallFace"])
            .with_floor_tags(["floorFace"]);
        assert_eq!(floor.world_raw_path2d_dump.outer[1].face_tags, vec!["bedWallFace"]);
        assert_eq!(floor.floor_tags, vec!["floorFace"]);
    }

    #[test]
    fn test_layout_rejects_duplicate_ids() {
        let layout = LayoutJson {
            floor_dump: FloorDump::rectangle("room", "Bedroom", 4.0, 3.0, 2.8),
            content_dumps: vec![
                ContentDump::new("a", "bed", [1.0, 1.0, 1.0]),
                ContentDump::new("a", "rug", [1.0, 1.0, 0.0]),
            ],
        };
        let json = serde_json::to_string(&layout).unwrap();
        assert!(matches!(LayoutJson::parse(&json), Err(Error::InvalidDump(_))));
    }
}
