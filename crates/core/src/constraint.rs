//! Constraint data model: faces, axis groups and directed constraints.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six faces of an oriented box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceType {
    Top,
    Bottom,
    Front,
    Back,
    Left,
    Right,
}

impl FaceType {
    /// All faces, grouped by axis.
    pub const ALL: [FaceType; 6] = [
        FaceType::Front,
        FaceType::Back,
        FaceType::Left,
        FaceType::Right,
        FaceType::Top,
        FaceType::Bottom,
    ];

    /// The axis group this face belongs to.
    pub fn axis_group(self) -> AxisGroup {
        match self {
            FaceType::Top | FaceType::Bottom => AxisGroup::TopBottom,
            FaceType::Front | FaceType::Back => AxisGroup::FrontBack,
            FaceType::Left | FaceType::Right => AxisGroup::LeftRight,
        }
    }

    /// Outward normal in the container's local frame.
    pub fn local_normal(self) -> Vector3<f64> {
        match self {
            FaceType::Right => Vector3::x(),
            FaceType::Left => -Vector3::x(),
            FaceType::Back => Vector3::y(),
            FaceType::Front => -Vector3::y(),
            FaceType::Top => Vector3::z(),
            FaceType::Bottom => -Vector3::z(),
        }
    }

    /// The opposite face on the same axis.
    pub fn opposite(self) -> FaceType {
        match self {
            FaceType::Top => FaceType::Bottom,
            FaceType::Bottom => FaceType::Top,
            FaceType::Front => FaceType::Back,
            FaceType::Back => FaceType::Front,
            FaceType::Left => FaceType::Right,
            FaceType::Right => FaceType::Left,
        }
    }

    /// Lowercase name used in face ids.
    pub fn as_str(self) -> &'static str {
        match self {
            FaceType::Top => "top",
            FaceType::Bottom => "bottom",
            FaceType::Front => "front",
            FaceType::Back => "back",
            FaceType::Left => "left",
            FaceType::Right => "right",
        }
    }
}

impl fmt::Display for FaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pair of opposing faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisGroup {
    FrontBack,
    LeftRight,
    TopBottom,
}

impl AxisGroup {
    /// Groups in matching order.
    pub const ALL: [AxisGroup; 3] = [
        AxisGroup::FrontBack,
        AxisGroup::LeftRight,
        AxisGroup::TopBottom,
    ];

    /// The two faces of this group.
    pub fn faces(self) -> [FaceType; 2] {
        match self {
            AxisGroup::FrontBack => [FaceType::Front, FaceType::Back],
            AxisGroup::LeftRight => [FaceType::Left, FaceType::Right],
            AxisGroup::TopBottom => [FaceType::Top, FaceType::Bottom],
        }
    }

    /// Short name used in constraint ids.
    pub fn as_str(self) -> &'static str {
        match self {
            AxisGroup::FrontBack => "fb",
            AxisGroup::LeftRight => "lr",
            AxisGroup::TopBottom => "tb",
        }
    }
}

/// Builds a face id of the form `"{container_id}/{face}"`.
pub fn face_id(container_id: &str, face: FaceType) -> String {
    format!("{}/{}", container_id, face)
}

/// What a constraint asks the solver to preserve.
///
/// Unknown tags survive a dump/load round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConstraintKind {
    /// Keep the measured signed offset.
    DistanceAsIs,
    /// Any other kind tag.
    Other(String),
}

impl ConstraintKind {
    pub fn as_str(&self) -> &str {
        match self {
            ConstraintKind::DistanceAsIs => "DistanceAsIs",
            ConstraintKind::Other(tag) => tag,
        }
    }
}

impl From<String> for ConstraintKind {
    fn from(tag: String) -> Self {
        if tag == "DistanceAsIs" {
            ConstraintKind::DistanceAsIs
        } else {
            ConstraintKind::Other(tag)
        }
    }
}

impl From<ConstraintKind> for String {
    fn from(kind: ConstraintKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed geometric relationship: `source_id` depends on `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub id: String,
    pub source_id: String,
    /// Id of the target item or region.
    pub target_id: String,
    pub kind: ConstraintKind,
    pub self_face: FaceType,
    pub target_face: FaceType,
    /// Concrete id of the target face, `"{target_id}/{face}"` for items.
    pub target_face_id: String,
    /// Offset from the source face to the target face along the source
    /// face's outward normal.
    pub signed_distance: f64,
}

impl Constraint {
    /// Creates a `DistanceAsIs` constraint with a deterministic id.
    pub fn distance_as_is(
        source_id: &str,
        target_id: &str,
        target_face_owner: &str,
        self_face: FaceType,
        target_face: FaceType,
        signed_distance: f64,
    ) -> Self {
        Self {
            id: format!("c:{}:{}", source_id, self_face.axis_group().as_str()),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind: ConstraintKind::DistanceAsIs,
            self_face,
            target_face,
            target_face_id: face_id(target_face_owner, target_face),
            signed_distance,
        }
    }

    /// The axis group shared by both faces.
    pub fn axis_group(&self) -> AxisGroup {
        self.self_face.axis_group()
    }

    /// Returns true when both faces belong to the same axis group.
    pub fn is_axis_consistent(&self) -> bool {
        self.self_face.axis_group() == self.target_face.axis_group()
    }
}
