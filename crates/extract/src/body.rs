//! Body/face operator: oriented box faces in a shared frame, signed face
//! distances and face-pair matching.

use crate::container::SpatialContainer;
use geo::{ConvexHull, Coord, Intersects, MultiPoint, Point, Rect};
use nalgebra::{Point3, Vector3};
use u_layout_core::{face_id, AxisGroup, ExtractConfig, FaceType, Frame};

/// One face of a container, expressed in a reference frame.
#[derive(Debug, Clone)]
pub struct Face {
    pub face_type: FaceType,
    pub face_id: String,
    pub center: Point3<f64>,
    /// Outward unit normal.
    pub normal: Vector3<f64>,
    /// Boundary loop; consecutive corners share an edge.
    pub corners: [Point3<f64>; 4],
    pub area: f64,
}

/// Synthetic root used to express two containers in one coordinate system.
pub struct SharedFrame;

impl SharedFrame {
    /// A frame at the midpoint of both containers' origins, without rotation.
    pub fn between(a: &SpatialContainer, b: &SpatialContainer) -> Frame {
        let mid = (a.frame().position() + b.frame().position()) * 0.5;
        Frame::at(mid)
    }
}

/// Computes the six faces of `container` in `reference` coordinates.
pub fn compute_faces(container: &SpatialContainer, reference: &Frame) -> [Face; 6] {
    let relative = container.frame().relative_to(reference);
    let ext = container.extents();
    let size = ext.size();
    FaceType::ALL.map(|face_type| {
        let local = local_face_corners(ext.min, ext.max, face_type);
        let corners = local.map(|c| relative.to_parent(&c));
        let center = Point3::from(
            corners.iter().fold(Vector3::zeros(), |acc, c| acc + c.coords) * 0.25,
        );
        let area = match face_type.axis_group() {
            AxisGroup::LeftRight => size[1] * size[2],
            AxisGroup::FrontBack => size[0] * size[2],
            AxisGroup::TopBottom => size[0] * size[1],
        };
        Face {
            face_type,
            face_id: face_id(container.id(), face_type),
            center,
            normal: relative.vector_to_parent(&face_type.local_normal()),
            corners,
            area,
        }
    })
}

fn local_face_corners(min: [f64; 3], max: [f64; 3], face: FaceType) -> [Point3<f64>; 4] {
    let (a, b) = (min, max);
    match face {
        FaceType::Right => [
            Point3::new(b[0], a[1], a[2]),
            Point3::new(b[0], b[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(b[0], a[1], b[2]),
        ],
        FaceType::Left => [
            Point3::new(a[0], a[1], a[2]),
            Point3::new(a[0], b[1], a[2]),
            Point3::new(a[0], b[1], b[2]),
            Point3::new(a[0], a[1], b[2]),
        ],
        FaceType::Back => [
            Point3::new(a[0], b[1], a[2]),
            Point3::new(b[0], b[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(a[0], b[1], b[2]),
        ],
        FaceType::Front => [
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], a[1], a[2]),
            Point3::new(b[0], a[1], b[2]),
            Point3::new(a[0], a[1], b[2]),
        ],
        FaceType::Top => [
            Point3::new(a[0], a[1], b[2]),
            Point3::new(b[0], a[1], b[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(a[0], b[1], b[2]),
        ],
        FaceType::Bottom => [
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], a[1], a[2]),
            Point3::new(b[0], b[1], a[2]),
            Point3::new(a[0], b[1], a[2]),
        ],
    }
}

/// Offset from `face` to `target` along `face`'s outward normal.
pub fn face_distance(face: &Face, target: &Face) -> f64 {
    face.normal.dot(&(target.center - face.center))
}

/// Returns true when `target`'s loop, projected onto `source`'s plane,
/// intersects or touches `source`.
pub fn faces_overlap(source: &Face, target: &Face, tolerance: f64) -> bool {
    let origin = source.corners[0];
    let u = source.corners[1] - origin;
    let v = source.corners[3] - origin;
    let (u_len, v_len) = (u.norm(), v.norm());
    if u_len <= tolerance || v_len <= tolerance {
        return false;
    }
    let (u, v) = (u / u_len, v / v_len);

    let projected: Vec<Point<f64>> = target
        .corners
        .iter()
        .map(|c| {
            let d = c - origin;
            Point::new(d.dot(&u), d.dot(&v))
        })
        .collect();
    let hull = MultiPoint::from(projected).convex_hull();
    let rect = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: u_len, y: v_len }).to_polygon();
    hull.intersects(&rect)
}

/// Best face pair on one axis group.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub self_face: FaceType,
    pub target_face: FaceType,
    pub distance: f64,
    pub overlapping: bool,
}

/// Outcome of matching one source container against one target.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// All three axis groups matched, in [`AxisGroup::ALL`] order.
    Complete([FaceMatch; 3]),
    /// Some axis groups matched; the set is discarded.
    Partial(Vec<AxisGroup>),
    /// Nothing matched.
    Unmatchable,
}

/// Picks the best candidate: overlapping before non-overlapping, then the
/// smallest absolute distance. Earlier candidates win ties.
pub fn select_best(candidates: Vec<FaceMatch>) -> Option<FaceMatch> {
    candidates.into_iter().reduce(|best, next| {
        let rank = |m: &FaceMatch| (!m.overlapping, m.distance.abs());
        let (a, b) = (rank(&best), rank(&next));
        if b.0 < a.0 || (b.0 == a.0 && b.1 < a.1) {
            next
        } else {
            best
        }
    })
}

/// Matches `source` against `target` on every axis group.
pub fn match_containers(
    source: &SpatialContainer,
    target: &SpatialContainer,
    config: &ExtractConfig,
) -> MatchOutcome {
    let tol = config.tolerance;
    if source.is_degenerate(tol) || target.is_degenerate(tol) {
        return MatchOutcome::Unmatchable;
    }

    let reference = SharedFrame::between(source, target);
    let source_faces = compute_faces(source, &reference);
    let target_faces = compute_faces(target, &reference);

    let mut matched = Vec::with_capacity(3);
    for group in AxisGroup::ALL {
        let mut candidates = Vec::new();
        for sf in source_faces.iter().filter(|f| f.face_type.axis_group() == group) {
            if sf.area <= tol {
                continue;
            }
            for tf in target_faces.iter().filter(|f| f.face_type.axis_group() == group) {
                if tf.area <= tol {
                    continue;
                }
                let distance = face_distance(sf, tf);
                if let Some(max) = config.max_match_distance {
                    if distance.abs() > max {
                        continue;
                    }
                }
                let overlapping = faces_overlap(sf, tf, tol);
                if config.require_overlap && !overlapping {
                    continue;
                }
                candidates.push(FaceMatch {
                    self_face: sf.face_type,
                    target_face: tf.face_type,
                    distance,
                    overlapping,
                });
            }
        }
        if let Some(best) = select_best(candidates) {
            matched.push((group, best));
        }
    }

    if matched.is_empty() {
        return MatchOutcome::Unmatchable;
    }
    let groups: Vec<AxisGroup> = matched.iter().map(|(g, _)| *g).collect();
    let matches: Vec<FaceMatch> = matched.into_iter().map(|(_, m)| m).collect();
    match <[FaceMatch; 3]>::try_from(matches) {
        Ok(all) => MatchOutcome::Complete(all),
        Err(_) => MatchOutcome::Partial(groups),
    }
}
