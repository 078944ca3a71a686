//! Flattened paths.
//!
//! A [`Vpath`] is a polyline approximation of a [`Path`] in device space.  Cubic Béziers
//! are subdivided adaptively until they are within a flatness tolerance of their chord,
//! and arcs are first turned into cubics.

use crate::bbox::points_extents;
use crate::path_builder::{CubicBezierCurve, Path, PathCommand};
use crate::rect::Rect;
use crate::transform::Transform;

/// Maximum deviation, in device pixels, of a flattened curve from the real curve.
pub const FLATNESS: f64 = 0.25;

// Subdivision stops here even if the tolerance is not met, for degenerate input.
const MAX_SUBDIVISION_DEPTH: u32 = 16;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subpath {
    pub points: Vec<(f64, f64)>,

    /// Whether the subpath ends with an explicit closepath.  The first point is not
    /// repeated at the end.
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vpath {
    pub subpaths: Vec<Subpath>,
}

impl Subpath {
    fn new(start: (f64, f64)) -> Subpath {
        Subpath {
            points: vec![start],
            closed: false,
        }
    }

    fn push(&mut self, p: (f64, f64)) {
        if self.points.last() != Some(&p) {
            self.points.push(p);
        }
    }

    /// Drops a final point that coincides with the start, for closed subpaths.
    fn finish(&mut self) {
        if self.closed && self.points.len() > 1 && self.points.first() == self.points.last() {
            self.points.pop();
        }
    }

    /// Length of the polyline; closed subpaths include the closing segment.
    pub fn length(&self) -> f64 {
        let open: f64 = self
            .points
            .windows(2)
            .map(|w| distance(w[0], w[1]))
            .sum();

        match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(&first), Some(&last)) => open + distance(last, first),
            _ => open,
        }
    }
}

impl Vpath {
    /// Flattens `path` after transforming it to device space with `transform`.
    pub fn from_path(path: &Path, transform: &Transform, tolerance: f64) -> Vpath {
        let mut subpaths = Vec::new();
        let mut current: Option<Subpath> = None;
        let mut subpath_start = (0.0, 0.0);

        let finish = |current: &mut Option<Subpath>, subpaths: &mut Vec<Subpath>| {
            if let Some(mut s) = current.take() {
                s.finish();
                subpaths.push(s);
            }
        };

        for cmd in path.without_arcs().iter() {
            match *cmd {
                PathCommand::MoveTo(x, y) => {
                    finish(&mut current, &mut subpaths);
                    subpath_start = transform.transform_point(x, y);
                    current = Some(Subpath::new(subpath_start));
                }

                PathCommand::LineTo(x, y) => {
                    let p = transform.transform_point(x, y);
                    current
                        .get_or_insert_with(|| Subpath::new(subpath_start))
                        .push(p);
                }

                PathCommand::CurveTo(ref curve) => {
                    let s = current.get_or_insert_with(|| Subpath::new(subpath_start));
                    let p0 = s.points.last().copied().unwrap_or(subpath_start);
                    let c = transform_curve(curve, transform);
                    flatten_cubic(p0, c.pt1, c.pt2, c.to, tolerance, 0, &mut |p| s.push(p));
                }

                PathCommand::ClosePath => {
                    if let Some(s) = current.as_mut() {
                        s.closed = true;
                    }
                    finish(&mut current, &mut subpaths);
                }

                // without_arcs() left none of these.
                PathCommand::Arc(_) => (),
            }
        }

        finish(&mut current, &mut subpaths);

        Vpath { subpaths }
    }

    /// Returns a copy where every subpath is closed; this is what gets filled.
    pub fn close_subpaths(&self) -> Vpath {
        Vpath {
            subpaths: self
                .subpaths
                .iter()
                .map(|s| {
                    let mut s = Subpath {
                        points: s.points.clone(),
                        closed: true,
                    };
                    s.finish();
                    s
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }

    /// Extents of all the points, in the space of the points.
    pub fn extents(&self) -> Option<Rect> {
        points_extents(self.subpaths.iter().flat_map(|s| s.points.iter().copied()))
    }
}

fn transform_curve(c: &CubicBezierCurve, t: &Transform) -> CubicBezierCurve {
    CubicBezierCurve {
        pt1: t.transform_point(c.pt1.0, c.pt1.1),
        pt2: t.transform_point(c.pt2.0, c.pt2.1),
        to: t.transform_point(c.to.0, c.to.1),
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.0 - a.0).hypot(b.1 - a.1)
}

/// Distance from `p` to the line through `a` and `b`, or to `a` if they coincide.
/// Distance from `p` to the segment `a`-`b`, not to the infinite line through them.
fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;

    if len2 == 0.0 {
        return distance(p, a);
    }

    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0);
    distance(p, (a.0 + t * dx, a.1 + t * dy))
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5)
}

/// Emits the points of a flattened cubic, excluding `p0`.
///
/// The curve is split in half with de Casteljau's algorithm until both control points
/// are within `tolerance` of the chord segment.
pub fn flatten_cubic<F>(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    tolerance: f64,
    depth: u32,
    emit: &mut F,
) where
    F: FnMut((f64, f64)),
{
    let flat =
        distance_to_segment(p1, p0, p3) <= tolerance && distance_to_segment(p2, p0, p3) <= tolerance;

    if flat || depth >= MAX_SUBDIVISION_DEPTH {
        emit(p3);
        return;
    }

    let p01 = midpoint(p0, p1);
    let p12 = midpoint(p1, p2);
    let p23 = midpoint(p2, p3);
    let p012 = midpoint(p01, p12);
    let p123 = midpoint(p12, p23);
    let mid = midpoint(p012, p123);

    flatten_cubic(p0, p01, p012, mid, tolerance, depth + 1, emit);
    flatten_cubic(mid, p123, p23, p3, tolerance, depth + 1, emit);
}
