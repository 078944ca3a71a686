//! Stroke outlines.
//!
//! A stroke is turned into a set of closed polygons whose union, filled with the nonzero
//! rule, is the stroked area: one quadrilateral per segment, plus polygons for the joins
//! and caps.  Every polygon is emitted with positive orientation so that overlapping
//! pieces never cancel out.

use std::f64::consts::PI;

use crate::vpath::{Subpath, Vpath};

/// Stroke widths are never narrower than this, in device pixels.
pub const MIN_STROKE_WIDTH: f64 = 0.25;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

/// Stroke parameters, already in device units.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeParams {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    /// Dash lengths and the offset into the pattern.
    pub dashes: Option<(Vec<f64>, f64)>,
}

type Point = (f64, f64);

/// Computes the fillable outline of a stroke along `vpath`.
pub fn stroke_outline(vpath: &Vpath, params: &StrokeParams, flatness: f64) -> Vpath {
    let hw = params.width.max(MIN_STROKE_WIDTH) / 2.0;

    let mut out = Outline {
        polygons: Vec::new(),
        hw,
        flatness,
    };

    for subpath in &vpath.subpaths {
        match params.dashes {
            Some((ref dashes, offset)) => {
                for dash in dash_subpath(subpath, dashes, offset) {
                    out.stroke_subpath(&dash, params);
                }
            }

            None => out.stroke_subpath(subpath, params),
        }
    }

    Vpath {
        subpaths: out
            .polygons
            .into_iter()
            .map(|points| Subpath {
                points,
                closed: true,
            })
            .collect(),
    }
}

struct Outline {
    polygons: Vec<Vec<Point>>,
    hw: f64,
    flatness: f64,
}

impl Outline {
    fn push(&mut self, mut polygon: Vec<Point>) {
        if signed_area(&polygon) < 0.0 {
            polygon.reverse();
        }
        self.polygons.push(polygon);
    }

    fn stroke_subpath(&mut self, subpath: &Subpath, params: &StrokeParams) {
        let points = &subpath.points;
        let hw = self.hw;

        let has_length = points.windows(2).any(|w| w[0] != w[1]);
        if !has_length {
            if let Some(&p) = points.first() {
                self.zero_length_cap(p, params.cap);
            }
            return;
        }

        let mut segments: Vec<(Point, Point)> = points
            .windows(2)
            .map(|w| (w[0], w[1]))
            .filter(|(a, b)| a != b)
            .collect();

        if subpath.closed {
            if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
                if first != last {
                    segments.push((last, first));
                }
            }
        }

        for &(a, b) in &segments {
            let n = scale(normal(a, b), hw);
            self.push(vec![add(a, n), add(b, n), sub(b, n), sub(a, n)]);
        }

        for pair in segments.windows(2) {
            self.join(pair[0], pair[1], params);
        }

        if subpath.closed {
            if let (Some(&last), Some(&first)) = (segments.last(), segments.first()) {
                if segments.len() > 1 {
                    self.join(last, first, params);
                }
            }
        } else if let (Some(&(a, b)), Some(&(c, d))) = (segments.first(), segments.last()) {
            self.cap(a, direction(b, a), params.cap);
            self.cap(d, direction(c, d), params.cap);
        }
    }

    fn join(&mut self, s1: (Point, Point), s2: (Point, Point), params: &StrokeParams) {
        let hw = self.hw;
        let p = s1.1;
        let d1 = direction(s1.0, s1.1);
        let d2 = direction(s2.0, s2.1);

        let cross = d1.0 * d2.1 - d1.1 * d2.0;
        let dot = d1.0 * d2.0 + d1.1 * d2.1;

        // Straight continuation needs no join.
        if cross.abs() < 1e-12 && dot > 0.0 {
            return;
        }

        match params.join {
            LineJoin::Round => self.push(circle(p, hw, self.flatness)),

            LineJoin::Miter | LineJoin::Bevel => {
                // The outside of the turn is on the right for a left turn.
                let side = if cross > 0.0 { -1.0 } else { 1.0 };
                let n1 = scale((-d1.1, d1.0), side * hw);
                let n2 = scale((-d2.1, d2.0), side * hw);
                let a = add(p, n1);
                let b = add(p, n2);

                let miter_ratio = if 1.0 + dot > 1e-12 {
                    (2.0 / (1.0 + dot)).sqrt()
                } else {
                    f64::INFINITY
                };

                if params.join == LineJoin::Miter && miter_ratio <= params.miter_limit {
                    let m = add(p, scale(add(n1, n2), 1.0 / (1.0 + dot)));
                    self.push(vec![p, a, m, b]);
                } else {
                    self.push(vec![p, a, b]);
                }
            }
        }
    }

    /// Cap at `p`, where the stroke leaves in direction `outward`.
    fn cap(&mut self, p: Point, outward: Point, cap: LineCap) {
        let hw = self.hw;

        match cap {
            LineCap::Butt => (),
            LineCap::Round => self.push(circle(p, hw, self.flatness)),
            LineCap::Square => {
                let n = scale((-outward.1, outward.0), hw);
                let e = scale(outward, hw);
                self.push(vec![add(p, n), add(add(p, n), e), add(sub(p, n), e), sub(p, n)]);
            }
        }
    }

    fn zero_length_cap(&mut self, p: Point, cap: LineCap) {
        let hw = self.hw;

        match cap {
            LineCap::Butt => (),
            LineCap::Round => self.push(circle(p, hw, self.flatness)),
            LineCap::Square => self.push(vec![
                (p.0 - hw, p.1 - hw),
                (p.0 + hw, p.1 - hw),
                (p.0 + hw, p.1 + hw),
                (p.0 - hw, p.1 + hw),
            ]),
        }
    }
}

/// Splits a subpath into the "on" pieces of a dash pattern.
///
/// Closed subpaths are walked from their first point around to it again.
pub fn dash_subpath(subpath: &Subpath, dashes: &[f64], offset: f64) -> Vec<Subpath> {
    let total: f64 = dashes.iter().sum();
    if dashes.is_empty() || total <= 0.0 {
        return vec![subpath.clone()];
    }

    let mut points = subpath.points.clone();
    if subpath.closed {
        if let Some(&first) = subpath.points.first() {
            points.push(first);
        }
    }

    // Find where the offset lands in the pattern.
    let mut index = 0;
    let mut remaining = dashes[0];
    let mut skip = offset.max(0.0) % total;
    while skip > 0.0 {
        if skip >= remaining {
            skip -= remaining;
            index = (index + 1) % dashes.len();
            remaining = dashes[index];
        } else {
            remaining -= skip;
            skip = 0.0;
        }
    }

    let is_on = |index: usize| index % 2 == 0;

    let mut pieces = Vec::new();
    let mut current: Option<Vec<Point>> = points.first().filter(|_| is_on(index)).map(|&p| vec![p]);

    for w in points.windows(2) {
        let (mut a, b) = (w[0], w[1]);
        let mut seg_len = (b.0 - a.0).hypot(b.1 - a.1);

        while seg_len > 0.0 {
            if remaining > seg_len {
                remaining -= seg_len;
                if let Some(c) = current.as_mut() {
                    c.push(b);
                }
                break;
            }

            let t = remaining / seg_len;
            let split = (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
            seg_len -= remaining;
            a = split;

            if let Some(mut c) = current.take() {
                c.push(split);
                pieces.push(Subpath {
                    points: c,
                    closed: false,
                });
            }

            index = (index + 1) % dashes.len();
            remaining = dashes[index];

            if is_on(index) {
                current = Some(vec![split]);
            }
        }
    }

    if let Some(c) = current {
        if c.len() > 1 {
            pieces.push(Subpath {
                points: c,
                closed: false,
            });
        }
    }

    pieces
}

/// Polygon approximating a circle to within `flatness`.
fn circle(center: Point, r: f64, flatness: f64) -> Vec<Point> {
    let n = if r > flatness {
        (PI / (1.0 - flatness / r).acos()).ceil().max(8.0)
    } else {
        8.0
    } as usize;

    (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n as f64;
            (center.0 + r * theta.cos(), center.1 + r * theta.sin())
        })
        .collect()
}

fn signed_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = polygon[i];
            let (x1, y1) = polygon[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum::<f64>()
        / 2.0
}

fn direction(a: Point, b: Point) -> Point {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = dx.hypot(dy);
    if len == 0.0 {
        (1.0, 0.0)
    } else {
        (dx / len, dy / len)
    }
}

fn normal(a: Point, b: Point) -> Point {
    let d = direction(a, b);
    (-d.1, d.0)
}

fn add(a: Point, b: Point) -> Point {
    (a.0 + b.0, a.1 + b.1)
}

fn sub(a: Point, b: Point) -> Point {
    (a.0 - b.0, a.1 - b.1)
}

fn scale(a: Point, s: f64) -> Point {
    (a.0 * s, a.1 * s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn params(width: f64, cap: LineCap, join: LineJoin) -> StrokeParams {
        StrokeParams {
            width,
            cap,
            join,
            miter_limit: 4.0,
            dashes: None,
        }
    }

    fn open(points: Vec<Point>) -> Vpath {
        Vpath {
            subpaths: vec![Subpath {
                points,
                closed: false,
            }],
        }
    }

    #[test]
    fn butt_line_is_a_single_quad() {
        let outline = stroke_outline(
            &open(vec![(0.0, 10.0), (10.0, 10.0)]),
            &params(2.0, LineCap::Butt, LineJoin::Miter),
            0.25,
        );

        assert_eq!(outline.subpaths.len(), 1);
        let extents = outline.extents().unwrap();
        assert_eq!((extents.x0, extents.y0, extents.x1, extents.y1), (0.0, 9.0, 10.0, 11.0));
    }

    #[test]
    fn square_caps_extend_the_line() {
        let outline = stroke_outline(
            &open(vec![(0.0, 10.0), (10.0, 10.0)]),
            &params(2.0, LineCap::Square, LineJoin::Miter),
            0.25,
        );

        let extents = outline.extents().unwrap();
        assert_eq!((extents.x0, extents.x1), (-1.0, 11.0));
    }

    #[test]
    fn all_polygons_have_positive_orientation() {
        let outline = stroke_outline(
            &open(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            &params(3.0, LineCap::Round, LineJoin::Round),
            0.25,
        );

        assert!(outline
            .subpaths
            .iter()
            .all(|s| signed_area(&s.points) > 0.0));
    }

    #[test]
    fn right_angle_miter_reaches_the_corner() {
        let outline = stroke_outline(
            &open(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
            &params(2.0, LineCap::Butt, LineJoin::Miter),
            0.25,
        );

        let extents = outline.extents().unwrap();
        assert_eq!((extents.x1, extents.y0), (11.0, -1.0));

        let join = &outline.subpaths.last().unwrap().points;
        assert_eq!(join.len(), 4);
        assert!(join.contains(&(11.0, -1.0)));
    }

    #[test]
    fn sharp_miter_falls_back_to_bevel() {
        let mut p = params(2.0, LineCap::Butt, LineJoin::Miter);
        p.miter_limit = 1.2;

        let outline = stroke_outline(&open(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]), &p, 0.25);

        let join = &outline.subpaths.last().unwrap().points;
        assert_eq!(join.len(), 3);
        assert!(!join.contains(&(11.0, -1.0)));
    }

    #[test]
    fn zero_length_subpaths() {
        let dot = open(vec![(5.0, 5.0)]);

        let butt = stroke_outline(&dot, &params(2.0, LineCap::Butt, LineJoin::Miter), 0.25);
        assert!(butt.subpaths.is_empty());

        let round = stroke_outline(&dot, &params(2.0, LineCap::Round, LineJoin::Miter), 0.25);
        assert_eq!(round.subpaths.len(), 1);
        assert!(round.subpaths[0].points.len() >= 8);

        let square = stroke_outline(&dot, &params(2.0, LineCap::Square, LineJoin::Miter), 0.25);
        let e = square.extents().unwrap();
        assert_eq!((e.x0, e.y0, e.x1, e.y1), (4.0, 4.0, 6.0, 6.0));
    }

    #[test]
    fn width_is_clamped_to_minimum() {
        let outline = stroke_outline(
            &open(vec![(0.0, 0.0), (10.0, 0.0)]),
            &params(0.01, LineCap::Butt, LineJoin::Miter),
            0.25,
        );

        let e = outline.extents().unwrap();
        assert!(approx_eq!(f64, e.height(), MIN_STROKE_WIDTH));
    }

    fn assert_spans(pieces: &[Subpath], expected: &[(f64, f64)]) {
        assert_eq!(pieces.len(), expected.len());

        for (piece, &(start, end)) in pieces.iter().zip(expected) {
            assert!(approx_eq!(f64, piece.points[0].0, start, epsilon = 1e-9));
            assert!(approx_eq!(f64, piece.points.last().unwrap().0, end, epsilon = 1e-9));
        }
    }

    #[test]
    fn dashes_split_the_line() {
        let line = Subpath {
            points: vec![(0.0, 0.0), (10.0, 0.0)],
            closed: false,
        };

        assert_spans(&dash_subpath(&line, &[2.0, 3.0], 0.0), &[(0.0, 2.0), (5.0, 7.0)]);
        assert_spans(&dash_subpath(&line, &[2.0, 3.0], 3.0), &[(2.0, 4.0), (7.0, 9.0)]);
        assert_spans(&dash_subpath(&line, &[2.0, 3.0], 5.0), &[(0.0, 2.0), (5.0, 7.0)]);
    }

    #[test]
    fn closed_subpaths_dash_through_the_closing_segment() {
        let square = Subpath {
            points: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)],
            closed: true,
        };

        let pieces = dash_subpath(&square, &[14.0, 1.0], 0.0);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].points, vec![(0.0, 1.0), (0.0, 0.0)]);
    }

    #[test]
    fn dashes_follow_corners() {
        let line = Subpath {
            points: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0)],
            closed: false,
        };

        let pieces = dash_subpath(&line, &[6.0, 1.0], 0.0);
        assert_eq!(pieces[0].points, vec![(0.0, 0.0), (4.0, 0.0), (4.0, 2.0)]);
        assert_eq!(pieces[1].points, vec![(4.0, 3.0), (4.0, 4.0)]);
    }
}
