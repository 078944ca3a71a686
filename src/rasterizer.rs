//! Scan conversion of flattened paths into coverage masks.
//!
//! Each pixel row is sampled at 16 sub-scanlines.  On every sub-scanline the crossings
//! of the polygon edges are sorted, the fill rule decides which spans are inside, and
//! the spans are accumulated with exact horizontal coverage.

use crate::rect::{IRect, Rect};
use crate::util::mul_div_255;
use crate::vpath::Vpath;

const SUBSCANLINES: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// An 8-bit coverage mask over a rectangle of a surface.
///
/// Pixels outside the rectangle have zero coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    rect: IRect,
    data: Vec<u8>,
}

impl Coverage {
    pub fn empty() -> Coverage {
        Coverage {
            rect: IRect::default(),
            data: Vec::new(),
        }
    }

    /// Full coverage over `rect`.
    pub fn full(rect: IRect) -> Coverage {
        let rect = if rect.is_empty() { IRect::default() } else { rect };
        Coverage {
            rect,
            data: vec![255; rect.area()],
        }
    }

    /// Builds a coverage mask from per-pixel values over `rect`.
    pub fn from_fn<F>(rect: IRect, mut f: F) -> Coverage
    where
        F: FnMut(i32, i32) -> u8,
    {
        if rect.is_empty() {
            return Coverage::empty();
        }

        let mut data = Vec::with_capacity(rect.area());
        for y in rect.y_range() {
            for x in rect.x_range() {
                data.push(f(x, y));
            }
        }

        Coverage { rect, data }
    }

    pub fn rect(&self) -> IRect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.rect.is_empty() || self.data.iter().all(|&c| c == 0)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if self.rect.contains(x, y) {
            let i = (y - self.rect.y0) as usize * self.rect.width() as usize
                + (x - self.rect.x0) as usize;
            self.data[i]
        } else {
            0
        }
    }

    /// Multiplies two masks together.
    pub fn intersect(&self, other: &Coverage) -> Coverage {
        match self.rect.intersection(&other.rect) {
            Some(rect) => Coverage::from_fn(rect, |x, y| mul_div_255(self.get(x, y), other.get(x, y))),
            None => Coverage::empty(),
        }
    }

    /// Extents of the non-zero area, in surface pixels.
    pub fn extents(&self) -> Option<Rect> {
        if self.is_empty() {
            None
        } else {
            Some(Rect::from(self.rect))
        }
    }
}

struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    winding: i32,
}

impl Edge {
    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }
}

/// Scan-converts `vpath`, whose subpaths are all treated as closed polygons, into a
/// coverage mask clipped to a `width` × `height` surface.
pub fn rasterize(vpath: &Vpath, fill_rule: FillRule, width: i32, height: i32) -> Coverage {
    let extents = match vpath.extents() {
        Some(e) => e,
        None => return Coverage::empty(),
    };

    if !extents.x0.is_finite()
        || !extents.y0.is_finite()
        || !extents.x1.is_finite()
        || !extents.y1.is_finite()
    {
        return Coverage::empty();
    }

    let rect = match IRect::from(extents).intersection(&IRect::from_size(width, height)) {
        Some(r) if !r.is_empty() => r,
        _ => return Coverage::empty(),
    };

    let mut edges = collect_edges(vpath);
    if edges.is_empty() {
        return Coverage::empty();
    }
    edges.sort_by(|a, b| a.y0.total_cmp(&b.y0));

    let row_width = rect.width() as usize;
    let mut data = vec![0u8; rect.area()];

    // Fractional coverage per pixel, plus a difference array for runs of full pixels.
    let mut acc = vec![0f32; row_width + 1];
    let mut run = vec![0f32; row_width + 1];

    let mut crossings: Vec<(f64, i32)> = Vec::new();
    let mut active: Vec<usize> = Vec::new();
    let mut next_edge = 0;

    let sub_weight = 1.0 / SUBSCANLINES as f32;
    let x_origin = f64::from(rect.x0);

    for (row, y) in rect.y_range().enumerate() {
        acc.iter_mut().for_each(|a| *a = 0.0);
        run.iter_mut().for_each(|a| *a = 0.0);

        for s in 0..SUBSCANLINES {
            let sy = f64::from(y) + (s as f64 + 0.5) / SUBSCANLINES as f64;

            while next_edge < edges.len() && edges[next_edge].y0 <= sy {
                active.push(next_edge);
                next_edge += 1;
            }
            active.retain(|&i| edges[i].y1 > sy);

            crossings.clear();
            crossings.extend(
                active
                    .iter()
                    .map(|&i| &edges[i])
                    .filter(|e| e.y0 <= sy)
                    .map(|e| (e.x_at(sy) - x_origin, e.winding)),
            );
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;

                let inside = match fill_rule {
                    FillRule::NonZero => winding != 0,
                    FillRule::EvenOdd => winding % 2 != 0,
                };

                if inside {
                    add_span(&mut acc, &mut run, pair[0].0, pair[1].0, row_width, sub_weight);
                }
            }
        }

        let out = &mut data[row * row_width..(row + 1) * row_width];
        let mut full = 0.0f32;
        for (x, pixel) in out.iter_mut().enumerate() {
            full += run[x];
            let coverage = (acc[x] + full).clamp(0.0, 1.0);
            *pixel = (coverage * 255.0 + 0.5) as u8;
        }
    }

    Coverage { rect, data }
}

fn collect_edges(vpath: &Vpath) -> Vec<Edge> {
    let mut edges = Vec::new();

    for subpath in &vpath.subpaths {
        let points = &subpath.points;
        let n = points.len();
        if n < 2 {
            continue;
        }

        for i in 0..n {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];

            if y0 == y1 {
                continue;
            }

            edges.push(if y0 < y1 {
                Edge { x0, y0, x1, y1, winding: 1 }
            } else {
                Edge { x0: x1, y0: y1, x1: x0, y1: y0, winding: -1 }
            });
        }
    }

    edges
}

/// Accumulates the span `[a, b)`, in row-relative pixel units, with weight `w`.
fn add_span(acc: &mut [f32], run: &mut [f32], a: f64, b: f64, width: usize, w: f32) {
    let a = a.max(0.0);
    let b = b.min(width as f64);
    if a >= b {
        return;
    }

    let ia = a.floor() as usize;
    let ib = b.floor() as usize;

    if ia == ib {
        acc[ia] += (b - a) as f32 * w;
        return;
    }

    acc[ia] += (ia as f64 + 1.0 - a) as f32 * w;

    if ia + 1 < ib {
        run[ia + 1] += w;
        run[ib] -= w;
    }

    if ib < width {
        acc[ib] += (b - ib as f64) as f32 * w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vpath::Subpath;

    fn polygon(points: &[(f64, f64)]) -> Vpath {
        Vpath {
            subpaths: vec![Subpath {
                points: points.to_vec(),
                closed: true,
            }],
        }
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    }

    #[test]
    fn pixel_aligned_square() {
        let cov = rasterize(&polygon(&square(2.0, 3.0, 6.0, 7.0)), FillRule::NonZero, 10, 10);

        for y in 0..10 {
            for x in 0..10 {
                let inside = (2..6).contains(&x) && (3..7).contains(&y);
                assert_eq!(cov.get(x, y), if inside { 255 } else { 0 }, "({x}, {y})");
            }
        }
    }

    #[test]
    fn half_covered_pixels() {
        let cov = rasterize(&polygon(&square(1.5, 0.0, 3.5, 4.0)), FillRule::NonZero, 5, 5);

        assert_eq!(cov.get(1, 1), 128);
        assert_eq!(cov.get(2, 1), 255);
        assert_eq!(cov.get(3, 1), 128);
        assert_eq!(cov.get(4, 1), 0);
    }

    #[test]
    fn clipped_to_surface() {
        let cov = rasterize(&polygon(&square(-10.0, -10.0, 20.0, 20.0)), FillRule::NonZero, 4, 3);

        assert_eq!(cov.rect(), IRect::new(0, 0, 4, 3));
        assert!((0..3).all(|y| (0..4).all(|x| cov.get(x, y) == 255)));
        assert_eq!(cov.get(4, 0), 0);
    }

    #[test]
    fn fill_rules() {
        // Two nested squares with the same orientation.
        let vpath = Vpath {
            subpaths: vec![
                Subpath { points: square(0.0, 0.0, 10.0, 10.0), closed: true },
                Subpath { points: square(3.0, 3.0, 7.0, 7.0), closed: true },
            ],
        };

        let nonzero = rasterize(&vpath, FillRule::NonZero, 10, 10);
        let evenodd = rasterize(&vpath, FillRule::EvenOdd, 10, 10);

        assert_eq!(nonzero.get(5, 5), 255);
        assert_eq!(evenodd.get(5, 5), 0);
        assert_eq!(evenodd.get(1, 1), 255);
    }

    #[test]
    fn opposite_orientations_cancel_with_nonzero() {
        let mut inner = square(3.0, 3.0, 7.0, 7.0);
        inner.reverse();

        let vpath = Vpath {
            subpaths: vec![
                Subpath { points: square(0.0, 0.0, 10.0, 10.0), closed: true },
                Subpath { points: inner, closed: true },
            ],
        };

        assert_eq!(rasterize(&vpath, FillRule::NonZero, 10, 10).get(5, 5), 0);
    }

    #[test]
    fn degenerate_input() {
        assert!(rasterize(&Vpath::default(), FillRule::NonZero, 10, 10).is_empty());
        assert!(rasterize(&polygon(&[(1.0, 1.0), (5.0, 1.0)]), FillRule::NonZero, 10, 10).is_empty());
        assert!(rasterize(&polygon(&square(20.0, 20.0, 30.0, 30.0)), FillRule::NonZero, 10, 10).is_empty());
    }

    #[test]
    fn intersecting_masks() {
        let a = Coverage::full(IRect::new(0, 0, 4, 4));
        let b = rasterize(&polygon(&square(2.0, 0.0, 6.0, 4.0)), FillRule::NonZero, 10, 10);

        let c = a.intersect(&b);
        assert_eq!(c.get(1, 1), 0);
        assert_eq!(c.get(3, 1), 255);
        assert_eq!(c.get(5, 1), 0);
    }
}
