//! Types for rectangles.

use core::ops::{Add, Range, Sub};
use float_cmp::approx_eq;
use num_traits::Zero;

/// `PartialOrd` minimum, for floats.
fn min<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

/// `PartialOrd` maximum, for floats.
fn max<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

/// A rectangle given by its two corners; `(x0, y0)` is the top-left one.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericRect<T> {
    pub x0: T,
    pub y0: T,
    pub x1: T,
    pub y1: T,
}

/// A rectangle in user or device space.
pub type Rect = GenericRect<f64>;

/// Pixel-aligned rectangle; `x1` and `y1` are exclusive.
pub type IRect = GenericRect<i32>;

impl<T> GenericRect<T> {
    #[inline]
    pub fn new(x0: T, y0: T, x1: T, y1: T) -> Self {
        GenericRect { x0, y0, x1, y1 }
    }
}

impl<T> GenericRect<T>
where
    T: Copy + PartialOrd + PartialEq + Add<T, Output = T> + Sub<T, Output = T> + Zero,
{
    /// A rectangle at the origin.
    #[inline]
    pub fn from_size(w: T, h: T) -> Self {
        GenericRect::new(T::zero(), T::zero(), w, h)
    }

    #[inline]
    pub fn width(&self) -> T {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> T {
        self.y1 - self.y0
    }

    #[inline]
    pub fn size(&self) -> (T, T) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn x_range(&self) -> Range<T> {
        self.x0..self.x1
    }

    #[inline]
    pub fn y_range(&self) -> Range<T> {
        self.y0..self.y1
    }

    /// Whether the point is inside; the right and bottom edges are exclusive.
    #[inline]
    pub fn contains(self, x: T, y: T) -> bool {
        self.x_range().contains(&x) && self.y_range().contains(&y)
    }

    /// Whether `rect` lies completely inside `self`.
    #[inline]
    pub fn contains_rect(&self, rect: &Self) -> bool {
        self.x0 <= rect.x0 && rect.x1 <= self.x1 && self.y0 <= rect.y0 && rect.y1 <= self.y1
    }

    #[inline]
    pub fn translate(&self, (dx, dy): (T, T)) -> Self {
        GenericRect::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    /// The overlapping part, or `None` if the rectangles do not overlap with a
    /// non-zero area.
    #[inline]
    pub fn intersection(&self, rect: &Self) -> Option<Self> {
        let r = GenericRect::new(
            max(self.x0, rect.x0),
            max(self.y0, rect.y0),
            min(self.x1, rect.x1),
            min(self.y1, rect.y1),
        );

        (r.x1 > r.x0 && r.y1 > r.y0).then_some(r)
    }

    /// The smallest rectangle that contains both.
    #[inline]
    pub fn union(&self, rect: &Self) -> Self {
        GenericRect::new(
            min(self.x0, rect.x0),
            min(self.y0, rect.y0),
            max(self.x1, rect.x1),
            max(self.y1, rect.y1),
        )
    }
}

impl IRect {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Number of pixels in the rectangle, or zero if it is empty.
    #[inline]
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width() as usize * self.height() as usize
        }
    }
}

impl Rect {
    /// Whether the rectangle has (nearly) zero width or height.
    #[inline]
    pub fn is_empty(&self) -> bool {
        approx_eq!(f64, self.width(), 0.0) || approx_eq!(f64, self.height(), 0.0)
    }

    /// Builds a rectangle from an origin and a size, as in SVG's `x, y, width, height`.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect::new(x, y, x + w, y + h)
    }

    /// Corner-by-corner comparison with a tolerance of 1e-4.
    pub fn approx_eq(&self, other: &Self) -> bool {
        let close = |a: f64, b: f64| approx_eq!(f64, a, b, epsilon = 0.0001);

        close(self.x0, other.x0)
            && close(self.y0, other.y0)
            && close(self.x1, other.x1)
            && close(self.y1, other.y1)
    }
}

impl From<Rect> for IRect {
    /// Smallest pixel-aligned rectangle that contains the given one.
    #[inline]
    fn from(r: Rect) -> Self {
        IRect::new(
            r.x0.floor() as i32,
            r.y0.floor() as i32,
            r.x1.ceil() as i32,
            r.y1.ceil() as i32,
        )
    }
}

impl From<IRect> for Rect {
    #[inline]
    fn from(r: IRect) -> Self {
        Rect::new(
            f64::from(r.x0),
            f64::from(r.y0),
            f64::from(r.x1),
            f64::from(r.y1),
        )
    }
}
