//! Bounding boxes that know their coordinate space.
//!
//! A `BoundingBox` starts out empty ("virgin") and grows as the extents of drawn
//! shapes are inserted into it.  Each box remembers the transform of the space it is
//! expressed in, so that a child's box, computed in the child's user space, can be
//! re-expressed in a group's user space when it is inserted.

use crate::coord_units::CoordUnits;
use crate::rect::Rect;
use crate::transform::Transform;

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    transform: Transform,
    pub rect: Option<Rect>,     // without stroke
    pub ink_rect: Option<Rect>, // with stroke
}

impl BoundingBox {
    pub fn new() -> BoundingBox {
        Default::default()
    }

    pub fn with_transform(self, transform: Transform) -> BoundingBox {
        BoundingBox { transform, ..self }
    }

    pub fn with_rect(self, rect: Rect) -> BoundingBox {
        BoundingBox {
            rect: Some(rect),
            ..self
        }
    }

    pub fn with_ink_rect(self, ink_rect: Rect) -> BoundingBox {
        BoundingBox {
            ink_rect: Some(ink_rect),
            ..self
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Whether nothing has been inserted yet.
    pub fn is_virgin(&self) -> bool {
        self.rect.is_none() && self.ink_rect.is_none()
    }

    /// Unions `src`, re-expressed in this box's coordinate space, into this box.
    ///
    /// The resulting box always contains the box before the insertion.
    pub fn insert(&mut self, src: &BoundingBox) {
        if src.is_virgin() {
            return;
        }

        let transform = match self.transform.invert() {
            Some(inverse) => inverse.pre_transform(&src.transform),
            None => return,
        };

        self.rect = combine_rects(self.rect, src.rect, &transform);
        self.ink_rect = combine_rects(self.ink_rect, src.ink_rect, &transform);
    }

    /// Whether the box has no area, which makes `objectBoundingBox` units unusable.
    pub fn rect_is_empty(&self) -> bool {
        self.rect.map_or(true, |r| r.is_empty())
    }

    /// Transform from the coordinate system given by `units` to this box's space.
    ///
    /// For `objectBoundingBox` this maps the unit square onto the box; it returns `None`
    /// when the box is empty.
    pub fn rect_to_transform(&self, units: CoordUnits) -> Option<Transform> {
        match units {
            CoordUnits::UserSpaceOnUse => Some(Transform::identity()),
            CoordUnits::ObjectBoundingBox => {
                let r = self.rect.filter(|r| !r.is_empty())?;
                let t = Transform::new_unchecked(r.width(), 0.0, 0.0, r.height(), r.x0, r.y0);
                Some(t).filter(|t| t.is_invertible())
            }
        }
    }
}

/// Computes the extents of a list of points.
pub fn points_extents<I>(points: I) -> Option<Rect>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    points.into_iter().fold(None, |acc: Option<Rect>, (x, y)| {
        let r = Rect::new(x, y, x, y);
        Some(acc.map_or(r, |acc| acc.union(&r)))
    })
}

fn combine_rects(r1: Option<Rect>, r2: Option<Rect>, transform: &Transform) -> Option<Rect> {
    match (r1, r2) {
        (r1, None) => r1,
        (None, Some(r2)) => Some(transform.transform_rect(&r2)),
        (Some(r1), Some(r2)) => Some(transform.transform_rect(&r2).union(&r1)),
    }
}
