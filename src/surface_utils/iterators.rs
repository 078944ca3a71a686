//! Pixel iterators for `SharedImageSurface`.
use crate::rect::IRect;
use crate::util::clamp;

use super::shared_surface::SharedImageSurface;
use super::{EdgeMode, Pixel};

/// Iterator over pixels of a `SharedImageSurface`.
pub struct Pixels<'a> {
    surface: &'a SharedImageSurface,
    bounds: IRect,
    x: i32,
    y: i32,
}

/// Iterator over a (potentially out of bounds) rectangle of pixels of a `SharedImageSurface`.
pub struct PixelRectangle<'a> {
    surface: &'a SharedImageSurface,
    bounds: IRect,
    rectangle: IRect,
    edge_mode: EdgeMode,
    x: i32,
    y: i32,
}

/// Restricts `bounds` to the area of the surface.
fn clip_to_surface(surface: &SharedImageSurface, bounds: IRect) -> IRect {
    bounds
        .intersection(&IRect::from_size(surface.width(), surface.height()))
        .unwrap_or_default()
}

impl<'a> Pixels<'a> {
    /// Creates an iterator over the image surface pixels
    #[inline]
    pub fn new(surface: &'a SharedImageSurface) -> Self {
        let bounds = IRect::from_size(surface.width(), surface.height());

        Self::within(surface, bounds)
    }

    /// Creates an iterator over the image surface pixels, constrained within the given bounds.
    ///
    /// Bounds that extend past the surface are clipped to it.
    #[inline]
    pub fn within(surface: &'a SharedImageSurface, bounds: IRect) -> Self {
        let bounds = clip_to_surface(surface, bounds);

        Self {
            surface,
            bounds,
            x: bounds.x0,
            y: bounds.y0,
        }
    }
}

impl<'a> PixelRectangle<'a> {
    /// Creates an iterator over the image surface pixels
    #[inline]
    pub fn new(surface: &'a SharedImageSurface, rectangle: IRect, edge_mode: EdgeMode) -> Self {
        let bounds = IRect::from_size(surface.width(), surface.height());

        Self::within(surface, bounds, rectangle, edge_mode)
    }

    /// Creates an iterator over a rectangle of pixels; the pixels outside `bounds` are
    /// computed with `edge_mode`.
    #[inline]
    pub fn within(
        surface: &'a SharedImageSurface,
        bounds: IRect,
        rectangle: IRect,
        edge_mode: EdgeMode,
    ) -> Self {
        let bounds = clip_to_surface(surface, bounds);

        // Non-None EdgeMode values need at least one pixel available.
        let edge_mode = if bounds.is_empty() {
            EdgeMode::None
        } else {
            edge_mode
        };

        let rectangle = if rectangle.is_empty() {
            IRect::default()
        } else {
            rectangle
        };

        Self {
            surface,
            bounds,
            rectangle,
            edge_mode,
            x: rectangle.x0,
            y: rectangle.y0,
        }
    }

    fn pixel_at(&self, x: i32, y: i32) -> Pixel {
        if self.bounds.contains(x, y) {
            return self.surface.get_pixel(x as u32, y as u32);
        }

        match self.edge_mode {
            EdgeMode::None => Pixel::default(),
            EdgeMode::Duplicate => {
                let x = clamp(x, self.bounds.x0, self.bounds.x1 - 1);
                let y = clamp(y, self.bounds.y0, self.bounds.y1 - 1);
                self.surface.get_pixel(x as u32, y as u32)
            }
            EdgeMode::Wrap => {
                let x = self.bounds.x0 + (x - self.bounds.x0).rem_euclid(self.bounds.width());
                let y = self.bounds.y0 + (y - self.bounds.y0).rem_euclid(self.bounds.height());
                self.surface.get_pixel(x as u32, y as u32)
            }
        }
    }
}

impl<'a> Iterator for Pixels<'a> {
    type Item = (u32, u32, Pixel);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        // This means we hit the end on the last iteration.
        if self.x >= self.bounds.x1 || self.y >= self.bounds.y1 {
            return None;
        }

        let rv = Some((
            self.x as u32,
            self.y as u32,
            self.surface.get_pixel(self.x as u32, self.y as u32),
        ));

        if self.x + 1 == self.bounds.x1 {
            self.x = self.bounds.x0;
            self.y += 1;
        } else {
            self.x += 1;
        }

        rv
    }
}

impl<'a> Iterator for PixelRectangle<'a> {
    type Item = (i32, i32, Pixel);

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.x >= self.rectangle.x1 || self.y >= self.rectangle.y1 {
            return None;
        }

        let rv = Some((self.x, self.y, self.pixel_at(self.x, self.y)));

        if self.x + 1 == self.rectangle.x1 {
            self.x = self.rectangle.x0;
            self.y += 1;
        } else {
            self.x += 1;
        }

        rv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface_utils::shared_surface::ExclusiveImageSurface;

    #[test]
    fn pixels_count() {
        const WIDTH: i32 = 32;
        const HEIGHT: i32 = 64;

        let surface = SharedImageSurface::empty(WIDTH, HEIGHT).unwrap();

        // Full image.
        assert_eq!(Pixels::new(&surface).count(), (WIDTH * HEIGHT) as usize);

        // 1-wide column.
        let bounds = IRect::from_size(1, HEIGHT);
        assert_eq!(Pixels::within(&surface, bounds).count(), HEIGHT as usize);

        // 1-tall row.
        let bounds = IRect::from_size(WIDTH, 1);
        assert_eq!(Pixels::within(&surface, bounds).count(), WIDTH as usize);

        // 1×1.
        let bounds = IRect::from_size(1, 1);
        assert_eq!(Pixels::within(&surface, bounds).count(), 1);

        // Nothing (x0 == x1).
        let bounds = IRect::from_size(0, HEIGHT);
        assert_eq!(Pixels::within(&surface, bounds).count(), 0);

        // Nothing (y0 == y1).
        let bounds = IRect::from_size(WIDTH, 0);
        assert_eq!(Pixels::within(&surface, bounds).count(), 0);

        // Past the edges.
        let bounds = IRect::new(-10, -10, 4, 4);
        assert_eq!(Pixels::within(&surface, bounds).count(), 16);
    }

    #[test]
    fn pixel_rectangle() {
        const WIDTH: i32 = 32;
        const HEIGHT: i32 = 64;

        let surface = SharedImageSurface::empty(WIDTH, HEIGHT).unwrap();

        let rect_bounds = IRect::new(-8, -8, 8, 8);
        assert_eq!(
            PixelRectangle::new(&surface, rect_bounds, EdgeMode::None).count(),
            (16 * 16) as usize
        );
    }

    #[test]
    fn edge_modes() {
        let mut surface = ExclusiveImageSurface::new(2, 1).unwrap();
        let left = Pixel::new(10, 0, 0, 255);
        let right = Pixel::new(20, 0, 0, 255);
        surface.set_pixel(0, 0, left);
        surface.set_pixel(1, 0, right);
        let surface = surface.share();

        let row = |edge_mode| {
            PixelRectangle::new(&surface, IRect::new(-1, 0, 3, 1), edge_mode)
                .map(|(_, _, p)| p)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            row(EdgeMode::None),
            vec![Pixel::default(), left, right, Pixel::default()]
        );
        assert_eq!(row(EdgeMode::Duplicate), vec![left, left, right, right]);
        assert_eq!(row(EdgeMode::Wrap), vec![right, left, right, left]);
    }
}
