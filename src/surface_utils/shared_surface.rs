//! Image surfaces: an exclusively owned one for drawing into, and a cheaply clonable,
//! immutable one for the filter pipeline.
use std::rc::Rc;

use nalgebra::DMatrix;

use crate::error::RenderingError;
use crate::rasterizer::Coverage;
use crate::rect::IRect;
use crate::util::{clamp, mul_div_255};

use super::iterators::{PixelRectangle, Pixels};
use super::{EdgeMode, Pixel, PixelOps};

/// Returns the row stride of an RGBA surface, or `None` if the surface would be too big to
/// be addressed with 32-bit signed arithmetic.
pub fn checked_stride(width: i32, height: i32) -> Option<i32> {
    if width < 0 || height < 0 || width >= i32::MAX / 4 {
        return None;
    }

    let stride = width * 4;

    if height > 0 && stride > i32::MAX / height {
        return None;
    }

    Some(stride)
}

/// Porter-Duff operators and blend modes for combining two surfaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    Over,
    In,
    Out,
    Atop,
    Xor,
    Multiply,
    Screen,
    Darken,
    Lighten,
}

/// Trait to abstract the direction of box blurs.
pub trait BlurDirection {
    const IS_VERTICAL: bool;
}

/// Vertical blur direction.
pub enum Vertical {}
/// Horizontal blur direction.
pub enum Horizontal {}

impl BlurDirection for Vertical {
    const IS_VERTICAL: bool = true;
}

impl BlurDirection for Horizontal {
    const IS_VERTICAL: bool = false;
}

/// An owned surface of premultiplied pixels that can be drawn into.
#[derive(Debug, Clone)]
pub struct ExclusiveImageSurface {
    width: i32,
    height: i32,
    data: Vec<Pixel>,
}

/// Wrapper for an image surface that can be shared between filter results.
///
/// The pixel data is immutable; operations produce new surfaces.
#[derive(Debug, Clone)]
pub struct SharedImageSurface {
    width: i32,
    height: i32,
    data: Rc<[Pixel]>,

    /// Whether this surface contains meaningful data only in the alpha channel.
    alpha_only: bool,
}

impl ExclusiveImageSurface {
    /// Creates a transparent surface.
    pub fn new(width: i32, height: i32) -> Result<ExclusiveImageSurface, RenderingError> {
        if checked_stride(width, height).is_none() {
            return Err(RenderingError::LimitExceeded(format!(
                "cannot allocate a {}x{} surface",
                width, height
            )));
        }

        Ok(ExclusiveImageSurface {
            width,
            height,
            data: vec![Pixel::default(); width as usize * height as usize],
        })
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!((x as i32) < self.width && (y as i32) < self.height);
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = self.index(x, y);
        self.data[i] = pixel;
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.data
    }

    pub fn rect(&self) -> IRect {
        IRect::from_size(self.width, self.height)
    }

    pub fn fill(&mut self, pixel: Pixel) {
        self.data.iter_mut().for_each(|p| *p = pixel);
    }

    /// Composites a source through a coverage mask with the "over" operator.
    ///
    /// `source` returns the premultiplied paint color at a pixel; the effective alpha at
    /// each pixel is `coverage × opacity`.
    pub fn composite<F>(&mut self, coverage: &Coverage, opacity: u8, mut source: F)
    where
        F: FnMut(i32, i32) -> Pixel,
    {
        if opacity == 0 {
            return;
        }

        let rect = match coverage.rect().intersection(&self.rect()) {
            Some(r) => r,
            None => return,
        };

        for y in rect.y_range() {
            for x in rect.x_range() {
                let c = mul_div_255(coverage.get(x, y), opacity);
                if c == 0 {
                    continue;
                }

                let src = source(x, y).scale_alpha(c);
                let i = self.index(x as u32, y as u32);
                self.data[i] = src.over(self.data[i]);
            }
        }
    }

    /// Composites another surface of the same size over this one, optionally through a
    /// coverage mask.
    pub fn composite_surface(
        &mut self,
        src: &SharedImageSurface,
        mask: Option<&Coverage>,
        opacity: u8,
    ) {
        if opacity == 0 {
            return;
        }

        let rect = match IRect::from_size(src.width, src.height).intersection(&self.rect()) {
            Some(r) => r,
            None => return,
        };

        for y in rect.y_range() {
            for x in rect.x_range() {
                let c = match mask {
                    Some(m) => mul_div_255(m.get(x, y), opacity),
                    None => opacity,
                };

                if c == 0 {
                    continue;
                }

                let s = src.get_pixel(x as u32, y as u32).scale_alpha(c);
                let i = self.index(x as u32, y as u32);
                self.data[i] = s.over(self.data[i]);
            }
        }
    }

    /// Converts into a shared surface.
    pub fn share(self) -> SharedImageSurface {
        SharedImageSurface {
            width: self.width,
            height: self.height,
            data: Rc::from(self.data),
            alpha_only: false,
        }
    }
}

impl SharedImageSurface {
    /// Creates an empty (transparent) surface.
    pub fn empty(width: i32, height: i32) -> Result<SharedImageSurface, RenderingError> {
        let mut surface = ExclusiveImageSurface::new(width, height)?.share();
        surface.alpha_only = true;
        Ok(surface)
    }

    /// Creates a surface filled with `color` inside `bounds`.
    pub fn flood(
        width: i32,
        height: i32,
        bounds: IRect,
        color: Pixel,
    ) -> Result<SharedImageSurface, RenderingError> {
        let mut output = ExclusiveImageSurface::new(width, height)?;

        if let Some(bounds) = bounds.intersection(&output.rect()) {
            for y in bounds.y_range() {
                for x in bounds.x_range() {
                    output.set_pixel(x as u32, y as u32, color);
                }
            }
        }

        let mut output = output.share();
        output.alpha_only = color.r == 0 && color.g == 0 && color.b == 0;
        Ok(output)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn is_alpha_only(&self) -> bool {
        self.alpha_only
    }

    pub fn rect(&self) -> IRect {
        IRect::from_size(self.width, self.height)
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.data
    }

    /// Retrieves the pixel value at the given coordinates.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        debug_assert!((x as i32) < self.width && (y as i32) < self.height);
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Retrieves the pixel value, or transparent black if the coordinates are outside the
    /// surface.
    #[inline]
    pub fn get_pixel_or_transparent(&self, x: i32, y: i32) -> Pixel {
        if self.rect().contains(x, y) {
            self.get_pixel(x as u32, y as u32)
        } else {
            Pixel::default()
        }
    }

    /// Builds a new surface of the same size by computing every pixel inside `bounds`.
    ///
    /// Pixels outside `bounds` are transparent.
    pub fn map_pixels<F>(&self, bounds: IRect, mut f: F) -> Result<SharedImageSurface, RenderingError>
    where
        F: FnMut(u32, u32, Pixel) -> Pixel,
    {
        let mut output = ExclusiveImageSurface::new(self.width, self.height)?;

        for (x, y, pixel) in Pixels::within(self, bounds) {
            output.set_pixel(x, y, f(x, y, pixel));
        }

        Ok(output.share())
    }

    /// Returns a copy of the pixels inside `bounds`; the rest is transparent.
    pub fn copy_surface(&self, bounds: IRect) -> Result<ExclusiveImageSurface, RenderingError> {
        let mut output = ExclusiveImageSurface::new(self.width, self.height)?;

        for (x, y, pixel) in Pixels::within(self, bounds) {
            output.set_pixel(x, y, pixel);
        }

        Ok(output)
    }

    /// Returns a surface with black color and alpha from `self`.
    pub fn extract_alpha(&self, bounds: IRect) -> Result<SharedImageSurface, RenderingError> {
        let mut output = self.map_pixels(bounds, |_, _, pixel| Pixel {
            r: 0,
            g: 0,
            b: 0,
            a: pixel.a,
        })?;
        output.alpha_only = true;
        Ok(output)
    }

    /// Returns a surface whose pixels are not premultiplied.
    pub fn unpremultiply(&self, bounds: IRect) -> Result<SharedImageSurface, RenderingError> {
        if self.alpha_only {
            return Ok(self.clone());
        }

        self.map_pixels(bounds, |_, _, pixel| pixel.unpremultiply())
    }

    /// Converts the alpha channel into a coverage mask.
    pub fn to_alpha_mask(&self) -> Coverage {
        Coverage::from_fn(self.rect(), |x, y| self.get_pixel(x as u32, y as u32).a)
    }

    /// Converts the luminance of the pixels into a coverage mask, scaled by `opacity`.
    pub fn to_luminance_mask(&self, opacity: u8) -> Coverage {
        Coverage::from_fn(self.rect(), |x, y| {
            mul_div_255(self.get_pixel(x as u32, y as u32).to_luminance(), opacity)
        })
    }

    /// Translates the image by a whole number of pixels; pixels that come from outside
    /// the surface are transparent.
    pub fn offset(
        &self,
        bounds: IRect,
        dx: f64,
        dy: f64,
    ) -> Result<SharedImageSurface, RenderingError> {
        let dx = dx.round() as i32;
        let dy = dy.round() as i32;

        let mut output = self.map_pixels(bounds, |x, y, _| {
            self.get_pixel_or_transparent(x as i32 - dx, y as i32 - dy)
        })?;
        output.alpha_only = self.alpha_only;
        Ok(output)
    }

    /// Fills `bounds` with copies of the `tile` rectangle of this surface.
    pub fn tile(&self, tile: IRect, bounds: IRect) -> Result<SharedImageSurface, RenderingError> {
        let tile = match tile.intersection(&self.rect()) {
            Some(t) => t,
            None => return SharedImageSurface::empty(self.width, self.height),
        };

        let mut output = self.map_pixels(bounds, |x, y, _| {
            let sx = tile.x0 + (x as i32 - tile.x0).rem_euclid(tile.width());
            let sy = tile.y0 + (y as i32 - tile.y0).rem_euclid(tile.height());
            self.get_pixel(sx as u32, sy as u32)
        })?;
        output.alpha_only = self.alpha_only;
        Ok(output)
    }

    /// Performs a horizontal or vertical box blur.
    ///
    /// The `target` parameter determines the position of the kernel relative to each
    /// pixel: the window covers `[x - target, x - target + box_size)`.  Pixels outside
    /// `bounds` count as transparent.
    pub fn box_blur<B: BlurDirection>(
        &self,
        bounds: IRect,
        box_size: usize,
        target: usize,
    ) -> Result<SharedImageSurface, RenderingError> {
        let mut output = ExclusiveImageSurface::new(self.width, self.height)?;

        let bounds = match bounds.intersection(&self.rect()) {
            Some(b) => b,
            None => return Ok(output.share()),
        };

        if box_size == 0 {
            return Ok(self.copy_surface(bounds)?.share());
        }

        let box_size = box_size as i32;
        let target = target as i32;
        let divisor = box_size as u32;

        // Walks one line of the blur: `(outer, inner)` become `(y, x)` for horizontal
        // blurs and `(x, y)` for vertical ones.
        let (outer_range, inner_start, inner_end) = if B::IS_VERTICAL {
            (bounds.x_range(), bounds.y0, bounds.y1)
        } else {
            (bounds.y_range(), bounds.x0, bounds.x1)
        };

        let coords = |outer: i32, inner: i32| {
            if B::IS_VERTICAL {
                (outer, inner)
            } else {
                (inner, outer)
            }
        };

        for outer in outer_range {
            let fetch = |inner: i32| -> [u32; 4] {
                if inner < inner_start || inner >= inner_end {
                    [0; 4]
                } else {
                    let (x, y) = coords(outer, inner);
                    let p = self.get_pixel(x as u32, y as u32);
                    [p.r.into(), p.g.into(), p.b.into(), p.a.into()]
                }
            };

            let mut sum = [0u32; 4];
            for inner in inner_start - target..inner_start - target + box_size {
                let p = fetch(inner);
                for c in 0..4 {
                    sum[c] += p[c];
                }
            }

            for inner in inner_start..inner_end {
                let (x, y) = coords(outer, inner);
                let pixel = Pixel {
                    r: ((sum[0] + divisor / 2) / divisor) as u8,
                    g: ((sum[1] + divisor / 2) / divisor) as u8,
                    b: ((sum[2] + divisor / 2) / divisor) as u8,
                    a: ((sum[3] + divisor / 2) / divisor) as u8,
                };
                output.set_pixel(x as u32, y as u32, pixel);

                let leaving = fetch(inner - target);
                let entering = fetch(inner - target + box_size);
                for c in 0..4 {
                    sum[c] = sum[c] + entering[c] - leaving[c];
                }
            }
        }

        let mut output = output.share();
        output.alpha_only = self.alpha_only;
        Ok(output)
    }

    /// Performs a convolution.
    ///
    /// Note that `kernel` is rotated 180 degrees.
    ///
    /// The `target` parameter determines the position of the kernel relative to each pixel
    /// of the image. The value of `(0, 0)` indicates that the top left pixel of the (180-degrees
    /// rotated) kernel corresponds to the current pixel, and the rest of the kernel is to the
    /// right and bottom of the pixel. The value of `(cols / 2, rows / 2)` centers a kernel with
    /// an odd number of rows and columns.
    pub fn convolve(
        &self,
        bounds: IRect,
        target: (i32, i32),
        kernel: &DMatrix<f64>,
        edge_mode: EdgeMode,
    ) -> Result<SharedImageSurface, RenderingError> {
        let mut output = self.map_pixels(bounds, |x, y, _| {
            let kernel_bounds = IRect::new(
                x as i32 - target.0,
                y as i32 - target.1,
                x as i32 - target.0 + kernel.ncols() as i32,
                y as i32 - target.1 + kernel.nrows() as i32,
            );

            let mut r = 0.0;
            let mut g = 0.0;
            let mut b = 0.0;
            let mut a = 0.0;

            for (x, y, pixel) in PixelRectangle::within(self, bounds, kernel_bounds, edge_mode) {
                let kernel_x = (kernel_bounds.x1 - x - 1) as usize;
                let kernel_y = (kernel_bounds.y1 - y - 1) as usize;
                let factor = kernel[(kernel_y, kernel_x)];

                r += f64::from(pixel.r) / 255.0 * factor;
                g += f64::from(pixel.g) / 255.0 * factor;
                b += f64::from(pixel.b) / 255.0 * factor;
                a += f64::from(pixel.a) / 255.0 * factor;
            }

            let convert = |x: f64| (clamp(x, 0.0, 1.0) * 255.0 + 0.5) as u8;
            let a = convert(a);

            if self.alpha_only {
                Pixel { r: 0, g: 0, b: 0, a }
            } else {
                Pixel {
                    r: convert(r).min(a),
                    g: convert(g).min(a),
                    b: convert(b).min(a),
                    a,
                }
            }
        })?;

        output.alpha_only = self.alpha_only;
        Ok(output)
    }

    /// Combines `self` (the source, or top layer) with `other` (the destination, or
    /// bottom layer) inside `bounds`.
    pub fn compose(
        &self,
        other: &SharedImageSurface,
        bounds: IRect,
        operator: Operator,
    ) -> Result<SharedImageSurface, RenderingError> {
        let mut output = self.map_pixels(bounds, |x, y, src| {
            let dst = other.get_pixel_or_transparent(x as i32, y as i32);
            compose_pixels(src, dst, operator)
        })?;

        output.alpha_only = self.alpha_only && other.alpha_only;
        Ok(output)
    }

    /// Computes `k1 * i1 * i2 + k2 * i1 + k3 * i2 + k4` for every channel, with `self` as
    /// `i1` and `other` as `i2`.
    pub fn compose_arithmetic(
        &self,
        other: &SharedImageSurface,
        bounds: IRect,
        k1: f64,
        k2: f64,
        k3: f64,
        k4: f64,
    ) -> Result<SharedImageSurface, RenderingError> {
        self.map_pixels(bounds, |x, y, i1| {
            let i2 = other.get_pixel_or_transparent(x as i32, y as i32);

            let compute = |i1: u8, i2: u8| {
                let i1 = f64::from(i1) / 255.0;
                let i2 = f64::from(i2) / 255.0;
                let result = k1 * i1 * i2 + k2 * i1 + k3 * i2 + k4;
                (clamp(result, 0.0, 1.0) * 255.0 + 0.5) as u8
            };

            let a = compute(i1.a, i2.a);

            if a == 0 {
                Pixel::default()
            } else {
                Pixel {
                    r: compute(i1.r, i2.r).min(a),
                    g: compute(i1.g, i2.g).min(a),
                    b: compute(i1.b, i2.b).min(a),
                    a,
                }
            }
        })
    }
}

/// Combines a premultiplied source pixel with a premultiplied destination pixel.
fn compose_pixels(src: Pixel, dst: Pixel, operator: Operator) -> Pixel {
    let to_f = |c: u8| f64::from(c) / 255.0;
    let qa = to_f(src.a);
    let qb = to_f(dst.a);

    let channel = |ca: u8, cb: u8| -> f64 {
        let ca = to_f(ca);
        let cb = to_f(cb);

        match operator {
            Operator::Over => ca + cb * (1.0 - qa),
            Operator::In => ca * qb,
            Operator::Out => ca * (1.0 - qb),
            Operator::Atop => ca * qb + cb * (1.0 - qa),
            Operator::Xor => ca * (1.0 - qb) + cb * (1.0 - qa),
            Operator::Multiply => (1.0 - qa) * cb + (1.0 - qb) * ca + ca * cb,
            Operator::Screen => cb + ca - ca * cb,
            Operator::Darken => ((1.0 - qa) * cb + ca).min((1.0 - qb) * ca + cb),
            Operator::Lighten => ((1.0 - qa) * cb + ca).max((1.0 - qb) * ca + cb),
        }
    };

    let alpha = match operator {
        Operator::Over => qa + qb * (1.0 - qa),
        Operator::In => qa * qb,
        Operator::Out => qa * (1.0 - qb),
        Operator::Atop => qb,
        Operator::Xor => qa * (1.0 - qb) + qb * (1.0 - qa),
        Operator::Multiply | Operator::Screen | Operator::Darken | Operator::Lighten => {
            1.0 - (1.0 - qa) * (1.0 - qb)
        }
    };

    let to_u8 = |v: f64| (clamp(v, 0.0, 1.0) * 255.0 + 0.5) as u8;
    let a = to_u8(alpha);

    Pixel {
        r: to_u8(channel(src.r, dst.r)).min(a),
        g: to_u8(channel(src.g, dst.g)).min(a),
        b: to_u8(channel(src.b, dst.b)).min(a),
        a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solid(width: i32, height: i32, color: Pixel) -> SharedImageSurface {
        SharedImageSurface::flood(width, height, IRect::from_size(width, height), color).unwrap()
    }

    #[test]
    fn stride_guard() {
        assert_eq!(checked_stride(100, 100), Some(400));
        assert_eq!(checked_stride(i32::MAX / 4, 1), None);
        assert_eq!(checked_stride(40000, 40000), None);
        assert_eq!(checked_stride(-1, 10), None);
        assert!(ExclusiveImageSurface::new(i32::MAX / 2, 2).is_err());
    }

    #[test]
    fn opaque_source_replaces_destination() {
        let mut surface = ExclusiveImageSurface::new(4, 4).unwrap();
        surface.fill(Pixel::new(10, 20, 30, 40));

        let red = Pixel::new(255, 0, 0, 255);
        surface.composite(&Coverage::full(IRect::from_size(4, 4)), 255, |_, _| red);

        assert!(surface.pixels().iter().all(|p| *p == red));
    }

    #[test]
    fn zero_opacity_leaves_destination() {
        let mut surface = ExclusiveImageSurface::new(4, 4).unwrap();
        let dest = Pixel::new(10, 20, 30, 40);
        surface.fill(dest);

        surface.composite(&Coverage::full(IRect::from_size(4, 4)), 0, |_, _| {
            Pixel::new(255, 0, 0, 255)
        });
        surface.composite_surface(&solid(4, 4, Pixel::new(0, 255, 0, 255)), None, 0);

        assert!(surface.pixels().iter().all(|p| *p == dest));
    }

    #[test]
    fn half_opacity_over_transparent() {
        let mut surface = ExclusiveImageSurface::new(1, 1).unwrap();
        surface.composite(&Coverage::full(IRect::from_size(1, 1)), 128, |_, _| {
            Pixel::new(255, 0, 0, 255)
        });

        assert_eq!(surface.get_pixel(0, 0), Pixel::new(128, 0, 0, 128));
    }

    #[test]
    fn extract_alpha_keeps_only_alpha() {
        let surface = solid(2, 2, Pixel::new(100, 50, 25, 200));
        let alpha = surface.extract_alpha(surface.rect()).unwrap();

        assert!(alpha.is_alpha_only());
        assert_eq!(alpha.get_pixel(1, 1), Pixel::new(0, 0, 0, 200));
    }

    #[test]
    fn offset_moves_pixels() {
        let mut surface = ExclusiveImageSurface::new(3, 1).unwrap();
        surface.set_pixel(0, 0, Pixel::new(255, 0, 0, 255));
        let surface = surface.share();

        let moved = surface.offset(surface.rect(), 2.0, 0.0).unwrap();
        assert_eq!(moved.get_pixel(0, 0), Pixel::default());
        assert_eq!(moved.get_pixel(2, 0), Pixel::new(255, 0, 0, 255));
    }

    #[test]
    fn box_blur_spreads_evenly() {
        let mut surface = ExclusiveImageSurface::new(5, 1).unwrap();
        surface.set_pixel(2, 0, Pixel::new(0, 0, 0, 255));
        let surface = surface.share();

        let blurred = surface
            .box_blur::<Horizontal>(surface.rect(), 3, 1)
            .unwrap();

        let alphas: Vec<u8> = blurred.pixels().iter().map(|p| p.a).collect();
        assert_eq!(alphas, vec![0, 85, 85, 85, 0]);
    }

    #[test]
    fn identity_convolution() {
        let surface = solid(3, 3, Pixel::new(10, 20, 30, 40));
        let kernel = nalgebra::DMatrix::from_row_slice(1, 1, &[1.0]);

        let out = surface
            .convolve(surface.rect(), (0, 0), &kernel, EdgeMode::None)
            .unwrap();
        assert_eq!(out.pixels(), surface.pixels());
    }

    #[test]
    fn porter_duff_operators() {
        let src = solid(1, 1, Pixel::new(255, 0, 0, 255));
        let dst = solid(1, 1, Pixel::new(0, 0, 255, 255));
        let empty = SharedImageSurface::empty(1, 1).unwrap();
        let r = src.rect();

        let px = |s: SharedImageSurface| s.get_pixel(0, 0);

        assert_eq!(px(src.compose(&dst, r, Operator::Over).unwrap()), Pixel::new(255, 0, 0, 255));
        assert_eq!(px(src.compose(&dst, r, Operator::In).unwrap()), Pixel::new(255, 0, 0, 255));
        assert_eq!(px(src.compose(&empty, r, Operator::In).unwrap()), Pixel::default());
        assert_eq!(px(src.compose(&dst, r, Operator::Out).unwrap()), Pixel::default());
        assert_eq!(px(src.compose(&empty, r, Operator::Out).unwrap()), Pixel::new(255, 0, 0, 255));
        assert_eq!(px(src.compose(&dst, r, Operator::Xor).unwrap()), Pixel::default());
        assert_eq!(px(empty.compose(&dst, r, Operator::Atop).unwrap()), Pixel::new(0, 0, 255, 255));
        assert_eq!(px(src.compose(&dst, r, Operator::Multiply).unwrap()), Pixel::new(0, 0, 0, 255));
        assert_eq!(px(src.compose(&dst, r, Operator::Screen).unwrap()), Pixel::new(255, 0, 255, 255));
    }

    #[test]
    fn arithmetic_composite() {
        let a = solid(1, 1, Pixel::new(100, 100, 100, 200));
        let b = solid(1, 1, Pixel::new(50, 50, 50, 100));

        // k2 = 1 is a plain copy of the first input
        let out = a.compose_arithmetic(&b, a.rect(), 0.0, 1.0, 0.0, 0.0).unwrap();
        assert_eq!(out.get_pixel(0, 0), Pixel::new(100, 100, 100, 200));

        let out = a.compose_arithmetic(&b, a.rect(), 0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(out.get_pixel(0, 0), Pixel::default());
    }

    #[test]
    fn tile_repeats() {
        let mut surface = ExclusiveImageSurface::new(4, 1).unwrap();
        let red = Pixel::new(255, 0, 0, 255);
        let blue = Pixel::new(0, 0, 255, 255);
        surface.set_pixel(1, 0, red);
        surface.set_pixel(2, 0, blue);
        let surface = surface.share();

        let tiled = surface.tile(IRect::new(1, 0, 3, 1), surface.rect()).unwrap();
        assert_eq!(tiled.pixels(), &[blue, red, blue, red][..]);
    }

    #[test]
    fn luminance_mask_scales_by_opacity() {
        let white = solid(2, 2, Pixel::new(255, 255, 255, 255));
        let mask = white.to_luminance_mask(128);
        assert_eq!(mask.get(1, 1), 128);
        assert_eq!(mask.get(5, 5), 0);
    }

    proptest! {
        #[test]
        fn composited_pixels_stay_premultiplied(
            r in any::<u8>(), g in any::<u8>(), b in any::<u8>(), a in any::<u8>(),
            cov in any::<u8>(), opacity in any::<u8>(),
        ) {
            let mut surface = ExclusiveImageSurface::new(1, 1).unwrap();
            surface.fill(Pixel::new(r, g, b, a).premultiply());
            let cov = Coverage::from_fn(IRect::from_size(1, 1), |_, _| cov);
            surface.composite(&cov, opacity, |_, _| Pixel::new(b, r, g, a).premultiply());

            let p = surface.get_pixel(0, 0);
            prop_assert!(p.r <= p.a && p.g <= p.a && p.b <= p.a);
        }
    }
}
