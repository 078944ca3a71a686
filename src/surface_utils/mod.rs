//! Pixel types and in-memory image surfaces.
//!
//! All surfaces hold RGBA pixels with 8 bits per channel and premultiplied alpha; the
//! only place where non-premultiplied pixels appear is the final [`crate::api::Pixbuf`]
//! and the input/output of some filter primitives, which convert explicitly.

pub mod iterators;
pub mod shared_surface;

use rgb::ComponentMap;

/// A pixel consisting of R, G, B and A values.
pub type Pixel = rgb::RGBA8;

/// Modes which specify how the values of out of bounds pixels are computed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EdgeMode {
    /// The nearest inbounds pixel value is returned.
    Duplicate,
    /// The image is extended by taking the color values from the opposite of the image.
    ///
    /// Imagine the image being tiled infinitely, with the original image at the origin.
    Wrap,
    /// Zero RGBA values are returned.
    None,
}

pub trait PixelOps {
    fn premultiply(self) -> Self;
    fn unpremultiply(self) -> Self;
    fn diff(&self, other: &Self) -> Self;
    fn to_luminance(&self) -> u8;
    fn scale_alpha(self, alpha: u8) -> Self;
    fn over(self, dest: Self) -> Self;
}

impl PixelOps for Pixel {
    /// Returns an unpremultiplied value of this pixel.
    ///
    /// For a fully transparent pixel, a transparent black pixel will be returned.
    #[inline]
    fn unpremultiply(self) -> Self {
        if self.a == 0 {
            Self {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            }
        } else {
            let a = u32::from(self.a);
            self.map_rgb(|x| ((u32::from(x) * 255 + a / 2) / a).min(255) as u8)
        }
    }

    /// Returns a premultiplied value of this pixel.
    #[inline]
    fn premultiply(self) -> Self {
        let a = self.a as u32;
        self.map_rgb(|x| (((x as u32) * a + 127) / 255) as u8)
    }

    #[inline]
    fn diff(&self, other: &Pixel) -> Pixel {
        self.iter()
            .zip(other.iter())
            .map(|(l, r)| (l as i32 - r as i32).unsigned_abs() as u8)
            .collect()
    }

    /// Luminance of the premultiplied color, with the Rec. 709 weights
    /// `0.2126 R + 0.7152 G + 0.0722 B`.
    #[inline]
    fn to_luminance(&self) -> u8 {
        let r = u32::from(self.r);
        let g = u32::from(self.g);
        let b = u32::from(self.b);

        ((r * 2126 + g * 7152 + b * 722 + 5000) / 10000) as u8
    }

    /// Multiplies every channel by `alpha / 255`.
    #[inline]
    fn scale_alpha(self, alpha: u8) -> Self {
        use crate::util::mul_div_255;

        match alpha {
            255 => self,
            0 => Pixel::default(),
            _ => self.map(|c| mul_div_255(c, alpha)),
        }
    }

    /// Porter-Duff "over" of premultiplied pixels.
    #[inline]
    fn over(self, dest: Self) -> Self {
        use crate::util::mul_div_255;

        match self.a {
            255 => self,
            0 => dest,
            a => {
                let inv = 255 - a;
                Pixel {
                    r: self.r.saturating_add(mul_div_255(dest.r, inv)),
                    g: self.g.saturating_add(mul_div_255(dest.g, inv)),
                    b: self.b.saturating_add(mul_div_255(dest.b, inv)),
                    a: self.a.saturating_add(mul_div_255(dest.a, inv)),
                }
            }
        }
    }
}
