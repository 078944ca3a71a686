use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};
use nalgebra::{Matrix3, Matrix4x5, Matrix5, Vector5};

use crate::element::{set_attribute, ElementTrait};
use crate::enum_default;
use crate::error::*;
use crate::parse_identifiers;
use crate::parsers::{NumberList, NumberListLength, Parse, ParseValue};
use crate::rect::IRect;
use crate::rsvg_log;
use crate::surface_utils::{Pixel, PixelOps};
use crate::util::clamp;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// The `type` attribute of `feColorMatrix`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Kind {
    Matrix,
    Saturate,
    HueRotate,
    LuminanceToAlpha,
}

enum_default!(Kind, Kind::Matrix);

#[rustfmt::skip]
const LUMINANCE_TO_ALPHA: [f64; 25] = [
    0.0,    0.0,    0.0,    0.0, 0.0,
    0.0,    0.0,    0.0,    0.0, 0.0,
    0.0,    0.0,    0.0,    0.0, 0.0,
    0.2125, 0.7154, 0.0721, 0.0, 0.0,
    0.0,    0.0,    0.0,    0.0, 1.0,
];

/// The `feColorMatrix` filter primitive.
#[derive(Default)]
pub struct FeColorMatrix {
    base: Primitive,
    params: ColorMatrix,
}

/// Resolved `feColorMatrix` primitive for rendering.
///
/// The matrix works on non-premultiplied `[r g b a 1]` column vectors.
#[derive(Clone)]
pub struct ColorMatrix {
    pub in1: Input,
    pub matrix: Matrix5<f64>,
}

impl Default for ColorMatrix {
    fn default() -> ColorMatrix {
        // Matrix5::default() is all zeroes
        ColorMatrix {
            in1: Input::Unspecified,
            matrix: Matrix5::identity(),
        }
    }
}

impl ElementTrait for FeColorMatrix {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);

        let mut kind = Kind::default();
        let mut values = None;

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "type") => set_attribute(&mut kind, attr.parse(value)),
                expanded_name!("", "values") => values = Some((attr.clone(), value)),
                _ => (),
            }
        }

        let matrix = match (kind, values) {
            // luminanceToAlpha ignores `values`
            (Kind::LuminanceToAlpha, _) => Some(Matrix5::from_row_slice(&LUMINANCE_TO_ALPHA)),

            (_, None) => None,

            (Kind::Matrix, Some((attr, value))) => {
                match NumberList::parse_str(value, NumberListLength::Exact(20))
                    .attribute(attr.clone())
                {
                    Ok(NumberList(v)) => {
                        let mut m: Matrix5<f64> = Matrix4x5::from_row_slice(&v).fixed_resize(0.0);
                        m[(4, 4)] = 1.0;
                        Some(m)
                    }
                    Err(e) => {
                        rsvg_log!("ignoring attribute with invalid value: {}", e);
                        None
                    }
                }
            }

            (Kind::Saturate, Some((attr, value))) => {
                let mut s = 1.0;
                set_attribute(&mut s, attr.parse(value));
                Some(ColorMatrix::saturate_matrix(s))
            }

            (Kind::HueRotate, Some((attr, value))) => {
                let mut degrees = 0.0;
                set_attribute(&mut degrees, attr.parse(value));
                Some(ColorMatrix::hue_rotate_matrix(degrees.to_radians()))
            }
        };

        if let Some(m) = matrix {
            self.params.matrix = m;
        }
    }
}

impl ColorMatrix {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input).compute_irect(ctx);

        let surface = input
            .surface()
            .map_pixels(bounds, |_, _, pixel| self.apply(pixel))?;

        Ok(FilterOutput { surface, bounds })
    }

    /// Applies the matrix to a premultiplied pixel and returns a premultiplied pixel.
    fn apply(&self, pixel: Pixel) -> Pixel {
        let straight = pixel.unpremultiply();
        let channel = |c: u8| f64::from(c) / 255.0;

        let v = Vector5::new(
            channel(straight.r),
            channel(straight.g),
            channel(straight.b),
            channel(pixel.a),
            1.0,
        );
        let out = self.matrix * v;

        let to_u8 = |x: f64| (clamp(x, 0.0, 1.0) * 255.0 + 0.5) as u8;

        Pixel::new(to_u8(out[0]), to_u8(out[1]), to_u8(out[2]), to_u8(out[3])).premultiply()
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }

    #[rustfmt::skip]
    fn saturate_matrix(s: f64) -> Matrix5<f64> {
        let (r, g, b) = (0.213, 0.715, 0.072);

        Matrix5::new(
            r + (1.0 - r) * s, g - g * s,         b - b * s,         0.0, 0.0,
            r - r * s,         g + (1.0 - g) * s, b - b * s,         0.0, 0.0,
            r - r * s,         g - g * s,         b + (1.0 - b) * s, 0.0, 0.0,
            0.0,               0.0,               0.0,               1.0, 0.0,
            0.0,               0.0,               0.0,               0.0, 1.0,
        )
    }

    /// Rotation of the hue around the luminance axis.
    #[rustfmt::skip]
    pub fn hue_rotate_matrix(radians: f64) -> Matrix5<f64> {
        let (sin, cos) = radians.sin_cos();

        let luma = Matrix3::new(
            0.213, 0.715, 0.072,
            0.213, 0.715, 0.072,
            0.213, 0.715, 0.072,
        );

        let rgb = luma
            + (Matrix3::identity() - luma) * cos
            + Matrix3::new(
                -0.213, -0.715,  0.928,
                 0.143,  0.140, -0.283,
                -0.787,  0.715,  0.072,
            ) * sin;

        let mut m: Matrix5<f64> = rgb.fixed_resize(0.0);
        m[(3, 3)] = 1.0;
        m[(4, 4)] = 1.0;
        m
    }
}

resolve_from_attributes!(FeColorMatrix, ColorMatrix);

impl Parse for Kind {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "matrix" => Kind::Matrix,
            "saturate" => Kind::Saturate,
            "hueRotate" => Kind::HueRotate,
            "luminanceToAlpha" => Kind::LuminanceToAlpha,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{apply_primitives, square};

    #[test]
    fn saturate_zero_makes_gray() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::from_size(10, 10), red);

        let output = apply_primitives(
            &[("feColorMatrix", &[("type", "saturate"), ("values", "0")])],
            &source,
        );

        let p = output.get_pixel(5, 5);
        assert_eq!(p.r, p.g);
        assert_eq!(p.g, p.b);
        assert_eq!(p.r, 54);
        assert_eq!(p.a, 255);
    }

    #[test]
    fn matrix_swaps_channels() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::from_size(10, 10), red);

        let output = apply_primitives(
            &[(
                "feColorMatrix",
                &[(
                    "values",
                    "0 0 0 0 0  1 0 0 0 0  0 0 0 0 0  0 0 0 1 0",
                )],
            )],
            &source,
        );

        assert_eq!(output.get_pixel(5, 5), Pixel::new(0, 255, 0, 255));
    }

    #[test]
    fn short_matrix_is_identity() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::from_size(10, 10), red);

        let output =
            apply_primitives(&[("feColorMatrix", &[("values", "1 2 3")])], &source);

        assert_eq!(output.get_pixel(5, 5), red);
    }

    #[test]
    fn luminance_to_alpha() {
        let white = Pixel::new(255, 255, 255, 255);
        let source = square(IRect::from_size(10, 10), white);

        let output = apply_primitives(
            &[("feColorMatrix", &[("type", "luminanceToAlpha")])],
            &source,
        );

        assert_eq!(output.get_pixel(5, 5), Pixel::new(0, 0, 0, 255));
    }

    #[test]
    fn saturate_one_is_identity() {
        let m = ColorMatrix::saturate_matrix(1.0);
        assert!((m - Matrix5::identity()).abs().max() < 1e-9);
    }

    #[test]
    fn hue_rotate_zero_is_identity() {
        let m = ColorMatrix::hue_rotate_matrix(0.0);
        assert!((m - Matrix5::identity()).abs().max() < 1e-9);
    }
}
