use std::cmp::{max, min};

use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::element::{set_attribute, ElementTrait};
use crate::enum_default;
use crate::error::*;
use crate::parse_identifiers;
use crate::parsers::{NonNegative, NumberOptionalNumber, Parse, ParseValue};
use crate::rect::IRect;
use crate::surface_utils::{iterators::PixelRectangle, EdgeMode, Pixel};
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// Largest radius, in pixels, that we process; bigger ones take too much time.
const MAX_RADIUS: f64 = 10.0;

/// Enumeration of the possible morphology operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Erode,
    Dilate,
}

enum_default!(Operator, Operator::Erode);

/// The `feMorphology` filter primitive.
#[derive(Default)]
pub struct FeMorphology {
    base: Primitive,
    params: Morphology,
}

/// Resolved `feMorphology` primitive for rendering.
#[derive(Clone, Default)]
pub struct Morphology {
    in1: Input,
    operator: Operator,
    radius: (f64, f64),
}

impl ElementTrait for FeMorphology {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "operator") => {
                    set_attribute(&mut self.params.operator, attr.parse(value))
                }
                expanded_name!("", "radius") => {
                    let mut radius = NumberOptionalNumber(NonNegative(0.0), NonNegative(0.0));
                    set_attribute(&mut radius, attr.parse(value));

                    let NumberOptionalNumber(NonNegative(x), NonNegative(y)) = radius;
                    self.params.radius = (x, y);
                }
                _ => (),
            }
        }
    }
}

impl Morphology {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input).compute_irect(ctx);

        // A flipping transform makes the radii negative.
        let (rx, ry) = ctx.paffine().transform_distance(self.radius.0, self.radius.1);
        let (rx, ry) = (rx.abs().min(MAX_RADIUS), ry.abs().min(MAX_RADIUS));

        let (pick, start): (fn(u8, u8) -> u8, u8) = match self.operator {
            Operator::Erode => (min, u8::MAX),
            Operator::Dilate => (max, u8::MIN),
        };

        let input_surface = input.surface();

        let surface = input_surface.map_pixels(bounds, |x, y, _| {
            let (x, y) = (f64::from(x), f64::from(y));
            let window = IRect::new(
                (x - rx).floor() as i32,
                (y - ry).floor() as i32,
                (x + rx).ceil() as i32 + 1,
                (y + ry).ceil() as i32 + 1,
            );

            PixelRectangle::within(input_surface, bounds, window, EdgeMode::None).fold(
                Pixel::new(start, start, start, start),
                |acc, (_, _, p)| Pixel {
                    r: pick(acc.r, p.r),
                    g: pick(acc.g, p.g),
                    b: pick(acc.b, p.b),
                    a: pick(acc.a, p.a),
                },
            )
        })?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

resolve_from_attributes!(FeMorphology, Morphology);

impl Parse for Operator {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "erode" => Operator::Erode,
            "dilate" => Operator::Dilate,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{apply_primitives, square};

    #[test]
    fn dilate_grows_shape() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(4, 4, 6, 6), red);

        let output = apply_primitives(
            &[("feMorphology", &[("operator", "dilate"), ("radius", "1")])],
            &source,
        );

        assert_eq!(output.get_pixel(3, 3), red);
        assert_eq!(output.get_pixel(6, 6), red);
        assert_eq!(output.get_pixel(2, 2), Pixel::default());
    }

    #[test]
    fn erode_shrinks_shape() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(2, 2, 7, 7), red);

        let output = apply_primitives(&[("feMorphology", &[("radius", "1")])], &source);

        assert_eq!(output.get_pixel(2, 2), Pixel::default());
        assert_eq!(output.get_pixel(4, 4), red);
    }

    #[test]
    fn parses_operator() {
        assert_eq!(Operator::parse_str("dilate").unwrap(), Operator::Dilate);
        assert!(Operator::parse_str("open").is_err());
    }
}
