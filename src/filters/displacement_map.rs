use cssparser::{Parser, Token};
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::element::{set_attribute, ElementTrait};
use crate::enum_default;
use crate::error::*;
use crate::parsers::{Parse, ParseValue};
use crate::rect::IRect;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// Enumeration of the color channels the displacement map can source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColorChannel {
    R,
    G,
    B,
    A,
}

enum_default!(ColorChannel, ColorChannel::A);

/// The `feDisplacementMap` filter primitive.
#[derive(Default)]
pub struct FeDisplacementMap {
    base: Primitive,
    params: DisplacementMap,
}

/// Resolved `feDisplacementMap` primitive for rendering.
#[derive(Clone, Default)]
pub struct DisplacementMap {
    in1: Input,
    in2: Input,
    scale: f64,
    x_channel_selector: ColorChannel,
    y_channel_selector: ColorChannel,
}

impl ElementTrait for FeDisplacementMap {
    fn set_attributes(&mut self, attrs: &Attributes) {
        let (in1, in2) = self.base.parse_two_inputs(attrs);
        self.params.in1 = in1;
        self.params.in2 = in2;

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "scale") => {
                    set_attribute(&mut self.params.scale, attr.parse(value))
                }
                expanded_name!("", "xChannelSelector") => {
                    set_attribute(&mut self.params.x_channel_selector, attr.parse(value))
                }
                expanded_name!("", "yChannelSelector") => {
                    set_attribute(&mut self.params.y_channel_selector, attr.parse(value))
                }
                _ => (),
            }
        }
    }
}

impl DisplacementMap {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let displacement_input = ctx.get_input(&self.in2)?;
        let bounds: IRect = bounds_builder
            .add_input(&input_1)
            .add_input(&displacement_input)
            .compute_irect(ctx);

        // Displacement map's values need to be non-premultiplied.
        let displacement_surface = displacement_input.surface().unpremultiply(bounds)?;

        let (sx, sy) = ctx.paffine().transform_distance(self.scale, self.scale);

        let source = input_1.surface();

        let surface = displacement_surface.map_pixels(bounds, |x, y, displacement_pixel| {
            let get_value = |channel| match channel {
                ColorChannel::R => displacement_pixel.r,
                ColorChannel::G => displacement_pixel.g,
                ColorChannel::B => displacement_pixel.b,
                ColorChannel::A => displacement_pixel.a,
            };

            let process = |v: u8| f64::from(v) / 255.0 - 0.5;

            let dx = sx * process(get_value(self.x_channel_selector));
            let dy = sy * process(get_value(self.y_channel_selector));

            let src_x = (f64::from(x) + dx).round() as i32;
            let src_y = (f64::from(y) + dy).round() as i32;

            if bounds.contains(src_x, src_y) {
                source.get_pixel_or_transparent(src_x, src_y)
            } else {
                Default::default()
            }
        })?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1
            .get_requirements()
            .fold(self.in2.get_requirements())
    }
}

resolve_from_attributes!(FeDisplacementMap, DisplacementMap);

/// Channel names are case-sensitive, unlike most SVG keywords.
impl Parse for ColorChannel {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let loc = parser.current_source_location();
        let token = parser.next()?;

        match token {
            Token::Ident(ref cow) if cow.as_ref() == "R" => Ok(ColorChannel::R),
            Token::Ident(ref cow) if cow.as_ref() == "G" => Ok(ColorChannel::G),
            Token::Ident(ref cow) if cow.as_ref() == "B" => Ok(ColorChannel::B),
            Token::Ident(ref cow) if cow.as_ref() == "A" => Ok(ColorChannel::A),
            _ => Err(loc.new_basic_unexpected_token_error(token.clone()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{apply_primitives, square};
    use crate::surface_utils::Pixel;

    #[test]
    fn neutral_map_does_not_move_pixels() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(2, 2, 4, 4), red);

        // A channel value of 128 is (almost exactly) a zero displacement.
        let output = apply_primitives(
            &[
                ("feFlood", &[("flood-color", "rgb(128, 0, 128)"), ("result", "map")]),
                (
                    "feDisplacementMap",
                    &[
                        ("in", "SourceGraphic"),
                        ("in2", "map"),
                        ("scale", "4"),
                        ("xChannelSelector", "R"),
                        ("yChannelSelector", "B"),
                    ],
                ),
            ],
            &source,
        );

        assert_eq!(output.get_pixel(2, 2), red);
        assert_eq!(output.get_pixel(5, 5), Pixel::default());
    }

    #[test]
    fn full_channel_moves_by_half_the_scale() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(4, 0, 5, 10), red);

        // R = 255 displaces by scale * 0.5 = 2 pixels; each output pixel samples 2 to the right.
        let output = apply_primitives(
            &[
                ("feFlood", &[("flood-color", "rgb(255, 0, 0)"), ("result", "map")]),
                (
                    "feDisplacementMap",
                    &[
                        ("in", "SourceGraphic"),
                        ("in2", "map"),
                        ("scale", "4"),
                        ("xChannelSelector", "R"),
                        ("yChannelSelector", "B"),
                    ],
                ),
            ],
            &source,
        );

        assert_eq!(output.get_pixel(2, 5), red);
        assert_eq!(output.get_pixel(4, 5), Pixel::default());
    }

    #[test]
    fn parses_channels() {
        assert_eq!(ColorChannel::parse_str("G").unwrap(), ColorChannel::G);
        assert!(ColorChannel::parse_str("g").is_err());
    }
}
