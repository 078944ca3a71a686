use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::element::{set_attribute, ElementTrait};
use crate::enum_default;
use crate::error::*;
use crate::parse_identifiers;
use crate::parsers::{Parse, ParseValue};
use crate::rect::IRect;
use crate::surface_utils::shared_surface::Operator as SurfaceOperator;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// Enumeration of the possible compositing operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Over,
    In,
    Out,
    Atop,
    Xor,
    Arithmetic,
}

enum_default!(Operator, Operator::Over);

/// The `feComposite` filter primitive.
#[derive(Default)]
pub struct FeComposite {
    base: Primitive,
    params: Composite,
}

/// Resolved `feComposite` primitive for rendering.
#[derive(Clone, Default)]
pub struct Composite {
    in1: Input,
    in2: Input,
    operator: Operator,
    k1: f64,
    k2: f64,
    k3: f64,
    k4: f64,
}

impl ElementTrait for FeComposite {
    fn set_attributes(&mut self, attrs: &Attributes) {
        let (in1, in2) = self.base.parse_two_inputs(attrs);
        self.params.in1 = in1;
        self.params.in2 = in2;

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "operator") => {
                    set_attribute(&mut self.params.operator, attr.parse(value))
                }
                expanded_name!("", "k1") => set_attribute(&mut self.params.k1, attr.parse(value)),
                expanded_name!("", "k2") => set_attribute(&mut self.params.k2, attr.parse(value)),
                expanded_name!("", "k3") => set_attribute(&mut self.params.k3, attr.parse(value)),
                expanded_name!("", "k4") => set_attribute(&mut self.params.k4, attr.parse(value)),
                _ => (),
            }
        }
    }
}

impl Composite {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let input_2 = ctx.get_input(&self.in2)?;
        let bounds: IRect = bounds_builder
            .add_input(&input_1)
            .add_input(&input_2)
            .compute_irect(ctx);

        let surface = if self.operator == Operator::Arithmetic {
            input_1.surface().compose_arithmetic(
                input_2.surface(),
                bounds,
                self.k1,
                self.k2,
                self.k3,
                self.k4,
            )?
        } else {
            input_1
                .surface()
                .compose(input_2.surface(), bounds, self.operator.into())?
        };

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1
            .get_requirements()
            .fold(self.in2.get_requirements())
    }
}

resolve_from_attributes!(FeComposite, Composite);

impl Parse for Operator {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "over" => Operator::Over,
            "in" => Operator::In,
            "out" => Operator::Out,
            "atop" => Operator::Atop,
            "xor" => Operator::Xor,
            "arithmetic" => Operator::Arithmetic,
        )?)
    }
}

impl From<Operator> for SurfaceOperator {
    #[inline]
    fn from(x: Operator) -> SurfaceOperator {
        use Operator::*;

        match x {
            Over => SurfaceOperator::Over,
            In => SurfaceOperator::In,
            Out => SurfaceOperator::Out,
            Atop => SurfaceOperator::Atop,
            Xor => SurfaceOperator::Xor,
            // Handled separately by `compose_arithmetic`.
            Arithmetic => SurfaceOperator::Over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{apply_primitives, square};
    use crate::surface_utils::Pixel;

    #[test]
    fn in_keeps_source_where_in2_is_opaque() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::from_size(10, 10), red);

        let output = apply_primitives(
            &[
                ("feFlood", &[("x", "0"), ("width", "4"), ("result", "mask")]),
                ("feComposite", &[("in", "SourceGraphic"), ("in2", "mask"), ("operator", "in")]),
            ],
            &source,
        );

        assert_eq!(output.get_pixel(2, 5), red);
        assert_eq!(output.get_pixel(6, 5), Pixel::default());
    }

    #[test]
    fn arithmetic_with_k2_is_a_copy_of_in() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(0, 0, 5, 5), red);

        let output = apply_primitives(
            &[(
                "feComposite",
                &[("in", "SourceGraphic"), ("in2", "SourceGraphic"), ("operator", "arithmetic"), ("k2", "1")],
            )],
            &source,
        );

        assert_eq!(output.get_pixel(2, 2), red);
        assert_eq!(output.get_pixel(7, 7), Pixel::default());
    }

    #[test]
    fn parses_operators() {
        assert_eq!(Operator::parse_str("xor").unwrap(), Operator::Xor);
        assert!(Operator::parse_str("lighter").is_err());
    }
}
