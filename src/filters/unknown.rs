//! Filter primitives we don't know about.
//!
//! Any `fe*` element without an implementation copies its `in` to its `result`, so that
//! the primitives after it still see a sensible input.

use crate::element::ElementTrait;
use crate::rect::IRect;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// An unrecognized `fe*` element inside a `<filter>`.
#[derive(Default)]
pub struct FeUnknown {
    base: Primitive,
    params: PassThrough,
}

/// Resolved unknown primitive: its output is its input.
#[derive(Clone, Default)]
pub struct PassThrough {
    pub in1: Input,
}

impl ElementTrait for FeUnknown {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);
    }
}

impl PassThrough {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input).compute_irect(ctx);

        let surface = input.surface().copy_surface(bounds)?.share();

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

resolve_from_attributes!(FeUnknown, PassThrough);
