use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::element::{set_attribute, ElementTrait};
use crate::parsers::ParseValue;
use crate::rect::IRect;
use crate::rsvg_log;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// The `feOffset` filter primitive.
#[derive(Default)]
pub struct FeOffset {
    base: Primitive,
    params: Offset,
}

/// Resolved `feOffset` primitive for rendering.
#[derive(Clone, Default)]
pub struct Offset {
    pub in1: Input,
    pub dx: f64,
    pub dy: f64,
}

impl ElementTrait for FeOffset {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "dx") => set_attribute(&mut self.params.dx, attr.parse(value)),
                expanded_name!("", "dy") => set_attribute(&mut self.params.dy, attr.parse(value)),
                _ => (),
            }
        }
    }
}

impl Offset {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input_1).compute_irect(ctx);

        rsvg_log!("(feOffset bounds={:?}", bounds);

        let (dx, dy) = ctx.paffine().transform_distance(self.dx, self.dy);

        let surface = input_1.surface().offset(bounds, dx, dy)?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

resolve_from_attributes!(FeOffset, Offset);
