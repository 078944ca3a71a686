use crate::color::with_opacity;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::rgba_to_pixel;
use crate::element::ElementTrait;
use crate::node::{CascadedValues, Node};
use crate::rect::IRect;
use crate::rsvg_log;
use crate::surface_utils::{shared_surface::SharedImageSurface, Pixel};
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{
    FilterEffect, FilterError, FilterResolveError, Primitive, PrimitiveParams, ResolvedPrimitive,
};

/// The `feFlood` filter primitive.
#[derive(Default)]
pub struct FeFlood {
    base: Primitive,
}

/// Resolved `feFlood` primitive for rendering.
pub struct Flood {
    /// Premultiplied color, with `flood-opacity` applied.
    pub color: Pixel,
}

impl ElementTrait for FeFlood {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.base.parse_no_inputs(attrs);
    }
}

impl Flood {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let bounds: IRect = bounds_builder.compute_irect(ctx);

        rsvg_log!("(feFlood bounds={:?}", bounds);

        let source = ctx.source_graphic();
        let surface =
            SharedImageSurface::flood(source.width(), source.height(), bounds, self.color)?;

        Ok(FilterOutput { surface, bounds })
    }
}

impl FilterEffect for FeFlood {
    fn resolve(
        &self,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError> {
        let cascaded = CascadedValues::new_from_node(node);
        let values = cascaded.get();

        let rgba = with_opacity(values.resolve(&values.flood_color), values.flood_opacity);

        Ok(vec![ResolvedPrimitive {
            primitive: self.base.clone(),
            params: PrimitiveParams::Flood(Flood {
                color: rgba_to_pixel(rgba),
            }),
        }])
    }
}

#[cfg(test)]
mod tests {
    use crate::filters::tests::{apply_primitives, square};
    use crate::rect::IRect;
    use crate::surface_utils::Pixel;

    #[test]
    fn default_flood_is_opaque_black() {
        let source = square(IRect::from_size(0, 0), Pixel::default());
        let output = apply_primitives(&[("feFlood", &[])], &source);

        assert_eq!(output.get_pixel(5, 5), Pixel::new(0, 0, 0, 255));
    }

    #[test]
    fn flood_opacity_is_premultiplied() {
        let source = square(IRect::from_size(0, 0), Pixel::default());
        let output = apply_primitives(
            &[(
                "feFlood",
                &[("flood-color", "#ff0000"), ("flood-opacity", "0.5"), ("x", "2"), ("width", "3")],
            )],
            &source,
        );

        assert_eq!(output.get_pixel(1, 5), Pixel::default());
        assert_eq!(output.get_pixel(3, 5), Pixel::new(128, 0, 0, 128));
        assert_eq!(output.get_pixel(5, 5), Pixel::default());
    }
}
