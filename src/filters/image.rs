use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::aspect_ratio::AspectRatio;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{sample_bilinear, DrawingCtx};
use crate::element::{set_attribute, ElementTrait};
use crate::io;
use crate::node::{CascadedValues, Node};
use crate::parsers::ParseValue;
use crate::rect::{IRect, Rect};
use crate::rsvg_log;
use crate::state::State;
use crate::surface_utils::shared_surface::SharedImageSurface;
use crate::viewbox::ViewBox;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterEffect, FilterError, FilterResolveError, Primitive, PrimitiveParams, ResolvedPrimitive};

/// The `feImage` filter primitive.
#[derive(Default)]
pub struct FeImage {
    base: Primitive,
    params: ImageParams,
}

#[derive(Clone, Default)]
struct ImageParams {
    aspect: AspectRatio,
    href: Option<String>,
}

/// Resolved `feImage` primitive for rendering.
pub struct Image {
    params: ImageParams,

    /// Values of the `feImage` element; a referenced element cascades from them.
    feimage_values: Box<State>,
}

impl ElementTrait for FeImage {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.base.parse_no_inputs(attrs);

        self.params.href = attrs.get_href().map(String::from);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "preserveAspectRatio") => {
                    set_attribute(&mut self.params.aspect, attr.parse(value))
                }

                // "path" is used by some older Adobe Illustrator versions
                expanded_name!("", "path") if self.params.href.is_none() => {
                    self.params.href = Some(value.to_string())
                }

                _ => (),
            }
        }
    }
}

impl Image {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
        acquired_nodes: &mut AcquiredNodes<'_>,
        draw_ctx: &mut DrawingCtx,
    ) -> Result<FilterOutput, FilterError> {
        let bounds = bounds_builder.compute(ctx);
        let clipped = IRect::from(bounds.clipped);

        let href = self.params.href.as_ref().ok_or(FilterError::InvalidInput)?;

        let surface = match href.strip_prefix('#') {
            Some(id) if !id.is_empty() => {
                self.render_node(ctx, acquired_nodes, draw_ctx, clipped, id)?
            }
            _ => self.render_external_image(ctx, draw_ctx, clipped, &bounds.unclipped, href)?,
        };

        Ok(FilterOutput {
            surface,
            bounds: clipped,
        })
    }

    /// Renders an element of the document, as if it were instanced by `<use>`.
    fn render_node(
        &self,
        ctx: &FilterContext<'_>,
        acquired_nodes: &mut AcquiredNodes<'_>,
        draw_ctx: &mut DrawingCtx,
        bounds: IRect,
        id: &str,
    ) -> Result<SharedImageSurface, FilterError> {
        let acquired = acquired_nodes.acquire(id).map_err(|e| {
            rsvg_log!("feImage could not acquire \"#{}\": {}", id, e);
            FilterError::InvalidInput
        })?;
        let referenced_node = acquired.get();

        let viewport = ctx.viewport();
        let cascaded =
            CascadedValues::new_from_values(referenced_node, &self.feimage_values, viewport.dpi);

        let image =
            draw_ctx.draw_node_to_surface(referenced_node, acquired_nodes, &cascaded, viewport)?;

        Ok(image.copy_surface(bounds)?.share())
    }

    /// Renders an external image into the primitive subregion, honoring
    /// `preserveAspectRatio`.
    fn render_external_image(
        &self,
        ctx: &FilterContext<'_>,
        draw_ctx: &DrawingCtx,
        bounds: IRect,
        unclipped_bounds: &Rect,
        url: &str,
    ) -> Result<SharedImageSurface, FilterError> {
        let config = draw_ctx.config();
        let image = io::load_image(
            config.resource_loader.as_ref(),
            config.image_decoder.as_ref(),
            url,
        )
        .map_err(|e| {
            rsvg_log!("feImage could not load \"{}\": {}", url, e);
            FilterError::InvalidInput
        })?;

        let source = ctx.source_graphic();
        let output = SharedImageSurface::empty(source.width(), source.height())?;

        if image.width() == 0 || image.height() == 0 {
            return Ok(output);
        }

        let image_size = Rect::from_size(f64::from(image.width()), f64::from(image.height()));
        let rect = self
            .params
            .aspect
            .compute(&ViewBox::from(image_size), unclipped_bounds);

        if rect.is_empty() {
            return Ok(output);
        }

        let sx = image_size.width() / rect.width();
        let sy = image_size.height() / rect.height();

        Ok(output.map_pixels(bounds, |x, y, _| {
            let px = f64::from(x) + 0.5;
            let py = f64::from(y) + 0.5;

            if px < rect.x0 || px >= rect.x1 || py < rect.y0 || py >= rect.y1 {
                return Default::default();
            }

            sample_bilinear(&image, (px - rect.x0) * sx, (py - rect.y0) * sy)
        })?)
    }
}

impl FilterEffect for FeImage {
    fn resolve(
        &self,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError> {
        let cascaded = CascadedValues::new_from_node(node);
        let feimage_values = Box::new(cascaded.get().clone());

        Ok(vec![ResolvedPrimitive {
            primitive: self.base.clone(),
            params: PrimitiveParams::Image(Image {
                params: self.params.clone(),
                feimage_values,
            }),
        }])
    }
}
