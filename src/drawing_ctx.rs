//! The main context structure which drives the drawing process.

use std::rc::Rc;

use crate::aspect_ratio::AspectRatio;
use crate::bbox::BoundingBox;
use crate::color::RGBA;
use crate::coord_units::CoordUnits;
use crate::document::AcquiredNodes;
use crate::element::Element;
use crate::error::{AcquireError, RenderingError};
use crate::filters;
use crate::io::{DefaultResourceLoader, ImageDecoder, PngDecoder, ResourceLoader};
use crate::layout::{self, FilterRef, StackingContext};
use crate::length::{Dpi, NormalizeParams};
use crate::marker;
use crate::node::{CascadedValues, Node, NodeBorrow, NodeDraw};
use crate::paint_server::{PaintSource, UserSpacePaintSource};
use crate::path_builder::PathBuilder;
use crate::pattern::UserSpacePattern;
use crate::rasterizer::{rasterize, Coverage, FillRule};
use crate::rect::{IRect, Rect};
use crate::rsvg_log;
use crate::state::State;
use crate::stroke::stroke_outline;
use crate::surface_utils::{
    shared_surface::{ExclusiveImageSurface, SharedImageSurface},
    Pixel, PixelOps,
};
use crate::text::TextLayout;
use crate::transform::Transform;
use crate::viewbox::ViewBox;
use crate::vpath::{Vpath, FLATNESS};
use crate::{borrow_element_as, is_element_of_type};

/// Coordinate system in which an element is drawn.
///
/// `transform` maps the current user space to device pixels; `vbox` is the size that
/// percentage lengths resolve against.
///
/// This `transform` is the accumulated affine: the product of every ancestor's
/// transform and viewBox mapping, down to the element being drawn.  An element's own
/// `transform` attribute, relative to its parent, is kept in [`State::transform`].
#[derive(Debug, Copy, Clone)]
pub struct Viewport {
    pub dpi: Dpi,
    pub vbox: ViewBox,
    pub transform: Transform,
}

impl Viewport {
    pub fn new(dpi: Dpi, width: f64, height: f64, transform: Transform) -> Viewport {
        Viewport {
            dpi,
            vbox: ViewBox::from(Rect::from_size(width, height)),
            transform,
        }
    }

    /// An empty bounding box in this viewport's user space.
    pub fn empty_bbox(&self) -> BoundingBox {
        BoundingBox::new().with_transform(self.transform)
    }

    /// Viewport for lengths given in `units`; object bounding box units resolve
    /// percentages against the unit square.
    pub fn with_units(&self, units: CoordUnits) -> Viewport {
        match units {
            CoordUnits::ObjectBoundingBox => Viewport {
                vbox: ViewBox::from(Rect::from_size(1.0, 1.0)),
                ..*self
            },

            CoordUnits::UserSpaceOnUse => *self,
        }
    }

    pub fn with_view_box(&self, width: f64, height: f64) -> Viewport {
        Viewport {
            vbox: ViewBox::from(Rect::from_size(width, height)),
            ..*self
        }
    }

    /// Composes `transform` after this viewport's transform, so that it applies first.
    pub fn with_composed_transform(&self, transform: Transform) -> Result<Viewport, RenderingError> {
        let composed = self.transform.pre_transform(&transform);

        if composed.is_invertible() {
            Ok(Viewport {
                transform: composed,
                ..*self
            })
        } else {
            Err(RenderingError::InvalidTransform)
        }
    }

    /// Establishes a new viewport that maps `vbox` into `rect` of the current user space.
    ///
    /// Returns `None` if the rectangle or the viewBox are empty, in which case nothing
    /// is drawn.
    pub fn with_new_viewport(
        &self,
        vbox: Option<ViewBox>,
        rect: &Rect,
        aspect: AspectRatio,
    ) -> Option<Viewport> {
        let transform = aspect.viewport_to_viewbox_transform(vbox, rect)?;

        let vbox = vbox.unwrap_or_else(|| ViewBox::from(Rect::from_size(rect.width(), rect.height())));

        Some(Viewport {
            dpi: self.dpi,
            vbox,
            transform: self.transform.pre_transform(&transform),
        })
    }

    pub fn normalize_params(&self, values: &State) -> NormalizeParams {
        NormalizeParams::new(self.dpi, self.vbox.width(), self.vbox.height(), values.font_size)
    }
}

/// Options that apply to a whole render.
pub struct RenderingConfig {
    pub dpi: Dpi,

    /// Languages for the `systemLanguage` conditional attribute.
    pub user_languages: Vec<String>,

    /// Service that turns text into glyph coverage.  Without it, text is not drawn.
    pub text_layout: Option<Rc<dyn TextLayout>>,

    pub image_decoder: Rc<dyn ImageDecoder>,
    pub resource_loader: Rc<dyn ResourceLoader>,
}

impl Default for RenderingConfig {
    fn default() -> RenderingConfig {
        RenderingConfig {
            dpi: Dpi::default(),
            user_languages: vec![String::from("en")],
            text_layout: None,
            image_decoder: Rc::new(PngDecoder),
            resource_loader: Rc::new(DefaultResourceLoader::new(None)),
        }
    }
}

/// Takes rendering commands and draws them into pixel surfaces.
///
/// Drawing happens on `surface`.  Elements that need to be composited as a unit get a
/// fresh transparent layer pushed with [`Self::push_layer`]; the surface they were going to
/// draw on is kept in `layers` until the layer is popped.  Every layer has the size of
/// the output.
///
/// `clip` is the coverage of the user-space clip paths that are active for the element
/// being drawn.  Everything painted is multiplied by it.
pub struct DrawingCtx {
    config: Rc<RenderingConfig>,
    surface: ExclusiveImageSurface,
    layers: Vec<ExclusiveImageSurface>,
    clip: Option<Rc<Coverage>>,
}

impl DrawingCtx {
    pub fn new(
        width: i32,
        height: i32,
        config: Rc<RenderingConfig>,
    ) -> Result<DrawingCtx, RenderingError> {
        Ok(DrawingCtx {
            config,
            surface: ExclusiveImageSurface::new(width, height)?,
            layers: Vec::new(),
            clip: None,
        })
    }

    /// A context with the same configuration, drawing to a new surface.
    fn nested(&self, width: i32, height: i32) -> Result<DrawingCtx, RenderingError> {
        DrawingCtx::new(width, height, self.config.clone())
    }

    pub fn config(&self) -> &RenderingConfig {
        &self.config
    }

    pub fn user_languages(&self) -> &[String] {
        &self.config.user_languages
    }

    pub fn width(&self) -> i32 {
        self.surface.width()
    }

    pub fn height(&self) -> i32 {
        self.surface.height()
    }

    /// The surface being drawn on.
    pub fn surface(&self) -> &ExclusiveImageSurface {
        &self.surface
    }

    pub fn into_surface(self) -> ExclusiveImageSurface {
        self.surface
    }

    fn push_layer(&mut self) -> Result<(), RenderingError> {
        let layer = ExclusiveImageSurface::new(self.width(), self.height())?;
        let below = std::mem::replace(&mut self.surface, layer);
        self.layers.push(below);
        Ok(())
    }

    fn pop_layer(&mut self) -> Result<SharedImageSurface, RenderingError> {
        let below = self
            .layers
            .pop()
            .ok_or_else(|| RenderingError::Rendering("layer stack underflow".to_string()))?;

        Ok(std::mem::replace(&mut self.surface, below).share())
    }

    /// Draws a node, logging and skipping it if it fails.
    ///
    /// Only exceeded limits abort the rendering of the ancestors as well.
    pub fn draw_node_from_stack(
        &mut self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        match node.draw(acquired_nodes, cascaded, viewport, self, clipping) {
            Err(e @ RenderingError::LimitExceeded(_)) => Err(e),

            Err(e) => {
                rsvg_log!("could not render {}: {}", node, e);
                Ok(viewport.empty_bbox())
            }

            ok => ok,
        }
    }

    /// Runs `draw_fn` in the coordinate system of an element, and applies the element's
    /// clip path, mask, filter and opacity to what it draws.
    ///
    /// When the element needs a layer, its content is drawn there and then composited
    /// in this order: filter, clip path in object bounding box units, mask, opacity.
    /// A clip path in user space units is applied while drawing.
    pub fn with_discrete_layer(
        &mut self,
        stacking_ctx: &StackingContext,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        values: &State,
        clipping: bool,
        draw_fn: &mut dyn FnMut(
            &mut AcquiredNodes<'_>,
            &mut DrawingCtx,
            &Viewport,
        ) -> Result<BoundingBox, RenderingError>,
    ) -> Result<BoundingBox, RenderingError> {
        let viewport = match viewport.with_composed_transform(stacking_ctx.transform) {
            Ok(v) => v,
            Err(_) => {
                rsvg_log!(
                    "element {} has a non-invertible transform and will not be rendered",
                    stacking_ctx.element_name
                );
                return Ok(viewport.empty_bbox());
            }
        };

        if clipping {
            return draw_fn(acquired_nodes, self, &viewport);
        }

        let outer_clip = self.clip.clone();

        let clip = match stacking_ctx.clip_in_user_space {
            Some(ref clip_node) => {
                match self.clip_coverage(clip_node, acquired_nodes, &viewport, &viewport.empty_bbox())? {
                    Some(coverage) => Some(Rc::new(intersect_clip(outer_clip.as_deref(), coverage))),
                    None => outer_clip.clone(),
                }
            }

            None => outer_clip.clone(),
        };

        if !stacking_ctx.should_isolate() {
            self.clip = clip;
            let res = draw_fn(acquired_nodes, self, &viewport);
            self.clip = outer_clip;
            return res;
        }

        self.clip = None;
        self.push_layer()?;
        let res = draw_fn(acquired_nodes, self, &viewport);
        let popped = self.pop_layer();
        self.clip = outer_clip;

        let bbox = res?;
        let mut layer = popped?;

        if let FilterRef::Node(ref filter_node) = stacking_ctx.filter {
            layer = filters::render(filter_node, values, layer, acquired_nodes, self, &viewport, &bbox)?;
        }

        let mut mask = clip.map(|c| (*c).clone());

        if let Some(ref clip_node) = stacking_ctx.clip_in_object_space {
            if let Some(coverage) = self.clip_coverage(clip_node, acquired_nodes, &viewport, &bbox)? {
                mask = Some(intersect_clip(mask.as_ref(), coverage));
            }
        }

        if let Some(ref mask_node) = stacking_ctx.mask {
            if let Some(coverage) = self.mask_coverage(mask_node, acquired_nodes, &viewport, &bbox)? {
                mask = Some(intersect_clip(mask.as_ref(), coverage));
            }
        }

        self.surface
            .composite_surface(&layer, mask.as_ref(), stacking_ctx.opacity);

        Ok(bbox)
    }

    /// Runs `draw_fn` with the drawing clipped to `rect`, given in the space of
    /// `transform`.
    pub fn with_clip_rect(
        &mut self,
        rect: Option<&Rect>,
        transform: &Transform,
        draw_fn: &mut dyn FnMut(&mut DrawingCtx) -> Result<BoundingBox, RenderingError>,
    ) -> Result<BoundingBox, RenderingError> {
        let saved = self.clip.clone();

        if let Some(rect) = rect {
            let coverage = self.rect_coverage(rect, transform);
            self.clip = Some(Rc::new(intersect_clip(saved.as_deref(), coverage)));
        }

        let res = draw_fn(self);
        self.clip = saved;
        res
    }

    fn rect_coverage(&self, rect: &Rect, transform: &Transform) -> Coverage {
        let mut builder = PathBuilder::default();
        builder.move_to(rect.x0, rect.y0);
        builder.line_to(rect.x1, rect.y0);
        builder.line_to(rect.x1, rect.y1);
        builder.line_to(rect.x0, rect.y1);
        builder.close_path();

        let vpath = Vpath::from_path(&builder.into_path(), transform, FLATNESS);
        rasterize(&vpath, FillRule::NonZero, self.width(), self.height())
    }

    /// Renders the children of a `clipPath` into a coverage mask.
    ///
    /// Returns `None` if the clip path cannot be applied, in which case the element is
    /// not clipped.
    fn clip_coverage(
        &mut self,
        clip_node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        bbox: &BoundingBox,
    ) -> Result<Option<Coverage>, RenderingError> {
        let _acquired = match acquired_nodes.acquire_ref(clip_node) {
            Ok(a) => a,
            Err(_) => {
                rsvg_log!("circular reference in clip path {}", clip_node);
                return Ok(None);
            }
        };

        let units = borrow_element_as!(clip_node, ClipPath).get_units();

        let bbox_transform = match bbox.rect_to_transform(units) {
            Some(t) => t,
            None => {
                rsvg_log!("clip path {} applies to an empty bounding box", clip_node);
                return Ok(None);
            }
        };

        let cascaded = CascadedValues::new_from_node(clip_node);
        let values = cascaded.get();

        let transform = viewport
            .transform
            .pre_transform(&bbox_transform)
            .pre_transform(&values.transform);

        if !transform.is_invertible() {
            return Ok(Some(Coverage::empty()));
        }

        let clip_viewport = Viewport {
            transform,
            ..viewport.with_units(units)
        };

        let saved_clip = self.clip.take();
        self.push_layer()?;

        let mut res = Ok(());
        for child in clip_node.children().filter(|c| {
            c.is_element() && element_can_be_used_inside_clip_path(&c.borrow_element())
        }) {
            res = child
                .draw(
                    acquired_nodes,
                    &CascadedValues::clone_with_node(&cascaded, &child),
                    &clip_viewport,
                    self,
                    true,
                )
                .map(|_| ());

            if res.is_err() {
                break;
            }
        }

        let popped = self.pop_layer();
        self.clip = saved_clip;
        res?;

        let mut coverage = popped?.to_alpha_mask();

        // A clipPath can itself be clipped.
        if let Some(clip_id) = values.clip_path.get() {
            match acquired_nodes.acquire(clip_id) {
                Ok(acquired) if is_element_of_type!(acquired.get(), ClipPath) => {
                    let node = acquired.get().clone();
                    if let Some(c) = self.clip_coverage(&node, acquired_nodes, viewport, bbox)? {
                        coverage = coverage.intersect(&c);
                    }
                }

                Err(AcquireError::MaxReferencesExceeded) => {
                    return Err(AcquireError::MaxReferencesExceeded.into())
                }

                _ => rsvg_log!("ignoring invalid clip-path \"{}\" on {}", clip_id, clip_node),
            }
        }

        Ok(Some(coverage))
    }

    /// Renders a `mask` into a coverage mask from the luminance of its content.
    fn mask_coverage(
        &mut self,
        mask_node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        bbox: &BoundingBox,
    ) -> Result<Option<Coverage>, RenderingError> {
        if bbox.rect_is_empty() {
            return Ok(None);
        }

        let _acquired = match acquired_nodes.acquire_ref(mask_node) {
            Ok(a) => a,
            Err(_) => {
                rsvg_log!("circular reference in mask {}", mask_node);
                return Ok(None);
            }
        };

        let cascaded = CascadedValues::new_from_node(mask_node);
        let values = cascaded.get();

        let (mask_units, content_units, mask_rect) = {
            let mask = borrow_element_as!(mask_node, Mask);
            let units = mask.get_units();
            let params = viewport.with_units(units).normalize_params(values);
            (units, mask.get_content_units(), mask.get_rect(&params))
        };

        let bbox_transform = match bbox.rect_to_transform(CoordUnits::ObjectBoundingBox) {
            Some(t) => t,
            None => return Ok(None),
        };

        let mask_transform = viewport.transform.pre_transform(&values.transform);
        if !mask_transform.is_invertible() {
            return Ok(Some(Coverage::empty()));
        }

        let mask_rect = match mask_units {
            CoordUnits::ObjectBoundingBox => bbox_transform.transform_rect(&mask_rect),
            CoordUnits::UserSpaceOnUse => mask_rect,
        };

        let rect_coverage = self.rect_coverage(&mask_rect, &mask_transform);

        let content_transform = match content_units {
            CoordUnits::ObjectBoundingBox => mask_transform.pre_transform(&bbox_transform),
            CoordUnits::UserSpaceOnUse => mask_transform,
        };

        let content_viewport = Viewport {
            transform: content_transform,
            ..viewport.with_units(content_units)
        };

        let saved_clip = self.clip.take();
        self.push_layer()?;
        let res = mask_node.draw_children(acquired_nodes, &cascaded, &content_viewport, self, false);
        let popped = self.pop_layer();
        self.clip = saved_clip;
        res?;

        let coverage = popped?.to_luminance_mask(255);
        Ok(Some(coverage.intersect(&rect_coverage)))
    }

    /// Paints `paint` through `coverage`, and through the active clip.
    pub fn paint_coverage(
        &mut self,
        coverage: &Coverage,
        paint: &UserSpacePaintSource,
        opacity: u8,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
    ) -> Result<(), RenderingError> {
        if opacity == 0 || coverage.is_empty() {
            return Ok(());
        }

        let clipped;
        let coverage = match self.clip {
            Some(ref clip) => {
                clipped = coverage.intersect(clip);
                &clipped
            }

            None => coverage,
        };

        match *paint {
            UserSpacePaintSource::None => (),

            UserSpacePaintSource::SolidColor(rgba) => {
                let pixel = rgba_to_pixel(rgba);
                self.surface.composite(coverage, opacity, |_, _| pixel);
            }

            UserSpacePaintSource::Gradient(ref gradient, _) => {
                let to_gradient = viewport.transform.pre_transform(&gradient.transform).invert();

                if let Some(inverse) = to_gradient {
                    self.surface.composite(coverage, opacity, |x, y| {
                        let (gx, gy) = inverse.transform_point(f64::from(x) + 0.5, f64::from(y) + 0.5);
                        gradient.color_at(gx, gy)
                    });
                }
            }

            UserSpacePaintSource::Pattern(ref pattern, alternate) => {
                match self.render_pattern_tile(pattern, acquired_nodes, viewport)? {
                    Some((tile, device_to_tile)) => {
                        let (tw, th) = (tile.width(), tile.height());

                        self.surface.composite(coverage, opacity, |x, y| {
                            let (u, v) =
                                device_to_tile.transform_point(f64::from(x) + 0.5, f64::from(y) + 0.5);
                            let tx = (u.floor() as i32).rem_euclid(tw);
                            let ty = (v.floor() as i32).rem_euclid(th);
                            tile.get_pixel(tx as u32, ty as u32)
                        });
                    }

                    None => {
                        if let Some(rgba) = alternate {
                            let pixel = rgba_to_pixel(rgba);
                            self.surface.composite(coverage, opacity, |_, _| pixel);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Renders one tile of a pattern at device resolution.
    ///
    /// Returns the tile and the transform from device pixels to tile pixels, or `None`
    /// if the pattern has nothing to draw.
    fn render_pattern_tile(
        &mut self,
        pattern: &UserSpacePattern,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
    ) -> Result<Option<(SharedImageSurface, Transform)>, RenderingError> {
        let _acquired = match acquired_nodes.acquire_ref(&pattern.node_with_children) {
            Ok(a) => a,
            Err(_) => {
                rsvg_log!("circular reference in pattern {}", pattern.node_with_children);
                return Ok(None);
            }
        };

        let taffine = viewport.transform.pre_transform(&pattern.coord_transform);

        let scwscale = (taffine.xx * taffine.xx + taffine.yx * taffine.yx).sqrt();
        let schscale = (taffine.xy * taffine.xy + taffine.yy * taffine.yy).sqrt();

        let pw = (pattern.width * scwscale) as i32;
        let ph = (pattern.height * schscale) as i32;

        if pw < 1 || ph < 1 {
            return Ok(None);
        }

        let scwscale = f64::from(pw) / pattern.width;
        let schscale = f64::from(ph) / pattern.height;

        let tile_to_device = taffine.pre_scale(1.0 / scwscale, 1.0 / schscale);
        let device_to_tile = match tile_to_device.invert() {
            Some(t) => t,
            None => return Ok(None),
        };

        let content_viewport = Viewport {
            dpi: viewport.dpi,
            vbox: pattern.content_vbox,
            transform: Transform::new_scale(scwscale, schscale)
                .pre_transform(&pattern.content_transform),
        };

        let mut tile_ctx = self.nested(pw, ph)?;

        let node = &pattern.node_with_children;
        let cascaded = CascadedValues::new_from_node(node);
        let values = cascaded.get();
        let stacking_ctx = {
            let elt = node.borrow_element();
            StackingContext::new(acquired_nodes, &elt, Transform::identity(), values)
        };

        tile_ctx.with_discrete_layer(
            &stacking_ctx,
            acquired_nodes,
            &content_viewport,
            values,
            false,
            &mut |an, dc, viewport| node.draw_children(an, &cascaded, viewport, dc, false),
        )?;

        Ok(Some((tile_ctx.into_surface().share(), device_to_tile)))
    }

    pub fn draw_shape(
        &mut self,
        shape: &layout::Shape,
        stacking_ctx: &StackingContext,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        values: &State,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        if shape.path.is_empty() {
            return Ok(viewport.empty_bbox());
        }

        self.with_discrete_layer(
            stacking_ctx,
            acquired_nodes,
            viewport,
            values,
            clipping,
            &mut |an, dc, viewport| {
                let transform = viewport.transform;
                let (width, height) = (dc.width(), dc.height());

                let device_path = Vpath::from_path(&shape.path, &transform, FLATNESS);

                if clipping {
                    if shape.is_visible {
                        let coverage =
                            rasterize(&device_path.close_subpaths(), shape.clip_rule, width, height);
                        let black = UserSpacePaintSource::SolidColor(RGBA::new(0, 0, 0, 255));
                        dc.paint_coverage(&coverage, &black, 255, an, viewport)?;
                    }

                    return Ok(viewport.empty_bbox());
                }

                let mut bbox = viewport.empty_bbox();

                let user_path = Vpath::from_path(
                    &shape.path,
                    &Transform::identity(),
                    FLATNESS / transform.expansion_factor(),
                );

                if let Some(rect) = user_path.extents() {
                    bbox = bbox.with_rect(rect).with_ink_rect(rect);
                }

                let stroke_outline = if matches!(shape.stroke_paint, PaintSource::None) {
                    None
                } else {
                    let params = viewport.normalize_params(values);
                    values
                        .stroke_params(&params, &transform)
                        .map(|p| stroke_outline(&device_path, &p, FLATNESS))
                };

                if let Some(extents) = stroke_outline.as_ref().and_then(Vpath::extents) {
                    if let Some(inverse) = transform.invert() {
                        let ink = inverse.transform_rect(&extents);
                        bbox.ink_rect = Some(bbox.ink_rect.map_or(ink, |r| r.union(&ink)));
                    }
                }

                if !shape.is_visible {
                    return Ok(bbox);
                }

                let fill_paint = shape.fill_paint.to_user_space(&bbox, viewport, values);
                if !matches!(fill_paint, UserSpacePaintSource::None) {
                    let coverage =
                        rasterize(&device_path.close_subpaths(), shape.fill_rule, width, height);
                    dc.paint_coverage(&coverage, &fill_paint, shape.fill_opacity, an, viewport)?;
                }

                if let Some(outline) = stroke_outline {
                    let stroke_paint = shape.stroke_paint.to_user_space(&bbox, viewport, values);
                    let coverage = rasterize(&outline, FillRule::NonZero, width, height);
                    dc.paint_coverage(&coverage, &stroke_paint, shape.stroke_opacity, an, viewport)?;
                }

                marker::render_markers_for_shape(shape, viewport, dc, an, values)?;

                Ok(bbox)
            },
        )
    }

    pub fn draw_image(
        &mut self,
        image: &layout::Image,
        stacking_ctx: &StackingContext,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        values: &State,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let image_width = image.surface.width();
        let image_height = image.surface.height();

        if clipping || image.rect.is_empty() || image_width == 0 || image_height == 0 {
            return Ok(viewport.empty_bbox());
        }

        let image_size = Rect::from_size(f64::from(image_width), f64::from(image_height));

        let placement = match image
            .aspect
            .viewport_to_viewbox_transform(Some(ViewBox::from(image_size)), &image.rect)
        {
            Some(t) => t,
            None => return Ok(viewport.empty_bbox()),
        };

        self.with_discrete_layer(
            stacking_ctx,
            acquired_nodes,
            viewport,
            values,
            clipping,
            &mut |_an, dc, viewport| {
                if image.is_visible {
                    let device = viewport.transform.pre_transform(&placement);

                    let visible = placement.transform_rect(&image_size).intersection(&image.rect);

                    if let (Some(inverse), Some(visible)) = (device.invert(), visible) {
                        let coverage = dc.rect_coverage(&visible, &viewport.transform);
                        let coverage = match dc.clip {
                            Some(ref clip) => coverage.intersect(clip),
                            None => coverage,
                        };

                        dc.surface.composite(&coverage, 255, |x, y| {
                            let (u, v) =
                                inverse.transform_point(f64::from(x) + 0.5, f64::from(y) + 0.5);
                            sample_bilinear(&image.surface, u, v)
                        });
                    }
                }

                Ok(viewport
                    .empty_bbox()
                    .with_rect(image.rect)
                    .with_ink_rect(image.rect))
            },
        )
    }

    /// Draws one positioned run of text.
    pub fn draw_text_span(
        &mut self,
        span: &layout::TextSpan,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        values: &State,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let run = &span.run;
        let ink = run.ink_rect.translate((span.x, span.y));

        let mut bbox = viewport.empty_bbox();
        if !ink.is_empty() {
            bbox = bbox.with_rect(ink).with_ink_rect(ink);
        }

        if !span.is_visible || ink.is_empty() || run.width == 0 || run.height == 0 {
            return Ok(bbox);
        }

        let inverse = match viewport.transform.invert() {
            Some(t) => t,
            None => return Ok(bbox),
        };

        let device_rect = viewport.transform.transform_rect(&ink);
        let bounds = match IRect::from(device_rect).intersection(&self.surface.rect()) {
            Some(b) => b,
            None => return Ok(bbox),
        };

        let sx = f64::from(run.width) / ink.width();
        let sy = f64::from(run.height) / ink.height();

        let coverage = Coverage::from_fn(bounds, |x, y| {
            let (ux, uy) = inverse.transform_point(f64::from(x) + 0.5, f64::from(y) + 0.5);
            run.sample((ux - ink.x0) * sx, (uy - ink.y0) * sy)
        });

        if clipping {
            let black = UserSpacePaintSource::SolidColor(RGBA::new(0, 0, 0, 255));
            self.paint_coverage(&coverage, &black, 255, acquired_nodes, viewport)?;
        } else {
            let paint = span.fill_paint.to_user_space(&bbox, viewport, values);
            self.paint_coverage(&coverage, &paint, span.fill_opacity, acquired_nodes, viewport)?;
        }

        Ok(bbox)
    }

    /// Renders a node into a new surface of the output's size, for `feImage`.
    pub fn draw_node_to_surface(
        &mut self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
    ) -> Result<SharedImageSurface, RenderingError> {
        let mut ctx = self.nested(self.width(), self.height())?;
        ctx.draw_node_from_stack(node, acquired_nodes, cascaded, viewport, false)?;
        Ok(ctx.into_surface().share())
    }

    /// A surface filled with a paint server, for the `FillPaint` and `StrokePaint` filter
    /// inputs.
    pub fn get_paint_source_surface(
        &mut self,
        paint: &UserSpacePaintSource,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
    ) -> Result<SharedImageSurface, RenderingError> {
        let mut ctx = self.nested(self.width(), self.height())?;
        let coverage = Coverage::full(ctx.surface.rect());
        ctx.paint_coverage(&coverage, paint, 255, acquired_nodes, viewport)?;
        Ok(ctx.into_surface().share())
    }

    /// Draws the element referenced by a `use`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_from_use_node(
        &mut self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        values: &State,
        use_rect: Rect,
        link: &str,
        clipping: bool,
        viewport: &Viewport,
    ) -> Result<BoundingBox, RenderingError> {
        // <use> always references another element, potentially itself or one of its
        // ancestors, so it acquires itself to catch circular references.
        let _self_acquired = match acquired_nodes.acquire_ref(node) {
            Ok(n) => n,
            Err(_) => {
                rsvg_log!("circular reference in element {}", node);
                return Ok(viewport.empty_bbox());
            }
        };

        let acquired = match acquired_nodes.acquire(link) {
            Ok(acquired) => acquired,

            Err(AcquireError::MaxReferencesExceeded) => {
                return Err(AcquireError::MaxReferencesExceeded.into());
            }

            Err(e) => {
                rsvg_log!("element {} references an unusable element: {}", node, e);
                return Ok(viewport.empty_bbox());
            }
        };

        // width or height set to 0 disables rendering of the element
        if use_rect.is_empty() || use_rect.width() < 0.0 || use_rect.height() < 0.0 {
            return Ok(viewport.empty_bbox());
        }

        let child = acquired.get();

        if clipping && !element_can_be_used_inside_use_inside_clip_path(&child.borrow_element()) {
            return Ok(viewport.empty_bbox());
        }

        let defines_a_viewport = if is_element_of_type!(child, Symbol) {
            let symbol = borrow_element_as!(child, Symbol);
            Some((symbol.get_viewbox(), symbol.get_preserve_aspect_ratio()))
        } else if is_element_of_type!(child, Svg) {
            let svg = borrow_element_as!(child, Svg);
            Some((svg.get_viewbox(), svg.get_preserve_aspect_ratio()))
        } else {
            None
        };

        let dpi = viewport.dpi;
        let use_element = node.borrow_element();

        if let Some((vbox, preserve_aspect_ratio)) = defines_a_viewport {
            let stacking_ctx =
                StackingContext::new(acquired_nodes, &use_element, values.transform, values);

            self.with_discrete_layer(
                &stacking_ctx,
                acquired_nodes,
                viewport,
                values,
                clipping,
                &mut |an, dc, viewport| {
                    let new_viewport =
                        match viewport.with_new_viewport(vbox, &use_rect, preserve_aspect_ratio) {
                            Some(v) => v,
                            None => return Ok(viewport.empty_bbox()),
                        };

                    let cascaded = CascadedValues::new_from_values(child, values, dpi);

                    let mut bbox = viewport.empty_bbox();
                    // symbol and svg clip their content to the viewport
                    let child_bbox = dc.with_clip_rect(Some(&use_rect), &viewport.transform, &mut |dc| {
                        child.draw_children(an, &cascaded, &new_viewport, dc, clipping)
                    })?;
                    bbox.insert(&child_bbox);
                    Ok(bbox)
                },
            )
        } else {
            let transform = values.transform.pre_translate(use_rect.x0, use_rect.y0);
            let stacking_ctx = StackingContext::new(acquired_nodes, &use_element, transform, values);

            self.with_discrete_layer(
                &stacking_ctx,
                acquired_nodes,
                viewport,
                values,
                clipping,
                &mut |an, dc, viewport| {
                    let cascaded = CascadedValues::new_from_values(child, values, dpi);
                    let mut bbox = viewport.empty_bbox();
                    let child_bbox = dc.draw_node_from_stack(child, an, &cascaded, viewport, clipping)?;
                    bbox.insert(&child_bbox);
                    Ok(bbox)
                },
            )
        }
    }
}

fn intersect_clip(clip: Option<&Coverage>, coverage: Coverage) -> Coverage {
    match clip {
        Some(c) => c.intersect(&coverage),
        None => coverage,
    }
}

pub fn rgba_to_pixel(rgba: RGBA) -> Pixel {
    Pixel::new(rgba.red, rgba.green, rgba.blue, rgba.alpha).premultiply()
}

/// Samples a premultiplied surface with bilinear interpolation; `(u, v)` are in pixel
/// units, with pixel centers at half-integers.  Coordinates outside the surface clamp to
/// its edges.
pub(crate) fn sample_bilinear(surface: &SharedImageSurface, u: f64, v: f64) -> Pixel {
    let max_x = f64::from(surface.width() - 1);
    let max_y = f64::from(surface.height() - 1);

    let u = (u - 0.5).max(0.0).min(max_x);
    let v = (v - 0.5).max(0.0).min(max_y);

    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;

    let x1 = (x0 + 1.0).min(max_x);
    let y1 = (y0 + 1.0).min(max_y);

    let p = |x: f64, y: f64| surface.get_pixel(x as u32, y as u32);
    let (p00, p10, p01, p11) = (p(x0, y0), p(x1, y0), p(x0, y1), p(x1, y1));

    let lerp = |a: u8, b: u8, c: u8, d: u8| {
        let top = f64::from(a) * (1.0 - fx) + f64::from(b) * fx;
        let bottom = f64::from(c) * (1.0 - fx) + f64::from(d) * fx;
        (top * (1.0 - fy) + bottom * fy + 0.5) as u8
    };

    Pixel {
        r: lerp(p00.r, p10.r, p01.r, p11.r),
        g: lerp(p00.g, p10.g, p01.g, p11.g),
        b: lerp(p00.b, p10.b, p01.b, p11.b),
        a: lerp(p00.a, p10.a, p01.a, p11.a),
    }
}

// https://www.w3.org/TR/css-masking-1/#ClipPathElement
fn element_can_be_used_inside_clip_path(element: &Element) -> bool {
    use crate::element::ElementData::*;

    matches!(
        element.element_data,
        Circle(_)
            | Ellipse(_)
            | Line(_)
            | Path(_)
            | Polygon(_)
            | Polyline(_)
            | Rect(_)
            | Text(_)
            | Use(_)
    )
}

// https://www.w3.org/TR/css-masking-1/#ClipPathElement
fn element_can_be_used_inside_use_inside_clip_path(element: &Element) -> bool {
    use crate::element::ElementData::*;

    matches!(
        element.element_data,
        Circle(_) | Ellipse(_) | Line(_) | Path(_) | Polygon(_) | Polyline(_) | Rect(_) | Text(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use float_cmp::approx_eq;

    fn ctx(w: i32, h: i32) -> DrawingCtx {
        DrawingCtx::new(w, h, Rc::new(RenderingConfig::default())).unwrap()
    }

    #[test]
    fn viewport_normalizes_against_units() {
        let vp = Viewport::new(Dpi::default(), 200.0, 100.0, Transform::identity());
        let values = State::default();

        let params = vp.normalize_params(&values);
        assert!(approx_eq!(f64, params.vbox_width, 200.0));
        assert!(approx_eq!(f64, params.vbox_height, 100.0));

        let params = vp.with_units(CoordUnits::ObjectBoundingBox).normalize_params(&values);
        assert!(approx_eq!(f64, params.vbox_width, 1.0));
    }

    #[test]
    fn singular_transforms_are_rejected() {
        let vp = Viewport::new(Dpi::default(), 10.0, 10.0, Transform::identity());
        assert_eq!(
            vp.with_composed_transform(Transform::new_scale(0.0, 1.0)).unwrap_err(),
            RenderingError::InvalidTransform
        );

        let scaled = vp.with_composed_transform(Transform::new_scale(2.0, 2.0)).unwrap();
        assert_eq!(scaled.transform.transform_point(1.0, 1.0), (2.0, 2.0));
    }

    #[test]
    fn new_viewport_maps_view_box() {
        let vp = Viewport::new(Dpi::default(), 100.0, 100.0, Transform::identity());
        let inner = vp
            .with_new_viewport(
                Some(ViewBox::from(Rect::from_size(10.0, 10.0))),
                &Rect::from_xywh(10.0, 10.0, 50.0, 50.0),
                AspectRatio::default(),
            )
            .unwrap();

        assert_eq!(inner.transform.transform_point(10.0, 10.0), (60.0, 60.0));
        assert!(approx_eq!(f64, inner.vbox.width(), 10.0));

        assert!(vp
            .with_new_viewport(None, &Rect::from_xywh(0.0, 0.0, 0.0, 10.0), AspectRatio::default())
            .is_none());
    }

    #[test]
    fn layers_are_balanced() {
        let mut dc = ctx(4, 4);
        dc.push_layer().unwrap();
        dc.surface.fill(Pixel::new(255, 0, 0, 255));
        let layer = dc.pop_layer().unwrap();

        assert_eq!(layer.get_pixel(0, 0), Pixel::new(255, 0, 0, 255));
        assert_eq!(dc.surface().get_pixel(0, 0), Pixel::new(0, 0, 0, 0));
        assert!(dc.pop_layer().is_err());
    }

    #[test]
    fn paint_respects_clip() {
        let doc = Document::new();
        let mut acquired = AcquiredNodes::new(&doc);
        let mut dc = ctx(4, 4);
        let vp = Viewport::new(Dpi::default(), 4.0, 4.0, Transform::identity());

        let clip = dc.rect_coverage(&Rect::from_xywh(0.0, 0.0, 2.0, 4.0), &Transform::identity());
        dc.clip = Some(Rc::new(clip));

        let coverage = Coverage::full(IRect::from_size(4, 4));
        let red = UserSpacePaintSource::SolidColor(RGBA::new(255, 0, 0, 255));
        dc.paint_coverage(&coverage, &red, 255, &mut acquired, &vp).unwrap();

        assert_eq!(dc.surface().get_pixel(1, 1), Pixel::new(255, 0, 0, 255));
        assert_eq!(dc.surface().get_pixel(3, 1), Pixel::new(0, 0, 0, 0));
    }

    #[test]
    fn bilinear_sampling_at_pixel_centers_is_exact() {
        let mut surface = ExclusiveImageSurface::new(2, 1).unwrap();
        surface.set_pixel(0, 0, Pixel::new(0, 0, 0, 255));
        surface.set_pixel(1, 0, Pixel::new(200, 200, 200, 255));
        let surface = surface.share();

        assert_eq!(sample_bilinear(&surface, 0.5, 0.5), Pixel::new(0, 0, 0, 255));
        assert_eq!(sample_bilinear(&surface, 1.5, 0.5), Pixel::new(200, 200, 200, 255));
        assert_eq!(sample_bilinear(&surface, 1.0, 0.5), Pixel::new(100, 100, 100, 255));
        assert_eq!(sample_bilinear(&surface, -5.0, 0.5), Pixel::new(0, 0, 0, 255));
    }
}
