//! Entry point for the filters infrastructure.

use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};
use std::time::Instant;

use crate::bbox::BoundingBox;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::{set_attribute, ElementTrait};
use crate::error::{ParseError, RenderingError};
use crate::filter::{extract_filter_spec, UserSpaceFilter};
use crate::length::*;
use crate::node::Node;
use crate::parse_identifiers;
use crate::parsers::{CustomIdent, Parse, ParseValue};
use crate::rsvg_log;
use crate::state::{Paint, State};
use crate::surface_utils::{shared_surface::SharedImageSurface, EdgeMode};
use crate::xml::Attributes;

mod bounds;
use self::bounds::BoundsBuilder;

pub mod context;
use self::context::{FilterContext, FilterOutput};

mod error;
use self::error::FilterError;
pub use self::error::FilterResolveError;

/// A filter primitive interface.
pub trait FilterEffect: ElementTrait {
    fn resolve(
        &self,
        acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError>;
}

/// Implements [`FilterEffect`] for a primitive whose parameters come only from its own
/// attributes, stored in `base` and `params` fields.
macro_rules! resolve_from_attributes {
    ($element:ident, $variant:ident) => {
        impl $crate::filters::FilterEffect for $element {
            fn resolve(
                &self,
                _acquired_nodes: &mut $crate::document::AcquiredNodes<'_>,
                _node: &$crate::node::Node,
            ) -> Result<Vec<$crate::filters::ResolvedPrimitive>, $crate::filters::FilterResolveError> {
                use $crate::filters::{PrimitiveParams, ResolvedPrimitive};

                Ok(vec![ResolvedPrimitive {
                    primitive: self.base.clone(),
                    params: PrimitiveParams::$variant(self.params.clone()),
                }])
            }
        }
    };
}

pub mod blend;
pub mod color_matrix;
pub mod component_transfer;
pub mod composite;
pub mod convolve_matrix;
pub mod displacement_map;
pub mod flood;
pub mod gaussian_blur;
pub mod image;
pub mod lighting;
pub mod merge;
pub mod morphology;
pub mod offset;
pub mod tile;
pub mod turbulence;
pub mod unknown;

/// Parameters to apply the primitives of a `<filter>` element onto a surface.
pub struct FilterSpec {
    /// Human-readable identifier for the filter, for logging.
    pub name: String,

    /// Coordinates and bounds.
    pub user_space_filter: UserSpaceFilter,

    /// List of filter primitives to apply to the surface, in order.
    pub primitives: Vec<UserSpacePrimitive>,
}

/// Immutable values used while rendering one filter.
///
/// The images for the standard inputs other than `SourceGraphic` are only computed
/// when a primitive asks for them; see [`InputRequirements`].
pub struct FilterPlan {
    /// Current viewport at the time the filter is invoked.
    pub viewport: Viewport,

    /// Snapshot of what is already drawn below the element, for `in="BackgroundImage"`.
    background_image: Option<SharedImageSurface>,

    /// Surface filled with the current stroke paint, for `in="StrokePaint"`.
    stroke_paint_image: Option<SharedImageSurface>,

    /// Surface filled with the current fill paint, for `in="FillPaint"`.
    fill_paint_image: Option<SharedImageSurface>,
}

impl FilterPlan {
    pub fn new(
        requirements: &InputRequirements,
        values: &State,
        acquired_nodes: &mut AcquiredNodes<'_>,
        draw_ctx: &mut DrawingCtx,
        viewport: &Viewport,
        node_bbox: &BoundingBox,
    ) -> Result<FilterPlan, RenderingError> {
        let background_image =
            if requirements.needs_background_image || requirements.needs_background_alpha {
                Some(draw_ctx.surface().clone().share())
            } else {
                None
            };

        let mut paint_image = |paint: &Paint| -> Result<SharedImageSurface, RenderingError> {
            let source = paint
                .resolve(acquired_nodes, values.color)?
                .to_user_space(node_bbox, viewport, values);

            draw_ctx.get_paint_source_surface(&source, acquired_nodes, viewport)
        };

        let stroke_paint_image = if requirements.needs_stroke_paint_image {
            Some(paint_image(&values.stroke)?)
        } else {
            None
        };

        let fill_paint_image = if requirements.needs_fill_paint_image {
            Some(paint_image(&values.fill)?)
        } else {
            None
        };

        Ok(FilterPlan {
            viewport: *viewport,
            background_image,
            stroke_paint_image,
            fill_paint_image,
        })
    }
}

/// Which surfaces need to be provided as inputs for a [`FilterPlan`].
#[derive(Debug, Default, PartialEq)]
pub struct InputRequirements {
    pub needs_source_alpha: bool,
    pub needs_background_image: bool,
    pub needs_background_alpha: bool,
    pub needs_stroke_paint_image: bool,
    pub needs_fill_paint_image: bool,
}

impl InputRequirements {
    pub fn new_from_filter_spec(spec: &FilterSpec) -> InputRequirements {
        spec.primitives
            .iter()
            .map(|primitive| primitive.params.get_input_requirements())
            .fold(InputRequirements::default(), |a, b| a.fold(b))
    }

    #[rustfmt::skip]
    fn fold(self, r: InputRequirements) -> InputRequirements {
        InputRequirements {
            needs_source_alpha:       self.needs_source_alpha       || r.needs_source_alpha,
            needs_background_image:   self.needs_background_image   || r.needs_background_image,
            needs_background_alpha:   self.needs_background_alpha   || r.needs_background_alpha,
            needs_stroke_paint_image: self.needs_stroke_paint_image || r.needs_stroke_paint_image,
            needs_fill_paint_image:   self.needs_fill_paint_image   || r.needs_fill_paint_image,
        }
    }
}

/// A resolved primitive, ready to run on a filter context.
trait RenderPrimitive {
    /// Which of the standard inputs the primitive reads.
    fn input_requirements(&self) -> InputRequirements {
        InputRequirements::default()
    }

    fn render_primitive(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
        acquired_nodes: &mut AcquiredNodes<'_>,
        draw_ctx: &mut DrawingCtx,
    ) -> Result<FilterOutput, FilterError>;
}

/// Primitives that only read their inputs from the filter context.
macro_rules! render_from_inputs {
    ($($ty:path),* $(,)?) => {
        $(
            impl RenderPrimitive for $ty {
                fn input_requirements(&self) -> InputRequirements {
                    self.get_input_requirements()
                }

                fn render_primitive(
                    &self,
                    bounds_builder: BoundsBuilder,
                    ctx: &FilterContext<'_>,
                    _acquired_nodes: &mut AcquiredNodes<'_>,
                    _draw_ctx: &mut DrawingCtx,
                ) -> Result<FilterOutput, FilterError> {
                    self.render(bounds_builder, ctx)
                }
            }
        )*
    };
}

render_from_inputs!(
    blend::Blend,
    color_matrix::ColorMatrix,
    component_transfer::ComponentTransfer,
    composite::Composite,
    convolve_matrix::ConvolveMatrix,
    displacement_map::DisplacementMap,
    gaussian_blur::GaussianBlur,
    lighting::Lighting,
    merge::Merge,
    morphology::Morphology,
    offset::Offset,
    tile::Tile,
    unknown::PassThrough,
);

/// Flood and turbulence generate their output from nothing.
macro_rules! render_without_inputs {
    ($($ty:path),* $(,)?) => {
        $(
            impl RenderPrimitive for $ty {
                fn render_primitive(
                    &self,
                    bounds_builder: BoundsBuilder,
                    ctx: &FilterContext<'_>,
                    _acquired_nodes: &mut AcquiredNodes<'_>,
                    _draw_ctx: &mut DrawingCtx,
                ) -> Result<FilterOutput, FilterError> {
                    self.render(bounds_builder, ctx)
                }
            }
        )*
    };
}

render_without_inputs!(flood::Flood, turbulence::Turbulence);

/// `feImage` draws a referenced element, so it needs the document and a drawing context.
impl RenderPrimitive for image::Image {
    fn render_primitive(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
        acquired_nodes: &mut AcquiredNodes<'_>,
        draw_ctx: &mut DrawingCtx,
    ) -> Result<FilterOutput, FilterError> {
        self.render(bounds_builder, ctx, acquired_nodes, draw_ctx)
    }
}

macro_rules! primitive_params {
    ($($variant:ident($ty:path) => $element_name:literal,)*) => {
        /// Resolved parameters for each filter primitive.
        ///
        /// Besides the element's own attributes, these hold computed property values and
        /// whatever was gathered from child elements, like light sources or merge nodes.
        pub enum PrimitiveParams {
            $($variant($ty),)*
        }

        impl PrimitiveParams {
            /// Element name of the primitive, for logging.
            fn name(&self) -> &'static str {
                match self {
                    $(PrimitiveParams::$variant(_) => $element_name,)*
                }
            }

            fn as_render(&self) -> &dyn RenderPrimitive {
                match self {
                    $(PrimitiveParams::$variant(p) => p,)*
                }
            }

            fn get_input_requirements(&self) -> InputRequirements {
                self.as_render().input_requirements()
            }
        }
    };
}

primitive_params! {
    Blend(blend::Blend) => "feBlend",
    ColorMatrix(color_matrix::ColorMatrix) => "feColorMatrix",
    ComponentTransfer(component_transfer::ComponentTransfer) => "feComponentTransfer",
    Composite(composite::Composite) => "feComposite",
    ConvolveMatrix(convolve_matrix::ConvolveMatrix) => "feConvolveMatrix",
    DiffuseLighting(lighting::Lighting) => "feDiffuseLighting",
    DisplacementMap(displacement_map::DisplacementMap) => "feDisplacementMap",
    Flood(flood::Flood) => "feFlood",
    GaussianBlur(gaussian_blur::GaussianBlur) => "feGaussianBlur",
    Image(image::Image) => "feImage",
    Merge(merge::Merge) => "feMerge",
    Morphology(morphology::Morphology) => "feMorphology",
    Offset(offset::Offset) => "feOffset",
    SpecularLighting(lighting::Lighting) => "feSpecularLighting",
    Tile(tile::Tile) => "feTile",
    Turbulence(turbulence::Turbulence) => "feTurbulence",
    PassThrough(unknown::PassThrough) => "unknown primitive",
}

/// Attributes shared by all filter primitives: the primitive subregion and the name
/// of the result.
#[derive(Default, Clone)]
pub struct Primitive {
    pub x: Option<Length<Horizontal>>,
    pub y: Option<Length<Vertical>>,
    pub width: Option<ULength<Horizontal>>,
    pub height: Option<ULength<Vertical>>,
    pub result: Option<CustomIdent>,
}

/// A primitive element resolved against the tree, with lengths still unnormalized.
pub struct ResolvedPrimitive {
    pub primitive: Primitive,
    pub params: PrimitiveParams,
}

/// A resolved primitive with its subregion in user space.
pub struct UserSpacePrimitive {
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    result: Option<CustomIdent>,

    params: PrimitiveParams,
}

/// Where a primitive takes an image from, as given by `in` or `in2`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub enum Input {
    /// The previous primitive's result, or the source graphic for the first primitive.
    #[default]
    Unspecified,
    SourceGraphic,
    SourceAlpha,
    BackgroundImage,
    BackgroundAlpha,
    FillPaint,
    StrokePaint,

    /// The `result` of an earlier primitive.
    FilterOutput(CustomIdent),
}

impl Input {
    /// Which of the expensive inputs this one needs computed up front.
    pub fn get_requirements(&self) -> InputRequirements {
        let mut reqs = InputRequirements::default();

        let flag = match *self {
            Input::SourceAlpha => &mut reqs.needs_source_alpha,
            Input::BackgroundImage => &mut reqs.needs_background_image,
            Input::BackgroundAlpha => &mut reqs.needs_background_alpha,
            Input::FillPaint => &mut reqs.needs_fill_paint_image,
            Input::StrokePaint => &mut reqs.needs_stroke_paint_image,
            _ => return reqs,
        };
        *flag = true;

        reqs
    }
}

impl Parse for Input {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let keyword = parser.try_parse(|p| {
            parse_identifiers!(
                p,
                "SourceGraphic" => Input::SourceGraphic,
                "SourceAlpha" => Input::SourceAlpha,
                "BackgroundImage" => Input::BackgroundImage,
                "BackgroundAlpha" => Input::BackgroundAlpha,
                "FillPaint" => Input::FillPaint,
                "StrokePaint" => Input::StrokePaint,
            )
        });

        match keyword {
            Ok(input) => Ok(input),
            Err(_) => CustomIdent::parse(parser).map(Input::FilterOutput),
        }
    }
}

impl ResolvedPrimitive {
    pub fn into_user_space(self, params: &NormalizeParams) -> UserSpacePrimitive {
        let ResolvedPrimitive { primitive, params: primitive_params } = self;

        UserSpacePrimitive {
            x: primitive.x.map(|l| l.normalize(params)),
            y: primitive.y.map(|l| l.normalize(params)),
            width: primitive.width.map(|l| l.normalize(params)),
            height: primitive.height.map(|l| l.normalize(params)),
            result: primitive.result,
            params: primitive_params,
        }
    }
}

impl UserSpacePrimitive {
    fn get_bounds(&self, ctx: &FilterContext) -> BoundsBuilder {
        BoundsBuilder::new(self.x, self.y, self.width, self.height, ctx.paffine())
    }
}

impl Primitive {
    /// Reads the subregion and `result`, and returns the raw `in` and `in2` values.
    fn parse_standard_attributes(&mut self, attrs: &Attributes) -> [Input; 2] {
        let mut inputs = [Input::Unspecified, Input::Unspecified];

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "in") => set_attribute(&mut inputs[0], attr.parse(value)),
                expanded_name!("", "in2") => set_attribute(&mut inputs[1], attr.parse(value)),
                expanded_name!("", "result") => set_attribute(&mut self.result, attr.parse(value)),
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                _ => (),
            }
        }

        inputs
    }

    pub fn parse_no_inputs(&mut self, attrs: &Attributes) {
        self.parse_standard_attributes(attrs);
    }

    pub fn parse_one_input(&mut self, attrs: &Attributes) -> Input {
        let [in1, _] = self.parse_standard_attributes(attrs);
        in1
    }

    pub fn parse_two_inputs(&mut self, attrs: &Attributes) -> (Input, Input) {
        let [in1, in2] = self.parse_standard_attributes(attrs);
        (in1, in2)
    }
}

/// Applies the `<filter>` element `filter_node` to `source_surface` and returns the
/// resulting surface.
///
/// `viewport` is the coordinate system of the filtered element, and `node_bbox` its
/// bounding box in that system.  A filter that cannot be applied produces a transparent
/// surface; only exceeded limits are errors.
pub fn render(
    filter_node: &Node,
    values: &State,
    source_surface: SharedImageSurface,
    acquired_nodes: &mut AcquiredNodes<'_>,
    draw_ctx: &mut DrawingCtx,
    viewport: &Viewport,
    node_bbox: &BoundingBox,
) -> Result<SharedImageSurface, RenderingError> {
    let surface_width = source_surface.width();
    let surface_height = source_surface.height();

    let spec = match extract_filter_spec(filter_node, acquired_nodes, viewport) {
        Ok(spec) => spec,
        Err(e) => {
            rsvg_log!("(filter {} is in error: {})", filter_node, e);
            return SharedImageSurface::empty(surface_width, surface_height);
        }
    };

    let requirements = InputRequirements::new_from_filter_spec(&spec);
    let plan = FilterPlan::new(
        &requirements,
        values,
        acquired_nodes,
        draw_ctx,
        viewport,
        node_bbox,
    )?;

    FilterContext::new(&spec.user_space_filter, &plan, source_surface, *node_bbox)
        .and_then(|mut filter_ctx| {
            // the message has an unclosed parenthesis; we'll close it below.
            rsvg_log!(
                "(filter \"{}\" with effects_region={:?}",
                spec.name,
                filter_ctx.effects_region()
            );

            for user_space_primitive in &spec.primitives {
                let start = Instant::now();

                match render_primitive(user_space_primitive, &filter_ctx, acquired_nodes, draw_ctx)
                {
                    Ok(output) => {
                        let elapsed = start.elapsed();
                        rsvg_log!(
                            "(rendered filter primitive {} in {} seconds)",
                            user_space_primitive.params.name(),
                            elapsed.as_secs_f64()
                        );

                        filter_ctx.store_result(user_space_primitive.result.clone(), output);
                    }

                    Err(err) => {
                        rsvg_log!(
                            "(filter primitive {} returned an error: {})",
                            user_space_primitive.params.name(),
                            err
                        );
                        rsvg_log!(")");

                        return Err(err);
                    }
                }
            }

            rsvg_log!(")");

            Ok(filter_ctx.into_output()?)
        })
        .or_else(|err| match err {
            FilterError::Rendering(e) => Err(e),

            // Any other error makes the whole filter render as transparent.
            _ => SharedImageSurface::empty(surface_width, surface_height),
        })
}

fn render_primitive(
    primitive: &UserSpacePrimitive,
    ctx: &FilterContext<'_>,
    acquired_nodes: &mut AcquiredNodes<'_>,
    draw_ctx: &mut DrawingCtx,
) -> Result<FilterOutput, FilterError> {
    primitive.params.as_render().render_primitive(
        primitive.get_bounds(ctx),
        ctx,
        acquired_nodes,
        draw_ctx,
    )
}

impl Parse for EdgeMode {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "duplicate" => EdgeMode::Duplicate,
            "wrap" => EdgeMode::Wrap,
            "none" => EdgeMode::None,
        )?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::rc::Rc;

    use crate::document::Document;
    use crate::drawing_ctx::RenderingConfig;
    use crate::node::NodeBorrow;
    use crate::rect::{IRect, Rect};
    use crate::surface_utils::Pixel;
    use crate::transform::Transform;
    use markup5ever::{LocalName, QualName};

    pub fn qual(name: &str) -> QualName {
        QualName::new(None, ns!(), LocalName::from(name))
    }

    pub fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        let names: Vec<QualName> = pairs.iter().map(|(n, _)| qual(n)).collect();
        Attributes::from_pairs(names.iter().zip(pairs.iter().map(|(_, v)| *v))).unwrap()
    }

    /// Builds a `<filter id="f">` that covers the 10×10 test viewport, with the given
    /// primitives and their children, and cascades the tree.
    pub fn filter_document(primitives: &[(&str, &[(&str, &str)])]) -> Document {
        filter_document_with_children(
            &primitives
                .iter()
                .map(|&(name, a)| (name, a, Vec::new()))
                .collect::<Vec<PrimitiveDecl<'_>>>(),
        )
    }

    pub type PrimitiveDecl<'a> = (&'a str, &'a [(&'a str, &'a str)], Vec<(&'a str, &'a [(&'a str, &'a str)])>);

    pub fn filter_document_with_children(primitives: &[PrimitiveDecl<'_>]) -> Document {
        let mut doc = Document::new();
        let mut root = doc
            .append_element(&qual("svg"), Attributes::new(), None)
            .unwrap();
        let mut filter = doc
            .append_element(
                &qual("filter"),
                attrs(&[
                    ("id", "f"),
                    ("filterUnits", "userSpaceOnUse"),
                    ("x", "0"),
                    ("y", "0"),
                    ("width", "10"),
                    ("height", "10"),
                ]),
                Some(&mut root),
            )
            .unwrap();

        for (name, a, children) in primitives {
            let mut primitive = doc
                .append_element(&qual(name), attrs(a), Some(&mut filter))
                .unwrap();

            for (child_name, child_attrs) in children {
                doc.append_element(&qual(child_name), attrs(child_attrs), Some(&mut primitive));
            }
        }

        cascade(&doc, &root, &State::default());
        doc
    }

    pub fn cascade(doc: &Document, node: &Node, parent: &State) {
        let values = {
            let mut node = node.clone();
            let mut elt = node.borrow_element_mut();
            elt.cascade(doc.stylesheet(), parent, Dpi::default()).clone()
        };

        for child in node.children().filter(|c| c.is_element()) {
            cascade(doc, &child, &values);
        }
    }

    pub fn viewport() -> Viewport {
        Viewport::new(Dpi::default(), 10.0, 10.0, Transform::identity())
    }

    /// Applies the filter of `doc` to `source`, which must be 10×10.
    pub fn apply(doc: &Document, source: &SharedImageSurface) -> SharedImageSurface {
        let node = doc.lookup_node("f").unwrap();
        let mut acquired_nodes = AcquiredNodes::new(doc);
        let mut draw_ctx = DrawingCtx::new(
            source.width(),
            source.height(),
            Rc::new(RenderingConfig::default()),
        )
        .unwrap();

        render(
            &node,
            &State::default(),
            source.clone(),
            &mut acquired_nodes,
            &mut draw_ctx,
            &viewport(),
            &BoundingBox::new().with_rect(Rect::from_size(10.0, 10.0)),
        )
        .unwrap()
    }

    pub fn apply_primitives(
        primitives: &[(&str, &[(&str, &str)])],
        source: &SharedImageSurface,
    ) -> SharedImageSurface {
        apply(&filter_document(primitives), source)
    }

    /// A 10×10 surface with an opaque `color` square at `rect`.
    pub fn square(rect: IRect, color: Pixel) -> SharedImageSurface {
        SharedImageSurface::flood(10, 10, rect, color).unwrap()
    }

    fn requirements(primitives: &[(&str, &[(&str, &str)])]) -> InputRequirements {
        let doc = filter_document(primitives);
        let node = doc.lookup_node("f").unwrap();
        let mut acquired_nodes = AcquiredNodes::new(&doc);

        let spec = extract_filter_spec(&node, &mut acquired_nodes, &viewport()).unwrap();
        InputRequirements::new_from_filter_spec(&spec)
    }

    #[test]
    fn parses_inputs() {
        assert_eq!(Input::parse_str("SourceAlpha").unwrap(), Input::SourceAlpha);
        assert_eq!(
            Input::parse_str("blurred").unwrap(),
            Input::FilterOutput(CustomIdent("blurred".to_string()))
        );
        assert!(Input::parse_str("").is_err());
    }

    #[test]
    fn detects_source_alpha() {
        assert_eq!(
            requirements(&[("feOffset", &[("in", "SourceAlpha")])]),
            InputRequirements {
                needs_source_alpha: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn detects_all_standard_inputs() {
        assert_eq!(
            requirements(&[
                ("feBlend", &[("in", "BackgroundImage"), ("in2", "BackgroundAlpha")]),
                ("feComposite", &[("in", "FillPaint"), ("in2", "StrokePaint")]),
                ("feFlood", &[]),
            ]),
            InputRequirements {
                needs_source_alpha: false,
                needs_background_image: true,
                needs_background_alpha: true,
                needs_stroke_paint_image: true,
                needs_fill_paint_image: true,
            }
        );
    }

    #[test]
    fn non_primitive_children_are_skipped() {
        let doc = filter_document(&[("feOffset", &[]), ("rect", &[]), ("feFlood", &[])]);
        let node = doc.lookup_node("f").unwrap();
        let mut acquired_nodes = AcquiredNodes::new(&doc);

        let spec = extract_filter_spec(&node, &mut acquired_nodes, &viewport()).unwrap();
        assert_eq!(spec.primitives.len(), 2);
        assert_eq!(spec.name, "f");
    }

    #[test]
    fn empty_filter_is_transparent() {
        let source = square(IRect::from_size(10, 10), Pixel::new(255, 0, 0, 255));
        let output = apply_primitives(&[], &source);
        assert_eq!(output.get_pixel(5, 5), Pixel::default());
    }

    #[test]
    fn failing_primitive_makes_filter_transparent() {
        // feConvolveMatrix without a kernel fails; nothing of the source must remain.
        let source = square(IRect::from_size(10, 10), Pixel::new(255, 0, 0, 255));
        let output = apply_primitives(&[("feOffset", &[]), ("feConvolveMatrix", &[])], &source);
        assert_eq!(output.get_pixel(5, 5), Pixel::default());
    }

    #[test]
    fn named_results_can_be_reused() {
        let source = square(IRect::new(0, 0, 5, 5), Pixel::new(0, 0, 255, 255));
        let output = apply_primitives(
            &[
                ("feOffset", &[("result", "orig")]),
                ("feFlood", &[("flood-color", "red")]),
                ("feOffset", &[("in", "orig"), ("dx", "5")]),
            ],
            &source,
        );

        assert_eq!(output.get_pixel(2, 2), Pixel::default());
        assert_eq!(output.get_pixel(7, 2), Pixel::new(0, 0, 255, 255));
    }

    #[test]
    fn reference_to_non_filter_is_an_error() {
        let mut doc = Document::new();
        let root = doc
            .append_element(&qual("svg"), Attributes::new(), None)
            .unwrap();
        let mut acquired_nodes = AcquiredNodes::new(&doc);

        assert!(matches!(
            extract_filter_spec(&root, &mut acquired_nodes, &viewport()),
            Err(FilterResolveError::ReferenceToNonFilterElement)
        ));
    }
}
