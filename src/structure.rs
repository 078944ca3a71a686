//! Structural elements in SVG: the `g`, `switch`, `svg`, `use`, `symbol`, `clip_path`, `mask`, `link` elements.

use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::aspect_ratio::*;
use crate::bbox::BoundingBox;
use crate::coord_units;
use crate::coord_units::CoordUnits;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::{set_attribute, ElementTrait};
use crate::error::*;
use crate::iri::fragment_id;
use crate::layout::StackingContext;
use crate::length::*;
use crate::node::{CascadedValues, Node, NodeBorrow, NodeDraw};
use crate::parsers::ParseValue;
use crate::rect::Rect;
use crate::viewbox::*;
use crate::xml::Attributes;

/// Draws the children of `node` as a group, with the node's own transform, opacity,
/// clipping, masking and filter.
fn draw_as_group(
    node: &Node,
    acquired_nodes: &mut AcquiredNodes<'_>,
    cascaded: &CascadedValues<'_>,
    viewport: &Viewport,
    draw_ctx: &mut DrawingCtx,
    clipping: bool,
) -> Result<BoundingBox, RenderingError> {
    let values = cascaded.get();

    let stacking_ctx = {
        let elt = node.borrow_element();
        StackingContext::new(acquired_nodes, &elt, values.transform, values)
    };

    draw_ctx.with_discrete_layer(
        &stacking_ctx,
        acquired_nodes,
        viewport,
        values,
        clipping,
        &mut |an, dc, viewport| node.draw_children(an, cascaded, viewport, dc, clipping),
    )
}

#[derive(Default)]
pub struct Group();

impl ElementTrait for Group {
    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        draw_as_group(node, acquired_nodes, cascaded, viewport, draw_ctx, clipping)
    }
}

/// A no-op node that does not render anything
///
/// Sometimes we just need a node that can contain children, but doesn't
/// render itself or its children.  This is just that kind of node.
#[derive(Default)]
pub struct NonRendering;

impl ElementTrait for NonRendering {}

/// The `<switch>` element: renders only its first child whose conditional processing
/// attributes evaluate to true.
#[derive(Default)]
pub struct Switch();

impl ElementTrait for Switch {
    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let values = cascaded.get();

        let stacking_ctx = {
            let elt = node.borrow_element();
            StackingContext::new(acquired_nodes, &elt, values.transform, values)
        };

        draw_ctx.with_discrete_layer(
            &stacking_ctx,
            acquired_nodes,
            viewport,
            values,
            clipping,
            &mut |an, dc, viewport| {
                let child = node.children().filter(|c| c.is_element()).find(|c| {
                    let elt = c.borrow_element();
                    elt.is_renderable() && elt.get_cond(dc.user_languages())
                });

                if let Some(child) = child {
                    dc.draw_node_from_stack(
                        &child,
                        an,
                        &CascadedValues::clone_with_node(cascaded, &child),
                        viewport,
                        clipping,
                    )
                } else {
                    Ok(viewport.empty_bbox())
                }
            },
        )
    }
}

/// Intrinsic dimensions of an SVG document fragment: its `width`/`height` attributes
/// and its `viewBox`.
///
/// `width` and `height` are `None` when they are not specified.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IntrinsicDimensions {
    pub width: Option<ULength<Horizontal>>,
    pub height: Option<ULength<Vertical>>,
    pub vbox: Option<ViewBox>,
    pub preserve_aspect_ratio: AspectRatio,
}

/// The `<svg>` element.
#[derive(Default)]
pub struct Svg {
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: Option<ULength<Horizontal>>,
    height: Option<ULength<Vertical>>,
    preserve_aspect_ratio: AspectRatio,
    vbox: Option<ViewBox>,
}

impl Svg {
    pub fn get_intrinsic_dimensions(&self) -> IntrinsicDimensions {
        IntrinsicDimensions {
            width: self.width,
            height: self.height,
            vbox: self.vbox,
            preserve_aspect_ratio: self.preserve_aspect_ratio,
        }
    }

    pub fn get_viewbox(&self) -> Option<ViewBox> {
        self.vbox
    }

    pub fn get_preserve_aspect_ratio(&self) -> AspectRatio {
        self.preserve_aspect_ratio
    }

    /// The rectangle of a nested `<svg>`, in its parent's user space.
    ///
    /// A missing `width` or `height` is 100%.
    fn get_viewport_rect(&self, params: &NormalizeParams) -> Rect {
        let x = self.x.normalize(params);
        let y = self.y.normalize(params);

        let w = self
            .width
            .unwrap_or_else(|| ULength::new(1.0, LengthUnit::Percent))
            .normalize(params);
        let h = self
            .height
            .unwrap_or_else(|| ULength::new(1.0, LengthUnit::Percent))
            .normalize(params);

        Rect::new(x, y, x + w, y + h)
    }
}

impl ElementTrait for Svg {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                expanded_name!("", "preserveAspectRatio") => {
                    set_attribute(&mut self.preserve_aspect_ratio, attr.parse(value))
                }
                expanded_name!("", "viewBox") => set_attribute(&mut self.vbox, attr.parse(value)),
                _ => (),
            }
        }
    }

    /// The outermost `<svg>` is drawn in the viewport that the caller negotiated; a nested
    /// one establishes a new viewport and clips its content to it.
    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        if node.parent().is_none() {
            return draw_as_group(node, acquired_nodes, cascaded, viewport, draw_ctx, clipping);
        }

        let values = cascaded.get();
        let rect = self.get_viewport_rect(&viewport.normalize_params(values));

        let stacking_ctx = {
            let elt = node.borrow_element();
            StackingContext::new(acquired_nodes, &elt, values.transform, values)
        };

        draw_ctx.with_discrete_layer(
            &stacking_ctx,
            acquired_nodes,
            viewport,
            values,
            clipping,
            &mut |an, dc, viewport| {
                let new_viewport =
                    match viewport.with_new_viewport(self.vbox, &rect, self.preserve_aspect_ratio) {
                        Some(v) => v,
                        None => return Ok(viewport.empty_bbox()),
                    };

                let mut bbox = viewport.empty_bbox();
                let child_bbox = dc.with_clip_rect(Some(&rect), &viewport.transform, &mut |dc| {
                    node.draw_children(an, cascaded, &new_viewport, dc, clipping)
                })?;
                bbox.insert(&child_bbox);
                Ok(bbox)
            },
        )
    }
}

pub struct Use {
    link: Option<String>,
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: ULength<Horizontal>,
    height: ULength<Vertical>,
}

impl Use {
    fn get_rect(&self, params: &NormalizeParams) -> Rect {
        let x = self.x.normalize(params);
        let y = self.y.normalize(params);
        let w = self.width.normalize(params);
        let h = self.height.normalize(params);

        Rect::new(x, y, x + w, y + h)
    }
}

impl Default for Use {
    fn default() -> Use {
        Use {
            link: None,
            x: Default::default(),
            y: Default::default(),
            width: ULength::<Horizontal>::new(1.0, LengthUnit::Percent),
            height: ULength::<Vertical>::new(1.0, LengthUnit::Percent),
        }
    }
}

impl ElementTrait for Use {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.link = attrs.get_href().and_then(fragment_id).map(String::from);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                _ => (),
            }
        }
    }

    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        if let Some(link) = self.link.as_ref() {
            let values = cascaded.get();
            let params = viewport.normalize_params(values);
            let rect = self.get_rect(&params);

            draw_ctx.draw_from_use_node(
                node,
                acquired_nodes,
                values,
                rect,
                link,
                clipping,
                viewport,
            )
        } else {
            Ok(viewport.empty_bbox())
        }
    }
}

#[derive(Default)]
pub struct Symbol {
    preserve_aspect_ratio: AspectRatio,
    vbox: Option<ViewBox>,
}

impl Symbol {
    pub fn get_viewbox(&self) -> Option<ViewBox> {
        self.vbox
    }

    pub fn get_preserve_aspect_ratio(&self) -> AspectRatio {
        self.preserve_aspect_ratio
    }
}

impl ElementTrait for Symbol {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "preserveAspectRatio") => {
                    set_attribute(&mut self.preserve_aspect_ratio, attr.parse(value))
                }
                expanded_name!("", "viewBox") => set_attribute(&mut self.vbox, attr.parse(value)),
                _ => (),
            }
        }
    }
}

coord_units!(ClipPathUnits, CoordUnits::UserSpaceOnUse);

#[derive(Default)]
pub struct ClipPath {
    units: ClipPathUnits,
}

impl ClipPath {
    pub fn get_units(&self) -> CoordUnits {
        CoordUnits::from(self.units)
    }
}

impl ElementTrait for ClipPath {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            if attr.expanded() == expanded_name!("", "clipPathUnits") {
                set_attribute(&mut self.units, attr.parse(value));
            }
        }
    }
}

coord_units!(MaskUnits, CoordUnits::ObjectBoundingBox);
coord_units!(MaskContentUnits, CoordUnits::UserSpaceOnUse);

pub struct Mask {
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: ULength<Horizontal>,
    height: ULength<Vertical>,

    units: MaskUnits,
    content_units: MaskContentUnits,
}

impl Default for Mask {
    fn default() -> Mask {
        Mask {
            // these values are the SVG 1.1 defaults
            x: Length::<Horizontal>::new(-0.1, LengthUnit::Percent),
            y: Length::<Vertical>::new(-0.1, LengthUnit::Percent),
            width: ULength::<Horizontal>::new(1.2, LengthUnit::Percent),
            height: ULength::<Vertical>::new(1.2, LengthUnit::Percent),

            units: MaskUnits::default(),
            content_units: MaskContentUnits::default(),
        }
    }
}

impl Mask {
    pub fn get_units(&self) -> CoordUnits {
        CoordUnits::from(self.units)
    }

    pub fn get_content_units(&self) -> CoordUnits {
        CoordUnits::from(self.content_units)
    }

    pub fn get_rect(&self, params: &NormalizeParams) -> Rect {
        let x = self.x.normalize(params);
        let y = self.y.normalize(params);
        let w = self.width.normalize(params);
        let h = self.height.normalize(params);

        Rect::new(x, y, x + w, y + h)
    }
}

impl ElementTrait for Mask {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                expanded_name!("", "maskUnits") => set_attribute(&mut self.units, attr.parse(value)),
                expanded_name!("", "maskContentUnits") => {
                    set_attribute(&mut self.content_units, attr.parse(value))
                }
                _ => (),
            }
        }
    }
}

/// The `<a>` element.  Links are not followed; the element renders like a group.
#[derive(Default)]
pub struct Link {
    pub link: Option<String>,
}

impl ElementTrait for Link {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.link = attrs.get_href().map(String::from);
    }

    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        draw_as_group(node, acquired_nodes, cascaded, viewport, draw_ctx, clipping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever::{LocalName, QualName};

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        let names: Vec<QualName> = pairs
            .iter()
            .map(|(n, _)| QualName::new(None, ns!(), LocalName::from(*n)))
            .collect();

        Attributes::from_pairs(names.iter().zip(pairs.iter().map(|(_, v)| *v))).unwrap()
    }

    fn params() -> NormalizeParams {
        NormalizeParams::new(Dpi::default(), 200.0, 100.0, 12.0)
    }

    #[test]
    fn mask_rect_defaults_to_bbox_margin() {
        let mask = Mask::default();
        let r = mask.get_rect(&NormalizeParams::new(Dpi::default(), 1.0, 1.0, 12.0));

        assert!(r.approx_eq(&Rect::new(-0.1, -0.1, 1.1, 1.1)));
        assert_eq!(mask.get_units(), CoordUnits::ObjectBoundingBox);
        assert_eq!(mask.get_content_units(), CoordUnits::UserSpaceOnUse);
    }

    #[test]
    fn mask_units_are_parsed() {
        let mut mask = Mask::default();
        mask.set_attributes(&attrs(&[
            ("maskUnits", "userSpaceOnUse"),
            ("maskContentUnits", "objectBoundingBox"),
            ("width", "50"),
        ]));

        assert_eq!(mask.get_units(), CoordUnits::UserSpaceOnUse);
        assert_eq!(mask.get_content_units(), CoordUnits::ObjectBoundingBox);
        assert_eq!(mask.get_rect(&params()).width(), 50.0);
    }

    #[test]
    fn clip_path_units_default_to_user_space() {
        let mut clip = ClipPath::default();
        assert_eq!(clip.get_units(), CoordUnits::UserSpaceOnUse);

        clip.set_attributes(&attrs(&[("clipPathUnits", "objectBoundingBox")]));
        assert_eq!(clip.get_units(), CoordUnits::ObjectBoundingBox);

        clip.set_attributes(&attrs(&[("clipPathUnits", "bogus")]));
        assert_eq!(clip.get_units(), CoordUnits::ObjectBoundingBox);
    }

    #[test]
    fn use_takes_fragment_and_rect() {
        let mut u = Use::default();
        u.set_attributes(&attrs(&[
            ("href", "#target"),
            ("x", "10"),
            ("y", "20"),
            ("width", "5"),
        ]));

        assert_eq!(u.link.as_deref(), Some("target"));

        let r = u.get_rect(&params());
        assert!(r.approx_eq(&Rect::new(10.0, 20.0, 15.0, 120.0)));
    }

    #[test]
    fn use_without_fragment_has_no_link() {
        let mut u = Use::default();
        u.set_attributes(&attrs(&[("href", "other.svg")]));
        assert!(u.link.is_none());
    }

    #[test]
    fn nested_svg_viewport_defaults_to_full_size() {
        let mut svg = Svg::default();
        svg.set_attributes(&attrs(&[("x", "5"), ("viewBox", "0 0 10 10")]));

        let r = svg.get_viewport_rect(&params());
        assert!(r.approx_eq(&Rect::new(5.0, 0.0, 205.0, 100.0)));

        let dims = svg.get_intrinsic_dimensions();
        assert!(dims.width.is_none());
        assert_eq!(dims.vbox, Some(ViewBox::from(Rect::from_size(10.0, 10.0))));
    }

    #[test]
    fn invalid_svg_size_is_ignored() {
        let mut svg = Svg::default();
        svg.set_attributes(&attrs(&[("width", "-5"), ("height", "30mm")]));

        let dims = svg.get_intrinsic_dimensions();
        assert!(dims.width.is_none());
        assert_eq!(dims.height, Some(ULength::new(30.0, LengthUnit::Mm)));
    }
}
