//! Basic SVG shapes: the `path`, `polygon`, `polyline`, `line`,
//! `rect`, `circle`, `ellipse` elements.

use cssparser::{Parser, Token};
use markup5ever::{expanded_name, local_name, namespace_url, ns};
use std::ops::Deref;
use std::rc::Rc;

use crate::bbox::BoundingBox;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::{set_attribute, ElementTrait};
use crate::error::*;
use crate::iri::Iri;
use crate::is_element_of_type;
use crate::layout::{self, StackingContext};
use crate::length::*;
use crate::node::{CascadedValues, Node, NodeBorrow};
use crate::parsers::{optional_comma, Parse, ParseValue};
use crate::path_builder::{LargeArc, Path as SvgPath, PathBuilder, Sweep};
use crate::rsvg_log;
use crate::xml::Attributes;

/// Whether `marker-start`, `marker-mid` and `marker-end` apply to a shape.
#[derive(Copy, Clone, PartialEq)]
enum Markers {
    No,
    Yes,
}

/// A shape's path, ready to be turned into a layout object.
struct ShapeDef {
    path: Rc<SvgPath>,
    markers: Markers,
}

impl ShapeDef {
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

        let markers = match self.markers {
            Markers::Yes => layout::Markers {
                start: acquire_marker(acquired_nodes, &values.marker_start)?,
                mid: acquire_marker(acquired_nodes, &values.marker_mid)?,
                end: acquire_marker(acquired_nodes, &values.marker_end)?,
            },
            Markers::No => layout::Markers::default(),
        };

        let shape = layout::Shape {
            path: Rc::clone(&self.path),
            is_visible: values.is_visible(),
            fill_paint: values.fill.resolve(acquired_nodes, values.color)?,
            fill_opacity: values.fill_opacity,
            fill_rule: values.fill_rule,
            stroke_paint: values.stroke.resolve(acquired_nodes, values.color)?,
            stroke_opacity: values.stroke_opacity,
            clip_rule: values.clip_rule,
            markers,
        };

        let stacking_ctx =
            StackingContext::new(acquired_nodes, &node.borrow_element(), values.transform, values);

        draw_ctx.draw_shape(&shape, &stacking_ctx, acquired_nodes, viewport, values, clipping)
    }
}

/// Looks up a `marker-start`, `marker-mid` or `marker-end` reference.
///
/// A reference to a missing element, or to something that is not a marker, means no
/// marker.
fn acquire_marker(
    acquired_nodes: &mut AcquiredNodes<'_>,
    iri: &Iri,
) -> Result<Option<Node>, RenderingError> {
    let Some(id) = iri.get() else {
        return Ok(None);
    };

    match acquired_nodes.acquire(id) {
        Ok(acquired) if is_element_of_type!(acquired.get(), Marker) => {
            Ok(Some(acquired.get().clone()))
        }

        Ok(_) => {
            rsvg_log!("\"{}\" is not a marker", id);
            Ok(None)
        }

        Err(AcquireError::MaxReferencesExceeded) => {
            Err(AcquireError::MaxReferencesExceeded.into())
        }

        Err(e) => {
            rsvg_log!("ignoring marker: {}", e);
            Ok(None)
        }
    }
}

/// Shapes whose path is built from lengths resolved against the viewport.
trait BasicShape {
    const MARKERS: Markers;

    fn make_path(&self, params: &NormalizeParams) -> SvgPath;
}

/// `ElementTrait::draw` for a [`BasicShape`].
macro_rules! draw_basic_shape {
    () => {
        fn draw(
            &self,
            node: &Node,
            acquired_nodes: &mut AcquiredNodes<'_>,
            cascaded: &CascadedValues<'_>,
            viewport: &Viewport,
            draw_ctx: &mut DrawingCtx,
            clipping: bool,
        ) -> Result<BoundingBox, RenderingError> {
            let params = viewport.normalize_params(cascaded.get());

            let shape = ShapeDef {
                path: Rc::new(self.make_path(&params)),
                markers: Self::MARKERS,
            };

            shape.draw(node, acquired_nodes, cascaded, viewport, draw_ctx, clipping)
        }
    };
}

// 4/3 * (1-cos 45°)/sin 45° = 4/3 * sqrt(2) - 1
const ARC_MAGIC: f64 = 0.5522847498;

/// Approximates an ellipse with four Bézier curves, one per quadrant, going clockwise
/// from the rightmost point.
///
/// Non-positive radii produce an empty path.
fn make_ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> SvgPath {
    const AXES: [(f64, f64); 5] = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0), (1.0, 0.0)];

    let mut builder = PathBuilder::default();

    if !(rx > 0.0 && ry > 0.0) {
        return builder.into_path();
    }

    let at = |(ux, uy): (f64, f64)| (cx + ux * rx, cy + uy * ry);

    builder.move_to(cx + rx, cy);

    for quadrant in AXES.windows(2) {
        let (from, to) = (quadrant[0], quadrant[1]);

        // each control point leans from an end point towards the other axis
        let c1 = at((from.0 + ARC_MAGIC * to.0, from.1 + ARC_MAGIC * to.1));
        let c2 = at((to.0 + ARC_MAGIC * from.0, to.1 + ARC_MAGIC * from.1));
        let end = at(to);

        builder.curve_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
    }

    builder.close_path();

    builder.into_path()
}

/// The `path` element.
#[derive(Default)]
pub struct Path {
    path: Option<Rc<SvgPath>>,
}

impl ElementTrait for Path {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            if attr.expanded() == expanded_name!("", "d") {
                let mut builder = PathBuilder::default();

                // A partial path is rendered up to the error.
                if let Err(e) = builder.parse(value) {
                    rsvg_log!("could not parse path: {}", e);
                }

                self.path = Some(Rc::new(builder.into_path()));
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
        let Some(ref path) = self.path else {
            return Ok(viewport.empty_bbox());
        };

        let shape = ShapeDef {
            path: Rc::clone(path),
            markers: Markers::Yes,
        };

        shape.draw(node, acquired_nodes, cascaded, viewport, draw_ctx, clipping)
    }
}

/// The `points` of a `polyline` or `polygon`.
#[derive(Debug, PartialEq)]
struct Points(Vec<(f64, f64)>);

impl Deref for Points {
    type Target = [(f64, f64)];

    fn deref(&self) -> &[(f64, f64)] {
        &self.0
    }
}

// Coordinates are separated by whitespace and/or a comma; a pair needs at least one
// separator after it, so "1 2-3 4" is an error.
// https://www.w3.org/TR/SVG/shapes.html#PointsBNF
impl Parse for Points {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Points, ParseError<'i>> {
        let mut points = Vec::new();

        loop {
            let x = f64::parse(parser)?;
            optional_comma(parser);
            let y = f64::parse(parser)?;

            points.push((x, y));

            if parser.is_exhausted() {
                return Ok(Points(points));
            }

            let after_space = matches!(parser.next_including_whitespace(), Ok(&Token::WhiteSpace(_)));
            if !after_space {
                optional_comma(parser);
            }
        }
    }
}

fn make_poly(points: Option<&Points>, closed: bool) -> SvgPath {
    let mut builder = PathBuilder::default();

    let points = points.map_or(&[][..], |p| &p[..]);

    if let Some((&(x, y), rest)) = points.split_first() {
        builder.move_to(x, y);

        for &(x, y) in rest {
            builder.line_to(x, y);
        }

        if closed {
            builder.close_path();
        }
    }

    builder.into_path()
}

fn parse_points(attrs: &Attributes) -> Option<Points> {
    let mut points = None;

    for (attr, value) in attrs.iter() {
        if attr.expanded() == expanded_name!("", "points") {
            set_attribute(&mut points, attr.parse(value).map(Some));
        }
    }

    points
}

/// The `polygon` element.
#[derive(Default)]
pub struct Polygon {
    points: Option<Points>,
}

impl BasicShape for Polygon {
    const MARKERS: Markers = Markers::Yes;

    fn make_path(&self, _params: &NormalizeParams) -> SvgPath {
        make_poly(self.points.as_ref(), true)
    }
}

impl ElementTrait for Polygon {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.points = parse_points(attrs);
    }

    draw_basic_shape!();
}

/// The `polyline` element.
#[derive(Default)]
pub struct Polyline {
    points: Option<Points>,
}

impl BasicShape for Polyline {
    const MARKERS: Markers = Markers::Yes;

    fn make_path(&self, _params: &NormalizeParams) -> SvgPath {
        make_poly(self.points.as_ref(), false)
    }
}

impl ElementTrait for Polyline {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.points = parse_points(attrs);
    }

    draw_basic_shape!();
}

/// The `line` element.
#[derive(Default)]
pub struct Line {
    x1: Length<Horizontal>,
    y1: Length<Vertical>,
    x2: Length<Horizontal>,
    y2: Length<Vertical>,
}

impl BasicShape for Line {
    const MARKERS: Markers = Markers::Yes;

    fn make_path(&self, params: &NormalizeParams) -> SvgPath {
        let mut builder = PathBuilder::default();

        builder.move_to(self.x1.normalize(params), self.y1.normalize(params));
        builder.line_to(self.x2.normalize(params), self.y2.normalize(params));

        builder.into_path()
    }
}

impl ElementTrait for Line {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x1") => set_attribute(&mut self.x1, attr.parse(value)),
                expanded_name!("", "y1") => set_attribute(&mut self.y1, attr.parse(value)),
                expanded_name!("", "x2") => set_attribute(&mut self.x2, attr.parse(value)),
                expanded_name!("", "y2") => set_attribute(&mut self.y2, attr.parse(value)),
                _ => (),
            }
        }
    }

    draw_basic_shape!();
}

/// The `rect` element.
#[derive(Default)]
pub struct Rect {
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: ULength<Horizontal>,
    height: ULength<Vertical>,

    /// Corner radii; a missing one takes the value of the other.
    rx: Option<ULength<Horizontal>>,
    ry: Option<ULength<Vertical>>,
}

impl Rect {
    /// Resolved corner radii, clamped to half the size; a zero radius in either
    /// direction means square corners.
    fn corner_radii(&self, params: &NormalizeParams, w: f64, h: f64) -> (f64, f64) {
        let (rx, ry) = match (self.rx, self.ry) {
            (None, None) => return (0.0, 0.0),
            (Some(rx), None) => (rx, rx.to_other::<Vertical, Unsigned>()),
            (None, Some(ry)) => (ry.to_other::<Horizontal, Unsigned>(), ry),
            (Some(rx), Some(ry)) => (rx, ry),
        };

        let rx = rx.normalize(params).min(w / 2.0);
        let ry = ry.normalize(params).min(h / 2.0);

        if rx == 0.0 || ry == 0.0 {
            (0.0, 0.0)
        } else {
            (rx, ry)
        }
    }
}

impl BasicShape for Rect {
    const MARKERS: Markers = Markers::No;

    fn make_path(&self, params: &NormalizeParams) -> SvgPath {
        let x = self.x.normalize(params);
        let y = self.y.normalize(params);
        let w = self.width.normalize(params);
        let h = self.height.normalize(params);

        let mut builder = PathBuilder::default();

        if !(w > 0.0 && h > 0.0) {
            return builder.into_path();
        }

        let (rx, ry) = self.corner_radii(params, w, h);
        let (left, top, right, bottom) = (x, y, x + w, y + h);

        if rx == 0.0 {
            builder.move_to(left, top);
            builder.line_to(right, top);
            builder.line_to(right, bottom);
            builder.line_to(left, bottom);
        } else {
            // clockwise from the top edge: each side is a straight part followed by the
            // quarter ellipse into the next side
            let sides = [
                ((right - rx, top), (right, top + ry)),
                ((right, bottom - ry), (right - rx, bottom)),
                ((left + rx, bottom), (left, bottom - ry)),
                ((left, top + ry), (left + rx, top)),
            ];

            builder.move_to(left + rx, top);

            for &((lx, ly), (ax, ay)) in &sides {
                builder.line_to(lx, ly);
                builder.arc(lx, ly, rx, ry, 0.0, LargeArc(false), Sweep::Positive, ax, ay);
            }
        }

        builder.close_path();

        builder.into_path()
    }
}

impl ElementTrait for Rect {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                expanded_name!("", "rx") => set_attribute(&mut self.rx, attr.parse(value).map(Some)),
                expanded_name!("", "ry") => set_attribute(&mut self.ry, attr.parse(value).map(Some)),
                _ => (),
            }
        }
    }

    draw_basic_shape!();
}

/// The `circle` element.
#[derive(Default)]
pub struct Circle {
    cx: Length<Horizontal>,
    cy: Length<Vertical>,
    r: ULength<Both>,
}

impl BasicShape for Circle {
    const MARKERS: Markers = Markers::No;

    fn make_path(&self, params: &NormalizeParams) -> SvgPath {
        let r = self.r.normalize(params);
        make_ellipse(self.cx.normalize(params), self.cy.normalize(params), r, r)
    }
}

impl ElementTrait for Circle {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "cx") => set_attribute(&mut self.cx, attr.parse(value)),
                expanded_name!("", "cy") => set_attribute(&mut self.cy, attr.parse(value)),
                expanded_name!("", "r") => set_attribute(&mut self.r, attr.parse(value)),
                _ => (),
            }
        }
    }

    draw_basic_shape!();
}

/// The `ellipse` element.
#[derive(Default)]
pub struct Ellipse {
    cx: Length<Horizontal>,
    cy: Length<Vertical>,
    rx: ULength<Horizontal>,
    ry: ULength<Vertical>,
}

impl BasicShape for Ellipse {
    const MARKERS: Markers = Markers::No;

    fn make_path(&self, params: &NormalizeParams) -> SvgPath {
        make_ellipse(
            self.cx.normalize(params),
            self.cy.normalize(params),
            self.rx.normalize(params),
            self.ry.normalize(params),
        )
    }
}

impl ElementTrait for Ellipse {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "cx") => set_attribute(&mut self.cx, attr.parse(value)),
                expanded_name!("", "cy") => set_attribute(&mut self.cy, attr.parse(value)),
                expanded_name!("", "rx") => set_attribute(&mut self.rx, attr.parse(value)),
                expanded_name!("", "ry") => set_attribute(&mut self.ry, attr.parse(value)),
                _ => (),
            }
        }
    }

    draw_basic_shape!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_builder::PathCommand;
    use crate::state::State;
    use crate::transform::Transform;
    use crate::vpath::{Vpath, FLATNESS};

    fn params() -> NormalizeParams {
        NormalizeParams::new(Dpi::default(), 100.0, 100.0, State::default().font_size)
    }

    fn rect(pairs: &[(&str, &str)]) -> Rect {
        let names: Vec<markup5ever::QualName> = pairs
            .iter()
            .map(|(n, _)| markup5ever::QualName::new(None, ns!(), markup5ever::LocalName::from(*n)))
            .collect();
        let attrs = Attributes::from_pairs(names.iter().zip(pairs.iter().map(|(_, v)| *v))).unwrap();

        let mut r = Rect::default();
        r.set_attributes(&attrs);
        r
    }

    #[test]
    fn parses_points() {
        assert_eq!(Points::parse_str(" 1 2 "), Ok(Points(vec![(1.0, 2.0)])));
        assert_eq!(
            Points::parse_str("1 2 3 4"),
            Ok(Points(vec![(1.0, 2.0), (3.0, 4.0)]))
        );
        assert_eq!(
            Points::parse_str("1,2,3,4"),
            Ok(Points(vec![(1.0, 2.0), (3.0, 4.0)]))
        );
        assert_eq!(
            Points::parse_str("1,2 3,4"),
            Ok(Points(vec![(1.0, 2.0), (3.0, 4.0)]))
        );
        assert_eq!(
            Points::parse_str("1,2 -3,4"),
            Ok(Points(vec![(1.0, 2.0), (-3.0, 4.0)]))
        );
        assert_eq!(
            Points::parse_str("1,2,-3,4"),
            Ok(Points(vec![(1.0, 2.0), (-3.0, 4.0)]))
        );
    }

    #[test]
    fn errors_on_invalid_points() {
        assert!(Points::parse_str("-1-2-3-4").is_err());
        assert!(Points::parse_str("1 2-3,-4").is_err());
    }

    #[test]
    fn square_rect_is_a_quadrilateral() {
        let path = rect(&[("x", "1"), ("y", "2"), ("width", "10"), ("height", "20")]).make_path(&params());

        assert!(path
            .iter()
            .all(|c| !matches!(c, PathCommand::CurveTo(_) | PathCommand::Arc(_))));

        let vpath = Vpath::from_path(&path, &Transform::identity(), FLATNESS);
        assert_eq!(vpath.subpaths.len(), 1);

        let subpath = &vpath.subpaths[0];
        assert!(subpath.closed);
        assert_eq!(
            subpath.points,
            vec![(1.0, 2.0), (11.0, 2.0), (11.0, 22.0), (1.0, 22.0)]
        );
    }

    #[test]
    fn rounded_rect_uses_arcs() {
        let path = rect(&[("width", "10"), ("height", "10"), ("rx", "2")]).make_path(&params());
        assert_eq!(
            path.iter().filter(|c| matches!(c, PathCommand::Arc(_))).count(),
            4
        );
    }

    #[test]
    fn degenerate_shapes_have_no_path() {
        assert!(rect(&[("width", "0"), ("height", "10")]).make_path(&params()).is_empty());
        assert!(rect(&[("width", "-5"), ("height", "10")]).make_path(&params()).is_empty());
        assert!(make_ellipse(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(make_ellipse(0.0, 0.0, 5.0, -1.0).is_empty());
    }

    #[test]
    fn ellipse_is_four_curves() {
        let path = make_ellipse(50.0, 50.0, 40.0, 20.0);
        assert_eq!(
            path.iter().filter(|c| matches!(c, PathCommand::CurveTo(_))).count(),
            4
        );

        let vpath = Vpath::from_path(&path, &Transform::identity(), FLATNESS);
        let extents = vpath.extents().unwrap();
        assert!((extents.x0 - 10.0).abs() < 1e-9);
        assert!((extents.y1 - 70.0).abs() < 1e-9);
    }

    #[test]
    fn open_polygon_gets_closed() {
        let points = Points(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let path = make_poly(Some(&points), true);
        assert!(matches!(path.iter().last(), Some(PathCommand::ClosePath)));

        let path = make_poly(Some(&points), false);
        assert!(matches!(path.iter().last(), Some(PathCommand::LineTo(..))));
    }
}
