//! The `marker` element, and geometry computations for markers.

use std::f64::consts::*;
use std::ops::Deref;

use cssparser::Parser;
use float_cmp::approx_eq;
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::angle::Angle;
use crate::aspect_ratio::*;
use crate::bbox::BoundingBox;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::{set_attribute, ElementTrait};
use crate::error::*;
use crate::layout::{self, StackingContext};
use crate::length::*;
use crate::node::{CascadedValues, Node, NodeBorrow, NodeDraw};
use crate::parse_identifiers;
use crate::parsers::{Parse, ParseValue};
use crate::path_builder::{
    arc_segment, ArcParameterization, CubicBezierCurve, EllipticalArc, Path, PathCommand,
};
use crate::rect::Rect;
use crate::rsvg_log;
use crate::state::State;
use crate::transform::Transform;
use crate::viewbox::*;
use crate::xml::Attributes;
use crate::{borrow_element_as, enum_default};

// markerUnits attribute: https://www.w3.org/TR/SVG/painting.html#MarkerElement
#[derive(Debug, Copy, Clone, PartialEq)]
enum MarkerUnits {
    UserSpaceOnUse,
    StrokeWidth,
}

enum_default!(MarkerUnits, MarkerUnits::StrokeWidth);

impl Parse for MarkerUnits {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<MarkerUnits, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "userSpaceOnUse" => MarkerUnits::UserSpaceOnUse,
            "strokeWidth" => MarkerUnits::StrokeWidth,
        )?)
    }
}

// orient attribute: https://www.w3.org/TR/SVG/painting.html#MarkerElement
#[derive(Debug, Copy, Clone, PartialEq)]
enum MarkerOrient {
    Auto,
    Angle(Angle),
}

enum_default!(MarkerOrient, MarkerOrient::Angle(Angle::new(0.0)));

impl Parse for MarkerOrient {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<MarkerOrient, ParseError<'i>> {
        if parser
            .try_parse(|p| p.expect_ident_matching("auto"))
            .is_ok()
        {
            Ok(MarkerOrient::Auto)
        } else {
            Angle::parse(parser).map(MarkerOrient::Angle)
        }
    }
}

pub struct Marker {
    units: MarkerUnits,
    ref_x: Length<Horizontal>,
    ref_y: Length<Vertical>,
    width: ULength<Horizontal>,
    height: ULength<Vertical>,
    orient: MarkerOrient,
    aspect: AspectRatio,
    vbox: Option<ViewBox>,
}

impl Default for Marker {
    fn default() -> Marker {
        Marker {
            units: MarkerUnits::default(),
            ref_x: Default::default(),
            ref_y: Default::default(),
            // the following two are SVG 1.1 defaults
            width: ULength::<Horizontal>::new(3.0, LengthUnit::Px),
            height: ULength::<Vertical>::new(3.0, LengthUnit::Px),
            orient: MarkerOrient::default(),
            aspect: AspectRatio::default(),
            vbox: None,
        }
    }
}

impl Marker {
    #[allow(clippy::too_many_arguments)]
    fn render(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        xpos: f64,
        ypos: f64,
        computed_angle: Angle,
        line_width: f64,
    ) -> Result<BoundingBox, RenderingError> {
        let cascaded = CascadedValues::new_from_node(node);
        let values = cascaded.get();

        let params = viewport.normalize_params(values);

        let marker_width = self.width.normalize(&params);
        let marker_height = self.height.normalize(&params);

        if approx_eq!(f64, marker_width, 0.0) || approx_eq!(f64, marker_height, 0.0) {
            // markerWidth or markerHeight set to 0 disables rendering of the element
            // https://www.w3.org/TR/SVG/painting.html#MarkerWidthAttribute
            return Ok(viewport.empty_bbox());
        }

        let rotation = match self.orient {
            MarkerOrient::Auto => computed_angle,
            MarkerOrient::Angle(a) => a,
        };

        let mut transform = Transform::new_translate(xpos, ypos).pre_rotate(rotation);

        if self.units == MarkerUnits::StrokeWidth {
            transform = transform.pre_scale(line_width, line_width);
        }

        let content_viewport = if let Some(vbox) = self.vbox {
            if vbox.is_empty() {
                return Ok(viewport.empty_bbox());
            }

            let r = self
                .aspect
                .compute(&vbox, &Rect::from_size(marker_width, marker_height));

            let (vb_width, vb_height) = vbox.size();
            transform = transform.pre_scale(r.width() / vb_width, r.height() / vb_height);

            viewport.with_view_box(vb_width, vb_height)
        } else {
            viewport.with_view_box(marker_width, marker_height)
        };

        let content_params = content_viewport.normalize_params(values);

        transform = transform.pre_translate(
            -self.ref_x.normalize(&content_params),
            -self.ref_y.normalize(&content_params),
        );

        let content_viewport = match content_viewport.with_composed_transform(transform) {
            Ok(v) => v,
            Err(_) => {
                rsvg_log!("marker {} has a degenerate transform", node);
                return Ok(viewport.empty_bbox());
            }
        };

        // Marker content is always clipped to the marker's viewport.
        let clip_rect = self
            .vbox
            .map_or_else(|| Rect::from_size(marker_width, marker_height), |vb| *vb);

        let stacking_ctx = {
            let elt = node.borrow_element();
            StackingContext::new(acquired_nodes, &elt, Transform::identity(), values)
        };

        draw_ctx.with_clip_rect(Some(&clip_rect), &content_viewport.transform, &mut |dc| {
            dc.with_discrete_layer(
                &stacking_ctx,
                acquired_nodes,
                &content_viewport,
                values,
                false,
                &mut |an, dc, viewport| node.draw_children(an, &cascaded, viewport, dc, false),
            )
        })
    }
}

impl ElementTrait for Marker {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "markerUnits") => set_attribute(&mut self.units, attr.parse(value)),
                expanded_name!("", "refX") => set_attribute(&mut self.ref_x, attr.parse(value)),
                expanded_name!("", "refY") => set_attribute(&mut self.ref_y, attr.parse(value)),
                expanded_name!("", "markerWidth") => {
                    set_attribute(&mut self.width, attr.parse(value))
                }
                expanded_name!("", "markerHeight") => {
                    set_attribute(&mut self.height, attr.parse(value))
                }
                expanded_name!("", "orient") => set_attribute(&mut self.orient, attr.parse(value)),
                expanded_name!("", "preserveAspectRatio") => {
                    set_attribute(&mut self.aspect, attr.parse(value))
                }
                expanded_name!("", "viewBox") => set_attribute(&mut self.vbox, attr.parse(value)),
                _ => (),
            }
        }
    }
}

// Machinery to figure out marker orientations
#[derive(Debug, PartialEq)]
enum Segment {
    Degenerate {
        // A single lone point
        x: f64,
        y: f64,
    },

    LineOrCurve {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        x3: f64,
        y3: f64,
        x4: f64,
        y4: f64,
    },
}

impl Segment {
    fn degenerate(x: f64, y: f64) -> Segment {
        Segment::Degenerate { x, y }
    }

    #[allow(clippy::too_many_arguments)]
    fn curve(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64, x4: f64, y4: f64) -> Segment {
        Segment::LineOrCurve {
            x1,
            y1,
            x2,
            y2,
            x3,
            y3,
            x4,
            y4,
        }
    }

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::curve(x1, y1, x2, y2, x1, y1, x2, y2)
    }

    /// Tangents at the start and at the end of the segment, as `(v1x, v1y, v2x, v2y)`.
    ///
    /// Lone points and segments whose four control points coincide have no tangents.
    /// A curve that starts and ends at the same point may still loop, so only the
    /// control points decide.
    fn get_directionalities(&self) -> Option<(f64, f64, f64, f64)> {
        let pts = match *self {
            Segment::Degenerate { .. } => return None,

            Segment::LineOrCurve {
                x1,
                y1,
                x2,
                y2,
                x3,
                y3,
                x4,
                y4,
            } => [(x1, y1), (x2, y2), (x3, y3), (x4, y4)],
        };

        let (first, last) = (pts[0], pts[3]);
        let differs = |p: (f64, f64), q: (f64, f64)| !points_equal(p.0, p.1, q.0, q.1);

        // the first control point off the start, and the last one off the end
        let toward = pts[1..].iter().copied().find(|&p| differs(p, first))?;
        let from = pts[..3].iter().rev().copied().find(|&p| differs(p, last))?;

        Some((
            toward.0 - first.0,
            toward.1 - first.1,
            last.0 - from.0,
            last.1 - from.1,
        ))
    }
}

fn points_equal(x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
    approx_eq!(f64, x1, x2) && approx_eq!(f64, y1, y2)
}

/// Direction halfway between two tangents: the angle of the sum of the unit vectors.
///
/// Opposite tangents cancel out, and give an angle of zero.
fn bisect(v1x: f64, v1y: f64, v2x: f64, v2y: f64) -> Angle {
    let unit = |x: f64, y: f64| {
        let len = x.hypot(y);

        if len > 0.0 {
            (x / len, y / len)
        } else {
            (0.0, 0.0)
        }
    };

    let (ax, ay) = unit(v1x, v1y);
    let (bx, by) = unit(v2x, v2y);

    Angle::from_vector(ax + bx, ay + by)
}

/// A path as a list of curveto-like segments.
///
/// `ends_closed` is true if the last segment comes from a closepath.
#[derive(Debug, PartialEq)]
struct Segments {
    segments: Vec<Segment>,
    ends_closed: bool,
}

impl Deref for Segments {
    type Target = [Segment];

    fn deref(&self) -> &[Segment] {
        &self.segments
    }
}

// Lines, curves, arcs and the implicit line of a closepath all become cubic-like
// segments from P1 to P4, whose start tangent is P2 - P1 and end tangent is P4 - P3.
// A line stores its endpoints as both control pairs so both tangents agree.
// A moveto that is not followed by drawing becomes a lone point.
impl From<&Path> for Segments {
    fn from(path: &Path) -> Segments {
        let mut segments = Vec::new();

        let mut current = (0.0, 0.0);
        let mut subpath_start = current;

        // a moveto has been seen and nothing drawn from it yet
        let mut pending_moveto = false;
        let mut ends_closed = false;

        for command in path.iter() {
            let (fx, fy) = current;

            let segment = match *command {
                PathCommand::MoveTo(x, y) => {
                    if pending_moveto {
                        segments.push(Segment::degenerate(fx, fy));
                    }

                    current = (x, y);
                    subpath_start = current;
                    pending_moveto = true;
                    continue;
                }

                PathCommand::LineTo(x, y) => {
                    current = (x, y);
                    Segment::line(fx, fy, x, y)
                }

                PathCommand::CurveTo(CubicBezierCurve {
                    pt1: (x2, y2),
                    pt2: (x3, y3),
                    to,
                }) => {
                    current = to;
                    Segment::curve(fx, fy, x2, y2, x3, y3, to.0, to.1)
                }

                PathCommand::Arc(ref arc) => {
                    current = arc.to;

                    match arc_as_segment(fx, fy, arc) {
                        Some(segment) => segment,
                        None => {
                            ends_closed = false;
                            continue;
                        }
                    }
                }

                PathCommand::ClosePath => {
                    current = subpath_start;
                    segments.push(Segment::line(fx, fy, current.0, current.1));
                    pending_moveto = false;
                    ends_closed = true;
                    continue;
                }
            };

            segments.push(segment);
            pending_moveto = false;
            ends_closed = false;
        }

        if pending_moveto {
            segments.push(Segment::degenerate(current.0, current.1));
            ends_closed = false;
        }

        Segments {
            segments,
            ends_closed,
        }
    }
}

/// An arc as a single segment whose tangents are those of the arc's first and last
/// bezier pieces; `None` for an arc that draws nothing.
fn arc_as_segment(fx: f64, fy: f64, arc: &EllipticalArc) -> Option<Segment> {
    let (tx, ty) = arc.to;

    match arc.center_parameterization() {
        ArcParameterization::CenterParameters {
            center,
            radii,
            theta1,
            delta_theta,
        } => {
            let rot = arc.x_axis_rotation;
            let theta2 = theta1 + delta_theta;
            let n_segs = (delta_theta / (PI * 0.5 + 0.001)).abs().ceil() as u32;
            let d_theta = delta_theta / f64::from(n_segs);

            let (x2, y2) = arc_segment(center, radii, rot, theta1, theta1 + d_theta).pt1;
            let (x3, y3) = arc_segment(center, radii, rot, theta2 - d_theta, theta2).pt2;

            Some(Segment::curve(fx, fy, x2, y2, x3, y3, tx, ty))
        }

        ArcParameterization::LineTo => Some(Segment::line(fx, fy, tx, ty)),

        ArcParameterization::Omit => None,
    }
}

// Zero-length segments borrow their direction from their neighbours: the incoming
// direction at a vertex is the end tangent of the nearest previous segment that has
// one, and the outgoing direction is the start tangent of the nearest following one.
// The search stops at a lone point, which separates subpaths.
// See https://www.w3.org/TR/SVG11/implnote.html#PathElementImplementationNotes
impl Segments {
    fn find_incoming_directionality_backwards(&self, start_index: usize) -> Option<(f64, f64)> {
        self[..=start_index]
            .iter()
            .rev()
            .take_while(|segment| !matches!(segment, Segment::Degenerate { .. }))
            .find_map(|segment| segment.get_directionalities())
            .map(|(_, _, v2x, v2y)| (v2x, v2y))
    }

    fn find_outgoing_directionality_forwards(&self, start_index: usize) -> Option<(f64, f64)> {
        self[start_index..]
            .iter()
            .take_while(|segment| !matches!(segment, Segment::Degenerate { .. }))
            .find_map(|segment| segment.get_directionalities())
            .map(|(v1x, v1y, _, _)| (v1x, v1y))
    }
}

/// Angle of a direction vector, or zero if there is none.
fn angle_of(v: Option<(f64, f64)>) -> Angle {
    v.map_or_else(|| Angle::new(0.0), |(vx, vy)| Angle::from_vector(vx, vy))
}

// From SVG's marker-start, marker-mid, marker-end properties
#[derive(Debug, Copy, Clone, PartialEq)]
enum MarkerType {
    Start,
    Middle,
    End,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum MarkerEndpoint {
    Start,
    End,
}

fn emit_marker<E>(
    segment: &Segment,
    endpoint: MarkerEndpoint,
    marker_type: MarkerType,
    orient: Angle,
    emit_fn: &mut E,
) -> Result<BoundingBox, RenderingError>
where
    E: FnMut(MarkerType, f64, f64, Angle) -> Result<BoundingBox, RenderingError>,
{
    let (x, y) = match *segment {
        Segment::Degenerate { x, y } => (x, y),

        Segment::LineOrCurve { x1, y1, x4, y4, .. } => match endpoint {
            MarkerEndpoint::Start => (x1, y1),
            MarkerEndpoint::End => (x4, y4),
        },
    };

    emit_fn(marker_type, x, y, orient)
}

#[allow(clippy::too_many_arguments)]
fn emit_marker_by_node(
    marker_node: &Node,
    acquired_nodes: &mut AcquiredNodes<'_>,
    viewport: &Viewport,
    draw_ctx: &mut DrawingCtx,
    xpos: f64,
    ypos: f64,
    computed_angle: Angle,
    line_width: f64,
) -> Result<BoundingBox, RenderingError> {
    // A marker whose content uses the same marker would recurse forever.
    let _acquired = match acquired_nodes.acquire_ref(marker_node) {
        Ok(a) => a,
        Err(_) => {
            rsvg_log!("circular reference in marker {}", marker_node);
            return Ok(viewport.empty_bbox());
        }
    };

    let marker = borrow_element_as!(marker_node, Marker);

    marker.render(
        marker_node,
        acquired_nodes,
        viewport,
        draw_ctx,
        xpos,
        ypos,
        computed_angle,
        line_width,
    )
}

/// Draws the start, mid and end markers of a shape at its vertices.
///
/// `viewport` is the user space of the shape; marker positions and orientations are
/// computed there.
pub fn render_markers_for_shape(
    shape: &layout::Shape,
    viewport: &Viewport,
    draw_ctx: &mut DrawingCtx,
    acquired_nodes: &mut AcquiredNodes<'_>,
    values: &State,
) -> Result<BoundingBox, RenderingError> {
    if shape.markers.is_empty() {
        return Ok(viewport.empty_bbox());
    }

    let line_width = values.stroke_width.normalize(&viewport.normalize_params(values));

    if approx_eq!(f64, line_width, 0.0) {
        return Ok(viewport.empty_bbox());
    }

    emit_markers_for_path(
        &shape.path,
        viewport.empty_bbox(),
        &mut |marker_type: MarkerType, x: f64, y: f64, computed_angle: Angle| {
            let marker_node = match marker_type {
                MarkerType::Start => &shape.markers.start,
                MarkerType::Middle => &shape.markers.mid,
                MarkerType::End => &shape.markers.end,
            };

            match marker_node {
                Some(node) => emit_marker_by_node(
                    node,
                    acquired_nodes,
                    viewport,
                    draw_ctx,
                    x,
                    y,
                    computed_angle,
                    line_width,
                ),

                None => Ok(viewport.empty_bbox()),
            }
        },
    )
}

fn emit_markers_for_path<E>(
    path: &Path,
    empty_bbox: BoundingBox,
    emit_fn: &mut E,
) -> Result<BoundingBox, RenderingError>
where
    E: FnMut(MarkerType, f64, f64, Angle) -> Result<BoundingBox, RenderingError>,
{
    enum SubpathState {
        NoSubpath,
        InSubpath,
    }

    let mut bbox = empty_bbox;

    // Convert the path to a list of segments and bare points
    let segments = Segments::from(path);

    let mut subpath_state = SubpathState::NoSubpath;

    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            Segment::Degenerate { .. } => {
                if let SubpathState::InSubpath = subpath_state {
                    // Got a lone point after a subpath; render the subpath's end marker first
                    let incoming = segments.find_incoming_directionality_backwards(i - 1);
                    let marker_bbox = emit_marker(
                        &segments[i - 1],
                        MarkerEndpoint::End,
                        MarkerType::End,
                        angle_of(incoming),
                        emit_fn,
                    )?;
                    bbox.insert(&marker_bbox);
                }

                // Render marker for the lone point; no directionality
                let marker_bbox = emit_marker(
                    segment,
                    MarkerEndpoint::Start,
                    MarkerType::Middle,
                    Angle::new(0.0),
                    emit_fn,
                )?;
                bbox.insert(&marker_bbox);

                subpath_state = SubpathState::NoSubpath;
            }

            Segment::LineOrCurve { .. } => match subpath_state {
                SubpathState::NoSubpath => {
                    let outgoing = segments.find_outgoing_directionality_forwards(i);
                    let marker_bbox = emit_marker(
                        segment,
                        MarkerEndpoint::Start,
                        MarkerType::Start,
                        angle_of(outgoing),
                        emit_fn,
                    )?;
                    bbox.insert(&marker_bbox);

                    subpath_state = SubpathState::InSubpath;
                }

                SubpathState::InSubpath => {
                    let incoming = segments.find_incoming_directionality_backwards(i - 1);
                    let outgoing = segments.find_outgoing_directionality_forwards(i);

                    let angle = match (incoming, outgoing) {
                        (Some((ix, iy)), Some((ox, oy))) => bisect(ix, iy, ox, oy),
                        (Some(v), None) | (None, Some(v)) => angle_of(Some(v)),
                        (None, None) => Angle::new(0.0),
                    };

                    let marker_bbox = emit_marker(
                        segment,
                        MarkerEndpoint::Start,
                        MarkerType::Middle,
                        angle,
                        emit_fn,
                    )?;
                    bbox.insert(&marker_bbox);
                }
            },
        }
    }

    // Finally, render the last point
    if let Some(segment) = segments.last() {
        if let Segment::LineOrCurve { .. } = *segment {
            let incoming = segments.find_incoming_directionality_backwards(segments.len() - 1);

            let angle = if segments.ends_closed {
                let outgoing = segments.find_outgoing_directionality_forwards(0);

                match (incoming, outgoing) {
                    (Some((ix, iy)), Some((ox, oy))) => bisect(ix, iy, ox, oy),
                    (v, None) | (None, v) => angle_of(v),
                }
            } else {
                angle_of(incoming)
            };

            let marker_bbox = emit_marker(
                segment,
                MarkerEndpoint::End,
                MarkerType::End,
                angle,
                emit_fn,
            )?;
            bbox.insert(&marker_bbox);
        }
    }

    Ok(bbox)
}
