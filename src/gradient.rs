//! Gradient paint servers; the `linearGradient` and `radialGradient` elements.

use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::bbox::BoundingBox;
use crate::color::{resolve_color, with_opacity, RGBA};
use crate::coord_units::CoordUnits;
use crate::coord_units;
use crate::document::{AcquiredNodes, NodeStack};
use crate::drawing_ctx::Viewport;
use crate::element::{set_attribute, ElementData, ElementTrait};
use crate::enum_default;
use crate::error::*;
use crate::iri::fragment_id;
use crate::length::*;
use crate::node::{Node, NodeBorrow};
use crate::parse_identifiers;
use crate::parsers::{NumberOrPercentage, Parse, ParseValue};
use crate::rsvg_log;
use crate::state::State;
use crate::surface_utils::{Pixel, PixelOps};
use crate::transform::Transform;
use crate::xml::Attributes;

/// Contents of a `<stop>` element for gradient color stops.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorStop {
    /// `<stop offset="..."/>`, clamped to `[0, 1]`.
    pub offset: f64,

    /// `<stop stop-color="..." stop-opacity="..."/>`, with the opacity already applied.
    pub rgba: RGBA,
}

// gradientUnits attribute; its default is objectBoundingBox
coord_units!(GradientUnits, CoordUnits::ObjectBoundingBox);

/// spreadMethod attribute for gradients
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SpreadMethod {
    Pad,
    Reflect,
    Repeat,
}

enum_default!(SpreadMethod, SpreadMethod::Pad);

impl Parse for SpreadMethod {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<SpreadMethod, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "pad" => SpreadMethod::Pad,
            "reflect" => SpreadMethod::Reflect,
            "repeat" => SpreadMethod::Repeat,
        )?)
    }
}

impl SpreadMethod {
    /// Maps a gradient parameter `t` into `[0, 1]`.
    fn apply(self, t: f64) -> f64 {
        match self {
            SpreadMethod::Pad => t.clamp(0.0, 1.0),
            SpreadMethod::Repeat => t - t.floor(),
            SpreadMethod::Reflect => {
                let t = t.abs() % 2.0;
                if t > 1.0 {
                    2.0 - t
                } else {
                    t
                }
            }
        }
    }
}

/// Node for the `<stop>` element
#[derive(Default)]
pub struct Stop {
    offset: f64,
    // stop-color and stop-opacity are properties, so they live in the element's State
}

impl ElementTrait for Stop {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            if let expanded_name!("", "offset") = attr.expanded() {
                let mut offset = NumberOrPercentage(0.0);
                set_attribute(&mut offset, attr.parse(value));
                self.offset = offset.0.clamp(0.0, 1.0);
            }
        }
    }
}

/// Declares a gradient's geometry attributes twice: as they were specified on one
/// element (every field optional), and resolved (every field present).
macro_rules! gradient_geometry {
    ($specified:ident => $resolved:ident { $($field:ident: $ty:ty,)+ }) => {
        #[derive(Debug, Default, Copy, Clone)]
        struct $specified {
            $($field: Option<$ty>,)+
        }

        #[derive(Debug, Copy, Clone)]
        struct $resolved {
            $($field: $ty,)+
        }

        impl $specified {
            fn is_complete(&self) -> bool {
                $(self.$field.is_some())&&+
            }

            /// Fills unspecified fields from `fallback`.
            fn or(self, fallback: $specified) -> $specified {
                $specified {
                    $($field: self.$field.or(fallback.$field),)+
                }
            }
        }
    };
}

gradient_geometry!(LinearGeometry => ResolvedLinear {
    x1: Length<Horizontal>,
    y1: Length<Vertical>,
    x2: Length<Horizontal>,
    y2: Length<Vertical>,
});

gradient_geometry!(RadialGeometry => ResolvedRadial {
    cx: Length<Horizontal>,
    cy: Length<Vertical>,
    r: Length<Both>,
    fx: Length<Horizontal>,
    fy: Length<Vertical>,
    fr: Length<Both>,
});

fn percent<N: Normalize>(v: f64) -> Length<N> {
    Length::new(v, LengthUnit::Percent)
}

// https://www.w3.org/TR/SVG/pservers.html#LinearGradients
impl LinearGeometry {
    fn with_defaults(self) -> ResolvedLinear {
        ResolvedLinear {
            x1: self.x1.unwrap_or_else(|| percent(0.0)),
            y1: self.y1.unwrap_or_else(|| percent(0.0)),
            x2: self.x2.unwrap_or_else(|| percent(1.0)),
            y2: self.y2.unwrap_or_else(|| percent(0.0)),
        }
    }
}

// https://www.w3.org/TR/SVG/pservers.html#RadialGradients
impl RadialGeometry {
    fn with_defaults(self) -> ResolvedRadial {
        let cx = self.cx.unwrap_or_else(|| percent(0.5));
        let cy = self.cy.unwrap_or_else(|| percent(0.5));

        ResolvedRadial {
            cx,
            cy,
            r: self.r.unwrap_or_else(|| percent(0.5)),
            fx: self.fx.unwrap_or(cx),
            fy: self.fy.unwrap_or(cy),
            fr: self.fr.unwrap_or_else(|| percent(0.0)),
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum Geometry {
    Linear(LinearGeometry),
    Radial(RadialGeometry),
}

impl Geometry {
    fn is_complete(&self) -> bool {
        match self {
            Geometry::Linear(g) => g.is_complete(),
            Geometry::Radial(g) => g.is_complete(),
        }
    }

    /// A fallback of the other gradient type contributes no geometry.
    fn or(self, fallback: Geometry) -> Geometry {
        match (self, fallback) {
            (Geometry::Linear(g), Geometry::Linear(f)) => Geometry::Linear(g.or(f)),
            (Geometry::Radial(g), Geometry::Radial(f)) => Geometry::Radial(g.or(f)),
            (g, _) => g,
        }
    }

    fn with_defaults(self) -> ResolvedGeometry {
        match self {
            Geometry::Linear(g) => ResolvedGeometry::Linear(g.with_defaults()),
            Geometry::Radial(g) => ResolvedGeometry::Radial(g.with_defaults()),
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum ResolvedGeometry {
    Linear(ResolvedLinear),
    Radial(ResolvedRadial),
}

/// Parameters specific to each gradient type, after normalizing to user-space units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GradientVariant {
    Linear {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },

    Radial {
        cx: f64,
        cy: f64,
        r: f64,
        fx: f64,
        fy: f64,
        fr: f64,
    },
}

/// Attributes shared by both gradient elements, as specified on one of them.
#[derive(Debug, Default, Copy, Clone)]
struct Common {
    units: Option<GradientUnits>,
    transform: Option<Transform>,
    spread: Option<SpreadMethod>,
}

impl Common {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "gradientUnits") => {
                    set_attribute(&mut self.units, attr.parse(value))
                }
                expanded_name!("", "gradientTransform") => {
                    set_attribute(&mut self.transform, attr.parse(value))
                }
                expanded_name!("", "spreadMethod") => {
                    set_attribute(&mut self.spread, attr.parse(value))
                }
                _ => (),
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.units.is_some() && self.transform.is_some() && self.spread.is_some()
    }

    fn or(self, fallback: Common) -> Common {
        Common {
            units: self.units.or(fallback.units),
            transform: self.transform.or(fallback.transform),
            spread: self.spread.or(fallback.spread),
        }
    }
}

/// Node for the `<linearGradient>` element
#[derive(Default)]
pub struct LinearGradient {
    common: Common,
    geometry: LinearGeometry,
    href: Option<String>,
}

/// Node for the `<radialGradient>` element
#[derive(Default)]
pub struct RadialGradient {
    common: Common,
    geometry: RadialGeometry,
    href: Option<String>,
}

fn fallback_id(attrs: &Attributes) -> Option<String> {
    attrs.get_href().and_then(fragment_id).map(String::from)
}

impl ElementTrait for LinearGradient {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.common.set_attributes(attrs);
        self.href = fallback_id(attrs);

        let g = &mut self.geometry;

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x1") => set_attribute(&mut g.x1, attr.parse(value)),
                expanded_name!("", "y1") => set_attribute(&mut g.y1, attr.parse(value)),
                expanded_name!("", "x2") => set_attribute(&mut g.x2, attr.parse(value)),
                expanded_name!("", "y2") => set_attribute(&mut g.y2, attr.parse(value)),
                _ => (),
            }
        }
    }
}

impl ElementTrait for RadialGradient {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.common.set_attributes(attrs);
        self.href = fallback_id(attrs);

        let g = &mut self.geometry;

        for (attr, value) in attrs.iter().filter(|(attr, _)| attr.ns == ns!()) {
            // markup5ever has no atom for "fr"
            match attr.local.as_ref() {
                "cx" => set_attribute(&mut g.cx, attr.parse(value)),
                "cy" => set_attribute(&mut g.cy, attr.parse(value)),
                "r" => set_attribute(&mut g.r, attr.parse(value)),
                "fx" => set_attribute(&mut g.fx, attr.parse(value)),
                "fy" => set_attribute(&mut g.fy, attr.parse(value)),
                "fr" => set_attribute(&mut g.fr, attr.parse(value)),
                _ => (),
            }
        }
    }
}

/// A gradient partway through resolution: what the chain of `href` references has
/// specified so far.  `None` stops means no element in the chain had `<stop>` children.
struct PartialGradient {
    common: Common,
    stops: Option<Vec<ColorStop>>,
    geometry: Geometry,
}

impl PartialGradient {
    /// Reads the gradient element at `node`, with the id of its fallback.
    fn from_node(node: &Node) -> Option<(PartialGradient, Option<String>)> {
        let (common, geometry, href) = match *node.borrow_element_data() {
            ElementData::LinearGradient(ref g) => {
                (g.common, Geometry::Linear(g.geometry), g.href.clone())
            }
            ElementData::RadialGradient(ref g) => {
                (g.common, Geometry::Radial(g.geometry), g.href.clone())
            }
            _ => return None,
        };

        let stops = collect_stops(node);

        Some((
            PartialGradient {
                common,
                stops,
                geometry,
            },
            href,
        ))
    }

    fn is_complete(&self) -> bool {
        self.common.is_complete() && self.stops.is_some() && self.geometry.is_complete()
    }

    fn or(self, fallback: PartialGradient) -> PartialGradient {
        PartialGradient {
            common: self.common.or(fallback.common),
            stops: self.stops.or(fallback.stops),
            geometry: self.geometry.or(fallback.geometry),
        }
    }

    fn with_defaults(self) -> ResolvedGradient {
        ResolvedGradient {
            units: self.common.units.unwrap_or_default(),
            transform: self.common.transform.unwrap_or_default(),
            spread: self.common.spread.unwrap_or_default(),
            stops: self.stops.unwrap_or_default(),
            geometry: self.geometry.with_defaults(),
        }
    }
}

/// Collects the `<stop>` children of a gradient node, keeping offsets non-decreasing.
///
/// Returns `None` if there are no stops, so that the fallback's stops can be used.
fn collect_stops(node: &Node) -> Option<Vec<ColorStop>> {
    let mut stops: Vec<ColorStop> = Vec::new();

    for child in node.children().filter(|c| c.is_element()) {
        let elt = child.borrow_element();

        if let ElementData::Stop(ref stop) = elt.element_data {
            let values = elt.get_computed_values();
            let rgba = with_opacity(
                resolve_color(&values.stop_color, values.color),
                values.stop_opacity,
            );

            let floor = stops.last().map_or(0.0, |s| s.offset);
            stops.push(ColorStop {
                offset: stop.offset.max(floor),
                rgba,
            });
        }
    }

    (!stops.is_empty()).then_some(stops)
}

/// Follows the chain of `href` references from the gradient at `node` and fills in
/// every unspecified attribute.
///
/// A reference that is missing, not a gradient, or that loops back into the chain
/// ends the chain; the remaining attributes take their defaults.
fn resolve_gradient(
    mut gradient: PartialGradient,
    mut href: Option<String>,
    node: &Node,
    acquired_nodes: &mut AcquiredNodes<'_>,
) -> Result<ResolvedGradient, AcquireError> {
    let mut stack = NodeStack::new();
    stack.push(node);

    while !gradient.is_complete() {
        let Some(id) = href.take() else { break };

        let acquired = match acquired_nodes.acquire(&id) {
            Ok(acquired) => acquired,
            Err(AcquireError::MaxReferencesExceeded) => {
                return Err(AcquireError::MaxReferencesExceeded)
            }
            Err(e) => {
                rsvg_log!("ignoring gradient fallback: {}", e);
                break;
            }
        };

        let fallback_node = acquired.get();

        if stack.contains(fallback_node) {
            rsvg_log!("circular reference in gradient \"{}\"", id);
            break;
        }

        let Some((fallback, next)) = PartialGradient::from_node(fallback_node) else {
            rsvg_log!("\"{}\" is not a gradient", id);
            break;
        };

        gradient = gradient.or(fallback);
        href = next;
        stack.push(fallback_node);
    }

    Ok(gradient.with_defaults())
}

impl LinearGradient {
    pub fn resolve(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
    ) -> Result<ResolvedGradient, AcquireError> {
        let gradient = PartialGradient {
            common: self.common,
            stops: collect_stops(node),
            geometry: Geometry::Linear(self.geometry),
        };

        resolve_gradient(gradient, self.href.clone(), node, acquired_nodes)
    }
}

impl RadialGradient {
    pub fn resolve(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
    ) -> Result<ResolvedGradient, AcquireError> {
        let gradient = PartialGradient {
            common: self.common,
            stops: collect_stops(node),
            geometry: Geometry::Radial(self.geometry),
        };

        resolve_gradient(gradient, self.href.clone(), node, acquired_nodes)
    }
}

/// Resolved gradient; every attribute has a value, either its own, inherited from a
/// fallback, or the default.
#[derive(Debug, Clone)]
pub struct ResolvedGradient {
    units: GradientUnits,
    transform: Transform,
    spread: SpreadMethod,
    stops: Vec<ColorStop>,
    geometry: ResolvedGeometry,
}

/// Gradient normalized to user-space units.
#[derive(Debug, Clone)]
pub struct UserSpaceGradient {
    /// Maps gradient coordinates to the user space of the element being painted.
    pub transform: Transform,
    pub spread: SpreadMethod,
    pub stops: Vec<ColorStop>,

    pub variant: GradientVariant,
}

impl ResolvedGradient {
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Normalizes the gradient for an element with bounding box `bbox`.
    ///
    /// Returns `None` if the gradient uses `objectBoundingBox` units and the box is
    /// empty, or if the gradient's transform is not invertible.
    pub fn to_user_space(
        &self,
        bbox: &BoundingBox,
        viewport: &Viewport,
        values: &State,
    ) -> Option<UserSpaceGradient> {
        let units = self.units.0;
        let bbox_transform = bbox.rect_to_transform(units)?;
        let params = viewport.with_units(units).normalize_params(values);

        let transform = bbox_transform.pre_transform(&self.transform);
        if !transform.is_invertible() {
            return None;
        }

        let variant = match self.geometry {
            ResolvedGeometry::Linear(g) => GradientVariant::Linear {
                x1: g.x1.normalize(&params),
                y1: g.y1.normalize(&params),
                x2: g.x2.normalize(&params),
                y2: g.y2.normalize(&params),
            },

            ResolvedGeometry::Radial(g) => {
                let (cx, cy) = (g.cx.normalize(&params), g.cy.normalize(&params));
                let r = g.r.normalize(&params);
                let focus = (g.fx.normalize(&params), g.fy.normalize(&params));
                let (fx, fy) = fix_focus_point(focus.0, focus.1, cx, cy, r);

                GradientVariant::Radial {
                    cx,
                    cy,
                    r,
                    fx,
                    fy,
                    fr: g.fr.normalize(&params),
                }
            }
        };

        Some(UserSpaceGradient {
            transform,
            spread: self.spread,
            stops: self.stops.clone(),
            variant,
        })
    }
}

/// Moves a focus point that lies outside the circle onto 99.9% of the radius, along
/// the line from the center.
fn fix_focus_point(fx: f64, fy: f64, cx: f64, cy: f64, radius: f64) -> (f64, f64) {
    let (dx, dy) = (fx - cx, fy - cy);
    let d = (dx * dx + dy * dy).sqrt();

    let limit = radius * 0.999;

    if d <= limit {
        (fx, fy)
    } else {
        let scale = limit / d;
        (cx + dx * scale, cy + dy * scale)
    }
}

impl UserSpaceGradient {
    /// Color of the gradient at a point in gradient space, as a premultiplied pixel.
    pub fn color_at(&self, x: f64, y: f64) -> Pixel {
        match self.parameter_at(x, y) {
            Some(t) => self.color_at_offset(self.spread.apply(t)),
            None => Pixel::default(),
        }
    }

    /// Position along the gradient vector for a point, before applying the spread
    /// method.
    ///
    /// A degenerate gradient (zero length, zero radius) paints its last stop everywhere.
    /// Returns `None` for points a radial gradient does not cover.
    fn parameter_at(&self, x: f64, y: f64) -> Option<f64> {
        match self.variant {
            GradientVariant::Linear { x1, y1, x2, y2 } => {
                let (dx, dy) = (x2 - x1, y2 - y1);
                let len2 = dx * dx + dy * dy;

                if len2 == 0.0 {
                    Some(1.0)
                } else {
                    Some(((x - x1) * dx + (y - y1) * dy) / len2)
                }
            }

            GradientVariant::Radial {
                cx,
                cy,
                r,
                fx,
                fy,
                fr,
            } => {
                if r <= 0.0 {
                    return Some(1.0);
                }

                // Circles interpolate from (focus, fr) at t=0 to (center, r) at t=1; find
                // the largest t whose circle passes through the point.
                let (cdx, cdy) = (cx - fx, cy - fy);
                let (pdx, pdy) = (x - fx, y - fy);
                let dr = r - fr;

                let a = cdx * cdx + cdy * cdy - dr * dr;
                let b = pdx * cdx + pdy * cdy + fr * dr;
                let c = pdx * pdx + pdy * pdy - fr * fr;

                let valid = |t: f64| fr + t * dr >= 0.0;

                if a.abs() < 1e-12 {
                    if b == 0.0 {
                        return None;
                    }

                    let t = c / (2.0 * b);
                    return Some(t).filter(|t| valid(*t));
                }

                let disc = b * b - a * c;
                if disc < 0.0 {
                    return None;
                }

                let sq = disc.sqrt();
                let (t1, t2) = ((b + sq) / a, (b - sq) / a);
                let (hi, lo) = if t1 >= t2 { (t1, t2) } else { (t2, t1) };

                if valid(hi) {
                    Some(hi)
                } else if valid(lo) {
                    Some(lo)
                } else {
                    None
                }
            }
        }
    }

    /// Interpolates the stops at `t` in `[0, 1]`, in non-premultiplied RGBA.
    fn color_at_offset(&self, t: f64) -> Pixel {
        let stops = &self.stops;

        let rgba = match (stops.first(), stops.last()) {
            (None, _) | (_, None) => return Pixel::default(),

            (Some(first), _) if t <= first.offset => first.rgba,
            (_, Some(last)) if t >= last.offset => last.rgba,

            _ => {
                // Stops are sorted, so the first one past t exists given the checks above.
                let i = stops.iter().position(|s| s.offset > t).unwrap_or(stops.len() - 1);
                let (s0, s1) = (&stops[i - 1], &stops[i]);

                let span = s1.offset - s0.offset;
                if span <= 0.0 {
                    s1.rgba
                } else {
                    lerp_rgba(s0.rgba, s1.rgba, (t - s0.offset) / span)
                }
            }
        };

        Pixel::new(rgba.red, rgba.green, rgba.blue, rgba.alpha).premultiply()
    }
}

fn lerp_rgba(a: RGBA, b: RGBA, f: f64) -> RGBA {
    let lerp = |a: u8, b: u8| (f64::from(a) * (1.0 - f) + f64::from(b) * f + 0.5) as u8;

    RGBA::new(
        lerp(a.red, b.red),
        lerp(a.green, b.green),
        lerp(a.blue, b.blue),
        lerp(a.alpha, b.alpha),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::borrow_element_as;
    use crate::css::Stylesheet;
    use crate::document::Document;
    use crate::rect::Rect;
    use float_cmp::approx_eq;
    use markup5ever::{LocalName, QualName};

    fn qual(name: &str) -> QualName {
        QualName::new(None, ns!(), LocalName::from(name))
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        let names: Vec<QualName> = pairs.iter().map(|(n, _)| qual(n)).collect();
        Attributes::from_pairs(names.iter().zip(pairs.iter().map(|(_, v)| *v))).unwrap()
    }

    /// Appends an element and computes its state, as the tree builder does.
    fn append(doc: &mut Document, parent: &mut Node, name: &str, pairs: &[(&str, &str)]) -> Node {
        let mut node = doc
            .append_element(&qual(name), attrs(pairs), Some(parent))
            .unwrap();
        let parent_values = parent.borrow_element().get_computed_values().clone();
        node.borrow_element_mut()
            .cascade(&Stylesheet::new(), &parent_values, Dpi::default());
        node
    }

    fn two_stop_gradient(spread: SpreadMethod) -> UserSpaceGradient {
        UserSpaceGradient {
            transform: Transform::identity(),
            spread,
            stops: vec![
                ColorStop {
                    offset: 0.0,
                    rgba: RGBA::new(0, 0, 0, 255),
                },
                ColorStop {
                    offset: 1.0,
                    rgba: RGBA::new(200, 100, 0, 255),
                },
            ],
            variant: GradientVariant::Linear {
                x1: 0.0,
                y1: 0.0,
                x2: 10.0,
                y2: 0.0,
            },
        }
    }

    #[test]
    fn parses_spread_method() {
        assert_eq!(SpreadMethod::parse_str("pad").unwrap(), SpreadMethod::Pad);
        assert_eq!(
            SpreadMethod::parse_str("reflect").unwrap(),
            SpreadMethod::Reflect
        );
        assert_eq!(
            SpreadMethod::parse_str("repeat").unwrap(),
            SpreadMethod::Repeat
        );
        assert!(SpreadMethod::parse_str("foobar").is_err());
    }

    #[test]
    fn spread_methods_map_into_unit_interval() {
        assert_eq!(SpreadMethod::Pad.apply(-0.5), 0.0);
        assert_eq!(SpreadMethod::Pad.apply(1.5), 1.0);
        assert!(approx_eq!(f64, SpreadMethod::Repeat.apply(1.25), 0.25));
        assert!(approx_eq!(f64, SpreadMethod::Repeat.apply(-0.25), 0.75));
        assert!(approx_eq!(f64, SpreadMethod::Reflect.apply(1.25), 0.75));
        assert!(approx_eq!(f64, SpreadMethod::Reflect.apply(-0.25), 0.25));
    }

    #[test]
    fn repeat_wraps_fractional_position() {
        let g = two_stop_gradient(SpreadMethod::Repeat);

        // offset 1.5 along the vector is the same color as offset 0.5
        assert_eq!(g.color_at(15.0, 0.0), g.color_at(5.0, 0.0));
        assert_eq!(g.color_at(5.0, 0.0), Pixel::new(100, 50, 0, 255));
    }

    #[test]
    fn pad_uses_end_colors() {
        let g = two_stop_gradient(SpreadMethod::Pad);
        assert_eq!(g.color_at(-5.0, 3.0), Pixel::new(0, 0, 0, 255));
        assert_eq!(g.color_at(25.0, -3.0), Pixel::new(200, 100, 0, 255));
    }

    #[test]
    fn colors_are_premultiplied() {
        let mut g = two_stop_gradient(SpreadMethod::Pad);
        g.stops[1].rgba = RGBA::new(255, 255, 255, 0);
        g.stops[0].rgba = RGBA::new(255, 255, 255, 255);

        assert_eq!(g.color_at(5.0, 0.0), Pixel::new(128, 128, 128, 128));
    }

    #[test]
    fn degenerate_linear_gradient_paints_last_stop() {
        let mut g = two_stop_gradient(SpreadMethod::Pad);
        g.variant = GradientVariant::Linear {
            x1: 3.0,
            y1: 3.0,
            x2: 3.0,
            y2: 3.0,
        };

        assert_eq!(g.color_at(0.0, 0.0), Pixel::new(200, 100, 0, 255));
    }

    #[test]
    fn radial_gradient_parameter() {
        let mut g = two_stop_gradient(SpreadMethod::Pad);
        g.variant = GradientVariant::Radial {
            cx: 0.0,
            cy: 0.0,
            r: 10.0,
            fx: 0.0,
            fy: 0.0,
            fr: 0.0,
        };

        assert!(approx_eq!(f64, g.parameter_at(5.0, 0.0).unwrap(), 0.5));
        assert!(approx_eq!(f64, g.parameter_at(0.0, -10.0).unwrap(), 1.0));
        assert!(approx_eq!(f64, g.parameter_at(0.0, 0.0).unwrap(), 0.0));
    }

    #[test]
    fn focus_outside_circle_is_moved_inside() {
        let (fx, fy) = fix_focus_point(20.0, 0.0, 0.0, 0.0, 10.0);
        assert!(approx_eq!(f64, fx, 9.99));
        assert!(approx_eq!(f64, fy, 0.0));

        assert_eq!(fix_focus_point(1.0, 2.0, 0.0, 0.0, 10.0), (1.0, 2.0));
    }

    #[test]
    fn stop_offsets_are_clamped_and_non_decreasing() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        let mut g = append(&mut doc, &mut root, "linearGradient", &[("id", "g")]);
        append(&mut doc, &mut g, "stop", &[("offset", "0.5"), ("stop-color", "red")]);
        append(&mut doc, &mut g, "stop", &[("offset", "0.2"), ("stop-color", "blue")]);
        append(&mut doc, &mut g, "stop", &[("offset", "150%"), ("stop-opacity", "0.5")]);

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(g, LinearGradient)
            .resolve(&g, &mut acquired)
            .unwrap();

        let offsets: Vec<f64> = resolved.stops().iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0.5, 0.5, 1.0]);

        assert_eq!(resolved.stops()[0].rgba, RGBA::new(255, 0, 0, 255));
        assert_eq!(resolved.stops()[1].rgba, RGBA::new(0, 0, 255, 255));
        assert_eq!(resolved.stops()[2].rgba, RGBA::new(0, 0, 0, 128));
    }

    #[test]
    fn inherits_attributes_and_stops_through_href() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        let mut base = append(
            &mut doc,
            &mut root,
            "linearGradient",
            &[("id", "base"), ("spreadMethod", "reflect"), ("x2", "50%")],
        );
        append(&mut doc, &mut base, "stop", &[("offset", "0")]);
        append(&mut doc, &mut base, "stop", &[("offset", "1")]);

        let derived = append(
            &mut doc,
            &mut root,
            "linearGradient",
            &[("id", "derived"), ("href", "#base"), ("gradientUnits", "userSpaceOnUse")],
        );

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(derived, LinearGradient)
            .resolve(&derived, &mut acquired)
            .unwrap();

        assert_eq!(resolved.spread, SpreadMethod::Reflect);
        assert_eq!(resolved.units, GradientUnits(CoordUnits::UserSpaceOnUse));
        assert_eq!(resolved.stops().len(), 2);

        let viewport = Viewport::new(Dpi::default(), 100.0, 100.0, Transform::identity());
        let bbox = BoundingBox::new().with_rect(Rect::from_size(10.0, 10.0));
        let user = resolved
            .to_user_space(&bbox, &viewport, &State::default())
            .unwrap();

        assert_eq!(
            user.variant,
            GradientVariant::Linear {
                x1: 0.0,
                y1: 0.0,
                x2: 50.0,
                y2: 0.0,
            }
        );
    }

    #[test]
    fn href_cycles_are_broken() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        append(&mut doc, &mut root, "radialGradient", &[("id", "a"), ("href", "#b")]);
        let b = append(&mut doc, &mut root, "radialGradient", &[("id", "b"), ("href", "#a")]);

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(b, RadialGradient)
            .resolve(&b, &mut acquired)
            .unwrap();

        assert!(resolved.stops().is_empty());
    }

    #[test]
    fn focus_defaults_to_specified_center() {
        let geometry = RadialGeometry {
            cx: Some(Length::new(3.0, LengthUnit::Px)),
            ..Default::default()
        }
        .with_defaults();

        assert_eq!(geometry.fx, Length::new(3.0, LengthUnit::Px));
        assert_eq!(geometry.fy, percent(0.5));
        assert_eq!(geometry.fr, percent(0.0));
    }

    #[test]
    fn other_gradient_type_contributes_no_geometry() {
        let linear = Geometry::Linear(LinearGeometry::default());
        let radial = Geometry::Radial(RadialGeometry {
            r: Some(percent(0.2)),
            ..Default::default()
        });

        assert!(matches!(linear.or(radial), Geometry::Linear(g) if g.x1.is_none()));
    }

    #[test]
    fn object_bounding_box_units_need_a_box() {
        let gradient = PartialGradient {
            common: Common::default(),
            stops: None,
            geometry: Geometry::Linear(LinearGeometry::default()),
        }
        .with_defaults();

        let viewport = Viewport::new(Dpi::default(), 100.0, 100.0, Transform::identity());
        let values = State::default();

        assert!(gradient
            .to_user_space(&BoundingBox::new(), &viewport, &values)
            .is_none());

        let bbox = BoundingBox::new().with_rect(Rect::new(10.0, 20.0, 30.0, 60.0));
        let user = gradient.to_user_space(&bbox, &viewport, &values).unwrap();

        assert_eq!(user.transform.transform_point(1.0, 1.0), (30.0, 60.0));
        assert_eq!(
            user.variant,
            GradientVariant::Linear {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 0.0,
            }
        );
    }
}
