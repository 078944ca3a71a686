//! The cascading style record that every element carries.
//!
//! A [`State`] is computed for each element when its start tag is processed: the
//! parent's state is cloned with [`State::for_child`], which resets the properties that
//! apply to the element as a whole, and then the element's own declarations are applied
//! in precedence order with [`State::set_property`].
//!
//! Property values come from three places, all parsed with [`parse_property`]:
//! presentation attributes, `<style>` rules, and the `style` attribute.

use cssparser::{Parser, ParserInput, Token};

use crate::color::{black, resolve_color, Color, RGBA};
use crate::dasharray::Dasharray;
use crate::error::*;
use crate::iri::{fragment_id, Iri};
use crate::length::*;
use crate::parse_identifiers;
use crate::parsers::{NumberOrPercentage, Parse};
use crate::rasterizer::FillRule;
use crate::stroke::{LineCap, LineJoin, StrokeParams, MIN_STROKE_WIDTH};
use crate::transform::Transform;
use crate::util::opacity_to_u8;

/// Font size of the root element, in pixels.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

pub const DEFAULT_FONT_FAMILY: &str = "Times New Roman";

/// A value for the `fill` or `stroke` properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    None,

    /// A reference to a paint server, with an optional fallback color.
    ///
    /// A fallback of `none` is stored as `None`, like a missing one; both mean that
    /// nothing is painted if the reference cannot be resolved.
    Iri {
        iri: String,
        alternate: Option<Color>,
    },

    SolidColor(Color),
}

impl Parse for Paint {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Paint, ParseError<'i>> {
        if parser
            .try_parse(|i| i.expect_ident_matching("none"))
            .is_ok()
        {
            return Ok(Paint::None);
        }

        let loc = parser.current_source_location();

        if let Ok(url) = parser.try_parse(|i| i.expect_url().map(|u| u.as_ref().to_string())) {
            let iri = fragment_id(&url).map(String::from).ok_or_else(|| {
                loc.new_custom_error(ValueErrorKind::value_error(
                    "expected a fragment identifier",
                ))
            })?;

            let alternate = if parser.is_exhausted() {
                None
            } else if parser
                .try_parse(|i| i.expect_ident_matching("none"))
                .is_ok()
            {
                None
            } else {
                Some(Color::parse(parser)?)
            };

            Ok(Paint::Iri { iri, alternate })
        } else {
            Ok(Paint::SolidColor(Color::parse(parser)?))
        }
    }
}

/// An opacity value, clamped to `[0, 1]` and stored as an integer in `0..=255`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Opacity(pub u8);

impl Parse for Opacity {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Opacity, ParseError<'i>> {
        let NumberOrPercentage(v) = NumberOrPercentage::parse(parser)?;
        Ok(Opacity(opacity_to_u8(v)))
    }
}

impl Parse for FillRule {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<FillRule, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "nonzero" => FillRule::NonZero,
            "evenodd" => FillRule::EvenOdd,
        )?)
    }
}

impl Parse for LineCap {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<LineCap, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "butt" => LineCap::Butt,
            "round" => LineCap::Round,
            "square" => LineCap::Square,
        )?)
    }
}

impl Parse for LineJoin {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<LineJoin, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "miter" => LineJoin::Miter,
            "round" => LineJoin::Round,
            "bevel" => LineJoin::Bevel,
        )?)
    }
}

/// `stroke-miterlimit`; must be at least 1.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MiterLimit(pub f64);

impl Parse for MiterLimit {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<MiterLimit, ParseError<'i>> {
        let loc = parser.current_source_location();
        let v = f64::parse(parser)?;

        if v >= 1.0 {
            Ok(MiterLimit(v))
        } else {
            Err(loc.new_custom_error(ValueErrorKind::value_error(
                "stroke-miterlimit must be >= 1",
            )))
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl Parse for TextAnchor {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<TextAnchor, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "start" => TextAnchor::Start,
            "middle" => TextAnchor::Middle,
            "end" => TextAnchor::End,
        )?)
    }
}

/// The `xml:space` attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum XmlSpace {
    #[default]
    Default,
    Preserve,
}

impl Parse for XmlSpace {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<XmlSpace, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "default" => XmlSpace::Default,
            "preserve" => XmlSpace::Preserve,
        )?)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Visibility(pub bool);

impl Parse for Visibility {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Visibility, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "visible" => Visibility(true),
            "hidden" => Visibility(false),
            "collapse" => Visibility(false),
        )?)
    }
}

/// The `display` property; only `none` has an effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Display(pub bool);

impl Parse for Display {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Display, ParseError<'i>> {
        let loc = parser.current_source_location();

        match parser.next()? {
            Token::Ident(ref s) if s.eq_ignore_ascii_case("none") => Ok(Display(false)),
            Token::Ident(_) => Ok(Display(true)),
            tok => Err(loc.new_basic_unexpected_token_error(tok.clone()).into()),
        }
    }
}

/// A specified `font-size`, before resolving it against the parent's size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FontSize {
    /// Pixels.
    Absolute(f64),

    /// A multiple of the parent's font size, from `em`, `ex` or percentages.
    Relative(f64),

    /// An absolute length that needs the DPI to be resolved.
    Length(ULength<Both>),
}

impl FontSize {
    fn compute(&self, parent: f64, dpi: Dpi) -> f64 {
        match *self {
            FontSize::Absolute(px) => px,
            FontSize::Relative(factor) => parent * factor,
            FontSize::Length(l) => l.normalize(&NormalizeParams::new(dpi, 0.0, 0.0, parent)),
        }
    }
}

impl Parse for FontSize {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<FontSize, ParseError<'i>> {
        if let Ok(size) = parser.try_parse(|p| {
            parse_identifiers!(
                p,
                "xx-small" => FontSize::Absolute(DEFAULT_FONT_SIZE * 3.0 / 5.0),
                "x-small" => FontSize::Absolute(DEFAULT_FONT_SIZE * 3.0 / 4.0),
                "small" => FontSize::Absolute(DEFAULT_FONT_SIZE * 8.0 / 9.0),
                "medium" => FontSize::Absolute(DEFAULT_FONT_SIZE),
                "large" => FontSize::Absolute(DEFAULT_FONT_SIZE * 6.0 / 5.0),
                "x-large" => FontSize::Absolute(DEFAULT_FONT_SIZE * 3.0 / 2.0),
                "xx-large" => FontSize::Absolute(DEFAULT_FONT_SIZE * 2.0),
                "larger" => FontSize::Relative(1.2),
                "smaller" => FontSize::Relative(1.0 / 1.2),
            )
        }) {
            return Ok(size);
        }

        let l = ULength::<Both>::parse(parser)?;

        Ok(match l.unit {
            LengthUnit::Percent | LengthUnit::Em => FontSize::Relative(l.length),
            LengthUnit::Ex => FontSize::Relative(l.length / 2.0),
            LengthUnit::Px => FontSize::Absolute(l.length),
            _ => FontSize::Length(l),
        })
    }
}

/// The value of `font-family`, kept as the authored list with quotes removed.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFamily(pub String);

impl Parse for FontFamily {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<FontFamily, ParseError<'i>> {
        let mut names = Vec::new();
        let mut current = Vec::new();

        loop {
            let loc = parser.current_source_location();

            match parser.next() {
                Ok(Token::Ident(s)) => current.push(s.as_ref().to_string()),
                Ok(Token::QuotedString(s)) => current.push(s.as_ref().to_string()),
                Ok(Token::Comma) => {
                    if !current.is_empty() {
                        names.push(current.join(" "));
                        current.clear();
                    }
                }
                Ok(tok) => return Err(loc.new_basic_unexpected_token_error(tok.clone()).into()),
                Err(_) => break,
            }
        }

        if !current.is_empty() {
            names.push(current.join(" "));
        }

        if names.is_empty() {
            let loc = parser.current_source_location();
            Err(loc.new_custom_error(ValueErrorKind::value_error("empty font-family")))
        } else {
            Ok(FontFamily(names.join(",")))
        }
    }
}

/// A parsed value for one of the supported properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    ClipPath(Iri),
    ClipRule(FillRule),
    Color(RGBA),
    Display(Display),
    Fill(Paint),
    FillOpacity(Opacity),
    FillRule(FillRule),
    Filter(Iri),
    FloodColor(Color),
    FloodOpacity(Opacity),
    FontFamily(FontFamily),
    FontSize(FontSize),
    LightingColor(Color),
    /// The `marker` shorthand, which sets all three markers.
    Marker(Iri),
    MarkerEnd(Iri),
    MarkerMid(Iri),
    MarkerStart(Iri),
    Mask(Iri),
    Opacity(Opacity),
    StopColor(Color),
    StopOpacity(Opacity),
    Stroke(Paint),
    StrokeDasharray(Dasharray),
    StrokeDashoffset(Length<Both>),
    StrokeLinecap(LineCap),
    StrokeLinejoin(LineJoin),
    StrokeMiterlimit(MiterLimit),
    StrokeOpacity(Opacity),
    StrokeWidth(ULength<Both>),
    TextAnchor(TextAnchor),
    Visibility(Visibility),
    XmlSpace(XmlSpace),
}

/// Returns whether `name` is a property that can be given as a presentation attribute.
pub fn is_presentation_attribute(name: &str) -> bool {
    name != "marker" && PROPERTY_NAMES.contains(&name)
}

// Keep in sync with `parse_property`.
const PROPERTY_NAMES: &[&str] = &[
    "clip-path",
    "clip-rule",
    "color",
    "display",
    "fill",
    "fill-opacity",
    "fill-rule",
    "filter",
    "flood-color",
    "flood-opacity",
    "font-family",
    "font-size",
    "lighting-color",
    "marker",
    "marker-end",
    "marker-mid",
    "marker-start",
    "mask",
    "opacity",
    "stop-color",
    "stop-opacity",
    "stroke",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "stroke-width",
    "text-anchor",
    "visibility",
];

/// Parses the value of the property called `name`.
///
/// Returns `ValueErrorKind::UnknownProperty` for names that are not supported.
pub fn parse_property<'i>(
    name: &str,
    input: &mut Parser<'i, '_>,
) -> Result<Property, ParseError<'i>> {
    let property = match name {
        "clip-path" => Property::ClipPath(Iri::parse(input)?),
        "clip-rule" => Property::ClipRule(FillRule::parse(input)?),
        "color" => Property::Color(RGBA::parse(input)?),
        "display" => Property::Display(Display::parse(input)?),
        "fill" => Property::Fill(Paint::parse(input)?),
        "fill-opacity" => Property::FillOpacity(Opacity::parse(input)?),
        "fill-rule" => Property::FillRule(FillRule::parse(input)?),
        "filter" => Property::Filter(Iri::parse(input)?),
        "flood-color" => Property::FloodColor(Color::parse(input)?),
        "flood-opacity" => Property::FloodOpacity(Opacity::parse(input)?),
        "font-family" => Property::FontFamily(FontFamily::parse(input)?),
        "font-size" => Property::FontSize(FontSize::parse(input)?),
        "lighting-color" => Property::LightingColor(Color::parse(input)?),
        "marker" => Property::Marker(Iri::parse(input)?),
        "marker-end" => Property::MarkerEnd(Iri::parse(input)?),
        "marker-mid" => Property::MarkerMid(Iri::parse(input)?),
        "marker-start" => Property::MarkerStart(Iri::parse(input)?),
        "mask" => Property::Mask(Iri::parse(input)?),
        "opacity" => Property::Opacity(Opacity::parse(input)?),
        "stop-color" => Property::StopColor(Color::parse(input)?),
        "stop-opacity" => Property::StopOpacity(Opacity::parse(input)?),
        "stroke" => Property::Stroke(Paint::parse(input)?),
        "stroke-dasharray" => Property::StrokeDasharray(Dasharray::parse(input)?),
        "stroke-dashoffset" => Property::StrokeDashoffset(Length::<Both>::parse(input)?),
        "stroke-linecap" => Property::StrokeLinecap(LineCap::parse(input)?),
        "stroke-linejoin" => Property::StrokeLinejoin(LineJoin::parse(input)?),
        "stroke-miterlimit" => Property::StrokeMiterlimit(MiterLimit::parse(input)?),
        "stroke-opacity" => Property::StrokeOpacity(Opacity::parse(input)?),
        "stroke-width" => Property::StrokeWidth(ULength::<Both>::parse(input)?),
        "text-anchor" => Property::TextAnchor(TextAnchor::parse(input)?),
        "visibility" => Property::Visibility(Visibility::parse(input)?),
        "xml:space" => Property::XmlSpace(XmlSpace::parse(input)?),
        _ => return Err(input.new_custom_error(ValueErrorKind::UnknownProperty)),
    };

    Ok(property)
}

/// Parses a whole attribute value as the property called `name`.
pub fn parse_property_str<'i>(name: &str, value: &'i str) -> Result<Property, ValueErrorKind> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);

    let result = parse_property(name, &mut parser).and_then(|p| {
        parser.expect_exhausted()?;
        Ok(p)
    });

    result.map_err(|e| match e.kind {
        cssparser::ParseErrorKind::Custom(kind) => kind,
        cssparser::ParseErrorKind::Basic(b) => ValueErrorKind::from(cssparser::BasicParseError {
            kind: b,
            location: e.location,
        }),
    })
}

/// The computed style of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// The element's own `transform`, relative to its parent's user space.  The
    /// accumulated user-to-device affine lives in `Viewport::transform`.
    pub transform: Transform,

    pub opacity: u8,
    pub fill: Paint,
    pub fill_opacity: u8,
    pub fill_rule: FillRule,
    pub stroke: Paint,
    pub stroke_opacity: u8,
    pub stroke_width: ULength<Both>,
    pub stroke_line_cap: LineCap,
    pub stroke_line_join: LineJoin,
    pub stroke_miterlimit: f64,
    pub stroke_dasharray: Dasharray,
    pub stroke_dashoffset: Length<Both>,
    pub font_size: f64,
    pub font_family: String,
    pub color: RGBA,
    pub stop_color: Color,
    pub stop_opacity: u8,
    pub flood_color: Color,
    pub flood_opacity: u8,
    pub lighting_color: Color,
    pub clip_path: Iri,
    pub clip_rule: FillRule,
    pub mask: Iri,
    pub filter: Iri,
    pub marker_start: Iri,
    pub marker_mid: Iri,
    pub marker_end: Iri,
    pub visible: bool,
    pub display: bool,
    pub text_anchor: TextAnchor,
    pub xml_space: XmlSpace,
}

impl Default for State {
    fn default() -> State {
        State {
            transform: Transform::identity(),
            opacity: 255,
            fill: Paint::SolidColor(Color::RGBA(black())),
            fill_opacity: 255,
            fill_rule: FillRule::NonZero,
            stroke: Paint::None,
            stroke_opacity: 255,
            stroke_width: ULength::new(1.0, LengthUnit::Px),
            stroke_line_cap: LineCap::Butt,
            stroke_line_join: LineJoin::Miter,
            stroke_miterlimit: 4.0,
            stroke_dasharray: Dasharray::None,
            stroke_dashoffset: Length::new(0.0, LengthUnit::Px),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: black(),
            stop_color: Color::RGBA(black()),
            stop_opacity: 255,
            flood_color: Color::RGBA(black()),
            flood_opacity: 255,
            lighting_color: Color::RGBA(RGBA::new(255, 255, 255, 255)),
            clip_path: Iri::None,
            clip_rule: FillRule::NonZero,
            mask: Iri::None,
            filter: Iri::None,
            marker_start: Iri::None,
            marker_mid: Iri::None,
            marker_end: Iri::None,
            visible: true,
            display: true,
            text_anchor: TextAnchor::Start,
            xml_space: XmlSpace::Default,
        }
    }
}

impl State {
    /// The starting point for a child's state.
    ///
    /// Properties that apply to an element as a group are reset to their initial values;
    /// everything else is inherited.
    pub fn for_child(&self) -> State {
        let initial = State::default();

        State {
            transform: initial.transform,
            opacity: initial.opacity,
            clip_path: initial.clip_path,
            mask: initial.mask,
            filter: initial.filter,
            stop_color: initial.stop_color,
            stop_opacity: initial.stop_opacity,
            flood_color: initial.flood_color,
            flood_opacity: initial.flood_opacity,
            display: initial.display,
            ..self.clone()
        }
    }

    /// Applies one property.
    ///
    /// Relative font sizes are resolved against `parent_font_size`, not against the
    /// current value, so that applying several declarations does not compound them.
    pub fn set_property(&mut self, property: &Property, parent_font_size: f64, dpi: Dpi) {
        match *property {
            Property::ClipPath(ref v) => self.clip_path = v.clone(),
            Property::ClipRule(v) => self.clip_rule = v,
            Property::Color(v) => self.color = v,
            Property::Display(Display(v)) => self.display = v,
            Property::Fill(ref v) => self.fill = v.clone(),
            Property::FillOpacity(Opacity(v)) => self.fill_opacity = v,
            Property::FillRule(v) => self.fill_rule = v,
            Property::Filter(ref v) => self.filter = v.clone(),
            Property::FloodColor(v) => self.flood_color = v,
            Property::FloodOpacity(Opacity(v)) => self.flood_opacity = v,
            Property::FontFamily(FontFamily(ref v)) => self.font_family = v.clone(),
            Property::FontSize(ref v) => self.font_size = v.compute(parent_font_size, dpi),
            Property::LightingColor(v) => self.lighting_color = v,
            Property::Marker(ref v) => {
                self.marker_start = v.clone();
                self.marker_mid = v.clone();
                self.marker_end = v.clone();
            }
            Property::MarkerEnd(ref v) => self.marker_end = v.clone(),
            Property::MarkerMid(ref v) => self.marker_mid = v.clone(),
            Property::MarkerStart(ref v) => self.marker_start = v.clone(),
            Property::Mask(ref v) => self.mask = v.clone(),
            Property::Opacity(Opacity(v)) => self.opacity = v,
            Property::StopColor(v) => self.stop_color = v,
            Property::StopOpacity(Opacity(v)) => self.stop_opacity = v,
            Property::Stroke(ref v) => self.stroke = v.clone(),
            Property::StrokeDasharray(ref v) => self.stroke_dasharray = v.clone(),
            Property::StrokeDashoffset(v) => self.stroke_dashoffset = v,
            Property::StrokeLinecap(v) => self.stroke_line_cap = v,
            Property::StrokeLinejoin(v) => self.stroke_line_join = v,
            Property::StrokeMiterlimit(MiterLimit(v)) => self.stroke_miterlimit = v,
            Property::StrokeOpacity(Opacity(v)) => self.stroke_opacity = v,
            Property::StrokeWidth(v) => self.stroke_width = v,
            Property::TextAnchor(v) => self.text_anchor = v,
            Property::Visibility(Visibility(v)) => self.visible = v,
            Property::XmlSpace(v) => self.xml_space = v,
        }
    }

    pub fn is_displayed(&self) -> bool {
        self.display
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Resolves `currentColor` in a color property.
    pub fn resolve(&self, color: &Color) -> RGBA {
        resolve_color(color, self.color)
    }

    /// Stroke parameters in device units, for a path drawn with `transform`.
    ///
    /// Returns `None` if the stroke width is zero, in which case nothing is stroked.
    pub fn stroke_params(
        &self,
        params: &NormalizeParams,
        transform: &Transform,
    ) -> Option<StrokeParams> {
        let width = self.stroke_width.normalize(params);
        if width <= 0.0 {
            return None;
        }

        let factor = transform.expansion_factor();

        let dashes = self.stroke_dasharray.normalize(params).map(|dashes| {
            let dashes: Vec<f64> = dashes.iter().map(|d| d * factor).collect();
            let offset = self.stroke_dashoffset.normalize(params).max(0.0) * factor;
            (dashes, offset)
        });

        Some(StrokeParams {
            width: (width * factor).max(MIN_STROKE_WIDTH),
            cap: self.stroke_line_cap,
            join: self.stroke_line_join,
            miter_limit: self.stroke_miterlimit,
            dashes,
        })
    }
}
