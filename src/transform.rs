//! Handling of `transform` values.
//!
//! This module handles `transform` values [per the SVG specification][spec].
//!
//! [spec]:  https://www.w3.org/TR/SVG11/coords.html#TransformAttribute

use cssparser::{Parser, Token};

use crate::angle::Angle;
use crate::error::*;
use crate::parsers::{optional_comma, Parse};
use crate::rect::Rect;

/// An affine transform in the cairo convention.
///
/// A point `(x, y)` maps to `(xx * x + xy * y + x0, yx * x + yy * y + y0)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Transform {
    /// Builds a transform from its coefficients, which may be singular.
    #[inline]
    pub fn new_unchecked(xx: f64, yx: f64, xy: f64, yy: f64, x0: f64, y0: f64) -> Self {
        Transform { xx, yx, xy, yy, x0, y0 }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::new_scale(1.0, 1.0)
    }

    #[inline]
    pub fn new_translate(tx: f64, ty: f64) -> Self {
        Transform {
            x0: tx,
            y0: ty,
            ..Self::identity()
        }
    }

    #[inline]
    pub fn new_scale(sx: f64, sy: f64) -> Self {
        Self::new_unchecked(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `a`, clockwise in the y-down coordinate system.
    pub fn new_rotate(a: Angle) -> Self {
        let (sin, cos) = a.radians().sin_cos();
        Self::new_unchecked(cos, sin, -sin, cos, 0.0, 0.0)
    }

    pub fn new_skew(ax: Angle, ay: Angle) -> Self {
        Self::new_unchecked(1.0, ay.radians().tan(), ax.radians().tan(), 1.0, 0.0, 0.0)
    }

    /// The transform that applies `t1` and then `t2`.
    #[must_use]
    pub fn multiply(t1: &Transform, t2: &Transform) -> Self {
        let (xx, yx) = t2.transform_distance(t1.xx, t1.yx);
        let (xy, yy) = t2.transform_distance(t1.xy, t1.yy);
        let (x0, y0) = t2.transform_point(t1.x0, t1.y0);

        Transform { xx, yx, xy, yy, x0, y0 }
    }

    /// Returns `t` followed by `self`; points go through `t` first.
    #[inline]
    pub fn pre_transform(&self, t: &Transform) -> Self {
        Self::multiply(t, self)
    }

    /// Returns `self` followed by `t`.
    #[inline]
    pub fn post_transform(&self, t: &Transform) -> Self {
        Self::multiply(self, t)
    }

    #[inline]
    pub fn pre_translate(&self, x: f64, y: f64) -> Self {
        self.pre_transform(&Transform::new_translate(x, y))
    }

    #[inline]
    pub fn pre_scale(&self, sx: f64, sy: f64) -> Self {
        self.pre_transform(&Transform::new_scale(sx, sy))
    }

    #[inline]
    pub fn pre_rotate(&self, angle: Angle) -> Self {
        self.pre_transform(&Transform::new_rotate(angle))
    }

    fn determinant(&self) -> f64 {
        self.xx * self.yy - self.xy * self.yx
    }

    /// A transform with a zero or non-finite determinant collapses space and cannot
    /// be used for rendering.
    #[inline]
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det != 0.0 && det.is_finite()
    }

    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        if !self.is_invertible() {
            return None;
        }

        let inv_det = self.determinant().recip();

        let linear = Transform::new_unchecked(
            self.yy * inv_det,
            -self.yx * inv_det,
            -self.xy * inv_det,
            self.xx * inv_det,
            0.0,
            0.0,
        );

        // undo the translation, then the linear part
        let (x0, y0) = linear.transform_distance(-self.x0, -self.y0);

        Some(Transform { x0, y0, ..linear })
    }

    /// Applies the linear part only, as for a vector between two points.
    #[inline]
    pub fn transform_distance(&self, dx: f64, dy: f64) -> (f64, f64) {
        (self.xx * dx + self.xy * dy, self.yx * dx + self.yy * dy)
    }

    #[inline]
    pub fn transform_point(&self, px: f64, py: f64) -> (f64, f64) {
        let (dx, dy) = self.transform_distance(px, py);
        (self.x0 + dx, self.y0 + dy)
    }

    /// Scale factor for lengths without an orientation, like stroke widths: the
    /// geometric mean of the scale factors along both axes.
    #[inline]
    pub fn expansion_factor(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    /// Bounding box of the transformed corners of `rect`.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            (rect.x0, rect.y0),
            (rect.x1, rect.y0),
            (rect.x0, rect.y1),
            (rect.x1, rect.y1),
        ];

        let (x, y) = self.transform_point(rect.x0, rect.y0);
        let first = Rect::new(x, y, x, y);

        corners[1..].iter().fold(first, |r, &(cx, cy)| {
            let (x, y) = self.transform_point(cx, cy);
            Rect::new(r.x0.min(x), r.y0.min(y), r.x1.max(x), r.y1.max(y))
        })
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Transform {
        Transform::identity()
    }
}

impl Parse for Transform {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Transform, ParseError<'i>> {
        let loc = parser.current_source_location();

        let mut t = Transform::identity();

        while !parser.is_exhausted() {
            // each new function applies before the ones to its left
            t = parse_transform_function(parser)?.post_transform(&t);
            optional_comma(parser);
        }

        if !t.is_invertible() {
            return Err(loc.new_custom_error(ValueErrorKind::value_error(
                "invalid transformation matrix",
            )));
        }

        Ok(t)
    }
}

/// Parses one `name(args)` item of a transform list.
fn parse_transform_function<'i>(parser: &mut Parser<'i, '_>) -> Result<Transform, ParseError<'i>> {
    let loc = parser.current_source_location();

    let name = match parser.next()?.clone() {
        Token::Function(name) => name,

        // allow whitespace between the name and the parenthesis, as in "scale (2)"
        Token::Ident(name) => {
            parser.expect_parenthesis_block()?;
            name
        }

        tok => return Err(loc.new_unexpected_token_error(tok)),
    };

    let args = parser.parse_nested_block(|p| parse_arguments(p))?;

    let t = match (name.as_ref(), args.as_slice()) {
        ("matrix", &[xx, yx, xy, yy, x0, y0]) => Transform::new_unchecked(xx, yx, xy, yy, x0, y0),

        ("translate", &[tx]) => Transform::new_translate(tx, 0.0),
        ("translate", &[tx, ty]) => Transform::new_translate(tx, ty),

        ("scale", &[s]) => Transform::new_scale(s, s),
        ("scale", &[sx, sy]) => Transform::new_scale(sx, sy),

        ("rotate", &[deg]) => Transform::new_rotate(Angle::from_degrees(deg)),
        ("rotate", &[deg, cx, cy]) => Transform::new_translate(cx, cy)
            .pre_rotate(Angle::from_degrees(deg))
            .pre_translate(-cx, -cy),

        ("skewX", &[deg]) => Transform::new_skew(Angle::from_degrees(deg), Angle::new(0.0)),
        ("skewY", &[deg]) => Transform::new_skew(Angle::new(0.0), Angle::from_degrees(deg)),

        _ => {
            return Err(loc.new_custom_error(ValueErrorKind::parse_error(
                "expected matrix(6)|translate(1-2)|scale(1-2)|rotate(1|3)|skewX(1)|skewY(1)",
            )))
        }
    };

    Ok(t)
}

/// Parses the comma or whitespace separated numbers inside a transform function.
fn parse_arguments<'i>(parser: &mut Parser<'i, '_>) -> Result<Vec<f64>, ParseError<'i>> {
    let mut args = Vec::with_capacity(6);

    args.push(f64::parse(parser)?);

    while !parser.is_exhausted() {
        optional_comma(parser);
        args.push(f64::parse(parser)?);
    }

    Ok(args)
}
