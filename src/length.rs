//! Lengths with units, and how they resolve to user-space units.
//!
//! A [`CssLength`] carries two marker type parameters.  The first, [`Normalize`], says
//! which viewport dimension a percentage refers to: [`Horizontal`] lengths use the
//! width, [`Vertical`] ones the height, and [`Both`] the normalized diagonal.  The
//! second, [`Validate`], says whether negative values are allowed.  The aliases
//! [`Length`] and [`ULength`] cover the signed and unsigned cases.
//!
//! A circle, for example, looks like this:
//!
//! ```
//! # use rsvg::doctest_only::{Length,ULength,Horizontal,Vertical,Both};
//! pub struct Circle {
//!     cx: Length<Horizontal>,
//!     cy: Length<Vertical>,
//!     r: ULength<Both>,
//! }
//! ```

use cssparser::{Parser, Token};
use std::f64::consts::SQRT_2;
use std::marker::PhantomData;

use crate::error::*;
use crate::parsers::{finite_f32, Parse};

/// Units for length values.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum LengthUnit {
    /// Fraction of the viewport; `1.0` is 100%.
    Percent,

    /// User units; also what a bare number means.
    Px,

    /// The computed font size.
    Em,

    /// Half of the computed font size.
    Ex,

    In,
    Cm,
    Mm,

    /// 1/72 inch.
    Pt,

    /// 12 points.
    Pc,
}

impl LengthUnit {
    fn from_dimension(unit: &str) -> Option<LengthUnit> {
        use LengthUnit::*;

        let unit = match unit {
            "px" => Px,
            "em" => Em,
            "ex" => Ex,
            "in" => In,
            "cm" => Cm,
            "mm" => Mm,
            "pt" => Pt,
            "pc" => Pc,
            _ => return None,
        };

        Some(unit)
    }

    /// How many of this unit make an inch, for physical units.
    fn per_inch(self) -> Option<f64> {
        use LengthUnit::*;

        match self {
            In => Some(1.0),
            Cm => Some(2.54),
            Mm => Some(25.4),
            Pt => Some(POINTS_PER_INCH),
            Pc => Some(6.0),
            Percent | Px | Em | Ex => None,
        }
    }
}

/// Resolution used to convert physical units into pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Dpi {
    pub x: f64,
    pub y: f64,
}

impl Dpi {
    pub fn new(x: f64, y: f64) -> Dpi {
        Dpi { x, y }
    }
}

/// The resolution used when none is configured.
pub const DEFAULT_DPI: f64 = 90.0;

pub const POINTS_PER_INCH: f64 = 72.0;

impl Default for Dpi {
    fn default() -> Dpi {
        Dpi::new(DEFAULT_DPI, DEFAULT_DPI)
    }
}

/// Everything needed to turn a [`CssLength`] into user-space units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NormalizeParams {
    /// Width of the current viewport, for percentages.
    pub vbox_width: f64,

    /// Height of the current viewport, for percentages.
    pub vbox_height: f64,

    /// Computed font size in pixels, for `em` and `ex`.
    pub font_size: f64,

    pub dpi: Dpi,
}

impl NormalizeParams {
    pub fn new(dpi: Dpi, vbox_width: f64, vbox_height: f64, font_size: f64) -> NormalizeParams {
        NormalizeParams {
            vbox_width,
            vbox_height,
            font_size,
            dpi,
        }
    }

    /// Parameters for resolving lengths in object bounding box units, where the
    /// "viewport" is the unit square.
    pub fn for_bbox_units(&self) -> NormalizeParams {
        NormalizeParams {
            vbox_width: 1.0,
            vbox_height: 1.0,
            ..*self
        }
    }
}

/// Picks the viewport dimension that a length refers to.
pub trait Normalize {
    /// Chooses between (or combines) a horizontal and a vertical quantity.
    ///
    /// Used both for viewport sizes, with percentages, and for resolutions.
    fn normalize(x: f64, y: f64) -> f64;
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Horizontal;

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Vertical;

/// Lengths that are neither horizontal nor vertical, like a circle's radius.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Both;

impl Normalize for Horizontal {
    #[inline]
    fn normalize(x: f64, _y: f64) -> f64 {
        x
    }
}

impl Normalize for Vertical {
    #[inline]
    fn normalize(_x: f64, y: f64) -> f64 {
        y
    }
}

impl Normalize for Both {
    /// The normalized diagonal, `sqrt(x² + y²) / sqrt(2)`.
    ///
    /// See <https://www.w3.org/TR/SVG/coords.html#Units>
    #[inline]
    fn normalize(x: f64, y: f64) -> f64 {
        x.hypot(y) / SQRT_2
    }
}

/// Range check applied when parsing a length.
pub trait Validate {
    fn validate(v: f64) -> Result<f64, ValueErrorKind> {
        Ok(v)
    }
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Signed;

impl Validate for Signed {}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Unsigned;

impl Validate for Unsigned {
    fn validate(v: f64) -> Result<f64, ValueErrorKind> {
        if v >= 0.0 {
            Ok(v)
        } else {
            Err(ValueErrorKind::value_error("value must be non-negative"))
        }
    }
}

/// A number with a unit, not yet resolved against a viewport or a font.
///
/// Use [`normalize`](#method.normalize) at render time to get user-space units.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct CssLength<N: Normalize, V: Validate> {
    pub length: f64,

    pub unit: LengthUnit,

    orientation: PhantomData<N>,

    validation: PhantomData<V>,
}

impl<N: Normalize, V: Validate> Default for CssLength<N, V> {
    fn default() -> Self {
        CssLength::new(0.0, LengthUnit::Px)
    }
}

impl<N: Normalize, V: Validate> Parse for CssLength<N, V> {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<CssLength<N, V>, ParseError<'i>> {
        let token = parser.next()?.clone();

        let (value, unit) = match token {
            Token::Number { value, .. } => (value, Some(LengthUnit::Px)),
            Token::Percentage { unit_value, .. } => (unit_value, Some(LengthUnit::Percent)),
            Token::Dimension {
                value, ref unit, ..
            } => (value, LengthUnit::from_dimension(unit)),
            _ => (0.0, None),
        };

        let unit = match unit {
            Some(u) => u,
            None => return Err(parser.new_unexpected_token_error(token)),
        };

        finite_f32(value)
            .and_then(|v| V::validate(f64::from(v)))
            .map(|v| CssLength::new(v, unit))
            .map_err(|e| parser.new_custom_error(e))
    }
}

impl<N: Normalize, V: Validate> CssLength<N, V> {
    /// Creates a length; the marker types usually come from the destination's type.
    ///
    /// ```
    /// # use rsvg::doctest_only::{Length,LengthUnit,Horizontal,Vertical};
    /// let width: Length<Horizontal> = Length::new(42.0, LengthUnit::Cm);
    /// let height = Length::<Vertical>::new(42.0, LengthUnit::Cm);
    /// ```
    pub fn new(l: f64, unit: LengthUnit) -> CssLength<N, V> {
        CssLength {
            length: l,
            unit,
            orientation: PhantomData,
            validation: PhantomData,
        }
    }

    /// Resolves the length to user-space units.
    pub fn normalize(&self, params: &NormalizeParams) -> f64 {
        match self.unit {
            LengthUnit::Px => self.length,

            LengthUnit::Percent => {
                self.length * N::normalize(params.vbox_width, params.vbox_height)
            }

            LengthUnit::Em => self.length * params.font_size,

            LengthUnit::Ex => self.length * params.font_size / 2.0,

            physical => {
                let dpi = N::normalize(params.dpi.x, params.dpi.y);
                let per_inch = physical.per_inch().unwrap_or(1.0);

                self.length * dpi / per_inch
            }
        }
    }

    /// Converts the orientation/validation of this length, keeping its value.
    pub fn to_other<N2: Normalize, V2: Validate>(self) -> CssLength<N2, V2> {
        CssLength::new(self.length, self.unit)
    }
}

/// Alias for `CssLength` types that can have negative values
pub type Length<N> = CssLength<N, Signed>;

/// Alias for `CssLength` types that are non negative
pub type ULength<N> = CssLength<N, Unsigned>;

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn parses_every_unit() {
        let cases = [
            ("12", 12.0, LengthUnit::Px),
            ("-3.5px", -3.5, LengthUnit::Px),
            ("25%", 0.25, LengthUnit::Percent),
            ("2em", 2.0, LengthUnit::Em),
            ("2ex", 2.0, LengthUnit::Ex),
            ("1in", 1.0, LengthUnit::In),
            ("2.5cm", 2.5, LengthUnit::Cm),
            ("-10mm", -10.0, LengthUnit::Mm),
            ("36pt", 36.0, LengthUnit::Pt),
            ("3pc", 3.0, LengthUnit::Pc),
        ];

        for (s, length, unit) in cases.iter() {
            assert_eq!(
                Length::<Both>::parse_str(s).unwrap(),
                Length::<Both>::new(*length, *unit),
                "{}",
                s
            );
        }
    }

    #[test]
    fn rejects_bad_lengths() {
        for s in &["", "px", "3 px", "4furlongs", "1e50", "auto"] {
            assert!(Length::<Horizontal>::parse_str(s).is_err(), "{}", s);
        }
    }

    #[test]
    fn unsigned_lengths_reject_negatives() {
        assert_eq!(
            ULength::<Vertical>::parse_str("0").unwrap(),
            ULength::<Vertical>::new(0.0, LengthUnit::Px)
        );
        assert!(ULength::<Vertical>::parse_str("-1").is_err());
        assert!(ULength::<Vertical>::parse_str("-1%").is_err());
    }

    #[test]
    fn physical_units_use_the_resolution_of_their_axis() {
        let params = NormalizeParams::new(Dpi::new(72.0, 144.0), 0.0, 0.0, 0.0);

        let x = |l, u| Length::<Horizontal>::new(l, u).normalize(&params);
        let y = |l, u| Length::<Vertical>::new(l, u).normalize(&params);

        assert!(approx_eq!(f64, x(2.0, LengthUnit::In), 144.0));
        assert!(approx_eq!(f64, y(2.0, LengthUnit::In), 288.0));
        assert!(approx_eq!(f64, x(36.0, LengthUnit::Pt), 36.0));
        assert!(approx_eq!(f64, x(1.0, LengthUnit::Pc), 12.0));
        assert!(approx_eq!(f64, x(25.4, LengthUnit::Mm), 72.0));
        assert!(approx_eq!(f64, y(2.54, LengthUnit::Cm), 144.0));
    }

    #[test]
    fn default_resolution_is_90_dpi() {
        let params = NormalizeParams::new(Dpi::default(), 0.0, 0.0, 0.0);
        let inch = Length::<Both>::new(1.0, LengthUnit::In);

        assert!(approx_eq!(f64, inch.normalize(&params), 90.0));
    }

    #[test]
    fn percentages_follow_orientation() {
        let params = NormalizeParams::new(Dpi::default(), 60.0, 80.0, 0.0);
        let half = |l: Length<Both>| l.to_other::<Horizontal, Signed>().normalize(&params);

        assert!(approx_eq!(f64, half(Length::new(0.5, LengthUnit::Percent)), 30.0));
        assert!(approx_eq!(
            f64,
            Length::<Vertical>::new(0.5, LengthUnit::Percent).normalize(&params),
            40.0
        ));
        // the diagonal of a 60×80 viewport is 100
        assert!(approx_eq!(
            f64,
            Length::<Both>::new(1.0, LengthUnit::Percent).normalize(&params),
            100.0 / SQRT_2
        ));
    }

    #[test]
    fn bbox_units_use_unit_square() {
        let params = NormalizeParams::new(Dpi::default(), 60.0, 80.0, 10.0).for_bbox_units();

        assert!(approx_eq!(
            f64,
            Length::<Vertical>::new(0.25, LengthUnit::Percent).normalize(&params),
            0.25
        ));
    }

    #[test]
    fn font_relative_units() {
        let params = NormalizeParams::new(Dpi::default(), 0.0, 0.0, 16.0);

        assert!(approx_eq!(
            f64,
            Length::<Both>::new(1.5, LengthUnit::Em).normalize(&params),
            24.0
        ));
        assert!(approx_eq!(
            f64,
            Length::<Both>::new(1.5, LengthUnit::Ex).normalize(&params),
            12.0
        ));
    }
}
