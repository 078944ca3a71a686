//! CSS angle values.

use std::f64::consts::*;

use cssparser::{Parser, Token};
use float_cmp::approx_eq;

use crate::error::*;
use crate::parsers::{finite_f32, Parse};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Angle(f64);

impl Angle {
    pub fn new(rad: f64) -> Angle {
        Angle(Angle::normalize(rad))
    }

    pub fn from_degrees(deg: f64) -> Angle {
        Angle(Angle::normalize(deg.to_radians()))
    }

    /// The direction of the vector `(vx, vy)`; a zero vector has angle 0.
    pub fn from_vector(vx: f64, vy: f64) -> Angle {
        let rad = vy.atan2(vx);

        if rad.is_nan() {
            Angle(0.0)
        } else {
            Angle(Angle::normalize(rad))
        }
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn degrees(self) -> f64 {
        self.0.to_degrees()
    }

    // Normalizes an angle to [0.0, 2*PI)
    fn normalize(rad: f64) -> f64 {
        let res = rad % (PI * 2.0);
        if approx_eq!(f64, res, 0.0) {
            0.0
        } else if res < 0.0 {
            res + PI * 2.0
        } else {
            res
        }
    }
}

// angle:
// https://www.w3.org/TR/SVG/types.html#DataTypeAngle
//
// angle ::= number ("deg" | "grad" | "rad")?
//
impl Parse for Angle {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Angle, ParseError<'i>> {
        let loc = parser.current_source_location();

        let token = parser.next()?;

        match *token {
            Token::Number { value, .. } => {
                let degrees = finite_f32(value).map_err(|e| loc.new_custom_error(e))?;
                Ok(Angle::from_degrees(f64::from(degrees)))
            }

            Token::Dimension {
                value, ref unit, ..
            } => {
                let value = f64::from(finite_f32(value).map_err(|e| loc.new_custom_error(e))?);

                match unit.as_ref() {
                    "deg" => Ok(Angle::from_degrees(value)),
                    "grad" => Ok(Angle::from_degrees(value * 360.0 / 400.0)),
                    "rad" => Ok(Angle::new(value)),
                    "turn" => Ok(Angle::from_degrees(value * 360.0)),
                    _ => Err(loc.new_unexpected_token_error(token.clone())),
                }
            }

            _ => Err(loc.new_unexpected_token_error(token.clone())),
        }
    }
}
