//! Parser for the `stroke-dasharray` property.

use cssparser::Parser;

use crate::error::*;
use crate::length::*;
use crate::parsers::{optional_comma, Parse};

#[derive(Debug, Default, PartialEq, Clone)]
pub enum Dasharray {
    #[default]
    None,
    Array(Box<[Length<Both>]>),
}

impl Parse for Dasharray {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Dasharray, ParseError<'i>> {
        if parser
            .try_parse(|p| p.expect_ident_matching("none"))
            .is_ok()
        {
            return Ok(Dasharray::None);
        }

        let mut dasharray = Vec::new();

        loop {
            dasharray.push(Length::<Both>::parse(parser)?);

            if parser.is_exhausted() {
                break;
            }

            optional_comma(parser);
        }

        Ok(Dasharray::Array(dasharray.into_boxed_slice()))
    }
}

impl Dasharray {
    /// Resolves the dash lengths into user-space units.
    ///
    /// An odd number of entries is repeated to yield an even number.  Returns `None`,
    /// meaning a solid stroke, for `none`, for any negative entry, or if all entries
    /// add up to zero.
    pub fn normalize(&self, params: &NormalizeParams) -> Option<Vec<f64>> {
        let lengths = match *self {
            Dasharray::None => return None,
            Dasharray::Array(ref a) => a,
        };

        let mut dashes: Vec<f64> = lengths.iter().map(|l| l.normalize(params)).collect();

        if dashes.iter().any(|&d| d < 0.0 || !d.is_finite()) {
            return None;
        }

        if dashes.iter().sum::<f64>() <= 0.0 {
            return None;
        }

        if dashes.len() % 2 == 1 {
            dashes.extend_from_within(..);
        }

        Some(dashes)
    }
}
