//! CSS color values.

use cssparser::Parser;

use crate::error::*;
use crate::parsers::Parse;
use crate::util::mul_div_255;

pub use cssparser::{Color, RGBA};

impl Parse for cssparser::Color {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<cssparser::Color, ParseError<'i>> {
        Ok(cssparser::Color::parse(parser)?)
    }
}

impl Parse for cssparser::RGBA {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<cssparser::RGBA, ParseError<'i>> {
        let loc = parser.current_source_location();

        match cssparser::Color::parse(parser)? {
            cssparser::Color::RGBA(rgba) => Ok(rgba),
            cssparser::Color::CurrentColor => Err(loc.new_custom_error(ValueErrorKind::Value(
                "currentColor is not allowed here".to_string(),
            ))),
        }
    }
}

/// Resolves `currentColor` against the value of the `color` property.
pub fn resolve_color(color: &Color, current_color: RGBA) -> RGBA {
    match *color {
        Color::RGBA(rgba) => rgba,
        Color::CurrentColor => current_color,
    }
}

/// Returns `rgba` with its alpha multiplied by `opacity`.
pub fn with_opacity(rgba: RGBA, opacity: u8) -> RGBA {
    RGBA::new(rgba.red, rgba.green, rgba.blue, mul_div_255(rgba.alpha, opacity))
}

pub fn black() -> RGBA {
    RGBA::new(0, 0, 0, 255)
}
