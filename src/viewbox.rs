//! The `viewBox` attribute.

use cssparser::Parser;
use std::ops::Deref;

use crate::error::*;
use crate::parsers::{NumberList, NumberListLength, Parse};
use crate::rect::Rect;

/// The rectangle of user space that a viewport shows, from a `viewBox` attribute.
///
/// Derefs to [`Rect`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewBox(Rect);

impl Deref for ViewBox {
    type Target = Rect;

    fn deref(&self) -> &Rect {
        &self.0
    }
}

impl From<Rect> for ViewBox {
    fn from(r: Rect) -> ViewBox {
        ViewBox(r)
    }
}

/// `min-x min-y width height`, separated by whitespace and/or commas; negative sizes
/// are an error.
impl Parse for ViewBox {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<ViewBox, ParseError<'i>> {
        let loc = parser.current_source_location();

        match NumberList::parse(parser, NumberListLength::Exact(4))?.0[..] {
            [x, y, w, h] if w >= 0.0 && h >= 0.0 => Ok(ViewBox(Rect::from_xywh(x, y, w, h))),
            _ => Err(loc.new_custom_error(ValueErrorKind::value_error(
                "viewBox width and height must not be negative",
            ))),
        }
    }
}
