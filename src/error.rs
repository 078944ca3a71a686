//! Error types.

use std::fmt;

use cssparser::{BasicParseError, BasicParseErrorKind, ParseErrorKind, ToCss};
use markup5ever::QualName;

use crate::node::Node;

/// Error from parsing a value, tied to the lifetime of the parsed string.
///
/// [`AttributeResultExt::attribute`] turns it into an owned [`ElementError`].
pub type ParseError<'i> = cssparser::ParseError<'i, ValueErrorKind>;

/// What went wrong with a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueErrorKind {
    #[error("unknown property name")]
    UnknownProperty,

    /// The value is not well-formed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The value is well-formed but out of range or otherwise unacceptable.
    #[error("invalid value: {0}")]
    Value(String),
}

impl ValueErrorKind {
    pub fn parse_error(s: &str) -> ValueErrorKind {
        ValueErrorKind::Parse(s.to_string())
    }

    pub fn value_error(s: &str) -> ValueErrorKind {
        ValueErrorKind::Value(s.to_string())
    }
}

impl<'a> From<BasicParseError<'a>> for ValueErrorKind {
    fn from(e: BasicParseError<'_>) -> ValueErrorKind {
        ValueErrorKind::parse_error(match e.kind {
            BasicParseErrorKind::UnexpectedToken(_) => "unexpected token",
            BasicParseErrorKind::EndOfInput => "unexpected end of input",
            BasicParseErrorKind::AtRuleInvalid(_) => "invalid @-rule",
            BasicParseErrorKind::AtRuleBodyInvalid => "invalid @-rule body",
            BasicParseErrorKind::QualifiedRuleInvalid => "invalid qualified rule",
        })
    }
}

/// An invalid attribute value, with the attribute's name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}: {err}", attr.local)]
pub struct ElementError {
    pub attr: QualName,
    pub err: ValueErrorKind,
}

/// Errors that abort the rendering of a single element.
///
/// SVG rendering is lenient: none of these reach the caller of the public API.  They
/// are logged, and the element that caused them is skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderingError {
    /// A particular implementation-defined limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// An element references itself, directly or through other elements.
    #[error("circular reference to element {0:?}")]
    CircularReference(String),

    /// A transform could not be inverted.
    #[error("invalid transform")]
    InvalidTransform,

    /// Catch-all for other rendering problems.
    #[error("rendering error: {0}")]
    Rendering(String),
}

/// Errors returned when looking up a referenced node.
#[derive(Clone)]
pub enum AcquireError {
    /// An element with the specified id was not found.
    LinkNotFound(String),

    /// The element is not of the kind that the reference expects.
    InvalidLinkType(String),

    /// A reference cycle was detected.
    CircularReference(Node),

    /// Too many referenced objects were resolved while rendering.
    MaxReferencesExceeded,
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AcquireError::LinkNotFound(ref id) => write!(f, "link not found: #{}", id),

            AcquireError::InvalidLinkType(ref id) => {
                write!(f, "link #{} points to an element of the wrong type", id)
            }

            AcquireError::CircularReference(ref node) => {
                write!(f, "circular reference in node {}", node)
            }

            AcquireError::MaxReferencesExceeded => {
                write!(f, "maximum number of references exceeded")
            }
        }
    }
}

impl fmt::Debug for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<AcquireError> for RenderingError {
    fn from(e: AcquireError) -> RenderingError {
        match e {
            AcquireError::CircularReference(node) => {
                RenderingError::CircularReference(node.to_string())
            }

            AcquireError::MaxReferencesExceeded => {
                RenderingError::LimitExceeded("too many referenced elements".to_string())
            }

            // LinkNotFound and InvalidLinkType are ignored by the callers
            e => RenderingError::Rendering(e.to_string()),
        }
    }
}

/// Errors that can happen while loading an SVG document.
///
/// All of these codes are for unrecoverable errors that keep an SVG document from being
/// turned into a pixel buffer.  Note that SVG is very lenient with respect to document
/// structure and the syntax of CSS property values; most errors there will not lead to a
/// `LoadingError`.  To see those errors, you may want to set the `RSVG_LOG=1` environment
/// variable.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadingError {
    /// The input could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// XML syntax error.
    #[error("XML parse error: {0}")]
    XmlParseError(String),

    /// There is no `<svg>` element in the XML.
    #[error("XML does not have an <svg> element")]
    NoSvgRoot,

    /// A particular implementation-defined limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// `write()` or `close()` was called on a handle that was already closed.
    #[error("the handle is already closed")]
    AlreadyClosed,

    /// Catch-all for loading errors.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for LoadingError {
    fn from(e: std::io::Error) -> LoadingError {
        LoadingError::Io(e.to_string())
    }
}

/// Helper for converting `Result<O, E>` into `Result<O, ElementError>`
///
/// A `ElementError` requires a `QualName` that corresponds to the attribute to which the
/// error refers, plus the actual `ValueErrorKind` that describes the error.  However,
/// parsing functions for attribute value types will want to return their own kind of
/// error, instead of `ValueErrorKind`.  If that particular error type has an `impl
/// From<FooError> for ValueErrorKind`, then this trait helps assign attribute values in
/// `set_attributes()` methods.
pub trait AttributeResultExt<O> {
    fn attribute(self, attr: QualName) -> Result<O, ElementError>;
}

impl<O, E: Into<ValueErrorKind>> AttributeResultExt<O> for Result<O, E> {
    fn attribute(self, attr: QualName) -> Result<O, ElementError> {
        self.map_err(|e| e.into())
            .map_err(|err| ElementError { attr, err })
    }
}

/// Turns a short-lived `ParseError` into a long-lived `ElementError`
impl<'i, O> AttributeResultExt<O> for Result<O, ParseError<'i>> {
    fn attribute(self, attr: QualName) -> Result<O, ElementError> {
        self.map_err(|e| {
            let ParseError { kind, .. } = e;

            match kind {
                ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(tok)) => {
                    let mut s = String::from("unexpected token '");
                    // writing into a String cannot fail
                    let _ = tok.to_css(&mut s);
                    s.push('\'');

                    ElementError {
                        attr,
                        err: ValueErrorKind::Parse(s),
                    }
                }

                ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => ElementError {
                    attr,
                    err: ValueErrorKind::parse_error("unexpected end of input"),
                },

                ParseErrorKind::Basic(_) => ElementError {
                    attr,
                    err: ValueErrorKind::parse_error("unexpected CSS rule"),
                },

                ParseErrorKind::Custom(err) => ElementError { attr, err },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Parse;
    use markup5ever::{namespace_url, ns, LocalName};

    fn attr(name: &str) -> QualName {
        QualName::new(None, ns!(), LocalName::from(name))
    }

    #[test]
    fn parse_errors_keep_attribute_name() {
        let res: Result<f64, ElementError> = f64::parse_str("foo").attribute(attr("x"));
        let err = res.unwrap_err();

        assert_eq!(err.attr.local.as_ref(), "x");
        assert!(matches!(err.err, ValueErrorKind::Parse(_)));
        assert!(format!("{}", err).starts_with("x: parse error"));
    }

    #[test]
    fn value_errors_pass_through() {
        let res: Result<(), ElementError> =
            Err::<(), _>(ValueErrorKind::value_error("negative")).attribute(attr("r"));

        assert_eq!(
            res,
            Err(ElementError {
                attr: attr("r"),
                err: ValueErrorKind::Value("negative".to_string()),
            })
        );
    }

    #[test]
    fn io_errors_become_loading_errors() {
        let e = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(LoadingError::from(e), LoadingError::Io(_)));
    }
}
