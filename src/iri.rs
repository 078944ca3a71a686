//! CSS funciri values, as in `fill="url(#gradient)"`.

use cssparser::Parser;

use crate::error::*;
use crate::parsers::Parse;

/// Used where style properties take a funciri or "none"
///
/// Only same-document references are supported, so the value is just the id of the
/// referenced element.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Iri {
    #[default]
    None,
    Resource(String),
}

impl Iri {
    /// Returns the referenced id, or `None`
    pub fn get(&self) -> Option<&str> {
        match *self {
            Iri::None => None,
            Iri::Resource(ref id) => Some(id),
        }
    }
}

/// Extracts the element id out of a same-document reference like `#foo`.
///
/// A reference to another document (`file.svg#foo`) yields the part after the `#`
/// as well, as only the current document can be searched.
pub fn fragment_id(s: &str) -> Option<&str> {
    let s = s.trim();
    let (_, id) = s.split_once('#')?;

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

impl Parse for Iri {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Iri, ParseError<'i>> {
        if parser
            .try_parse(|i| i.expect_ident_matching("none"))
            .is_ok()
        {
            Ok(Iri::None)
        } else {
            let loc = parser.current_source_location();
            let url = parser.expect_url()?;

            fragment_id(&url)
                .map(|id| Iri::Resource(id.to_string()))
                .ok_or_else(|| {
                    loc.new_custom_error(ValueErrorKind::value_error(
                        "expected a fragment identifier",
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_none() {
        assert_eq!(Iri::parse_str("none").unwrap(), Iri::None);
    }

    #[test]
    fn parses_url() {
        assert_eq!(
            Iri::parse_str("url(#bar)").unwrap(),
            Iri::Resource("bar".to_string())
        );

        assert_eq!(
            Iri::parse_str("url(foo#bar)").unwrap(),
            Iri::Resource("bar".to_string())
        );

        assert_eq!(
            Iri::parse_str("url(\"#bar\")").unwrap(),
            Iri::Resource("bar".to_string())
        );

        assert!(Iri::parse_str("url(foo)").is_err());
        assert!(Iri::parse_str("").is_err());
    }

    #[test]
    fn extracts_fragments() {
        assert_eq!(fragment_id("#a"), Some("a"));
        assert_eq!(fragment_id(" other.svg#b "), Some("b"));
        assert_eq!(fragment_id("foo.png"), None);
        assert_eq!(fragment_id("#"), None);
    }
}
