//! Store XML element attributes and their values.

use std::slice;

use markup5ever::{expanded_name, local_name, namespace_url, ns, LocalName, Prefix, QualName};
use string_cache::DefaultAtom;

use crate::error::LoadingError;

/// Type used to store attribute values.
///
/// Attribute values are often repeated in an SVG file, so we intern them using the
/// string_cache crate.
pub type AttributeValue = DefaultAtom;

/// Elements with more attributes than this are rejected as a loading error.
pub const MAX_LOADED_ATTRIBUTES: usize = u16::MAX as usize;

/// The attributes of an element, with their namespaces resolved.
///
/// The XML tokenizer only splits qualified names into prefix and local name; the two
/// prefixes that matter for SVG, `xlink:` and `xml:`, are mapped to their namespaces
/// here.
#[derive(Clone, Default)]
pub struct Attributes {
    attrs: Box<[(QualName, AttributeValue)]>,
    id_idx: Option<u16>,
    class_idx: Option<u16>,
}

/// Iterator from `Attributes.iter`.
pub struct AttributesIter<'a>(slice::Iter<'a, (QualName, AttributeValue)>);

/// Resolves the namespace of an attribute name as written in the document.
fn resolve_attribute_name(name: &QualName) -> QualName {
    let (prefix, local) = match name.prefix {
        Some(ref p) => (Some(p.as_ref().to_string()), name.local.as_ref().to_string()),
        None => match name.local.split_once(':') {
            Some((p, l)) => (Some(p.to_string()), l.to_string()),
            None => (None, name.local.as_ref().to_string()),
        },
    };

    match prefix.as_deref() {
        None => QualName::new(None, ns!(), LocalName::from(local)),
        Some("xlink") => QualName::new(Some(Prefix::from("xlink")), ns!(xlink), LocalName::from(local)),
        Some("xml") => QualName::new(Some(Prefix::from("xml")), ns!(xml), LocalName::from(local)),
        Some("xmlns") => QualName::new(Some(Prefix::from("xmlns")), ns!(xmlns), LocalName::from(local)),
        Some(p) => QualName::new(Some(Prefix::from(p)), name.ns.clone(), LocalName::from(local)),
    }
}

impl Attributes {
    pub fn new() -> Attributes {
        Default::default()
    }

    /// Creates an `Attributes` from the name/value pairs of a start tag.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Attributes, LoadingError>
    where
        I: IntoIterator<Item = (&'a QualName, &'a str)>,
    {
        let mut array = Vec::new();
        let mut id_idx = None;
        let mut class_idx = None;

        for (name, value) in pairs {
            if array.len() >= MAX_LOADED_ATTRIBUTES {
                return Err(LoadingError::LimitExceeded(
                    "cannot load more than 65535 attributes per element".to_string(),
                ));
            }

            let qual_name = resolve_attribute_name(name);

            let idx = array.len() as u16;
            match qual_name.expanded() {
                expanded_name!("", "id") => id_idx = Some(idx),
                expanded_name!("", "class") => class_idx = Some(idx),
                _ => (),
            }

            array.push((qual_name, DefaultAtom::from(value)));
        }

        Ok(Attributes {
            attrs: array.into(),
            id_idx,
            class_idx,
        })
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Creates an iterator that yields `(QualName, &'a str)` tuples.
    pub fn iter(&self) -> AttributesIter<'_> {
        AttributesIter(self.attrs.iter())
    }

    pub fn get_id(&self) -> Option<&str> {
        self.id_idx.and_then(|idx| {
            self.attrs
                .get(usize::from(idx))
                .map(|(_name, value)| &value[..])
        })
    }

    pub fn get_class(&self) -> Option<&str> {
        self.class_idx.and_then(|idx| {
            self.attrs
                .get(usize::from(idx))
                .map(|(_name, value)| &value[..])
        })
    }

    /// Returns the value of `href` or `xlink:href`; the former wins if both are present.
    pub fn get_href(&self) -> Option<&str> {
        let mut href = None;

        for (name, value) in self.attrs.iter() {
            match name.expanded() {
                expanded_name!("", "href") => return Some(&value[..]),
                expanded_name!(xlink "href") => href = Some(&value[..]),
                _ => (),
            }
        }

        href
    }
}

impl<'a> Iterator for AttributesIter<'a> {
    type Item = (QualName, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(a, v)| (a.clone(), v.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(prefix: Option<&str>, local: &str) -> QualName {
        QualName::new(prefix.map(Prefix::from), ns!(), LocalName::from(local))
    }

    #[test]
    fn empty_attributes() {
        let map = Attributes::from_pairs(Vec::new()).unwrap();
        assert_eq!(map.len(), 0);
        assert!(map.get_id().is_none());
    }

    #[test]
    fn attributes_with_namespaces() {
        let href = name(Some("xlink"), "href");
        let ry = name(None, "ry");
        let space = name(None, "xml:space");
        let d = name(None, "d");

        let attrs = Attributes::from_pairs(vec![
            (&href, "1"),
            (&ry, "2"),
            (&space, "preserve"),
            (&d, ""),
        ])
        .unwrap();

        let mut seen = 0;

        for (a, v) in attrs.iter() {
            match a.expanded() {
                expanded_name!(xlink "href") => assert_eq!(v, "1"),
                expanded_name!("", "ry") => assert_eq!(v, "2"),
                expanded_name!(xml "space") => assert_eq!(v, "preserve"),
                expanded_name!("", "d") => assert!(v.is_empty()),
                _ => unreachable!(),
            }

            seen += 1;
        }

        assert_eq!(seen, 4);
        assert_eq!(attrs.get_href(), Some("1"));
    }

    #[test]
    fn plain_href_wins() {
        let xlink = name(Some("xlink"), "href");
        let plain = name(None, "href");

        let attrs = Attributes::from_pairs(vec![(&plain, "#a"), (&xlink, "#b")]).unwrap();
        assert_eq!(attrs.get_href(), Some("#a"));
    }

    #[test]
    fn finds_id_and_class() {
        let id = name(None, "id");
        let class = name(None, "class");

        let attrs = Attributes::from_pairs(vec![(&class, "a b"), (&id, "foo")]).unwrap();
        assert_eq!(attrs.get_id(), Some("foo"));
        assert_eq!(attrs.get_class(), Some("a b"));
    }
}
