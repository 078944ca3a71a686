//! Conditional processing: `requiredExtensions`, `requiredFeatures` and `systemLanguage`.
//!
//! An element whose conditions fail is not rendered; inside a `<switch>`, the first
//! child whose conditions pass is the only one rendered.

use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::xml::Attributes;

const SVG11_FEATURE_PREFIX: &str = "http://www.w3.org/TR/SVG11/feature#";

/// Sorted, for `binary_search`.
const SVG11_FEATURES: &[&str] = &[
    "BasicFilter",
    "BasicGraphicsAttribute",
    "BasicPaintAttribute",
    "BasicStructure",
    "BasicText",
    "ConditionalProcessing",
    "ContainerAttribute",
    "Filter",
    "Gradient",
    "Image",
    "Marker",
    "Mask",
    "OpacityAttribute",
    "Pattern",
    "SVG",
    "SVG-static",
    "Shape",
    "Structure",
    "Style",
    "View",
];

fn is_supported_feature(feature: &str) -> bool {
    match feature.strip_prefix(SVG11_FEATURE_PREFIX) {
        Some(name) => SVG11_FEATURES.binary_search(&name).is_ok(),

        // SVG 1.0 name for the static profile
        None => feature == "org.w3c.svg.static",
    }
}

/// The conditional processing attributes of one element.
///
/// Absent attributes always pass.
#[derive(Debug, PartialEq)]
pub struct Conditions {
    /// No extensions are supported, so any listed extension fails the test.
    extensions_ok: bool,

    features_ok: bool,

    /// Lowercased language tags, or `None` if `systemLanguage` is absent.
    languages: Option<Vec<String>>,
}

impl Conditions {
    pub fn from_attributes(attrs: &Attributes) -> Conditions {
        let mut conditions = Conditions {
            extensions_ok: true,
            features_ok: true,
            languages: None,
        };

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "requiredExtensions") => {
                    conditions.extensions_ok = value.split_whitespace().next().is_none();
                }

                expanded_name!("", "requiredFeatures") => {
                    conditions.features_ok = value.split_whitespace().all(is_supported_feature);
                }

                expanded_name!("", "systemLanguage") => {
                    conditions.languages = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_ascii_lowercase)
                            .collect(),
                    );
                }

                _ => (),
            }
        }

        conditions
    }

    /// Whether the element may be rendered for a user who accepts `user_languages`.
    pub fn allow(&self, user_languages: &[String]) -> bool {
        self.extensions_ok
            && self.features_ok
            && self
                .languages
                .as_ref()
                .map_or(true, |tags| languages_match(tags, user_languages))
    }
}

/// `en` accepts `en` and `en-US`; `en-US` does not accept `en`.
fn languages_match(tags: &[String], user_languages: &[String]) -> bool {
    user_languages.iter().any(|user| {
        let user = user.to_ascii_lowercase();

        tags.iter().any(|tag| match tag.strip_prefix(user.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('-'),
            None => false,
        })
    })
}
