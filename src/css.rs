//! Representation of CSS types, and the CSS parsing and matching engine.
//!
//! # Terminology
//!
//! Consider a CSS **stylesheet** like this:
//!
//! ```css
//! rect, .warning {
//!     fill: red;
//!     stroke: black !important;
//! }
//! ```
//!
//! The stylesheet has one **rule** whose **selector list** is `rect, .warning`.  Each
//! selector is a simple one: a tag name, a class, a tag name with a class, an id, or the
//! universal selector `*`.  Rules with any other kind of selector are skipped.
//!
//! The rule has two **declarations**; the second one is `!important`.
//!
//! Stylesheets are stored as a table from selector to declarations.  An element looks
//! up `*`, its tag name, then `.class` and `tag.class` for each of its classes, and
//! finally `#id`, and applies the declarations in that order.

use cssparser::{
    parse_important, AtRuleParser, CowRcStr, DeclarationListParser, DeclarationParser, Parser,
    ParserInput, ParserState, QualifiedRuleParser, RuleListParser,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::*;
use crate::rsvg_log;
use crate::state::{parse_property, Property};

/// A parsed CSS declaration
///
/// For example, in the declaration `fill: green !important`, the `property` would be
/// `Property::Fill(...)` with the green value, and `important` would be `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: Property,
    pub important: bool,
}

/// Dummy struct required to use `cssparser::DeclarationListParser`
///
/// It implements `DeclarationParser`, which knows how to parse the property/value pairs from
/// a CSS declaration.
pub struct DeclParser;

impl<'i> DeclarationParser<'i> for DeclParser {
    type Declaration = Declaration;
    type Error = ValueErrorKind;

    /// Parses a CSS declaration like `name: input_value [!important]`
    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Declaration, ParseError<'i>> {
        let property = parse_property(name.as_ref(), input)?;
        let important = input.try_parse(parse_important).is_ok();

        Ok(Declaration {
            property,
            important,
        })
    }
}

// cssparser's DeclarationListParser requires this; we just use the dummy
// implementations from cssparser itself.  We may want to provide a real
// implementation in the future, although this may require keeping track of the
// CSS parsing state like Servo does.
impl<'i> AtRuleParser<'i> for DeclParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ValueErrorKind;
}

/// Parses the declarations of a `style` attribute or of a rule's block.
///
/// Invalid declarations are logged and skipped.
pub fn parse_declarations(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    DeclarationListParser::new(input, DeclParser)
        .filter_map(|r| match r {
            Ok(decl) => Some(decl),
            Err((e, s)) => {
                rsvg_log!("ignoring CSS declaration \"{}\": {:?}", s, e.kind);
                None
            }
        })
        .collect()
}

/// Parses the contents of a `style` attribute.
pub fn parse_style_attribute(style: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    parse_declarations(&mut parser)
}

/// A simple selector, already in the form used as a key in the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Universal,
    Tag(String),
    Class(String),
    TagClass(String, String),
    Id(String),
}

static SIMPLE_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<tag>\*|[A-Za-z_][\w-]*)?(?:\.(?P<class>[\w-]+))?|#(?P<id>[\w-]+))$")
        .expect("selector regex is valid")
});

impl Selector {
    /// Parses one selector of a comma-separated list; returns `None` for anything
    /// more complex than the supported simple selectors.
    pub fn parse(s: &str) -> Option<Selector> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let caps = SIMPLE_SELECTOR.captures(s)?;

        if let Some(id) = caps.name("id") {
            return Some(Selector::Id(id.as_str().to_string()));
        }

        let tag = caps.name("tag").map(|m| m.as_str());
        let class = caps.name("class").map(|m| m.as_str().to_string());

        match (tag, class) {
            (Some("*"), None) => Some(Selector::Universal),
            (Some("*"), Some(class)) | (None, Some(class)) => Some(Selector::Class(class)),
            (Some(tag), None) => Some(Selector::Tag(tag.to_string())),
            (Some(tag), Some(class)) => Some(Selector::TagClass(tag.to_string(), class)),
            (None, None) => None,
        }
    }
}

/// A parsed CSS rule; only the supported selectors of the selector list are kept.
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

/// Dummy struct to parse the rules of a stylesheet.
struct RuleParser;

impl<'i> QualifiedRuleParser<'i> for RuleParser {
    type Prelude = Vec<Selector>;
    type QualifiedRule = Rule;
    type Error = ValueErrorKind;

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let prelude = input.slice_from(start);

        let selectors: Vec<Selector> = prelude
            .split(',')
            .filter_map(|s| {
                let sel = Selector::parse(s);
                if sel.is_none() {
                    rsvg_log!("ignoring unsupported CSS selector \"{}\"", s.trim());
                }
                sel
            })
            .collect();

        Ok(selectors)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Rule, ParseError<'i>> {
        Ok(Rule {
            selectors: prelude,
            declarations: parse_declarations(input),
        })
    }
}

impl<'i> AtRuleParser<'i> for RuleParser {
    type Prelude = ();
    type AtRule = Rule;
    type Error = ValueErrorKind;
}

/// A table of rules from the `<style>` elements of a document.
#[derive(Default)]
pub struct Stylesheet {
    rules: HashMap<Selector, Vec<Declaration>>,
}

impl Stylesheet {
    pub fn new() -> Stylesheet {
        Default::default()
    }

    /// Parses CSS text and adds its rules to the table.
    ///
    /// Rules for a selector that already has declarations are appended, so they override
    /// the earlier ones.
    pub fn add_rules_from_str(&mut self, css: &str) {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);

        for result in RuleListParser::new_for_stylesheet(&mut parser, RuleParser) {
            match result {
                Ok(rule) => {
                    for selector in rule.selectors {
                        self.rules
                            .entry(selector)
                            .or_insert_with(Vec::new)
                            .extend(rule.declarations.iter().cloned());
                    }
                }

                Err((e, s)) => rsvg_log!("ignoring CSS rule \"{}\": {:?}", s, e.kind),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the declarations that apply to an element, in application order.
    pub fn lookup(&self, tag: &str, classes: &[&str], id: Option<&str>) -> Vec<Declaration> {
        let mut keys = vec![Selector::Universal, Selector::Tag(tag.to_string())];

        for class in classes {
            keys.push(Selector::Class(class.to_string()));
            keys.push(Selector::TagClass(tag.to_string(), class.to_string()));
        }

        if let Some(id) = id {
            keys.push(Selector::Id(id.to_string()));
        }

        keys.iter()
            .filter_map(|k| self.rules.get(k))
            .flat_map(|decls| decls.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color, RGBA};
    use crate::state::{Opacity, Paint};

    fn red() -> Property {
        Property::Fill(Paint::SolidColor(Color::RGBA(RGBA::new(255, 0, 0, 255))))
    }

    #[test]
    fn parses_style_attribute() {
        let decls = parse_style_attribute("fill: red; opacity: 0.5 !important; bogus: 1; ; stroke");

        assert_eq!(
            decls,
            vec![
                Declaration {
                    property: red(),
                    important: false,
                },
                Declaration {
                    property: Property::Opacity(Opacity(128)),
                    important: true,
                },
            ]
        );
    }

    #[test]
    fn parses_selectors() {
        assert_eq!(Selector::parse("*"), Some(Selector::Universal));
        assert_eq!(Selector::parse(" rect "), Some(Selector::Tag("rect".to_string())));
        assert_eq!(Selector::parse(".a"), Some(Selector::Class("a".to_string())));
        assert_eq!(
            Selector::parse("rect.a"),
            Some(Selector::TagClass("rect".to_string(), "a".to_string()))
        );
        assert_eq!(Selector::parse("#foo"), Some(Selector::Id("foo".to_string())));
        assert_eq!(Selector::parse("g rect"), None);
        assert_eq!(Selector::parse("g > rect"), None);
        assert_eq!(Selector::parse("rect:hover"), None);
        assert_eq!(Selector::parse(""), None);
    }

    #[test]
    fn stylesheet_lookup_order() {
        let mut sheet = Stylesheet::new();
        sheet.add_rules_from_str(
            "/* comment */
             #x { opacity: 0.25 }
             rect, .a { fill: red }
             * { opacity: 1 }
             rect.a { opacity: 0.5 }
             g rect { fill: blue }",
        );

        let decls: Vec<Property> = sheet
            .lookup("rect", &["a"], Some("x"))
            .into_iter()
            .map(|d| d.property)
            .collect();

        assert_eq!(
            decls,
            vec![
                Property::Opacity(Opacity(255)),
                red(),
                red(),
                Property::Opacity(Opacity(128)),
                Property::Opacity(Opacity(64)),
            ]
        );

        assert!(sheet.lookup("circle", &[], None).len() == 1);
    }

    #[test]
    fn later_rules_are_appended() {
        let mut sheet = Stylesheet::new();
        sheet.add_rules_from_str("rect { opacity: 0.5 }");
        sheet.add_rules_from_str("rect { opacity: 1 }");

        let decls = sheet.lookup("rect", &[], None);
        assert_eq!(decls.last().map(|d| &d.property), Some(&Property::Opacity(Opacity(255))));
    }
}
