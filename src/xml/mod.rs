//! The incremental XML tree builder.
//!
//! Bytes come in through [`XmlParser::write`] in chunks of any size.  They get decoded as
//! UTF-8, tokenized with `xml5ever`, and every token is turned into document nodes as soon
//! as it arrives.  A [`DrawingSink`] is told when the outermost `<svg>` starts and when
//! each of its direct children is complete, so that drawing proceeds while the document is
//! still being read.

use encoding_rs::{Decoder, DecoderResult, UTF_8};
use markup5ever::{buffer_queue::BufferQueue, Attribute, QualName};
use std::cell::RefCell;
use std::rc::Rc;
use xml5ever::tendril::StrTendril;
use xml5ever::tokenizer::{Tag, TagKind, Token, TokenSink, XmlTokenizer, XmlTokenizerOpts};

use crate::document::{Document, MAX_LOADED_ELEMENTS};
use crate::error::LoadingError;
use crate::length::Dpi;
use crate::node::{Node, NodeBorrow};
use crate::rsvg_log;
use crate::state::State;
use crate::style::StyleType;
use crate::{borrow_element_as, is_element_of_type};

mod attributes;

pub use attributes::Attributes;

/// Receives the parts of a document that are ready to be drawn.
pub trait DrawingSink {
    /// Called at the start tag of the outermost `<svg>`, after its attributes are known.
    ///
    /// An error here stops the loading of the document.
    fn begin(&mut self, root: &Node) -> Result<(), LoadingError>;

    /// Called at the end tag of each renderable direct child of the outermost `<svg>`.
    fn draw(&mut self, document: &Document, node: &Node);
}

#[derive(Clone)]
enum Context {
    // Starting state
    Start,

    // Creating nodes for elements under the current node
    ElementCreation,

    // Inside <style>; accumulate text to include in a stylesheet
    Style,

    // An unsupported element inside a `<style>` element, to be ignored
    UnsupportedStyleChild,

    // A fatal error was found.  We will no-op upon any further XML events.
    FatalError(LoadingError),
}

/// Holds the state used for XML processing.
///
/// Every start tag pushes one `Context` and one `State`, and every end tag pops them.  The
/// `State` of an element is computed at its start tag from its parent's, with the rules
/// of the stylesheet as it exists at that point.
struct XmlState<S> {
    document: Document,
    sink: S,
    dpi: Dpi,
    num_loaded_elements: usize,
    context_stack: Vec<Context>,
    state_stack: Vec<State>,
    current_node: Option<Node>,
}

impl<S: DrawingSink> XmlState<S> {
    fn new(sink: S, dpi: Dpi) -> XmlState<S> {
        XmlState {
            document: Document::new(),
            sink,
            dpi,
            num_loaded_elements: 0,
            context_stack: vec![Context::Start],
            state_stack: Vec::new(),
            current_node: None,
        }
    }

    fn context(&self) -> Context {
        self.context_stack
            .last()
            .cloned()
            .unwrap_or(Context::Start)
    }

    fn check_last_error(&self) -> Result<(), LoadingError> {
        match self.context() {
            Context::FatalError(e) => Err(e),
            _ => Ok(()),
        }
    }

    fn error(&mut self, e: LoadingError) {
        rsvg_log!("{}", e);
        self.context_stack.push(Context::FatalError(e));
    }

    fn tag(&mut self, tag: Tag) {
        match tag.kind {
            TagKind::StartTag => self.start_element(&tag.name, &tag.attrs),

            TagKind::EmptyTag => {
                self.start_element(&tag.name, &tag.attrs);
                self.end_element();
            }

            TagKind::EndTag | TagKind::ShortTag => self.end_element(),
        }
    }

    fn start_element(&mut self, name: &QualName, attrs: &[Attribute]) {
        let context = self.context();

        if let Context::FatalError(_) = context {
            return;
        }

        if self.num_loaded_elements >= MAX_LOADED_ELEMENTS {
            self.error(LoadingError::LimitExceeded(format!(
                "cannot load more than {} XML elements",
                MAX_LOADED_ELEMENTS
            )));
            return;
        }

        self.num_loaded_elements += 1;

        let parent_state = self.state_stack.last().cloned().unwrap_or_default();

        let result = match context {
            Context::Start | Context::ElementCreation => {
                self.element_creation_start_element(name, attrs, &parent_state)
            }

            Context::Style | Context::UnsupportedStyleChild => {
                Ok((Context::UnsupportedStyleChild, parent_state))
            }

            Context::FatalError(_) => unreachable!(),
        };

        match result {
            Ok((new_context, state)) => {
                self.context_stack.push(new_context);
                self.state_stack.push(state);
            }

            Err(e) => self.error(e),
        }
    }

    fn end_element(&mut self) {
        match self.context() {
            Context::Start => {
                rsvg_log!("end tag without a matching start tag; ignoring it");
                return;
            }

            Context::ElementCreation => self.element_creation_end_element(),

            Context::Style => self.style_end_element(),
            Context::UnsupportedStyleChild => (),

            Context::FatalError(_) => return,
        }

        self.context_stack.pop();
        self.state_stack.pop();
    }

    fn characters(&mut self, text: &str) {
        match self.context() {
            // Character data before the first element, or after the last one.
            Context::Start => (),

            Context::ElementCreation | Context::Style => self.element_creation_characters(text),

            Context::UnsupportedStyleChild | Context::FatalError(_) => (),
        }
    }

    fn element_creation_start_element(
        &mut self,
        name: &QualName,
        attrs: &[Attribute],
        parent_state: &State,
    ) -> Result<(Context, State), LoadingError> {
        let attrs = Attributes::from_pairs(attrs.iter().map(|a| (&a.name, &*a.value)))?;

        let mut parent = self.current_node.clone();
        let is_root = parent.is_none();

        let mut node = self
            .document
            .append_element(name, attrs, parent.as_mut())
            .ok_or_else(|| {
                LoadingError::XmlParseError(String::from(
                    "extra content after the document element",
                ))
            })?;

        let values = node
            .borrow_element_mut()
            .cascade(self.document.stylesheet(), parent_state, self.dpi)
            .clone();

        if is_root {
            if !is_element_of_type!(node, Svg) {
                return Err(LoadingError::NoSvgRoot);
            }

            self.sink.begin(&node)?;
        }

        let context = if is_element_of_type!(node, Style) {
            Context::Style
        } else {
            Context::ElementCreation
        };

        self.current_node = Some(node);

        Ok((context, values))
    }

    fn element_creation_end_element(&mut self) {
        let node = match self.current_node.take() {
            Some(node) => node,
            None => return,
        };

        let parent = node.parent();

        let is_child_of_root = parent.as_ref().map_or(false, |p| p.parent().is_none());

        if is_child_of_root && node.borrow_element().is_renderable() {
            self.sink.draw(&self.document, &node);
        }

        self.current_node = parent;
    }

    fn element_creation_characters(&mut self, text: &str) {
        if let Some(mut parent) = self.current_node.clone() {
            self.document.append_characters(text, &mut parent);
        }
    }

    fn style_end_element(&mut self) {
        self.add_inline_stylesheet();
        self.element_creation_end_element()
    }

    fn add_inline_stylesheet(&mut self) {
        let current_node = match self.current_node {
            Some(ref node) => node.clone(),
            None => return,
        };

        let style_type = borrow_element_as!(current_node, Style).style_type();

        if style_type == StyleType::TextCss {
            let stylesheet_text = current_node
                .children()
                .filter(|child| child.is_chars())
                .map(|child| child.borrow_chars().get_string())
                .collect::<String>();

            self.document.append_stylesheet_from_text(&stylesheet_text);
        }
    }
}

struct XmlStateSink<S>(Rc<RefCell<XmlState<S>>>);

impl<S: DrawingSink> TokenSink for XmlStateSink<S> {
    fn process_token(&mut self, token: Token) {
        let mut state = self.0.borrow_mut();

        match token {
            Token::TagToken(tag) => state.tag(tag),
            Token::CharacterTokens(text) => state.characters(&text),
            Token::ParseError(e) => rsvg_log!("XML parse error: {}", e),
            _ => (),
        }
    }
}

/// Push parser that builds a [`Document`] from chunks of bytes.
pub struct XmlParser<S> {
    state: Rc<RefCell<XmlState<S>>>,
    tokenizer: XmlTokenizer<XmlStateSink<S>>,
    queue: BufferQueue,
    decoder: Decoder,
}

impl<S: DrawingSink> XmlParser<S> {
    /// Creates a parser whose elements resolve physical units with `dpi`.
    pub fn new(sink: S, dpi: Dpi) -> XmlParser<S> {
        let state = Rc::new(RefCell::new(XmlState::new(sink, dpi)));

        let tokenizer = XmlTokenizer::new(
            XmlStateSink(state.clone()),
            XmlTokenizerOpts::default(),
        );

        XmlParser {
            state,
            tokenizer,
            queue: BufferQueue::new(),
            decoder: UTF_8.new_decoder_with_bom_removal(),
        }
    }

    /// Feeds more bytes to the parser.  They need not end at a character boundary.
    pub fn write(&mut self, buf: &[u8]) -> Result<(), LoadingError> {
        self.state.borrow().check_last_error()?;

        self.decode(buf, false)?;
        self.tokenizer.run(&mut self.queue);

        self.state.borrow().check_last_error()
    }

    /// Finishes parsing and returns the document.
    ///
    /// The sink stays available through [`Self::with_sink`], even if loading failed.
    pub fn close(&mut self) -> Result<Document, LoadingError> {
        self.state.borrow().check_last_error()?;

        self.decode(&[], true)?;
        self.tokenizer.run(&mut self.queue);
        self.tokenizer.end();

        let mut state = self.state.borrow_mut();
        state.check_last_error()?;

        let document = std::mem::take(&mut state.document);

        match document.root() {
            Some(ref root) if is_element_of_type!(root, Svg) => Ok(document),
            _ => Err(LoadingError::NoSvgRoot),
        }
    }

    /// Calls `f` with the sink, to inspect what has been drawn so far.
    pub fn with_sink<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.state.borrow().sink)
    }

    fn decode(&mut self, buf: &[u8], last: bool) -> Result<(), LoadingError> {
        let mut input = buf;

        loop {
            let capacity = self
                .decoder
                .max_utf8_buffer_length_without_replacement(input.len())
                .ok_or_else(|| {
                    LoadingError::LimitExceeded(String::from("input chunk is too big"))
                })?;

            let mut text = String::with_capacity(capacity.max(16));

            let (result, read) =
                self.decoder
                    .decode_to_string_without_replacement(input, &mut text, last);

            if !text.is_empty() {
                self.queue.push_back(StrTendril::from_slice(&text));
            }

            input = &input[read..];

            match result {
                DecoderResult::InputEmpty => return Ok(()),
                DecoderResult::OutputFull => (),
                DecoderResult::Malformed(_, _) => {
                    let e = LoadingError::XmlParseError(String::from("input is not valid UTF-8"));
                    self.state.borrow_mut().error(e.clone());
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementData;
    use crate::length::{LengthUnit, ULength};
    use matches::matches;

    #[derive(Default, Clone)]
    struct RecordingSink {
        began: usize,
        drawn: Vec<String>,
    }

    impl DrawingSink for RecordingSink {
        fn begin(&mut self, _root: &Node) -> Result<(), LoadingError> {
            self.began += 1;
            Ok(())
        }

        fn draw(&mut self, _document: &Document, node: &Node) {
            let elt = node.borrow_element();
            let name = elt
                .get_id()
                .unwrap_or_else(|| elt.element_name().local.as_ref())
                .to_string();
            self.drawn.push(name);
        }
    }

    fn parse_chunks(chunks: &[&[u8]]) -> Result<(Document, RecordingSink), LoadingError> {
        let mut parser = XmlParser::new(RecordingSink::default(), Dpi::default());

        for chunk in chunks {
            parser.write(chunk)?;
        }

        let document = parser.close()?;
        Ok((document, parser.with_sink(|s| s.clone())))
    }

    fn parse(s: &str) -> Result<(Document, RecordingSink), LoadingError> {
        parse_chunks(&[s.as_bytes()])
    }

    #[test]
    fn draws_direct_children_of_root_at_their_end_tags() {
        let (_, sink) = parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                 <defs><rect id="in_defs"/></defs>
                 <rect id="first"/>
                 <g id="group"><rect id="nested"/></g>
                 <linearGradient id="gradient"/>
                 <foo id="unknown"><rect id="inside_unknown"/></foo>
               </svg>"#,
        )
        .unwrap();

        assert_eq!(sink.began, 1);
        assert_eq!(sink.drawn, vec!["first", "group", "unknown"]);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let doc = "<svg xmlns=\"http://www.w3.org/2000/svg\"><text id=\"t\">caf\u{e9}</text><rect id=\"r\"/></svg>";
        let bytes = doc.as_bytes();

        let e_acute = doc.find('\u{e9}').unwrap();
        let chunks: Vec<&[u8]> = vec![
            &bytes[..7],
            &bytes[7..e_acute + 1],
            &bytes[e_acute + 1..e_acute + 12],
            &bytes[e_acute + 12..],
        ];

        let (document, sink) = parse_chunks(&chunks).unwrap();
        assert_eq!(sink.drawn, vec!["t", "r"]);

        let text = document.lookup_node("t").unwrap();
        let s: String = text
            .children()
            .map(|c| c.borrow_chars().get_string())
            .collect();
        assert_eq!(s, "caf\u{e9}");
    }

    #[test]
    fn byte_at_a_time_builds_same_tree() {
        let doc = br#"<svg xmlns="http://www.w3.org/2000/svg"><g id="a"><rect id="b"/></g></svg>"#;
        let chunks: Vec<&[u8]> = doc.chunks(1).collect();

        let (document, sink) = parse_chunks(&chunks).unwrap();

        assert_eq!(sink.drawn, vec!["a"]);
        let b = document.lookup_node("b").unwrap();
        assert!(b.parent().unwrap() == document.lookup_node("a").unwrap());
    }

    #[test]
    fn stylesheet_applies_to_later_elements() {
        let (document, _) = parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                 <rect id="before"/>
                 <style type="text/css"><![CDATA[ rect { stroke-width: 3 } ]]></style>
                 <rect id="after"/>
               </svg>"#,
        )
        .unwrap();

        let stroke_width = |id| {
            document
                .lookup_node(id)
                .unwrap()
                .borrow_element()
                .get_computed_values()
                .stroke_width
        };

        assert_eq!(stroke_width("before"), ULength::new(1.0, LengthUnit::Px));
        assert_eq!(stroke_width("after"), ULength::new(3.0, LengthUnit::Px));
    }

    #[test]
    fn state_is_inherited_through_unknown_elements() {
        let (document, _) = parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                 <g stroke-width="5"><unknown><rect id="r"/></unknown></g>
               </svg>"#,
        )
        .unwrap();

        let r = document.lookup_node("r").unwrap();
        assert_eq!(
            r.borrow_element().get_computed_values().stroke_width,
            ULength::new(5.0, LengthUnit::Px)
        );
    }

    #[test]
    fn later_id_replaces_earlier_one() {
        let (document, _) = parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                 <rect id="dup"/>
                 <circle id="dup"/>
               </svg>"#,
        )
        .unwrap();

        let node = document.lookup_node("dup").unwrap();
        assert!(matches!(*node.borrow_element_data(), ElementData::Circle(_)));
    }

    #[test]
    fn non_svg_root_is_an_error() {
        assert!(matches!(
            parse(r#"<html xmlns="http://www.w3.org/1999/xhtml"/>"#),
            Err(LoadingError::NoSvgRoot)
        ));
    }

    #[test]
    fn empty_input_has_no_svg_root() {
        assert!(matches!(parse(""), Err(LoadingError::NoSvgRoot)));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut parser = XmlParser::new(RecordingSink::default(), Dpi::default());

        assert!(matches!(
            parser.write(b"<svg xmlns=\"http://www.w3.org/2000/svg\">\xff\xfe</svg>"),
            Err(LoadingError::XmlParseError(_))
        ));

        assert!(parser.write(b"<rect/>").is_err());
    }

    #[test]
    fn unbalanced_end_tags_are_ignored() {
        let (_, sink) = parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect id="r"/></svg></g>"#,
        )
        .unwrap();

        assert_eq!(sink.drawn, vec!["r"]);
    }
}
