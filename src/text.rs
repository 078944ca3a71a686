//! Text elements: `text`, `tspan`.
//!
//! Glyph shaping and rasterization are not done here.  A [`TextLayout`] service turns
//! each run of characters into a coverage bitmap; this module positions the runs,
//! handles `xml:space` and `text-anchor`, and paints them with the fill of their element.

use itertools::Itertools;
use markup5ever::{expanded_name, local_name, namespace_url, ns};
use std::cell::RefCell;

use crate::bbox::BoundingBox;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::{set_attribute, ElementTrait};
use crate::error::*;
use crate::layout::{self, StackingContext};
use crate::length::*;
use crate::node::{CascadedValues, Node, NodeBorrow};
use crate::parsers::ParseValue;
use crate::rect::Rect;
use crate::rsvg_log;
use crate::state::{State, TextAnchor, XmlSpace};
use crate::xml::Attributes;
use crate::{borrow_element_as, is_element_of_type};

/// Font selection passed to a [`TextLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescription {
    pub family: String,

    /// Font size in user units.
    pub size: f64,
}

/// A laid out run of glyphs.
///
/// `coverage` is a `width` × `height` bitmap, one byte per pixel, row by row.  The
/// bitmap covers `ink_rect`, which is given in user units relative to the pen position
/// on the baseline.  `advance` is how far the pen moves after the run, in user units.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
    pub ink_rect: Rect,
    pub advance: f64,
}

impl GlyphRun {
    /// Coverage at bitmap coordinates `(x, y)`; zero outside the bitmap.
    pub fn sample(&self, x: f64, y: f64) -> u8 {
        if x < 0.0 || y < 0.0 {
            return 0;
        }

        let (x, y) = (x as u32, y as u32);
        if x >= self.width || y >= self.height {
            return 0;
        }

        self.coverage
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Service that shapes and rasterizes text.
///
/// `scale` is the number of device pixels per user unit where the run will be drawn,
/// so that the bitmap can be produced at the output resolution.  Returning `None`
/// means the run cannot be laid out; it is skipped without moving the pen.
pub trait TextLayout {
    fn layout(&self, text: &str, font: &FontDescription, scale: f64) -> Option<GlyphRun>;
}

/// Character content of an element.
pub struct Chars {
    string: RefCell<String>,
}

impl Chars {
    pub fn new(initial_text: &str) -> Chars {
        Chars {
            string: RefCell::new(String::from(initial_text)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.string.borrow().is_empty()
    }

    pub fn append(&self, s: &str) {
        self.string.borrow_mut().push_str(s);
    }

    pub fn get_string(&self) -> String {
        self.string.borrow().clone()
    }
}

/// Whitespace handling that carries over from one text node to the next, so that
/// a run of spaces split across a `tspan` boundary still collapses into one.
struct WhitespaceState {
    at_start: bool,
    pending_space: bool,
}

impl WhitespaceState {
    fn new() -> WhitespaceState {
        WhitespaceState {
            at_start: true,
            pending_space: false,
        }
    }

    /// With `xml:space="default"`, newlines are removed, tabs become spaces, runs of
    /// spaces collapse and leading and trailing spaces of the whole text are dropped.
    /// With `preserve`, newlines and tabs become spaces and everything is kept.
    fn normalize(&mut self, mode: XmlSpace, s: &str) -> String {
        let mut out = String::with_capacity(s.len());

        let chars = s
            .chars()
            .filter(|ch| mode == XmlSpace::Preserve || (*ch != '\n' && *ch != '\r'))
            .map(|ch| match ch {
                '\n' | '\r' | '\t' => ' ',
                c => c,
            })
            .coalesce(|current, next| match (current, next) {
                (' ', ' ') if mode == XmlSpace::Default => Ok(' '),
                (_, _) => Err((current, next)),
            });

        for ch in chars {
            match mode {
                XmlSpace::Default if ch == ' ' => {
                    if !self.at_start {
                        self.pending_space = true;
                    }
                }

                _ => {
                    if self.pending_space {
                        out.push(' ');
                        self.pending_space = false;
                    }

                    out.push(ch);
                    self.at_start = false;
                }
            }
        }

        out
    }
}

/// A run placed on the baseline, before `text-anchor` is applied.
struct PositionedRun {
    run: GlyphRun,
    x: f64,
    y: f64,
    values: State,
}

/// Runs that start at an absolute position and are anchored together.
struct Chunk {
    anchor: TextAnchor,
    start_x: f64,
    runs: Vec<PositionedRun>,
}

impl Chunk {
    fn new(anchor: TextAnchor, start_x: f64) -> Chunk {
        Chunk {
            anchor,
            start_x,
            runs: Vec::new(),
        }
    }

    fn anchor_offset(&self, end_x: f64) -> f64 {
        let advance = end_x - self.start_x;

        match self.anchor {
            TextAnchor::Start => 0.0,
            TextAnchor::Middle => -advance / 2.0,
            TextAnchor::End => -advance,
        }
    }
}

struct LayoutContext<'a> {
    text_layout: &'a dyn TextLayout,
    viewport: &'a Viewport,
    scale: f64,
    whitespace: WhitespaceState,
    pen: (f64, f64),
    chunks: Vec<Chunk>,
}

impl<'a> LayoutContext<'a> {
    fn start_chunk(&mut self, anchor: TextAnchor) {
        self.chunks.push(Chunk::new(anchor, self.pen.0));
    }

    fn end_chunk(&mut self) {
        if let Some(chunk) = self.chunks.last_mut() {
            let offset = chunk.anchor_offset(self.pen.0);
            for r in chunk.runs.iter_mut() {
                r.x += offset;
            }
        }
    }

    fn add_chars(&mut self, text: &str, values: &State) {
        let text = self.whitespace.normalize(values.xml_space, text);
        if text.is_empty() {
            return;
        }

        let font = FontDescription {
            family: values.font_family.clone(),
            size: values.font_size,
        };

        match self.text_layout.layout(&text, &font, self.scale) {
            Some(run) => {
                let advance = run.advance;

                if let Some(chunk) = self.chunks.last_mut() {
                    chunk.runs.push(PositionedRun {
                        run,
                        x: self.pen.0,
                        y: self.pen.1,
                        values: values.clone(),
                    });
                }

                self.pen.0 += advance;
            }

            None => rsvg_log!("could not lay out text \"{}\"", text),
        }
    }

    /// Lays out the character and `tspan` children of `node`.
    fn add_children(&mut self, node: &Node, cascaded: &CascadedValues<'_>) {
        for child in node.children() {
            if child.is_chars() {
                let values = cascaded.get();
                let text = child.borrow_chars().get_string();
                self.add_chars(&text, values);
            } else if is_element_of_type!(child, TSpan) {
                let child_cascaded = CascadedValues::clone_with_node(cascaded, &child);
                let values = child_cascaded.get();

                if !values.is_displayed() {
                    continue;
                }

                let params = self.viewport.normalize_params(values);
                let (x, y, dx, dy) = {
                    let tspan = borrow_element_as!(child, TSpan);
                    (
                        tspan.x.map(|l| l.normalize(&params)),
                        tspan.y.map(|l| l.normalize(&params)),
                        tspan.dx.normalize(&params),
                        tspan.dy.normalize(&params),
                    )
                };

                if let Some(x) = x {
                    self.end_chunk();
                    self.pen.0 = x;
                    self.start_chunk(values.text_anchor);
                }

                if let Some(y) = y {
                    self.pen.1 = y;
                }

                self.pen.0 += dx;
                self.pen.1 += dy;

                self.add_children(&child, &child_cascaded);
            }
        }
    }
}

/// The `<text>` element.
#[derive(Default)]
pub struct Text {
    x: Length<Horizontal>,
    y: Length<Vertical>,
    dx: Length<Horizontal>,
    dy: Length<Vertical>,
}

impl Text {
    fn layout_runs(
        &self,
        node: &Node,
        text_layout: &dyn TextLayout,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
    ) -> Vec<PositionedRun> {
        let values = cascaded.get();
        let params = viewport.normalize_params(values);

        let mut ctx = LayoutContext {
            text_layout,
            viewport,
            scale: viewport.transform.expansion_factor(),
            whitespace: WhitespaceState::new(),
            pen: (
                self.x.normalize(&params) + self.dx.normalize(&params),
                self.y.normalize(&params) + self.dy.normalize(&params),
            ),
            chunks: Vec::new(),
        };

        ctx.start_chunk(values.text_anchor);
        ctx.add_children(node, cascaded);
        ctx.end_chunk();

        ctx.chunks.into_iter().flat_map(|c| c.runs).collect()
    }
}

impl ElementTrait for Text {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "dx") => set_attribute(&mut self.dx, attr.parse(value)),
                expanded_name!("", "dy") => set_attribute(&mut self.dy, attr.parse(value)),
                _ => (),
            }
        }
    }

    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let text_layout = match draw_ctx.config().text_layout.clone() {
            Some(t) => t,
            None => {
                rsvg_log!("no text layout service configured, not drawing {}", node);
                return Ok(viewport.empty_bbox());
            }
        };

        let values = cascaded.get();

        let stacking_ctx = {
            let elt = node.borrow_element();
            StackingContext::new(acquired_nodes, &elt, values.transform, values)
        };

        draw_ctx.with_discrete_layer(
            &stacking_ctx,
            acquired_nodes,
            viewport,
            values,
            clipping,
            &mut |an, dc, viewport| {
                let runs = self.layout_runs(node, text_layout.as_ref(), cascaded, viewport);

                let mut bbox = viewport.empty_bbox();

                for r in runs {
                    let fill_paint = r.values.fill.resolve(an, r.values.color)?;

                    let span = layout::TextSpan {
                        run: r.run,
                        x: r.x,
                        y: r.y,
                        is_visible: r.values.is_visible(),
                        fill_paint,
                        fill_opacity: r.values.fill_opacity,
                    };

                    let span_bbox = dc.draw_text_span(&span, an, viewport, &r.values, clipping)?;
                    bbox.insert(&span_bbox);
                }

                Ok(bbox)
            },
        )
    }
}

/// The `<tspan>` element.  It is laid out by its `<text>` ancestor.
#[derive(Default)]
pub struct TSpan {
    x: Option<Length<Horizontal>>,
    y: Option<Length<Vertical>>,
    dx: Length<Horizontal>,
    dy: Length<Vertical>,
}

impl ElementTrait for TSpan {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "dx") => set_attribute(&mut self.dx, attr.parse(value)),
                expanded_name!("", "dy") => set_attribute(&mut self.dy, attr.parse(value)),
                _ => (),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_space_collapses_and_trims() {
        let mut ws = WhitespaceState::new();
        assert_eq!(ws.normalize(XmlSpace::Default, "\n  hello\t\tworld \n"), "hello world");
    }

    #[test]
    fn default_space_removes_newlines_without_adding_spaces() {
        let mut ws = WhitespaceState::new();
        assert_eq!(ws.normalize(XmlSpace::Default, "a\nb"), "ab");
    }

    #[test]
    fn spaces_collapse_across_nodes() {
        let mut ws = WhitespaceState::new();
        assert_eq!(ws.normalize(XmlSpace::Default, "foo  "), "foo");
        assert_eq!(ws.normalize(XmlSpace::Default, "  bar "), " bar");
        assert_eq!(ws.normalize(XmlSpace::Default, "   "), "");
    }

    #[test]
    fn preserve_keeps_every_space() {
        let mut ws = WhitespaceState::new();
        assert_eq!(ws.normalize(XmlSpace::Preserve, " a\n\tb  "), " a  b  ");
    }

    #[test]
    fn chars_append() {
        let chars = Chars::new("foo");
        chars.append("bar");
        assert_eq!(chars.get_string(), "foobar");
        assert!(!chars.is_empty());
        assert!(Chars::new("").is_empty());
    }

    #[test]
    fn glyph_run_sampling_is_bounded() {
        let run = GlyphRun {
            width: 2,
            height: 2,
            coverage: vec![10, 20, 30, 40],
            ink_rect: Rect::new(0.0, -2.0, 2.0, 0.0),
            advance: 2.0,
        };

        assert_eq!(run.sample(0.5, 0.5), 10);
        assert_eq!(run.sample(1.5, 0.5), 20);
        assert_eq!(run.sample(1.9, 1.9), 40);
        assert_eq!(run.sample(2.0, 0.0), 0);
        assert_eq!(run.sample(-0.1, 0.0), 0);
    }

    #[test]
    fn anchors_shift_chunks() {
        let start = Chunk::new(TextAnchor::Start, 10.0);
        let middle = Chunk::new(TextAnchor::Middle, 10.0);
        let end = Chunk::new(TextAnchor::End, 10.0);

        assert_eq!(start.anchor_offset(30.0), 0.0);
        assert_eq!(middle.anchor_offset(30.0), -10.0);
        assert_eq!(end.anchor_offset(30.0), -20.0);
    }
}
