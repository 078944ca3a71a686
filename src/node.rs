//! Tree nodes, the representation of SVG elements.
//!
//! The [rctree crate][rctree] represents the tree of elements.  Its [`rctree::Node`]
//! struct provides a generic wrapper over nodes in a tree; we put a [`NodeData`] as its
//! type parameter, and have a type alias [`Node`]` = rctree::Node<NodeData>`.
//!
//! Nodes are not constructed directly by callers; the tree builder in [`crate::xml`]
//! creates them while reading the document.

use markup5ever::QualName;
use std::cell::{Ref, RefMut};
use std::fmt;

use crate::bbox::BoundingBox;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::*;
use crate::error::*;
use crate::length::Dpi;
use crate::state::State;
use crate::text::Chars;
use crate::xml::Attributes;

/// Strong reference to an element in the SVG tree.
///
/// See the [module documentation][self] for more information.
pub type Node = rctree::Node<NodeData>;

/// Weak reference to an element in the SVG tree.
pub type WeakNode = rctree::WeakNode<NodeData>;

/// Data for a single DOM node.
///
/// Only character data inside `<text>`, `<tspan>` and `<style>` becomes a text node; the
/// whitespace between other elements is dropped by the tree builder.
///
/// Use the `is_chars` or `is_element` methods from the [`NodeBorrow`] trait to see if
/// you can then call `borrow_chars`, `borrow_element`, or `borrow_element_mut`.
pub enum NodeData {
    Element(Box<Element>),
    Text(Box<Chars>),
}

impl NodeData {
    pub fn new_element(name: &QualName, attrs: Attributes) -> NodeData {
        NodeData::Element(Box::new(Element::new(name, attrs)))
    }

    pub fn new_chars(initial_text: &str) -> NodeData {
        NodeData::Text(Box::new(Chars::new(initial_text)))
    }
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NodeData::Element(ref e) => {
                write!(f, "{}", e)?;
            }
            NodeData::Text(_) => {
                write!(f, "Chars")?;
            }
        }

        Ok(())
    }
}

/// Can obtain computed values from a node
///
/// Each element stores a [`State`] that gets computed when its start tag is read.
/// However, sometimes nodes need to be rendered outside the normal hierarchy.  For
/// example, the `<use>` element can "instance" a subtree from elsewhere in the SVG; it
/// causes the instanced subtree to re-cascade from the state of the `<use>` element.
///
/// You can then call the `get()` method on the resulting `CascadedValues` to get a
/// `&State` whose fields you can access.
pub enum CascadedValues<'a> {
    FromNode(Ref<'a, Element>),
    FromValues(Box<State>, Dpi),
}

impl<'a> CascadedValues<'a> {
    /// Creates a `CascadedValues` that has the same cascading mode as &self
    ///
    /// This is what nodes should normally use to draw their children from their `draw()` method.
    /// Nodes that need to override the cascade for their children can use `new_from_values()`
    /// instead.
    pub fn clone_with_node(&self, node: &'a Node) -> CascadedValues<'a> {
        match *self {
            CascadedValues::FromNode(_) => CascadedValues::FromNode(node.borrow_element()),

            CascadedValues::FromValues(ref v, dpi) => {
                CascadedValues::new_from_values(node, v, dpi)
            }
        }
    }

    /// Creates a `CascadedValues` that will hold the `node`'s computed values
    ///
    /// This is to be used only in the toplevel drawing function, or in elements like `<marker>`
    /// that don't propagate their parent's cascade to their children.  All others should use
    /// `clone_with_node()` to derive the cascade from an existing one.
    pub fn new_from_node(node: &Node) -> CascadedValues<'_> {
        CascadedValues::FromNode(node.borrow_element())
    }

    /// Creates a `CascadedValues` that will override the `node`'s cascade with the specified
    /// `values`
    ///
    /// This is for the `<use>` element, which draws the element which it references with the
    /// `<use>`'s own cascade, not with the element's original cascade.
    pub fn new_from_values(node: &'a Node, values: &State, dpi: Dpi) -> CascadedValues<'a> {
        let v = node.borrow_element().compute_values(values, dpi);
        CascadedValues::FromValues(Box::new(v), dpi)
    }

    /// Returns the cascaded `State`.
    ///
    /// Nodes should use this from their `draw()` implementation to get the
    /// `State` from the `CascadedValues` that got passed to `draw()`.
    pub fn get(&'a self) -> &'a State {
        match *self {
            CascadedValues::FromNode(ref e) => e.get_computed_values(),
            CascadedValues::FromValues(ref v, _) => v,
        }
    }
}

/// Typed access to the contents of a node.
///
/// The `borrow_*` methods panic when the node holds the other kind of data; callers
/// check with `is_element()` or `is_chars()` first, or know the node type from how
/// they found it.
pub trait NodeBorrow {
    fn is_element(&self) -> bool;
    fn is_chars(&self) -> bool;

    fn borrow_chars(&self) -> Ref<'_, Chars>;
    fn borrow_element(&self) -> Ref<'_, Element>;
    fn borrow_element_mut(&mut self) -> RefMut<'_, Element>;

    /// Shorthand for the concrete element type of an element node.
    fn borrow_element_data(&self) -> Ref<'_, ElementData>;
}

impl NodeBorrow for Node {
    fn is_element(&self) -> bool {
        matches!(*self.borrow(), NodeData::Element(_))
    }

    fn is_chars(&self) -> bool {
        !self.is_element()
    }

    fn borrow_chars(&self) -> Ref<'_, Chars> {
        Ref::map(self.borrow(), |data| match data {
            NodeData::Text(chars) => &**chars,
            NodeData::Element(e) => panic!("<{}> is not a text node", e.element_name().local),
        })
    }

    fn borrow_element(&self) -> Ref<'_, Element> {
        Ref::map(self.borrow(), |data| match data {
            NodeData::Element(e) => &**e,
            NodeData::Text(_) => panic!("text node is not an element"),
        })
    }

    fn borrow_element_mut(&mut self) -> RefMut<'_, Element> {
        RefMut::map(self.borrow_mut(), |data| match data {
            NodeData::Element(e) => &mut **e,
            NodeData::Text(_) => panic!("text node is not an element"),
        })
    }

    fn borrow_element_data(&self) -> Ref<'_, ElementData> {
        Ref::map(self.borrow_element(), |e| &e.element_data)
    }
}

/// Whether an element node holds the given element type, e.g.
/// `is_element_of_type!(node, Stop)`.
#[macro_export]
macro_rules! is_element_of_type {
    ($node:expr, $element_type:ident) => {
        matches!(
            *$node.borrow_element_data(),
            $crate::element::ElementData::$element_type(_)
        )
    };
}

/// Borrows an element node as its concrete element type; panics on any other type.
#[macro_export]
macro_rules! borrow_element_as {
    ($node:expr, $element_type:ident) => {
        std::cell::Ref::map($node.borrow_element_data(), |data| match data {
            $crate::element::ElementData::$element_type(e) => &**e,
            _ => panic!("element is not a {}", stringify!($element_type)),
        })
    };
}

/// Helper trait for drawing recursively
pub trait NodeDraw {
    fn draw(
        &self,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError>;

    fn draw_children(
        &self,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError>;
}

impl NodeDraw for Node {
    fn draw(
        &self,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        match *self.borrow() {
            NodeData::Element(ref e) => {
                e.draw(self, acquired_nodes, cascaded, viewport, draw_ctx, clipping)
            }
            _ => Ok(viewport.empty_bbox()),
        }
    }

    fn draw_children(
        &self,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let mut bbox = viewport.empty_bbox();

        for child in self.children().filter(|c| c.is_element()) {
            if !child.borrow_element().is_renderable() {
                continue;
            }

            let child_bbox = draw_ctx.draw_node_from_stack(
                &child,
                acquired_nodes,
                &CascadedValues::clone_with_node(cascaded, &child),
                viewport,
                clipping,
            )?;
            bbox.insert(&child_bbox);
        }

        Ok(bbox)
    }
}
