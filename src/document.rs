//! Main SVG document structure.
//!
//! The document is built incrementally by the tree builder in [`crate::xml`], and it is
//! rendered piecewise while it is still being built.  Because of this, a reference can
//! only be resolved to an element that has already been read.

use markup5ever::QualName;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::css::Stylesheet;
use crate::error::AcquireError;
use crate::node::{Node, NodeBorrow, NodeData};
use crate::xml::Attributes;

/// Maximum number of references that can be resolved while rendering one subtree.
///
/// This is a mitigation for documents that instance a huge number of elements via
/// `<use>`, recursive patterns, and the like.
pub const MAX_REFERENCED_ELEMENTS: usize = 500_000;

/// Maximum number of elements that can be loaded in a document.
pub const MAX_LOADED_ELEMENTS: usize = 1_000_000;

/// A loaded SVG document: the tree of elements, the registry of ids, and the
/// stylesheet gathered from `<style>` elements.
#[derive(Default)]
pub struct Document {
    tree: Option<Node>,
    ids: HashMap<String, Node>,
    stylesheet: Stylesheet,
}

impl Document {
    pub fn new() -> Document {
        Default::default()
    }

    /// The root element, if the document has one yet.
    pub fn root(&self) -> Option<Node> {
        self.tree.clone()
    }

    /// Looks up an element by its `id` attribute.
    pub fn lookup_node(&self, id: &str) -> Option<Node> {
        self.ids.get(id).cloned()
    }

    /// Registers `node` under `id`.  A later element with the same id replaces the earlier
    /// one.
    pub fn insert_id(&mut self, id: &str, node: &Node) {
        self.ids.insert(id.to_string(), node.clone());
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    /// Adds the rules in `text` to the document's stylesheet.  They apply to elements that
    /// start after this call.
    pub fn append_stylesheet_from_text(&mut self, text: &str) {
        self.stylesheet.add_rules_from_str(text);
    }

    /// Creates an element and appends it to `parent`, or makes it the root of the tree.
    ///
    /// The element's state is not computed here; see [`crate::element::Element::cascade`].
    /// Returns `None` if there is no parent and the root has already been set.
    pub fn append_element(
        &mut self,
        name: &QualName,
        attrs: Attributes,
        parent: Option<&mut Node>,
    ) -> Option<Node> {
        let node = Node::new(NodeData::new_element(name, attrs));

        if let Some(parent) = parent {
            parent.append(node.clone());
        } else if self.tree.is_none() {
            self.tree = Some(node.clone());
        } else {
            return None;
        }

        let id = node.borrow_element().get_id().map(String::from);
        if let Some(id) = id {
            self.insert_id(&id, &node);
        }

        Some(node)
    }

    pub fn append_characters(&mut self, text: &str, parent: &mut Node) {
        if text.is_empty() {
            return;
        }

        // Coalesce with the previous text node, so that a run of text that got split
        // between input chunks is still a single node.
        if let Some(child) = parent.last_child().filter(|c| c.is_chars()) {
            child.borrow_chars().append(text);
        } else {
            parent.append(Node::new(NodeData::new_chars(text)));
        }
    }
}

pub struct AcquiredNode {
    stack: Option<Rc<RefCell<NodeStack>>>,
    node: Node,
}

impl Drop for AcquiredNode {
    fn drop(&mut self) {
        if let Some(ref stack) = self.stack {
            let mut stack = stack.borrow_mut();
            let last = stack.pop();
            debug_assert!(last.as_ref() == Some(&self.node));
        }
    }
}

impl AcquiredNode {
    pub fn get(&self) -> &Node {
        &self.node
    }
}

/// Detects circular references between nodes, and enforces referencing limits.
///
/// Consider this fragment of SVG:
///
/// ```xml
/// <pattern id="foo">
///   <rect width="1" height="1" fill="url(#foo)"/>
/// </pattern>
/// ```
///
/// The pattern has a child element that references the pattern itself.  This kind of circular
/// reference is invalid.  The `AcquiredNodes` struct is passed around
/// wherever it may be necessary to resolve references to nodes, or to access nodes
/// "elsewhere" in the DOM that is not the current subtree.
///
/// Also, such constructs that reference other elements can be maliciously arranged like
/// in the billion laughs attack, to cause huge amounts of CPU to be consumed through
/// creating an exponential number of references.  `AcquiredNodes` imposes a hard limit on
/// the number of references that can be resolved for typical, well-behaved SVG documents.
///
/// The [`Self::acquire()`] and [`Self::acquire_ref()`] methods return an [`AcquiredNode`], which
/// acts like a smart pointer for a [`Node`].  Once a node has been acquired, it cannot be
/// acquired again until its [`AcquiredNode`] is dropped.  In the example above, a graphic element
/// would acquire the `pattern`, which would then acquire its `rect` child, which then would fail
/// to re-acquire the `pattern`, thus signaling a circular reference.
pub struct AcquiredNodes<'i> {
    document: &'i Document,
    num_elements_acquired: usize,
    node_stack: Rc<RefCell<NodeStack>>,
}

impl<'i> AcquiredNodes<'i> {
    pub fn new(document: &Document) -> AcquiredNodes<'_> {
        AcquiredNodes {
            document,
            num_elements_acquired: 0,
            node_stack: Rc::new(RefCell::new(NodeStack::new())),
        }
    }

    /// Acquires a node by its id.
    pub fn acquire(&mut self, id: &str) -> Result<AcquiredNode, AcquireError> {
        self.num_elements_acquired += 1;

        if self.num_elements_acquired > MAX_REFERENCED_ELEMENTS {
            return Err(AcquireError::MaxReferencesExceeded);
        }

        let node = self
            .document
            .lookup_node(id)
            .ok_or_else(|| AcquireError::LinkNotFound(id.to_string()))?;

        if !node.is_element() {
            return Err(AcquireError::InvalidLinkType(id.to_string()));
        }

        if node.borrow_element().is_accessed_by_reference() {
            self.acquire_ref(&node)
        } else {
            Ok(AcquiredNode { stack: None, node })
        }
    }

    /// Acquires a node whose reference is already known.
    ///
    /// This is used by elements that reference others through an href, like `<use>`,
    /// which acquire themselves before following the link so that a cycle back to them
    /// is detected.
    pub fn acquire_ref(&self, node: &Node) -> Result<AcquiredNode, AcquireError> {
        if self.node_stack.borrow().contains(node) {
            Err(AcquireError::CircularReference(node.clone()))
        } else {
            self.node_stack.borrow_mut().push(node);
            Ok(AcquiredNode {
                stack: Some(self.node_stack.clone()),
                node: node.clone(),
            })
        }
    }
}

/// Keeps a stack of nodes and can check if a certain node is contained in the stack
///
/// Sometimes parts of the code cannot plainly use the implicit stack of acquired
/// nodes, and they must keep their own stack of nodes to test for reference cycles.
/// NodeStack can be used to do that.
#[derive(Default)]
pub struct NodeStack(Vec<Node>);

impl NodeStack {
    pub fn new() -> NodeStack {
        NodeStack(Vec::new())
    }

    pub fn push(&mut self, node: &Node) {
        self.0.push(node.clone());
    }

    pub fn pop(&mut self) -> Option<Node> {
        self.0.pop()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.0.iter().any(|n| *n == *node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever::{namespace_url, ns, LocalName};

    fn qual(name: &str) -> QualName {
        QualName::new(None, ns!(), LocalName::from(name))
    }

    fn attrs_with_id(id: &str) -> Attributes {
        let name = qual("id");
        Attributes::from_pairs(vec![(&name, id)]).unwrap()
    }

    fn document() -> (Document, Node) {
        let mut doc = Document::new();
        let root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        (doc, root)
    }

    #[test]
    fn only_one_root() {
        let (mut doc, _root) = document();
        assert!(doc.append_element(&qual("svg"), Attributes::new(), None).is_none());
    }

    #[test]
    fn later_ids_replace_earlier_ones() {
        let (mut doc, mut root) = document();

        let first = doc
            .append_element(&qual("rect"), attrs_with_id("a"), Some(&mut root))
            .unwrap();
        assert!(doc.lookup_node("a") == Some(first));

        let second = doc
            .append_element(&qual("circle"), attrs_with_id("a"), Some(&mut root))
            .unwrap();
        assert!(doc.lookup_node("a") == Some(second));
        assert!(doc.lookup_node("b").is_none());
    }

    #[test]
    fn characters_are_coalesced() {
        let (mut doc, mut root) = document();
        let mut text = doc
            .append_element(&qual("text"), Attributes::new(), Some(&mut root))
            .unwrap();

        doc.append_characters("Hello, ", &mut text);
        doc.append_characters("world", &mut text);
        doc.append_characters("", &mut text);

        assert_eq!(text.children().count(), 1);
        let child = text.first_child().unwrap();
        assert_eq!(child.borrow_chars().get_string(), "Hello, world");
    }

    #[test]
    fn detects_circular_references() {
        let (mut doc, mut root) = document();
        let mut group = doc
            .append_element(&qual("pattern"), attrs_with_id("p"), Some(&mut root))
            .unwrap();
        doc.append_element(&qual("rect"), attrs_with_id("r"), Some(&mut group))
            .unwrap();

        let mut acquired = AcquiredNodes::new(&doc);

        let pattern = acquired.acquire("p").unwrap();
        assert!(matches!(
            acquired.acquire("p"),
            Err(AcquireError::CircularReference(_))
        ));

        // non-referenced elements can be acquired any number of times
        let _r1 = acquired.acquire("r").unwrap();
        let _r2 = acquired.acquire("r").unwrap();

        drop(pattern);
        assert!(acquired.acquire("p").is_ok());

        assert!(matches!(
            acquired.acquire("nonexistent"),
            Err(AcquireError::LinkNotFound(_))
        ));
    }

    #[test]
    fn acquire_ref_detects_self_reference() {
        let (doc, root) = document();
        let acquired = AcquiredNodes::new(&doc);

        let _held = acquired.acquire_ref(&root).unwrap();
        assert!(acquired.acquire_ref(&root).is_err());
    }
}
