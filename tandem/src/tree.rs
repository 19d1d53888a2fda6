//! Read-only access to the trees being matched.
//!
//! The matcher never owns a tree. It walks any structure that can hand out
//! [`NodeView`]s and sibling/parent links for arena [`NodeId`]s.

use compact_str::CompactString;
use facet::Facet;
use indextree::NodeId;

/// An attribute on an element node.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    /// Attribute name
    pub name: CompactString,
    /// Attribute value
    pub value: CompactString,
}

impl Attribute {
    /// Create an attribute from a name and a value.
    pub fn new(name: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Numeric node kind codes, as used by the DOM.
pub mod code {
    /// Element node
    pub const ELEMENT: u8 = 1;
    /// Text node
    pub const TEXT: u8 = 3;
    /// CDATA section
    pub const CDATA_SECTION: u8 = 4;
    /// Processing instruction
    pub const PROCESSING_INSTRUCTION: u8 = 7;
    /// Comment node
    pub const COMMENT: u8 = 8;
    /// Document node
    pub const DOCUMENT: u8 = 9;
    /// Document type node
    pub const DOCUMENT_TYPE: u8 = 10;
    /// Document fragment node
    pub const DOCUMENT_FRAGMENT: u8 = 11;
}

/// Borrowed view of an element: its tag and attributes in document order.
#[derive(Debug, Clone, Copy)]
pub struct ElementView<'a> {
    /// Tag name
    pub tag: &'a str,
    /// Attributes in document order
    pub attrs: &'a [Attribute],
}

impl<'a> ElementView<'a> {
    /// Value of the named attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Value of the named attribute, treating an empty value as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&'a str> {
        self.attr(name).filter(|value| !value.is_empty())
    }
}

/// What a node is, as seen by the matcher.
#[derive(Debug, Clone, Copy)]
pub enum NodeView<'a> {
    /// Document root
    Document,
    /// Document fragment root
    Fragment,
    /// `<!DOCTYPE name>`
    DocumentType(&'a str),
    /// Element with tag and attributes
    Element(ElementView<'a>),
    /// Text content
    Text(&'a str),
    /// Comment content
    Comment(&'a str),
    /// A node kind the matcher cannot handle (CDATA, processing instructions).
    Unsupported {
        /// Human readable kind name
        kind: &'static str,
        /// DOM node kind code
        code: u8,
        /// Processing instruction target, empty for other kinds
        name: &'a str,
        /// Node content
        value: &'a str,
    },
}

impl<'a> NodeView<'a> {
    /// DOM node kind code.
    pub fn code(&self) -> u8 {
        match self {
            NodeView::Document => code::DOCUMENT,
            NodeView::Fragment => code::DOCUMENT_FRAGMENT,
            NodeView::DocumentType(_) => code::DOCUMENT_TYPE,
            NodeView::Element(_) => code::ELEMENT,
            NodeView::Text(_) => code::TEXT,
            NodeView::Comment(_) => code::COMMENT,
            NodeView::Unsupported { code, .. } => *code,
        }
    }

    /// Human readable kind name, used in faults.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeView::Document => "document",
            NodeView::Fragment => "fragment",
            NodeView::DocumentType(_) => "document type",
            NodeView::Element(_) => "element",
            NodeView::Text(_) => "text",
            NodeView::Comment(_) => "comment",
            NodeView::Unsupported { kind, .. } => kind,
        }
    }

    /// The element view, if this is an element.
    pub fn as_element(&self) -> Option<ElementView<'a>> {
        match self {
            NodeView::Element(element) => Some(*element),
            _ => None,
        }
    }
}

/// A tree the matcher can walk.
///
/// Nodes are identified by arena ids; the tree decides what each id means.
pub trait MatchTree {
    /// The root node.
    fn root(&self) -> NodeId;

    /// What the node is.
    fn view(&self, node: NodeId) -> NodeView<'_>;

    /// Parent of the node, `None` for the root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// First child of the node.
    fn first_child(&self, node: NodeId) -> Option<NodeId>;

    /// Sibling immediately before the node.
    fn previous_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Sibling immediately after the node.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Children of the node in document order.
    fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::successors(self.first_child(node), move |&child| {
            self.next_sibling(child)
        })
    }

    /// The node and all of its descendants in pre-order.
    fn descendants(&self, node: NodeId) -> Descendants<'_, Self>
    where
        Self: Sized,
    {
        Descendants {
            tree: self,
            root: node,
            next: Some(node),
        }
    }
}

/// Pre-order walk of a subtree, see [`MatchTree::descendants`].
pub struct Descendants<'t, T> {
    tree: &'t T,
    root: NodeId,
    next: Option<NodeId>,
}

impl<T: MatchTree> Iterator for Descendants<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        let tree = self.tree;
        let root = self.root;
        self.next = tree.first_child(current).or_else(|| {
            let mut node = current;
            loop {
                if node == root {
                    return None;
                }
                if let Some(sibling) = tree.next_sibling(node) {
                    return Some(sibling);
                }
                node = tree.parent(node)?;
            }
        });
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestTree;
    use facet_testhelpers::test;

    #[test]
    fn descendants_walk_in_pre_order() {
        let mut tree = TestTree::new();
        let a = tree.element(tree.root, "a", &[]);
        let b = tree.element(a, "b", &[]);
        let c = tree.text(b, "c");
        let d = tree.element(a, "d", &[]);
        let e = tree.comment(tree.root, "e");

        let all: Vec<_> = tree.descendants(tree.root).collect();
        assert_eq!(all, vec![tree.root, a, b, c, d, e]);

        // A subtree walk stops at the subtree's root.
        let under_a: Vec<_> = tree.descendants(a).collect();
        assert_eq!(under_a, vec![a, b, c, d]);
        let under_b: Vec<_> = tree.descendants(b).collect();
        assert_eq!(under_b, vec![b, c]);
    }

    #[test]
    fn children_are_in_document_order() {
        let mut tree = TestTree::new();
        let p = tree.element(tree.root, "p", &[]);
        let x = tree.text(p, "x");
        let y = tree.comment(p, "y");
        assert_eq!(tree.children(p).collect::<Vec<_>>(), vec![x, y]);
        assert_eq!(tree.children(x).count(), 0);
    }

    #[test]
    fn element_attribute_lookup() {
        let attrs = [Attribute::new("id", ""), Attribute::new("class", "k")];
        let view = ElementView {
            tag: "div",
            attrs: &attrs,
        };
        assert_eq!(view.attr("id"), Some(""));
        assert_eq!(view.non_empty_attr("id"), None);
        assert_eq!(view.non_empty_attr("class"), Some("k"));
        assert_eq!(NodeView::Element(view).code(), code::ELEMENT);
    }
}
