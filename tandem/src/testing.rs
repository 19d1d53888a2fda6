//! A small owned tree for exercising the matcher in unit tests.

use indextree::{Arena, NodeId};

use crate::tree::{Attribute, ElementView, MatchTree, NodeView, code};

pub(crate) enum TestNode {
    Document,
    Element { tag: String, attrs: Vec<Attribute> },
    Text(String),
    Comment(String),
    CData(String),
}

pub(crate) struct TestTree {
    pub arena: Arena<TestNode>,
    pub root: NodeId,
}

impl TestTree {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TestNode::Document);
        Self { arena, root }
    }

    fn push(&mut self, parent: NodeId, node: TestNode) -> NodeId {
        let id = self.arena.new_node(node);
        parent.append(id, &mut self.arena);
        id
    }

    pub fn element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute::new(*name, *value))
            .collect();
        self.push(
            parent,
            TestNode::Element {
                tag: tag.to_string(),
                attrs,
            },
        )
    }

    pub fn text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, TestNode::Text(text.to_string()))
    }

    pub fn comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, TestNode::Comment(text.to_string()))
    }

    pub fn cdata(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, TestNode::CData(text.to_string()))
    }
}

impl MatchTree for TestTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn view(&self, node: NodeId) -> NodeView<'_> {
        match self.arena[node].get() {
            TestNode::Document => NodeView::Document,
            TestNode::Element { tag, attrs } => NodeView::Element(ElementView { tag, attrs }),
            TestNode::Text(text) => NodeView::Text(text),
            TestNode::Comment(text) => NodeView::Comment(text),
            TestNode::CData(text) => NodeView::Unsupported {
                kind: "cdata section",
                code: code::CDATA_SECTION,
                name: "",
                value: text,
            },
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].parent()
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].first_child()
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].previous_sibling()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].next_sibling()
    }
}
