//! Arena-based document model.
//!
//! This module provides the mutable tree the edit script is applied to.
//! Key features:
//! - **indextree Arena**: all nodes of a document live in one arena
//! - **Stable ids**: a node keeps its `NodeId` across moves, so matches stay valid
//!   while the tree is rearranged
//! - **Shallow import**: nodes are copied between documents without their children

use compact_str::CompactString;
use tandem::indextree::{Arena, NodeId};
use tandem::tree::code;
use tandem::{Attribute, ElementView, Fault, MatchTree, NodeView};

/// A document or fragment, as an arena of nodes under a single root.
#[derive(Debug, Clone)]
pub struct Document {
    /// All nodes, attached or not
    pub arena: Arena<NodeKind>,

    /// Root node, either [`NodeKind::Document`] or [`NodeKind::Fragment`]
    pub root: NodeId,
}

/// Node types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Fragment root
    Fragment,
    /// `<!DOCTYPE name>`
    DocumentType(CompactString),
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment content
    Comment(String),
    /// `<![CDATA[...]]>`, carried through but never diffed
    CData(String),
    /// `<?target data?>`, carried through but never diffed
    ProcessingInstruction {
        /// Instruction target
        target: CompactString,
        /// Everything after the target
        data: String,
    },
}

/// Element data (tag + attributes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Tag name
    pub tag: CompactString,

    /// Attributes in document order; names are unique
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    /// Element without attributes.
    pub fn new(tag: impl Into<CompactString>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
        }
    }

    /// Value of the named attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Set an attribute, replacing the value in place or appending it.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value.into(),
            None => self.attrs.push(Attribute::new(name, value)),
        }
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|attr| attr.name != name);
        self.attrs.len() != before
    }

    fn view(&self) -> ElementView<'_> {
        ElementView {
            tag: &self.tag,
            attrs: &self.attrs,
        }
    }
}

impl NodeKind {
    /// Human readable kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Fragment => "fragment",
            NodeKind::DocumentType(_) => "document type",
            NodeKind::Element(_) => "element",
            NodeKind::Text(_) => "text",
            NodeKind::Comment(_) => "comment",
            NodeKind::CData(_) => "cdata section",
            NodeKind::ProcessingInstruction { .. } => "processing instruction",
        }
    }

    /// The element data, if this is an element.
    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// The element data, mutably.
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Content of a text or comment node.
    pub fn value(&self) -> Option<&str> {
        match self {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Content of a text or comment node, mutably.
    pub fn value_mut(&mut self) -> Option<&mut String> {
        match self {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document.
    pub fn new() -> Self {
        Self::with_root(NodeKind::Document)
    }

    /// Empty fragment.
    pub fn fragment() -> Self {
        Self::with_root(NodeKind::Fragment)
    }

    fn with_root(kind: NodeKind) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(kind);
        Self { arena, root }
    }

    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeKind {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeKind {
        self.arena[id].get_mut()
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Parent of a node, `None` for the root and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Position of a node among its siblings.
    pub fn index_of(&self, id: NodeId) -> usize {
        id.preceding_siblings(&self.arena).count() - 1
    }

    /// Child of `parent` at `index`.
    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).nth(index)
    }

    /// Create a node and append it to `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, Fault> {
        let node = self.arena.new_node(kind);
        parent
            .checked_append(node, &mut self.arena)
            .map_err(|err| Fault::invariant(format!("cannot append node: {err:?}")))?;
        Ok(node)
    }

    /// Create a detached copy of `node` from `source`, without its children.
    ///
    /// Elements keep their tag and attributes. Only elements, text and
    /// comments can be copied.
    pub fn import_shallow(&mut self, source: &Document, node: NodeId) -> Result<NodeId, Fault> {
        let kind = source.get(node);
        match kind {
            NodeKind::Element(_) | NodeKind::Text(_) | NodeKind::Comment(_) => {
                Ok(self.arena.new_node(kind.clone()))
            }
            other => Err(Fault::unsupported(other.kind_name())),
        }
    }

    /// Insert `node` into `parent` before the child currently at `index`,
    /// detaching it from wherever it is first.
    ///
    /// The reference child is read before `node` is detached, so `index`
    /// counts `node` itself when it is already a child of `parent`. An index
    /// past the last child appends.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<(), Fault> {
        let mut reference = self.child_at(parent, index);
        if reference == Some(node) {
            reference = self.arena[node].next_sibling();
        }
        node.detach(&mut self.arena);
        let placed = match reference {
            Some(reference) => reference.checked_insert_before(node, &mut self.arena),
            None => parent.checked_append(node, &mut self.arena),
        };
        placed.map_err(|err| Fault::invariant(format!("cannot place node: {err:?}")))
    }

    /// Detach a node and drop it together with its descendants.
    pub fn remove_subtree(&mut self, node: NodeId) {
        node.remove_subtree(&mut self.arena);
    }

    /// Serialize the content under the root as markup.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root) {
            self.serialize_node(&mut out, child, false);
        }
        out
    }

    /// Markup with every element's attributes sorted by name.
    ///
    /// Two documents with equal snapshots have the same structure, the same
    /// content and the same attribute sets.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root) {
            self.serialize_node(&mut out, child, true);
        }
        out
    }

    fn serialize_node(&self, out: &mut String, id: NodeId, sorted: bool) {
        match self.get(id) {
            NodeKind::Document | NodeKind::Fragment => {
                for child in self.children(id) {
                    self.serialize_node(out, child, sorted);
                }
            }
            NodeKind::DocumentType(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Element(element) => self.serialize_element(out, id, element, sorted),
            NodeKind::Text(text) => escape_into(out, text, false),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                out.push_str("<?");
                out.push_str(target);
                if !data.is_empty() {
                    out.push(' ');
                    out.push_str(data);
                }
                out.push_str("?>");
            }
        }
    }

    fn serialize_element(&self, out: &mut String, id: NodeId, element: &ElementData, sorted: bool) {
        out.push('<');
        out.push_str(&element.tag);

        let mut attrs: Vec<&Attribute> = element.attrs.iter().collect();
        if sorted {
            attrs.sort_by(|a, b| a.name.cmp(&b.name));
        }
        for attr in attrs {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            escape_into(out, &attr.value, true);
            out.push('"');
        }
        out.push('>');

        let mut children = self.children(id).peekable();
        if is_void_element(&element.tag) && children.peek().is_none() {
            return;
        }
        for child in children {
            self.serialize_node(out, child, sorted);
        }

        out.push_str("</");
        out.push_str(&element.tag);
        out.push('>');
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// HTML5 void elements that never have closing tags
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

impl MatchTree for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn view(&self, node: NodeId) -> NodeView<'_> {
        match self.get(node) {
            NodeKind::Document => NodeView::Document,
            NodeKind::Fragment => NodeView::Fragment,
            NodeKind::DocumentType(name) => NodeView::DocumentType(name),
            NodeKind::Element(element) => NodeView::Element(element.view()),
            NodeKind::Text(text) => NodeView::Text(text),
            NodeKind::Comment(text) => NodeView::Comment(text),
            NodeKind::CData(text) => NodeView::Unsupported {
                kind: "cdata section",
                code: code::CDATA_SECTION,
                name: "",
                value: text,
            },
            NodeKind::ProcessingInstruction { target, data } => NodeView::Unsupported {
                kind: "processing instruction",
                code: code::PROCESSING_INSTRUCTION,
                name: target,
                value: data,
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

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn element(doc: &mut Document, parent: NodeId, tag: &str) -> NodeId {
        doc.append(parent, NodeKind::Element(ElementData::new(tag)))
            .unwrap()
    }

    fn text(doc: &mut Document, parent: NodeId, value: &str) -> NodeId {
        doc.append(parent, NodeKind::Text(value.to_string()))
            .unwrap()
    }

    #[test]
    fn insert_child_uses_insert_before_semantics() {
        let mut doc = Document::new();
        let root = doc.root;
        let p = element(&mut doc, root, "p");
        let a = text(&mut doc, p, "a");
        let b = text(&mut doc, p, "b");
        let c = text(&mut doc, p, "c");

        // Moving `a` before the child at index 2 (`c`) lands it between b and c.
        doc.insert_child(p, 2, a).unwrap();
        assert_eq!(doc.children(p).collect::<Vec<_>>(), vec![b, a, c]);

        // Index of the node itself means "before my next sibling": no change.
        doc.insert_child(p, 1, a).unwrap();
        assert_eq!(doc.children(p).collect::<Vec<_>>(), vec![b, a, c]);

        // Past the end appends.
        doc.insert_child(p, 3, b).unwrap();
        assert_eq!(doc.children(p).collect::<Vec<_>>(), vec![a, c, b]);
        assert_eq!(doc.index_of(b), 2);
    }

    #[test]
    fn insert_child_moves_between_parents() {
        let mut doc = Document::new();
        let root = doc.root;
        let p = element(&mut doc, root, "p");
        let div = element(&mut doc, root, "div");
        let a = text(&mut doc, p, "a");
        doc.insert_child(div, 0, a).unwrap();
        assert_eq!(doc.children(p).count(), 0);
        assert_eq!(doc.parent(a), Some(div));
        assert_eq!(doc.to_markup(), "<p></p><div>a</div>");
    }

    #[test]
    fn import_copies_without_children() {
        let mut source = Document::new();
        let p = source
            .append(
                source.root,
                NodeKind::Element(ElementData {
                    tag: "p".into(),
                    attrs: vec![Attribute::new("class", "x")],
                }),
            )
            .unwrap();
        text(&mut source, p, "child");

        let mut target = Document::new();
        let copy = target.import_shallow(&source, p).unwrap();
        assert_eq!(target.parent(copy), None);
        assert_eq!(target.children(copy).count(), 0);
        assert_eq!(target.get(copy), source.get(p));
    }

    #[test]
    fn import_rejects_other_kinds() {
        let mut source = Document::new();
        let cdata = source
            .append(source.root, NodeKind::CData("x".into()))
            .unwrap();
        let mut target = Document::new();
        let err = target.import_shallow(&source, cdata).unwrap_err();
        assert!(matches!(err, Fault::UnsupportedNodeKind { .. }));
    }

    #[test]
    fn serialization_escapes() {
        let mut doc = Document::fragment();
        let a = doc
            .append(
                doc.root,
                NodeKind::Element(ElementData {
                    tag: "a".into(),
                    attrs: vec![
                        Attribute::new("title", "\"1 & 2\""),
                        Attribute::new("href", "/"),
                    ],
                }),
            )
            .unwrap();
        text(&mut doc, a, "<b> & c");
        let root = doc.root;
        element(&mut doc, root, "br");
        assert_eq!(
            doc.to_markup(),
            "<a title=\"&quot;1 &amp; 2&quot;\" href=\"/\">&lt;b&gt; &amp; c</a><br>"
        );
        assert_eq!(
            doc.snapshot(),
            "<a href=\"/\" title=\"&quot;1 &amp; 2&quot;\">&lt;b&gt; &amp; c</a><br>"
        );
    }

    #[test]
    fn attribute_editing() {
        let mut element = ElementData::new("p");
        element.set_attr("a", "1");
        element.set_attr("b", "2");
        element.set_attr("a", "3");
        assert_eq!(element.attr("a"), Some("3"));
        assert_eq!(element.attrs[0].name, "a");
        assert!(element.remove_attr("a"));
        assert!(!element.remove_attr("a"));
        assert_eq!(element.attrs.len(), 1);
    }
}
