//! HTML reading through html5ever's tree builder.
//!
//! [`ArenaSink`] implements `TreeSink` and builds the arena [`Document`]
//! directly, so parsing follows the browser algorithm with its error
//! recovery: implied end tags, implied `<tbody>`, adoption of misnested
//! formatting elements. Nothing is ever rejected.

use core::cell::RefCell;
use std::borrow::Cow;

use compact_str::CompactString;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{LocalName, Namespace, QualName};
use rapidhash::RapidHashMap as HashMap;
use tandem::Attribute;
use tandem::indextree::{Arena, NodeId};
use tendril::StrTendril;

use crate::dom::{Document, ElementData, NodeKind};
use crate::trace;

/// Parse a complete HTML document. The root is a document node holding the
/// doctype (if any) and the `<html>` element.
pub fn parse_document(html: &str) -> Document {
    let doc = html5ever::parse_document(ArenaSink::new(), Default::default())
        .one(StrTendril::from(html));
    trace!(nodes = doc.arena.count(), "document parsed");
    doc
}

/// Parse body content. The root is a fragment node.
///
/// The input goes through full document construction; the `<html>`,
/// `<head>` and `<body>` wrappers the tree builder adds are then dissolved,
/// so head content and stray top-level comments stay in document order.
pub fn parse_fragment(html: &str) -> Document {
    let mut doc = parse_document(html);
    let content = unwrapped_content(&doc);

    let fragment = doc.arena.new_node(NodeKind::Fragment);
    for node in content {
        node.detach(&mut doc.arena);
        fragment.append(node, &mut doc.arena);
    }
    doc.root.remove_subtree(&mut doc.arena);
    doc.root = fragment;
    doc
}

fn unwrapped_content(doc: &Document) -> Vec<NodeId> {
    let mut content = Vec::new();
    for child in doc.children(doc.root) {
        if !is_element(doc, child, "html") {
            content.push(child);
            continue;
        }
        for part in doc.children(child) {
            if is_element(doc, part, "head") || is_element(doc, part, "body") {
                content.extend(doc.children(part));
            } else {
                content.push(part);
            }
        }
    }
    content
}

fn is_element(doc: &Document, node: NodeId, tag: &str) -> bool {
    doc.get(node)
        .as_element()
        .is_some_and(|element| element.tag == tag)
}

/// Owned element name handed to the tree builder
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// TreeSink that fills a [`Document`] arena
struct ArenaSink {
    arena: RefCell<Arena<NodeKind>>,

    /// Document node (parent of the doctype and `<html>`)
    document: NodeId,

    /// Qualified names of created elements, for namespace-aware tree building
    names: RefCell<HashMap<NodeId, QualName>>,
}

impl ArenaSink {
    fn new() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeKind::Document);
        ArenaSink {
            arena: RefCell::new(arena),
            document,
            names: RefCell::new(HashMap::default()),
        }
    }

    fn new_node(&self, kind: NodeKind) -> NodeId {
        self.arena.borrow_mut().new_node(kind)
    }

    fn text_node(&self, text: &str) -> NodeId {
        self.new_node(NodeKind::Text(text.to_string()))
    }
}

fn attributes(attrs: Vec<html5ever::Attribute>) -> Vec<Attribute> {
    attrs
        .into_iter()
        .map(|attr| Attribute::new(&*attr.name.local, &*attr.value))
        .collect()
}

impl TreeSink for ArenaSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        Document {
            arena: self.arena.into_inner(),
            root: self.document,
        }
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // html5ever recovers on its own
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let name = self.names.borrow().get(target).cloned();
        OwnedElemName(name.unwrap_or_else(|| {
            QualName::new(
                None,
                Namespace::from("http://www.w3.org/1999/xhtml"),
                LocalName::from(""),
            )
        }))
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let element = ElementData {
            tag: CompactString::from(&*name.local),
            attrs: attributes(attrs),
        };
        let node = self.new_node(NodeKind::Element(element));
        self.names.borrow_mut().insert(node, name);
        node
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.new_node(NodeKind::Comment(text.to_string()))
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        self.new_node(NodeKind::ProcessingInstruction {
            target: CompactString::from(&*target),
            data: data.to_string(),
        })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => {
                parent.append(node, &mut self.arena.borrow_mut());
            }
            NodeOrText::AppendText(text) => {
                let mut arena = self.arena.borrow_mut();
                // Adjacent text merges, the way a browser DOM does
                let last = arena[*parent].last_child();
                if let Some(last) = last
                    && let NodeKind::Text(existing) = arena[last].get_mut()
                {
                    existing.push_str(&text);
                    return;
                }
                drop(arena);
                let node = self.text_node(&text);
                parent.append(node, &mut self.arena.borrow_mut());
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let node = match new_node {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => {
                let mut arena = self.arena.borrow_mut();
                let previous = arena[*sibling].previous_sibling();
                if let Some(previous) = previous
                    && let NodeKind::Text(existing) = arena[previous].get_mut()
                {
                    existing.push_str(&text);
                    return;
                }
                drop(arena);
                self.text_node(&text)
            }
        };
        sibling.insert_before(node, &mut self.arena.borrow_mut());
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let attached = self.arena.borrow()[*element].parent().is_some();
        if attached {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        let doctype = self.new_node(NodeKind::DocumentType(CompactString::from(&*name)));
        self.document.append(doctype, &mut self.arena.borrow_mut());
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template content stays inline under the element
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let Some(element) = arena[*target].get_mut().as_element_mut() {
            for attr in attributes(attrs) {
                if element.attr(&attr.name).is_none() {
                    element.attrs.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<NodeId> = node.children(&arena).collect();
        for child in children {
            child.detach(&mut arena);
            new_parent.append(child, &mut arena);
        }
    }
}
