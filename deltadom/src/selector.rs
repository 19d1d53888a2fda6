//! Locators for the live tree: element selectors and child positions.
//!
//! A selector is built from the element itself upward:
//! - `#id` when the element has a non-empty `id` and is the first element
//!   in document order carrying it, which also ends the chain
//! - otherwise the tag name, qualified with `:first-of-type`,
//!   `:last-of-type` or `:nth-of-type(k)` when same-tag element siblings exist
//!
//! Parts are joined with `>` up to the first id-qualified ancestor or the
//! root. The root itself is the empty selector.

use core::fmt;

use compact_str::CompactString;
use facet::Facet;
use smallvec::SmallVec;
use tandem::Fault;
use tandem::indextree::NodeId;

use crate::dom::{Document, ElementData};

/// Structural locator of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
#[facet(transparent)]
pub struct Selector(pub CompactString);

/// A slot among the children of an element (or of the root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Facet)]
pub struct Position {
    /// Locator of the parent
    pub parent: Selector,
    /// Child index under the parent
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfType {
    Only,
    First,
    Last,
    Nth(usize),
}

enum Part<'a> {
    Id(&'a str),
    Tag { tag: &'a str, of_type: OfType },
}

impl<'a> Part<'a> {
    fn of(doc: &Document, node: NodeId, element: &'a ElementData) -> Self {
        // While an inserted element and a doomed one share an id, only the
        // first of them can go by it.
        if let Some(id) = element.attr("id").filter(|id| !id.is_empty())
            && find_by_id(doc, id) == Some(node)
        {
            return Part::Id(id);
        }
        let tag = element.tag.as_str();
        let same_tag = |sibling: &NodeId| {
            doc.get(*sibling)
                .as_element()
                .is_some_and(|other| other.tag == tag)
        };
        let before = node
            .preceding_siblings(&doc.arena)
            .skip(1)
            .filter(same_tag)
            .count();
        let after = node
            .following_siblings(&doc.arena)
            .skip(1)
            .filter(same_tag)
            .count();
        let of_type = match (before, after) {
            (0, 0) => OfType::Only,
            (0, _) => OfType::First,
            (_, 0) => OfType::Last,
            (before, _) => OfType::Nth(before + 1),
        };
        Part::Tag { tag, of_type }
    }

    fn write(&self, out: &mut CompactString) {
        match self {
            Part::Id(id) => {
                out.push('#');
                out.push_str(id);
            }
            Part::Tag { tag, of_type } => {
                out.push_str(tag);
                match of_type {
                    OfType::Only => {}
                    OfType::First => out.push_str(":first-of-type"),
                    OfType::Last => out.push_str(":last-of-type"),
                    OfType::Nth(n) => {
                        out.push_str(":nth-of-type(");
                        out.push_str(&n.to_string());
                        out.push(')');
                    }
                }
            }
        }
    }
}

impl Selector {
    /// The selector of the document or fragment root.
    pub fn root() -> Self {
        Selector(CompactString::default())
    }

    /// Whether this addresses the root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The selector text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Selector of an element (or of the root) in its current place.
    ///
    /// Any other node kind is [`Fault::Unaddressable`].
    pub fn of(doc: &Document, node: NodeId) -> Result<Self, Fault> {
        if node == doc.root {
            return Ok(Self::root());
        }
        let Some(mut element) = doc.get(node).as_element() else {
            return Err(Fault::Unaddressable {
                kind: doc.get(node).kind_name().to_string(),
            });
        };

        let mut parts: SmallVec<[Part<'_>; 8]> = SmallVec::new();
        let mut current = node;
        loop {
            let part = Part::of(doc, current, element);
            let anchored = matches!(part, Part::Id(_));
            parts.push(part);
            if anchored {
                break;
            }
            let Some(parent) = doc.parent(current) else {
                break;
            };
            let Some(parent_element) = doc.get(parent).as_element() else {
                break;
            };
            current = parent;
            element = parent_element;
        }

        let mut out = CompactString::default();
        for (i, part) in parts.iter().rev().enumerate() {
            if i > 0 {
                out.push('>');
            }
            part.write(&mut out);
        }
        Ok(Selector(out))
    }

    /// Find the element this selector addresses in `doc`.
    ///
    /// An id part matches the first element in document order carrying
    /// that id. Tag parts are looked up among the element children of the
    /// previous part, starting at the root.
    pub fn resolve(&self, doc: &Document) -> Option<NodeId> {
        if self.is_root() {
            return Some(doc.root);
        }
        let mut current: Option<NodeId> = None;
        for part in self.0.split('>') {
            let next = match part.strip_prefix('#') {
                Some(id) if current.is_none() => find_by_id(doc, id)?,
                Some(_) => return None,
                None => find_by_tag(doc, current.unwrap_or(doc.root), part)?,
            };
            current = Some(next);
        }
        current
    }
}

fn find_by_id(doc: &Document, id: &str) -> Option<NodeId> {
    doc.root.descendants(&doc.arena).find(|&node| {
        doc.get(node)
            .as_element()
            .is_some_and(|element| element.attr("id") == Some(id))
    })
}

fn parse_tag_part(part: &str) -> Option<(&str, OfType)> {
    if let Some(tag) = part.strip_suffix(":first-of-type") {
        return Some((tag, OfType::First));
    }
    if let Some(tag) = part.strip_suffix(":last-of-type") {
        return Some((tag, OfType::Last));
    }
    if let Some(rest) = part.strip_suffix(')') {
        let (tag, n) = rest.rsplit_once(":nth-of-type(")?;
        return Some((tag, OfType::Nth(n.parse().ok()?)));
    }
    Some((part, OfType::Only))
}

fn find_by_tag(doc: &Document, parent: NodeId, part: &str) -> Option<NodeId> {
    let (tag, of_type) = parse_tag_part(part)?;
    let mut candidates = doc.children(parent).filter(|&child| {
        doc.get(child)
            .as_element()
            .is_some_and(|element| element.tag == tag)
    });
    match of_type {
        OfType::Only | OfType::First => candidates.next(),
        OfType::Last => candidates.last(),
        OfType::Nth(n) => candidates.nth(n.checked_sub(1)?),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Position {
    /// Position `offset` under `parent`.
    pub fn new(parent: Selector, offset: usize) -> Self {
        Self { parent, offset }
    }

    /// Position `offset` under the element (or root) `parent`.
    pub fn under(doc: &Document, parent: NodeId, offset: usize) -> Result<Self, Fault> {
        Ok(Self::new(Selector::of(doc, parent)?, offset))
    }

    /// Where `node` currently sits.
    pub fn of_child(doc: &Document, node: NodeId) -> Result<Self, Fault> {
        let Some(parent) = doc.parent(node) else {
            return Err(Fault::invariant(format!(
                "node {} is detached",
                usize::from(node)
            )));
        };
        Self::under(doc, parent, doc.index_of(node))
    }

    /// The parent node and offset this position addresses in `doc`.
    pub fn resolve(&self, doc: &Document) -> Option<(NodeId, usize)> {
        Some((self.parent.resolve(doc)?, self.offset))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.parent, self.offset)
    }
}
