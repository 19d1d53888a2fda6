//! Turns a node pairing into edit operations, applying each one to the
//! before document as it is emitted.
//!
//! The after tree is walked breadth-first. Every after node is resolved to a
//! before node (inserting a shallow copy when there is none, moving the
//! counterpart when it sits under the wrong parent), updated when the pairing
//! is not perfect, and then its children are aligned with a longest common
//! subsequence so that only the children out of relative order move. A final
//! sweep deletes every before node that never found a counterpart.

use core::fmt;
use std::collections::VecDeque;

use rapidhash::RapidHashSet as HashSet;
use tandem::indextree::NodeId;
use tandem::{Fault, MatchingConfig, NodeMatches, Similarity, match_trees_with};

use crate::debug;
use crate::dom::{Document, NodeKind};
use crate::handler::{DifferenceHandler, Operation, Recorder};
use crate::selector::{Position, Selector};

/// Why a diff run stopped.
#[derive(Debug)]
pub enum DiffError<E> {
    /// Matching or generation hit a fault
    Fault(Fault),
    /// The handler failed
    Sink(E),
}

impl<E> From<Fault> for DiffError<E> {
    fn from(fault: Fault) -> Self {
        DiffError::Fault(fault)
    }
}

impl<E: fmt::Display> fmt::Display for DiffError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffError::Fault(fault) => write!(f, "diff aborted: {fault}"),
            DiffError::Sink(err) => write!(f, "difference handler failed: {err}"),
        }
    }
}

impl<E> core::error::Error for DiffError<E>
where
    E: core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            DiffError::Fault(fault) => Some(fault),
            DiffError::Sink(err) => Some(err),
        }
    }
}

/// Match `before` against `after`, then rewrite `before` in place into a
/// copy of `after`, reporting every step to `handler`.
///
/// Returns the handler once the run completes. On failure `before` keeps
/// whatever mutations were applied up to that point.
pub fn diff<H: DifferenceHandler>(
    before: &mut Document,
    after: &Document,
    handler: H,
) -> Result<H, DiffError<H::Error>> {
    diff_with(before, after, &MatchingConfig::default(), handler)
}

/// [`diff`] with explicit matching settings.
pub fn diff_with<H: DifferenceHandler>(
    before: &mut Document,
    after: &Document,
    config: &MatchingConfig,
    handler: H,
) -> Result<H, DiffError<H::Error>> {
    let matches = match_trees_with(&*before, after, config)?;
    EditScript::new(before, after, matches, handler).run()
}

/// [`diff`] into a [`Recorder`], returning the operations.
pub fn diff_operations(before: &mut Document, after: &Document) -> Result<Vec<Operation>, Fault> {
    match diff(before, after, Recorder::new()) {
        Ok(recorder) => Ok(recorder.into_operations()),
        Err(DiffError::Fault(fault)) => Err(fault),
        Err(DiffError::Sink(never)) => match never {},
    }
}

/// One edit-script run over a before and an after document.
pub struct EditScript<'a, H> {
    before: &'a mut Document,
    after: &'a Document,
    matches: NodeMatches,
    handler: H,
    /// Before nodes whose position is settled
    in_order_before: HashSet<NodeId>,
    /// After nodes whose position is settled
    in_order_after: HashSet<NodeId>,
}

impl<'a, H: DifferenceHandler> EditScript<'a, H> {
    /// Prepare a run with an existing pairing. The roots must be paired
    /// with each other.
    pub fn new(
        before: &'a mut Document,
        after: &'a Document,
        matches: NodeMatches,
        handler: H,
    ) -> Self {
        Self {
            before,
            after,
            matches,
            handler,
            in_order_before: HashSet::default(),
            in_order_after: HashSet::default(),
        }
    }

    /// Emit and apply every operation, then hand back the handler.
    pub fn run(mut self) -> Result<H, DiffError<H::Error>> {
        let before_root = self.before.root;
        let after_root = self.after.root;
        if self.matches.after_node_of(before_root) != Some(after_root) {
            return Err(Fault::MismatchedRoots.into());
        }
        if self.matches.is_perfect_match(before_root, after_root) {
            debug!("roots match perfectly, nothing to do");
            return Ok(self.handler);
        }

        let mut queue: VecDeque<NodeId> = self.after.children(after_root).collect();
        self.align_children(before_root, after_root)?;

        while let Some(after) = queue.pop_front() {
            let parent = self.before_parent_of(after)?;
            let (before, similarity) = match self.matches.before_of(after) {
                None => (self.insert(after, parent)?, Similarity::GOOD),
                Some(counterpart) => {
                    if self.before.parent(counterpart.node) != Some(parent) {
                        self.move_under(counterpart.node, after, parent)?;
                    }
                    (counterpart.node, counterpart.similarity)
                }
            };
            if similarity.is_perfect() {
                continue;
            }

            self.update(before, after)?;
            queue.extend(self.after.children(after));
            self.align_children(before, after)?;
        }

        self.delete_unmatched()?;
        Ok(self.handler)
    }

    /// The before node standing in for the parent of `after`.
    fn before_parent_of(&self, after: NodeId) -> Result<NodeId, Fault> {
        self.after
            .parent(after)
            .and_then(|parent| self.matches.before_node_of(parent))
            .ok_or_else(|| {
                Fault::invariant(format!(
                    "parent of after node {} has no counterpart",
                    usize::from(after)
                ))
            })
    }

    /// Child index in the live before tree where the counterpart of `after`
    /// belongs: right after the counterpart of its nearest settled previous
    /// sibling, or first.
    fn insert_position_of(&self, after: NodeId) -> Result<usize, Fault> {
        let reference = after
            .preceding_siblings(&self.after.arena)
            .skip(1)
            .find(|sibling| self.in_order_after.contains(sibling));
        let Some(reference) = reference else {
            return Ok(0);
        };
        let Some(counterpart) = self.matches.before_node_of(reference) else {
            return Err(Fault::invariant(format!(
                "settled sibling {} has no counterpart",
                usize::from(reference)
            )));
        };
        Ok(self.before.index_of(counterpart) + 1)
    }

    fn settle(&mut self, before: NodeId, after: NodeId) {
        self.in_order_before.insert(before);
        self.in_order_after.insert(after);
    }

    fn insert(&mut self, after: NodeId, parent: NodeId) -> Result<NodeId, DiffError<H::Error>> {
        let index = self.insert_position_of(after)?;
        let node = self.before.import_shallow(self.after, after)?;
        self.settle(node, after);

        let position = Position::under(self.before, parent, index)?;
        debug!(%position, kind = self.before.get(node).kind_name(), "insert");
        let emitted = match self.before.get(node) {
            NodeKind::Element(element) => {
                self.handler
                    .insert_element(position, &element.tag, &element.attrs)
            }
            NodeKind::Text(text) => self.handler.insert_text(position, text),
            NodeKind::Comment(text) => self.handler.insert_comment(position, text),
            other => return Err(Fault::unsupported(other.kind_name()).into()),
        };
        emitted.map_err(DiffError::Sink)?;

        self.before.insert_child(parent, index, node)?;
        self.matches.add(node, after, Similarity::GOOD)?;
        Ok(node)
    }

    fn move_under(
        &mut self,
        before: NodeId,
        after: NodeId,
        parent: NodeId,
    ) -> Result<(), DiffError<H::Error>> {
        let index = self.insert_position_of(after)?;
        self.settle(before, after);
        self.relocate(before, parent, index)
    }

    /// Report the move of `node` to `index` under `parent`, then perform it.
    fn relocate(
        &mut self,
        node: NodeId,
        parent: NodeId,
        index: usize,
    ) -> Result<(), DiffError<H::Error>> {
        let to = Position::under(self.before, parent, index)?;
        let emitted = match self.before.get(node) {
            NodeKind::Element(_) => {
                let element = Selector::of(self.before, node)?;
                debug!(%element, %to, "move element");
                self.handler.move_element(element, to)
            }
            NodeKind::Text(_) | NodeKind::Comment(_) => {
                let from = Position::of_child(self.before, node)?;
                debug!(%from, %to, "move node");
                self.handler.move_node(from, to)
            }
            other => return Err(Fault::unsupported(other.kind_name()).into()),
        };
        emitted.map_err(DiffError::Sink)?;
        self.before.insert_child(parent, index, node)?;
        Ok(())
    }

    fn update(&mut self, before: NodeId, after: NodeId) -> Result<(), DiffError<H::Error>> {
        let after_doc = self.after;
        match (self.before.get(before), after_doc.get(after)) {
            (NodeKind::Element(old), NodeKind::Element(new)) => {
                let old_attrs = old.attrs.clone();
                for attr in old_attrs.iter().rev() {
                    match new.attr(&attr.name) {
                        None => self.remove_attribute(before, &attr.name)?,
                        Some(value) if value != attr.value => {
                            self.set_attribute(before, &attr.name, value)?
                        }
                        Some(_) => {}
                    }
                }
                for attr in new.attrs.iter().rev() {
                    let present = self
                        .before
                        .get(before)
                        .as_element()
                        .is_some_and(|element| element.attr(&attr.name).is_some());
                    if !present {
                        self.set_attribute(before, &attr.name, &attr.value)?;
                    }
                }
                Ok(())
            }
            (
                NodeKind::Text(old) | NodeKind::Comment(old),
                NodeKind::Text(new) | NodeKind::Comment(new),
            ) => {
                if old == new {
                    return Ok(());
                }
                let position = Position::of_child(self.before, before)?;
                debug!(%position, "set value");
                self.handler
                    .set_value(position, new)
                    .map_err(DiffError::Sink)?;
                if let Some(value) = self.before.get_mut(before).value_mut() {
                    value.clone_from(new);
                }
                Ok(())
            }
            (NodeKind::CData(_) | NodeKind::ProcessingInstruction { .. }, _)
            | (NodeKind::Document | NodeKind::Fragment | NodeKind::DocumentType(_), _) => {
                Err(Fault::unsupported(self.before.get(before).kind_name()).into())
            }
            (old, new) => Err(Fault::invariant(format!(
                "{} paired with {}",
                old.kind_name(),
                new.kind_name()
            ))
            .into()),
        }
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DiffError<H::Error>> {
        let element = Selector::of(self.before, node)?;
        debug!(%element, name, value, "set attribute");
        self.handler
            .set_attribute(element, name, value)
            .map_err(DiffError::Sink)?;
        if let Some(element) = self.before.get_mut(node).as_element_mut() {
            element.set_attr(name, value);
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DiffError<H::Error>> {
        let element = Selector::of(self.before, node)?;
        debug!(%element, name, "remove attribute");
        self.handler
            .remove_attribute(element, name)
            .map_err(DiffError::Sink)?;
        if let Some(element) = self.before.get_mut(node).as_element_mut() {
            element.remove_attr(name);
        }
        Ok(())
    }

    /// Move the children of `x` that are out of relative order with their
    /// counterparts under `y`.
    fn align_children(&mut self, x: NodeId, y: NodeId) -> Result<(), DiffError<H::Error>> {
        for child in self.before.children(x) {
            self.in_order_before.remove(&child);
        }
        for child in self.after.children(y) {
            self.in_order_after.remove(&child);
        }

        let matches = &self.matches;
        let after_doc = self.after;
        let xs: Vec<(NodeId, NodeId)> = self
            .before
            .children(x)
            .filter_map(|child| {
                let counterpart = matches.after_node_of(child)?;
                (after_doc.parent(counterpart) == Some(y)).then_some((child, counterpart))
            })
            .collect();
        let ys: Vec<NodeId> = after_doc
            .children(y)
            .filter(|&child| {
                matches
                    .before_node_of(child)
                    .is_some_and(|counterpart| self.before.parent(counterpart) == Some(x))
            })
            .collect();

        let keep = longest_common_subsequence(&xs, &ys, |&(_, counterpart), &child| {
            counterpart == child
        });
        for (&(child, counterpart), &kept) in xs.iter().zip(&keep) {
            if kept {
                self.settle(child, counterpart);
            }
        }
        for (&(child, counterpart), &kept) in xs.iter().zip(&keep) {
            if kept {
                continue;
            }
            let index = self.insert_position_of(counterpart)?;
            self.relocate(child, x, index)?;
            self.settle(child, counterpart);
        }

        let settled: Vec<NodeId> = self.before.children(x).collect();
        self.in_order_before.extend(settled);
        self.in_order_after.extend(self.after.children(y));
        Ok(())
    }

    /// Remove every before node without a counterpart, last child first.
    /// Perfectly matched subtrees are skipped whole.
    fn delete_unmatched(&mut self) -> Result<(), DiffError<H::Error>> {
        let mut stack: Vec<NodeId> = self.before.children(self.before.root).collect();
        while let Some(node) = stack.pop() {
            match self.matches.after_node_of(node) {
                None => self.delete(node)?,
                Some(after) if self.matches.is_perfect_match(node, after) => {}
                Some(_) => stack.extend(self.before.children(node)),
            }
        }
        Ok(())
    }

    fn delete(&mut self, node: NodeId) -> Result<(), DiffError<H::Error>> {
        let emitted = match self.before.get(node) {
            NodeKind::Element(_) => {
                let element = Selector::of(self.before, node)?;
                debug!(%element, "delete element");
                self.handler.delete_element(element)
            }
            NodeKind::Text(_) | NodeKind::Comment(_) => {
                let position = Position::of_child(self.before, node)?;
                debug!(%position, "delete node");
                self.handler.delete_node(position)
            }
            other => return Err(Fault::unsupported(other.kind_name()).into()),
        };
        emitted.map_err(DiffError::Sink)?;
        self.before.remove_subtree(node);
        Ok(())
    }
}

/// Mark which items of `xs` belong to a longest common subsequence of `xs`
/// and `ys` under `same`.
///
/// A common prefix and suffix are taken directly; only the middle goes
/// through the dynamic programming table.
pub(crate) fn longest_common_subsequence<X, Y>(
    xs: &[X],
    ys: &[Y],
    same: impl Fn(&X, &Y) -> bool,
) -> Vec<bool> {
    let mut keep = vec![false; xs.len()];

    let mut first = 0;
    while first < xs.len() && first < ys.len() && same(&xs[first], &ys[first]) {
        keep[first] = true;
        first += 1;
    }
    let (mut end_x, mut end_y) = (xs.len(), ys.len());
    while end_x > first && end_y > first && same(&xs[end_x - 1], &ys[end_y - 1]) {
        end_x -= 1;
        end_y -= 1;
        keep[end_x] = true;
    }

    let middle_x = &xs[first..end_x];
    let middle_y = &ys[first..end_y];
    if middle_x.is_empty() || middle_y.is_empty() {
        return keep;
    }

    // lengths[i][j]: LCS length of middle_x[..i] and middle_y[..j]
    let width = middle_y.len() + 1;
    let mut lengths = vec![0u32; (middle_x.len() + 1) * width];
    for (i, x) in middle_x.iter().enumerate() {
        for (j, y) in middle_y.iter().enumerate() {
            lengths[(i + 1) * width + j + 1] = if same(x, y) {
                lengths[i * width + j] + 1
            } else {
                lengths[i * width + j + 1].max(lengths[(i + 1) * width + j])
            };
        }
    }

    let (mut i, mut j) = (middle_x.len(), middle_y.len());
    while i > 0 && j > 0 {
        if same(&middle_x[i - 1], &middle_y[j - 1]) {
            keep[first + i - 1] = true;
            i -= 1;
            j -= 1;
        } else if lengths[i * width + j - 1] >= lengths[(i - 1) * width + j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }
    keep
}
