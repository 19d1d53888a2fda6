//! Replays recorded operations against a document, the way a host holding
//! a copy of the before tree would.

use facet::Facet;
use tandem::indextree::NodeId;

use crate::dom::{Document, ElementData, NodeKind};
use crate::handler::Operation;
use crate::selector::{Position, Selector};
use crate::trace;

/// Errors raised while replaying operations.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ApplyError {
    /// selector `{selector}` does not match any element
    UnresolvedSelector { selector: String },

    /// `{parent}` has no child at offset {offset}
    NoChildAt { parent: String, offset: usize },

    /// offset {offset} is past the {len} children of `{parent}`
    OffsetOutOfBounds {
        parent: String,
        offset: usize,
        len: usize,
    },

    /// {operation} expects a {expected} node
    WrongNodeKind { operation: String, expected: String },

    /// the operation would break the tree: {detail}
    InvalidStructure { detail: String },
}

impl Document {
    /// Apply `operations` in order. Every locator is resolved against the
    /// tree as it stands when its operation runs.
    pub fn apply(&mut self, operations: &[Operation]) -> Result<(), ApplyError> {
        for operation in operations {
            trace!(opcode = operation.opcode(), "apply");
            self.apply_one(operation)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, operation: &Operation) -> Result<(), ApplyError> {
        match operation {
            Operation::DeleteNode { position } => {
                let node = self.character_node_at(position, "delete node")?;
                self.remove_subtree(node);
            }
            Operation::DeleteElement { element } => {
                let node = self.element(element)?;
                if node == self.root {
                    return Err(ApplyError::InvalidStructure {
                        detail: "the root cannot be deleted".to_string(),
                    });
                }
                self.remove_subtree(node);
            }
            Operation::InsertComment { position, text } => {
                self.place_new(position, NodeKind::Comment(text.clone()))?;
            }
            Operation::InsertText { position, text } => {
                self.place_new(position, NodeKind::Text(text.clone()))?;
            }
            Operation::InsertElement {
                position,
                tag,
                attrs,
            } => {
                let element = ElementData {
                    tag: tag.as_str().into(),
                    attrs: attrs.clone(),
                };
                self.place_new(position, NodeKind::Element(element))?;
            }
            Operation::MoveNode { from, to } => {
                let node = self.character_node_at(from, "move node")?;
                self.place(to, node)?;
            }
            Operation::MoveElement { element, to } => {
                let node = self.element(element)?;
                if node == self.root {
                    return Err(ApplyError::InvalidStructure {
                        detail: "the root cannot be moved".to_string(),
                    });
                }
                self.place(to, node)?;
            }
            Operation::RemoveAttribute { element, name } => {
                self.element_data(element)?.remove_attr(name);
            }
            Operation::SetAttribute {
                element,
                name,
                value,
            } => {
                self.element_data(element)?.set_attr(name, value);
            }
            Operation::SetValue { position, text } => {
                let node = self.character_node_at(position, "set value")?;
                if let Some(value) = self.get_mut(node).value_mut() {
                    value.clone_from(text);
                }
            }
        }
        Ok(())
    }

    fn element(&self, selector: &Selector) -> Result<NodeId, ApplyError> {
        selector
            .resolve(self)
            .ok_or_else(|| ApplyError::UnresolvedSelector {
                selector: selector.to_string(),
            })
    }

    fn element_data(&mut self, selector: &Selector) -> Result<&mut ElementData, ApplyError> {
        let node = self.element(selector)?;
        self.get_mut(node)
            .as_element_mut()
            .ok_or_else(|| ApplyError::WrongNodeKind {
                operation: "attribute change".to_string(),
                expected: "element".to_string(),
            })
    }

    fn parent_of(&self, position: &Position) -> Result<NodeId, ApplyError> {
        self.element(&position.parent)
    }

    /// The text or comment node sitting at `position`.
    fn character_node_at(&self, position: &Position, operation: &str) -> Result<NodeId, ApplyError> {
        let parent = self.parent_of(position)?;
        let node = self
            .child_at(parent, position.offset)
            .ok_or_else(|| ApplyError::NoChildAt {
                parent: position.parent.to_string(),
                offset: position.offset,
            })?;
        match self.get(node) {
            NodeKind::Text(_) | NodeKind::Comment(_) => Ok(node),
            _ => Err(ApplyError::WrongNodeKind {
                operation: operation.to_string(),
                expected: "text or comment".to_string(),
            }),
        }
    }

    fn place_new(&mut self, position: &Position, kind: NodeKind) -> Result<(), ApplyError> {
        let node = self.arena.new_node(kind);
        self.place(position, node)
    }

    fn place(&mut self, position: &Position, node: NodeId) -> Result<(), ApplyError> {
        let parent = self.parent_of(position)?;
        let len = self.children(parent).count();
        if position.offset > len {
            return Err(ApplyError::OffsetOutOfBounds {
                parent: position.parent.to_string(),
                offset: position.offset,
                len,
            });
        }
        if parent.ancestors(&self.arena).any(|ancestor| ancestor == node) {
            return Err(ApplyError::InvalidStructure {
                detail: format!("cannot place a node inside itself at {position}"),
            });
        }
        self.insert_child(parent, position.offset, node)
            .map_err(|fault| ApplyError::InvalidStructure {
                detail: fault.to_string(),
            })
    }
}
