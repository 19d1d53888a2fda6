//! The operation sink fed by the edit-script generator.

use core::convert::Infallible;

use facet::Facet;
use tandem::Attribute;

use crate::selector::{Position, Selector};

/// Receives edit operations in the order they are applied to the live tree.
///
/// Every locator describes the tree state right before the operation. An
/// error from any method aborts the run and is handed back to the caller.
pub trait DifferenceHandler {
    /// Error raised by the sink.
    type Error;

    /// A text or comment node at `position` is removed.
    fn delete_node(&mut self, position: Position) -> Result<(), Self::Error>;

    /// An element and its subtree are removed.
    fn delete_element(&mut self, element: Selector) -> Result<(), Self::Error>;

    /// A comment is inserted at `position`.
    fn insert_comment(&mut self, position: Position, text: &str) -> Result<(), Self::Error>;

    /// A text node is inserted at `position`.
    fn insert_text(&mut self, position: Position, text: &str) -> Result<(), Self::Error>;

    /// An empty element is inserted at `position`.
    fn insert_element(
        &mut self,
        position: Position,
        tag: &str,
        attrs: &[Attribute],
    ) -> Result<(), Self::Error>;

    /// A text or comment node moves from `from` to `to`.
    fn move_node(&mut self, from: Position, to: Position) -> Result<(), Self::Error>;

    /// An element moves to `to`.
    fn move_element(&mut self, element: Selector, to: Position) -> Result<(), Self::Error>;

    /// An attribute is set, either replacing its value or appending it.
    fn set_attribute(
        &mut self,
        element: Selector,
        name: &str,
        value: &str,
    ) -> Result<(), Self::Error>;

    /// An attribute is removed.
    fn remove_attribute(&mut self, element: Selector, name: &str) -> Result<(), Self::Error>;

    /// The content of the text or comment node at `position` is replaced.
    fn set_value(&mut self, position: Position, text: &str) -> Result<(), Self::Error>;
}

impl<H: DifferenceHandler + ?Sized> DifferenceHandler for &mut H {
    type Error = H::Error;

    fn delete_node(&mut self, position: Position) -> Result<(), Self::Error> {
        (**self).delete_node(position)
    }

    fn delete_element(&mut self, element: Selector) -> Result<(), Self::Error> {
        (**self).delete_element(element)
    }

    fn insert_comment(&mut self, position: Position, text: &str) -> Result<(), Self::Error> {
        (**self).insert_comment(position, text)
    }

    fn insert_text(&mut self, position: Position, text: &str) -> Result<(), Self::Error> {
        (**self).insert_text(position, text)
    }

    fn insert_element(
        &mut self,
        position: Position,
        tag: &str,
        attrs: &[Attribute],
    ) -> Result<(), Self::Error> {
        (**self).insert_element(position, tag, attrs)
    }

    fn move_node(&mut self, from: Position, to: Position) -> Result<(), Self::Error> {
        (**self).move_node(from, to)
    }

    fn move_element(&mut self, element: Selector, to: Position) -> Result<(), Self::Error> {
        (**self).move_element(element, to)
    }

    fn set_attribute(
        &mut self,
        element: Selector,
        name: &str,
        value: &str,
    ) -> Result<(), Self::Error> {
        (**self).set_attribute(element, name, value)
    }

    fn remove_attribute(&mut self, element: Selector, name: &str) -> Result<(), Self::Error> {
        (**self).remove_attribute(element, name)
    }

    fn set_value(&mut self, position: Position, text: &str) -> Result<(), Self::Error> {
        (**self).set_value(position, text)
    }
}

/// A recorded edit operation. Variants are declared in wire opcode order.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum Operation {
    /// Remove the text or comment node at a position
    DeleteNode {
        /// Where the node sits
        position: Position,
    },
    /// Remove an element and its subtree
    DeleteElement {
        /// The element
        element: Selector,
    },
    /// Insert a comment
    InsertComment {
        /// Where it lands
        position: Position,
        /// Comment content
        text: String,
    },
    /// Insert an empty element
    InsertElement {
        /// Where it lands
        position: Position,
        /// Tag name
        tag: String,
        /// Attributes in order
        attrs: Vec<Attribute>,
    },
    /// Insert a text node
    InsertText {
        /// Where it lands
        position: Position,
        /// Text content
        text: String,
    },
    /// Move a text or comment node
    MoveNode {
        /// Where the node sits
        from: Position,
        /// Where it lands, read before the node is detached
        to: Position,
    },
    /// Move an element
    MoveElement {
        /// The element
        element: Selector,
        /// Where it lands, read before the element is detached
        to: Position,
    },
    /// Remove an attribute
    RemoveAttribute {
        /// The element
        element: Selector,
        /// Attribute name
        name: String,
    },
    /// Set an attribute
    SetAttribute {
        /// The element
        element: Selector,
        /// Attribute name
        name: String,
        /// New value
        value: String,
    },
    /// Replace the content of a text or comment node
    SetValue {
        /// Where the node sits
        position: Position,
        /// New content
        text: String,
    },
}

impl Operation {
    /// Wire opcode of this operation.
    pub fn opcode(&self) -> u8 {
        match self {
            Operation::DeleteNode { .. } => 0,
            Operation::DeleteElement { .. } => 1,
            Operation::InsertComment { .. } => 2,
            Operation::InsertElement { .. } => 3,
            Operation::InsertText { .. } => 4,
            Operation::MoveNode { .. } => 5,
            Operation::MoveElement { .. } => 6,
            Operation::RemoveAttribute { .. } => 7,
            Operation::SetAttribute { .. } => 8,
            Operation::SetValue { .. } => 9,
        }
    }

    /// Feed this operation to another handler.
    pub fn emit_to<H: DifferenceHandler>(&self, handler: &mut H) -> Result<(), H::Error> {
        match self {
            Operation::DeleteNode { position } => handler.delete_node(position.clone()),
            Operation::DeleteElement { element } => handler.delete_element(element.clone()),
            Operation::InsertComment { position, text } => {
                handler.insert_comment(position.clone(), text)
            }
            Operation::InsertElement {
                position,
                tag,
                attrs,
            } => handler.insert_element(position.clone(), tag, attrs),
            Operation::InsertText { position, text } => {
                handler.insert_text(position.clone(), text)
            }
            Operation::MoveNode { from, to } => handler.move_node(from.clone(), to.clone()),
            Operation::MoveElement { element, to } => {
                handler.move_element(element.clone(), to.clone())
            }
            Operation::RemoveAttribute { element, name } => {
                handler.remove_attribute(element.clone(), name)
            }
            Operation::SetAttribute {
                element,
                name,
                value,
            } => handler.set_attribute(element.clone(), name, value),
            Operation::SetValue { position, text } => handler.set_value(position.clone(), text),
        }
    }
}

/// Sink that keeps every operation.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    /// Operations in emission order
    pub operations: Vec<Operation>,
}

impl Recorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded operations.
    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }
}

impl DifferenceHandler for Recorder {
    type Error = Infallible;

    fn delete_node(&mut self, position: Position) -> Result<(), Self::Error> {
        self.operations.push(Operation::DeleteNode { position });
        Ok(())
    }

    fn delete_element(&mut self, element: Selector) -> Result<(), Self::Error> {
        self.operations.push(Operation::DeleteElement { element });
        Ok(())
    }

    fn insert_comment(&mut self, position: Position, text: &str) -> Result<(), Self::Error> {
        self.operations.push(Operation::InsertComment {
            position,
            text: text.to_string(),
        });
        Ok(())
    }

    fn insert_text(&mut self, position: Position, text: &str) -> Result<(), Self::Error> {
        self.operations.push(Operation::InsertText {
            position,
            text: text.to_string(),
        });
        Ok(())
    }

    fn insert_element(
        &mut self,
        position: Position,
        tag: &str,
        attrs: &[Attribute],
    ) -> Result<(), Self::Error> {
        self.operations.push(Operation::InsertElement {
            position,
            tag: tag.to_string(),
            attrs: attrs.to_vec(),
        });
        Ok(())
    }

    fn move_node(&mut self, from: Position, to: Position) -> Result<(), Self::Error> {
        self.operations.push(Operation::MoveNode { from, to });
        Ok(())
    }

    fn move_element(&mut self, element: Selector, to: Position) -> Result<(), Self::Error> {
        self.operations.push(Operation::MoveElement { element, to });
        Ok(())
    }

    fn set_attribute(
        &mut self,
        element: Selector,
        name: &str,
        value: &str,
    ) -> Result<(), Self::Error> {
        self.operations.push(Operation::SetAttribute {
            element,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, element: Selector, name: &str) -> Result<(), Self::Error> {
        self.operations.push(Operation::RemoveAttribute {
            element,
            name: name.to_string(),
        });
        Ok(())
    }

    fn set_value(&mut self, position: Position, text: &str) -> Result<(), Self::Error> {
        self.operations.push(Operation::SetValue {
            position,
            text: text.to_string(),
        });
        Ok(())
    }
}
