//! Streams operations as a compact JSON command list.
//!
//! The output is one array of commands, each `[opcode, args...]`:
//!
//! | opcode | command          | arguments                                  |
//! |--------|------------------|--------------------------------------------|
//! | 0      | delete node      | parent, offset                             |
//! | 1      | delete element   | selector                                   |
//! | 2      | insert comment   | parent, offset, text                       |
//! | 3      | insert element   | parent, offset, tag, name1, value1, ...    |
//! | 4      | insert text      | parent, offset, text                       |
//! | 5      | move node        | old parent, old offset, new parent, offset |
//! | 6      | move element     | selector, new parent, new offset           |
//! | 7      | remove attribute | selector, name                             |
//! | 8      | set attribute    | selector, name, value                      |
//! | 9      | set value        | parent, offset, text                       |

use core::fmt::{self, Write};

use tandem::Attribute;

use crate::handler::{DifferenceHandler, Operation};
use crate::selector::{Position, Selector};

/// Writes every operation it receives to `W` as JSON.
///
/// Call [`JsonHandler::finish`] to close the array.
#[derive(Debug)]
pub struct JsonHandler<W> {
    out: W,
    opened: bool,
}

impl<W: Write> JsonHandler<W> {
    /// Writer that appends to `out`.
    pub fn new(out: W) -> Self {
        Self { out, opened: false }
    }

    /// Close the command array and hand back the writer.
    pub fn finish(mut self) -> Result<W, fmt::Error> {
        if !self.opened {
            self.out.write_char('[')?;
        }
        self.out.write_char(']')?;
        Ok(self.out)
    }

    fn begin(&mut self, opcode: u8) -> fmt::Result {
        if self.opened {
            self.out.write_char(',')?;
        } else {
            self.out.write_char('[')?;
            self.opened = true;
        }
        write!(self.out, "[{opcode}")
    }

    fn end(&mut self) -> fmt::Result {
        self.out.write_char(']')
    }

    fn string(&mut self, value: &str) -> fmt::Result {
        self.out.write_char(',')?;
        write_escaped(&mut self.out, value)
    }

    fn number(&mut self, value: usize) -> fmt::Result {
        write!(self.out, ",{value}")
    }

    fn position(&mut self, position: &Position) -> fmt::Result {
        self.string(position.parent.as_str())?;
        self.number(position.offset)
    }
}

/// Write `value` as a quoted JSON string.
pub fn write_escaped<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}' | '\u{2000}'..='\u{20ff}' => {
                write!(out, "\\u{:04X}", u32::from(c))?
            }
            _ => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

impl<W: Write> DifferenceHandler for JsonHandler<W> {
    type Error = fmt::Error;

    fn delete_node(&mut self, position: Position) -> fmt::Result {
        self.begin(0)?;
        self.position(&position)?;
        self.end()
    }

    fn delete_element(&mut self, element: Selector) -> fmt::Result {
        self.begin(1)?;
        self.string(element.as_str())?;
        self.end()
    }

    fn insert_comment(&mut self, position: Position, text: &str) -> fmt::Result {
        self.begin(2)?;
        self.position(&position)?;
        self.string(text)?;
        self.end()
    }

    fn insert_element(
        &mut self,
        position: Position,
        tag: &str,
        attrs: &[Attribute],
    ) -> fmt::Result {
        self.begin(3)?;
        self.position(&position)?;
        self.string(tag)?;
        for attr in attrs {
            self.string(&attr.name)?;
            self.string(&attr.value)?;
        }
        self.end()
    }

    fn insert_text(&mut self, position: Position, text: &str) -> fmt::Result {
        self.begin(4)?;
        self.position(&position)?;
        self.string(text)?;
        self.end()
    }

    fn move_node(&mut self, from: Position, to: Position) -> fmt::Result {
        self.begin(5)?;
        self.position(&from)?;
        self.position(&to)?;
        self.end()
    }

    fn move_element(&mut self, element: Selector, to: Position) -> fmt::Result {
        self.begin(6)?;
        self.string(element.as_str())?;
        self.position(&to)?;
        self.end()
    }

    fn remove_attribute(&mut self, element: Selector, name: &str) -> fmt::Result {
        self.begin(7)?;
        self.string(element.as_str())?;
        self.string(name)?;
        self.end()
    }

    fn set_attribute(&mut self, element: Selector, name: &str, value: &str) -> fmt::Result {
        self.begin(8)?;
        self.string(element.as_str())?;
        self.string(name)?;
        self.string(value)?;
        self.end()
    }

    fn set_value(&mut self, position: Position, text: &str) -> fmt::Result {
        self.begin(9)?;
        self.position(&position)?;
        self.string(text)?;
        self.end()
    }
}

/// Write recorded operations into `out` as a JSON command list.
pub fn write_operations<W: fmt::Write>(operations: &[Operation], out: W) -> Result<W, fmt::Error> {
    let mut handler = JsonHandler::new(out);
    for operation in operations {
        operation.emit_to(&mut handler)?;
    }
    handler.finish()
}

/// Render recorded operations as a JSON command list.
pub fn operations_to_json(operations: &[Operation]) -> Result<String, fmt::Error> {
    write_operations(operations, String::new())
}
