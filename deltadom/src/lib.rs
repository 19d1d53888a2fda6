//! In-place DOM edit scripts built on tandem node matching.
//!
//! deltadom provides:
//! - **Document model**: an `indextree` arena of elements, text, comments
//!   and the auxiliary node kinds a document may carry
//! - **Edit scripts**: the minimal-ish sequence of inserts, moves, updates
//!   and deletes that turns one document into another, applied to the
//!   before document while it is emitted
//! - **Locators**: element selectors and child positions that stay valid
//!   against the live tree at every step
//! - **Sinks**: an operation recorder, a JSON command writer and a replay
//!   applier
//!
//! # Example
//!
//! ```rust
//! use deltadom::{JsonHandler, diff, parse_fragment};
//!
//! let mut before = parse_fragment("<p class=\"x\">Hi</p>");
//! let after = parse_fragment("<p class=\"y\">Hi</p>");
//!
//! let json = diff(&mut before, &after, JsonHandler::new(String::new()))
//!     .unwrap()
//!     .finish()
//!     .unwrap();
//! assert_eq!(json, r#"[[8,"p","class","y"]]"#);
//! assert_eq!(before.to_markup(), after.to_markup());
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Replaying recorded operations
pub mod apply;
/// Arena document model
pub mod dom;
/// Edit-script generation
pub mod edit_script;
/// Operation sinks
pub mod handler;
/// JSON command writer
pub mod json;
/// HTML parsing into documents
pub mod markup;
/// Element selectors and child positions
pub mod selector;

pub use apply::ApplyError;
pub use dom::{Document, ElementData, NodeKind};
pub use edit_script::{DiffError, EditScript, diff, diff_operations, diff_with};
pub use handler::{DifferenceHandler, Operation, Recorder};
pub use json::{JsonHandler, operations_to_json, write_operations};
pub use markup::{parse_document, parse_fragment};
pub use selector::{Position, Selector};

pub use tandem::{Attribute, Fault, MatchingConfig, NodeMatches, SiblingBonus, indextree};
