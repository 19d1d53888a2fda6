//! # Tandem
//!
//! Node matching for ordered labeled trees, the first half of a tree diff.
//!
//! Given a *before* and an *after* tree, tandem pairs up nodes that
//! correspond to each other. The pairing is injective: every node has at most
//! one counterpart.
//!
//! ## Algorithm Overview
//!
//! 1. **Checksums**: every subtree gets a 128-bit structural checksum.
//! 2. **Multiplexing**: a breadth-first walk of the before tree pairs
//!    subtrees whose checksum is unique on both sides, groups nodes with
//!    duplicated checksums, and drops the rest into buckets keyed by tag,
//!    `is` and `id` (or by content for text nodes).
//! 3. **Assignment**: each group and bucket is solved with a stable marriage
//!    over similarity scores that include a bonus for matching siblings.
//!
//! Trees are read through the [`MatchTree`] trait, so any arena-backed
//! structure can be matched without conversion.
//!
//! ## Usage
//!
//! ```ignore
//! use tandem::match_trees;
//!
//! let matches = match_trees(&before, &after)?;
//! if let Some(counterpart) = matches.after_node_of(node) {
//!     // ...
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

use core::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rapidhash::RapidHasher;

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Stable assignment of rows to columns by score
pub mod assignment;
/// Structural subtree checksums
pub mod checksum;
/// Checksum to node index
pub mod checksum_index;
mod error;
/// The final node pairing
pub mod match_table;
/// Multiplexed matching across perfect pairs, groups and buckets
pub mod matching;
/// Similarity scores and calculators
pub mod similarity;
/// Tree access trait and node views
pub mod tree;

#[cfg(test)]
mod testing;

pub use assignment::{Assignment, ScoreMatrix, assign};
pub use checksum::{NodeChecksum, checksum_node, compute_checksums};
pub use checksum_index::ChecksumIndex;
pub use error::Fault;
pub use match_table::{NodeMatch, NodeMatches};
pub use matching::{MatchingConfig, match_trees, match_trees_with};
pub use similarity::{AttributeSignature, BucketKey, SiblingBonus, Similarity, base_similarity};
pub use tree::{Attribute, ElementView, MatchTree, NodeView};

/// Insertion-ordered map with the crate's hasher.
pub(crate) type OrderedMap<K, V> = IndexMap<K, V, BuildHasherDefault<RapidHasher>>;

/// Insertion-ordered set with the crate's hasher.
pub(crate) type OrderedSet<T> = IndexSet<T, BuildHasherDefault<RapidHasher>>;
