//! Structural checksums of whole subtrees.
//!
//! Two subtrees with equal checksums are treated as identical: same kinds,
//! same names and values, same children in the same order. Attribute order
//! does not matter. The mixing function is the x64 variant of MurmurHash3
//! (128 bit), fed with one 16-byte block per field.

use core::hash::{Hash, Hasher};

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

use crate::checksum_index::ChecksumIndex;
use crate::trace;
use crate::tree::{MatchTree, NodeView};

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// 128-bit checksum of a subtree.
///
/// Equality compares the full 128 bits; hashing only feeds a 32-bit summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeChecksum {
    h1: u64,
    h2: u64,
}

impl NodeChecksum {
    /// The 32-bit summary used for hashing.
    pub fn summary(&self) -> u32 {
        let folded = self.h1 ^ self.h2;
        (folded ^ (folded >> 32)) as u32
    }

    /// Both 64-bit halves.
    pub fn halves(&self) -> (u64, u64) {
        (self.h1, self.h2)
    }
}

impl Hash for NodeChecksum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.summary());
    }
}

/// Incremental 128-bit mixer.
struct Mixer {
    h1: u64,
    h2: u64,
    length: u64,
}

impl Mixer {
    fn seeded(code: u8) -> Self {
        Self {
            h1: u64::from(code),
            h2: u64::from(code),
            length: 0,
        }
    }

    fn block(&mut self, mut k1: u64, mut k2: u64) {
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(31);
        k1 = k1.wrapping_mul(C2);
        self.h1 ^= k1;
        self.h1 = self.h1.rotate_left(27);
        self.h1 = self.h1.wrapping_add(self.h2);
        self.h1 = self.h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(C2);
        k2 = k2.rotate_left(33);
        k2 = k2.wrapping_mul(C1);
        self.h2 ^= k2;
        self.h2 = self.h2.rotate_left(31);
        self.h2 = self.h2.wrapping_add(self.h1);
        self.h2 = self.h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);

        self.length += 16;
    }

    /// Folds a string as 16-byte blocks followed by its byte length, so
    /// adjacent fields cannot bleed into each other.
    fn text(&mut self, text: &str) {
        for chunk in text.as_bytes().chunks(16) {
            let mut lo = [0u8; 8];
            let mut hi = [0u8; 8];
            for (i, byte) in chunk.iter().enumerate() {
                if i < 8 {
                    lo[i] = *byte;
                } else {
                    hi[i - 8] = *byte;
                }
            }
            self.block(u64::from_le_bytes(lo), u64::from_le_bytes(hi));
        }
        self.block(text.len() as u64, 0);
    }

    fn child(&mut self, checksum: NodeChecksum) {
        self.block(checksum.h1, checksum.h2);
    }

    fn finish(self) -> NodeChecksum {
        let mut h1 = self.h1 ^ self.length;
        let mut h2 = self.h2 ^ self.length;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        NodeChecksum { h1, h2 }
    }
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Checksum of a single node, given the checksums of its children in order.
pub fn checksum_node(
    view: &NodeView<'_>,
    children: impl IntoIterator<Item = NodeChecksum>,
) -> NodeChecksum {
    let mut mixer = Mixer::seeded(view.code());
    match view {
        NodeView::Document | NodeView::Fragment => {
            for child in children {
                mixer.child(child);
            }
        }
        NodeView::DocumentType(name) => mixer.text(name),
        NodeView::Element(element) => {
            mixer.text(element.tag);
            let mut attrs: Vec<_> = element.attrs.iter().collect();
            attrs.sort_by(|a, b| a.name.cmp(&b.name));
            for attr in attrs {
                mixer.text(&attr.name);
                mixer.text(&attr.value);
            }
            for child in children {
                mixer.child(child);
            }
        }
        NodeView::Text(text) | NodeView::Comment(text) => mixer.text(text),
        NodeView::Unsupported { name, value, .. } => {
            mixer.text(name);
            mixer.text(value);
        }
    }
    mixer.finish()
}

/// Compute the checksum of every node under `root` (inclusive) and register
/// them in a fresh index, in document order.
pub fn compute_checksums<T: MatchTree>(tree: &T, root: NodeId) -> ChecksumIndex {
    let order: Vec<NodeId> = tree.descendants(root).collect();
    let mut checksums: HashMap<NodeId, NodeChecksum> = HashMap::default();
    checksums.reserve(order.len());

    // Reverse pre-order visits every child before its parent.
    for &node in order.iter().rev() {
        let children = tree
            .children(node)
            .filter_map(|child| checksums.get(&child).copied())
            .collect::<Vec<_>>();
        let checksum = checksum_node(&tree.view(node), children);
        checksums.insert(node, checksum);
    }

    let mut index = ChecksumIndex::with_capacity(order.len());
    for node in order {
        if let Some(&checksum) = checksums.get(&node) {
            index.put(node, checksum);
        }
    }
    trace!(
        nodes = index.len(),
        unique = index.unique_len(),
        duplicate = index.duplicate_len(),
        "checksums computed"
    );
    index
}
