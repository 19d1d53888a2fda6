//! Nodes of one tree, indexed by subtree checksum.
//!
//! Each checksum maps either to exactly one node (unique) or to a set of at
//! least two nodes (duplicate). Removing one node from a duplicate set of two
//! demotes the survivor to unique.

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

use crate::checksum::NodeChecksum;
use crate::error::Fault;
use crate::{OrderedMap, OrderedSet};

#[derive(Debug, Clone)]
enum Slot {
    Unique(NodeId),
    Duplicates(OrderedSet<NodeId>),
}

/// Index of nodes by subtree checksum.
///
/// Iteration follows registration order, except that removing a checksum
/// moves the last registered checksum into its place.
#[derive(Debug, Default, Clone)]
pub struct ChecksumIndex {
    by_node: HashMap<NodeId, NodeChecksum>,
    slots: OrderedMap<NodeChecksum, Slot>,
}

impl ChecksumIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_node: HashMap::with_capacity_and_hasher(capacity, Default::default()),
            slots: OrderedMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Register a node under its checksum.
    pub fn put(&mut self, node: NodeId, checksum: NodeChecksum) {
        self.by_node.insert(node, checksum);
        match self.slots.get_mut(&checksum) {
            None => {
                self.slots.insert(checksum, Slot::Unique(node));
            }
            Some(slot) => match slot {
                Slot::Duplicates(nodes) => {
                    nodes.insert(node);
                }
                Slot::Unique(existing) => {
                    let first = *existing;
                    let mut nodes = OrderedSet::default();
                    nodes.insert(first);
                    nodes.insert(node);
                    *slot = Slot::Duplicates(nodes);
                }
            },
        }
    }

    /// Checksum of a node that is still indexed.
    pub fn checksum_of(&self, node: NodeId) -> Option<NodeChecksum> {
        self.by_node.get(&node).copied()
    }

    /// Whether the node is still indexed.
    pub fn contains(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    /// Remove and return the node registered under `checksum` if it is unique.
    pub fn remove_if_unique(&mut self, checksum: NodeChecksum) -> Option<NodeId> {
        let Some(Slot::Unique(node)) = self.slots.get(&checksum) else {
            return None;
        };
        let node = *node;
        self.slots.swap_remove(&checksum);
        self.by_node.remove(&node);
        Some(node)
    }

    /// Remove and return all nodes registered under `checksum` if there are
    /// at least two of them.
    pub fn remove_if_duplicate(&mut self, checksum: NodeChecksum) -> Option<Vec<NodeId>> {
        if !matches!(self.slots.get(&checksum), Some(Slot::Duplicates(_))) {
            return None;
        }
        Some(self.remove_by_checksum(checksum))
    }

    /// Remove and return every node registered under `checksum`, unique or
    /// not. Empty when the checksum is not indexed.
    pub fn remove_by_checksum(&mut self, checksum: NodeChecksum) -> Vec<NodeId> {
        let nodes = match self.slots.swap_remove(&checksum) {
            None => return Vec::new(),
            Some(Slot::Unique(node)) => vec![node],
            Some(Slot::Duplicates(nodes)) => nodes.into_iter().collect(),
        };
        for node in &nodes {
            self.by_node.remove(node);
        }
        nodes
    }

    /// Remove a single node.
    ///
    /// Returns `Ok(false)` if the node was not indexed.
    pub fn remove(&mut self, node: NodeId) -> Result<bool, Fault> {
        let Some(checksum) = self.by_node.remove(&node) else {
            return Ok(false);
        };
        let Some(slot) = self.slots.get_mut(&checksum) else {
            return Err(Fault::invariant(format!(
                "node {} has a checksum but no slot",
                usize::from(node)
            )));
        };
        match slot {
            Slot::Unique(existing) => {
                if *existing != node {
                    return Err(Fault::invariant(format!(
                        "unique slot of node {} holds node {}",
                        usize::from(node),
                        usize::from(*existing)
                    )));
                }
                self.slots.swap_remove(&checksum);
            }
            Slot::Duplicates(nodes) => {
                if nodes.len() < 2 {
                    return Err(Fault::invariant(format!(
                        "duplicate slot with {} node(s)",
                        nodes.len()
                    )));
                }
                if !nodes.shift_remove(&node) {
                    return Err(Fault::invariant(format!(
                        "node {} missing from its duplicate slot",
                        usize::from(node)
                    )));
                }
                let survivor = (nodes.len() == 1).then(|| nodes.first().copied()).flatten();
                if let Some(survivor) = survivor {
                    *slot = Slot::Unique(survivor);
                }
            }
        }
        Ok(true)
    }

    /// All indexed nodes.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.values().flat_map(|slot| {
            let (unique, duplicates) = match slot {
                Slot::Unique(node) => (Some(*node), None),
                Slot::Duplicates(nodes) => (None, Some(nodes.iter().copied())),
            };
            unique.into_iter().chain(duplicates.into_iter().flatten())
        })
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    /// Whether no nodes are indexed.
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Number of checksums held by exactly one node.
    pub fn unique_len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Unique(_)))
            .count()
    }

    /// Number of checksums held by two or more nodes.
    pub fn duplicate_len(&self) -> usize {
        self.slots.len() - self.unique_len()
    }
}
