//! The final pairing between before and after nodes.

use indextree::NodeId;

use crate::error::Fault;
use crate::similarity::Similarity;

/// The counterpart of a node and how well it matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeMatch {
    /// The node on the other side
    pub node: NodeId,
    /// Score of the pairing
    pub similarity: Similarity,
}

/// An injective pairing between nodes of the before tree and nodes of the
/// after tree. Uses Vecs indexed by NodeId for O(1) lookups.
#[derive(Debug, Default, Clone)]
pub struct NodeMatches {
    /// Before node -> after node (indexed by the before NodeId)
    forward: Vec<Option<NodeMatch>>,
    /// After node -> before node (indexed by the after NodeId)
    backward: Vec<Option<NodeMatch>>,
    /// All pairs in insertion order
    pairs: Vec<(NodeId, NodeId, Similarity)>,
}

fn lookup(table: &[Option<NodeMatch>], node: NodeId) -> Option<NodeMatch> {
    table.get(usize::from(node)).copied().flatten()
}

fn store(table: &mut Vec<Option<NodeMatch>>, node: NodeId, entry: NodeMatch) {
    let idx = usize::from(node);
    if idx >= table.len() {
        table.resize(idx + 1, None);
    }
    table[idx] = Some(entry);
}

impl NodeMatches {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `before` with `after`.
    ///
    /// Impossible pairings are ignored. Pairing a node that already has a
    /// counterpart is a fault.
    pub fn add(&mut self, before: NodeId, after: NodeId, similarity: Similarity) -> Result<(), Fault> {
        if similarity.is_impossible() {
            return Ok(());
        }
        if self.after_of(before).is_some() {
            return Err(Fault::DuplicatePairing {
                node: usize::from(before),
            });
        }
        if self.before_of(after).is_some() {
            return Err(Fault::DuplicatePairing {
                node: usize::from(after),
            });
        }
        store(
            &mut self.forward,
            before,
            NodeMatch {
                node: after,
                similarity,
            },
        );
        store(
            &mut self.backward,
            after,
            NodeMatch {
                node: before,
                similarity,
            },
        );
        self.pairs.push((before, after, similarity));
        Ok(())
    }

    /// Counterpart of a before node.
    #[inline]
    pub fn after_of(&self, before: NodeId) -> Option<NodeMatch> {
        lookup(&self.forward, before)
    }

    /// Counterpart of an after node.
    #[inline]
    pub fn before_of(&self, after: NodeId) -> Option<NodeMatch> {
        lookup(&self.backward, after)
    }

    /// The after node paired with a before node.
    #[inline]
    pub fn after_node_of(&self, before: NodeId) -> Option<NodeId> {
        self.after_of(before).map(|m| m.node)
    }

    /// The before node paired with an after node.
    #[inline]
    pub fn before_node_of(&self, after: NodeId) -> Option<NodeId> {
        self.before_of(after).map(|m| m.node)
    }

    /// Whether `before` and `after` are paired with each other by checksum.
    pub fn is_perfect_match(&self, before: NodeId, after: NodeId) -> bool {
        self.after_of(before)
            .is_some_and(|m| m.node == after && m.similarity.is_perfect())
    }

    /// All pairs as `(before, after, similarity)`, in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId, Similarity)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use indextree::Arena;

    fn ids(count: usize) -> Vec<NodeId> {
        let mut arena = Arena::new();
        (0..count).map(|i| arena.new_node(i)).collect()
    }

    #[test]
    fn lookups_in_both_directions() {
        let before = ids(2);
        let after = ids(2);
        let mut matches = NodeMatches::new();
        matches.add(before[0], after[1], Similarity::GOOD).unwrap();

        assert_eq!(matches.after_node_of(before[0]), Some(after[1]));
        assert_eq!(matches.before_node_of(after[1]), Some(before[0]));
        assert_eq!(matches.after_node_of(before[1]), None);
        assert_eq!(matches.before_node_of(after[0]), None);
        assert!(!matches.is_perfect_match(before[0], after[1]));
    }

    #[test]
    fn perfect_needs_the_same_counterpart() {
        let before = ids(2);
        let after = ids(2);
        let mut matches = NodeMatches::new();
        matches.add(before[0], after[0], Similarity::PERFECT).unwrap();
        assert!(matches.is_perfect_match(before[0], after[0]));
        assert!(!matches.is_perfect_match(before[0], after[1]));
        assert!(!matches.is_perfect_match(before[1], after[0]));
    }

    #[test]
    fn impossible_pairs_are_dropped() {
        let before = ids(1);
        let after = ids(1);
        let mut matches = NodeMatches::new();
        matches.add(before[0], after[0], Similarity::IMPOSSIBLE).unwrap();
        assert!(matches.is_empty());
        assert_eq!(matches.after_of(before[0]), None);
    }

    #[test]
    fn pairing_twice_is_a_fault() {
        let before = ids(2);
        let after = ids(2);
        let mut matches = NodeMatches::new();
        matches.add(before[0], after[0], Similarity::GOOD).unwrap();

        let err = matches.add(before[0], after[1], Similarity::GOOD).unwrap_err();
        assert!(matches!(err, Fault::DuplicatePairing { .. }));
        let err = matches.add(before[1], after[0], Similarity::BAD).unwrap_err();
        assert!(matches!(err, Fault::DuplicatePairing { .. }));
        assert_eq!(matches.len(), 1);
    }
}
