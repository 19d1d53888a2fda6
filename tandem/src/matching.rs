//! Multiplexed node matching.
//!
//! Matching walks the before tree breadth-first and sorts every node into one
//! of three tiers:
//! 1. **Perfect pairs**: the subtree checksum is unique on both sides. The
//!    pair is final and every descendant is withdrawn from consideration.
//! 2. **Groups**: the checksum is shared by several nodes. Members of a group
//!    are only ever paired with each other.
//! 3. **Fallback**: everything else, partitioned by [`BucketKey`].
//!
//! Groups and fallback buckets are then solved independently with the stable
//! assignment solver over sibling-aware scores.

use std::collections::VecDeque;

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use crate::assignment::{ScoreMatrix, assign};
use crate::checksum::compute_checksums;
use crate::checksum_index::ChecksumIndex;
use crate::error::Fault;
use crate::match_table::NodeMatches;
use crate::similarity::{AttributeSignature, BucketKey, SiblingBonus, Similarity, base_similarity};
use crate::tree::{MatchTree, NodeView};
use crate::{OrderedMap, OrderedSet};
use crate::{debug, trace};

/// Configuration for the matching algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingConfig {
    /// How much sibling context moves a pair's score.
    pub sibling: SiblingBonus,
}

/// Pair the nodes of two trees with the default configuration.
pub fn match_trees<B, A>(before: &B, after: &A) -> Result<NodeMatches, Fault>
where
    B: MatchTree,
    A: MatchTree,
{
    match_trees_with(before, after, &MatchingConfig::default())
}

/// Pair the nodes of two trees.
///
/// Every before node ends up paired with at most one after node and vice
/// versa. Unsupported node kinds that cannot be paired by checksum fail with
/// [`Fault::UnsupportedNodeKind`].
pub fn match_trees_with<B, A>(before: &B, after: &A, config: &MatchingConfig) -> Result<NodeMatches, Fault>
where
    B: MatchTree,
    A: MatchTree,
{
    let mut before_index = compute_checksums(before, before.root());
    let mut after_index = compute_checksums(after, after.root());
    debug!(
        before = before_index.len(),
        after = after_index.len(),
        "match_trees start"
    );

    let mut matcher = Multiplexer::new(before, after, config.sibling);
    matcher.walk(&mut before_index, &mut after_index)?;
    debug!(
        perfect = matcher.perfect.len(),
        groups = matcher.groups.iter().flatten().count(),
        buckets = matcher.fallback.len(),
        "match_trees partitioned"
    );

    let matches = matcher.find_matches()?;
    debug!(matched = matches.len(), "match_trees done");
    Ok(matches)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Before => Side::After,
            Side::After => Side::Before,
        }
    }
}

enum Removal {
    NotFound,
    Removed,
    /// The side became empty; carries the other side's members.
    Emptied(Vec<NodeId>),
}

/// Candidates of one bucket or group, per side.
#[derive(Debug, Default)]
struct Grid {
    before: OrderedSet<NodeId>,
    after: OrderedSet<NodeId>,
}

impl Grid {
    fn pool(&self, side: Side) -> &OrderedSet<NodeId> {
        match side {
            Side::Before => &self.before,
            Side::After => &self.after,
        }
    }

    fn pool_mut(&mut self, side: Side) -> &mut OrderedSet<NodeId> {
        match side {
            Side::Before => &mut self.before,
            Side::After => &mut self.after,
        }
    }

    fn remove(&mut self, side: Side, node: NodeId) -> Removal {
        if !self.pool_mut(side).shift_remove(&node) {
            return Removal::NotFound;
        }
        if self.pool(side).is_empty() {
            Removal::Emptied(self.pool(side.other()).iter().copied().collect())
        } else {
            Removal::Removed
        }
    }

    fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

struct Multiplexer<'t, B, A> {
    before: &'t B,
    after: &'t A,
    sibling: SiblingBonus,
    /// Before root -> after root of checksum-identical subtrees
    perfect: OrderedMap<NodeId, NodeId>,
    perfect_after: HashSet<NodeId>,
    /// Duplicate-checksum groups; dissolved groups leave a hole
    groups: Vec<Option<Grid>>,
    group_of_before: HashMap<NodeId, usize>,
    group_of_after: HashMap<NodeId, usize>,
    fallback: OrderedMap<BucketKey<'t>, Grid>,
    signatures_before: HashMap<NodeId, AttributeSignature>,
    signatures_after: HashMap<NodeId, AttributeSignature>,
}

impl<'t, B: MatchTree, A: MatchTree> Multiplexer<'t, B, A> {
    fn new(before: &'t B, after: &'t A, sibling: SiblingBonus) -> Self {
        Self {
            before,
            after,
            sibling,
            perfect: OrderedMap::default(),
            perfect_after: HashSet::default(),
            groups: Vec::new(),
            group_of_before: HashMap::default(),
            group_of_after: HashMap::default(),
            fallback: OrderedMap::default(),
            signatures_before: HashMap::default(),
            signatures_after: HashMap::default(),
        }
    }

    fn view(&self, side: Side, node: NodeId) -> NodeView<'t> {
        match side {
            Side::Before => self.before.view(node),
            Side::After => self.after.view(node),
        }
    }

    fn group_map(&mut self, side: Side) -> &mut HashMap<NodeId, usize> {
        match side {
            Side::Before => &mut self.group_of_before,
            Side::After => &mut self.group_of_after,
        }
    }

    fn cache_signature(&mut self, side: Side, node: NodeId) {
        let Some(element) = self.view(side, node).as_element() else {
            return;
        };
        let cache = match side {
            Side::Before => &mut self.signatures_before,
            Side::After => &mut self.signatures_after,
        };
        cache
            .entry(node)
            .or_insert_with(|| AttributeSignature::of(&element));
    }

    fn signature(&self, side: Side, node: NodeId, view: &NodeView<'_>) -> AttributeSignature {
        let cache = match side {
            Side::Before => &self.signatures_before,
            Side::After => &self.signatures_after,
        };
        match cache.get(&node) {
            Some(signature) => *signature,
            None => view
                .as_element()
                .map(|element| AttributeSignature::of(&element))
                .unwrap_or_default(),
        }
    }

    fn add_to_fallback(&mut self, side: Side, node: NodeId) -> Result<(), Fault> {
        let key = BucketKey::of(&self.view(side, node))?;
        self.cache_signature(side, node);
        self.fallback
            .entry(key)
            .or_default()
            .pool_mut(side)
            .insert(node);
        Ok(())
    }

    fn remove_from_fallback(&mut self, side: Side, node: NodeId) -> bool {
        let Ok(key) = BucketKey::of(&self.view(side, node)) else {
            return false;
        };
        let Some(grid) = self.fallback.get_mut(&key) else {
            return false;
        };
        if matches!(grid.remove(side, node), Removal::NotFound) {
            return false;
        }
        // Fallback buckets keep their leftovers; only drop a bucket once
        // both sides are gone.
        if grid.is_empty() {
            self.fallback.shift_remove(&key);
        }
        true
    }

    fn add_group(&mut self, befores: Vec<NodeId>, afters: Vec<NodeId>) {
        let group = self.groups.len();
        let mut grid = Grid::default();
        for &node in &befores {
            self.cache_signature(Side::Before, node);
            self.group_of_before.insert(node, group);
            grid.before.insert(node);
        }
        for &node in &afters {
            self.cache_signature(Side::After, node);
            self.group_of_after.insert(node, group);
            grid.after.insert(node);
        }
        trace!(
            group,
            before = befores.len(),
            after = afters.len(),
            "duplicate group"
        );
        self.groups.push(Some(grid));
    }

    fn walk(&mut self, before_index: &mut ChecksumIndex, after_index: &mut ChecksumIndex) -> Result<(), Fault> {
        let mut queue = VecDeque::from([self.before.root()]);
        while let Some(node) = queue.pop_front() {
            if self.visit(node, before_index, after_index)? {
                queue.extend(self.before.children(node));
            }
        }
        let leftovers: Vec<NodeId> = after_index.nodes().collect();
        for node in leftovers {
            self.add_to_fallback(Side::After, node)?;
        }
        Ok(())
    }

    /// Sort one before node into a tier. Returns whether its children still
    /// need a visit.
    fn visit(
        &mut self,
        node: NodeId,
        before_index: &mut ChecksumIndex,
        after_index: &mut ChecksumIndex,
    ) -> Result<bool, Fault> {
        // Nodes already taken out of the index were placed with their
        // duplicates.
        let Some(checksum) = before_index.checksum_of(node) else {
            return Ok(true);
        };

        if let Some(befores) = before_index.remove_if_duplicate(checksum) {
            let afters = after_index.remove_by_checksum(checksum);
            if afters.is_empty() {
                for before in befores {
                    self.add_to_fallback(Side::Before, before)?;
                }
            } else {
                self.add_group(befores, afters);
            }
            return Ok(true);
        }

        if before_index.remove_if_unique(checksum) != Some(node) {
            return Err(Fault::invariant(format!(
                "node {} is indexed but neither unique nor duplicate",
                usize::from(node)
            )));
        }

        if let Some(after) = after_index.remove_if_unique(checksum) {
            trace!(before = usize::from(node), after = usize::from(after), "perfect pair");
            self.perfect.insert(node, after);
            self.perfect_after.insert(after);
            self.purge_descendants(Side::Before, node, before_index)?;
            self.purge_descendants(Side::After, after, after_index)?;
            return Ok(false);
        }

        match after_index.remove_if_duplicate(checksum) {
            Some(afters) => self.add_group(vec![node], afters),
            None => self.add_to_fallback(Side::Before, node)?,
        }
        Ok(true)
    }

    /// Withdraw every strict descendant of a perfectly paired node from
    /// wherever it was registered.
    fn purge_descendants(&mut self, side: Side, root: NodeId, index: &mut ChecksumIndex) -> Result<(), Fault> {
        let descendants: Vec<NodeId> = match side {
            Side::Before => self.before.descendants(root).skip(1).collect(),
            Side::After => self.after.descendants(root).skip(1).collect(),
        };
        for node in descendants {
            if index.remove(node)? {
                continue;
            }
            if self.remove_from_fallback(side, node) {
                continue;
            }
            let Some(group) = self.group_map(side).remove(&node) else {
                return Err(Fault::invariant(format!(
                    "descendant {} of a perfect pair is not registered",
                    usize::from(node)
                )));
            };
            let Some(grid) = self.groups.get_mut(group).and_then(Option::as_mut) else {
                return Err(Fault::invariant(format!("group {group} was already dissolved")));
            };
            match grid.remove(side, node) {
                Removal::NotFound => {
                    return Err(Fault::invariant(format!(
                        "node {} missing from group {group}",
                        usize::from(node)
                    )));
                }
                Removal::Removed => {}
                Removal::Emptied(leftovers) => {
                    trace!(group, leftovers = leftovers.len(), "group dissolved");
                    self.groups[group] = None;
                    let other = side.other();
                    for leftover in leftovers {
                        self.group_map(other).remove(&leftover);
                        self.add_to_fallback(other, leftover)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn base(&self, before: NodeId, after: NodeId) -> Similarity {
        let x = self.view(Side::Before, before);
        let y = self.view(Side::After, after);
        base_similarity(&x, &y, || {
            (
                self.signature(Side::Before, before, &x),
                self.signature(Side::After, after, &y),
            )
        })
    }

    /// Similarity as seen across all tiers: perfect pairs are exclusive and
    /// group members only match within their group.
    fn global(&self, before: NodeId, after: NodeId) -> Similarity {
        if let Some(&paired) = self.perfect.get(&before) {
            return if paired == after {
                Similarity::PERFECT
            } else {
                Similarity::IMPOSSIBLE
            };
        }
        if self.perfect_after.contains(&after) {
            return Similarity::IMPOSSIBLE;
        }
        match self.group_of_before.get(&before) {
            None => self.base(before, after),
            Some(group) if self.group_of_after.get(&after) == Some(group) => self.base(before, after),
            Some(_) => Similarity::IMPOSSIBLE,
        }
    }

    fn siblings(
        &self,
        before: Option<NodeId>,
        after: Option<NodeId>,
    ) -> Option<Similarity> {
        Some(self.global(before?, after?))
    }

    /// Base similarity plus the sibling context bonus.
    fn scored(&self, before: NodeId, after: NodeId) -> Similarity {
        let previous = self.siblings(
            self.before.previous_sibling(before),
            self.after.previous_sibling(after),
        );
        let next = self.siblings(self.before.next_sibling(before), self.after.next_sibling(after));
        self.sibling.apply(self.base(before, after), previous, next)
    }

    fn solve(&self, grid: &Grid, matches: &mut NodeMatches) -> Result<(), Fault> {
        if grid.before.is_empty() || grid.after.is_empty() {
            return Ok(());
        }
        let befores: Vec<NodeId> = grid.before.iter().copied().collect();
        let afters: Vec<NodeId> = grid.after.iter().copied().collect();
        let matrix = ScoreMatrix::from_fn(befores.len(), afters.len(), |row, col| {
            self.scored(befores[row], afters[col]).0
        });
        for assignment in assign(&matrix) {
            matches.add(
                befores[assignment.row],
                afters[assignment.col],
                Similarity(assignment.score),
            )?;
        }
        Ok(())
    }

    fn find_matches(&self) -> Result<NodeMatches, Fault> {
        let mut matches = NodeMatches::new();
        for (&before, &after) in &self.perfect {
            let nested = self
                .before
                .parent(before)
                .is_some_and(|parent| self.perfect.contains_key(&parent));
            if nested {
                continue;
            }
            matches.add(before, after, Similarity::PERFECT)?;
        }
        for grid in self.groups.iter().flatten() {
            self.solve(grid, &mut matches)?;
        }
        for grid in self.fallback.values() {
            self.solve(grid, &mut matches)?;
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestTree;
    use facet_testhelpers::test;

    #[test]
    fn identical_trees_pair_only_the_roots() {
        let mut before = TestTree::new();
        let div = before.element(before.root, "div", &[("class", "a")]);
        before.text(div, "hello");
        let mut after = TestTree::new();
        let div = after.element(after.root, "div", &[("class", "a")]);
        after.text(div, "hello");

        let matches = match_trees(&before, &after).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.is_perfect_match(before.root, after.root));
    }

    #[test]
    fn changed_leaf_keeps_its_parent_paired() {
        let mut before = TestTree::new();
        let div = before.element(before.root, "div", &[]);
        let p_a = before.element(div, "p", &[]);
        before.text(p_a, "a");
        let p_b = before.element(div, "p", &[]);
        let text_b = before.text(p_b, "b");

        let mut after = TestTree::new();
        let div2 = after.element(after.root, "div", &[]);
        let p_a2 = after.element(div2, "p", &[]);
        after.text(p_a2, "a");
        let p_c = after.element(div2, "p", &[]);
        after.text(p_c, "c");

        let matches = match_trees(&before, &after).unwrap();
        assert!(matches.is_perfect_match(p_a, p_a2));
        assert_eq!(matches.after_node_of(div), Some(div2));
        assert_eq!(matches.after_node_of(p_b), Some(p_c));
        assert_eq!(matches.after_node_of(text_b), None);
        assert_eq!(matches.after_node_of(before.root), Some(after.root));
    }

    #[test]
    fn different_tags_never_pair() {
        let mut before = TestTree::new();
        let span = before.element(before.root, "span", &[]);
        let mut after = TestTree::new();
        after.element(after.root, "div", &[]);

        let matches = match_trees(&before, &after).unwrap();
        assert_eq!(matches.after_node_of(span), None);
    }

    #[test]
    fn duplicates_pair_within_their_group() {
        let mut before = TestTree::new();
        let ul = before.element(before.root, "ul", &[]);
        let li1 = before.element(ul, "li", &[]);
        before.text(li1, "same");
        let li2 = before.element(ul, "li", &[]);
        before.text(li2, "same");
        before.comment(ul, "tail");

        let mut after = TestTree::new();
        let ul2 = after.element(after.root, "ul", &[]);
        let li1b = after.element(ul2, "li", &[]);
        after.text(li1b, "same");
        let li2b = after.element(ul2, "li", &[]);
        after.text(li2b, "same");
        after.comment(ul2, "changed");

        let matches = match_trees(&before, &after).unwrap();
        assert_eq!(matches.after_node_of(ul), Some(ul2));
        // Sibling context keeps the pairs in order.
        assert_eq!(matches.after_node_of(li1), Some(li1b));
        assert_eq!(matches.after_node_of(li2), Some(li2b));
    }

    #[test]
    fn emptied_group_moves_leftovers_to_fallback() {
        // <b>k</b> appears twice before and once after; the after copy sits
        // inside a subtree that is paired perfectly, which empties the
        // group's after side.
        let mut before = TestTree::new();
        let lone_b = before.element(before.root, "b", &[]);
        before.text(lone_b, "k");
        let div = before.element(before.root, "div", &[]);
        let span = before.element(div, "span", &[]);
        before.text(span, "u");
        let inner_b = before.element(div, "b", &[]);
        before.text(inner_b, "k");

        let mut after = TestTree::new();
        let div2 = after.element(after.root, "div", &[]);
        let span2 = after.element(div2, "span", &[]);
        after.text(span2, "u");
        let inner_b2 = after.element(div2, "b", &[]);
        after.text(inner_b2, "k");
        let other_b = after.element(after.root, "b", &[]);
        after.text(other_b, "z");

        let matches = match_trees(&before, &after).unwrap();
        assert!(matches.is_perfect_match(div, div2));
        assert_eq!(matches.after_node_of(inner_b), None);
        // The leftover before <b> was redistributed and can pair with the
        // unrelated after <b>.
        assert_eq!(matches.after_node_of(lone_b), Some(other_b));
    }

    #[test]
    fn unsupported_nodes_fault() {
        let before = TestTree::new();
        let mut after = TestTree::new();
        after.cdata(after.root, "x");

        let err = match_trees(&before, &after).unwrap_err();
        assert!(matches!(err, Fault::UnsupportedNodeKind { .. }));
    }

    #[test]
    fn nested_unsupported_nodes_with_new_content_fault() {
        let mut before = TestTree::new();
        let div = before.element(before.root, "div", &[]);
        before.cdata(div, "a");
        let p = before.element(before.root, "p", &[]);
        before.text(p, "1");

        let mut after = TestTree::new();
        let div = after.element(after.root, "div", &[]);
        after.cdata(div, "b");
        let p = after.element(after.root, "p", &[]);
        after.text(p, "2");

        let err = match_trees(&before, &after).unwrap_err();
        assert!(matches!(err, Fault::UnsupportedNodeKind { .. }));
    }

    #[test]
    fn matches_are_injective() {
        let mut before = TestTree::new();
        let mut after = TestTree::new();
        for i in 0..6 {
            let p = before.element(before.root, "p", &[("class", if i % 2 == 0 { "even" } else { "odd" })]);
            before.text(p, "x");
        }
        for i in 0..4 {
            let p = after.element(after.root, "p", &[("class", if i % 3 == 0 { "even" } else { "odd" })]);
            after.text(p, "x");
        }

        let matches = match_trees(&before, &after).unwrap();
        let mut befores = HashSet::default();
        let mut afters = HashSet::default();
        for (b, a, _) in matches.pairs() {
            assert!(befores.insert(b));
            assert!(afters.insert(a));
        }
    }
}
