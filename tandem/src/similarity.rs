//! Similarity scores and the per-kind calculators that produce them.

use core::fmt;
use core::hash::Hasher;

use rapidhash::RapidHasher;

use crate::error::Fault;
use crate::tree::{ElementView, NodeView};

/// A pairing score on the totally ordered scale
/// `IMPOSSIBLE < BAD < GOOD < PERFECT`.
///
/// Sibling bonuses produce values between the named tiers.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Similarity(pub f32);

impl Similarity {
    /// Checksum-exact pairing. Nothing else produces this score.
    pub const PERFECT: Similarity = Similarity(f32::INFINITY);
    /// Heuristically equivalent.
    pub const GOOD: Similarity = Similarity(1.0);
    /// Same bucket but little in common.
    pub const BAD: Similarity = Similarity(-1.0);
    /// Must never be paired.
    pub const IMPOSSIBLE: Similarity = Similarity(f32::NEG_INFINITY);

    /// Whether this is the perfect tier.
    pub fn is_perfect(self) -> bool {
        self.0 == f32::INFINITY
    }

    /// Whether this is the impossible tier.
    pub fn is_impossible(self) -> bool {
        self.0 == f32::NEG_INFINITY
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_perfect() {
            write!(f, "perfect")
        } else if self.is_impossible() {
            write!(f, "impossible")
        } else {
            write!(f, "{:.3}", self.0)
        }
    }
}

/// The partition a node is matched within. Nodes with different keys are
/// never paired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketKey<'a> {
    /// All comments share one bucket
    Comment,
    /// Document roots
    Document,
    /// Fragment roots
    Fragment,
    /// Document type declarations
    DocumentType,
    /// Elements by tag, `is` and `id`
    Element {
        /// Tag name
        tag: &'a str,
        /// Non-empty `is` attribute
        is: Option<&'a str>,
        /// Non-empty `id` attribute
        id: Option<&'a str>,
    },
    /// Text nodes by exact content
    Text(&'a str),
}

impl<'a> BucketKey<'a> {
    /// Bucket of a node, or the unsupported-kind fault.
    pub fn of(view: &NodeView<'a>) -> Result<Self, Fault> {
        Ok(match view {
            NodeView::Comment(_) => BucketKey::Comment,
            NodeView::Document => BucketKey::Document,
            NodeView::Fragment => BucketKey::Fragment,
            NodeView::DocumentType(_) => BucketKey::DocumentType,
            NodeView::Element(element) => BucketKey::Element {
                tag: element.tag,
                is: element.non_empty_attr("is"),
                id: element.non_empty_attr("id"),
            },
            NodeView::Text(text) => BucketKey::Text(*text),
            NodeView::Unsupported { kind, .. } => return Err(Fault::unsupported(kind)),
        })
    }
}

const SIGNATURE_WORDS: usize = 16;
const SIGNATURE_BITS: u64 = (SIGNATURE_WORDS * 64) as u64;

/// Bloom signature of an element's non-identifying attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributeSignature {
    bits: [u64; SIGNATURE_WORDS],
}

fn hash_str(value: &str) -> u64 {
    let mut hasher = RapidHasher::default();
    hasher.write(value.as_bytes());
    hasher.finish()
}

impl AttributeSignature {
    /// Signature of an element. `id` and `is` are skipped, they are part of
    /// the bucket key instead.
    pub fn of(element: &ElementView<'_>) -> Self {
        let mut signature = Self::default();
        for attr in element.attrs {
            if attr.name == "id" || attr.name == "is" {
                continue;
            }
            let offset = (hash_str(&attr.name) ^ hash_str(&attr.value)) % SIGNATURE_BITS;
            let offset = offset as usize;
            signature.bits[offset / 64] |= 1u64 << (offset % 64);
        }
        signature
    }

    /// `BAD + GOOD * common / (common + differing)`, or exactly `GOOD` when
    /// no bit differs.
    pub fn similarity(&self, other: &Self) -> Similarity {
        let mut common = 0u32;
        let mut differing = 0u32;
        for (a, b) in self.bits.iter().zip(other.bits.iter()) {
            common += (a & b).count_ones();
            differing += (a ^ b).count_ones();
        }
        if differing == 0 {
            return Similarity::GOOD;
        }
        let ratio = common as f32 / (common + differing) as f32;
        Similarity(Similarity::BAD.0 + Similarity::GOOD.0 * ratio)
    }
}

/// Base similarity of two nodes, without sibling context.
///
/// `signatures` supplies the attribute signatures of elements, so callers
/// can cache them.
pub fn base_similarity(
    x: &NodeView<'_>,
    y: &NodeView<'_>,
    signatures: impl FnOnce() -> (AttributeSignature, AttributeSignature),
) -> Similarity {
    match (BucketKey::of(x), BucketKey::of(y)) {
        (Ok(a), Ok(b)) if a == b => {}
        _ => return Similarity::IMPOSSIBLE,
    }
    match (x, y) {
        (NodeView::Comment(a), NodeView::Comment(b))
        | (NodeView::DocumentType(a), NodeView::DocumentType(b)) => {
            if a == b {
                Similarity::GOOD
            } else {
                Similarity::BAD
            }
        }
        (NodeView::Element(_), NodeView::Element(_)) => {
            let (a, b) = signatures();
            a.similarity(&b)
        }
        _ => Similarity::GOOD,
    }
}

/// Tunables of the sibling bonus layer.
#[derive(Debug, Clone, Copy)]
pub struct SiblingBonus {
    /// Share of the siblings' similarity that is added to the pair's score.
    pub factor: f32,
    /// Lowest bonus a single sibling pair can contribute.
    pub floor: f32,
    /// Highest bonus a single sibling pair can contribute.
    pub ceiling: f32,
}

impl Default for SiblingBonus {
    fn default() -> Self {
        Self {
            factor: 0.1,
            floor: -0.1,
            ceiling: 0.25,
        }
    }
}

impl SiblingBonus {
    /// Bonus contributed by one pair of siblings, 0 when either is missing.
    pub fn bonus(&self, siblings: Option<Similarity>) -> f32 {
        match siblings {
            None => 0.0,
            Some(similarity) => (similarity.0 * self.factor).clamp(self.floor, self.ceiling),
        }
    }

    /// `base` plus the bonuses of the previous and next sibling pairs.
    pub fn apply(
        &self,
        base: Similarity,
        previous: Option<Similarity>,
        next: Option<Similarity>,
    ) -> Similarity {
        Similarity(base.0 + self.bonus(previous) + self.bonus(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Attribute;
    use facet_testhelpers::test;

    fn element<'a>(tag: &'a str, attrs: &'a [Attribute]) -> NodeView<'a> {
        NodeView::Element(ElementView { tag, attrs })
    }

    fn element_similarity(a: &[Attribute], b: &[Attribute]) -> Similarity {
        let x = element("div", a);
        let y = element("div", b);
        base_similarity(&x, &y, || {
            (
                AttributeSignature::of(&ElementView { tag: "div", attrs: a }),
                AttributeSignature::of(&ElementView { tag: "div", attrs: b }),
            )
        })
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(Similarity::IMPOSSIBLE < Similarity::BAD);
        assert!(Similarity::BAD < Similarity::GOOD);
        assert!(Similarity::GOOD < Similarity::PERFECT);
        assert!(Similarity::PERFECT.is_perfect());
        assert!(Similarity::IMPOSSIBLE.is_impossible());
    }

    #[test]
    fn elements_without_attributes_are_good() {
        assert_eq!(element_similarity(&[], &[]), Similarity::GOOD);
    }

    #[test]
    fn identifying_attributes_do_not_count() {
        let a = [Attribute::new("class", "x"), Attribute::new("is", "fancy")];
        let b = [Attribute::new("class", "x")];
        let x = AttributeSignature::of(&ElementView { tag: "div", attrs: &a });
        let y = AttributeSignature::of(&ElementView { tag: "div", attrs: &b });
        assert_eq!(x, y);
    }

    #[test]
    fn partial_overlap_lands_between_bad_and_good() {
        let a = [Attribute::new("class", "x"), Attribute::new("title", "t")];
        let b = [Attribute::new("class", "x"), Attribute::new("title", "u")];
        let similarity = element_similarity(&a, &b);
        assert!(similarity > Similarity::BAD, "{similarity}");
        assert!(similarity < Similarity::GOOD, "{similarity}");
    }

    #[test]
    fn disjoint_attributes_are_bad() {
        let a = [Attribute::new("class", "x")];
        let b = [Attribute::new("class", "y")];
        let similarity = element_similarity(&a, &b);
        // Distinct hashes may still collide, so only require the floor.
        assert!(similarity <= Similarity(0.0), "{similarity}");
    }

    #[test]
    fn different_buckets_are_impossible() {
        let div = element("div", &[]);
        let span = element("span", &[]);
        let none = || (AttributeSignature::default(), AttributeSignature::default());
        assert_eq!(base_similarity(&div, &span, none), Similarity::IMPOSSIBLE);
        assert_eq!(
            base_similarity(&NodeView::Text("a"), &NodeView::Comment("a"), none),
            Similarity::IMPOSSIBLE
        );
        assert_eq!(
            base_similarity(&NodeView::Text("a"), &NodeView::Text("b"), none),
            Similarity::IMPOSSIBLE
        );
    }

    #[test]
    fn comments_compare_by_content() {
        let none = || (AttributeSignature::default(), AttributeSignature::default());
        assert_eq!(
            base_similarity(&NodeView::Comment("a"), &NodeView::Comment("a"), none),
            Similarity::GOOD
        );
        assert_eq!(
            base_similarity(&NodeView::Comment("a"), &NodeView::Comment("b"), none),
            Similarity::BAD
        );
    }

    #[test]
    fn ids_split_buckets() {
        let a = [Attribute::new("id", "one")];
        let b = [Attribute::new("id", "two")];
        let empty = [Attribute::new("id", "")];
        assert_ne!(
            BucketKey::of(&element("p", &a)).unwrap(),
            BucketKey::of(&element("p", &b)).unwrap()
        );
        assert_eq!(
            BucketKey::of(&element("p", &empty)).unwrap(),
            BucketKey::of(&element("p", &[])).unwrap()
        );
    }

    #[test]
    fn unsupported_kinds_have_no_bucket() {
        let view = NodeView::Unsupported {
            kind: "cdata section",
            code: 4,
            name: "",
            value: "x",
        };
        assert!(matches!(
            BucketKey::of(&view),
            Err(Fault::UnsupportedNodeKind { .. })
        ));
    }

    #[test]
    fn sibling_bonus_is_clamped() {
        let bonus = SiblingBonus::default();
        assert_eq!(bonus.bonus(None), 0.0);
        assert_eq!(bonus.bonus(Some(Similarity::PERFECT)), 0.25);
        assert_eq!(bonus.bonus(Some(Similarity::IMPOSSIBLE)), -0.1);
        assert!((bonus.bonus(Some(Similarity::GOOD)) - 0.1).abs() < 1e-6);
        let scored = bonus.apply(
            Similarity::GOOD,
            Some(Similarity::PERFECT),
            Some(Similarity::IMPOSSIBLE),
        );
        assert!((scored.0 - 1.15).abs() < 1e-6);
    }
}
