use facet::Facet;

/// Faults raised while matching trees or generating an edit script.
///
/// Every fault aborts the current run.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum Fault {
    /// unsupported node kind: {kind}
    UnsupportedNodeKind { kind: String },

    /// internal bookkeeping is inconsistent: {detail}
    InvariantViolation { detail: String },

    /// node {node} is already paired
    DuplicatePairing { node: usize },

    /// the before and after roots are not paired with each other
    MismatchedRoots,

    /// a {kind} node cannot be addressed by a locator
    Unaddressable { kind: String },
}

impl Fault {
    /// Fault for a node kind outside the supported set.
    pub fn unsupported(kind: &str) -> Self {
        Fault::UnsupportedNodeKind {
            kind: kind.to_string(),
        }
    }

    /// Fault for broken internal bookkeeping.
    pub fn invariant(detail: impl Into<String>) -> Self {
        Fault::InvariantViolation {
            detail: detail.into(),
        }
    }
}
