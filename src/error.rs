//! Error types for graph construction and the transformation calculus.
//!
//! Rule-legality failures are ordinary, recoverable results: the caller may
//! retry with different arguments. [`EgiError::InvariantViolation`] is the
//! exception. It means an effect function produced an ill-formed graph, is
//! never a user error, and the operation that raised it is abandoned.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calculus::Rule;
use crate::types::{ContextId, EdgeId, ElementId, Polarity, VertexId};

/// Error raised by the graph model or by a transformation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EgiError {
    /// Construction-time violation, e.g. a constant vertex without a name.
    #[error("Malformed entity {element}: {reason}")]
    MalformedEntity {
        /// Element being constructed (its intended id or a relation name).
        element: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Reference to an id that does not exist in the graph.
    #[error("Not found: {0}")]
    NotFound(ElementId),

    /// Erasure in a negative context or insertion in a positive one.
    #[error("{rule} requires a {required} context, but {context} is {actual}")]
    WrongPolarity {
        /// Rule that was attempted.
        rule: Rule,
        /// Context the rule targeted.
        context: ContextId,
        /// Polarity the rule needs.
        required: Polarity,
        /// Polarity the context has.
        actual: Polarity,
    },

    /// Removing the element would strip a ligature member or leave an edge
    /// pointing at a vertex that is gone or out of scope.
    #[error("Dangling reference to {element} from {referenced_by}: {detail}")]
    DanglingReference {
        /// Element that would be removed or moved.
        element: ElementId,
        /// Element that still depends on it.
        referenced_by: ElementId,
        /// Human-readable explanation.
        detail: String,
    },

    /// The graph does not have the shape the rule requires.
    #[error("{rule}: structural mismatch: {detail}")]
    StructuralMismatch {
        /// Rule that was attempted.
        rule: Rule,
        /// Offending elements.
        elements: Vec<ElementId>,
        /// Human-readable explanation.
        detail: String,
    },

    /// Isolated-vertex removal on a vertex that still has incident edges.
    #[error("Vertex {vertex} is not isolated ({} incident edge(s))", .incident_edges.len())]
    NotIsolated {
        /// The vertex.
        vertex: VertexId,
        /// Edges still referencing it.
        incident_edges: Vec<EdgeId>,
    },

    /// Internal consistency fault: a transformation produced an ill-formed graph.
    #[error("Invariant violation: {detail}")]
    InvariantViolation {
        /// Which invariant failed and where.
        detail: String,
    },
}

/// Discriminant of [`EgiError`], for reporting the error kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`EgiError::MalformedEntity`].
    MalformedEntity,
    /// See [`EgiError::NotFound`].
    NotFound,
    /// See [`EgiError::WrongPolarity`].
    WrongPolarity,
    /// See [`EgiError::DanglingReference`].
    DanglingReference,
    /// See [`EgiError::StructuralMismatch`].
    StructuralMismatch,
    /// See [`EgiError::NotIsolated`].
    NotIsolated,
    /// See [`EgiError::InvariantViolation`].
    InvariantViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedEntity => "MalformedEntity",
            Self::NotFound => "NotFound",
            Self::WrongPolarity => "WrongPolarity",
            Self::DanglingReference => "DanglingReference",
            Self::StructuralMismatch => "StructuralMismatch",
            Self::NotIsolated => "NotIsolated",
            Self::InvariantViolation => "InvariantViolation",
        };
        f.write_str(name)
    }
}

impl EgiError {
    /// Error kind without payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedEntity { .. } => ErrorKind::MalformedEntity,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::WrongPolarity { .. } => ErrorKind::WrongPolarity,
            Self::DanglingReference { .. } => ErrorKind::DanglingReference,
            Self::StructuralMismatch { .. } => ErrorKind::StructuralMismatch,
            Self::NotIsolated { .. } => ErrorKind::NotIsolated,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
        }
    }

    /// Whether this is an internal fault rather than a rejected request.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }

    pub(crate) fn malformed(element: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::MalformedEntity {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(rule: Rule, elements: Vec<ElementId>, detail: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            rule,
            elements,
            detail: detail.into(),
        }
    }

    pub(crate) fn dangling(
        element: ElementId,
        referenced_by: ElementId,
        detail: impl Into<String>,
    ) -> Self {
        Self::DanglingReference {
            element,
            referenced_by,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_kind_matches_variant() {
        let err = EgiError::NotFound(ElementId::Vertex(VertexId::new(Uuid::from_u128(1))));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_internal());

        let fault = EgiError::InvariantViolation { detail: "x".into() };
        assert!(fault.is_internal());
    }

    #[test]
    fn test_messages_name_offending_ids() {
        let vertex = VertexId::new(Uuid::from_u128(5));
        let err = EgiError::NotIsolated {
            vertex,
            incident_edges: vec![EdgeId::new(Uuid::from_u128(6))],
        };
        let message = err.to_string();
        assert!(message.contains(&vertex.to_string()));
        assert!(message.contains("1 incident edge"));
    }
}
