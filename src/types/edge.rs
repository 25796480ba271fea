//! Edges: relation occurrences over an ordered tuple of vertices.

use serde::{Deserialize, Serialize};

use super::ids::{ContextId, EdgeId, VertexId};
use crate::error::EgiError;

/// Name of the distinguished identity relation.
///
/// An edge with this relation is a segment of a line of identity.
pub const IDENTITY_RELATION: &str = "=";

/// A relation applied to an ordered sequence of vertices.
///
/// Arity is the length of `args`; arity 0 is a bare proposition letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Edge identifier.
    pub id: EdgeId,
    /// Owning context.
    pub context: ContextId,
    /// Relation name.
    pub relation: String,
    /// Argument vertices, in order.
    pub args: Vec<VertexId>,
    /// Whether this is an identity edge.
    pub identity: bool,
}

impl Edge {
    /// Create an edge. Identity is inferred from the relation name.
    pub fn new(
        id: EdgeId,
        context: ContextId,
        relation: impl Into<String>,
        args: Vec<VertexId>,
    ) -> Result<Self, EgiError> {
        let relation = relation.into();
        if relation.trim().is_empty() {
            return Err(EgiError::malformed(id, "relation name must not be empty"));
        }
        let identity = relation == IDENTITY_RELATION;
        if identity && args.len() < 2 {
            return Err(EgiError::malformed(
                id,
                format!("identity edge needs at least 2 arguments, got {}", args.len()),
            ));
        }
        Ok(Self {
            id,
            context,
            relation,
            args,
            identity,
        })
    }

    /// Create an identity edge joining `args`.
    pub fn identity(id: EdgeId, context: ContextId, args: Vec<VertexId>) -> Result<Self, EgiError> {
        Self::new(id, context, IDENTITY_RELATION, args)
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Whether `vertex` occurs among the arguments.
    pub fn references(&self, vertex: VertexId) -> bool {
        self.args.contains(&vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn v(n: u128) -> VertexId {
        VertexId::new(Uuid::from_u128(n))
    }

    #[test]
    fn test_identity_inferred_from_relation() {
        let e = Edge::new(EdgeId::new(Uuid::from_u128(1)), ContextId::new(Uuid::from_u128(0)), "=", vec![v(2), v(3)]).unwrap();
        assert!(e.identity);
        assert_eq!(e.arity(), 2);
    }

    #[test]
    fn test_identity_requires_two_args() {
        let err = Edge::identity(EdgeId::new(Uuid::from_u128(1)), ContextId::new(Uuid::from_u128(0)), vec![v(2)]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedEntity);
    }

    #[test]
    fn test_nullary_relation_allowed() {
        let e = Edge::new(EdgeId::new(Uuid::from_u128(1)), ContextId::new(Uuid::from_u128(0)), "Rain", vec![]).unwrap();
        assert!(!e.identity);
        assert_eq!(e.arity(), 0);
        assert!(!e.references(v(2)));
    }
}
