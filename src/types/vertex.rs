//! Vertices: individuals denoted by bound variables or named constants.

use serde::{Deserialize, Serialize};

use super::ids::{ContextId, VertexId};
use crate::error::EgiError;

/// A vertex in an existential graph instance.
///
/// A vertex is owned by exactly one context. A constant vertex carries a
/// non-empty name; a variable vertex carries none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    /// Vertex identifier.
    pub id: VertexId,
    /// Owning context.
    pub context: ContextId,
    /// Constant name, present iff the vertex is a constant.
    pub constant: Option<String>,
}

impl Vertex {
    /// Create a vertex, checking the constant/name pairing.
    pub fn new(
        id: VertexId,
        context: ContextId,
        is_constant: bool,
        name: Option<String>,
    ) -> Result<Self, EgiError> {
        match (is_constant, name) {
            (true, Some(name)) if !name.trim().is_empty() => Ok(Self {
                id,
                context,
                constant: Some(name),
            }),
            (true, _) => Err(EgiError::malformed(id, "constant vertex requires a non-empty name")),
            (false, Some(_)) => Err(EgiError::malformed(id, "variable vertex must not carry a name")),
            (false, None) => Ok(Self {
                id,
                context,
                constant: None,
            }),
        }
    }

    /// Create a variable vertex.
    pub fn variable(id: VertexId, context: ContextId) -> Self {
        Self {
            id,
            context,
            constant: None,
        }
    }

    /// Create a constant vertex.
    pub fn constant(id: VertexId, context: ContextId, name: impl Into<String>) -> Result<Self, EgiError> {
        Self::new(id, context, true, Some(name.into()))
    }

    /// Whether this vertex denotes a named constant.
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    /// Constant name, if any.
    pub fn name(&self) -> Option<&str> {
        self.constant.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ids() -> (VertexId, ContextId) {
        (VertexId::new(Uuid::from_u128(2)), ContextId::new(Uuid::from_u128(1)))
    }

    #[test]
    fn test_constant_requires_name() {
        let (v, c) = ids();
        assert!(Vertex::new(v, c, true, None).is_err());
        assert!(Vertex::new(v, c, true, Some("  ".into())).is_err());
        assert!(Vertex::constant(v, c, "Socrates").unwrap().is_constant());
    }

    #[test]
    fn test_variable_rejects_name() {
        let (v, c) = ids();
        let err = Vertex::new(v, c, false, Some("x".into())).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedEntity);
        assert!(!Vertex::variable(v, c).is_constant());
    }
}
