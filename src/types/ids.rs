//! Identifier space for vertices, edges and contexts.
//!
//! Identifiers are opaque UUID wrappers. They are minted by an explicit
//! [`IdGenerator`] value rather than ambient state, so replaying the same
//! construction sequence from the same generator yields the same ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a vertex (an individual: bound variable or named constant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(Uuid);

/// Identifier of an edge (an atomic relation occurrence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(Uuid);

/// Identifier of a context (the sheet of assertion or a cut).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl VertexId {
    /// Wrap an existing UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl EdgeId {
    /// Wrap an existing UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl ContextId {
    /// Wrap an existing UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v:{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e:{}", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c:{}", self.0)
    }
}

/// Any element that can sit in a context's area.
///
/// Ordering is by kind first (vertices, then edges, then contexts), then by id,
/// which keeps area iteration deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementId {
    /// A vertex.
    Vertex(VertexId),
    /// An edge.
    Edge(EdgeId),
    /// A child context (cut).
    Context(ContextId),
}

impl ElementId {
    /// The vertex id, if this element is a vertex.
    pub fn as_vertex(&self) -> Option<VertexId> {
        match self {
            Self::Vertex(id) => Some(*id),
            _ => None,
        }
    }

    /// The edge id, if this element is an edge.
    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Self::Edge(id) => Some(*id),
            _ => None,
        }
    }

    /// The context id, if this element is a cut.
    pub fn as_context(&self) -> Option<ContextId> {
        match self {
            Self::Context(id) => Some(*id),
            _ => None,
        }
    }

    /// The raw UUID regardless of kind.
    pub fn as_uuid(&self) -> Uuid {
        match self {
            Self::Vertex(id) => id.as_uuid(),
            Self::Edge(id) => id.as_uuid(),
            Self::Context(id) => id.as_uuid(),
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex(id) => id.fmt(f),
            Self::Edge(id) => id.fmt(f),
            Self::Context(id) => id.fmt(f),
        }
    }
}

impl From<VertexId> for ElementId {
    fn from(id: VertexId) -> Self {
        Self::Vertex(id)
    }
}

impl From<EdgeId> for ElementId {
    fn from(id: EdgeId) -> Self {
        Self::Edge(id)
    }
}

impl From<ContextId> for ElementId {
    fn from(id: ContextId) -> Self {
        Self::Context(id)
    }
}

/// Deterministic identifier generator.
///
/// Ids are `Uuid::from_u128(next)` with `next` strictly increasing, so every
/// id minted by one generator is unique. One generator is shared by all three
/// id kinds. The generator is a plain value: it is threaded through the
/// builder and carried inside each graph, never held in global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u128,
}

impl IdGenerator {
    /// Generator starting at the first id of namespace zero.
    pub fn new() -> Self {
        Self::with_namespace(0)
    }

    /// Generator whose ids carry `namespace` in their upper 64 bits.
    ///
    /// Graphs built from distinct namespaces never share ids.
    pub fn with_namespace(namespace: u64) -> Self {
        Self {
            next: ((namespace as u128) << 64) | 1,
        }
    }

    /// Generator that continues after the highest of `ids`.
    ///
    /// Used when importing graphs whose ids were minted elsewhere.
    pub fn resuming_after<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = Uuid>,
    {
        let max = ids.into_iter().map(|u| u.as_u128()).max().unwrap_or(0);
        Self {
            next: max.saturating_add(1),
        }
    }

    /// Raw value of the next id to be minted.
    pub fn peek(&self) -> u128 {
        self.next
    }

    fn mint(&mut self) -> Uuid {
        let id = Uuid::from_u128(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Mint a vertex id.
    pub fn vertex(&mut self) -> VertexId {
        VertexId(self.mint())
    }

    /// Mint an edge id.
    pub fn edge(&mut self) -> EdgeId {
        EdgeId(self.mint())
    }

    /// Mint a context id.
    pub fn context(&mut self) -> ContextId {
        ContextId(self.mint())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_reproducible() {
        let mut a = IdGenerator::new();
        let mut b = IdGenerator::new();
        assert_eq!(a.context(), b.context());
        assert_eq!(a.vertex(), b.vertex());
        assert_eq!(a.edge(), b.edge());
    }

    #[test]
    fn test_generator_ids_are_unique_across_kinds() {
        let mut ids = IdGenerator::new();
        let c = ids.context();
        let v = ids.vertex();
        let e = ids.edge();
        assert_ne!(c.as_uuid(), v.as_uuid());
        assert_ne!(v.as_uuid(), e.as_uuid());
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let mut a = IdGenerator::with_namespace(1);
        let mut b = IdGenerator::with_namespace(2);
        assert_ne!(a.vertex(), b.vertex());
    }

    #[test]
    fn test_resuming_after_skips_existing_ids() {
        let existing = [Uuid::from_u128(7), Uuid::from_u128(3)];
        let mut ids = IdGenerator::resuming_after(existing);
        assert_eq!(ids.vertex().as_uuid(), Uuid::from_u128(8));
    }

    #[test]
    fn test_element_ordering_groups_by_kind() {
        let v = ElementId::Vertex(VertexId::new(Uuid::from_u128(9)));
        let e = ElementId::Edge(EdgeId::new(Uuid::from_u128(1)));
        let c = ElementId::Context(ContextId::new(Uuid::from_u128(1)));
        assert!(v < e);
        assert!(e < c);
    }
}
