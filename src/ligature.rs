//! Ligature index: lines of identity as a union-find over vertices.
//!
//! A ligature is the equivalence class of vertices joined by identity edges
//! (a shared vertex is trivially one occurrence of its own line). The index
//! is built once per graph value and cached there, so legality checks that
//! consult ligatures stay linear in the size of the graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{Edge, VertexId};

/// Union-find with path halving, used only while building the index.
struct UnionFind {
    parent: HashMap<VertexId, VertexId>,
}

impl UnionFind {
    fn new(vertices: impl Iterator<Item = VertexId>) -> Self {
        Self {
            parent: vertices.map(|v| (v, v)).collect(),
        }
    }

    fn find(&mut self, mut v: VertexId) -> VertexId {
        loop {
            let p = match self.parent.get(&v) {
                Some(p) => *p,
                None => return v,
            };
            if p == v {
                return v;
            }
            let grand = self.parent.get(&p).copied().unwrap_or(p);
            self.parent.insert(v, grand);
            v = grand;
        }
    }

    fn union(&mut self, a: VertexId, b: VertexId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        // Keep the smaller id as root so representatives are canonical.
        if ra < rb {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(ra, rb);
        }
    }
}

/// Ligature membership of every vertex in a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LigatureIndex {
    representative: BTreeMap<VertexId, VertexId>,
    classes: BTreeMap<VertexId, BTreeSet<VertexId>>,
}

impl LigatureIndex {
    /// Build the index from all vertices and edges of a graph.
    ///
    /// Only identity edges join vertices; ordinary relations do not.
    pub fn build<'a>(
        vertices: impl Iterator<Item = VertexId>,
        edges: impl Iterator<Item = &'a Edge>,
    ) -> Self {
        let vertices: Vec<VertexId> = vertices.collect();
        let mut uf = UnionFind::new(vertices.iter().copied());

        for edge in edges.filter(|e| e.identity) {
            if let Some((first, rest)) = edge.args.split_first() {
                for other in rest {
                    uf.union(*first, *other);
                }
            }
        }

        let mut representative = BTreeMap::new();
        let mut classes: BTreeMap<VertexId, BTreeSet<VertexId>> = BTreeMap::new();
        for v in vertices {
            let rep = uf.find(v);
            representative.insert(v, rep);
            classes.entry(rep).or_default().insert(v);
        }

        Self {
            representative,
            classes,
        }
    }

    /// Canonical representative (smallest id) of the ligature containing `v`.
    pub fn representative(&self, v: VertexId) -> Option<VertexId> {
        self.representative.get(&v).copied()
    }

    /// All vertices in the ligature containing `v`.
    pub fn class_of(&self, v: VertexId) -> Option<&BTreeSet<VertexId>> {
        self.representative(v).and_then(|rep| self.classes.get(&rep))
    }

    /// Whether `a` and `b` lie on the same line of identity.
    pub fn same_class(&self, a: VertexId, b: VertexId) -> bool {
        match (self.representative(a), self.representative(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Every ligature, keyed by representative.
    pub fn classes(&self) -> impl Iterator<Item = (&VertexId, &BTreeSet<VertexId>)> {
        self.classes.iter()
    }

    /// Number of distinct ligatures.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
