//! The Existential Graph Instance container.
//!
//! An [`Egi`] is immutable. Its entity tables are `Arc`-shared maps of
//! `Arc`-shared entities, so a transformation clones only the tables and
//! entities it touches; every other table and entity is shared with the
//! snapshot it was derived from. Holding an old snapshot is always safe.
//!
//! The only writers are [`crate::EgiBuilder`] and the rules in
//! [`crate::calculus`]. Both work on a crate-private [`Draft`] whose
//! [`Draft::finish`] runs the invariant validator before a new `Egi` exists.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::canonical::canonical_hash_hex;
use crate::error::EgiError;
use crate::invariants;
use crate::ligature::LigatureIndex;
use crate::selection::{Closure, Selection};
use crate::types::{
    Alphabet, Context, ContextId, Edge, EdgeId, ElementId, IdGenerator, Polarity, Vertex, VertexId,
};

/// Shared, copy-on-write entity table.
pub(crate) type Table<K, V> = Arc<BTreeMap<K, Arc<V>>>;

/// The three entity tables of a graph.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub vertices: Table<VertexId, Vertex>,
    pub edges: Table<EdgeId, Edge>,
    pub contexts: Table<ContextId, Context>,
}

/// Derived lookup structures, built lazily once per graph value.
#[derive(Debug)]
pub struct GraphIndex {
    ligatures: LigatureIndex,
    incidence: BTreeMap<VertexId, Vec<EdgeId>>,
}

impl GraphIndex {
    fn build(tables: &Tables) -> Self {
        let ligatures = LigatureIndex::build(
            tables.vertices.keys().copied(),
            tables.edges.values().map(|e| e.as_ref()),
        );
        let mut incidence: BTreeMap<VertexId, Vec<EdgeId>> = BTreeMap::new();
        for edge in tables.edges.values() {
            for arg in &edge.args {
                let list = incidence.entry(*arg).or_default();
                if !list.contains(&edge.id) {
                    list.push(edge.id);
                }
            }
        }
        Self {
            ligatures,
            incidence,
        }
    }

    /// Ligature index of the graph.
    pub fn ligatures(&self) -> &LigatureIndex {
        &self.ligatures
    }

    /// Edges referencing `vertex`, in id order.
    pub fn incident(&self, vertex: VertexId) -> &[EdgeId] {
        self.incidence.get(&vertex).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// An immutable Existential Graph Instance.
#[derive(Debug, Clone)]
pub struct Egi {
    tables: Tables,
    root: ContextId,
    alphabet: Arc<Alphabet>,
    ids: IdGenerator,
    index: OnceLock<Arc<GraphIndex>>,
}

impl Egi {
    /// The empty graph: a blank sheet of assertion.
    pub fn empty() -> Self {
        let mut ids = IdGenerator::new();
        let root = ids.context();
        let mut contexts = BTreeMap::new();
        contexts.insert(root, Arc::new(Context::sheet(root)));
        Self {
            tables: Tables {
                contexts: Arc::new(contexts),
                ..Tables::default()
            },
            root,
            alphabet: Arc::new(Alphabet::open()),
            ids,
            index: OnceLock::new(),
        }
    }

    /// Resolve a vertex.
    pub fn vertex(&self, id: VertexId) -> Result<&Vertex, EgiError> {
        self.tables
            .vertices
            .get(&id)
            .map(Arc::as_ref)
            .ok_or(EgiError::NotFound(ElementId::Vertex(id)))
    }

    /// Resolve an edge.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge, EgiError> {
        self.tables
            .edges
            .get(&id)
            .map(Arc::as_ref)
            .ok_or(EgiError::NotFound(ElementId::Edge(id)))
    }

    /// Resolve a context.
    pub fn context(&self, id: ContextId) -> Result<&Context, EgiError> {
        self.tables
            .contexts
            .get(&id)
            .map(Arc::as_ref)
            .ok_or(EgiError::NotFound(ElementId::Context(id)))
    }

    /// Id of the sheet of assertion.
    pub fn root_id(&self) -> ContextId {
        self.root
    }

    /// The sheet of assertion.
    pub fn sheet(&self) -> &Context {
        // The validator guarantees the root is present.
        &self.tables.contexts[&self.root]
    }

    /// All vertices, in id order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.tables.vertices.values().map(Arc::as_ref)
    }

    /// All edges, in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.tables.edges.values().map(Arc::as_ref)
    }

    /// All contexts including the sheet, in id order.
    pub fn contexts(&self) -> impl Iterator<Item = &Context> {
        self.tables.contexts.values().map(Arc::as_ref)
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.tables.vertices.len()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.tables.edges.len()
    }

    /// Number of contexts including the sheet.
    pub fn num_contexts(&self) -> usize {
        self.tables.contexts.len()
    }

    /// Number of elements that live in some area (everything but the sheet).
    pub fn num_elements(&self) -> usize {
        self.num_vertices() + self.num_edges() + self.num_contexts() - 1
    }

    /// The graph's alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Generator state that the next transformation will mint from.
    pub fn id_generator(&self) -> IdGenerator {
        self.ids
    }

    /// Whether `element` exists in this graph.
    pub fn contains(&self, element: ElementId) -> bool {
        match element {
            ElementId::Vertex(id) => self.tables.vertices.contains_key(&id),
            ElementId::Edge(id) => self.tables.edges.contains_key(&id),
            ElementId::Context(id) => self.tables.contexts.contains_key(&id),
        }
    }

    /// Context whose area holds `element`; `None` for the sheet.
    pub fn owner(&self, element: ElementId) -> Result<Option<ContextId>, EgiError> {
        match element {
            ElementId::Vertex(id) => Ok(Some(self.vertex(id)?.context)),
            ElementId::Edge(id) => Ok(Some(self.edge(id)?.context)),
            ElementId::Context(id) => Ok(self.context(id)?.parent),
        }
    }

    /// Polarity of a context.
    pub fn polarity(&self, context: ContextId) -> Result<Polarity, EgiError> {
        Ok(self.context(context)?.polarity())
    }

    /// Contexts from `context` up to the sheet, both inclusive.
    pub fn path_to_root(&self, context: ContextId) -> Result<Vec<ContextId>, EgiError> {
        let mut path = Vec::new();
        let mut current = Some(context);
        while let Some(id) = current {
            let ctx = self.context(id)?;
            path.push(id);
            current = ctx.parent;
        }
        Ok(path)
    }

    /// Whether `ancestor` encloses `context` or is the same context.
    pub fn is_ancestor_or_self(&self, ancestor: ContextId, context: ContextId) -> Result<bool, EgiError> {
        self.context(ancestor)?;
        Ok(self.path_to_root(context)?.contains(&ancestor))
    }

    /// Cached derived indexes.
    pub fn index(&self) -> &GraphIndex {
        self.index
            .get_or_init(|| Arc::new(GraphIndex::build(&self.tables)))
    }

    /// Ligature index of this graph.
    pub fn ligatures(&self) -> &LigatureIndex {
        self.index().ligatures()
    }

    /// Vertices on the same line of identity as `vertex`, itself included.
    pub fn ligature(&self, vertex: VertexId) -> Result<BTreeSet<VertexId>, EgiError> {
        self.vertex(vertex)?;
        Ok(self
            .ligatures()
            .class_of(vertex)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([vertex])))
    }

    /// Whether two vertices lie on the same line of identity.
    pub fn same_ligature(&self, a: VertexId, b: VertexId) -> bool {
        self.ligatures().same_class(a, b)
    }

    /// Edges anywhere in the graph that reference `vertex`.
    pub fn incident_edges(&self, vertex: VertexId) -> Result<Vec<EdgeId>, EgiError> {
        self.vertex(vertex)?;
        Ok(self.index().incident(vertex).to_vec())
    }

    /// `selection` plus everything nested inside its cuts.
    pub fn closure(&self, selection: &Selection) -> Result<Closure, EgiError> {
        Closure::new(self, selection)
    }

    /// Run the full invariant validator against this graph.
    pub fn check_invariants(&self) -> Result<(), EgiError> {
        invariants::validate(&self.tables, self.root)
    }

    /// Id-based content fingerprint (xxh64 hex).
    ///
    /// Two graphs share a fingerprint only if they have the same elements
    /// under the same ids. For an id-independent comparison use
    /// [`crate::equivalence::shape_fingerprint`].
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct FingerprintInput<'a> {
            root: ContextId,
            contexts: Vec<(ContextId, Option<ContextId>, u32)>,
            vertices: Vec<(VertexId, ContextId, Option<&'a str>)>,
            edges: Vec<(EdgeId, ContextId, &'a str, &'a [VertexId])>,
        }

        let input = FingerprintInput {
            root: self.root,
            contexts: self.contexts().map(|c| (c.id, c.parent, c.depth)).collect(),
            vertices: self.vertices().map(|v| (v.id, v.context, v.name())).collect(),
            edges: self
                .edges()
                .map(|e| (e.id, e.context, e.relation.as_str(), e.args.as_slice()))
                .collect(),
        };
        canonical_hash_hex(&input)
    }

    /// Whether two snapshots share the same underlying tables.
    pub fn shares_tables_with(&self, other: &Egi) -> bool {
        Arc::ptr_eq(&self.tables.vertices, &other.tables.vertices)
            && Arc::ptr_eq(&self.tables.edges, &other.tables.edges)
            && Arc::ptr_eq(&self.tables.contexts, &other.tables.contexts)
    }

    pub(crate) fn tables(&self) -> &Tables {
        &self.tables
    }
}

impl Default for Egi {
    fn default() -> Self {
        Self::empty()
    }
}

/// Mutable working copy used by the builder and by rule effects.
///
/// A draft never escapes as a graph unless [`Draft::finish`] validates it.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    tables: Tables,
    root: ContextId,
    alphabet: Arc<Alphabet>,
    ids: IdGenerator,
}

impl Draft {
    /// Draft holding only a sheet with the given id.
    pub fn with_root(root: ContextId, ids: IdGenerator, alphabet: Alphabet) -> Self {
        let mut contexts = BTreeMap::new();
        contexts.insert(root, Arc::new(Context::sheet(root)));
        Self {
            tables: Tables {
                contexts: Arc::new(contexts),
                ..Tables::default()
            },
            root,
            alphabet: Arc::new(alphabet),
            ids,
        }
    }

    /// Draft sharing every table of `egi`.
    pub fn from_egi(egi: &Egi) -> Self {
        Self {
            tables: egi.tables.clone(),
            root: egi.root,
            alphabet: Arc::clone(&egi.alphabet),
            ids: egi.ids,
        }
    }

    pub fn root(&self) -> ContextId {
        self.root
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn alphabet_mut(&mut self) -> &mut Alphabet {
        Arc::make_mut(&mut self.alphabet)
    }

    pub fn context(&self, id: ContextId) -> Result<&Context, EgiError> {
        self.tables
            .contexts
            .get(&id)
            .map(Arc::as_ref)
            .ok_or(EgiError::NotFound(ElementId::Context(id)))
    }

    pub fn vertex(&self, id: VertexId) -> Result<&Vertex, EgiError> {
        self.tables
            .vertices
            .get(&id)
            .map(Arc::as_ref)
            .ok_or(EgiError::NotFound(ElementId::Vertex(id)))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge, EgiError> {
        self.tables
            .edges
            .get(&id)
            .map(Arc::as_ref)
            .ok_or(EgiError::NotFound(ElementId::Edge(id)))
    }

    /// Whether `ancestor` is `context` or encloses it.
    pub fn is_ancestor_or_self(&self, ancestor: ContextId, context: ContextId) -> Result<bool, EgiError> {
        let mut current = Some(context);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.context(id)?.parent;
        }
        Ok(false)
    }

    fn context_mut(&mut self, id: ContextId) -> Result<&mut Context, EgiError> {
        Arc::make_mut(&mut self.tables.contexts)
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or(EgiError::NotFound(ElementId::Context(id)))
    }

    /// Add an empty cut with the given id inside `parent`.
    pub fn add_cut(&mut self, id: ContextId, parent: ContextId) -> Result<(), EgiError> {
        let cut = Context::cut(id, self.context(parent)?);
        self.ensure_fresh(ElementId::Context(id))?;
        Arc::make_mut(&mut self.tables.contexts).insert(id, Arc::new(cut));
        self.context_mut(parent)?.area.insert(ElementId::Context(id));
        Ok(())
    }

    /// Add a vertex to the area named by `vertex.context`.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<(), EgiError> {
        self.context(vertex.context)?;
        self.ensure_fresh(ElementId::Vertex(vertex.id))?;
        let (id, context) = (vertex.id, vertex.context);
        Arc::make_mut(&mut self.tables.vertices).insert(id, Arc::new(vertex));
        self.context_mut(context)?.area.insert(ElementId::Vertex(id));
        Ok(())
    }

    /// Add an edge to the area named by `edge.context`.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), EgiError> {
        self.context(edge.context)?;
        self.ensure_fresh(ElementId::Edge(edge.id))?;
        let (id, context) = (edge.id, edge.context);
        Arc::make_mut(&mut self.tables.edges).insert(id, Arc::new(edge));
        self.context_mut(context)?.area.insert(ElementId::Edge(id));
        Ok(())
    }

    fn ensure_fresh(&self, element: ElementId) -> Result<(), EgiError> {
        let taken = match element {
            ElementId::Vertex(id) => self.tables.vertices.contains_key(&id),
            ElementId::Edge(id) => self.tables.edges.contains_key(&id),
            ElementId::Context(id) => self.tables.contexts.contains_key(&id),
        };
        if taken {
            return Err(EgiError::malformed(element, "identifier already in use"));
        }
        Ok(())
    }

    fn owner(&self, element: ElementId) -> Result<Option<ContextId>, EgiError> {
        match element {
            ElementId::Vertex(id) => Ok(Some(self.vertex(id)?.context)),
            ElementId::Edge(id) => Ok(Some(self.edge(id)?.context)),
            ElementId::Context(id) => Ok(self.context(id)?.parent),
        }
    }

    /// Remove one element and unlink it from its owner's area.
    ///
    /// Removing a cut does not remove its contents; callers remove the
    /// whole closure.
    pub fn remove(&mut self, element: ElementId) -> Result<(), EgiError> {
        let owner = self.owner(element)?;
        match element {
            ElementId::Vertex(id) => {
                Arc::make_mut(&mut self.tables.vertices).remove(&id);
            }
            ElementId::Edge(id) => {
                Arc::make_mut(&mut self.tables.edges).remove(&id);
            }
            ElementId::Context(id) => {
                Arc::make_mut(&mut self.tables.contexts).remove(&id);
            }
        }
        if let Some(owner) = owner {
            if self.tables.contexts.contains_key(&owner) {
                self.context_mut(owner)?.area.remove(&element);
            }
        }
        Ok(())
    }

    /// Move an element into the area of `to`, keeping its id.
    ///
    /// Moving a cut recomputes the depth of its whole subtree.
    pub fn relocate(&mut self, element: ElementId, to: ContextId) -> Result<(), EgiError> {
        self.context(to)?;
        if let Some(from) = self.owner(element)? {
            self.context_mut(from)?.area.remove(&element);
        }
        match element {
            ElementId::Vertex(id) => {
                let vertex = Arc::make_mut(&mut self.tables.vertices)
                    .get_mut(&id)
                    .map(Arc::make_mut)
                    .ok_or(EgiError::NotFound(element))?;
                vertex.context = to;
            }
            ElementId::Edge(id) => {
                let edge = Arc::make_mut(&mut self.tables.edges)
                    .get_mut(&id)
                    .map(Arc::make_mut)
                    .ok_or(EgiError::NotFound(element))?;
                edge.context = to;
            }
            ElementId::Context(id) => {
                self.context_mut(id)?.parent = Some(to);
                self.refresh_depths(id)?;
            }
        }
        self.context_mut(to)?.area.insert(element);
        Ok(())
    }

    /// Recompute depths for `context` and everything below it from its parent.
    fn refresh_depths(&mut self, context: ContextId) -> Result<(), EgiError> {
        let mut stack = vec![context];
        while let Some(id) = stack.pop() {
            let depth = match self.context(id)?.parent {
                Some(parent) => self.context(parent)?.depth + 1,
                None => 0,
            };
            let ctx = self.context_mut(id)?;
            ctx.depth = depth;
            stack.extend(ctx.child_cuts());
        }
        Ok(())
    }

    /// Validate without consuming the draft.
    pub fn check(&self) -> Result<(), EgiError> {
        invariants::validate(&self.tables, self.root)
    }

    /// Validate and freeze into a graph.
    pub fn finish(self) -> Result<Egi, EgiError> {
        invariants::validate(&self.tables, self.root)?;
        Ok(Egi {
            tables: self.tables,
            root: self.root,
            alphabet: self.alphabet,
            ids: self.ids,
            index: OnceLock::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EgiBuilder;

    #[test]
    fn test_empty_graph_is_valid() {
        let egi = Egi::empty();
        assert!(egi.check_invariants().is_ok());
        assert_eq!(egi.num_elements(), 0);
        assert_eq!(egi.polarity(egi.root_id()).unwrap(), Polarity::Positive);
    }

    #[test]
    fn test_lookup_missing_is_not_found() {
        let egi = Egi::empty();
        let mut ids = IdGenerator::with_namespace(99);
        let missing = ids.vertex();
        assert_eq!(egi.vertex(missing).unwrap_err(), EgiError::NotFound(missing.into()));
    }

    #[test]
    fn test_path_to_root_walks_upwards() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let outer = b.add_cut(sheet).unwrap();
        let inner = b.add_cut(outer).unwrap();
        let egi = b.build().unwrap();

        assert_eq!(egi.path_to_root(inner).unwrap(), vec![inner, outer, sheet]);
        assert!(egi.is_ancestor_or_self(outer, inner).unwrap());
        assert!(!egi.is_ancestor_or_self(inner, outer).unwrap());
    }

    #[test]
    fn test_ligature_and_incidence() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let x = b.add_vertex(sheet).unwrap();
        let y = b.add_vertex(sheet).unwrap();
        let z = b.add_vertex(sheet).unwrap();
        let p = b.add_edge(sheet, "P", vec![x]).unwrap();
        let eq = b.add_identity(sheet, vec![x, y]).unwrap();
        let egi = b.build().unwrap();

        assert_eq!(egi.ligature(y).unwrap(), BTreeSet::from([x, y]));
        assert!(!egi.same_ligature(x, z));
        assert_eq!(egi.incident_edges(x).unwrap(), {
            let mut v = vec![p, eq];
            v.sort();
            v
        });
        assert!(egi.incident_edges(z).unwrap().is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let build = || {
            let mut b = EgiBuilder::new();
            let sheet = b.sheet();
            let x = b.add_vertex(sheet).unwrap();
            b.add_edge(sheet, "P", vec![x]).unwrap();
            b.build().unwrap()
        };
        assert_eq!(build().fingerprint(), build().fingerprint());
    }
}
