//! Incremental construction of graphs.
//!
//! The builder starts from a single sheet of assertion and adds cuts,
//! vertices and edges one step at a time. Each step is checked locally
//! (ids resolve, names are admitted, arguments are in scope) and then the
//! full invariant validator runs, so a builder never holds an ill-formed
//! draft. [`EgiBuilder::build`] freezes the result into an immutable [`Egi`].
//!
//! [`ConstructionStep`] is the serializable form of the same calls. An
//! external formula parser emits a sequence of steps; replaying them through
//! [`EgiBuilder::from_steps`] yields the graph.

use serde::{Deserialize, Serialize};

use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::types::{
    Alphabet, ContextId, Edge, EdgeId, ElementId, IdGenerator, Vertex, VertexId,
};

/// Reference to the sheet or to the result of an earlier step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRef {
    /// The sheet of assertion.
    Sheet,
    /// The element produced by the step at this index.
    Step(usize),
}

/// One construction call, as emitted by a formula parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConstructionStep {
    /// Add a cut inside `parent`.
    Cut {
        /// Enclosing context.
        parent: StepRef,
    },
    /// Add a variable vertex.
    Vertex {
        /// Owning context.
        context: StepRef,
    },
    /// Add a constant vertex.
    Constant {
        /// Owning context.
        context: StepRef,
        /// Constant name.
        name: String,
    },
    /// Add a relation edge.
    Edge {
        /// Owning context.
        context: StepRef,
        /// Relation name.
        relation: String,
        /// Argument vertices.
        args: Vec<StepRef>,
    },
    /// Add an identity edge.
    Identity {
        /// Owning context.
        context: StepRef,
        /// Joined vertices.
        args: Vec<StepRef>,
    },
}

/// Step-by-step graph builder.
#[derive(Debug, Clone)]
pub struct EgiBuilder {
    draft: Draft,
    results: Vec<ElementId>,
}

impl EgiBuilder {
    /// Builder with a fresh default generator and an open alphabet.
    pub fn new() -> Self {
        Self::with_generator(IdGenerator::new())
    }

    /// Builder minting ids from `ids`.
    pub fn with_generator(mut ids: IdGenerator) -> Self {
        let root = ids.context();
        Self {
            draft: Draft::with_root(root, ids, Alphabet::open()),
            results: Vec::new(),
        }
    }

    /// Builder whose sheet has a fixed id (used when importing documents).
    pub(crate) fn with_root(root: ContextId, ids: IdGenerator, alphabet: Alphabet) -> Self {
        Self {
            draft: Draft::with_root(root, ids, alphabet),
            results: Vec::new(),
        }
    }

    /// Use `alphabet` for every subsequent step.
    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        *self.draft.alphabet_mut() = alphabet;
        self
    }

    /// Replay a full construction sequence.
    pub fn from_steps(steps: &[ConstructionStep]) -> Result<Egi, EgiError> {
        let mut builder = Self::new();
        for step in steps {
            builder.apply(step)?;
        }
        builder.build()
    }

    /// Id of the sheet of assertion.
    pub fn sheet(&self) -> ContextId {
        self.draft.root()
    }

    /// Add a cut inside `parent`.
    pub fn add_cut(&mut self, parent: ContextId) -> Result<ContextId, EgiError> {
        let id = self.draft.ids_mut().context();
        self.add_cut_with_id(id, parent)?;
        Ok(id)
    }

    pub(crate) fn add_cut_with_id(&mut self, id: ContextId, parent: ContextId) -> Result<(), EgiError> {
        self.draft.add_cut(id, parent)?;
        self.draft.check()
    }

    /// Add a variable vertex to `context`.
    pub fn add_vertex(&mut self, context: ContextId) -> Result<VertexId, EgiError> {
        let id = self.draft.ids_mut().vertex();
        self.insert_vertex(Vertex::variable(id, context))?;
        Ok(id)
    }

    /// Add a constant vertex named `name` to `context`.
    pub fn add_constant(&mut self, context: ContextId, name: &str) -> Result<VertexId, EgiError> {
        let id = self.draft.ids_mut().vertex();
        self.insert_vertex(Vertex::constant(id, context, name)?)?;
        Ok(id)
    }

    pub(crate) fn insert_vertex(&mut self, vertex: Vertex) -> Result<(), EgiError> {
        self.draft.context(vertex.context)?;
        if let Some(name) = vertex.name() {
            self.draft.alphabet_mut().admit_constant(name)?;
        }
        self.draft.add_vertex(vertex)?;
        self.draft.check()
    }

    /// Add an edge `relation(args)` to `context`.
    pub fn add_edge(
        &mut self,
        context: ContextId,
        relation: &str,
        args: Vec<VertexId>,
    ) -> Result<EdgeId, EgiError> {
        let id = self.draft.ids_mut().edge();
        self.insert_edge(Edge::new(id, context, relation, args)?)?;
        Ok(id)
    }

    /// Add an identity edge joining `args` in `context`.
    pub fn add_identity(&mut self, context: ContextId, args: Vec<VertexId>) -> Result<EdgeId, EgiError> {
        let id = self.draft.ids_mut().edge();
        self.insert_edge(Edge::identity(id, context, args)?)?;
        Ok(id)
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) -> Result<(), EgiError> {
        self.draft.context(edge.context)?;
        for arg in &edge.args {
            let vertex = self.draft.vertex(*arg)?;
            if !self.draft.is_ancestor_or_self(vertex.context, edge.context)? {
                return Err(EgiError::malformed(
                    edge.id,
                    format!("argument {arg} is not in scope of {}", edge.context),
                ));
            }
        }
        self.draft.alphabet_mut().admit_relation(&edge.relation, edge.arity())?;
        self.draft.add_edge(edge)?;
        self.draft.check()
    }

    /// Execute one construction step and return the element it created.
    pub fn apply(&mut self, step: &ConstructionStep) -> Result<ElementId, EgiError> {
        let created = match step {
            ConstructionStep::Cut { parent } => {
                let parent = self.resolve_context(*parent)?;
                ElementId::Context(self.add_cut(parent)?)
            }
            ConstructionStep::Vertex { context } => {
                let context = self.resolve_context(*context)?;
                ElementId::Vertex(self.add_vertex(context)?)
            }
            ConstructionStep::Constant { context, name } => {
                let context = self.resolve_context(*context)?;
                ElementId::Vertex(self.add_constant(context, name)?)
            }
            ConstructionStep::Edge {
                context,
                relation,
                args,
            } => {
                let context = self.resolve_context(*context)?;
                let args = self.resolve_vertices(args)?;
                ElementId::Edge(self.add_edge(context, relation, args)?)
            }
            ConstructionStep::Identity { context, args } => {
                let context = self.resolve_context(*context)?;
                let args = self.resolve_vertices(args)?;
                ElementId::Edge(self.add_identity(context, args)?)
            }
        };
        self.results.push(created);
        Ok(created)
    }

    fn resolve(&self, reference: StepRef) -> Result<ElementId, EgiError> {
        match reference {
            StepRef::Sheet => Ok(ElementId::Context(self.draft.root())),
            StepRef::Step(index) => self.results.get(index).copied().ok_or_else(|| {
                EgiError::malformed(
                    format!("step {index}"),
                    format!("only {} steps have run", self.results.len()),
                )
            }),
        }
    }

    fn resolve_context(&self, reference: StepRef) -> Result<ContextId, EgiError> {
        let element = self.resolve(reference)?;
        element
            .as_context()
            .ok_or_else(|| EgiError::malformed(element, "expected a context reference"))
    }

    fn resolve_vertices(&self, references: &[StepRef]) -> Result<Vec<VertexId>, EgiError> {
        references
            .iter()
            .map(|r| {
                let element = self.resolve(*r)?;
                element
                    .as_vertex()
                    .ok_or_else(|| EgiError::malformed(element, "expected a vertex reference"))
            })
            .collect()
    }

    /// Freeze the graph.
    pub fn build(self) -> Result<Egi, EgiError> {
        self.draft.finish()
    }
}

impl Default for EgiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_produces_valid_graph() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let cut = b.add_cut(sheet).unwrap();
        let x = b.add_vertex(cut).unwrap();
        b.add_edge(cut, "Man", vec![x]).unwrap();
        let egi = b.build().unwrap();

        assert_eq!(egi.num_contexts(), 2);
        assert_eq!(egi.num_vertices(), 1);
        assert_eq!(egi.num_edges(), 1);
        assert!(egi.sheet().contains(&ElementId::Context(cut)));
        assert!(egi.check_invariants().is_ok());
    }

    #[test]
    fn test_edge_argument_must_be_in_scope() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let cut = b.add_cut(sheet).unwrap();
        let inner = b.add_vertex(cut).unwrap();
        let err = b.add_edge(sheet, "P", vec![inner]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEntity);
    }

    #[test]
    fn test_unknown_vertex_is_not_found() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let stray = IdGenerator::with_namespace(42).vertex();
        let err = b.add_edge(sheet, "P", vec![stray]).unwrap_err();
        assert_eq!(err, EgiError::NotFound(ElementId::Vertex(stray)));
    }

    #[test]
    fn test_strict_alphabet_is_enforced() {
        let alphabet = Alphabet::strict().with_relation("Man", Some(1)).unwrap();
        let mut b = EgiBuilder::new().with_alphabet(alphabet);
        let sheet = b.sheet();
        let x = b.add_vertex(sheet).unwrap();
        assert!(b.add_edge(sheet, "Man", vec![x]).is_ok());
        assert_eq!(
            b.add_edge(sheet, "Mortal", vec![x]).unwrap_err().kind(),
            ErrorKind::MalformedEntity
        );
        assert!(b.add_constant(sheet, "Socrates").is_err());
    }

    #[test]
    fn test_identical_sequences_are_reproducible() {
        let steps = vec![
            ConstructionStep::Cut { parent: StepRef::Sheet },
            ConstructionStep::Vertex { context: StepRef::Step(0) },
            ConstructionStep::Edge {
                context: StepRef::Step(0),
                relation: "Man".into(),
                args: vec![StepRef::Step(1)],
            },
        ];
        let a = EgiBuilder::from_steps(&steps).unwrap();
        let b = EgiBuilder::from_steps(&steps).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_step_reference_kinds_are_checked() {
        let steps = vec![
            ConstructionStep::Vertex { context: StepRef::Sheet },
            ConstructionStep::Cut { parent: StepRef::Step(0) },
        ];
        let err = EgiBuilder::from_steps(&steps).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEntity);

        let dangling = vec![ConstructionStep::Vertex { context: StepRef::Step(3) }];
        assert!(EgiBuilder::from_steps(&dangling).is_err());
    }

    #[test]
    fn test_steps_deserialize_from_json() {
        let json = r#"[
            {"op": "cut", "parent": "sheet"},
            {"op": "constant", "context": {"step": 0}, "name": "Socrates"},
            {"op": "edge", "context": {"step": 0}, "relation": "Mortal", "args": [{"step": 1}]}
        ]"#;
        let steps: Vec<ConstructionStep> = serde_json::from_str(json).unwrap();
        let egi = EgiBuilder::from_steps(&steps).unwrap();
        assert!(egi.alphabet().has_constant("Socrates"));
        assert_eq!(egi.num_edges(), 1);
    }
}
