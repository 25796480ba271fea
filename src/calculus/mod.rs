//! The transformation calculus: Peirce's beta rules as pure functions.
//!
//! Every rule is a legality predicate followed by an effect. The predicate
//! runs against the input graph and fails with a specific [`EgiError`]
//! before anything is copied; the effect works on a draft that shares every
//! untouched table with the input and is validated before it becomes a graph.
//! A failed rule therefore never produces a value and the input is left
//! exactly as it was.
//!
//! ## Rules
//!
//! | Rule | Where | Effect |
//! |---|---|---|
//! | Erasure | positive context | remove a selection and everything nested in it |
//! | Insertion | negative context | copy a finished fragment in with fresh ids |
//! | Iteration | same context or a descendant | copy a selection, joined to the original by identity edges |
//! | De-iteration | copy below its original | remove a structurally identical copy |
//! | Double-cut addition | anywhere | wrap a selection in two nested cuts |
//! | Double-cut removal | a ring | drop both cuts, promote the inner contents |
//! | Isolated-vertex addition | anywhere | add a vertex with no edges |
//! | Isolated-vertex removal | anywhere | drop a vertex with no edges |

mod config;
mod deiteration;
mod double_cut;
mod erasure;
mod insertion;
mod isolated;
mod iteration;

pub use config::{CalculusConfig, ENV_ALLOW_SAME_CONTEXT_DEITERATION};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::selection::Selection;
use crate::types::{ContextId, ElementId, VertexId};

/// The eight transformation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Remove a subgraph from a positive context.
    Erasure,
    /// Add a subgraph to a negative context.
    Insertion,
    /// Copy a subgraph into the same context or a descendant.
    Iteration,
    /// Remove a copy that matches an occurrence further out.
    Deiteration,
    /// Wrap a subgraph in two nested cuts.
    DoubleCutAddition,
    /// Remove a ring of two nested cuts.
    DoubleCutRemoval,
    /// Add a vertex with no incident edges.
    IsolatedVertexAddition,
    /// Remove a vertex with no incident edges.
    IsolatedVertexRemoval,
}

impl Rule {
    /// Every rule, in declaration order.
    pub const ALL: [Rule; 8] = [
        Rule::Erasure,
        Rule::Insertion,
        Rule::Iteration,
        Rule::Deiteration,
        Rule::DoubleCutAddition,
        Rule::DoubleCutRemoval,
        Rule::IsolatedVertexAddition,
        Rule::IsolatedVertexRemoval,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Erasure => "erasure",
            Rule::Insertion => "insertion",
            Rule::Iteration => "iteration",
            Rule::Deiteration => "deiteration",
            Rule::DoubleCutAddition => "double_cut_addition",
            Rule::DoubleCutRemoval => "double_cut_removal",
            Rule::IsolatedVertexAddition => "isolated_vertex_addition",
            Rule::IsolatedVertexRemoval => "isolated_vertex_removal",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule together with its arguments.
#[derive(Debug, Clone)]
pub enum Transformation {
    /// See [`Calculus::erase`].
    Erase(Selection),
    /// See [`Calculus::insert`].
    Insert {
        /// Negative context receiving the fragment.
        context: ContextId,
        /// Fragment whose sheet contents are copied in.
        fragment: Arc<Egi>,
    },
    /// See [`Calculus::iterate`].
    Iterate {
        /// Subgraph to copy.
        source: Selection,
        /// Context receiving the copy.
        destination: ContextId,
    },
    /// See [`Calculus::deiterate`].
    Deiterate {
        /// Occurrence to remove.
        copy: Selection,
        /// Occurrence that stays.
        original: Selection,
    },
    /// See [`Calculus::add_double_cut`].
    AddDoubleCut(Selection),
    /// See [`Calculus::remove_double_cut`].
    RemoveDoubleCut(ContextId),
    /// See [`Calculus::add_isolated_vertex`].
    AddIsolatedVertex {
        /// Receiving context.
        context: ContextId,
        /// Constant name, or `None` for a variable.
        constant: Option<String>,
    },
    /// See [`Calculus::remove_isolated_vertex`].
    RemoveIsolatedVertex(VertexId),
}

impl Transformation {
    /// Rule this transformation applies.
    pub fn rule(&self) -> Rule {
        match self {
            Transformation::Erase(_) => Rule::Erasure,
            Transformation::Insert { .. } => Rule::Insertion,
            Transformation::Iterate { .. } => Rule::Iteration,
            Transformation::Deiterate { .. } => Rule::Deiteration,
            Transformation::AddDoubleCut(_) => Rule::DoubleCutAddition,
            Transformation::RemoveDoubleCut(_) => Rule::DoubleCutRemoval,
            Transformation::AddIsolatedVertex { .. } => Rule::IsolatedVertexAddition,
            Transformation::RemoveIsolatedVertex(_) => Rule::IsolatedVertexRemoval,
        }
    }

    /// Elements the transformation names directly, for journals and logs.
    pub fn targets(&self) -> Vec<ElementId> {
        match self {
            Transformation::Erase(selection) | Transformation::AddDoubleCut(selection) => {
                let mut targets = vec![ElementId::Context(selection.context)];
                targets.extend(selection.elements.iter().copied());
                targets
            }
            Transformation::Insert { context, .. }
            | Transformation::AddIsolatedVertex { context, .. } => vec![ElementId::Context(*context)],
            Transformation::Iterate { source, destination } => {
                let mut targets: Vec<ElementId> = source.elements.iter().copied().collect();
                targets.push(ElementId::Context(*destination));
                targets
            }
            Transformation::Deiterate { copy, original } => copy
                .elements
                .iter()
                .chain(original.elements.iter())
                .copied()
                .collect(),
            Transformation::RemoveDoubleCut(outer) => vec![ElementId::Context(*outer)],
            Transformation::RemoveIsolatedVertex(vertex) => vec![ElementId::Vertex(*vertex)],
        }
    }
}

/// Result of a successful rule application.
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// The new graph.
    pub graph: Egi,
    /// Rule that produced it.
    pub rule: Rule,
    /// Top-level elements the rule created.
    pub created: Vec<ElementId>,
    /// Top-level elements the rule removed.
    pub removed: Vec<ElementId>,
}

impl Rewrite {
    /// Take the new graph, dropping the bookkeeping.
    pub fn into_graph(self) -> Egi {
        self.graph
    }
}

/// Fresh-id mapping built while copying a region into a draft.
#[derive(Debug, Default)]
pub(crate) struct CopyMap {
    pub contexts: BTreeMap<ContextId, ContextId>,
    pub vertices: BTreeMap<VertexId, VertexId>,
    pub edges: BTreeMap<crate::types::EdgeId, crate::types::EdgeId>,
}

impl CopyMap {
    /// Image of a copied context.
    pub fn context(&self, id: ContextId) -> Result<ContextId, EgiError> {
        self.contexts.get(&id).copied().ok_or_else(|| unmapped(id))
    }

    /// Image of a copied vertex.
    pub fn vertex(&self, id: VertexId) -> Result<VertexId, EgiError> {
        self.vertices.get(&id).copied().ok_or_else(|| unmapped(id))
    }

    /// Image of an element, if it was copied.
    pub fn image(&self, element: ElementId) -> Option<ElementId> {
        match element {
            ElementId::Vertex(id) => self.vertices.get(&id).map(|v| ElementId::Vertex(*v)),
            ElementId::Edge(id) => self.edges.get(&id).map(|e| ElementId::Edge(*e)),
            ElementId::Context(id) => self.contexts.get(&id).map(|c| ElementId::Context(*c)),
        }
    }
}

fn unmapped(id: impl fmt::Display) -> EgiError {
    EgiError::InvariantViolation {
        detail: format!("{id} was not copied before being referenced"),
    }
}

/// Rule engine.
///
/// Holds only configuration; every method is a pure function of its
/// arguments and may be called from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct Calculus {
    config: CalculusConfig,
}

impl Calculus {
    /// Engine with the given configuration.
    pub fn new(config: CalculusConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &CalculusConfig {
        &self.config
    }

    /// Legality predicate for erasure.
    pub fn check_erasure(&self, egi: &Egi, selection: &Selection) -> Result<(), EgiError> {
        erasure::check(egi, selection).map(|_| ())
    }

    /// Erase `selection` and everything nested in it from a positive context.
    pub fn erase(&self, egi: &Egi, selection: &Selection) -> Result<Rewrite, EgiError> {
        let closure = erasure::check(egi, selection)?;
        record(erasure::apply(egi, &closure)?)
    }

    /// Legality predicate for insertion.
    pub fn check_insertion(&self, egi: &Egi, context: ContextId, fragment: &Egi) -> Result<(), EgiError> {
        insertion::check(egi, context, fragment)
    }

    /// Copy the sheet contents of `fragment` into the negative `context`.
    pub fn insert(&self, egi: &Egi, context: ContextId, fragment: &Egi) -> Result<Rewrite, EgiError> {
        insertion::check(egi, context, fragment)?;
        record(insertion::apply(egi, context, fragment)?)
    }

    /// Legality predicate for iteration.
    pub fn check_iteration(
        &self,
        egi: &Egi,
        source: &Selection,
        destination: ContextId,
    ) -> Result<(), EgiError> {
        iteration::check(egi, source, destination).map(|_| ())
    }

    /// Copy `source` into `destination`, joining the copy to the original.
    pub fn iterate(
        &self,
        egi: &Egi,
        source: &Selection,
        destination: ContextId,
    ) -> Result<Rewrite, EgiError> {
        let closure = iteration::check(egi, source, destination)?;
        record(iteration::apply(egi, &closure, destination)?)
    }

    /// Legality predicate for de-iteration.
    pub fn check_deiteration(
        &self,
        egi: &Egi,
        copy: &Selection,
        original: &Selection,
    ) -> Result<(), EgiError> {
        deiteration::check(egi, copy, original, &self.config).map(|_| ())
    }

    /// Remove `copy`, which must match `original` further out.
    pub fn deiterate(
        &self,
        egi: &Egi,
        copy: &Selection,
        original: &Selection,
    ) -> Result<Rewrite, EgiError> {
        let plan = deiteration::check(egi, copy, original, &self.config)?;
        record(deiteration::apply(egi, &plan)?)
    }

    /// Legality predicate for double-cut addition.
    pub fn check_double_cut_addition(&self, egi: &Egi, selection: &Selection) -> Result<(), EgiError> {
        double_cut::check_addition(egi, selection).map(|_| ())
    }

    /// Wrap `selection` (possibly empty) in two new nested cuts.
    pub fn add_double_cut(&self, egi: &Egi, selection: &Selection) -> Result<Rewrite, EgiError> {
        double_cut::check_addition(egi, selection)?;
        record(double_cut::apply_addition(egi, selection)?)
    }

    /// Legality predicate for double-cut removal.
    pub fn check_double_cut_removal(&self, egi: &Egi, outer: ContextId) -> Result<(), EgiError> {
        double_cut::check_removal(egi, outer).map(|_| ())
    }

    /// Remove the ring whose outer cut is `outer`.
    pub fn remove_double_cut(&self, egi: &Egi, outer: ContextId) -> Result<Rewrite, EgiError> {
        let inner = double_cut::check_removal(egi, outer)?;
        record(double_cut::apply_removal(egi, outer, inner)?)
    }

    /// Legality predicate for isolated-vertex addition.
    pub fn check_isolated_vertex_addition(
        &self,
        egi: &Egi,
        context: ContextId,
        constant: Option<&str>,
    ) -> Result<(), EgiError> {
        isolated::check_addition(egi, context, constant)
    }

    /// Add a vertex with no incident edges to `context`.
    pub fn add_isolated_vertex(
        &self,
        egi: &Egi,
        context: ContextId,
        constant: Option<&str>,
    ) -> Result<Rewrite, EgiError> {
        isolated::check_addition(egi, context, constant)?;
        record(isolated::apply_addition(egi, context, constant)?)
    }

    /// Legality predicate for isolated-vertex removal.
    pub fn check_isolated_vertex_removal(&self, egi: &Egi, vertex: VertexId) -> Result<(), EgiError> {
        isolated::check_removal(egi, vertex)
    }

    /// Remove a vertex that no edge references.
    pub fn remove_isolated_vertex(&self, egi: &Egi, vertex: VertexId) -> Result<Rewrite, EgiError> {
        isolated::check_removal(egi, vertex)?;
        record(isolated::apply_removal(egi, vertex)?)
    }

    /// Legality predicate for any transformation.
    pub fn check(&self, egi: &Egi, transformation: &Transformation) -> Result<(), EgiError> {
        match transformation {
            Transformation::Erase(selection) => self.check_erasure(egi, selection),
            Transformation::Insert { context, fragment } => self.check_insertion(egi, *context, fragment),
            Transformation::Iterate { source, destination } => {
                self.check_iteration(egi, source, *destination)
            }
            Transformation::Deiterate { copy, original } => self.check_deiteration(egi, copy, original),
            Transformation::AddDoubleCut(selection) => self.check_double_cut_addition(egi, selection),
            Transformation::RemoveDoubleCut(outer) => self.check_double_cut_removal(egi, *outer),
            Transformation::AddIsolatedVertex { context, constant } => {
                self.check_isolated_vertex_addition(egi, *context, constant.as_deref())
            }
            Transformation::RemoveIsolatedVertex(vertex) => {
                self.check_isolated_vertex_removal(egi, *vertex)
            }
        }
    }

    /// Apply any transformation.
    pub fn apply(&self, egi: &Egi, transformation: &Transformation) -> Result<Rewrite, EgiError> {
        match transformation {
            Transformation::Erase(selection) => self.erase(egi, selection),
            Transformation::Insert { context, fragment } => self.insert(egi, *context, fragment),
            Transformation::Iterate { source, destination } => self.iterate(egi, source, *destination),
            Transformation::Deiterate { copy, original } => self.deiterate(egi, copy, original),
            Transformation::AddDoubleCut(selection) => self.add_double_cut(egi, selection),
            Transformation::RemoveDoubleCut(outer) => self.remove_double_cut(egi, *outer),
            Transformation::AddIsolatedVertex { context, constant } => {
                self.add_isolated_vertex(egi, *context, constant.as_deref())
            }
            Transformation::RemoveIsolatedVertex(vertex) => self.remove_isolated_vertex(egi, *vertex),
        }
    }
}

fn record(rewrite: Rewrite) -> Result<Rewrite, EgiError> {
    tracing::debug!(
        rule = %rewrite.rule,
        created = rewrite.created.len(),
        removed = rewrite.removed.len(),
        elements = rewrite.graph.num_elements(),
        "rule applied"
    );
    Ok(rewrite)
}

/// Remove every element of `members` from `draft`.
pub(crate) fn remove_all<'a>(
    draft: &mut Draft,
    members: impl IntoIterator<Item = &'a ElementId>,
) -> Result<(), EgiError> {
    for element in members {
        draft.remove(*element)?;
    }
    Ok(())
}
