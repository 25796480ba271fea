//! Selections: sets of elements taken from one context's area.
//!
//! Rules act on a [`Selection`]: elements that sit directly in a single
//! context. Its [`Closure`] adds everything nested inside any selected cut.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::calculus::Rule;
use crate::error::EgiError;
use crate::graph::Egi;
use crate::types::{ContextId, EdgeId, ElementId, VertexId};

/// Elements chosen from the area of one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Context whose area the elements come from.
    pub context: ContextId,
    /// Selected elements, each directly in `context`.
    pub elements: BTreeSet<ElementId>,
}

impl Selection {
    /// Selection of `elements` from `context`.
    pub fn new(context: ContextId, elements: impl IntoIterator<Item = ElementId>) -> Self {
        Self {
            context,
            elements: elements.into_iter().collect(),
        }
    }

    /// Empty selection in `context`.
    pub fn empty(context: ContextId) -> Self {
        Self::new(context, [])
    }

    /// Selection of one element, taking the context from its owner.
    pub fn of(egi: &Egi, element: ElementId) -> Result<Self, EgiError> {
        let context = egi
            .owner(element)?
            .ok_or_else(|| EgiError::malformed(element, "the sheet cannot be selected"))?;
        Ok(Self::new(context, [element]))
    }

    /// The whole area of `context`.
    pub fn whole_area(egi: &Egi, context: ContextId) -> Result<Self, EgiError> {
        Ok(Self::new(context, egi.context(context)?.area.iter().copied()))
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of selected elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether `element` is selected.
    pub fn contains(&self, element: &ElementId) -> bool {
        self.elements.contains(element)
    }
}

/// A selection together with everything nested inside its cuts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    /// Context the selection was taken from.
    pub top: ContextId,
    /// Elements selected directly in `top`.
    pub top_elements: BTreeSet<ElementId>,
    /// Cuts in the closure, parents before children.
    pub contexts: Vec<ContextId>,
    /// Vertices in the closure.
    pub vertices: BTreeSet<VertexId>,
    /// Edges in the closure.
    pub edges: BTreeSet<EdgeId>,
    members: BTreeSet<ElementId>,
}

impl Closure {
    /// Closure of `selection`, checking that each element exists and sits
    /// directly in the selection's context.
    pub fn new(egi: &Egi, selection: &Selection) -> Result<Self, EgiError> {
        Self::checked(egi, selection, |element, context| {
            EgiError::malformed(element, format!("not directly in {context}"))
        })
    }

    /// As [`Closure::new`], reporting a misplaced element as a structural
    /// mismatch for `rule`.
    pub(crate) fn of(egi: &Egi, selection: &Selection, rule: Rule) -> Result<Self, EgiError> {
        Self::checked(egi, selection, |element, context| {
            EgiError::mismatch(
                rule,
                vec![element, ElementId::Context(context)],
                format!("{element} is not directly in {context}"),
            )
        })
    }

    fn checked(
        egi: &Egi,
        selection: &Selection,
        misplaced: impl Fn(ElementId, ContextId) -> EgiError,
    ) -> Result<Self, EgiError> {
        let top = egi.context(selection.context)?;
        for element in &selection.elements {
            if !egi.contains(*element) {
                return Err(EgiError::NotFound(*element));
            }
            if !top.contains(element) {
                return Err(misplaced(*element, top.id));
            }
        }

        let mut closure = Self::whole(egi, top.id, selection.elements.iter().copied())?;
        closure.top_elements = selection.elements.clone();
        Ok(closure)
    }

    /// Closure of everything below `top`.
    pub(crate) fn of_area(egi: &Egi, top: ContextId) -> Result<Self, EgiError> {
        let area = egi.context(top)?.area.clone();
        let mut closure = Self::whole(egi, top, area.iter().copied())?;
        closure.top_elements = area;
        Ok(closure)
    }

    fn whole(
        egi: &Egi,
        top: ContextId,
        seeds: impl Iterator<Item = ElementId>,
    ) -> Result<Self, EgiError> {
        let mut closure = Self {
            top,
            top_elements: BTreeSet::new(),
            contexts: Vec::new(),
            vertices: BTreeSet::new(),
            edges: BTreeSet::new(),
            members: BTreeSet::new(),
        };
        let mut queue: VecDeque<ElementId> = seeds.collect();
        while let Some(element) = queue.pop_front() {
            if !closure.members.insert(element) {
                continue;
            }
            match element {
                ElementId::Vertex(id) => {
                    closure.vertices.insert(id);
                }
                ElementId::Edge(id) => {
                    closure.edges.insert(id);
                }
                ElementId::Context(id) => {
                    closure.contexts.push(id);
                    queue.extend(egi.context(id)?.area.iter().copied());
                }
            }
        }
        Ok(closure)
    }

    /// Whether `element` is in the closure.
    pub fn contains(&self, element: &ElementId) -> bool {
        self.members.contains(element)
    }

    /// Whether `vertex` is in the closure.
    pub fn contains_vertex(&self, vertex: VertexId) -> bool {
        self.vertices.contains(&vertex)
    }

    /// Whether `context` is one of the closure's cuts.
    pub fn contains_context(&self, context: ContextId) -> bool {
        self.members.contains(&ElementId::Context(context))
    }

    /// Every element in the closure.
    pub fn members(&self) -> &BTreeSet<ElementId> {
        &self.members
    }

    /// Number of elements in the closure.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the closure is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Vertices of the closure that sit directly in the top context.
    pub fn top_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.top_elements.iter().filter_map(ElementId::as_vertex)
    }
}
