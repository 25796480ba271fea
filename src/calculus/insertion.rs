//! Insertion: copy fresh material into a negative context.
//!
//! The fragment is a finished [`Egi`], so it is already closed and valid.
//! Its sheet maps onto the target context; every other element gets a fresh
//! id from the target graph's generator. Nothing in the fragment can refer to
//! a pre-existing vertex, so insertion never joins existing ligatures.

use super::{CopyMap, Rewrite, Rule};
use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::selection::Closure;
use crate::types::{Alphabet, ContextId, Edge, Polarity, Vertex};

pub(super) fn check(egi: &Egi, context: ContextId, fragment: &Egi) -> Result<(), EgiError> {
    let actual = egi.polarity(context)?;
    if actual != Polarity::Negative {
        return Err(EgiError::WrongPolarity {
            rule: Rule::Insertion,
            context,
            required: Polarity::Negative,
            actual,
        });
    }
    fragment.check_invariants()?;
    let mut alphabet = egi.alphabet().clone();
    admit_names(&mut alphabet, fragment)
}

fn admit_names(alphabet: &mut Alphabet, fragment: &Egi) -> Result<(), EgiError> {
    for edge in fragment.edges() {
        alphabet.admit_relation(&edge.relation, edge.arity())?;
    }
    for name in fragment.vertices().filter_map(Vertex::name) {
        alphabet.admit_constant(name)?;
    }
    Ok(())
}

pub(super) fn apply(egi: &Egi, context: ContextId, fragment: &Egi) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    admit_names(draft.alphabet_mut(), fragment)?;

    let source = Closure::of_area(fragment, fragment.root_id())?;
    let mut map = CopyMap::default();
    map.contexts.insert(fragment.root_id(), context);

    for cut in &source.contexts {
        let parent = match fragment.context(*cut)?.parent {
            Some(parent) => map.context(parent)?,
            None => return Err(EgiError::malformed(cut, "a fragment sheet cannot be copied as a cut")),
        };
        let id = draft.ids_mut().context();
        draft.add_cut(id, parent)?;
        map.contexts.insert(*cut, id);
    }

    for vertex in fragment.vertices() {
        let id = draft.ids_mut().vertex();
        draft.add_vertex(Vertex {
            id,
            context: map.context(vertex.context)?,
            constant: vertex.constant.clone(),
        })?;
        map.vertices.insert(vertex.id, id);
    }

    for edge in fragment.edges() {
        let id = draft.ids_mut().edge();
        let args = edge
            .args
            .iter()
            .map(|a| map.vertex(*a))
            .collect::<Result<Vec<_>, _>>()?;
        draft.add_edge(Edge {
            id,
            context: map.context(edge.context)?,
            relation: edge.relation.clone(),
            args,
            identity: edge.identity,
        })?;
        map.edges.insert(edge.id, id);
    }

    let created = source
        .top_elements
        .iter()
        .filter_map(|element| map.image(*element))
        .collect();

    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::Insertion,
        created,
        removed: Vec::new(),
    })
}
