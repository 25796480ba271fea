//! Iteration: copy a subgraph into the same context or a descendant.
//!
//! Every element of the closure is copied with a fresh id. Arguments that
//! point outside the closure keep pointing at the original vertices, which are
//! in scope because the destination lies inside the source context. Each
//! top-level copied vertex is joined to its original by a new identity edge in
//! the destination, so the copy continues the original's line of identity.

use super::{CopyMap, Rewrite, Rule};
use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::selection::{Closure, Selection};
use crate::types::{ContextId, Edge, ElementId, Vertex};

pub(super) fn check(egi: &Egi, source: &Selection, destination: ContextId) -> Result<Closure, EgiError> {
    egi.context(destination)?;
    let closure = Closure::of(egi, source, Rule::Iteration)?;
    if closure.is_empty() {
        return Err(EgiError::mismatch(
            Rule::Iteration,
            vec![ElementId::Context(source.context)],
            "nothing selected to iterate",
        ));
    }

    if !egi.is_ancestor_or_self(source.context, destination)? {
        let detail = if egi.is_ancestor_or_self(destination, source.context)? {
            format!("destination {destination} is an ancestor of source {}", source.context)
        } else {
            format!("destination {destination} is not inside source {}", source.context)
        };
        return Err(EgiError::mismatch(
            Rule::Iteration,
            vec![ElementId::Context(destination), ElementId::Context(source.context)],
            detail,
        ));
    }

    if closure.contains_context(destination) {
        return Err(EgiError::mismatch(
            Rule::Iteration,
            vec![ElementId::Context(destination)],
            format!("destination {destination} lies inside the iterated subgraph"),
        ));
    }

    Ok(closure)
}

pub(super) fn apply(egi: &Egi, closure: &Closure, destination: ContextId) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    let mut map = CopyMap::default();
    map.contexts.insert(closure.top, destination);

    for cut in &closure.contexts {
        let parent = match egi.context(*cut)?.parent {
            Some(parent) => map.context(parent)?,
            None => return Err(EgiError::malformed(cut, "the sheet cannot be iterated")),
        };
        let id = draft.ids_mut().context();
        draft.add_cut(id, parent)?;
        map.contexts.insert(*cut, id);
    }

    for v in &closure.vertices {
        let vertex = egi.vertex(*v)?;
        let id = draft.ids_mut().vertex();
        draft.add_vertex(Vertex {
            id,
            context: map.context(vertex.context)?,
            constant: vertex.constant.clone(),
        })?;
        map.vertices.insert(*v, id);
    }

    for e in &closure.edges {
        let edge = egi.edge(*e)?;
        let id = draft.ids_mut().edge();
        let args = edge
            .args
            .iter()
            .map(|a| map.vertices.get(a).copied().unwrap_or(*a))
            .collect();
        draft.add_edge(Edge {
            id,
            context: map.context(edge.context)?,
            relation: edge.relation.clone(),
            args,
            identity: edge.identity,
        })?;
        map.edges.insert(*e, id);
    }

    for original in closure.top_vertices() {
        let id = draft.ids_mut().edge();
        draft.add_edge(Edge::identity(id, destination, vec![original, map.vertex(original)?])?)?;
    }

    let created = closure
        .top_elements
        .iter()
        .filter_map(|element| map.image(*element))
        .collect();

    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::Iteration,
        created,
        removed: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::implication;
    use super::super::Calculus;
    use super::*;
    use crate::builder::EgiBuilder;
    use crate::error::ErrorKind;

    #[test]
    fn test_iterate_edge_into_nested_cut() {
        let f = implication();
        let source = Selection::new(f.outer, [ElementId::Edge(f.man)]);
        let rewrite = Calculus::default().iterate(&f.egi, &source, f.inner).unwrap();
        let g = &rewrite.graph;

        let copy = rewrite.created[0].as_edge().unwrap();
        let edge = g.edge(copy).unwrap();
        assert_eq!(edge.relation, "Man");
        assert_eq!(edge.context, f.inner);
        // The argument is outside the copied closure, so it still points at x.
        assert_eq!(edge.args, vec![f.x]);
        assert_eq!(g.edge(f.man).unwrap(), f.egi.edge(f.man).unwrap());
    }

    #[test]
    fn test_iterated_vertex_joins_the_original_ligature() {
        let f = implication();
        let source = Selection::new(f.outer, [ElementId::Vertex(f.x)]);
        let rewrite = Calculus::default().iterate(&f.egi, &source, f.inner).unwrap();
        let copy = rewrite.created[0].as_vertex().unwrap();

        assert_ne!(copy, f.x);
        assert!(rewrite.graph.same_ligature(copy, f.x));
        assert!(rewrite.graph.same_ligature(copy, f.x2));
        assert_eq!(rewrite.graph.num_edges(), f.egi.num_edges() + 1);
    }

    #[test]
    fn test_iterate_cut_copies_its_contents() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let cut = b.add_cut(sheet).unwrap();
        let y = b.add_vertex(cut).unwrap();
        b.add_edge(cut, "P", vec![y]).unwrap();
        let target = b.add_cut(sheet).unwrap();
        let egi = b.build().unwrap();

        // Iterating the first cut into the sheet itself.
        let rewrite = Calculus::default()
            .iterate(&egi, &Selection::new(sheet, [ElementId::Context(cut)]), sheet)
            .unwrap();
        assert_eq!(rewrite.graph.num_contexts(), egi.num_contexts() + 1);
        assert_eq!(rewrite.graph.num_edges(), 2);

        // A sibling cut is a descendant of the sheet.
        let into_sibling = Calculus::default()
            .iterate(&egi, &Selection::new(sheet, [ElementId::Context(cut)]), target)
            .unwrap();
        assert_eq!(into_sibling.graph.context(target).unwrap().area.len(), 1);
    }

    #[test]
    fn test_iterate_into_ancestor_is_mismatch() {
        let f = implication();
        let source = Selection::new(f.inner, [ElementId::Edge(f.mortal)]);
        let err = Calculus::default().iterate(&f.egi, &source, f.outer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_iterate_into_itself_is_mismatch() {
        let f = implication();
        let source = Selection::new(f.outer, [ElementId::Context(f.inner)]);
        let err = Calculus::default().iterate(&f.egi, &source, f.inner).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }
}
