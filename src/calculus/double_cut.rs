//! Double cut: add or remove a ring of two directly nested cuts.
//!
//! Both directions relocate elements and keep their ids. Moving a cut shifts
//! the depth of its whole subtree by two, so polarities are unchanged.

use super::{Rewrite, Rule};
use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::selection::{Closure, Selection};
use crate::types::{ContextId, ElementId};

pub(super) fn check_addition(egi: &Egi, selection: &Selection) -> Result<Closure, EgiError> {
    let closure = Closure::of(egi, selection, Rule::DoubleCutAddition)?;
    // Moved vertices go out of scope for edges that stay behind.
    for vertex in closure.top_vertices() {
        for edge in egi.index().incident(vertex) {
            if !closure.contains(&ElementId::Edge(*edge)) {
                return Err(EgiError::dangling(
                    ElementId::Vertex(vertex),
                    ElementId::Edge(*edge),
                    "an edge left outside the new cuts references it",
                ));
            }
        }
    }
    Ok(closure)
}

pub(super) fn apply_addition(egi: &Egi, selection: &Selection) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    let outer = draft.ids_mut().context();
    let inner = draft.ids_mut().context();
    draft.add_cut(outer, selection.context)?;
    draft.add_cut(inner, outer)?;
    for element in &selection.elements {
        draft.relocate(*element, inner)?;
    }
    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::DoubleCutAddition,
        created: vec![ElementId::Context(outer), ElementId::Context(inner)],
        removed: Vec::new(),
    })
}

/// Returns the inner cut of the ring.
pub(super) fn check_removal(egi: &Egi, outer: ContextId) -> Result<ContextId, EgiError> {
    let ctx = egi.context(outer)?;
    if ctx.is_sheet() {
        return Err(EgiError::mismatch(
            Rule::DoubleCutRemoval,
            vec![ElementId::Context(outer)],
            "the sheet is not a cut",
        ));
    }
    let mut area = ctx.area.iter();
    match (area.next(), area.next()) {
        (Some(ElementId::Context(inner)), None) => Ok(*inner),
        (Some(only), None) => Err(EgiError::mismatch(
            Rule::DoubleCutRemoval,
            vec![ElementId::Context(outer), *only],
            format!("{outer} holds {only}, not a cut"),
        )),
        _ => Err(EgiError::mismatch(
            Rule::DoubleCutRemoval,
            ctx.area.iter().copied().collect(),
            format!("{outer} must hold exactly one cut, found {} elements", ctx.area.len()),
        )),
    }
}

pub(super) fn apply_removal(egi: &Egi, outer: ContextId, inner: ContextId) -> Result<Rewrite, EgiError> {
    let parent = egi.context(outer)?.parent.ok_or_else(|| EgiError::InvariantViolation {
        detail: format!("cut {outer} has no parent"),
    })?;
    let mut draft = Draft::from_egi(egi);
    let contents: Vec<ElementId> = egi.context(inner)?.area.iter().copied().collect();
    for element in contents {
        draft.relocate(element, parent)?;
    }
    draft.remove(ElementId::Context(inner))?;
    draft.remove(ElementId::Context(outer))?;
    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::DoubleCutRemoval,
        created: Vec::new(),
        removed: vec![ElementId::Context(outer), ElementId::Context(inner)],
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::implication;
    use super::super::Calculus;
    use super::*;
    use crate::builder::EgiBuilder;
    use crate::equivalence::equivalent;
    use crate::error::ErrorKind;

    #[test]
    fn test_add_then_remove_restores_graph() {
        let f = implication();
        let calculus = Calculus::default();
        let around_inner = Selection::new(f.outer, [ElementId::Context(f.inner)]);

        let added = calculus.add_double_cut(&f.egi, &around_inner).unwrap();
        let ring = added.created[0].as_context().unwrap();
        assert_eq!(added.graph.num_contexts(), 5);
        assert_eq!(added.graph.context(f.inner).unwrap().depth, 4);
        assert_eq!(added.graph.vertex(f.x2).unwrap().context, f.inner);

        let removed = calculus.remove_double_cut(&added.graph, ring).unwrap();
        assert_eq!(removed.graph.num_contexts(), 3);
        assert_eq!(removed.graph.context(f.inner).unwrap().depth, 2);
        assert!(equivalent(&removed.graph, &f.egi));
    }

    #[test]
    fn test_empty_double_cut_anywhere() {
        let f = implication();
        let calculus = Calculus::default();
        for context in [f.egi.root_id(), f.outer, f.inner] {
            let added = calculus.add_double_cut(&f.egi, &Selection::empty(context)).unwrap();
            let ring = added.created[0].as_context().unwrap();
            let removed = calculus.remove_double_cut(&added.graph, ring).unwrap();
            assert_eq!(removed.graph.fingerprint(), f.egi.fingerprint());
        }
    }

    #[test]
    fn test_ring_with_sibling_is_mismatch() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let outer = b.add_cut(sheet).unwrap();
        b.add_cut(outer).unwrap();
        b.add_vertex(outer).unwrap();
        let egi = b.build().unwrap();

        let err = Calculus::default().remove_double_cut(&egi, outer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_single_cut_is_not_a_ring() {
        let f = implication();
        let err = Calculus::default().remove_double_cut(&f.egi, f.inner).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
        let err = Calculus::default().remove_double_cut(&f.egi, f.egi.root_id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_enclosing_referenced_vertex_dangles() {
        let f = implication();
        let err = Calculus::default()
            .add_double_cut(&f.egi, &Selection::new(f.outer, [ElementId::Vertex(f.x)]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DanglingReference);
    }
}
