//! De-iteration: remove a copy that matches an occurrence further out.
//!
//! The copy must match the original exactly up to id renaming: same nesting,
//! constants, relations and argument positions. Arguments that leave the copy
//! must land on the same ligature as the original's arguments, and each
//! top-level copy vertex must share a ligature with its image. Identity
//! edges in the copy's context that only join top-level copy vertices to the
//! outside are the connectors iteration created; they go with the copy.
//!
//! Those ligatures are read at the copy's level: only identity edges in the
//! copy's context or an enclosing one count. An identity asserted in a cut
//! below the copy holds only under a further negation.

use std::collections::BTreeSet;

use super::{remove_all, CalculusConfig, Rewrite, Rule};
use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::ligature::LigatureIndex;
use crate::matching::{self, MatchRules, Region};
use crate::selection::{Closure, Selection};
use crate::types::{ContextId, EdgeId, ElementId, VertexId};

#[derive(Debug)]
pub(super) struct Plan {
    copy: Closure,
    connectors: BTreeSet<EdgeId>,
}

pub(super) fn check(
    egi: &Egi,
    copy: &Selection,
    original: &Selection,
    config: &CalculusConfig,
) -> Result<Plan, EgiError> {
    let copy_closure = Closure::of(egi, copy, Rule::Deiteration)?;
    let original_closure = Closure::of(egi, original, Rule::Deiteration)?;
    if copy_closure.is_empty() {
        return Err(EgiError::mismatch(
            Rule::Deiteration,
            vec![ElementId::Context(copy.context)],
            "nothing selected to de-iterate",
        ));
    }

    check_position(egi, copy, original, &original_closure, config)?;

    let scoped = ligatures_at(egi, copy.context, &copy_closure)?;
    let rules = MatchRules {
        top_vertices_share_ligature: true,
        ligatures: Some(&scoped),
    };
    let left = Region::new(egi, copy_closure.clone());
    let right = Region::new(egi, original_closure);
    if matching::find(&left, &right, rules).is_none() {
        return Err(EgiError::mismatch(
            Rule::Deiteration,
            copy.elements.iter().copied().collect(),
            "the copy does not match the original",
        ));
    }

    let top: BTreeSet<VertexId> = copy_closure.top_vertices().collect();
    let mut connectors = BTreeSet::new();
    for vertex in &copy_closure.vertices {
        for e in egi.index().incident(*vertex) {
            if copy_closure.contains(&ElementId::Edge(*e)) {
                continue;
            }
            let edge = egi.edge(*e)?;
            let joins_outside = edge.identity
                && edge.context == copy.context
                && top.contains(vertex)
                && edge
                    .args
                    .iter()
                    .all(|a| top.contains(a) || !copy_closure.contains_vertex(*a));
            if !joins_outside {
                return Err(EgiError::dangling(
                    ElementId::Vertex(*vertex),
                    ElementId::Edge(*e),
                    "an edge outside the copy still references it",
                ));
            }
            connectors.insert(*e);
        }
    }

    let plan = Plan {
        copy: copy_closure,
        connectors,
    };
    check_ligatures_survive(egi, &plan)?;
    Ok(plan)
}

fn check_position(
    egi: &Egi,
    copy: &Selection,
    original: &Selection,
    original_closure: &Closure,
    config: &CalculusConfig,
) -> Result<(), EgiError> {
    let contexts = vec![
        ElementId::Context(original.context),
        ElementId::Context(copy.context),
    ];
    if copy.context == original.context {
        if !config.allow_same_context_deiteration {
            return Err(EgiError::mismatch(
                Rule::Deiteration,
                contexts,
                "the original must lie in a proper ancestor of the copy",
            ));
        }
        if let Some(shared) = copy.elements.intersection(&original.elements).next() {
            return Err(EgiError::mismatch(
                Rule::Deiteration,
                vec![*shared],
                format!("{shared} is selected as both copy and original"),
            ));
        }
    } else if !egi.is_ancestor_or_self(original.context, copy.context)? {
        return Err(EgiError::mismatch(
            Rule::Deiteration,
            contexts,
            format!(
                "original context {} does not enclose copy context {}",
                original.context, copy.context
            ),
        ));
    }

    if original_closure.contains_context(copy.context) {
        return Err(EgiError::mismatch(
            Rule::Deiteration,
            contexts,
            "the copy lies inside the original",
        ));
    }
    Ok(())
}

/// Ligatures formed by identity edges that hold in `context`, leaving out
/// the copy's own edges.
fn ligatures_at(egi: &Egi, context: ContextId, copy: &Closure) -> Result<LigatureIndex, EgiError> {
    let enclosing: BTreeSet<ContextId> = egi.path_to_root(context)?.into_iter().collect();
    Ok(LigatureIndex::build(
        egi.vertices().map(|v| v.id),
        egi.edges()
            .filter(|e| enclosing.contains(&e.context) && !copy.contains(&ElementId::Edge(e.id))),
    ))
}

fn check_ligatures_survive(egi: &Egi, plan: &Plan) -> Result<(), EgiError> {
    let after = LigatureIndex::build(
        egi.vertices()
            .map(|v| v.id)
            .filter(|v| !plan.copy.contains_vertex(*v)),
        egi.edges().filter(|e| {
            !plan.copy.contains(&ElementId::Edge(e.id)) && !plan.connectors.contains(&e.id)
        }),
    );
    for (_, class) in egi.ligatures().classes() {
        let mut survivors = class.iter().filter(|v| !plan.copy.contains_vertex(**v));
        let Some(first) = survivors.next() else { continue };
        if let Some(split) = survivors.find(|v| !after.same_class(*first, **v)) {
            return Err(EgiError::mismatch(
                Rule::Deiteration,
                vec![ElementId::Vertex(*first), ElementId::Vertex(*split)],
                "removing the copy would split a line of identity",
            ));
        }
    }
    Ok(())
}

pub(super) fn apply(egi: &Egi, plan: &Plan) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    remove_all(&mut draft, plan.copy.members())?;
    for connector in &plan.connectors {
        draft.remove(ElementId::Edge(*connector))?;
    }

    let mut removed: Vec<ElementId> = plan.copy.top_elements.iter().copied().collect();
    removed.extend(plan.connectors.iter().map(|e| ElementId::Edge(*e)));

    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::Deiteration,
        created: Vec::new(),
        removed,
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
    fn test_deiterate_undoes_iteration_of_edge() {
        let f = implication();
        let calculus = Calculus::default();
        let source = Selection::new(f.outer, [ElementId::Edge(f.man)]);
        let iterated = calculus.iterate(&f.egi, &source, f.inner).unwrap();

        let copy = Selection::new(f.inner, iterated.created.iter().copied());
        let back = calculus.deiterate(&iterated.graph, &copy, &source).unwrap();
        assert!(equivalent(&back.graph, &f.egi));
        assert_eq!(back.graph.fingerprint(), f.egi.fingerprint());
    }

    #[test]
    fn test_deiterate_removes_connectors() {
        let f = implication();
        let calculus = Calculus::default();
        let source = Selection::new(f.outer, [ElementId::Vertex(f.x)]);
        let iterated = calculus.iterate(&f.egi, &source, f.inner).unwrap();
        let copy = Selection::new(f.inner, iterated.created.iter().copied());

        let back = calculus.deiterate(&iterated.graph, &copy, &source).unwrap();
        assert_eq!(back.removed.len(), 2);
        assert_eq!(back.graph.num_edges(), f.egi.num_edges());
        assert!(back.graph.same_ligature(f.x, f.x2));
    }

    #[test]
    fn test_original_is_never_removed() {
        let f = implication();
        let calculus = Calculus::default();
        let source = Selection::new(f.outer, [ElementId::Edge(f.man)]);
        let iterated = calculus.iterate(&f.egi, &source, f.inner).unwrap();
        let copy = Selection::new(f.inner, iterated.created.iter().copied());

        // Swapping roles asks to remove the outer occurrence: not allowed.
        let err = calculus.deiterate(&iterated.graph, &source, &copy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_different_relation_does_not_match() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let x = b.add_vertex(sheet).unwrap();
        let p = b.add_edge(sheet, "P", vec![x]).unwrap();
        let cut = b.add_cut(sheet).unwrap();
        let q = b.add_edge(cut, "Q", vec![x]).unwrap();
        let egi = b.build().unwrap();

        let err = Calculus::default()
            .deiterate(
                &egi,
                &Selection::new(cut, [ElementId::Edge(q)]),
                &Selection::new(sheet, [ElementId::Edge(p)]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_matching_edge_over_unrelated_vertex_does_not_match() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let x = b.add_vertex(sheet).unwrap();
        let y = b.add_vertex(sheet).unwrap();
        let p = b.add_edge(sheet, "P", vec![x]).unwrap();
        let cut = b.add_cut(sheet).unwrap();
        let q = b.add_edge(cut, "P", vec![y]).unwrap();
        let egi = b.build().unwrap();

        let err = Calculus::default()
            .deiterate(
                &egi,
                &Selection::new(cut, [ElementId::Edge(q)]),
                &Selection::new(sheet, [ElementId::Edge(p)]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_identity_under_deeper_cut_does_not_license_removal() {
        // P(z), and whatever is P is z: the identity sits one cut below the copy.
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let z = b.add_vertex(sheet).unwrap();
        let pz = b.add_edge(sheet, "P", vec![z]).unwrap();
        let cut1 = b.add_cut(sheet).unwrap();
        let w = b.add_vertex(cut1).unwrap();
        let pw = b.add_edge(cut1, "P", vec![w]).unwrap();
        let cut2 = b.add_cut(cut1).unwrap();
        b.add_identity(cut2, vec![z, w]).unwrap();
        let egi = b.build().unwrap();
        assert!(egi.same_ligature(z, w));

        let err = Calculus::default()
            .deiterate(
                &egi,
                &Selection::new(cut1, [ElementId::Edge(pw)]),
                &Selection::new(sheet, [ElementId::Edge(pz)]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralMismatch);
    }

    #[test]
    fn test_identity_in_copy_context_licenses_removal() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let z = b.add_vertex(sheet).unwrap();
        let pz = b.add_edge(sheet, "P", vec![z]).unwrap();
        let cut1 = b.add_cut(sheet).unwrap();
        let w = b.add_vertex(cut1).unwrap();
        let pw = b.add_edge(cut1, "P", vec![w]).unwrap();
        b.add_identity(cut1, vec![z, w]).unwrap();
        let egi = b.build().unwrap();

        let rewrite = Calculus::default()
            .deiterate(
                &egi,
                &Selection::new(cut1, [ElementId::Edge(pw)]),
                &Selection::new(sheet, [ElementId::Edge(pz)]),
            )
            .unwrap();
        assert!(rewrite.graph.edge(pw).is_err());
        assert!(rewrite.graph.edge(pz).is_ok());
    }

    #[test]
    fn test_same_context_needs_config() {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let x = b.add_vertex(sheet).unwrap();
        let p1 = b.add_edge(sheet, "P", vec![x]).unwrap();
        let p2 = b.add_edge(sheet, "P", vec![x]).unwrap();
        let egi = b.build().unwrap();
        let copy = Selection::new(sheet, [ElementId::Edge(p2)]);
        let original = Selection::new(sheet, [ElementId::Edge(p1)]);

        let strict = Calculus::default();
        assert_eq!(
            strict.deiterate(&egi, &copy, &original).unwrap_err().kind(),
            ErrorKind::StructuralMismatch
        );

        let relaxed = Calculus::new(CalculusConfig::default().with_same_context_deiteration(true));
        let rewrite = relaxed.deiterate(&egi, &copy, &original).unwrap();
        assert_eq!(rewrite.graph.num_edges(), 1);
        assert!(rewrite.graph.edge(p1).is_ok());
    }
}
