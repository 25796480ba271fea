//! Isolated vertices: existential weakening and its inverse.

use super::{Rewrite, Rule};
use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::types::{ContextId, ElementId, Vertex, VertexId};

pub(super) fn check_addition(egi: &Egi, context: ContextId, constant: Option<&str>) -> Result<(), EgiError> {
    egi.context(context)?;
    if let Some(name) = constant {
        let mut alphabet = egi.alphabet().clone();
        alphabet.admit_constant(name)?;
    }
    Ok(())
}

pub(super) fn apply_addition(egi: &Egi, context: ContextId, constant: Option<&str>) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    let id = draft.ids_mut().vertex();
    let vertex = match constant {
        Some(name) => {
            draft.alphabet_mut().admit_constant(name)?;
            Vertex::constant(id, context, name)?
        }
        None => Vertex::variable(id, context),
    };
    draft.add_vertex(vertex)?;
    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::IsolatedVertexAddition,
        created: vec![ElementId::Vertex(id)],
        removed: Vec::new(),
    })
}

pub(super) fn check_removal(egi: &Egi, vertex: VertexId) -> Result<(), EgiError> {
    let incident = egi.incident_edges(vertex)?;
    let on_ligature = egi.ligature(vertex)?.len() > 1;
    if !incident.is_empty() || on_ligature {
        return Err(EgiError::NotIsolated {
            vertex,
            incident_edges: incident,
        });
    }
    Ok(())
}

pub(super) fn apply_removal(egi: &Egi, vertex: VertexId) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    draft.remove(ElementId::Vertex(vertex))?;
    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::IsolatedVertexRemoval,
        created: Vec::new(),
        removed: vec![ElementId::Vertex(vertex)],
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::implication;
    use super::super::Calculus;
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Alphabet;

    #[test]
    fn test_add_then_remove_is_exact_inverse() {
        let f = implication();
        let calculus = Calculus::default();
        for context in [f.egi.root_id(), f.outer, f.inner] {
            let added = calculus.add_isolated_vertex(&f.egi, context, None).unwrap();
            let v = added.created[0].as_vertex().unwrap();
            assert_eq!(added.graph.vertex(v).unwrap().context, context);

            let removed = calculus.remove_isolated_vertex(&added.graph, v).unwrap();
            assert_eq!(removed.graph.fingerprint(), f.egi.fingerprint());
        }
    }

    #[test]
    fn test_add_constant_records_name() {
        let f = implication();
        let added = Calculus::default()
            .add_isolated_vertex(&f.egi, f.inner, Some("Socrates"))
            .unwrap();
        assert!(added.graph.alphabet().has_constant("Socrates"));
        assert!(!f.egi.alphabet().has_constant("Socrates"));
    }

    #[test]
    fn test_strict_alphabet_rejects_unknown_constant() {
        let egi = crate::builder::EgiBuilder::new()
            .with_alphabet(Alphabet::strict())
            .build()
            .unwrap();
        let err = Calculus::default()
            .add_isolated_vertex(&egi, egi.root_id(), Some("Socrates"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEntity);
    }

    #[test]
    fn test_referenced_vertex_is_not_isolated() {
        let f = implication();
        let err = Calculus::default().remove_isolated_vertex(&f.egi, f.x).unwrap_err();
        match err {
            EgiError::NotIsolated {
                vertex,
                incident_edges,
            } => {
                assert_eq!(vertex, f.x);
                assert!(incident_edges.contains(&f.man));
                assert!(incident_edges.contains(&f.link));
            }
            other => panic!("expected NotIsolated, got {other:?}"),
        }
    }
}
