//! Erasure: remove a subgraph from a positive context.

use super::{remove_all, Rewrite, Rule};
use crate::error::EgiError;
use crate::graph::{Draft, Egi};
use crate::selection::{Closure, Selection};
use crate::types::{ElementId, Polarity};

pub(super) fn check(egi: &Egi, selection: &Selection) -> Result<Closure, EgiError> {
    let actual = egi.polarity(selection.context)?;
    if actual != Polarity::Positive {
        return Err(EgiError::WrongPolarity {
            rule: Rule::Erasure,
            context: selection.context,
            required: Polarity::Positive,
            actual,
        });
    }

    let closure = Closure::of(egi, selection, Rule::Erasure)?;

    for vertex in &closure.vertices {
        for edge in egi.index().incident(*vertex) {
            if !closure.contains(&ElementId::Edge(*edge)) {
                return Err(EgiError::dangling(
                    ElementId::Vertex(*vertex),
                    ElementId::Edge(*edge),
                    "an edge outside the erased subgraph still references it",
                ));
            }
        }
        if let Some(class) = egi.ligatures().class_of(*vertex) {
            if let Some(member) = class.iter().find(|m| !closure.contains_vertex(**m)) {
                return Err(EgiError::dangling(
                    ElementId::Vertex(*vertex),
                    ElementId::Vertex(*member),
                    "its ligature continues outside the erased subgraph",
                ));
            }
        }
    }

    Ok(closure)
}

pub(super) fn apply(egi: &Egi, closure: &Closure) -> Result<Rewrite, EgiError> {
    let mut draft = Draft::from_egi(egi);
    remove_all(&mut draft, closure.members())?;
    Ok(Rewrite {
        graph: draft.finish()?,
        rule: Rule::Erasure,
        created: Vec::new(),
        removed: closure.top_elements.iter().copied().collect(),
    })
}
