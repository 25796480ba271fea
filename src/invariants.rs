//! Structural invariant validator.
//!
//! Runs after every construction step and every transformation, and always
//! checks the whole graph:
//!
//! 1. exactly one sheet (depth 0, no parent), and it is the recorded root;
//! 2. every cut's parent exists, its depth is the parent's depth + 1, and the
//!    parent's area lists it;
//! 3. every area entry resolves and its owner field points back to that area;
//! 4. the areas partition the element universe: nothing is owned twice,
//!    nothing is owned by no context;
//! 5. every edge argument resolves and lies in the edge's context or an
//!    enclosing one; identity edges have at least two arguments.
//!
//! A failure here is an engine fault, not a user error.

use std::collections::HashMap;

use crate::error::EgiError;
use crate::graph::Tables;
use crate::types::{ContextId, ElementId};

/// Validate `tables` rooted at `root`, logging any violation.
pub(crate) fn validate(tables: &Tables, root: ContextId) -> Result<(), EgiError> {
    let result = check(tables, root);
    if let Err(EgiError::InvariantViolation { detail }) = &result {
        tracing::error!(
            root = %root,
            contexts = tables.contexts.len(),
            vertices = tables.vertices.len(),
            edges = tables.edges.len(),
            violation = %detail,
            "INVARIANT_VIOLATION: graph failed structural validation"
        );
    }
    result
}

fn fault(detail: String) -> EgiError {
    EgiError::InvariantViolation { detail }
}

fn check(tables: &Tables, root: ContextId) -> Result<(), EgiError> {
    let sheet = tables
        .contexts
        .get(&root)
        .ok_or_else(|| fault(format!("root {root} is missing")))?;
    if sheet.parent.is_some() || sheet.depth != 0 {
        return Err(fault(format!("root {root} has a parent or non-zero depth")));
    }

    let mut owners: HashMap<ElementId, ContextId> = HashMap::new();

    for ctx in tables.contexts.values() {
        match ctx.parent {
            None if ctx.id != root => {
                return Err(fault(format!("second sheet {}", ctx.id)));
            }
            None => {}
            Some(parent_id) => {
                let parent = tables
                    .contexts
                    .get(&parent_id)
                    .ok_or_else(|| fault(format!("{} has missing parent {parent_id}", ctx.id)))?;
                if ctx.depth != parent.depth + 1 {
                    return Err(fault(format!(
                        "{} has depth {} but parent {parent_id} has depth {}",
                        ctx.id, ctx.depth, parent.depth
                    )));
                }
                if !parent.area.contains(&ElementId::Context(ctx.id)) {
                    return Err(fault(format!("{} is not listed in its parent's area", ctx.id)));
                }
            }
        }

        for element in &ctx.area {
            let owner = match element {
                ElementId::Vertex(id) => tables.vertices.get(id).map(|v| Some(v.context)),
                ElementId::Edge(id) => tables.edges.get(id).map(|e| Some(e.context)),
                ElementId::Context(id) => tables.contexts.get(id).map(|c| c.parent),
            };
            match owner {
                None => {
                    return Err(fault(format!("area of {} references missing {element}", ctx.id)));
                }
                Some(owner) if owner != Some(ctx.id) => {
                    return Err(fault(format!(
                        "{element} sits in the area of {} but records a different owner",
                        ctx.id
                    )));
                }
                Some(_) => {}
            }
            if let Some(previous) = owners.insert(*element, ctx.id) {
                return Err(fault(format!(
                    "{element} is owned by both {previous} and {}",
                    ctx.id
                )));
            }
        }
    }

    let universe = tables.vertices.len() + tables.edges.len() + tables.contexts.len() - 1;
    if owners.len() != universe {
        let orphan = tables
            .vertices
            .keys()
            .map(|id| ElementId::Vertex(*id))
            .chain(tables.edges.keys().map(|id| ElementId::Edge(*id)))
            .chain(
                tables
                    .contexts
                    .keys()
                    .filter(|id| **id != root)
                    .map(|id| ElementId::Context(*id)),
            )
            .find(|element| !owners.contains_key(element));
        return Err(fault(match orphan {
            Some(element) => format!("{element} is owned by no context"),
            None => format!("areas cover {} elements, universe has {universe}", owners.len()),
        }));
    }

    for edge in tables.edges.values() {
        if edge.identity && edge.args.len() < 2 {
            return Err(fault(format!("identity edge {} has fewer than 2 arguments", edge.id)));
        }
        for arg in &edge.args {
            let vertex = tables
                .vertices
                .get(arg)
                .ok_or_else(|| fault(format!("{} references missing {arg}", edge.id)))?;
            if !encloses(tables, vertex.context, edge.context) {
                return Err(fault(format!(
                    "{} in {} references {arg} from non-enclosing {}",
                    edge.id, edge.context, vertex.context
                )));
            }
        }
    }

    Ok(())
}

/// Whether `ancestor` is `context` or one of its enclosing contexts.
fn encloses(tables: &Tables, ancestor: ContextId, context: ContextId) -> bool {
    let mut current = Some(context);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = tables.contexts.get(&id).and_then(|c| c.parent);
    }
    false
}
