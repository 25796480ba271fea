//! Contexts: the sheet of assertion and the cuts nested inside it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::ids::{ContextId, ElementId};

/// Polarity of a context, derived from its depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Even depth: contents are asserted.
    Positive,
    /// Odd depth: contents are denied.
    Negative,
}

impl Polarity {
    /// Polarity of a context at `depth`.
    pub fn from_depth(depth: u32) -> Self {
        if depth % 2 == 0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    /// The other polarity.
    pub fn flip(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// The sheet of assertion (no parent, depth 0) or a cut.
///
/// `area` holds the elements directly contained in this context, one level
/// deep. Across all contexts of a graph the areas partition the element
/// universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Context identifier.
    pub id: ContextId,
    /// Enclosing context; `None` only for the sheet.
    pub parent: Option<ContextId>,
    /// Nesting depth (sheet = 0).
    pub depth: u32,
    /// Directly contained elements.
    pub area: BTreeSet<ElementId>,
}

impl Context {
    /// Create the sheet of assertion.
    pub fn sheet(id: ContextId) -> Self {
        Self {
            id,
            parent: None,
            depth: 0,
            area: BTreeSet::new(),
        }
    }

    /// Create an empty cut inside `parent`.
    pub fn cut(id: ContextId, parent: &Context) -> Self {
        Self {
            id,
            parent: Some(parent.id),
            depth: parent.depth + 1,
            area: BTreeSet::new(),
        }
    }

    /// Whether this is the sheet of assertion.
    pub fn is_sheet(&self) -> bool {
        self.parent.is_none()
    }

    /// Polarity of this context.
    pub fn polarity(&self) -> Polarity {
        Polarity::from_depth(self.depth)
    }

    /// Whether `element` sits directly in this context.
    pub fn contains(&self, element: &ElementId) -> bool {
        self.area.contains(element)
    }

    /// Child cuts directly inside this context.
    pub fn child_cuts(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.area.iter().filter_map(ElementId::as_context)
    }
}
