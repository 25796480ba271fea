//! Interchange format: a declarative record form of a graph.
//!
//! ## Layout
//!
//! - `contexts`: every context with its parent and depth, sheet first
//! - `entities`: vertices with their container and optional constant name
//! - `predicates`: ordinary edges with name, arity, container and arguments
//! - `ligatures`: identity edges, listing the entities they join
//!
//! Identity edges are the canonical model of a line of identity; the
//! `ligatures` list is how they are written down. Importing a document turns
//! each ligature entry back into an identity edge with the same id.
//!
//! ## Digest
//!
//! A sealed document carries the SHA-256 of its canonical JSON, computed with
//! the `digest` field cleared. Import recomputes and compares it; a document
//! without a digest is accepted unverified.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::builder::EgiBuilder;
use crate::calculus::Transformation;
use crate::canonical::to_canonical_bytes;
use crate::error::EgiError;
use crate::graph::Egi;
use crate::selection::Selection;
use crate::types::{
    Alphabet, ContextId, Edge, EdgeId, IdGenerator, Vertex, VertexId,
};

/// Schema tag written into every document.
pub const INTERCHANGE_SCHEMA_VERSION: &str = "egi_interchange_v1";

/// Interchange errors.
#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    /// JSON could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored digest does not match the document contents.
    #[error("Digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// Digest stored in the document.
        expected: String,
        /// Digest of the contents as read.
        computed: String,
    },

    /// The document describes an ill-formed graph.
    #[error("Model error: {0}")]
    Model(#[from] EgiError),

    /// Unknown schema version.
    #[error("Unsupported schema version: {0}")]
    SchemaVersion(String),
}

/// A context record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Context id.
    pub id: ContextId,
    /// Enclosing context; `None` for the sheet.
    pub parent: Option<ContextId>,
    /// Nesting depth.
    pub depth: u32,
}

/// A vertex record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Vertex id.
    pub id: VertexId,
    /// Owning context.
    pub container: ContextId,
    /// Constant name for constant vertices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
}

/// An ordinary relation edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateRecord {
    /// Edge id.
    pub id: EdgeId,
    /// Relation name.
    pub name: String,
    /// Number of arguments.
    pub arity: usize,
    /// Owning context.
    pub container: ContextId,
    /// Argument vertices, in order.
    pub arguments: Vec<VertexId>,
}

/// An identity edge written as a ligature link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LigatureRecord {
    /// Edge id.
    pub id: EdgeId,
    /// Owning context.
    pub container: ContextId,
    /// Joined vertices.
    pub entities: Vec<VertexId>,
}

/// Declarative record form of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeDocument {
    /// Always [`INTERCHANGE_SCHEMA_VERSION`].
    pub schema_version: String,
    /// Id of the sheet of assertion.
    pub sheet: ContextId,
    /// Contexts ordered by depth, then id.
    pub contexts: Vec<ContextRecord>,
    /// Vertices.
    pub entities: Vec<EntityRecord>,
    /// Ordinary edges.
    pub predicates: Vec<PredicateRecord>,
    /// Identity edges.
    pub ligatures: Vec<LigatureRecord>,
    /// The graph's alphabet.
    pub alphabet: Alphabet,
    /// SHA-256 hex of the canonical JSON with this field cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl InterchangeDocument {
    /// Record form of `egi`, unsealed.
    pub fn from_egi(egi: &Egi) -> Self {
        let mut contexts: Vec<ContextRecord> = egi
            .contexts()
            .map(|c| ContextRecord {
                id: c.id,
                parent: c.parent,
                depth: c.depth,
            })
            .collect();
        contexts.sort_by_key(|c| (c.depth, c.id));

        let entities = egi
            .vertices()
            .map(|v| EntityRecord {
                id: v.id,
                container: v.context,
                constant: v.constant.clone(),
            })
            .collect();

        let (identities, relations): (Vec<&Edge>, Vec<&Edge>) = egi.edges().partition(|e| e.identity);
        let predicates = relations
            .into_iter()
            .map(|e| PredicateRecord {
                id: e.id,
                name: e.relation.clone(),
                arity: e.arity(),
                container: e.context,
                arguments: e.args.clone(),
            })
            .collect();
        let ligatures = identities
            .into_iter()
            .map(|e| LigatureRecord {
                id: e.id,
                container: e.context,
                entities: e.args.clone(),
            })
            .collect();

        Self {
            schema_version: INTERCHANGE_SCHEMA_VERSION.to_string(),
            sheet: egi.root_id(),
            contexts,
            entities,
            predicates,
            ligatures,
            alphabet: egi.alphabet().clone(),
            digest: None,
        }
    }

    /// Digest of the contents, ignoring any stored digest.
    pub fn compute_digest(&self) -> String {
        let unsealed = Self {
            digest: None,
            ..self.clone()
        };
        let mut hasher = Sha256::new();
        hasher.update(to_canonical_bytes(&unsealed));
        hex::encode(hasher.finalize())
    }

    /// Store the digest of the current contents.
    pub fn seal(mut self) -> Self {
        self.digest = Some(self.compute_digest());
        self
    }

    /// Check the stored digest, if any.
    pub fn verify_digest(&self) -> Result<(), InterchangeError> {
        let Some(expected) = &self.digest else {
            return Ok(());
        };
        let computed = self.compute_digest();
        if *expected != computed {
            return Err(InterchangeError::DigestMismatch {
                expected: expected.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Rebuild the graph, keeping every id.
    pub fn to_egi(&self) -> Result<Egi, InterchangeError> {
        if self.schema_version != INTERCHANGE_SCHEMA_VERSION {
            return Err(InterchangeError::SchemaVersion(self.schema_version.clone()));
        }
        self.verify_digest()?;

        let ids = IdGenerator::resuming_after(
            self.contexts
                .iter()
                .map(|c| c.id.as_uuid())
                .chain(self.entities.iter().map(|e| e.id.as_uuid()))
                .chain(self.predicates.iter().map(|p| p.id.as_uuid()))
                .chain(self.ligatures.iter().map(|l| l.id.as_uuid())),
        );
        let mut builder = EgiBuilder::with_root(self.sheet, ids, self.alphabet.clone());

        let mut placed = BTreeSet::from([self.sheet]);
        let mut pending: Vec<&ContextRecord> =
            self.contexts.iter().filter(|c| c.id != self.sheet).collect();
        while !pending.is_empty() {
            let waiting = pending.len();
            let mut deferred = Vec::new();
            for record in pending {
                match record.parent {
                    None => {
                        return Err(EgiError::malformed(record.id, "second context without a parent").into());
                    }
                    Some(parent) if placed.contains(&parent) => {
                        builder.add_cut_with_id(record.id, parent)?;
                        placed.insert(record.id);
                    }
                    Some(_) => deferred.push(record),
                }
            }
            if deferred.len() == waiting {
                return Err(EgiError::malformed(
                    deferred[0].id,
                    "parent is missing or nesting is cyclic",
                )
                .into());
            }
            pending = deferred;
        }

        for record in &self.entities {
            builder.insert_vertex(Vertex::new(
                record.id,
                record.container,
                record.constant.is_some(),
                record.constant.clone(),
            )?)?;
        }
        for record in &self.predicates {
            if record.arity != record.arguments.len() {
                return Err(EgiError::malformed(
                    record.id,
                    format!("arity {} but {} arguments", record.arity, record.arguments.len()),
                )
                .into());
            }
            builder.insert_edge(Edge::new(
                record.id,
                record.container,
                record.name.as_str(),
                record.arguments.clone(),
            )?)?;
        }
        for record in &self.ligatures {
            builder.insert_edge(Edge::identity(record.id, record.container, record.entities.clone())?)?;
        }

        let egi = builder.build()?;
        for record in &self.contexts {
            let actual = egi.context(record.id)?;
            if actual.depth != record.depth || actual.parent != record.parent {
                return Err(EgiError::malformed(
                    record.id,
                    format!(
                        "recorded depth {} does not match nesting depth {}",
                        record.depth, actual.depth
                    ),
                )
                .into());
            }
        }
        Ok(egi)
    }
}

/// Sealed record form of `egi`.
pub fn to_document(egi: &Egi) -> InterchangeDocument {
    InterchangeDocument::from_egi(egi).seal()
}

/// Rebuild a graph from a document.
pub fn from_document(document: &InterchangeDocument) -> Result<Egi, InterchangeError> {
    document.to_egi()
}

/// Sealed document as pretty JSON.
pub fn to_json(egi: &Egi) -> Result<String, InterchangeError> {
    Ok(serde_json::to_string_pretty(&to_document(egi))?)
}

/// Parse and rebuild a graph from JSON.
pub fn from_json(json: &str) -> Result<Egi, InterchangeError> {
    let document: InterchangeDocument = serde_json::from_str(json)?;
    document.to_egi()
}

/// One transformation in a replay script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Erasure.
    Erase {
        /// What to erase.
        selection: Selection,
    },
    /// Insertion of a fragment.
    Insert {
        /// Negative target context.
        context: ContextId,
        /// The fragment.
        fragment: InterchangeDocument,
    },
    /// Iteration.
    Iterate {
        /// What to copy.
        source: Selection,
        /// Where to put the copy.
        destination: ContextId,
    },
    /// De-iteration.
    Deiterate {
        /// Occurrence to remove.
        copy: Selection,
        /// Occurrence that stays.
        original: Selection,
    },
    /// Double-cut addition.
    AddDoubleCut {
        /// What to enclose; may be empty.
        selection: Selection,
    },
    /// Double-cut removal.
    RemoveDoubleCut {
        /// Outer cut of the ring.
        outer: ContextId,
    },
    /// Isolated-vertex addition.
    AddIsolatedVertex {
        /// Receiving context.
        context: ContextId,
        /// Constant name.
        #[serde(default)]
        constant: Option<String>,
    },
    /// Isolated-vertex removal.
    RemoveIsolatedVertex {
        /// The vertex.
        vertex: VertexId,
    },
}

impl ScriptStep {
    /// The transformation this step describes.
    pub fn to_transformation(&self) -> Result<Transformation, InterchangeError> {
        Ok(match self {
            ScriptStep::Erase { selection } => Transformation::Erase(selection.clone()),
            ScriptStep::Insert { context, fragment } => Transformation::Insert {
                context: *context,
                fragment: Arc::new(fragment.to_egi()?),
            },
            ScriptStep::Iterate { source, destination } => Transformation::Iterate {
                source: source.clone(),
                destination: *destination,
            },
            ScriptStep::Deiterate { copy, original } => Transformation::Deiterate {
                copy: copy.clone(),
                original: original.clone(),
            },
            ScriptStep::AddDoubleCut { selection } => Transformation::AddDoubleCut(selection.clone()),
            ScriptStep::RemoveDoubleCut { outer } => Transformation::RemoveDoubleCut(*outer),
            ScriptStep::AddIsolatedVertex { context, constant } => Transformation::AddIsolatedVertex {
                context: *context,
                constant: constant.clone(),
            },
            ScriptStep::RemoveIsolatedVertex { vertex } => Transformation::RemoveIsolatedVertex(*vertex),
        })
    }
}

/// A starting graph and a sequence of transformations to replay on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Starting graph.
    pub graph: InterchangeDocument,
    /// Steps, applied in order.
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl ReplayScript {
    /// Parse a script from JSON.
    pub fn from_json(json: &str) -> Result<Self, InterchangeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The starting graph.
    pub fn initial_graph(&self) -> Result<Egi, InterchangeError> {
        self.graph.to_egi()
    }

    /// Every step as a transformation.
    pub fn transformations(&self) -> Result<Vec<Transformation>, InterchangeError> {
        self.steps.iter().map(ScriptStep::to_transformation).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::equivalent;
    use crate::types::ElementId;

    fn sample() -> Egi {
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let outer = b.add_cut(sheet).unwrap();
        let x = b.add_vertex(outer).unwrap();
        b.add_edge(outer, "Man", vec![x]).unwrap();
        let inner = b.add_cut(outer).unwrap();
        let y = b.add_vertex(inner).unwrap();
        b.add_edge(inner, "Mortal", vec![y]).unwrap();
        b.add_identity(inner, vec![x, y]).unwrap();
        let s = b.add_constant(sheet, "Socrates").unwrap();
        b.add_edge(sheet, "Man", vec![s]).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_json_round_trip_keeps_ids() {
        let egi = sample();
        let json = to_json(&egi).unwrap();
        let back = from_json(&json).unwrap();

        assert_eq!(back.fingerprint(), egi.fingerprint());
        assert!(equivalent(&back, &egi));
        assert!(back.alphabet().has_constant("Socrates"));
    }

    #[test]
    fn test_identity_edges_become_ligature_records() {
        let document = to_document(&sample());
        assert_eq!(document.ligatures.len(), 1);
        assert_eq!(document.predicates.len(), 3);
        assert_eq!(document.contexts[0].id, document.sheet);
        assert_eq!(document.ligatures[0].entities.len(), 2);
    }

    #[test]
    fn test_tampered_document_is_rejected() {
        let mut document = to_document(&sample());
        document.predicates[0].name = "Woman".to_string();
        let err = from_document(&document).unwrap_err();
        assert!(matches!(err, InterchangeError::DigestMismatch { .. }));

        // Without a digest the same edit is accepted.
        document.digest = None;
        assert!(from_document(&document).is_ok());
    }

    #[test]
    fn test_wrong_depth_is_rejected() {
        let mut document = InterchangeDocument::from_egi(&sample());
        document.contexts[1].depth = 5;
        let err = from_document(&document).unwrap_err();
        assert!(matches!(err, InterchangeError::Model(EgiError::MalformedEntity { .. })));
    }

    #[test]
    fn test_imported_graph_mints_fresh_ids() {
        let egi = from_json(&to_json(&sample()).unwrap()).unwrap();
        let next = egi.id_generator().peek();
        assert!(egi.vertices().all(|v| v.id.as_uuid().as_u128() < next));
    }

    #[test]
    fn test_replay_script_parses() {
        let egi = sample();
        let script = ReplayScript {
            graph: to_document(&egi),
            steps: vec![
                ScriptStep::AddDoubleCut {
                    selection: Selection::empty(egi.root_id()),
                },
                ScriptStep::AddIsolatedVertex {
                    context: egi.root_id(),
                    constant: Some("Plato".into()),
                },
            ],
        };
        let json = serde_json::to_string(&script).unwrap();
        assert!(json.contains("\"rule\":\"add_double_cut\""));

        let parsed = ReplayScript::from_json(&json).unwrap();
        assert_eq!(parsed, script);
        let transformations = parsed.transformations().unwrap();
        assert_eq!(transformations.len(), 2);
        assert_eq!(
            transformations[1].targets(),
            vec![ElementId::Context(egi.root_id())]
        );
    }
}
