//! # egi-kernel
//!
//! Existential Graph Instances and Peirce's beta calculus.
//!
//! An [`Egi`] is a sheet of assertion holding vertices (individuals),
//! edges (relations over vertices) and nested cuts (negations). Vertices
//! joined by identity edges form a ligature, a line of identity that may
//! cross cuts. Graphs are immutable: the eight rules of [`Calculus`] each
//! take a graph and return a new one that shares every untouched part with
//! its input.
//!
//! ## Core Contract
//!
//! 1. A graph exists only if the invariant validator accepts it
//! 2. A rule either returns a new valid graph or fails with a typed
//!    [`EgiError`] naming the offending ids, leaving the input untouched
//! 3. Identical construction sequences produce identical ids
//!
//! ## Architecture
//!
//! ```text
//! ConstructionStep → EgiBuilder → Egi ──Calculus──▶ Egi ──▶ …
//!                                  │                 │
//!                                  └── Lineage (versioned head, CAS) ──┘
//!                                  │
//!                   interchange (records + SHA-256 digest)
//! ```
//!
//! ## Polarity
//!
//! The sheet has depth 0. A context at even depth is positive (asserted),
//! at odd depth negative (denied). Erasure is only legal in positive
//! contexts and insertion only in negative ones; the remaining rules are
//! polarity-neutral.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod graph;
pub mod builder;
pub mod ligature;
pub mod selection;
pub mod calculus;
pub mod equivalence;
pub mod interchange;
pub mod lineage;
pub mod canonical;

mod invariants;
mod matching;

// Re-exports
pub use types::{
    Alphabet, Context, ContextId, Edge, EdgeId, ElementId, IdGenerator, Polarity, Vertex,
    VertexId, IDENTITY_RELATION,
};
pub use error::{EgiError, ErrorKind};
pub use graph::{Egi, GraphIndex};
pub use builder::{ConstructionStep, EgiBuilder, StepRef};
pub use ligature::LigatureIndex;
pub use selection::{Closure, Selection};
pub use calculus::{Calculus, CalculusConfig, Rewrite, Rule, Transformation};
pub use equivalence::{equivalent, find_isomorphism, shape_fingerprint, Isomorphism};
pub use interchange::{
    from_document, from_json, to_document, to_json, InterchangeDocument, InterchangeError,
    ReplayScript, ScriptStep, INTERCHANGE_SCHEMA_VERSION,
};
pub use lineage::{Commit, HistoryConfig, JournalEntry, Lineage, LineageError};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

/// Default calculus version identifier.
pub const DEFAULT_CALCULUS_VERSION: &str = "peirce_beta_v1";
