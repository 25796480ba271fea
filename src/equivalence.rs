//! Structural equivalence of whole graphs, irrespective of identifiers.
//!
//! Used by tests and by interchange round-trip verification. The calculus
//! never consults it when deciding legality.

use crate::canonical::canonical_hash_hex;
use crate::graph::Egi;
use crate::matching::{self, MatchRules, Region, Signatures};

pub use crate::matching::Mapping as Isomorphism;

/// Find an id bijection under which `a` and `b` have the same structure.
///
/// The bijection preserves nesting, constant names, relation names,
/// argument positions and which vertex occurrences share a line of identity.
pub fn find_isomorphism(a: &Egi, b: &Egi) -> Option<Isomorphism> {
    let left = Region::whole(a).ok()?;
    let right = Region::whole(b).ok()?;
    matching::find(&left, &right, MatchRules::default())
}

/// Whether `a` and `b` represent the same logical structure.
///
/// Identity edges count by the vertices they join in each area, so the
/// number of identity edges may differ between equivalent graphs.
pub fn equivalent(a: &Egi, b: &Egi) -> bool {
    if a.num_vertices() != b.num_vertices() || a.num_contexts() != b.num_contexts() {
        return false;
    }
    find_isomorphism(a, b).is_some()
}

/// Id-independent fingerprint (xxh64 hex).
///
/// Equivalent graphs always share a shape fingerprint; the converse is
/// likely but not guaranteed, so confirm with [`equivalent`].
pub fn shape_fingerprint(egi: &Egi) -> String {
    match Region::whole(egi) {
        Ok(region) => {
            let signatures = Signatures::compute(&region);
            canonical_hash_hex(&signatures.summary(&region))
        }
        Err(_) => canonical_hash_hex(&"unreadable"),
    }
}
