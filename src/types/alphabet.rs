//! The alphabet of a graph: declared relation and constant names.
//!
//! A strict alphabet is fixed: using an undeclared name is a construction
//! error. An open alphabet records names as they are first used. In both
//! modes a relation declared with an arity only accepts that arity.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use super::edge::IDENTITY_RELATION;
use crate::error::EgiError;

/// Names may not be empty and may not contain whitespace, parentheses or commas.
const NAME_PATTERN: &str = r"^[^\s(),]+$";

fn name_regex() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern is a valid regex"))
}

/// Check a relation or constant name against the name syntax.
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// Declared vocabulary of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    /// Relation names with their fixed arity, if one was declared.
    pub relations: BTreeMap<String, Option<usize>>,
    /// Constant names.
    pub constants: BTreeSet<String>,
    /// Whether undeclared names are rejected.
    pub strict: bool,
}

impl Alphabet {
    /// Open alphabet that grows as names are used.
    pub fn open() -> Self {
        Self::default()
    }

    /// Fixed alphabet; declare every name before use.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Declare a relation, optionally with a fixed arity.
    pub fn with_relation(mut self, name: &str, arity: Option<usize>) -> Result<Self, EgiError> {
        self.declare_relation(name, arity)?;
        Ok(self)
    }

    /// Declare a constant.
    pub fn with_constant(mut self, name: &str) -> Result<Self, EgiError> {
        self.declare_constant(name)?;
        Ok(self)
    }

    /// Declare a relation in place.
    pub fn declare_relation(&mut self, name: &str, arity: Option<usize>) -> Result<(), EgiError> {
        if !is_valid_name(name) {
            return Err(EgiError::malformed(name, "invalid relation name"));
        }
        if name == IDENTITY_RELATION {
            return Err(EgiError::malformed(name, "the identity relation is built in"));
        }
        match self.relations.get(name) {
            Some(Some(existing)) if arity.is_some() && arity != Some(*existing) => {
                Err(EgiError::malformed(
                    name,
                    format!("relation already declared with arity {existing}"),
                ))
            }
            Some(Some(_)) => Ok(()),
            _ => {
                self.relations.insert(name.to_string(), arity);
                Ok(())
            }
        }
    }

    /// Declare a constant in place.
    pub fn declare_constant(&mut self, name: &str) -> Result<(), EgiError> {
        if !is_valid_name(name) {
            return Err(EgiError::malformed(name, "invalid constant name"));
        }
        self.constants.insert(name.to_string());
        Ok(())
    }

    /// Whether the relation is known (the identity relation always is).
    pub fn has_relation(&self, name: &str) -> bool {
        name == IDENTITY_RELATION || self.relations.contains_key(name)
    }

    /// Whether the constant is known.
    pub fn has_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// Admit a relation occurrence with `arity`, recording it if the alphabet is open.
    pub fn admit_relation(&mut self, name: &str, arity: usize) -> Result<(), EgiError> {
        if name == IDENTITY_RELATION {
            return Ok(());
        }
        if !is_valid_name(name) {
            return Err(EgiError::malformed(name, "invalid relation name"));
        }
        match self.relations.get(name) {
            Some(Some(declared)) if *declared != arity => Err(EgiError::malformed(
                name,
                format!("relation has arity {declared}, used with {arity}"),
            )),
            Some(_) => Ok(()),
            None if self.strict => Err(EgiError::malformed(name, "relation not in alphabet")),
            None => {
                self.relations.insert(name.to_string(), Some(arity));
                Ok(())
            }
        }
    }

    /// Admit a constant occurrence, recording it if the alphabet is open.
    pub fn admit_constant(&mut self, name: &str) -> Result<(), EgiError> {
        if !is_valid_name(name) {
            return Err(EgiError::malformed(name, "invalid constant name"));
        }
        if self.constants.contains(name) {
            return Ok(());
        }
        if self.strict {
            return Err(EgiError::malformed(name, "constant not in alphabet"));
        }
        self.constants.insert(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_syntax() {
        assert!(is_valid_name("Man"));
        assert!(is_valid_name("loves'"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("two words"));
        assert!(!is_valid_name("f(x)"));
    }

    #[test]
    fn test_open_alphabet_records_usage() {
        let mut alphabet = Alphabet::open();
        alphabet.admit_relation("Loves", 2).unwrap();
        assert_eq!(alphabet.relations.get("Loves"), Some(&Some(2)));
        assert!(alphabet.admit_relation("Loves", 3).is_err());
    }

    #[test]
    fn test_strict_alphabet_rejects_undeclared() {
        let mut alphabet = Alphabet::strict().with_relation("Man", Some(1)).unwrap();
        assert!(alphabet.admit_relation("Man", 1).is_ok());
        assert!(alphabet.admit_relation("Mortal", 1).is_err());
        assert!(alphabet.admit_constant("Socrates").is_err());
        assert!(alphabet.admit_relation(IDENTITY_RELATION, 3).is_ok());
    }

    #[test]
    fn test_identity_cannot_be_declared() {
        assert!(Alphabet::open().with_relation("=", Some(2)).is_err());
    }
}
