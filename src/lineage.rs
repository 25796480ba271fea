//! Versioned lineage of graph snapshots.
//!
//! The calculus is pure, so it says nothing about who owns "the current
//! graph". [`Lineage`] is that owner for embedders with several writers: a
//! version-stamped head, updated by compare-and-swap, plus an LRU of recent
//! snapshots and a bounded journal of applied rules.
//!
//! ## Concurrency
//!
//! Readers clone the head `Arc` under a read lock and never wait on a rule.
//! A writer computes the rewrite outside any lock, then takes the write lock
//! and installs the result only if the head still has the version it started
//! from. Otherwise it gets [`LineageError::Stale`] and nothing changes.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::calculus::{Calculus, Rule, Transformation};
use crate::error::EgiError;
use crate::graph::Egi;
use crate::types::ElementId;

/// Snapshot and journal retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of past snapshots kept.
    pub max_snapshots: usize,
    /// Whether past snapshots are kept at all.
    pub enabled: bool,
    /// Maximum number of journal entries kept; the oldest are dropped first.
    pub max_journal_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_snapshots: 64,
            enabled: true,
            max_journal_entries: 4096,
        }
    }
}

/// Lineage errors.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    /// Another writer advanced the head first.
    #[error("Stale write: expected version {expected}, head is at {actual}")]
    Stale {
        /// Version the caller based its write on.
        expected: u64,
        /// Version the head has now.
        actual: u64,
    },

    /// The rule itself failed.
    #[error("Rule failed: {0}")]
    Rule(#[from] EgiError),
}

/// One applied transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Version the transformation produced.
    pub version: u64,
    /// Rule applied.
    pub rule: Rule,
    /// Elements named by the transformation.
    pub targets: Vec<ElementId>,
    /// Top-level elements created.
    pub created: Vec<ElementId>,
    /// Top-level elements removed.
    pub removed: Vec<ElementId>,
    /// Id-based fingerprint of the new graph.
    pub fingerprint: String,
    /// Hash of the calculus configuration in force.
    pub params_hash: String,
    /// Wall-clock time of the commit.
    pub applied_at: DateTime<Utc>,
}

/// A successful write.
#[derive(Debug, Clone)]
pub struct Commit {
    /// New head version.
    pub version: u64,
    /// New head graph.
    pub graph: Arc<Egi>,
    /// Top-level elements created.
    pub created: Vec<ElementId>,
    /// Top-level elements removed.
    pub removed: Vec<ElementId>,
}

struct Head {
    version: u64,
    graph: Arc<Egi>,
}

/// Single-writer-at-a-time owner of a current graph.
pub struct Lineage {
    calculus: Calculus,
    head: RwLock<Head>,
    history: Option<Mutex<LruCache<u64, Arc<Egi>>>>,
    journal: Mutex<VecDeque<JournalEntry>>,
    journal_limit: usize,
}

impl Lineage {
    /// Lineage whose version 0 is `egi`.
    pub fn new(egi: Egi, calculus: Calculus, config: HistoryConfig) -> Self {
        let history = if config.enabled {
            let size = NonZeroUsize::new(config.max_snapshots).unwrap_or(NonZeroUsize::MIN);
            Some(Mutex::new(LruCache::new(size)))
        } else {
            None
        };
        let graph = Arc::new(egi);
        if let Some(cache) = &history {
            cache.lock().put(0, Arc::clone(&graph));
        }
        Self {
            calculus,
            head: RwLock::new(Head { version: 0, graph }),
            history,
            journal: Mutex::new(VecDeque::new()),
            journal_limit: config.max_journal_entries,
        }
    }

    /// Head version and graph.
    pub fn current(&self) -> (u64, Arc<Egi>) {
        let head = self.head.read();
        (head.version, Arc::clone(&head.graph))
    }

    /// Head version.
    pub fn version(&self) -> u64 {
        self.head.read().version
    }

    /// The engine this lineage applies rules with.
    pub fn calculus(&self) -> &Calculus {
        &self.calculus
    }

    /// Apply `transformation` to the head if it is still at `expected_version`.
    pub fn apply(
        &self,
        expected_version: u64,
        transformation: &Transformation,
    ) -> Result<Commit, LineageError> {
        let (version, base) = self.current();
        if version != expected_version {
            return Err(self.stale(expected_version, version, transformation.rule()));
        }

        let rewrite = self.calculus.apply(&base, transformation)?;
        let graph = Arc::new(rewrite.graph);

        let mut head = self.head.write();
        if head.version != expected_version {
            let actual = head.version;
            drop(head);
            return Err(self.stale(expected_version, actual, transformation.rule()));
        }
        let version = head.version + 1;
        head.version = version;
        head.graph = Arc::clone(&graph);

        // Still under the head lock so journal order matches version order.
        if let Some(cache) = &self.history {
            cache.lock().put(version, Arc::clone(&graph));
        }
        let mut journal = self.journal.lock();
        journal.push_back(JournalEntry {
            version,
            rule: rewrite.rule,
            targets: transformation.targets(),
            created: rewrite.created.clone(),
            removed: rewrite.removed.clone(),
            fingerprint: graph.fingerprint(),
            params_hash: self.calculus.config().params_hash(),
            applied_at: Utc::now(),
        });
        while journal.len() > self.journal_limit {
            journal.pop_front();
        }
        drop(journal);
        drop(head);

        tracing::info!(version, rule = %rewrite.rule, "lineage advanced");
        Ok(Commit {
            version,
            graph,
            created: rewrite.created,
            removed: rewrite.removed,
        })
    }

    /// Apply to whatever the head is now.
    ///
    /// Still fails with [`LineageError::Stale`] if another writer commits
    /// while the rule is being computed.
    pub fn apply_to_head(&self, transformation: &Transformation) -> Result<Commit, LineageError> {
        self.apply(self.version(), transformation)
    }

    fn stale(&self, expected: u64, actual: u64, rule: Rule) -> LineageError {
        tracing::warn!(expected, actual, rule = %rule, "stale lineage write rejected");
        LineageError::Stale { expected, actual }
    }

    /// A retained snapshot, or the head if `version` is current.
    pub fn snapshot(&self, version: u64) -> Option<Arc<Egi>> {
        {
            let head = self.head.read();
            if head.version == version {
                return Some(Arc::clone(&head.graph));
            }
        }
        self.history
            .as_ref()
            .and_then(|cache| cache.lock().get(&version).cloned())
    }

    /// Retained commits, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().iter().cloned().collect()
    }
}
