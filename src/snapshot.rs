//! Directory snapshots: which bank directories exist under a root.

use crate::bank::BankId;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Set of bank identifiers visible under a root at one instant.
pub type Snapshot = BTreeSet<BankId>;

/// Decides whether a directory name names a bank.
pub trait BankNamePolicy: Send + Sync {
    fn is_bank_name(&self, name: &str) -> bool;
}

impl<F> BankNamePolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_bank_name(&self, name: &str) -> bool {
        self(name)
    }
}

/// Regex-based policy. Matching is a prefix match: `^B\w+` accepts
/// `Bxyz123` as well as `B1-old`.
#[derive(Debug, Clone)]
pub struct PatternPolicy {
    pattern: Regex,
}

impl PatternPolicy {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid bank pattern {:?}: {}", pattern, e)))?;
        Ok(Self { pattern })
    }
}

impl BankNamePolicy for PatternPolicy {
    fn is_bank_name(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// Walks a tree and collects bank directory names.
pub struct DirectorySnapshot {
    policy: Box<dyn BankNamePolicy>,
}

impl DirectorySnapshot {
    pub fn new(policy: Box<dyn BankNamePolicy>) -> Self {
        Self { policy }
    }

    /// Turn a directory name into a [`BankId`] if the policy accepts it.
    pub fn identify(&self, name: &str) -> Option<BankId> {
        self.policy.is_bank_name(name).then(|| BankId::new(name))
    }

    /// Every directory below `root` whose name passes the policy.
    ///
    /// A missing root gives an empty set so the before/after diff stays
    /// defined on a first install. Unreadable entries are skipped.
    pub fn scan(&self, root: &Path) -> Snapshot {
        let mut ids = Snapshot::new();
        if !root.is_dir() {
            debug!(root = %root.display(), "scan root missing, empty snapshot");
            return ids;
        }

        for entry in WalkDir::new(root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = self.identify(name) {
                    ids.insert(id);
                }
            }
        }

        debug!(root = %root.display(), count = ids.len(), "scanned banks");
        ids
    }
}

/// Identifiers present after but not before.
pub fn new_banks(before: &Snapshot, after: &Snapshot) -> Vec<BankId> {
    after.difference(before).cloned().collect()
}
