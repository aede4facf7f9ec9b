//! Reconciliation of a fresh remote listing against the local cache

use std::collections::{BTreeSet, HashSet};

/// Partition of identity keys produced by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Remote keys unknown locally
    pub added: BTreeSet<String>,
    /// Keys present on both sides
    pub refreshed: BTreeSet<String>,
    /// Local keys gone remotely, excluding pending creations
    pub deleted: BTreeSet<String>,
}

/// Diff `remote` against `local`.
///
/// `creating` holds local keys that are drafts still being created; they are
/// never reported as deleted just because the backend has not caught up.
pub fn reconcile(
    local: &HashSet<String>,
    creating: &HashSet<String>,
    remote: &HashSet<String>,
) -> Reconciliation {
    Reconciliation {
        added: remote.difference(local).cloned().collect(),
        refreshed: local.intersection(remote).cloned().collect(),
        deleted: local
            .difference(remote)
            .filter(|key| !creating.contains(*key))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn tree(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_overlapping_sets() {
        let diff = reconcile(&set(&["a", "b"]), &set(&[]), &set(&["b", "c"]));
        assert_eq!(diff.added, tree(&["c"]));
        assert_eq!(diff.deleted, tree(&["a"]));
        assert_eq!(diff.refreshed, tree(&["b"]));
    }

    #[test]
    fn test_pending_creation_is_kept() {
        let diff = reconcile(&set(&["a", "draft"]), &set(&["draft"]), &set(&["a"]));
        assert!(diff.deleted.is_empty());
        assert_eq!(diff.refreshed, tree(&["a"]));
        assert!(diff.added.is_empty());
    }

    #[test]
    fn test_empty_remote_deletes_everything_settled() {
        let diff = reconcile(&set(&["a", "b"]), &set(&[]), &set(&[]));
        assert_eq!(diff.deleted, tree(&["a", "b"]));
        assert!(diff.added.is_empty() && diff.refreshed.is_empty());
    }
}
