//! Property-based tests using proptest
//!
//! These tests verify the reconciliation diff and identity helpers using
//! randomized key sets.

use cloudmirror::resource::id::{cache_key, format_id, ResourceId};
use cloudmirror::resource::reconcile;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Generate a small key space so local and remote sets overlap often
fn arb_keys() -> impl Strategy<Value = HashSet<String>> {
    prop::collection::hash_set("[a-h]", 0..8)
}

/// Local keys plus a subset of them still being created
fn arb_local_with_creating() -> impl Strategy<Value = (HashSet<String>, HashSet<String>)> {
    arb_keys().prop_flat_map(|local| {
        let keys: Vec<String> = local.iter().cloned().collect();
        let n = keys.len();
        (Just(local), prop::sample::subsequence(keys, 0..=n))
            .prop_map(|(local, creating)| (local, creating.into_iter().collect()))
    })
}

proptest! {
    /// added = R - L, deleted = (L - R) - C, refreshed = L ∩ R
    #[test]
    fn diff_matches_set_algebra(
        (local, creating) in arb_local_with_creating(),
        remote in arb_keys()
    ) {
        let diff = reconcile(&local, &creating, &remote);

        let added: BTreeSet<String> = remote.difference(&local).cloned().collect();
        let deleted: BTreeSet<String> = local
            .difference(&remote)
            .filter(|k| !creating.contains(*k))
            .cloned()
            .collect();
        let refreshed: BTreeSet<String> = local.intersection(&remote).cloned().collect();

        prop_assert_eq!(&diff.added, &added);
        prop_assert_eq!(&diff.deleted, &deleted);
        prop_assert_eq!(&diff.refreshed, &refreshed);
    }

    /// No key lands in two sets
    #[test]
    fn diff_sets_are_disjoint(
        (local, creating) in arb_local_with_creating(),
        remote in arb_keys()
    ) {
        let diff = reconcile(&local, &creating, &remote);
        prop_assert!(diff.added.is_disjoint(&diff.deleted));
        prop_assert!(diff.added.is_disjoint(&diff.refreshed));
        prop_assert!(diff.deleted.is_disjoint(&diff.refreshed));
    }

    /// Applying the diff to L yields R plus the pending creations
    #[test]
    fn applying_diff_converges(
        (local, creating) in arb_local_with_creating(),
        remote in arb_keys()
    ) {
        let diff = reconcile(&local, &creating, &remote);
        let mut cache: BTreeSet<String> = local.iter().cloned().collect();
        for key in &diff.deleted {
            cache.remove(key);
        }
        cache.extend(diff.added.iter().cloned());

        let mut expected: BTreeSet<String> = remote.iter().cloned().collect();
        expected.extend(creating.iter().cloned());
        prop_assert_eq!(cache, expected);
    }

    /// Pending creations are never deleted
    #[test]
    fn creating_keys_survive(
        (local, creating) in arb_local_with_creating(),
        remote in arb_keys()
    ) {
        let diff = reconcile(&local, &creating, &remote);
        for key in &creating {
            prop_assert!(!diff.deleted.contains(key));
        }
    }
}

mod identity_tests {
    use super::*;

    proptest! {
        /// A formatted id parses back to its name and module
        #[test]
        fn format_then_parse_keeps_name(
            parent in "(/[a-z][a-z0-9-]{0,8}){1,4}",
            module in "[a-z]{1,10}",
            name in "[a-zA-Z][a-zA-Z0-9-]{0,20}"
        ) {
            let id = format_id(&parent, &module, &name, "rg");
            let parsed = ResourceId::parse(&id).expect("formatted ids parse");
            prop_assert_eq!(parsed.name, name);
            prop_assert_eq!(parsed.module, module);
            prop_assert_eq!(parsed.parent, parent);
        }

        /// Cache keys ignore case
        #[test]
        fn cache_keys_are_case_insensitive(id in "[a-zA-Z/]{1,30}") {
            prop_assert_eq!(cache_key(&id), cache_key(&id.to_uppercase()));
        }
    }
}
