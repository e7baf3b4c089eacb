//! Generators for entry trees

use proptest::prelude::*;
use twinsync::tree::Entry;

/// Arbitrary entry with a small name alphabet so that trees overlap often
pub fn arb_entry() -> impl Strategy<Value = Entry> {
    let leaf = prop_oneof![
        // Sizes follow the digest, as they would for real content.
        (prop::collection::vec(any::<u8>(), 1..4), any::<bool>()).prop_map(|(digest, executable)| {
            let size = digest.len() as u64;
            Entry::file(digest, executable, size)
        }),
        "[a-c]{1,3}".prop_map(|target: String| Entry::symlink(target)),
        Just(Entry::empty_directory()),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop::collection::btree_map("[a-d]", inner, 0..4).prop_map(|contents| Entry::Directory { contents })
    })
}

pub fn arb_tree() -> impl Strategy<Value = Option<Entry>> {
    prop::option::of(arb_entry())
}
