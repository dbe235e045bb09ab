use proptest::prelude::*;

/// Upper-case state or event names like `MPD_DONE`
pub fn state_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Z_]{0,15}".prop_map(|s| s)
}

/// Priorities including negatives and ties
pub fn priorities_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-5i32..5, 1..24)
}

/// A linear chain of distinct states
pub fn state_chain_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(state_name_strategy(), 2..8)
        .prop_map(|states| states.into_iter().collect())
}
