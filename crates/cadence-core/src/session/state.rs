//! Merge semantics for the session state map.
//!
//! The state map is an accumulating bag: updates overlay existing keys and
//! a `null` value removes a key. Wholesale replacement only happens when a
//! step asks for a reset.

use serde_json::{Map, Value};

/// Free-form key/value state carried by a session.
pub type StateMap = Map<String, Value>;

/// Overlays `updates` onto `state`.
///
/// Keys mapped to `Value::Null` are removed from `state`.
pub fn merge_state(state: &mut StateMap, updates: StateMap) {
    for (key, value) in updates {
        if value.is_null() {
            state.remove(&key);
        } else {
            state.insert(key, value);
        }
    }
}
