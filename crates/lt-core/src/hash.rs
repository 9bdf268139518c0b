//! Fast hash map aliases.
//!
//! Label maps produced downstream of the tailer are small, keyed by short
//! strings, and never exposed to untrusted key sets, so the Fx hash from
//! `rustc-hash` is used instead of the standard SipHash.
//!
//! # Examples
//!
//! ```
//! use lt_core::{Labels, fx_hash_map};
//!
//! let mut labels: Labels = fx_hash_map();
//! labels.insert("user".to_owned(), "alice".to_owned());
//! assert_eq!(labels.len(), 1);
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A label-name to label-value map, as consumed by the mutation stage.
pub type Labels = FxHashMap<String, String>;

/// Creates a new empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}
