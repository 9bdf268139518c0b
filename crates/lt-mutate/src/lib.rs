//! Label mutation for values extracted from tailed log lines.
//!
//! A pipeline built on top of the tailer turns each line into a map of
//! label names to values. Mutators rewrite those values in place before
//! they are used, e.g. to collapse IDs inside URL paths.
//!
//! Only the `gsub` filter exists: for each `(label, pattern, replacement)`
//! triple, every match of `pattern` in the label's value is replaced.
//!
//! # Examples
//!
//! ```
//! use lt_core::{Labels, fx_hash_map};
//! use lt_mutate::{MutateConfig, create_mutators};
//!
//! let config: MutateConfig = serde_json::from_str(
//!     r#"{ "filter": "gsub", "input": ["path", "[0-9]+", "N"] }"#,
//! ).unwrap();
//! let mutators = create_mutators(&[config]).unwrap();
//!
//! let mut labels: Labels = fx_hash_map();
//! labels.insert("path".to_owned(), "/orders/1234".to_owned());
//! for mutator in &mutators {
//!     mutator.apply(&mut labels);
//! }
//! assert_eq!(labels["path"], "/orders/N");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod gsub;

use lt_core::Labels;
use serde::{Deserialize, Serialize};

pub use error::MutateError;
pub use gsub::GsubMutator;

/// Rewrites label values in place.
pub trait Mutator: Send + Sync + std::fmt::Debug {
    /// Applies the mutation. A label that is not present is treated as
    /// empty and inserted with the result.
    fn apply(&self, labels: &mut Labels);
}

/// Configuration for one mutator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutateConfig {
    /// The filter name. Only `gsub` is supported.
    pub filter: String,

    /// Filter arguments. For `gsub`, a flat list of
    /// `label, pattern, replacement` triples.
    pub input: Vec<String>,
}

impl MutateConfig {
    /// Creates a `gsub` configuration from `(label, pattern, replacement)`
    /// rules.
    #[must_use]
    pub fn gsub<'a>(rules: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        Self {
            filter: "gsub".to_owned(),
            input: rules
                .into_iter()
                .flat_map(|(label, pattern, replacement)| [label, pattern, replacement])
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Builds one mutator per configuration entry, in order.
///
/// # Errors
///
/// Fails on the first entry with an unsupported filter name, a malformed
/// input list or a pattern that does not compile.
pub fn create_mutators(configs: &[MutateConfig]) -> Result<Vec<Box<dyn Mutator>>, MutateError> {
    configs.iter().map(create_mutator).collect()
}

fn create_mutator(config: &MutateConfig) -> Result<Box<dyn Mutator>, MutateError> {
    match config.filter.as_str() {
        "gsub" => Ok(Box::new(GsubMutator::from_input(&config.input)?)),
        other => Err(MutateError::UnsupportedFilter(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_core::fx_hash_map;

    #[test]
    fn test_create_mutators_in_order() {
        let configs = [
            MutateConfig::gsub([("status", "^2..$", "2xx")]),
            MutateConfig::gsub([("status", "xx$", "XX")]),
        ];
        let mutators = create_mutators(&configs).unwrap();
        assert_eq!(mutators.len(), 2);

        let mut labels: Labels = fx_hash_map();
        labels.insert("status".to_owned(), "204".to_owned());
        for mutator in &mutators {
            mutator.apply(&mut labels);
        }
        assert_eq!(labels["status"], "2XX");
    }

    #[test]
    fn test_unsupported_filter() {
        let config = MutateConfig {
            filter: "split".to_owned(),
            input: Vec::new(),
        };
        let err = create_mutators(&[config]).unwrap_err();
        assert!(matches!(err, MutateError::UnsupportedFilter(name) if name == "split"));
    }

    #[test]
    fn test_invalid_pattern_fails_construction() {
        let err = create_mutators(&[MutateConfig::gsub([("a", "[", "b")])]).unwrap_err();
        assert!(matches!(err, MutateError::InvalidPattern { .. }));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: MutateConfig = serde_json::from_str(r#"{ "filter": "gsub" }"#).unwrap();
        assert!(config.input.is_empty());

        let mutators = create_mutators(&[config]).unwrap();
        let mut labels: Labels = fx_hash_map();
        labels.insert("k".to_owned(), "v".to_owned());
        mutators[0].apply(&mut labels);
        assert_eq!(labels["k"], "v");
    }
}
