//! Error types for the lt-mutate crate.

/// Errors raised while building mutators from configuration.
///
/// All of them are configuration errors: they are reported once, when the
/// mutators are created, never while labels are being rewritten.
#[derive(Debug, thiserror::Error)]
pub enum MutateError {
    /// The filter name is not one this crate implements.
    #[error("unsupported mutate filter '{0}', expected 'gsub'")]
    UnsupportedFilter(String),

    /// A pattern failed to compile.
    #[error("invalid pattern '{pattern}' for label '{label}': {source}")]
    InvalidPattern {
        /// The label the rule applies to.
        label: String,
        /// The pattern as written in the configuration.
        pattern: String,
        /// The compiler error.
        #[source]
        source: regex::Error,
    },

    /// The input list is not made of complete (label, pattern, replacement)
    /// triples.
    #[error("gsub input must be label, pattern, replacement triples, got {len} values")]
    MalformedInput {
        /// The number of values supplied.
        len: usize,
    },
}
