//! The `gsub` filter: regex substitution inside named labels.

use std::borrow::Cow;

use lt_core::Labels;
use regex::Regex;

use crate::Mutator;
use crate::error::MutateError;

/// One substitution rule.
#[derive(Debug, Clone)]
struct GsubRule {
    label: String,
    pattern: Regex,
    replacement: String,
}

/// Replaces every match of a pattern inside a label's value.
///
/// # Examples
///
/// ```
/// use lt_core::{Labels, fx_hash_map};
/// use lt_mutate::{GsubMutator, Mutator};
///
/// let mutator = GsubMutator::from_input(&[
///     "path".to_owned(),
///     r"/users/\d+".to_owned(),
///     "/users/:id".to_owned(),
/// ])
/// .unwrap();
///
/// let mut labels: Labels = fx_hash_map();
/// labels.insert("path".to_owned(), "/users/42/profile".to_owned());
/// mutator.apply(&mut labels);
/// assert_eq!(labels["path"], "/users/:id/profile");
/// ```
#[derive(Debug, Clone)]
pub struct GsubMutator {
    rules: Vec<GsubRule>,
}

impl GsubMutator {
    /// Builds a mutator from a flat `label, pattern, replacement, ...` list.
    ///
    /// # Errors
    ///
    /// Returns [`MutateError::MalformedInput`] if the list length is not a
    /// multiple of three, or [`MutateError::InvalidPattern`] if a pattern
    /// does not compile.
    pub fn from_input(input: &[String]) -> Result<Self, MutateError> {
        if input.len() % 3 != 0 {
            return Err(MutateError::MalformedInput { len: input.len() });
        }

        let rules = input
            .chunks_exact(3)
            .map(|triple| {
                let (label, pattern, replacement) = (&triple[0], &triple[1], &triple[2]);
                let compiled = Regex::new(pattern).map_err(|source| MutateError::InvalidPattern {
                    label: label.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(GsubRule {
                    label: label.clone(),
                    pattern: compiled,
                    replacement: translate_backrefs(replacement).into_owned(),
                })
            })
            .collect::<Result<Vec<_>, MutateError>>()?;

        tracing::debug!(rules = rules.len(), "Built gsub mutator");
        Ok(Self { rules })
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the mutator has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Mutator for GsubMutator {
    fn apply(&self, labels: &mut Labels) {
        for rule in &self.rules {
            // A missing label is matched as the empty string and written back.
            let value = labels.entry(rule.label.clone()).or_default();
            let replaced = match rule.pattern.replace_all(value, rule.replacement.as_str()) {
                Cow::Borrowed(_) => continue,
                Cow::Owned(replaced) => replaced,
            };
            *value = replaced;
        }
    }
}

/// Rewrites `\N` group references to the `${N}` form the regex crate
/// expands. `\\` yields a literal backslash; `$N` and `${name}` pass
/// through unchanged.
fn translate_backrefs(replacement: &str) -> Cow<'_, str> {
    if !replacement.contains('\\') {
        return Cow::Borrowed(replacement);
    }

    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                out.push_str("${");
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    out.push(d);
                }
                out.push('}');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_core::fx_hash_map;

    fn input(values: &[&str]) -> Vec<String> {
        values.iter().map(|&v| v.to_owned()).collect()
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        let mut labels = fx_hash_map();
        for (k, v) in pairs {
            labels.insert((*k).to_owned(), (*v).to_owned());
        }
        labels
    }

    #[test]
    fn test_translate_backrefs() {
        assert_eq!(translate_backrefs(r"\1-\2"), "${1}-${2}");
        assert_eq!(translate_backrefs(r"\12x"), "${12}x");
        assert_eq!(translate_backrefs(r"a\\b"), r"a\b");
        assert_eq!(translate_backrefs(r"\n"), r"\n");
        assert!(matches!(translate_backrefs("$1"), Cow::Borrowed("$1")));
    }

    #[test]
    fn test_replaces_all_matches() {
        let mutator = GsubMutator::from_input(&input(&["method", "[aeiou]", "_"])).unwrap();
        let mut labels = labels(&[("method", "delete"), ("other", "delete")]);
        mutator.apply(&mut labels);
        assert_eq!(labels["method"], "d_l_t_");
        assert_eq!(labels["other"], "delete");
    }

    #[test]
    fn test_backslash_and_dollar_group_references() {
        let mutator = GsubMutator::from_input(&input(&[
            "user", r"(\w+)@(\w+)", r"\2/\1", //
            "host", r"(?P<name>\w+)\.local", "${name}",
        ]))
        .unwrap();
        let mut labels = labels(&[("user", "alice@example"), ("host", "db.local")]);
        mutator.apply(&mut labels);
        assert_eq!(labels["user"], "example/alice");
        assert_eq!(labels["host"], "db");
    }

    #[test]
    fn test_rules_apply_in_order() {
        let mutator = GsubMutator::from_input(&input(&["v", "a", "b", "v", "b", "c"])).unwrap();
        let mut labels = labels(&[("v", "aab")]);
        mutator.apply(&mut labels);
        assert_eq!(labels["v"], "ccc");
        assert_eq!(mutator.len(), 2);
    }

    #[test]
    fn test_missing_label_is_inserted() {
        let mutator = GsubMutator::from_input(&input(&["x", "^$", "EMPTY"])).unwrap();
        let mut labels = labels(&[]);
        mutator.apply(&mut labels);
        assert_eq!(labels.get("x").map(String::as_str), Some("EMPTY"));
    }

    #[test]
    fn test_missing_label_without_match_becomes_empty() {
        let mutator = GsubMutator::from_input(&input(&["absent", "[0-9]+", "N"])).unwrap();
        let mut labels = labels(&[("present", "value")]);
        mutator.apply(&mut labels);
        assert_eq!(labels.get("absent").map(String::as_str), Some(""));
        assert_eq!(labels["present"], "value");
    }

    #[test]
    fn test_malformed_input() {
        let err = GsubMutator::from_input(&input(&["label", "pattern"])).unwrap_err();
        assert!(matches!(err, MutateError::MalformedInput { len: 2 }));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = GsubMutator::from_input(&input(&["label", "(unclosed", "x"])).unwrap_err();
        match err {
            MutateError::InvalidPattern { label, pattern, .. } => {
                assert_eq!(label, "label");
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
