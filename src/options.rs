use serde::{Deserialize, Serialize};

/// Expansion policy controlling how index expressions resolve.
///
/// Hosts may attach options to a native request type; requests that do not
/// declare any are resolved with the interceptor's default, which is
/// [`IndicesOptions::strict_expand`] unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicesOptions {
    /// Silently skip explicitly named indices that are missing or closed
    pub ignore_unavailable: bool,
    /// Accept wildcards that match nothing instead of failing
    pub allow_no_indices: bool,
    /// Wildcards expand to open indices
    pub expand_wildcards_open: bool,
    /// Wildcards expand to closed indices
    pub expand_wildcards_closed: bool,
    /// Explicitly naming a closed index is an error
    pub forbid_closed_indices: bool,
}

impl IndicesOptions {
    /// Strict expansion over open and closed indices.
    ///
    /// Unknown explicit names fail; wildcards matching nothing do not.
    pub const fn strict_expand() -> Self {
        Self {
            ignore_unavailable: false,
            allow_no_indices: true,
            expand_wildcards_open: true,
            expand_wildcards_closed: true,
            forbid_closed_indices: false,
        }
    }

    /// Lenient expansion over open indices only, as used by most searches.
    pub const fn lenient_expand_open() -> Self {
        Self {
            ignore_unavailable: true,
            allow_no_indices: true,
            expand_wildcards_open: true,
            expand_wildcards_closed: false,
            forbid_closed_indices: false,
        }
    }

    /// Whether a wildcard may select an index in the given state.
    pub(crate) fn expands_to(&self, open: bool) -> bool {
        if open {
            self.expand_wildcards_open
        } else {
            self.expand_wildcards_closed
        }
    }
}

impl Default for IndicesOptions {
    fn default() -> Self {
        Self::strict_expand()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_strict_expand() {
        assert_eq!(IndicesOptions::default(), IndicesOptions::strict_expand());
    }

    #[test]
    fn expansion_flags_select_states() {
        let lenient = IndicesOptions::lenient_expand_open();
        assert!(lenient.expands_to(true));
        assert!(!lenient.expands_to(false));

        let strict = IndicesOptions::strict_expand();
        assert!(strict.expands_to(true));
        assert!(strict.expands_to(false));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let opts: IndicesOptions =
            serde_json::from_str(r#"{"ignore_unavailable": true}"#).expect("valid options");

        assert!(opts.ignore_unavailable);
        assert!(opts.allow_no_indices);
        assert!(opts.expand_wildcards_closed);
    }
}
