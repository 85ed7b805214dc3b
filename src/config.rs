//! Interceptor configuration.

use serde::{Deserialize, Serialize};

use crate::actions::DEFAULT_READ_ACTIONS;
use crate::options::IndicesOptions;

/// Settings shared by every context an interceptor creates.
///
/// Every field has a default, so partial documents deserialize.
///
/// # Examples
///
/// ```
/// use request_scope::InterceptorConfig;
///
/// let config: InterceptorConfig = serde_json::from_str(r#"{
///     "default_indices_options": { "ignore_unavailable": true },
///     "read_actions": ["indices:data/read/*"]
/// }"#).unwrap();
///
/// assert!(config.default_indices_options.ignore_unavailable);
/// assert_eq!(config.read_actions.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Expansion options for requests whose native type declares none
    pub default_indices_options: IndicesOptions,
    /// Wildcard patterns of read-only actions
    pub read_actions: Vec<String>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            default_indices_options: IndicesOptions::strict_expand(),
            read_actions: DEFAULT_READ_ACTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: InterceptorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, InterceptorConfig::default());
    }

    #[test]
    fn defaults_use_builtin_read_table() {
        let config = InterceptorConfig::default();

        assert_eq!(config.read_actions.len(), DEFAULT_READ_ACTIONS.len());
        assert_eq!(config.default_indices_options, IndicesOptions::strict_expand());
    }
}
