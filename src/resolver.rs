//! Resolution of index expressions into concrete index names.

use std::collections::BTreeSet;

use crate::catalog::{AliasOrIndex, Catalog, IndexMetadata};
use crate::error::ResolveError;
use crate::options::IndicesOptions;
use crate::pattern;

/// Resolves index expressions against a catalog snapshot.
///
/// Implementations must be pure with respect to their inputs: the same
/// snapshot, options and expressions always produce the same result, and
/// the result does not depend on the order or multiplicity of expressions.
pub trait IndexResolver: Send + Sync {
    /// Resolves `expressions` into the concrete index names they denote.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when the options do not tolerate an
    /// expression that matches nothing, and [`ResolveError::IndexClosed`]
    /// when an explicitly named closed index is forbidden.
    fn resolve(
        &self,
        catalog: &Catalog,
        options: &IndicesOptions,
        expressions: &[String],
    ) -> Result<BTreeSet<String>, ResolveError>;
}

/// Default resolver understanding names, aliases, `*` wildcards,
/// `_all` and `-` exclusions.
///
/// # Examples
///
/// ```
/// use request_scope::catalog::Catalog;
/// use request_scope::{IndexResolver, IndicesOptions, WildcardResolver};
///
/// let catalog = Catalog::builder()
///     .index("logs-2023")
///     .index("logs-2024")
///     .index("metrics")
///     .build();
///
/// let resolved = WildcardResolver
///     .resolve(&catalog, &IndicesOptions::strict_expand(), &["logs-*".to_string()])
///     .unwrap();
///
/// assert_eq!(resolved.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardResolver;

const ALL: &str = "_all";

impl WildcardResolver {
    fn all_indices(catalog: &Catalog, options: &IndicesOptions) -> BTreeSet<String> {
        catalog
            .indices()
            .filter(|index| options.expands_to(index.is_open()))
            .map(|index| index.name().to_string())
            .collect()
    }

    /// Concrete indices matched by a wildcard, through index or alias names.
    fn expand_wildcard(
        catalog: &Catalog,
        options: &IndicesOptions,
        expr: &str,
    ) -> BTreeSet<String> {
        let Ok(matcher) = pattern::matcher(expr) else {
            tracing::debug!(expression = expr, "unusable wildcard expression");
            return BTreeSet::new();
        };

        let from_indices = catalog
            .indices()
            .filter(|index| matcher.is_match(index.name()))
            .filter(|index| options.expands_to(index.is_open()))
            .map(|index| index.name().to_string());

        let from_aliases = catalog
            .aliases()
            .filter(|(alias, _)| matcher.is_match(alias))
            .flat_map(|(_, members)| members.iter())
            .filter_map(|member| catalog.index(member))
            .filter(|index| options.expands_to(index.is_open()))
            .map(|index| index.name().to_string());

        from_indices.chain(from_aliases).collect()
    }

    /// Applies the closed-index rules to an explicitly named index.
    fn explicit_index(
        index: &IndexMetadata,
        options: &IndicesOptions,
    ) -> Result<Option<String>, ResolveError> {
        if index.is_open() || !options.forbid_closed_indices {
            return Ok(Some(index.name().to_string()));
        }
        if options.ignore_unavailable {
            Ok(None)
        } else {
            Err(ResolveError::IndexClosed(index.name().to_string()))
        }
    }

    fn explicit(
        catalog: &Catalog,
        options: &IndicesOptions,
        expr: &str,
    ) -> Result<BTreeSet<String>, ResolveError> {
        match catalog.lookup(expr) {
            Some(AliasOrIndex::Index(index)) => {
                Ok(Self::explicit_index(index, options)?.into_iter().collect())
            }
            Some(AliasOrIndex::Alias(members)) => Ok(members
                .iter()
                .filter_map(|member| catalog.index(member))
                .filter(|index| index.is_open() || !options.forbid_closed_indices)
                .map(|index| index.name().to_string())
                .collect()),
            None if options.ignore_unavailable => Ok(BTreeSet::new()),
            None => Err(ResolveError::NotFound(expr.to_string())),
        }
    }

    fn excluded(catalog: &Catalog, options: &IndicesOptions, expr: &str) -> BTreeSet<String> {
        if pattern::is_wildcard(expr) {
            return Self::expand_wildcard(catalog, options, expr);
        }
        match catalog.lookup(expr) {
            Some(AliasOrIndex::Index(index)) => BTreeSet::from([index.name().to_string()]),
            Some(AliasOrIndex::Alias(members)) => members.clone(),
            None => BTreeSet::new(),
        }
    }
}

impl IndexResolver for WildcardResolver {
    fn resolve(
        &self,
        catalog: &Catalog,
        options: &IndicesOptions,
        expressions: &[String],
    ) -> Result<BTreeSet<String>, ResolveError> {
        let (exclusions, inclusions): (Vec<&str>, Vec<&str>) = expressions
            .iter()
            .map(String::as_str)
            .partition(|expr| expr.len() > 1 && expr.starts_with('-'));

        // A lone exclusion has nothing to exclude from; treat it as a name.
        let (exclusions, inclusions) = if inclusions.is_empty() {
            (Vec::new(), exclusions)
        } else {
            (exclusions, inclusions)
        };

        let mut resolved = BTreeSet::new();
        let select_all =
            inclusions.is_empty() || inclusions.iter().any(|expr| *expr == ALL || *expr == "*");

        if select_all {
            resolved = Self::all_indices(catalog, options);
        } else {
            for expr in &inclusions {
                if pattern::is_wildcard(expr) {
                    let matched = Self::expand_wildcard(catalog, options, expr);
                    if matched.is_empty() && !options.allow_no_indices {
                        return Err(ResolveError::NotFound(expr.to_string()));
                    }
                    resolved.extend(matched);
                } else {
                    resolved.extend(Self::explicit(catalog, options, expr)?);
                }
            }
        }

        for expr in exclusions {
            let excluded = Self::excluded(catalog, options, &expr[1..]);
            resolved.retain(|name| !excluded.contains(name));
        }

        if resolved.is_empty() && !options.allow_no_indices {
            return Err(ResolveError::NotFound(expressions.join(",")));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exprs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> Catalog {
        Catalog::builder()
            .index("logs-2023")
            .index("logs-2024")
            .index("metrics")
            .closed_index("logs-2019")
            .alias("recent", ["logs-2024"])
            .alias("old", ["logs-2019", "logs-2023"])
            .build()
    }

    fn resolve(options: IndicesOptions, items: &[&str]) -> Result<BTreeSet<String>, ResolveError> {
        WildcardResolver.resolve(&catalog(), &options, &exprs(items))
    }

    #[test]
    fn wildcard_expands_open_and_closed_under_strict_expand() {
        let resolved = resolve(IndicesOptions::strict_expand(), &["logs-*"]).unwrap();
        assert_eq!(resolved, names(&["logs-2019", "logs-2023", "logs-2024"]));
    }

    #[test]
    fn wildcard_skips_closed_when_not_expanding_closed() {
        let resolved = resolve(IndicesOptions::lenient_expand_open(), &["logs-*"]).unwrap();
        assert_eq!(resolved, names(&["logs-2023", "logs-2024"]));
    }

    #[test]
    fn wildcard_matches_alias_names() {
        let resolved = resolve(IndicesOptions::strict_expand(), &["rec*"]).unwrap();
        assert_eq!(resolved, names(&["logs-2024"]));
    }

    #[test]
    fn alias_resolves_to_members() {
        let resolved = resolve(IndicesOptions::strict_expand(), &["old"]).unwrap();
        assert_eq!(resolved, names(&["logs-2019", "logs-2023"]));
    }

    #[test]
    fn all_and_empty_select_everything() {
        let everything = names(&["logs-2019", "logs-2023", "logs-2024", "metrics"]);

        assert_eq!(resolve(IndicesOptions::strict_expand(), &[]).unwrap(), everything);
        assert_eq!(resolve(IndicesOptions::strict_expand(), &["_all"]).unwrap(), everything);
        assert_eq!(resolve(IndicesOptions::strict_expand(), &["*"]).unwrap(), everything);
    }

    #[test]
    fn exclusions_remove_matches() {
        let resolved = resolve(IndicesOptions::strict_expand(), &["logs-*", "-logs-2019"]).unwrap();
        assert_eq!(resolved, names(&["logs-2023", "logs-2024"]));

        let resolved = resolve(IndicesOptions::strict_expand(), &["*", "-logs-*"]).unwrap();
        assert_eq!(resolved, names(&["metrics"]));
    }

    #[test]
    fn exclusion_position_does_not_matter() {
        let a = resolve(IndicesOptions::strict_expand(), &["-old", "logs-*"]).unwrap();
        let b = resolve(IndicesOptions::strict_expand(), &["logs-*", "-old"]).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, names(&["logs-2024"]));
    }

    #[test]
    fn unknown_name_is_not_found_unless_ignored() {
        assert_eq!(
            resolve(IndicesOptions::strict_expand(), &["nope"]),
            Err(ResolveError::NotFound("nope".to_string()))
        );
        assert_eq!(
            resolve(IndicesOptions::lenient_expand_open(), &["nope", "metrics"]).unwrap(),
            names(&["metrics"])
        );
    }

    #[test]
    fn empty_wildcard_respects_allow_no_indices() {
        assert!(resolve(IndicesOptions::strict_expand(), &["missing-*"])
            .unwrap()
            .is_empty());

        let strict = IndicesOptions {
            allow_no_indices: false,
            ..IndicesOptions::strict_expand()
        };
        assert_eq!(
            resolve(strict, &["missing-*"]),
            Err(ResolveError::NotFound("missing-*".to_string()))
        );
    }

    #[test]
    fn forbidden_closed_index_fails_or_is_skipped() {
        let forbid = IndicesOptions {
            forbid_closed_indices: true,
            ..IndicesOptions::strict_expand()
        };
        assert_eq!(
            resolve(forbid, &["logs-2019"]),
            Err(ResolveError::IndexClosed("logs-2019".to_string()))
        );

        let forbid_lenient = IndicesOptions {
            ignore_unavailable: true,
            ..forbid
        };
        assert_eq!(
            resolve(forbid_lenient, &["logs-2019", "metrics"]).unwrap(),
            names(&["metrics"])
        );
    }

    #[test]
    fn duplicates_and_order_are_irrelevant() {
        let a = resolve(IndicesOptions::strict_expand(), &["metrics", "recent", "metrics"]).unwrap();
        let b = resolve(IndicesOptions::strict_expand(), &["recent", "metrics"]).unwrap();
        assert_eq!(a, b);
    }
}
