//! Simple `*` wildcard patterns on top of `globset`.
//!
//! Index and action names only know `*`; every other glob metacharacter is
//! matched literally.

use globset::{Glob, GlobBuilder, GlobMatcher};

/// Returns `true` if `expr` contains a wildcard.
pub(crate) fn is_wildcard(expr: &str) -> bool {
    expr.contains('*')
}

/// Compiles `expr` into a glob where only `*` is special.
pub(crate) fn glob(expr: &str) -> Result<Glob, globset::Error> {
    let mut escaped = String::with_capacity(expr.len() + 4);
    for c in expr.chars() {
        if matches!(c, '?' | '[' | ']' | '{' | '}' | '\\' | '!') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    GlobBuilder::new(&escaped)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
}

/// Compiles `expr` into a matcher.
pub(crate) fn matcher(expr: &str) -> Result<GlobMatcher, globset::Error> {
    glob(expr).map(|g| g.compile_matcher())
}
