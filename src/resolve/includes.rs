//! Header/include based resolution for C and C++.

use super::module_resolver::{file_stem, join_relative};

/// Match an unresolved symbol against the file's include list.
///
/// The symbol's namespace-like prefix (text before the first `::`, or the
/// whole symbol) is compared case-insensitively with each include's base
/// filename. The first match yields `dir(current_file)/include:symbol`.
pub fn resolve_from_includes(
    symbol: &str,
    includes: &[String],
    current_file: &str,
) -> Option<String> {
    let prefix = symbol.split("::").next().unwrap_or(symbol);
    if prefix.is_empty() {
        return None;
    }

    includes
        .iter()
        .find(|include| file_stem(include).eq_ignore_ascii_case(prefix))
        .map(|include| format!("{}:{}", join_relative(current_file, include), symbol))
}
