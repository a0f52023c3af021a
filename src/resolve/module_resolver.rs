//! Lexical path handling for IDs built from file paths.
//!
//! Paths are treated as `/`-separated strings and never touch the
//! filesystem, so the same input always yields the same ID.

/// Directory part of a path, or `""` when there is none.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final path component without its extension.
///
/// ```
/// # use graphdb::resolve::module_resolver::file_stem;
/// assert_eq!(file_stem("include/math.h"), "math");
/// assert_eq!(file_stem("Makefile"), "Makefile");
/// ```
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Whether the final path component has an extension.
pub fn has_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').is_some_and(|idx| idx > 0)
}

/// Collapse `.` and `..` components lexically.
///
/// Leading `..` components that cannot be collapsed are kept, and an empty
/// result becomes `.`.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join `relative` onto the directory containing `current_file`.
pub fn join_relative(current_file: &str, relative: &str) -> String {
    let dir = parent_dir(current_file);
    if dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{}/{}", dir, relative))
    }
}

/// Resolve an ES module specifier as seen from `current_file`.
///
/// Relative specifiers are joined with the importing file's directory and
/// get a `.ts` extension when they have none. Package specifiers such as
/// `react` or `@scope/pkg` are returned unchanged.
pub fn resolve_module_specifier(current_file: &str, specifier: &str) -> String {
    if !(specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == "..") {
        return specifier.to_string();
    }

    let joined = join_relative(current_file, specifier);
    if has_extension(&joined) {
        joined
    } else {
        format!("{}.ts", joined)
    }
}
