//! Identifier construction and per-file symbol resolution.
//!
//! Every analyzer builds IDs through the helpers here so that each language
//! sticks to one of four shapes:
//!
//! - file-scoped `path:name`
//! - globally-qualified `ns.Type`
//! - nested-scoped `ownerID:member`
//! - unresolved sentinel `UNKNOWN:symbol`
//!
//! Resolution state (symbol tables, import maps) lives inside a single
//! `parse` call and is never shared.

pub mod includes;
pub mod module_resolver;
pub mod namespaces;

use std::collections::HashMap;

pub use includes::resolve_from_includes;
pub use namespaces::NamespaceScope;

/// Prefix of the unresolved-sentinel ID shape.
pub const UNRESOLVED_PREFIX: &str = "UNKNOWN";

/// `path:name`
pub fn file_scoped(file_path: &str, name: &str) -> String {
    format!("{}:{}", file_path, name)
}

/// `ns.Type`, or plain `Type` in the global namespace.
pub fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// `ownerID:member`
pub fn nested(owner_id: &str, member: &str) -> String {
    format!("{}:{}", owner_id, member)
}

/// `UNKNOWN:symbol`
pub fn unresolved(symbol: &str) -> String {
    format!("{}:{}", UNRESOLVED_PREFIX, symbol)
}

/// Whether an ID is the unresolved sentinel.
pub fn is_unresolved(id: &str) -> bool {
    id.strip_prefix(UNRESOLVED_PREFIX)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// Strip generic arguments, array brackets and nullable markers from a type
/// reference: `List<String>` → `List`, `int[]` → `int`, `Foo?` → `Foo`.
pub fn base_type_name(text: &str) -> &str {
    let text = text.trim();
    let end = text
        .find(|c: char| c == '<' || c == '[' || c == '?' || c == '(')
        .unwrap_or(text.len());
    text[..end].trim()
}

/// File-local `name → ID` table.
///
/// The first definition of a name wins, which keeps resolution deterministic
/// when a file declares overloads or shadowing names.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: HashMap<String, String>,
    case_insensitive: bool,
}

impl SymbolTable {
    /// Create an empty case-sensitive table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table that ignores ASCII case (SQL, VB).
    pub fn case_insensitive() -> Self {
        Self {
            entries: HashMap::new(),
            case_insensitive: true,
        }
    }

    fn key(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Record a definition; returns false if the name was already bound.
    pub fn insert(&mut self, name: &str, id: &str) -> bool {
        let key = self.key(name);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, id.to_string());
        true
    }

    /// Look up a name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&self.key(name)).map(String::as_str)
    }

    /// Whether a name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_shapes() {
        assert_eq!(file_scoped("src/a.cpp", "main"), "src/a.cpp:main");
        assert_eq!(qualified("MyCorp.App", "User"), "MyCorp.App.User");
        assert_eq!(qualified("", "User"), "User");
        assert_eq!(nested("MyCorp.App.User", "Save"), "MyCorp.App.User:Save");
        assert_eq!(unresolved("printf"), "UNKNOWN:printf");
    }

    #[test]
    fn test_is_unresolved() {
        assert!(is_unresolved("UNKNOWN:foo"));
        assert!(!is_unresolved("UNKNOWNX:foo"));
        assert!(!is_unresolved("src/UNKNOWN.cpp:foo"));
    }

    #[test]
    fn test_base_type_name() {
        assert_eq!(base_type_name("List<String>"), "List");
        assert_eq!(base_type_name(" int[] "), "int");
        assert_eq!(base_type_name("User?"), "User");
        assert_eq!(base_type_name("Dictionary<string, List<int>>"), "Dictionary");
        assert_eq!(base_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_symbol_table_first_wins() {
        let mut table = SymbolTable::new();
        assert!(table.insert("run", "a.ts:run"));
        assert!(!table.insert("run", "a.ts:Other:run"));
        assert_eq!(table.get("run"), Some("a.ts:run"));
        assert_eq!(table.get("Run"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_symbol_table_case_insensitive() {
        let mut table = SymbolTable::case_insensitive();
        table.insert("CalculateTotal", "db.sql:CalculateTotal");
        assert_eq!(table.get("calculatetotal"), Some("db.sql:CalculateTotal"));
        assert!(table.contains("CALCULATETOTAL"));
    }
}
