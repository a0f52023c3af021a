//! Candidate expansion for namespace/package-qualified languages (C#, Java).

use super::{base_type_name, qualified};
use std::collections::HashMap;

/// Import state of one C# or Java file.
///
/// Resolves a type reference to the list of fully-qualified names it could
/// denote. Ambiguity is kept: an unqualified name that no local definition
/// or exact import explains expands to one candidate per imported namespace
/// plus one for the current namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    current: String,
    namespaces: Vec<String>,
    exact: HashMap<String, String>,
    local_types: HashMap<String, String>,
}

impl NamespaceScope {
    /// Scope for a file whose declarations live in `current`.
    pub fn new(current: &str) -> Self {
        Self {
            current: current.to_string(),
            ..Self::default()
        }
    }

    /// The file's namespace or package (empty for the global namespace).
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Change the current namespace (C# files may declare several).
    pub fn set_current(&mut self, namespace: &str) {
        self.current = namespace.to_string();
    }

    /// `using N;` or `import n.*;`
    pub fn add_namespace(&mut self, namespace: &str) {
        if !namespace.is_empty() && !self.namespaces.iter().any(|n| n == namespace) {
            self.namespaces.push(namespace.to_string());
        }
    }

    /// `import a.b.C;` or `using Alias = N.T;`
    pub fn add_exact(&mut self, name: &str, fully_qualified: &str) {
        self.exact
            .entry(name.to_string())
            .or_insert_with(|| fully_qualified.to_string());
    }

    /// A type defined in the file being analyzed.
    pub fn add_local_type(&mut self, name: &str, id: &str) {
        self.local_types
            .entry(name.to_string())
            .or_insert_with(|| id.to_string());
    }

    /// Local type ID for a simple name.
    pub fn local_type(&self, name: &str) -> Option<&str> {
        self.local_types.get(name).map(String::as_str)
    }

    /// Imported namespaces in declaration order.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Candidate IDs for a type reference, in priority order.
    pub fn candidates(&self, type_ref: &str) -> Vec<String> {
        self.candidates_in(&self.current, type_ref)
    }

    /// Like [`candidates`](Self::candidates) but as seen from `namespace`
    /// (a C# file may declare several namespaces).
    pub fn candidates_in(&self, namespace: &str, type_ref: &str) -> Vec<String> {
        let name = base_type_name(type_ref);
        if name.is_empty() {
            return Vec::new();
        }

        if let Some(id) = self.local_types.get(name) {
            return vec![id.clone()];
        }
        if let Some(fqn) = self.exact.get(name) {
            return vec![fqn.clone()];
        }

        if let Some((head, rest)) = name.split_once('.') {
            if let Some(fqn) = self.exact.get(head) {
                return vec![format!("{}.{}", fqn, rest)];
            }
            if let Some(id) = self.local_types.get(head) {
                return vec![format!("{}.{}", id, rest)];
            }
            return vec![name.to_string()];
        }

        let mut out: Vec<String> = self
            .namespaces
            .iter()
            .map(|ns| qualified(ns, name))
            .collect();
        let here = qualified(namespace, name);
        if !out.contains(&here) {
            out.push(here);
        }
        out
    }
}
