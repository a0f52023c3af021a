//! Per-file member tables for the class-based analyzers (C#, Java,
//! TypeScript).

use crate::resolve::{self, SymbolTable};
use std::collections::{HashMap, HashSet};

/// Local variable name → declared type text, for one callable.
pub type Locals = HashMap<String, Option<String>>;

/// Members, field types and supertypes of the types defined in one file.
#[derive(Debug, Default)]
pub struct TypeMembers {
    members: HashMap<String, SymbolTable>,
    field_types: HashMap<String, HashMap<String, String>>,
    interfaces: HashSet<String>,
    bases: HashMap<String, Vec<String>>,
}

impl TypeMembers {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a method (or other callable member) of `type_id`.
    pub fn add_member(&mut self, type_id: &str, name: &str, id: &str) {
        self.members
            .entry(type_id.to_string())
            .or_default()
            .insert(name, id);
    }

    /// Record a field or property with its declared type.
    pub fn add_field(&mut self, type_id: &str, name: &str, id: &str, type_text: &str) {
        self.add_member(type_id, name, id);
        self.field_types
            .entry(type_id.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert_with(|| type_text.to_string());
    }

    /// Member ID declared on `type_id` itself.
    pub fn member(&self, type_id: &str, name: &str) -> Option<&str> {
        self.members.get(type_id).and_then(|t| t.get(name))
    }

    /// Declared type of a field of `type_id`.
    pub fn field_type(&self, type_id: &str, name: &str) -> Option<&str> {
        self.field_types
            .get(type_id)
            .and_then(|f| f.get(name))
            .map(String::as_str)
    }

    /// Whether `name` is a field of `type_id`.
    pub fn is_field(&self, type_id: &str, name: &str) -> bool {
        self.field_type(type_id, name).is_some()
    }

    /// Mark a locally defined type as an interface.
    pub fn mark_interface(&mut self, type_id: &str) {
        self.interfaces.insert(type_id.to_string());
    }

    /// Whether a locally defined type is an interface.
    pub fn is_interface(&self, type_id: &str) -> bool {
        self.interfaces.contains(type_id)
    }

    /// Record a resolved supertype candidate.
    pub fn add_base(&mut self, type_id: &str, base_id: &str) {
        let bases = self.bases.entry(type_id.to_string()).or_default();
        if !bases.iter().any(|b| b == base_id) {
            bases.push(base_id.to_string());
        }
    }

    /// Supertype candidates recorded for `type_id`.
    pub fn bases(&self, type_id: &str) -> &[String] {
        self.bases.get(type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve `member` on a type: own member, then a member found on a
    /// recorded supertype, then the nested ID under the type itself.
    pub fn resolve_member(&self, type_id: &str, member: &str) -> String {
        if let Some(id) = self.member(type_id, member) {
            return id.to_string();
        }
        for base in self.bases(type_id) {
            if let Some(id) = self.member(base, member) {
                return id.to_string();
            }
        }
        resolve::nested(type_id, member)
    }
}

/// C#-style interface naming convention: `I` followed by an uppercase letter.
pub fn looks_like_interface(name: &str) -> bool {
    let name = resolve::base_type_name(name);
    let name = name.rsplit('.').next().unwrap_or(name);
    let mut chars = name.chars();
    chars.next() == Some('I') && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}
