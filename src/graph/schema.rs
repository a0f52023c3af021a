//! Graph schema definitions for code entities and relationships.
//!
//! Labels and edge types are open strings in the data model; these are the
//! ones the bundled analyzers emit.

/// Label for source file nodes.
pub const LABEL_FILE: &str = "File";

/// Label for free functions, SQL routines and script-level subs.
pub const LABEL_FUNCTION: &str = "Function";

/// Label for functions owned by a type.
pub const LABEL_METHOD: &str = "Method";

/// Label for classes, structs and records.
pub const LABEL_CLASS: &str = "Class";

/// Label for interfaces.
pub const LABEL_INTERFACE: &str = "Interface";

/// Label for fields and properties.
pub const LABEL_FIELD: &str = "Field";

/// Label for file- or namespace-level variables.
pub const LABEL_GLOBAL: &str = "Global";

/// Label for SQL tables and views.
pub const LABEL_TABLE: &str = "Table";

/// Caller → callee, or constructor site → constructed type.
pub const EDGE_CALLS: &str = "CALLS";

/// Reader/writer → variable or field.
pub const EDGE_USES: &str = "USES";

/// Subclass → base class (C++, C#, VB.NET).
pub const EDGE_INHERITS: &str = "INHERITS";

/// Subtype → supertype (Java, TypeScript, interface bases).
pub const EDGE_EXTENDS: &str = "EXTENDS";

/// Type → implemented interface.
pub const EDGE_IMPLEMENTS: &str = "IMPLEMENTS";

/// Definition → containing file.
pub const EDGE_DEFINED_IN: &str = "DEFINED_IN";

/// Owner type → method.
pub const EDGE_HAS_METHOD: &str = "HAS_METHOD";

/// Owner type → field.
pub const EDGE_DEFINES: &str = "DEFINES";

/// Trigger → watched table.
pub const EDGE_WATCHES: &str = "WATCHES";

/// Property key for the entity's short name.
pub const PROP_NAME: &str = "name";

/// Property key for the defining file path.
pub const PROP_FILE: &str = "file";

/// Property key for the 1-based start line.
pub const PROP_LINE: &str = "line";

/// Property key for the 1-based end line.
pub const PROP_END_LINE: &str = "end_line";

/// Property key for the declared type of a field or global. Distinct from
/// the `type` key output lines use for the label.
pub const PROP_TYPE: &str = "data_type";

/// Property key for the embedding vector.
pub const PROP_EMBEDDING: &str = "embedding";

/// Whether nodes with this label get a `DEFINED_IN` edge to their file.
pub fn is_definable(label: &str) -> bool {
    matches!(
        label,
        LABEL_FUNCTION | LABEL_METHOD | LABEL_CLASS | LABEL_INTERFACE
    )
}

/// Whether nodes with this label are sent to the embedder.
pub fn is_callable(label: &str) -> bool {
    matches!(label, LABEL_FUNCTION | LABEL_METHOD)
}
