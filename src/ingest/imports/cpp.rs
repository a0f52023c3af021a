//! C/C++ include directive extraction.

use super::{ImportFact, ImportKind};
use crate::ingest::syntax::{node_text, start_line};
use tree_sitter::Node;

/// Extract `#include` directives anywhere in the tree (including inside
/// `#ifdef` blocks).
pub fn extract_cpp_includes(root: Node, source: &[u8]) -> Vec<ImportFact> {
    let mut imports = Vec::new();
    extract_include_statements(root, source, &mut imports);
    imports
}

fn extract_include_statements(node: Node, source: &[u8], imports: &mut Vec<ImportFact>) {
    if node.kind() == "preproc_include" {
        if let Some(include) = extract_preproc_include(node, source) {
            imports.push(include);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        extract_include_statements(child, source, imports);
    }
}

fn extract_preproc_include(node: Node, source: &[u8]) -> Option<ImportFact> {
    let path_node = node.child_by_field_name("path")?;
    let is_system = path_node.kind() == "system_lib_string";

    let text = node_text(path_node, source);
    let path = text
        .trim_start_matches(['<', '"'])
        .trim_end_matches(['>', '"'])
        .to_string();
    if path.is_empty() {
        return None;
    }

    let import_kind = if is_system {
        ImportKind::CppSystemInclude
    } else {
        ImportKind::CppLocalInclude
    };

    Some(ImportFact {
        import_kind,
        path,
        imported_names: Vec::new(),
        is_glob: true,
        line: start_line(node),
    })
}
