//! Java import statement extraction.

use super::{ImportFact, ImportKind, ImportedName};
use crate::ingest::syntax::{node_text, start_line};
use tree_sitter::Node;

/// Extract `import` declarations, including static and wildcard imports.
///
/// For single-type imports the last path segment is recorded as the local
/// name; wildcard imports bind nothing and set `is_glob`.
pub fn extract_java_imports(root: Node, source: &[u8]) -> Vec<ImportFact> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "import_declaration" {
            if let Some(import) = extract_import_declaration(child, source) {
                imports.push(import);
            }
        }
    }
    imports
}

fn extract_import_declaration(node: Node, source: &[u8]) -> Option<ImportFact> {
    let mut is_static = false;
    let mut is_glob = false;
    let mut path = String::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "asterisk" => is_glob = true,
            "scoped_identifier" | "identifier" => path = node_text(child, source).to_string(),
            _ => {}
        }
    }

    if path.is_empty() {
        return None;
    }

    let mut imported_names = Vec::new();
    if !is_glob {
        if let Some(last) = path.rsplit('.').next() {
            imported_names.push(ImportedName::same(last));
        }
    }

    let import_kind = if is_static {
        ImportKind::JavaStaticImport
    } else {
        ImportKind::JavaImport
    };

    Some(ImportFact {
        import_kind,
        path,
        imported_names,
        is_glob,
        line: start_line(node),
    })
}
