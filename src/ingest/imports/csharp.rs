//! C# `using` directive extraction.

use super::{ImportFact, ImportKind, ImportedName};
use crate::ingest::syntax::{node_text, start_line};
use tree_sitter::Node;

/// Extract `using` directives at compilation-unit and namespace level.
///
/// Handles `global using`, `using static` and `using Alias = Type;`.
/// `using` statements inside method bodies are a different node kind and are
/// never visited.
pub fn extract_csharp_usings(root: Node, source: &[u8]) -> Vec<ImportFact> {
    let mut imports = Vec::new();
    collect_usings(root, source, &mut imports);
    imports
}

fn collect_usings(node: Node, source: &[u8], imports: &mut Vec<ImportFact>) {
    match node.kind() {
        "using_directive" => {
            if let Some(import) = parse_using_directive(node_text(node, source), start_line(node)) {
                imports.push(import);
            }
        }
        "compilation_unit"
        | "namespace_declaration"
        | "file_scoped_namespace_declaration"
        | "declaration_list" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_usings(child, source, imports);
            }
        }
        _ => {}
    }
}

/// Parse the text of one using directive.
fn parse_using_directive(text: &str, line: usize) -> Option<ImportFact> {
    let mut rest = text.trim();
    if let Some(r) = rest.strip_prefix("global") {
        rest = r.trim_start();
    }
    rest = rest.strip_prefix("using")?.trim();
    rest = rest.strip_suffix(';').unwrap_or(rest).trim();

    let mut import_kind = ImportKind::CsUsing;
    if let Some(r) = rest.strip_prefix("static ") {
        import_kind = ImportKind::CsUsingStatic;
        rest = r.trim();
    }

    let mut imported_names = Vec::new();
    let path = match rest.split_once('=') {
        Some((alias, target)) => {
            import_kind = ImportKind::CsUsingAlias;
            let target = compact(target);
            imported_names.push(ImportedName {
                local: alias.trim().to_string(),
                remote: target.clone(),
            });
            target
        }
        None => compact(rest),
    };

    if path.is_empty() {
        return None;
    }

    Some(ImportFact {
        is_glob: import_kind == ImportKind::CsUsing,
        import_kind,
        path,
        imported_names,
        line,
    })
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
