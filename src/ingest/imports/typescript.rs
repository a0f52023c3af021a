//! TypeScript import statement extraction.

use super::{ImportFact, ImportKind, ImportedName};
use crate::ingest::syntax::{node_text, start_line};
use tree_sitter::Node;

/// Extract ES module `import` statements.
///
/// One fact is produced per binding form, so
/// `import React, { useState } from 'react'` yields a default-import fact
/// and a named-import fact. `import type` forms are treated like value
/// imports.
pub fn extract_typescript_imports(root: Node, source: &[u8]) -> Vec<ImportFact> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "import_statement" {
            extract_import_statement(child, source, &mut imports);
        }
    }
    imports
}

fn extract_import_statement(node: Node, source: &[u8], imports: &mut Vec<ImportFact>) {
    let Some(module) = node
        .child_by_field_name("source")
        .map(|s| unquote(node_text(s, source)))
    else {
        return;
    };
    let line = start_line(node);
    let fact = |import_kind, imported_names, is_glob| ImportFact {
        import_kind,
        path: module.clone(),
        imported_names,
        is_glob,
        line,
    };

    let mut found_clause = false;
    let mut cursor = node.walk();
    for clause in node.children(&mut cursor) {
        if clause.kind() != "import_clause" {
            continue;
        }
        found_clause = true;

        let mut clause_cursor = clause.walk();
        for part in clause.children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => {
                    let local = node_text(part, source).to_string();
                    let name = ImportedName {
                        local,
                        remote: "default".to_string(),
                    };
                    imports.push(fact(ImportKind::TsDefaultImport, vec![name], false));
                }
                "named_imports" => {
                    let names = named_imports(part, source);
                    imports.push(fact(ImportKind::TsNamedImport, names, false));
                }
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    let local = part
                        .children(&mut ns_cursor)
                        .find(|c| c.kind() == "identifier")
                        .map(|c| node_text(c, source).to_string());
                    if let Some(local) = local {
                        let name = ImportedName {
                            local,
                            remote: "*".to_string(),
                        };
                        imports.push(fact(ImportKind::TsNamespaceImport, vec![name], true));
                    }
                }
                _ => {}
            }
        }
    }

    if !found_clause {
        imports.push(fact(ImportKind::TsSideEffectImport, Vec::new(), false));
    }
}

fn named_imports(node: Node, source: &[u8]) -> Vec<ImportedName> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "import_specifier" {
            continue;
        }
        let Some(remote) = spec.child_by_field_name("name").map(|n| node_text(n, source)) else {
            continue;
        };
        let local = spec
            .child_by_field_name("alias")
            .map(|n| node_text(n, source))
            .unwrap_or(remote);
        names.push(ImportedName {
            local: local.to_string(),
            remote: remote.to_string(),
        });
    }
    names
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}
