//! Tree-sitter helpers shared by the grammar-backed analyzers.

use crate::error::{GraphError, Result};
use crate::graph::FragmentBuilder;
use std::collections::HashMap;
use tree_sitter::{Language, Node, Parser, Query, Tree};

/// Parse `source` with `language`.
pub fn parse_source(
    language: &Language,
    language_name: &str,
    file_path: &str,
    source: &[u8],
) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| GraphError::Parse {
            file: file_path.to_string(),
            message: format!("Failed to set {} language: {:?}", language_name, e),
        })?;

    parser
        .parse(source, None)
        .ok_or_else(|| GraphError::Parse {
            file: file_path.to_string(),
            message: "Parse failed - no tree returned".to_string(),
        })
}

/// Compile a structural query. On failure the error carries everything the
/// builder has collected so far.
pub fn compile_query(
    language: &Language,
    pattern: &str,
    what: &str,
    file_path: &str,
    builder: &FragmentBuilder,
) -> Result<Query> {
    Query::new(language, pattern).map_err(|e| GraphError::Query {
        file: file_path.to_string(),
        message: format!("{} query failed: {}", what, e),
        partial: Box::new(builder.snapshot()),
    })
}

/// UTF-8 text of a node, empty if the bytes are not valid UTF-8.
pub fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Text of a named field child, if present.
pub fn field_text<'a>(node: Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| node_text(n, source))
}

/// 1-based start line.
pub fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// 1-based end line.
pub fn end_line(node: Node) -> usize {
    node.end_position().row + 1
}

/// Pre-order traversal of the subtree rooted at `node`.
pub fn walk_tree<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_tree(child, visit);
    }
}

/// Innermost strict ancestor of `node` that `pred` accepts.
pub fn find_ancestor<'t>(node: Node<'t>, pred: impl Fn(Node<'t>) -> bool) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if pred(n) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// ID registered for the innermost ancestor found in `owners` (keyed by
/// tree-sitter node id).
pub fn enclosing_id<'a>(node: Node, owners: &'a HashMap<usize, String>) -> Option<&'a str> {
    find_ancestor(node, |n| owners.contains_key(&n.id()))
        .and_then(|n| owners.get(&n.id()))
        .map(String::as_str)
}

/// Declaration head of a definition: source text up to its body, with
/// whitespace collapsed.
pub fn signature(node: Node, source: &[u8]) -> String {
    let end = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let bytes = &source[node.start_byte()..end.max(node.start_byte())];
    String::from_utf8_lossy(bytes)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cyclomatic complexity: 1 + branch nodes + short-circuit operators.
pub fn cyclomatic_complexity(node: Node, source: &[u8], branch_kinds: &[&str]) -> usize {
    let mut complexity = 1;
    walk_tree(node, &mut |n| {
        if branch_kinds.contains(&n.kind()) {
            complexity += 1;
        } else if n.kind() == "binary_expression" {
            if let Some(op) = n.child_by_field_name("operator") {
                if matches!(node_text(op, source), "&&" | "||") {
                    complexity += 1;
                }
            }
        }
    });
    complexity
}

/// Names declared by a declarator-like node, drilling through wrapper
/// declarators (`pointer_declarator`, `init_declarator`, ...) to the first
/// identifier.
pub fn declarator_name<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    match node.kind() {
        "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
        | "operator_name" | "property_identifier" | "type_identifier" => {
            Some(node_text(node, source))
        }
        _ => {
            let inner = node.child_by_field_name("declarator").or_else(|| {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind().ends_with("identifier") || c.kind().ends_with("declarator"));
                found
            })?;
            declarator_name(inner, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::LABEL_CLASS;
    use crate::graph::Node as GraphNode;

    #[test]
    fn test_query_failure_carries_partial() {
        let mut builder = FragmentBuilder::new();
        builder.add_node(GraphNode::definition("T.java:Kept", LABEL_CLASS, "Kept", "T.java", 1));

        let err = compile_query(
            &tree_sitter_java::language(),
            "(class_declaration name: (no_such_node) @name",
            "Class",
            "T.java",
            &builder,
        )
        .expect_err("invalid pattern");

        assert!(err.has_partial());
        assert!(err.to_string().contains("Class query failed"));
        let partial = err.into_partial().expect("partial");
        assert!(partial.node("T.java:Kept").is_some());
        assert_eq!(partial.nodes.len(), 1);
    }

    fn java_tree(src: &str) -> Tree {
        parse_source(&tree_sitter_java::language(), "Java", "t.java", src.as_bytes())
            .expect("Failed to parse")
    }

    #[test]
    fn test_signature_stops_at_body() {
        let src = "class A {\n  public int   add(int a,\n int b) { return a + b; }\n}";
        let tree = java_tree(src);
        let mut sig = None;
        walk_tree(tree.root_node(), &mut |n| {
            if n.kind() == "method_declaration" {
                sig = Some(signature(n, src.as_bytes()));
            }
        });
        assert_eq!(sig.as_deref(), Some("public int add(int a, int b)"));
    }

    #[test]
    fn test_complexity_counts_branches_and_operators() {
        let src = "class A { void f(int x) { if (x > 0 && x < 9) { } for (;;) { } } }";
        let tree = java_tree(src);
        let mut score = 0;
        walk_tree(tree.root_node(), &mut |n| {
            if n.kind() == "method_declaration" {
                score = cyclomatic_complexity(n, src.as_bytes(), &["if_statement", "for_statement"]);
            }
        });
        assert_eq!(score, 4);
    }

    #[test]
    fn test_enclosing_id() {
        let src = "class A { void f() { g(); } }";
        let tree = java_tree(src);
        let mut owners = HashMap::new();
        let mut call = None;
        walk_tree(tree.root_node(), &mut |n| match n.kind() {
            "method_declaration" => {
                owners.insert(n.id(), "A:f".to_string());
            }
            "method_invocation" => call = Some(n),
            _ => {}
        });
        let call = call.expect("call node");
        assert_eq!(enclosing_id(call, &owners), Some("A:f"));
        assert_eq!(start_line(call), 1);
    }
}
