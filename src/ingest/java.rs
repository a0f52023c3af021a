//! Java analysis with tree-sitter-java.
//!
//! Types are package-qualified (`com.example.Sample`), members hang off
//! their type (`com.example.Sample:doWork`). Single-type imports bind one
//! candidate, wildcard imports and the implicit `java.lang` add candidate
//! packages, and `import static` binds method names to their owning type.

use super::imports::{extract_java_imports, ImportKind};
use super::members::{Locals, TypeMembers};
use super::syntax::{
    cyclomatic_complexity, end_line, field_text, find_ancestor, node_text, parse_source,
    signature, start_line, walk_tree,
};
use super::Analyzer;
use crate::error::Result;
use crate::graph::schema::{
    EDGE_CALLS, EDGE_DEFINES, EDGE_EXTENDS, EDGE_HAS_METHOD, EDGE_IMPLEMENTS, EDGE_USES,
    LABEL_CLASS, LABEL_FIELD, LABEL_INTERFACE, LABEL_METHOD, PROP_END_LINE, PROP_TYPE,
};
use crate::graph::{Fragment, FragmentBuilder, Node as GraphNode};
use crate::resolve::{self, NamespaceScope};
use std::collections::HashMap;
use std::rc::Rc;
use tree_sitter::Node;

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "switch_label",
    "catch_clause",
    "ternary_expression",
];

/// Analyzer for Java sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaAnalyzer;

impl JavaAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for JavaAnalyzer {
    fn language(&self) -> &'static str {
        "java"
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let language = tree_sitter_java::language();
        let tree = parse_source(&language, "Java", file_path, content)?;
        let root = tree.root_node();

        let package = package_name(root, content).unwrap_or_default();
        let mut file = JavaFile::new(file_path, content, &package);

        for import in extract_java_imports(root, content) {
            match (import.import_kind, import.is_glob) {
                (ImportKind::JavaStaticImport, true) => file.static_types.push(import.path),
                (ImportKind::JavaStaticImport, false) => {
                    if let Some((owner, member)) = import.path.rsplit_once('.') {
                        file.static_members
                            .insert(member.to_string(), resolve::nested(owner, member));
                    }
                }
                (_, true) => file.scope.add_namespace(&import.path),
                (_, false) => {
                    for name in &import.imported_names {
                        file.scope.add_exact(&name.local, &import.path);
                    }
                }
            }
        }
        file.scope.add_namespace("java.lang");

        file.collect_definitions(root, None);
        walk_tree(root, &mut |node| file.visit_reference(node));

        Ok(file.builder.finish())
    }
}

struct RefContext {
    source_id: String,
    owner: Option<String>,
    locals: Rc<Locals>,
}

struct JavaFile<'a> {
    path: &'a str,
    source: &'a [u8],
    builder: FragmentBuilder,
    scope: NamespaceScope,
    static_types: Vec<String>,
    static_members: HashMap<String, String>,
    types: TypeMembers,
    type_ids: HashMap<usize, String>,
    callables: HashMap<usize, String>,
    callable_owner: HashMap<usize, String>,
    locals: HashMap<usize, Rc<Locals>>,
}

impl<'a> JavaFile<'a> {
    fn new(path: &'a str, source: &'a [u8], package: &str) -> Self {
        Self {
            path,
            source,
            builder: FragmentBuilder::new(),
            scope: NamespaceScope::new(package),
            static_types: Vec::new(),
            static_members: HashMap::new(),
            types: TypeMembers::new(),
            type_ids: HashMap::new(),
            callables: HashMap::new(),
            callable_owner: HashMap::new(),
            locals: HashMap::new(),
        }
    }

    fn collect_definitions(&mut self, node: Node, owner: Option<&str>) {
        match node.kind() {
            kind if TYPE_KINDS.contains(&kind) => {
                self.define_type(node, owner);
                return;
            }
            "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                if let Some(owner) = owner {
                    self.define_method(node, owner);
                }
                return;
            }
            "field_declaration" | "constant_declaration" => {
                if let Some(owner) = owner {
                    self.define_fields(node, owner);
                }
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_definitions(child, owner);
        }
    }

    fn define_type(&mut self, node: Node, owner: Option<&str>) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let id = match owner {
            Some(owner) => format!("{}.{}", owner, name),
            None => resolve::qualified(self.scope.current(), name),
        };
        let is_interface = matches!(
            node.kind(),
            "interface_declaration" | "annotation_type_declaration"
        );
        let label = if is_interface { LABEL_INTERFACE } else { LABEL_CLASS };

        self.builder.add_node(
            GraphNode::definition(&id, label, name, self.path, start_line(node))
                .with_property(PROP_END_LINE, end_line(node))
                .with_property("kind", node.kind().trim_end_matches("_declaration"))
                .with_property("package", self.scope.current()),
        );
        self.scope.add_local_type(name, &id);
        if is_interface {
            self.types.mark_interface(&id);
        }
        self.type_ids.insert(node.id(), id.clone());

        if node.kind() == "record_declaration" {
            self.define_record_components(node, &id);
        }
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.collect_definitions(child, Some(&id));
            }
        }
    }

    fn define_method(&mut self, node: Node, owner: &str) {
        let name = match field_text(node, "name", self.source) {
            Some(name) => name,
            None => return,
        };
        let id = resolve::nested(owner, name);

        let mut method = GraphNode::definition(&id, LABEL_METHOD, name, self.path, start_line(node))
            .with_property(PROP_END_LINE, end_line(node))
            .with_property("signature", signature(node, self.source))
            .with_property(
                "complexity",
                cyclomatic_complexity(node, self.source, BRANCH_KINDS),
            );
        if node.kind() != "method_declaration" {
            method.set_property("kind", "constructor");
        }
        if has_modifier(node, "static", self.source) {
            method.set_property("static", true);
        }
        self.builder.add_node(method);
        self.builder.add_edge(owner, &id, EDGE_HAS_METHOD);
        self.types.add_member(owner, name, &id);
        self.callables.insert(node.id(), id);
        self.callable_owner.insert(node.id(), owner.to_string());

        // Anonymous and local classes inside the body.
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_definitions(body, Some(owner));
        }
    }

    fn define_fields(&mut self, node: Node, owner: &str) {
        let type_text = field_text(node, "type", self.source).unwrap_or("");
        let is_static = has_modifier(node, "static", self.source);

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let Some(name) = field_text(declarator, "name", self.source) else {
                continue;
            };
            let id = resolve::nested(owner, name);
            let mut field = GraphNode::definition(&id, LABEL_FIELD, name, self.path, start_line(declarator))
                .with_property(PROP_TYPE, type_text);
            if is_static {
                field.set_property("static", true);
            }
            self.builder.add_node(field);
            self.builder.add_edge(owner, &id, EDGE_DEFINES);
            self.types.add_field(owner, name, &id, type_text);
        }
    }

    fn define_record_components(&mut self, node: Node, owner: &str) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let (Some(name), Some(type_text)) = (
                field_text(param, "name", self.source),
                field_text(param, "type", self.source),
            ) else {
                continue;
            };
            let id = resolve::nested(owner, name);
            self.builder.add_node(
                GraphNode::definition(&id, LABEL_FIELD, name, self.path, start_line(param))
                    .with_property(PROP_TYPE, type_text),
            );
            self.builder.add_edge(owner, &id, EDGE_DEFINES);
            self.types.add_field(owner, name, &id, type_text);
        }
    }

    fn visit_reference(&mut self, node: Node) {
        match node.kind() {
            "method_invocation" => self.link_invocation(node),
            "object_creation_expression" => self.link_creation(node),
            "identifier" => self.link_field_use(node),
            kind if TYPE_KINDS.contains(&kind) => self.link_supertypes(node),
            _ => {}
        }
    }

    fn link_supertypes(&mut self, type_node: Node) {
        let Some(type_id) = self.type_ids.get(&type_node.id()).cloned() else {
            return;
        };

        let mut cursor = type_node.walk();
        let clauses: Vec<Node> = type_node.children(&mut cursor).collect();
        for clause in clauses {
            let edge_type = match clause.kind() {
                "superclass" | "extends_interfaces" => EDGE_EXTENDS,
                "super_interfaces" => EDGE_IMPLEMENTS,
                _ => continue,
            };
            for type_ref in clause_types(clause) {
                let text = node_text(type_ref, self.source);
                for candidate in self.scope.candidates(text) {
                    self.builder.add_edge(&type_id, &candidate, edge_type);
                    self.types.add_base(&type_id, &candidate);
                }
            }
        }
    }

    fn link_invocation(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let Some(ctx) = self.context(node) else {
            return;
        };

        let targets = match node.child_by_field_name("object") {
            None => self.resolve_unqualified_call(name, ctx.owner.as_deref()),
            Some(receiver) => match self.receiver_types(receiver, &ctx) {
                Some(types) if !types.is_empty() => types
                    .iter()
                    .map(|t| self.types.resolve_member(t, name))
                    .collect(),
                _ => vec![resolve::unresolved(name)],
            },
        };

        for target in targets {
            self.builder.add_edge(&ctx.source_id, &target, EDGE_CALLS);
        }
    }

    fn link_creation(&mut self, node: Node) {
        let Some(type_text) = field_text(node, "type", self.source) else {
            return;
        };
        let Some(ctx) = self.context(node) else {
            return;
        };
        for candidate in self.scope.candidates(type_text) {
            self.builder.add_edge(&ctx.source_id, &candidate, EDGE_CALLS);
        }
    }

    fn link_field_use(&mut self, ident: Node) {
        let Some(parent) = ident.parent() else {
            return;
        };
        let is_child = |name: &str| parent.child_by_field_name(name).map(|n| n.id()) == Some(ident.id());

        let via_this = match parent.kind() {
            "field_access" if is_child("field") => {
                let on_this = parent
                    .child_by_field_name("object")
                    .is_some_and(|o| o.kind() == "this");
                if !on_this {
                    return;
                }
                true
            }
            "method_invocation" if is_child("name") => return,
            "variable_declarator" if is_child("name") => return,
            kind if kind.ends_with("_declaration")
                || matches!(
                    kind,
                    "formal_parameter" | "catch_formal_parameter" | "enhanced_for_statement"
                        | "lambda_expression" | "inferred_parameters" | "scoped_identifier"
                        | "labeled_statement" | "break_statement" | "continue_statement"
                ) =>
            {
                return
            }
            _ => false,
        };

        let name = node_text(ident, self.source);
        let Some(ctx) = self.context(ident) else {
            return;
        };
        let Some(owner) = ctx.owner.as_deref() else {
            return;
        };
        if !via_this && ctx.locals.contains_key(name) {
            return;
        }
        if self.types.is_field(owner, name) {
            let field_id = self.types.resolve_member(owner, name);
            self.builder.add_edge(&ctx.source_id, &field_id, EDGE_USES);
        }
    }

    fn resolve_unqualified_call(&self, name: &str, owner: Option<&str>) -> Vec<String> {
        if let Some(id) = owner.and_then(|o| self.types.member(o, name)) {
            return vec![id.to_string()];
        }
        if let Some(id) = self.static_members.get(name) {
            return vec![id.clone()];
        }
        let mut targets: Vec<String> = owner
            .map(|o| self.types.resolve_member(o, name))
            .into_iter()
            .collect();
        for static_type in &self.static_types {
            targets.push(resolve::nested(static_type, name));
        }
        if targets.is_empty() {
            targets.push(resolve::unresolved(name));
        }
        targets
    }

    fn receiver_types(&self, receiver: Node, ctx: &RefContext) -> Option<Vec<String>> {
        match receiver.kind() {
            "this" => ctx.owner.clone().map(|o| vec![o]),
            "super" => {
                let owner = ctx.owner.as_deref()?;
                Some(self.types.bases(owner).to_vec())
            }
            "identifier" => {
                let name = node_text(receiver, self.source);
                if let Some(declared) = ctx.locals.get(name) {
                    return declared.as_deref().map(|t| self.scope.candidates(t));
                }
                if let Some(field_type) = ctx
                    .owner
                    .as_deref()
                    .and_then(|o| self.types.field_type(o, name))
                {
                    return Some(self.scope.candidates(field_type));
                }
                Some(self.scope.candidates(name))
            }
            "field_access" => {
                let object = receiver.child_by_field_name("object")?;
                if object.kind() != "this" {
                    return None;
                }
                let owner = ctx.owner.as_deref()?;
                let field = field_text(receiver, "field", self.source)?;
                self.types
                    .field_type(owner, field)
                    .map(|t| self.scope.candidates(t))
            }
            _ => None,
        }
    }

    fn context(&mut self, node: Node) -> Option<RefContext> {
        if let Some(callable) = find_ancestor(node, |n| self.callables.contains_key(&n.id())) {
            let locals = self.locals_of(callable);
            return Some(RefContext {
                source_id: self.callables.get(&callable.id())?.clone(),
                owner: self.callable_owner.get(&callable.id()).cloned(),
                locals,
            });
        }

        let type_node = find_ancestor(node, |n| self.type_ids.contains_key(&n.id()))?;
        let type_id = self.type_ids.get(&type_node.id())?.clone();
        Some(RefContext {
            source_id: type_id.clone(),
            owner: Some(type_id),
            locals: Rc::new(Locals::new()),
        })
    }

    fn locals_of(&mut self, callable: Node) -> Rc<Locals> {
        if let Some(locals) = self.locals.get(&callable.id()) {
            return Rc::clone(locals);
        }
        let locals = Rc::new(method_locals(callable, self.source));
        self.locals.insert(callable.id(), Rc::clone(&locals));
        locals
    }
}

/// Parameters and local declarations of a method or constructor.
fn method_locals(callable: Node, source: &[u8]) -> Locals {
    let mut locals = Locals::new();
    walk_tree(callable, &mut |n| match n.kind() {
        "formal_parameter" | "catch_formal_parameter" | "enhanced_for_statement" | "resource" => {
            if let Some(name) = field_text(n, "name", source) {
                let ty = field_text(n, "type", source)
                    .filter(|t| *t != "var")
                    .map(str::to_string);
                locals.insert(name.to_string(), ty);
            }
        }
        "spread_parameter" => {
            let mut cursor = n.walk();
            let declarator = n
                .named_children(&mut cursor)
                .find(|c| c.kind() == "variable_declarator");
            if let Some(name) = declarator.and_then(|d| field_text(d, "name", source)) {
                locals.insert(name.to_string(), None);
            }
        }
        "local_variable_declaration" => {
            let declared = field_text(n, "type", source).unwrap_or("var");
            let mut cursor = n.walk();
            let declarators: Vec<Node> = n.children_by_field_name("declarator", &mut cursor).collect();
            for declarator in declarators {
                let Some(name) = field_text(declarator, "name", source) else {
                    continue;
                };
                let ty = if declared == "var" {
                    declarator
                        .child_by_field_name("value")
                        .filter(|v| v.kind() == "object_creation_expression")
                        .and_then(|v| field_text(v, "type", source))
                        .map(str::to_string)
                } else {
                    Some(declared.to_string())
                };
                locals.insert(name.to_string(), ty);
            }
        }
        "lambda_expression" => {
            if let Some(params) = n.child_by_field_name("parameters") {
                if params.kind() == "identifier" {
                    locals.insert(node_text(params, source).to_string(), None);
                } else if params.kind() == "inferred_parameters" {
                    let mut cursor = params.walk();
                    for p in params.named_children(&mut cursor) {
                        locals.insert(node_text(p, source).to_string(), None);
                    }
                }
            }
        }
        _ => {}
    });
    locals
}

/// Type references listed in a `superclass`, `super_interfaces` or
/// `extends_interfaces` clause.
fn clause_types(clause: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut list_cursor = child.walk();
            out.extend(child.named_children(&mut list_cursor));
        } else {
            out.push(child);
        }
    }
    out
}

fn package_name(root: Node, source: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    let package = root
        .children(&mut cursor)
        .find(|c| c.kind() == "package_declaration")?;
    let mut package_cursor = package.walk();
    let name = package
        .named_children(&mut package_cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| node_text(c, source).to_string());
    name
}

fn has_modifier(node: Node, modifier: &str, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    let modifiers = node
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers");
    modifiers.is_some_and(|m| {
        let mut m_cursor = m.walk();
        let found = m
            .children(&mut m_cursor)
            .any(|c| node_text(c, source) == modifier);
        found
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"package com.example;

import java.util.List;
import java.util.ArrayList;

class Base {
    protected int baseValue;
}

interface Worker {
    void doWork();
}

public class Sample extends Base implements Worker {
    private List<String> items;
    private Worker helper;

    public Sample(Worker helper) {
        this.helper = helper;
        this.items = new ArrayList<>();
    }

    public void doWork() {
        helper.doWork();
        System.out.println("Items: " + items.size());
    }

    public void addItem(String item) {
        items.add(item);
    }
}
"#;

    fn parse(src: &str) -> Fragment {
        JavaAnalyzer::new()
            .parse("src/com/example/Sample.java", src.as_bytes())
            .expect("Failed to parse")
    }

    fn has_edge(fragment: &Fragment, source: &str, target: &str, edge_type: &str) -> bool {
        fragment
            .edges
            .iter()
            .any(|e| e.source_id == source && e.target_id == target && e.edge_type == edge_type)
    }

    #[test]
    fn test_types_are_package_qualified() {
        let fragment = parse(SAMPLE);
        assert_eq!(
            fragment.node("com.example.Sample").map(|n| n.label.as_str()),
            Some(LABEL_CLASS)
        );
        assert_eq!(
            fragment.node("com.example.Worker").map(|n| n.label.as_str()),
            Some(LABEL_INTERFACE)
        );
        let items = fragment.node("com.example.Sample:items").expect("items field");
        assert_eq!(items.label, LABEL_FIELD);
        assert_eq!(
            items.property(PROP_TYPE).and_then(|v| v.as_str()),
            Some("List<String>")
        );
    }

    #[test]
    fn test_extends_and_implements() {
        let fragment = parse(SAMPLE);
        assert!(has_edge(&fragment, "com.example.Sample", "com.example.Base", EDGE_EXTENDS));
        assert!(has_edge(&fragment, "com.example.Sample", "com.example.Worker", EDGE_IMPLEMENTS));
    }

    #[test]
    fn test_calls_resolve_through_field_types() {
        let fragment = parse(SAMPLE);
        let do_work = "com.example.Sample:doWork";
        assert!(has_edge(&fragment, do_work, "com.example.Worker:doWork", EDGE_CALLS));
        assert!(has_edge(&fragment, do_work, "java.util.List:size", EDGE_CALLS));
        assert!(has_edge(&fragment, do_work, "UNKNOWN:println", EDGE_CALLS));
        assert!(has_edge(&fragment, "com.example.Sample:addItem", "java.util.List:add", EDGE_CALLS));
    }

    #[test]
    fn test_constructor_creation_and_field_uses() {
        let fragment = parse(SAMPLE);
        let ctor = "com.example.Sample:Sample";
        assert!(has_edge(&fragment, ctor, "java.util.ArrayList", EDGE_CALLS));
        assert!(has_edge(&fragment, ctor, "com.example.Sample:helper", EDGE_USES));
        assert!(has_edge(&fragment, "com.example.Sample:addItem", "com.example.Sample:items", EDGE_USES));
    }

    #[test]
    fn test_static_import_and_java_lang() {
        let src = r#"package app;

import static java.util.Objects.requireNonNull;

class Guard {
    void check(Object o) {
        requireNonNull(o);
        String.valueOf(o);
    }
}
"#;
        let fragment = parse(src);
        assert!(has_edge(&fragment, "app.Guard:check", "java.util.Objects:requireNonNull", EDGE_CALLS));
        assert!(has_edge(&fragment, "app.Guard:check", "java.lang.String:valueOf", EDGE_CALLS));
        assert!(has_edge(&fragment, "app.Guard:check", "app.String:valueOf", EDGE_CALLS));
    }
}
