//! C/C++-specific tree-sitter analysis.
//!
//! IDs are file-scoped: functions and globals are `path:name`, classes and
//! structs `path:Class`, and members `path:Class:member`. Out-of-line
//! definitions such as `void Widget::draw()` attach to `path:Widget`.
//!
//! References that miss the local tables are matched against the file's
//! `#include`s by base filename (`Math::Add` with `#include "math.h"` becomes
//! `dir/math.h:Math::Add`) before falling back to `UNKNOWN:symbol`.

use super::imports::extract_cpp_includes;
use super::syntax::{
    compile_query, cyclomatic_complexity, declarator_name, end_line, field_text, find_ancestor,
    node_text, parse_source, signature, start_line, walk_tree,
};
use super::Analyzer;
use crate::error::Result;
use crate::graph::schema::{
    EDGE_CALLS, EDGE_DEFINES, EDGE_HAS_METHOD, EDGE_INHERITS, EDGE_USES, LABEL_CLASS,
    LABEL_FIELD, LABEL_FUNCTION, LABEL_GLOBAL, LABEL_METHOD, PROP_END_LINE, PROP_TYPE,
};
use crate::graph::{Fragment, FragmentBuilder, Node as GraphNode};
use crate::resolve::{self, base_type_name, resolve_from_includes, SymbolTable};
use std::collections::{HashMap, HashSet};
use tree_sitter::{Node, Query, QueryCursor};

const INHERITANCE_QUERY: &str = r#"
(class_specifier
  name: (type_identifier) @class.name
  (base_class_clause [(type_identifier) (qualified_identifier) (template_type)] @base.name))
(struct_specifier
  name: (type_identifier) @class.name
  (base_class_clause [(type_identifier) (qualified_identifier) (template_type)] @base.name))
"#;

const USAGE_QUERY: &str = r#"
(call_expression function: (identifier) @call.target)
(call_expression function: (qualified_identifier) @call.target)
(call_expression function: (template_function name: (identifier) @call.target))
(call_expression function: (field_expression) @call.member)
(assignment_expression left: (identifier) @usage.target)
(assignment_expression right: (identifier) @usage.target)
(binary_expression left: (identifier) @usage.target)
(binary_expression right: (identifier) @usage.target)
(unary_expression argument: (identifier) @usage.target)
(update_expression argument: (identifier) @usage.target)
(field_expression field: (field_identifier)) @usage.field
"#;

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_range_loop",
    "while_statement",
    "do_statement",
    "case_statement",
    "catch_clause",
    "conditional_expression",
];

/// Analyzer for C and C++ sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct CppAnalyzer;

impl CppAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for CppAnalyzer {
    fn language(&self) -> &'static str {
        "cpp"
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let language = tree_sitter_cpp::language();
        let tree = parse_source(&language, "C++", file_path, content)?;
        let root = tree.root_node();

        let mut file = CppFile::new(file_path, content);
        file.includes = extract_cpp_includes(root, content)
            .into_iter()
            .map(|fact| fact.path)
            .collect();
        file.collect_definitions(root, None);

        let inheritance =
            compile_query(&language, INHERITANCE_QUERY, "Inheritance", file_path, &file.builder)?;
        file.collect_inheritance(&inheritance, root);

        let usage = compile_query(&language, USAGE_QUERY, "Usage", file_path, &file.builder)?;
        file.collect_usages(&usage, root);

        Ok(file.builder.finish())
    }
}

/// Declared local name → declared type text (`None` when not written).
type Locals = HashMap<String, Option<String>>;

/// Resolution state for one C/C++ file.
struct CppFile<'a> {
    path: &'a str,
    source: &'a [u8],
    builder: FragmentBuilder,
    includes: Vec<String>,
    /// Free functions, globals, and member names as a last resort.
    symbols: SymbolTable,
    /// Class/struct name → ID.
    classes: SymbolTable,
    class_ids: HashSet<String>,
    namespaces: HashSet<String>,
    /// Owner ID → member name → member ID.
    members: HashMap<String, SymbolTable>,
    /// Owner ID → field name → declared type.
    field_types: HashMap<String, HashMap<String, String>>,
    /// Function definition node id → entity ID.
    callables: HashMap<usize, String>,
    /// Function definition node id → owning class ID.
    callable_owner: HashMap<usize, String>,
    locals: HashMap<usize, Locals>,
}

impl<'a> CppFile<'a> {
    fn new(path: &'a str, source: &'a [u8]) -> Self {
        Self {
            path,
            source,
            builder: FragmentBuilder::new(),
            includes: Vec::new(),
            symbols: SymbolTable::new(),
            classes: SymbolTable::new(),
            class_ids: HashSet::new(),
            namespaces: HashSet::new(),
            members: HashMap::new(),
            field_types: HashMap::new(),
            callables: HashMap::new(),
            callable_owner: HashMap::new(),
            locals: HashMap::new(),
        }
    }

    // ---- definitions -------------------------------------------------

    fn collect_definitions(&mut self, node: Node, owner: Option<&str>) {
        match node.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                if self.define_class(node) {
                    return;
                }
            }
            "function_definition" => {
                self.define_function(node, owner);
                return;
            }
            "field_declaration" => {
                if let Some(owner) = owner {
                    self.define_fields(node, owner);
                }
            }
            "declaration" => {
                if owner.is_none() {
                    self.define_globals(node);
                }
            }
            "namespace_definition" => {
                if let Some(name) = field_text(node, "name", self.source) {
                    self.namespaces.insert(name.to_string());
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_definitions(child, owner);
        }
    }

    /// Returns true if the node was a class with a body and has been handled.
    fn define_class(&mut self, node: Node) -> bool {
        let (Some(name_node), Some(body)) = (
            node.child_by_field_name("name"),
            node.child_by_field_name("body"),
        ) else {
            return false;
        };

        let name = base_type_name(node_text(name_node, self.source)).to_string();
        let id = resolve::file_scoped(self.path, &name);
        let kind = node.kind().trim_end_matches("_specifier");

        self.builder.add_node(
            GraphNode::definition(&id, LABEL_CLASS, &name, self.path, start_line(node))
                .with_property(PROP_END_LINE, end_line(node))
                .with_property("kind", kind),
        );
        self.classes.insert(&name, &id);
        self.class_ids.insert(id.clone());

        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            self.collect_definitions(child, Some(&id));
        }
        true
    }

    fn define_function(&mut self, node: Node, owner: Option<&str>) {
        let Some(name_node) = function_declarator(node).and_then(|d| d.child_by_field_name("declarator"))
        else {
            return;
        };
        let full_name = node_text(name_node, self.source).to_string();

        let (id, label, name, owner_id) = match full_name.rsplit_once("::") {
            Some((scope, member)) => {
                let scope = last_segment(base_type_name(scope));
                if self.namespaces.contains(scope) && !self.classes.contains(scope) {
                    let id = resolve::file_scoped(self.path, &full_name);
                    (id, LABEL_FUNCTION, member.to_string(), None)
                } else {
                    let owner_id = self
                        .classes
                        .get(scope)
                        .map(str::to_string)
                        .unwrap_or_else(|| resolve::file_scoped(self.path, scope));
                    let id = resolve::nested(&owner_id, member);
                    (id, LABEL_METHOD, member.to_string(), Some(owner_id))
                }
            }
            None => match owner {
                Some(owner_id) => {
                    let id = resolve::nested(owner_id, &full_name);
                    (id, LABEL_METHOD, full_name.clone(), Some(owner_id.to_string()))
                }
                None => {
                    let id = resolve::file_scoped(self.path, &full_name);
                    (id, LABEL_FUNCTION, full_name.clone(), None)
                }
            },
        };

        self.builder.add_node(
            GraphNode::definition(&id, label, &name, self.path, start_line(node))
                .with_property(PROP_END_LINE, end_line(node))
                .with_property("signature", signature(node, self.source))
                .with_property(
                    "complexity",
                    cyclomatic_complexity(node, self.source, BRANCH_KINDS),
                ),
        );

        self.symbols.insert(&full_name, &id);
        self.symbols.insert(&name, &id);
        if let Some(owner_id) = owner_id {
            self.builder.add_edge(&owner_id, &id, EDGE_HAS_METHOD);
            self.members
                .entry(owner_id.clone())
                .or_default()
                .insert(&name, &id);
            self.callable_owner.insert(node.id(), owner_id);
        }
        self.callables.insert(node.id(), id);
    }

    fn define_fields(&mut self, node: Node, owner: &str) {
        let type_text = field_text(node, "type", self.source).unwrap_or("").to_string();

        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = declarator_name(declarator, self.source) else {
                continue;
            };
            let id = resolve::nested(owner, name);

            if function_declarator(declarator).is_some() {
                // Method prototype; the body lives elsewhere.
                self.members
                    .entry(owner.to_string())
                    .or_default()
                    .insert(name, &id);
                continue;
            }

            self.builder.add_node(
                GraphNode::definition(&id, LABEL_FIELD, name, self.path, start_line(declarator))
                    .with_property(PROP_TYPE, type_text.as_str()),
            );
            self.builder.add_edge(owner, &id, EDGE_DEFINES);
            self.members
                .entry(owner.to_string())
                .or_default()
                .insert(name, &id);
            self.field_types
                .entry(owner.to_string())
                .or_default()
                .insert(name.to_string(), type_text.clone());
            self.symbols.insert(name, &id);
        }
    }

    fn define_globals(&mut self, node: Node) {
        let type_text = field_text(node, "type", self.source).unwrap_or("").to_string();

        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = declarator_name(declarator, self.source) else {
                continue;
            };
            let id = resolve::file_scoped(self.path, name);

            if function_declarator(declarator).is_some() {
                // Forward declaration.
                self.symbols.insert(name, &id);
                continue;
            }

            self.builder.add_node(
                GraphNode::definition(&id, LABEL_GLOBAL, name, self.path, start_line(declarator))
                    .with_property(PROP_TYPE, type_text.as_str()),
            );
            self.symbols.insert(name, &id);
        }
    }

    // ---- inheritance -------------------------------------------------

    fn collect_inheritance(&mut self, query: &Query, root: Node) {
        let source = self.source;
        let mut cursor = QueryCursor::new();

        for m in cursor.matches(query, root, source) {
            let mut class_name = None;
            let mut base_name = None;
            for cap in m.captures {
                match query.capture_names()[cap.index as usize] {
                    "class.name" => class_name = Some(node_text(cap.node, source)),
                    "base.name" => base_name = Some(node_text(cap.node, source)),
                    _ => {}
                }
            }

            if let (Some(class_name), Some(base_name)) = (class_name, base_name) {
                let source_id = self
                    .classes
                    .get(class_name)
                    .map(str::to_string)
                    .unwrap_or_else(|| resolve::file_scoped(self.path, class_name));
                let target_id = self.resolve_type(base_name);
                self.builder.add_edge(&source_id, &target_id, EDGE_INHERITS);
            }
        }
    }

    // ---- calls and usages --------------------------------------------

    fn collect_usages(&mut self, query: &Query, root: Node) {
        let source = self.source;
        let mut cursor = QueryCursor::new();

        for m in cursor.matches(query, root, source) {
            for cap in m.captures {
                let capture = query.capture_names()[cap.index as usize];
                let Some(func) = find_ancestor(cap.node, |n| self.callables.contains_key(&n.id()))
                else {
                    continue;
                };
                if !self.locals.contains_key(&func.id()) {
                    let locals = self.function_locals(func);
                    self.locals.insert(func.id(), locals);
                }

                let Some(source_id) = self.callables.get(&func.id()).cloned() else {
                    continue;
                };
                let owner = self.callable_owner.get(&func.id()).map(String::as_str);
                let locals = &self.locals[&func.id()];

                let resolved = match capture {
                    "call.target" => {
                        let name = node_text(cap.node, source);
                        if locals.contains_key(name) {
                            None
                        } else {
                            Some((self.resolve_symbol(name, owner), EDGE_CALLS))
                        }
                    }
                    "call.member" => self
                        .resolve_member_access(cap.node, owner, locals)
                        .map(|target| (target, EDGE_CALLS)),
                    "usage.target" => {
                        let name = node_text(cap.node, source);
                        if locals.contains_key(name) {
                            None
                        } else {
                            Some((self.resolve_symbol(name, owner), EDGE_USES))
                        }
                    }
                    "usage.field" if !is_call_function(cap.node) => self
                        .resolve_member_access(cap.node, owner, locals)
                        .map(|target| (target, EDGE_USES)),
                    _ => None,
                };

                if let Some((target_id, edge_type)) = resolved {
                    self.builder.add_edge(&source_id, &target_id, edge_type);
                }
            }
        }
    }

    /// Parameters and body declarations of a function definition.
    fn function_locals(&self, func: Node) -> Locals {
        let source = self.source;
        let mut locals = Locals::new();

        if let Some(params) = function_declarator(func).and_then(|d| d.child_by_field_name("parameters")) {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                let declared = param
                    .child_by_field_name("declarator")
                    .and_then(|d| declarator_name(d, source));
                if let Some(name) = declared {
                    let ty = field_text(param, "type", source).map(str::to_string);
                    locals.insert(name.to_string(), ty);
                }
            }
        }

        if let Some(body) = func.child_by_field_name("body") {
            walk_tree(body, &mut |n| match n.kind() {
                "declaration" => {
                    let ty = field_text(n, "type", source).map(str::to_string);
                    let mut cursor = n.walk();
                    for d in n.children_by_field_name("declarator", &mut cursor) {
                        if let Some(name) = declarator_name(d, source) {
                            locals.insert(name.to_string(), ty.clone());
                        }
                    }
                }
                "for_range_loop" | "parameter_declaration" => {
                    let ty = field_text(n, "type", source).map(str::to_string);
                    if let Some(name) = n
                        .child_by_field_name("declarator")
                        .and_then(|d| declarator_name(d, source))
                    {
                        locals.insert(name.to_string(), ty);
                    }
                }
                _ => {}
            });
        }

        locals
    }

    /// Resolve `obj.member` / `obj->member` (a `field_expression`).
    fn resolve_member_access(&self, expr: Node, owner: Option<&str>, locals: &Locals) -> Option<String> {
        let member = field_text(expr, "field", self.source)?;
        let receiver = expr.child_by_field_name("argument")?;

        match self.receiver_type(receiver, owner, locals) {
            Some(type_id) => Some(self.member_of(&type_id, member)),
            None => Some(self.resolve_symbol(member, None)),
        }
    }

    /// Type ID of a member-access receiver, if it can be determined.
    fn receiver_type(&self, receiver: Node, owner: Option<&str>, locals: &Locals) -> Option<String> {
        match receiver.kind() {
            "this" => owner.map(str::to_string),
            "identifier" => {
                let name = node_text(receiver, self.source);
                if let Some(declared) = locals.get(name) {
                    return declared
                        .as_deref()
                        .filter(|t| !is_inferred_type(t))
                        .map(|t| self.resolve_type(t));
                }
                if let Some(ty) = owner.and_then(|o| self.field_type(o, name)) {
                    return Some(self.resolve_type(ty));
                }
                Some(self.resolve_type(name))
            }
            "field_expression" => {
                let inner = receiver.child_by_field_name("argument")?;
                let field = field_text(receiver, "field", self.source)?;
                let inner_type = self.receiver_type(inner, owner, locals)?;
                self.field_type(&inner_type, field).map(|t| self.resolve_type(t))
            }
            _ => None,
        }
    }

    fn field_type(&self, owner: &str, field: &str) -> Option<&str> {
        self.field_types
            .get(owner)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    fn member_of(&self, type_id: &str, member: &str) -> String {
        if let Some(id) = self.members.get(type_id).and_then(|t| t.get(member)) {
            return id.to_string();
        }
        if self.class_ids.contains(type_id) {
            if let Some(id) = self.symbols.get(member) {
                return id.to_string();
            }
        }
        resolve::nested(type_id, member)
    }

    /// Resolve a type name: local class, include match, sentinel.
    fn resolve_type(&self, type_text: &str) -> String {
        let name = base_type_name(type_text);
        if let Some(id) = self.classes.get(name).or_else(|| self.classes.get(last_segment(name))) {
            return id.to_string();
        }
        resolve_from_includes(name, &self.includes, self.path)
            .unwrap_or_else(|| resolve::unresolved(name))
    }

    /// Resolve a called or used name from inside `owner`'s method (if any).
    fn resolve_symbol(&self, name: &str, owner: Option<&str>) -> String {
        if let Some(id) = owner
            .and_then(|o| self.members.get(o))
            .and_then(|table| table.get(name))
        {
            return id.to_string();
        }
        if let Some(id) = self.symbols.get(name) {
            return id.to_string();
        }
        if let Some((scope, member)) = name.rsplit_once("::") {
            let scope = last_segment(base_type_name(scope));
            if let Some(class_id) = self.classes.get(scope) {
                return self.member_of(class_id, member);
            }
            if self.namespaces.contains(scope) {
                if let Some(id) = self.symbols.get(member) {
                    return id.to_string();
                }
            }
        }
        resolve_from_includes(name, &self.includes, self.path)
            .unwrap_or_else(|| resolve::unresolved(name))
    }
}

/// The `function_declarator` under a definition or declarator, drilling
/// through pointer/reference wrappers.
fn function_declarator(node: Node) -> Option<Node> {
    if node.kind() == "function_declarator" {
        return Some(node);
    }
    let inner = node.child_by_field_name("declarator").or_else(|| {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|c| c.kind().ends_with("declarator"));
        found
    })?;
    function_declarator(inner)
}

fn is_call_function(node: Node) -> bool {
    node.parent().is_some_and(|p| {
        p.kind() == "call_expression"
            && p.child_by_field_name("function").map(|f| f.id()) == Some(node.id())
    })
}

fn is_inferred_type(type_text: &str) -> bool {
    matches!(type_text.trim(), "auto" | "decltype(auto)")
}

fn last_segment(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}
