//! C# analysis with tree-sitter-c-sharp.
//!
//! Types get namespace-qualified IDs (`MyCorp.App.UserManager`, nested types
//! `MyCorp.App.Outer.Inner`), members hang off their type
//! (`MyCorp.App.UserManager:Save`). Type references that are not defined in
//! the file expand to one candidate per `using` namespace plus the enclosing
//! namespace, and one edge is emitted per candidate.

use super::imports::{extract_csharp_usings, ImportKind};
use super::members::{looks_like_interface, Locals, TypeMembers};
use super::syntax::{
    cyclomatic_complexity, end_line, field_text, find_ancestor, node_text, parse_source,
    signature, start_line, walk_tree,
};
use super::Analyzer;
use crate::error::Result;
use crate::graph::schema::{
    EDGE_CALLS, EDGE_DEFINES, EDGE_EXTENDS, EDGE_HAS_METHOD, EDGE_IMPLEMENTS, EDGE_INHERITS,
    EDGE_USES, LABEL_CLASS, LABEL_FIELD, LABEL_FUNCTION, LABEL_INTERFACE, LABEL_METHOD,
    PROP_END_LINE, PROP_TYPE,
};
use crate::graph::{Fragment, FragmentBuilder, Node as GraphNode};
use crate::resolve::{self, base_type_name, NamespaceScope, SymbolTable};
use std::collections::HashMap;
use std::rc::Rc;
use tree_sitter::Node;

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "record_declaration",
    "record_struct_declaration",
    "interface_declaration",
    "enum_declaration",
];

const CALLABLE_KINDS: &[&str] = &[
    "method_declaration",
    "constructor_declaration",
    "destructor_declaration",
    "local_function_statement",
];

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "foreach_statement",
    "while_statement",
    "do_statement",
    "switch_section",
    "switch_expression_arm",
    "catch_clause",
    "conditional_expression",
];

/// Analyzer for C# sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpAnalyzer;

impl CSharpAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for CSharpAnalyzer {
    fn language(&self) -> &'static str {
        "csharp"
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let language = tree_sitter_c_sharp::language();
        let tree = parse_source(&language, "C#", file_path, content)?;
        let root = tree.root_node();

        let mut file = CSharpFile::new(file_path, content);
        file.file_namespace = file_scoped_namespace(root, content).unwrap_or_default();
        for fact in extract_csharp_usings(root, content) {
            match fact.import_kind {
                ImportKind::CsUsingAlias => {
                    for name in &fact.imported_names {
                        file.scope.add_exact(&name.local, &name.remote);
                    }
                }
                ImportKind::CsUsingStatic => file.static_types.push(fact.path),
                _ => file.scope.add_namespace(&fact.path),
            }
        }

        file.collect_definitions(root, None);
        walk_tree(root, &mut |node| file.visit_reference(node));

        Ok(file.builder.finish())
    }
}

/// Where a reference sits: the entity it is attributed to and what is in
/// scope there.
struct RefContext {
    source_id: String,
    owner: Option<String>,
    namespace: String,
    locals: Rc<Locals>,
}

struct CSharpFile<'a> {
    path: &'a str,
    source: &'a [u8],
    builder: FragmentBuilder,
    scope: NamespaceScope,
    file_namespace: String,
    static_types: Vec<String>,
    types: TypeMembers,
    /// Functions declared outside any type (top-level statements).
    top_level: SymbolTable,
    type_ids: HashMap<usize, String>,
    callables: HashMap<usize, String>,
    callable_owner: HashMap<usize, String>,
    locals: HashMap<usize, Rc<Locals>>,
}

impl<'a> CSharpFile<'a> {
    fn new(path: &'a str, source: &'a [u8]) -> Self {
        Self {
            path,
            source,
            builder: FragmentBuilder::new(),
            scope: NamespaceScope::new(""),
            file_namespace: String::new(),
            static_types: Vec::new(),
            types: TypeMembers::new(),
            top_level: SymbolTable::new(),
            type_ids: HashMap::new(),
            callables: HashMap::new(),
            callable_owner: HashMap::new(),
            locals: HashMap::new(),
        }
    }

    /// Dotted namespace enclosing `node`.
    fn namespace_of(&self, node: Node) -> String {
        let mut parts = Vec::new();
        let mut current = node.parent();
        while let Some(n) = current {
            if n.kind() == "namespace_declaration" {
                if let Some(name) = field_text(n, "name", self.source) {
                    parts.push(name);
                }
            }
            current = n.parent();
        }
        if !self.file_namespace.is_empty() {
            parts.push(&self.file_namespace);
        }
        parts.reverse();
        parts.join(".")
    }

    // ---- definitions -------------------------------------------------

    fn collect_definitions(&mut self, node: Node, owner: Option<&str>) {
        let kind = node.kind();
        if TYPE_KINDS.contains(&kind) {
            self.define_type(node, owner);
            return;
        }
        if CALLABLE_KINDS.contains(&kind) {
            self.define_callable(node, owner);
            return;
        }
        match kind {
            "field_declaration" | "event_field_declaration" => {
                if let Some(owner) = owner {
                    self.define_fields(node, owner);
                }
                return;
            }
            "property_declaration" => {
                if let Some(owner) = owner {
                    self.define_property(node, owner);
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
        let namespace = self.namespace_of(node);
        let id = match owner {
            Some(owner) => format!("{}.{}", owner, name),
            None => resolve::qualified(&namespace, name),
        };
        let is_interface = node.kind() == "interface_declaration";
        let label = if is_interface { LABEL_INTERFACE } else { LABEL_CLASS };

        self.builder.add_node(
            GraphNode::definition(&id, label, name, self.path, start_line(node))
                .with_property(PROP_END_LINE, end_line(node))
                .with_property("kind", node.kind().trim_end_matches("_declaration"))
                .with_property("namespace", namespace.as_str()),
        );
        self.scope.add_local_type(name, &id);
        if is_interface {
            self.types.mark_interface(&id);
        }
        self.type_ids.insert(node.id(), id.clone());

        if node.kind() == "record_declaration" {
            self.define_record_parameters(node, &id);
        }
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.collect_definitions(child, Some(&id));
            }
        }
    }

    fn define_callable(&mut self, node: Node, owner: Option<&str>) {
        let Some(raw_name) = field_text(node, "name", self.source) else {
            return;
        };
        let name = if node.kind() == "destructor_declaration" {
            format!("~{}", raw_name)
        } else {
            raw_name.to_string()
        };
        let (id, label) = match owner {
            Some(owner) => (resolve::nested(owner, &name), LABEL_METHOD),
            None => (resolve::file_scoped(self.path, &name), LABEL_FUNCTION),
        };

        let mut graph_node = GraphNode::definition(&id, label, &name, self.path, start_line(node))
            .with_property(PROP_END_LINE, end_line(node))
            .with_property("signature", signature(node, self.source))
            .with_property(
                "complexity",
                cyclomatic_complexity(node, self.source, BRANCH_KINDS),
            );
        if node.kind() == "constructor_declaration" {
            graph_node.set_property("kind", "constructor");
        }
        if has_modifier(node, "static", self.source) {
            graph_node.set_property("static", true);
        }
        self.builder.add_node(graph_node);

        match owner {
            Some(owner) => {
                self.builder.add_edge(owner, &id, EDGE_HAS_METHOD);
                self.types.add_member(owner, &name, &id);
                self.callable_owner.insert(node.id(), owner.to_string());
            }
            None => {
                self.top_level.insert(&name, &id);
            }
        }
        self.callables.insert(node.id(), id);

        // Local functions inside the body.
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_definitions(body, owner);
        }
    }

    fn define_fields(&mut self, node: Node, owner: &str) {
        let mut cursor = node.walk();
        let Some(declaration) = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "variable_declaration")
        else {
            return;
        };
        let type_text = field_text(declaration, "type", self.source).unwrap_or("");
        let is_static = has_modifier(node, "static", self.source);

        let mut decl_cursor = declaration.walk();
        for declarator in declaration.named_children(&mut decl_cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator_identifier(declarator, self.source) else {
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

    fn define_property(&mut self, node: Node, owner: &str) {
        let (Some(name), Some(type_text)) = (
            field_text(node, "name", self.source),
            field_text(node, "type", self.source),
        ) else {
            return;
        };
        let id = resolve::nested(owner, name);
        let mut field = GraphNode::definition(&id, LABEL_FIELD, name, self.path, start_line(node))
            .with_property(PROP_TYPE, type_text)
            .with_property("kind", "property");
        if has_modifier(node, "static", self.source) {
            field.set_property("static", true);
        }
        self.builder.add_node(field);
        self.builder.add_edge(owner, &id, EDGE_DEFINES);
        self.types.add_field(owner, name, &id, type_text);
    }

    /// `record Person(string Name)` declares a property per parameter.
    fn define_record_parameters(&mut self, node: Node, owner: &str) {
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
                    .with_property(PROP_TYPE, type_text)
                    .with_property("kind", "property"),
            );
            self.builder.add_edge(owner, &id, EDGE_DEFINES);
            self.types.add_field(owner, name, &id, type_text);
        }
    }

    // ---- references --------------------------------------------------

    fn visit_reference(&mut self, node: Node) {
        match node.kind() {
            "invocation_expression" => self.link_invocation(node),
            "object_creation_expression" => self.link_creation(node),
            "identifier" => self.link_field_use(node),
            kind if TYPE_KINDS.contains(&kind) && kind != "enum_declaration" => {
                self.link_bases(node)
            }
            _ => {}
        }
    }

    fn link_bases(&mut self, type_node: Node) {
        let Some(type_id) = self.type_ids.get(&type_node.id()).cloned() else {
            return;
        };
        let mut cursor = type_node.walk();
        let Some(base_list) = type_node
            .children(&mut cursor)
            .find(|c| c.kind() == "base_list")
        else {
            return;
        };

        let namespace = self.namespace_of(type_node);
        let declaring_interface = type_node.kind() == "interface_declaration";
        let mut first = true;

        let mut base_cursor = base_list.walk();
        for base in base_list.named_children(&mut base_cursor) {
            let base = base_type_node(base);
            let text = node_text(base, self.source);
            if text.is_empty() {
                continue;
            }

            let is_interface = match self.scope.local_type(base_type_name(text)) {
                Some(local) => self.types.is_interface(local),
                None => looks_like_interface(text),
            };
            let edge_type = if declaring_interface {
                EDGE_EXTENDS
            } else if is_interface {
                EDGE_IMPLEMENTS
            } else if first {
                EDGE_INHERITS
            } else {
                EDGE_IMPLEMENTS
            };
            first = false;

            for candidate in self.scope.candidates_in(&namespace, text) {
                self.builder.add_edge(&type_id, &candidate, edge_type);
                self.types.add_base(&type_id, &candidate);
            }
        }
    }

    fn link_invocation(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let Some(ctx) = self.context(node) else {
            return;
        };

        let targets = match function.kind() {
            "identifier" | "generic_name" => {
                let name = simple_name(function, self.source);
                if ctx.locals.contains_key(name) {
                    Vec::new()
                } else {
                    self.resolve_unqualified_call(name, ctx.owner.as_deref())
                }
            }
            "member_access_expression" => self.resolve_member_call(function, &ctx),
            _ => Vec::new(),
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
        for candidate in self.scope.candidates_in(&ctx.namespace, type_text) {
            self.builder.add_edge(&ctx.source_id, &candidate, EDGE_CALLS);
        }
    }

    /// A bare identifier or `this.x` that names a field of the enclosing type.
    fn link_field_use(&mut self, ident: Node) {
        let Some(parent) = ident.parent() else {
            return;
        };
        let via_this = match parent.kind() {
            "member_access_expression" => {
                let is_name = parent.child_by_field_name("name").map(|n| n.id()) == Some(ident.id());
                let on_this = parent
                    .child_by_field_name("expression")
                    .is_some_and(|e| is_this(e, self.source));
                match (is_name, on_this) {
                    (false, _) => false,
                    (true, true) => true,
                    (true, false) => return,
                }
            }
            "invocation_expression" => return,
            kind if kind.ends_with("_declaration")
                || matches!(kind, "variable_declarator" | "parameter" | "local_function_statement") =>
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
        if let Some(field_id) = self
            .types
            .is_field(owner, name)
            .then(|| self.types.resolve_member(owner, name))
        {
            self.builder.add_edge(&ctx.source_id, &field_id, EDGE_USES);
        }
    }

    fn resolve_unqualified_call(&self, name: &str, owner: Option<&str>) -> Vec<String> {
        let Some(owner) = owner else {
            return vec![self
                .top_level
                .get(name)
                .map(str::to_string)
                .unwrap_or_else(|| resolve::unresolved(name))];
        };

        if let Some(id) = self.types.member(owner, name) {
            return vec![id.to_string()];
        }
        let mut targets = vec![self.types.resolve_member(owner, name)];
        for static_type in &self.static_types {
            targets.push(resolve::nested(static_type, name));
        }
        targets
    }

    fn resolve_member_call(&self, access: Node, ctx: &RefContext) -> Vec<String> {
        let Some(name) = access
            .child_by_field_name("name")
            .map(|n| simple_name(n, self.source))
        else {
            return Vec::new();
        };
        let receiver = access.child_by_field_name("expression");

        match receiver.and_then(|r| self.receiver_types(r, ctx)) {
            Some(types) if !types.is_empty() => types
                .iter()
                .map(|t| self.types.resolve_member(t, name))
                .collect(),
            _ => vec![resolve::unresolved(name)],
        }
    }

    /// Candidate type IDs for the receiver of a member access.
    fn receiver_types(&self, receiver: Node, ctx: &RefContext) -> Option<Vec<String>> {
        let candidates = |type_text: &str| self.scope.candidates_in(&ctx.namespace, type_text);

        match receiver.kind() {
            "this_expression" | "this" => ctx.owner.clone().map(|o| vec![o]),
            "base_expression" | "base" => {
                let owner = ctx.owner.as_deref()?;
                Some(self.types.bases(owner).to_vec())
            }
            "identifier" => {
                let name = node_text(receiver, self.source);
                if let Some(declared) = ctx.locals.get(name) {
                    return declared.as_deref().map(candidates);
                }
                if let Some(field_type) = ctx
                    .owner
                    .as_deref()
                    .and_then(|o| self.types.field_type(o, name))
                {
                    return Some(candidates(field_type));
                }
                Some(candidates(name))
            }
            "member_access_expression" => {
                let inner = receiver.child_by_field_name("expression")?;
                let member = field_text(receiver, "name", self.source)?;
                if is_this(inner, self.source) {
                    let owner = ctx.owner.as_deref()?;
                    return self.types.field_type(owner, member).map(candidates);
                }
                let text = node_text(receiver, self.source);
                is_dotted_name(text).then(|| candidates(text))
            }
            "generic_name" | "qualified_name" => Some(candidates(node_text(receiver, self.source))),
            "predefined_type" => Some(vec![node_text(receiver, self.source).to_string()]),
            _ => None,
        }
    }

    fn context(&mut self, node: Node) -> Option<RefContext> {
        let namespace = self.namespace_of(node);

        if let Some(callable) = find_ancestor(node, |n| self.callables.contains_key(&n.id())) {
            let locals = self.locals_at(callable);
            return Some(RefContext {
                source_id: self.callables.get(&callable.id())?.clone(),
                owner: self.callable_owner.get(&callable.id()).cloned(),
                namespace,
                locals,
            });
        }

        let type_node = find_ancestor(node, |n| self.type_ids.contains_key(&n.id()))?;
        let type_id = self.type_ids.get(&type_node.id())?.clone();
        Some(RefContext {
            source_id: type_id.clone(),
            owner: Some(type_id),
            namespace,
            locals: Rc::new(Locals::new()),
        })
    }

    /// Locals visible inside `callable`, including those of enclosing
    /// callables (for local functions).
    fn locals_at(&mut self, callable: Node) -> Rc<Locals> {
        if let Some(locals) = self.locals.get(&callable.id()) {
            return Rc::clone(locals);
        }

        let mut locals = callable_locals(callable, self.source);
        if let Some(outer) = find_ancestor(callable, |n| self.callables.contains_key(&n.id())) {
            for (name, ty) in self.locals_at(outer).iter() {
                locals.entry(name.clone()).or_insert_with(|| ty.clone());
            }
        }

        let locals = Rc::new(locals);
        self.locals.insert(callable.id(), Rc::clone(&locals));
        locals
    }
}

/// Parameters and body-level declarations of a callable.
fn callable_locals(callable: Node, source: &[u8]) -> Locals {
    let mut locals = Locals::new();

    if let Some(params) = callable.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if let Some(name) = field_text(param, "name", source) {
                let ty = field_text(param, "type", source).map(str::to_string);
                locals.insert(name.to_string(), ty);
            }
        }
    }

    let Some(body) = callable.child_by_field_name("body") else {
        return locals;
    };
    walk_tree(body, &mut |n| match n.kind() {
        "variable_declaration" => {
            let declared = field_text(n, "type", source).unwrap_or("var");
            let mut cursor = n.walk();
            for declarator in n.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = declarator_identifier(declarator, source) else {
                    continue;
                };
                let ty = if declared == "var" {
                    created_type(declarator, source)
                } else {
                    Some(declared.to_string())
                };
                locals.insert(name.to_string(), ty);
            }
        }
        "foreach_statement" => {
            if let Some(name) = field_text(n, "left", source) {
                let ty = field_text(n, "type", source)
                    .filter(|t| *t != "var")
                    .map(str::to_string);
                locals.insert(name.to_string(), ty);
            }
        }
        "declaration_expression" | "declaration_pattern" | "catch_declaration" | "parameter" => {
            if let Some(name) = field_text(n, "name", source) {
                let ty = field_text(n, "type", source)
                    .filter(|t| *t != "var")
                    .map(str::to_string);
                locals.insert(name.to_string(), ty);
            }
        }
        "implicit_parameter" => {
            locals.insert(node_text(n, source).to_string(), None);
        }
        _ => {}
    });

    locals
}

/// Type of `new T(...)` in `var x = new T(...)`.
fn created_type(declarator: Node, source: &[u8]) -> Option<String> {
    let mut cursor = declarator.walk();
    let children: Vec<Node> = declarator.named_children(&mut cursor).collect();
    for child in children {
        let value = if child.kind() == "equals_value_clause" {
            child.named_child(0)
        } else {
            Some(child)
        };
        if let Some(value) = value.filter(|v| v.kind() == "object_creation_expression") {
            return field_text(value, "type", source).map(str::to_string);
        }
    }
    None
}

fn declarator_identifier<'s>(declarator: Node, source: &'s [u8]) -> Option<&'s str> {
    if let Some(name) = declarator.child_by_field_name("name") {
        return Some(node_text(name, source));
    }
    let mut cursor = declarator.walk();
    let found = declarator
        .named_children(&mut cursor)
        .find(|c| c.kind() == "identifier")
        .map(|c| node_text(c, source));
    found
}

/// The type node inside a base-list entry.
fn base_type_node(entry: Node) -> Node {
    match entry.kind() {
        "identifier" | "qualified_name" | "generic_name" | "alias_qualified_name"
        | "predefined_type" => entry,
        _ => entry
            .child_by_field_name("type")
            .or_else(|| entry.named_child(0))
            .unwrap_or(entry),
    }
}

fn file_scoped_namespace(root: Node, source: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    let found = root
        .children(&mut cursor)
        .find(|c| c.kind() == "file_scoped_namespace_declaration")
        .and_then(|ns| field_text(ns, "name", source))
        .map(str::to_string);
    found
}

fn has_modifier(node: Node, modifier: &str, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "modifier" && node_text(c, source) == modifier);
    found
}

fn simple_name<'s>(node: Node, source: &'s [u8]) -> &'s str {
    base_type_name(node_text(node, source))
}

fn is_this(node: Node, source: &[u8]) -> bool {
    matches!(node.kind(), "this_expression" | "this") || node_text(node, source) == "this"
}

fn is_dotted_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dotted_name() {
        assert!(is_dotted_name("System.Console"));
        assert!(is_dotted_name("Console"));
        assert!(!is_dotted_name("GetItems().First"));
        assert!(!is_dotted_name("a..b"));
    }

    #[test]
    fn test_local_function_and_top_level() {
        let src = "void Helper() {}\nHelper();\n";
        let fragment = CSharpAnalyzer::new()
            .parse("Program.cs", src.as_bytes())
            .expect("Failed to parse");
        let helper = fragment.node("Program.cs:Helper").expect("helper");
        assert_eq!(helper.label, LABEL_FUNCTION);
    }

    #[test]
    fn test_file_scoped_namespace() {
        let src = "namespace Acme.Tools;\n\npublic class Hammer { public void Hit() {} }\n";
        let fragment = CSharpAnalyzer::new()
            .parse("Hammer.cs", src.as_bytes())
            .expect("Failed to parse");
        assert!(fragment.node("Acme.Tools.Hammer").is_some());
        assert!(fragment.node("Acme.Tools.Hammer:Hit").is_some());
    }
}
