//! TypeScript and TSX analysis with tree-sitter-typescript.
//!
//! IDs are file-scoped (`src/app.ts:main`, `src/app.ts:Greeter:greet`).
//! Imported names resolve through the file's import table to
//! `<module>:<remote name>`, where relative module specifiers are joined with
//! the importing file's directory and get `.ts` when they have no extension.

use super::imports::{extract_typescript_imports, ImportKind};
use super::members::{Locals, TypeMembers};
use super::syntax::{
    cyclomatic_complexity, end_line, field_text, find_ancestor, node_text, parse_source,
    signature, start_line, walk_tree,
};
use super::Analyzer;
use crate::error::Result;
use crate::graph::schema::{
    EDGE_CALLS, EDGE_DEFINES, EDGE_EXTENDS, EDGE_HAS_METHOD, EDGE_IMPLEMENTS, EDGE_USES,
    LABEL_CLASS, LABEL_FIELD, LABEL_FUNCTION, LABEL_GLOBAL, LABEL_INTERFACE, LABEL_METHOD,
    PROP_END_LINE, PROP_TYPE,
};
use crate::graph::{Fragment, FragmentBuilder, Node as GraphNode};
use crate::resolve::module_resolver::resolve_module_specifier;
use crate::resolve::{self, base_type_name, SymbolTable};
use std::collections::HashMap;
use std::rc::Rc;
use tree_sitter::{Language, Node};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
];

const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Grammar variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    TypeScript,
    Tsx,
}

/// Analyzer for TypeScript (`.ts`) and TSX (`.tsx`) sources.
#[derive(Debug, Clone, Copy)]
pub struct TypeScriptAnalyzer {
    dialect: Dialect,
}

impl TypeScriptAnalyzer {
    /// Analyzer using the plain TypeScript grammar.
    pub fn typescript() -> Self {
        Self {
            dialect: Dialect::TypeScript,
        }
    }

    /// Analyzer using the TSX grammar.
    pub fn tsx() -> Self {
        Self {
            dialect: Dialect::Tsx,
        }
    }

    fn grammar(&self) -> Language {
        match self.dialect {
            Dialect::TypeScript => tree_sitter_typescript::language_typescript(),
            Dialect::Tsx => tree_sitter_typescript::language_tsx(),
        }
    }
}

impl Analyzer for TypeScriptAnalyzer {
    fn language(&self) -> &'static str {
        match self.dialect {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let language = self.grammar();
        let tree = parse_source(&language, "TypeScript", file_path, content)?;
        let root = tree.root_node();

        let mut file = TsFile::new(file_path, content);
        for import in extract_typescript_imports(root, content) {
            let module = resolve_module_specifier(file_path, &import.path);
            for name in &import.imported_names {
                let target = match import.import_kind {
                    ImportKind::TsNamespaceImport => {
                        file.namespace_imports
                            .insert(name.local.clone(), module.clone());
                        module.clone()
                    }
                    _ => format!("{}:{}", module, name.remote),
                };
                file.imports.entry(name.local.clone()).or_insert(target);
            }
        }

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

struct TsFile<'a> {
    path: &'a str,
    source: &'a [u8],
    builder: FragmentBuilder,
    symbols: SymbolTable,
    imports: HashMap<String, String>,
    namespace_imports: HashMap<String, String>,
    types: TypeMembers,
    class_ids: HashMap<usize, String>,
    callables: HashMap<usize, String>,
    callable_owner: HashMap<usize, String>,
    locals: HashMap<usize, Rc<Locals>>,
}

impl<'a> TsFile<'a> {
    fn new(path: &'a str, source: &'a [u8]) -> Self {
        Self {
            path,
            source,
            builder: FragmentBuilder::new(),
            symbols: SymbolTable::new(),
            imports: HashMap::new(),
            namespace_imports: HashMap::new(),
            types: TypeMembers::new(),
            class_ids: HashMap::new(),
            callables: HashMap::new(),
            callable_owner: HashMap::new(),
            locals: HashMap::new(),
        }
    }

    /// Local table, then imports, then the file-scoped fallback.
    fn resolve_name(&self, name: &str) -> String {
        if let Some(id) = self.symbols.get(name) {
            return id.to_string();
        }
        if let Some(id) = self.imports.get(name) {
            return id.clone();
        }
        resolve::file_scoped(self.path, name)
    }

    fn resolve_type(&self, type_text: &str) -> String {
        let first = type_text.split('|').next().unwrap_or(type_text).trim();
        self.resolve_name(base_type_name(first))
    }

    // ---- definitions -------------------------------------------------

    fn collect_definitions(&mut self, node: Node, owner: Option<&str>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = field_text(node, "name", self.source) {
                    let id = resolve::file_scoped(self.path, name);
                    self.define_function(node, &id, name);
                }
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                self.define_class(node);
                return;
            }
            "interface_declaration" => {
                self.define_interface(node);
                return;
            }
            "method_definition" | "abstract_method_signature" => {
                if let Some(owner) = owner {
                    self.define_method(node, owner);
                }
            }
            "public_field_definition" => {
                if let Some(owner) = owner {
                    self.define_field(node, owner);
                }
            }
            "variable_declarator" => self.define_variable(node),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_definitions(child, owner);
        }
    }

    fn define_function(&mut self, node: Node, id: &str, name: &str) {
        self.builder.add_node(
            GraphNode::definition(id, LABEL_FUNCTION, name, self.path, start_line(node))
                .with_property(PROP_END_LINE, end_line(node))
                .with_property("signature", signature(node, self.source))
                .with_property(
                    "complexity",
                    cyclomatic_complexity(node, self.source, BRANCH_KINDS),
                ),
        );
        self.symbols.insert(name, id);
        self.callables.insert(node.id(), id.to_string());
    }

    fn define_class(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let id = resolve::file_scoped(self.path, name);
        let mut class = GraphNode::definition(&id, LABEL_CLASS, name, self.path, start_line(node))
            .with_property(PROP_END_LINE, end_line(node));
        if node.kind() == "abstract_class_declaration" {
            class.set_property("abstract", true);
        }
        self.builder.add_node(class);
        self.symbols.insert(name, &id);
        self.class_ids.insert(node.id(), id.clone());

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                self.collect_definitions(child, Some(&id));
            }
        }
    }

    fn define_interface(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let id = resolve::file_scoped(self.path, name);
        self.builder.add_node(
            GraphNode::definition(&id, LABEL_INTERFACE, name, self.path, start_line(node))
                .with_property(PROP_END_LINE, end_line(node)),
        );
        self.symbols.insert(name, &id);
        self.types.mark_interface(&id);
        self.class_ids.insert(node.id(), id);
    }

    fn define_method(&mut self, node: Node, owner: &str) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let id = resolve::nested(owner, name);
        let mut method = GraphNode::definition(&id, LABEL_METHOD, name, self.path, start_line(node))
            .with_property(PROP_END_LINE, end_line(node))
            .with_property("signature", signature(node, self.source))
            .with_property(
                "complexity",
                cyclomatic_complexity(node, self.source, BRANCH_KINDS),
            );
        if node.kind() == "abstract_method_signature" {
            method.set_property("abstract", true);
        }
        self.builder.add_node(method);
        self.builder.add_edge(owner, &id, EDGE_HAS_METHOD);
        self.types.add_member(owner, name, &id);
        self.callables.insert(node.id(), id);
        self.callable_owner.insert(node.id(), owner.to_string());

        if name == "constructor" {
            self.define_parameter_properties(node, owner);
        }
    }

    /// `constructor(private repo: Repo)` declares a field.
    fn define_parameter_properties(&mut self, ctor: Node, owner: &str) {
        let Some(params) = ctor.child_by_field_name("parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let mut param_cursor = param.walk();
            let is_property = param.children(&mut param_cursor).any(|c| {
                c.kind() == "accessibility_modifier" || node_text(c, self.source) == "readonly"
            });
            if !is_property {
                continue;
            }
            let Some(name) = field_text(param, "pattern", self.source) else {
                continue;
            };
            let type_text = field_text(param, "type", self.source)
                .map(annotation_type)
                .unwrap_or("");
            self.add_field(param, owner, name, type_text);
        }
    }

    fn define_field(&mut self, node: Node, owner: &str) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let type_text = field_text(node, "type", self.source)
            .map(annotation_type)
            .unwrap_or("");
        self.add_field(node, owner, name, type_text);
    }

    fn add_field(&mut self, node: Node, owner: &str, name: &str, type_text: &str) {
        let id = resolve::nested(owner, name);
        self.builder.add_node(
            GraphNode::definition(&id, LABEL_FIELD, name, self.path, start_line(node))
                .with_property(PROP_TYPE, type_text),
        );
        self.builder.add_edge(owner, &id, EDGE_DEFINES);
        self.types.add_field(owner, name, &id, type_text);
    }

    /// `const f = () => ...` defines a function; any other top-level binding
    /// is a global.
    fn define_variable(&mut self, declarator: Node) {
        let Some(name_node) = declarator.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() != "identifier" {
            return;
        }
        let name = node_text(name_node, self.source);
        let id = resolve::file_scoped(self.path, name);

        if let Some(value) = declarator
            .child_by_field_name("value")
            .filter(|v| FUNCTION_VALUE_KINDS.contains(&v.kind()))
        {
            self.define_function(value, &id, name);
            return;
        }

        if !is_top_level_binding(declarator) {
            return;
        }
        let kind = declarator
            .parent()
            .and_then(|decl| decl.child(0))
            .map(|kw| node_text(kw, self.source))
            .unwrap_or("var");
        let mut global = GraphNode::definition(&id, LABEL_GLOBAL, name, self.path, start_line(declarator))
            .with_property("kind", kind);
        if let Some(type_text) = field_text(declarator, "type", self.source) {
            global.set_property(PROP_TYPE, annotation_type(type_text));
        }
        self.builder.add_node(global);
        self.symbols.insert(name, &id);
    }

    // ---- references --------------------------------------------------

    fn visit_reference(&mut self, node: Node) {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => self.link_heritage(node),
            "interface_declaration" => self.link_interface_bases(node),
            "call_expression" => self.link_call(node),
            "new_expression" => self.link_new(node),
            "member_expression" => self.link_this_field(node),
            _ => {}
        }
    }

    fn link_heritage(&mut self, class: Node) {
        let Some(class_id) = self.class_ids.get(&class.id()).cloned() else {
            return;
        };
        let mut cursor = class.walk();
        let Some(heritage) = class
            .children(&mut cursor)
            .find(|c| c.kind() == "class_heritage")
        else {
            return;
        };

        let mut heritage_cursor = heritage.walk();
        let clauses: Vec<Node> = heritage.children(&mut heritage_cursor).collect();
        for clause in clauses {
            let edge_type = match clause.kind() {
                "extends_clause" => EDGE_EXTENDS,
                "implements_clause" => EDGE_IMPLEMENTS,
                _ => continue,
            };
            for base in heritage_types(clause) {
                let target = self.resolve_type(node_text(base, self.source));
                self.builder.add_edge(&class_id, &target, edge_type);
                self.types.add_base(&class_id, &target);
            }
        }
    }

    fn link_interface_bases(&mut self, interface: Node) {
        let Some(interface_id) = self.class_ids.get(&interface.id()).cloned() else {
            return;
        };
        let mut cursor = interface.walk();
        let clauses: Vec<Node> = interface
            .children(&mut cursor)
            .filter(|c| matches!(c.kind(), "extends_type_clause" | "extends_clause"))
            .collect();
        for clause in clauses {
            for base in heritage_types(clause) {
                let target = self.resolve_type(node_text(base, self.source));
                self.builder.add_edge(&interface_id, &target, EDGE_EXTENDS);
            }
        }
    }

    fn link_call(&mut self, call: Node) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let Some(ctx) = self.context(call) else {
            return;
        };

        let target = match function.kind() {
            "identifier" => {
                let name = node_text(function, self.source);
                if ctx.locals.contains_key(name) {
                    return;
                }
                self.resolve_name(name)
            }
            "member_expression" => match self.resolve_member(function, &ctx) {
                Some(target) => target,
                None => return,
            },
            _ => return,
        };
        self.builder.add_edge(&ctx.source_id, &target, EDGE_CALLS);
    }

    fn link_new(&mut self, node: Node) {
        let Some(constructor) = node.child_by_field_name("constructor") else {
            return;
        };
        let Some(ctx) = self.context(node) else {
            return;
        };
        let target = match constructor.kind() {
            "identifier" => self.resolve_name(node_text(constructor, self.source)),
            "member_expression" => {
                let object = constructor
                    .child_by_field_name("object")
                    .map(|o| node_text(o, self.source))
                    .unwrap_or("");
                let Some(property) = field_text(constructor, "property", self.source) else {
                    return;
                };
                match self.namespace_imports.get(object) {
                    Some(module) => format!("{}:{}", module, property),
                    None => resolve::unresolved(property),
                }
            }
            _ => return,
        };
        self.builder.add_edge(&ctx.source_id, &target, EDGE_CALLS);
    }

    /// `this.field` outside call position → USES.
    fn link_this_field(&mut self, member: Node) {
        let on_this = member
            .child_by_field_name("object")
            .is_some_and(|o| o.kind() == "this");
        if !on_this {
            return;
        }
        let is_callee = member.parent().is_some_and(|p| {
            p.kind() == "call_expression"
                && p.child_by_field_name("function").map(|f| f.id()) == Some(member.id())
        });
        if is_callee {
            return;
        }
        let Some(property) = field_text(member, "property", self.source) else {
            return;
        };
        let Some(ctx) = self.context(member) else {
            return;
        };
        let Some(owner) = ctx.owner.as_deref() else {
            return;
        };
        if self.types.is_field(owner, property) {
            let field_id = self.types.resolve_member(owner, property);
            self.builder.add_edge(&ctx.source_id, &field_id, EDGE_USES);
        }
    }

    fn resolve_member(&self, member: Node, ctx: &RefContext) -> Option<String> {
        let property = field_text(member, "property", self.source)?;
        let object = member.child_by_field_name("object")?;

        let target = match object.kind() {
            "this" => match ctx.owner.as_deref() {
                Some(owner) => self.types.resolve_member(owner, property),
                None => resolve::unresolved(property),
            },
            "super" => {
                let bases = ctx
                    .owner
                    .as_deref()
                    .map(|o| self.types.bases(o))
                    .unwrap_or(&[]);
                match bases.first() {
                    Some(base) => self.types.resolve_member(base, property),
                    None => resolve::unresolved(property),
                }
            }
            "identifier" => {
                let name = node_text(object, self.source);
                if let Some(module) = self.namespace_imports.get(name) {
                    format!("{}:{}", module, property)
                } else if let Some(declared) = ctx.locals.get(name) {
                    match declared {
                        Some(type_text) => {
                            self.types.resolve_member(&self.resolve_type(type_text), property)
                        }
                        None => resolve::unresolved(property),
                    }
                } else {
                    self.types.resolve_member(&self.resolve_name(name), property)
                }
            }
            "member_expression" => {
                let inner = object.child_by_field_name("object")?;
                let field = field_text(object, "property", self.source)?;
                let field_type = ctx
                    .owner
                    .as_deref()
                    .filter(|_| inner.kind() == "this")
                    .and_then(|o| self.types.field_type(o, field))
                    .filter(|t| !t.is_empty());
                match field_type {
                    Some(type_text) => {
                        self.types.resolve_member(&self.resolve_type(type_text), property)
                    }
                    None => resolve::unresolved(property),
                }
            }
            _ => resolve::unresolved(property),
        };
        Some(target)
    }

    fn context(&mut self, node: Node) -> Option<RefContext> {
        if let Some(callable) = find_ancestor(node, |n| self.callables.contains_key(&n.id())) {
            let locals = self.locals_at(callable);
            return Some(RefContext {
                source_id: self.callables.get(&callable.id())?.clone(),
                owner: self.callable_owner.get(&callable.id()).cloned(),
                locals,
            });
        }

        let class = find_ancestor(node, |n| self.class_ids.contains_key(&n.id()))?;
        let class_id = self.class_ids.get(&class.id())?.clone();
        Some(RefContext {
            source_id: class_id.clone(),
            owner: Some(class_id),
            locals: Rc::new(Locals::new()),
        })
    }

    fn locals_at(&mut self, callable: Node) -> Rc<Locals> {
        if let Some(locals) = self.locals.get(&callable.id()) {
            return Rc::clone(locals);
        }

        let mut locals = function_locals(callable, self.source);
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

/// Parameters and declarations inside a function-like node.
fn function_locals(callable: Node, source: &[u8]) -> Locals {
    let mut locals = Locals::new();
    if let Some(param) = callable.child_by_field_name("parameter") {
        locals.insert(node_text(param, source).to_string(), None);
    }

    walk_tree(callable, &mut |n| match n.kind() {
        "required_parameter" | "optional_parameter" => {
            if let Some(pattern) = n.child_by_field_name("pattern").filter(|p| p.kind() == "identifier") {
                let ty = field_text(n, "type", source).map(|t| annotation_type(t).to_string());
                locals.insert(node_text(pattern, source).to_string(), ty);
            }
        }
        "variable_declarator" => {
            let Some(name) = n.child_by_field_name("name").filter(|p| p.kind() == "identifier") else {
                return;
            };
            let ty = field_text(n, "type", source)
                .map(|t| annotation_type(t).to_string())
                .or_else(|| {
                    n.child_by_field_name("value")
                        .filter(|v| v.kind() == "new_expression")
                        .and_then(|v| v.child_by_field_name("constructor"))
                        .filter(|c| c.kind() == "identifier")
                        .map(|c| node_text(c, source).to_string())
                });
            locals.insert(node_text(name, source).to_string(), ty);
        }
        "for_in_statement" => {
            if let Some(left) = n.child_by_field_name("left").filter(|l| l.kind() == "identifier") {
                locals.insert(node_text(left, source).to_string(), None);
            }
        }
        "catch_clause" => {
            if let Some(param) = n.child_by_field_name("parameter") {
                locals.insert(node_text(param, source).to_string(), None);
            }
        }
        "arrow_function" => {
            if let Some(param) = n.child_by_field_name("parameter") {
                locals.insert(node_text(param, source).to_string(), None);
            }
        }
        _ => {}
    });
    locals
}

/// Type references in an `extends` / `implements` clause.
fn heritage_types(clause: Node) -> Vec<Node> {
    let mut cursor = clause.walk();
    let values: Vec<Node> = clause.children_by_field_name("value", &mut cursor).collect();
    if !values.is_empty() {
        return values;
    }
    let mut cursor = clause.walk();
    let types = clause
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "type_arguments")
        .collect();
    types
}

/// `: Foo<Bar>` → `Foo<Bar>`.
fn annotation_type(text: &str) -> &str {
    text.trim_start().trim_start_matches(':').trim()
}

fn is_top_level_binding(declarator: Node) -> bool {
    let Some(declaration) = declarator.parent() else {
        return false;
    };
    match declaration.parent() {
        Some(p) if p.kind() == "program" => true,
        Some(p) if p.kind() == "export_statement" => {
            p.parent().is_some_and(|pp| pp.kind() == "program")
        }
        _ => false,
    }
}
