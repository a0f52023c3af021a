//! T-SQL analysis.
//!
//! A regex scanner over comment-masked text. Procedures, functions and
//! triggers become `Function` nodes, tables and views `Table` nodes, all
//! file-scoped (`db/orders.sql:ProcessOrder`). A definition's span runs to the
//! next `CREATE`/`ALTER` statement; references inside a routine or view span
//! are attributed to it. Names are matched case-insensitively.

use super::mask::mask_sql_comments;
use super::Analyzer;
use crate::error::Result;
use crate::graph::schema::{
    EDGE_CALLS, EDGE_USES, EDGE_WATCHES, LABEL_FUNCTION, LABEL_TABLE, PROP_END_LINE,
};
use crate::graph::{Fragment, FragmentBuilder, Node as GraphNode};
use crate::resolve::{self, SymbolTable};
use regex::Regex;
use ropey::Rope;
use std::sync::OnceLock;

const KEYWORDS: &[&str] = &[
    "select", "where", "set", "values", "as", "on", "inner", "outer", "left", "right", "cross",
    "full", "join", "top", "distinct", "inserted", "deleted", "into", "from", "exec", "execute",
    "begin", "end", "if", "else", "while", "return", "declare", "case", "when", "then", "and",
    "or", "not", "in", "exists", "cast", "convert", "isnull", "coalesce", "count", "sum", "min",
    "max", "avg", "getdate", "nullif", "len", "substring", "openquery", "with", "over", "row_number",
];

fn definition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:CREATE(?:\s+OR\s+ALTER)?|ALTER)\s+(PROCEDURE|PROC|FUNCTION|TRIGGER|TABLE|VIEW)\s+((?:\[?[\w]+\]?\.){0,2}\[?[\w]+\]?)",
        )
        .expect("Invalid SQL definition regex")
    })
}

fn trigger_target_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s+ON\s+((?:\[?[\w]+\]?\.){0,2}\[?[\w]+\]?)")
            .expect("Invalid SQL trigger regex")
    })
}

fn exec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bEXEC(?:UTE)?\s+(?:@\w+\s*=\s*)?((?:\[?[\w]+\]?\.){0,2}\[?[\w]+\]?)")
            .expect("Invalid SQL exec regex")
    })
}

fn call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"((?:\[?[\w]+\]?\.){0,2}\[?[\w]+\]?)\s*\(").expect("Invalid SQL call regex")
    })
}

fn table_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN|UPDATE|INTO)\s+([#@]?(?:\[?[\w]+\]?\.){0,2}\[?[\w]+\]?)")
            .expect("Invalid SQL table reference regex")
    })
}

fn branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:IF|WHILE|WHEN)\b").expect("Invalid SQL branch regex")
    })
}

fn body_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:AS|BEGIN)\b").expect("Invalid SQL body regex"))
}

/// Analyzer for T-SQL scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlAnalyzer;

impl SqlAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }
}

/// Kind of object a `CREATE` statement defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectKind {
    Procedure,
    Function,
    Trigger,
    Table,
    View,
}

impl ObjectKind {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "proc" | "procedure" => Some(ObjectKind::Procedure),
            "function" => Some(ObjectKind::Function),
            "trigger" => Some(ObjectKind::Trigger),
            "table" => Some(ObjectKind::Table),
            "view" => Some(ObjectKind::View),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Procedure => "procedure",
            ObjectKind::Function => "function",
            ObjectKind::Trigger => "trigger",
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
        }
    }

    fn is_routine(&self) -> bool {
        matches!(
            self,
            ObjectKind::Procedure | ObjectKind::Function | ObjectKind::Trigger
        )
    }
}

/// One `CREATE` statement.
struct Definition {
    kind: ObjectKind,
    name: String,
    id: String,
    start: usize,
    header_end: usize,
    end: usize,
    trigger_table: Option<String>,
}

impl Analyzer for SqlAnalyzer {
    fn language(&self) -> &'static str {
        "sql"
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let masked = blank_string_literals(&mask_sql_comments(content));
        let text = String::from_utf8_lossy(&masked);
        let rope = Rope::from_str(&text);
        let line_of = |offset: usize| rope.byte_to_line(offset.min(text.len())) + 1;

        let definitions = scan_definitions(file_path, &text);

        let mut routines = SymbolTable::case_insensitive();
        let mut tables = SymbolTable::case_insensitive();
        for def in &definitions {
            if def.kind.is_routine() {
                routines.insert(&def.name, &def.id);
            } else {
                tables.insert(&def.name, &def.id);
            }
        }

        let mut builder = FragmentBuilder::new();
        for def in &definitions {
            builder.add_node(definition_node(def, file_path, &text, &line_of));
        }

        for def in &definitions {
            if let Some(table) = &def.trigger_table {
                let target = resolve_table(table, &tables, &routines);
                builder.add_edge(&def.id, &target, EDGE_WATCHES);
            }
            if matches!(def.kind, ObjectKind::Table) {
                continue;
            }
            for (edge_type, target) in scan_references(&text[def.header_end..def.end], &tables, &routines) {
                if target != def.id {
                    builder.add_edge(&def.id, &target, edge_type);
                }
            }
        }

        Ok(builder.finish())
    }
}

fn scan_definitions(file_path: &str, text: &str) -> Vec<Definition> {
    let mut definitions: Vec<Definition> = Vec::new();
    for caps in definition_regex().captures_iter(text) {
        let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let Some(kind) = ObjectKind::parse(keyword.as_str()) else {
            continue;
        };
        let name = simple_name(name.as_str());
        let mut header_end = whole.end();

        let trigger_table = if kind == ObjectKind::Trigger {
            trigger_target_regex()
                .captures(&text[header_end..])
                .and_then(|c| c.get(1).map(|m| (m.end(), simple_name(m.as_str()))))
                .map(|(end, table)| {
                    header_end += end;
                    table
                })
        } else {
            None
        };

        if let Some(prev) = definitions.last_mut() {
            prev.end = whole.start();
        }
        definitions.push(Definition {
            kind,
            id: resolve::file_scoped(file_path, &name),
            name,
            start: whole.start(),
            header_end,
            end: text.len(),
            trigger_table,
        });
    }
    definitions
}

fn definition_node(
    def: &Definition,
    file_path: &str,
    text: &str,
    line_of: &impl Fn(usize) -> usize,
) -> GraphNode {
    let last_code = code_len(&text[def.start..def.end]);
    let label = if def.kind.is_routine() {
        LABEL_FUNCTION
    } else {
        LABEL_TABLE
    };

    let mut node = GraphNode::definition(&def.id, label, &def.name, file_path, line_of(def.start))
        .with_property(PROP_END_LINE, line_of(def.start + last_code.saturating_sub(1)))
        .with_property("kind", def.kind.as_str());

    if def.kind.is_routine() {
        let body = &text[def.header_end..def.end];
        let head_end = body_start_regex()
            .find(body)
            .map(|m| def.header_end + m.start())
            .unwrap_or(def.end);
        let signature = text[def.start..head_end]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        node.set_property("signature", signature);
        node.set_property("complexity", 1 + branch_regex().find_iter(body).count());
    }
    node
}

/// `(edge type, target)` pairs in source order.
fn scan_references(
    body: &str,
    tables: &SymbolTable,
    routines: &SymbolTable,
) -> Vec<(&'static str, String)> {
    let mut found: Vec<(usize, &'static str, String)> = Vec::new();

    for caps in exec_regex().captures_iter(body) {
        if let Some(m) = caps.get(1) {
            let name = simple_name(m.as_str());
            if !is_keyword(&name) {
                let target = routines
                    .get(&name)
                    .map(str::to_string)
                    .unwrap_or_else(|| resolve::unresolved(&name));
                found.push((m.start(), EDGE_CALLS, target));
            }
        }
    }

    for caps in call_regex().captures_iter(body) {
        if let Some(m) = caps.get(1) {
            let name = simple_name(m.as_str());
            if let Some(id) = routines.get(&name) {
                found.push((m.start(), EDGE_CALLS, id.to_string()));
            }
        }
    }

    for caps in table_ref_regex().captures_iter(body) {
        if let Some(m) = caps.get(1) {
            let raw = m.as_str();
            if raw.starts_with('@') || raw.starts_with('#') {
                continue;
            }
            let name = simple_name(raw);
            if is_keyword(&name) {
                continue;
            }
            found.push((m.start(), EDGE_USES, resolve_table(&name, tables, routines)));
        }
    }

    found.sort_by_key(|(offset, _, _)| *offset);
    found
        .into_iter()
        .map(|(_, edge_type, target)| (edge_type, target))
        .collect()
}

fn resolve_table(name: &str, tables: &SymbolTable, routines: &SymbolTable) -> String {
    tables
        .get(name)
        .or_else(|| routines.get(name))
        .map(str::to_string)
        .unwrap_or_else(|| resolve::unresolved(name))
}

/// Length of a span without trailing whitespace and `GO` batch separators.
fn code_len(span: &str) -> usize {
    let mut code = span.trim_end();
    while let Some(stripped) = code
        .strip_suffix("GO")
        .or_else(|| code.strip_suffix("go"))
        .filter(|rest| rest.ends_with('\n') || rest.ends_with('\r'))
    {
        code = stripped.trim_end();
    }
    code.len()
}

/// `[dbo].[Orders]` → `Orders`.
fn simple_name(raw: &str) -> String {
    raw.rsplit('.')
        .next()
        .unwrap_or(raw)
        .trim_matches(|c| c == '[' || c == ']')
        .to_string()
}

fn is_keyword(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

/// Blank the contents of `'...'` literals so text inside strings is not
/// scanned. Quotes and line breaks are kept.
fn blank_string_literals(content: &[u8]) -> Vec<u8> {
    let mut out = content.to_vec();
    let mut in_string = false;
    let mut i = 0;
    while i < out.len() {
        let b = content[i];
        if b == b'\'' {
            if in_string && content.get(i + 1) == Some(&b'\'') {
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
                continue;
            }
            in_string = !in_string;
        } else if in_string && b != b'\n' && b != b'\r' {
            out[i] = b' ';
        }
        i += 1;
    }
    out
}
