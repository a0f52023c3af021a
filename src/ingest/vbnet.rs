//! VB.NET analysis.
//!
//! Line-oriented: VB blocks open and close on their own lines
//! (`Class X` ... `End Class`, `Sub F()` ... `End Sub`), so a regex per line
//! and a stack of open types are enough. Names are case-insensitive.
//!
//! Types are `path:Name` (nested `path:Outer.Inner`), routines inside a type
//! are methods `path:Type:Name`, routines outside any type are functions
//! `path:Name`.

use super::Analyzer;
use crate::error::Result;
use crate::graph::schema::{
    EDGE_CALLS, EDGE_HAS_METHOD, EDGE_IMPLEMENTS, EDGE_INHERITS, LABEL_CLASS, LABEL_FUNCTION,
    LABEL_INTERFACE, LABEL_METHOD, PROP_END_LINE,
};
use crate::graph::{Fragment, FragmentBuilder, Node as GraphNode};
use crate::resolve::{self, SymbolTable};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const KEYWORDS: &[&str] = &[
    "if", "elseif", "while", "for", "each", "not", "and", "or", "andalso", "orelse", "new",
    "return", "dim", "ctype", "directcast", "trycast", "cint", "cstr", "cdbl", "cbool", "clng",
    "cdate", "cdec", "csng", "cobj", "gettype", "typeof", "is", "isnot", "mod", "then", "else",
    "select", "case", "sub", "function", "call", "me", "mybase", "myclass", "nothing", "true",
    "false", "redim", "preserve", "array", "addressof", "using", "with", "try", "catch", "throw",
    "lbound", "ubound", "len", "mid", "left", "right", "trim", "ucase", "lcase", "isnothing",
    "isnull", "isempty", "isnumeric", "isarray", "isdate", "createobject", "nameof", "of", "as",
    "in", "to", "step", "until", "loop", "do", "set", "let", "get", "const", "byval", "byref",
];

fn type_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(?:Public|Private|Friend|Protected|Partial|MustInherit|NotInheritable|Shared|Shadows)\s+)*(Class|Module|Structure|Interface)\s+(\w+)",
        )
        .expect("Invalid VB type regex")
    })
}

fn type_end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*End\s+(?:Class|Module|Structure|Interface)\b")
            .expect("Invalid VB end-type regex")
    })
}

fn supertype_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(Inherits|Implements)\s+(.+)$").expect("Invalid VB supertype regex")
    })
}

fn routine_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(?:Public|Private|Friend|Protected|Shared|Overrides|Overridable|Overloads|MustOverride|NotOverridable|Shadows|Static|Async|Iterator|Partial)\s+)*(Sub|Function)\s+(\w+)",
        )
        .expect("Invalid VB routine regex")
    })
}

fn routine_end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*End\s+(?:Sub|Function)\b").expect("Invalid VB end-routine regex")
    })
}

fn call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\b(\w+)\s*\.\s*)?\b([A-Za-z_]\w*)\s*\(").expect("Invalid VB call regex")
    })
}

fn call_statement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bCall\s+(\w+)").expect("Invalid VB call statement regex"))
}

fn local_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:Dim|Const|Static|ReDim(?:\s+Preserve)?)\s+(.+)$")
            .expect("Invalid VB local regex")
    })
}

fn parameter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|,)\s*(?:(?:ByVal|ByRef|Optional|ParamArray)\s+)*(\w+)")
            .expect("Invalid VB parameter regex")
    })
}

fn branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:If|ElseIf|For|While|Do\s+(?:While|Until)|Case|Catch)\b")
            .expect("Invalid VB branch regex")
    })
}

fn short_circuit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:AndAlso|OrElse)\b").expect("Invalid VB operator regex"))
}

/// Analyzer for VB.NET sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct VbNetAnalyzer;

impl VbNetAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for VbNetAnalyzer {
    fn language(&self) -> &'static str {
        "vbnet"
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let text = String::from_utf8_lossy(content);
        let lines: Vec<&str> = text.lines().collect();

        let mut file = VbFile::new(file_path);
        file.collect_definitions(&lines);
        file.link_calls(&lines);
        Ok(file.builder.finish())
    }
}

/// A `Sub` or `Function` with a body.
struct Routine {
    id: String,
    owner: Option<String>,
    /// 0-based index of the declaration line.
    start: usize,
    /// 0-based index of the `End Sub` / `End Function` line, or the line
    /// count when the file ends first.
    end: usize,
}

struct OpenType {
    id: String,
    is_interface: bool,
}

struct VbFile<'a> {
    path: &'a str,
    builder: FragmentBuilder,
    symbols: SymbolTable,
    members: HashMap<String, SymbolTable>,
    routines: Vec<Routine>,
    supertypes: Vec<(String, String, &'static str)>,
}

impl<'a> VbFile<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            builder: FragmentBuilder::new(),
            symbols: SymbolTable::case_insensitive(),
            members: HashMap::new(),
            routines: Vec::new(),
            supertypes: Vec::new(),
        }
    }

    fn collect_definitions(&mut self, lines: &[&str]) {
        let mut types: Vec<OpenType> = Vec::new();
        let mut open_routine: Option<Routine> = None;

        for (idx, raw) in lines.iter().enumerate() {
            let line = strip_strings_and_comment(raw);

            if let Some(mut routine) = open_routine.take() {
                if routine_end_regex().is_match(&line) {
                    routine.end = idx;
                    self.close(&routine.id, idx + 1);
                    self.routines.push(routine);
                } else {
                    open_routine = Some(routine);
                }
                continue;
            }

            if let Some(caps) = type_start_regex().captures(&line) {
                let (Some(keyword), Some(name)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let is_interface = keyword.as_str().eq_ignore_ascii_case("interface");
                let id = match types.last() {
                    Some(outer) => format!("{}.{}", outer.id, name.as_str()),
                    None => resolve::file_scoped(self.path, name.as_str()),
                };
                let label = if is_interface { LABEL_INTERFACE } else { LABEL_CLASS };
                self.builder.add_node(
                    GraphNode::definition(&id, label, name.as_str(), self.path, idx + 1)
                        .with_property("kind", keyword.as_str().to_ascii_lowercase()),
                );
                self.symbols.insert(name.as_str(), &id);
                types.push(OpenType { id, is_interface });
                continue;
            }

            if type_end_regex().is_match(&line) {
                if let Some(closed) = types.pop() {
                    self.close(&closed.id, idx + 1);
                }
                continue;
            }

            if let Some(caps) = supertype_regex().captures(&line) {
                let (Some(keyword), Some(list), Some(current)) = (caps.get(1), caps.get(2), types.last())
                else {
                    continue;
                };
                let edge_type = if keyword.as_str().eq_ignore_ascii_case("inherits") {
                    if current.is_interface {
                        EDGE_IMPLEMENTS
                    } else {
                        EDGE_INHERITS
                    }
                } else {
                    EDGE_IMPLEMENTS
                };
                for base in list.as_str().split(',') {
                    let base = base.trim();
                    if !base.is_empty() {
                        self.supertypes
                            .push((current.id.clone(), base.to_string(), edge_type));
                    }
                }
                continue;
            }

            if let Some(caps) = routine_start_regex().captures(&line) {
                let Some(name) = caps.get(2) else {
                    continue;
                };
                let owner = types.last();
                let has_body = !owner.is_some_and(|t| t.is_interface)
                    && !line.to_ascii_lowercase().contains("mustoverride");
                let routine = self.define_routine(raw, name.as_str(), owner.map(|t| t.id.as_str()), idx);
                if has_body {
                    open_routine = Some(routine);
                } else {
                    self.close(&routine.id, idx + 1);
                }
            }
        }

        if let Some(mut routine) = open_routine {
            routine.end = lines.len();
            self.close(&routine.id, lines.len());
            self.routines.push(routine);
        }
        for open in types {
            self.close(&open.id, lines.len());
        }

        let supertypes = std::mem::take(&mut self.supertypes);
        for (type_id, base, edge_type) in supertypes {
            let target = self
                .symbols
                .get(&base)
                .map(str::to_string)
                .unwrap_or_else(|| resolve::unresolved(&base));
            self.builder.add_edge(&type_id, &target, edge_type);
        }
    }

    fn define_routine(&mut self, raw: &str, name: &str, owner: Option<&str>, idx: usize) -> Routine {
        let (id, label) = match owner {
            Some(owner) => (resolve::nested(owner, name), LABEL_METHOD),
            None => (resolve::file_scoped(self.path, name), LABEL_FUNCTION),
        };
        self.builder.add_node(
            GraphNode::definition(&id, label, name, self.path, idx + 1)
                .with_property("signature", raw.trim()),
        );
        if let Some(owner) = owner {
            self.builder.add_edge(owner, &id, EDGE_HAS_METHOD);
            self.members
                .entry(owner.to_string())
                .or_insert_with(SymbolTable::case_insensitive)
                .insert(name, &id);
        }
        self.symbols.insert(name, &id);

        Routine {
            id,
            owner: owner.map(str::to_string),
            start: idx,
            end: idx,
        }
    }

    fn close(&mut self, id: &str, line: usize) {
        if let Some(node) = self.builder.node_mut(id) {
            node.set_property(PROP_END_LINE, line);
        }
    }

    fn link_calls(&mut self, lines: &[&str]) {
        let routines = std::mem::take(&mut self.routines);
        for routine in &routines {
            let header = strip_strings_and_comment(lines[routine.start]);
            let mut locals = parameters(&header);
            let body_end = routine.end.max(routine.start + 1);
            let body: Vec<String> = lines[routine.start + 1..body_end]
                .iter()
                .map(|l| strip_strings_and_comment(l))
                .collect();

            for line in &body {
                if let Some(declared) = local_regex().captures(line).and_then(|c| c.get(1)) {
                    locals.extend(declared_names(declared.as_str()));
                }
            }

            let mut complexity = 1;
            for line in &body {
                if branch_regex().is_match(line) {
                    complexity += 1;
                }
                complexity += short_circuit_regex().find_iter(line).count();

                for target in self.calls_on_line(line, &locals, routine.owner.as_deref()) {
                    self.builder.add_edge(&routine.id, &target, EDGE_CALLS);
                }
            }

            if let Some(node) = self.builder.node_mut(&routine.id) {
                node.set_property("complexity", complexity);
            }
        }
        self.routines = routines;
    }

    fn calls_on_line(&self, line: &str, locals: &HashSet<String>, owner: Option<&str>) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();

        for caps in call_regex().captures_iter(line) {
            let Some(name) = caps.get(2) else {
                continue;
            };
            let receiver = caps.get(1).map(|m| m.as_str());
            let name_str = name.as_str();
            if is_keyword(name_str) {
                continue;
            }
            if receiver.is_none() && locals.contains(&name_str.to_ascii_lowercase()) {
                continue;
            }
            if receiver.is_none() && is_new_expression(line, name.start()) {
                continue;
            }
            found.push((name.start(), self.resolve_call(name_str, owner)));
        }

        for caps in call_statement_regex().captures_iter(line) {
            if let Some(name) = caps.get(1).filter(|n| !is_keyword(n.as_str())) {
                found.push((name.start(), self.resolve_call(name.as_str(), owner)));
            }
        }

        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, target)| target).collect()
    }

    fn resolve_call(&self, name: &str, owner: Option<&str>) -> String {
        owner
            .and_then(|o| self.members.get(o))
            .and_then(|m| m.get(name))
            .or_else(|| self.symbols.get(name))
            .map(str::to_string)
            .unwrap_or_else(|| resolve::unresolved(name))
    }
}

/// Replace string literal contents with spaces and drop `'` / `REM`
/// comments.
fn strip_strings_and_comment(line: &str) -> String {
    if line.trim_start().to_ascii_lowercase().starts_with("rem ") {
        return String::new();
    }
    let mut out = String::with_capacity(line.len());
    let mut in_string = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_string = !in_string;
                out.push('"');
            }
            '\'' if !in_string => break,
            _ if in_string => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Lowercased parameter names of a declaration line.
fn parameters(header: &str) -> HashSet<String> {
    let (Some(open), Some(close)) = (header.find('('), header.rfind(')')) else {
        return HashSet::new();
    };
    if close <= open {
        return HashSet::new();
    }
    let inner = &header[open + 1..close];
    // Generic parameter lists `(Of T)` are not parameters.
    if inner.trim_start().to_ascii_lowercase().starts_with("of ") {
        return HashSet::new();
    }
    parameter_regex()
        .captures_iter(inner)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// Names in the declarator list of a `Dim` statement.
fn declared_names(list: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = list.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                names.extend(first_word(&list[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    names.extend(first_word(&list[start..]));
    names
}

fn first_word(text: &str) -> Option<String> {
    let word: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!word.is_empty()).then(|| word.to_ascii_lowercase())
}

fn is_new_expression(line: &str, name_start: usize) -> bool {
    line[..name_start]
        .trim_end()
        .to_ascii_lowercase()
        .ends_with("new")
}

fn is_keyword(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Imports System

Public Class Greeter
    Inherits BaseGreeter
    Implements IGreeter

    Public Sub Greet(ByVal name As String)
        Dim total As Integer = Calculate(1, 2)
        Dim parts(3) As String
        Console.WriteLine("Hello " & name & Calculate(3, 4)) ' Calculate(9)
        parts(0) = "x"
        If total > 0 AndAlso name <> "" Then
            Call Helper
        End If
    End Sub

    Private Function Calculate(a As Integer, b As Integer) As Integer
        Return a + b
    End Function
End Class

Module Utilities
    Sub Helper()
        Dim g As New Greeter()
    End Sub
End Module
"#;

    fn parse() -> Fragment {
        VbNetAnalyzer::new()
            .parse("src/Greeter.vb", SAMPLE.as_bytes())
            .expect("Failed to parse")
    }

    fn has_edge(fragment: &Fragment, source: &str, target: &str, edge_type: &str) -> bool {
        fragment
            .edges
            .iter()
            .any(|e| e.source_id == source && e.target_id == target && e.edge_type == edge_type)
    }

    #[test]
    fn test_types_and_routines() {
        let fragment = parse();
        let greeter = fragment.node("src/Greeter.vb:Greeter").expect("class");
        assert_eq!(greeter.label, LABEL_CLASS);
        assert_eq!(greeter.line(), Some(3));
        assert_eq!(
            greeter.property(PROP_END_LINE).and_then(|v| v.as_u64()),
            Some(20)
        );

        let greet = fragment.node("src/Greeter.vb:Greeter:Greet").expect("method");
        assert_eq!(greet.label, LABEL_METHOD);
        assert_eq!(greet.line(), Some(7));
        assert_eq!(greet.property(PROP_END_LINE).and_then(|v| v.as_u64()), Some(15));
        assert_eq!(greet.property("complexity").and_then(|v| v.as_u64()), Some(3));

        assert!(fragment.node("src/Greeter.vb:Utilities").is_some());
        assert!(fragment.node("src/Greeter.vb:Utilities:Helper").is_some());
        assert!(has_edge(&fragment, "src/Greeter.vb:Greeter", "src/Greeter.vb:Greeter:Greet", EDGE_HAS_METHOD));
    }

    #[test]
    fn test_supertypes() {
        let fragment = parse();
        let greeter = "src/Greeter.vb:Greeter";
        assert!(has_edge(&fragment, greeter, "UNKNOWN:BaseGreeter", EDGE_INHERITS));
        assert!(has_edge(&fragment, greeter, "UNKNOWN:IGreeter", EDGE_IMPLEMENTS));
    }

    #[test]
    fn test_calls() {
        let fragment = parse();
        let greet = "src/Greeter.vb:Greeter:Greet";
        assert!(has_edge(&fragment, greet, "src/Greeter.vb:Greeter:Calculate", EDGE_CALLS));
        assert!(has_edge(&fragment, greet, "UNKNOWN:WriteLine", EDGE_CALLS));
        assert!(has_edge(&fragment, greet, "src/Greeter.vb:Utilities:Helper", EDGE_CALLS));

        // Array indexing, comments and constructors are not calls.
        assert!(!fragment.edges.iter().any(|e| e.target_id.ends_with(":parts")));
        let helper = "src/Greeter.vb:Utilities:Helper";
        assert!(!fragment.edges.iter().any(|e| e.source_id == helper));
    }

    #[test]
    fn test_strip_strings_and_comment() {
        assert_eq!(strip_strings_and_comment("x = \"a'b\" ' note"), "x = \"   \" ");
        assert_eq!(strip_strings_and_comment("REM all gone"), "");
    }
}
