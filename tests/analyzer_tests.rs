//! Cross-language extraction scenarios.
//!
//! Each analyzer is driven through the registry, the way the pipeline
//! drives it, so these also cover extension dispatch.

use graphdb::graph::schema::{
    EDGE_CALLS, EDGE_DEFINES, EDGE_EXTENDS, EDGE_HAS_METHOD, EDGE_IMPLEMENTS, EDGE_INHERITS,
    EDGE_USES, EDGE_WATCHES, LABEL_CLASS, LABEL_FUNCTION, LABEL_INTERFACE, LABEL_METHOD,
    LABEL_TABLE,
};
use graphdb::emit::node_json;
use graphdb::graph::schema::{LABEL_FIELD, PROP_TYPE};
use graphdb::ingest::AnalyzerRegistry;
use graphdb::Fragment;
use std::collections::BTreeSet;
use std::path::Path;

fn parse(path: &str, source: &str) -> Fragment {
    let registry = AnalyzerRegistry::with_defaults();
    let analyzer = registry
        .lookup_path(Path::new(path))
        .unwrap_or_else(|| panic!("no analyzer for {}", path));
    analyzer
        .parse(path, source.as_bytes())
        .unwrap_or_else(|e| panic!("failed to parse {}: {}", path, e))
}

fn has_edge(fragment: &Fragment, source: &str, target: &str, edge_type: &str) -> bool {
    fragment
        .edges
        .iter()
        .any(|e| e.source_id == source && e.target_id == target && e.edge_type == edge_type)
}

fn ids(fragment: &Fragment) -> BTreeSet<String> {
    fragment.nodes.iter().map(|n| n.id.clone()).collect()
}

fn edge_keys(fragment: &Fragment) -> BTreeSet<(String, String, String)> {
    fragment
        .edges
        .iter()
        .map(|e| (e.source_id.clone(), e.target_id.clone(), e.edge_type.clone()))
        .collect()
}

/// `greet` calls `helper`: two functions, one CALLS edge.
fn assert_greet_calls_helper(fragment: &Fragment) {
    let functions: Vec<&str> = fragment
        .nodes
        .iter()
        .filter(|n| n.label == LABEL_FUNCTION)
        .filter_map(|n| n.name())
        .collect();
    assert!(functions.contains(&"greet"), "functions: {:?}", functions);
    assert!(functions.contains(&"helper"), "functions: {:?}", functions);

    let calls: Vec<_> = fragment.edges_of_type(EDGE_CALLS).collect();
    assert_eq!(calls.len(), 1, "calls: {:?}", calls);
    assert!(calls[0].source_id.ends_with(":greet"));
    assert!(calls[0].target_id.ends_with(":helper"));
}

#[test]
fn test_greet_calls_helper_cpp() {
    let fragment = parse(
        "src/greet.cpp",
        "void helper() {}\n\nvoid greet() {\n    helper();\n}\n",
    );
    assert_greet_calls_helper(&fragment);
}

#[test]
fn test_greet_calls_helper_typescript() {
    let fragment = parse(
        "web/greet.ts",
        "function helper(): void {}\n\nexport function greet(): void {\n  helper();\n}\n",
    );
    assert_greet_calls_helper(&fragment);
}

#[test]
fn test_greet_calls_helper_sql() {
    let fragment = parse(
        "db/greet.sql",
        "CREATE FUNCTION helper() RETURNS INT AS BEGIN RETURN 1 END\nGO\n\nCREATE PROCEDURE greet AS\nBEGIN\n    SELECT dbo.helper()\nEND\nGO\n",
    );
    assert_greet_calls_helper(&fragment);
}

#[test]
fn test_greet_calls_helper_vbnet() {
    let fragment = parse(
        "Module1.vb",
        "Function helper() As Integer\n    Return 1\nEnd Function\n\nSub greet()\n    helper()\nEnd Sub\n",
    );
    assert_greet_calls_helper(&fragment);
}

#[test]
fn test_derived_inherits_base_cpp() {
    let fragment = parse(
        "src/shapes.hpp",
        "class Base {\npublic:\n    int id;\n};\n\nclass Derived : public Base {\n};\n",
    );
    let inherits: Vec<_> = fragment.edges_of_type(EDGE_INHERITS).collect();
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].source_id, "src/shapes.hpp:Derived");
    assert_eq!(inherits[0].target_id, "src/shapes.hpp:Base");
}

#[test]
fn test_derived_inherits_base_csharp() {
    let fragment = parse(
        "Shapes.cs",
        "namespace Geo\n{\n    public class Base { }\n    public class Derived : Base { }\n}\n",
    );
    let inherits: Vec<_> = fragment.edges_of_type(EDGE_INHERITS).collect();
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].source_id, "Geo.Derived");
    assert_eq!(inherits[0].target_id, "Geo.Base");
}

#[test]
fn test_derived_inherits_base_vbnet() {
    let fragment = parse(
        "Shapes.vb",
        "Public Class Base\nEnd Class\n\nPublic Class Derived\n    Inherits Base\nEnd Class\n",
    );
    let inherits: Vec<_> = fragment.edges_of_type(EDGE_INHERITS).collect();
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].source_id, "Shapes.vb:Derived");
    assert_eq!(inherits[0].target_id, "Shapes.vb:Base");
}

const CSHARP_SERVICE: &str = r#"using System;
using MyCorp.Core;

namespace MyCorp.App
{
    public interface IWorker
    {
        void Work();
    }

    public class Base
    {
        public void Setup() { }
    }

    public class Derived : Base, IWorker
    {
        private Logger _logger;
        private int count;

        public void Work()
        {
            Setup();
            _logger.Info("working");
            count++;
            var helper = new Helper();
            helper.Run();
        }
    }
}
"#;

#[test]
fn test_csharp_types_and_members() {
    let fragment = parse("src/Derived.cs", CSHARP_SERVICE);

    assert_eq!(
        fragment.node("MyCorp.App.IWorker").map(|n| n.label.as_str()),
        Some(LABEL_INTERFACE)
    );
    assert_eq!(
        fragment.node("MyCorp.App.Derived").map(|n| n.label.as_str()),
        Some(LABEL_CLASS)
    );
    let work = fragment.node("MyCorp.App.Derived:Work").expect("Work");
    assert_eq!(work.label, LABEL_METHOD);
    assert!(has_edge(&fragment, "MyCorp.App.Derived", "MyCorp.App.Derived:Work", EDGE_HAS_METHOD));
    assert!(has_edge(&fragment, "MyCorp.App.Derived", "MyCorp.App.Derived:_logger", EDGE_DEFINES));

    assert!(has_edge(&fragment, "MyCorp.App.Derived", "MyCorp.App.Base", EDGE_INHERITS));
    assert!(has_edge(&fragment, "MyCorp.App.Derived", "MyCorp.App.IWorker", EDGE_IMPLEMENTS));
}

#[test]
fn test_csharp_calls_expand_per_namespace() {
    let fragment = parse("src/Derived.cs", CSHARP_SERVICE);
    let work = "MyCorp.App.Derived:Work";

    // Inherited member resolves through the local base class.
    assert!(has_edge(&fragment, work, "MyCorp.App.Base:Setup", EDGE_CALLS));

    // Field receiver of an imported type: one edge per candidate namespace.
    for ns in ["System", "MyCorp.Core", "MyCorp.App"] {
        assert!(has_edge(&fragment, work, &format!("{}.Logger:Info", ns), EDGE_CALLS));
        assert!(has_edge(&fragment, work, &format!("{}.Helper", ns), EDGE_CALLS));
        assert!(has_edge(&fragment, work, &format!("{}.Helper:Run", ns), EDGE_CALLS));
    }

    assert!(has_edge(&fragment, work, "MyCorp.App.Derived:_logger", EDGE_USES));
    assert!(has_edge(&fragment, work, "MyCorp.App.Derived:count", EDGE_USES));
    assert!(!fragment.edges.iter().any(|e| e.target_id.ends_with(":helper")));
}

#[test]
fn test_field_type_reaches_output_line() {
    let fragment = parse("A.cs", "namespace N { class A { int count; } }");
    let field = fragment.node("N.A:count").expect("field");
    assert_eq!(field.label, LABEL_FIELD);

    let line = node_json(field);
    assert_eq!(line["type"], LABEL_FIELD);
    assert_eq!(line[PROP_TYPE], "int");
}

#[test]
fn test_java_same_file_hierarchy() {
    let fragment = parse(
        "src/main/java/com/acme/Shapes.java",
        "package com.acme;\n\nclass Base {\n    void draw() {}\n}\n\nclass Circle extends Base {\n    void render() { draw(); }\n}\n",
    );
    assert!(has_edge(&fragment, "com.acme.Circle", "com.acme.Base", EDGE_EXTENDS));
    assert!(has_edge(&fragment, "com.acme.Circle:render", "com.acme.Base:draw", EDGE_CALLS));
}

#[test]
fn test_unresolved_targets_use_sentinel() {
    let cpp = parse("src/main.cpp", "int main() {\n    printf(\"hi\");\n    return 0;\n}\n");
    assert!(has_edge(&cpp, "src/main.cpp:main", "UNKNOWN:printf", EDGE_CALLS));

    let vb = parse("Main.vb", "Sub Main()\n    Missing(1)\nEnd Sub\n");
    assert!(has_edge(&vb, "Main.vb:Main", "UNKNOWN:Missing", EDGE_CALLS));

    let sql = parse("db/run.sql", "CREATE PROCEDURE Run AS\nBEGIN\n    EXEC dbo.Elsewhere\nEND\n");
    assert!(has_edge(&sql, "db/run.sql:Run", "UNKNOWN:Elsewhere", EDGE_CALLS));
}

#[test]
fn test_sql_trigger_and_tables() {
    let fragment = parse(
        "db/audit.sql",
        "CREATE TABLE Orders (Id INT)\nGO\nCREATE TRIGGER trg_Audit ON Orders AFTER INSERT AS\nBEGIN\n    INSERT INTO Orders (Id) VALUES (1)\nEND\nGO\n",
    );
    let table = fragment.node("db/audit.sql:Orders").expect("table");
    assert_eq!(table.label, LABEL_TABLE);
    assert!(has_edge(&fragment, "db/audit.sql:trg_Audit", "db/audit.sql:Orders", EDGE_WATCHES));
    assert!(has_edge(&fragment, "db/audit.sql:trg_Audit", "db/audit.sql:Orders", EDGE_USES));
}

#[test]
fn test_extraction_is_deterministic() {
    let cases = [
        ("src/Derived.cs", CSHARP_SERVICE),
        ("src/greet.cpp", "void helper() {}\nvoid greet() { helper(); }\n"),
        ("web/app.tsx", "export function App() { return <div>{render()}</div>; }\nfunction render() { return null; }\n"),
        ("Module1.vb", "Sub A()\n    B()\nEnd Sub\nSub B()\nEnd Sub\n"),
    ];
    for (path, source) in cases {
        let first = parse(path, source);
        let second = parse(path, source);
        assert_eq!(ids(&first), ids(&second), "{}", path);
        assert_eq!(edge_keys(&first), edge_keys(&second), "{}", path);
        assert_eq!(first, second, "{}", path);
    }
}

#[test]
fn test_every_definition_has_name_file_line() {
    let fragment = parse("src/Derived.cs", CSHARP_SERVICE);
    for node in &fragment.nodes {
        assert!(node.name().is_some(), "{} has no name", node.id);
        assert!(node.line().is_some_and(|l| l >= 1), "{} has no line", node.id);
        assert_eq!(
            node.property("file").and_then(|v| v.as_str()),
            Some("src/Derived.cs")
        );
    }
}
