//! ASP and ASP.NET pages.
//!
//! Markup is masked away (see [`mask`](super::mask)), the remaining server
//! code is wrapped in a container the delegate analyzer understands, and the
//! delegate's fragment is mapped back onto the page: lines shift by the one
//! wrapper line, the container disappears, and anything it owned becomes a
//! page-level `path:name` definition.
//!
//! C# pages need more than a wrapper: `<% %>` blocks hold statements and
//! `<%= %>` blocks hold expressions, neither of which is a valid class
//! member. Runs of inline code are therefore placed in the body of a
//! synthetic [`INLINE_METHOD`]. Only bytes without line breaks are inserted,
//! so every line keeps its page line number.

use super::mask::{
    blank, detect_embedded_language, mask_server_code, server_regions, EmbeddedLanguage,
    RegionKind,
};
use super::{Analyzer, CSharpAnalyzer, VbNetAnalyzer};
use crate::error::{GraphError, Result};
use crate::graph::schema::{LABEL_FUNCTION, LABEL_METHOD, PROP_END_LINE, PROP_LINE};
use crate::graph::{Fragment, FragmentBuilder};
use crate::resolve;
use std::path::Path;

const CSHARP_WRAPPER: &str = "AspPage";
const VB_WRAPPER: &str = "AspWrapper";

/// Page-level routine holding the inline code of a C# page.
pub const INLINE_METHOD: &str = "AspInline";

/// Analyzer for `.asp`, `.aspx` and `.ascx` pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct AspAnalyzer {
    csharp: CSharpAnalyzer,
    vbnet: VbNetAnalyzer,
}

impl AspAnalyzer {
    /// Create the analyzer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analyzer for AspAnalyzer {
    fn language(&self) -> &'static str {
        "asp"
    }

    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment> {
        let language = detect_embedded_language(Path::new(file_path), content);

        let (source, wrapper_id, delegate): (Vec<u8>, String, &dyn Analyzer) = match language {
            EmbeddedLanguage::CSharp => (
                wrap(&csharp_page_body(content), "class AspPage {\n", "\n}\n"),
                CSHARP_WRAPPER.to_string(),
                &self.csharp,
            ),
            EmbeddedLanguage::VisualBasic => (
                wrap(&mask_server_code(content), "Module AspWrapper\n", "\nEnd Module\n"),
                resolve::file_scoped(file_path, VB_WRAPPER),
                &self.vbnet,
            ),
        };

        let unwrap = Unwrapper {
            file_path,
            wrapper_id: &wrapper_id,
        };
        match delegate.parse(file_path, &source) {
            Ok(fragment) => Ok(unwrap.apply(fragment)),
            Err(GraphError::Query {
                file,
                message,
                partial,
            }) => Err(GraphError::Query {
                file,
                message,
                partial: Box::new(unwrap.apply(*partial)),
            }),
            Err(err) => Err(err),
        }
    }
}

fn wrap(code: &[u8], header: &str, footer: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + code.len() + footer.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(code);
    out.extend_from_slice(footer.as_bytes());
    out
}

/// Class body for a C# page.
///
/// Script bodies are copied as members. Each run of inline regions between
/// them becomes the body of [`INLINE_METHOD`]; expressions are turned into
/// discard assignments. Markup is blanked with line breaks kept.
fn csharp_page_body(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 64);
    let mut pos = 0;
    let mut in_inline = false;

    for region in server_regions(content) {
        out.extend(blank(&content[pos..region.start]));
        let code = &content[region.start..region.end];
        match region.kind {
            RegionKind::Members => {
                if in_inline {
                    out.push(b'}');
                    in_inline = false;
                }
                out.extend_from_slice(code);
            }
            RegionKind::Statements | RegionKind::Expression => {
                if !in_inline {
                    out.extend_from_slice(format!("void {}() {{", INLINE_METHOD).as_bytes());
                    in_inline = true;
                }
                if region.kind == RegionKind::Expression {
                    out.extend_from_slice(b"_ = ");
                    out.extend_from_slice(code);
                    out.push(b';');
                } else {
                    out.extend_from_slice(code);
                }
            }
        }
        pos = region.end;
    }

    out.extend(blank(&content[pos..]));
    if in_inline {
        out.push(b'}');
    }
    out
}

/// Maps a delegate fragment back onto the page.
struct Unwrapper<'a> {
    file_path: &'a str,
    wrapper_id: &'a str,
}

impl Unwrapper<'_> {
    fn apply(&self, fragment: Fragment) -> Fragment {
        let mut builder = FragmentBuilder::new();

        for mut node in fragment.nodes {
            if node.id == self.wrapper_id {
                continue;
            }
            if let Some(id) = self.rewrite(&node.id) {
                node.id = id;
                if node.label == LABEL_METHOD {
                    node.label = LABEL_FUNCTION.to_string();
                }
            }
            for key in [PROP_LINE, PROP_END_LINE] {
                if let Some(line) = node.property(key).and_then(|v| v.as_u64()) {
                    node.set_property(key, line.saturating_sub(1).max(1));
                }
            }
            builder.add_node(node);
        }

        for edge in fragment.edges {
            if edge.source_id == self.wrapper_id || edge.target_id == self.wrapper_id {
                continue;
            }
            let source = self.rewrite(&edge.source_id).unwrap_or(edge.source_id);
            let target = self.rewrite(&edge.target_id).unwrap_or(edge.target_id);
            builder.add_edge(&source, &target, &edge.edge_type);
        }

        builder.finish()
    }

    /// `wrapper:member` and `wrapper.Nested` → `path:member`.
    fn rewrite(&self, id: &str) -> Option<String> {
        let rest = id.strip_prefix(self.wrapper_id)?;
        let member = rest.strip_prefix(':').or_else(|| rest.strip_prefix('.'))?;
        Some(resolve::file_scoped(self.file_path, member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::EDGE_CALLS;

    const ASPX: &str = r#"<%@ Page Language="C#" AutoEventWireup="true" %>
<!DOCTYPE html>
<html>
<head>
    <title>Orders</title>
</head>
<body>
    <form id="form1" runat="server">
        <div>
            <%-- server comment --%>
        </div>
    </form>

<script runat="server">
    protected void MyMethod()
    {
        int total = Calculate(1, 2);
    }

    private int Calculate(int a, int b)
    {
        return a + b;
    }
</script>
</body>
</html>
"#;

    const ASP: &str = r#"<%@ Language="VBScript" %>
<html>
<body>
<% Dim greeting %>
<p>Hello</p>
</body>
</html>
<script runat="server">
    Sub MySub()
        Call Add(1, 2)
    End Sub

    Function Add(a, b)
        Add = a + b
    End Function
</script>
"#;

    fn line_of(fragment: &Fragment, id: &str) -> Option<u64> {
        fragment.node(id).and_then(|n| n.line())
    }

    #[test]
    fn test_aspx_csharp_page() {
        let fragment = AspAnalyzer::new()
            .parse("web/Default.aspx", ASPX.as_bytes())
            .expect("Failed to parse aspx");

        assert_eq!(line_of(&fragment, "web/Default.aspx:MyMethod"), Some(15));
        assert_eq!(line_of(&fragment, "web/Default.aspx:Calculate"), Some(20));

        let my_method = fragment.node("web/Default.aspx:MyMethod").expect("MyMethod");
        assert_eq!(my_method.label, LABEL_FUNCTION);
        assert_eq!(
            my_method.property(PROP_END_LINE).and_then(|v| v.as_u64()),
            Some(18)
        );

        assert!(fragment.node(CSHARP_WRAPPER).is_none());
        assert!(!fragment
            .edges
            .iter()
            .any(|e| e.source_id.contains(CSHARP_WRAPPER) || e.target_id.contains(CSHARP_WRAPPER)));
        assert!(fragment.edges.iter().any(|e| e.source_id == "web/Default.aspx:MyMethod"
            && e.target_id == "web/Default.aspx:Calculate"
            && e.edge_type == EDGE_CALLS));
    }

    #[test]
    fn test_asp_vb_page() {
        let fragment = AspAnalyzer::new()
            .parse("legacy/index.asp", ASP.as_bytes())
            .expect("Failed to parse asp");

        assert_eq!(line_of(&fragment, "legacy/index.asp:MySub"), Some(9));
        assert_eq!(line_of(&fragment, "legacy/index.asp:Add"), Some(13));
        assert!(fragment.node("legacy/index.asp:AspWrapper").is_none());
        assert!(fragment.edges.iter().any(|e| e.source_id == "legacy/index.asp:MySub"
            && e.target_id == "legacy/index.asp:Add"
            && e.edge_type == EDGE_CALLS));
        assert!(fragment.nodes.iter().all(|n| !n.id.contains(VB_WRAPPER)));
    }

    const MIXED_ASPX: &str = "<%@ Page Language=\"C#\" %>\n<html>\n<% if (IsPostBack) { Save(); } %>\n<p><%= Title %></p>\n<script runat=\"server\">\n    void Save()\n    {\n        Log();\n    }\n</script>\n";

    #[test]
    fn test_inline_code_gets_a_method_body() {
        let body = String::from_utf8(csharp_page_body(MIXED_ASPX.as_bytes())).expect("utf8");
        assert_eq!(body.lines().count(), MIXED_ASPX.lines().count());
        let lines: Vec<&str> = body.lines().collect();
        assert!(lines[2].contains("void AspInline() { if (IsPostBack) { Save(); }"));
        assert!(lines[3].contains("_ =  Title ;"));
        assert!(lines[4].trim_start().starts_with('}'));
        assert_eq!(lines[5].trim(), "void Save()");
    }

    #[test]
    fn test_aspx_inline_blocks_and_script_methods() {
        let fragment = AspAnalyzer::new()
            .parse("p/Page.aspx", MIXED_ASPX.as_bytes())
            .expect("Failed to parse aspx");

        let save = fragment.node("p/Page.aspx:Save").expect("Save");
        assert_eq!(save.label, LABEL_FUNCTION);
        assert_eq!(save.line(), Some(6));

        let inline = fragment.node("p/Page.aspx:AspInline").expect("inline code");
        assert_eq!(inline.line(), Some(3));

        assert!(fragment.edges.iter().any(|e| e.source_id == "p/Page.aspx:AspInline"
            && e.target_id == "p/Page.aspx:Save"
            && e.edge_type == EDGE_CALLS));
        assert!(fragment
            .edges
            .iter()
            .any(|e| e.source_id == "p/Page.aspx:Save" && e.edge_type == EDGE_CALLS));
        for keyword in ["if", "void"] {
            assert!(fragment.node(&format!("p/Page.aspx:{}", keyword)).is_none());
        }
    }

    #[test]
    fn test_inline_blocks_split_by_markup_share_one_body() {
        let page = "<%@ Page Language=\"C#\" %>\n<% if (Ready) { %>\n<p>ok</p>\n<% } %>\n<script runat=\"server\">\n    bool Ready { get { return Check(); } }\n    bool Check() { return true; }\n</script>\n";
        let fragment = AspAnalyzer::new()
            .parse("p/Split.aspx", page.as_bytes())
            .expect("Failed to parse aspx");

        assert_eq!(fragment.node("p/Split.aspx:Check").and_then(|n| n.line()), Some(7));
        assert_eq!(fragment.node("p/Split.aspx:AspInline").and_then(|n| n.line()), Some(2));
    }

    #[test]
    fn test_rewrite() {
        let unwrap = Unwrapper {
            file_path: "a.asp",
            wrapper_id: "a.asp:AspWrapper",
        };
        assert_eq!(unwrap.rewrite("a.asp:AspWrapper:Go"), Some("a.asp:Go".to_string()));
        assert_eq!(unwrap.rewrite("a.asp:AspWrapper.Inner"), Some("a.asp:Inner".to_string()));
        assert_eq!(unwrap.rewrite("a.asp:AspWrapperX"), None);
        assert_eq!(unwrap.rewrite("UNKNOWN:Go"), None);
    }
}
