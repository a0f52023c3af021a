//! Embedded-language masking.
//!
//! A masked buffer has exactly the input's length. Every byte outside a code
//! region becomes a space, except `\n` and `\r`, which are kept so each line
//! of the masked text has the same line number as in the original file.

use regex::bytes::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Inline server-side language of an ASP / ASP.NET page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedLanguage {
    /// C# (`<%@ Page Language="C#" %>`, default for `.aspx` / `.ascx`)
    CSharp,
    /// VBScript / VB.NET (default for `.asp`)
    VisualBasic,
}

fn language_directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<%@\s*(?:Page\s+|Control\s+)?Language\s*=\s*["']?([^"'\s>]+)"#)
            .expect("Invalid language directive regex")
    })
}

fn server_script_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<script\b[^>]*\brunat\s*=\s*["']?server["']?[^>]*>(.*?)</script\s*>"#)
            .expect("Invalid server script regex")
    })
}

/// Whitespace buffer of the same length with line breaks kept.
pub fn blank(content: &[u8]) -> Vec<u8> {
    content
        .iter()
        .map(|&b| if b == b'\n' || b == b'\r' { b } else { b' ' })
        .collect()
}

/// How a server code region sits in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// `<% ... %>`: statements executed while rendering.
    Statements,
    /// `<%= ... %>`, `<%: ... %>`, `<%# ... %>`: one rendered expression.
    Expression,
    /// `<script runat="server">` body: type members.
    Members,
}

/// Byte span of server code, delimiters excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRegion {
    /// First code byte.
    pub start: usize,
    /// One past the last code byte.
    pub end: usize,
    /// Role of the code.
    pub kind: RegionKind,
}

/// Server code regions of an ASP page in file order.
///
/// `<%@ ... %>` directives and `<%-- ... --%>` comments are not regions.
/// `<% %>` markers inside a server script body belong to the script.
pub fn server_regions(content: &[u8]) -> Vec<CodeRegion> {
    let mut regions: Vec<CodeRegion> = server_script_regex()
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|body| CodeRegion {
            start: body.start(),
            end: body.end(),
            kind: RegionKind::Members,
        })
        .collect();
    let scripts = regions.clone();
    let in_script = |offset: usize| scripts.iter().any(|r| r.start <= offset && offset < r.end);

    let mut pos = 0;
    while let Some(offset) = find(&content[pos..], b"<%") {
        let open = pos + offset;
        let rest = &content[open + 2..];

        if rest.starts_with(b"--") {
            // Server comment.
            pos = match find(rest, b"--%>") {
                Some(close) => open + 2 + close + 4,
                None => content.len(),
            };
            continue;
        }

        let Some(close) = find(rest, b"%>") else {
            break;
        };
        let body_end = open + 2 + close;
        pos = body_end + 2;
        if in_script(open) {
            continue;
        }
        let (start, kind) = match rest.first() {
            Some(b'@') => continue,
            Some(b'=' | b':' | b'#') => (open + 3, RegionKind::Expression),
            _ => (open + 2, RegionKind::Statements),
        };
        if start < body_end {
            regions.push(CodeRegion {
                start,
                end: body_end,
                kind,
            });
        }
    }

    regions.sort_by_key(|r| r.start);
    regions
}

/// Keep only server-side code of an ASP page.
///
/// Every [`server_regions`] span is copied at its own offset; everything
/// else is blanked.
pub fn mask_server_code(content: &[u8]) -> Vec<u8> {
    let mut masked = blank(content);
    for region in server_regions(content) {
        masked[region.start..region.end].copy_from_slice(&content[region.start..region.end]);
    }
    masked
}

/// Server-side language of a page: the `Language` directive when present,
/// otherwise the extension default (`.aspx` / `.ascx` → C#, anything else →
/// VB).
pub fn detect_embedded_language(path: &Path, content: &[u8]) -> EmbeddedLanguage {
    if let Some(lang) = language_directive_regex()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_lowercase())
    {
        match lang.as_str() {
            "c#" | "cs" | "csharp" => return EmbeddedLanguage::CSharp,
            "vb" | "vbscript" | "vbs" | "vb.net" => return EmbeddedLanguage::VisualBasic,
            _ => {}
        }
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("aspx") | Some("ascx") => EmbeddedLanguage::CSharp,
        _ => EmbeddedLanguage::VisualBasic,
    }
}

/// Blank out SQL `--` line comments and `/* */` block comments, leaving
/// string literals intact.
pub fn mask_sql_comments(content: &[u8]) -> Vec<u8> {
    let mut out = content.to_vec();
    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'\'' => {
                i += 1;
                while i < content.len() {
                    if content[i] == b'\'' {
                        // '' is an escaped quote.
                        if content.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'-' if content.get(i + 1) == Some(&b'-') => {
                while i < content.len() && content[i] != b'\n' && content[i] != b'\r' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if content.get(i + 1) == Some(&b'*') => {
                let end = find(&content[i + 2..], b"*/")
                    .map(|e| i + 2 + e + 2)
                    .unwrap_or(content.len());
                for b in &mut out[i..end] {
                    if *b != b'\n' && *b != b'\r' {
                        *b = b' ';
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
