//! Analyzer selection by file extension.
//!
//! Table-driven. No heuristics, no guessing from content. Extensions are
//! matched case-sensitively including the leading dot; a missing entry means
//! "skip this file", never an error.

use super::{
    Analyzer, AspAnalyzer, CSharpAnalyzer, CppAnalyzer, JavaAnalyzer, SqlAnalyzer,
    TypeScriptAnalyzer, VbNetAnalyzer,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Language families with a bundled analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// C and C++ (.c, .h, .cpp, .hpp, .cc, .cxx, .hh)
    Cpp,
    /// C# (.cs)
    CSharp,
    /// Java (.java)
    Java,
    /// TypeScript (.ts)
    TypeScript,
    /// TypeScript with JSX (.tsx)
    Tsx,
    /// T-SQL (.sql)
    Sql,
    /// VB.NET (.vb)
    VbNet,
    /// Classic ASP and ASP.NET pages (.asp, .aspx, .ascx)
    Asp,
}

impl Language {
    /// Every bundled language, in registration order.
    pub const ALL: [Language; 8] = [
        Language::Cpp,
        Language::CSharp,
        Language::Java,
        Language::TypeScript,
        Language::Tsx,
        Language::Sql,
        Language::VbNet,
        Language::Asp,
    ];

    /// Convert language to string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Sql => "sql",
            Language::VbNet => "vbnet",
            Language::Asp => "asp",
        }
    }

    /// Extensions (with leading dot) handled by this language's analyzer.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Cpp => &[".c", ".h", ".cpp", ".hpp", ".cc", ".cxx", ".hh"],
            Language::CSharp => &[".cs"],
            Language::Java => &[".java"],
            Language::TypeScript => &[".ts"],
            Language::Tsx => &[".tsx"],
            Language::Sql => &[".sql"],
            Language::VbNet => &[".vb"],
            Language::Asp => &[".asp", ".aspx", ".ascx"],
        }
    }

    fn analyzer(&self) -> Arc<dyn Analyzer> {
        match self {
            Language::Cpp => Arc::new(CppAnalyzer::new()),
            Language::CSharp => Arc::new(CSharpAnalyzer::new()),
            Language::Java => Arc::new(JavaAnalyzer::new()),
            Language::TypeScript => Arc::new(TypeScriptAnalyzer::typescript()),
            Language::Tsx => Arc::new(TypeScriptAnalyzer::tsx()),
            Language::Sql => Arc::new(SqlAnalyzer::new()),
            Language::VbNet => Arc::new(VbNetAnalyzer::new()),
            Language::Asp => Arc::new(AspAnalyzer::new()),
        }
    }
}

/// Detect the language family from a file path.
///
/// # Examples
///
/// ```
/// # use graphdb::ingest::detect::{detect_language, Language};
/// # use std::path::Path;
/// assert_eq!(detect_language(Path::new("main.cpp")), Some(Language::Cpp));
/// assert_eq!(detect_language(Path::new("Default.aspx")), Some(Language::Asp));
/// assert_eq!(detect_language(Path::new("notes.txt")), None);
/// ```
pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = extension_of(path)?;
    Language::ALL
        .into_iter()
        .find(|lang| lang.extensions().contains(&ext.as_str()))
}

/// File extension with its leading dot, e.g. `.cpp`.
pub fn extension_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    Some(format!(".{}", ext))
}

/// Extension → analyzer lookup table.
#[derive(Default, Clone)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every bundled analyzer. Extensions of one family share
    /// a single analyzer instance.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for lang in Language::ALL {
            let analyzer = lang.analyzer();
            for ext in lang.extensions() {
                registry.register(ext, Arc::clone(&analyzer));
            }
        }
        registry
    }

    /// Bind an extension (with leading dot) to an analyzer, replacing any
    /// previous binding.
    pub fn register(&mut self, extension: &str, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.insert(extension.to_string(), analyzer);
    }

    /// Look up the analyzer for an extension.
    pub fn lookup(&self, extension: &str) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.get(extension).cloned()
    }

    /// Look up the analyzer for a path's extension.
    pub fn lookup_path(&self, path: &Path) -> Option<Arc<dyn Analyzer>> {
        self.lookup(&extension_of(path)?)
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.analyzers.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}
