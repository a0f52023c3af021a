//! Source → fragment extraction.
//!
//! Each supported language family implements [`Analyzer`]. The registry in
//! [`detect`] selects an analyzer by file extension; analyzers are stateless
//! between calls and safe to share across worker threads.

pub mod asp;
pub mod cpp;
pub mod csharp;
pub mod detect;
pub mod imports;
pub mod java;
pub mod mask;
pub mod members;
pub mod sql;
pub mod syntax;
pub mod typescript;
pub mod vbnet;

use crate::error::Result;
use crate::graph::Fragment;

pub use asp::AspAnalyzer;
pub use cpp::CppAnalyzer;
pub use csharp::CSharpAnalyzer;
pub use detect::{AnalyzerRegistry, Language};
pub use java::JavaAnalyzer;
pub use sql::SqlAnalyzer;
pub use typescript::TypeScriptAnalyzer;
pub use vbnet::VbNetAnalyzer;

/// A per-language extractor.
///
/// `parse` turns one file into definition nodes and reference edges. All
/// resolution state is local to the call.
///
/// A structural query failure is reported as
/// [`GraphError::Query`](crate::error::GraphError::Query), which carries the
/// fragment collected before the failure so the caller can decide whether
/// to keep it.
pub trait Analyzer: Send + Sync {
    /// Short language name recorded on the file node.
    fn language(&self) -> &'static str;

    /// Extract the fragment for one file.
    fn parse(&self, file_path: &str, content: &[u8]) -> Result<Fragment>;
}
