//! Import statement extraction from source code ASTs.
//!
//! Each language module walks an already-parsed tree and returns
//! [`ImportFact`]s; the analyzers turn them into their import tables:
//! - C/C++: `#include` directives
//! - C#: `using` directives
//! - Java: `import` declarations
//! - TypeScript: ES module `import` statements

pub mod cpp;
pub mod csharp;
pub mod java;
pub mod typescript;

/// Represents a single import statement in source code.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFact {
    /// Kind of import (determines resolution strategy).
    pub import_kind: ImportKind,

    /// Imported module, namespace or header exactly as written
    /// (`java.util.List`, `System.Text`, `utils/log.h`, `./models/User`).
    pub path: String,

    /// Local bindings introduced by the import.
    pub imported_names: Vec<ImportedName>,

    /// Whether the import brings a whole namespace into scope.
    pub is_glob: bool,

    /// 1-based line of the import.
    pub line: usize,
}

/// One name bound by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// Name visible in the importing file.
    pub local: String,

    /// Name exported by the imported module.
    pub remote: String,
}

impl ImportedName {
    /// Binding whose local and remote names are the same.
    pub fn same(name: &str) -> Self {
        Self {
            local: name.to_string(),
            remote: name.to_string(),
        }
    }
}

/// Kind of import statement (language-specific).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// C/C++: `#include <header.h>` (system header)
    CppSystemInclude,

    /// C/C++: `#include "header.h"` (local header)
    CppLocalInclude,

    /// C#: `using System.Text;`
    CsUsing,

    /// C#: `using Alias = Some.Type;`
    CsUsingAlias,

    /// C#: `using static System.Math;`
    CsUsingStatic,

    /// Java: `import foo.Bar` or `import foo.*`
    JavaImport,

    /// Java: `import static foo.Bar.baz`
    JavaStaticImport,

    /// TypeScript: `import { foo } from 'bar'` (named imports)
    TsNamedImport,

    /// TypeScript: `import foo from 'bar'` (default import)
    TsDefaultImport,

    /// TypeScript: `import * as foo from 'bar'` (namespace import)
    TsNamespaceImport,

    /// TypeScript: `import 'bar'` (side-effect import)
    TsSideEffectImport,
}

// Re-exports for convenience
pub use cpp::extract_cpp_includes;
pub use csharp::extract_csharp_usings;
pub use java::extract_java_imports;
pub use typescript::extract_typescript_imports;
