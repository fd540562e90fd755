//! Language detection for the syntax highlighter.

use std::path::Path;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    C,
    Cpp,
    Json,
    #[default]
    PlainText,
}

/// File extensions per language. Matching is case-insensitive.
const EXTENSIONS: &[(Language, &[&str])] = &[
    (Language::Rust, &["rs"]),
    (Language::Python, &["py", "pyw", "pyi"]),
    (Language::JavaScript, &["js", "jsx", "mjs", "cjs"]),
    (Language::TypeScript, &["ts", "tsx", "mts", "cts"]),
    (Language::C, &["c", "h"]),
    (
        Language::Cpp,
        &["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx", "h++"],
    ),
    (Language::Json, &["json", "jsonc", "json5"]),
];

impl Language {
    /// Detects language from a file path based on extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or_default()
    }

    /// Detects language from a file extension, falling back to plain text.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(lang, _)| *lang)
            .unwrap_or_default()
    }

    /// Resolves a user-supplied language name or extension (`rust`, `py`, ...).
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "rust" => Self::Rust,
            "python" => Self::Python,
            "javascript" => Self::JavaScript,
            "typescript" => Self::TypeScript,
            "c++" | "cplusplus" => Self::Cpp,
            "text" | "plain" | "plaintext" => Self::PlainText,
            other => Self::from_extension(other),
        }
    }

    /// Returns the display name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rust => "Rust",
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Json => "JSON",
            Self::PlainText => "Plain Text",
        }
    }

    /// Returns whether this language has a grammar.
    pub fn has_highlighting(&self) -> bool {
        !matches!(self, Self::PlainText)
    }

    /// Returns the tree-sitter language, if available.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::C => Some(tree_sitter_c::LANGUAGE.into()),
            Self::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Self::Json => Some(tree_sitter_json::LANGUAGE.into()),
            Self::PlainText => None,
        }
    }
}
