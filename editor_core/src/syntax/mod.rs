//! Syntax highlighting module.
//!
//! Provides a tree-sitter backed [`crate::highlight::Highlighter`].

mod highlighter;
mod language;
mod token;

pub use highlighter::SyntaxHighlighter;
pub use language::Language;
pub use token::TokenStyle;
