//! Syntax highlighter using tree-sitter.
//!
//! Each pass fully reparses the text it is given and emits one span per
//! styled node, in char offsets. A styled node's children are not visited.

use super::language::Language;
use super::token::TokenStyle;
use crate::error::HighlightError;
use crate::highlight::Highlighter;
use crate::span::StyleSpan;
use tree_sitter::{Node, Parser, TreeCursor};

/// Tree-sitter backed highlighter.
pub struct SyntaxHighlighter {
    parser: Parser,
    language: Language,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHighlighter {
    /// Creates a highlighter for plain text (produces no spans).
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            language: Language::PlainText,
        }
    }

    /// Creates a highlighter configured for `language`.
    pub fn for_language(language: Language) -> Self {
        let mut highlighter = Self::new();
        highlighter.set_language(language);
        highlighter
    }

    /// Sets the language and configures the parser. Falls back to plain
    /// text if the grammar cannot be loaded.
    pub fn set_language(&mut self, language: Language) {
        if self.language == language {
            return;
        }
        self.language = language;

        if let Some(ts_lang) = language.tree_sitter_language() {
            if let Err(e) = self.parser.set_language(&ts_lang) {
                log::warn!("Failed to load {} grammar: {}", language.name(), e);
                self.language = Language::PlainText;
            }
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Parses `source` and returns its style spans.
    pub fn spans(&mut self, source: &str) -> Result<Vec<StyleSpan>, HighlightError> {
        if !self.language.has_highlighting() {
            return Ok(Vec::new());
        }

        let tree = self.parser.parse(source, None).ok_or_else(|| {
            HighlightError::new(format!("{} parser produced no tree", self.language.name()))
        })?;

        let offsets = char_offsets(source);
        let mut spans = Vec::new();
        let mut cursor = tree.walk();
        collect_spans(&mut cursor, self.language, &offsets, &mut spans);
        Ok(spans)
    }
}

impl Highlighter for SyntaxHighlighter {
    fn highlight(&mut self, text: &str) -> Result<Vec<StyleSpan>, HighlightError> {
        self.spans(text)
    }
}

/// Maps every byte offset (plus the end) to a char offset.
fn char_offsets(source: &str) -> Vec<usize> {
    let mut table = vec![0; source.len() + 1];
    let mut chars = 0;
    for (byte, ch) in source.char_indices() {
        for slot in &mut table[byte..byte + ch.len_utf8()] {
            *slot = chars;
        }
        chars += 1;
    }
    table[source.len()] = chars;
    table
}

/// Recursively collects spans from the tree, in document order.
fn collect_spans(
    cursor: &mut TreeCursor,
    language: Language,
    offsets: &[usize],
    spans: &mut Vec<StyleSpan>,
) {
    loop {
        let node = cursor.node();

        match node_style(&node, language) {
            Some(style) => {
                let start = offsets[node.start_byte().min(offsets.len() - 1)];
                let end = offsets[node.end_byte().min(offsets.len() - 1)];
                if start < end {
                    spans.push(StyleSpan::highlight(start, end, style.name()));
                }
            }
            None => {
                if cursor.goto_first_child() {
                    collect_spans(cursor, language, offsets, spans);
                    cursor.goto_parent();
                }
            }
        }

        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

/// Determines the token style for a tree-sitter node.
fn node_style(node: &Node, language: Language) -> Option<TokenStyle> {
    let kind = node.kind();
    match language {
        Language::Rust => rust_node_style(node, kind),
        Language::Python => python_node_style(node, kind),
        Language::JavaScript | Language::TypeScript => js_ts_node_style(node, kind),
        Language::C | Language::Cpp => c_cpp_node_style(node, kind),
        Language::Json => json_node_style(node, kind),
        Language::PlainText => None,
    }
}

/// Returns true if `node` is the child stored under `field` in its parent.
fn is_field_of_parent(node: &Node, field: &str) -> bool {
    node.parent()
        .and_then(|parent| parent.child_by_field_name(field))
        .is_some_and(|child| child == *node)
}

fn parent_kind(node: &Node) -> Option<&'static str> {
    node.parent().map(|parent| parent.kind())
}

fn rust_node_style(node: &Node, kind: &str) -> Option<TokenStyle> {
    match kind {
        "fn" | "let" | "mut" | "const" | "static" | "pub" | "mod" | "use" | "crate"
        | "self" | "super" | "impl" | "trait" | "struct" | "enum" | "type" | "where"
        | "async" | "await" | "dyn" | "extern" | "ref" | "unsafe" | "as" | "in" => {
            Some(TokenStyle::Keyword)
        }

        "if" | "else" | "match" | "for" | "while" | "loop" | "break" | "continue"
        | "return" | "yield" => Some(TokenStyle::ControlFlow),

        "string_literal" | "raw_string_literal" => Some(TokenStyle::String),
        "char_literal" => Some(TokenStyle::Char),
        "integer_literal" | "float_literal" => Some(TokenStyle::Number),
        "true" | "false" => Some(TokenStyle::Boolean),
        "line_comment" | "block_comment" => Some(TokenStyle::Comment),
        "type_identifier" | "primitive_type" => Some(TokenStyle::Type),
        "attribute_item" | "inner_attribute_item" => Some(TokenStyle::Attribute),
        "lifetime" => Some(TokenStyle::Lifetime),

        "identifier" => match parent_kind(node) {
            Some("function_item" | "function_signature_item") if is_field_of_parent(node, "name") => {
                Some(TokenStyle::Function)
            }
            Some("call_expression") if is_field_of_parent(node, "function") => {
                Some(TokenStyle::Function)
            }
            Some("macro_invocation") => Some(TokenStyle::Macro),
            _ => None,
        },
        "!" if parent_kind(node) == Some("macro_invocation") => Some(TokenStyle::Macro),

        _ => None,
    }
}

fn json_node_style(node: &Node, kind: &str) -> Option<TokenStyle> {
    match kind {
        "string" => {
            let is_key = node
                .parent()
                .filter(|parent| parent.kind() == "pair")
                .and_then(|parent| parent.child(0))
                .is_some_and(|first| first.id() == node.id());
            if is_key {
                Some(TokenStyle::Variable)
            } else {
                Some(TokenStyle::String)
            }
        }
        "number" => Some(TokenStyle::Number),
        "true" | "false" => Some(TokenStyle::Boolean),
        "null" => Some(TokenStyle::Constant),
        _ => None,
    }
}

fn python_node_style(node: &Node, kind: &str) -> Option<TokenStyle> {
    match kind {
        "def" | "class" | "import" | "from" | "as" | "global" | "nonlocal" | "lambda"
        | "with" | "assert" | "del" | "pass" | "raise" | "except" | "finally" | "try"
        | "async" | "await" => Some(TokenStyle::Keyword),

        "if" | "elif" | "else" | "for" | "while" | "break" | "continue" | "return"
        | "yield" | "in" | "not" | "and" | "or" | "is" => Some(TokenStyle::ControlFlow),

        "string" => Some(TokenStyle::String),
        "integer" | "float" => Some(TokenStyle::Number),
        "true" | "false" => Some(TokenStyle::Boolean),
        "none" => Some(TokenStyle::Constant),
        "comment" => Some(TokenStyle::Comment),
        "decorator" => Some(TokenStyle::Attribute),

        "identifier" => match parent_kind(node) {
            Some("function_definition" | "class_definition") if is_field_of_parent(node, "name") => {
                Some(TokenStyle::Function)
            }
            Some("call") if is_field_of_parent(node, "function") => Some(TokenStyle::Function),
            _ => None,
        },

        _ => None,
    }
}

fn js_ts_node_style(node: &Node, kind: &str) -> Option<TokenStyle> {
    match kind {
        "function" | "const" | "let" | "var" | "class" | "extends" | "import" | "export"
        | "default" | "from" | "as" | "new" | "this" | "super" | "static" | "get" | "set"
        | "async" | "await" | "typeof" | "instanceof" | "void" | "delete" | "in" | "of" => {
            Some(TokenStyle::Keyword)
        }

        "type" | "interface" | "enum" | "namespace" | "module" | "declare" | "readonly"
        | "abstract" | "implements" | "private" | "protected" | "public" => {
            Some(TokenStyle::Keyword)
        }

        "if" | "else" | "for" | "while" | "do" | "switch" | "case" | "break" | "continue"
        | "return" | "throw" | "try" | "catch" | "finally" | "yield" => {
            Some(TokenStyle::ControlFlow)
        }

        "string" | "template_string" => Some(TokenStyle::String),
        "number" => Some(TokenStyle::Number),
        "true" | "false" => Some(TokenStyle::Boolean),
        "null" | "undefined" => Some(TokenStyle::Constant),
        "comment" => Some(TokenStyle::Comment),
        "type_identifier" => Some(TokenStyle::Type),

        "identifier" | "property_identifier" => match parent_kind(node) {
            Some("function_declaration" | "method_definition") if is_field_of_parent(node, "name") => {
                Some(TokenStyle::Function)
            }
            Some("call_expression") if is_field_of_parent(node, "function") => {
                Some(TokenStyle::Function)
            }
            _ => None,
        },

        _ => None,
    }
}

fn c_cpp_node_style(node: &Node, kind: &str) -> Option<TokenStyle> {
    match kind {
        "auto" | "const" | "enum" | "extern" | "inline" | "register" | "restrict" | "signed"
        | "sizeof" | "static" | "struct" | "typedef" | "union" | "unsigned" | "void"
        | "volatile" => Some(TokenStyle::Keyword),

        "class" | "namespace" | "template" | "typename" | "virtual" | "override" | "final"
        | "public" | "private" | "protected" | "friend" | "new" | "delete" | "this"
        | "using" | "constexpr" | "noexcept" | "decltype" | "explicit" | "mutable"
        | "operator" => Some(TokenStyle::Keyword),

        "if" | "else" | "for" | "while" | "do" | "switch" | "case" | "default" | "break"
        | "continue" | "return" | "goto" | "throw" | "try" | "catch" => {
            Some(TokenStyle::ControlFlow)
        }

        "string_literal" | "char_literal" | "raw_string_literal" => Some(TokenStyle::String),
        "number_literal" => Some(TokenStyle::Number),
        "true" | "false" => Some(TokenStyle::Boolean),
        "null" | "nullptr" => Some(TokenStyle::Constant),
        "comment" => Some(TokenStyle::Comment),
        "type_identifier" | "primitive_type" | "sized_type_specifier" => Some(TokenStyle::Type),

        "preproc_include" | "preproc_def" | "#include" | "#define" | "#ifdef" | "#ifndef"
        | "#if" | "#else" | "#elif" | "#endif" | "#pragma" => Some(TokenStyle::Attribute),

        "identifier" => match parent_kind(node) {
            Some("function_declarator") if is_field_of_parent(node, "declarator") => {
                Some(TokenStyle::Function)
            }
            Some("call_expression") if is_field_of_parent(node, "function") => {
                Some(TokenStyle::Function)
            }
            _ => None,
        },

        _ => None,
    }
}
