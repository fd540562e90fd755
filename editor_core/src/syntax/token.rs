//! Token classes produced by the syntax highlighter.

/// Token style categories for syntax highlighting.
///
/// The class name ([`TokenStyle::name`]) is the style payload stored in
/// spans, so the core stays independent of any colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenStyle {
    /// Keywords (fn, let, class, etc.)
    Keyword,
    /// Control flow keywords (if, else, for, while, match, etc.)
    ControlFlow,
    String,
    Char,
    Number,
    Comment,
    Function,
    Type,
    /// Variable names, and object keys in JSON
    Variable,
    /// Constants and null-like literals
    Constant,
    Attribute,
    Macro,
    /// Lifetime annotations ('a, 'static)
    Lifetime,
    Boolean,
}

impl TokenStyle {
    /// All styles, in declaration order.
    pub const ALL: [TokenStyle; 14] = [
        TokenStyle::Keyword,
        TokenStyle::ControlFlow,
        TokenStyle::String,
        TokenStyle::Char,
        TokenStyle::Number,
        TokenStyle::Comment,
        TokenStyle::Function,
        TokenStyle::Type,
        TokenStyle::Variable,
        TokenStyle::Constant,
        TokenStyle::Attribute,
        TokenStyle::Macro,
        TokenStyle::Lifetime,
        TokenStyle::Boolean,
    ];

    /// Stable class name used as the span style payload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::ControlFlow => "control_flow",
            Self::String => "string",
            Self::Char => "char",
            Self::Number => "number",
            Self::Comment => "comment",
            Self::Function => "function",
            Self::Type => "type",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Attribute => "attribute",
            Self::Macro => "macro",
            Self::Lifetime => "lifetime",
            Self::Boolean => "boolean",
        }
    }

    /// Parses a class name back into a style.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|style| style.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for style in TokenStyle::ALL {
            assert_eq!(TokenStyle::from_name(style.name()), Some(style));
        }
        assert_eq!(TokenStyle::from_name("bold"), None);
    }
}
