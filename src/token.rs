//! Token types produced by the lexer.

/// The fixed set of token classes the lexer can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    Eof,
    String(String),
    Space,
    Newline,
    SingleQuote,
    DoubleQuote,
    RedirectOut,
    RedirectIn,
    Or,
    Pipe,
    And,
    Ampersand,
    Semicolon,
    Dollar,
    Star,
    Hashtag,
    QuestionMark,
    OpenParen,
    CloseParen,
    Equals,
    Tilde,
}

/// A single lexical token. Only `String` carries a value; every other
/// variant is identified by its `TokenType` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
}

impl Token {
    pub fn new(kind: TokenType) -> Self {
        Token { kind }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TokenType::String(_))
    }

    /// The owned text of a STRING token, if this is one.
    pub fn as_str_value(&self) -> Option<&str> {
        match &self.kind {
            TokenType::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether a STRING token's text equals `word` exactly.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenType::String(s) if s == word)
    }

    pub fn same_type(&self, other: &Token) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }
}

/// Classify a single character into its token type. Characters that map to
/// no punctuator fall through to `String`; the lexer is responsible for
/// accreting a maximal run of such characters into one token.
pub fn char_to_type(c: char) -> TokenType {
    match c {
        '\n' => TokenType::Newline,
        ' ' | '\t' => TokenType::Space,
        '\'' => TokenType::SingleQuote,
        '"' => TokenType::DoubleQuote,
        '>' => TokenType::RedirectOut,
        '<' => TokenType::RedirectIn,
        '|' => TokenType::Pipe,
        '&' => TokenType::Ampersand,
        ';' => TokenType::Semicolon,
        '$' => TokenType::Dollar,
        '*' => TokenType::Star,
        '#' => TokenType::Hashtag,
        '?' => TokenType::QuestionMark,
        '(' => TokenType::OpenParen,
        ')' => TokenType::CloseParen,
        '=' => TokenType::Equals,
        '~' => TokenType::Tilde,
        other => TokenType::String(other.to_string()),
    }
}

/// Whether `c` maps to a one-character punctuator (i.e. is not itself
/// accreted into a STRING run).
pub fn is_punctuator(c: char) -> bool {
    !matches!(char_to_type(c), TokenType::String(_))
}
