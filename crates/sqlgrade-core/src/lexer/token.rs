//! Token types for the SQL lexer.

use std::fmt;

use super::Span;

macro_rules! keywords {
    ($($variant:ident => $text:literal,)*) => {
        /// Reserved words recognised by the grammar.
        ///
        /// Type names, aggregate names and other function names are lexed as
        /// identifiers so that columns such as `date` or `count` stay usable.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant,)*
        }

        impl Keyword {
            /// Attempts to parse a keyword from a string (case-insensitive).
            #[must_use]
            #[allow(clippy::should_implement_trait)]
            pub fn from_str(s: &str) -> Option<Self> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Returns the canonical (uppercase) spelling of the keyword.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }
    };
}

keywords! {
    Select => "SELECT",
    From => "FROM",
    Where => "WHERE",
    Order => "ORDER",
    By => "BY",
    Group => "GROUP",
    Having => "HAVING",
    Limit => "LIMIT",
    Offset => "OFFSET",
    Distinct => "DISTINCT",
    All => "ALL",
    Join => "JOIN",
    Inner => "INNER",
    Left => "LEFT",
    Right => "RIGHT",
    Full => "FULL",
    Outer => "OUTER",
    Cross => "CROSS",
    On => "ON",
    Using => "USING",
    Union => "UNION",
    Intersect => "INTERSECT",
    Except => "EXCEPT",
    Create => "CREATE",
    Alter => "ALTER",
    Table => "TABLE",
    Add => "ADD",
    Column => "COLUMN",
    If => "IF",
    Primary => "PRIMARY",
    Key => "KEY",
    Foreign => "FOREIGN",
    References => "REFERENCES",
    Unique => "UNIQUE",
    Check => "CHECK",
    Default => "DEFAULT",
    Constraint => "CONSTRAINT",
    Autoincrement => "AUTOINCREMENT",
    And => "AND",
    Or => "OR",
    Not => "NOT",
    In => "IN",
    Between => "BETWEEN",
    Like => "LIKE",
    Is => "IS",
    Null => "NULL",
    True => "TRUE",
    False => "FALSE",
    Exists => "EXISTS",
    Asc => "ASC",
    Desc => "DESC",
    Nulls => "NULLS",
    As => "AS",
    Case => "CASE",
    When => "WHEN",
    Then => "THEN",
    Else => "ELSE",
    End => "END",
    Cast => "CAST",
    Insert => "INSERT",
    Update => "UPDATE",
    Delete => "DELETE",
    Drop => "DROP",
    With => "WITH",
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Float literal (e.g., 3.14)
    Float(f64),
    /// String literal with quotes removed and `''` unescaped
    String(String),
    /// Identifier, already lowercased and unquoted
    Identifier(String),
    Keyword(Keyword),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    /// `!=` or `<>`
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `||`
    Concat,

    LeftParen,
    RightParen,
    Comma,
    Semicolon,
    Dot,

    /// End of input
    Eof,
    /// Invalid/unknown token
    Error(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Identifier(name) => write!(f, "{name}"),
            Self::Keyword(kw) => f.write_str(kw.as_str()),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Eq => f.write_str("="),
            Self::NotEq => f.write_str("<>"),
            Self::Lt => f.write_str("<"),
            Self::LtEq => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::GtEq => f.write_str(">="),
            Self::Concat => f.write_str("||"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::Semicolon => f.write_str(";"),
            Self::Dot => f.write_str("."),
            Self::Eof => f.write_str("end of input"),
            Self::Error(message) => f.write_str(message),
        }
    }
}

/// A token with its span in the source code.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the keyword if this is a keyword token.
    #[must_use]
    pub const fn as_keyword(&self) -> Option<Keyword> {
        match &self.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }
}
