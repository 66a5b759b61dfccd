//! Lexical tokens produced by the [`Scanner`](super::scanner::Scanner).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Text,
    /// Horizontal (inline) command introducer.
    CommandStart,
    /// Vertical (block-mode) command introducer.
    BlockCommandStart,
    SystemCommandStart,
    Name,
    LeftSquare,
    RightSquare,
    LeftCurly,
    RightCurly,
    LeftAngle,
    RightAngle,
    Equal,
    Comma,
    /// Marks whitespace removed by the space eater.
    Tilde,
    Error,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Text => "text",
            TokenKind::CommandStart => "command",
            TokenKind::BlockCommandStart => "block command",
            TokenKind::SystemCommandStart => "system command",
            TokenKind::Name => "name",
            TokenKind::LeftSquare => "'['",
            TokenKind::RightSquare => "']'",
            TokenKind::LeftCurly => "'{'",
            TokenKind::RightCurly => "'}'",
            TokenKind::LeftAngle => "'<'",
            TokenKind::RightAngle => "'>'",
            TokenKind::Equal => "'='",
            TokenKind::Comma => "','",
            TokenKind::Tilde => "space eater",
            TokenKind::Error => "error",
            TokenKind::Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single token. `offset` is the byte offset of its first character in the
/// scanned text and `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub line: usize,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize, line: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            line,
            text: text.into(),
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Short human-readable description for "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Text | TokenKind::Name => format!("{} {:?}", self.kind, self.text),
            _ => self.kind.describe().to_string(),
        }
    }
}
