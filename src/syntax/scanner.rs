//! The lexical state machine.
//!
//! The scanner is a lazy, pull-based iterator over [`Token`]s. Besides splitting
//! the text into commands and literal runs it infers paragraph boundaries: while
//! synthesis is active it wraps runs of content in the token sequences of
//! `•sys.paragraph.begin[{…}]` and `•sys.paragraph.end[{…}]`.
//!
//! The parser owns the scanner through a [`TokenStream`] and may read and update
//! the paragraph state between tokens; since tokens are produced on demand the
//! update always applies to text that has not been scanned yet.
//!
//! After an error token the scanner stops: the remainder of the input is never
//! tokenized.

use std::collections::VecDeque;

use crate::config::Syntax;

use super::token::{Token, TokenKind};

pub const PARAGRAPH_BEGIN: &str = "sys.paragraph.begin";
pub const PARAGRAPH_END: &str = "sys.paragraph.end";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Beginning,
    ScanningText,
    NewCommand,
    SimpleCommandBody,
    CommandContext,
    CommandFlags,
    SystemCommand,
    EolComment,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// A curly-delimited body; `braces` counts literal `{` awaiting their `}`.
    Body { braces: usize },
    /// A square-bracket command context.
    Context,
}

/// Paragraph synthesis and layout options for one scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Off in plain mode.
    pub paragraphs: bool,
    /// Collapse single line breaks inside paragraphs to one space.
    pub reflow: bool,
}

pub struct Scanner<'a> {
    src: &'a str,
    syntax: &'a Syntax,
    pos: usize,
    line: usize,
    state: State,
    pending: VecDeque<Token>,
    frames: Vec<Frame>,

    text: String,
    text_start: (usize, usize),

    scan_enabled: bool,
    scan_active: bool,
    in_paragraph: bool,
    synth_depth: usize,
    reflow: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str, syntax: &'a Syntax, options: ScanOptions) -> Self {
        Self {
            src,
            syntax,
            pos: 0,
            line: 1,
            state: State::Beginning,
            pending: VecDeque::new(),
            frames: Vec::new(),
            text: String::new(),
            text_start: (0, 1),
            scan_enabled: true,
            scan_active: options.paragraphs,
            in_paragraph: false,
            synth_depth: 0,
            reflow: options.reflow,
        }
    }

    // =====================
    // Paragraph state, shared with the parser
    // =====================

    pub fn paragraphs_active(&self) -> bool {
        self.scan_active
    }

    pub fn in_paragraph(&self) -> bool {
        self.in_paragraph
    }

    /// True when content at the current nesting depth would open a paragraph.
    pub fn may_open_paragraph(&self) -> bool {
        self.scan_active && self.scan_enabled && !self.in_paragraph && self.depth() <= self.synth_depth
    }

    pub fn enter_paragraph(&mut self) {
        self.in_paragraph = true;
    }

    /// Closes the paragraph from outside the scanner, as a blank line would.
    pub fn leave_paragraph(&mut self) {
        self.in_paragraph = false;
        self.synth_depth = self.depth();
    }

    fn depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| matches!(f, Frame::Body { .. }))
            .count()
    }

    // =====================
    // Character helpers
    // =====================

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn bump_str(&mut self, s: &str) {
        for _ in s.chars() {
            self.bump();
        }
    }

    fn push(&mut self, kind: TokenKind, offset: usize, line: usize, text: impl Into<String>) {
        self.pending.push_back(Token::new(kind, offset, line, text));
    }

    fn push_here(&mut self, kind: TokenKind, text: impl Into<String>) {
        self.push(kind, self.pos, self.line, text);
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push_here(TokenKind::Error, message);
        self.state = State::Done;
    }

    fn is_name_start(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_name_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '-'
    }

    /// Reads a command name. A `.` only belongs to the name when another name
    /// character follows it.
    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if Self::is_name_char(c) {
                name.push(c);
                self.bump();
            } else if c == '.' && self.peek_second().is_some_and(Self::is_name_char) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    // =====================
    // Text buffer
    // =====================

    fn append(&mut self, c: char, offset: usize, line: usize) {
        if self.text.is_empty() {
            self.text_start = (offset, line);
        }
        self.text.push(c);
    }

    fn append_str(&mut self, s: &str, offset: usize, line: usize) {
        if s.is_empty() {
            return;
        }
        if self.text.is_empty() {
            self.text_start = (offset, line);
        }
        self.text.push_str(s);
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        let (offset, line) = self.text_start;
        self.push(TokenKind::Text, offset, line, text);
    }

    /// Appends a content character, opening a paragraph first when allowed.
    fn content(&mut self, c: char, offset: usize, line: usize) {
        if self.may_open_paragraph() {
            let buffered = std::mem::take(&mut self.text);
            let split = buffered.trim_end().len();
            let (prefix, leading_ws) = buffered.split_at(split);
            if !prefix.is_empty() {
                let (start, start_line) = self.text_start;
                self.push(TokenKind::Text, start, start_line, prefix);
            }
            self.push_paragraph_command(PARAGRAPH_BEGIN, leading_ws, offset, line);
            self.in_paragraph = true;
        }
        self.append(c, offset, line);
    }

    fn push_paragraph_command(&mut self, name: &str, whitespace: &str, offset: usize, line: usize) {
        self.push(TokenKind::CommandStart, offset, line, "");
        self.push(TokenKind::Name, offset, line, name);
        self.push(TokenKind::LeftSquare, offset, line, "");
        self.push(TokenKind::LeftCurly, offset, line, "");
        if !whitespace.is_empty() {
            self.push(TokenKind::Text, offset, line, whitespace);
        }
        self.push(TokenKind::RightCurly, offset, line, "");
        self.push(TokenKind::RightSquare, offset, line, "");
    }

    fn close_paragraph(&mut self, whitespace: &str, offset: usize, line: usize) {
        self.flush_text();
        self.push_paragraph_command(PARAGRAPH_END, whitespace, offset, line);
        self.in_paragraph = false;
        self.synth_depth = self.depth();
    }

    // =====================
    // Comments and whitespace
    // =====================

    /// Skips a `¤ … ¤` block comment starting at the current position.
    fn skip_block_comment(&mut self) -> bool {
        let toggle = self.syntax.comment;
        self.bump();
        while let Some(c) = self.bump() {
            if c == toggle {
                return true;
            }
        }
        self.error("unterminated comment");
        false
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// The space eater: whitespace and comments after it vanish.
    fn eat_space(&mut self) {
        let (offset, line) = (self.pos, self.line);
        self.flush_text();
        let eater = self.syntax.space_eater.clone();
        self.bump_str(&eater);
        let start = self.pos;
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(c) if c == self.syntax.comment => {
                    if !self.skip_block_comment() {
                        return;
                    }
                }
                Some(_) if self.rest().starts_with(self.syntax.line_comment.as_str()) => {
                    let comment = self.syntax.line_comment.clone();
                    self.bump_str(&comment);
                    self.skip_line_comment();
                }
                _ => break,
            }
        }
        let eaten = self.src[start..self.pos].to_string();
        self.push(TokenKind::Tilde, offset, line, eaten);
    }

    /// Eats blanks after a block or series command.
    ///
    /// Inside a paragraph only horizontal blanks go, so a paragraph break is
    /// never swallowed.
    pub fn skip_blank(&mut self) {
        if self.state != State::ScanningText || !self.pending.is_empty() || !self.text.is_empty() {
            return;
        }
        while let Some(c) = self.peek() {
            let horizontal = c == ' ' || c == '\t';
            if horizontal || (c.is_whitespace() && !self.in_paragraph) {
                self.bump();
            } else {
                break;
            }
        }
    }

    // =====================
    // States
    // =====================

    fn step(&mut self) {
        match self.state {
            State::Beginning => {
                if self.peek() == Some('\u{feff}') {
                    self.bump();
                }
                self.state = State::ScanningText;
            }
            State::ScanningText => self.scan_text(),
            State::NewCommand => self.scan_new_command(),
            State::SimpleCommandBody => {
                self.push_here(TokenKind::LeftCurly, "{");
                self.bump();
                self.frames.push(Frame::Body { braces: 0 });
                self.state = State::ScanningText;
            }
            State::CommandContext => self.scan_context(),
            State::CommandFlags => self.scan_flags(),
            State::SystemCommand => self.scan_system_command(),
            State::EolComment => {
                self.skip_line_comment();
                self.state = State::ScanningText;
            }
            State::Done => {}
        }
    }

    fn scan_text(&mut self) {
        loop {
            let (offset, line) = (self.pos, self.line);
            let Some(c) = self.peek() else {
                self.scan_eof();
                return;
            };
            let rest = self.rest();

            if rest.starts_with(self.syntax.space_eater.as_str()) {
                self.eat_space();
                if self.state == State::Done {
                    return;
                }
                continue;
            }
            if rest.starts_with(self.syntax.line_comment.as_str()) {
                let comment = self.syntax.line_comment.clone();
                self.bump_str(&comment);
                self.state = State::EolComment;
                return;
            }
            if c == self.syntax.comment {
                if !self.skip_block_comment() {
                    return;
                }
                continue;
            }
            if c == self.syntax.escape {
                self.bump();
                match self.bump() {
                    Some(literal) => self.content(literal, offset, line),
                    None => self.content(c, offset, line),
                }
                continue;
            }
            if c == self.syntax.paragraph && matches!(self.peek_second(), Some('+') | Some('-')) {
                self.bump();
                if self.bump() == Some('+') {
                    self.scan_enabled = true;
                    self.synth_depth = self.synth_depth.max(self.depth());
                } else {
                    self.scan_enabled = false;
                }
                continue;
            }
            if c == self.syntax.command {
                self.flush_text();
                if self.peek_second() == Some(self.syntax.system_open) {
                    let mut introducer = String::from(c);
                    introducer.push(self.syntax.system_open);
                    self.push(TokenKind::SystemCommandStart, offset, line, introducer);
                    self.bump();
                    self.bump();
                    self.state = State::SystemCommand;
                } else {
                    self.push(TokenKind::CommandStart, offset, line, c.to_string());
                    self.bump();
                    self.state = State::NewCommand;
                }
                return;
            }
            if c == self.syntax.block_command {
                self.flush_text();
                self.push(TokenKind::BlockCommandStart, offset, line, c.to_string());
                self.bump();
                self.state = State::NewCommand;
                return;
            }
            match c {
                '{' => {
                    if let Some(Frame::Body { braces }) = self.frames.last_mut() {
                        *braces += 1;
                    }
                    self.bump();
                    self.content(c, offset, line);
                }
                '}' => {
                    let closes_body = match self.frames.last_mut() {
                        Some(Frame::Body { braces }) if *braces > 0 => {
                            *braces -= 1;
                            false
                        }
                        Some(Frame::Body { .. }) => true,
                        _ => false,
                    };
                    if closes_body {
                        self.flush_text();
                        self.push(TokenKind::RightCurly, offset, line, "}");
                        self.bump();
                        self.frames.pop();
                        self.after_body();
                        return;
                    }
                    self.bump();
                    self.content(c, offset, line);
                }
                '\n' if self.in_paragraph && self.scan_active => self.scan_line_break(),
                c if c.is_whitespace() => {
                    self.bump();
                    self.append(c, offset, line);
                }
                c => {
                    self.bump();
                    self.content(c, offset, line);
                }
            }
        }
    }

    /// A line break inside a paragraph: either a paragraph boundary (another
    /// line break or the end of input follows through blanks) or an ordinary
    /// break that reflow mode turns into a single space.
    fn scan_line_break(&mut self) {
        let (offset, line) = (self.pos, self.line);
        let run_len = self
            .rest()
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(self.rest().len());
        let run = &self.rest()[..run_len];
        let at_eof = run_len == self.rest().len();
        if at_eof || run.matches('\n').count() >= 2 {
            let run = run.to_string();
            self.bump_str(&run);
            self.close_paragraph(&run, offset, line);
        } else if self.reflow {
            let run = run.to_string();
            self.bump_str(&run);
            let kept = self.text.trim_end().len();
            self.text.truncate(kept);
            self.append(' ', offset, line);
        } else {
            self.bump();
            self.append('\n', offset, line);
        }
    }

    fn scan_eof(&mut self) {
        if !self.frames.is_empty() {
            self.error("unterminated command body");
            return;
        }
        if self.in_paragraph && self.scan_active {
            let text = std::mem::take(&mut self.text);
            let split = text.trim_end().len();
            let (content, trailing) = text.split_at(split);
            if !content.is_empty() {
                let (offset, line) = self.text_start;
                self.push(TokenKind::Text, offset, line, content);
            }
            self.close_paragraph(trailing, self.pos, self.line);
        } else {
            self.flush_text();
        }
        self.push_here(TokenKind::Eof, "");
        self.state = State::Done;
    }

    fn after_body(&mut self) {
        self.synth_depth = self.synth_depth.min(self.depth());
        self.state = match self.frames.last() {
            Some(Frame::Context) => State::CommandContext,
            _ => State::ScanningText,
        };
    }

    fn after_name(&mut self) {
        match self.peek() {
            Some('{') => self.state = State::SimpleCommandBody,
            Some('[') => {
                self.push_here(TokenKind::LeftSquare, "[");
                self.bump();
                self.frames.push(Frame::Context);
                self.state = State::CommandContext;
            }
            _ => self.state = State::ScanningText,
        }
    }

    fn scan_new_command(&mut self) {
        match self.peek() {
            Some(c) if Self::is_name_start(c) => {
                let (offset, line) = (self.pos, self.line);
                let name = self.read_name();
                self.push(TokenKind::Name, offset, line, name);
                self.after_name();
            }
            None => self.error("unterminated command at end of input"),
            Some(c) if c.is_whitespace() => self.error("unnamed command"),
            Some(c) => self.error(format!("invalid character {:?} in command name", c)),
        }
    }

    fn scan_system_command(&mut self) {
        let (offset, line) = (self.pos, self.line);
        match self.peek() {
            Some(c) if Self::is_name_start(c) => {}
            _ => {
                self.error("unnamed system command");
                return;
            }
        }
        let name = self.read_name();
        if self.peek() != Some(self.syntax.system_close) {
            self.error(format!("unterminated system command name {:?}", name));
            return;
        }
        self.bump();
        self.push(TokenKind::Name, offset, line, name);
        self.after_name();
    }

    fn scan_context(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(c) if c == self.syntax.comment => {
                    if !self.skip_block_comment() {
                        return;
                    }
                }
                Some(_) if self.rest().starts_with(self.syntax.line_comment.as_str()) => {
                    let comment = self.syntax.line_comment.clone();
                    self.bump_str(&comment);
                    self.skip_line_comment();
                }
                _ => break,
            }
        }
        let (offset, line) = (self.pos, self.line);
        match self.peek() {
            None => self.error("unterminated command context"),
            Some('<') => {
                self.push(TokenKind::LeftAngle, offset, line, "<");
                self.bump();
                self.state = State::CommandFlags;
            }
            Some('{') => {
                self.push(TokenKind::LeftCurly, offset, line, "{");
                self.bump();
                self.frames.push(Frame::Body { braces: 0 });
                self.state = State::ScanningText;
            }
            Some('=') => {
                self.push(TokenKind::Equal, offset, line, "=");
                self.bump();
            }
            Some(']') => {
                self.push(TokenKind::RightSquare, offset, line, "]");
                self.bump();
                self.frames.pop();
                self.state = State::ScanningText;
            }
            Some(c) if Self::is_name_start(c) => {
                let name = self.read_name();
                self.push(TokenKind::Name, offset, line, name);
            }
            Some(c) => self.error(format!("invalid character {:?} in command context", c)),
        }
    }

    fn scan_flags(&mut self) {
        let (offset, line) = (self.pos, self.line);
        let mut run = String::new();
        loop {
            match self.peek() {
                None => {
                    self.error("unterminated flags");
                    return;
                }
                Some(',') | Some('>') => break,
                Some(c) => {
                    run.push(c);
                    self.bump();
                }
            }
        }
        let flag = run.trim();
        if !flag.is_empty() {
            self.push(TokenKind::Text, offset, line, flag);
        }
        let (offset, line) = (self.pos, self.line);
        if self.bump() == Some(',') {
            self.push(TokenKind::Comma, offset, line, ",");
        } else {
            self.push(TokenKind::RightAngle, offset, line, ">");
            self.state = State::CommandContext;
        }
    }

    /// Reads the rest of the current curly body verbatim, through its closing
    /// `}`. Escapes and nested braces are kept as written. Used for bodies that
    /// are data rather than markup, such as macro definitions.
    pub fn take_raw_body(&mut self) -> Token {
        let (offset, line) = (self.pos, self.line);
        if !self.pending.is_empty()
            || self.state != State::ScanningText
            || !matches!(self.frames.last(), Some(Frame::Body { .. }))
        {
            return Token::new(TokenKind::Error, offset, line, "raw body requested outside a body");
        }
        let mut depth = 0usize;
        let start = self.pos;
        loop {
            let Some(c) = self.peek() else {
                self.error("unterminated command body");
                return self.pending.pop_front().unwrap_or_else(|| {
                    Token::new(TokenKind::Error, offset, line, "unterminated command body")
                });
            };
            if c == self.syntax.escape {
                self.bump();
                self.bump();
                continue;
            }
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => break,
                '}' => depth -= 1,
                _ => {}
            }
            self.bump();
        }
        let raw = self.src[start..self.pos].to_string();
        self.bump();
        self.frames.pop();
        self.after_body();
        Token::new(TokenKind::Text, offset, line, raw)
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.state == State::Done {
                return None;
            }
            self.step();
        }
    }
}

// ============================================================================
// TOKEN STREAM - single-token pushback over the scanner
// ============================================================================

pub struct TokenStream<'a> {
    scanner: Scanner<'a>,
    pushed: Option<Token>,
    last: (usize, usize),
}

impl<'a> TokenStream<'a> {
    pub fn new(scanner: Scanner<'a>) -> Self {
        Self {
            scanner,
            pushed: None,
            last: (0, 1),
        }
    }

    /// Next token; an exhausted scanner yields end-of-file tokens forever.
    pub fn next_token(&mut self) -> Token {
        let token = match self.pushed.take() {
            Some(token) => token,
            None => match self.scanner.next() {
                Some(token) => token,
                None => Token::new(TokenKind::Eof, self.last.0, self.last.1, ""),
            },
        };
        self.last = (token.offset, token.line);
        token
    }

    pub fn backup(&mut self, token: Token) {
        debug_assert!(self.pushed.is_none(), "only one token of pushback");
        self.pushed = Some(token);
    }

    pub fn peek_kind(&mut self) -> TokenKind {
        let token = self.next_token();
        let kind = token.kind;
        self.backup(token);
        kind
    }

    /// Eats blank text following a block or series command.
    pub fn eat_blank(&mut self) {
        match self.pushed.take() {
            Some(mut token) if token.kind == TokenKind::Text => {
                let kept = if self.scanner.in_paragraph() {
                    token.text.trim_start_matches([' ', '\t'])
                } else {
                    token.text.trim_start()
                };
                if !kept.is_empty() {
                    token.text = kept.to_string();
                    self.pushed = Some(token);
                }
            }
            Some(token) => self.pushed = Some(token),
            None => self.scanner.skip_blank(),
        }
    }

    pub fn take_raw_body(&mut self) -> Token {
        if let Some(token) = self.pushed.take() {
            return Token::new(
                TokenKind::Error,
                token.offset,
                token.line,
                "raw body requested after lookahead",
            );
        }
        self.scanner.take_raw_body()
    }

    pub fn scanner(&self) -> &Scanner<'a> {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner<'a> {
        &mut self.scanner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str, paragraphs: bool) -> Vec<TokenKind> {
        let syntax = Syntax::default();
        Scanner::new(
            src,
            &syntax,
            ScanOptions {
                paragraphs,
                reflow: false,
            },
        )
        .map(|t| t.kind)
        .collect()
    }

    fn texts(src: &str, paragraphs: bool) -> Vec<String> {
        let syntax = Syntax::default();
        Scanner::new(
            src,
            &syntax,
            ScanOptions {
                paragraphs,
                reflow: false,
            },
        )
        .filter(|t| matches!(t.kind, TokenKind::Text | TokenKind::Name))
        .map(|t| t.text)
        .collect()
    }

    #[test]
    fn plain_text_is_one_token() {
        assert_eq!(kinds("hello world", false), vec![TokenKind::Text, TokenKind::Eof]);
    }

    #[test]
    fn simple_command_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("a •b{c} d", false),
            vec![Text, CommandStart, Name, LeftCurly, Text, RightCurly, Text, Eof]
        );
    }

    #[test]
    fn context_with_flags_and_named_arguments() {
        use TokenKind::*;
        assert_eq!(
            kinds("•img[<wide, left> src={a.png} alt={A}]", false),
            vec![
                CommandStart, Name, LeftSquare, LeftAngle, Text, Comma, Text, RightAngle, Name,
                Equal, LeftCurly, Text, RightCurly, Name, Equal, LeftCurly, Text, RightCurly,
                RightSquare, Eof
            ]
        );
    }

    #[test]
    fn system_command_name() {
        let syntax = Syntax::default();
        let tokens: Vec<Token> =
            Scanner::new("•(setdata){a: 1}", &syntax, ScanOptions::default()).collect();
        assert_eq!(tokens[0].kind, TokenKind::SystemCommandStart);
        assert_eq!(tokens[1].text, "setdata");
        assert_eq!(tokens[2].kind, TokenKind::LeftCurly);
    }

    #[test]
    fn name_does_not_swallow_trailing_dot() {
        assert_eq!(texts("see •ref.", false), vec!["see ", "ref", "."]);
        assert_eq!(texts("•a.b.c", false), vec!["a.b.c"]);
    }

    #[test]
    fn balanced_braces_in_body_are_text() {
        assert_eq!(texts("•m{a {b} c}", false), vec!["m", "a {b} c"]);
    }

    #[test]
    fn escape_and_comments() {
        assert_eq!(texts("a\\•b ¤gone¤c •% rest\nd", false), vec!["a•b c \nd"]);
    }

    #[test]
    fn space_eater_consumes_whitespace_and_comments() {
        let syntax = Syntax::default();
        let tokens: Vec<Token> =
            Scanner::new("a•~  \n •% c\n  b", &syntax, ScanOptions::default()).collect();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Text, TokenKind::Tilde, TokenKind::Text, TokenKind::Eof]
        );
        assert_eq!(tokens[2].text, "b");
    }

    #[test]
    fn paragraphs_are_synthesized_around_blank_lines() {
        let names: Vec<String> = texts("hello\n\nworld", true);
        assert_eq!(
            names,
            vec![
                PARAGRAPH_BEGIN.to_string(),
                "hello".into(),
                PARAGRAPH_END.into(),
                "\n\n".into(),
                PARAGRAPH_BEGIN.into(),
                "world".into(),
                PARAGRAPH_END.into(),
            ]
        );
    }

    #[test]
    fn leading_whitespace_goes_to_begin() {
        let names = texts("  \nhi\n", true);
        assert_eq!(
            names,
            vec![
                PARAGRAPH_BEGIN.to_string(),
                "  \n".into(),
                "hi".into(),
                PARAGRAPH_END.into(),
                "\n".into(),
            ]
        );
    }

    #[test]
    fn directive_disables_synthesis() {
        let names = texts("¶-hello\n\nworld", true);
        assert_eq!(names, vec!["hello\n\nworld".to_string()]);
    }

    #[test]
    fn reflow_joins_lines_inside_paragraph() {
        let syntax = Syntax::default();
        let text: Vec<String> = Scanner::new(
            "one  \n   two\n\n",
            &syntax,
            ScanOptions {
                paragraphs: true,
                reflow: true,
            },
        )
        .filter(|t| t.kind == TokenKind::Text)
        .map(|t| t.text)
        .collect();
        assert_eq!(text[0], "one two");
    }

    #[test]
    fn error_stops_scanning() {
        assert_eq!(kinds("a •{x} b", false), vec![TokenKind::Text, TokenKind::CommandStart, TokenKind::Error]);
        assert_eq!(kinds("•m{open", false).last(), Some(&TokenKind::Error));
        assert_eq!(kinds("• x", false).last(), Some(&TokenKind::Error));
    }

    #[test]
    fn error_carries_line_number() {
        let syntax = Syntax::default();
        let err = Scanner::new("a\nb\n•m[#]", &syntax, ScanOptions::default())
            .find(|t| t.kind == TokenKind::Error)
            .unwrap();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn raw_body_keeps_markup() {
        let syntax = Syntax::default();
        let mut stream = TokenStream::new(Scanner::new(
            "•(define){name: x, template: \"•b{c}\"} tail",
            &syntax,
            ScanOptions::default(),
        ));
        assert_eq!(stream.next_token().kind, TokenKind::SystemCommandStart);
        assert_eq!(stream.next_token().text, "define");
        assert_eq!(stream.next_token().kind, TokenKind::LeftCurly);
        let raw = stream.take_raw_body();
        assert_eq!(raw.text, "name: x, template: \"•b{c}\"");
        assert_eq!(stream.next_token().text, " tail");
    }
}
