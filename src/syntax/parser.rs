//! Folio Parser
//!
//! Recursive descent over the [`TokenStream`], producing a [`Tree`]. The parser
//! consults the [`MacroTable`] while it runs: to learn whether a command is a
//! block or series command, and to register macros introduced by the define
//! system commands, which never produce a node.
//!
//! While paragraph synthesis is active the parser also decides paragraph
//! boundaries the scanner cannot see: a non-block command where a paragraph may
//! open gets a synthetic begin node, and a block command inside a paragraph gets
//! a synthetic end node first. The decision is written back to the scanner so
//! the two never disagree.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Arguments, Command, NodeId, NodeKind, Tree};
use crate::config::FolioConfig;
use crate::errors::{ErrorKind, ErrorReporting, FolioError, SourceContext, DEFINE_HELP};
use crate::macros::{MacroDefinition, MacroSpec, MacroTable};

use super::scanner::{ScanOptions, Scanner, TokenStream, PARAGRAPH_BEGIN, PARAGRAPH_END};
use super::token::{Token, TokenKind};

/// Prefix given to system command names in the tree.
pub const SYSTEM_PREFIX: &str = "sys.";

/// How a piece of text is to be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub format: String,
    /// Plain text gets no paragraph synthesis.
    pub plain: bool,
    pub reflow: bool,
}

impl ParseOptions {
    pub fn document(format: &str, plain: bool, reflow: bool) -> Self {
        Self {
            format: format.to_string(),
            plain,
            reflow,
        }
    }

    /// Macro output and argument defaults: plain mode in the given format.
    pub fn fragment(format: &str) -> Self {
        Self::document(format, true, false)
    }
}

pub struct Parser<'a> {
    tokens: TokenStream<'a>,
    tree: Tree,
    macros: &'a mut MacroTable,
    config: &'a FolioConfig,
    format: String,
    source: SourceContext,
    nesting: usize,
}

impl ErrorReporting for Parser<'_> {
    fn source_context(&self) -> &SourceContext {
        &self.source
    }
}

impl<'a> Parser<'a> {
    pub fn new(
        text: &'a str,
        name: &str,
        config: &'a FolioConfig,
        macros: &'a mut MacroTable,
        options: ParseOptions,
    ) -> Self {
        let scan = ScanOptions {
            paragraphs: !options.plain,
            reflow: options.reflow,
        };
        Self {
            tokens: TokenStream::new(Scanner::new(text, &config.syntax, scan)),
            tree: Tree::new(),
            macros,
            config,
            format: options.format,
            source: SourceContext::from_file(name, text),
            nesting: 0,
        }
    }

    /// Parses the whole input. Any error discards the partial tree.
    pub fn parse(mut self) -> Result<Tree, FolioError> {
        let children = self.parse_body(TokenKind::Eof)?;
        let root = self.tree.root();
        self.tree.set_children(root, children);
        Ok(self.tree)
    }

    // ========================================================================
    // BODIES
    // ========================================================================

    /// Collects nodes until `close` (a right curly, or end of input at the top).
    fn parse_body(&mut self, close: TokenKind) -> Result<Vec<NodeId>, FolioError> {
        let mut list = Vec::new();
        loop {
            let token = self.tokens.next_token();
            match token.kind {
                TokenKind::Text => {
                    let id = self.tree.push(
                        NodeKind::Text { value: token.text },
                        token.line,
                        token.offset,
                    );
                    list.push(id);
                }
                TokenKind::Tilde => {}
                TokenKind::CommandStart
                | TokenKind::BlockCommandStart
                | TokenKind::SystemCommandStart => self.parse_command(token, &mut list)?,
                kind if kind == close => return Ok(list),
                TokenKind::Error => return Err(self.lex_error(token)),
                _ => {
                    let expected = if close == TokenKind::Eof {
                        "text or a command"
                    } else {
                        "text, a command or '}'"
                    };
                    return Err(self.unexpected(expected, &token.describe(), token.line, token.offset));
                }
            }
        }
    }

    /// Parses the section of one argument block; the `{` is already consumed.
    fn parse_block(&mut self, open: &Token) -> Result<NodeId, FolioError> {
        if self.nesting >= self.config.max_nesting {
            return Err(self.report(
                ErrorKind::NestingDepth {
                    line: open.line,
                    limit: self.config.max_nesting,
                },
                open.offset,
            ));
        }
        let section = self.tree.push(
            NodeKind::Section {
                children: Vec::new(),
            },
            open.line,
            open.offset,
        );
        self.nesting += 1;
        let children = self.parse_body(TokenKind::RightCurly);
        self.nesting -= 1;
        self.tree.set_children(section, children?);
        Ok(section)
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    fn parse_command(&mut self, start: Token, list: &mut Vec<NodeId>) -> Result<(), FolioError> {
        let name = self.tokens.next_token();
        if name.kind == TokenKind::Error {
            return Err(self.lex_error(name));
        }
        if name.kind != TokenKind::Name {
            return Err(self.unexpected("a command name", &name.describe(), name.line, name.offset));
        }

        if start.kind == TokenKind::SystemCommandStart {
            return self.parse_system_command(name, list);
        }

        // Synthetic paragraph commands arrive with an empty introducer and are
        // already accounted for in the scanner's paragraph state.
        let synthetic = start.kind == TokenKind::CommandStart && start.text.is_empty();
        let vertical = start.kind == TokenKind::BlockCommandStart;

        let mut command = Command::new(name.text.clone(), self.format.clone());
        if !synthetic {
            let (is_block, is_series) = self.command_shape(&name, vertical)?;
            command.is_block = is_block;
            command.is_series = is_series;
            if self.tokens.scanner().paragraphs_active() {
                self.paragraph_boundary(is_block, &name, list);
            }
        }

        let id = self.tree.push(NodeKind::Command(command), name.line, name.offset);
        list.push(id);
        let (arguments, flags) = self.parse_arguments(&name)?;
        if let Some(command) = self.tree.command_mut(id) {
            command.arguments = arguments;
            command.flags = flags;
        }

        if let Some(command) = self.tree.command(id) {
            if command.is_block || command.is_series {
                self.tokens.eat_blank();
            }
        }
        Ok(())
    }

    /// Block and series properties of a command, from its macro.
    ///
    /// Unknown names are fatal only while paragraph synthesis is active, since
    /// only then does the answer decide the tree's shape.
    fn command_shape(&self, name: &Token, vertical: bool) -> Result<(bool, bool), FolioError> {
        match self.macros.lookup(&name.text, &self.format) {
            Some(def) => Ok((vertical || def.is_block, def.is_series)),
            None if self.tokens.scanner().paragraphs_active() => Err(self
                .report(
                    ErrorKind::UndefinedCommand {
                        line: name.line,
                        name: name.text.clone(),
                        format: self.format.clone(),
                    },
                    name.offset,
                )
                .with_help(DEFINE_HELP)),
            None => Ok((vertical, false)),
        }
    }

    fn paragraph_boundary(&mut self, is_block: bool, at: &Token, list: &mut Vec<NodeId>) {
        let in_paragraph = self.tokens.scanner().in_paragraph();
        let may_open = self.tokens.scanner().may_open_paragraph();
        if is_block && in_paragraph {
            self.push_paragraph_end(at, list);
            self.tokens.scanner_mut().leave_paragraph();
        } else if !is_block && may_open {
            self.push_paragraph_begin(at, list);
            self.tokens.scanner_mut().enter_paragraph();
        }
    }

    /// Opens a paragraph before a command. A whitespace-only text node right
    /// before it becomes the begin command's argument.
    fn push_paragraph_begin(&mut self, at: &Token, list: &mut Vec<NodeId>) {
        let begin = Command::new(PARAGRAPH_BEGIN, self.format.clone());
        let absorbed = self
            .tree
            .last()
            .filter(|id| list.last() == Some(id) && self.tree.is_blank_text(*id));

        match absorbed {
            Some(id) => {
                let whitespace = self.tree.text(id).unwrap_or_default().to_string();
                let (line, offset) = (self.tree.node(id).line, self.tree.node(id).offset);
                self.tree.replace(id, NodeKind::Command(begin));
                let section = self.tree.push(
                    NodeKind::Section {
                        children: Vec::new(),
                    },
                    line,
                    offset,
                );
                let text = self
                    .tree
                    .push(NodeKind::Text { value: whitespace }, line, offset);
                self.tree.set_children(section, vec![text]);
                if let Some(command) = self.tree.command_mut(id) {
                    command.arguments = Arguments::Anonymous(vec![section]);
                }
            }
            None => {
                let id = self
                    .tree
                    .push(NodeKind::Command(begin), at.line, at.offset);
                list.push(id);
            }
        }
    }

    fn push_paragraph_end(&mut self, at: &Token, list: &mut Vec<NodeId>) {
        let end = Command::new(PARAGRAPH_END, self.format.clone());
        let id = self.tree.push(NodeKind::Command(end), at.line, at.offset);
        list.push(id);
    }

    // ========================================================================
    // ARGUMENTS
    // ========================================================================

    /// Reads whatever follows a command name: a simple body, a context, or
    /// nothing for a bare command.
    fn parse_arguments(
        &mut self,
        name: &Token,
    ) -> Result<(Arguments, BTreeSet<String>), FolioError> {
        let token = self.tokens.next_token();
        match token.kind {
            TokenKind::LeftCurly => {
                let section = self.parse_block(&token)?;
                Ok((Arguments::Anonymous(vec![section]), BTreeSet::new()))
            }
            TokenKind::LeftSquare => self.parse_context(name),
            TokenKind::Error => Err(self.lex_error(token)),
            _ => {
                self.tokens.backup(token);
                Ok((Arguments::default(), BTreeSet::new()))
            }
        }
    }

    /// `[<flags> {…}{…}]` or `[<flags> a={…} b={…}]`; the `[` is consumed.
    fn parse_context(
        &mut self,
        name: &Token,
    ) -> Result<(Arguments, BTreeSet<String>), FolioError> {
        let mut flags = BTreeSet::new();
        let mut token = self.tokens.next_token();
        if token.kind == TokenKind::LeftAngle {
            flags = self.parse_flags()?;
            token = self.tokens.next_token();
        }

        match token.kind {
            TokenKind::RightSquare => Ok((Arguments::default(), flags)),
            TokenKind::LeftCurly => Ok((self.parse_anonymous(name, token)?, flags)),
            TokenKind::Name => Ok((self.parse_named(name, token)?, flags)),
            TokenKind::Error => Err(self.lex_error(token)),
            _ => Err(self.unexpected(
                "an argument or ']'",
                &token.describe(),
                token.line,
                token.offset,
            )),
        }
    }

    fn parse_flags(&mut self) -> Result<BTreeSet<String>, FolioError> {
        let mut flags = BTreeSet::new();
        loop {
            let token = self.tokens.next_token();
            match token.kind {
                TokenKind::Text => {
                    flags.insert(token.text);
                }
                TokenKind::Comma => {}
                TokenKind::RightAngle => return Ok(flags),
                TokenKind::Error => return Err(self.lex_error(token)),
                _ => {
                    return Err(self.report(
                        ErrorKind::MalformedFlags {
                            line: token.line,
                            reason: format!("unexpected {} in flag list", token.describe()),
                        },
                        token.offset,
                    ))
                }
            }
        }
    }

    fn parse_anonymous(&mut self, name: &Token, first: Token) -> Result<Arguments, FolioError> {
        let mut list = vec![self.parse_block(&first)?];
        loop {
            let token = self.tokens.next_token();
            match token.kind {
                TokenKind::LeftCurly => list.push(self.parse_block(&token)?),
                TokenKind::RightSquare => return Ok(Arguments::Anonymous(list)),
                TokenKind::Name => return Err(self.mixed(name, &token)),
                TokenKind::Error => return Err(self.lex_error(token)),
                _ => {
                    return Err(self.unexpected(
                        "'{' or ']'",
                        &token.describe(),
                        token.line,
                        token.offset,
                    ))
                }
            }
        }
    }

    fn parse_named(&mut self, name: &Token, first: Token) -> Result<Arguments, FolioError> {
        let mut map = BTreeMap::new();
        let mut token = first;
        loop {
            match token.kind {
                TokenKind::Name => {
                    let argument = token;
                    self.expect(TokenKind::Equal)?;
                    let open = self.expect(TokenKind::LeftCurly)?;
                    let section = self.parse_block(&open)?;
                    if map.insert(argument.text.clone(), section).is_some() {
                        return Err(self.report(
                            ErrorKind::DuplicateArgument {
                                line: argument.line,
                                name: name.text.clone(),
                                argument: argument.text,
                            },
                            argument.offset,
                        ));
                    }
                }
                TokenKind::RightSquare => return Ok(Arguments::Named(map)),
                TokenKind::LeftCurly => return Err(self.mixed(name, &token)),
                TokenKind::Error => return Err(self.lex_error(token)),
                _ => {
                    return Err(self.unexpected(
                        "an argument name or ']'",
                        &token.describe(),
                        token.line,
                        token.offset,
                    ))
                }
            }
            token = self.tokens.next_token();
        }
    }

    // ========================================================================
    // SYSTEM COMMANDS
    // ========================================================================

    fn parse_system_command(
        &mut self,
        name: Token,
        list: &mut Vec<NodeId>,
    ) -> Result<(), FolioError> {
        match name.text.as_str() {
            "define" | "definef" => self.parse_define(&name)?,
            _ => {
                let mut command = Command::new(
                    format!("{}{}", SYSTEM_PREFIX, name.text),
                    self.format.clone(),
                );
                command.is_system = true;
                let id = self.tree.push(NodeKind::Command(command), name.line, name.offset);
                list.push(id);
                let (arguments, flags) = self.parse_arguments(&name)?;
                if let Some(command) = self.tree.command_mut(id) {
                    command.arguments = arguments;
                    command.flags = flags;
                }
            }
        }
        if !self.tokens.scanner().in_paragraph() {
            self.tokens.eat_blank();
        }
        Ok(())
    }

    /// Unmarshals a define body straight into the macro table.
    fn parse_define(&mut self, name: &Token) -> Result<(), FolioError> {
        self.expect(TokenKind::LeftCurly)?;
        let body = self.tokens.take_raw_body();
        if body.kind == TokenKind::Error {
            return Err(self.lex_error(body));
        }

        let malformed = |reason: String| ErrorKind::MalformedDefinition {
            line: name.line,
            reason,
        };
        let spec = match name.text.as_str() {
            "definef" => MacroSpec::from_block(&body.text),
            _ => MacroSpec::from_flow(&body.text),
        };
        let spec = spec.map_err(|reason| self.report(malformed(reason), body.offset))?;
        let definition = MacroDefinition::from_spec(spec, &self.config.delims)
            .map_err(|reason| self.report(malformed(reason), body.offset))?;
        self.macros.insert(definition);
        Ok(())
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn expect(&mut self, kind: TokenKind) -> Result<Token, FolioError> {
        let token = self.tokens.next_token();
        if token.kind == kind {
            return Ok(token);
        }
        if token.kind == TokenKind::Error {
            return Err(self.lex_error(token));
        }
        Err(self.unexpected(kind.describe(), &token.describe(), token.line, token.offset))
    }

    fn lex_error(&self, token: Token) -> FolioError {
        self.report(
            ErrorKind::Lex {
                line: token.line,
                message: token.text,
            },
            token.offset,
        )
    }

    fn mixed(&self, name: &Token, at: &Token) -> FolioError {
        self.report(
            ErrorKind::MixedArguments {
                line: at.line,
                name: name.text.clone(),
            },
            at.offset,
        )
    }
}

/// Parses `text` into a tree with the given options.
pub fn parse(
    text: &str,
    name: &str,
    config: &FolioConfig,
    macros: &mut MacroTable,
    options: ParseOptions,
) -> Result<Tree, FolioError> {
    Parser::new(text, name, config, macros, options).parse()
}
