//! Folio Error Handling
//!
//! Every stage of the pipeline (scan, parse, bind, render) reports failures as a
//! [`FolioError`]. The `ErrorKind` carries what went wrong and formats the
//! user-facing, line-tagged message; `SourceInfo` carries where, when the failing
//! stage still has the source text at hand.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Named source text attached to errors raised while it is being processed.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Source context for text produced by a macro expansion.
    pub fn fragment(macro_name: &str, content: impl Into<String>) -> Self {
        Self {
            name: format!("<expansion of {}>", macro_name),
            content: content.into(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::from_file("<input>", "")
    }
}

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Everything that can abort the processing of a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Lexical errors - the scanner stops at the first one
    #[error("Line {line}: {message}")]
    Lex { line: usize, message: String },

    // Parse errors
    #[error("Line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("Line {line}: command {name:?} (format {format:?}) not defined")]
    UndefinedCommand {
        line: usize,
        name: String,
        format: String,
    },
    #[error("Line {line}: malformed flags: {reason}")]
    MalformedFlags { line: usize, reason: String },
    #[error("Line {line}: command {name:?} mixes named and anonymous arguments")]
    MixedArguments { line: usize, name: String },
    #[error("Line {line}: command {name:?} repeats argument {argument:?}")]
    DuplicateArgument {
        line: usize,
        name: String,
        argument: String,
    },
    #[error("Line {line}: malformed macro definition: {reason}")]
    MalformedDefinition { line: usize, reason: String },
    #[error("Line {line}: arguments nested deeper than {limit} levels")]
    NestingDepth { line: usize, limit: usize },

    // Binding errors
    #[error(
        "Line {line}: command {command:?} is missing {} {}: [{}]",
        .names.len(),
        plural(.names.len()),
        .names.join(" ")
    )]
    MissingArguments {
        line: usize,
        command: String,
        names: Vec<String>,
    },
    #[error(
        "Line {line}: command {command:?} contains {} unknown {}: [{}]",
        .names.len(),
        plural(.names.len()),
        .names.join(" ")
    )]
    UnknownArguments {
        line: usize,
        command: String,
        names: Vec<String>,
    },

    // Render errors
    #[error("Line {line}: macro {name:?} (format {format:?}) not found")]
    MacroNotFound {
        line: usize,
        name: String,
        format: String,
    },
    #[error("Line {line}: exceeded call depth of {limit} while expanding {name:?}")]
    CallDepth {
        line: usize,
        limit: usize,
        name: String,
    },
    #[error("Line {line}: unknown system command {name:?}")]
    UnknownSystemCommand { line: usize, name: String },
    #[error("Line {line}: template error in {name:?}: {message}")]
    Template {
        line: usize,
        name: String,
        message: String,
    },
    #[error("Line {line}: malformed data: {reason}")]
    MalformedData { line: usize, reason: String },

    // Environment errors
    #[error("cannot {operation} {path:?}: {reason}")]
    Io {
        operation: String,
        path: String,
        reason: String,
    },
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
    #[error("no document with index {index}")]
    UnknownDocument { index: usize },
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "argument"
    } else {
        "arguments"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lex,
    Parse,
    Binding,
    Render,
    Io,
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Lex => "lex",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Binding => "binding",
            ErrorCategory::Render => "render",
            ErrorCategory::Io => "io",
            ErrorCategory::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Lex { .. } => ErrorCategory::Lex,

            Self::UnexpectedToken { .. }
            | Self::UndefinedCommand { .. }
            | Self::MalformedFlags { .. }
            | Self::MixedArguments { .. }
            | Self::DuplicateArgument { .. }
            | Self::MalformedDefinition { .. }
            | Self::NestingDepth { .. } => ErrorCategory::Parse,

            Self::MissingArguments { .. } | Self::UnknownArguments { .. } => {
                ErrorCategory::Binding
            }

            Self::MacroNotFound { .. }
            | Self::CallDepth { .. }
            | Self::UnknownSystemCommand { .. }
            | Self::Template { .. }
            | Self::MalformedData { .. } => ErrorCategory::Render,

            Self::Io { .. } => ErrorCategory::Io,
            Self::Config { .. } | Self::UnknownDocument { .. } => ErrorCategory::Config,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "lex",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::UndefinedCommand { .. } => "undefined_command",
            Self::MalformedFlags { .. } => "malformed_flags",
            Self::MixedArguments { .. } => "mixed_arguments",
            Self::DuplicateArgument { .. } => "duplicate_argument",
            Self::MalformedDefinition { .. } => "malformed_definition",
            Self::NestingDepth { .. } => "nesting_depth",
            Self::MissingArguments { .. } => "missing_arguments",
            Self::UnknownArguments { .. } => "unknown_arguments",
            Self::MacroNotFound { .. } => "macro_not_found",
            Self::CallDepth { .. } => "call_depth",
            Self::UnknownSystemCommand { .. } => "unknown_system_command",
            Self::Template { .. } => "template",
            Self::MalformedData { .. } => "malformed_data",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
            Self::UnknownDocument { .. } => "unknown_document",
        }
    }

    /// Source line the error is tagged with, when there is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. }
            | Self::UnexpectedToken { line, .. }
            | Self::UndefinedCommand { line, .. }
            | Self::MalformedFlags { line, .. }
            | Self::MixedArguments { line, .. }
            | Self::DuplicateArgument { line, .. }
            | Self::MalformedDefinition { line, .. }
            | Self::NestingDepth { line, .. }
            | Self::MissingArguments { line, .. }
            | Self::UnknownArguments { line, .. }
            | Self::MacroNotFound { line, .. }
            | Self::CallDepth { line, .. }
            | Self::UnknownSystemCommand { line, .. }
            | Self::Template { line, .. }
            | Self::MalformedData { line, .. } => Some(*line),
            Self::Io { .. } | Self::Config { .. } | Self::UnknownDocument { .. } => None,
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Lex => "scanning stopped here",
            ErrorCategory::Parse => "unexpected here",
            ErrorCategory::Binding => "arguments do not match the macro",
            ErrorCategory::Render => "while expanding this",
            ErrorCategory::Io | ErrorCategory::Config => "here",
        }
    }
}

// ============================================================================
// FOLIO ERROR
// ============================================================================

/// Where an error happened, when the source is known.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
}

/// The single error type returned by every fallible operation in the crate.
#[derive(Debug, Clone)]
pub struct FolioError {
    pub kind: ErrorKind,
    pub source_info: Option<SourceInfo>,
    pub help: Option<String>,
}

/// Help shown with undefined command and missing macro errors.
pub const DEFINE_HELP: &str = "define it with •(define) or load a library with --macros";

impl FolioError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attaches source text unless a more precise source is already present.
    pub fn or_source(mut self, source: &SourceContext, offset: usize) -> Self {
        if self.source_info.is_none() {
            self.source_info = Some(SourceInfo {
                source: source.to_named_source(),
                primary_span: SourceSpan::from(offset..offset),
            });
        }
        self
    }

    pub fn io(operation: &str, path: impl fmt::Display, err: impl fmt::Display) -> Self {
        ErrorKind::Io {
            operation: operation.to_string(),
            path: path.to_string(),
            reason: err.to_string(),
        }
        .into()
    }
}

impl From<ErrorKind> for FolioError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            source_info: None,
            help: None,
        }
    }
}

impl std::error::Error for FolioError {}

impl fmt::Display for FolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl Diagnostic for FolioError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!(
            "folio::{}::{}",
            self.kind.category(),
            self.kind.code_suffix()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let info = self.source_info.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_info
            .as_ref()
            .map(|info| &*info.source as &dyn miette::SourceCode)
    }
}

// ============================================================================
// CONTEXT-AWARE CONSTRUCTION
// ============================================================================

/// Stages that know their source text create errors through this trait so the
/// diagnostic points at the offending byte offset.
pub trait ErrorReporting {
    fn source_context(&self) -> &SourceContext;

    fn report(&self, kind: ErrorKind, offset: usize) -> FolioError {
        FolioError::from(kind).or_source(self.source_context(), offset)
    }

    fn unexpected(&self, expected: &str, found: &str, line: usize, offset: usize) -> FolioError {
        self.report(
            ErrorKind::UnexpectedToken {
                line,
                expected: expected.into(),
                found: found.into(),
            },
            offset,
        )
    }
}

/// Prints a FolioError with full miette diagnostics.
pub fn print_error(error: FolioError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_message_pluralizes() {
        let kind = ErrorKind::MissingArguments {
            line: 1,
            command: "testMacro".into(),
            names: vec!["aOne".into(), "bTwo".into()],
        };
        assert_eq!(
            kind.to_string(),
            r#"Line 1: command "testMacro" is missing 2 arguments: [aOne bTwo]"#
        );
    }

    #[test]
    fn unknown_argument_message_singular() {
        let kind = ErrorKind::UnknownArguments {
            line: 3,
            command: "m".into(),
            names: vec!["#2".into()],
        };
        assert_eq!(
            kind.to_string(),
            r#"Line 3: command "m" contains 1 unknown argument: [#2]"#
        );
    }

    #[test]
    fn categories_follow_taxonomy() {
        let err: FolioError = ErrorKind::CallDepth {
            line: 1,
            limit: 4,
            name: "loop".into(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Render);
        assert_eq!(err.kind.line(), Some(1));
    }
}
