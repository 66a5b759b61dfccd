//! Engine configuration.
//!
//! `defaults/folio.default.yaml` is embedded into the binary; a user file is
//! layered on top of it and only needs to mention the keys it changes.

use std::path::Path;

use serde::Deserialize;

use crate::errors::{ErrorKind, FolioError};

const DEFAULT_YAML: &str = include_str!("defaults/folio.default.yaml");

/// Delimiters used by macro templates that do not declare their own.
pub const DEFAULT_DELIMS: (&str, &str) = ("[[", "]]");

/// Top-level configuration consumed by a [`Folio`](crate::folio::Folio).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolioConfig {
    pub syntax: Syntax,
    /// Maximum render recursion depth before a macro expansion is aborted.
    pub max_depth: usize,
    /// Maximum nesting of argument bodies inside one another.
    pub max_nesting: usize,
    /// Template delimiters for macros that leave `delims` empty.
    pub delims: (String, String),
    /// Output format tag given to documents that do not name one.
    pub format: String,
}

/// Control runes recognized by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Syntax {
    pub command: char,
    pub block_command: char,
    /// Follows the command rune to introduce a system command name.
    pub system_open: char,
    pub system_close: char,
    pub escape: char,
    pub comment: char,
    pub paragraph: char,
    pub line_comment: String,
    pub space_eater: String,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            command: '•',
            block_command: '◊',
            system_open: '(',
            system_close: ')',
            escape: '\\',
            comment: '¤',
            paragraph: '¶',
            line_comment: "•%".to_string(),
            space_eater: "•~".to_string(),
        }
    }
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            syntax: Syntax::default(),
            max_depth: 32,
            max_nesting: 128,
            delims: (DEFAULT_DELIMS.0.to_string(), DEFAULT_DELIMS.1.to_string()),
            format: String::new(),
        }
    }
}

impl FolioConfig {
    /// The embedded defaults.
    pub fn embedded() -> Result<Self, FolioError> {
        Self::from_yaml(DEFAULT_YAML)
    }

    pub fn from_yaml(text: &str) -> Result<Self, FolioError> {
        let config: FolioConfig = serde_yaml::from_str(text).map_err(|e| ErrorKind::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FolioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FolioError::io("read", path.display(), e))?;
        Self::from_yaml(&text)
    }

    fn validate(&self) -> Result<(), FolioError> {
        let two_runes = |s: &str| s.chars().count() == 2;
        if !two_runes(&self.syntax.line_comment) || !two_runes(&self.syntax.space_eater) {
            return Err(ErrorKind::Config {
                reason: "line_comment and space_eater must be exactly two characters".into(),
            }
            .into());
        }
        if self.delims.0.is_empty() || self.delims.1.is_empty() {
            return Err(ErrorKind::Config {
                reason: "template delimiters must not be empty".into(),
            }
            .into());
        }
        if self.max_depth == 0 || self.max_nesting == 0 {
            return Err(ErrorKind::Config {
                reason: "max_depth and max_nesting must be at least 1".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let embedded = FolioConfig::embedded().unwrap();
        assert_eq!(embedded.syntax, Syntax::default());
        assert_eq!(embedded.max_depth, FolioConfig::default().max_depth);
        assert_eq!(embedded.max_nesting, FolioConfig::default().max_nesting);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = FolioConfig::from_yaml("syntax:\n  command: \"@\"\nmax_depth: 8\n").unwrap();
        assert_eq!(config.syntax.command, '@');
        assert_eq!(config.syntax.escape, '\\');
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn rejects_bad_two_rune_sequences() {
        let err = FolioConfig::from_yaml("syntax:\n  line_comment: \"%\"\n").unwrap_err();
        assert!(err.to_string().contains("two characters"));
    }
}
