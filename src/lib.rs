//! Folio: a macro-driven markup compiler.
//!
//! Text is scanned into tokens, parsed into a node tree, and rendered by
//! expanding each command through its macro's template. A macro's output is
//! markup again, so it is parsed and rendered in turn until only text remains.

pub mod ast;
pub mod cli;
pub mod config;
pub mod errors;
pub mod folio;
pub mod macros;
pub mod runtime;
pub mod syntax;
pub mod template;

pub use crate::config::FolioConfig;
pub use crate::errors::{ErrorKind, FolioError};
pub use crate::folio::{Document, Folio};
