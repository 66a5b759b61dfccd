//! Markup syntax: tokens, the scanner state machine and the parser.

pub mod parser;
pub mod scanner;
pub mod token;

pub use parser::{parse, ParseOptions, Parser, SYSTEM_PREFIX};
pub use scanner::{ScanOptions, Scanner, TokenStream, PARAGRAPH_BEGIN, PARAGRAPH_END};
pub use token::{Token, TokenKind};
