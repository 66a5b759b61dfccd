//! Built-in macros seeded into every [`MacroTable`].
//!
//! The paragraph commands default to passing their carried whitespace through,
//! so a document with no paragraph macros of its own renders as written. A
//! document defines `sys.paragraph.begin` / `sys.paragraph.end` to wrap
//! paragraphs in real markup.
//!
//! The fixed signatures of the `setdata` and `exec` system commands live here
//! too; they are never in the table, only used to bind those commands'
//! arguments.

use once_cell::sync::Lazy;

use crate::syntax::{PARAGRAPH_BEGIN, PARAGRAPH_END};

use super::{MacroDefinition, MacroTable};

// ============================================================================
// REGISTRY: Built-in Macro Registration
// ============================================================================

/// Registers all built-in macros in the given table.
pub fn register_builtins(table: &mut MacroTable) {
    // Paragraph boundaries
    table.insert(MacroDefinition::new(PARAGRAPH_BEGIN, "[[ .text ]]").with_optional("text", ""));
    table.insert(MacroDefinition::new(PARAGRAPH_END, "[[ .text ]]").with_optional("text", ""));

    // Data access
    table.insert(MacroDefinition::new("data", "[[ getdata .key ]]").with_required(&["key"]));

    // Utilities
    table.insert(MacroDefinition::new("comment", "").with_optional("text", ""));
    table.insert(MacroDefinition::new("upper", "[[ upper .text ]]").with_required(&["text"]));
    table.insert(MacroDefinition::new("lower", "[[ lower .text ]]").with_required(&["text"]));
}

// ============================================================================
// SYSTEM COMMAND SIGNATURES
// ============================================================================

/// Binds the single argument of `setdata` / `setdataf`.
pub static SETDATA: Lazy<MacroDefinition> =
    Lazy::new(|| MacroDefinition::new("setdata", "").with_required(&["data"]));

/// Binds the single argument of `exec`.
pub static EXEC: Lazy<MacroDefinition> =
    Lazy::new(|| MacroDefinition::new("exec", "").with_required(&["template"]).block());
