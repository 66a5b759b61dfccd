//! # Folio Macro System
//!
//! A macro is a named, parameterized template bound to a command name and,
//! optionally, scoped to one output format. Commands in a document are bound to
//! macros through the [`MacroTable`]; the render engine executes the macro's
//! template with the command's rendered arguments and re-reads the result as new
//! markup.
//!
//! ## Module Structure
//!
//! - **`binding`**: matching a command's arguments against a macro's parameters
//! - **`std`**: built-in system and utility macros seeded into every table
//!
//! Definitions are immutable once built and shared through `Rc`; a later
//! definition for the same `(name, format)` key shadows the earlier one.

use ::std::collections::{HashMap, HashSet};
use ::std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::config::DEFAULT_DELIMS;

pub mod binding;
pub mod std;

pub use binding::{bind_arguments, Bound, Binding};

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Alphabetic}_][\p{Alphabetic}\p{N}_-]*(\.[\p{Alphabetic}\p{N}_-]+)*$")
        .unwrap_or_else(|e| panic!("invalid macro name pattern: {e}"))
});

/// True for names the scanner can read back as a command name.
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

// ============================================================================
// MACRO DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    pub format: String,
    pub template: String,
    pub delims: (String, String),
    pub required: Vec<String>,
    /// Optional parameters with the markup source of their default value.
    pub optional: Vec<(String, String)>,
    pub is_block: bool,
    pub is_series: bool,
    /// Template run in init mode before every invocation.
    pub init: Option<String>,
}

impl MacroDefinition {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: String::new(),
            template: template.into(),
            delims: (DEFAULT_DELIMS.0.to_string(), DEFAULT_DELIMS.1.to_string()),
            required: Vec::new(),
            optional: Vec::new(),
            is_block: false,
            is_series: false,
            init: None,
        }
    }

    pub fn with_required(mut self, names: &[&str]) -> Self {
        self.required = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_optional(mut self, name: &str, default: &str) -> Self {
        self.optional.push((name.to_string(), default.to_string()));
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.to_string();
        self
    }

    pub fn with_delims(mut self, left: &str, right: &str) -> Self {
        self.delims = (left.to_string(), right.to_string());
        self
    }

    pub fn with_init(mut self, init: &str) -> Self {
        self.init = Some(init.to_string());
        self
    }

    pub fn block(mut self) -> Self {
        self.is_block = true;
        self
    }

    pub fn series(mut self) -> Self {
        self.is_series = true;
        self
    }

    pub fn parameter_count(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    pub fn is_parameter(&self, name: &str) -> bool {
        self.required.iter().any(|p| p == name) || self.optional.iter().any(|(p, _)| p == name)
    }

    /// Builds a definition from an unmarshalled record, checking it is usable.
    pub fn from_spec(spec: MacroSpec, default_delims: &(String, String)) -> Result<Self, String> {
        if !is_valid_name(&spec.name) {
            return Err(format!("invalid macro name {:?}", spec.name));
        }
        let delims = match spec.delims.as_slice() {
            [] => default_delims.clone(),
            [left, right] if !left.is_empty() && !right.is_empty() => {
                (left.clone(), right.clone())
            }
            _ => {
                return Err(format!(
                    "macro {:?}: delims must be a pair of non-empty strings",
                    spec.name
                ))
            }
        };
        let optional: Vec<(String, String)> =
            spec.optionals.into_iter().map(OptionalSpec::into_pair).collect();

        let mut seen = HashSet::new();
        for param in spec.parameters.iter().chain(optional.iter().map(|(n, _)| n)) {
            if param.is_empty() {
                return Err(format!("macro {:?}: empty parameter name", spec.name));
            }
            if !seen.insert(param.as_str()) {
                return Err(format!(
                    "macro {:?}: duplicate parameter {:?}",
                    spec.name, param
                ));
            }
        }

        Ok(Self {
            name: spec.name,
            format: spec.format,
            template: spec.template,
            delims,
            required: spec.parameters,
            optional,
            is_block: spec.block,
            is_series: spec.series,
            init: spec.init.filter(|init| !init.is_empty()),
        })
    }
}

// ============================================================================
// MACRO DEFINITION RECORD
// ============================================================================

/// The plain record a define command's body unmarshals into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroSpec {
    pub name: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub init: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub optionals: Vec<OptionalSpec>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub block: bool,
    #[serde(default)]
    pub series: bool,
    #[serde(default)]
    pub delims: Vec<String>,
}

/// An optional parameter, written `{name: x, default: y}`, `[x, y]`, `{x: y}`,
/// or just `x` for an empty default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptionalSpec {
    Record {
        name: String,
        #[serde(default)]
        default: String,
    },
    Pair(String, String),
    Entry(HashMap<String, String>),
    Name(String),
}

impl OptionalSpec {
    fn into_pair(self) -> (String, String) {
        match self {
            OptionalSpec::Record { name, default } => (name, default),
            OptionalSpec::Pair(name, default) => (name, default),
            OptionalSpec::Entry(map) => map.into_iter().next().unwrap_or_default(),
            OptionalSpec::Name(name) => (name, String::new()),
        }
    }
}

impl MacroSpec {
    /// Unmarshals a flow-style body (`name: x, template: y`).
    pub fn from_flow(body: &str) -> Result<Self, String> {
        serde_yaml::from_str(&format!("{{{}}}", body)).map_err(|e| e.to_string())
    }

    /// Unmarshals a block-style (indented) body.
    pub fn from_block(body: &str) -> Result<Self, String> {
        serde_yaml::from_str(&dedent(body)).map_err(|e| e.to_string())
    }
}

/// Strips the indentation common to all non-blank lines, so a block body may
/// be indented to match the surrounding markup.
pub(crate) fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// MACRO TABLE
// ============================================================================

/// Macro definitions keyed by `(name, format)`.
///
/// Lookup tries the exact pair first and falls back to the format-less
/// definition `(name, "")`. Inserting over an existing key shadows it.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<(String, String), Rc<MacroDefinition>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table seeded with the built-in system and utility macros.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        self::std::register_builtins(&mut table);
        table
    }

    /// Inserts a definition, returning the one it shadows.
    pub fn insert(&mut self, definition: MacroDefinition) -> Option<Rc<MacroDefinition>> {
        let key = (definition.name.clone(), definition.format.clone());
        tracing::debug!(name = %key.0, format = %key.1, "defining macro");
        self.macros.insert(key, Rc::new(definition))
    }

    pub fn lookup(&self, name: &str, format: &str) -> Option<Rc<MacroDefinition>> {
        self.macros
            .get(&(name.to_string(), format.to_string()))
            .or_else(|| self.macros.get(&(name.to_string(), String::new())))
            .cloned()
    }

    pub fn contains(&self, name: &str, format: &str) -> bool {
        self.lookup(name, format).is_some()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// `(name, format)` keys in sorted order.
    pub fn keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.macros.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_formatless() {
        let mut table = MacroTable::new();
        table.insert(MacroDefinition::new("em", "*[[.text]]*").with_required(&["text"]));
        table.insert(
            MacroDefinition::new("em", "<em>[[.text]]</em>")
                .with_required(&["text"])
                .with_format("html"),
        );
        assert_eq!(table.lookup("em", "html").unwrap().format, "html");
        assert_eq!(table.lookup("em", "tex").unwrap().format, "");
        assert!(table.lookup("strong", "html").is_none());
    }

    #[test]
    fn later_definition_shadows() {
        let mut table = MacroTable::new();
        assert!(table.insert(MacroDefinition::new("x", "1")).is_none());
        let old = table.insert(MacroDefinition::new("x", "2")).unwrap();
        assert_eq!(old.template, "1");
        assert_eq!(table.lookup("x", "").unwrap().template, "2");
    }

    #[test]
    fn flow_spec_with_all_fields() {
        let spec = MacroSpec::from_flow(
            "name: box, template: \"<[[.a]]>\", parameters: [a], optionals: [[b, x], {name: c}, {d: y}], \
             format: html, block: true, delims: [\"<%\", \"%>\"]",
        )
        .unwrap();
        let def = MacroDefinition::from_spec(spec, &("[[".into(), "]]".into())).unwrap();
        assert_eq!(def.required, vec!["a"]);
        assert_eq!(
            def.optional,
            vec![
                ("b".to_string(), "x".to_string()),
                ("c".to_string(), String::new()),
                ("d".to_string(), "y".to_string())
            ]
        );
        assert!(def.is_block);
        assert_eq!(def.delims, ("<%".to_string(), "%>".to_string()));
    }

    #[test]
    fn block_spec_is_dedented() {
        let spec = MacroSpec::from_block(
            "\n    name: note\n    template: |\n      NOTE [[.text]]\n    parameters:\n      - text\n",
        )
        .unwrap();
        assert_eq!(spec.name, "note");
        assert_eq!(spec.template, "NOTE [[.text]]\n");
    }

    #[test]
    fn rejects_duplicate_parameters_and_bad_delims() {
        let dup = MacroSpec::from_flow("name: m, parameters: [a], optionals: [[a, x]]").unwrap();
        assert!(MacroDefinition::from_spec(dup, &("[[".into(), "]]".into()))
            .unwrap_err()
            .contains("duplicate"));
        let delims = MacroSpec::from_flow("name: m, delims: [\"{{\"]").unwrap();
        assert!(MacroDefinition::from_spec(delims, &("[[".into(), "]]".into())).is_err());
    }

    #[test]
    fn names_follow_command_syntax() {
        assert!(is_valid_name("sys.paragraph.begin"));
        assert!(is_valid_name("h1"));
        assert!(!is_valid_name("1h"));
        assert!(!is_valid_name("a."));
    }
}
