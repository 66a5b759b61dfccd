//! # Template Execution
//!
//! Macro bodies are Handlebars templates written between the macro's own
//! delimiter pair (`[[ … ]]` by default). Before compiling, every action is
//! moved onto Handlebars' `{{ … }}` and a few spellings are carried over so
//! bodies read the same whatever the delimiters:
//!
//! - `.name` and `.a.b` are paths on the current value, `.` is the value itself;
//! - `[[- ` and ` -]]` trim surrounding whitespace;
//! - `[[/* … */]]` is a comment.
//!
//! Rendering is strict: a path naming an absent key fails with
//! `map has no entry for key "<k>"`. Output is never HTML-escaped.

use std::fmt;

use handlebars::{no_escape, Handlebars, RenderError, RenderErrorReason};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value as Json;
use thiserror::Error;

pub mod funcs;

pub use funcs::{FnHelper, TemplateFn, STANDARD_HELPERS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TemplateError(pub String);

type Result<T> = std::result::Result<T, TemplateError>;

/// Go-style dot paths outside string literals. Group 1 is what precedes the
/// dot, group 2 the path or the character that ends a bare `.`.
static DOT_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|(^|[\s(=])\.([\p{Alphabetic}_][\w.\-]*|[\s)]|$)"#)
        .unwrap_or_else(|e| panic!("invalid dot path pattern: {e}"))
});

// ============================================================================
// ENGINE
// ============================================================================

/// The Handlebars registry shared by every macro body in a run, with the
/// standard helpers installed.
#[derive(Clone)]
pub struct TemplateEngine {
    registry: Handlebars<'static>,
    helpers: Vec<String>,
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("helpers", &self.helpers)
            .finish()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(no_escape);
        let mut engine = Self {
            registry,
            helpers: Vec::new(),
        };
        for (name, func) in STANDARD_HELPERS {
            engine.register(name, *func);
        }
        engine
    }

    /// Installs a helper, replacing any helper of the same name.
    pub fn register(&mut self, name: &str, func: TemplateFn) {
        self.registry.register_helper(name, Box::new(FnHelper(func)));
        if !self.helpers.iter().any(|known| known == name) {
            self.helpers.push(name.to_string());
        }
    }

    /// Renders `source`, whose actions sit between `delims`, against
    /// `context`. Helpers that read shared data find it under `data`.
    pub fn render(
        &self,
        source: &str,
        delims: (&str, &str),
        context: &serde_yaml::Value,
    ) -> Result<String> {
        let template = translate(source, delims)?;
        let context = serde_json::to_value(context)
            .map_err(|e| TemplateError(format!("context is not representable: {e}")))?;
        self.registry
            .render_template(&template, &context)
            .map_err(describe)
    }
}

fn describe(err: RenderError) -> TemplateError {
    match err.reason() {
        RenderErrorReason::MissingVariable(Some(path)) => TemplateError(format!(
            "map has no entry for key {:?}",
            path.trim_start_matches("this.")
        )),
        RenderErrorReason::Other(message) => TemplateError(message.clone()),
        _ => TemplateError(err.to_string()),
    }
}

// ============================================================================
// TRANSLATION
// ============================================================================

/// Rewrites a template written with `delims` into Handlebars source.
pub fn translate(source: &str, delims: (&str, &str)) -> Result<String> {
    let (left, right) = delims;
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(left) {
        out.push_str(&escape_literal(&rest[..start]));
        let body = &rest[start + left.len()..];
        let end = find_close(body, right)
            .ok_or_else(|| TemplateError(format!("unclosed action: missing {right:?}")))?;
        out.push_str("{{");
        out.push_str(&translate_action(&body[..end]));
        out.push_str("}}");
        rest = &body[end + right.len()..];
    }
    out.push_str(&escape_literal(rest));
    Ok(out)
}

/// Literal `{{` would open a Handlebars expression.
fn escape_literal(text: &str) -> String {
    text.replace("{{", "\\{{")
}

/// Position of the closing delimiter, skipping quoted strings.
fn find_close(body: &str, right: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if body[i..].starts_with(right) => return Some(i),
            None => {}
        }
    }
    None
}

fn translate_action(action: &str) -> String {
    let trimmed = action.trim();
    if let Some(comment) = trimmed
        .strip_prefix("/*")
        .and_then(|c| c.strip_suffix("*/"))
    {
        return format!("!--{}--", comment.replace("--", "- -"));
    }

    let mut action = action.to_string();
    if action.starts_with("- ") || action == "-" {
        action.replace_range(..1, "~");
    }
    if action.ends_with(" -") {
        let at = action.len() - 1;
        action.replace_range(at.., "~");
    }

    DOT_PATH
        .replace_all(&action, |caps: &Captures| {
            let (Some(before), Some(after)) = (caps.get(1), caps.get(2)) else {
                return caps[0].to_string();
            };
            let after = after.as_str();
            if after.starts_with(|c: char| c.is_alphabetic() || c == '_') {
                format!("{}this.{}", before.as_str(), after)
            } else {
                format!("{}this{}", before.as_str(), after)
            }
        })
        .into_owned()
}

// ============================================================================
// VALUES
// ============================================================================

/// How a helper argument appears as text: strings as written, `null` as
/// nothing, everything else as JSON.
pub fn print_value(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Template truth: false, 0, "", null and empty collections are false.
pub fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(items) => !items.is_empty(),
        Json::Object(map) => !map.is_empty(),
    }
}

pub fn type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "nil",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "sequence",
        Json::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(yaml: &str) -> serde_yaml::Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn run(source: &str, ctx: &str) -> Result<String> {
        TemplateEngine::new().render(source, ("[[", "]]"), &context(ctx))
    }

    #[test]
    fn substitutes_dot_paths() {
        assert_eq!(run("<[[ .a ]]|[[.b.c]]>", "{a: x, b: {c: 2}}").unwrap(), "<x|2>");
        assert_eq!(run("[[ a ]]", "{a: plain}").unwrap(), "plain");
    }

    #[test]
    fn missing_key_fails() {
        let err = run("[[ .nope ]]", "{a: 1}").unwrap_err();
        assert!(err.0.contains("map has no entry for key"), "{err}");
        assert!(err.0.contains("nope"), "{err}");
    }

    #[test]
    fn output_is_not_escaped() {
        assert_eq!(run("[[ .a ]]", "{a: \"<b> & c\"}").unwrap(), "<b> & c");
    }

    #[test]
    fn custom_delimiters_leave_the_default_alone() {
        let out = TemplateEngine::new()
            .render("<% .a %> [[ .a ]] {{x}}", ("<%", "%>"), &context("{a: 1}"))
            .unwrap();
        assert_eq!(out, "1 [[ .a ]] {{x}}");
    }

    #[test]
    fn trim_markers_and_comments() {
        assert_eq!(run("a  [[- .x -]]  b", "{x: X}").unwrap(), "aXb");
        assert_eq!(run("a[[/* note */]]b", "{}").unwrap(), "ab");
    }

    #[test]
    fn helpers_and_subexpressions() {
        assert_eq!(run("[[ upper .s ]]", "{s: abc}").unwrap(), "ABC");
        assert_eq!(run("[[ add 1 (mul 2 3) ]]", "{}").unwrap(), "7");
        assert_eq!(run(r#"[[ upper (replace "a" "b" .s) ]]"#, "{s: aaa}").unwrap(), "BBB");
    }

    #[test]
    fn blocks_rebind_the_dot() {
        let src = "[[#if .a]]A[[else]]B[[/if]]";
        assert_eq!(run(src, "{a: true}").unwrap(), "A");
        assert_eq!(run(src, "{a: false}").unwrap(), "B");
        assert_eq!(run("[[#each .xs]]<[[ . ]]>[[/each]]", "{xs: [1, 2]}").unwrap(), "<1><2>");
        assert_eq!(run("[[#with .m]][[ .k ]][[/with]]", "{m: {k: v}}").unwrap(), "v");
    }

    #[test]
    fn delimiter_inside_string_literal() {
        assert_eq!(run(r#"[[ print "]]" ]]"#, "{}").unwrap(), "]]");
    }

    #[test]
    fn dots_inside_strings_are_kept() {
        assert_eq!(
            translate(r#"[[ getdata "site.title" ]] [[ .x ]]"#, ("[[", "]]")).unwrap(),
            r#"{{ getdata "site.title" }} {{ this.x }}"#
        );
    }

    #[test]
    fn syntax_errors() {
        assert!(run("[[ .a ", "{a: 1}").is_err());
        assert!(run("[[#if .a]]x", "{a: 1}").is_err());
        assert!(run("[[ nosuch 1 ]]", "{}").is_err());
    }

    #[test]
    fn sequences_print_as_json() {
        assert_eq!(run("[[ print .xs ]]", "{xs: [a, 1]}").unwrap(), r#"["a",1]"#);
    }
}
