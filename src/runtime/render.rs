//! # Render / Expansion Engine
//!
//! Walks a parsed tree depth first and produces the output string. Text renders
//! as itself; a command is bound to its macro, its arguments are rendered to
//! strings, the macro template runs with them, and the template output is parsed
//! again as a plain fragment and rendered in turn. Macro output can therefore
//! invoke further commands, which is why every expansion goes through a depth
//! guard.
//!
//! System commands (`sys.*`) are interpreted here rather than through the macro
//! table. Init mode, entered by `init.begin` or while running an init template
//! or `exec`, renders text as nothing, so only side effects survive.

use std::rc::Rc;

use serde_yaml::{Mapping, Value};

use crate::ast::{Command, NodeId, NodeKind, Tree};
use crate::config::FolioConfig;
use crate::errors::{ErrorKind, FolioError, SourceContext, DEFINE_HELP};
use crate::macros::std::{EXEC, SETDATA};
use crate::macros::{bind_arguments, binding::parse_default, Bound, MacroDefinition, MacroTable};
use crate::syntax::{parse, ParseOptions, PARAGRAPH_BEGIN, PARAGRAPH_END, SYSTEM_PREFIX};
use crate::template::TemplateEngine;

use super::data::DataStore;

/// What templates see under `doc`.
#[derive(Debug, Clone, Default)]
pub struct DocContext {
    pub name: String,
    pub path: String,
    pub format: String,
    pub plain: bool,
    pub reflow: bool,
    pub meta: Mapping,
}

impl DocContext {
    pub fn to_value(&self) -> Value {
        let mut doc = Mapping::new();
        doc.insert("name".into(), self.name.clone().into());
        doc.insert("path".into(), self.path.clone().into());
        doc.insert("format".into(), self.format.clone().into());
        doc.insert("plain".into(), self.plain.into());
        doc.insert("reflow".into(), self.reflow.into());
        doc.insert("meta".into(), Value::Mapping(self.meta.clone()));
        Value::Mapping(doc)
    }
}

pub struct Renderer<'a> {
    macros: &'a mut MacroTable,
    data: &'a mut DataStore,
    config: &'a FolioConfig,
    templates: &'a TemplateEngine,
    doc: DocContext,
    doc_value: Value,
    source: Option<SourceContext>,
    depth: usize,
    nesting: usize,
    init_mode: bool,
    skip: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(
        macros: &'a mut MacroTable,
        data: &'a mut DataStore,
        config: &'a FolioConfig,
        templates: &'a TemplateEngine,
        doc: DocContext,
    ) -> Self {
        let doc_value = doc.to_value();
        Self {
            macros,
            data,
            config,
            templates,
            doc,
            doc_value,
            source: None,
            depth: 0,
            nesting: 0,
            init_mode: false,
            skip: 0,
        }
    }

    /// Source text of the tree being rendered, used to locate errors raised by
    /// its top-level commands.
    pub fn with_source(mut self, source: SourceContext) -> Self {
        self.source = Some(source);
        self
    }

    /// Renders a whole tree. This is the entry point and the depth guard.
    pub fn render_tree(&mut self, tree: &Tree) -> Result<String, FolioError> {
        self.descend(tree, "<document>", 1)
    }

    fn descend(&mut self, tree: &Tree, name: &str, line: usize) -> Result<String, FolioError> {
        if self.depth >= self.config.max_depth {
            return Err(ErrorKind::CallDepth {
                line,
                limit: self.config.max_depth,
                name: name.to_string(),
            }
            .into());
        }
        self.depth += 1;
        let result = self.render_node(tree, tree.root());
        self.depth -= 1;
        result
    }

    /// Parses macro output as a plain fragment and renders it one level down.
    fn expand(&mut self, text: &str, name: &str, line: usize) -> Result<String, FolioError> {
        tracing::trace!(macro_name = name, depth = self.depth, "expanding");
        let fragment = SourceContext::fragment(name, "");
        let tree = parse(
            text,
            &fragment.name,
            self.config,
            self.macros,
            ParseOptions::fragment(&self.doc.format),
        )?;
        self.descend(&tree, name, line)
    }

    // ========================================================================
    // NODES
    // ========================================================================

    fn render_node(&mut self, tree: &Tree, id: NodeId) -> Result<String, FolioError> {
        match tree.kind(id) {
            NodeKind::Section { children } => self.render_list(tree, children),
            NodeKind::Text { value } => Ok(if self.init_mode {
                String::new()
            } else {
                value.clone()
            }),
            NodeKind::Error { message } => Ok(message.clone()),
            NodeKind::Command(command) => {
                let result = if command.is_system {
                    self.render_system(tree, id, command)
                } else {
                    self.render_command(tree, id, command)
                };
                result.map_err(|err| self.locate(err, tree, id))
            }
        }
    }

    fn render_list(&mut self, tree: &Tree, children: &[NodeId]) -> Result<String, FolioError> {
        let outer = std::mem::take(&mut self.skip);
        let mut out = String::new();
        for (i, child) in children.iter().enumerate() {
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(span) = empty_paragraph(tree, &children[i..]) {
                self.skip = span;
                continue;
            }
            match self.render_node(tree, *child) {
                Ok(text) => out.push_str(&text),
                Err(err) => {
                    self.skip = outer;
                    return Err(err);
                }
            }
        }
        self.skip = outer;
        Ok(out)
    }

    /// Errors from top-level commands point at the command in the document.
    fn locate(&self, err: FolioError, tree: &Tree, id: NodeId) -> FolioError {
        match &self.source {
            Some(source) if self.depth <= 1 => err.or_source(source, tree.node(id).offset),
            _ => err,
        }
    }

    // ========================================================================
    // MACRO COMMANDS
    // ========================================================================

    fn render_command(
        &mut self,
        tree: &Tree,
        id: NodeId,
        command: &Command,
    ) -> Result<String, FolioError> {
        let line = tree.node(id).line;
        let def: Rc<MacroDefinition> = self
            .macros
            .lookup(&command.name, &command.format)
            .ok_or_else(|| {
                FolioError::from(ErrorKind::MacroNotFound {
                    line,
                    name: command.name.clone(),
                    format: command.format.clone(),
                })
                .with_help(DEFINE_HELP)
            })?;

        if let Some(init) = &def.init {
            let context = self.context(Mapping::new(), command);
            let output = self.execute(init, &def, &context, line)?;
            self.expand_silently(&output, &def.name, line)?;
        }

        let binding = bind_arguments(&def, command, line)?;
        let mut params = Mapping::new();
        for (name, bound) in binding {
            let text = self.render_bound(tree, bound, line)?;
            params.insert(Value::String(name), Value::String(text));
        }

        let context = self.context(params, command);
        let output = self.execute(&def.template, &def, &context, line)?;
        let mut rendered = self.expand(&output, &def.name, line)?;
        if (def.is_block || command.is_block) && !self.doc.plain {
            rendered.push('\n');
        }
        Ok(rendered)
    }

    /// Renders one bound argument. Arguments are values, so init mode does not
    /// blank them. Nesting counts across expansions.
    fn render_bound(&mut self, tree: &Tree, bound: Bound<'_>, line: usize) -> Result<String, FolioError> {
        if self.nesting >= self.config.max_nesting {
            return Err(ErrorKind::NestingDepth {
                line,
                limit: self.config.max_nesting,
            }
            .into());
        }
        self.nesting += 1;
        let was_init = std::mem::replace(&mut self.init_mode, false);
        let result = match bound {
            Bound::Supplied(section) => self.render_node(tree, section),
            Bound::Default(source) => {
                parse_default(source, self.macros, self.config, &self.doc.format).and_then(
                    |default| self.descend(&default, "<default argument>", line),
                )
            }
        };
        self.init_mode = was_init;
        self.nesting -= 1;
        result
    }

    /// Template context: parameters at the top level, shadowing `doc`, `data`
    /// and `flags`.
    fn context(&self, params: Mapping, command: &Command) -> Value {
        let mut context = Mapping::new();
        context.insert("doc".into(), self.doc_value.clone());
        context.insert("data".into(), self.data.value().clone());
        context.insert(
            "flags".into(),
            Value::Sequence(command.flags.iter().map(|f| f.as_str().into()).collect()),
        );
        for (key, value) in params {
            context.insert(key, value);
        }
        Value::Mapping(context)
    }

    fn execute(
        &self,
        source: &str,
        def: &MacroDefinition,
        context: &Value,
        line: usize,
    ) -> Result<String, FolioError> {
        let delims = (def.delims.0.as_str(), def.delims.1.as_str());
        self.templates.render(source, delims, context).map_err(|err| {
            ErrorKind::Template {
                line,
                name: def.name.clone(),
                message: err.0,
            }
            .into()
        })
    }

    /// Expands text for its side effects only.
    fn expand_silently(&mut self, text: &str, name: &str, line: usize) -> Result<(), FolioError> {
        let was_init = std::mem::replace(&mut self.init_mode, true);
        let result = self.expand(text, name, line);
        self.init_mode = was_init;
        result.map(|_| ())
    }

    // ========================================================================
    // SYSTEM COMMANDS
    // ========================================================================

    fn render_system(
        &mut self,
        tree: &Tree,
        id: NodeId,
        command: &Command,
    ) -> Result<String, FolioError> {
        let line = tree.node(id).line;
        let name = command
            .name
            .strip_prefix(SYSTEM_PREFIX)
            .unwrap_or(&command.name);
        match name {
            "init.begin" => self.init_mode = true,
            "init.end" => self.init_mode = false,
            "setdata" | "setdataf" => {
                let mut binding = bind_arguments(&SETDATA, command, line)?;
                let text = match binding.remove("data") {
                    Some(bound) => self.render_bound(tree, bound, line)?,
                    None => String::new(),
                };
                let parsed = if name == "setdataf" {
                    DataStore::parse_block(&text)
                } else {
                    DataStore::parse_flow(&text)
                };
                let mapping =
                    parsed.map_err(|reason| ErrorKind::MalformedData { line, reason })?;
                self.data.merge(mapping);
            }
            "exec" => {
                let mut binding = bind_arguments(&EXEC, command, line)?;
                let source = match binding.remove("template") {
                    Some(bound) => self.render_bound(tree, bound, line)?,
                    None => String::new(),
                };
                let def = MacroDefinition::new("exec", source)
                    .with_delims(&self.config.delims.0, &self.config.delims.1)
                    .block();
                let context = self.context(Mapping::new(), command);
                let output = self.execute(&def.template, &def, &context, line)?;
                self.expand_silently(&output, &def.name, line)?;
            }
            "import" => {}
            _ => {
                return Err(ErrorKind::UnknownSystemCommand {
                    line,
                    name: name.to_string(),
                }
                .into())
            }
        }
        Ok(String::new())
    }
}

/// Length of an empty paragraph at the head of `rest`: a begin command
/// followed only by blank text and then an end command. Returns how many nodes
/// after the begin belong to it.
fn empty_paragraph(tree: &Tree, rest: &[NodeId]) -> Option<usize> {
    let (first, tail) = rest.split_first()?;
    if !tree.is_command_named(*first, PARAGRAPH_BEGIN) {
        return None;
    }
    for (i, id) in tail.iter().enumerate() {
        if tree.is_command_named(*id, PARAGRAPH_END) {
            return Some(i + 1);
        }
        if !tree.is_blank_text(*id) {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str, macros: &mut MacroTable) -> Result<String, FolioError> {
        let config = FolioConfig::default();
        let mut data = DataStore::new();
        let tree = parse(text, "test", &config, macros, ParseOptions::document("", false, false))?;
        let templates = TemplateEngine::new();
        Renderer::new(macros, &mut data, &config, &templates, DocContext::default()).render_tree(&tree)
    }

    #[test]
    fn empty_paragraphs_are_elided() {
        let mut tree = Tree::new();
        let begin = tree.push(NodeKind::Command(Command::new(PARAGRAPH_BEGIN, "")), 1, 0);
        let blank = tree.push(NodeKind::Text { value: " \n".into() }, 1, 0);
        let end = tree.push(NodeKind::Command(Command::new(PARAGRAPH_END, "")), 1, 0);
        let text = tree.push(NodeKind::Text { value: "x".into() }, 1, 0);
        assert_eq!(empty_paragraph(&tree, &[begin, blank, end, text]), Some(2));
        assert_eq!(empty_paragraph(&tree, &[begin, text, end]), None);
        assert_eq!(empty_paragraph(&tree, &[text]), None);
    }

    #[test]
    fn error_nodes_render_verbatim() {
        let mut tree = Tree::new();
        let err = tree.push(
            NodeKind::Error {
                message: "[bad]".into(),
            },
            1,
            0,
        );
        let root = tree.root();
        tree.set_children(root, vec![err]);
        let config = FolioConfig::default();
        let mut macros = MacroTable::new();
        let mut data = DataStore::new();
        let templates = TemplateEngine::new();
        let out = Renderer::new(&mut macros, &mut data, &config, &templates, DocContext::default())
            .render_tree(&tree)
            .unwrap();
        assert_eq!(out, "[bad]");
    }

    #[test]
    fn default_paragraph_macros_pass_text_through() {
        let mut macros = MacroTable::with_builtins();
        assert_eq!(render("hello\n\nworld\n", &mut macros).unwrap(), "hello\n\nworld\n");
    }

    #[test]
    fn block_macro_gets_trailing_newline() {
        let mut macros = MacroTable::with_builtins();
        macros.insert(MacroDefinition::new("hr", "<hr>").block());
        assert_eq!(render("•hr", &mut macros).unwrap(), "<hr>\n");
    }

    #[test]
    fn unknown_system_command_is_fatal() {
        let mut macros = MacroTable::with_builtins();
        let err = render("•(frobnicate)", &mut macros).unwrap_err();
        assert_eq!(err.to_string(), r#"Line 1: unknown system command "frobnicate""#);
    }

    #[test]
    fn nested_arguments_are_bounded() {
        let mut macros = MacroTable::with_builtins();
        macros.insert(MacroDefinition::new("a", "[[.text]]").with_required(&["text"]));
        let text = format!("{}x{}", "•a{".repeat(20), "}".repeat(20));
        let tree = parse(&text, "test", &FolioConfig::default(), &mut macros, ParseOptions::fragment(""))
            .unwrap();
        let mut data = DataStore::new();
        let templates = TemplateEngine::new();

        let config = FolioConfig::default();
        let out = Renderer::new(&mut macros, &mut data, &config, &templates, DocContext::default())
            .render_tree(&tree)
            .unwrap();
        assert_eq!(out, "x");

        let config = FolioConfig {
            max_nesting: 8,
            ..FolioConfig::default()
        };
        let err = Renderer::new(&mut macros, &mut data, &config, &templates, DocContext::default())
            .render_tree(&tree)
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NestingDepth { limit: 8, .. }));
    }
}
