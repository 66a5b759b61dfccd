//! # Documents and the Folio
//!
//! A [`Folio`] owns the state shared by one run: the macro table, the data
//! store, the template helpers and the configuration. Documents are added to it
//! and rendered in order; definitions and data set by one document are visible
//! to the documents rendered after it.
//!
//! A failing document yields its error and no output. Its siblings are still
//! attempted.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::ast::Tree;
use crate::config::FolioConfig;
use crate::errors::{ErrorKind, FolioError, SourceContext};
use crate::macros::{MacroDefinition, MacroTable};
use crate::runtime::{DataStore, DocContext, Renderer};
use crate::syntax::{parse, ParseOptions};
use crate::template::{TemplateEngine, TemplateFn};

const FRONT_MATTER_MARKER: &str = "---";

// ============================================================================
// DOCUMENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub path: String,
    /// Body text, front matter removed.
    pub raw_text: String,
    /// Empty means the configured default format.
    pub format: String,
    pub plain: bool,
    pub reflow: bool,
    /// Every front matter key, as written.
    pub meta: Mapping,
    tree: Option<Tree>,
}

impl Document {
    /// Builds a document from text that may start with a front matter block.
    pub fn new(name: impl Into<String>, text: &str) -> Result<Self, FolioError> {
        let name = name.into();
        let (meta, body) = split_front_matter(text).map_err(|reason| {
            FolioError::from(ErrorKind::MalformedData { line: 1, reason })
                .or_source(&SourceContext::from_file(name.clone(), text), 0)
        })?;
        let mut doc = Self {
            path: name.clone(),
            name,
            raw_text: body.to_string(),
            format: String::new(),
            plain: false,
            reflow: false,
            meta: Mapping::new(),
            tree: None,
        };
        doc.apply_meta(meta);
        Ok(doc)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FolioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FolioError::io("read", path.display(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut doc = Self::new(name, &text)?;
        doc.path = path.display().to_string();
        Ok(doc)
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.to_string();
        self
    }

    pub fn with_plain(mut self, plain: bool) -> Self {
        self.plain = plain;
        self
    }

    pub fn with_reflow(mut self, reflow: bool) -> Self {
        self.reflow = reflow;
        self
    }

    /// The parsed tree, once the document has been parsed successfully.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.get("title").and_then(Value::as_str)
    }

    pub fn source_context(&self) -> SourceContext {
        SourceContext::from_file(self.name.clone(), self.raw_text.clone())
    }

    fn apply_meta(&mut self, meta: Mapping) {
        if let Some(format) = meta.get("format").and_then(Value::as_str) {
            self.format = format.to_string();
        }
        match meta.get("mode").and_then(Value::as_str) {
            Some("plain") => self.plain = true,
            Some("reflow") => self.reflow = true,
            _ => {}
        }
        if let Some(plain) = meta.get("plain").and_then(Value::as_bool) {
            self.plain = plain;
        }
        if let Some(reflow) = meta.get("reflow").and_then(Value::as_bool) {
            self.reflow = reflow;
        }
        self.meta = meta;
    }

    fn effective_format(&self, config: &FolioConfig) -> String {
        if self.format.is_empty() {
            config.format.clone()
        } else {
            self.format.clone()
        }
    }

    fn doc_context(&self, config: &FolioConfig) -> DocContext {
        DocContext {
            name: self.name.clone(),
            path: self.path.clone(),
            format: self.effective_format(config),
            plain: self.plain,
            reflow: self.reflow,
            meta: self.meta.clone(),
        }
    }
}

/// Splits a leading `---` … `---` block off `text`. Text without a complete
/// block has no front matter.
pub fn split_front_matter(text: &str) -> Result<(Mapping, &str), String> {
    let mut lines = text.split_inclusive('\n');
    let start = match lines.next() {
        Some(first) if first.trim_end() == FRONT_MATTER_MARKER => first.len(),
        _ => return Ok((Mapping::new(), text)),
    };
    let mut offset = start;
    for line in lines {
        if line.trim_end() == FRONT_MATTER_MARKER {
            let yaml = &text[start..offset];
            let body = &text[offset + line.len()..];
            let meta = match serde_yaml::from_str::<Value>(yaml).map_err(|e| e.to_string())? {
                Value::Mapping(map) => map,
                Value::Null => Mapping::new(),
                _ => return Err("front matter must be key/value pairs".to_string()),
            };
            return Ok((meta, body));
        }
        offset += line.len();
    }
    Ok((Mapping::new(), text))
}

// ============================================================================
// FOLIO
// ============================================================================

#[derive(Debug)]
pub struct Folio {
    config: FolioConfig,
    macros: MacroTable,
    data: DataStore,
    templates: TemplateEngine,
    documents: Vec<Document>,
}

impl Default for Folio {
    fn default() -> Self {
        Self::new(FolioConfig::default())
    }
}

impl Folio {
    pub fn new(config: FolioConfig) -> Self {
        Self {
            config,
            macros: MacroTable::with_builtins(),
            data: DataStore::new(),
            templates: TemplateEngine::new(),
            documents: Vec::new(),
        }
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataStore {
        &mut self.data
    }

    /// Makes `func` callable from every macro body as `name`.
    pub fn register_helper(&mut self, name: &str, func: TemplateFn) {
        self.templates.register(name, func);
    }

    pub fn define_macro(&mut self, definition: MacroDefinition) {
        self.macros.insert(definition);
    }

    /// Runs a macro library: its definitions and data take effect, its text is
    /// discarded.
    pub fn load_macros(&mut self, name: &str, source: &str) -> Result<(), FolioError> {
        tracing::debug!(library = name, "loading macros");
        let tree = parse(
            source,
            name,
            &self.config,
            &mut self.macros,
            ParseOptions::fragment(&self.config.format),
        )?;
        let doc = DocContext {
            name: name.to_string(),
            path: name.to_string(),
            format: self.config.format.clone(),
            plain: true,
            ..DocContext::default()
        };
        Renderer::new(&mut self.macros, &mut self.data, &self.config, &self.templates, doc)
            .with_source(SourceContext::from_file(name, source))
            .render_tree(&tree)?;
        Ok(())
    }

    pub fn load_macros_file(&mut self, path: impl AsRef<Path>) -> Result<(), FolioError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| FolioError::io("read", path.display(), e))?;
        self.load_macros(&path.display().to_string(), &source)
    }

    /// Adds a document, returning its index.
    pub fn add_document(&mut self, document: Document) -> usize {
        self.documents.push(document);
        self.documents.len() - 1
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Parses a document, attaching its tree. Defines take effect here.
    pub fn parse_document(&mut self, index: usize) -> Result<(), FolioError> {
        let doc = self
            .documents
            .get_mut(index)
            .ok_or(ErrorKind::UnknownDocument { index })?;
        parse_into(doc, &self.config, &mut self.macros)
    }

    /// Renders a document, parsing it first if needed.
    pub fn render_document(&mut self, index: usize) -> Result<String, FolioError> {
        let Folio {
            config,
            macros,
            data,
            templates,
            documents,
        } = self;
        let doc = documents
            .get_mut(index)
            .ok_or(ErrorKind::UnknownDocument { index })?;
        if doc.tree.is_none() {
            parse_into(doc, config, macros)?;
        }
        let Some(tree) = doc.tree.as_ref() else {
            return Ok(String::new());
        };
        tracing::debug!(document = %doc.name, "rendering");
        Renderer::new(macros, data, config, templates, doc.doc_context(config))
            .with_source(doc.source_context())
            .render_tree(tree)
    }

    /// Renders every document in order; one result per document.
    pub fn render_each(&mut self) -> Vec<Result<String, FolioError>> {
        (0..self.documents.len())
            .map(|index| self.render_document(index))
            .collect()
    }

    /// Renders all documents and concatenates their output. Every document is
    /// attempted; the first error is returned.
    pub fn make(&mut self) -> Result<String, FolioError> {
        let mut out = String::new();
        let mut first_error = None;
        for result in self.render_each() {
            match result {
                Ok(text) => out.push_str(&text),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(err) => tracing::warn!(error = %err, "further document failure"),
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    /// Renders a one-off document that is not kept. Its definitions and data
    /// still take effect.
    pub fn render_standalone(&mut self, document: Document) -> Result<String, FolioError> {
        let index = self.add_document(document);
        let result = self.render_document(index);
        self.documents.pop();
        result
    }

    pub fn render_str(&mut self, name: &str, text: &str) -> Result<String, FolioError> {
        self.render_standalone(Document::new(name, text)?)
    }
}

fn parse_into(
    doc: &mut Document,
    config: &FolioConfig,
    macros: &mut MacroTable,
) -> Result<(), FolioError> {
    tracing::debug!(document = %doc.name, "parsing");
    let options = ParseOptions::document(&doc.effective_format(config), doc.plain, doc.reflow);
    let tree = parse(&doc.raw_text, &doc.name, config, macros, options)?;
    doc.tree = Some(tree);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_matter_sets_mode_and_meta() {
        let doc = Document::new("a.md", "---\ntitle: Home\nmode: plain\nformat: html\n---\nbody\n")
            .unwrap();
        assert!(doc.plain);
        assert_eq!(doc.format, "html");
        assert_eq!(doc.title(), Some("Home"));
        assert_eq!(doc.raw_text, "body\n");
    }

    #[test]
    fn text_without_front_matter_is_body() {
        let doc = Document::new("a", "---\nnot closed").unwrap();
        assert_eq!(doc.raw_text, "---\nnot closed");
        assert!(doc.meta.is_empty());
        let doc = Document::new("b", "plain text").unwrap();
        assert_eq!(doc.raw_text, "plain text");
    }

    #[test]
    fn malformed_front_matter_is_an_error() {
        assert!(Document::new("a", "---\n[unclosed\n---\nbody").is_err());
        assert!(Document::new("a", "---\n- a list\n---\nbody").is_err());
    }

    #[test]
    fn make_attempts_every_document() {
        let mut folio = Folio::default();
        folio.add_document(Document::new("one", "•(nosuch)").unwrap());
        folio.add_document(Document::new("two", "•(setdata){ok: yes}").unwrap());
        assert!(folio.make().is_err());
        assert!(folio.data().get("ok").is_some());
    }

    #[test]
    fn standalone_documents_are_not_kept() {
        let mut folio = Folio::default();
        let out = folio
            .render_standalone(Document::new("s", "•(setdata){k: v}•data{k}").unwrap())
            .unwrap();
        assert_eq!(out, "v");
        assert!(folio.documents().is_empty());
        assert!(folio.data().get("k").is_some());
    }

    #[test]
    fn unknown_document_index() {
        let mut folio = Folio::default();
        let err = folio.render_document(3).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownDocument { index: 3 }));
    }
}
