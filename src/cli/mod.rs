//! The folio command-line interface.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use walkdir::WalkDir;

use crate::ast::dump::dump;
use crate::cli::args::{Command, FolioArgs};
use crate::config::FolioConfig;
use crate::errors::{print_error, ErrorKind, FolioError};
use crate::folio::{Document, Folio};

pub mod args;
pub mod output;

pub fn run() {
    let args = FolioArgs::parse();
    init_tracing(args.verbose);

    let result = match &args.command {
        Command::Make {
            file,
            output,
            plain,
        } => handle_make(&args, file, output.as_deref(), *plain),
        Command::Walk {
            source,
            dest,
            extensions,
            out_ext,
        } => handle_walk(&args, source, dest, extensions, out_ext),
        Command::Dump { file } => handle_dump(&args, file),
    };

    if let Err(e) = result {
        print_error(e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Builds the shared state for one run: configuration, then macro libraries.
fn build_folio(args: &FolioArgs) -> Result<Folio, FolioError> {
    let mut config = match &args.config {
        Some(path) => FolioConfig::from_file(path)?,
        None => FolioConfig::embedded()?,
    };
    if let Some(format) = &args.format {
        config.format = format.clone();
    }
    let mut folio = Folio::new(config);
    for library in &args.macros {
        folio.load_macros_file(library)?;
    }
    Ok(folio)
}

fn write_file(path: &Path, text: &str) -> Result<(), FolioError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FolioError::io("create", parent.display(), e))?;
    }
    fs::write(path, text).map_err(|e| FolioError::io("write", path.display(), e))
}

fn handle_make(
    args: &FolioArgs,
    file: &Path,
    output: Option<&Path>,
    plain: bool,
) -> Result<(), FolioError> {
    let mut folio = build_folio(args)?;
    let mut doc = Document::from_file(file)?;
    if plain {
        doc = doc.with_plain(true);
    }
    folio.add_document(doc);
    let text = folio.make()?;
    match output {
        Some(path) => write_file(path, &text),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn handle_walk(
    args: &FolioArgs,
    source: &Path,
    dest: &Path,
    extensions: &[String],
    out_ext: &str,
) -> Result<(), FolioError> {
    let mut folio = build_folio(args)?;
    let (mut rendered, mut copied, mut failed) = (0, 0, 0);

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| FolioError::io("walk", source.display(), e))?;
        let path = entry.path();
        if path.starts_with(dest) {
            continue;
        }
        let relative = path.strip_prefix(source).unwrap_or(path);
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| FolioError::io("create", target.display(), e))?;
            continue;
        }

        let is_document = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext));
        if !is_document {
            fs::copy(path, &target).map_err(|e| FolioError::io("copy", path.display(), e))?;
            output::print_status("copied", &target);
            copied += 1;
            continue;
        }

        let target: PathBuf = target.with_extension(out_ext);
        match render_file(&mut folio, path) {
            Ok(text) => {
                write_file(&target, &text)?;
                output::print_status("rendered", &target);
                rendered += 1;
            }
            Err(err) => {
                output::print_failure(path, err);
                failed += 1;
            }
        }
    }

    output::print_summary(rendered, copied, failed);
    if failed > 0 {
        return Err(ErrorKind::Io {
            operation: "render".into(),
            path: source.display().to_string(),
            reason: format!("{} of {} documents failed", failed, failed + rendered),
        }
        .into());
    }
    Ok(())
}

fn render_file(folio: &mut Folio, path: &Path) -> Result<String, FolioError> {
    folio.render_standalone(Document::from_file(path)?)
}

fn handle_dump(args: &FolioArgs, file: &Path) -> Result<(), FolioError> {
    let mut folio = build_folio(args)?;
    let index = folio.add_document(Document::from_file(file)?);
    folio.parse_document(index)?;
    let doc = &folio.documents()[index];
    if let Some(tree) = doc.tree() {
        output::print_dump(&doc.name, &dump(tree));
    }
    Ok(())
}
