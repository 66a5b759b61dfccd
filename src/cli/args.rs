//! Command-line arguments and subcommands for the folio CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "folio",
    version,
    about = "A macro-driven markup compiler."
)]
pub struct FolioArgs {
    /// YAML configuration file used instead of the built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Macro library loaded before any document. May be repeated.
    #[arg(long = "macros", global = true)]
    pub macros: Vec<PathBuf>,

    /// Output format for documents that do not name one.
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render one document.
    Make {
        #[arg(required = true)]
        file: PathBuf,
        /// Write the output here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Render without paragraph markup.
        #[arg(long)]
        plain: bool,
    },
    /// Render every matching document under a directory into another,
    /// copying all other files as they are.
    Walk {
        source: PathBuf,
        dest: PathBuf,
        /// Extensions treated as documents.
        #[arg(long = "ext", default_value = "md")]
        extensions: Vec<String>,
        /// Extension given to rendered files.
        #[arg(long, default_value = "html")]
        out_ext: String,
    },
    /// Print the parsed node tree of a document.
    Dump {
        #[arg(required = true)]
        file: PathBuf,
    },
}
