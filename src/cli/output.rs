//! User-facing output for the CLI. Rendered text goes to stdout, status and
//! diagnostics to stderr.

use std::io::Write;
use std::path::Path;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::errors::{print_error, FolioError};

/// Prints a tree dump under a highlighted header.
pub fn print_dump(name: &str, dump: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(stdout, "--- {} ---", name);
    let _ = stdout.reset();
    let _ = write!(stdout, "{}", dump);
}

/// One line per file handled by `walk`.
pub fn print_status(verb: &str, path: &Path) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = write!(stderr, "{:>9}", verb);
    let _ = stderr.reset();
    let _ = writeln!(stderr, " {}", path.display());
}

/// Reports a failed file and its diagnostic.
pub fn print_failure(path: &Path, error: FolioError) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stderr, "{:>9}", "failed");
    let _ = stderr.reset();
    let _ = writeln!(stderr, " {}", path.display());
    print_error(error);
}

pub fn print_summary(rendered: usize, copied: usize, failed: usize) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let color = if failed > 0 { Color::Red } else { Color::Green };
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(
        stderr,
        "{} rendered, {} copied, {} failed",
        rendered, copied, failed
    );
    let _ = stderr.reset();
}
