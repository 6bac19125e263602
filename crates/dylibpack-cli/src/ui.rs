//! Terminal output.

use crossterm::style::Stylize;
use dylibpack_core::Reporter;
use dylibpack_schema::{DependentEdge, Disposition, RelocationPlan, ResolvedLibrary};
use std::cell::Cell;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Nothing but warnings (JSON output owns stdout).
    Silent,
    /// Sections, the library list and the summary; no per-command echo.
    Quiet,
    Normal,
}

/// [`Reporter`] printing to the terminal.
#[derive(Debug)]
pub struct TerminalReporter {
    verbosity: Verbosity,
    /// A line of progress dots is open.
    dots: Cell<bool>,
}

impl TerminalReporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            dots: Cell::new(false),
        }
    }

    fn end_dots(&self) {
        if self.dots.replace(false) {
            println!();
        }
    }

    fn shows(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }
}

impl Reporter for TerminalReporter {
    fn section(&self, title: &str) {
        if !self.shows(Verbosity::Quiet) {
            return;
        }
        self.end_dots();
        println!();
        println!("{}", title.bold());
    }

    fn dependency(&self, reference: &str, consumer: &Path) {
        tracing::debug!("{} -> {reference}", consumer.display());
        if self.shows(Verbosity::Quiet) {
            print!("{}", ".".dark_grey());
            let _ = std::io::stdout().flush();
            self.dots.set(true);
        }
    }

    fn library(&self, library: &ResolvedLibrary, dependents: &[&DependentEdge]) {
        if !self.shows(Verbosity::Quiet) {
            return;
        }
        self.end_dots();
        for line in library_lines(library, dependents) {
            println!("{line}");
        }
    }

    fn action(&self, msg: &str) {
        tracing::debug!("{msg}");
        if self.shows(Verbosity::Normal) {
            self.end_dots();
            println!("  {}", msg.dark_grey());
        }
    }

    fn info(&self, msg: &str) {
        if self.shows(Verbosity::Quiet) {
            self.end_dots();
            println!("{msg}");
        }
    }

    fn warning(&self, msg: &str) {
        self.end_dots();
        eprintln!("{} {}", "warning:".yellow().bold(), msg.yellow());
    }

    fn summary(&self, libraries: usize, rewrites: usize) {
        if !self.shows(Verbosity::Quiet) {
            return;
        }
        self.end_dots();
        println!();
        println!(
            "{} {}",
            "Done.".green().bold(),
            format!("{libraries} copied, {rewrites} rewrites applied").green()
        );
    }
}

/// ` * libfoo.dylib from /opt/libs` followed by one line per dependent.
fn library_lines(library: &ResolvedLibrary, dependents: &[&DependentEdge]) -> Vec<String> {
    let mut lines = Vec::with_capacity(dependents.len() + 1);
    let head = format!(
        " * {} from {}",
        library.file_name,
        library.directory.display()
    );
    if library.disposition == Disposition::Bundled {
        lines.push(head);
    } else {
        lines.push(format!("{head} ({})", library.disposition));
    }
    for edge in dependents {
        lines.push(format!(
            "     {} <-- {}",
            edge.reference,
            edge.consumer.display()
        ));
    }
    lines
}

/// Human-readable rendition of `plan`, for dry runs.
pub fn plan_lines(plan: &RelocationPlan) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(dest) = &plan.destination {
        lines.push(format!("destination {}", dest.display()));
    }
    for dir in &plan.directories {
        lines.push(format!("mkdir {}", dir.display()));
    }
    for copy in &plan.copies {
        lines.push(format!("copy {} -> {}", copy.from.display(), copy.to.display()));
        for entry in &copy.strip {
            lines.push(format!("  strip {}", entry.display()));
        }
    }
    for file in &plan.generated_files {
        lines.push(format!("write {}", file.path.display()));
    }
    for id in &plan.id_rewrites {
        lines.push(format!("id {} {}", id.file.display(), id.install_name));
    }
    for rewrite in &plan.reference_rewrites {
        lines.push(format!(
            "change {} {} -> {}",
            rewrite.file.display(),
            rewrite.old,
            rewrite.new
        ));
    }
    for rewrite in &plan.rpath_rewrites {
        match &rewrite.new {
            Some(new) => lines.push(format!(
                "rpath {} {} -> {new}",
                rewrite.file.display(),
                rewrite.old
            )),
            None => lines.push(format!(
                "delete_rpath {} {}",
                rewrite.file.display(),
                rewrite.old
            )),
        }
    }
    for file in &plan.sign {
        lines.push(format!("sign {}", file.display()));
    }
    lines
}

pub fn print_plan(plan: &RelocationPlan) {
    println!();
    println!("{}", "Plan (dry run)".bold());
    if plan.is_empty() {
        println!("  {}", "nothing to do".dark_grey());
        return;
    }
    for line in plan_lines(plan) {
        println!("  {line}");
    }
}
