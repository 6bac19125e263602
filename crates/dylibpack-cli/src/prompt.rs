//! Interactive fallback for references nothing else resolves.

use dylibpack_core::{BundleError, UnresolvedHandler};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Asks the user for the directory containing a missing library.
///
/// Reads answers line by line from `input`; `quit` or end of input aborts
/// the run.
pub struct StdinPrompt<R, W> {
    input: R,
    output: W,
}

impl StdinPrompt<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdin() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> StdinPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> UnresolvedHandler for StdinPrompt<R, W> {
    fn locate(&mut self, name: &str, consumer: &Path) -> dylibpack_core::Result<PathBuf> {
        // Prompts are best effort; a closed stderr must not hide the question.
        let _ = writeln!(
            self.output,
            "\nDependency {name} of {} not found",
            consumer.display()
        );
        let _ = write!(
            self.output,
            "Please specify the directory where this library is located (or enter 'quit' to abort): "
        );
        let _ = self.output.flush();

        match self.read_answer() {
            None => Err(BundleError::Aborted),
            Some(answer) if answer == "quit" => Err(BundleError::Aborted),
            Some(answer) => Ok(PathBuf::from(answer)),
        }
    }

    fn rejected(&mut self, candidate: &Path) {
        let _ = writeln!(self.output, "{} does not exist. Try again", candidate.display());
    }
}
