use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "camelCase")]
pub enum DirectorySelection {
    Selected(PathBuf),
    Canceled,
}

/// Asks the user for a directory. `Ok(None)` means they backed out.
pub trait DirectoryPicker {
    /// # Errors
    /// Returns an error if the user could not be asked at all.
    fn pick_directory(&mut self, title: &str) -> io::Result<Option<PathBuf>>;
}

/// Line-based prompt; an empty answer or end of input cancels.
pub struct PromptPicker<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptPicker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptPicker<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> DirectoryPicker for PromptPicker<R, W> {
    fn pick_directory(&mut self, title: &str) -> io::Result<Option<PathBuf>> {
        write!(self.output, "{title} (leave empty to cancel): ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        Ok((!answer.is_empty()).then(|| PathBuf::from(answer)))
    }
}
