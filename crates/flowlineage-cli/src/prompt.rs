//! Terminal prompt for unlocated macros

use flowlineage_macro::{MacroPrompt, MacroRequest, PolicyDecision};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Asks the operator on a line-based terminal
///
/// Questions go to `output` (stderr for the binary) so that stdout stays
/// free for summaries.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stdin / stderr
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed line; `None` at end of input
    fn read_answer(&mut self, question: &str) -> Option<String> {
        write!(self.output, "{}", question).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    /// Like `read_answer`, with surrounding quotes from pasted paths removed
    fn read_path(&mut self, question: &str) -> Option<String> {
        let answer = self.read_answer(question)?;
        Some(answer.trim_matches(|c| c == '"' || c == '\'').trim().to_string())
    }

    fn print_header(&mut self, request: &MacroRequest<'_>) -> io::Result<()> {
        let rule = "=".repeat(60);
        writeln!(self.output)?;
        writeln!(self.output, "{}", rule)?;
        writeln!(self.output, "Macro not found: \"{}\"", request.reference.name)?;
        writeln!(self.output, "Referenced in: {}", request.referencing_document.display())?;
        if let Some(declared) = &request.reference.declared_path {
            writeln!(self.output, "Declared path: {}", declared)?;
        }
        if !request.search_dirs.is_empty() {
            writeln!(self.output, "Searched: {} director(ies)", request.search_dirs.len())?;
        }
        writeln!(self.output, "{}", rule)?;
        writeln!(self.output)?;
        writeln!(self.output, "Options:")?;
        writeln!(self.output, "[1] Enter path to macro file")?;
        writeln!(self.output, "[2] Enter directory containing macros")?;
        writeln!(self.output, "[3] Skip this macro (document as missing)")?;
        writeln!(self.output, "[4] Skip all missing macros")?;
        writeln!(self.output)
    }
}

impl<R: BufRead, W: Write> MacroPrompt for TerminalPrompt<R, W> {
    fn ask_for_macro(&mut self, request: &MacroRequest<'_>) -> Option<PolicyDecision> {
        if request.attempt == 1 {
            self.print_header(request).ok()?;
        } else {
            writeln!(
                self.output,
                "Still looking for \"{}\" (attempt {})",
                request.reference.name, request.attempt
            )
            .ok()?;
        }

        loop {
            let choice = self.read_answer("Your choice (1-4): ")?;
            match choice.as_str() {
                "1" => {
                    let path = self.read_path("Enter full path to macro file: ")?;
                    if !path.is_empty() {
                        return Some(PolicyDecision::File(PathBuf::from(path)));
                    }
                }
                "2" => {
                    let dir = self.read_path("Enter directory path: ")?;
                    if !dir.is_empty() {
                        return Some(PolicyDecision::Directory(PathBuf::from(dir)));
                    }
                }
                "3" => return Some(PolicyDecision::SkipOne),
                "4" => return Some(PolicyDecision::SkipAll),
                _ => {
                    writeln!(self.output, "Invalid choice. Please enter 1, 2, 3, or 4.").ok()?;
                }
            }
        }
    }
}
