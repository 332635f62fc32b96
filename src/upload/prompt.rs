// Asking the operator to confirm the ID column.

use std::io::{self, BufRead, Stdin, Stdout, Write};

use survey_data::{ColumnCandidate, ColumnConfirm};

/// Returns true for "Y" or "YES", in any case.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_uppercase().as_str(), "Y" | "YES")
}

/// Asks about every candidate column on a terminal, one line per answer.
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> PromptConfirm<R, W> {
        PromptConfirm { input, output }
    }
}

impl PromptConfirm<io::BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        PromptConfirm::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ColumnConfirm for PromptConfirm<R, W> {
    fn confirm(&mut self, candidate: &ColumnCandidate) -> io::Result<bool> {
        write!(
            self.output,
            "Is project member ID column {}? ({}) (Y/N): ",
            candidate.index, candidate.name
        )?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no answer on the standard input",
            ));
        }
        Ok(is_affirmative(&answer))
    }
}
