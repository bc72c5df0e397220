//! Interactive prompts

use std::io::{self, BufRead, Write};

use anyhow::Result;

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let stdin = io::stdin();
    read_answer(&mut stdin.lock())
}

fn read_answer<R: BufRead>(input: &mut R) -> Result<bool> {
    let mut line = String::new();
    input.read_line(&mut line)?;

    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
