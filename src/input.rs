use std::io::{BufRead, Write};

use anyhow::anyhow;

use crate::names;

pub const SETUP_PROMPT: &str = "Enter Lab Group Name (alphanumeric, .-_ ; + only): ";
pub const TEARDOWN_PROMPT: &str = "Enter Lab Group Name to delete: ";
pub const PURGE_PROMPT: &str = "Enter Lab Group Name to delete resources from: ";

const INVALID_NAME_HINT: &str =
    "Invalid name! Use only a-z, A-Z, 0-9, . - _ ; + Max 100 chars, no spaces.";

/// Ask until the answer passes the name validator. End of input is an error.
pub fn prompt_valid_name<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    prompt: &str,
) -> anyhow::Result<String> {
    loop {
        write!(output, "{prompt}")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(anyhow!("no lab group name provided"));
        }
        let name = line.trim();
        if names::is_valid_name(name) {
            return Ok(name.to_string());
        }
        writeln!(output, "{INVALID_NAME_HINT}")?;
    }
}

/// Use the name given on the command line, or prompt for one.
pub fn resolve_lab_name(explicit: Option<&str>, prompt: &str) -> anyhow::Result<String> {
    match explicit {
        Some(name) if names::is_valid_name(name) => Ok(name.to_string()),
        Some(name) => Err(anyhow!("{INVALID_NAME_HINT} (got `{name}`)")),
        None => {
            let stdin = std::io::stdin();
            prompt_valid_name(stdin.lock(), std::io::stdout(), prompt)
        }
    }
}
