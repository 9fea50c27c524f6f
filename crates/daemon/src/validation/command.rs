// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command and argument validation.

use joblet_core::config::JobletConfig;
use std::path::Path;
use thiserror::Error;

/// Maximum command length.
pub const MAX_COMMAND_LEN: usize = 1024;
/// Maximum length of a single argument.
pub const MAX_ARG_LEN: usize = 4096;
/// Maximum argument count.
pub const MAX_ARGS: usize = 100;
/// Maximum total bytes across all arguments.
pub const MAX_TOTAL_ARG_BYTES: usize = 40_960;

/// Glyphs with shell or substitution semantics; forbidden in the command
/// and counted as suspicious in arguments.
const DANGEROUS_CHARS: [char; 12] = [';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<'];

/// Arguments tolerate a couple of these (globs, brackets in filenames);
/// more than two in one argument reads as an injection attempt.
const MAX_SUSPICIOUS_PER_ARG: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command is empty")]
    Empty,
    #[error("command exceeds {MAX_COMMAND_LEN} characters")]
    CommandTooLong,
    #[error("command contains forbidden character {0:?}")]
    ForbiddenCharacter(char),
    #[error("command path contains '..'")]
    PathTraversal,
    #[error("command {0} is blocklisted")]
    Blocklisted(String),
    #[error("command {0} is not on the allowlist")]
    NotAllowlisted(String),
    #[error("too many arguments ({0}, max {MAX_ARGS})")]
    TooManyArgs(usize),
    #[error("argument {index} exceeds {MAX_ARG_LEN} characters")]
    ArgTooLong { index: usize },
    #[error("total argument bytes exceed {MAX_TOTAL_ARG_BYTES}")]
    ArgsTooLarge,
    #[error("argument {index} looks like an injection attempt")]
    SuspiciousArg { index: usize },
}

/// The `>` glyph joins the forbidden set; kept out of the array so the
/// array literal stays readable alongside `<`.
fn is_dangerous(c: char) -> bool {
    c == '>' || DANGEROUS_CHARS.contains(&c)
}

pub fn validate_command(
    command: &str,
    args: &[String],
    config: &JobletConfig,
) -> Result<(), CommandError> {
    if command.is_empty() {
        return Err(CommandError::Empty);
    }
    if command.len() > MAX_COMMAND_LEN {
        return Err(CommandError::CommandTooLong);
    }
    if let Some(c) = command.chars().find(|c| is_dangerous(*c)) {
        return Err(CommandError::ForbiddenCharacter(c));
    }
    if command.split('/').any(|segment| segment == "..") {
        return Err(CommandError::PathTraversal);
    }

    let base_name = Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(command);
    if config
        .command_blocklist
        .iter()
        .any(|blocked| blocked == base_name)
    {
        return Err(CommandError::Blocklisted(base_name.to_string()));
    }

    // Absolute paths bypass the name allowlist (but never the blocklist).
    let absolute = command.starts_with('/');
    if !config.command_allowlist.is_empty()
        && !absolute
        && !config.command_allowlist.iter().any(|ok| ok == base_name)
    {
        return Err(CommandError::NotAllowlisted(base_name.to_string()));
    }

    if args.len() > MAX_ARGS {
        return Err(CommandError::TooManyArgs(args.len()));
    }
    let total: usize = args.iter().map(String::len).sum();
    if total > MAX_TOTAL_ARG_BYTES {
        return Err(CommandError::ArgsTooLarge);
    }
    for (index, arg) in args.iter().enumerate() {
        if arg.len() > MAX_ARG_LEN {
            return Err(CommandError::ArgTooLong { index });
        }
        let suspicious = arg.chars().filter(|c| is_dangerous(*c)).count();
        if suspicious > MAX_SUSPICIOUS_PER_ARG {
            return Err(CommandError::SuspiciousArg { index });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
