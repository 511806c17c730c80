//! Small process-related helpers shared across the workspace.
//!
//! - [`split_command_line`] turns a templated command line into an argument
//!   vector without going through a shell.
//! - [`with_priority_prefix`] prepends a scheduling-priority wrapper such as
//!   `nice -n 10` on platforms that have one.
//! - [`NoWindowExt`] keeps console windows from popping up on Windows.

#[cfg(feature = "tokio")]
use std::ffi::OsStr;

use thiserror::Error;

#[cfg(all(windows, feature = "tokio"))]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Errors produced while splitting a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("unterminated {quote} quote in command line: {line}")]
    UnterminatedQuote { quote: char, line: String },

    #[error("command line is empty")]
    Empty,
}

/// Split a command line into arguments.
///
/// Arguments are separated by unquoted whitespace. Single quotes preserve
/// their content verbatim; double quotes allow `\"` and `\\` escapes. A
/// backslash outside quotes is an ordinary character so Windows paths survive
/// untouched. An empty quoted string (`""`) yields an empty argument.
pub fn split_command_line(line: &str) -> Result<Vec<String>, SplitError> {
    let mut args = Vec::new();
    let mut current = String::new();
    // Tracks whether `current` holds an argument, even an empty quoted one.
    let mut in_arg = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(SplitError::UnterminatedQuote {
                                quote: '\'',
                                line: line.to_string(),
                            });
                        }
                    }
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(SplitError::UnterminatedQuote {
                                quote: '"',
                                line: line.to_string(),
                            });
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }

    if in_arg {
        args.push(current);
    }

    if args.is_empty() {
        return Err(SplitError::Empty);
    }

    Ok(args)
}

/// Prepend a scheduling-priority wrapper (e.g. `nice -n 10`) to an argument
/// vector.
///
/// The prefix is an opaque command line; it is split with
/// [`split_command_line`] and placed in front of `argv`. Blank prefixes are
/// ignored. On non-Unix targets the prefix is ignored because there is no
/// portable wrapper program.
pub fn with_priority_prefix(
    prefix: Option<&str>,
    argv: Vec<String>,
) -> Result<Vec<String>, SplitError> {
    let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(argv);
    };

    if cfg!(unix) {
        let mut full = split_command_line(prefix)?;
        full.extend(argv);
        Ok(full)
    } else {
        Ok(argv)
    }
}

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}
