//! Command line preparation
//!
//! Program commands are written as one string in the configuration. Before
//! a launch the string goes through environment expansion (`$VAR` and
//! `${VAR}` resolve against the daemon's environment, undefined variables
//! expand to nothing) and then through the tokenizer, which splits on
//! whitespace while respecting single and double quotes. Unprintable
//! characters are dropped; an unterminated quote fails the parse.

use crate::domain::{DomainError, Result};

/// The command to execute and the arguments to pass to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub cmd: String,
    pub args: Vec<String>,
}

/// Expand `$NAME` and `${NAME}` references from the daemon environment.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    if let Ok(value) = std::env::var(&name) {
                        out.push_str(&value);
                    }
                } else {
                    // Unterminated ${: keep the literal text
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Ok(value) = std::env::var(&name) {
                    out.push_str(&value);
                }
            }
            _ => out.push('$'),
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenizerState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

/// Whether a character may appear in an argument handed to a child.
/// Control characters and invisible format characters (soft hyphens,
/// zero-width spaces, direction marks, joiners) never reach the child.
fn is_printable(c: char) -> bool {
    if c.is_control() {
        return false;
    }
    !matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

/// Split a raw command line into the command and its arguments.
pub fn tokenize(input: &str) -> Result<ParsedCommand> {
    let mut state = TokenizerState::Unquoted;
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in input.chars() {
        match (state, c) {
            (TokenizerState::Unquoted, '\'') => state = TokenizerState::SingleQuoted,
            (TokenizerState::Unquoted, '"') => state = TokenizerState::DoubleQuoted,
            (TokenizerState::Unquoted, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
            }
            (TokenizerState::SingleQuoted, '\'') => state = TokenizerState::Unquoted,
            (TokenizerState::DoubleQuoted, '"') => state = TokenizerState::Unquoted,
            (_, c) => {
                // quoted whitespace is preserved; anything unprintable is
                // dropped, not passed to the child
                if !c.is_whitespace() && !is_printable(c) {
                    continue;
                }
                current.push(c);
            }
        }
    }

    if state != TokenizerState::Unquoted {
        return Err(DomainError::Parse {
            identifier: "EOF".to_string(),
            reason: "unterminated quote".to_string(),
        });
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        return Ok(ParsedCommand::default());
    }

    let mut chunks = chunks.into_iter();
    Ok(ParsedCommand {
        cmd: chunks.next().unwrap_or_default(),
        args: chunks.collect(),
    })
}
