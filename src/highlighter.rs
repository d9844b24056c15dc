// ABOUTME: Syntax highlighter for the REPL with color support
// Implements rustyline's Highlighter trait to provide ANSI color codes
// for Flowby syntax elements while preserving display width

use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::borrow::Cow;

use crate::token::keyword_kind;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_ACTION: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)

const ACTION_WORDS: &[&str] = &[
    "navigate",
    "click",
    "type",
    "wait",
    "assert",
    "screenshot",
    "scroll",
    "extract",
    "check",
    "hover",
    "upload",
    "select",
    "log",
];

/// Rustyline helper providing Flowby keyword and literal coloring.
pub struct FlowbyHelper;

impl FlowbyHelper {
    pub fn new() -> Self {
        FlowbyHelper
    }
}

impl Default for FlowbyHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for FlowbyHelper {}

impl Completer for FlowbyHelper {
    type Candidate = String;
}

impl Hinter for FlowbyHelper {
    type Hint = String;
}

impl Validator for FlowbyHelper {}

impl Highlighter for FlowbyHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut out = String::with_capacity(line.len());
        let mut chars = line.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            if ch == '#' {
                out.push_str(COLOR_COMMENT);
                out.push_str(&line[idx..]);
                out.push_str(COLOR_RESET);
                break;
            }

            if ch == '"' || ch == '\'' {
                out.push_str(COLOR_STRING);
                out.push(ch);
                for (_, inner) in chars.by_ref() {
                    out.push(inner);
                    if inner == ch {
                        break;
                    }
                }
                out.push_str(COLOR_RESET);
                continue;
            }

            if ch.is_ascii_digit() {
                out.push_str(COLOR_NUMBER);
                out.push(ch);
                while let Some((_, next)) = chars.peek() {
                    if next.is_ascii_digit() || *next == '.' {
                        out.push(*next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(COLOR_RESET);
                continue;
            }

            if ch.is_alphabetic() || ch == '_' {
                let mut word = String::new();
                word.push(ch);
                while let Some((_, next)) = chars.peek() {
                    if next.is_alphanumeric() || *next == '_' {
                        word.push(*next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ACTION_WORDS.contains(&word.as_str()) {
                    out.push_str(COLOR_ACTION);
                    out.push_str(&word);
                    out.push_str(COLOR_RESET);
                } else if keyword_kind(&word).is_some() {
                    out.push_str(COLOR_KEYWORD);
                    out.push_str(&word);
                    out.push_str(COLOR_RESET);
                } else {
                    out.push_str(&word);
                }
                continue;
            }

            out.push(ch);
        }

        Cow::Owned(out)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_colored() {
        let h = FlowbyHelper::new();
        let out = h.highlight("let x = 1", 0);
        assert!(out.contains(COLOR_KEYWORD));
        assert!(out.contains(COLOR_NUMBER));
    }

    #[test]
    fn test_actions_colored() {
        let h = FlowbyHelper::new();
        let out = h.highlight("navigate to \"https://x.test\"", 0);
        assert!(out.contains(COLOR_ACTION));
        assert!(out.contains(COLOR_STRING));
    }

    #[test]
    fn test_comment_colored_to_eol() {
        let h = FlowbyHelper::new();
        let out = h.highlight("let x = 1 # note", 0);
        assert!(out.contains(COLOR_COMMENT));
    }

    #[test]
    fn test_plain_identifiers_untouched() {
        let h = FlowbyHelper::new();
        let out = h.highlight("counter", 0);
        assert_eq!(out, "counter");
    }
}
