//! Command detection inside raw lines.
//!
//! `detect` answers one question: does this line invoke one of the given
//! command words, and if so, where? Matching is heuristic and
//! detection-oriented. Three layers run in escalating order of cost:
//!
//! 1. Quick reject - substring containment plus cheap shape checks.
//! 2. Fast scan - one left-to-right pass tracking quote state, command
//!    position, and nested substitutions.
//! 3. Token fallback - full tokenization of the line, matching tokens
//!    verbatim. Only reached when the fast scan finds nothing.
//!
//! A pattern word fully inside a quoted string never triggers detection,
//! and a bare `NAME=value` assignment whose value merely contains the word
//! is excluded.

use std::ops::Range;

use crate::lexer::lex;

/// Where a detected command sits relative to the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Top-level invocation within a segment
    Direct,
    /// Inside a `$( ... )` substitution
    ParenSubstitution,
    /// Inside a backtick substitution
    BacktickSubstitution,
    /// Found by the token fallback layer
    Tokenized,
}

/// One detected invocation of a pattern word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCommand {
    /// The command segment text, starting at the pattern word
    pub text: String,
    pub kind: ContextKind,
    /// The pattern word that matched
    pub pattern: String,
    /// Byte span of `text` within the original line
    pub span: Range<usize>,
}

/// Commands whose arguments are data, not invocations. A pattern word
/// appearing in them is being searched for or printed, not run.
const READ_COMMANDS: &[&str] = &[
    "grep", "egrep", "fgrep", "rg", "find", "cat", "less", "more", "head", "tail", "man", "which",
    "type", "echo", "printf",
];

/// Detect invocations of `patterns` in `line`.
///
/// Returns `None` when nothing is detected; the caller can cache that
/// answer as an explicit sentinel.
pub fn detect(line: &str, patterns: &[String]) -> Option<Vec<DetectedCommand>> {
    if patterns.is_empty() || quick_reject(line, patterns) {
        return None;
    }
    let found = scan(line, patterns);
    if !found.is_empty() {
        return Some(found);
    }
    let found = token_fallback(line, patterns);
    if found.is_empty() {
        None
    } else {
        Some(found)
    }
}

/// Layer 1: cheap rejections before any scanning.
fn quick_reject(line: &str, patterns: &[String]) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    if !patterns
        .iter()
        .any(|p| !p.is_empty() && trimmed.contains(p.as_str()))
    {
        return true;
    }
    if let Some(cmd) = first_command_word(trimmed) {
        if READ_COMMANDS.contains(&cmd) {
            return true;
        }
    }
    is_bare_assignment(trimmed)
}

/// First word of the line that is not a `NAME=value` assignment prefix.
fn first_command_word(line: &str) -> Option<&str> {
    line.split_whitespace().find(|w| !is_assignment_word(w))
}

/// `NAME=value` with a valid variable name before the `=`.
fn is_assignment_word(word: &str) -> bool {
    match word.find('=') {
        Some(eq) if eq > 0 => {
            let name = &word[..eq];
            let mut chars = name.chars();
            let first = chars.next().unwrap();
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// A line that is only variable assignments, with no substitution or
/// separator that could introduce a command position.
fn is_bare_assignment(line: &str) -> bool {
    if line.contains("$(") || line.contains('`') {
        return false;
    }
    if line.contains(';') || line.contains('|') || line.contains('&') {
        return false;
    }
    line.split_whitespace().all(is_assignment_word)
}

fn is_word_break(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '\'' | '"' | '\\' | '$' | '`' | '|' | ';' | '&' | '(' | ')'
        )
}

/// Layer 2: one left-to-right pass with quote state.
///
/// Spans in the result are byte offsets into `line`; recursion into
/// substitution interiors offsets them back to the caller's coordinates.
fn scan(line: &str, patterns: &[String]) -> Vec<DetectedCommand> {
    let cs: Vec<(usize, char)> = line.char_indices().collect();
    let n = cs.len();
    let byte_at = |i: usize| -> usize {
        if i < n {
            cs[i].0
        } else {
            line.len()
        }
    };

    let mut out = Vec::new();
    let mut i = 0;
    // True when the next word would be run as a command
    let mut at_cmd = true;

    while i < n {
        let c = cs[i].1;
        match c {
            '\'' => {
                i += 1;
                while i < n && cs[i].1 != '\'' {
                    i += 1;
                }
                i += 1;
                at_cmd = false;
            }
            '"' => {
                i += 1;
                while i < n && cs[i].1 != '"' {
                    if cs[i].1 == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
                at_cmd = false;
            }
            '\\' => {
                i += 2;
            }
            '$' if i + 1 < n && cs[i + 1].1 == '(' => {
                match balanced_close(&cs, i + 2) {
                    Some(close) => {
                        let off = byte_at(i + 2);
                        let inner = &line[off..byte_at(close)];
                        let mut found = scan(inner, patterns);
                        for f in &mut found {
                            if f.kind == ContextKind::Direct {
                                f.kind = ContextKind::ParenSubstitution;
                            }
                            f.span = (f.span.start + off)..(f.span.end + off);
                        }
                        out.extend(found);
                        // Resume right after the closing paren
                        i = close + 1;
                    }
                    None => i += 2,
                }
                at_cmd = false;
            }
            '`' => {
                let mut j = i + 1;
                while j < n && cs[j].1 != '`' {
                    if cs[j].1 == '\\' {
                        j += 1;
                    }
                    j += 1;
                }
                if j < n {
                    let off = byte_at(i + 1);
                    let inner = &line[off..byte_at(j)];
                    let mut found = scan(inner, patterns);
                    for f in &mut found {
                        if f.kind == ContextKind::Direct {
                            f.kind = ContextKind::BacktickSubstitution;
                        }
                        f.span = (f.span.start + off)..(f.span.end + off);
                    }
                    out.extend(found);
                    i = j + 1;
                    at_cmd = false;
                } else {
                    i += 1;
                }
            }
            '|' => {
                i += if i + 1 < n && cs[i + 1].1 == '|' { 2 } else { 1 };
                at_cmd = true;
            }
            ';' => {
                i += 1;
                at_cmd = true;
            }
            '&' => {
                i += if i + 1 < n && cs[i + 1].1 == '&' { 2 } else { 1 };
                at_cmd = true;
            }
            '(' => {
                i += 1;
                at_cmd = true;
            }
            ')' => {
                i += 1;
            }
            c if c.is_whitespace() => {
                i += 1;
            }
            _ => {
                let start = i;
                while i < n && !is_word_break(cs[i].1) {
                    i += 1;
                }
                if i == start {
                    // A break character with no arm of its own (a lone `$`)
                    i += 1;
                    continue;
                }
                let word: String = cs[start..i].iter().map(|p| p.1).collect();
                let followed_ok = i >= n || cs[i].1.is_whitespace();
                if at_cmd {
                    if followed_ok && patterns.iter().any(|p| *p == word) {
                        let seg_end = find_segment_end(&cs, i);
                        let text = line[byte_at(start)..byte_at(seg_end)].trim_end();
                        out.push(DetectedCommand {
                            text: text.to_string(),
                            kind: ContextKind::Direct,
                            pattern: word,
                            span: byte_at(start)..byte_at(start) + text.len(),
                        });
                        at_cmd = false;
                    } else if !is_assignment_word(&word) {
                        // Leading assignments keep the command position open
                        at_cmd = false;
                    }
                }
            }
        }
    }

    out
}

/// Position of the next unquoted, top-level segment separator at or after
/// `from`, or the end of input.
fn find_segment_end(cs: &[(usize, char)], from: usize) -> usize {
    let n = cs.len();
    let mut j = from;
    let mut depth = 0usize;
    while j < n {
        match cs[j].1 {
            '\'' => {
                j += 1;
                while j < n && cs[j].1 != '\'' {
                    j += 1;
                }
                j += 1;
            }
            '"' => {
                j += 1;
                while j < n && cs[j].1 != '"' {
                    if cs[j].1 == '\\' {
                        j += 1;
                    }
                    j += 1;
                }
                j += 1;
            }
            '\\' => j += 2,
            '(' => {
                depth += 1;
                j += 1;
            }
            ')' => {
                if depth == 0 {
                    return j;
                }
                depth -= 1;
                j += 1;
            }
            '|' | ';' | '&' if depth == 0 => return j,
            _ => j += 1,
        }
    }
    n
}

/// Closing paren matching an opening `$(`, quote-aware; `from` points just
/// past the opening paren.
fn balanced_close(cs: &[(usize, char)], from: usize) -> Option<usize> {
    let n = cs.len();
    let mut j = from;
    let mut depth = 1usize;
    while j < n {
        match cs[j].1 {
            '\'' => {
                j += 1;
                while j < n && cs[j].1 != '\'' {
                    j += 1;
                }
                j += 1;
            }
            '"' => {
                j += 1;
                while j < n && cs[j].1 != '"' {
                    if cs[j].1 == '\\' {
                        j += 1;
                    }
                    j += 1;
                }
                j += 1;
            }
            '\\' => j += 2,
            '(' => {
                depth += 1;
                j += 1;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

/// Layer 3: naive tokenization of the whole line. Any word token exactly
/// equal to a pattern yields a context spanning from that token to the end
/// of the line.
fn token_fallback(line: &str, patterns: &[String]) -> Vec<DetectedCommand> {
    let tokens = match lex(line) {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::new();
    for tok in &tokens {
        if !tok.is_word() {
            continue;
        }
        if let Some(p) = patterns.iter().find(|p| **p == tok.text) {
            let text = line[tok.span.start..].trim_end();
            out.push(DetectedCommand {
                text: text.to_string(),
                kind: ContextKind::Tokenized,
                pattern: p.clone(),
                span: tok.span.start..tok.span.start + text.len(),
            });
        }
    }
    out
}
