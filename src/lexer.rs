//! Tokenization for command lines.
//!
//! Tokens are classified substrings of a single line: words, quoted spans,
//! and the separators that bound command segments. Every token carries the
//! byte span it occupies in the source line so callers can splice corrected
//! text back in place.

use std::ops::Range;

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_while1},
    character::complete::{char, none_of, one_of},
    combinator::{map, opt, value},
    sequence::delimited,
    IResult,
};
use thiserror::Error;

/// Separators that bound command segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    And,  // &&
    Or,   // ||
    Pipe, // |
    Semi, // ;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A word (command name, argument, flag)
    Word,
    /// A single-quoted span
    SingleQuoted,
    /// A double-quoted span
    DoubleQuoted,
    /// A segment separator
    Operator(Separator),
}

/// A classified substring of one command line.
///
/// `text` holds the unwrapped content for quoted tokens; `span` always
/// covers the full source region, quotes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, TokenKind::Operator(_))
    }
}

#[derive(Error, Debug)]
pub enum LexError {
    #[error("Unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("Unterminated string")]
    UnterminatedString,
}

fn plain(text: &str, kind: TokenKind) -> Token {
    Token {
        text: text.to_string(),
        kind,
        span: 0..0,
    }
}

/// Parse a double-quoted string
fn double_quoted_string(input: &str) -> IResult<&str, Token> {
    let (input, content) = delimited(
        char('"'),
        map(
            opt(escaped(none_of("\"\\"), '\\', one_of("\"\\nrt$`"))),
            |o| o.unwrap_or(""),
        ),
        char('"'),
    )(input)?;
    Ok((input, plain(content, TokenKind::DoubleQuoted)))
}

/// Parse a single-quoted string
fn single_quoted_string(input: &str) -> IResult<&str, Token> {
    let (input, content) = delimited(
        char('\''),
        map(opt(take_while1(|c| c != '\'')), |o| o.unwrap_or("")),
        char('\''),
    )(input)?;
    Ok((input, plain(content, TokenKind::SingleQuoted)))
}

/// Parse && operator
fn and_op(input: &str) -> IResult<&str, Token> {
    value(plain("&&", TokenKind::Operator(Separator::And)), tag("&&"))(input)
}

/// Parse || operator
fn or_op(input: &str) -> IResult<&str, Token> {
    value(plain("||", TokenKind::Operator(Separator::Or)), tag("||"))(input)
}

/// Parse | operator
fn pipe_op(input: &str) -> IResult<&str, Token> {
    value(plain("|", TokenKind::Operator(Separator::Pipe)), char('|'))(input)
}

/// Parse ; operator
fn semi_op(input: &str) -> IResult<&str, Token> {
    value(plain(";", TokenKind::Operator(Separator::Semi)), char(';'))(input)
}

/// Parse a lone & as a word (background marker, not a segment separator)
fn ampersand(input: &str) -> IResult<&str, Token> {
    value(plain("&", TokenKind::Word), char('&'))(input)
}

/// Parse a word (command name or argument)
fn word(input: &str) -> IResult<&str, Token> {
    map(
        take_while1(|c: char| {
            !c.is_whitespace() && c != '|' && c != ';' && c != '&' && c != '"' && c != '\''
        }),
        |s: &str| plain(s, TokenKind::Word),
    )(input)
}

/// Parse any single token
fn token(input: &str) -> IResult<&str, Token> {
    alt((
        // Multi-char operators first
        and_op,
        or_op,
        // Strings
        double_quoted_string,
        single_quoted_string,
        // Single-char operators
        pipe_op,
        semi_op,
        ampersand,
        // Words last
        word,
    ))(input)
}

/// Tokenize a complete line, producing tokens with byte spans.
pub fn lex(line: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = line;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let start = line.len() - rest.len();
        match token(rest) {
            Ok((next, mut tok)) => {
                tok.span = start..(line.len() - next.len());
                tokens.push(tok);
                rest = next;
            }
            Err(_) => {
                // Nothing matched. An opening quote with no close is the
                // usual culprit.
                let c = rest.chars().next().unwrap();
                if c == '"' || c == '\'' {
                    return Err(LexError::UnterminatedString);
                }
                return Err(LexError::UnexpectedChar(c));
            }
        }
    }

    Ok(tokens)
}
