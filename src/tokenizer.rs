//! Tokenizer for the object-graph language
//!
//! Splits source text into identifiers, quoted strings, numbers and
//! punctuation. Whitespace and `#` comments (to end of line) are skipped.
//! Number tokens are deliberately loose (`123b`, `0xqb`, `+4`): the value
//! coder decides whether the text is acceptable for the target field type.

use std::fmt;
use std::path::{Path, PathBuf};

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while},
    character::complete::{
        alpha1, alphanumeric1, char, multispace1, none_of, not_line_ending, one_of,
    },
    combinator::{recognize, value},
    multi::many0_count,
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::error::{ParseError, Result, SourceLocation};

/// Characters that form single-character punctuation tokens
pub const PUNCTUATION: &str = "{}[]:,<>;$";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// Quoted string; the token text holds the unescaped contents
    QuotedString,
    Number,
    Punct(char),
    /// A character no other token starts with; rejected by the parser
    Unknown,
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("EOF"),
            TokenKind::QuotedString => write!(f, "\"{}\"", self.text),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

// ============================================================================
// Token grammar
// ============================================================================

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(preceded(char('#'), not_line_ending))(input)
}

fn trivia(input: &str) -> IResult<&str, usize> {
    many0_count(alt((multispace1, comment)))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(one_of("0123456789+-."), take_while(is_number_char)))(input)
}

fn punctuation(input: &str) -> IResult<&str, char> {
    one_of(PUNCTUATION)(input)
}

fn escape(input: &str) -> IResult<&str, char> {
    alt((
        value('\u{07}', char('a')),
        value('\u{08}', char('b')),
        value('\u{0C}', char('f')),
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\u{0B}', char('v')),
        value('\0', char('0')),
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
    ))(input)
}

/// Quoted string with escapes resolved. `escaped_transform` rejects empty
/// contents, so `""` is matched on its own.
fn quoted_string(input: &str) -> IResult<&str, String> {
    alt((
        value(String::new(), tag("\"\"")),
        delimited(
            char('"'),
            escaped_transform(none_of("\"\\"), '\\', escape),
            char('"'),
        ),
    ))(input)
}

/// Names a failed quoted string by where the lexer stopped: on the
/// character after a backslash for a bad escape, otherwise at end of input.
fn quoted_string_failure(err: nom::Err<nom::error::Error<&str>>) -> String {
    let stopped = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
        nom::Err::Incomplete(_) => "",
    };
    match stopped.chars().next() {
        Some(c) if stopped != "\\" => format!("Invalid escape sequence '\\{c}'"),
        _ => "Found EOF inside quoted string".to_string(),
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

/// Lexer over one in-memory buffer
///
/// Restartable only by constructing a new tokenizer over the same text.
pub struct Tokenizer {
    source: PathBuf,
    text: String,
    pos: usize,
    line: u32,
    column: u32,
}

impl Tokenizer {
    pub fn new(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.source.clone(), self.line, self.column)
    }

    fn advance(&mut self, len: usize) {
        let end = self.pos + len;
        for c in self.text[self.pos..end].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = end;
    }

    /// Returns the next token; `Eof` is returned repeatedly at end of input.
    pub fn next_token(&mut self) -> Result<Token> {
        let rest = &self.text[self.pos..];
        let skipped = match trivia(rest) {
            Ok((after, _)) => rest.len() - after.len(),
            Err(_) => 0,
        };
        self.advance(skipped);

        let (line, column) = (self.line, self.column);
        let rest = &self.text[self.pos..];
        let Some(first) = rest.chars().next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line,
                column,
            });
        };

        let (kind, text, len) = if first == '"' {
            let (after, value) = quoted_string(rest).map_err(|e| {
                ParseError::lexical(quoted_string_failure(e)).at(self.location())
            })?;
            (TokenKind::QuotedString, value, rest.len() - after.len())
        } else if let Ok((_, word)) = identifier(rest) {
            (TokenKind::Identifier, word.to_string(), word.len())
        } else if let Ok((_, digits)) = number(rest) {
            (TokenKind::Number, digits.to_string(), digits.len())
        } else if let Ok((_, c)) = punctuation(rest) {
            (TokenKind::Punct(c), c.to_string(), c.len_utf8())
        } else {
            (TokenKind::Unknown, first.to_string(), first.len_utf8())
        };

        self.advance(len);
        Ok(Token {
            kind,
            text,
            line,
            column,
        })
    }
}

/// Tokenizes a whole buffer, stopping at (and excluding) end of input.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(crate::error::STRING_SOURCE, text);
    let mut tokens = Vec::new();
    loop {
        let token = tokenizer.next_token()?;
        if token.is_eof() {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}
