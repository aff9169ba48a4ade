//! Token source for one document: the file tokenizer plus a stack of
//! constant substitutions spliced in front of it

use std::path::{Path, PathBuf};

use crate::error::{Result, SourceLocation};
use crate::tokenizer::{Token, TokenKind, Tokenizer};

struct Layer {
    tokenizer: Tokenizer,
    /// Position of the `$NAME` a substitution came from
    pinned: Option<(u32, u32)>,
}

pub(crate) struct TokenSource {
    source_name: PathBuf,
    stack: Vec<Layer>,
    peeked: Option<Token>,
}

impl TokenSource {
    pub(crate) fn new(source_name: PathBuf, text: String) -> Self {
        let tokenizer = Tokenizer::new(source_name.clone(), text);
        Self {
            source_name,
            stack: vec![Layer {
                tokenizer,
                pinned: None,
            }],
            peeked: None,
        }
    }

    pub(crate) fn source_name(&self) -> &Path {
        &self.source_name
    }

    pub(crate) fn location_of(&self, token: &Token) -> SourceLocation {
        SourceLocation::new(self.source_name.clone(), token.line, token.column)
    }

    /// Number of substitutions currently being read
    pub(crate) fn substitution_depth(&self) -> usize {
        self.stack.len() - 1
    }

    fn fetch(&mut self) -> Result<Token> {
        while let Some(top) = self.stack.last_mut() {
            let pinned = top.pinned;
            let mut token = match top.tokenizer.next_token() {
                Ok(token) => token,
                Err(mut e) => {
                    if let Some((line, column)) = pinned {
                        let location = SourceLocation::new(self.source_name.clone(), line, column);
                        e.location = Some(location);
                    }
                    return Err(e);
                }
            };
            if token.is_eof() && self.stack.len() > 1 {
                self.stack.pop();
                continue;
            }
            if let Some((line, column)) = pinned {
                token.line = line;
                token.column = column;
            }
            return Ok(token);
        }
        Ok(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line: 0,
            column: 0,
        })
    }

    pub(crate) fn peek(&mut self) -> Result<&Token> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.fetch()?,
        };
        Ok(self.peeked.insert(token))
    }

    pub(crate) fn next(&mut self) -> Result<Token> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.fetch(),
        }
    }

    /// Splices `text` in front of the remaining input. Every token it
    /// produces, and any lexical error in it, reports the position of the
    /// `$NAME` that produced it.
    pub(crate) fn push_substitution(&mut self, text: &str, line: u32, column: u32) {
        debug_assert!(self.peeked.is_none());
        self.stack.push(Layer {
            tokenizer: Tokenizer::new(self.source_name.clone(), text),
            pinned: Some((line, column)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution_is_read_first() {
        let mut source = TokenSource::new("t".into(), "a b".into());
        assert_eq!(source.next().unwrap().text, "a");
        source.push_substitution("1 2", 1, 3);
        assert_eq!(source.substitution_depth(), 1);
        assert_eq!(source.next().unwrap().text, "1");
        assert_eq!(source.peek().unwrap().text, "2");
        assert_eq!(source.next().unwrap().text, "2");
        assert_eq!(source.next().unwrap().text, "b");
        assert_eq!(source.substitution_depth(), 0);
        assert_eq!(source.next().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_substituted_tokens_keep_dollar_position() {
        let mut source = TokenSource::new("t".into(), "x".into());
        source.push_substitution("1 2\n 3", 4, 9);
        for expected in ["1", "2", "3"] {
            let token = source.next().unwrap();
            assert_eq!(token.text, expected);
            assert_eq!((token.line, token.column), (4, 9));
        }
        let token = source.next().unwrap();
        assert_eq!((token.text.as_str(), token.line, token.column), ("x", 1, 1));
    }

    #[test]
    fn test_lexical_error_in_substitution_points_at_dollar() {
        let mut source = TokenSource::new("t".into(), String::new());
        source.push_substitution("ok \"open", 2, 5);
        assert_eq!(source.next().unwrap().text, "ok");
        let err = source.next().unwrap_err();
        let location = err.location.unwrap();
        assert_eq!((location.line, location.column), (2, 5));
    }
}
