//! Error types for the object-graph language
//!
//! Every failure in tokenizing, registering, parsing or decoding surfaces as a
//! single [`ParseError`] carrying an [`ErrorKind`] discriminant, a
//! human-readable message and, when known, the source location.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name used in locations and dependency edges for in-memory input.
pub const STRING_SOURCE: &str = "<string>";

/// Category of a parse failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed token (bad string escape, unterminated literal)
    Lexical,
    /// Wrong token where another was structurally required
    Syntax,
    UnknownType,
    DuplicateType,
    UnknownField,
    /// Literal does not match the field's declared value type
    ValueConversion,
    /// Reference to an undefined or not-yet-defined name
    ReferenceResolution,
    /// Include target cannot be opened or is otherwise invalid
    IncludeIo,
    /// Field list rejected at registration time
    InvalidSpec,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::UnknownType => "unknown type",
            ErrorKind::DuplicateType => "duplicate type",
            ErrorKind::UnknownField => "unknown field",
            ErrorKind::ValueConversion => "value conversion error",
            ErrorKind::ReferenceResolution => "reference resolution error",
            ErrorKind::IncludeIo => "include I/O error",
            ErrorKind::InvalidSpec => "invalid field spec",
        };
        f.write_str(name)
    }
}

/// Position of a token in a source file (1-based line and column)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

fn location_prefix(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!("{loc}: "),
        None => String::new(),
    }
}

/// The one error type returned by every fallible operation in this crate
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}Parse error: {message}", location_prefix(.location))]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn lexical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lexical, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueConversion, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceResolution, message)
    }

    pub fn include(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncludeIo, message)
    }

    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSpec, message)
    }

    /// Attach a location unless one is already recorded.
    ///
    /// Errors from nested includes keep the innermost location, which is the
    /// one that points at the offending text.
    pub fn at(mut self, location: SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Path of the file the error was found in, if known
    pub fn path(&self) -> Option<&Path> {
        self.location.as_ref().map(|loc| loc.path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_location() {
        let err = ParseError::syntax("Expected '{', got EOF");
        assert_eq!(err.to_string(), "Parse error: Expected '{', got EOF");
    }

    #[test]
    fn test_display_with_location() {
        let err = ParseError::conversion("Invalid integer value")
            .at(SourceLocation::new("scene/main.og", 12, 4));
        assert_eq!(
            err.to_string(),
            "scene/main.og:12: Parse error: Invalid integer value"
        );
        assert!(err.is(ErrorKind::ValueConversion));
    }

    #[test]
    fn test_innermost_location_wins() {
        let err = ParseError::new(ErrorKind::UnknownField, "Unknown field 'x'")
            .at(SourceLocation::new("inner.og", 1, 10))
            .at(SourceLocation::new("outer.og", 7, 2));
        assert_eq!(err.path(), Some(Path::new("inner.og")));
    }
}
