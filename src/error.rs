//! Error types for the tabx pipeline.

use std::fmt;

/// Position information for error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    /// Index of the offending command token (0-based).
    pub token: Option<usize>,
    /// Line number in the input (1-based).
    pub input_line: Option<usize>,
}

impl Position {
    /// Create a position pointing at a command token.
    pub fn at_token(index: usize) -> Self {
        Self {
            token: Some(index),
            input_line: None,
        }
    }

    /// Create a position with input line.
    pub fn at_input(line: usize) -> Self {
        Self {
            token: None,
            input_line: Some(line),
        }
    }
}

/// Errors that can occur while parsing tokens or running the pipeline.
#[derive(Debug)]
pub struct Error {
    /// The error message.
    pub message: String,
    /// Position information for the error.
    pub position: Position,
}

impl Error {
    /// Create a runtime error with just a message.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: Position::default(),
        }
    }

    /// Create an error for a malformed command token.
    pub fn at_token(message: impl Into<String>, index: usize) -> Self {
        Self {
            message: message.into(),
            position: Position::at_token(index),
        }
    }

    /// Create an error at an input line.
    pub fn at_input(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            position: Position::at_input(line),
        }
    }

    /// Add a token index to an existing error.
    pub fn with_token(mut self, index: usize) -> Self {
        self.position.token = Some(index);
        self
    }

    /// Add input line to an existing error.
    pub fn with_input_line(mut self, line: usize) -> Self {
        self.position.input_line = Some(line);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        match (self.position.token, self.position.input_line) {
            (Some(token), Some(line)) => {
                write!(f, " (at token {}, input line {})", token, line)
            }
            (Some(token), None) => write!(f, " (at token {})", token),
            (None, Some(line)) => write!(f, " (at input line {})", line),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::runtime(format!("i/o error: {}", err))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::runtime(format!("csv error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::runtime(format!("json error: {}", err))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
