//! Whitespace tokenizer for the text model formats.
//!
//! `#` starts a comment running to the end of the line. Line numbers are kept
//! for error messages.

use crate::error::{ConfigError, Error, FormatError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug)]
struct Token {
    line: usize,
    text: String,
}

/// Sequential reader over the tokens of a text model file.
#[derive(Debug)]
pub struct TokenReader {
    path: PathBuf,
    tokens: Vec<Token>,
    next: usize,
}

impl TokenReader {
    /// Read and tokenize `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::from(ConfigError::ResourceNotFound {
                path: path.to_path_buf(),
            }),
            _ => FormatError::io(path, e).into(),
        })?;
        Ok(Self::new(path, &text))
    }

    /// Tokenize `text`; `path` is only used in error messages.
    pub fn new(path: impl Into<PathBuf>, text: &str) -> Self {
        let tokens = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| {
                let content = line.split('#').next().unwrap_or_default();
                content.split_whitespace().map(move |word| Token {
                    line: i + 1,
                    text: word.to_string(),
                })
            })
            .collect();

        Self {
            path: path.into(),
            tokens,
            next: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line of the most recently read token.
    pub fn line(&self) -> usize {
        self.next
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.line)
    }

    /// Whether every token has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.tokens.len()
    }

    fn next_token(&mut self) -> Result<&Token> {
        let token = self.tokens.get(self.next).ok_or_else(|| FormatError::Truncated {
            path: self.path.clone(),
        })?;
        self.next += 1;
        Ok(token)
    }

    pub fn get_string(&mut self) -> Result<String> {
        Ok(self.next_token()?.text.clone())
    }

    /// Consume the next token, which must equal `expected`.
    pub fn expect_string(&mut self, expected: &str) -> Result<()> {
        let token = self.next_token()?;
        if token.text == expected {
            return Ok(());
        }
        let (line, found) = (token.line, token.text.clone());
        Err(FormatError::UnexpectedToken {
            path: self.path.clone(),
            line,
            expected: expected.to_string(),
            found,
        }
        .into())
    }

    fn parse<T: FromStr>(&mut self, label: &'static str) -> Result<T> {
        let token = self.next_token()?;
        if let Ok(value) = token.text.parse() {
            return Ok(value);
        }
        let (line, found) = (token.line, token.text.clone());
        Err(FormatError::InvalidNumber {
            path: self.path.clone(),
            line,
            label,
            found,
        }
        .into())
    }

    pub fn get_int(&mut self, label: &'static str) -> Result<i64> {
        self.parse(label)
    }

    /// Read a non-negative integer.
    pub fn get_count(&mut self, label: &'static str) -> Result<usize> {
        let value = self.get_int(label)?;
        usize::try_from(value).map_err(|_| {
            FormatError::NegativeCount {
                path: self.path.clone(),
                label,
                value,
            }
            .into()
        })
    }

    /// Read an integer that must equal `expected`.
    pub fn expect_int(&mut self, label: &'static str, expected: i64) -> Result<()> {
        let value = self.get_int(label)?;
        if value == expected {
            return Ok(());
        }
        Err(FormatError::UnexpectedToken {
            path: self.path.clone(),
            line: self.line(),
            expected: expected.to_string(),
            found: value.to_string(),
        }
        .into())
    }

    pub fn get_float(&mut self, label: &'static str) -> Result<f32> {
        self.parse(label)
    }
}
