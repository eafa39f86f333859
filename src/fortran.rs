use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ParseError;

/// Parses a real number as written by Fortran list-directed or `E` formats.
///
/// Accepts `D` exponents and the exponent without its letter that Fortran
/// prints for three-digit exponents (`0.1234-100`).
pub(crate) fn parse_real(token: &str) -> Option<f64> {
    let token = token.trim();
    if let Ok(value) = token.parse::<f64>() {
        return Some(value);
    }
    let token = token.replace(['D', 'd'], "E");
    if let Ok(value) = token.parse::<f64>() {
        return Some(value);
    }
    let bytes = token.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'-' | b'+') && bytes[i - 1].is_ascii_digit())?;
    let (mantissa, exponent) = token.split_at(split);
    format!("{mantissa}E{exponent}").parse().ok()
}

pub(crate) fn parse_flag(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "t" | ".true." | "true" => Some(true),
        "f" | ".false." | "false" => Some(false),
        _ => None,
    }
}

/// A text file held as lines, with line-numbered error reporting.
pub(crate) struct TextFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl TextFile {
    pub(crate) fn read(path: &Path) -> Result<Self, ParseError> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ParseError::Missing {
                path: path.to_path_buf(),
            },
            _ => ParseError::Malformed {
                path: path.to_path_buf(),
                line: 0,
                message: e.to_string(),
            },
        })?;
        Ok(TextFile {
            path: path.to_path_buf(),
            lines: text.lines().map(|l| l.trim_end().to_string()).collect(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn line(&self, index: usize) -> Result<&str, ParseError> {
        self.lines
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.truncated(format!("expected a line {}", index + 1)))
    }

    pub(crate) fn tokens(&self, index: usize) -> Result<Vec<&str>, ParseError> {
        Ok(self.line(index)?.split_whitespace().collect())
    }

    /// Index of the first line at or after `from` whose first token is `label`.
    pub(crate) fn find(&self, from: usize, label: &str) -> Option<usize> {
        (from..self.lines.len()).find(|&i| {
            self.lines[i]
                .split_whitespace()
                .next()
                .is_some_and(|first| first.starts_with(label))
        })
    }

    pub(crate) fn section(&self, from: usize, label: &str) -> Result<usize, ParseError> {
        self.find(from, label)
            .ok_or_else(|| self.malformed(self.lines.len(), format!("missing '{label}' section")))
    }

    pub(crate) fn real(&self, index: usize, column: usize) -> Result<f64, ParseError> {
        let token = self.token(index, column)?;
        parse_real(token)
            .ok_or_else(|| self.malformed(index, format!("'{token}' is not a number")))
    }

    pub(crate) fn integer(&self, index: usize, column: usize) -> Result<i64, ParseError> {
        let token = self.token(index, column)?;
        token
            .parse()
            .map_err(|_| self.malformed(index, format!("'{token}' is not an integer")))
    }

    pub(crate) fn flag(&self, index: usize, column: usize) -> Result<bool, ParseError> {
        let token = self.token(index, column)?;
        parse_flag(token).ok_or_else(|| self.malformed(index, format!("'{token}' is not a t/f flag")))
    }

    fn token(&self, index: usize, column: usize) -> Result<&str, ParseError> {
        let line = self.line(index)?;
        line.split_whitespace()
            .nth(column)
            .ok_or_else(|| self.malformed(index, format!("expected at least {} values", column + 1)))
    }

    pub(crate) fn malformed(&self, index: usize, message: impl Into<String>) -> ParseError {
        ParseError::Malformed {
            path: self.path.clone(),
            line: index + 1,
            message: message.into(),
        }
    }

    pub(crate) fn truncated(&self, reason: impl Into<String>) -> ParseError {
        ParseError::Truncated {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}
