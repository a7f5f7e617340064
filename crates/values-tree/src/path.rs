//! Dotted value paths: `global.spamcheck.enabled`, `hosts[0].name`.
//!
//! A backslash escapes the next character, so `annotations.example\.com/role`
//! addresses the key `example.com/role`.

use std::fmt;

use crate::error::TreeError;

/// One step of a value path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Parse a dotted path into segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, TreeError> {
    let invalid = |reason: &str| TreeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("path is empty"));
    }

    let mut segments = Vec::new();
    let mut key = String::new();
    let mut after_index = false;
    let mut after_dot = false;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                } else if !after_index {
                    return Err(invalid("empty key"));
                }
                after_index = false;
                after_dot = true;
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        Some(_) => return Err(invalid("index must be a non-negative integer")),
                        None => return Err(invalid("unterminated index")),
                    }
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                after_index = true;
                after_dot = false;
            }
            other => {
                if after_index {
                    return Err(invalid("expected '.' or '[' after index"));
                }
                let literal = if other == '\\' {
                    chars.next().ok_or_else(|| invalid("trailing escape"))?
                } else {
                    other
                };
                key.push(literal);
                after_dot = false;
            }
        }
    }

    if !key.is_empty() {
        segments.push(PathSegment::Key(key));
    } else if after_dot {
        return Err(invalid("empty key"));
    }

    Ok(segments)
}

/// Render segments back into dotted form, escaping dots inside keys.
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                for c in key.chars() {
                    if matches!(c, '.' | '[' | '\\') {
                        out.push('\\');
                    }
                    out.push(c);
                }
            }
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}
