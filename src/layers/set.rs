//! `--set path=value` expressions.

use values_tree::{parse_path, ConfigTree, PathSegment, Scalar};

use super::LayerError;

/// Largest sequence index accepted in a set path, as helm enforces
pub const MAX_INDEX: usize = 65536;

/// How the right-hand side of a set expression is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// `true`, `false`, `null` and integers become scalars of that type
    Typed,
    /// The value is always a string
    String,
}

/// Parse `path=value` into a tree holding `value` at `path`.
pub fn parse_set(expression: &str, mode: SetMode) -> Result<ConfigTree, LayerError> {
    let invalid = |reason: String| LayerError::InvalidSet {
        expression: expression.to_string(),
        reason,
    };

    let (path, raw) = expression
        .split_once('=')
        .ok_or_else(|| invalid("expected path=value".to_string()))?;

    let segments = parse_path(path.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(segments.first(), Some(PathSegment::Key(_))) {
        return Err(invalid("path must start with a key".to_string()));
    }
    if let Some(index) = segments.iter().find_map(|segment| match segment {
        PathSegment::Index(i) if *i > MAX_INDEX => Some(*i),
        _ => None,
    }) {
        return Err(invalid(format!("index {} exceeds {}", index, MAX_INDEX)));
    }

    let leaf = match mode {
        SetMode::Typed => typed_value(raw),
        SetMode::String => ConfigTree::from(raw),
    };

    Ok(ConfigTree::from_path(&segments, leaf))
}

fn typed_value(raw: &str) -> ConfigTree {
    match raw {
        "true" => return ConfigTree::from(true),
        "false" => return ConfigTree::from(false),
        "null" => return ConfigTree::Scalar(Scalar::Null),
        _ => {}
    }

    // leading zeros stay strings ("007")
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.len() > 1 && digits.starts_with('0') {
        return ConfigTree::from(raw);
    }

    match raw.parse::<i64>() {
        Ok(n) => ConfigTree::from(n),
        Err(_) => ConfigTree::from(raw),
    }
}
