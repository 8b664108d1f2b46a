use serde_yaml::Value;

use super::{ConfigParser, FlatConfig, ParseError};

/// Parses YAML and flattens it into dotted keys.
///
/// Mapping keys are joined with `.`, sequence elements get an `[index]`
/// segment. Nulls and empty collections produce no entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredParser;

impl ConfigParser for StructuredParser {
    fn parse(&self, text: &str) -> Result<FlatConfig, ParseError> {
        let mut out = FlatConfig::new();
        if is_blank_document(text) {
            return Ok(out);
        }
        let mut document: Value = serde_yaml::from_str(text)?;
        // `<<: *anchor` keys are folded into their mapping.
        document.apply_merge()?;
        match &document {
            Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_) => {
                flatten("", &document, &mut out);
            }
            // An empty document or a bare scalar carries no keys.
            _ => {}
        }
        Ok(out)
    }
}

fn is_blank_document(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

fn flatten(prefix: &str, value: &Value, out: &mut FlatConfig) {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                let Some(segment) = key_segment(key) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    segment
                } else {
                    format!("{prefix}.{segment}")
                };
                flatten(&path, child, out);
            }
        }
        Value::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{index}]"), item, out);
            }
        }
        Value::Tagged(tagged) => flatten(prefix, &tagged.value, out),
        Value::Null => {}
        scalar => {
            if let Some(text) = scalar_text(scalar) {
                out.insert(prefix, text);
            }
        }
    }
}

fn key_segment(key: &Value) -> Option<String> {
    match key {
        Value::Tagged(tagged) => key_segment(&tagged.value),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
