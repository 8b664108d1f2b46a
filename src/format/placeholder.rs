//! Masking of marker-delimited raw spans.
//!
//! Build tools substitute tokens such as `@project.version@` at packaging
//! time. Left in place, the marker confuses the structured parser (`@` is a
//! reserved indicator in YAML), so each span is replaced by its bare inner text
//! before parsing and the original form is restored when a value is read.

use std::collections::HashMap;

/// Inner text → original marker-delimited text, for one parsed source.
#[derive(Debug, Clone)]
pub struct PlaceholderTable {
    marker: char,
    spans: HashMap<String, String>,
}

impl PlaceholderTable {
    pub fn new(marker: char) -> Self {
        Self {
            marker,
            spans: HashMap::new(),
        }
    }

    /// Replaces every `<marker>inner<marker>` span in `text` with `inner`,
    /// recording the original form.
    ///
    /// Spans never cross a line break and are never empty; a marker with no
    /// usable partner is left untouched.
    pub fn mask(&mut self, text: &str) -> String {
        let marker = self.marker;
        let width = marker.len_utf8();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find(marker) {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + width..];

            let Some(close) = after_open.find(marker) else {
                out.push_str(&rest[open..]);
                return out;
            };

            let inner = &after_open[..close];
            if inner.contains('\n') {
                // Unpaired on this line; the next marker may still open a span.
                out.push(marker);
                rest = after_open;
                continue;
            }
            if inner.is_empty() {
                out.push(marker);
                out.push(marker);
                rest = &after_open[close + width..];
                continue;
            }

            let original = format!("{marker}{inner}{marker}");
            self.spans.insert(inner.to_string(), original);
            out.push_str(inner);
            rest = &after_open[close + width..];
        }

        out.push_str(rest);
        out
    }

    /// Returns the original marker-delimited form if `value` is a recorded
    /// inner text, otherwise `value` itself.
    pub fn resolve<'a>(&'a self, value: &'a str) -> &'a str {
        self.spans.get(value).map(String::as_str).unwrap_or(value)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
