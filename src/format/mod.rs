//! Parsing of configuration files into flat `dotted.key -> value` maps.
//!
//! Two formats are supported, selected once from the file extension:
//! - [`Format::Structured`]: nested YAML documents, flattened depth-first
//!   (`server.port`, `servers[0].host`)
//! - [`Format::Flat`]: `key=value` properties files
//!
//! Both run the text through a [`PlaceholderTable`] before parsing so that
//! `@token@` spans survive the structural parser and come back verbatim.

mod error;
mod flat;
mod placeholder;
mod structured;

pub use error::ParseError;
pub use flat::FlatParser;
pub use placeholder::PlaceholderTable;
pub use structured::StructuredParser;

use std::borrow::Cow;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

/// Dotted key → string value. Iteration is sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatConfig {
    entries: BTreeMap<String, String>,
}

impl FlatConfig {
    pub(crate) const EMPTY: FlatConfig = FlatConfig {
        entries: BTreeMap::new(),
    };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Copies every entry of `other` into `self`; `other` wins on shared keys.
    pub fn extend_from(&mut self, other: &FlatConfig) {
        for (key, value) in other.iter() {
            self.entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for FlatConfig {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Structural parsing of already-masked text.
pub trait ConfigParser {
    fn parse(&self, text: &str) -> Result<FlatConfig, ParseError>;
}

/// The two supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Structured,
    Flat,
}

impl Format {
    /// Detects the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => Some(Self::Structured),
            "properties" => Some(Self::Flat),
            _ => None,
        }
    }

    fn parser(&self) -> &'static dyn ConfigParser {
        match self {
            Self::Structured => &StructuredParser,
            Self::Flat => &FlatParser,
        }
    }

    /// Decodes raw bytes. Structured documents must be UTF-8; flat files fall
    /// back to ISO-8859-1, their historical encoding.
    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, ParseError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match self {
            Self::Structured => Ok(Cow::Borrowed(std::str::from_utf8(bytes)?)),
            Self::Flat => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Cow::Borrowed(text)),
                Err(_) => Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
            },
        }
    }

    /// Masks placeholders and parses `bytes`.
    pub fn parse(&self, bytes: &[u8], marker: char) -> Result<ParsedSource, ParseError> {
        let text = self.decode(bytes)?;
        let mut placeholders = PlaceholderTable::new(marker);
        let masked = placeholders.mask(&text);
        let entries = self.parser().parse(&masked)?;
        Ok(ParsedSource {
            entries,
            placeholders,
        })
    }

    /// Parses `bytes` into a resolved [`FlatConfig`], logging and returning an
    /// empty map if the content is malformed.
    pub fn load(&self, bytes: &[u8], marker: char, origin: &dyn fmt::Display) -> FlatConfig {
        match self.parse(bytes, marker) {
            Ok(parsed) => {
                debug!(
                    source = %origin,
                    entries = parsed.len(),
                    placeholders = parsed.placeholders.len(),
                    "parsed configuration source"
                );
                parsed.into_resolved()
            }
            Err(e) => {
                warn!(source = %origin, error = %e, "ignoring malformed configuration source");
                FlatConfig::new()
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Structured => write!(f, "structured"),
            Format::Flat => write!(f, "flat"),
        }
    }
}

/// Output of one parser run: masked entries plus the table that restores them.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    entries: FlatConfig,
    placeholders: PlaceholderTable,
}

impl ParsedSource {
    /// Reads one value with its placeholder restored.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(|value| self.placeholders.resolve(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restores every placeholder and drops the table.
    pub fn into_resolved(self) -> FlatConfig {
        let placeholders = self.placeholders;
        self.entries
            .into_iter()
            .map(|(key, value)| {
                let value = placeholders.resolve(&value).to_string();
                (key, value)
            })
            .collect()
    }
}
