//! Case-insensitive, order-preserving header collection.
//!
//! Requests and responses share one collection type. Each header name is held
//! once, with its values kept as a list and joined by the collection's
//! separator when read or serialized. `Content-Length` is single-valued: a
//! later value replaces the earlier one instead of being appended.

/// Default string used to join repeated header values.
pub const DEFAULT_SEPARATOR: &str = ",";

/// Header names that hold exactly one value.
const SINGLE_VALUE_HEADERS: [&str; 1] = ["content-length"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// An ordered multimap of header names to values.
///
/// Lookups ignore ASCII case; the spelling of the first occurrence of a name is
/// the one kept for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCollection {
    entries: Vec<HeaderEntry>,
    separator: String,
}

impl Default for HeaderCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderCollection {
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    pub fn with_separator<S: Into<String>>(separator: S) -> Self {
        Self { entries: Vec::new(), separator: separator.into() }
    }

    /// The string used to join multiple values of one header.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Replaces every value of `name` with `value`.
    pub fn set<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.entry_mut(&name) {
            Some(entry) => {
                entry.values.clear();
                entry.values.push(value);
            }
            None => self.entries.push(HeaderEntry { name, values: vec![value] }),
        }
    }

    /// Adds `value` to `name` unless that exact value is already present.
    pub fn add<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        if is_single_value(&name) {
            self.set(name, value);
            return;
        }
        match self.entry_mut(&name) {
            Some(entry) => {
                if !entry.values.contains(&value) {
                    entry.values.push(value);
                }
            }
            None => self.entries.push(HeaderEntry { name, values: vec![value] }),
        }
    }

    /// Records a header as received on the wire.
    ///
    /// The first occurrence is stored as-is; later occurrences replace the
    /// value of single-value headers and are appended for every other header.
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        let single = is_single_value(&name);
        match self.entry_mut(&name) {
            Some(entry) if single => {
                entry.values.clear();
                entry.values.push(value);
            }
            Some(entry) => entry.values.push(value),
            None => self.entries.push(HeaderEntry { name, values: vec![value] }),
        }
    }

    /// Returns the values of `name` joined by the separator.
    pub fn get(&self, name: &str) -> Option<String> {
        self.entry(name).map(|entry| entry.values.join(&self.separator))
    }

    /// Returns the individual values stored for `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entry(name).map(|entry| entry.values.as_slice()).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.name.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, joined value)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.entries.iter().map(|entry| (entry.name.as_str(), entry.values.join(&self.separator)))
    }

    fn entry(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut HeaderEntry> {
        self.entries.iter_mut().find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

fn is_single_value(name: &str) -> bool {
    SINGLE_VALUE_HEADERS.iter().any(|single| single.eq_ignore_ascii_case(name))
}
