//! In-memory document model produced by [`crate::tei::extract`].
//!
//! Sections are stored flat, in pre-order, each carrying its own nesting
//! `level`. The markdown serializer and the downstream indexer both consume a
//! flat sequence with depth markers, so the tree is never kept nested here.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Root record for one parsed paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Paper {
    /// Main title, empty when the TEI header has none.
    pub title: String,
    pub authors: Vec<Author>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// `when` attribute of the publication date if present, else its text.
    pub date: String,
    /// Pre-order flattening of the body's section tree.
    pub sections: Vec<Section>,
    pub bibliography: Bibliography,
}

/// A paper author from the TEI header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Author {
    /// `forename surname`, trimmed.
    pub name: String,
    /// Institution name, empty when unknown.
    pub affiliation: String,
}

/// One node of the body's logical structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: String,
    /// Author-supplied numbering such as `2.1`; may be empty.
    pub section_num: String,
    /// Nesting depth, 1 for top-level sections.
    pub level: usize,
    /// The section's own paragraphs joined by a blank line. Child sections
    /// carry their own text.
    pub text: String,
    /// Inline citations in this section's own paragraphs, in reading order.
    pub citations: Vec<Citation>,
}

/// An inline citation marker found in paragraph text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// Bibliography key, e.g. `#b0`.
    pub key: String,
    /// Label as rendered inline, e.g. `Hochreiter et al., 1997`.
    pub text: String,
}

/// A structured bibliography record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BibEntry {
    pub title: String,
    pub authors: Vec<String>,
    pub date: String,
    pub journal: String,
    pub doi: String,
}

/// Bibliography entries keyed by citation key, in document order.
///
/// Inserting an existing key replaces its entry but keeps its original
/// position. Serializes as a JSON object whose key order is the insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bibliography {
    entries: Vec<(String, BibEntry)>,
    index: HashMap<String, usize>,
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`.
    pub fn insert(&mut self, key: impl Into<String>, entry: BibEntry) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, entry));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BibEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Bibliography {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl Paper {
    /// Total number of inline citations across all sections.
    pub fn citation_count(&self) -> usize {
        self.sections.iter().map(|s| s.citations.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> BibEntry {
        BibEntry {
            title: title.into(),
            ..Default::default()
        }
    }

    #[test]
    fn bibliography_keeps_insertion_order() {
        let mut bib = Bibliography::new();
        bib.insert("#b10", entry("ten"));
        bib.insert("#b2", entry("two"));
        bib.insert("#b0", entry("zero"));
        let keys: Vec<&str> = bib.keys().collect();
        assert_eq!(keys, vec!["#b10", "#b2", "#b0"]);
    }

    #[test]
    fn bibliography_replace_keeps_position() {
        let mut bib = Bibliography::new();
        bib.insert("#b0", entry("first"));
        bib.insert("#b1", entry("second"));
        bib.insert("#b0", entry("replaced"));
        assert_eq!(bib.len(), 2);
        let items: Vec<(&str, &str)> = bib.iter().map(|(k, e)| (k, e.title.as_str())).collect();
        assert_eq!(items, vec![("#b0", "replaced"), ("#b1", "second")]);
    }

    #[test]
    fn bibliography_serializes_as_ordered_object() {
        let mut bib = Bibliography::new();
        bib.insert("#b1", entry("B"));
        bib.insert("#b0", entry("A"));
        let json = serde_json::to_string(&bib).unwrap();
        let b1 = json.find("\"#b1\"").unwrap();
        let b0 = json.find("\"#b0\"").unwrap();
        assert!(b1 < b0, "insertion order must survive: {json}");
    }

    #[test]
    fn paper_serializes_abstract_field_name() {
        let paper = Paper {
            abstract_text: "We propose".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&paper).unwrap();
        assert_eq!(value["abstract"], "We propose");
        assert!(value["bibliography"].as_object().unwrap().is_empty());
    }
}
