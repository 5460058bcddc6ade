//! In-memory catalog built from scanner output.
//!
//! Messages sharing `(id, context)` collapse into one [`Entry`]. Entries keep
//! first-seen order until [`Catalog::finalize`] sorts them.

use serde::Deserialize;
use std::collections::HashMap;

use crate::message::{add_flag, normalize_whitespace, Message};

/// A source reference. `line` is `None` once line numbers are stripped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Occurrence {
    pub file: String,
    pub line: Option<usize>,
}

impl Occurrence {
    pub fn new(file: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Reference as written in a PO file: `file:line` or just `file`
    pub fn reference(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        }
    }

    /// Parse a `file:line` reference. A missing or non-numeric line is kept
    /// as part of the file name.
    pub fn parse(reference: &str) -> Self {
        match reference.rsplit_once(':') {
            Some((file, line)) if !file.is_empty() => match line.parse() {
                Ok(line) => Self::new(file, Some(line)),
                Err(_) => Self::new(reference, None),
            },
            _ => Self::new(reference, None),
        }
    }
}

/// One unique `(id, context)` pair of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub context: Option<String>,
    pub plural_id: Option<String>,
    pub flags: Vec<String>,
    pub occurrences: Vec<Occurrence>,
    pub comments: Vec<String>,
    pub translator_comments: Vec<String>,
    pub obsolete: bool,
}

impl Entry {
    pub fn new(id: impl Into<String>, context: Option<String>) -> Self {
        Self {
            id: id.into(),
            context,
            plural_id: None,
            flags: Vec::new(),
            occurrences: Vec::new(),
            comments: Vec::new(),
            translator_comments: Vec::new(),
            obsolete: false,
        }
    }

    /// Extracted comments as a single newline separated block
    pub fn comment(&self) -> String {
        self.comments.join("\n")
    }

    pub fn translator_comment(&self) -> String {
        self.translator_comments.join("\n")
    }

    fn key(&self) -> (&str, Option<&str>) {
        (self.id.as_str(), self.context.as_deref())
    }
}

fn push_unique_comment(comments: &mut Vec<String>, comment: &str) {
    if comment.is_empty() {
        return;
    }
    let normalized = normalize_whitespace(comment);
    if !comments.iter().any(|c| normalize_whitespace(c) == normalized) {
        comments.push(comment.to_string());
    }
}

/// Output ordering of catalog entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Order in which messages were first found
    #[default]
    None,
    Msgid,
    /// By the sorted list of source references
    Location,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<Entry>,
    index: HashMap<(String, Option<String>), usize>,
    record_locations: bool,
}

impl Catalog {
    pub fn new(record_locations: bool) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            record_locations,
        }
    }

    /// Build a catalog directly from entries, e.g. loaded from disk.
    /// Later duplicates of a key are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut catalog = Self::new(true);
        for entry in entries {
            let key = (entry.id.clone(), entry.context.clone());
            if catalog.index.contains_key(&key) {
                continue;
            }
            catalog.index.insert(key, catalog.entries.len());
            catalog.entries.push(entry);
        }
        catalog
    }

    /// Fold a message into the entry for its `(id, context)` key.
    pub fn merge(&mut self, message: &Message) {
        let key = (message.id.clone(), message.context.clone());
        let index = match self.index.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.entries.len();
                self.entries
                    .push(Entry::new(message.id.clone(), message.context.clone()));
                self.index.insert(key, index);
                index
            }
        };

        let entry = &mut self.entries[index];
        if entry.plural_id.is_none() {
            entry.plural_id = message.plural_id.clone();
        }
        if self.record_locations {
            let occurrence = Occurrence::new(
                message.location.file.clone(),
                Some(message.location.line),
            );
            if !entry.occurrences.contains(&occurrence) {
                entry.occurrences.push(occurrence);
            }
        }
        for flag in &message.flags {
            add_flag(&mut entry.flags, flag);
        }
        push_unique_comment(&mut entry.comments, &message.comment);
        push_unique_comment(&mut entry.translator_comments, &message.translator_comment);
    }

    /// Apply output ordering and optionally drop line numbers, keeping one
    /// reference per file.
    pub fn finalize(&mut self, order: SortOrder, line_numbers: bool) {
        match order {
            SortOrder::None => {}
            SortOrder::Msgid => {
                self.entries
                    .sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.context.cmp(&b.context)));
            }
            SortOrder::Location => {
                for entry in &mut self.entries {
                    entry.occurrences.sort();
                }
                self.entries.sort_by(|a, b| a.occurrences.cmp(&b.occurrences));
            }
        }

        if !line_numbers {
            for entry in &mut self.entries {
                let mut files: Vec<Occurrence> = Vec::new();
                for occurrence in entry.occurrences.drain(..) {
                    if !files.iter().any(|seen| seen.file == occurrence.file) {
                        files.push(Occurrence::new(occurrence.file, None));
                    }
                }
                entry.occurrences = files;
            }
        }

        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| ((entry.id.clone(), entry.context.clone()), idx))
            .collect();
    }

    pub fn get(&self, id: &str, context: Option<&str>) -> Option<&Entry> {
        self.index
            .get(&(id.to_string(), context.map(str::to_string)))
            .map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether both catalogs carry the same messages.
    ///
    /// Obsolete entries and header metadata are ignored. Entries compare by
    /// id, context, plural id, flags and whitespace normalized comments;
    /// source references do not matter.
    pub fn same_messages(&self, other: &Catalog) -> bool {
        fn live(catalog: &Catalog) -> Vec<&Entry> {
            let mut entries: Vec<&Entry> =
                catalog.entries.iter().filter(|entry| !entry.obsolete).collect();
            entries.sort_by(|a, b| a.key().cmp(&b.key()));
            entries
        }

        fn sorted_flags(entry: &Entry) -> Vec<&str> {
            let mut flags: Vec<&str> = entry.flags.iter().map(String::as_str).collect();
            flags.sort_unstable();
            flags
        }

        let (ours, theirs) = (live(self), live(other));
        ours.len() == theirs.len()
            && ours.iter().zip(&theirs).all(|(a, b)| {
                a.key() == b.key()
                    && a.plural_id == b.plural_id
                    && sorted_flags(a) == sorted_flags(b)
                    && normalize_whitespace(&a.comment()) == normalize_whitespace(&b.comment())
                    && normalize_whitespace(&a.translator_comment())
                        == normalize_whitespace(&b.translator_comment())
            })
    }
}
