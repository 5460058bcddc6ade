//! Sanity checks for PO files.
//!
//! Two problems are reported: the same `(context, msgid)` appearing more
//! than once, and one translation being used for several different source
//! texts. `polib` merges duplicate keys while parsing, so entries are read
//! with a small line based reader here.

use std::collections::HashMap;
use std::fmt::Write as _;

/// Identity of a PO entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub context: Option<String>,
    pub msgid: String,
}

impl EntryKey {
    fn display(&self) -> String {
        match &self.context {
            Some(context) => format!("[{}] {}", context, self.msgid),
            None => self.msgid.clone(),
        }
    }
}

/// The fields of one PO entry relevant for linting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoEntry {
    pub key: EntryKey,
    /// `msgstr`, or `msgstr[0]` for plural entries
    pub msgstr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str,
    OtherPluralStr,
}

#[derive(Default)]
struct PendingEntry {
    context: Option<String>,
    msgid: Option<String>,
    msgstr: String,
}

impl PendingEntry {
    fn append(&mut self, field: Field, text: &str) {
        match field {
            Field::Context => self.context.get_or_insert_with(String::new).push_str(text),
            Field::Id => self.msgid.get_or_insert_with(String::new).push_str(text),
            Field::Str => self.msgstr.push_str(text),
            Field::IdPlural | Field::OtherPluralStr => {}
        }
    }

    fn finish(&mut self, entries: &mut Vec<PoEntry>) {
        let pending = std::mem::take(self);
        let Some(msgid) = pending.msgid else {
            return;
        };
        // The header entry
        if msgid.is_empty() && pending.context.is_none() {
            return;
        }
        entries.push(PoEntry {
            key: EntryKey {
                context: pending.context,
                msgid,
            },
            msgstr: pending.msgstr,
        });
    }
}

fn unquote(value: &str) -> String {
    let inner = value
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Read the entries of a PO file in file order. Obsolete (`#~`) entries
/// and the header are skipped.
pub fn read_entries(text: &str) -> Vec<PoEntry> {
    let mut entries = Vec::new();
    let mut pending = PendingEntry::default();
    let mut field = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            pending.finish(&mut entries);
            field = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if line.starts_with('"') {
            if let Some(current) = field {
                pending.append(current, &unquote(line));
            }
            continue;
        }

        let (keyword, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let next = match keyword {
            "msgctxt" => Field::Context,
            "msgid" => Field::Id,
            "msgid_plural" => Field::IdPlural,
            "msgstr" | "msgstr[0]" => Field::Str,
            _ if keyword.starts_with("msgstr[") => Field::OtherPluralStr,
            _ => continue,
        };
        let starts_entry =
            next == Field::Context || (next == Field::Id && field != Some(Field::Context));
        if starts_entry && pending.msgid.is_some() {
            pending.finish(&mut entries);
        }
        field = Some(next);
        pending.append(next, &unquote(value));
    }
    pending.finish(&mut entries);
    entries
}

/// The header entry (`msgid ""`) at the top of a PO file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoHeader {
    /// `Key: value` pairs from the header msgstr, in file order
    pub fields: Vec<(String, String)>,
    /// Byte offset just past the header entry
    pub end: usize,
}

impl PoHeader {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Locate the header entry. Only comments and blank lines may precede it.
pub fn read_header(text: &str) -> Option<PoHeader> {
    let mut offset = 0;
    let mut field = None;
    let mut msgstr = String::new();

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        match field {
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    offset += line.len();
                    continue;
                }
                if trimmed != "msgid \"\"" {
                    return None;
                }
                field = Some(Field::Id);
            }
            Some(Field::Id) => {
                if trimmed.starts_with('"') {
                    if !unquote(trimmed).is_empty() {
                        return None;
                    }
                } else if let Some(value) = trimmed.strip_prefix("msgstr ") {
                    msgstr.push_str(&unquote(value));
                    field = Some(Field::Str);
                } else {
                    return None;
                }
            }
            Some(_) => {
                if !trimmed.starts_with('"') {
                    break;
                }
                msgstr.push_str(&unquote(trimmed));
            }
        }
        offset += line.len();
    }
    if field != Some(Field::Str) {
        return None;
    }

    let fields = msgstr
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();
    Some(PoHeader {
        fields,
        end: offset,
    })
}

/// Problems found in one PO file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LintReport {
    /// Keys that appear more than once, with their count
    pub repeated: Vec<(EntryKey, usize)>,
    /// Translations shared by more than one key
    pub shared_translations: Vec<(String, Vec<EntryKey>)>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.repeated.is_empty() && self.shared_translations.is_empty()
    }

    /// Human readable report. `leader` is prefixed to every heading.
    pub fn render(&self, leader: &str) -> String {
        let mut out = String::new();
        for (key, count) in &self.repeated {
            let _ = writeln!(out, "{}Message repeated {} times:", leader, count);
            let _ = writeln!(out, "     {}", key.display());
            out.push('\n');
        }
        for (msgstr, keys) in &self.shared_translations {
            let _ = writeln!(out, "{}Translation:", leader);
            let _ = writeln!(out, "        {}", msgstr);
            let _ = writeln!(out, "Used for {} canonical texts:", keys.len());
            for (idx, key) in keys.iter().enumerate() {
                let _ = writeln!(out, "{:<8}{}", idx + 1, key.display());
            }
            out.push('\n');
        }
        out
    }
}

pub fn lint_entries(entries: &[PoEntry]) -> LintReport {
    let mut counts: Vec<(EntryKey, usize)> = Vec::new();
    let mut count_index: HashMap<&EntryKey, usize> = HashMap::new();
    let mut translations: Vec<(String, Vec<EntryKey>)> = Vec::new();
    let mut translation_index: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        match count_index.get(&entry.key) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                count_index.insert(&entry.key, counts.len());
                counts.push((entry.key.clone(), 1));
            }
        }

        if entry.msgstr.is_empty() {
            continue;
        }
        match translation_index.get(entry.msgstr.as_str()) {
            Some(&idx) => translations[idx].1.push(entry.key.clone()),
            None => {
                translation_index.insert(&entry.msgstr, translations.len());
                translations.push((entry.msgstr.clone(), vec![entry.key.clone()]));
            }
        }
    }

    LintReport {
        repeated: counts.into_iter().filter(|(_, count)| *count > 1).collect(),
        shared_translations: translations
            .into_iter()
            .filter(|(_, keys)| keys.len() > 1)
            .collect(),
    }
}

pub fn lint_text(text: &str) -> LintReport {
    lint_entries(&read_entries(text))
}
