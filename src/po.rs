//! Reading and writing catalogs in gettext PO format.
//!
//! Serialization is delegated to `polib`. Header fields polib does not
//! model (bug report address, copyright line, generator) are added to the
//! written text afterwards.

use anyhow::{Context, Result};
use polib::message::{Message as PoMessage, MessageFlags};
use polib::metadata::CatalogMetadata;
use std::io::Write as _;
use std::path::Path;

use crate::catalog::{Catalog, Entry, Occurrence};
use crate::lint;

/// Project information written to the catalog header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub package_name: String,
    pub package_version: String,
    pub copyright_holder: Option<String>,
    pub msgid_bugs_address: Option<String>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            package_name: "PACKAGE".to_string(),
            package_version: "1.0".to_string(),
            copyright_holder: None,
            msgid_bugs_address: None,
        }
    }
}

/// Result of [`save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// An identical catalog already exists at the destination
    Unchanged,
}

fn metadata(header: &Header) -> CatalogMetadata {
    let mut metadata = CatalogMetadata::new();
    metadata.project_id_version = format!("{} {}", header.package_name, header.package_version);
    metadata.pot_creation_date = chrono::Local::now().format("%Y-%m-%d %H:%M%z").to_string();
    metadata.po_revision_date = "YEAR-MO-DA HO:MI+ZONE".to_string();
    metadata.last_translator = "FULL NAME <EMAIL@ADDRESS>".to_string();
    metadata.language_team = "LANGUAGE <LL@li.org>".to_string();
    metadata.mime_version = "1.0".to_string();
    metadata.content_type = "text/plain; charset=UTF-8".to_string();
    metadata.content_transfer_encoding = "8bit".to_string();
    metadata
}

fn to_po_message(entry: &Entry) -> PoMessage {
    let mut builder = match &entry.plural_id {
        Some(plural_id) => {
            let mut builder = PoMessage::build_plural();
            builder.with_msgid_plural(plural_id.clone());
            builder.with_msgstr_plural(vec![String::new(), String::new()]);
            builder
        }
        None => PoMessage::build_singular(),
    };
    builder.with_msgid(entry.id.clone());
    if let Some(context) = &entry.context {
        builder.with_msgctxt(context.clone());
    }
    if !entry.occurrences.is_empty() {
        let references: Vec<String> =
            entry.occurrences.iter().map(Occurrence::reference).collect();
        builder.with_source(references.join(" "));
    }
    if !entry.comments.is_empty() {
        builder.with_comments(entry.comment());
    }
    if !entry.flags.is_empty() {
        let mut flags = MessageFlags::new();
        for flag in &entry.flags {
            flags.add_flag(flag);
        }
        builder.with_flags(flags);
    }
    builder.done()
}

/// Convert to a polib catalog with a freshly dated header.
pub fn to_po_catalog(catalog: &Catalog, header: &Header) -> polib::catalog::Catalog {
    let mut po = polib::catalog::Catalog::new(metadata(header));
    for entry in catalog.entries() {
        po.append_or_update(to_po_message(entry));
    }
    po
}

/// Header handed to polib in place of the file's own. polib requires every
/// field it models and panics on a missing one; the header is never read
/// back, so fixed values are enough.
const PARSE_HEADER: &str = "msgid \"\"
msgstr \"\"
\"Project-Id-Version: PACKAGE VERSION\\n\"
\"POT-Creation-Date: YEAR-MO-DA HO:MI+ZONE\\n\"
\"PO-Revision-Date: YEAR-MO-DA HO:MI+ZONE\\n\"
\"Last-Translator: FULL NAME <EMAIL@ADDRESS>\\n\"
\"Language-Team: LANGUAGE <LL@li.org>\\n\"
\"Language: \\n\"
\"MIME-Version: 1.0\\n\"
\"Content-Type: text/plain; charset=UTF-8\\n\"
\"Content-Transfer-Encoding: 8bit\\n\"
\"Plural-Forms: nplurals=1; plural=0;\\n\"

";

/// Parse PO text with polib. Text without a header entry is rejected.
pub fn parse_text(text: &str) -> Result<polib::catalog::Catalog> {
    let header = lint::read_header(text).context("No header entry found")?;
    let mut temp = tempfile::NamedTempFile::new().context("Failed to create temporary file")?;
    temp.write_all(PARSE_HEADER.as_bytes())
        .and_then(|_| temp.write_all(text[header.end..].as_bytes()))
        .and_then(|_| temp.flush())
        .context("Failed to write temporary file")?;
    polib::po_file::parse(temp.path()).map_err(|err| anyhow::anyhow!("{}", err))
}

/// Load the messages of an existing PO file. Header metadata is dropped.
pub fn load(path: &Path) -> Result<Catalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let po = parse_text(&text)
        .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
    let entries = po.messages().map(|message| {
        let context = Some(message.msgctxt().to_string()).filter(|ctx| !ctx.is_empty());
        let mut entry = Entry::new(message.msgid(), context);
        entry.plural_id = message.msgid_plural().ok().map(str::to_string);
        entry.flags = message
            .flags()
            .to_string()
            .split(',')
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
            .map(str::to_string)
            .collect();
        entry.occurrences = message
            .source()
            .split_whitespace()
            .map(Occurrence::parse)
            .collect();
        entry.comments = message
            .comments()
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        entry
    });
    Ok(Catalog::from_entries(entries))
}

/// Add the header lines polib has no field for, mark the header fuzzy and
/// put the template placeholder into `Plural-Forms`.
fn decorate_header(text: &str, header: &Header) -> String {
    let mut out = String::with_capacity(text.len() + 256);
    out.push_str(&format!("# Translations template for {}.\n", header.package_name));
    if let Some(holder) = &header.copyright_holder {
        let year = chrono::Local::now().format("%Y");
        out.push_str(&format!("# Copyright (C) {} {}\n", year, holder));
    }
    out.push_str("#\n");

    let mut inserted = false;
    let mut fuzzy = false;
    for line in text.split_inclusive('\n') {
        if !fuzzy && line.trim_end() == "msgid \"\"" {
            out.push_str("#, fuzzy\n");
            fuzzy = true;
        }
        if line.starts_with("\"Plural-Forms:") {
            out.push_str("\"Plural-Forms: nplurals=INTEGER; plural=EXPRESSION;\\n\"\n");
            continue;
        }
        out.push_str(line);
        if !inserted && line.starts_with("\"Project-Id-Version:") {
            if let Some(address) = &header.msgid_bugs_address {
                out.push_str(&format!("\"Report-Msgid-Bugs-To: {}\\n\"\n", address));
            }
            inserted = true;
        }
        if line.starts_with("\"Content-Transfer-Encoding:") {
            out.push_str(&format!(
                "\"Generated-By: {} {}\\n\"\n",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ));
        }
    }
    out
}

/// Write `catalog` to `path` unless an equivalent catalog is already there.
///
/// The file is written to a temporary file in the destination directory and
/// renamed into place, so readers never observe a partial catalog.
pub fn save(catalog: &Catalog, header: &Header, path: &Path) -> Result<SaveOutcome> {
    if path.is_file() {
        if let Ok(existing) = load(path) {
            if existing.same_messages(catalog) {
                return Ok(SaveOutcome::Unchanged);
            }
        }
    }

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

    let temp = tempfile::NamedTempFile::new_in(directory)
        .with_context(|| format!("Failed to create temporary file in {}", directory.display()))?;
    polib::po_file::write(&to_po_catalog(catalog, header), temp.path())
        .with_context(|| format!("Failed to write catalog: {}", temp.path().display()))?;

    let written = std::fs::read_to_string(temp.path())
        .with_context(|| format!("Failed to read back {}", temp.path().display()))?;
    std::fs::write(temp.path(), decorate_header(&written, header))
        .with_context(|| format!("Failed to write catalog: {}", temp.path().display()))?;

    temp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(SaveOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Location, Message};
    use tempfile::tempdir;

    fn sample() -> Catalog {
        let mut catalog = Catalog::new(true);
        catalog.merge(&Message::new("Hello", Location::new("a.py", 3)).with_comment("Greeting"));
        let mut plural = Message::new("one cow", Location::new("b.py", 9));
        plural.plural_id = Some("%d cows".into());
        plural.flags = vec!["c-format".into()];
        catalog.merge(&plural);
        catalog.merge(
            &Message::new("Open", Location::new("b.py", 12)).with_context(Some("menu".into())),
        );
        catalog
    }

    #[test]
    fn test_save_writes_pot_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        let header = Header {
            msgid_bugs_address: Some("bugs@example.com".into()),
            ..Header::default()
        };
        assert_eq!(save(&sample(), &header, &path).unwrap(), SaveOutcome::Written);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("msgid \"Hello\""));
        assert!(text.contains("#: a.py:3"));
        assert!(text.contains("msgid_plural \"%d cows\""));
        assert!(text.contains("msgctxt \"menu\""));
        assert!(text.contains("Report-Msgid-Bugs-To: bugs@example.com"));
        assert!(text.contains("Project-Id-Version: PACKAGE 1.0"));
    }

    #[test]
    fn test_load_round_trips_messages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        save(&sample(), &Header::default(), &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        let hello = loaded.get("Hello", None).unwrap();
        assert_eq!(hello.occurrences, vec![Occurrence::new("a.py", Some(3))]);
        assert_eq!(hello.comment(), "Greeting");
        assert!(loaded.get("Open", Some("menu")).is_some());
        assert!(loaded.same_messages(&sample()));
    }

    #[test]
    fn test_second_save_is_a_no_op() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        let header = Header::default();
        assert_eq!(save(&sample(), &header, &path).unwrap(), SaveOutcome::Written);
        assert_eq!(save(&sample(), &header, &path).unwrap(), SaveOutcome::Unchanged);

        let mut moved = Catalog::new(true);
        for entry in sample().entries() {
            let mut message = Message::new(entry.id.clone(), Location::new("c.py", 99))
                .with_context(entry.context.clone())
                .with_comment(entry.comment());
            message.plural_id = entry.plural_id.clone();
            message.flags = entry.flags.clone();
            moved.merge(&message);
        }
        assert_eq!(save(&moved, &header, &path).unwrap(), SaveOutcome::Unchanged);
    }

    #[test]
    fn test_changed_catalog_is_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        save(&sample(), &Header::default(), &path).unwrap();

        let mut changed = sample();
        changed.merge(&Message::new("New", Location::new("a.py", 1)));
        assert_eq!(
            save(&changed, &Header::default(), &path).unwrap(),
            SaveOutcome::Written
        );
        assert!(load(&path).unwrap().get("New", None).is_some());
    }

    #[test]
    fn test_changed_plural_or_flags_are_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        let header = Header::default();
        let cows = |plural_id: &str, flags: &[&str]| {
            let mut message = Message::new("one cow", Location::new("b.py", 9));
            message.plural_id = Some(plural_id.into());
            message.flags = flags.iter().map(|f| f.to_string()).collect();
            let mut catalog = Catalog::new(true);
            catalog.merge(&message);
            catalog
        };

        assert_eq!(save(&cows("%d cows", &[]), &header, &path).unwrap(), SaveOutcome::Written);
        assert_eq!(
            save(&cows("%d cattle", &["c-format"]), &header, &path).unwrap(),
            SaveOutcome::Written
        );
        assert!(std::fs::read_to_string(&path).unwrap().contains("%d cattle"));

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.entries()[0].flags, vec!["c-format"]);
        assert_eq!(
            save(&cows("%d cattle", &["c-format"]), &header, &path).unwrap(),
            SaveOutcome::Unchanged
        );
        assert_eq!(
            save(&cows("%d cattle", &[]), &header, &path).unwrap(),
            SaveOutcome::Written
        );
    }

    #[test]
    fn test_existing_file_with_sparse_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        std::fs::write(
            &path,
            "msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=UTF-8\\n\"\n\n\
             msgid \"Hello\"\nmsgstr \"\"\n",
        )
        .unwrap();
        assert_eq!(load(&path).unwrap().len(), 1);
        assert_eq!(
            save(&sample(), &Header::default(), &path).unwrap(),
            SaveOutcome::Written
        );
        assert_eq!(load(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_file_without_header_does_not_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        std::fs::write(&path, "msgid \"Hello\"\nmsgstr \"\"\n").unwrap();
        assert!(load(&path).is_err());
        assert_eq!(
            save(&sample(), &Header::default(), &path).unwrap(),
            SaveOutcome::Written
        );
    }

    #[test]
    fn test_template_header_is_fuzzy_with_plural_placeholder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        save(&sample(), &Header::default(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("#, fuzzy\nmsgid \"\"\n"));
        assert!(text.contains("\"Plural-Forms: nplurals=INTEGER; plural=EXPRESSION;\\n\""));
        assert!(!text.contains("nplurals=1"));
    }

    #[test]
    fn test_unparseable_existing_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.pot");
        std::fs::write(&path, "msgid \"unterminated\nmsgstr").unwrap();
        assert_eq!(
            save(&sample(), &Header::default(), &path).unwrap(),
            SaveOutcome::Written
        );
    }

    #[test]
    fn test_decorate_header() {
        let text = "msgid \"\"\nmsgstr \"\"\n\"Project-Id-Version: X 1\\n\"\n\"Content-Transfer-Encoding: 8bit\\n\"\n";
        let header = Header {
            copyright_holder: Some("Acme".into()),
            msgid_bugs_address: Some("bugs@acme.test".into()),
            ..Header::default()
        };
        let out = decorate_header(text, &header);
        assert!(out.starts_with("# Translations template for PACKAGE.\n# Copyright (C) "));
        assert!(out.contains(
            "\"Project-Id-Version: X 1\\n\"\n\"Report-Msgid-Bugs-To: bugs@acme.test\\n\"\n"
        ));
        assert!(out.contains("\"Generated-By: msgscan "));
    }
}
