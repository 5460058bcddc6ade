use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::lint::{self, LintReport};
use crate::logging;
use crate::po;

/// Lint one PO file. Files that do not parse yield `None`.
pub fn check_file(path: &Path) -> Option<LintReport> {
    let text = match std::fs::read(path).map(String::from_utf8) {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => {
            logging::warn(&format!(
                "Character encoding problems occurred while parsing {}",
                path.display()
            ));
            logging::warn("Perhaps this is not a PO file?");
            return None;
        }
        Err(err) => {
            logging::warn(&format!("Can not read {}: {}", path.display(), err));
            return None;
        }
    };
    if let Err(err) = po::parse_text(&text) {
        logging::warn(&format!("Can not parse {}: {:#}", path.display(), err));
        return None;
    }
    Some(lint::lint_text(&text))
}

pub fn run(paths: &[PathBuf]) -> Result<()> {
    let show_path = paths.len() > 1;
    for path in paths {
        let Some(report) = check_file(path) else {
            continue;
        };
        let leader = if show_path {
            format!("[{}] ", path.display())
        } else {
            String::new()
        };
        print!("{}", report.render(&leader));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_check_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("de.po");
        std::fs::write(
            &path,
            "msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=UTF-8\\n\"\n\n\
             msgid \"Open\"\nmsgstr \"Öffnen\"\n\nmsgid \"Open file\"\nmsgstr \"Öffnen\"\n",
        )
        .unwrap();
        let report = check_file(&path).unwrap();
        assert_eq!(report.shared_translations.len(), 1);
    }

    #[test]
    fn test_translator_file_without_full_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fr.po");
        std::fs::write(
            &path,
            "# French translation\nmsgid \"\"\nmsgstr \"\"\n\"Language: fr\\n\"\n\n\
             msgid \"Open\"\nmsgstr \"Ouvrir\"\n\nmsgid \"Open\"\nmsgstr \"Ouvrir\"\n",
        )
        .unwrap();
        let report = check_file(&path).unwrap();
        assert_eq!(report.repeated.len(), 1);
    }

    #[test]
    fn test_file_without_header_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.po");
        std::fs::write(&path, "msgid \"Open\"\nmsgstr \"Ouvrir\"\n").unwrap();
        assert!(check_file(&path).is_none());
    }

    #[test]
    fn test_invalid_encoding_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.po");
        std::fs::write(&path, [0xffu8, 0xfe, 0x00]).unwrap();
        assert!(check_file(&path).is_none());
        run(&[path]).unwrap();
    }
}
