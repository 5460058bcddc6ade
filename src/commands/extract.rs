use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, SortOrder};
use crate::comments::CommentPolicy;
use crate::config::Config;
use crate::extractors::{ExtractOptions, ExtractorRegistry};
use crate::fs::{self, FileSystem};
use crate::logging;
use crate::po::{self, Header, SaveOutcome};

/// Everything the extract command needs, after merging configuration file
/// and command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Files, directories or glob patterns to scan
    pub inputs: Vec<String>,
    /// File listing more inputs, one per line
    pub files_from: Option<PathBuf>,
    /// Extra directories to look for relative input names in
    pub search_paths: Vec<PathBuf>,
    pub output: PathBuf,
    pub location: bool,
    pub linenumbers: bool,
    pub sort_order: SortOrder,
    pub domain: Option<String>,
    pub keywords: Vec<String>,
    pub comments: CommentPolicy,
    pub header: Header,
}

impl ExtractSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Header::default();
        Self {
            inputs: Vec::new(),
            files_from: None,
            search_paths: Vec::new(),
            output: PathBuf::from("messages.pot"),
            location: config.location,
            linenumbers: config.linenumbers,
            sort_order: config.sort_order,
            domain: config.domain.clone(),
            keywords: config.keywords.clone(),
            comments: config.comment_policy(),
            header: Header {
                package_name: config.package_name.clone().unwrap_or(defaults.package_name),
                package_version: config
                    .package_version
                    .clone()
                    .unwrap_or(defaults.package_version),
                copyright_holder: config.copyright_holder.clone(),
                msgid_bugs_address: config.msgid_bugs_address.clone(),
            },
        }
    }
}

/// How an extraction run ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Written { path: PathBuf, entries: usize },
    Unchanged { path: PathBuf },
    /// No input file was scanned
    NoFiles,
    /// Files were scanned but contained no messages
    NoMessages,
}

/// Scan the inputs and build the catalog, without writing it.
///
/// Returns `None` when there was nothing to scan.
pub fn build_catalog(
    settings: &ExtractSettings,
    registry: &ExtractorRegistry,
    filesystem: &dyn FileSystem,
) -> Result<Option<Catalog>> {
    let options = ExtractOptions::new(
        settings.domain.clone(),
        &settings.keywords,
        settings.comments.clone(),
    )?;

    let mut names = Vec::new();
    if let Some(list) = &settings.files_from {
        names.extend(fs::read_file_list(filesystem, list)?);
    }
    names.extend(settings.inputs.iter().cloned());

    let files = fs::resolve_inputs(filesystem, &names, &settings.search_paths, registry)?;
    if files.is_empty() {
        return Ok(None);
    }

    let mut catalog = Catalog::new(settings.location);
    for path in &files {
        let filename = display_name(path);
        let Some(extractor) = registry.get(&filename) else {
            anyhow::bail!("No extractor available for file {}", filename);
        };
        logging::debug(&format!("Scanning {} with {}", filename, extractor.name()));

        let source = filesystem
            .read(path)
            .with_context(|| format!("Can not read {}", filename))?;
        let messages = extractor.extract_source(&filename, &source, &options)?;
        for message in &messages {
            catalog.merge(message);
        }
    }

    catalog.finalize(settings.sort_order, settings.linenumbers);
    Ok(Some(catalog))
}

fn display_name(path: &Path) -> String {
    let name = path.to_string_lossy();
    name.strip_prefix("./").unwrap_or(&name).to_string()
}

pub fn run(
    settings: &ExtractSettings,
    registry: &ExtractorRegistry,
    filesystem: &dyn FileSystem,
) -> Result<ExtractOutcome> {
    let Some(catalog) = build_catalog(settings, registry, filesystem)? else {
        return Ok(ExtractOutcome::NoFiles);
    };
    if catalog.is_empty() {
        return Ok(ExtractOutcome::NoMessages);
    }

    let path = settings.output.clone();
    match po::save(&catalog, &settings.header, &path)? {
        SaveOutcome::Written => {
            logging::info(&format!(
                "Wrote {} message(s) to {}",
                catalog.len(),
                path.display()
            ));
            Ok(ExtractOutcome::Written {
                path,
                entries: catalog.len(),
            })
        }
        SaveOutcome::Unchanged => {
            logging::info(&format!("Catalog unchanged, not writing {}", path.display()));
            Ok(ExtractOutcome::Unchanged { path })
        }
    }
}
