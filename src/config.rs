use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::catalog::SortOrder;
use crate::comments::CommentPolicy;
use crate::error::ConfigError;
use crate::extractors::ExtractorRegistry;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "msgscan.json";

/// `commentTag` setting: `true` keeps every comment, a string keeps only
/// comments starting with that tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommentTag {
    All(bool),
    Tagged(String),
}

impl CommentTag {
    pub fn policy(&self) -> CommentPolicy {
        match self {
            CommentTag::All(true) => CommentPolicy::All,
            CommentTag::All(false) => CommentPolicy::None,
            CommentTag::Tagged(tag) => CommentPolicy::from_tag(Some(tag.as_str())),
        }
    }
}

/// Configuration for msgscan
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Keyword specs added to the built-in ones (e.g. ["tr", "ntr:1,2"])
    pub keywords: Vec<String>,

    /// Which source comments end up in the catalog
    pub comment_tag: Option<CommentTag>,

    /// Only extract messages for this domain
    pub domain: Option<String>,

    /// Extra extension mappings (e.g. {".html": "chameleon"})
    pub extensions: BTreeMap<String, String>,

    /// Default expression engine per template extractor
    pub default_engine: BTreeMap<String, String>,

    /// Write source references
    pub location: bool,

    /// Include line numbers in source references
    pub linenumbers: bool,

    pub sort_order: SortOrder,

    pub package_name: Option<String>,

    pub package_version: Option<String>,

    pub copyright_holder: Option<String>,

    pub msgid_bugs_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            comment_tag: None,
            domain: None,
            extensions: BTreeMap::new(),
            default_engine: BTreeMap::new(),
            location: true,
            linenumbers: true,
            sort_order: SortOrder::None,
            package_name: None,
            package_version: None,
            copyright_holder: None,
            msgid_bugs_address: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON5 file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = json5::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from a JSON5 string
    pub fn from_json_string(json_str: &str) -> Result<Self> {
        let config: Config =
            json5::from_str(json_str).with_context(|| "Failed to parse config JSON string")?;
        Ok(config)
    }

    /// Try to load from default config file, or return default config
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn comment_policy(&self) -> CommentPolicy {
        self.comment_tag
            .as_ref()
            .map(CommentTag::policy)
            .unwrap_or_default()
    }

    /// Apply the extension and engine settings to `registry`.
    pub fn configure_registry(&self, registry: &mut ExtractorRegistry) -> Result<(), ConfigError> {
        for (extension, name) in &self.extensions {
            registry.map_extension(extension, name)?;
        }
        for (name, engine) in &self.default_engine {
            registry.set_default_engine(name, engine)?;
        }
        Ok(())
    }
}
