//! Source scanners and the extension based dispatcher.

pub mod python;
pub mod template;
pub mod zcml;

use std::collections::BTreeMap;

use crate::comments::CommentPolicy;
use crate::error::{ConfigError, ExtractError, KeywordSpecError};
use crate::keywords::KeywordRegistry;
use crate::message::Message;

pub use python::{extract_python, PythonExtractor};
pub use template::{Engine, TemplateExtractor};
pub use zcml::ZcmlExtractor;

/// Settings shared by every scanner during one run. Built once before
/// scanning and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Only keep messages for this domain
    pub domain: Option<String>,
    pub keywords: KeywordRegistry,
    pub comments: CommentPolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            domain: None,
            keywords: KeywordRegistry::with_defaults(),
            comments: CommentPolicy::None,
        }
    }
}

impl ExtractOptions {
    /// Options with the built-in keywords extended by `keyword_specs`.
    pub fn new<S: AsRef<str>>(
        domain: Option<String>,
        keyword_specs: &[S],
        comments: CommentPolicy,
    ) -> Result<Self, KeywordSpecError> {
        let mut keywords = KeywordRegistry::with_defaults();
        keywords.register(keyword_specs)?;
        Ok(Self {
            domain,
            keywords,
            comments,
        })
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_comments(mut self, comments: CommentPolicy) -> Self {
        self.comments = comments;
        self
    }
}

/// A scanner for one family of source files
pub trait Extractor: Send + Sync {
    /// Identifier used in configuration files
    fn name(&self) -> &str;

    /// File name suffixes handled by default, including the leading dot
    fn extensions(&self) -> &[&'static str];

    /// Scan raw file contents. `filename` is only used for locations and
    /// diagnostics.
    fn extract_source(
        &self,
        filename: &str,
        source: &[u8],
        options: &ExtractOptions,
    ) -> Result<Vec<Message>, ExtractError>;

    /// A copy of this extractor evaluating expressions with `engine` by
    /// default. `None` when the extractor has no expression language.
    fn with_default_engine(&self, _engine: Engine) -> Option<Box<dyn Extractor>> {
        None
    }
}

/// Maps byte offsets to 1-based line numbers.
pub(crate) struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            newlines: source.match_indices('\n').map(|(idx, _)| idx).collect(),
        }
    }

    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&pos| pos < offset) + 1
    }
}

/// Decode UTF-8 source text, dropping a leading byte order mark.
pub(crate) fn decode_source<'a>(filename: &str, source: &'a [u8]) -> Result<&'a str, ExtractError> {
    let text = std::str::from_utf8(source).map_err(|err| ExtractError::Encoding {
        file: filename.to_string(),
        message: err.to_string(),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Maps file extensions to extractors.
///
/// Lookups pick the longest registered extension the file name ends with,
/// so `.zcml` and a hypothetical `.ml` never shadow each other.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: BTreeMap<String, Box<dyn Extractor>>,
    extensions: BTreeMap<String, String>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Python, Chameleon, Zope page template and ZCML scanners
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PythonExtractor));
        registry.register(Box::new(TemplateExtractor::chameleon()));
        registry.register(Box::new(TemplateExtractor::zope()));
        registry.register(Box::new(ZcmlExtractor));
        registry
    }

    /// Register an extractor under its name together with its default
    /// extensions. Registering the same name again replaces the previous one.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        let name = extractor.name().to_string();
        for extension in extractor.extensions() {
            self.extensions.insert(extension.to_string(), name.clone());
        }
        self.extractors.insert(name, extractor);
    }

    /// Route an additional extension to an already registered extractor.
    pub fn map_extension(&mut self, extension: &str, name: &str) -> Result<(), ConfigError> {
        if !self.extractors.contains_key(name) {
            return Err(ConfigError::UnknownExtractor {
                name: name.to_string(),
                extension: extension.to_string(),
            });
        }
        let extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };
        self.extensions.insert(extension, name.to_string());
        Ok(())
    }

    /// Change the default expression engine of a template extractor.
    pub fn set_default_engine(&mut self, name: &str, engine: &str) -> Result<(), ConfigError> {
        let parsed = Engine::parse(engine).ok_or_else(|| ConfigError::UnknownEngine {
            name: name.to_string(),
            engine: engine.to_string(),
        })?;
        let extractor = self
            .extractors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownExtractor {
                name: name.to_string(),
                extension: String::new(),
            })?;
        let replacement = extractor
            .with_default_engine(parsed)
            .ok_or_else(|| ConfigError::NoEngineSupport(name.to_string()))?;
        self.extractors.insert(name.to_string(), replacement);
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&dyn Extractor> {
        self.extractors.get(name).map(|extractor| extractor.as_ref())
    }

    /// The extractor responsible for `filename`, if any.
    pub fn get(&self, filename: &str) -> Option<&dyn Extractor> {
        self.extensions
            .iter()
            .filter(|(extension, _)| filename.ends_with(extension.as_str()))
            .max_by_key(|(extension, _)| extension.len())
            .and_then(|(_, name)| self.get_by_name(name))
    }

    pub fn supports(&self, filename: &str) -> bool {
        self.get(filename).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_extensions() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.get("views.py").unwrap().name(), "python");
        assert_eq!(registry.get("page.pt").unwrap().name(), "chameleon");
        assert_eq!(registry.get("form.cpt").unwrap().name(), "zope");
        assert_eq!(registry.get("configure.zcml").unwrap().name(), "zcml");
        assert!(registry.get("README.txt").is_none());
    }

    #[test]
    fn test_longest_extension_wins() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.map_extension(".ml", "python").unwrap();
        assert_eq!(registry.get("configure.zcml").unwrap().name(), "zcml");
        assert_eq!(registry.get("script.ml").unwrap().name(), "python");
    }

    #[test]
    fn test_map_extension_to_unknown_extractor() {
        let mut registry = ExtractorRegistry::with_defaults();
        let err = registry.map_extension(".html", "mako").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownExtractor { .. }));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(PythonExtractor));
        registry.register(Box::new(PythonExtractor));
        assert_eq!(registry.get("a.py").unwrap().name(), "python");
    }

    #[test]
    fn test_default_engine_override() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.set_default_engine("chameleon", "tales").unwrap();
        assert!(registry.set_default_engine("python", "tales").is_err());
        assert!(registry.set_default_engine("chameleon", "perl").is_err());
    }

    #[test]
    fn test_options_keyword_specs() {
        let options = ExtractOptions::new(None, &["", "tr"], CommentPolicy::All).unwrap();
        assert!(options.keywords.contains("tr"));
        assert!(!options.keywords.contains("gettext"));
        assert!(ExtractOptions::new(None, &["bad:1z"], CommentPolicy::None).is_err());
    }

    #[test]
    fn test_line_index() {
        let lines = LineIndex::new("a\nbc\n\nd");
        assert_eq!(lines.line_of(0), 1);
        assert_eq!(lines.line_of(1), 1);
        assert_eq!(lines.line_of(2), 2);
        assert_eq!(lines.line_of(6), 4);
        assert_eq!(lines.line_of(100), 4);
    }

    #[test]
    fn test_decode_source_strips_bom() {
        let source = "\u{feff}_('x')".as_bytes();
        assert_eq!(decode_source("a.py", source).unwrap(), "_('x')");
        assert!(matches!(
            decode_source("a.py", &[0xff, 0xfe, 0x00]),
            Err(ExtractError::Encoding { .. })
        ));
    }
}
