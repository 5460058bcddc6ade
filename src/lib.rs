//! Extract translatable strings from Python sources, Chameleon / Zope page
//! templates and ZCML files into gettext POT catalogs.
//!
//! The pipeline is: resolve input files ([`fs`]), pick a scanner by file
//! extension ([`extractors::ExtractorRegistry`]), merge the scanned
//! [`message::Message`]s into a [`catalog::Catalog`] and save it with
//! [`po::save`].

pub mod catalog;
pub mod commands;
pub mod comments;
pub mod config;
pub mod error;
pub mod extractors;
pub mod format;
pub mod fs;
pub mod keywords;
pub mod lint;
pub mod logging;
pub mod message;
pub mod po;

pub use catalog::{Catalog, Entry, Occurrence, SortOrder};
pub use error::{ConfigError, ExtractError, InputError, KeywordSpecError};
pub use extractors::{ExtractOptions, Extractor, ExtractorRegistry};
pub use message::{Location, Message};
