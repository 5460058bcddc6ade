use thiserror::Error;

/// Malformed keyword specification. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeywordSpecError {
    #[error("keyword spec '{spec}' has an empty function name")]
    EmptyName { spec: String },
    #[error("keyword spec '{spec}': invalid argument number '{param}'")]
    InvalidNumber { spec: String, param: String },
    #[error("keyword spec '{spec}': unknown parameter suffix '{suffix}' in '{param}'")]
    UnknownSuffix {
        spec: String,
        param: String,
        suffix: char,
    },
    #[error("keyword spec '{spec}': argument positions start at 1")]
    ZeroPosition { spec: String },
    #[error("keyword spec '{spec}': too many message arguments")]
    TooManyMessageArguments { spec: String },
}

/// Invalid extractor configuration. Fatal before scanning starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown extractor '{name}' configured for extension '{extension}'")]
    UnknownExtractor { name: String, extension: String },
    #[error("Unknown expression engine '{engine}' for extractor '{name}'")]
    UnknownEngine { name: String, engine: String },
    #[error("Extractor '{0}' does not support an expression engine setting")]
    NoEngineSupport(String),
}

/// Unrecoverable problem while scanning a single file
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Aborting due to parse error in {file}[{line}]: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    #[error("Aborting due to Python syntax error in {file}[{line}]: {fragment}")]
    ExpressionSyntax {
        file: String,
        line: usize,
        fragment: String,
    },
    #[error("Aborting due to parse error in {file}: {message}")]
    Encoding { file: String, message: String },
}

impl ExtractError {
    pub fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        ExtractError::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Problems resolving the list of input files
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Can not find file {0}")]
    NotFound(String),
    #[error("No extractor available for file {0}")]
    NoExtractor(String),
    #[error("Can not read {path}: {message}")]
    Unreadable { path: String, message: String },
}
