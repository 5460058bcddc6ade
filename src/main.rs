use anyhow::Result;
use clap::Parser;
use msgscan::catalog::SortOrder;
use msgscan::commands::extract::{self, ExtractOutcome, ExtractSettings};
use msgscan::comments::CommentPolicy;
use msgscan::config::Config;
use msgscan::extractors::ExtractorRegistry;
use msgscan::fs::RealFileSystem;
use msgscan::logging::{self, LogLevel};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pot-create")]
#[command(author, version, about = "Extract translatable strings into a POT file", long_about = None)]
struct Cli {
    /// Source files, directories or glob patterns to scan
    #[arg(value_name = "FILE")]
    inputs: Vec<String>,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug)
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    /// Get list of files to process from FILE
    #[arg(short = 'f', long, value_name = "FILE")]
    files_from: Option<PathBuf>,

    /// Add DIRECTORY to the list of paths searched for input files
    #[arg(short = 'D', long = "directory", value_name = "DIRECTORY")]
    directories: Vec<PathBuf>,

    /// Filename for the generated POT file
    #[arg(short, long, default_value = "messages.pot")]
    output: PathBuf,

    /// Do not include location information
    #[arg(long)]
    no_location: bool,

    /// Do not include line numbers in location information
    #[arg(long)]
    no_linenumbers: bool,

    /// Order messages by their source location
    #[arg(long, conflicts_with = "sort_by_msgid")]
    sort_by_file: bool,

    /// Order messages by message id
    #[arg(long)]
    sort_by_msgid: bool,

    /// Domain to extract
    #[arg(short, long)]
    domain: Option<String>,

    /// Additional keyword spec, e.g. `tr` or `ntr:1,2` (repeatable)
    #[arg(short, long = "keyword", value_name = "SPEC")]
    keywords: Vec<String>,

    /// Add comments preceding translatable calls, optionally only those
    /// starting with TAG
    #[arg(short = 'c', long, value_name = "TAG", num_args = 0..=1, default_missing_value = "")]
    add_comments: Option<String>,

    /// Copyright holder for the texts
    #[arg(long, value_name = "STRING")]
    copyright_holder: Option<String>,

    /// Package name to use in the POT header
    #[arg(long, value_name = "NAME")]
    package_name: Option<String>,

    /// Package version to use in the POT header
    #[arg(long, value_name = "VERSION")]
    package_version: Option<String>,

    /// Email address bugs in message ids should be sent to
    #[arg(long, value_name = "EMAIL")]
    msgid_bugs_address: Option<String>,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level '{}'", value))
}

impl Cli {
    /// Merge command line flags over the configuration file.
    fn settings(&self, config: &Config) -> ExtractSettings {
        let mut settings = ExtractSettings::from_config(config);
        settings.inputs = self.inputs.clone();
        settings.files_from = self.files_from.clone();
        settings.search_paths = self.directories.clone();
        settings.output = self.output.clone();
        if self.no_location {
            settings.location = false;
        }
        if self.no_linenumbers {
            settings.linenumbers = false;
        }
        if self.sort_by_file {
            settings.sort_order = SortOrder::Location;
        } else if self.sort_by_msgid {
            settings.sort_order = SortOrder::Msgid;
        }
        if self.domain.is_some() {
            settings.domain = self.domain.clone();
        }
        settings.keywords.extend(self.keywords.iter().cloned());
        if let Some(tag) = &self.add_comments {
            settings.comments = CommentPolicy::from_tag(Some(tag.as_str()));
        }
        if let Some(name) = &self.package_name {
            settings.header.package_name = name.clone();
        }
        if let Some(version) = &self.package_version {
            settings.header.package_version = version.clone();
        }
        if self.copyright_holder.is_some() {
            settings.header.copyright_holder = self.copyright_holder.clone();
        }
        if self.msgid_bugs_address.is_some() {
            settings.header.msgid_bugs_address = self.msgid_bugs_address.clone();
        }
        settings
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = Config::load_or_default(cli.config.as_ref())?;

    let mut registry = ExtractorRegistry::with_defaults();
    config.configure_registry(&mut registry)?;

    let settings = cli.settings(&config);
    match extract::run(&settings, &registry, &RealFileSystem)? {
        ExtractOutcome::Written { .. } | ExtractOutcome::Unchanged { .. } => Ok(ExitCode::SUCCESS),
        ExtractOutcome::NoFiles => {
            logging::error("No files scanned, aborting");
            Ok(ExitCode::from(1))
        }
        ExtractOutcome::NoMessages => {
            logging::error("No translatable strings found, aborting");
            Ok(ExitCode::from(2))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::set_level(LogLevel::resolve(cli.quiet, cli.log_level));

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            logging::error(&format!("{:#}", err));
            ExitCode::from(1)
        }
    }
}
