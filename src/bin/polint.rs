use anyhow::Result;
use clap::Parser;
use msgscan::commands::lint;
use msgscan::logging::{self, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "polint")]
#[command(author, version, about = "Perform sanity checks on PO files", long_about = None)]
struct Cli {
    /// PO files to check
    #[arg(value_name = "PO-FILE", required = true)]
    files: Vec<PathBuf>,

    /// Do not warn about files that can not be parsed
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::set_level(LogLevel::resolve(cli.quiet, None));
    lint::run(&cli.files)
}
