use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ts_catalog::Result;
use ts_catalog::merge::{DocumentJob, MergeOptions, SourceSet, merge_documents};

/// Synchronize TS translation documents with the strings an application uses
#[derive(Parser, Debug)]
#[command(name = "ts-merge", version)]
struct Cli {
    /// TS documents to update, one per locale (created when missing)
    #[arg(value_name = "DOCUMENT", required = true)]
    documents: Vec<PathBuf>,

    /// Extracted-sources manifest (JSON)
    #[arg(long, short = 's', value_name = "MANIFEST")]
    sources: PathBuf,

    /// Write the merged document here instead of in place (single document only)
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Merge options (JSON); command line flags take precedence
    #[arg(long, short = 'c', value_name = "JSON")]
    config: Option<PathBuf>,

    /// Target language, overriding the one declared by the document
    #[arg(long, short = 'l', value_name = "LOCALE")]
    language: Option<String>,

    /// Keep vanished messages forever
    #[arg(long)]
    no_delete_vanished: bool,

    /// Absent merges after which a vanished message is deleted (default: 2)
    #[arg(long, value_name = "N")]
    vanish_after: Option<u32>,

    /// Minimum similarity (0-1) for reusing an old translation (default: 0.8)
    #[arg(long, value_name = "SIMILARITY", conflicts_with = "no_fuzzy")]
    fuzzy_threshold: Option<f64>,

    /// Never seed new messages from old translations
    #[arg(long)]
    no_fuzzy: bool,

    /// Log every merge decision
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn merge_options(&self) -> Result<MergeOptions> {
        let mut options = match &self.config {
            Some(path) => MergeOptions::load(path)?,
            None => MergeOptions::default(),
        };
        if self.no_delete_vanished {
            options.delete_vanished = false;
        }
        if let Some(vanish_after) = self.vanish_after {
            options.vanish_after = vanish_after;
        }
        if let Some(threshold) = self.fuzzy_threshold {
            options.fuzzy_threshold = Some(threshold);
        }
        if self.no_fuzzy {
            options.fuzzy_threshold = None;
        }
        Ok(options)
    }

    fn jobs(&self) -> Vec<DocumentJob> {
        self.documents
            .iter()
            .map(|path| DocumentJob {
                path: path.clone(),
                output: self.output.clone(),
                language: self.language.clone(),
            })
            .collect()
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<i32> {
    let options = cli.merge_options()?;
    let sources = SourceSet::load(&cli.sources)?;

    let report = merge_documents(cli.jobs(), Arc::new(sources), Arc::new(options)).await;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(document) => {
                println!(
                    "{}: {}; {}",
                    outcome.path.display(),
                    document.summary,
                    document.stats
                );
                for diagnostic in &document.diagnostics {
                    println!("  skipped: {}", diagnostic);
                }
                for invalid in &document.validation {
                    println!("  needs review: {}", invalid);
                }
            }
            Err(e) => eprintln!("{}: failed: {}", outcome.path.display(), e),
        }
    }
    Ok(report.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.output.is_some() && cli.documents.len() > 1 {
        Cli::command()
            .error(
                ErrorKind::ArgumentConflict,
                "--output can only be used with a single document",
            )
            .exit();
    }

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
