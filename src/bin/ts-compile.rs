use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ts_catalog::error::ValidationError;
use ts_catalog::lookup::compile;
use ts_catalog::{CatalogError, PluralResolver, Result, fsio, ts};

/// Validate a TS document and compile it into a runtime lookup index
#[derive(Parser, Debug)]
#[command(name = "ts-compile", version)]
struct Cli {
    /// TS document to compile
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,

    /// Index file to write (default: the document path with a .qi extension)
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Target language, overriding the one declared by the document
    #[arg(long, short = 'l', value_name = "LOCALE")]
    language: Option<String>,

    /// Only validate and print statistics
    #[arg(long)]
    check: bool,

    /// Show debug output
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_output(document: &Path) -> PathBuf {
    document.with_extension("qi")
}

fn run(cli: &Cli) -> Result<i32> {
    let document = cli.document.as_path();
    let parsed = ts::parse_file(document)?;
    let mut catalog = parsed.catalog;
    if let Some(language) = &cli.language {
        catalog.set_language(Some(language.clone()));
    }
    let language = catalog
        .language()
        .ok_or_else(|| CatalogError::MissingLocale.in_document(document))?;
    let resolver = PluralResolver::for_locale(language).map_err(|e| e.in_document(document))?;

    let mut problems: Vec<ValidationError> = parsed.rejected;
    problems.extend(catalog.validate(&resolver));
    for diagnostic in &parsed.diagnostics {
        println!("skipped: {}", diagnostic);
    }
    for problem in &problems {
        println!("invalid: {}", problem);
    }
    println!("{}: {}", document.display(), catalog.stats());

    if !cli.check {
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output(document));
        let bytes = compile(&catalog)?;
        fsio::write_atomic(&output, &bytes)?;
        info!("Wrote {} ({} bytes)", output.display(), bytes.len());
    }

    if problems.is_empty() {
        Ok(0)
    } else {
        warn!("{} message(s) are not served until fixed", problems.len());
        Ok(3)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
