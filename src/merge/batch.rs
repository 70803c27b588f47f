//! Merging several locale documents against one source set
//!
//! Each document is an independent unit of work: it is parsed, merged, validated
//! and written on its own blocking task, and a failure in one document never stops
//! the others.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::{MergeOptions, MergeSummary, SourceSet, merge};
use crate::catalog::{Catalog, CatalogStats};
use crate::error::{CatalogError, MessageParseError, Result, ValidationError};
use crate::plural::PluralResolver;
use crate::ts;

/// One document to merge.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub path: PathBuf,
    /// Where to write the result, the input path when `None`
    pub output: Option<PathBuf>,
    /// Overrides the language declared by the document
    pub language: Option<String>,
}

impl DocumentJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DocumentJob {
            path: path.into(),
            output: None,
            language: None,
        }
    }

    fn output_path(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.path)
    }
}

/// What happened to a document that was merged and written.
#[derive(Debug)]
pub struct DocumentReport {
    pub summary: MergeSummary,
    pub stats: CatalogStats,
    /// Malformed entries skipped while reading the old document
    pub diagnostics: Vec<MessageParseError>,
    /// Messages moved back to review because they break catalog invariants
    pub validation: Vec<ValidationError>,
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub result: Result<DocumentReport>,
}

impl DocumentOutcome {
    /// `0` on success, otherwise the exit code of the failure.
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(report) if report.validation.is_empty() => 0,
            Ok(_) => 3,
            Err(e) => e.exit_code(),
        }
    }
}

/// Outcome of every document, in job order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchReport {
    /// Process exit code for the whole run.
    ///
    /// Structural failures (1) take precedence over IO failures (2), which take
    /// precedence over validation failures (3).
    pub fn exit_code(&self) -> i32 {
        let codes: Vec<i32> = self.outcomes.iter().map(DocumentOutcome::exit_code).collect();
        [1, 2, 3]
            .into_iter()
            .find(|code| codes.contains(code))
            .unwrap_or(0)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.exit_code() != 0)
    }
}

/// Reads a document, or starts an empty catalog when it does not exist yet.
fn load_or_create(path: &Path) -> Result<ts::ParsedDocument> {
    match ts::parse_file(path) {
        Err(CatalogError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            info!("{} does not exist, starting a new catalog", path.display());
            Ok(ts::ParsedDocument {
                catalog: Catalog::new(),
                diagnostics: Vec::new(),
                rejected: Vec::new(),
            })
        }
        other => other,
    }
}

/// Merges one document and writes the result atomically.
///
/// A document that fails validation is still written, with the offending messages
/// moved back to review.
pub fn merge_document(
    job: &DocumentJob,
    sources: &SourceSet,
    options: &MergeOptions,
) -> Result<DocumentReport> {
    let parsed = load_or_create(&job.path)?;
    let mut old = parsed.catalog;
    if let Some(language) = &job.language {
        old.set_language(Some(language.clone()));
    }
    let language = old
        .language()
        .ok_or_else(|| CatalogError::MissingLocale.in_document(&job.path))?;
    let resolver = PluralResolver::for_locale(language).map_err(|e| e.in_document(&job.path))?;

    let (mut merged, summary) = merge(&old, sources, options, &resolver);

    let mut validation = parsed.rejected;
    validation.extend(merged.validate(&resolver));
    if !validation.is_empty() {
        let reopened = merged.quarantine(&validation);
        warn!(
            "{}: {} validation error(s), {} message(s) reopened for review",
            job.path.display(),
            validation.len(),
            reopened
        );
    }

    ts::write_file(&merged, job.output_path())?;

    let stats = merged.stats();
    info!("{}: {}; {}", job.output_path().display(), summary, stats);
    Ok(DocumentReport {
        summary,
        stats,
        diagnostics: parsed.diagnostics,
        validation,
    })
}

/// Merges every job against the same source set, one blocking task per document.
pub async fn merge_documents(
    jobs: Vec<DocumentJob>,
    sources: Arc<SourceSet>,
    options: Arc<MergeOptions>,
) -> BatchReport {
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let sources = Arc::clone(&sources);
            let options = Arc::clone(&options);
            let path = job.path.clone();
            let handle =
                tokio::task::spawn_blocking(move || merge_document(&job, &sources, &options));
            (path, handle)
        })
        .collect();

    let mut report = BatchReport::default();
    for (path, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(CatalogError::io(&path, io::Error::other(e.to_string()))),
        };
        if let Err(e) = &result {
            warn!("{}", e);
        }
        report.outcomes.push(DocumentOutcome { path, result });
    }
    report
}
