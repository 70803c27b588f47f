//! Error types for catalog parsing, validation, merging and lookup compilation

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::MessageKey;

/// Errors that abort an operation on a whole document.
///
/// Problems confined to a single message are not errors: see
/// [`MessageParseError`] and [`ValidationError`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The document is not well-formed or lacks its root catalog element
    #[error("Structural parse error at byte {position}: {message}")]
    Structural { position: usize, message: String },

    /// A message with the same context, source and disambiguation already exists
    #[error("Duplicate message key: {0}")]
    DuplicateKey(MessageKey),

    /// No plural rule table entry exists for the locale
    #[error("Unknown locale: {0}")]
    UnknownLocale(String),

    /// The catalog does not declare a language and none was configured
    #[error("No target language configured for the catalog")]
    MissingLocale,

    /// Reading or writing a file failed
    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The extracted-sources manifest or a configuration file could not be read
    #[error("Invalid manifest '{}': {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    /// A compiled lookup artifact failed its structural checks
    #[error("Corrupt compiled index: {0}")]
    CorruptIndex(String),

    /// The catalog was produced but some messages violate catalog invariants
    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// Wraps a failure with the document it happened in
    #[error("{}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: Box<CatalogError>,
    },
}

impl CatalogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn in_document(self, path: impl Into<PathBuf>) -> Self {
        match self {
            // Already attributed
            CatalogError::Document { .. } | CatalogError::Io { .. } => self,
            other => CatalogError::Document {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Process exit code used by the command line tools.
    ///
    /// * `1` - the document could not be interpreted (structural error, unknown locale)
    /// * `2` - reading or writing a file failed
    /// * `3` - validation failed; partial output was still produced
    pub fn exit_code(&self) -> i32 {
        match self {
            CatalogError::Structural { .. }
            | CatalogError::UnknownLocale(_)
            | CatalogError::MissingLocale
            | CatalogError::DuplicateKey(_)
            | CatalogError::CorruptIndex(_) => 1,
            CatalogError::Io { .. } | CatalogError::Manifest { .. } => 2,
            CatalogError::Validation(_) => 3,
            CatalogError::Document { source, .. } => source.exit_code(),
        }
    }
}

/// A malformed message entry. The parser skips the entry and keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParseError {
    /// Name of the enclosing context, when it was known
    pub context: Option<String>,
    /// Byte offset of the offending element in the document
    pub position: usize,
    pub reason: String,
}

impl std::fmt::Display for MessageParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(
                f,
                "message in context '{}' at byte {} skipped: {}",
                context, self.position, self.reason
            ),
            None => write!(f, "entry at byte {} skipped: {}", self.position, self.reason),
        }
    }
}

/// A catalog invariant violation found after the catalog was built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Stored plural forms do not match what the locale requires
    #[error("{key}: expected {expected} plural form(s), found {found}")]
    PluralFormCount {
        key: MessageKey,
        expected: usize,
        found: usize,
    },

    /// The document repeats a message key; the later entry was not loaded
    #[error("{key}: duplicate message key")]
    DuplicateKey { key: MessageKey },
}

impl ValidationError {
    pub fn key(&self) -> &MessageKey {
        match self {
            ValidationError::PluralFormCount { key, .. } => key,
            ValidationError::DuplicateKey { key } => key,
        }
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
