use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Location, MessageKey};
use crate::error::{CatalogError, Result};

/// One extracted source string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    #[serde(default)]
    pub numerus: bool,
    /// Developer note shown to translators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
}

impl SourceMessage {
    pub fn new(source: &str) -> Self {
        SourceMessage {
            source: source.to_string(),
            disambiguation: None,
            numerus: false,
            comment: None,
            locations: Vec::new(),
        }
    }

    pub fn key(&self, context: &str) -> MessageKey {
        MessageKey::new(context, &self.source, self.disambiguation.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    pub name: String,
    #[serde(default)]
    pub messages: Vec<SourceMessage>,
}

/// The strings an application currently uses, as produced by its extractor.
///
/// The manifest file is JSON:
/// ```json
/// {
///     "contexts": [
///         {
///             "name": "Core::MainWindow",
///             "messages": [
///                 { "source": "&Save", "locations": [{ "filename": "main.cpp", "line": 42 }] },
///                 { "source": "%n file(s) found", "numerus": true },
///                 { "source": "Open", "disambiguation": "verb", "comment": "Toolbar" }
///             ]
///         }
///     ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSet {
    #[serde(default)]
    pub contexts: Vec<SourceContext>,
}

impl SourceSet {
    /// Loads an extracted-sources manifest.
    ///
    /// # Errors
    /// [`CatalogError::Io`] when the file cannot be read, [`CatalogError::Manifest`]
    /// when it is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The sources a catalog's live messages were extracted from.
    ///
    /// Obsolete and vanished messages are left out: the application no longer
    /// uses them.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let contexts = catalog
            .contexts()
            .iter()
            .map(|context| SourceContext {
                name: context.name().to_string(),
                messages: context
                    .messages()
                    .iter()
                    .filter(|message| message.is_live())
                    .map(|message| SourceMessage {
                        source: message.source().to_string(),
                        disambiguation: message.disambiguation().map(str::to_string),
                        numerus: message.is_numerus(),
                        comment: message.extra_comment.clone(),
                        locations: message.locations.clone(),
                    })
                    .collect(),
            })
            .filter(|context| !context.messages.is_empty())
            .collect();
        SourceSet { contexts }
    }

    /// Every source with its context name, in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceMessage)> {
        self.contexts.iter().flat_map(|context| {
            context
                .messages
                .iter()
                .map(move |message| (context.name.as_str(), message))
        })
    }

    pub fn len(&self) -> usize {
        self.contexts.iter().map(|context| context.messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Transition;
    use tempfile::TempDir;

    #[test]
    fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        fs::write(
            &path,
            r#"{
                "contexts": [
                    {
                        "name": "Core::MainWindow",
                        "messages": [
                            { "source": "&Save", "locations": [{ "filename": "main.cpp", "line": 42 }] },
                            { "source": "%n file(s) found", "numerus": true },
                            { "source": "Open", "disambiguation": "verb", "comment": "Toolbar" }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        let sources = SourceSet::load(&path).unwrap();
        assert_eq!(sources.len(), 3);
        let all: Vec<_> = sources.iter().collect();
        assert_eq!(all[0].0, "Core::MainWindow");
        assert_eq!(all[0].1.locations[0].line, Some(42));
        assert!(all[1].1.numerus);
        assert_eq!(all[2].1.disambiguation.as_deref(), Some("verb"));
        assert_eq!(all[2].1.comment.as_deref(), Some("Toolbar"));
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        fs::write(&path, r#"{ "contexts": [ { "messages": [] } ] }"#).unwrap();
        let err = SourceSet::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Manifest { .. }));
        assert_eq!(err.exit_code(), 2);

        let missing = SourceSet::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, CatalogError::Io { .. }));
    }

    #[test]
    fn test_from_catalog_skips_absent_messages() {
        let mut catalog = Catalog::new();
        catalog.add_message("A", "kept", Some("menu"), false).unwrap();
        catalog
            .add_message("A", "gone", None, false)
            .unwrap()
            .apply(Transition::SourceAbsent);
        catalog
            .add_message("B", "old", None, false)
            .unwrap()
            .apply(Transition::SourceAbsent);

        let sources = SourceSet::from_catalog(&catalog);
        assert_eq!(sources.contexts.len(), 1);
        assert_eq!(sources.len(), 1);
        let (context, message) = sources.iter().next().unwrap();
        assert_eq!(message.key(context), MessageKey::new("A", "kept", Some("menu")));
    }
}
