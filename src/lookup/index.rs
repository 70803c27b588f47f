use std::collections::HashMap;

use tracing::debug;

use super::{Lookup, catalog_resolver, form_index, indexed_messages};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::plural::PluralResolver;

#[derive(Debug)]
struct Entry {
    disambiguation: Option<String>,
    numerus: bool,
    // Empty when the message is known but not servable
    forms: Vec<String>,
}

/// In-memory lookup built from a catalog.
///
/// Keyed by context, then source, then disambiguation, so a lookup borrows its
/// arguments instead of building an owned key.
#[derive(Debug)]
pub struct LookupIndex {
    resolver: PluralResolver,
    entries: HashMap<String, HashMap<String, Vec<Entry>>>,
    len: usize,
}

impl LookupIndex {
    /// Builds the index for the catalog's declared language.
    ///
    /// # Errors
    /// [`crate::CatalogError::MissingLocale`] when the catalog declares no language,
    /// [`crate::CatalogError::UnknownLocale`] when its plural rules are unknown.
    pub fn build(catalog: &Catalog) -> Result<Self> {
        let resolver = catalog_resolver(catalog)?;
        Ok(Self::with_resolver(catalog, resolver))
    }

    /// Builds the index using an explicit resolver, ignoring the catalog's language.
    pub fn with_resolver(catalog: &Catalog, resolver: PluralResolver) -> Self {
        let mut entries: HashMap<String, HashMap<String, Vec<Entry>>> = HashMap::new();
        let mut len = 0;
        for (context, message, servable) in indexed_messages(catalog, &resolver) {
            let forms = if servable {
                len += 1;
                message.translation.variants.clone()
            } else {
                Vec::new()
            };
            entries
                .entry(context.to_string())
                .or_default()
                .entry(message.source().to_string())
                .or_default()
                .push(Entry {
                    disambiguation: message.disambiguation().map(str::to_string),
                    numerus: message.is_numerus(),
                    forms,
                });
        }
        debug!(
            "Lookup index for {} holds {} of {} messages",
            resolver.locale(),
            len,
            catalog.len()
        );
        LookupIndex {
            resolver,
            entries,
            len,
        }
    }

    /// Number of servable messages.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, context: &str, source: &str, disambiguation: Option<&str>) -> Option<&Entry> {
        let candidates = self.entries.get(context)?.get(source)?;
        let disambiguation = disambiguation.filter(|d| !d.is_empty());
        let exact = candidates
            .iter()
            .find(|entry| entry.disambiguation.as_deref() == disambiguation);
        match (exact, disambiguation) {
            (Some(entry), _) => Some(entry),
            (None, Some(_)) => candidates.iter().find(|entry| entry.disambiguation.is_none()),
            (None, None) => None,
        }
    }
}

impl Lookup for LookupIndex {
    fn locale(&self) -> &str {
        self.resolver.locale()
    }

    fn translate<'a>(
        &'a self,
        context: &str,
        source: &'a str,
        disambiguation: Option<&str>,
        count: Option<i64>,
    ) -> &'a str {
        self.find(context, source, disambiguation)
            .and_then(|entry| {
                entry
                    .forms
                    .get(form_index(entry.numerus, count, &self.resolver))
            })
            .map(String::as_str)
            .filter(|text| !text.is_empty())
            .unwrap_or(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    fn english_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.set_language(Some("en".to_string()));

        let files = catalog
            .add_message("Search", "%n file(s) found", None, true)
            .unwrap();
        files.set_plural_forms(vec!["%1 file found".to_string(), "%1 files found".to_string()]);
        files.approve();

        let open = catalog.add_message("Dialog", "Open", None, false).unwrap();
        open.set_translation("Open file");
        open.approve();

        let open_adj = catalog
            .add_message("Dialog", "Open", Some("state"), false)
            .unwrap();
        open_adj.set_translation("Opened");
        open_adj.approve();

        catalog
            .add_message("Dialog", "Pending", None, false)
            .unwrap()
            .set_translation("Not reviewed");
        catalog
    }

    #[test]
    fn test_plural_selection() {
        let index = LookupIndex::build(&english_catalog()).unwrap();
        let source = "%n file(s) found";
        assert_eq!(index.translate("Search", source, None, Some(1)), "%1 file found");
        assert_eq!(index.translate("Search", source, None, Some(0)), "%1 files found");
        assert_eq!(index.translate("Search", source, None, Some(5)), "%1 files found");
        assert_eq!(index.translate("Search", source, None, None), "%1 file found");
    }

    #[test]
    fn test_disambiguation_fallback() {
        let index = LookupIndex::build(&english_catalog()).unwrap();
        assert_eq!(index.translate("Dialog", "Open", Some("state"), None), "Opened");
        assert_eq!(index.translate("Dialog", "Open", None, None), "Open file");
        assert_eq!(index.translate("Dialog", "Open", Some("verb"), None), "Open file");
    }

    #[test]
    fn test_unfinished_exact_key_does_not_fall_back() {
        let mut catalog = english_catalog();
        catalog
            .add_message("Dialog", "Open", Some("draft"), false)
            .unwrap()
            .set_translation("Opening");
        let index = LookupIndex::build(&catalog).unwrap();
        assert_eq!(index.translate("Dialog", "Open", Some("draft"), None), "Open");
        assert_eq!(index.translate("Dialog", "Open", Some("other"), None), "Open file");
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_missing_translation_returns_source() {
        let index = LookupIndex::build(&english_catalog()).unwrap();
        assert_eq!(index.translate("Dialog", "Pending", None, None), "Pending");
        assert_eq!(index.translate("Dialog", "Unknown", None, None), "Unknown");
        assert_eq!(index.translate("Nowhere", "Open", None, None), "Open");
        assert_eq!(index.translate("Dialog", "", None, None), "");
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_empty_plural_form_returns_source() {
        let mut catalog = Catalog::new();
        catalog.set_language(Some("en".to_string()));
        let message = catalog.add_message("A", "%n item(s)", None, true).unwrap();
        message.set_plural_forms(vec!["%n item".to_string(), String::new()]);
        message.approve();
        let index = LookupIndex::build(&catalog).unwrap();
        assert_eq!(index.translate("A", "%n item(s)", None, Some(1)), "%n item");
        assert_eq!(index.translate("A", "%n item(s)", None, Some(3)), "%n item(s)");
    }

    #[test]
    fn test_unknown_locale() {
        let mut catalog = Catalog::new();
        catalog.set_language(Some("xx".to_string()));
        assert!(matches!(
            LookupIndex::build(&catalog),
            Err(CatalogError::UnknownLocale(_))
        ));
    }
}
