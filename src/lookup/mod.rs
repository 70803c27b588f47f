//! Runtime lookup of translations
//!
//! Two implementations answer the same question, "what text does the application
//! show for this key and count":
//!
//! - [`LookupIndex`]: a hash index built in memory from a parsed catalog
//! - [`CompiledIndex`]: a compact, deterministic binary artifact produced by
//!   [`compile`], loaded without re-parsing the document
//!
//! Both know every live message but only serve finished translations. A known key
//! that cannot be served, and any miss, falls back to the source string, so
//! lookups never fail.

mod compiled;
mod index;

pub use compiled::{CompiledIndex, compile};
pub use index::LookupIndex;

use crate::catalog::{Catalog, Message, TranslationState};
use crate::error::{CatalogError, Result};
use crate::plural::PluralResolver;

/// Translation lookup for one locale.
pub trait Lookup {
    /// Locale of the translations, as declared by the catalog.
    fn locale(&self) -> &str;

    /// Text to display for a key.
    ///
    /// When the key is unknown and a disambiguation was given, the key without
    /// disambiguation is tried next. When that also misses, or the key is known but
    /// its translation is unfinished or the selected form is empty, `source` itself
    /// is returned. For numerus messages `count` selects the plural form; without a
    /// count the first form is used.
    fn translate<'a>(
        &'a self,
        context: &str,
        source: &'a str,
        disambiguation: Option<&str>,
        count: Option<i64>,
    ) -> &'a str;
}

/// Replaces every `%n` in `text` with `count`.
pub fn substitute_count(text: &str, count: i64) -> String {
    text.replace("%n", &count.to_string())
}

/// Resolver for the catalog's declared language.
pub(crate) fn catalog_resolver(catalog: &Catalog) -> Result<PluralResolver> {
    let language = catalog.language().ok_or(CatalogError::MissingLocale)?;
    PluralResolver::for_locale(language)
}

/// Whether a message's translation can be served: finished, with text, and with
/// the number of forms the locale requires.
pub(crate) fn is_servable(message: &Message, resolver: &PluralResolver) -> bool {
    let expected = if message.is_numerus() {
        resolver.required_form_count()
    } else {
        1
    };
    message.state() == TranslationState::Finished
        && message.translation.variants.len() == expected
        && !message.translation.is_empty()
}

/// Live messages with whether each one is servable. Obsolete and vanished
/// messages are left out, so lookups treat them as unknown keys.
pub(crate) fn indexed_messages<'c>(
    catalog: &'c Catalog,
    resolver: &PluralResolver,
) -> impl Iterator<Item = (&'c str, &'c Message, bool)> {
    catalog
        .all_messages()
        .filter(|(_, message)| message.is_live())
        .map(move |(context, message)| (context, message, is_servable(message, resolver)))
}

/// Index of the stored form that `count` selects.
pub(crate) fn form_index(numerus: bool, count: Option<i64>, resolver: &PluralResolver) -> usize {
    match (numerus, count) {
        (true, Some(count)) => resolver.form_index(count),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_count() {
        assert_eq!(substitute_count("%n files found", 5), "5 files found");
        assert_eq!(substitute_count("%n of %n", 2), "2 of 2");
        assert_eq!(substitute_count("no placeholder", 1), "no placeholder");
    }

    #[test]
    fn test_indexed_messages_mark_servable_and_skip_absent() {
        let mut catalog = Catalog::new();
        catalog.set_language(Some("en".to_string()));
        let done = catalog.add_message("A", "done", None, false).unwrap();
        done.set_translation("Done");
        done.approve();
        catalog
            .add_message("A", "pending", None, false)
            .unwrap()
            .set_translation("Pending");
        let empty = catalog.add_message("A", "empty", None, false).unwrap();
        empty.approve();
        let gone = catalog.add_message("A", "gone", None, false).unwrap();
        gone.set_translation("Gone");
        gone.approve();
        gone.apply(crate::catalog::Transition::SourceAbsent);
        let short = catalog.add_message("A", "%n file(s)", None, true).unwrap();
        short.set_plural_forms(vec!["%n file".to_string()]);
        short.approve();

        let resolver = catalog_resolver(&catalog).unwrap();
        let indexed: Vec<(&str, bool)> = indexed_messages(&catalog, &resolver)
            .map(|(_, m, servable)| (m.source(), servable))
            .collect();
        assert_eq!(
            indexed,
            vec![
                ("done", true),
                ("pending", false),
                ("empty", false),
                ("%n file(s)", false),
            ]
        );
    }

    #[test]
    fn test_catalog_without_language() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog_resolver(&catalog),
            Err(CatalogError::MissingLocale)
        ));
    }
}
