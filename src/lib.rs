//! Translation catalogs in the TS document format
//!
//! - [`catalog`]: the in-memory model (contexts, messages, lifecycle states)
//! - [`ts`]: reading and writing TS documents
//! - [`plural`]: plural form selection per locale
//! - [`merge`]: synchronizing a catalog with newly extracted source strings
//! - [`lookup`]: runtime translation lookup and the compiled index format
//!
//! [`Translator`] ties the runtime side together for applications:
//!
//! ```
//! use ts_catalog::Translator;
//! use ts_catalog::lookup::LookupIndex;
//!
//! let document = r#"<TS version="2.1" language="fr_FR">
//! <context>
//!     <name>Search</name>
//!     <message numerus="yes">
//!         <source>%n file(s) found</source>
//!         <translation>
//!             <numerusform>%n fichier trouvé</numerusform>
//!             <numerusform>%n fichiers trouvés</numerusform>
//!         </translation>
//!     </message>
//! </context>
//! </TS>"#;
//! let catalog = ts_catalog::ts::parse_str(document).unwrap().catalog;
//!
//! let mut translator = Translator::new();
//! translator
//!     .with_lookup(LookupIndex::build(&catalog).unwrap())
//!     .with_locale("fr-FR");
//!
//! assert_eq!(
//!     translator.translate_n("Search", "%n file(s) found", None, 3),
//!     "3 fichiers trouvés"
//! );
//! assert_eq!(translator.translate("Search", "Cancel", None), "Cancel");
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub mod catalog;
pub mod error;
pub mod fsio;
pub mod lookup;
pub mod merge;
pub mod plural;
pub mod ts;


pub use catalog::{Catalog, Context, Message, MessageKey, TranslationState};
pub use error::{CatalogError, Result};
pub use lookup::{CompiledIndex, Lookup, LookupIndex};
pub use merge::{MergeOptions, SourceSet, merge};
pub use plural::PluralResolver;

/// Locale names compare case-insensitively and with `-` or `_` as separator.
fn normalize_locale(locale: &str) -> String {
    locale.to_lowercase().replace('-', "_")
}

/// Runtime translations for several locales, one of them current.
pub struct Translator {
    // Keyed by normalized locale, e.g. "fr_fr", "de", "pt_br"
    lookups: HashMap<String, Box<dyn Lookup + Send + Sync>>,
    current_locale: Option<String>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Translator {
            lookups: HashMap::new(),
            current_locale: None,
        }
    }

    /// Selects the locale used by [`Translator::translate`].
    pub fn with_locale(&mut self, locale: &str) -> &mut Self {
        self.current_locale = Some(normalize_locale(locale));
        self
    }

    pub fn get_current_locale(&self) -> Option<&str> {
        self.current_locale.as_deref()
    }

    /// Registers a lookup under the locale it declares, replacing any previous one.
    pub fn with_lookup(&mut self, lookup: impl Lookup + Send + Sync + 'static) -> &mut Self {
        self.lookups
            .insert(normalize_locale(lookup.locale()), Box::new(lookup));
        self
    }

    /// Loads a TS document and registers its finished translations.
    pub fn load_document(&mut self, path: &Path) -> Result<&mut Self> {
        let parsed = ts::parse_file(path)?;
        let index = LookupIndex::build(&parsed.catalog).map_err(|e| e.in_document(path))?;
        Ok(self.with_lookup(index))
    }

    /// Loads a compiled index produced by `ts-compile`.
    pub fn load_compiled(&mut self, path: &Path) -> Result<&mut Self> {
        let bytes = fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        let index = CompiledIndex::from_bytes(&bytes).map_err(|e| e.in_document(path))?;
        Ok(self.with_lookup(index))
    }

    /// Registered locales, sorted.
    pub fn locales(&self) -> Vec<&str> {
        let mut locales: Vec<&str> = self.lookups.keys().map(String::as_str).collect();
        locales.sort_unstable();
        locales
    }

    /// The lookup for `locale`, falling back to its language (`fr_ca` → `fr`).
    fn lookup_for(&self, locale: &str) -> Option<&(dyn Lookup + Send + Sync)> {
        let locale = normalize_locale(locale);
        if let Some(lookup) = self.lookups.get(&locale) {
            return Some(lookup.as_ref());
        }
        let language = locale.split('_').next()?;
        self.lookups.get(language).map(|lookup| lookup.as_ref())
    }

    /// Translates in a given locale; unknown locales return `source`.
    pub fn translate_in<'a>(
        &'a self,
        locale: &str,
        context: &str,
        source: &'a str,
        disambiguation: Option<&str>,
        count: Option<i64>,
    ) -> &'a str {
        match self.lookup_for(locale) {
            Some(lookup) => lookup.translate(context, source, disambiguation, count),
            None => source,
        }
    }

    /// Translates in the current locale.
    pub fn translate<'a>(
        &'a self,
        context: &str,
        source: &'a str,
        disambiguation: Option<&str>,
    ) -> &'a str {
        match &self.current_locale {
            Some(locale) => self.translate_in(locale, context, source, disambiguation, None),
            None => source,
        }
    }

    /// Translates a numerus message in the current locale and replaces `%n` with `count`.
    pub fn translate_n(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
        count: i64,
    ) -> String {
        let text = match &self.current_locale {
            Some(locale) => self.translate_in(locale, context, source, disambiguation, Some(count)),
            None => source,
        };
        lookup::substitute_count(text, count)
    }
}
