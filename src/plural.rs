//! Plural form resolution
//!
//! Translation documents store the plural forms of a numerus message as an ordered
//! list. The order and the number of forms per language come from an embedded table
//! ([`plural_form_table`]); which form a given count selects comes from the CLDR
//! cardinal rules shipped with ICU4X.
//!
//! For example:
//! - Japanese has 1 form: other
//! - English and French have 2 forms: one, other
//! - Russian has 3 forms: one (1, 21), few (2-4, 22-24), many (0, 5-20)
//! - Arabic has 6 forms: zero, one, two, few, many, other
//!
//! CLDR categories that a language's table does not list (such as French `many` for
//! one million) select the `other` form, or the last form when there is no `other`.

use icu_locale::Locale;
use icu_plurals::{PluralCategory, PluralRuleType, PluralRules};

use crate::error::{CatalogError, Result};

use PluralCategory::{Few, Many, One, Other, Two, Zero};

/// Ordered plural forms stored in documents for a language subtag.
///
/// Returns `None` for languages without an entry; those catalogs cannot be validated
/// or compiled.
pub fn plural_form_table(language: &str) -> Option<&'static [PluralCategory]> {
    let forms: &'static [PluralCategory] = match language {
        // No plural distinction
        "ja" | "ko" | "zh" | "vi" | "th" | "id" | "ms" | "lo" | "my" | "km" | "jv" => &[Other],

        // Singular and plural
        "en" | "de" | "nl" | "sv" | "da" | "nb" | "nn" | "no" | "fi" | "et" | "el" | "hu"
        | "it" | "es" | "pt" | "ca" | "eu" | "gl" | "bg" | "tr" | "az" | "ka" | "hi" | "bn"
        | "ur" | "fa" | "fr" | "mk" | "is" | "sq" | "af" | "eo" | "fy" | "ta" | "te" | "ml"
        | "kn" | "mr" | "gu" | "pa" | "ne" | "si" | "kk" | "ky" | "uz" | "mn" | "sw" | "am"
        | "hy" | "fil" | "oc" => &[One, Other],

        // East Slavic and Polish: other only covers fractions
        "ru" | "uk" | "be" | "pl" => &[One, Few, Many],

        "cs" | "sk" | "hr" | "sr" | "bs" | "lt" | "ro" => &[One, Few, Other],
        "lv" => &[Zero, One, Other],
        "he" => &[One, Two, Other],
        "sl" => &[One, Two, Few, Other],
        "gd" => &[One, Two, Few, Other],
        "ga" => &[One, Two, Few, Many, Other],
        "ar" | "cy" => &[Zero, One, Two, Few, Many, Other],
        _ => return None,
    };
    Some(forms)
}

/// Parse a document language such as `fr_FR`, `pt-BR` or `zh_Hans_CN`.
fn parse_locale(locale_str: &str) -> Result<Locale> {
    locale_str
        .replace('_', "-")
        .parse::<Locale>()
        .map_err(|_| CatalogError::UnknownLocale(locale_str.to_string()))
}

/// Number of plural forms a numerus message needs in `locale`.
///
/// # Errors
/// [`CatalogError::UnknownLocale`] if the locale cannot be parsed or has no table entry.
pub fn required_form_count(locale_str: &str) -> Result<usize> {
    let locale = parse_locale(locale_str)?;
    plural_form_table(locale.id.language.as_str())
        .map(<[PluralCategory]>::len)
        .ok_or_else(|| CatalogError::UnknownLocale(locale_str.to_string()))
}

/// Maps counts to plural-form indexes for one locale.
///
/// Pure and immutable once built; build one per locale and share it by reference.
pub struct PluralResolver {
    locale: String,
    rules: PluralRules,
    forms: &'static [PluralCategory],
}

impl std::fmt::Debug for PluralResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluralResolver")
            .field("locale", &self.locale)
            .field("forms", &self.forms)
            .finish()
    }
}

impl PluralResolver {
    /// Builds the resolver for a locale.
    ///
    /// # Arguments
    /// * `locale_str` - Document language code (e.g. "en", "fr_FR", "ru", "ar")
    ///
    /// # Errors
    /// [`CatalogError::UnknownLocale`] if the locale is invalid, has no entry in the
    /// plural form table, or ICU has no cardinal rules for it. This is a configuration
    /// error: nothing in the catalog can be checked without it.
    pub fn for_locale(locale_str: &str) -> Result<Self> {
        let locale = parse_locale(locale_str)?;
        let forms = plural_form_table(locale.id.language.as_str())
            .ok_or_else(|| CatalogError::UnknownLocale(locale_str.to_string()))?;

        let rules = PluralRules::try_new(locale.into(), PluralRuleType::Cardinal.into())
            .map_err(|_| CatalogError::UnknownLocale(locale_str.to_string()))?;

        Ok(PluralResolver {
            locale: locale_str.to_string(),
            rules,
            forms,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Number of plural forms (`K`) numerus messages must carry.
    pub fn required_form_count(&self) -> usize {
        self.forms.len()
    }

    /// CLDR categories in stored form order.
    pub fn categories(&self) -> &'static [PluralCategory] {
        self.forms
    }

    /// Index in `[0, K)` of the plural form selected by `count`.
    ///
    /// Negative counts are treated like their absolute value.
    pub fn form_index(&self, count: i64) -> usize {
        let category = self.rules.category_for(count.unsigned_abs());
        self.index_of(category)
    }

    fn index_of(&self, category: PluralCategory) -> usize {
        if let Some(index) = self.forms.iter().position(|c| *c == category) {
            return index;
        }
        self.forms
            .iter()
            .position(|c| *c == Other)
            .unwrap_or(self.forms.len().saturating_sub(1))
    }
}
