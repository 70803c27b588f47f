//! In-memory translation catalog
//!
//! A [`Catalog`] is an ordered list of [`Context`]s, each holding an ordered list of
//! [`Message`]s. The `(context, source, disambiguation)` triple of every message is
//! unique across the whole catalog and is the key used by the merge engine and the
//! runtime lookup index.
//!
//! Context names do not have to be unique: a document may repeat a context, and the
//! catalog keeps both groups in document order while still enforcing key uniqueness
//! across them.
//!
//! # Example
//!
//! ```
//! use ts_catalog::catalog::{Catalog, TranslationState};
//!
//! let mut catalog = Catalog::new();
//! catalog.set_language(Some("fr_FR".to_string()));
//! let message = catalog
//!     .add_message("Core::MainWindow", "&Save", None, false)
//!     .unwrap();
//! message.set_translation("&Enregistrer");
//! message.approve();
//!
//! let found = catalog.find_message("Core::MainWindow", "&Save", None).unwrap();
//! assert_eq!(found.state(), TranslationState::Finished);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result, ValidationError};
use crate::plural::PluralResolver;

/// Lifecycle state of a message's translation.
///
/// In the document format this is the `type` attribute of `<translation>`;
/// a missing attribute means [`TranslationState::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationState {
    Finished,
    Unfinished,
    Obsolete,
    Vanished,
}

/// Events that move a message along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The source string is still extracted from the application
    SourcePresent,
    /// The source string was not extracted in this merge
    SourceAbsent,
    /// The message was re-seeded from a different (or changed) source
    SourceChanged,
    /// A translator accepted the current text
    Approved,
    /// The text needs another review (for example after a validation failure)
    Reopened,
}

impl TranslationState {
    /// The only place lifecycle states change.
    ///
    /// ```text
    /// Unfinished --Approved--> Finished --Reopened/SourceChanged--> Unfinished
    /// Finished/Unfinished --SourceAbsent--> Obsolete --SourceAbsent--> Vanished
    /// Obsolete/Vanished --SourcePresent/SourceChanged--> Unfinished
    /// ```
    pub fn transition(self, event: Transition) -> TranslationState {
        use TranslationState::*;
        match (self, event) {
            (Finished, Transition::SourcePresent) => Finished,
            (Unfinished, Transition::SourcePresent) => Unfinished,
            (Obsolete | Vanished, Transition::SourcePresent) => Unfinished,

            (Finished | Unfinished, Transition::SourceAbsent) => Obsolete,
            (Obsolete | Vanished, Transition::SourceAbsent) => Vanished,

            (_, Transition::SourceChanged) => Unfinished,

            (Finished | Unfinished, Transition::Approved) => Finished,
            (Obsolete | Vanished, Transition::Approved) => self,

            (Finished, Transition::Reopened) => Unfinished,
            (_, Transition::Reopened) => self,
        }
    }

    /// Whether the message is still extracted from the application.
    pub fn is_live(self) -> bool {
        matches!(self, TranslationState::Finished | TranslationState::Unfinished)
    }

    /// Value of the `type` attribute, `None` for finished translations.
    pub fn as_type_attr(self) -> Option<&'static str> {
        match self {
            TranslationState::Finished => None,
            TranslationState::Unfinished => Some("unfinished"),
            TranslationState::Obsolete => Some("obsolete"),
            TranslationState::Vanished => Some("vanished"),
        }
    }

    pub fn from_type_attr(value: Option<&str>) -> Option<TranslationState> {
        match value {
            None => Some(TranslationState::Finished),
            Some("unfinished") => Some(TranslationState::Unfinished),
            Some("obsolete") => Some(TranslationState::Obsolete),
            Some("vanished") => Some(TranslationState::Vanished),
            Some(_) => None,
        }
    }

    /// Consecutive absent merges a state stands for when nothing more is recorded.
    pub fn implied_absent_merges(self) -> u32 {
        match self {
            TranslationState::Finished | TranslationState::Unfinished => 0,
            TranslationState::Obsolete => 1,
            TranslationState::Vanished => 2,
        }
    }
}

/// The lookup key of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    pub context: String,
    pub source: String,
    pub disambiguation: Option<String>,
}

impl MessageKey {
    pub fn new(context: &str, source: &str, disambiguation: Option<&str>) -> Self {
        MessageKey {
            context: context.to_string(),
            source: source.to_string(),
            disambiguation: normalize_disambiguation(disambiguation).map(str::to_string),
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/\"{}\"", self.context, self.source)?;
        if let Some(disambiguation) = &self.disambiguation {
            write!(f, " ({})", disambiguation)?;
        }
        Ok(())
    }
}

/// An empty disambiguation is the same as none.
pub(crate) fn normalize_disambiguation(disambiguation: Option<&str>) -> Option<&str> {
    disambiguation.filter(|d| !d.is_empty())
}

/// Where a source string was found in the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

/// Translated text and its lifecycle state.
///
/// Non-numerus messages carry exactly one variant; numerus messages carry one
/// variant per plural form of the catalog's locale. All variants share one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub state: TranslationState,
    pub variants: Vec<String>,
}

impl Translation {
    pub fn unfinished(form_count: usize) -> Self {
        Translation {
            state: TranslationState::Unfinished,
            variants: vec![String::new(); form_count],
        }
    }

    /// First variant, or the empty string.
    pub fn text(&self) -> &str {
        self.variants.first().map(String::as_str).unwrap_or("")
    }

    /// True when no variant carries any text.
    pub fn is_empty(&self) -> bool {
        self.variants.iter().all(String::is_empty)
    }
}

/// One translatable source string with its metadata and translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    source: String,
    disambiguation: Option<String>,
    numerus: bool,
    pub translation: Translation,
    /// Note left by the translator
    pub translator_comment: Option<String>,
    /// Note left by the developer, extracted with the source
    pub extra_comment: Option<String>,
    /// Former source of a reused translation; marks the text as a suggestion
    pub old_source: Option<String>,
    pub locations: Vec<Location>,
    /// Consecutive merges in which the source was not extracted
    pub absent_merges: u32,
    /// Opaque `extra-*` elements, kept verbatim
    pub extras: Vec<(String, String)>,
}

impl Message {
    /// Creates an unfinished message. Numerus messages start without plural
    /// forms; size them with [`Message::ensure_form_count`].
    pub fn new(source: &str, disambiguation: Option<&str>, numerus: bool) -> Self {
        Message {
            source: source.to_string(),
            disambiguation: normalize_disambiguation(disambiguation).map(str::to_string),
            numerus,
            translation: Translation::unfinished(if numerus { 0 } else { 1 }),
            translator_comment: None,
            extra_comment: None,
            old_source: None,
            locations: Vec::new(),
            absent_merges: 0,
            extras: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn disambiguation(&self) -> Option<&str> {
        self.disambiguation.as_deref()
    }

    pub fn is_numerus(&self) -> bool {
        self.numerus
    }

    pub fn state(&self) -> TranslationState {
        self.translation.state
    }

    pub fn is_live(&self) -> bool {
        self.translation.state.is_live()
    }

    pub fn key(&self, context: &str) -> MessageKey {
        MessageKey {
            context: context.to_string(),
            source: self.source.clone(),
            disambiguation: self.disambiguation.clone(),
        }
    }

    /// Applies a lifecycle event to the translation state.
    pub fn apply(&mut self, event: Transition) -> TranslationState {
        self.translation.state = self.translation.state.transition(event);
        self.translation.state
    }

    /// Replaces the text of a non-numerus message (or the first plural form).
    /// The state is left alone; call [`Message::approve`] to finish it.
    pub fn set_translation(&mut self, text: &str) {
        match self.translation.variants.first_mut() {
            Some(first) => *first = text.to_string(),
            None => self.translation.variants.push(text.to_string()),
        }
    }

    pub fn set_plural_forms(&mut self, forms: Vec<String>) {
        self.translation.variants = forms;
    }

    /// Marks the current text as authoritative.
    pub fn approve(&mut self) {
        self.apply(Transition::Approved);
        if self.translation.state == TranslationState::Finished {
            self.old_source = None;
        }
    }

    /// Pads with empty forms or drops trailing forms so exactly `count` remain.
    pub fn ensure_form_count(&mut self, count: usize) {
        self.translation.variants.resize(count, String::new());
    }

    /// Turns the message into (or out of) a numerus message.
    ///
    /// Existing text moves into the first form; the translation needs review.
    pub fn set_numerus(&mut self, numerus: bool, form_count: usize) {
        if self.numerus == numerus {
            return;
        }
        let first = self.translation.text().to_string();
        self.numerus = numerus;
        self.translation.variants = if numerus {
            let mut forms = vec![String::new(); form_count.max(1)];
            forms[0] = first;
            forms
        } else {
            vec![first]
        };
        self.apply(Transition::SourceChanged);
    }
}

/// A named group of messages, typically one per UI component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    name: String,
    messages: Vec<Message>,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Key fields of a message are read-only, so handing out mutable messages
    /// cannot break the catalog index.
    pub fn messages_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.messages.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Message counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub finished: usize,
    pub unfinished: usize,
    pub obsolete: usize,
    pub vanished: usize,
}

impl std::fmt::Display for CatalogStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} finished, {} unfinished, {} obsolete, {} vanished",
            self.finished, self.unfinished, self.obsolete, self.vanished
        )
    }
}

/// Position of a message: (context index, message index).
type Slot = (usize, usize);

/// Ordered collection of contexts for one target language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    version: Option<String>,
    language: Option<String>,
    source_language: Option<String>,
    contexts: Vec<Context>,
    index: HashMap<MessageKey, Slot>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            version: Some("2.1".to_string()),
            ..Default::default()
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    /// Target language of the translations, e.g. `fr_FR`.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }

    pub fn source_language(&self) -> Option<&str> {
        self.source_language.as_deref()
    }

    pub fn set_source_language(&mut self, language: Option<String>) {
        self.source_language = language;
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> impl Iterator<Item = &mut Context> {
        self.contexts.iter_mut()
    }

    /// Appends a new context group and returns its position.
    ///
    /// Messages added afterwards under the same name go into this group.
    pub fn add_context(&mut self, name: &str) -> usize {
        self.contexts.push(Context {
            name: name.to_string(),
            messages: Vec::new(),
        });
        self.contexts.len() - 1
    }

    /// Creates an unfinished message in the last context named `context`,
    /// creating the context when needed.
    ///
    /// # Errors
    /// [`CatalogError::DuplicateKey`] when the key is already present.
    pub fn add_message(
        &mut self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
        numerus: bool,
    ) -> Result<&mut Message> {
        self.push_message(context, Message::new(source, disambiguation, numerus))
    }

    /// Inserts a fully built message, see [`Catalog::add_message`].
    pub fn push_message(&mut self, context: &str, message: Message) -> Result<&mut Message> {
        let key = message.key(context);
        if self.index.contains_key(&key) {
            return Err(CatalogError::DuplicateKey(key));
        }
        let context_index = match self.contexts.iter().rposition(|c| c.name == context) {
            Some(index) => index,
            None => self.add_context(context),
        };
        let group = &mut self.contexts[context_index];
        group.messages.push(message);
        let slot = (context_index, group.messages.len() - 1);
        self.index.insert(key, slot);
        Ok(&mut self.contexts[slot.0].messages[slot.1])
    }

    pub fn find_message(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
    ) -> Option<&Message> {
        let key = MessageKey::new(context, source, disambiguation);
        self.get(&key)
    }

    pub fn find_message_mut(
        &mut self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
    ) -> Option<&mut Message> {
        let key = MessageKey::new(context, source, disambiguation);
        self.get_mut(&key)
    }

    pub fn get(&self, key: &MessageKey) -> Option<&Message> {
        let &(c, m) = self.index.get(key)?;
        self.contexts.get(c)?.messages.get(m)
    }

    pub fn get_mut(&mut self, key: &MessageKey) -> Option<&mut Message> {
        let &(c, m) = self.index.get(key)?;
        self.contexts.get_mut(c)?.messages.get_mut(m)
    }

    pub fn contains(&self, key: &MessageKey) -> bool {
        self.index.contains_key(key)
    }

    /// Every message with its context name, in document order.
    pub fn all_messages(&self) -> impl Iterator<Item = (&str, &Message)> {
        self.contexts.iter().flat_map(|context| {
            context
                .messages
                .iter()
                .map(move |message| (context.name.as_str(), message))
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Checks every message against the plural rules of the catalog's locale.
    ///
    /// Side-effect free; reports all violations instead of stopping at the first.
    pub fn validate(&self, resolver: &PluralResolver) -> Vec<ValidationError> {
        let required = resolver.required_form_count();
        self.all_messages()
            .filter_map(|(context, message)| {
                let expected = if message.numerus { required } else { 1 };
                let found = message.translation.variants.len();
                (found != expected).then(|| ValidationError::PluralFormCount {
                    key: message.key(context),
                    expected,
                    found,
                })
            })
            .collect()
    }

    /// Moves the messages named by `errors` back to review.
    ///
    /// Their text is kept; returns how many messages changed state.
    pub fn quarantine(&mut self, errors: &[ValidationError]) -> usize {
        let mut changed = 0;
        for error in errors {
            if let Some(message) = self.get_mut(error.key()) {
                let before = message.state();
                if message.apply(Transition::Reopened) != before {
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for (_, message) in self.all_messages() {
            match message.state() {
                TranslationState::Finished => stats.finished += 1,
                TranslationState::Unfinished => stats.unfinished += 1,
                TranslationState::Obsolete => stats.obsolete += 1,
                TranslationState::Vanished => stats.vanished += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find_message() {
        let mut catalog = Catalog::new();
        catalog
            .add_message("Core::MainWindow", "&Save", None, false)
            .unwrap()
            .set_translation("&Enregistrer");

        let message = catalog.find_message("Core::MainWindow", "&Save", None).unwrap();
        assert_eq!(message.translation.text(), "&Enregistrer");
        assert_eq!(message.state(), TranslationState::Unfinished);
        assert!(catalog.find_message("Core::MainWindow", "&Open", None).is_none());
        assert!(catalog.find_message("Other", "&Save", None).is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut catalog = Catalog::new();
        catalog.add_message("Dialog", "Open", Some("verb"), false).unwrap();
        catalog.add_message("Dialog", "Open", Some("adjective"), false).unwrap();
        catalog.add_message("Dialog", "Open", None, false).unwrap();

        let err = catalog
            .add_message("Dialog", "Open", Some("verb"), false)
            .unwrap_err();
        match err {
            CatalogError::DuplicateKey(key) => {
                assert_eq!(key.context, "Dialog");
                assert_eq!(key.source, "Open");
                assert_eq!(key.disambiguation.as_deref(), Some("verb"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_empty_disambiguation_is_none() {
        let mut catalog = Catalog::new();
        catalog.add_message("Dialog", "Open", Some(""), false).unwrap();
        assert!(catalog.find_message("Dialog", "Open", None).is_some());
        assert!(catalog.add_message("Dialog", "Open", None, false).is_err());
    }

    #[test]
    fn test_repeated_context_names_share_key_space() {
        let mut catalog = Catalog::new();
        catalog.add_context("Dialog");
        catalog.add_message("Dialog", "Open", None, false).unwrap();
        catalog.add_context("Other");
        catalog.add_context("Dialog");
        catalog.add_message("Dialog", "Close", None, false).unwrap();

        assert_eq!(catalog.contexts().len(), 3);
        assert_eq!(catalog.contexts()[2].messages()[0].source(), "Close");
        assert!(catalog.add_message("Dialog", "Open", None, false).is_err());
    }

    #[test]
    fn test_state_transitions() {
        use TranslationState::*;
        assert_eq!(Unfinished.transition(Transition::Approved), Finished);
        assert_eq!(Finished.transition(Transition::SourcePresent), Finished);
        assert_eq!(Finished.transition(Transition::SourceAbsent), Obsolete);
        assert_eq!(Obsolete.transition(Transition::SourceAbsent), Vanished);
        assert_eq!(Vanished.transition(Transition::SourceAbsent), Vanished);
        assert_eq!(Vanished.transition(Transition::SourcePresent), Unfinished);
        assert_eq!(Finished.transition(Transition::SourceChanged), Unfinished);
        assert_eq!(Obsolete.transition(Transition::Approved), Obsolete);
        assert_eq!(Obsolete.transition(Transition::Reopened), Obsolete);
    }

    #[test]
    fn test_type_attr_round_trip() {
        for state in [
            TranslationState::Finished,
            TranslationState::Unfinished,
            TranslationState::Obsolete,
            TranslationState::Vanished,
        ] {
            assert_eq!(
                TranslationState::from_type_attr(state.as_type_attr()),
                Some(state)
            );
        }
        assert_eq!(TranslationState::from_type_attr(Some("bogus")), None);
    }

    #[test]
    fn test_validate_reports_every_plural_mismatch() {
        let resolver = PluralResolver::for_locale("en").unwrap();
        let mut catalog = Catalog::new();
        catalog
            .add_message("Search", "%n file(s) found", None, true)
            .unwrap()
            .set_plural_forms(vec!["%n file found".into(), "%n files found".into()]);
        catalog
            .add_message("Search", "%n folder(s)", None, true)
            .unwrap()
            .set_plural_forms(vec!["%n folder".into()]);
        catalog.add_message("Search", "%n item(s)", None, true).unwrap();
        catalog.add_message("Search", "Cancel", None, false).unwrap();

        let errors = catalog.validate(&resolver);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(
            e,
            ValidationError::PluralFormCount { expected: 2, .. }
        )));
    }

    #[test]
    fn test_quarantine_reopens_finished_messages() {
        let resolver = PluralResolver::for_locale("ru").unwrap();
        let mut catalog = Catalog::new();
        let message = catalog.add_message("Search", "%n file(s)", None, true).unwrap();
        message.set_plural_forms(vec!["%n файл".into(), "%n файлов".into()]);
        message.approve();

        let errors = catalog.validate(&resolver);
        assert_eq!(errors.len(), 1);
        assert_eq!(catalog.quarantine(&errors), 1);

        let message = catalog.find_message("Search", "%n file(s)", None).unwrap();
        assert_eq!(message.state(), TranslationState::Unfinished);
        assert_eq!(message.translation.variants.len(), 2);
    }

    #[test]
    fn test_set_numerus_moves_text_to_first_form() {
        let mut message = Message::new("%n file(s)", None, false);
        message.set_translation("fichiers");
        message.approve();
        message.set_numerus(true, 2);
        assert!(message.is_numerus());
        assert_eq!(message.translation.variants, vec!["fichiers", ""]);
        assert_eq!(message.state(), TranslationState::Unfinished);
    }

    #[test]
    fn test_stats() {
        let mut catalog = Catalog::new();
        catalog.add_message("A", "one", None, false).unwrap().approve();
        catalog.add_message("A", "two", None, false).unwrap();
        catalog
            .add_message("A", "three", None, false)
            .unwrap()
            .apply(Transition::SourceAbsent);
        let stats = catalog.stats();
        assert_eq!(
            stats,
            CatalogStats {
                finished: 1,
                unfinished: 1,
                obsolete: 1,
                vanished: 0
            }
        );
        assert_eq!(
            stats.to_string(),
            "1 finished, 1 unfinished, 1 obsolete, 0 vanished"
        );
    }
}
