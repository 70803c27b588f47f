//! Synchronizing a catalog with the strings an application currently uses
//!
//! A merge takes the existing catalog and a freshly extracted [`SourceSet`] and
//! produces the next catalog:
//!
//! - messages still extracted are carried over unchanged (their locations and
//!   developer comments are refreshed)
//! - new sources become unfinished messages, seeded from a similar old message in
//!   the same context when one exists (fuzzy reuse)
//! - messages no longer extracted move one step along obsolete → vanished, and
//!   vanished messages are eventually dropped; a message that seeded a new one
//!   follows the same path
//!
//! Every state change goes through [`TranslationState::transition`].
//!
//! [`TranslationState::transition`]: crate::catalog::TranslationState::transition

pub mod batch;
mod similarity;
mod sources;

pub use batch::{
    BatchReport, DocumentJob, DocumentOutcome, DocumentReport, merge_document, merge_documents,
};
pub use similarity::{edit_distance, similarity};
pub use sources::{SourceContext, SourceMessage, SourceSet};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Catalog, Message, MessageKey, Transition, TranslationState};
use crate::error::{CatalogError, Result};
use crate::plural::PluralResolver;

/// Merge policy.
///
/// Loadable from JSON; missing fields take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Physically remove messages that stayed vanished long enough
    pub delete_vanished: bool,
    /// Consecutive absent merges after which a vanished message is removed
    pub vanish_after: u32,
    /// Minimum similarity in `[0, 1]` for reusing an old translation, `None` to disable
    pub fuzzy_threshold: Option<f64>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            delete_vanished: true,
            vanish_after: 2,
            fuzzy_threshold: Some(0.8),
        }
    }
}

impl MergeOptions {
    /// Loads options from a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn should_drop(&self, message: &Message) -> bool {
        self.delete_vanished
            && message.state() == TranslationState::Vanished
            && message.absent_merges > self.vanish_after
    }
}

/// What a merge did, message by message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Still extracted, carried over
    pub kept: usize,
    /// Obsolete or vanished, extracted again
    pub revived: usize,
    /// New sources without a reusable translation
    pub added: usize,
    /// New sources seeded from a similar old message
    pub reused: usize,
    /// Live messages that were not extracted
    pub obsoleted: usize,
    /// Obsolete messages absent once more
    pub vanished: usize,
    /// Vanished messages removed by the retention policy
    pub dropped: usize,
    /// Repeated keys in the source set, ignored
    pub duplicate_sources: usize,
}

impl std::fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} kept, {} revived, {} new, {} reused, {} obsoleted, {} vanished, {} dropped",
            self.kept,
            self.revived,
            self.added,
            self.reused,
            self.obsoleted,
            self.vanished,
            self.dropped
        )
    }
}

/// An old message whose translation may seed a new source.
struct Candidate<'o> {
    key: MessageKey,
    message: &'o Message,
    used: bool,
}

/// Picks, for every new source, the most similar unused candidate in its context.
///
/// Returns the chosen old message per new key. A candidate seeds at most one new
/// message.
fn assign_fuzzy_seeds<'o>(
    new_sources: &[(&'o str, &SourceMessage)],
    mut candidates: HashMap<&'o str, Vec<Candidate<'o>>>,
    threshold: f64,
) -> HashMap<MessageKey, &'o Message> {
    let mut seeds = HashMap::new();
    for (context, source) in new_sources {
        let Some(pool) = candidates.get_mut(context) else {
            continue;
        };
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in pool.iter().enumerate() {
            if candidate.used || candidate.message.is_numerus() != source.numerus {
                continue;
            }
            let score = similarity(&source.source, candidate.message.source());
            if score >= threshold && best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }
        if let Some((i, score)) = best {
            let candidate = &mut pool[i];
            candidate.used = true;
            debug!(
                "Reusing translation of {} for {}/\"{}\" (similarity {:.2})",
                candidate.key, context, source.source, score
            );
            seeds.insert(source.key(context), candidate.message);
        }
    }
    seeds
}

/// Builds a new message for a source that has no exact match.
fn new_message(source: &SourceMessage, seed: Option<&Message>, form_count: usize) -> Message {
    let disambiguation = source.disambiguation.as_deref();
    let mut message = Message::new(&source.source, disambiguation, source.numerus);
    if let Some(seed) = seed {
        message.translation.variants = seed.translation.variants.clone();
        message.translator_comment = seed.translator_comment.clone();
        message.old_source = Some(seed.source().to_string());
    }
    message.ensure_form_count(if source.numerus { form_count } else { 1 });
    message.extra_comment = source.comment.clone();
    message.locations = source.locations.clone();
    message
}

/// Merges `old` with the currently extracted `sources`.
///
/// `resolver` decides how many plural forms new numerus messages get. The result
/// is a new catalog; `old` is not modified.
pub fn merge(
    old: &Catalog,
    sources: &SourceSet,
    options: &MergeOptions,
    resolver: &PluralResolver,
) -> (Catalog, MergeSummary) {
    let form_count = resolver.required_form_count();
    let mut summary = MergeSummary::default();

    let mut extracted: HashMap<MessageKey, &SourceMessage> = HashMap::new();
    let mut new_sources: Vec<(&str, &SourceMessage)> = Vec::new();
    for (context, source) in sources.iter() {
        let key = source.key(context);
        if extracted.contains_key(&key) {
            warn!("Source {} is listed more than once, ignoring repeat", key);
            summary.duplicate_sources += 1;
            continue;
        }
        if !old.contains(&key) {
            new_sources.push((context, source));
        }
        extracted.insert(key, source);
    }

    let seeds = match options.fuzzy_threshold {
        Some(threshold) => {
            let mut candidates: HashMap<&str, Vec<Candidate>> = HashMap::new();
            for (context, message) in old.all_messages() {
                let key = message.key(context);
                if extracted.contains_key(&key) || message.translation.is_empty() {
                    continue;
                }
                candidates.entry(context).or_default().push(Candidate {
                    key,
                    message,
                    used: false,
                });
            }
            assign_fuzzy_seeds(&new_sources, candidates, threshold)
        }
        None => HashMap::new(),
    };

    let mut merged = Catalog::new();
    merged.set_version(old.version().map(str::to_string));
    merged.set_language(old.language().map(str::to_string));
    merged.set_source_language(old.source_language().map(str::to_string));

    for context in old.contexts() {
        // Groups that were already empty are kept; groups emptied here are not
        if context.messages().is_empty() {
            merged.add_context(context.name());
            continue;
        }
        let mut opened = false;
        for message in context.messages() {
            let key = message.key(context.name());
            let mut next = message.clone();

            if let Some(source) = extracted.get(&key) {
                if !message.is_live() {
                    summary.revived += 1;
                    debug!("{} is extracted again", key);
                } else {
                    summary.kept += 1;
                }
                next.set_numerus(source.numerus, form_count);
                next.absent_merges = 0;
                next.apply(Transition::SourcePresent);
                next.extra_comment = source.comment.clone();
                next.locations = source.locations.clone();
            } else {
                next.absent_merges = next.absent_merges.saturating_add(1);
                match next.apply(Transition::SourceAbsent) {
                    TranslationState::Obsolete if message.is_live() => summary.obsoleted += 1,
                    TranslationState::Vanished
                        if message.state() == TranslationState::Obsolete =>
                    {
                        summary.vanished += 1
                    }
                    _ => {}
                }
                if options.should_drop(&next) {
                    debug!("Dropping {} after {} absent merges", key, next.absent_merges);
                    summary.dropped += 1;
                    continue;
                }
            }

            if !opened {
                merged.add_context(context.name());
                opened = true;
            }
            if let Err(e) = merged.push_message(context.name(), next) {
                warn!("Skipping message while merging: {}", e);
            }
        }
    }

    for (context, source) in new_sources {
        let key = source.key(context);
        let seed = seeds.get(&key).copied();
        if seed.is_some() {
            summary.reused += 1;
        } else {
            summary.added += 1;
        }
        let message = new_message(source, seed, form_count);
        if let Err(e) = merged.push_message(context, message) {
            warn!("Skipping message while merging: {}", e);
        }
    }

    (merged, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Location;

    fn french() -> PluralResolver {
        PluralResolver::for_locale("fr").unwrap()
    }

    fn sources(entries: &[(&str, &str)]) -> SourceSet {
        let mut set = SourceSet::default();
        for (context, source) in entries {
            match set.contexts.iter_mut().find(|c| c.name == *context) {
                Some(group) => group.messages.push(SourceMessage::new(source)),
                None => set.contexts.push(SourceContext {
                    name: context.to_string(),
                    messages: vec![SourceMessage::new(source)],
                }),
            }
        }
        set
    }

    fn save_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.set_language(Some("fr_FR".to_string()));
        let save = catalog
            .add_message("Core::MainWindow", "&Save", None, false)
            .unwrap();
        save.set_translation("&Enregistrer");
        save.approve();
        catalog
    }

    #[test]
    fn test_exact_match_is_unchanged() {
        let old = save_catalog();
        let (merged, summary) = merge(
            &old,
            &sources(&[("Core::MainWindow", "&Save")]),
            &MergeOptions::default(),
            &french(),
        );
        assert_eq!(merged, old);
        assert_eq!(summary.kept, 1);
    }

    #[test]
    fn test_new_messages_are_sized_for_the_locale() {
        let old = Catalog::new();
        let mut set = sources(&[("Search", "Cancel")]);
        let mut plural = SourceMessage::new("%n file(s) found");
        plural.numerus = true;
        plural.locations.push(Location {
            filename: Some("search.cpp".to_string()),
            line: Some(7),
        });
        set.contexts[0].messages.push(plural);

        let resolver = PluralResolver::for_locale("ru").unwrap();
        let (merged, summary) = merge(&old, &set, &MergeOptions::default(), &resolver);
        assert_eq!(summary.added, 2);

        let cancel = merged.find_message("Search", "Cancel", None).unwrap();
        assert_eq!(cancel.state(), TranslationState::Unfinished);
        assert_eq!(cancel.translation.variants, vec![""]);

        let files = merged.find_message("Search", "%n file(s) found", None).unwrap();
        assert_eq!(files.translation.variants.len(), 3);
        assert_eq!(files.locations[0].line, Some(7));
        assert!(merged.validate(&resolver).is_empty());
    }

    #[test]
    fn test_obsolescence_progression() {
        let options = MergeOptions::default();
        let empty = sources(&[("Core::MainWindow", "&Open")]);

        let (first, summary) = merge(&save_catalog(), &empty, &options, &french());
        let save = first.find_message("Core::MainWindow", "&Save", None).unwrap();
        assert_eq!(save.state(), TranslationState::Obsolete);
        assert_eq!(summary.obsoleted, 1);

        let (second, summary) = merge(&first, &empty, &options, &french());
        let save = second.find_message("Core::MainWindow", "&Save", None).unwrap();
        assert_eq!(save.state(), TranslationState::Vanished);
        assert_eq!(summary.vanished, 1);

        let back = sources(&[("Core::MainWindow", "&Open"), ("Core::MainWindow", "&Save")]);
        let (third, summary) = merge(&second, &back, &options, &french());
        let save = third.find_message("Core::MainWindow", "&Save", None).unwrap();
        assert_eq!(save.state(), TranslationState::Unfinished);
        assert_eq!(save.translation.text(), "&Enregistrer");
        assert_eq!(save.absent_merges, 0);
        assert_eq!(summary.revived, 1);
    }

    #[test]
    fn test_vanished_messages_are_dropped_after_retention() {
        let options = MergeOptions {
            fuzzy_threshold: None,
            ..MergeOptions::default()
        };
        let other = sources(&[("Other", "x")]);
        let mut catalog = save_catalog();
        let mut states = Vec::new();
        for _ in 0..3 {
            catalog = merge(&catalog, &other, &options, &french()).0;
            states.push(
                catalog
                    .find_message("Core::MainWindow", "&Save", None)
                    .map(Message::state),
            );
        }
        assert_eq!(
            states,
            vec![
                Some(TranslationState::Obsolete),
                Some(TranslationState::Vanished),
                None
            ]
        );
        // The emptied context is not kept
        assert_eq!(catalog.contexts().len(), 1);
    }

    #[test]
    fn test_retention_can_be_disabled() {
        let options = MergeOptions {
            delete_vanished: false,
            ..MergeOptions::default()
        };
        let none = SourceSet::default();
        let mut catalog = save_catalog();
        for _ in 0..5 {
            catalog = merge(&catalog, &none, &options, &french()).0;
        }
        let save = catalog.find_message("Core::MainWindow", "&Save", None).unwrap();
        assert_eq!(save.state(), TranslationState::Vanished);
        assert_eq!(save.absent_merges, 5);
    }

    #[test]
    fn test_fuzzy_reuse_marks_suggestion() {
        let mut old = Catalog::new();
        old.set_language(Some("fr".to_string()));
        let message = old.add_message("Dialog", "Save file", None, false).unwrap();
        message.set_translation("Enregistrer le fichier");
        message.approve();

        let set = sources(&[("Dialog", "Save files")]);
        let (merged, summary) = merge(&old, &set, &MergeOptions::default(), &french());
        assert_eq!(summary.reused, 1);
        assert_eq!(summary.obsoleted, 1);
        let donor = merged.find_message("Dialog", "Save file", None).unwrap();
        assert_eq!(donor.state(), TranslationState::Obsolete);
        assert_eq!(donor.translation.text(), "Enregistrer le fichier");

        let reused = merged.find_message("Dialog", "Save files", None).unwrap();
        assert_eq!(reused.state(), TranslationState::Unfinished);
        assert_eq!(reused.translation.text(), "Enregistrer le fichier");
        assert_eq!(reused.old_source.as_deref(), Some("Save file"));
    }

    #[test]
    fn test_fuzzy_reuse_respects_threshold_and_context() {
        let mut old = Catalog::new();
        let message = old.add_message("Dialog", "Save file", None, false).unwrap();
        message.set_translation("Enregistrer le fichier");
        message.approve();

        let elsewhere = sources(&[("Toolbar", "Save files")]);
        let (merged, summary) = merge(&old, &elsewhere, &MergeOptions::default(), &french());
        assert_eq!(summary.reused, 0);
        assert_eq!(
            merged.find_message("Dialog", "Save file", None).unwrap().state(),
            TranslationState::Obsolete
        );

        let strict = MergeOptions {
            fuzzy_threshold: Some(0.95),
            ..MergeOptions::default()
        };
        let (_, summary) = merge(&old, &sources(&[("Dialog", "Save files")]), &strict, &french());
        assert_eq!(summary.reused, 0);
        assert_eq!(summary.added, 1);
    }

    #[test]
    fn test_candidate_is_used_once() {
        let mut old = Catalog::new();
        let message = old.add_message("Dialog", "Delete item", None, false).unwrap();
        message.set_translation("Supprimer l'élément");
        message.approve();

        let set = sources(&[("Dialog", "Delete items"), ("Dialog", "Delete itemz")]);
        let (merged, summary) = merge(&old, &set, &MergeOptions::default(), &french());
        assert_eq!(summary.reused, 1);
        assert_eq!(summary.added, 1);
        assert!(
            merged
                .find_message("Dialog", "Delete itemz", None)
                .unwrap()
                .translation
                .is_empty()
        );
    }

    #[test]
    fn test_numerus_change_needs_review() {
        let mut old = Catalog::new();
        let message = old.add_message("Search", "%n file(s)", None, false).unwrap();
        message.set_translation("%n fichier(s)");
        message.approve();

        let mut set = sources(&[("Search", "%n file(s)")]);
        set.contexts[0].messages[0].numerus = true;
        let (merged, _) = merge(&old, &set, &MergeOptions::default(), &french());
        let message = merged.find_message("Search", "%n file(s)", None).unwrap();
        assert!(message.is_numerus());
        assert_eq!(message.state(), TranslationState::Unfinished);
        assert_eq!(message.translation.variants, vec!["%n fichier(s)", ""]);
    }

    #[test]
    fn test_new_messages_join_existing_context() {
        let old = save_catalog();
        let set = sources(&[
            ("Core::MainWindow", "&Save"),
            ("Core::MainWindow", "&Quit"),
            ("About", "Version"),
        ]);
        let (merged, _) = merge(&old, &set, &MergeOptions::default(), &french());
        let layout: Vec<(&str, Vec<&str>)> = merged
            .contexts()
            .iter()
            .map(|c| (c.name(), c.messages().iter().map(Message::source).collect()))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("Core::MainWindow", vec!["&Save", "&Quit"]),
                ("About", vec!["Version"]),
            ]
        );
    }

    #[test]
    fn test_duplicate_sources_are_ignored() {
        let set = sources(&[("A", "x"), ("A", "x")]);
        let (merged, summary) = merge(&Catalog::new(), &set, &MergeOptions::default(), &french());
        assert_eq!(merged.len(), 1);
        assert_eq!(summary.duplicate_sources, 1);
    }

    #[test]
    fn test_seed_donor_keeps_aging() {
        let mut old = Catalog::new();
        let message = old.add_message("Dialog", "Save file", None, false).unwrap();
        message.set_translation("Enregistrer le fichier");
        message.approve();
        let options = MergeOptions::default();

        let (first, _) = merge(&old, &sources(&[("Dialog", "Save files")]), &options, &french());
        let later = sources(&[("Dialog", "Save files"), ("Dialog", "Save filez")]);
        let (second, summary) = merge(&first, &later, &options, &french());
        let donor = second.find_message("Dialog", "Save file", None).unwrap();
        assert_eq!(donor.state(), TranslationState::Vanished);
        assert_eq!(summary.vanished, 1);
        // Still a candidate for sources that appear later
        assert_eq!(summary.reused, 1);
        assert_eq!(
            second
                .find_message("Dialog", "Save filez", None)
                .unwrap()
                .old_source
                .as_deref(),
            Some("Save file")
        );
    }

    #[test]
    fn test_empty_context_survives_merge() {
        let mut old = save_catalog();
        old.add_context("Unused");
        let set = sources(&[("Core::MainWindow", "&Save")]);
        let (merged, _) = merge(&old, &set, &MergeOptions::default(), &french());
        assert_eq!(merged, old);
        let names: Vec<&str> = merged.contexts().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Core::MainWindow", "Unused"]);
    }

    #[test]
    fn test_options_from_json() {
        let options: MergeOptions = serde_json::from_str(r#"{ "vanish_after": 4 }"#).unwrap();
        assert_eq!(options.vanish_after, 4);
        assert!(options.delete_vanished);
        assert_eq!(options.fuzzy_threshold, Some(0.8));

        let options: MergeOptions = serde_json::from_str(r#"{ "fuzzy_threshold": null }"#).unwrap();
        assert_eq!(options.fuzzy_threshold, None);
    }
}
