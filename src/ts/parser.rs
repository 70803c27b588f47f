use std::path::Path;

use tracing::{debug, warn};

use super::xml::{self, XmlElement};
use super::{ABSENT_MERGES_TAG, TS_ROOT};
use crate::catalog::{Catalog, Location, Message, Translation, TranslationState};
use crate::error::{CatalogError, MessageParseError, Result, ValidationError};
use crate::fsio;

/// A parsed document together with everything that was skipped while reading it.
#[derive(Debug)]
pub struct ParsedDocument {
    pub catalog: Catalog,
    /// Malformed message entries that were skipped
    pub diagnostics: Vec<MessageParseError>,
    /// Entries that parsed but could not be added (duplicate keys)
    pub rejected: Vec<ValidationError>,
}

impl ParsedDocument {
    /// True when every entry of the document made it into the catalog.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.rejected.is_empty()
    }
}

/// Parses a TS document.
///
/// # Errors
/// [`CatalogError::Structural`] when the document is not well-formed or its root is
/// not `<TS>`. Malformed messages are not errors: they are skipped and reported in
/// [`ParsedDocument::diagnostics`].
pub fn parse_str(input: &str) -> Result<ParsedDocument> {
    let root = xml::parse_document(input)?;
    if root.name != TS_ROOT {
        return Err(CatalogError::Structural {
            position: root.position,
            message: format!("root element is <{}>, expected <{}>", root.name, TS_ROOT),
        });
    }

    let mut catalog = Catalog::new();
    catalog.set_version(root.attr("version").map(str::to_string));
    catalog.set_language(root.attr("language").map(str::to_string));
    catalog.set_source_language(root.attr("sourcelanguage").map(str::to_string));

    let mut parsed = ParsedDocument {
        catalog,
        diagnostics: Vec::new(),
        rejected: Vec::new(),
    };

    for child in root.elements() {
        match child.name.as_str() {
            "context" => parse_context(child, &mut parsed),
            other => debug!("Ignoring <{}> at byte {}", other, child.position),
        }
    }

    for diagnostic in &parsed.diagnostics {
        warn!("{}", diagnostic);
    }
    for rejected in &parsed.rejected {
        warn!("{}", rejected);
    }
    Ok(parsed)
}

/// Reads and parses a TS document from disk.
///
/// Errors are attributed to `path`.
pub fn parse_file(path: &Path) -> Result<ParsedDocument> {
    let content = fsio::read_document(path)?;
    parse_str(&content).map_err(|e| e.in_document(path))
}

fn parse_context(element: &XmlElement, parsed: &mut ParsedDocument) {
    let name = match element.elements().find(|el| el.name == "name") {
        Some(name_el) => match name_el.text() {
            Ok(name) => name,
            Err(reason) => {
                parsed.diagnostics.push(MessageParseError {
                    context: None,
                    position: name_el.position,
                    reason,
                });
                return;
            }
        },
        None => {
            parsed.diagnostics.push(MessageParseError {
                context: None,
                position: element.position,
                reason: "context without <name>".to_string(),
            });
            return;
        }
    };

    parsed.catalog.add_context(&name);

    for child in element.elements() {
        match child.name.as_str() {
            "name" | "comment" => {}
            "message" => match parse_message(child) {
                Ok(message) => {
                    let key = message.key(&name);
                    if parsed.catalog.push_message(&name, message).is_err() {
                        parsed.rejected.push(ValidationError::DuplicateKey { key });
                    }
                }
                Err(reason) => parsed.diagnostics.push(MessageParseError {
                    context: Some(name.clone()),
                    position: child.position,
                    reason,
                }),
            },
            other => debug!("Ignoring <{}> in context '{}'", other, name),
        }
    }
}

fn parse_yes_no(value: Option<&str>, attribute: &str) -> std::result::Result<bool, String> {
    match value {
        None | Some("no") | Some("false") => Ok(false),
        Some("yes") | Some("true") => Ok(true),
        Some(other) => Err(format!("invalid {} value '{}'", attribute, other)),
    }
}

fn parse_location(element: &XmlElement) -> std::result::Result<Location, String> {
    let line = match element.attr("line") {
        None => None,
        Some(line) => Some(
            line.parse::<u32>()
                .map_err(|_| format!("invalid location line '{}'", line))?,
        ),
    };
    Ok(Location {
        filename: element.attr("filename").map(str::to_string),
        line,
    })
}

/// Text of a numerus form or of a translation that uses length variants:
/// the first (longest) variant is the one that is kept.
fn variant_text(element: &XmlElement) -> std::result::Result<String, String> {
    match element.elements().find(|el| el.name == "lengthvariant") {
        Some(variant) => variant.text(),
        None => element.text(),
    }
}

fn parse_translation(
    element: &XmlElement,
    numerus: bool,
) -> std::result::Result<Translation, String> {
    let state = TranslationState::from_type_attr(element.attr("type")).ok_or_else(|| {
        format!(
            "unknown translation type '{}'",
            element.attr("type").unwrap_or_default()
        )
    })?;

    let forms: Vec<&XmlElement> = element
        .elements()
        .filter(|el| el.name == "numerusform")
        .collect();

    let variants = if numerus {
        if forms.is_empty() && element.has_text() {
            return Err("numerus message with a plain translation".to_string());
        }
        forms
            .into_iter()
            .map(variant_text)
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        if !forms.is_empty() {
            return Err("plural forms on a message without numerus=\"yes\"".to_string());
        }
        vec![variant_text(element)?]
    };

    Ok(Translation { state, variants })
}

fn parse_message(element: &XmlElement) -> std::result::Result<Message, String> {
    let numerus = parse_yes_no(element.attr("numerus"), "numerus")?;

    let mut source: Option<String> = None;
    let mut disambiguation: Option<String> = None;
    let mut translation: Option<Translation> = None;
    let mut locations = Vec::new();
    let mut old_source = None;
    let mut extra_comment = None;
    let mut translator_comment = None;
    let mut absent_merges: Option<u32> = None;
    let mut extras = Vec::new();

    for child in element.elements() {
        match child.name.as_str() {
            "source" => {
                if source.is_some() {
                    return Err("more than one <source>".to_string());
                }
                source = Some(child.text()?);
            }
            "location" => locations.push(parse_location(child)?),
            "oldsource" => old_source = Some(child.text()?),
            "comment" => disambiguation = Some(child.text()?),
            "extracomment" => extra_comment = Some(child.text()?),
            "translatorcomment" => translator_comment = Some(child.text()?),
            "translation" => {
                if translation.is_some() {
                    return Err("more than one <translation>".to_string());
                }
                translation = Some(parse_translation(child, numerus)?);
            }
            ABSENT_MERGES_TAG => {
                let text = child.text()?;
                absent_merges = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| format!("invalid {} value '{}'", ABSENT_MERGES_TAG, text))?,
                );
            }
            name if name.starts_with("extra-") => extras.push((name.to_string(), child.text()?)),
            // Former disambiguation and unknown tags carry nothing we keep
            other => debug!("Ignoring <{}> in message at byte {}", other, child.position),
        }
    }

    let source = match (source, &translation) {
        (Some(source), _) => source,
        (None, Some(_)) => return Err("translation without a matching <source>".to_string()),
        (None, None) => return Err("message without <source>".to_string()),
    };

    let mut message = Message::new(&source, disambiguation.as_deref(), numerus);
    if let Some(translation) = translation {
        message.translation = translation;
    }
    message.absent_merges =
        absent_merges.unwrap_or_else(|| message.state().implied_absent_merges());
    message.locations = locations;
    message.old_source = old_source;
    message.extra_comment = extra_comment;
    message.translator_comment = translator_comment;
    message.extras = extras;
    Ok(message)
}
