use std::path::Path;

use tracing::debug;

use super::xml::XmlWriter;
use super::{ABSENT_MERGES_TAG, TS_ROOT};
use crate::catalog::{Catalog, Context, Message};
use crate::error::Result;
use crate::fsio;

/// Serializes a catalog in document order.
///
/// Every field the parser reads is written back, so parsing the output yields an
/// equal catalog.
pub fn to_string(catalog: &Catalog) -> Result<String> {
    let mut writer = XmlWriter::new();
    writer.declaration(TS_ROOT)?;

    let mut attributes = Vec::new();
    if let Some(version) = catalog.version() {
        attributes.push(("version", version));
    }
    if let Some(language) = catalog.language() {
        attributes.push(("language", language));
    }
    if let Some(source_language) = catalog.source_language() {
        attributes.push(("sourcelanguage", source_language));
    }
    writer.start(TS_ROOT, &attributes)?;

    for context in catalog.contexts() {
        writer.newline(0)?;
        write_context(&mut writer, context)?;
    }

    writer.newline(0)?;
    writer.end(TS_ROOT)?;
    writer.finish()
}

/// Serializes `catalog` and replaces `path` atomically.
pub fn write_file(catalog: &Catalog, path: &Path) -> Result<()> {
    let content = to_string(catalog)?;
    fsio::write_atomic(path, content.as_bytes())?;
    debug!("Wrote {} messages to {}", catalog.len(), path.display());
    Ok(())
}

fn write_context(writer: &mut XmlWriter, context: &Context) -> Result<()> {
    writer.start("context", &[])?;
    writer.newline(1)?;
    writer.text_element("name", &[], context.name())?;
    for message in context.messages() {
        writer.newline(1)?;
        write_message(writer, message)?;
    }
    writer.newline(0)?;
    writer.end("context")
}

fn write_message(writer: &mut XmlWriter, message: &Message) -> Result<()> {
    if message.is_numerus() {
        writer.start("message", &[("numerus", "yes")])?;
    } else {
        writer.start("message", &[])?;
    }

    for location in &message.locations {
        let line = location.line.map(|line| line.to_string());
        let mut attributes = Vec::new();
        if let Some(filename) = &location.filename {
            attributes.push(("filename", filename.as_str()));
        }
        if let Some(line) = &line {
            attributes.push(("line", line.as_str()));
        }
        writer.newline(2)?;
        writer.empty("location", &attributes)?;
    }

    writer.newline(2)?;
    writer.text_element("source", &[], message.source())?;
    if let Some(old_source) = &message.old_source {
        writer.newline(2)?;
        writer.text_element("oldsource", &[], old_source)?;
    }
    if let Some(disambiguation) = message.disambiguation() {
        writer.newline(2)?;
        writer.text_element("comment", &[], disambiguation)?;
    }
    if let Some(extra_comment) = &message.extra_comment {
        writer.newline(2)?;
        writer.text_element("extracomment", &[], extra_comment)?;
    }
    if let Some(translator_comment) = &message.translator_comment {
        writer.newline(2)?;
        writer.text_element("translatorcomment", &[], translator_comment)?;
    }

    writer.newline(2)?;
    write_translation(writer, message)?;

    if message.absent_merges > message.state().implied_absent_merges() {
        writer.newline(2)?;
        writer.text_element(ABSENT_MERGES_TAG, &[], &message.absent_merges.to_string())?;
    }
    for (name, value) in &message.extras {
        writer.newline(2)?;
        writer.text_element(name, &[], value)?;
    }

    writer.newline(1)?;
    writer.end("message")
}

fn write_translation(writer: &mut XmlWriter, message: &Message) -> Result<()> {
    let state = message.state();
    let attributes: Vec<(&str, &str)> = state
        .as_type_attr()
        .map(|value| vec![("type", value)])
        .unwrap_or_default();

    if !message.is_numerus() {
        return writer.text_element("translation", &attributes, message.translation.text());
    }

    writer.start("translation", &attributes)?;
    for form in &message.translation.variants {
        writer.newline(3)?;
        writer.text_element("numerusform", &[], form)?;
    }
    writer.newline(2)?;
    writer.end("translation")
}
