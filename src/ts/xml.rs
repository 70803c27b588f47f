//! Minimal element tree over quick-xml
//!
//! TS documents are small enough to hold in memory, and a tree makes it easy to skip
//! one malformed `<message>` without losing the rest of the document. Text is kept
//! exactly as written: whitespace inside leaf elements is significant, whitespace
//! between structural elements is dropped by the readers in `parser.rs`.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    /// Byte offset of the start tag
    pub position: usize,
}

impl XmlElement {
    fn new(name: String, position: usize) -> Self {
        XmlElement {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            position,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, skipping text between them.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn has_text(&self) -> bool {
        self.children
            .iter()
            .any(|child| matches!(child, XmlNode::Text(t) if !t.trim().is_empty()))
    }

    /// Text content of a leaf element, decoding `<byte value="..."/>` escapes.
    ///
    /// Other child elements are ignored.
    pub fn text(&self) -> std::result::Result<String, String> {
        let mut text = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(t) => text.push_str(t),
                XmlNode::Element(el) if el.name == "byte" => {
                    let value = el.attr("value").ok_or("<byte> without value")?;
                    if let Some(c) = decode_byte_value(value)? {
                        text.push(c);
                    }
                }
                XmlNode::Element(_) => {}
            }
        }
        Ok(text)
    }
}

/// `<byte value>` holds a decimal (`27`) or hex (`x1b`, `0x1b`) code point.
fn decode_byte_value(value: &str) -> std::result::Result<Option<char>, String> {
    let (radix, digits) = if let Some(hex) = value.strip_prefix("0x") {
        (16, hex)
    } else if let Some(hex) = value.strip_prefix('x') {
        (16, hex)
    } else {
        (10, value)
    };
    let code = u32::from_str_radix(digits, radix)
        .map_err(|_| format!("invalid <byte> value '{}'", value))?;
    if code == 0 {
        return Ok(None);
    }
    char::from_u32(code)
        .map(Some)
        .ok_or_else(|| format!("invalid <byte> value '{}'", value))
}

fn structural(position: usize, message: impl Into<String>) -> CatalogError {
    CatalogError::Structural {
        position,
        message: message.into(),
    }
}

fn start_element(start: &BytesStart<'_>, position: usize) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut element = XmlElement::new(name, position);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| structural(position, format!("bad attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| structural(position, format!("bad attribute value: {}", e)))?;
        element.attributes.push((key, value.to_string()));
    }
    Ok(element)
}

/// Parses a whole document and returns its root element.
///
/// # Errors
/// [`CatalogError::Structural`] when the document is not well-formed or has no root.
pub(crate) fn parse_document(input: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| structural(reader.buffer_position(), e.to_string()))?;

        match event {
            Event::Start(ref start) => {
                if root.is_some() && stack.is_empty() {
                    return Err(structural(position, "content after the root element"));
                }
                stack.push(start_element(start, position)?);
            }
            Event::Empty(ref start) => {
                let element = start_element(start, position)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None if root.is_none() => root = Some(element),
                    None => return Err(structural(position, "content after the root element")),
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| structural(position, "unexpected end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(ref text) => {
                let text = text
                    .unescape()
                    .map_err(|e| structural(position, e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => push_text(parent, &text),
                    None if text.trim().is_empty() => {}
                    None => return Err(structural(position, "text outside the root element")),
                }
            }
            Event::CData(cdata) => {
                let text = String::from_utf8(cdata.into_inner().into_owned())
                    .map_err(|_| structural(position, "CDATA section is not UTF-8"))?;
                match stack.last_mut() {
                    Some(parent) => push_text(parent, &text),
                    None => return Err(structural(position, "CDATA outside the root element")),
                }
            }
            Event::Eof => break,
            // Declaration, doctype, comments and processing instructions carry no data
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(structural(
            open.position,
            format!("element <{}> is never closed", open.name),
        ));
    }
    root.ok_or_else(|| structural(0, "document has no root element"))
}

/// Adjacent text events (text, entity, CDATA) form one text node.
fn push_text(parent: &mut XmlElement, text: &str) {
    if let Some(XmlNode::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

/// Characters XML 1.0 cannot carry, written as `<byte>` elements.
fn needs_byte_escape(c: char) -> bool {
    (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r')
}

/// Writes TS-style indented XML.
///
/// Indentation is emitted by hand so leaf text is never touched.
pub(crate) struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        XmlWriter {
            writer: Writer::new(Vec::new()),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| structural(0, format!("failed to write XML: {}", e)))
    }

    pub fn declaration(&mut self, doctype: &str) -> Result<()> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.newline(0)?;
        self.emit(Event::DocType(BytesText::from_escaped(doctype)))?;
        self.newline(0)
    }

    /// Line break followed by `depth` levels of indentation.
    pub fn newline(&mut self, depth: usize) -> Result<()> {
        let indent = format!("\n{}", "    ".repeat(depth));
        self.emit(Event::Text(BytesText::from_escaped(indent)))
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.emit(Event::Start(start))
    }

    pub fn end(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.emit(Event::Empty(start))
    }

    /// Escaped text with control characters turned into `<byte>` elements.
    pub fn text(&mut self, text: &str) -> Result<()> {
        let mut run_start = 0;
        for (offset, c) in text.char_indices() {
            if needs_byte_escape(c) {
                if run_start < offset {
                    self.emit(Event::Text(BytesText::new(&text[run_start..offset])))?;
                }
                let value = format!("x{:x}", c as u32);
                self.empty("byte", &[("value", value.as_str())])?;
                run_start = offset + c.len_utf8();
            }
        }
        if run_start < text.len() {
            self.emit(Event::Text(BytesText::new(&text[run_start..])))?;
        }
        Ok(())
    }

    /// `<name attrs>text</name>` on one line.
    pub fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<()> {
        self.start(name, attributes)?;
        self.text(text)?;
        self.end(name)
    }

    pub fn finish(mut self) -> Result<String> {
        self.newline(0)?;
        String::from_utf8(self.writer.into_inner())
            .map_err(|_| structural(0, "serialized document is not UTF-8"))
    }
}
