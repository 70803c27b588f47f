//! Compact binary lookup artifact
//!
//! All integers are little-endian.
//!
//! ```text
//! header      magic "TSQI", version u16, flags u16, locale string id u32,
//!             string count u32, blob length u32, record count u32, form ref count u32
//! strings     (offset u32, length u32) per string, into the blob
//! blob        UTF-8 bytes of every distinct string
//! form refs   string id u32 per plural form
//! records     hash u64, context u32, source u32, disambiguation u32 (or u32::MAX),
//!             first form ref u32, form count u16, numerus u8, padding u8
//! ```
//!
//! Every live message has a record. A record with no forms is a known key whose
//! translation is not servable; lookups answer it with the source text.
//!
//! Records are sorted by key hash, then by context, source and disambiguation, and
//! strings are numbered in order of first use, so the same catalog always compiles
//! to the same bytes.

use std::collections::HashMap;

use tracing::debug;

use super::{Lookup, catalog_resolver, form_index, indexed_messages};
use crate::catalog::{Catalog, Message};
use crate::error::{CatalogError, Result};
use crate::plural::PluralResolver;

const MAGIC: &[u8; 4] = b"TSQI";
pub const FORMAT_VERSION: u16 = 1;
const NO_STRING: u32 = u32::MAX;
const HEADER_LEN: usize = 28;
const RECORD_LEN: usize = 28;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a_update(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(FNV_PRIME);
    }
}

fn key_hash(context: &str, source: &str, disambiguation: Option<&str>) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    fnv1a_update(&mut hash, context.as_bytes());
    fnv1a_update(&mut hash, &[0]);
    fnv1a_update(&mut hash, source.as_bytes());
    fnv1a_update(&mut hash, &[0]);
    fnv1a_update(&mut hash, disambiguation.unwrap_or_default().as_bytes());
    hash
}

fn too_large(what: &str) -> CatalogError {
    CatalogError::CorruptIndex(format!("{} does not fit the index format", what))
}

#[derive(Debug, Default)]
struct StringTable<'c> {
    ids: HashMap<&'c str, u32>,
    strings: Vec<&'c str>,
}

impl<'c> StringTable<'c> {
    fn intern(&mut self, text: &'c str) -> Result<u32> {
        if let Some(id) = self.ids.get(text) {
            return Ok(*id);
        }
        let id = u32::try_from(self.strings.len())
            .ok()
            .filter(|id| *id != NO_STRING)
            .ok_or_else(|| too_large("string count"))?;
        self.strings.push(text);
        self.ids.insert(text, id);
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Record {
    hash: u64,
    context: u32,
    source: u32,
    disambiguation: u32,
    first_form: u32,
    form_count: u16,
    numerus: bool,
}

#[derive(Default)]
struct IndexWriter {
    data: Vec<u8>,
}

impl IndexWriter {
    fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

/// Compiles the live messages of a catalog into the binary lookup format.
///
/// # Errors
/// [`CatalogError::MissingLocale`] or [`CatalogError::UnknownLocale`] when the
/// catalog's language has no plural rules.
pub fn compile(catalog: &Catalog) -> Result<Vec<u8>> {
    let resolver = catalog_resolver(catalog)?;

    let mut entries: Vec<(u64, &str, &Message, bool)> = indexed_messages(catalog, &resolver)
        .map(|(context, message, servable)| {
            let hash = key_hash(context, message.source(), message.disambiguation());
            (hash, context, message, servable)
        })
        .collect();
    entries.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| a.2.source().cmp(b.2.source()))
            .then_with(|| a.2.disambiguation().cmp(&b.2.disambiguation()))
    });

    let mut strings = StringTable::default();
    let locale = strings.intern(catalog.language().unwrap_or_default())?;
    let mut form_refs: Vec<u32> = Vec::new();
    let mut records = Vec::with_capacity(entries.len());

    for &(hash, context, message, servable) in &entries {
        let context = strings.intern(context)?;
        let source = strings.intern(message.source())?;
        let disambiguation = match message.disambiguation() {
            Some(disambiguation) => strings.intern(disambiguation)?,
            None => NO_STRING,
        };
        let first_form =
            u32::try_from(form_refs.len()).map_err(|_| too_large("plural form count"))?;
        let forms: &[String] = if servable {
            &message.translation.variants
        } else {
            &[]
        };
        for form in forms {
            form_refs.push(strings.intern(form)?);
        }
        let form_count =
            u16::try_from(forms.len()).map_err(|_| too_large("plural forms per message"))?;
        records.push(Record {
            hash,
            context,
            source,
            disambiguation,
            first_form,
            form_count,
            numerus: message.is_numerus(),
        });
    }

    let blob_len: usize = strings.strings.iter().map(|s| s.len()).sum();
    let blob_len = u32::try_from(blob_len).map_err(|_| too_large("string data"))?;
    let string_count =
        u32::try_from(strings.strings.len()).map_err(|_| too_large("string count"))?;
    let record_count = u32::try_from(records.len()).map_err(|_| too_large("record count"))?;
    let form_ref_count = u32::try_from(form_refs.len()).map_err(|_| too_large("form count"))?;

    let mut writer = IndexWriter::default();
    writer.write_bytes(MAGIC);
    writer.write_u16(FORMAT_VERSION);
    writer.write_u16(0);
    writer.write_u32(locale);
    writer.write_u32(string_count);
    writer.write_u32(blob_len);
    writer.write_u32(record_count);
    writer.write_u32(form_ref_count);

    // Offsets fit: the blob length was checked above
    let mut offset = 0u32;
    for text in &strings.strings {
        let len = text.len() as u32;
        writer.write_u32(offset);
        writer.write_u32(len);
        offset += len;
    }
    for text in &strings.strings {
        writer.write_bytes(text.as_bytes());
    }
    for form in &form_refs {
        writer.write_u32(*form);
    }
    for record in &records {
        writer.write_u64(record.hash);
        writer.write_u32(record.context);
        writer.write_u32(record.source);
        writer.write_u32(record.disambiguation);
        writer.write_u32(record.first_form);
        writer.write_u16(record.form_count);
        writer.write_u8(u8::from(record.numerus));
        writer.write_u8(0);
    }

    debug!(
        "Compiled {} messages, {} strings, {} bytes",
        records.len(),
        strings.strings.len(),
        writer.data.len()
    );
    Ok(writer.data)
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| CatalogError::CorruptIndex(format!("truncated at byte {}", self.pos)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

fn corrupt(message: impl Into<String>) -> CatalogError {
    CatalogError::CorruptIndex(message.into())
}

/// A loaded compiled index.
///
/// Every string and record is checked once on load; lookups then only do a binary
/// search over the records.
#[derive(Debug)]
pub struct CompiledIndex {
    resolver: PluralResolver,
    blob: String,
    strings: Vec<(usize, usize)>,
    form_refs: Vec<u32>,
    records: Vec<Record>,
    servable: usize,
}

impl CompiledIndex {
    /// Loads and checks a compiled index.
    ///
    /// # Errors
    /// [`CatalogError::CorruptIndex`] when the bytes are not a valid index, and
    /// [`CatalogError::UnknownLocale`] when the recorded locale has no plural rules.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(corrupt("shorter than the header"));
        }
        let mut reader = ByteReader::new(bytes);
        if reader.take(4)? != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = reader.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", version)));
        }
        let _flags = reader.read_u16()?;
        let locale = reader.read_u32()?;
        let string_count = reader.read_u32()? as usize;
        let blob_len = reader.read_u32()? as usize;
        let record_count = reader.read_u32()? as usize;
        let form_ref_count = reader.read_u32()? as usize;

        let expected = string_count
            .saturating_mul(8)
            .saturating_add(blob_len)
            .saturating_add(form_ref_count.saturating_mul(4))
            .saturating_add(record_count.saturating_mul(RECORD_LEN));
        if expected != reader.remaining() {
            return Err(corrupt(format!(
                "expected {} bytes after the header, found {}",
                expected,
                reader.remaining()
            )));
        }

        let mut spans = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            let offset = reader.read_u32()? as usize;
            let len = reader.read_u32()? as usize;
            spans.push((offset, offset + len));
        }
        let blob = String::from_utf8(reader.take(blob_len)?.to_vec())
            .map_err(|_| corrupt("string data is not UTF-8"))?;
        if let Some(id) = spans.iter().position(|&(start, end)| blob.get(start..end).is_none()) {
            return Err(corrupt(format!("string {} is out of bounds", id)));
        }

        let check_string = |id: u32| -> Result<u32> {
            if (id as usize) < string_count {
                Ok(id)
            } else {
                Err(corrupt(format!("string id {} out of range", id)))
            }
        };

        let mut form_refs = Vec::with_capacity(form_ref_count);
        for _ in 0..form_ref_count {
            form_refs.push(check_string(reader.read_u32()?)?);
        }

        let mut records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            let hash = reader.read_u64()?;
            let context = check_string(reader.read_u32()?)?;
            let source = check_string(reader.read_u32()?)?;
            let disambiguation = match reader.read_u32()? {
                NO_STRING => NO_STRING,
                id => check_string(id)?,
            };
            let first_form = reader.read_u32()?;
            let form_count = reader.read_u16()?;
            let numerus = reader.read_u8()? != 0;
            let _padding = reader.read_u8()?;
            if first_form as usize + form_count as usize > form_ref_count {
                return Err(corrupt(format!("record {} has forms out of range", records.len())));
            }
            records.push(Record {
                hash,
                context,
                source,
                disambiguation,
                first_form,
                form_count,
                numerus,
            });
        }
        if records.windows(2).any(|pair| pair[0].hash > pair[1].hash) {
            return Err(corrupt("records are not sorted"));
        }

        let servable = records.iter().filter(|record| record.form_count > 0).count();
        let locale_id = check_string(locale)? as usize;
        let (start, end) = spans[locale_id];
        let resolver = PluralResolver::for_locale(&blob[start..end])?;

        Ok(CompiledIndex {
            resolver,
            blob,
            strings: spans,
            form_refs,
            records,
            servable,
        })
    }

    /// Number of servable messages in the index.
    pub fn len(&self) -> usize {
        self.servable
    }

    pub fn is_empty(&self) -> bool {
        self.servable == 0
    }

    fn string(&self, id: u32) -> Option<&str> {
        let &(start, end) = self.strings.get(id as usize)?;
        self.blob.get(start..end)
    }

    fn find(&self, context: &str, source: &str, disambiguation: Option<&str>) -> Option<&Record> {
        let hash = key_hash(context, source, disambiguation);
        let start = self.records.partition_point(|record| record.hash < hash);
        self.records[start..]
            .iter()
            .take_while(|record| record.hash == hash)
            .find(|record| {
                self.string(record.context) == Some(context)
                    && self.string(record.source) == Some(source)
                    && match disambiguation {
                        Some(d) => self.string(record.disambiguation) == Some(d),
                        None => record.disambiguation == NO_STRING,
                    }
            })
    }
}

impl Lookup for CompiledIndex {
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
        let disambiguation = disambiguation.filter(|d| !d.is_empty());
        let record = self.find(context, source, disambiguation).or_else(|| {
            disambiguation.and_then(|_| self.find(context, source, None))
        });
        record
            .and_then(|record| {
                let index = form_index(record.numerus, count, &self.resolver);
                if index >= record.form_count as usize {
                    return None;
                }
                let form = self.form_refs.get(record.first_form as usize + index)?;
                self.string(*form)
            })
            .filter(|text| !text.is_empty())
            .unwrap_or(source)
    }
}
