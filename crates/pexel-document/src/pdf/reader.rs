// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open, inspect, merge, select, rotate, compress, encrypt and
// decrypt existing PDF documents using the `lopdf` crate.
//
// Every transformation works on a clone of the loaded document and returns
// freshly serialised bytes; the reader itself is never mutated.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use lopdf::xref::XrefEntry;
use lopdf::{
    Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions, Reader,
    StringFormat, dictionary,
};
use pexel_core::{CompressionTier, PageText};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, EngineResult};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed page trees whose /Parent chain loops.
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page carries no usable MediaBox.
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Document-information fields reported by [`PdfReader::metadata`], keyed by
/// the name used in the structured result.
const INFO_FIELDS: [(&str, &[u8]); 7] = [
    ("title", b"Title"),
    ("author", b"Author"),
    ("subject", b"Subject"),
    ("creator", b"Creator"),
    ("producer", b"Producer"),
    ("creation_date", b"CreationDate"),
    ("modification_date", b"ModDate"),
];

/// Visible geometry of a single page, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Lower-left corner of the MediaBox.
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    /// Effective /Rotate, normalised to 0, 90, 180 or 270.
    pub rotate: i64,
}

impl PageGeometry {
    /// Width and height as displayed, i.e. swapped for quarter-turn pages.
    pub fn displayed_size(&self) -> (f32, f32) {
        if self.rotate % 180 == 0 {
            (self.width, self.height)
        } else {
            (self.height, self.width)
        }
    }
}

/// Reads and manipulates an existing PDF held in memory.
pub struct PdfReader {
    document: Document,
    /// Source bytes of an encrypted document the loader could not open with
    /// the empty user password.  Only the trailer, the cross-reference table
    /// and the /Encrypt dictionary are parsed until [`PdfReader::decrypt`]
    /// re-reads the objects from here.
    sealed: Option<Vec<u8>>,
    /// First 16 bytes of the SHA-256 of the source bytes, used as the file
    /// identifier when the document has none.
    fingerprint: [u8; 16],
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Parse raw PDF bytes.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> EngineResult<Self> {
        let mut document = Document::load_mem(data).map_err(|err| {
            let message = err.to_string();
            let lower = message.to_ascii_lowercase();
            if lower.contains("decrypt") || lower.contains("password") {
                EngineError::Encrypted
            } else {
                EngineError::Corrupt(message)
            }
        })?;

        let digest = Sha256::digest(data);
        let mut fingerprint = [0u8; 16];
        fingerprint.copy_from_slice(&digest[..16]);

        let sealed = if !document.is_encrypted() {
            None
        } else if document.encryption_state.is_some() {
            // Opened with the empty user password: the objects are already
            // plain, so the security handler is dropped.
            drop_security_handler(&mut document);
            debug!("Encrypted PDF opened with the empty user password");
            None
        } else {
            Some(data.to_vec())
        };

        debug!(
            pages = document.get_pages().len(),
            encrypted = sealed.is_some(),
            "PDF loaded from bytes"
        );

        Ok(Self {
            document,
            sealed,
            fingerprint,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> u32 {
        u32::try_from(self.document.get_pages().len()).unwrap_or(u32::MAX)
    }

    pub fn is_encrypted(&self) -> bool {
        self.sealed.is_some()
    }

    /// Borrow the underlying lopdf document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Fail with [`EngineError::Encrypted`] unless the content is readable.
    pub fn ensure_plain(&self) -> EngineResult<()> {
        if self.is_encrypted() {
            Err(EngineError::Encrypted)
        } else {
            Ok(())
        }
    }

    /// Geometry of a 1-indexed page.
    pub fn page_geometry(&self, page_number: u32) -> EngineResult<PageGeometry> {
        let page_id = page_id(&self.document, page_number)?;
        Ok(geometry(&self.document, page_id))
    }

    /// Document-information entries, with every known field present (empty
    /// when missing).  Values of an encrypted document are not readable and
    /// are reported empty.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut fields: BTreeMap<String, String> = INFO_FIELDS
            .iter()
            .map(|(name, _)| ((*name).to_string(), String::new()))
            .collect();
        if self.is_encrypted() {
            return fields;
        }

        let info = self
            .document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| self.document.dereference(obj).ok())
            .and_then(|(_, obj)| obj.as_dict().ok());

        if let Some(info) = info {
            for (name, key) in INFO_FIELDS {
                if let Ok(Object::String(bytes, _)) = info.get(key) {
                    let text = decode_text_string(bytes);
                    let value = if key.ends_with(b"Date") {
                        format_pdf_date(&text)
                    } else {
                        text
                    };
                    fields.insert(name.to_string(), value);
                }
            }
        }
        fields
    }

    /// Extract the text of each requested page, in the order given.  Pages
    /// lopdf cannot decode yield empty content.
    #[instrument(skip(self), fields(pages = pages.len()))]
    pub fn extract_text(&self, pages: &[u32]) -> EngineResult<Vec<PageText>> {
        self.ensure_plain()?;
        Ok(pages
            .iter()
            .map(|&page| {
                let content = self.document.extract_text(&[page]).unwrap_or_else(|err| {
                    debug!(page, %err, "No extractable text on page");
                    String::new()
                });
                PageText {
                    page,
                    content: content.trim_end().to_string(),
                }
            })
            .collect())
    }

    // -- Transformation -------------------------------------------------------

    /// A new PDF containing only `pages` (1-indexed), in document order.
    #[instrument(skip(self), fields(selected = pages.len()))]
    pub fn select(&self, pages: &[u32]) -> EngineResult<Vec<u8>> {
        self.ensure_plain()?;
        let mut doc = self.document.clone();

        let keep: BTreeSet<u32> = pages.iter().copied().collect();
        let dropped: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|page| !keep.contains(page))
            .collect();

        if !dropped.is_empty() {
            doc.delete_pages(&dropped);
            doc.prune_objects();
        }

        debug!(kept = keep.len(), dropped = dropped.len(), "Pages selected");
        serialise(&mut doc)
    }

    /// Add `degrees` (a multiple of 90) to the rotation of each listed page.
    #[instrument(skip(self), fields(pages = pages.len(), degrees))]
    pub fn rotate(&self, pages: &[u32], degrees: i64) -> EngineResult<Vec<u8>> {
        self.ensure_plain()?;
        if degrees % 90 != 0 {
            return Err(EngineError::Pdf(format!(
                "rotation must be a multiple of 90, got {degrees}"
            )));
        }

        let mut doc = self.document.clone();
        for &page_number in pages {
            let page_id = page_id(&doc, page_number)?;
            let existing = inherited(&doc, page_id, b"Rotate")
                .and_then(|obj| obj.as_i64().ok())
                .unwrap_or(0);
            let updated = (existing + degrees).rem_euclid(360);
            doc.get_object_mut(page_id)
                .and_then(Object::as_dict_mut)?
                .set("Rotate", updated);
            debug!(page_number, existing, updated, "Page rotated");
        }

        serialise(&mut doc)
    }

    /// Re-encode the document at the given compression tier.
    ///
    /// Level 1 flate-compresses uncompressed streams, level 2 also drops
    /// unreferenced objects and empty streams, level 3 also strips the XMP
    /// metadata stream and the document-information dictionary.
    #[instrument(skip(self), fields(level = tier.level()))]
    pub fn compress(&self, tier: CompressionTier) -> EngineResult<Vec<u8>> {
        self.ensure_plain()?;
        let mut doc = self.document.clone();
        let level = tier.level();

        if level >= 3 {
            let root_id = doc.trailer.get(b"Root").and_then(Object::as_reference)?;
            doc.get_object_mut(root_id)
                .and_then(Object::as_dict_mut)?
                .remove(b"Metadata");
            doc.trailer.remove(b"Info");
        }
        if level >= 2 {
            doc.delete_zero_length_streams();
            doc.prune_objects();
            doc.renumber_objects();
        }
        doc.compress();

        let output = serialise(&mut doc)?;
        info!(level, output_bytes = output.len(), "PDF recompressed");
        Ok(output)
    }

    /// Encrypt with the standard security handler (RC4, 128-bit key).
    #[instrument(skip_all)]
    pub fn encrypt(&self, user_password: &str, owner_password: &str) -> EngineResult<Vec<u8>> {
        self.ensure_plain()?;
        let mut doc = self.document.clone();

        // The key derivation needs a file identifier.
        if !doc.trailer.has(b"ID") {
            let id = Object::String(self.fingerprint.to_vec(), StringFormat::Hexadecimal);
            doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
        }

        let version = EncryptionVersion::V2 {
            document: &doc,
            owner_password,
            user_password,
            key_length: 128,
            permissions: Permissions::all(),
        };
        let state = EncryptionState::try_from(version)
            .map_err(|err| EngineError::Pdf(format!("cannot derive encryption key: {err}")))?;
        doc.encrypt(&state)
            .map_err(|err| EngineError::Pdf(format!("encryption failed: {err}")))?;

        info!("PDF encrypted");
        serialise(&mut doc)
    }

    /// Remove encryption.  An unencrypted document passes through unchanged.
    #[instrument(skip_all)]
    pub fn decrypt(&self, password: &str) -> EngineResult<Vec<u8>> {
        let Some(source) = self.sealed.as_deref() else {
            debug!("Document is not encrypted, passing through");
            return serialise(&mut self.document.clone());
        };

        self.document.authenticate_password(password).map_err(|err| {
            debug!(%err, "Decryption rejected");
            EngineError::WrongPassword
        })?;

        let mut doc = read_sealed_objects(source, self.document.clone());
        doc.decrypt(password)
            .map_err(|err| EngineError::Pdf(format!("decryption failed: {err}")))?;
        // Objects held in object streams were expanded by the decryption.
        doc.objects
            .retain(|_, object| !object.as_stream().is_ok_and(|stream| stream.dict.has_type(b"ObjStm")));

        info!(pages = doc.get_pages().len(), "PDF decrypted");
        serialise(&mut doc)
    }

    /// Concatenate the pages of `readers` in the order given.
    #[instrument(skip_all, fields(documents = readers.len()))]
    pub fn merge(readers: &[PdfReader]) -> EngineResult<Vec<u8>> {
        let mut target = empty_document();
        let pages_id = pages_root(&target)?;

        for (index, reader) in readers.iter().enumerate() {
            reader.ensure_plain()?;
            let source_pages = reader.document.get_pages();
            let mut copier = ObjectCopier::new(&reader.document);

            // Reserve every page first so cross-page references (link
            // destinations, annotation /P) land on the copies.
            for &page_id in source_pages.values() {
                copier.reserve(&mut target, page_id);
            }
            for &page_id in source_pages.values() {
                let copied = copier.copy_page(&mut target, page_id, pages_id)?;
                append_kid(&mut target, pages_id, copied)?;
            }

            debug!(
                document = index + 1,
                pages = source_pages.len(),
                "Document appended"
            );
        }

        let output = serialise(&mut target)?;
        info!(output_bytes = output.len(), "Merge complete");
        Ok(output)
    }
}

// -- Page tree helpers --------------------------------------------------------

/// A document with an empty page tree and a catalog.
pub(crate) fn empty_document() -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn pages_root(doc: &Document) -> EngineResult<ObjectId> {
    Ok(doc.catalog()?.get(b"Pages").and_then(Object::as_reference)?)
}

fn append_kid(doc: &mut Document, pages_id: ObjectId, kid: ObjectId) -> EngineResult<()> {
    let pages = doc.get_object_mut(pages_id).and_then(Object::as_dict_mut)?;
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
        kids.push(Object::Reference(kid));
    } else {
        pages.set("Kids", vec![Object::Reference(kid)]);
    }
    pages.set("Count", count + 1);
    Ok(())
}

pub(crate) fn page_id(doc: &Document, page_number: u32) -> EngineResult<ObjectId> {
    doc.get_pages()
        .get(&page_number)
        .copied()
        .ok_or_else(|| EngineError::Pdf(format!("page {page_number} missing from page tree")))
}

/// Look up `key` on a page or the nearest ancestor that defines it.
pub(crate) fn inherited<'d>(doc: &'d Document, page_id: ObjectId, key: &[u8]) -> Option<&'d Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

pub(crate) fn geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| doc.dereference(obj).ok())
        .and_then(|(_, obj)| obj.as_array().ok())
        .and_then(|items| {
            let values: Vec<f32> = items.iter().filter_map(as_number).collect();
            <[f32; 4]>::try_from(values).ok()
        })
        .unwrap_or(FALLBACK_MEDIA_BOX);

    let rotate = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
        / 90
        * 90;

    let [x0, y0, x1, y1] = media_box;
    PageGeometry {
        origin_x: x0.min(x1),
        origin_y: y0.min(y1),
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
        rotate,
    }
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Parse every uncompressed object of an encrypted file into `shell`, the
/// trailer-only document the loader produced for it.  Strings and streams are
/// left encrypted for [`Document::decrypt`].
fn read_sealed_objects(source: &[u8], shell: Document) -> Document {
    // Cross-reference offsets count from the header, as in the loader.
    let start = source.windows(5).position(|window| window == b"%PDF-").unwrap_or(0);
    let ids: Vec<ObjectId> = shell
        .reference_table
        .entries
        .iter()
        .filter_map(|(&number, entry)| match *entry {
            XrefEntry::Normal { generation, .. } => Some((number, generation)),
            _ => None,
        })
        .filter(|id| !shell.objects.contains_key(id))
        .collect();

    let reader = Reader {
        buffer: &source[start..],
        document: shell,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };
    let mut objects = Vec::with_capacity(ids.len());
    for id in ids {
        match reader.get_object(id, &mut HashSet::new()) {
            Ok(object) => objects.push((id, object)),
            Err(err) => warn!(object = ?id, %err, "Skipping unreadable encrypted object"),
        }
    }

    let mut doc = reader.document;
    doc.objects.extend(objects);
    doc
}

/// Remove /Encrypt from the trailer together with the dictionary it names.
fn drop_security_handler(doc: &mut Document) {
    if let Some(Ok(id)) = doc.trailer.remove(b"Encrypt").map(|object| object.as_reference()) {
        doc.objects.remove(&id);
    }
}

pub(crate) fn serialise(doc: &mut Document) -> EngineResult<Vec<u8>> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| EngineError::Pdf(format!("failed to serialise PDF: {err}")))?;
    Ok(output)
}

// -- Cross-document copying ---------------------------------------------------

/// Copies objects from one source document into a target, memoising every
/// reference so shared resources are copied once and cycles terminate.
struct ObjectCopier<'a> {
    source: &'a Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapped: HashMap::new(),
        }
    }

    fn reserve(&mut self, target: &mut Document, source_id: ObjectId) -> ObjectId {
        *self
            .mapped
            .entry(source_id)
            .or_insert_with(|| target.new_object_id())
    }

    /// Copy a page, flattening inherited attributes onto it and re-parenting
    /// it under `parent`.
    fn copy_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent: ObjectId,
    ) -> EngineResult<ObjectId> {
        let source = self.source;
        let new_id = self.reserve(target, page_id);

        let mut page = source.get_dictionary(page_id)?.clone();
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = inherited(source, page_id, key) {
                    page.set(key, value.clone());
                }
            }
        }
        page.remove(b"Parent");

        let mut copied = self.copy_dictionary(target, &page)?;
        copied.set("Parent", parent);
        target.objects.insert(new_id, Object::Dictionary(copied));
        Ok(new_id)
    }

    fn copy_reference(&mut self, target: &mut Document, source_id: ObjectId) -> EngineResult<ObjectId> {
        if let Some(&existing) = self.mapped.get(&source_id) {
            return Ok(existing);
        }
        let source = self.source;
        let new_id = target.new_object_id();
        self.mapped.insert(source_id, new_id);

        let copied = match source.get_object(source_id) {
            Ok(object) => self.copy_value(target, object)?,
            Err(err) => {
                warn!(?source_id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        target.objects.insert(new_id, copied);
        Ok(new_id)
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> EngineResult<Dictionary> {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy_value(target, value)?);
        }
        Ok(copied)
    }

    fn copy_value(&mut self, target: &mut Document, object: &Object) -> EngineResult<Object> {
        Ok(match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)?),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_value(target, item))
                    .collect::<EngineResult<Vec<_>>>()?,
            ),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dictionary(target, &stream.dict)?;
                Object::Stream(copied)
            }
            other => other.clone(),
        })
    }
}

// -- Text helpers -------------------------------------------------------------

/// Decode a PDF text string: UTF-16BE when it carries a byte-order mark,
/// otherwise treated as single-byte (PDFDocEncoding ≈ Latin-1).
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Render `D:YYYYMMDDHHmmSS...` as `YYYY-MM-DDTHH:mm:SS`.  Anything that
/// does not look like a PDF date is returned unchanged.
fn format_pdf_date(raw: &str) -> String {
    let digits = raw.trim().trim_start_matches("D:");
    let head: String = digits.chars().take_while(char::is_ascii_digit).collect();
    if head.len() < 8 {
        return raw.to_string();
    }
    let field = |from: usize, to: usize| head.get(from..to).unwrap_or("00").to_string();
    format!(
        "{}-{}-{}T{}:{}:{}",
        field(0, 4),
        field(4, 6),
        field(6, 8),
        field(8, 10),
        field(10, 12),
        field(12, 14)
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::Stream;
    use lopdf::content::{Content, Operation};

    /// Build an `n`-page PDF.  Page `i` (1-based) has MediaBox width
    /// `100 + i` so page order can be asserted after transformations, and
    /// draws the text `Page i`.
    pub(crate) fn sample_pdf(n: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for i in 1..=n {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![20.into(), 400.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {i}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), (100 + i as i64).into(), 500.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => n as i64,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Quarterly Report"),
            "Author" => Object::string_literal("Ada"),
            "CreationDate" => Object::string_literal("D:20240131120000Z"),
        });
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save sample");
        bytes
    }

    /// MediaBox widths of every page, in order.
    pub(crate) fn page_widths(bytes: &[u8]) -> Vec<u32> {
        let reader = PdfReader::from_bytes(bytes).expect("reload");
        (1..=reader.page_count())
            .map(|p| reader.page_geometry(p).expect("geometry").width as u32)
            .collect()
    }

    #[test]
    fn opens_and_counts_pages() {
        let reader = PdfReader::from_bytes(&sample_pdf(4)).unwrap();
        assert_eq!(reader.page_count(), 4);
        assert!(!reader.is_encrypted());
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(
            PdfReader::from_bytes(b"definitely not a pdf"),
            Err(EngineError::Corrupt(_))
        ));
    }

    #[test]
    fn inherited_geometry_and_rotation() {
        let reader = PdfReader::from_bytes(&sample_pdf(2)).unwrap();
        let geometry = reader.page_geometry(2).unwrap();
        assert_eq!(geometry.width, 102.0);
        assert_eq!(geometry.height, 500.0);
        assert_eq!(geometry.rotate, 0);

        let rotated = reader.rotate(&[2], 90).unwrap();
        let rotated = PdfReader::from_bytes(&rotated).unwrap();
        assert_eq!(rotated.page_geometry(1).unwrap().rotate, 0);
        let geometry = rotated.page_geometry(2).unwrap();
        assert_eq!(geometry.rotate, 90);
        assert_eq!(geometry.displayed_size(), (500.0, 102.0));
    }

    #[test]
    fn rotation_accumulates() {
        let reader = PdfReader::from_bytes(&sample_pdf(1)).unwrap();
        let once = PdfReader::from_bytes(&reader.rotate(&[1], 270).unwrap()).unwrap();
        let twice = PdfReader::from_bytes(&once.rotate(&[1], 180).unwrap()).unwrap();
        assert_eq!(twice.page_geometry(1).unwrap().rotate, 90);
    }

    #[test]
    fn select_keeps_document_order() {
        let reader = PdfReader::from_bytes(&sample_pdf(5)).unwrap();
        let selected = reader.select(&[2, 4, 5]).unwrap();
        assert_eq!(page_widths(&selected), vec![102, 104, 105]);
    }

    #[test]
    fn merge_preserves_input_order() {
        let a = PdfReader::from_bytes(&sample_pdf(2)).unwrap();
        let b = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        let merged = PdfReader::merge(&[b, a]).unwrap();
        assert_eq!(page_widths(&merged), vec![101, 102, 103, 101, 102]);
    }

    #[test]
    fn merged_pages_keep_inherited_resources() {
        let a = PdfReader::from_bytes(&sample_pdf(1)).unwrap();
        let b = PdfReader::from_bytes(&sample_pdf(1)).unwrap();
        let merged = PdfReader::from_bytes(&PdfReader::merge(&[a, b]).unwrap()).unwrap();
        let doc = merged.document();
        for page_id in doc.get_pages().values() {
            assert!(doc.get_dictionary(*page_id).unwrap().has(b"Resources"));
        }
    }

    #[test]
    fn compress_keeps_pages() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        for tier in [CompressionTier::Low, CompressionTier::Medium, CompressionTier::High] {
            let output = reader.compress(tier).unwrap();
            assert_eq!(page_widths(&output), vec![101, 102, 103]);
        }
        let stripped = PdfReader::from_bytes(&reader.compress(CompressionTier::High).unwrap()).unwrap();
        assert_eq!(stripped.metadata()["title"], "");
    }

    #[test]
    fn metadata_has_every_field() {
        let reader = PdfReader::from_bytes(&sample_pdf(1)).unwrap();
        let metadata = reader.metadata();
        assert_eq!(metadata.len(), INFO_FIELDS.len());
        assert_eq!(metadata["title"], "Quarterly Report");
        assert_eq!(metadata["author"], "Ada");
        assert_eq!(metadata["creation_date"], "2024-01-31T12:00:00");
        assert_eq!(metadata["producer"], "");
    }

    #[test]
    fn extract_text_per_page() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        let pages = reader.extract_text(&[1, 3]).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert!(pages[0].content.contains("Page 1"));
        assert!(pages[1].content.contains("Page 3"));
    }

    #[test]
    fn encrypt_then_decrypt() {
        let reader = PdfReader::from_bytes(&sample_pdf(2)).unwrap();
        let locked = PdfReader::from_bytes(&reader.encrypt("hunter2", "hunter2").unwrap()).unwrap();
        assert!(locked.is_encrypted());
        assert!(matches!(locked.select(&[1]), Err(EngineError::Encrypted)));
        assert!(matches!(locked.decrypt("wrong"), Err(EngineError::WrongPassword)));

        let unlocked = PdfReader::from_bytes(&locked.decrypt("hunter2").unwrap()).unwrap();
        assert!(!unlocked.is_encrypted());
        assert_eq!(unlocked.page_count(), 2);
        assert_eq!(page_widths(&locked.decrypt("hunter2").unwrap()), vec![101, 102]);
        assert_eq!(unlocked.metadata()["title"], reader.metadata()["title"]);
    }

    #[test]
    fn owner_password_also_unlocks() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        let locked = PdfReader::from_bytes(&reader.encrypt("reader", "owner").unwrap()).unwrap();
        assert_eq!(locked.page_count(), 0);

        let unlocked = locked.decrypt("owner").unwrap();
        assert_eq!(page_widths(&unlocked), vec![101, 102, 103]);
    }

    #[test]
    fn empty_user_password_opens_without_unlocking() {
        let reader = PdfReader::from_bytes(&sample_pdf(2)).unwrap();
        let opened = PdfReader::from_bytes(&reader.encrypt("", "owner").unwrap()).unwrap();
        assert!(!opened.is_encrypted());
        assert_eq!(page_widths(&opened.select(&[2]).unwrap()), vec![102]);
    }

    #[test]
    fn decrypt_passes_plain_documents_through() {
        let reader = PdfReader::from_bytes(&sample_pdf(2)).unwrap();
        let output = reader.decrypt("anything").unwrap();
        assert_eq!(page_widths(&output), vec![101, 102]);
    }

    #[test]
    fn text_string_decoding() {
        assert_eq!(decode_text_string(b"plain"), "plain");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(format_pdf_date("D:20240131"), "2024-01-31T00:00:00");
        assert_eq!(format_pdf_date("yesterday"), "yesterday");
    }
}
