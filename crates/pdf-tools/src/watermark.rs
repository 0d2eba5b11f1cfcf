//! Text watermark overlay
//!
//! Each page gets its original content wrapped in `q`/`Q` followed by a
//! diagonal, semi-transparent text stream drawn on top.

use crate::error::PdfToolsError;
use crate::page::{self, resolve};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::Path;

const FONT_RESOURCE: &str = "WmF1";
const STATE_RESOURCE: &str = "WmGS1";
const FONT_SIZE: f32 = 60.0;
const OPACITY: f32 = 0.3;
const GREY: f32 = 0.5;
/// Average Helvetica-Bold glyph width in text space units
const AVG_GLYPH_WIDTH: f32 = 0.6;

/// Stamp `text` diagonally across every page.
pub fn watermark_document(bytes: &[u8], text: &str) -> Result<Vec<u8>, PdfToolsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PdfToolsError::InvalidArgument(
            "Watermark text must not be empty".into(),
        ));
    }

    let mut doc =
        Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica-Bold".to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]));
    let state_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"ExtGState".to_vec())),
        ("ca", Object::Real(OPACITY)),
        ("CA", Object::Real(OPACITY)),
    ]));
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let encoded_text = encode_win_ansi(text);
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    for page_id in page_ids {
        let (width, height) = page::page_size(&doc, page_id);
        let overlay = overlay_content(&encoded_text, width, height)?;
        let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

        let mut resources = page::resources(&doc, page_id);
        add_resource(&doc, &mut resources, b"Font", FONT_RESOURCE, font_id);
        add_resource(&doc, &mut resources, b"ExtGState", STATE_RESOURCE, state_id);

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(existing_contents(&doc, page_id)?);
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(overlay_id));

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfToolsError::OperationError(format!("Invalid page object: {}", e)))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));
    }

    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

pub fn watermark_file(input: &Path, output: &Path, text: &str) -> Result<(), PdfToolsError> {
    let stamped = watermark_document(&std::fs::read(input)?, text)?;
    std::fs::write(output, stamped)?;
    Ok(())
}

/// Content stream drawing the text rotated 45 degrees around the page centre
fn overlay_content(text: &[u8], width: f32, height: f32) -> Result<Vec<u8>, PdfToolsError> {
    let (sin, cos) = std::f32::consts::FRAC_PI_4.sin_cos();
    let text_width = text.len() as f32 * FONT_SIZE * AVG_GLYPH_WIDTH;

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(STATE_RESOURCE.as_bytes().to_vec())]),
            Operation::new(
                "rg",
                vec![Object::Real(GREY), Object::Real(GREY), Object::Real(GREY)],
            ),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                    Object::Real(FONT_SIZE),
                ],
            ),
            Operation::new(
                "Tm",
                vec![
                    Object::Real(cos),
                    Object::Real(sin),
                    Object::Real(-sin),
                    Object::Real(cos),
                    Object::Real(width / 2.0),
                    Object::Real(height / 2.0),
                ],
            ),
            Operation::new(
                "Td",
                vec![Object::Real(-text_width / 2.0), Object::Real(-FONT_SIZE / 3.0)],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(text.to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };

    content
        .encode()
        .map_err(|e| PdfToolsError::OperationError(format!("Failed to encode watermark: {}", e)))
}

/// Current page content as a list of stream references
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PdfToolsError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfToolsError::OperationError(format!("Invalid page object: {}", e)))?;

    match page.get(b"Contents") {
        Err(_) => Ok(Vec::new()),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // Indirect array of streams
            Ok(Object::Array(items)) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        Ok(Object::Array(items)) => Ok(items.clone()),
        Ok(_) => Err(PdfToolsError::OperationError(
            "Unsupported page contents entry".into(),
        )),
    }
}

/// Insert `name -> id` into the `category` sub-dictionary of `resources`,
/// inlining the sub-dictionary if it was a reference.
fn add_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    name: &str,
    id: ObjectId,
) {
    let mut entries = resources
        .get(category)
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok().cloned())
        .unwrap_or_default();
    entries.set(name, Object::Reference(id));
    resources.set(category.to_vec(), Object::Dictionary(entries));
}

/// Map text onto single-byte WinAnsi, replacing anything outside Latin-1
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}
