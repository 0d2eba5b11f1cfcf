//! Single-image documents

use crate::error::PdfToolsError;
use image::{GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use std::path::Path;

/// Wrap an encoded image (JPEG, PNG, GIF...) in a one-page PDF whose page is
/// the size of the image in pixels. JPEG data is embedded untouched.
pub fn image_to_pdf(bytes: &[u8]) -> Result<Vec<u8>, PdfToolsError> {
    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(PdfToolsError::ImageError("Image has no pixels".into()));
    }

    let mut image_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(width as i64)),
        ("Height", Object::Integer(height as i64)),
        ("BitsPerComponent", Object::Integer(8)),
    ]);

    let channels = decoded.color().channel_count();
    let embedded_jpeg = format == ImageFormat::Jpeg && (channels == 1 || channels == 3);
    let image_stream = if embedded_jpeg {
        let color_space: &[u8] = if channels == 1 { b"DeviceGray" } else { b"DeviceRGB" };
        image_dict.set("ColorSpace", Object::Name(color_space.to_vec()));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        // Already compressed
        Stream::new(image_dict, bytes.to_vec()).with_compression(false)
    } else {
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        Stream::new(image_dict, decoded.to_rgb8().into_raw())
    };

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(image_stream);

    let (w, h) = (width as f32, height as f32);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| PdfToolsError::OperationError(format!("Failed to encode page: {}", e)))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let page_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(w),
                Object::Real(h),
            ]),
        ),
        ("Contents", Object::Reference(content_id)),
        (
            "Resources",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "XObject",
                Object::Dictionary(Dictionary::from_iter(vec![(
                    "Im0",
                    Object::Reference(image_id),
                )])),
            )])),
        ),
    ]));

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(1)),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

pub fn image_to_pdf_file(input: &Path, output: &Path) -> Result<(), PdfToolsError> {
    let pdf = image_to_pdf(&std::fs::read(input)?)?;
    std::fs::write(output, pdf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::page::page_size;
    use pretty_assertions::assert_eq;

    fn image_stream(doc: &Document) -> &Stream {
        doc.objects
            .values()
            .find_map(|obj| match obj {
                Object::Stream(s)
                    if matches!(s.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image") =>
                {
                    Some(s)
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_png_becomes_single_page_of_image_size() {
        let pdf = image_to_pdf(&fixtures::png(320, 200)).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();

        assert_eq!(doc.get_pages().len(), 1);
        let page_id = *doc.get_pages().values().next().unwrap();
        assert_eq!(page_size(&doc, page_id), (320.0, 200.0));
        let filter = image_stream(&doc).dict.get(b"Filter").unwrap();
        assert_eq!(filter.as_name_str().unwrap(), "FlateDecode");
    }

    #[test]
    fn test_jpeg_is_embedded_as_dct() {
        let jpeg = fixtures::jpeg(64, 48);
        let pdf = image_to_pdf(&jpeg).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();

        let stream = image_stream(&doc);
        let filter = stream.dict.get(b"Filter").unwrap();
        assert_eq!(filter.as_name_str().unwrap(), "DCTDecode");
        assert_eq!(stream.content, jpeg);
    }

    #[test]
    fn test_non_image_rejected() {
        let err = image_to_pdf(b"plain text, not pixels").unwrap_err();
        assert!(matches!(err, PdfToolsError::ImageError(_)));
    }
}
