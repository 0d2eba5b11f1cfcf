//! Size reduction
//!
//! JPEG images are re-encoded at a lower quality (and optionally
//! downscaled), unreachable objects are pruned and uncompressed streams are
//! flate-compressed. The original bytes are returned when nothing helped.

use crate::error::PdfToolsError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use lopdf::{Document, Object, Stream};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionLevel {
    /// JPEG quality used when re-encoding images
    pub fn jpeg_quality(self) -> u8 {
        match self {
            CompressionLevel::Low => 90,
            CompressionLevel::Medium => 60,
            CompressionLevel::High => 30,
        }
    }

    /// Longest image edge in pixels after downscaling
    pub fn max_dimension(self) -> Option<u32> {
        match self {
            CompressionLevel::Low => None,
            CompressionLevel::Medium => Some(2000),
            CompressionLevel::High => Some(1200),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(PdfToolsError::InvalidArgument(format!(
                "Unknown compression level '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

pub fn compress_document(bytes: &[u8], level: CompressionLevel) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc =
        Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;

    for object in doc.objects.values_mut() {
        if let Object::Stream(stream) = object {
            if is_recompressible_jpeg(stream) {
                recompress_jpeg(stream, level);
            }
        }
    }

    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;

    if buffer.len() >= bytes.len() {
        return Ok(bytes.to_vec());
    }
    Ok(buffer)
}

pub fn compress_file(
    input: &Path,
    output: &Path,
    level: CompressionLevel,
) -> Result<(), PdfToolsError> {
    let compressed = compress_document(&std::fs::read(input)?, level)?;
    std::fs::write(output, compressed)?;
    Ok(())
}

fn is_recompressible_jpeg(stream: &Stream) -> bool {
    let dict = &stream.dict;
    let name_is = |key: &[u8], expected: &[&[u8]]| match dict.get(key) {
        Ok(Object::Name(name)) => expected.contains(&name.as_slice()),
        Ok(Object::Array(items)) if items.len() == 1 => {
            matches!(&items[0], Object::Name(name) if expected.contains(&name.as_slice()))
        }
        _ => false,
    };

    name_is(b"Subtype", &[b"Image".as_slice()])
        && name_is(b"Filter", &[b"DCTDecode".as_slice()])
        && name_is(
            b"ColorSpace",
            &[b"DeviceRGB".as_slice(), b"DeviceGray".as_slice()],
        )
        && !dict.has(b"SMask")
}

/// Replace the stream content when re-encoding shrinks it. Images the
/// decoder cannot read are left alone.
fn recompress_jpeg(stream: &mut Stream, level: CompressionLevel) {
    let Ok(mut decoded) = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
    else {
        return;
    };

    if let Some(limit) = level.max_dimension() {
        if decoded.width() > limit || decoded.height() > limit {
            decoded = decoded.resize(limit, limit, FilterType::Triangle);
        }
    }

    let gray = matches!(stream.dict.get(b"ColorSpace"), Ok(Object::Name(name)) if name == b"DeviceGray");
    let normalized = if gray {
        DynamicImage::ImageLuma8(decoded.to_luma8())
    } else {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    };

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, level.jpeg_quality());
    if normalized.write_with_encoder(encoder).is_err() || encoded.len() >= stream.content.len() {
        return;
    }

    stream.dict.set("Width", Object::Integer(normalized.width() as i64));
    stream.dict.set("Height", Object::Integer(normalized.height() as i64));
    stream.dict.set("BitsPerComponent", Object::Integer(8));
    stream.dict.remove(b"DecodeParms");
    stream.set_content(encoded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::image_pdf::image_to_pdf;
    use pretty_assertions::assert_eq;

    fn image_dimensions(bytes: &[u8]) -> (i64, i64) {
        let doc = Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .find_map(|obj| match obj {
                Object::Stream(s) if is_recompressible_jpeg(s) => Some((
                    s.dict.get(b"Width").unwrap().as_i64().unwrap(),
                    s.dict.get(b"Height").unwrap().as_i64().unwrap(),
                )),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("low".parse::<CompressionLevel>().unwrap(), CompressionLevel::Low);
        assert_eq!(" HIGH ".parse::<CompressionLevel>().unwrap(), CompressionLevel::High);
        assert!("extreme".parse::<CompressionLevel>().is_err());
        assert_eq!(CompressionLevel::default(), CompressionLevel::Medium);
    }

    #[test]
    fn test_compress_never_grows_output() {
        let original = fixtures::document(3, "Small");
        for level in [CompressionLevel::Low, CompressionLevel::Medium, CompressionLevel::High] {
            let compressed = compress_document(&original, level).unwrap();
            assert!(compressed.len() <= original.len());
            let doc = Document::load_mem(&compressed).unwrap();
            assert_eq!(doc.get_pages().len(), 3);
        }
    }

    #[test]
    fn test_high_level_downscales_large_jpeg() {
        let pdf = image_to_pdf(&fixtures::jpeg(2400, 1600)).unwrap();
        let compressed = compress_document(&pdf, CompressionLevel::High).unwrap();

        assert!(compressed.len() < pdf.len());
        assert_eq!(image_dimensions(&compressed), (1200, 800));
    }

    #[test]
    fn test_compress_rejects_garbage() {
        let err = compress_document(b"not a pdf", CompressionLevel::Medium).unwrap_err();
        assert!(matches!(err, PdfToolsError::ParseError(_)));
    }
}
