// File: crates/metastrip-core/src/png.rs

use crate::policy;
use crate::{ImageFormat, MetadataEntry, PNG_SIGNATURE, Result, Scrubber, StripError, StripResult};
use std::io::Cursor;

const IEND: [u8; 4] = *b"IEND";
/// Length, type and CRC fields around every chunk payload.
const CHUNK_OVERHEAD: usize = 12;

const CHUNK_CATEGORY: &str = "PNG chunk";

/// Strips metadata chunks from a PNG buffer.
pub fn walk(file_bytes: &[u8]) -> Result<Vec<u8>> {
    walk_with(file_bytes, &mut Vec::new())
}

/// Same as [`walk`], additionally recording every dropped chunk.
///
/// Chunks are copied whole, CRC included, and never re-checksummed.
/// Traversal ends right after IEND; anything past it is discarded.
pub fn walk_with(file_bytes: &[u8], removed: &mut Vec<MetadataEntry>) -> Result<Vec<u8>> {
    if !file_bytes.starts_with(&PNG_SIGNATURE) {
        return Err(StripError::InvalidPngSignature);
    }

    let mut output = Vec::with_capacity(file_bytes.len());
    output.extend_from_slice(&PNG_SIGNATURE);
    let mut cursor = PNG_SIGNATURE.len();

    while file_bytes.len() - cursor >= 8 {
        let header = &file_bytes[cursor..cursor + 8];
        let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let chunk_type = [header[4], header[5], header[6], header[7]];

        let available = file_bytes.len() - cursor;
        let chunk_len = (declared as usize)
            .checked_add(CHUNK_OVERHEAD)
            .filter(|&len| len <= available)
            .ok_or_else(|| StripError::TruncatedChunk {
                offset: cursor,
                chunk_type: String::from_utf8_lossy(&chunk_type).into_owned(),
                declared,
                available: available.saturating_sub(CHUNK_OVERHEAD),
            })?;
        let chunk = &file_bytes[cursor..cursor + chunk_len];

        if policy::is_essential_chunk(&chunk_type) {
            output.extend_from_slice(chunk);
        } else {
            let name = String::from_utf8_lossy(&chunk_type).into_owned();
            log::trace!("dropping {} ({} bytes) at offset {}", name, chunk_len, cursor);
            removed.push(MetadataEntry {
                key: name,
                value: format!("{} bytes at offset {}", chunk_len, cursor),
                category: CHUNK_CATEGORY.to_string(),
            });
        }
        cursor += chunk_len;

        if chunk_type == IEND {
            if cursor < file_bytes.len() {
                log::debug!(
                    "discarding {} trailing byte(s) after IEND",
                    file_bytes.len() - cursor
                );
            }
            break;
        }
    }

    Ok(output)
}

/// A Scrubber implementation for PNG files.
#[derive(Debug, Clone)]
pub struct PngScrubber {
    file_bytes: Vec<u8>,
}

impl PngScrubber {
    /// Decodes the textual chunks that precede the image data.
    ///
    /// `read_info` stops at the first IDAT, so text stored after the image
    /// data is only reported by its structural `PNG chunk` entry.
    fn text_entries(&self) -> Result<Vec<MetadataEntry>> {
        let decoder = ::png::Decoder::new(Cursor::new(&self.file_bytes));
        let reader = decoder
            .read_info()
            .map_err(|e| StripError::ParsingError(e.to_string()))?;
        let info = reader.info();
        let mut metadata = Vec::new();

        for text_chunk in &info.uncompressed_latin1_text {
            metadata.push(MetadataEntry {
                category: "tEXt".to_string(),
                key: text_chunk.keyword.clone(),
                value: text_chunk.text.clone(),
            });
        }
        for text_chunk in &info.compressed_latin1_text {
            metadata.push(MetadataEntry {
                category: "zTXt".to_string(),
                key: text_chunk.keyword.clone(),
                value: text_chunk
                    .get_text()
                    .map_err(|e| StripError::ParsingError(e.to_string()))?,
            });
        }
        for text_chunk in &info.utf8_text {
            metadata.push(MetadataEntry {
                category: "iTXt".to_string(),
                key: text_chunk.keyword.clone(),
                value: text_chunk
                    .get_text()
                    .map_err(|e| StripError::ParsingError(e.to_string()))?,
            });
        }

        Ok(metadata)
    }
}

impl Scrubber for PngScrubber {
    fn new(file_bytes: Vec<u8>) -> Result<Self> {
        if !file_bytes.starts_with(&PNG_SIGNATURE) {
            return Err(StripError::InvalidPngSignature);
        }
        Ok(Self { file_bytes })
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn view_metadata(&self) -> Result<Vec<MetadataEntry>> {
        let mut metadata = Vec::new();
        walk_with(&self.file_bytes, &mut metadata)?;
        let has_text = metadata
            .iter()
            .any(|m| matches!(m.key.as_str(), "tEXt" | "zTXt" | "iTXt"));
        if has_text {
            metadata.extend(self.text_entries()?);
        }
        Ok(metadata)
    }

    fn scrub(&self) -> Result<StripResult> {
        crate::strip_as(ImageFormat::Png, &self.file_bytes)
    }
}
