//! JPEG marker-stream walker.
//!
//! Copies SOI, the frame/table segments and APP0, drops every other
//! length-prefixed segment (APP1-APP15, COM, unknown markers) and hands the
//! rest of the file over verbatim once SOS is reached. Entropy-coded scan
//! data is never searched for markers.
//!
//! A malformed stream (a non-marker byte where a marker is expected, or a
//! length field that does not fit) is not an error: traversal stops and the
//! output built so far is returned.

use crate::policy;
use crate::{ImageFormat, JPEG_SIGNATURE, MetadataEntry, Result, Scrubber, StripError, StripResult};
use nom_exif::{ExifIter, MediaParser, MediaSource};
use std::io::Cursor;

const MARKER_PREFIX: u8 = 0xFF;
const TEM: u8 = 0x01;
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP1: u8 = 0xE1;

const SEGMENT_CATEGORY: &str = "JPEG segment";

/// Markers that carry no length field.
fn is_standalone(marker: u8) -> bool {
    marker == TEM || (RST0..=RST7).contains(&marker)
}

/// Human-readable marker name, e.g. `APP1`, `SOF2`, `COM`.
pub fn marker_name(marker: u8) -> String {
    match marker {
        0xC4 => "DHT".into(),
        0xC8 => "JPG".into(),
        0xCC => "DAC".into(),
        0xC0..=0xCF => format!("SOF{}", marker - 0xC0),
        RST0..=RST7 => format!("RST{}", marker - RST0),
        0xD8 => "SOI".into(),
        EOI => "EOI".into(),
        SOS => "SOS".into(),
        0xDB => "DQT".into(),
        0xDC => "DNL".into(),
        0xDD => "DRI".into(),
        0xDE => "DHP".into(),
        0xDF => "EXP".into(),
        0xE0..=0xEF => format!("APP{}", marker - 0xE0),
        0xFE => "COM".into(),
        TEM => "TEM".into(),
        other => format!("0x{:02X}", other),
    }
}

/// The NUL-terminated identifier at the start of an APPn payload
/// ("Exif", "ICC_PROFILE", "http://ns.adobe.com/xap/1.0/", ...).
fn app_identifier(payload: &[u8]) -> Option<&str> {
    let end = payload.iter().take(64).position(|&b| b == 0)?;
    let id = &payload[..end];
    if id.is_empty() || !id.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return None;
    }
    std::str::from_utf8(id).ok()
}

fn removed_entry(marker: u8, offset: usize, segment: &[u8]) -> MetadataEntry {
    // `segment` starts at the length field; +2 for the marker itself.
    let mut value = format!("{} bytes at offset {}", segment.len() + 2, offset);
    if (0xE0..=0xEF).contains(&marker) {
        if let Some(id) = app_identifier(&segment[2..]) {
            value.push_str(&format!(" ({})", id));
        }
    }
    MetadataEntry {
        key: marker_name(marker),
        value,
        category: SEGMENT_CATEGORY.to_string(),
    }
}

/// Strips metadata segments from a JPEG buffer.
pub fn walk(file_bytes: &[u8]) -> Result<Vec<u8>> {
    walk_with(file_bytes, &mut Vec::new())
}

/// Same as [`walk`], additionally recording every dropped segment.
pub fn walk_with(file_bytes: &[u8], removed: &mut Vec<MetadataEntry>) -> Result<Vec<u8>> {
    walk_segments(file_bytes, |marker, offset, segment| {
        removed.push(removed_entry(marker, offset, segment));
    })
}

/// True when a dropped segment is an APP1 carrying an `Exif` identifier.
fn is_exif_app1(marker: u8, segment: &[u8]) -> bool {
    marker == APP1 && app_identifier(&segment[2..]) == Some("Exif")
}

/// The traversal itself. `on_drop` gets the marker, its offset and the
/// segment bytes (length field onward) of everything left out.
fn walk_segments(
    file_bytes: &[u8],
    mut on_drop: impl FnMut(u8, usize, &[u8]),
) -> Result<Vec<u8>> {
    if !file_bytes.starts_with(&JPEG_SIGNATURE) {
        return Err(StripError::InvalidJpegSignature);
    }

    let mut output = Vec::with_capacity(file_bytes.len());
    output.extend_from_slice(&JPEG_SIGNATURE);
    let mut cursor = JPEG_SIGNATURE.len();

    loop {
        let marker_offset = cursor;
        let Some(&[prefix, marker]) = file_bytes.get(cursor..cursor + 2) else {
            log::debug!("JPEG stream ends at offset {} without EOI", cursor);
            break;
        };
        if prefix != MARKER_PREFIX {
            log::debug!(
                "expected a marker at offset {}, found 0x{:02X}; stopping",
                cursor,
                prefix
            );
            break;
        }
        cursor += 2;

        if marker == EOI {
            output.extend_from_slice(&[MARKER_PREFIX, EOI]);
            break;
        }
        if is_standalone(marker) {
            output.extend_from_slice(&[MARKER_PREFIX, marker]);
            continue;
        }

        let Some(&[hi, lo]) = file_bytes.get(cursor..cursor + 2) else {
            log::debug!(
                "truncated length field for {} at offset {}",
                marker_name(marker),
                marker_offset
            );
            break;
        };
        // The length counts its own two bytes.
        let length = u16::from_be_bytes([hi, lo]) as usize;
        if length < 2 {
            log::debug!(
                "invalid length {} for {} at offset {}",
                length,
                marker_name(marker),
                marker_offset
            );
            break;
        }
        let Some(segment) = file_bytes.get(cursor..cursor + length) else {
            log::debug!(
                "{} at offset {} declares {} bytes, only {} remain",
                marker_name(marker),
                marker_offset,
                length,
                file_bytes.len() - cursor
            );
            break;
        };

        if policy::is_essential_marker(marker) {
            output.extend_from_slice(&[MARKER_PREFIX, marker]);
            output.extend_from_slice(segment);
        } else {
            log::trace!(
                "dropping {} ({} bytes) at offset {}",
                marker_name(marker),
                length + 2,
                marker_offset
            );
            on_drop(marker, marker_offset, segment);
        }
        cursor += length;

        if marker == SOS {
            output.extend_from_slice(&file_bytes[cursor..]);
            break;
        }
    }

    Ok(output)
}

/// A Scrubber implementation for JPEG files.
#[derive(Debug, Clone)]
pub struct JpegScrubber {
    file_bytes: Vec<u8>,
}

impl JpegScrubber {
    /// Decodes the EXIF tags, if any, so the caller can see what is about to go.
    fn exif_entries(&self) -> Result<Vec<MetadataEntry>> {
        let media_source = MediaSource::seekable(Cursor::new(&self.file_bytes)).map_err(|e| {
            StripError::ParsingError(format!("Failed to create MediaSource: {:?}", e))
        })?;

        if !media_source.has_exif() {
            return Ok(Vec::new());
        }

        let mut parser = MediaParser::new();
        let exif_iter: ExifIter = parser
            .parse(media_source)
            .map_err(|e| StripError::ParsingError(format!("Failed to parse EXIF: {:?}", e)))?;

        let mut entries = Vec::new();
        for entry in exif_iter {
            let key = match entry.tag() {
                Some(tag) => format!("{:?}", tag),
                None => "<Unknown Tag>".to_string(),
            };

            let category = match entry.ifd_index() {
                0 => "IFD0".to_string(),
                1 => "IFD1".to_string(),
                2 => "EXIF".to_string(),
                3 => "GPS".to_string(),
                4 => "Interop".to_string(),
                n => format!("IFD_{}", n),
            };

            let value = match entry.get_value() {
                Some(value) => format!("{:?}", value),
                None => "<No Value>".to_string(),
            };

            entries.push(MetadataEntry {
                key,
                value,
                category,
            });
        }
        Ok(entries)
    }
}

impl Scrubber for JpegScrubber {
    fn new(file_bytes: Vec<u8>) -> Result<Self> {
        if !file_bytes.starts_with(&JPEG_SIGNATURE) {
            return Err(StripError::InvalidJpegSignature);
        }
        Ok(Self { file_bytes })
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn view_metadata(&self) -> Result<Vec<MetadataEntry>> {
        let mut entries = Vec::new();
        let mut has_exif = false;
        walk_segments(&self.file_bytes, |marker, offset, segment| {
            has_exif |= is_exif_app1(marker, segment);
            entries.push(removed_entry(marker, offset, segment));
        })?;
        if has_exif {
            entries.extend(self.exif_entries()?);
        }
        Ok(entries)
    }

    fn scrub(&self) -> Result<StripResult> {
        crate::strip_as(ImageFormat::Jpeg, &self.file_bytes)
    }
}
