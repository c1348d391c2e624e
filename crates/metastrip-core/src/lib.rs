// crates/metastrip-core/src/lib.rs

pub mod jpeg;
pub mod policy;
pub mod png;
use crate::jpeg::JpegScrubber;
use crate::png::PngScrubber;
use thiserror::Error;

/// The 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// The JPEG Start-Of-Image marker.
pub const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];

/// A universal error type for all stripping operations.
#[derive(Error, Debug)]
pub enum StripError {
    #[error("Unsupported file format (only JPEG and PNG are supported)")]
    UnsupportedFormat,

    #[error("Not a valid JPEG file: missing SOI marker")]
    InvalidJpegSignature,

    #[error("Not a valid PNG file: bad signature")]
    InvalidPngSignature,

    #[error(
        "Truncated PNG chunk `{chunk_type}` at offset {offset}: \
         declares {declared} payload bytes but only {available} bytes remain"
    )]
    TruncatedChunk {
        offset: usize,
        chunk_type: String,
        declared: u32,
        available: usize,
    },

    #[error("Metadata parsing failed: {0}")]
    ParsingError(String),
}

impl StripError {
    /// True for the failures caused by the leading signature bytes.
    pub fn is_signature_error(&self) -> bool {
        matches!(
            self,
            StripError::UnsupportedFormat
                | StripError::InvalidJpegSignature
                | StripError::InvalidPngSignature
        )
    }
}

pub type Result<T> = std::result::Result<T, StripError>;

/// The container formats we know how to strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a buffer by its signature bytes.
///
/// At least 8 bytes are required, even for JPEG, so anything shorter is
/// rejected as unsupported.
pub fn detect_format(file_bytes: &[u8]) -> Result<ImageFormat> {
    if file_bytes.len() < PNG_SIGNATURE.len() {
        return Err(StripError::UnsupportedFormat);
    }
    if file_bytes.starts_with(&JPEG_SIGNATURE) {
        return Ok(ImageFormat::Jpeg);
    }
    if file_bytes.starts_with(&PNG_SIGNATURE) {
        return Ok(ImageFormat::Png);
    }
    Err(StripError::UnsupportedFormat)
}

/// Represents a single piece of metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
    pub category: String, // e.g., "JPEG segment", "PNG chunk", "GPS", "tEXt"
}

/// The result of a successful strip operation.
#[derive(Debug)]
pub struct StripResult {
    /// The bytes of the new, cleaned file.
    pub cleaned_file_bytes: Vec<u8>,
    pub format: ImageFormat,
    pub original_size: usize,
    pub output_size: usize,
    /// One entry per segment or chunk that was dropped, in file order.
    pub metadata_removed: Vec<MetadataEntry>,
}

impl StripResult {
    pub fn bytes_saved(&self) -> usize {
        self.original_size.saturating_sub(self.output_size)
    }

    pub fn percent_saved(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        100.0 * self.bytes_saved() as f64 / self.original_size as f64
    }
}

/// Removes all non-essential metadata from a JPEG or PNG buffer.
///
/// Retained segments and chunks are copied byte-for-byte in their original
/// order; the input is never modified and no I/O is performed.
pub fn strip(file_bytes: &[u8]) -> Result<StripResult> {
    strip_as(detect_format(file_bytes)?, file_bytes)
}

/// Dispatches to the walker for an already-known format.
pub(crate) fn strip_as(format: ImageFormat, file_bytes: &[u8]) -> Result<StripResult> {
    let mut metadata_removed = Vec::new();
    let cleaned_file_bytes = match format {
        ImageFormat::Jpeg => jpeg::walk_with(file_bytes, &mut metadata_removed)?,
        ImageFormat::Png => png::walk_with(file_bytes, &mut metadata_removed)?,
    };
    log::debug!(
        "{}: dropped {} unit(s), {} -> {} bytes",
        format,
        metadata_removed.len(),
        file_bytes.len(),
        cleaned_file_bytes.len()
    );

    Ok(StripResult {
        original_size: file_bytes.len(),
        output_size: cleaned_file_bytes.len(),
        cleaned_file_bytes,
        format,
        metadata_removed,
    })
}

/// The central trait of our library.
/// Every supported container format implements this trait.
pub trait Scrubber {
    /// Creates a new Scrubber instance from file bytes.
    /// Only the signature is checked here; the body is walked lazily.
    fn new(file_bytes: Vec<u8>) -> Result<Self>
    where
        Self: Sized;

    fn format(&self) -> ImageFormat;

    /// Returns all found metadata in a structured format.
    fn view_metadata(&self) -> Result<Vec<MetadataEntry>>;

    /// Removes all non-essential metadata.
    fn scrub(&self) -> Result<StripResult>;
}

/// Detects the file type and returns the appropriate scrubber.
/// This is the main entry point for consumers that want both views.
pub fn scrubber_for_file(file_bytes: Vec<u8>) -> Result<Box<dyn Scrubber>> {
    match detect_format(&file_bytes)? {
        ImageFormat::Jpeg => Ok(Box::new(JpegScrubber::new(file_bytes)?)),
        ImageFormat::Png => Ok(Box::new(PngScrubber::new(file_bytes)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jpeg_and_png_signatures() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F'];
        assert_eq!(detect_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        assert_eq!(detect_format(&PNG_SIGNATURE).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn short_input_is_unsupported() {
        assert!(matches!(detect_format(&[]), Err(StripError::UnsupportedFormat)));
        // A JPEG prefix alone is not enough.
        let short = [0xFF, 0xD8, 0xFF, 0xD9];
        assert!(matches!(detect_format(&short), Err(StripError::UnsupportedFormat)));
        assert!(matches!(
            detect_format(&PNG_SIGNATURE[..7]),
            Err(StripError::UnsupportedFormat)
        ));
    }

    #[test]
    fn unknown_signature_is_unsupported() {
        let gif = *b"GIF89a\x01\x00";
        let err = detect_format(&gif).unwrap_err();
        assert!(matches!(err, StripError::UnsupportedFormat));
        assert!(err.is_signature_error());
    }

    #[test]
    fn truncated_chunk_is_not_a_signature_error() {
        let err = StripError::TruncatedChunk {
            offset: 8,
            chunk_type: "IDAT".into(),
            declared: 100,
            available: 4,
        };
        assert!(!err.is_signature_error());
        assert!(err.to_string().contains("IDAT"));
    }

    #[test]
    fn savings_are_computed_from_sizes() {
        let result = StripResult {
            cleaned_file_bytes: vec![0; 75],
            format: ImageFormat::Png,
            original_size: 100,
            output_size: 75,
            metadata_removed: vec![],
        };
        assert_eq!(result.bytes_saved(), 25);
        assert!((result.percent_saved() - 25.0).abs() < f64::EPSILON);

        let empty = StripResult {
            cleaned_file_bytes: vec![],
            format: ImageFormat::Png,
            original_size: 0,
            output_size: 0,
            metadata_removed: vec![],
        };
        assert_eq!(empty.percent_saved(), 0.0);
    }

    #[test]
    fn scrubber_for_file_rejects_unknown_input() {
        assert!(scrubber_for_file(vec![0u8; 16]).is_err());
    }
}
