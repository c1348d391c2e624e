//! Allow-lists of the JPEG markers and PNG chunk types needed to decode an image.
//!
//! Anything not listed here is metadata and gets dropped, including codes we
//! have never seen before.

/// SOF0-3, DHT, DQT, DRI, SOS and APP0 (JFIF).
pub const ESSENTIAL_JPEG_MARKERS: [u8; 9] = [
    0xC0, 0xC1, 0xC2, 0xC3, // SOF0..SOF3
    0xC4, // DHT
    0xDB, // DQT
    0xDD, // DRI
    0xDA, // SOS
    0xE0, // APP0
];

pub const ESSENTIAL_PNG_CHUNKS: [[u8; 4]; 9] = [
    *b"IHDR", *b"IDAT", *b"PLTE", *b"tRNS", *b"IEND", *b"pHYs", *b"gAMA", *b"cHRM", *b"sRGB",
];

pub fn is_essential_marker(marker: u8) -> bool {
    ESSENTIAL_JPEG_MARKERS.contains(&marker)
}

pub fn is_essential_chunk(chunk_type: &[u8; 4]) -> bool {
    ESSENTIAL_PNG_CHUNKS.contains(chunk_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app0_is_kept_but_other_app_markers_are_not() {
        assert!(is_essential_marker(0xE0));
        for app in 0xE1..=0xEF {
            assert!(!is_essential_marker(app), "APP{} kept", app - 0xE0);
        }
        assert!(!is_essential_marker(0xFE)); // COM
    }

    #[test]
    fn frame_and_table_markers_are_kept() {
        for marker in [0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xDB, 0xDD, 0xDA] {
            assert!(is_essential_marker(marker));
        }
        // Arithmetic and hierarchical SOFs are not on the list.
        assert!(!is_essential_marker(0xC5));
        assert!(!is_essential_marker(0xCC));
    }

    #[test]
    fn chunk_lookup_is_case_sensitive() {
        assert!(is_essential_chunk(b"IHDR"));
        assert!(is_essential_chunk(b"sRGB"));
        assert!(!is_essential_chunk(b"ihdr"));
        for dropped in [b"tEXt", b"zTXt", b"iTXt", b"tIME", b"eXIf", b"iCCP"] {
            assert!(!is_essential_chunk(dropped));
        }
    }
}
