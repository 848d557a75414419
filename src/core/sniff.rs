//! Content sniffing: decide which metadata reader applies to a file.
//!
//! Signatures are checked first because they need no external database.
//! [`tree_magic_mini`] is only consulted when the header is not recognised,
//! since its results depend on the shared-mime-info files of the host.

use std::path::Path;

/// Number of header bytes needed by [`MediaKind::sniff`].
pub const SNIFF_LEN: usize = 16;

/// Container families we know how to pull an item date out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Jpeg,
    Tiff,
    Png,
    WebP,
    /// ISO base media file format (mp4, mov, m4v, 3gp, heic, ...).
    IsoBmff,
    Unknown,
}

impl MediaKind {
    /// Classify a file from its leading bytes.
    pub fn sniff(header: &[u8]) -> Self {
        match header {
            [0xFF, 0xD8, 0xFF, ..] => Self::Jpeg,
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Self::Tiff,
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Self::Png,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::WebP,
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Self::IsoBmff,
            // Some QuickTime files open with a bare `moov`/`wide`/`mdat` atom.
            [_, _, _, _, b'm', b'o', b'o', b'v', ..]
            | [_, _, _, _, b'w', b'i', b'd', b'e', ..]
            | [_, _, _, _, b'm', b'd', b'a', b't', ..] => Self::IsoBmff,
            _ => Self::Unknown,
        }
    }

    /// Fall back to the system MIME database for headers we did not recognise.
    pub fn from_mime(path: &Path) -> Self {
        let Some(mime) = tree_magic_mini::from_filepath(path) else {
            return Self::Unknown;
        };
        tracing::debug!("mime fallback: {} -> {mime}", path.display());
        match mime {
            "image/jpeg" => Self::Jpeg,
            "image/tiff" => Self::Tiff,
            "image/png" => Self::Png,
            "image/webp" => Self::WebP,
            m if m.starts_with("video/") => Self::IsoBmff,
            m if m == "image/heic" || m == "image/heif" || m == "image/avif" => Self::IsoBmff,
            _ => Self::Unknown,
        }
    }

    /// Whether the date for this kind is "Date Taken" (EXIF) rather than
    /// "Media Created" (movie header).
    pub fn is_still_image(self) -> bool {
        matches!(self, Self::Jpeg | Self::Tiff | Self::Png | Self::WebP)
    }
}
