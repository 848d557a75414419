//! Item date resolution: the moment a file's *contents* were created.
//!
//! For pictures this is Date Taken (EXIF), for videos Media Created (movie
//! header). Other files have no item date unless the caller opts into the
//! filesystem modification time as a fallback.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use image::{ImageDecoder, ImageReader};

use super::bmff;
use super::exif;
use super::sniff::{MediaKind, SNIFF_LEN};

/// Where an [`ItemDate`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    DateTaken,
    MediaCreated,
    FileModified,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DateTaken => "date taken",
            Self::MediaCreated => "media created",
            Self::FileModified => "file modified",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDate {
    /// Wall-clock time in the local zone. EXIF stamps without an offset are
    /// kept as recorded, so this may name a time the zone skips.
    pub when: NaiveDateTime,
    pub source: DateSource,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Use the filesystem modification time when the contents carry no date.
    pub fallback_to_modified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ItemDateError {
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("{} has no item date", path.display())]
    NoDate { path: PathBuf },
    #[error("{} has unreadable metadata: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

impl ItemDateError {
    /// Process exit code. A missing file is reported like a file without a
    /// date; any other I/O failure gets its own code.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Open { source, .. } if source.kind() == io::ErrorKind::NotFound => 3,
            Self::Open { .. } | Self::Read { .. } => 2,
            Self::NoDate { .. } | Self::Malformed { .. } => 3,
        }
    }
}

/// Resolve the item date of `path`.
pub fn resolve(path: &Path, options: &ResolveOptions) -> Result<ItemDate, ItemDateError> {
    let file = File::open(path).map_err(|source| ItemDateError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; SNIFF_LEN];
    let n = read_prefix(&mut reader, &mut header).map_err(|e| read_error(path, e))?;
    let mut kind = MediaKind::sniff(&header[..n]);
    if kind == MediaKind::Unknown {
        kind = MediaKind::from_mime(path);
    }
    tracing::debug!("{}: sniffed {kind:?}", path.display());

    let mut malformed = None;
    match content_date(&mut reader, path, kind) {
        Ok(Some(date)) => return Ok(date),
        Ok(None) => {}
        Err(err @ ItemDateError::Malformed { .. }) => {
            tracing::warn!("{err}");
            malformed = Some(err);
        }
        Err(err) => return Err(err),
    }

    if options.fallback_to_modified {
        let modified = reader
            .get_ref()
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| read_error(path, e))?;
        return Ok(ItemDate {
            when: DateTime::<Local>::from(modified).naive_local(),
            source: DateSource::FileModified,
        });
    }

    Err(malformed.unwrap_or_else(|| ItemDateError::NoDate {
        path: path.to_path_buf(),
    }))
}

fn content_date<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    kind: MediaKind,
) -> Result<Option<ItemDate>, ItemDateError> {
    reader.rewind().map_err(|e| read_error(path, e))?;

    if kind.is_still_image() {
        let Some(tiff) = exif_payload(reader, path, kind)? else {
            return Ok(None);
        };
        let dates = exif::parse_tiff(&tiff).map_err(|e| malformed(path, e))?;
        return Ok(dates
            .date_taken()
            .map(|dt| ItemDate {
                when: dt.local_wall_time(),
                source: DateSource::DateTaken,
            }));
    }

    if kind == MediaKind::IsoBmff {
        let created = bmff::media_created(reader).map_err(|e| io_or_malformed(path, e))?;
        return Ok(created.map(|utc| ItemDate {
            when: utc.with_timezone(&Local).naive_local(),
            source: DateSource::MediaCreated,
        }));
    }

    Ok(None)
}

/// The raw TIFF stream holding the image's EXIF block, if any.
fn exif_payload<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    kind: MediaKind,
) -> Result<Option<Vec<u8>>, ItemDateError> {
    match kind {
        MediaKind::Jpeg => exif::find_jpeg_exif(reader).map_err(|e| io_or_malformed(path, e)),
        MediaKind::Tiff => {
            let mut data = Vec::new();
            reader
                .read_to_end(&mut data)
                .map_err(|e| read_error(path, e))?;
            Ok(Some(data))
        }
        _ => {
            let mut decoder = ImageReader::new(BufReader::new(reader))
                .with_guessed_format()
                .map_err(|e| read_error(path, e))?
                .into_decoder()
                .map_err(|e| malformed(path, e))?;
            decoder.exif_metadata().map_err(|e| malformed(path, e))
        }
    }
}

/// Fill `buf` as far as the file allows; short files are not an error.
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_error(path: &Path, source: io::Error) -> ItemDateError {
    ItemDateError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn malformed(path: &Path, reason: impl fmt::Display) -> ItemDateError {
    ItemDateError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Truncated containers surface as `UnexpectedEof`; that is bad metadata,
/// not a failing disk.
fn io_or_malformed(path: &Path, e: io::Error) -> ItemDateError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        malformed(path, "unexpected end of file")
    } else {
        read_error(path, e)
    }
}
