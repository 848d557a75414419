//! ISO base media (mp4 / QuickTime) box walker, used to read the movie
//! header's creation time ("Media Created").

use std::io::{self, Read, Seek, SeekFrom};

use chrono::{DateTime, TimeZone, Utc};

/// Seconds between 1904-01-01 (the QuickTime epoch) and 1970-01-01.
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Upper bound on boxes visited, so a corrupt file cannot spin forever.
const MAX_BOXES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoxHeader {
    kind: [u8; 4],
    /// Payload size in bytes, `None` when the box runs to end of file.
    payload: Option<u64>,
}

fn read_header<R: Read>(reader: &mut R) -> io::Result<Option<BoxHeader>> {
    let mut head = [0u8; 8];
    match reader.read_exact(&mut head) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
    let kind = [head[4], head[5], head[6], head[7]];
    let payload = match size {
        0 => None,
        1 => {
            let mut large = [0u8; 8];
            reader.read_exact(&mut large)?;
            Some(u64::from_be_bytes(large).saturating_sub(16))
        }
        n => Some(u64::from(n).saturating_sub(8)),
    };
    Ok(Some(BoxHeader { kind, payload }))
}

/// Position `reader` at the payload of the first box of `kind` among the
/// siblings that follow, bounded by `limit` bytes when known.
fn enter<R: Read + Seek>(
    reader: &mut R,
    kind: &[u8; 4],
    limit: Option<u64>,
) -> io::Result<Option<BoxHeader>> {
    // A parent claiming more than the address space simply has no end.
    let end = match limit {
        Some(limit) => Some(reader.stream_position()?.saturating_add(limit)),
        None => None,
    };
    for _ in 0..MAX_BOXES {
        if let Some(end) = end {
            if reader.stream_position()? >= end {
                return Ok(None);
            }
        }
        let Some(header) = read_header(reader)? else {
            return Ok(None);
        };
        if &header.kind == kind {
            return Ok(Some(header));
        }
        let Some(len) = header.payload else {
            return Ok(None);
        };
        // Seek offsets are signed; anything past i64::MAX is a corrupt size.
        let next = reader
            .stream_position()?
            .checked_add(len)
            .filter(|&next| i64::try_from(next).is_ok());
        let Some(next) = next else {
            tracing::debug!("{} box too large to skip", String::from_utf8_lossy(&header.kind));
            return Ok(None);
        };
        reader.seek(SeekFrom::Start(next))?;
    }
    tracing::debug!("gave up after {MAX_BOXES} boxes looking for {:?}", kind);
    Ok(None)
}

/// Read `moov/mvhd` creation time. A stored zero means "not recorded".
pub fn media_created<R: Read + Seek>(reader: &mut R) -> io::Result<Option<DateTime<Utc>>> {
    reader.seek(SeekFrom::Start(0))?;
    let Some(moov) = enter(reader, b"moov", None)? else {
        return Ok(None);
    };
    if enter(reader, b"mvhd", moov.payload)?.is_none() {
        return Ok(None);
    }

    let mut version_flags = [0u8; 4];
    reader.read_exact(&mut version_flags)?;
    let seconds = if version_flags[0] == 1 {
        let mut b = [0u8; 8];
        reader.read_exact(&mut b)?;
        u64::from_be_bytes(b)
    } else {
        let mut b = [0u8; 4];
        reader.read_exact(&mut b)?;
        u64::from(u32::from_be_bytes(b))
    };
    Ok(from_mac_seconds(seconds))
}

fn from_mac_seconds(seconds: u64) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        return None;
    }
    let unix = i64::try_from(seconds).ok()?.checked_sub(MAC_EPOCH_OFFSET)?;
    Utc.timestamp_opt(unix, 0).single()
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::fixtures::{boxed, movie};
    use super::*;

    #[test]
    fn reads_version_zero_creation_time_past_mdat() {
        let when = Utc.with_ymd_and_hms(2020, 8, 9, 10, 11, 12).unwrap();
        let file = movie(when.timestamp());
        assert_eq!(media_created(&mut Cursor::new(file)).unwrap(), Some(when));
    }

    #[test]
    fn reads_version_one_creation_time() {
        let when = Utc.with_ymd_and_hms(2031, 1, 2, 3, 4, 5).unwrap();
        let mut mvhd = vec![1, 0, 0, 0];
        mvhd.extend(((when.timestamp() + MAC_EPOCH_OFFSET) as u64).to_be_bytes());
        mvhd.extend([0u8; 100]);
        let file = boxed(b"moov", &boxed(b"mvhd", &mvhd));
        assert_eq!(media_created(&mut Cursor::new(file)).unwrap(), Some(when));
    }

    #[test]
    fn large_size_boxes_are_skipped() {
        let when = Utc.with_ymd_and_hms(2012, 12, 12, 12, 12, 12).unwrap();
        // 64-bit sized `free` box ahead of the movie.
        let mut file = 1u32.to_be_bytes().to_vec();
        file.extend(b"free");
        file.extend((16u64 + 4).to_be_bytes());
        file.extend([0u8; 4]);
        file.extend(movie(when.timestamp()));
        assert_eq!(media_created(&mut Cursor::new(file)).unwrap(), Some(when));
    }

    fn large_box(kind: &[u8; 4], size: u64) -> Vec<u8> {
        let mut out = 1u32.to_be_bytes().to_vec();
        out.extend(kind);
        out.extend(size.to_be_bytes());
        out
    }

    #[test]
    fn oversized_moov_is_treated_as_unbounded() {
        let when = Utc.with_ymd_and_hms(2019, 5, 6, 7, 8, 9).unwrap();
        let mut mvhd = vec![0, 0, 0, 0];
        mvhd.extend(((when.timestamp() + MAC_EPOCH_OFFSET) as u32).to_be_bytes());

        let mut file = boxed(b"ftyp", b"isomiso2");
        file.extend(large_box(b"moov", u64::MAX));
        file.extend(boxed(b"mvhd", &mvhd));
        assert_eq!(media_created(&mut Cursor::new(file)).unwrap(), Some(when));

        let mut empty = boxed(b"ftyp", b"isomiso2");
        empty.extend(large_box(b"moov", u64::MAX));
        assert_eq!(media_created(&mut Cursor::new(empty)).unwrap(), None);
    }

    #[test]
    fn unskippable_box_means_no_date() {
        let mut file = boxed(b"ftyp", b"isomiso2");
        file.extend(large_box(b"free", u64::MAX));
        file.extend(movie(1_000_000_000));
        assert_eq!(media_created(&mut Cursor::new(file)).unwrap(), None);
    }

    #[test]
    fn zero_creation_time_is_unknown() {
        let mut mvhd = vec![0u8; 4];
        mvhd.extend(0u32.to_be_bytes());
        let file = boxed(b"moov", &boxed(b"mvhd", &mvhd));
        assert_eq!(media_created(&mut Cursor::new(file)).unwrap(), None);
    }

    #[test]
    fn missing_moov_or_mvhd_is_unknown() {
        let no_moov = boxed(b"ftyp", b"mp42");
        assert_eq!(media_created(&mut Cursor::new(no_moov)).unwrap(), None);

        // `mvhd` sits after `moov` rather than inside it.
        let mut stray = boxed(b"moov", &boxed(b"trak", b""));
        stray.extend(boxed(b"mvhd", &[0u8; 12]));
        assert_eq!(media_created(&mut Cursor::new(stray)).unwrap(), None);
    }
}
