//! Minimal EXIF reader: locate the TIFF stream inside a container and pull
//! out the capture timestamps.
//!
//! Only the handful of tags needed for "Date Taken" are decoded; everything
//! else in the IFDs is skipped without being interpreted.

use std::io::{self, Read, Seek, SeekFrom};

use chrono::{FixedOffset, Local, NaiveDateTime, TimeZone};

const TAG_DATE_TIME: u16 = 0x0132;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_DATE_TIME_DIGITIZED: u16 = 0x9004;
const TAG_OFFSET_TIME: u16 = 0x9010;
const TAG_OFFSET_TIME_ORIGINAL: u16 = 0x9011;
const TAG_OFFSET_TIME_DIGITIZED: u16 = 0x9012;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;

/// Header that prefixes the TIFF stream in JPEG APP1 segments and in some
/// decoders' `exif_metadata()` output.
const EXIF_PREAMBLE: &[u8] = b"Exif\0\0";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExifError {
    #[error("EXIF data truncated at offset {0}")]
    Truncated(usize),
    #[error("unrecognised TIFF byte order")]
    ByteOrder,
    #[error("bad TIFF magic number {0:#06x}")]
    Magic(u16),
}

/// An EXIF timestamp: wall-clock fields plus the UTC offset, when the camera
/// recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExifDateTime {
    pub naive: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl ExifDateTime {
    /// Wall-clock time in the local zone. Without a recorded offset the
    /// fields are already local and are returned untouched, even when they
    /// fall into a DST gap or overlap.
    pub fn local_wall_time(self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => offset
                .from_local_datetime(&self.naive)
                .single()
                .map_or(self.naive, |dt| dt.with_timezone(&Local).naive_local()),
            None => self.naive,
        }
    }
}

/// The three timestamps EXIF may carry, in preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifDates {
    pub original: Option<ExifDateTime>,
    pub digitized: Option<ExifDateTime>,
    pub modified: Option<ExifDateTime>,
}

impl ExifDates {
    /// Date Taken: the original capture time, falling back to digitised and
    /// then to the IFD0 modification stamp.
    pub fn date_taken(&self) -> Option<ExifDateTime> {
        self.original.or(self.digitized).or(self.modified)
    }
}

// ───────────────────────────────────────── TIFF walking ──────

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Offset of the 4-byte value/offset field within `data`.
    value_at: usize,
}

impl<'a> Tiff<'a> {
    fn bytes(&self, at: usize, len: usize) -> Result<&'a [u8], ExifError> {
        at.checked_add(len)
            .and_then(|end| self.data.get(at..end))
            .ok_or(ExifError::Truncated(at))
    }

    fn u16_at(&self, at: usize) -> Result<u16, ExifError> {
        let b: [u8; 2] = self.bytes(at, 2)?.try_into().map_err(|_| ExifError::Truncated(at))?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        })
    }

    fn u32_at(&self, at: usize) -> Result<u32, ExifError> {
        let b: [u8; 4] = self.bytes(at, 4)?.try_into().map_err(|_| ExifError::Truncated(at))?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        })
    }

    fn entries(&self, ifd_offset: usize) -> Result<Vec<IfdEntry>, ExifError> {
        let count = usize::from(self.u16_at(ifd_offset)?);
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let at = ifd_offset + 2 + i * 12;
            out.push(IfdEntry {
                tag: self.u16_at(at)?,
                kind: self.u16_at(at + 2)?,
                count: self.u32_at(at + 4)?,
                value_at: at + 8,
            });
        }
        Ok(out)
    }

    fn ascii(&self, entry: &IfdEntry) -> Result<Option<&'a str>, ExifError> {
        if entry.kind != TYPE_ASCII {
            return Ok(None);
        }
        let len = entry.count as usize;
        let at = if len <= 4 {
            entry.value_at
        } else {
            self.u32_at(entry.value_at)? as usize
        };
        let raw = self.bytes(at, len)?;
        let raw = raw.split(|&b| b == 0).next().unwrap_or_default();
        Ok(std::str::from_utf8(raw).ok().map(str::trim))
    }
}

/// Parse a TIFF stream (optionally prefixed by `Exif\0\0`) and extract its
/// timestamps.
pub fn parse_tiff(data: &[u8]) -> Result<ExifDates, ExifError> {
    let data = data.strip_prefix(EXIF_PREAMBLE).unwrap_or(data);
    let order = match data.get(..2) {
        Some(b"II") => ByteOrder::Little,
        Some(b"MM") => ByteOrder::Big,
        Some(_) => return Err(ExifError::ByteOrder),
        None => return Err(ExifError::Truncated(0)),
    };
    let tiff = Tiff { data, order };
    let magic = tiff.u16_at(2)?;
    if magic != 42 {
        return Err(ExifError::Magic(magic));
    }
    let ifd0 = tiff.u32_at(4)? as usize;

    let mut dates = ExifDates::default();
    let mut offset_time = None;
    let mut exif_ifd = None;
    for entry in tiff.entries(ifd0)? {
        match entry.tag {
            TAG_DATE_TIME => dates.modified = tiff.ascii(&entry)?.and_then(parse_naive),
            TAG_EXIF_IFD if entry.kind == TYPE_LONG => {
                exif_ifd = Some(tiff.u32_at(entry.value_at)? as usize);
            }
            _ => {}
        }
    }

    let mut offset_original = None;
    let mut offset_digitized = None;
    if let Some(exif_ifd) = exif_ifd {
        for entry in tiff.entries(exif_ifd)? {
            match entry.tag {
                TAG_DATE_TIME_ORIGINAL => {
                    dates.original = tiff.ascii(&entry)?.and_then(parse_naive);
                }
                TAG_DATE_TIME_DIGITIZED => {
                    dates.digitized = tiff.ascii(&entry)?.and_then(parse_naive);
                }
                TAG_OFFSET_TIME => offset_time = tiff.ascii(&entry)?.and_then(parse_offset),
                TAG_OFFSET_TIME_ORIGINAL => {
                    offset_original = tiff.ascii(&entry)?.and_then(parse_offset);
                }
                TAG_OFFSET_TIME_DIGITIZED => {
                    offset_digitized = tiff.ascii(&entry)?.and_then(parse_offset);
                }
                _ => {}
            }
        }
    }

    attach_offset(&mut dates.original, offset_original);
    attach_offset(&mut dates.digitized, offset_digitized);
    attach_offset(&mut dates.modified, offset_time);
    Ok(dates)
}

fn attach_offset(slot: &mut Option<ExifDateTime>, offset: Option<FixedOffset>) {
    if let Some(dt) = slot.as_mut() {
        dt.offset = offset;
    }
}

/// `YYYY:MM:DD HH:MM:SS`; blank or all-zero stamps mean "unknown".
fn parse_naive(s: &str) -> Option<ExifDateTime> {
    if s.is_empty() || s.starts_with("0000") {
        return None;
    }
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| ExifDateTime { naive, offset: None })
}

/// `+HH:MM` / `-HH:MM`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (h, m) = rest.split_once(':')?;
    let h: i32 = h.parse().ok()?;
    let m: i32 = m.parse().ok()?;
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

// ───────────────────────────────────────── JPEG segments ─────

const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

/// Scan JPEG marker segments up to the first scan and return the TIFF
/// stream of the first `Exif` APP1 segment.
///
/// The reader must be positioned at the start of the file. Segment payloads
/// other than APP1 are skipped with a seek rather than read.
pub fn find_jpeg_exif<R: Read + Seek>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut soi = [0u8; 2];
    reader.read_exact(&mut soi)?;
    if soi != [0xFF, 0xD8] {
        return Ok(None);
    }

    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        if byte[0] != 0xFF {
            // Not at a marker boundary; the stream is not a well-formed JPEG.
            return Ok(None);
        }
        // Markers may be preceded by any number of 0xFF fill bytes.
        let mut marker = 0xFF;
        while marker == 0xFF {
            reader.read_exact(&mut byte)?;
            marker = byte[0];
        }
        match marker {
            MARKER_SOS | MARKER_EOI => return Ok(None),
            0x01 | 0xD0..=0xD7 => continue,
            _ => {}
        }

        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        let payload_len = usize::from(u16::from_be_bytes(len)).saturating_sub(2);

        if marker == MARKER_APP1 {
            let mut payload = vec![0u8; payload_len];
            reader.read_exact(&mut payload)?;
            if let Some(tiff) = payload.strip_prefix(EXIF_PREAMBLE) {
                return Ok(Some(tiff.to_vec()));
            }
            // XMP also lives in APP1; keep looking.
        } else {
            reader.seek(SeekFrom::Current(payload_len as i64))?;
        }
    }
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::Utc;

    use super::fixtures::{jpeg_with_exif, tiff, Order};
    use super::*;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn reads_date_time_original_from_exif_ifd() {
        let data = tiff(
            Order::Little,
            &[(TAG_DATE_TIME, "2021:01:01 00:00:00")],
            &[(TAG_DATE_TIME_ORIGINAL, "2019:07:14 08:05:09")],
        );
        let dates = parse_tiff(&data).unwrap();
        let taken = dates.date_taken().unwrap();
        assert_eq!(taken.naive, naive("2019-07-14 08:05:09"));
        assert_eq!(taken.offset, None);
        assert_eq!(dates.modified.unwrap().naive, naive("2021-01-01 00:00:00"));
    }

    #[test]
    fn big_endian_streams_parse_identically() {
        let data = tiff(
            Order::Big,
            &[],
            &[(TAG_DATE_TIME_ORIGINAL, "2003:12:31 23:59:58")],
        );
        let taken = parse_tiff(&data).unwrap().date_taken().unwrap();
        assert_eq!(taken.naive, naive("2003-12-31 23:59:58"));
    }

    #[test]
    fn falls_back_through_digitized_then_ifd0() {
        let digitized = tiff(
            Order::Little,
            &[(TAG_DATE_TIME, "2020:02:02 02:02:02")],
            &[(TAG_DATE_TIME_DIGITIZED, "2018:03:04 05:06:07")],
        );
        let taken = parse_tiff(&digitized).unwrap().date_taken().unwrap();
        assert_eq!(taken.naive, naive("2018-03-04 05:06:07"));

        let ifd0_only = tiff(Order::Little, &[(TAG_DATE_TIME, "2020:02:02 02:02:02")], &[]);
        let taken = parse_tiff(&ifd0_only).unwrap().date_taken().unwrap();
        assert_eq!(taken.naive, naive("2020-02-02 02:02:02"));
    }

    #[test]
    fn zeroed_and_blank_stamps_are_unknown() {
        let data = tiff(
            Order::Little,
            &[(TAG_DATE_TIME, "    ")],
            &[(TAG_DATE_TIME_ORIGINAL, "0000:00:00 00:00:00")],
        );
        assert_eq!(parse_tiff(&data).unwrap().date_taken(), None);
    }

    #[test]
    fn offset_time_original_is_attached() {
        let data = tiff(
            Order::Little,
            &[],
            &[
                (TAG_DATE_TIME_ORIGINAL, "2022:06:01 12:00:00"),
                (TAG_OFFSET_TIME_ORIGINAL, "+09:00"),
            ],
        );
        let taken = parse_tiff(&data).unwrap().date_taken().unwrap();
        assert_eq!(taken.offset, FixedOffset::east_opt(9 * 3600));

        let expected = Utc.with_ymd_and_hms(2022, 6, 1, 3, 0, 0).unwrap();
        assert_eq!(taken.local_wall_time(), expected.with_timezone(&Local).naive_local());
    }

    #[test]
    fn stamps_without_offset_keep_their_wall_clock_fields() {
        // 02:30 on this day does not exist in most northern DST zones.
        let data = tiff(Order::Little, &[(TAG_DATE_TIME, "2021:03:14 02:30:00")], &[]);
        let taken = parse_tiff(&data).unwrap().date_taken().unwrap();
        assert_eq!(taken.local_wall_time(), naive("2021-03-14 02:30:00"));
    }

    #[test]
    fn negative_offsets_parse() {
        assert_eq!(parse_offset("-05:30"), FixedOffset::west_opt(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("05:30"), None);
        assert_eq!(parse_offset("+xx:00"), None);
    }

    #[test]
    fn rejects_garbage_headers() {
        assert_eq!(parse_tiff(b""), Err(ExifError::Truncated(0)));
        assert_eq!(parse_tiff(b"XX*\0\x08\0\0\0"), Err(ExifError::ByteOrder));
        assert_eq!(parse_tiff(b"II\x2b\0\x08\0\0\0"), Err(ExifError::Magic(0x2b)));
        assert!(matches!(parse_tiff(b"II*\0\xff\0\0\0"), Err(ExifError::Truncated(_))));
    }

    #[test]
    fn preamble_is_optional() {
        let data = tiff(Order::Little, &[], &[(TAG_DATE_TIME_ORIGINAL, "2010:10:10 10:10:10")]);
        let mut prefixed = EXIF_PREAMBLE.to_vec();
        prefixed.extend(&data);
        assert_eq!(parse_tiff(&prefixed).unwrap(), parse_tiff(&data).unwrap());
    }

    #[test]
    fn jpeg_scanner_finds_app1_after_app0() {
        let data = tiff(Order::Little, &[], &[(TAG_DATE_TIME_ORIGINAL, "2015:05:05 05:05:05")]);
        let jpeg = jpeg_with_exif(&data);
        let found = find_jpeg_exif(&mut Cursor::new(jpeg)).unwrap().unwrap();
        assert_eq!(found, data);
    }

    #[test]
    fn jpeg_without_exif_yields_none() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xDA, 0x00, 0x02];
        assert_eq!(find_jpeg_exif(&mut Cursor::new(jpeg)).unwrap(), None);
        assert_eq!(find_jpeg_exif(&mut Cursor::new(b"GIF89a".to_vec())).unwrap(), None);
    }
}
