//! TIFF-style directory walker shared by the strip reader and the thumbnail
//! extractor.
//!
//! Most RAW formats (DNG, NEF, ARW, CR2, PEF, ORF, RW2) are TIFF containers:
//! a byte-order header followed by a chain of image file directories (IFDs),
//! some of which point at further SubIFDs. The walker collects every
//! reachable directory once and hands out typed tag values with bounds checks.

use std::collections::HashSet;

use tracing::warn;

use crate::image_pipeline::common::error::{ConversionError, Result};

pub mod tags {
    pub const NEW_SUBFILE_TYPE: u16 = 0x00FE;
    pub const IMAGE_WIDTH: u16 = 0x0100;
    pub const IMAGE_LENGTH: u16 = 0x0101;
    pub const BITS_PER_SAMPLE: u16 = 0x0102;
    pub const COMPRESSION: u16 = 0x0103;
    pub const PHOTOMETRIC: u16 = 0x0106;
    pub const MAKE: u16 = 0x010F;
    pub const MODEL: u16 = 0x0110;
    pub const STRIP_OFFSETS: u16 = 0x0111;
    pub const ORIENTATION: u16 = 0x0112;
    pub const SAMPLES_PER_PIXEL: u16 = 0x0115;
    pub const ROWS_PER_STRIP: u16 = 0x0116;
    pub const STRIP_BYTE_COUNTS: u16 = 0x0117;
    pub const SUB_IFDS: u16 = 0x014A;
    pub const JPEG_OFFSET: u16 = 0x0201;
    pub const JPEG_LENGTH: u16 = 0x0202;
    pub const AS_SHOT_NEUTRAL: u16 = 0xC628;
}

pub const COMPRESSION_NONE: u32 = 1;
pub const COMPRESSION_JPEG_OLD: u32 = 6;
pub const COMPRESSION_JPEG: u32 = 7;

pub const PHOTOMETRIC_RGB: u32 = 2;
pub const PHOTOMETRIC_CFA: u32 = 32803;

const MAX_ENTRIES: u16 = 1000;
const MAX_DIRECTORIES: usize = 64;
const MAX_SUBIFD_DEPTH: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Byte order of a TIFF-family header, if `data` starts with one.
///
/// Besides plain TIFF (42) this accepts the Olympus (`RO`, `RS`) and
/// Panasonic (`U`) magic numbers, whose directory layout is otherwise standard.
pub fn detect_byte_order(data: &[u8]) -> Option<ByteOrder> {
    if data.len() < 8 {
        return None;
    }
    let order = match &data[0..2] {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return None,
    };
    match order.u16([data[2], data[3]]) {
        42 | 0x4F52 | 0x5352 | 0x0055 => Some(order),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    value: [u8; 4],
}

/// One parsed directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    pub offset: u32,
    pub entries: Vec<IfdEntry>,
}

impl Ifd {
    pub fn entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// Parsed TIFF-family container borrowing the file bytes.
#[derive(Debug)]
pub struct TiffContainer<'a> {
    data: &'a [u8],
    order: ByteOrder,
    ifds: Vec<Ifd>,
}

impl<'a> TiffContainer<'a> {
    /// Walk IFD0, its `next` chain and SubIFDs up to two levels deep.
    ///
    /// IFD0 must be readable; later directories that point outside the file
    /// are skipped with a warning, as vendors occasionally leave stale links.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let order = detect_byte_order(data).ok_or_else(|| {
            ConversionError::UnsupportedFormat("not a TIFF-based RAW container".to_string())
        })?;
        let first = order.u32([data[4], data[5], data[6], data[7]]);

        let mut container = Self {
            data,
            order,
            ifds: Vec::new(),
        };

        let mut visited = HashSet::new();
        let mut pending = vec![(first, 0u8)];
        let mut is_first = true;

        while let Some((offset, depth)) = pending.pop() {
            if offset == 0 || !visited.insert(offset) {
                continue;
            }
            if container.ifds.len() >= MAX_DIRECTORIES {
                warn!("Directory limit reached, ignoring remaining IFDs");
                break;
            }

            let (ifd, next) = match container.parse_ifd(offset) {
                Ok(parsed) => parsed,
                Err(e) if !is_first => {
                    warn!(offset, error = %e, "Skipping unreadable IFD");
                    continue;
                }
                Err(e) => return Err(e),
            };
            is_first = false;

            if depth < MAX_SUBIFD_DEPTH {
                if let Ok(Some(children)) = container.u32s(&ifd, tags::SUB_IFDS) {
                    pending.extend(children.into_iter().rev().map(|o| (o, depth + 1)));
                }
            }
            // Pushed last so the chain is walked after this directory's children.
            if next != 0 {
                pending.insert(0, (next, depth));
            }
            container.ifds.push(ifd);
        }

        Ok(container)
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ConversionError::CorruptFile(format!(
                    "{} bytes at offset {} lie outside the {} byte file",
                    len,
                    offset,
                    self.data.len()
                ))
            })?;
        Ok(&self.data[offset..end])
    }

    fn read_u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(self.order.u16([b[0], b[1]]))
    }

    fn read_u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(self.order.u32([b[0], b[1], b[2], b[3]]))
    }

    fn parse_ifd(&self, offset: u32) -> Result<(Ifd, u32)> {
        let base = offset as usize;
        let entry_count = self.read_u16_at(base)?;
        if entry_count > MAX_ENTRIES {
            return Err(ConversionError::CorruptFile(format!(
                "IFD at {} claims {} entries",
                offset, entry_count
            )));
        }

        let table = self.slice(base + 2, entry_count as usize * 12)?;
        let entries = table
            .chunks_exact(12)
            .map(|raw| IfdEntry {
                tag: self.order.u16([raw[0], raw[1]]),
                field_type: self.order.u16([raw[2], raw[3]]),
                count: self.order.u32([raw[4], raw[5], raw[6], raw[7]]),
                value: [raw[8], raw[9], raw[10], raw[11]],
            })
            .collect();

        let next = self
            .read_u32_at(base + 2 + entry_count as usize * 12)
            .unwrap_or(0);

        Ok((Ifd { offset, entries }, next))
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Every directory reached, IFD0 first.
    pub fn ifds(&self) -> &[Ifd] {
        &self.ifds
    }

    pub fn ifd0(&self) -> Option<&Ifd> {
        self.ifds.first()
    }

    /// SHORT or LONG values widened to `u32`.
    pub fn u32s(&self, ifd: &Ifd, tag: u16) -> Result<Option<Vec<u32>>> {
        let Some(entry) = ifd.entry(tag) else {
            return Ok(None);
        };
        let values = match entry.field_type {
            3 => self.decode_values(entry, 2, |order, b| order.u16([b[0], b[1]]) as u32)?,
            4 | 13 => self.decode_values(entry, 4, |order, b| {
                order.u32([b[0], b[1], b[2], b[3]])
            })?,
            1 | 7 => self.decode_values(entry, 1, |_, b| b[0] as u32)?,
            _ => None,
        };
        Ok(values)
    }

    pub fn u32_value(&self, ifd: &Ifd, tag: u16) -> Result<Option<u32>> {
        Ok(self.u32s(ifd, tag)?.and_then(|v| v.first().copied()))
    }

    /// ASCII value with trailing NULs and whitespace removed.
    pub fn ascii(&self, ifd: &Ifd, tag: u16) -> Result<Option<String>> {
        let Some(entry) = ifd.entry(tag) else {
            return Ok(None);
        };
        if entry.field_type != 2 {
            return Ok(None);
        }
        let bytes = self.decode_values(entry, 1, |_, b| b[0])?.unwrap_or_default();
        let text = String::from_utf8_lossy(&bytes);
        Ok(Some(
            text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string(),
        ))
    }

    /// RATIONAL or SRATIONAL values as `f64`; zero denominators yield `None`.
    pub fn rationals(&self, ifd: &Ifd, tag: u16) -> Result<Option<Vec<f64>>> {
        let Some(entry) = ifd.entry(tag) else {
            return Ok(None);
        };
        let signed = match entry.field_type {
            5 => false,
            10 => true,
            _ => return Ok(None),
        };
        let pairs = self.decode_values(entry, 8, |order, b| {
            let n = order.u32([b[0], b[1], b[2], b[3]]);
            let d = order.u32([b[4], b[5], b[6], b[7]]);
            if signed {
                (n as i32 as f64, d as i32 as f64)
            } else {
                (n as f64, d as f64)
            }
        })?;
        Ok(pairs.and_then(|pairs| {
            pairs
                .into_iter()
                .map(|(n, d)| (d != 0.0).then(|| n / d))
                .collect()
        }))
    }

    fn decode_values<T>(
        &self,
        entry: &IfdEntry,
        size: usize,
        decode: impl Fn(ByteOrder, &[u8]) -> T,
    ) -> Result<Option<Vec<T>>> {
        let len = size.checked_mul(entry.count as usize).ok_or_else(|| {
            ConversionError::CorruptFile(format!("tag {:#06x} count overflows", entry.tag))
        })?;
        let bytes: &[u8] = if len <= 4 {
            &entry.value[..len]
        } else {
            self.slice(self.order.u32(entry.value) as usize, len)?
        };
        Ok(Some(
            bytes
                .chunks_exact(size)
                .map(|chunk| decode(self.order, chunk))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian TIFF with the given directories laid out back to back.
    /// Each directory is a list of (tag, type, count, value-or-offset).
    fn build_le(dirs: &[Vec<(u16, u16, u32, u32)>], trailer: &[u8]) -> Vec<u8> {
        let mut out = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        let mut offset = 8u32;
        for (i, entries) in dirs.iter().enumerate() {
            let size = 2 + entries.len() as u32 * 12 + 4;
            out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for (tag, ty, count, value) in entries {
                out.extend_from_slice(&tag.to_le_bytes());
                out.extend_from_slice(&ty.to_le_bytes());
                out.extend_from_slice(&count.to_le_bytes());
                out.extend_from_slice(&value.to_le_bytes());
            }
            let next = if i + 1 < dirs.len() { offset + size } else { 0 };
            out.extend_from_slice(&next.to_le_bytes());
            offset += size;
        }
        out.extend_from_slice(trailer);
        out
    }

    #[test]
    fn test_detect_byte_order() {
        assert_eq!(detect_byte_order(b"II*\0\x08\0\0\0"), Some(ByteOrder::Little));
        assert_eq!(detect_byte_order(b"MM\0*\0\0\0\x08"), Some(ByteOrder::Big));
        assert_eq!(detect_byte_order(b"IIRO\x08\0\0\0"), Some(ByteOrder::Little));
        assert_eq!(detect_byte_order(b"IIU\0\x08\0\0\0"), Some(ByteOrder::Little));
        assert_eq!(detect_byte_order(b"\xFF\xD8\xFF\xE0\0\0\0\0"), None);
        assert_eq!(detect_byte_order(b"II*"), None);
    }

    #[test]
    fn test_parse_chain_and_values() {
        let data = build_le(
            &[
                vec![(tags::IMAGE_WIDTH, 3, 1, 640), (tags::ORIENTATION, 3, 1, 6)],
                vec![(tags::IMAGE_WIDTH, 4, 1, 160)],
            ],
            &[],
        );
        let container = TiffContainer::parse(&data).unwrap();
        assert_eq!(container.ifds().len(), 2);

        let ifd0 = container.ifd0().unwrap();
        assert_eq!(container.u32_value(ifd0, tags::IMAGE_WIDTH).unwrap(), Some(640));
        assert_eq!(container.u32_value(ifd0, tags::ORIENTATION).unwrap(), Some(6));
        assert_eq!(container.u32_value(ifd0, tags::MAKE).unwrap(), None);
        assert_eq!(
            container.u32_value(&container.ifds()[1], tags::IMAGE_WIDTH).unwrap(),
            Some(160)
        );
    }

    #[test]
    fn test_ascii_and_rationals_out_of_line() {
        // Directory: 2 + 2*12 + 4 = 30 bytes, so values start at 38.
        let mut trailer = b"SONY\0\0\0\0".to_vec();
        for (n, d) in [(1u32, 2u32), (1, 1), (2, 3)] {
            trailer.extend_from_slice(&n.to_le_bytes());
            trailer.extend_from_slice(&d.to_le_bytes());
        }
        let data = build_le(
            &[vec![(tags::MAKE, 2, 8, 38), (tags::AS_SHOT_NEUTRAL, 5, 3, 46)]],
            &trailer,
        );
        let container = TiffContainer::parse(&data).unwrap();
        let ifd0 = container.ifd0().unwrap();
        assert_eq!(
            container.ascii(ifd0, tags::MAKE).unwrap(),
            Some("SONY".to_string())
        );
        let neutral = container
            .rationals(ifd0, tags::AS_SHOT_NEUTRAL)
            .unwrap()
            .unwrap();
        assert!((neutral[0] - 0.5).abs() < 1e-9);
        assert!((neutral[2] - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_value_past_eof_is_corrupt() {
        let data = build_le(&[vec![(tags::MAKE, 2, 64, 10_000)]], &[]);
        let container = TiffContainer::parse(&data).unwrap();
        let ifd0 = container.ifd0().unwrap();
        assert!(matches!(
            container.ascii(ifd0, tags::MAKE),
            Err(ConversionError::CorruptFile(_))
        ));
    }

    #[test]
    fn test_too_many_entries_is_corrupt() {
        let mut data = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        data.extend_from_slice(&1001u16.to_le_bytes());
        data.resize(64, 0);
        assert!(matches!(
            TiffContainer::parse(&data),
            Err(ConversionError::CorruptFile(_))
        ));
    }

    #[test]
    fn test_ifd0_past_eof_is_corrupt() {
        let data = vec![b'I', b'I', 42, 0, 0, 0, 1, 0];
        assert!(matches!(
            TiffContainer::parse(&data),
            Err(ConversionError::CorruptFile(_))
        ));
    }

    #[test]
    fn test_broken_next_link_is_skipped() {
        let mut data = build_le(&[vec![(tags::IMAGE_WIDTH, 3, 1, 8)]], &[]);
        // Point the next-IFD link of IFD0 far outside the file.
        let link = 8 + 2 + 12;
        data[link..link + 4].copy_from_slice(&0x00FF_0000u32.to_le_bytes());
        let container = TiffContainer::parse(&data).unwrap();
        assert_eq!(container.ifds().len(), 1);
    }

    #[test]
    fn test_self_referencing_chain_terminates() {
        let mut data = build_le(&[vec![(tags::IMAGE_WIDTH, 3, 1, 8)]], &[]);
        let link = 8 + 2 + 12;
        data[link..link + 4].copy_from_slice(&8u32.to_le_bytes());
        let container = TiffContainer::parse(&data).unwrap();
        assert_eq!(container.ifds().len(), 1);
    }

    #[test]
    fn test_not_tiff_is_unsupported() {
        assert!(matches!(
            TiffContainer::parse(b"\xFF\xD8\xFF\xE0 some jpeg"),
            Err(ConversionError::UnsupportedFormat(_))
        ));
    }
}
