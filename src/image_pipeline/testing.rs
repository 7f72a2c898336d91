//! Synthetic RAW files for tests.
//!
//! Builds little-endian TIFF/EP-style files: IFD0 carries the CFA mosaic as
//! uncompressed strips plus make, model and orientation; IFD1, when asked
//! for, carries a preview (baseline JPEG or uncompressed RGB).

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

const SHORT: u16 = 3;
const LONG: u16 = 4;
const ASCII: u16 = 2;
const RATIONAL: u16 = 5;

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    data: Vec<u8>,
}

fn short(tag: u16, value: u16) -> Entry {
    Entry {
        tag,
        field_type: SHORT,
        count: 1,
        data: value.to_le_bytes().to_vec(),
    }
}

fn shorts(tag: u16, values: &[u16]) -> Entry {
    Entry {
        tag,
        field_type: SHORT,
        count: values.len() as u32,
        data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn longs(tag: u16, values: &[u32]) -> Entry {
    Entry {
        tag,
        field_type: LONG,
        count: values.len() as u32,
        data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn ascii(tag: u16, text: &str) -> Entry {
    let mut data = text.as_bytes().to_vec();
    data.push(0);
    Entry {
        tag,
        field_type: ASCII,
        count: data.len() as u32,
        data,
    }
}

fn rationals(tag: u16, values: &[f64]) -> Entry {
    Entry {
        tag,
        field_type: RATIONAL,
        count: values.len() as u32,
        data: values
            .iter()
            .flat_map(|v| {
                let n = (v * 10_000.0).round() as u32;
                n.to_le_bytes().into_iter().chain(10_000u32.to_le_bytes())
            })
            .collect(),
    }
}

fn ifd_size(entries: &[Entry]) -> usize {
    let overflow: usize = entries
        .iter()
        .filter(|e| e.data.len() > 4)
        .map(|e| e.data.len().next_multiple_of(2))
        .sum();
    2 + entries.len() * 12 + 4 + overflow
}

/// Serialise directories back to back starting at offset 8.
fn write_ifds(out: &mut Vec<u8>, ifds: &[Vec<Entry>]) {
    let mut offset = 8usize;
    for (index, entries) in ifds.iter().enumerate() {
        let size = ifd_size(entries);
        let mut overflow_at = offset + 2 + entries.len() * 12 + 4;
        let mut overflow = Vec::new();

        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in entries {
            out.extend_from_slice(&entry.tag.to_le_bytes());
            out.extend_from_slice(&entry.field_type.to_le_bytes());
            out.extend_from_slice(&entry.count.to_le_bytes());
            if entry.data.len() <= 4 {
                let mut inline = entry.data.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                out.extend_from_slice(&(overflow_at as u32).to_le_bytes());
                overflow.extend_from_slice(&entry.data);
                if entry.data.len() % 2 == 1 {
                    overflow.push(0);
                }
                overflow_at += entry.data.len().next_multiple_of(2);
            }
        }
        let next = if index + 1 < ifds.len() { offset + size } else { 0 };
        out.extend_from_slice(&(next as u32).to_le_bytes());
        out.extend_from_slice(&overflow);
        offset += size;
    }
}

/// Baseline JPEG of a horizontal gradient.
pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = rgb_gradient(width, height);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut out), 90)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .expect("encode test JPEG");
    out
}

pub(crate) fn rgb_gradient(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|_| (0..width).flat_map(move |x| {
            let v = (x * 255 / width.max(1)) as u8;
            [v, 128, 255 - v]
        }))
        .collect()
}

#[derive(Clone, Copy)]
enum Preview {
    Jpeg { width: u32, height: u32 },
    Rgb { width: u32, height: u32 },
}

/// Builder for a synthetic RAW file.
#[derive(Clone)]
pub(crate) struct RawFixture {
    make: String,
    model: String,
    width: u32,
    height: u32,
    declared: Option<(u32, u32)>,
    bits: u16,
    compression: u16,
    rows_per_strip: Option<u32>,
    orientation: u16,
    as_shot_neutral: Option<[f64; 3]>,
    samples: Option<Vec<u16>>,
    previews: Vec<Preview>,
}

impl RawFixture {
    pub fn new(make: &str, model: &str, width: u32, height: u32) -> Self {
        Self {
            make: make.to_string(),
            model: model.to_string(),
            width,
            height,
            declared: None,
            bits: 16,
            compression: 1,
            rows_per_strip: None,
            orientation: 1,
            as_shot_neutral: None,
            samples: None,
            previews: Vec::new(),
        }
    }

    /// Sony ILCE-7M3: RGGB, black 512, white 16383, no masked border.
    pub fn sony(width: u32, height: u32) -> Self {
        Self::new("SONY", "ILCE-7M3", width, height)
    }

    /// Canon EOS 5D Mark IV: 136 masked columns on the left, 42 rows on top.
    pub fn canon(width: u32, height: u32) -> Self {
        Self::new("Canon", "Canon EOS 5D Mark IV", width, height)
    }

    pub fn with_samples(mut self, samples: Vec<u16>) -> Self {
        assert_eq!(samples.len(), (self.width * self.height) as usize);
        self.samples = Some(samples);
        self
    }

    /// Fill an RGGB mosaic with one value per colour.
    pub fn with_rggb(self, [r, g, b]: [u16; 3]) -> Self {
        let (w, h) = (self.width as usize, self.height as usize);
        let samples = (0..w * h)
            .map(|i| match ((i / w) % 2, (i % w) % 2) {
                (0, 0) => r,
                (1, 1) => b,
                _ => g,
            })
            .collect();
        self.with_samples(samples)
    }

    pub fn with_bits(mut self, bits: u16) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn with_orientation(mut self, orientation: u16) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_as_shot_neutral(mut self, neutral: [f64; 3]) -> Self {
        self.as_shot_neutral = Some(neutral);
        self
    }

    /// Declare a size in the tags that differs from the stored samples.
    pub fn with_declared_size(mut self, width: u32, height: u32) -> Self {
        self.declared = Some((width, height));
        self
    }

    pub fn with_jpeg_preview(mut self, width: u32, height: u32) -> Self {
        self.previews.push(Preview::Jpeg { width, height });
        self
    }

    pub fn with_rgb_preview(mut self, width: u32, height: u32) -> Self {
        self.previews.push(Preview::Rgb { width, height });
        self
    }

    fn pixel_bytes(&self) -> Vec<u8> {
        let default;
        let samples = match &self.samples {
            Some(samples) => samples,
            None => {
                // Mid-grey-ish scene well above the Sony black level.
                default = self.clone().with_rggb([3500, 6500, 3000]).samples.unwrap_or_default();
                &default
            }
        };
        match self.bits {
            12 => samples
                .chunks_exact(2)
                .flat_map(|pair| {
                    let (a, b) = (pair[0] & 0x0FFF, pair[1] & 0x0FFF);
                    [(a >> 4) as u8, ((a & 0x0F) << 4 | b >> 8) as u8, (b & 0xFF) as u8]
                })
                .collect(),
            _ => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }

    fn directories(
        &self,
        strip_offsets: &[u32],
        strip_counts: &[u32],
        preview_offsets: &[u32],
        preview_blobs: &[Vec<u8>],
    ) -> Vec<Vec<Entry>> {
        let (width, height) = self.declared.unwrap_or((self.width, self.height));
        let rows_per_strip = self.rows_per_strip.unwrap_or(self.height);

        let mut ifd0 = vec![
            longs(254, &[0]),
            longs(256, &[width]),
            longs(257, &[height]),
            short(258, self.bits),
            short(259, self.compression),
            short(262, 32803),
            ascii(271, &self.make),
            ascii(272, &self.model),
            longs(273, strip_offsets),
            short(274, self.orientation),
            short(277, 1),
            longs(278, &[rows_per_strip]),
            longs(279, strip_counts),
        ];
        if let Some(neutral) = self.as_shot_neutral {
            ifd0.push(rationals(50728, &neutral));
        }

        let mut ifds = vec![ifd0];
        for ((preview, &offset), blob) in self.previews.iter().zip(preview_offsets).zip(preview_blobs) {
            ifds.push(match *preview {
                Preview::Jpeg { .. } => vec![
                    longs(254, &[1]),
                    short(259, 6),
                    longs(513, &[offset]),
                    longs(514, &[blob.len() as u32]),
                ],
                Preview::Rgb { width, height } => vec![
                    longs(254, &[1]),
                    longs(256, &[width]),
                    longs(257, &[height]),
                    shorts(258, &[8, 8, 8]),
                    short(259, 1),
                    short(262, 2),
                    longs(273, &[offset]),
                    short(277, 3),
                    longs(278, &[height]),
                    longs(279, &[blob.len() as u32]),
                ],
            });
        }
        ifds
    }

    pub fn build(&self) -> Vec<u8> {
        let pixels = self.pixel_bytes();
        let rows_per_strip = self.rows_per_strip.unwrap_or(self.height).max(1) as usize;
        let row_bytes = pixels.len() / self.height.max(1) as usize;
        let strips: Vec<&[u8]> = pixels.chunks(rows_per_strip * row_bytes.max(1)).collect();
        let counts: Vec<u32> = strips.iter().map(|s| s.len() as u32).collect();

        let blobs: Vec<Vec<u8>> = self
            .previews
            .iter()
            .map(|p| match *p {
                Preview::Jpeg { width, height } => jpeg_bytes(width, height),
                Preview::Rgb { width, height } => rgb_gradient(width, height),
            })
            .collect();

        // Sizes do not depend on offset values, so lay out once with zeros.
        let zeros = vec![0u32; strips.len()];
        let preview_zeros = vec![0u32; blobs.len()];
        let header_and_ifds = 8 + self
            .directories(&zeros, &counts, &preview_zeros, &blobs)
            .iter()
            .map(|ifd| ifd_size(ifd))
            .sum::<usize>();

        let mut at = header_and_ifds as u32;
        let strip_offsets: Vec<u32> = counts
            .iter()
            .map(|&c| {
                let offset = at;
                at += c;
                offset
            })
            .collect();
        let preview_offsets: Vec<u32> = blobs
            .iter()
            .map(|b| {
                let offset = at;
                at += b.len() as u32;
                offset
            })
            .collect();

        let mut out = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
        write_ifds(
            &mut out,
            &self.directories(&strip_offsets, &counts, &preview_offsets, &blobs),
        );
        debug_assert_eq!(out.len(), header_and_ifds);
        for strip in strips {
            out.extend_from_slice(strip);
        }
        for blob in &blobs {
            out.extend_from_slice(blob);
        }
        out
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).expect("write fixture");
        path
    }
}
