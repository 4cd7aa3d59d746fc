//! Physical-density embedding for encoded JPEG and PNG streams.
//!
//! Print and scan specifications check the resolution stored *inside* the
//! file, so after encoding we patch it directly in the byte stream:
//!
//! - **JPEG**: the JFIF APP0 segment (`FF E0`, length, `"JFIF\0"`) carries a
//!   unit byte and two big-endian `u16` densities. We set unit = 1 (dots per
//!   inch) and both densities to the requested DPI.
//! - **PNG**: the `pHYs` chunk carries two big-endian `u32` pixels-per-meter
//!   values and a unit byte (1 = meter). An existing chunk is rewritten in
//!   place with a fresh CRC; otherwise a new 21-byte chunk is spliced in
//!   directly after IHDR.
//!
//! Pixel data is never touched.
//!
//! ```text
//! JFIF APP0 (offsets from the FF of FF E0)
//!   0  FF E0        marker
//!   2  00 10        segment length
//!   4  4A 46 49 46 00  "JFIF\0"
//!   9  01 01        version
//!  11  01           unit (1 = dpi)
//!  12  01 2C        X density (300)
//!  14  01 2C        Y density (300)
//!
//! PNG
//!   0  89 50 4E 47 0D 0A 1A 0A      signature
//!   8  00 00 00 0D  "IHDR"  13 bytes data  CRC     (25 bytes)
//!  33  00 00 00 09  "pHYs"  X ppm  Y ppm  unit  CRC (21 bytes, when inserted)
//! ```

use super::params::OutputFormat;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DensityError {
    #[error("Malformed PNG: {0}")]
    MalformedImage(String),
}

const JFIF_SIGNATURE: &[u8] = b"JFIF\0";
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PHYS: &[u8; 4] = b"pHYs";
const IHDR: &[u8; 4] = b"IHDR";
const IDAT: &[u8; 4] = b"IDAT";

/// Offset of the first chunk after IHDR: signature (8) + IHDR chunk (25).
const AFTER_IHDR: usize = 33;
const PHYS_DATA_LEN: usize = 9;
const METERS_PER_INCH: f64 = 0.0254;

/// Unit byte values as stored in the file.
pub const UNIT_DOTS_PER_INCH: u8 = 1;
pub const UNIT_METER: u8 = 1;

// ---------------------------------------------------------------------------
// CRC32 (IEEE 802.3, reflected polynomial 0xEDB88320)
// ---------------------------------------------------------------------------

const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// CRC32 as used by PNG chunks and ZIP entries.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize];
    }
    crc ^ 0xFFFF_FFFF
}

/// Pixels per meter for a DPI value, as written into `pHYs`.
pub fn pixels_per_meter(dpi: u16) -> u32 {
    (dpi as f64 / METERS_PER_INCH).round() as u32
}

/// Density fields as read back from an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Density {
    /// Unit byte: for JPEG 1 = dots per inch, for PNG 1 = meter.
    pub unit: u8,
    pub x: u32,
    pub y: u32,
}

/// Write `dpi` into the density fields of an encoded image.
///
/// JPEG streams without a JFIF APP0 segment are returned unchanged; every
/// encoder we use emits one.
pub fn embed_density(
    bytes: Vec<u8>,
    format: OutputFormat,
    dpi: u16,
) -> Result<Vec<u8>, DensityError> {
    match format {
        OutputFormat::Jpeg => Ok(embed_jpeg_density(bytes, dpi)),
        OutputFormat::Png => embed_png_density(bytes, dpi),
    }
}

/// Read the density fields back out of an encoded image.
pub fn read_density(bytes: &[u8], format: OutputFormat) -> Option<Density> {
    match format {
        OutputFormat::Jpeg => {
            let pos = find_jfif_app0(bytes)?;
            Some(Density {
                unit: bytes[pos + 11],
                x: u16::from_be_bytes([bytes[pos + 12], bytes[pos + 13]]) as u32,
                y: u16::from_be_bytes([bytes[pos + 14], bytes[pos + 15]]) as u32,
            })
        }
        OutputFormat::Png => {
            let data = find_phys_chunk(bytes).ok()??.data;
            let d = &bytes[data..data + PHYS_DATA_LEN];
            Some(Density {
                x: u32::from_be_bytes([d[0], d[1], d[2], d[3]]),
                y: u32::from_be_bytes([d[4], d[5], d[6], d[7]]),
                unit: d[8],
            })
        }
    }
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

/// Locate the `FF E0` marker of the JFIF APP0 segment.
///
/// Requires room for the full density block (through offset 15).
fn find_jfif_app0(data: &[u8]) -> Option<usize> {
    if data.len() < 16 {
        return None;
    }
    (0..=data.len() - 16).find(|&i| {
        data[i] == 0xFF && data[i + 1] == 0xE0 && &data[i + 4..i + 9] == JFIF_SIGNATURE
    })
}

fn embed_jpeg_density(mut data: Vec<u8>, dpi: u16) -> Vec<u8> {
    let Some(pos) = find_jfif_app0(&data) else {
        return data;
    };
    let [hi, lo] = dpi.to_be_bytes();
    data[pos + 11] = UNIT_DOTS_PER_INCH;
    data[pos + 12] = hi;
    data[pos + 13] = lo;
    data[pos + 14] = hi;
    data[pos + 15] = lo;
    data
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

/// Byte offsets of a located `pHYs` chunk.
struct PhysChunk {
    /// Offset of the chunk type tag.
    tag: usize,
    /// Offset of the 9 data bytes.
    data: usize,
}

fn check_png_header(data: &[u8]) -> Result<(), DensityError> {
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(DensityError::MalformedImage("missing PNG signature".into()));
    }
    if data.len() < AFTER_IHDR
        || &data[12..16] != IHDR
        || u32::from_be_bytes([data[8], data[9], data[10], data[11]]) != 13
    {
        return Err(DensityError::MalformedImage(
            "first chunk is not a 13-byte IHDR".into(),
        ));
    }
    Ok(())
}

/// Walk the chunk list looking for `pHYs`. It must precede IDAT, so the walk
/// stops at the first image data chunk.
fn find_phys_chunk(data: &[u8]) -> Result<Option<PhysChunk>, DensityError> {
    check_png_header(data)?;

    let mut pos = PNG_SIGNATURE.len();
    while pos + 12 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let tag = &data[pos + 4..pos + 8];

        if tag == IDAT {
            break;
        }
        if tag == PHYS && length == PHYS_DATA_LEN && pos + 12 + length <= data.len() {
            return Ok(Some(PhysChunk {
                tag: pos + 4,
                data: pos + 8,
            }));
        }

        pos += 12 + length;
    }
    Ok(None)
}

fn phys_data(dpi: u16) -> [u8; PHYS_DATA_LEN] {
    let ppm = pixels_per_meter(dpi).to_be_bytes();
    let mut out = [0u8; PHYS_DATA_LEN];
    out[0..4].copy_from_slice(&ppm);
    out[4..8].copy_from_slice(&ppm);
    out[8] = UNIT_METER;
    out
}

/// Build a complete `pHYs` chunk: length, tag, data and CRC.
fn build_phys_chunk(dpi: u16) -> [u8; 21] {
    let mut chunk = [0u8; 21];
    chunk[0..4].copy_from_slice(&(PHYS_DATA_LEN as u32).to_be_bytes());
    chunk[4..8].copy_from_slice(PHYS);
    chunk[8..17].copy_from_slice(&phys_data(dpi));
    let crc = crc32(&chunk[4..17]);
    chunk[17..21].copy_from_slice(&crc.to_be_bytes());
    chunk
}

fn embed_png_density(mut data: Vec<u8>, dpi: u16) -> Result<Vec<u8>, DensityError> {
    match find_phys_chunk(&data)? {
        Some(PhysChunk { tag, data: start }) => {
            data[start..start + PHYS_DATA_LEN].copy_from_slice(&phys_data(dpi));
            let crc = crc32(&data[tag..start + PHYS_DATA_LEN]);
            let crc_at = start + PHYS_DATA_LEN;
            data[crc_at..crc_at + 4].copy_from_slice(&crc.to_be_bytes());
            Ok(data)
        }
        None => {
            let chunk = build_phys_chunk(dpi);
            data.splice(AFTER_IHDR..AFTER_IHDR, chunk);
            Ok(data)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A JPEG header with a JFIF APP0 segment (unit 0, density 1:1) followed
    /// by `padding` filler bytes and EOI.
    pub fn fake_jpeg(padding: usize) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        data.extend(std::iter::repeat_n(0u8, padding));
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(tag);
        out.extend_from_slice(body);
        let crc = crc32(&out[4..]);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    /// A structurally valid PNG: signature, IHDR, an IDAT of `padding`
    /// bytes, IEND. Optionally with a `pHYs` chunk before IDAT.
    pub fn fake_png(padding: usize, phys: Option<[u8; 9]>) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
        data.extend(chunk(IHDR, &ihdr));
        if let Some(body) = phys {
            data.extend(chunk(PHYS, &body));
        }
        data.extend(chunk(IDAT, &vec![0u8; padding]));
        data.extend(chunk(b"IEND", &[]));
        data
    }

    fn chunk_crc_is_valid(data: &[u8], tag_at: usize, len: usize) -> bool {
        let stored = u32::from_be_bytes([
            data[tag_at + 4 + len],
            data[tag_at + 5 + len],
            data[tag_at + 6 + len],
            data[tag_at + 7 + len],
        ]);
        stored == crc32(&data[tag_at..tag_at + 4 + len])
    }

    // =========================================================================
    // CRC32
    // =========================================================================

    #[test]
    fn crc32_reference_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty_is_zero() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn crc32_table_first_entries() {
        assert_eq!(CRC32_TABLE[0], 0);
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn crc32_of_iend_chunk() {
        // Every PNG ends with the same IEND CRC.
        assert_eq!(crc32(b"IEND"), 0xAE42_6082);
    }

    // =========================================================================
    // JPEG
    // =========================================================================

    #[test]
    fn jpeg_density_at_300_dpi() {
        let out = embed_density(fake_jpeg(64), OutputFormat::Jpeg, 300).unwrap();
        // APP0 starts at offset 2
        assert_eq!(out[2 + 11], 1);
        assert_eq!(&out[2 + 12..2 + 14], &[0x01, 0x2C]);
        assert_eq!(&out[2 + 14..2 + 16], &[0x01, 0x2C]);
    }

    #[test]
    fn jpeg_density_preserves_length_and_other_bytes() {
        let original = fake_jpeg(32);
        let out = embed_density(original.clone(), OutputFormat::Jpeg, 300).unwrap();
        assert_eq!(out.len(), original.len());
        assert_eq!(&out[..13], &original[..13]);
        assert_eq!(&out[18..], &original[18..]);
    }

    #[test]
    fn jpeg_without_jfif_is_unchanged() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x10];
        data.extend_from_slice(b"Exif\0\0");
        data.extend(std::iter::repeat_n(0u8, 20));
        let out = embed_density(data.clone(), OutputFormat::Jpeg, 300).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn jpeg_truncated_header_is_unchanged() {
        let data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F'];
        let out = embed_density(data.clone(), OutputFormat::Jpeg, 300).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn jpeg_read_density_roundtrip() {
        let out = embed_density(fake_jpeg(8), OutputFormat::Jpeg, 600).unwrap();
        let density = read_density(&out, OutputFormat::Jpeg).unwrap();
        assert_eq!(density, Density { unit: 1, x: 600, y: 600 });
    }

    // =========================================================================
    // PNG
    // =========================================================================

    #[test]
    fn ppm_for_300_dpi() {
        assert_eq!(pixels_per_meter(300), 11811);
        assert_eq!(pixels_per_meter(72), 2835);
    }

    #[test]
    fn png_inserts_phys_after_ihdr() {
        let original = fake_png(16, None);
        let out = embed_density(original.clone(), OutputFormat::Png, 300).unwrap();

        assert_eq!(out.len(), original.len() + 21);
        assert_eq!(&out[33..37], &[0, 0, 0, 9]);
        assert_eq!(&out[37..41], b"pHYs");
        assert_eq!(&out[41..45], &11811u32.to_be_bytes());
        assert_eq!(&out[45..49], &11811u32.to_be_bytes());
        assert_eq!(out[49], 1);
        assert!(chunk_crc_is_valid(&out, 37, 9));
        // Everything after the splice point is shifted, not altered
        assert_eq!(&out[54..], &original[33..]);
    }

    #[test]
    fn png_rewrites_existing_phys_with_fresh_crc() {
        let mut stale = [0u8; 9];
        stale[0..4].copy_from_slice(&2835u32.to_be_bytes());
        stale[4..8].copy_from_slice(&2835u32.to_be_bytes());
        stale[8] = 1;
        let original = fake_png(16, Some(stale));

        let out = embed_density(original.clone(), OutputFormat::Png, 300).unwrap();

        assert_eq!(out.len(), original.len());
        let density = read_density(&out, OutputFormat::Png).unwrap();
        assert_eq!(density, Density { unit: 1, x: 11811, y: 11811 });
        assert!(chunk_crc_is_valid(&out, 37, 9));
    }

    #[test]
    fn png_embed_twice_is_stable() {
        let once = embed_density(fake_png(4, None), OutputFormat::Png, 300).unwrap();
        let twice = embed_density(once.clone(), OutputFormat::Png, 300).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn png_without_signature_is_malformed() {
        let result = embed_density(vec![0u8; 40], OutputFormat::Png, 300);
        assert!(matches!(result, Err(DensityError::MalformedImage(_))));
    }

    #[test]
    fn png_truncated_ihdr_is_malformed() {
        let data = fake_png(0, None)[..20].to_vec();
        let result = embed_density(data, OutputFormat::Png, 300);
        assert!(matches!(result, Err(DensityError::MalformedImage(_))));
    }

    #[test]
    fn png_read_density_absent() {
        assert_eq!(read_density(&fake_png(4, None), OutputFormat::Png), None);
    }
}
