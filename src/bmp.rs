//! A minimal, dependency-free BMP encoder for the renderer's primary output.
//! Image-writing crates are out of scope for this crate (see Non-goals), so
//! `color.bmp` is hand-rolled: an uncompressed 24-bit-per-pixel BITMAPINFOHEADER
//! file, written bottom-up per the format's convention.

use std::io::Write;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::color::ColorRgb;

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;

/// Writes `pixels` (row-major, top-to-bottom, already tonemapped into
/// `[0, 1]`) as a 24bpp BMP to `path`.
pub fn write_bmp(path: &Path, width: u32, height: u32, pixels: &[ColorRgb]) -> Result<()> {
    ensure!(
        pixels.len() == (width * height) as usize,
        "pixel buffer does not match width*height"
    );

    let row_size = (width * 3 + 3) / 4 * 4;
    let pixel_data_size = row_size * height;
    let file_size = FILE_HEADER_SIZE + INFO_HEADER_SIZE + pixel_data_size;

    let mut buffer = Vec::with_capacity(file_size as usize);

    // BITMAPFILEHEADER
    buffer.extend_from_slice(b"BM");
    buffer.extend_from_slice(&file_size.to_le_bytes());
    buffer.extend_from_slice(&0u16.to_le_bytes());
    buffer.extend_from_slice(&0u16.to_le_bytes());
    buffer.extend_from_slice(&(FILE_HEADER_SIZE + INFO_HEADER_SIZE).to_le_bytes());

    // BITMAPINFOHEADER
    buffer.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
    buffer.extend_from_slice(&(width as i32).to_le_bytes());
    buffer.extend_from_slice(&(height as i32).to_le_bytes());
    buffer.extend_from_slice(&1u16.to_le_bytes()); // planes
    buffer.extend_from_slice(&24u16.to_le_bytes()); // bits per pixel
    buffer.extend_from_slice(&0u32.to_le_bytes()); // no compression
    buffer.extend_from_slice(&pixel_data_size.to_le_bytes());
    buffer.extend_from_slice(&2835i32.to_le_bytes()); // ~72 DPI
    buffer.extend_from_slice(&2835i32.to_le_bytes());
    buffer.extend_from_slice(&0u32.to_le_bytes()); // palette colors
    buffer.extend_from_slice(&0u32.to_le_bytes()); // important colors

    // Pixel data: BMP rows are stored bottom-to-top, BGR byte order, padded
    // to a 4-byte boundary.
    let padding = vec![0u8; (row_size - width * 3) as usize];
    for y in (0..height).rev() {
        for x in 0..width {
            let pixel = pixels[(y * width + x) as usize].clamp();
            let [r, g, b] = pixel.into_srgb8();
            buffer.push(b);
            buffer.push(g);
            buffer.push(r);
        }
        buffer.extend_from_slice(&padding);
    }

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    file.write_all(&buffer)
        .with_context(|| format!("writing output file {}", path.display()))?;
    Ok(())
}

/// EXR output is out of scope: no EXR/image crate is part of this crate's
/// dependency stack. Kept as an explicit stub rather than silently doing
/// nothing, so a caller that asks for `.exr` output gets a clear error
/// instead of a missing file.
pub fn write_exr(_path: &Path, _width: u32, _height: u32, _pixels: &[ColorRgb]) -> Result<()> {
    anyhow::bail!("EXR output is not supported by this build; use --format bmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_well_formed_bmp_header() {
        let dir = std::env::temp_dir();
        let path = dir.join("pathtracer_bmp_test.bmp");
        let pixels = vec![ColorRgb::WHITE; 4];
        write_bmp(&path, 2, 2, &pixels).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..2], b"BM");
        let declared_size = u32::from_le_bytes(bytes[2..6].try_into().unwrap());
        assert_eq!(declared_size as usize, bytes.len());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_mismatched_pixel_buffer_size() {
        let dir = std::env::temp_dir();
        let path = dir.join("pathtracer_bmp_mismatch_test.bmp");
        let pixels = vec![ColorRgb::WHITE; 3];
        assert!(write_bmp(&path, 2, 2, &pixels).is_err());
    }

    #[test]
    fn exr_stub_always_errors() {
        let dir = std::env::temp_dir();
        let path = dir.join("pathtracer_exr_test.exr");
        assert!(write_exr(&path, 1, 1, &[ColorRgb::BLACK]).is_err());
    }
}
