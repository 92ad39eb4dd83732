// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PWG Raster page streaming: header validation and the 16x16 ordered-dither
// step drivers that only accept 1-bit-per-pixel output apply to 8-bit input.

use ipplex_core::{IpplexError, Result};

/// Colour space a page header declares, per `cupsColorSpace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    /// 1-bit "K-space" (black ink only) — the dither step's output space.
    KSpace,
}

/// Chunked is the only `cupsColorOrder` this pipeline accepts; planar raster
/// is rejected at header validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Chunked,
}

/// Parsed PWG raster page header.
#[derive(Debug, Clone)]
pub struct PageHeader {
    pub cups_width: u32,
    pub cups_height: u32,
    pub cups_bits_per_color: u8,
    pub cups_color_order: ColorOrder,
    pub cups_bytes_per_line: u32,
    pub color_space: ColorSpace,
}

impl PageHeader {
    pub fn validate(&self) -> Result<()> {
        if self.cups_width == 0 || self.cups_height == 0 {
            return Err(IpplexError::InvalidArgument(
                "page header has zero width or height".to_string(),
            ));
        }
        if self.cups_bits_per_color != 1 && self.cups_bits_per_color != 8 {
            return Err(IpplexError::InvalidArgument(format!(
                "cupsBitsPerColor {} not in {{1, 8}}",
                self.cups_bits_per_color
            )));
        }
        let expected = (self.cups_width as u64 * self.cups_bits_per_color as u64).div_ceil(8) as u32;
        if self.cups_bytes_per_line != expected {
            return Err(IpplexError::InvalidArgument(format!(
                "cupsBytesPerLine {} != ceil(width*bpp/8) = {}",
                self.cups_bytes_per_line, expected
            )));
        }
        Ok(())
    }
}

/// Which threshold matrix a page uses, selected from the job's
/// `content-optimize`/`print-quality`/source-format attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherProfile {
    /// Bi-level source or draft quality: flat mid-threshold, no matrix.
    MidThreshold,
    /// Photo content, JPEG source, or high quality: the photo matrix.
    Photo,
    /// Everything else: the generic matrix.
    Generic,
}

/// Select the dither profile per the rule: bi-level/draft beats photo beats
/// generic, since a draft request should never pay for photo dithering.
pub fn select_dither_profile(is_bilevel: bool, is_draft_quality: bool, is_photo_content: bool) -> DitherProfile {
    if is_bilevel || is_draft_quality {
        DitherProfile::MidThreshold
    } else if is_photo_content {
        DitherProfile::Photo
    } else {
        DitherProfile::Generic
    }
}

/// 16x16 ordered-dither threshold matrices, one per `DitherProfile`. Values
/// are in 0..255 luminance space. `MidThreshold` is flat 127 everywhere per
/// the literal bi-level/draft rule; `Generic` is the classic 16x16 Bayer
/// matrix; `Photo` is a second, independent Bayer tiling (offset by a
/// quarter-phase) so photo content doesn't alias against the generic one.
pub fn dither_matrix(profile: DitherProfile) -> [[u8; 16]; 16] {
    match profile {
        DitherProfile::MidThreshold => [[127u8; 16]; 16],
        DitherProfile::Generic => bayer_16x16(0),
        DitherProfile::Photo => bayer_16x16(8),
    }
}

fn bayer_16x16(phase: u8) -> [[u8; 16]; 16] {
    let base4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];
    let mut out = [[0u8; 16]; 16];
    let mut by = 0usize;
    while by < 4 {
        let mut bx = 0usize;
        while bx < 4 {
            let mut y = 0usize;
            while y < 4 {
                let mut x = 0usize;
                while x < 4 {
                    let v = base4[y][x] as u16 * 16 + (by * 4 + bx) as u16;
                    let shifted = (v + phase as u16) % 256;
                    out[by * 4 + y][bx * 4 + x] = shifted as u8;
                    x += 1;
                }
                y += 1;
            }
            bx += 1;
        }
        by += 1;
    }
    out
}

/// Dither one 8-bit scanline into packed 1-bit output (MSB-first), applying
/// the literal threshold rule: for K-space input a pixel *exceeding* the
/// threshold becomes black (ink bit 1); for grayscale a pixel *at or below*
/// the threshold becomes black. `row` selects the matrix row (wrapping every
/// 16 lines); pixels beyond `input_width` up to the packed line's pixel
/// capacity are padded white (0 ink) for grayscale or black (1 ink) for
/// K-space, matching the non-K/K padding-colour rule.
pub fn dither_row(
    row: u32,
    input: &[u8],
    input_width: u32,
    color_space: ColorSpace,
    matrix: &[[u8; 16]; 16],
    bytes_per_line: u32,
) -> Vec<u8> {
    let output_pixels = bytes_per_line as usize * 8;
    let mut out = vec![0u8; bytes_per_line as usize];
    let matrix_row = &matrix[(row % 16) as usize];

    for x in 0..output_pixels {
        let ink = if x < input_width as usize && x < input.len() {
            let pixel = input[x];
            let threshold = matrix_row[x % 16];
            match color_space {
                ColorSpace::KSpace => pixel > threshold,
                ColorSpace::Gray => pixel <= threshold,
            }
        } else {
            // Padding: black for K-space, white (no ink) for grayscale.
            matches!(color_space, ColorSpace::KSpace)
        };
        if ink {
            let byte_index = x / 8;
            let bit_index = 7 - (x % 8);
            out[byte_index] |= 1 << bit_index;
        }
    }
    out
}

/// Pad (or pass through) a scanline that needs no dithering — the driver
/// already consumes the source depth. Bytes beyond `line`'s length up to
/// `bytes_per_line` are padding: 0xFF (non-K, white sample) for grayscale,
/// 0x00 (K, black sample) for K-space, matching the 8-bit sample convention
/// for missing pixels.
pub fn pad_line(line: &[u8], bytes_per_line: u32, color_space: ColorSpace) -> Vec<u8> {
    let pad_byte = match color_space {
        ColorSpace::KSpace => 0x00u8,
        ColorSpace::Gray => 0xFFu8,
    };
    let mut out = line.to_vec();
    out.resize(bytes_per_line as usize, pad_byte);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_rejects_zero_dimensions() {
        let h = PageHeader {
            cups_width: 0,
            cups_height: 100,
            cups_bits_per_color: 1,
            cups_color_order: ColorOrder::Chunked,
            cups_bytes_per_line: 1,
            color_space: ColorSpace::KSpace,
        };
        assert!(h.validate().is_err());
    }

    #[test]
    fn header_rejects_bad_depth() {
        let h = PageHeader {
            cups_width: 8,
            cups_height: 8,
            cups_bits_per_color: 4,
            cups_color_order: ColorOrder::Chunked,
            cups_bytes_per_line: 4,
            color_space: ColorSpace::Gray,
        };
        assert!(h.validate().is_err());
    }

    #[test]
    fn header_rejects_mismatched_bytes_per_line() {
        let h = PageHeader {
            cups_width: 8,
            cups_height: 8,
            cups_bits_per_color: 8,
            cups_color_order: ColorOrder::Chunked,
            cups_bytes_per_line: 100,
            color_space: ColorSpace::Gray,
        };
        assert!(h.validate().is_err());
    }

    #[test]
    fn header_accepts_correctly_sized_row() {
        let h = PageHeader {
            cups_width: 8,
            cups_height: 8,
            cups_bits_per_color: 8,
            cups_color_order: ColorOrder::Chunked,
            cups_bytes_per_line: 8,
            color_space: ColorSpace::Gray,
        };
        assert!(h.validate().is_ok());
    }

    #[test]
    fn dither_profile_rule_prefers_bilevel_over_photo() {
        assert_eq!(select_dither_profile(true, false, true), DitherProfile::MidThreshold);
        assert_eq!(select_dither_profile(false, true, true), DitherProfile::MidThreshold);
        assert_eq!(select_dither_profile(false, false, true), DitherProfile::Photo);
        assert_eq!(select_dither_profile(false, false, false), DitherProfile::Generic);
    }

    /// Invariant: for an all-127 grayscale input line at matrix position p,
    /// output bit b_p = 1 iff 127 <= dither[p], and symmetrically for K-space.
    #[test]
    fn dither_correctness_at_mid_gray() {
        let matrix = dither_matrix(DitherProfile::Generic);
        let input = vec![127u8; 16];
        let gray_row = dither_row(0, &input, 16, ColorSpace::Gray, &matrix, 2);
        let k_row = dither_row(0, &input, 16, ColorSpace::KSpace, &matrix, 2);
        for p in 0..16 {
            let byte = p / 8;
            let bit = 7 - (p % 8);
            let gray_bit = (gray_row[byte] >> bit) & 1 == 1;
            let k_bit = (k_row[byte] >> bit) & 1 == 1;
            let expected_gray = 127u8 <= matrix[0][p];
            assert_eq!(gray_bit, expected_gray, "gray mismatch at p={p}");
            // Symmetric: K-space inks when pixel > threshold, i.e. 127 > m[p].
            let expected_k = 127u8 > matrix[0][p];
            assert_eq!(k_bit, expected_k, "k-space mismatch at p={p}");
        }
    }

    #[test]
    fn white_row_produces_no_ink_in_grayscale() {
        let matrix = dither_matrix(DitherProfile::MidThreshold);
        let white = vec![255u8; 16];
        let row = dither_row(0, &white, 16, ColorSpace::Gray, &matrix, 2);
        assert_eq!(row, vec![0, 0]);
    }

    #[test]
    fn black_row_produces_full_ink_in_grayscale() {
        let matrix = dither_matrix(DitherProfile::MidThreshold);
        let black = vec![0u8; 16];
        let row = dither_row(0, &black, 16, ColorSpace::Gray, &matrix, 2);
        assert_eq!(row, vec![0xFF, 0xFF]);
    }

    #[test]
    fn padding_is_black_for_kspace_and_white_for_gray() {
        let matrix = dither_matrix(DitherProfile::MidThreshold);
        // Only 8 of 16 output pixels have input; the rest is padding.
        let input = vec![255u8; 8];
        let gray_row = dither_row(0, &input, 8, ColorSpace::Gray, &matrix, 2);
        let k_row = dither_row(0, &input, 8, ColorSpace::KSpace, &matrix, 2);
        // Second byte (pixels 8..16) is all padding.
        assert_eq!(gray_row[1], 0x00, "grayscale padding must carry no ink");
        assert_eq!(k_row[1], 0xFF, "k-space padding must be fully inked");
    }

    #[test]
    fn pad_line_extends_short_rows_with_colorspace_appropriate_padding() {
        let gray = pad_line(&[1, 2], 5, ColorSpace::Gray);
        assert_eq!(gray, vec![1, 2, 0xFF, 0xFF, 0xFF]);
        let k = pad_line(&[1, 2], 5, ColorSpace::KSpace);
        assert_eq!(k, vec![1, 2, 0, 0, 0]);
    }
}
