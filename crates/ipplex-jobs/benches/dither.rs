// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the PWG raster dithering path: a page-width
// scanline pushed through the 16x16 threshold matrix, the hot loop for any
// driver that only accepts 1-bit output from 8-bit source raster.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ipplex_jobs::raster::{dither_matrix, dither_row, ColorSpace, DitherProfile};

/// Dither a single 2550-pixel scanline (the width of a 300 dpi US Letter
/// page) through the generic matrix, the expected common case for a
/// monochrome laser driver without native continuous-tone support.
fn bench_dither_letter_width_scanline(c: &mut Criterion) {
    let width = 2550usize;
    let line: Vec<u8> = (0..width).map(|x| (x % 256) as u8).collect();
    let bytes_per_line = (width as u32).div_ceil(8);
    let matrix = dither_matrix(DitherProfile::Generic);

    c.bench_function("dither_row (2550px, generic matrix)", |b| {
        b.iter(|| {
            let out = dither_row(
                black_box(0),
                black_box(&line),
                black_box(width as u32),
                ColorSpace::Gray,
                &matrix,
                bytes_per_line,
            );
            black_box(out);
        });
    });
}

/// Same scanline through the photo matrix, which a quality=high or
/// content-optimize=photo job selects instead of the generic one.
fn bench_dither_letter_width_scanline_photo(c: &mut Criterion) {
    let width = 2550usize;
    let line: Vec<u8> = (0..width).map(|x| (x % 256) as u8).collect();
    let bytes_per_line = (width as u32).div_ceil(8);
    let matrix = dither_matrix(DitherProfile::Photo);

    c.bench_function("dither_row (2550px, photo matrix)", |b| {
        b.iter(|| {
            let out = dither_row(
                black_box(0),
                black_box(&line),
                black_box(width as u32),
                ColorSpace::Gray,
                &matrix,
                bytes_per_line,
            );
            black_box(out);
        });
    });
}

criterion_group!(
    benches,
    bench_dither_letter_width_scanline,
    bench_dither_letter_width_scanline_photo
);
criterion_main!(benches);
