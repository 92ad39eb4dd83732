// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-printer driver capability and callback surface: a tagged trait object
// in place of the void-pointer callback/user-data pairs a C driver table
// would use.

use std::collections::HashMap;

use ipplex_device::Device;
use ipplex_core::Result;

/// Job options recomputed per page from the submitted IPP attributes.
/// Vendor extensions that don't map to a named field are kept in `vendor`.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub copies: u32,
    pub finishings: Vec<String>,
    pub media: Option<String>,
    pub orientation: Option<String>,
    pub output_bin: Option<String>,
    pub page_ranges: Vec<(u32, u32)>,
    pub color_mode: Option<String>,
    pub content_optimize: Option<String>,
    pub darkness: Option<i32>,
    pub print_quality: Option<String>,
    pub scaling: Option<String>,
    pub print_speed: Option<i32>,
    pub resolution: Option<String>,
    pub sides: Option<String>,
    pub vendor: HashMap<String, String>,
}

impl JobOptions {
    pub fn is_draft_quality(&self) -> bool {
        self.print_quality.as_deref() == Some("draft")
    }

    pub fn is_photo_content(&self) -> bool {
        matches!(self.content_optimize.as_deref(), Some("photo"))
    }
}

/// Capability and callback surface for a printer's driver: whether it
/// consumes raster at all, what depth it wants, and the bracketing
/// callbacks a raster page stream is driven through.
pub trait Driver: Send + Sync {
    /// Whether this driver accepts `image/pwg-raster` input (as opposed to
    /// a raw byte-stream driver that never sees the raster pipeline).
    fn consumes_raster(&self) -> bool;

    /// Output bit depth this driver wants per pixel: 1 (requires dithering
    /// from 8-bit source) or 8 (passes grayscale through unchanged).
    fn output_bits_per_color(&self) -> u8;

    fn rstartjob(&self, dev: &mut dyn Device, opts: &JobOptions) -> Result<()>;
    fn rstartpage(&self, dev: &mut dyn Device, opts: &JobOptions, page: u32) -> Result<()>;
    fn rwriteline(&self, dev: &mut dyn Device, opts: &JobOptions, y: u32, line: &[u8]) -> Result<()>;
    fn rendpage(&self, dev: &mut dyn Device, opts: &JobOptions, page: u32) -> Result<()>;
    fn rendjob(&self, dev: &mut dyn Device, opts: &JobOptions) -> Result<()>;

    /// Scan support, present only on multi-function drivers; absent drivers
    /// return `UnsupportedFormat`.
    fn scanfile(&self, _dev: &mut dyn Device) -> Result<Vec<u8>> {
        Err(ipplex_core::IpplexError::UnsupportedFormat(
            "driver does not support scan".to_string(),
        ))
    }

    /// Best-effort vendor identify signal (beep, blink, display message).
    fn identify(&self, _dev: &mut dyn Device, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// A driver whose callbacks write raw bytes straight through, used when no
/// format filter is needed beyond a raw pass-through (§4.E format dispatch's
/// fallback path): every callback is a no-op except `rwriteline`, which
/// writes the line unchanged.
pub struct PassthroughDriver;

impl Driver for PassthroughDriver {
    fn consumes_raster(&self) -> bool {
        false
    }

    fn output_bits_per_color(&self) -> u8 {
        8
    }

    fn rstartjob(&self, _dev: &mut dyn Device, _opts: &JobOptions) -> Result<()> {
        Ok(())
    }

    fn rstartpage(&self, _dev: &mut dyn Device, _opts: &JobOptions, _page: u32) -> Result<()> {
        Ok(())
    }

    fn rwriteline(&self, dev: &mut dyn Device, _opts: &JobOptions, _y: u32, line: &[u8]) -> Result<()> {
        dev.write(line)?;
        Ok(())
    }

    fn rendpage(&self, _dev: &mut dyn Device, _opts: &JobOptions, _page: u32) -> Result<()> {
        Ok(())
    }

    fn rendjob(&self, dev: &mut dyn Device, _opts: &JobOptions) -> Result<()> {
        dev.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_quality_detected() {
        let mut opts = JobOptions::default();
        opts.print_quality = Some("draft".to_string());
        assert!(opts.is_draft_quality());
    }

    #[test]
    fn photo_content_detected() {
        let mut opts = JobOptions::default();
        opts.content_optimize = Some("photo".to_string());
        assert!(opts.is_photo_content());
    }
}
