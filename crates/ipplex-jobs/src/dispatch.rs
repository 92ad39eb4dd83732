// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// System-wide filter table and format dispatch: driver-format lookup, the
// pwg-raster fallback, raw pass-through, and the streaming raster pipeline
// that drives a Driver's rstartjob/rstartpage/rwriteline/rendpage/rendjob
// callbacks.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::{debug, warn};

use ipplex_core::{IpplexError, Job, Result};
use ipplex_device::Device;

use crate::driver::{Driver, JobOptions};
use crate::raster::{self, ColorSpace, PageHeader};

pub const PWG_RASTER: &str = "image/pwg-raster";

/// System-wide `(src_format → driver_format)` filter registry, guarded by
/// the same RW lock discipline as the printer/resource tables (§5): readers
/// for lookup, a writer only on registration.
#[derive(Default)]
pub struct FilterTable {
    supported: RwLock<HashMap<String, HashSet<String>>>,
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, src_format: &str, driver_format: &str) {
        self.supported
            .write()
            .unwrap()
            .entry(src_format.to_string())
            .or_default()
            .insert(driver_format.to_string());
    }

    pub fn supports(&self, src_format: &str, driver_format: &str) -> bool {
        self.supported
            .read()
            .unwrap()
            .get(src_format)
            .is_some_and(|dsts| dsts.contains(driver_format))
    }
}

/// The outcome of format dispatch (§4.E): which path a job's document takes
/// on its way to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatDecision {
    /// A registered filter converts `src_format` to `driver_format`.
    Filter { driver_format: String },
    /// No direct filter, but one exists (or is assumed) from `src_format` to
    /// `image/pwg-raster`, which the raster pipeline then consumes.
    PwgRasterFallback,
    /// `src_format == driver_format`: bytes are copied verbatim.
    RawPassthrough,
    /// No path exists; the job must be aborted with "unsupported format".
    Unsupported,
}

/// Resolve the format dispatch decision for one job, following the literal
/// lookup order: registered filter, then pwg-raster fallback, then raw
/// pass-through, then unsupported.
pub fn dispatch_format(filters: &FilterTable, src_format: &str, driver_format: &str) -> FormatDecision {
    if filters.supports(src_format, driver_format) {
        return FormatDecision::Filter {
            driver_format: driver_format.to_string(),
        };
    }
    if filters.supports(src_format, PWG_RASTER) || src_format == PWG_RASTER {
        return FormatDecision::PwgRasterFallback;
    }
    if src_format == driver_format {
        return FormatDecision::RawPassthrough;
    }
    FormatDecision::Unsupported
}

/// One page's already-decoded scanlines, 8 bits per pixel before dithering
/// (or 1 bit already, passed straight through if the driver wants depth 8
/// and the source is already in that depth — see `run_page`).
pub struct RasterPage {
    pub header: PageHeader,
    pub rows: Vec<Vec<u8>>,
}

/// Drive one document's raster stream through a driver, bracketing the
/// whole job with `rstartjob`/`rendjob` and each page with
/// `rstartpage`/`rendpage`. Checks `job.is_canceled()` at each page boundary
/// so a worker observes cancellation within one page, per the cancellation-
/// latency invariant.
pub fn run_raster_job(
    driver: &dyn Driver,
    dev: &mut dyn Device,
    job: &Job,
    opts: &JobOptions,
    pages: &[RasterPage],
) -> Result<()> {
    driver.rstartjob(dev, opts)?;
    for (page_index, page) in pages.iter().enumerate() {
        if job.is_canceled() {
            debug!(job_id = %job.job_id, page = page_index, "cancellation observed at page boundary");
            break;
        }
        page.header.validate()?;
        run_page(driver, dev, opts, page_index as u32, page)?;
    }
    driver.rendjob(dev, opts)?;
    Ok(())
}

fn run_page(
    driver: &dyn Driver,
    dev: &mut dyn Device,
    opts: &JobOptions,
    page_index: u32,
    page: &RasterPage,
) -> Result<()> {
    driver.rstartpage(dev, opts, page_index)?;

    let profile = raster::select_dither_profile(
        driver.output_bits_per_color() == 1 && page.header.cups_bits_per_color == 1,
        opts.is_draft_quality(),
        opts.is_photo_content(),
    );
    let needs_dither = driver.output_bits_per_color() == 1 && page.header.cups_bits_per_color == 8;
    let matrix = raster::dither_matrix(profile);

    let color_space = match page.header.color_space {
        ColorSpace::KSpace => ColorSpace::KSpace,
        ColorSpace::Gray => ColorSpace::Gray,
    };

    let output_bytes_per_line = if needs_dither {
        page.header.cups_bytes_per_line.div_ceil(8).max(
            (page.header.cups_width as u64).div_ceil(8) as u32,
        )
    } else {
        page.header.cups_bytes_per_line
    };

    for y in 0..page.header.cups_height {
        let line = match page.rows.get(y as usize) {
            Some(row) => row.as_slice(),
            // Missing trailing lines are padded identically to a present
            // line with no input pixels.
            None => &[],
        };
        let out_line = if needs_dither {
            raster::dither_row(
                y,
                line,
                page.header.cups_width,
                color_space,
                &matrix,
                output_bytes_per_line,
            )
        } else {
            raster::pad_line(line, page.header.cups_bytes_per_line, color_space)
        };
        driver.rwriteline(dev, opts, y, &out_line)?;
    }

    driver.rendpage(dev, opts, page_index)
}

/// Abort a job with the format-dispatch failure reason, matching the
/// driver-error abort semantics of §7.
pub fn unsupported_format_error(src_format: &str, driver_format: &str) -> IpplexError {
    warn!(src_format, driver_format, "no filter path available");
    IpplexError::UnsupportedFormat(format!(
        "no filter from {src_format} to {driver_format}, and pwg-raster/raw pass-through both unavailable"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipplex_core::{JobId, PrinterId};

    #[test]
    fn exact_filter_match_wins() {
        let filters = FilterTable::new();
        filters.register("application/pdf", "application/vnd.driver");
        assert_eq!(
            dispatch_format(&filters, "application/pdf", "application/vnd.driver"),
            FormatDecision::Filter {
                driver_format: "application/vnd.driver".to_string()
            }
        );
    }

    #[test]
    fn falls_back_to_pwg_raster_when_registered() {
        let filters = FilterTable::new();
        filters.register("application/pdf", PWG_RASTER);
        assert_eq!(
            dispatch_format(&filters, "application/pdf", "application/vnd.driver"),
            FormatDecision::PwgRasterFallback
        );
    }

    #[test]
    fn raw_source_is_its_own_pwg_raster_fallback() {
        let filters = FilterTable::new();
        assert_eq!(
            dispatch_format(&filters, PWG_RASTER, "application/vnd.driver"),
            FormatDecision::PwgRasterFallback
        );
    }

    #[test]
    fn identical_formats_pass_through_raw() {
        let filters = FilterTable::new();
        assert_eq!(
            dispatch_format(&filters, "application/octet-stream", "application/octet-stream"),
            FormatDecision::RawPassthrough
        );
    }

    #[test]
    fn no_path_is_unsupported() {
        let filters = FilterTable::new();
        assert_eq!(
            dispatch_format(&filters, "application/pdf", "application/vnd.driver"),
            FormatDecision::Unsupported
        );
    }

    struct RecordingDriver {
        depth: u8,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl Driver for RecordingDriver {
        fn consumes_raster(&self) -> bool {
            true
        }
        fn output_bits_per_color(&self) -> u8 {
            self.depth
        }
        fn rstartjob(&self, _dev: &mut dyn Device, _opts: &JobOptions) -> Result<()> {
            self.calls.lock().unwrap().push("rstartjob".into());
            Ok(())
        }
        fn rstartpage(&self, _dev: &mut dyn Device, _opts: &JobOptions, _page: u32) -> Result<()> {
            self.calls.lock().unwrap().push("rstartpage".into());
            Ok(())
        }
        fn rwriteline(&self, _dev: &mut dyn Device, _opts: &JobOptions, _y: u32, _line: &[u8]) -> Result<()> {
            self.calls.lock().unwrap().push("rwriteline".into());
            Ok(())
        }
        fn rendpage(&self, _dev: &mut dyn Device, _opts: &JobOptions, _page: u32) -> Result<()> {
            self.calls.lock().unwrap().push("rendpage".into());
            Ok(())
        }
        fn rendjob(&self, _dev: &mut dyn Device, _opts: &JobOptions) -> Result<()> {
            self.calls.lock().unwrap().push("rendjob".into());
            Ok(())
        }
    }

    struct NullDevice;
    impl Device for NullDevice {
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn status(&self) -> Result<ipplex_core::DeviceStatusReason> {
            Ok(ipplex_core::DeviceStatusReason::NONE)
        }
        fn device_id(&self) -> Result<Option<ipplex_core::DeviceId>> {
            Ok(None)
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn an_8x8_page() -> RasterPage {
        RasterPage {
            header: PageHeader {
                cups_width: 8,
                cups_height: 8,
                cups_bits_per_color: 8,
                cups_color_order: raster::ColorOrder::Chunked,
                cups_bytes_per_line: 8,
                color_space: ColorSpace::Gray,
            },
            rows: vec![vec![0x80u8; 8]; 8],
        }
    }

    #[test]
    fn raster_job_emits_one_writeline_per_row() {
        let driver = RecordingDriver {
            depth: 1,
            calls: std::sync::Mutex::new(Vec::new()),
        };
        let mut dev = NullDevice;
        let job = Job::new(JobId(1), PrinterId(1), "x".into(), "alice".into());
        let opts = JobOptions::default();
        let pages = vec![an_8x8_page()];
        run_raster_job(&driver, &mut dev, &job, &opts, &pages).unwrap();
        let calls = driver.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "rwriteline").count(), 8);
        assert_eq!(calls.first().unwrap(), "rstartjob");
        assert_eq!(calls.last().unwrap(), "rendjob");
    }

    #[test]
    fn canceled_job_stops_at_page_boundary() {
        let driver = RecordingDriver {
            depth: 8,
            calls: std::sync::Mutex::new(Vec::new()),
        };
        let mut dev = NullDevice;
        let job = Job::new(JobId(1), PrinterId(1), "x".into(), "alice".into());
        job.finish(ipplex_core::JobState::Canceled);
        let opts = JobOptions::default();
        let pages = vec![an_8x8_page(), an_8x8_page()];
        run_raster_job(&driver, &mut dev, &job, &opts, &pages).unwrap();
        let calls = driver.calls.lock().unwrap();
        assert!(!calls.contains(&"rstartpage".to_string()));
    }
}
