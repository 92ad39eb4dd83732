// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipplex-jobs — job/printer queue rules, format dispatch, the PWG raster
// pipeline, and the job-table read/mutate operations built on top of them.

pub mod dispatch;
pub mod driver;
pub mod ops;
pub mod queue;
pub mod raster;

pub use dispatch::{dispatch_format, run_raster_job, FilterTable, FormatDecision, RasterPage};
pub use driver::{Driver, JobOptions, PassthroughDriver};
pub use ops::{cancel_my_jobs, close_job, get_job_attributes, get_jobs, WhichJobs};
pub use queue::{admit, default_retention, finish_job, is_past_retention, start_job, trim_completed, Admission};
pub use raster::{ColorOrder, ColorSpace, DitherProfile, PageHeader};
