// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured logging setup: `tracing` + `tracing-subscriber` with an
// `EnvFilter`, a custom line format (`"<L> [ISO-8601Z] message\n"`), and
// size-based rotation to `<name>.O` once a log file crosses its threshold.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Writer that rotates `path` to `path.O` once it exceeds `max_bytes`.
pub struct RotatingWriter {
    path: PathBuf,
    max_bytes: u64,
    file: Mutex<File>,
}

impl RotatingWriter {
    pub fn open(path: impl AsRef<Path>, max_bytes: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            max_bytes,
            file: Mutex::new(file),
        })
    }

    fn rotate_if_needed(&self, file: &File) -> io::Result<()> {
        let len = file.metadata()?.len();
        if len < self.max_bytes {
            return Ok(());
        }
        let mut rotated = self.path.clone().into_os_string();
        rotated.push(".O");
        std::fs::rename(&self.path, PathBuf::from(rotated))?;
        Ok(())
    }
}

impl Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock().unwrap();
        self.rotate_if_needed(&file)?;
        if file.metadata()?.len() == 0 {
            // rotation just happened and truncated the handle's backing
            // file out from under it; reopen.
            *file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        }
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().unwrap().flush()
    }
}

impl<'a> tracing_subscriber::fmt::writer::MakeWriter<'a> for RotatingWriter {
    type Writer = &'a RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

/// Formats one log line as `"<L> [ISO-8601Z] message\n"`, where `<L>` is a
/// single level letter (T/D/I/W/E for trace/debug/info/warn/error).
pub struct SingleLetterFormat;

fn level_letter(level: &Level) -> char {
    match *level {
        Level::TRACE => 'T',
        Level::DEBUG => 'D',
        Level::INFO => 'I',
        Level::WARN => 'W',
        Level::ERROR => 'E',
    }
}

impl<S, N> FormatEvent<S, N> for SingleLetterFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        write!(writer, "{} [{}] ", level_letter(event.metadata().level()), now)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` (or `filter` when
/// set) controls verbosity; `log_path` is optional, in addition to stderr.
pub fn init(filter: Option<&str>, log_path: Option<&Path>) -> io::Result<()> {
    let env_filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .event_format(SingleLetterFormat)
        .with_env_filter(env_filter);

    match log_path {
        Some(path) => {
            let writer = RotatingWriter::open(path, 10 * 1024 * 1024)?;
            builder.with_writer(writer).init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rotates_once_threshold_exceeded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ipplex.log");
        let writer = RotatingWriter::open(&path, 16).unwrap();
        {
            let mut w: &RotatingWriter = &writer;
            w.write_all(b"0123456789abcdef").unwrap();
            w.flush().unwrap();
        }
        {
            let mut w: &RotatingWriter = &writer;
            w.write_all(b"more").unwrap();
            w.flush().unwrap();
        }
        assert!(dir.path().join("ipplex.log.O").exists());
    }

    #[test]
    fn level_letters_are_single_char() {
        assert_eq!(level_letter(&Level::INFO), 'I');
        assert_eq!(level_letter(&Level::ERROR), 'E');
    }
}
