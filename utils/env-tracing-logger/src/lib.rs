// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Logging setup shared by the ethoscope binaries.
//!
//! The filter comes from `RUST_LOG`. When it is unset, `default_level` is
//! used instead, so a headless unit started without any environment still
//! logs tracking start/stop and hardware events.
use time::{UtcOffset, format_description::well_known::Iso8601};
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not create log file {path}: {source}")]
    LogFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("local UTC offset out of range: {0}")]
    Offset(#[from] time::error::ComponentRange),
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Keeps the log file open until dropped.
pub struct Guard {
    _file: Option<std::sync::Arc<std::sync::Mutex<std::fs::File>>>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(file) = self._file.take() {
            if let Ok(f) = file.lock() {
                let _ = f.sync_all();
            }
        }
    }
}

struct SharedFile(std::sync::Arc<std::sync::Mutex<std::fs::File>>);

impl std::io::Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            Err(_) => Err(std::io::Error::other("log file lock poisoned")),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Err(std::io::Error::other("log file lock poisoned")),
        }
    }
}

/// Console logging at `info` unless `RUST_LOG` says otherwise.
///
/// Installing twice is not an error here; the first subscriber wins.
pub fn init() -> Guard {
    match initiate_logging::<&str>(None, false, LevelFilter::INFO) {
        Ok(guard) => guard,
        Err(_) => Guard { _file: None },
    }
}

/// Build the filter used by [initiate_logging].
pub fn env_filter(default_level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Start logging to file and console, both optional.
pub fn initiate_logging<P: AsRef<std::path::Path>>(
    path: Option<P>,
    disable_console: bool,
    default_level: LevelFilter,
) -> Result<Guard, Error> {
    // Fixed offset taken once, at startup.
    let timer = OffsetTime::new(
        UtcOffset::from_whole_seconds(chrono::Local::now().offset().local_minus_utc())?,
        Iso8601::DEFAULT,
    );

    let shared = match &path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| Error::LogFile {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
            Some(std::sync::Arc::new(std::sync::Mutex::new(file)))
        }
        None => None,
    };

    let file_layer = shared.as_ref().map(|file| {
        let file = file.clone();
        fmt::layer()
            .with_timer(timer.clone())
            .with_writer(move || SharedFile(file.clone()))
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = if disable_console {
        None
    } else {
        let with_ansi = !cfg!(windows);
        Some(
            fmt::layer()
                .with_timer(timer)
                .with_ansi(with_ansi)
                .with_target(false)
                .with_thread_names(true),
        )
    };

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(env_filter(default_level));
    tracing::subscriber::set_global_default(collector)?;

    let log_var = match std::env::var("RUST_LOG") {
        Ok(var) => format!(" with RUST_LOG=\"{var}\"."),
        Err(_) => format!(" at default level {default_level}."),
    };

    if let Some(path) = &path {
        tracing::debug!(
            "Logging initiated to file \"{}\"{log_var}",
            path.as_ref().display(),
        );
    }
    if !disable_console {
        tracing::debug!("Logging initiated to console{log_var}");
    }

    Ok(Guard { _file: shared })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_log_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("log.txt");
        let err = initiate_logging(Some(&path), true, LevelFilter::INFO)
            .err()
            .unwrap();
        assert!(matches!(err, Error::LogFile { .. }));
    }
}
