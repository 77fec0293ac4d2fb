//! Logging setup
//!
//! All log output goes to stderr, so stdout stays reserved for answers
//! (`ask --json` prints one JSON update per line). Host events carry
//! `peer`, `session_id` and `round` fields; the JSON layers flatten them to
//! top-level keys. When `RUST_LOG` is set it replaces the computed filter.

use std::fs;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Keeps the non-blocking file writer alive; logs are flushed on drop
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let level = effective_level(&settings.level, verbose, quiet);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_spec(level))
            .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?,
    };

    let (file_layer, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (layer, guard) = file_layer(
                Path::new(path),
                rotation_for(settings.max_file_size_mb),
                settings.max_files,
                settings.json_format,
            )?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(settings.json_format))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(level = %level, file = ?settings.file, json = settings.json_format, "Logging initialized");

    Ok(LogGuards {
        _file_guard: file_guard,
    })
}

/// Minimal stderr logging for commands that never start the agent
pub fn init_simple(level: Level) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// `-q` wins over everything, then `-v`/`-vv`, then the configured level
fn effective_level(configured: &str, verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => configured.parse().unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// This crate logs at `level`; dependencies never go below `warn`
fn filter_spec(level: Level) -> String {
    let deps = if level == Level::ERROR { "error" } else { "warn" };
    format!("{},rally_host={}", deps, level.to_string().to_lowercase())
}

/// Small files rotate hourly, everything else daily
fn rotation_for(max_file_size_mb: u64) -> Rotation {
    if max_file_size_mb > 0 && max_file_size_mb < 10 {
        Rotation::HOURLY
    } else {
        Rotation::DAILY
    }
}

fn console_layer<S>(json: bool) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        Box::new(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_writer(std::io::stderr),
        )
    } else {
        Box::new(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
    }
}

/// Rolling file layer. `logs/host.log` becomes `logs/host.<date>.log`.
fn file_layer<S>(
    path: &Path,
    rotation: Rotation,
    max_files: u32,
    json: bool,
) -> Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(|e| Error::IoWrite {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let (prefix, suffix) = file_name_parts(path);
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .max_log_files(max_files.max(1) as usize)
        .build(directory)
        .map_err(|e| Error::Config(format!("Failed to create log file appender: {}", e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer: BoxedLayer<S> = if json {
        Box::new(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        Box::new(
            fmt::layer()
                .with_writer(writer)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_ansi(false),
        )
    };

    Ok((layer, guard))
}

fn file_name_parts(path: &Path) -> (String, String) {
    let prefix = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("host");
    let suffix = path.extension().and_then(|ext| ext.to_str()).unwrap_or("log");
    (prefix.to_string(), suffix.to_string())
}
