// src/logging.rs

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
    sync::Mutex,
};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a `-v` count: 0 = info, 1 = debug, 2+ = trace.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "perf_tool=info",
        1 => "perf_tool=debug",
        _ => "perf_tool=trace",
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber. `RUST_LOG` overrides the verbosity flag.
///
/// Console output goes to stderr. When `log_file` is given every event is also appended
/// there without colors; failing to open it is reported and logging continues on stderr.
pub fn init_logging(verbose: u8, log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let console = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(io::stderr);

    let (file, file_error) = match log_file.map(|path| (path, open_log_file(path))) {
        Some((_, Ok(file))) => (Some(file), None),
        Some((path, Err(e))) => (None, Some(format!("{}: {}", path.display(), e))),
        None => (None, None),
    };
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!("Cannot open log file {}", e);
    }
}
