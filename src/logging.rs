use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::Level;
use tracing::{info, metadata::LevelFilter, trace};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;

fn do_init(stdout_level: Level, file_level: Option<(Level, PathBuf)>) {
    let stdout_layer =
        tracing_subscriber::fmt::layer().with_filter(LevelFilter::from(stdout_level));

    let registry = tracing_subscriber::registry().with(stdout_layer);

    let maybe_file_layer = if let Some((level, output_dir)) = file_level {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, output_dir, "sb.log");

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_filter(LevelFilter::from(level));
        Some(file_layer)
    } else {
        None
    };

    registry.with(maybe_file_layer).init();
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub async fn init(stdout_level: Level, file_logging: Option<(Level, PathBuf)>) {
    static TRACING_IS_INITIALIZED: RwLock<bool> = RwLock::const_new(false);

    let initialized = { *TRACING_IS_INITIALIZED.read().await };

    if !initialized {
        let mut initialized = TRACING_IS_INITIALIZED.write().await;

        // To avoid race condition between the `.read()` and the
        // `.write()`.
        if *initialized {
            return;
        }

        do_init(stdout_level, file_logging);

        *initialized = true;
    }

    info!("Logging initialized");
}

/// Flush anything not written yet.
pub fn shutdown() {
    trace!("Shutting down");
}
