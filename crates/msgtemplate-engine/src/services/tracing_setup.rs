//! Tracing subscriber setup
//!
//! Shared between the command-line front end and tests. The library itself
//! only emits events; installing a subscriber is left to the binary.

use anyhow::Context;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber
///
/// With a log file, everything from DEBUG up is written there. Without one,
/// only warnings go to stderr so stdout stays clean for results.
/// `RUST_LOG` directives are honoured in both cases.
pub fn init_global(log_file_path: Option<&Path>) -> anyhow::Result<()> {
    match log_file_path {
        Some(path) => {
            let log_file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            build_subscriber(Arc::new(log_file), tracing::Level::DEBUG).try_init()?;
        }
        None => build_subscriber(std::io::stderr, tracing::Level::WARN).try_init()?,
    }
    Ok(())
}

/// Build a subscriber writing formatted events to `writer`
pub fn build_subscriber<W>(
    writer: W,
    default_level: tracing::Level,
) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::from_default_env().add_directive(default_level.into());
    let fmt_layer = fmt::layer().with_writer(writer).with_ansi(false);

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_subscriber_writes_to_file() {
        let log_file = NamedTempFile::new().unwrap();
        let writer = Arc::new(log_file.reopen().unwrap());
        let subscriber = build_subscriber(writer, tracing::Level::DEBUG);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("classified {} regions", 3);
        });

        let contents = std::fs::read_to_string(log_file.path()).unwrap();
        assert!(contents.contains("DEBUG"));
        assert!(contents.contains("classified 3 regions"));
    }

    #[test]
    fn test_default_level_filters_lower_levels() {
        let log_file = NamedTempFile::new().unwrap();
        let writer = Arc::new(log_file.reopen().unwrap());
        let subscriber = build_subscriber(writer, tracing::Level::WARN);

        tracing::subscriber::with_default(subscriber, || {
            tracing::trace!("too detailed");
            tracing::warn!("grammar unavailable");
        });

        let contents = std::fs::read_to_string(log_file.path()).unwrap();
        assert!(contents.contains("grammar unavailable"));
        assert!(!contents.contains("too detailed"));
    }
}
