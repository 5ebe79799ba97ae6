//! Tracing subscriber setup.
//!
//! Everything goes to stdout. When `log_file` is configured the same events
//! are appended to that file as well, without ANSI colours.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str =
    "hooktail_api=info,hooktail_pipeline=info,hooktail_core=info,tower_http=info";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// Fails if `log_file` cannot be opened for appending or if a subscriber is
/// already installed.
pub fn init(format: LogFormat, log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut layers: Vec<BoxedLayer> = vec![format_layer(format, fmt::layer())];

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        layers.push(format_layer(
            format,
            fmt::layer().with_writer(Mutex::new(file)).with_ansi(false),
        ));
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}

type PlainLayer<W> = fmt::Layer<Registry, fmt::format::DefaultFields, fmt::format::Format, W>;

fn format_layer<W>(format: LogFormat, layer: PlainLayer<W>) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
