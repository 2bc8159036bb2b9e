use once_cell::sync::OnceCell;
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

static LOGGER_HANDLE: OnceCell<Handle<EnvFilter, Registry>> = OnceCell::new();

/// Install the global subscriber, or update its filter if it is installed
/// already.
///
/// `$RUST_LOG` takes precedence over `verbosity`.
pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(EnvFilter::new("off"));
        let log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter);
        tracing_subscriber::registry().with(log_layer).init();
        reload_handle
    });

    update_filters(filter_handle, log_filter(verbosity));
}

fn log_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,animedex=error,animedex_core=error,animedex_catalog=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,animedex=warn,animedex_core=warn,animedex_catalog=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,animedex=info,animedex_core=info,animedex_catalog=info",
        // Also show debug from our libraries
        Verbosity::Verbose(2) => "off,animedex=debug,animedex_core=debug,animedex_catalog=debug",
        // Also show trace from our libraries
        Verbosity::Verbose(3) => "off,animedex=trace,animedex_core=trace,animedex_catalog=trace",
        // Include the HTTP stack
        Verbosity::Verbose(4) => "debug,animedex=trace,animedex_core=trace,animedex_catalog=trace",
        Verbosity::Verbose(_) => "trace",
    }
}

fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("Updating logger filter failed: {}", err);
            },
        };
    });
    if let Err(err) = result {
        error!("Updating logger filter failed: {}", err);
    }
}
