use std::sync::OnceLock;

use tracing::{debug, error};
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;
use crate::utils::TERMINAL_STDERR;

struct LockingTerminalStderr;
impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LockingTerminalStderr {
    type Writer = LockingTerminalStderr;

    fn make_writer(&'a self) -> Self::Writer {
        LockingTerminalStderr
    }
}

impl std::io::Write for LockingTerminalStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut guard) = TERMINAL_STDERR.lock() {
            guard.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Ok(mut guard) = TERMINAL_STDERR.lock() {
            guard.flush()?
        }
        Ok(())
    }
}

static LOGGER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

/// Filter directives for a verbosity level.
pub(crate) fn log_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,hsa_admin=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,hsa_admin=warn",
        // Show our own info logs and library errors
        Verbosity::Verbose(1) => "off,hsa_admin=info,hsa_sdk=error,hsa_api=error",
        // Also show debug from our libraries
        Verbosity::Verbose(2) => "off,hsa_admin=debug,hsa_sdk=debug,hsa_api=debug",
        // Also show trace from our libraries
        Verbosity::Verbose(3) => "off,hsa_admin=trace,hsa_sdk=trace,hsa_api=trace",
        // Also show debug from the http stack
        Verbosity::Verbose(4) => "debug,hsa_admin=trace,hsa_sdk=trace,hsa_api=trace",
        Verbosity::Verbose(_) => "trace",
    }
}

/// Install the global subscriber on first use, then update its filter.
///
/// `RUST_LOG`, if set, takes precedence over the verbosity.
pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (subscriber, reload_handle) = create_registry_and_filter_reload_handle();
        subscriber.init();
        reload_handle
    });

    update_filters(filter_handle, log_filter(verbosity));
}

pub fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
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

pub fn create_registry_and_filter_reload_handle() -> (
    impl tracing_subscriber::layer::SubscriberExt + SubscriberInitExt,
    Handle<EnvFilter, Registry>,
) {
    debug!("Initializing logger");
    // Start permissive; the real filter is applied right after by `update_filters`.
    let filter = EnvFilter::new("trace");
    let (filter, filter_reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(LockingTerminalStderr)
        .with_target(false)
        .without_time();
    let registry = tracing_subscriber::registry().with(filter).with(log_layer);

    (registry, filter_reload_handle)
}
