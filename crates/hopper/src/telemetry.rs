//! Process-wide tracing setup for hosts that embed the registry.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{HopperError, Result};

const DEFAULT_LOG_FILTER: &str = "hopper=info";

static INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global subscriber and bridges `log` records into it.
///
/// `RUST_LOG` overrides the default `hopper=info` filter. Returns `Ok(false)`
/// if logging was already initialized by an earlier call.
pub fn init_tracing(format: LogFormat) -> Result<bool> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| HopperError::Logging(e.to_string()))
        .and_then(|()| {
            tracing_log::LogTracer::init().map_err(|e| HopperError::Logging(e.to_string()))
        });

    if let Err(e) = installed {
        INSTALLED.store(false, Ordering::SeqCst);
        return Err(e);
    }
    Ok(true)
}
