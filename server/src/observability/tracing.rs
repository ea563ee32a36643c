//! tracing-subscriber initialization.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::{SubscriberInitExt as _, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "kmsgrab=debug,kg_server=debug"
    } else {
        "kmsgrab=info,kg_server=info"
    }
}

/// Install the global subscriber: human-readable lines, or one JSON object
/// per event when `json` is set.
pub fn init(verbose: bool, json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbose),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
}
