//! Logging setup

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "order_service=info,tower_http=info";

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides `default_filter`. JSON output is meant for
/// production log shipping.
pub fn init_logger(default_filter: &str, json_format: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false);

    if json_format {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).init();
    }
}
