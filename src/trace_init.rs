//! Opt-in structured tracing. Without the `trace` feature every span and event
//! compiles away and [`init_tracing`] does nothing.

#[cfg(feature = "trace")]
use std::path::Path;
#[cfg(feature = "trace")]
use std::sync::Once;

#[cfg(feature = "trace")]
const TRACE_FILE: &str = "tapword-trace.jsonl";
/// Filter used when `RUST_LOG` is unset or invalid.
#[cfg(feature = "trace")]
const DEFAULT_FILTER: &str = "tapword_engine=debug,tapword_core=debug";

#[cfg(feature = "trace")]
static INIT: Once = Once::new();

/// Send JSON trace lines to `log_dir/tapword-trace.jsonl`. Only the first
/// call installs the subscriber.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    INIT.call_once(|| {
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, TRACE_FILE));
        std::mem::forget(guard); // keyboard service is a long-lived process

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::fmt()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(filter)
            .init();
    });
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &std::path::Path) {}
