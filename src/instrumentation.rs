use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
use tracing_subscriber::{filter::LevelFilter, prelude::*};

/// Set up logging to stderr, warnings only unless `verbose` is set.
///
/// With `chrome_trace` enabled a trace for chrome://tracing or https://ui.perfetto.dev/ is
/// recorded as well. Make sure to store the returned guard in a variable in the scope to be
/// instrumented, otherwise the trace will be disabled immediately.
pub fn init(verbose: bool, chrome_trace: bool) -> Option<FlushGuard> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(level);

    let (chrome_layer, guard) = if chrome_trace {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().build();
        (Some(chrome_layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(log_layer)
        .with(chrome_layer)
        .init();

    guard
}
