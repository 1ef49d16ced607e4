use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::Level;

/// Build the tracing layer for request/response logging.
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Span settings that keep request headers (and so bearer tokens) out of logs.
pub fn make_span() -> DefaultMakeSpan {
    DefaultMakeSpan::new().level(Level::INFO).include_headers(false)
}
