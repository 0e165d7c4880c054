//! Structured cloud logging example
//!
//! Emits every `tracing` event as one JSON line in the cloud logging payload shape,
//! with the request's Cloud Trace id resolved inside handlers.
//!
//! Try: `curl -H 'X-Cloud-Trace-Context: 105445aa7843bc8bf206b12000100000/1;o=1' localhost:3000`

use axum::{routing::get, Router};
use cloud_trace_log::{CloudTrace, CloudTraceLayer, StructuredJson, TraceId};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().event_format(StructuredJson))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app = Router::new()
        .route("/", get(handler))
        .layer(CloudTraceLayer::new());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Starting server on 0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}

async fn handler(CloudTrace(trace_id): CloudTrace) -> String {
    let trace = TraceId::render(trace_id.as_ref());
    tracing::info!(trace, "Handling request in handler");
    format!("Hello! Your trace ID is: {trace}")
}
