//! 云日志追踪适配模块
//!
//! 从当前Web请求中解析 Cloud Trace 追踪ID，并将日志记录格式化为
//! 日志后端结构化摄取所需的 JSON 载荷。
//! 核心功能与Web框架无关，并为Axum提供了开箱即用的中间件支持。
//!
//! ## Usage
//!
//! ### 基础用法：解析追踪ID
//! ```
//! use cloud_trace_log::{resolve_trace_id, sync_with_request_meta, RequestMeta, TraceId};
//!
//! // 不在任何请求中时返回 None
//! assert_eq!(resolve_trace_id(), None);
//!
//! // 中间件写入请求元数据后即可解析
//! let meta = RequestMeta::from_headers([("X-Cloud-Trace-Context", "abc123/0;o=1")]);
//! let trace_id = sync_with_request_meta(meta, resolve_trace_id);
//! assert_eq!(trace_id, Some(TraceId::new("abc123")));
//! ```
//!
//! ### 格式化日志载荷
//! ```
//! use cloud_trace_log::{format_structured_json, LogRecord};
//!
//! let record = LogRecord::new(1000.25, "request handled", 1u64, "INFO");
//! let json = format_structured_json(&record).unwrap();
//! println!("{json}");
//! ```
//!
//! ### Axum 集成（需要启用 axum feature）
//! ```ignore
//! use axum::{routing::get, Router};
//! use cloud_trace_log::{CloudTrace, CloudTraceLayer};
//!
//! async fn handler(CloudTrace(trace_id): CloudTrace) -> String {
//!     format!("trace: {}", cloud_trace_log::TraceId::render(trace_id.as_ref()))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(CloudTraceLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod context;
mod error;
mod payload;
mod resolver;
mod source;
mod trace_id;

pub use context::{
    current_request_headers, current_request_meta, sync_with_request_headers,
    sync_with_request_meta, with_request_headers, with_request_meta, RequestHeaders, RequestMeta,
};
pub use error::FormatError;
pub use payload::{
    format_structured_json, severity_name, LogRecord, StructuredPayload, ThreadIdent, Timestamp,
};
pub use resolver::{resolve_trace_id, TraceResolver};
pub use source::{
    ActiveHeaders, HeaderTraceSource, Lookup, MiddlewareMeta, RequestContextProvider, TraceSource,
};
pub use trace_id::{TraceId, NO_TRACE};

/// HTTP 头部中的追踪上下文字段名
pub const TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

/// 中间件元数据中的追踪上下文键
pub const MIDDLEWARE_TRACE_HEADER: &str = "HTTP_X_CLOUD_TRACE_CONTEXT";

/// 直接请求头部中的追踪上下文键
pub const DIRECT_TRACE_HEADER: &str = "X_CLOUD_TRACE_CONTEXT";

// -- axum feature --
#[cfg(feature = "axum")]
mod integrations;
#[cfg(feature = "axum")]
pub use integrations::axum::{CloudTrace, CloudTraceConfig, CloudTraceLayer, CloudTraceService};

// -- subscriber feature --
#[cfg(feature = "subscriber")]
mod subscriber;
#[cfg(feature = "subscriber")]
pub use subscriber::StructuredJson;
