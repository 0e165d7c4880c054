//! Axum框架的追踪上下文中间件

use crate::context::{self, RequestHeaders, RequestMeta};
use crate::resolver::TraceResolver;
use crate::source::{HeaderTraceSource, TraceSource};
use crate::trace_id::TraceId;
use crate::TRACE_CONTEXT_HEADER;
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    response::Response,
};
use std::convert::Infallible;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::Instrument;

/// 追踪上下文中间件配置选项
#[derive(Clone, Debug)]
pub struct CloudTraceConfig {
    /// 是否启用 tracing span（默认启用）
    pub enable_span: bool,
    /// 是否在响应头中回写追踪上下文（默认关闭）
    pub enable_response_header: bool,
}

impl Default for CloudTraceConfig {
    fn default() -> Self {
        Self {
            enable_span: true,
            enable_response_header: false,
        }
    }
}

/// 追踪上下文中间件层
///
/// 在请求进入时把头部捕获为 [`RequestMeta`]，并在该上下文中执行后续处理，
/// 使 [`TraceResolver::standard`] 的中间件来源可以读取到追踪ID。
#[derive(Clone, Debug, Default)]
pub struct CloudTraceLayer {
    config: CloudTraceConfig,
}

impl CloudTraceLayer {
    /// 使用默认配置创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义配置创建
    pub fn with_config(config: CloudTraceConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for CloudTraceLayer {
    type Service = CloudTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CloudTraceService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// 追踪上下文服务
#[derive(Clone, Debug)]
pub struct CloudTraceService<S> {
    inner: S,
    config: CloudTraceConfig,
}

impl<S> Service<Request> for CloudTraceService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let meta = RequestMeta::from(req.headers());
        let trace_context = req.headers().get(TRACE_CONTEXT_HEADER).cloned();
        let trace_id = trace_context
            .as_ref()
            .and_then(|value| value.to_str().ok())
            .map(TraceId::from_header_value);

        // 提取请求信息用于span（在req被移动之前）
        let method = req.method().clone();
        let uri = req.uri().clone();

        let future = self.inner.call(req);
        let echo_header = self.config.enable_response_header;

        let handle = async move {
            let mut response = context::with_request_meta(meta, future).await?;

            if echo_header {
                if let Some(value) = trace_context {
                    response.headers_mut().insert(TRACE_CONTEXT_HEADER, value);
                }
            }

            Ok::<_, S::Error>(response)
        };

        if !self.config.enable_span {
            return Box::pin(handle);
        }

        let span = tracing::info_span!(
            "request",
            trace_id = %TraceId::render(trace_id.as_ref()),
            method = %method,
            uri = %uri
        );

        Box::pin(handle.instrument(span))
    }
}

impl From<&HeaderMap> for RequestMeta {
    /// 跳过非 UTF-8 的头部值
    fn from(headers: &HeaderMap) -> Self {
        RequestMeta::from_headers(
            headers
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        )
    }
}

impl From<&HeaderMap> for RequestHeaders {
    fn from(headers: &HeaderMap) -> Self {
        RequestHeaders::from_pairs(
            headers
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        )
    }
}

// -- CloudTrace Extractor --

/// Axum 提取器，用于在 handler 函数签名中直接获取追踪ID
///
/// 先按 [`TraceResolver::standard`] 的优先级解析环境上下文，
/// 都没有时再直接读取本请求的头部。没有追踪上下文时为 `CloudTrace(None)`。
///
/// # 示例
/// ```no_run
/// use axum::{routing::get, Router};
/// use cloud_trace_log::{CloudTrace, CloudTraceLayer, TraceId};
///
/// async fn my_handler(CloudTrace(trace_id): CloudTrace) -> String {
///     format!("trace: {}", TraceId::render(trace_id.as_ref()))
/// }
///
/// let app: Router = Router::new()
///     .route("/", get(my_handler))
///     .layer(CloudTraceLayer::new());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudTrace(pub Option<TraceId>);

impl<S> FromRequestParts<S> for CloudTrace
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let trace_id = TraceResolver::standard().resolve().or_else(|| {
            let headers = RequestHeaders::from(&parts.headers);
            HeaderTraceSource::direct(Some(Arc::new(headers))).trace_id()
        });
        Ok(CloudTrace(trace_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIDDLEWARE_TRACE_HEADER;
    use axum::{
        body::Body,
        http::{HeaderValue, Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler(CloudTrace(trace_id): CloudTrace) -> String {
        TraceId::render(trace_id.as_ref()).to_string()
    }

    async fn meta_handler() -> String {
        context::current_request_meta()
            .and_then(|meta| meta.get(MIDDLEWARE_TRACE_HEADER).map(str::to_owned))
            .unwrap_or_default()
    }

    async fn body_string(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn test_meta_from_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_CONTEXT_HEADER, HeaderValue::from_static("abc/1"));
        headers.insert("x-binary", HeaderValue::from_bytes(&[0xFF, 0xFE]).unwrap());

        let meta = RequestMeta::from(&headers);
        assert_eq!(meta.get(MIDDLEWARE_TRACE_HEADER), Some("abc/1"));
        assert_eq!(meta.get("HTTP_X_BINARY"), None, "非UTF-8值应被跳过");
    }

    #[tokio::test]
    async fn test_extractor_without_layer_reads_headers_directly() {
        let (mut parts, _body) = Request::builder()
            .uri("/test")
            .header(TRACE_CONTEXT_HEADER, "direct123/0;o=1")
            .body(())
            .unwrap()
            .into_parts();

        let CloudTrace(trace_id) = CloudTrace::from_request_parts(&mut parts, &())
            .await
            .expect("CloudTrace extraction should never fail");
        assert_eq!(trace_id, Some(TraceId::new("direct123")));
    }

    #[tokio::test]
    async fn test_extractor_without_context() {
        let (mut parts, _body) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let extracted = CloudTrace::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, CloudTrace(None));
    }

    #[tokio::test]
    async fn test_extractor_prefers_middleware_meta() {
        let (mut parts, _body) = Request::builder()
            .uri("/")
            .header(TRACE_CONTEXT_HEADER, "from-request/1")
            .body(())
            .unwrap()
            .into_parts();
        let meta = RequestMeta::from_headers([("x-cloud-trace-context", "from-meta/1")]);

        let extracted = context::with_request_meta(meta, async move {
            CloudTrace::from_request_parts(&mut parts, &()).await.unwrap()
        })
        .await;
        assert_eq!(extracted, CloudTrace(Some(TraceId::new("from-meta"))));
    }

    // --- 中间件/服务测试 ---
    mod layer_behavior {
        use super::*;

        #[tokio::test]
        async fn test_end_to_end_flow() {
            let app = Router::new().route("/", get(handler)).layer(CloudTraceLayer::new());

            // 场景1: 提供追踪头部
            let request = Request::builder()
                .uri("/")
                .header(TRACE_CONTEXT_HEADER, "abc123/0;o=1")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "abc123");

            // 场景2: 不提供追踪头部
            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, crate::NO_TRACE);
        }

        #[tokio::test]
        async fn test_meta_visible_in_handler() {
            let app = Router::new()
                .route("/", get(meta_handler))
                .layer(CloudTraceLayer::new());
            let request = Request::builder()
                .uri("/")
                .header(TRACE_CONTEXT_HEADER, "abc123/0;o=1")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(body_string(response).await, "abc123/0;o=1");
        }

        #[tokio::test]
        async fn test_span_disabled() {
            let config = CloudTraceConfig {
                enable_span: false,
                enable_response_header: false,
            };
            let app = Router::new()
                .route("/", get(handler))
                .layer(CloudTraceLayer::with_config(config));
            let request = Request::builder()
                .uri("/")
                .header(TRACE_CONTEXT_HEADER, "fast/1")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(body_string(response).await, "fast");
        }

        #[tokio::test]
        async fn test_response_header_echo() {
            let config = CloudTraceConfig {
                enable_span: true,
                enable_response_header: true,
            };
            let app = Router::new()
                .route("/", get(handler))
                .layer(CloudTraceLayer::with_config(config));
            let request = Request::builder()
                .uri("/")
                .header(TRACE_CONTEXT_HEADER, "echo/1;o=1")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.headers().get(TRACE_CONTEXT_HEADER).unwrap(), "echo/1;o=1");
        }

        #[tokio::test]
        async fn test_response_header_disabled_by_default() {
            let app = Router::new().route("/", get(handler)).layer(CloudTraceLayer::new());
            let request = Request::builder()
                .uri("/")
                .header(TRACE_CONTEXT_HEADER, "echo/1")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert!(response.headers().get(TRACE_CONTEXT_HEADER).is_none());
        }
    }
}
