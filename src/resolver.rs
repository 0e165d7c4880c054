//! 追踪ID解析器
//!
//! 按固定优先级依次询问各来源，返回第一个找到的追踪ID。

use crate::source::{ActiveHeaders, HeaderTraceSource, MiddlewareMeta, TraceSource};
use crate::trace_id::TraceId;
use std::sync::Arc;

/// 追踪ID解析器
///
/// 来源列表有序且可扩展：新的框架只需追加来源，无需修改解析流程。
///
/// # 示例
/// ```
/// use cloud_trace_log::{TraceId, TraceResolver};
///
/// let resolver = TraceResolver::new()
///     .with_source(|| None::<TraceId>)
///     .with_source(|| Some(TraceId::new("fallback")));
///
/// assert_eq!(resolver.resolve(), Some(TraceId::new("fallback")));
/// ```
pub struct TraceResolver {
    sources: Vec<Box<dyn TraceSource>>,
}

impl TraceResolver {
    /// 创建不含任何来源的解析器
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// 默认优先级：中间件元数据优先，其次是直接请求上下文
    pub fn standard() -> Self {
        Self::new()
            .with_source(HeaderTraceSource::middleware(Some(Arc::new(MiddlewareMeta))))
            .with_source(HeaderTraceSource::direct(Some(Arc::new(ActiveHeaders))))
    }

    /// 追加一个来源（优先级最低）
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: TraceSource + 'static,
    {
        self.push(source);
        self
    }

    /// 追加一个来源（优先级最低）
    pub fn push<S>(&mut self, source: S)
    where
        S: TraceSource + 'static,
    {
        self.sources.push(Box::new(source));
    }

    /// 按优先级列出来源名称
    pub fn sources(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// 解析当前请求的追踪ID
    ///
    /// 返回第一个不为 `None` 的结果；全部来源都没有结果时返回 `None`。
    /// 不修改任何内部状态，重复调用结果一致。
    pub fn resolve(&self) -> Option<TraceId> {
        let found = self
            .sources
            .iter()
            .find_map(|source| source.trace_id().map(|id| (source.name(), id)));

        match found {
            Some((source, trace_id)) => {
                tracing::trace!(source, trace_id = %trace_id, "trace id resolved");
                Some(trace_id)
            }
            None => {
                tracing::debug!("no trace context found in any source");
                None
            }
        }
    }
}

impl Default for TraceResolver {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for TraceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceResolver")
            .field("sources", &self.sources())
            .finish()
    }
}

/// 使用默认优先级解析当前请求的追踪ID
///
/// 等价于 `TraceResolver::standard().resolve()`。
pub fn resolve_trace_id() -> Option<TraceId> {
    TraceResolver::standard().resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        sync_with_request_headers, sync_with_request_meta, RequestHeaders, RequestMeta,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_resolver() {
        assert_eq!(TraceResolver::new().resolve(), None);
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(TraceResolver::standard().sources(), vec!["middleware", "direct"]);
    }

    #[test]
    fn test_no_context_yields_none() {
        assert_eq!(resolve_trace_id(), None);
    }

    #[test]
    fn test_first_match_wins() {
        let resolver = TraceResolver::new()
            .with_source(|| None::<TraceId>)
            .with_source(|| Some(TraceId::new("second")))
            .with_source(|| Some(TraceId::new("third")));
        assert_eq!(resolver.resolve(), Some(TraceId::new("second")));
    }

    #[test]
    fn test_stops_after_first_match() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let resolver = TraceResolver::new()
            .with_source(|| Some(TraceId::new("first")))
            .with_source(|| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Some(TraceId::new("never"))
            });

        assert_eq!(resolver.resolve(), Some(TraceId::new("first")));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0, "后续来源不应被调用");
    }

    #[test]
    fn test_middleware_beats_direct() {
        let meta = RequestMeta::from_headers([("x-cloud-trace-context", "from-meta/1")]);
        let headers = RequestHeaders::from_pairs([("x-cloud-trace-context", "from-headers/1")]);

        let resolved = sync_with_request_meta(meta, || {
            sync_with_request_headers(headers, resolve_trace_id)
        });
        assert_eq!(resolved, Some(TraceId::new("from-meta")));
    }

    #[test]
    fn test_falls_back_to_direct() {
        let meta = RequestMeta::from_headers([("accept", "*/*")]);
        let headers = RequestHeaders::from_pairs([("x-cloud-trace-context", "from-headers/1")]);

        let resolved = sync_with_request_meta(meta, || {
            sync_with_request_headers(headers, resolve_trace_id)
        });
        assert_eq!(resolved, Some(TraceId::new("from-headers")));
    }

    #[test]
    fn test_idempotent() {
        let headers = RequestHeaders::from_pairs([("x-cloud-trace-context", "abc123/0;o=1")]);
        let resolver = TraceResolver::standard();

        let (first, second) =
            sync_with_request_headers(headers, || (resolver.resolve(), resolver.resolve()));
        assert_eq!(first, second);
        assert_eq!(first, Some(TraceId::new("abc123")));
    }

    #[test]
    fn test_push_extends_priority_list() {
        let mut resolver = TraceResolver::standard();
        resolver.push(HeaderTraceSource::unavailable("other-framework", "X_OTHER"));
        resolver.push(|| Some(TraceId::new("last-resort")));

        assert_eq!(
            resolver.sources(),
            vec!["middleware", "direct", "other-framework", "custom"]
        );
        assert_eq!(resolver.resolve(), Some(TraceId::new("last-resort")));
    }
}
