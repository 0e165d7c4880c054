//! 追踪ID来源检查器
//!
//! 每个来源对应一种Web请求抽象，只负责“尝试产出一个追踪ID”。
//! 任何上下文缺失（框架未加载、没有活动请求、头部缺失）都返回 `None`，绝不报错。

use crate::context::{self, RequestHeaders, RequestMeta};
use crate::trace_id::TraceId;
use crate::{DIRECT_TRACE_HEADER, MIDDLEWARE_TRACE_HEADER};
use std::sync::Arc;

/// 一次头部查找的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// 当前没有活动请求
    NoRequest,
    /// 有请求，但没有该键
    Missing,
    /// 找到的原始值
    Found(String),
}

/// 请求上下文提供者
///
/// 抽象“当前是否有请求”以及“按键读取请求头部/元数据”两种能力，
/// 由具体Web框架的适配实现。
pub trait RequestContextProvider: Send + Sync {
    /// 在当前请求中查找指定键
    fn lookup(&self, key: &str) -> Lookup;
}

/// 读取中间件写入的 task-local [`RequestMeta`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MiddlewareMeta;

impl RequestContextProvider for MiddlewareMeta {
    fn lookup(&self, key: &str) -> Lookup {
        context::inspect_request_meta(|meta| meta.lookup(key)).unwrap_or(Lookup::NoRequest)
    }
}

/// 读取 task-local 的当前请求头部 [`RequestHeaders`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveHeaders;

impl RequestContextProvider for ActiveHeaders {
    fn lookup(&self, key: &str) -> Lookup {
        context::inspect_request_headers(|headers| headers.lookup(key))
            .unwrap_or(Lookup::NoRequest)
    }
}

/// 直接持有的请求本身总是“活动”的
impl RequestContextProvider for RequestHeaders {
    fn lookup(&self, key: &str) -> Lookup {
        self.get(key)
            .map_or(Lookup::Missing, |value| Lookup::Found(value.to_string()))
    }
}

impl RequestContextProvider for RequestMeta {
    fn lookup(&self, key: &str) -> Lookup {
        self.get(key)
            .map_or(Lookup::Missing, |value| Lookup::Found(value.to_string()))
    }
}

/// 追踪ID来源
///
/// 解析器按优先级依次调用各来源；返回 `None` 表示“无追踪”。
/// 实现不得 panic。
pub trait TraceSource: Send + Sync {
    /// 来源名称，用于日志和排查优先级
    fn name(&self) -> &str {
        "custom"
    }

    /// 尝试产出追踪ID
    fn trace_id(&self) -> Option<TraceId>;
}

/// 任意闭包都可以作为来源注册
impl<F> TraceSource for F
where
    F: Fn() -> Option<TraceId> + Send + Sync,
{
    fn trace_id(&self) -> Option<TraceId> {
        self()
    }
}

/// 基于请求头部的来源
///
/// `provider` 为 `None` 表示对应的Web框架未加载。
#[derive(Clone)]
pub struct HeaderTraceSource {
    name: String,
    header_key: String,
    provider: Option<Arc<dyn RequestContextProvider>>,
    empty_is_missing: bool,
}

impl HeaderTraceSource {
    /// 使用自定义名称、头部键和提供者创建来源
    pub fn new(
        name: impl Into<String>,
        header_key: impl Into<String>,
        provider: Option<Arc<dyn RequestContextProvider>>,
    ) -> Self {
        Self {
            name: name.into(),
            header_key: header_key.into(),
            provider,
            empty_is_missing: false,
        }
    }

    /// 空头部值是否视为缺失
    pub fn with_empty_as_missing(mut self, empty_is_missing: bool) -> Self {
        self.empty_is_missing = empty_is_missing;
        self
    }

    /// 中间件风格来源，读取 `HTTP_X_CLOUD_TRACE_CONTEXT`
    pub fn middleware(provider: Option<Arc<dyn RequestContextProvider>>) -> Self {
        Self::new("middleware", MIDDLEWARE_TRACE_HEADER, provider)
    }

    /// 直接上下文风格来源，读取 `X_CLOUD_TRACE_CONTEXT`
    ///
    /// 空的头部值与缺失同样处理。
    pub fn direct(provider: Option<Arc<dyn RequestContextProvider>>) -> Self {
        Self::new("direct", DIRECT_TRACE_HEADER, provider).with_empty_as_missing(true)
    }

    /// 框架不可用的来源，始终返回 `None`
    pub fn unavailable(name: impl Into<String>, header_key: impl Into<String>) -> Self {
        Self::new(name, header_key, None)
    }

    /// 查找的头部键
    pub fn header_key(&self) -> &str {
        &self.header_key
    }

    /// 对应框架是否可用
    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }
}

impl std::fmt::Debug for HeaderTraceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderTraceSource")
            .field("name", &self.name)
            .field("header_key", &self.header_key)
            .field("available", &self.is_available())
            .field("empty_is_missing", &self.empty_is_missing)
            .finish()
    }
}

impl TraceSource for HeaderTraceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn trace_id(&self) -> Option<TraceId> {
        let Some(provider) = self.provider.as_deref() else {
            tracing::trace!(source = %self.name, "framework not available");
            return None;
        };

        match provider.lookup(&self.header_key) {
            Lookup::Found(value) if value.is_empty() && self.empty_is_missing => {
                tracing::trace!(source = %self.name, "trace header empty");
                None
            }
            Lookup::Found(value) => Some(TraceId::from_header_value(&value)),
            Lookup::Missing => {
                tracing::trace!(
                    source = %self.name,
                    key = %self.header_key,
                    "trace header missing"
                );
                None
            }
            Lookup::NoRequest => {
                tracing::trace!(source = %self.name, "no active request");
                None
            }
        }
    }
}
