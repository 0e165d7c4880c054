//! 请求上下文管理
//!
//! 使用 `tokio::task_local` 保存当前请求的环境上下文，对应两种Web请求抽象：
//!
//! - 中间件风格：由中间件在请求进入时写入的元数据映射 [`RequestMeta`]，
//!   键为 CGI 风格（`HTTP_X_CLOUD_TRACE_CONTEXT`）。
//! - 直接上下文风格：当前请求自身的头部映射 [`RequestHeaders`]，
//!   查找时不区分大小写，并将 `-` 与 `_` 视为相同。
//!
//! 在任何作用域之外读取都视为“没有活动请求”，不会 panic。

use std::collections::HashMap;
use std::future::Future;
use tokio::task_local;

// 两种请求抽象各自独立存储，互不影响
task_local! {
    static CURRENT_META: RequestMeta;
    static CURRENT_HEADERS: RequestHeaders;
}

/// 中间件捕获的请求元数据
///
/// 与 CGI/WSGI 环境变量相同的命名方式：普通头部加 `HTTP_` 前缀，
/// 全部大写，`-` 替换为 `_`；`Content-Type` 与 `Content-Length` 不加前缀。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    entries: HashMap<String, String>,
}

impl RequestMeta {
    /// 创建空的元数据映射
    pub fn new() -> Self {
        Self::default()
    }

    /// 从HTTP头部构造元数据
    ///
    /// 同名头部只保留第一个值。
    ///
    /// # 示例
    /// ```
    /// use cloud_trace_log::RequestMeta;
    ///
    /// let meta = RequestMeta::from_headers([("X-Cloud-Trace-Context", "abc/1")]);
    /// assert_eq!(meta.get("HTTP_X_CLOUD_TRACE_CONTEXT"), Some("abc/1"));
    /// ```
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut meta = Self::new();
        for (name, value) in headers {
            meta.entries
                .entry(Self::meta_key(name.as_ref()))
                .or_insert_with(|| value.into());
        }
        meta
    }

    /// 直接写入一个元数据键（不做键名转换）
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// 按键精确查找
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// 元数据条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// HTTP头部名转换为 CGI 风格键名
    pub fn meta_key(header_name: &str) -> String {
        let key = header_name.trim().to_ascii_uppercase().replace('-', "_");
        match key.as_str() {
            "CONTENT_TYPE" | "CONTENT_LENGTH" => key,
            _ => format!("HTTP_{key}"),
        }
    }
}

/// 当前请求的头部映射
///
/// 查找时忽略大小写，且 `X_CLOUD_TRACE_CONTEXT` 与 `x-cloud-trace-context` 等价。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    headers: HashMap<String, String>,
}

impl RequestHeaders {
    /// 创建空的头部映射
    pub fn new() -> Self {
        Self::default()
    }

    /// 从头部迭代器构造，同名头部只保留第一个值
    pub fn from_pairs<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in headers {
            map.headers
                .entry(Self::normalize(name.as_ref()))
                .or_insert_with(|| value.into());
        }
        map
    }

    /// 写入头部，覆盖已有值
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(Self::normalize(name), value.into());
    }

    /// 查找头部值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&Self::normalize(name)).map(String::as_str)
    }

    /// 头部数量
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn normalize(name: &str) -> String {
        name.trim().to_ascii_lowercase().replace('_', "-")
    }
}

/// 在中间件元数据上下文中执行异步操作
///
/// # 参数
/// * `meta` - 当前请求的元数据
/// * `future` - 要执行的异步操作
pub async fn with_request_meta<F, T>(meta: RequestMeta, future: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_META.scope(meta, future).await
}

/// 在中间件元数据上下文中同步执行闭包
pub fn sync_with_request_meta<F, T>(meta: RequestMeta, f: F) -> T
where
    F: FnOnce() -> T,
{
    CURRENT_META.sync_scope(meta, f)
}

/// 在直接请求上下文中执行异步操作
pub async fn with_request_headers<F, T>(headers: RequestHeaders, future: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_HEADERS.scope(headers, future).await
}

/// 在直接请求上下文中同步执行闭包
pub fn sync_with_request_headers<F, T>(headers: RequestHeaders, f: F) -> T
where
    F: FnOnce() -> T,
{
    CURRENT_HEADERS.sync_scope(headers, f)
}

/// 获取当前请求元数据的副本，不在作用域内时返回 `None`
pub fn current_request_meta() -> Option<RequestMeta> {
    inspect_request_meta(RequestMeta::clone)
}

/// 获取当前请求头部的副本，不在作用域内时返回 `None`
pub fn current_request_headers() -> Option<RequestHeaders> {
    inspect_request_headers(RequestHeaders::clone)
}

/// 以借用方式读取当前请求元数据
pub(crate) fn inspect_request_meta<R>(f: impl FnOnce(&RequestMeta) -> R) -> Option<R> {
    CURRENT_META.try_with(f).ok()
}

/// 以借用方式读取当前请求头部
pub(crate) fn inspect_request_headers<R>(f: impl FnOnce(&RequestHeaders) -> R) -> Option<R> {
    CURRENT_HEADERS.try_with(f).ok()
}
