//! TraceId 核心结构体定义

use serde::{Serialize, Serializer};
use std::fmt;

/// 未找到追踪ID时用于渲染的哨兵字符串
///
/// 仅用于文本输出；判断“无追踪”时请使用 `Option::<TraceId>::None`，
/// 因为真实的追踪ID也可能恰好是 `"None"` 或空字符串。
pub const NO_TRACE: &str = "None";

/// 追踪ID结构体
///
/// 从 `X-Cloud-Trace-Context` 头部值中提取出的不透明标识。
/// 除了按 `/` 切分以外不做任何格式校验。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// 从追踪头部值中提取追踪ID
    ///
    /// 头部格式为 `"<trace-id>/<span-info>"`，只保留第一个 `/` 之前的部分。
    /// 不含 `/` 的值原样返回；`/` 之前为空则得到空ID。
    ///
    /// # 示例
    /// ```
    /// use cloud_trace_log::TraceId;
    ///
    /// assert_eq!(TraceId::from_header_value("abc123/0;o=1").as_str(), "abc123");
    /// assert_eq!(TraceId::from_header_value("abc123").as_str(), "abc123");
    /// assert_eq!(TraceId::from_header_value("/0;o=1").as_str(), "");
    /// ```
    #[inline]
    pub fn from_header_value(value: &str) -> Self {
        let id = value.split_once('/').map_or(value, |(id, _)| id);
        Self(id.to_string())
    }

    /// 直接用给定字符串创建追踪ID（不做切分）
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 获取追踪ID字符串
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 是否为空ID（头部值以 `/` 开头时出现）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 将解析结果渲染为文本，未找到时返回 [`NO_TRACE`]
    pub fn render(trace_id: Option<&TraceId>) -> &str {
        trace_id.map_or(NO_TRACE, TraceId::as_str)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TraceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
