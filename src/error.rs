//! 格式化错误定义

use thiserror::Error;

/// 日志载荷格式化错误
///
/// 追踪ID解析没有错误类型：任何缺失都表示为 `None`。
/// 格式化错误则原样交给调用方，由调用方决定如何降级（例如输出纯文本行）。
#[derive(Debug, Error)]
pub enum FormatError {
    /// 创建时间不是有限值，或超出可表示的秒数范围
    #[error("invalid log record timestamp: {0}")]
    InvalidTimestamp(f64),

    /// JSON 序列化失败
    #[error("failed to serialize log payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
