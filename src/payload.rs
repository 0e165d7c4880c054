//! 结构化日志载荷
//!
//! 将日志记录转换为日志后端结构化摄取所需的 JSON：
//!
//! ```json
//! {
//!   "message": "<string>",
//!   "timestamp": { "seconds": 1000, "nanos": 123456789 },
//!   "thread": 140245,
//!   "severity": "INFO"
//! }
//! ```

use crate::error::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 线程标识，由日志来源决定是数字还是名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadIdent {
    Number(u64),
    Name(String),
}

impl From<u64> for ThreadIdent {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for ThreadIdent {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ThreadIdent {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for ThreadIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// 待格式化的日志记录
///
/// 所有字段只读，原样复制到输出载荷中。
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// 创建时间，自 Unix 纪元起的秒数（含小数）
    pub created: f64,
    /// 已渲染的消息
    pub message: String,
    /// 线程标识
    pub thread: ThreadIdent,
    /// 严重级别名称
    pub severity: String,
}

impl LogRecord {
    pub fn new(
        created: f64,
        message: impl Into<String>,
        thread: impl Into<ThreadIdent>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            created,
            message: message.into(),
            thread: thread.into(),
            severity: severity.into(),
        }
    }
}

/// 载荷中的时间戳：整数秒 + 纳秒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i64,
}

impl Timestamp {
    /// 由浮点秒数拆分出整数秒与纳秒
    ///
    /// 小数部分乘以 10^9 后向零截断，不做四舍五入；
    /// 负数输入时两部分符号与输入一致。
    pub fn from_created(created: f64) -> Result<Self, FormatError> {
        if !created.is_finite() || created.abs() >= i64::MAX as f64 {
            return Err(FormatError::InvalidTimestamp(created));
        }

        let whole = created.trunc();
        let fraction = created - whole;

        Ok(Self {
            seconds: whole as i64,
            nanos: (fraction * 1e9).trunc() as i64,
        })
    }
}

/// 结构化日志载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPayload {
    pub message: String,
    pub timestamp: Timestamp,
    pub thread: ThreadIdent,
    pub severity: String,
}

impl StructuredPayload {
    /// 从日志记录构造载荷
    pub fn from_record(record: &LogRecord) -> Result<Self, FormatError> {
        Ok(Self {
            message: record.message.clone(),
            timestamp: Timestamp::from_created(record.created)?,
            thread: record.thread.clone(),
            severity: record.severity.clone(),
        })
    }

    /// 未序列化的 JSON 映射，供直接接收对象的传输层使用
    pub fn to_value(&self) -> Result<serde_json::Value, FormatError> {
        Ok(serde_json::to_value(self)?)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 将日志记录格式化为结构化 JSON 字符串
///
/// 错误不在内部处理，直接返回给调用方。
///
/// # 示例
/// ```
/// use cloud_trace_log::{format_structured_json, LogRecord};
///
/// let record = LogRecord::new(1000.5, "hello", 7u64, "INFO");
/// let json = format_structured_json(&record).unwrap();
/// assert!(json.contains("\"seconds\":1000"));
/// assert!(json.contains("\"nanos\":500000000"));
/// ```
pub fn format_structured_json(record: &LogRecord) -> Result<String, FormatError> {
    StructuredPayload::from_record(record)?.to_json()
}

/// `tracing` 级别对应的后端严重级别名称
pub fn severity_name(level: &tracing::Level) -> &'static str {
    match *level {
        tracing::Level::ERROR => "ERROR",
        tracing::Level::WARN => "WARNING",
        tracing::Level::INFO => "INFO",
        tracing::Level::DEBUG | tracing::Level::TRACE => "DEBUG",
    }
}
