//! tracing-subscriber 的结构化 JSON 事件格式
//!
//! 每个事件输出一行 [`format_structured_json`] 生成的 JSON，
//! 格式化失败时退化为纯文本行。

use crate::payload::{format_structured_json, severity_name, LogRecord, ThreadIdent};
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// 结构化 JSON 事件格式
///
/// # 示例
/// ```
/// use cloud_trace_log::StructuredJson;
///
/// let subscriber = tracing_subscriber::fmt()
///     .event_format(StructuredJson)
///     .finish();
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!("service started");
/// });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredJson;

impl<S, N> FormatEvent<S, N> for StructuredJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            created: now_seconds(),
            message: visitor.finish(),
            thread: current_thread(),
            severity: severity_name(event.metadata().level()).to_string(),
        };

        match format_structured_json(&record) {
            Ok(json) => writeln!(writer, "{json}"),
            Err(_) => writeln!(writer, "{} {}", record.severity, record.message),
        }
    }
}

/// 将 `message` 字段与其余字段拼接为一条消息
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// 线程编号分配器，从 1 开始
static NEXT_THREAD_NUMBER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: u64 = NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed);
}

/// 当前线程标识：优先使用线程名，否则使用首次记录日志时分配的编号
fn current_thread() -> ThreadIdent {
    if let Some(name) = std::thread::current().name() {
        return ThreadIdent::from(name);
    }

    THREAD_NUMBER
        .try_with(|number| ThreadIdent::Number(*number))
        .unwrap_or_else(|_| ThreadIdent::Name(format!("{:?}", std::thread::current().id())))
}
