use std::any::Any;
use std::fmt;

/// 任务执行错误类型
///
/// 仅在 [`FailurePolicy::Isolate`](crate::FailurePolicy::Isolate) 下产生；
/// 默认策略里任务的 panic 原样穿出 `run()`，不会被转换成错误值。
#[derive(Debug, Clone)]
pub enum TaskError {
    /// 任务执行时 panic，携带 panic 信息
    Panicked(String),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Panicked(msg) => write!(f, "任务执行时 panic: {}", msg),
        }
    }
}

impl std::error::Error for TaskError {}

/// 从 panic 载荷里提取可读信息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "无法识别的 panic 载荷".to_string()
    }
}
