use std::fmt;

use thiserror::Error;

/// 对象存储错误 / Object store error
///
/// `NotFound` 只在加载阶段被跟踪器内部吞掉，表示“尚无历史状态”
/// `NotFound` is swallowed by the tracker at load time and means "no prior state"
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("对象不存在 / object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("存储端拒绝 {operation} 请求 / store rejected {operation} with status {status} ({code}): {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP 请求失败 / http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("无效的存储端点 / invalid store endpoint '{0}'")]
    Endpoint(String),

    #[error("存储不可用 / store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// 会话阶段 / Session phase in which a store call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Save,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Load => f.write_str("load"),
            Phase::Save => f.write_str("save"),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// 跟踪器错误 / Tracker error
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("配置错误 / configuration error: {0}")]
    Configuration(String),

    #[error("存储错误 / storage error during {phase} of '{key}': {source}")]
    Storage {
        phase: Phase,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("无法解析已发布 ID / failed to decode published ids from '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("无法序列化已发布 ID / failed to encode published ids: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TrackerError {
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    pub fn storage(phase: Phase, key: &str, source: StoreError) -> Self {
        Self::Storage {
            phase,
            key: key.to_string(),
            source,
        }
    }
}

/// 获取详细错误描述（中英文） / Get detailed error description (CN/EN)
pub fn describe_error(e: &TrackerError) -> String {
    match e {
        TrackerError::Configuration(msg) => format!("配置错误 / Config error: {}", msg),
        TrackerError::Storage { phase, key, source } => {
            format!("存储错误 / Storage error ({} {}): {}", phase, key, source)
        }
        TrackerError::Decode { key, source } => {
            format!("解析错误 / Decode error ({}): {}", key, source)
        }
        TrackerError::Encode(err) => format!("序列化错误 / Encode error: {}", err),
    }
}

/// 作用域会话错误 / Scoped session error
///
/// 调用方的错误与保存失败可以同时出现，二者都保留
/// The caller's error and a save failure may both occur; both are kept
#[derive(Debug)]
pub enum SessionError<E> {
    /// 打开会话失败，调用方代码未执行 / Opening failed, the body never ran
    Open(TrackerError),
    /// 调用方代码失败；`save` 为退出时的保存错误（如有）
    /// The body failed; `save` holds the exit-time save failure, if any
    ///
    /// `source()` 只返回调用方错误，保存错误不在错误链中，需通过 `save_error()` 或 `Display` 获取
    /// `source()` yields only the body error; the save failure is not part of the
    /// chain and is reachable through `save_error()` or `Display`
    Body {
        source: E,
        save: Option<TrackerError>,
    },
    /// 调用方代码成功但保存失败 / The body succeeded but the save failed
    Save(TrackerError),
}

impl<E> SessionError<E> {
    /// 调用方的原始错误 / The caller's original error, if the body failed
    pub fn body_error(&self) -> Option<&E> {
        match self {
            SessionError::Body { source, .. } => Some(source),
            _ => None,
        }
    }

    /// 退出时的保存错误 / The exit-time save failure, if any
    pub fn save_error(&self) -> Option<&TrackerError> {
        match self {
            SessionError::Body { save, .. } => save.as_ref(),
            SessionError::Save(err) => Some(err),
            SessionError::Open(_) => None,
        }
    }

    /// 拆分为调用方错误与跟踪器错误 / Split into caller error and tracker error
    pub fn into_parts(self) -> (Option<E>, Option<TrackerError>) {
        match self {
            SessionError::Open(err) | SessionError::Save(err) => (None, Some(err)),
            SessionError::Body { source, save } => (Some(source), save),
        }
    }
}

impl<E> SessionError<E>
where
    E: Into<anyhow::Error>,
{
    /// 转换为 `anyhow::Error`，保留调用方错误（可 `downcast`）并把保存失败作为上下文
    /// Convert into `anyhow::Error`. The body error stays downcastable and a save
    /// failure is attached as context; open/save failures keep `TrackerError` as the root
    pub fn into_anyhow(self) -> anyhow::Error {
        match self {
            SessionError::Open(err) => {
                anyhow::Error::new(err).context("failed to open tracker session")
            }
            SessionError::Save(err) => {
                anyhow::Error::new(err).context("failed to save tracker session")
            }
            SessionError::Body { source, save: None } => source.into(),
            SessionError::Body {
                source,
                save: Some(save),
            } => {
                let body: anyhow::Error = source.into();
                body.context(format!(
                    "tracker session aborted (saving published ids also failed: {})",
                    save
                ))
            }
        }
    }
}

impl<E: fmt::Display> fmt::Display for SessionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Open(err) => write!(f, "failed to open tracker session: {}", err),
            SessionError::Body { source, save: None } => {
                write!(f, "tracker session aborted: {}", source)
            }
            SessionError::Body {
                source,
                save: Some(save),
            } => write!(
                f,
                "tracker session aborted: {} (saving published ids also failed: {})",
                source, save
            ),
            SessionError::Save(err) => write!(f, "failed to save tracker session: {}", err),
        }
    }
}

impl<E> std::error::Error for SessionError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Open(err) | SessionError::Save(err) => Some(err),
            SessionError::Body { source, .. } => Some(source),
        }
    }
}
