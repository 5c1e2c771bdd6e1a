//! Error types for the hook installer and the translation client.

use thiserror::Error;

/// Errors raised while installing the low-level mouse hook.
#[derive(Error, Debug)]
pub enum HookError {
    /// The OS refused the hook; `code` is the `GetLastError` value.
    #[error("failed to install mouse hook (os error {code})")]
    Install { code: u32 },

    /// No low-level hook support on this platform.
    #[error("low-level mouse hooks are not supported on this platform")]
    Unsupported,

    /// Another installer already owns the process-wide hook.
    #[error("a mouse hook is already active in this process")]
    AlreadyActive,

    /// The hook thread died or never reported back.
    #[error("hook thread failed to start: {0}")]
    ThreadStart(String),
}

/// Errors raised by the translation client.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service answered with an empty `trans_result`.
    #[error("no translation returned")]
    EmptyResult,

    /// The service answered with `error_code`/`error_msg`.
    #[error("translation service error {code}: {message}")]
    Api { code: String, message: String },

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// Shown when the service returns nothing for the query.
pub const EMPTY_RESULT_TEXT: &str = "未搜索到结果";

impl TranslateError {
    /// Text shown in the window in place of a translation.
    pub fn fallback_text(&self) -> String {
        match self {
            TranslateError::EmptyResult => EMPTY_RESULT_TEXT.to_string(),
            TranslateError::Network(_) => "翻译请求失败，请检查网络连接".to_string(),
            TranslateError::Parse(_) => "翻译结果解析失败".to_string(),
            TranslateError::Api { code, message } => format!("翻译服务错误 {code}: {message}"),
            TranslateError::Url(_) => "翻译服务地址无效".to_string(),
        }
    }
}

pub type TranslateResult<T> = Result<T, TranslateError>;
