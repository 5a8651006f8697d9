use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CutoutError {
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Upstream quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    #[error("Upstream rate limited: {detail}")]
    RateLimited { detail: String },

    #[error("Internal fault: {message}")]
    InternalFault { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CutoutError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalFault {
            message: message.into(),
        }
    }

    /// 對外回應使用的 HTTP 狀態碼
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError { .. } => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 呼叫端可據以處理的錯誤代碼，僅配額與限流錯誤有
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::QuotaExceeded { .. } => Some("QUOTA_EXCEEDED"),
            Self::RateLimited { .. } => Some("RATE_LIMITED"),
            _ => None,
        }
    }

    /// 可以直接回給呼叫端的訊息，內部錯誤細節不外洩
    pub fn public_message(&self) -> String {
        match self {
            Self::ValidationError { message } => message.clone(),
            Self::QuotaExceeded { .. } => "Background removal quota exhausted".to_string(),
            Self::RateLimited { .. } => {
                "Too many requests, please try again later".to_string()
            }
            _ => "Background removal failed".to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub type Result<T> = std::result::Result<T, CutoutError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    UpstreamRejected,
    Unreachable,
    QuotaExceeded,
    RateLimited,
}

/// Adapter 呼叫上游失敗，由 Orchestrator 決定降級或回報
#[derive(Error, Debug, Clone)]
#[error("{provider} transport failure ({kind:?}): {message}")]
pub struct TransportError {
    pub provider: &'static str,
    pub kind: TransportErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn timeout(provider: &'static str, budget: std::time::Duration) -> Self {
        Self {
            provider,
            kind: TransportErrorKind::Timeout,
            status: None,
            message: format!("no response within {:?}", budget),
        }
    }

    pub fn unreachable(provider: &'static str, err: &reqwest::Error) -> Self {
        Self {
            provider,
            kind: TransportErrorKind::Unreachable,
            status: None,
            message: err.to_string(),
        }
    }

    pub fn unconfigured(provider: &'static str) -> Self {
        Self {
            provider,
            kind: TransportErrorKind::Unreachable,
            status: None,
            message: "no credential configured".to_string(),
        }
    }

    /// 非 2xx 回應，一律視為上游拒絕
    pub fn rejected(provider: &'static str, status: u16, body: &str) -> Self {
        Self::with_status(provider, TransportErrorKind::UpstreamRejected, status, body)
    }

    pub fn with_status(
        provider: &'static str,
        kind: TransportErrorKind,
        status: u16,
        body: &str,
    ) -> Self {
        Self {
            provider,
            kind,
            status: Some(status),
            message: body.chars().take(512).collect(),
        }
    }

    /// 逾時、被拒與連線失敗都降級為回傳原圖
    pub fn degrades_softly(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout
                | TransportErrorKind::UpstreamRejected
                | TransportErrorKind::Unreachable
        )
    }

    /// 回給呼叫端的簡短說明，不含上游回應內容
    pub fn summary(&self) -> String {
        match (self.kind, self.status) {
            (TransportErrorKind::Timeout, _) => format!("{} request timed out", self.provider),
            (_, Some(status)) => format!("{} API call failed: {}", self.provider, status),
            _ => format!("{} API unreachable", self.provider),
        }
    }
}

impl From<TransportError> for CutoutError {
    fn from(err: TransportError) -> Self {
        match err.kind {
            TransportErrorKind::QuotaExceeded => CutoutError::QuotaExceeded {
                detail: err.to_string(),
            },
            TransportErrorKind::RateLimited => CutoutError::RateLimited {
                detail: err.to_string(),
            },
            _ => CutoutError::InternalFault {
                message: err.to_string(),
            },
        }
    }
}
