use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// 預設 MIME 類型，無法判斷時使用
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// 正規化後的輸入圖片，建立後不再變動
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    bytes: Vec<u8>,
    mime_type: String,
    encoded: String,
}

impl ImageAsset {
    pub(crate) fn new(bytes: Vec<u8>, mime_type: String, encoded: String) -> Self {
        Self {
            bytes,
            mime_type,
            encoded,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// 原始 base64 文字，未重新編碼
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// 例如 `image/png` -> `png`，`image/svg+xml` -> `svg`
    pub fn extension(&self) -> &str {
        let subtype = self
            .mime_type
            .strip_prefix("image/")
            .unwrap_or("jpeg");
        subtype.split('+').next().unwrap_or(subtype)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encoded)
    }
}

/// 呼叫端送來的 JSON 內容
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoutPayload {
    pub image_base64: Option<String>,
    #[serde(alias = "targetWord")]
    pub subject_hint: Option<String>,
    #[serde(alias = "targetWordCn")]
    pub subject_hint_localized: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemovalRequest {
    pub image: ImageAsset,
    pub subject_hint: Option<String>,
    pub subject_hint_localized: Option<String>,
}

/// 上游回應的內容，只有 Interpreter 會解讀
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
    Image { bytes: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub body: ResponseBody,
    pub remaining_quota: Option<i64>,
}

impl ProviderResponse {
    pub fn new(body: ResponseBody) -> Self {
        Self {
            body,
            remaining_quota: None,
        }
    }

    pub fn with_remaining_quota(mut self, remaining_quota: Option<i64>) -> Self {
        self.remaining_quota = remaining_quota;
        self
    }

    /// 診斷用的截斷預覽
    pub fn preview(&self, max_chars: usize) -> String {
        match &self.body {
            ResponseBody::Json(value) => value.to_string().chars().take(max_chars).collect(),
            ResponseBody::Text(text) => text.chars().take(max_chars).collect(),
            ResponseBody::Image { bytes, mime_type } => {
                format!("<{} bytes of {}>", bytes.len(), mime_type)
            }
        }
    }
}

/// 對外回應的封包
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalResult {
    pub success: bool,
    #[serde(rename = "imageUrl")]
    pub image_ref: String,
    #[serde(rename = "isSimulated")]
    pub simulated: bool,
    #[serde(rename = "remainingCredits", skip_serializing_if = "Option::is_none")]
    pub remaining_quota: Option<i64>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl RemovalResult {
    pub fn generated(image_ref: String, remaining_quota: Option<i64>) -> Self {
        Self {
            success: true,
            image_ref,
            simulated: false,
            remaining_quota,
            error_detail: None,
        }
    }

    /// 回傳原圖並標記為模擬結果
    pub fn fallback(original: &str, error_detail: Option<String>) -> Self {
        Self {
            success: true,
            image_ref: original.to_string(),
            simulated: true,
            remaining_quota: None,
            error_detail,
        }
    }
}

/// 單次 Adapter 呼叫的時間預算
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    limit: Duration,
    deadline: Instant,
}

impl Budget {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            deadline: Instant::now() + limit,
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
