use crate::adapters::http::{map_send_error, within_budget};
use crate::config::SegmentationConfig;
use crate::domain::model::{Budget, ProviderResponse, RemovalRequest, ResponseBody};
use crate::domain::ports::ProviderAdapter;
use crate::utils::error::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

const PROVIDER: &str = "remove.bg";
const REMAINING_HEADER: &str = "X-Ratelimit-Remaining";

/// 專用去背服務，以 multipart 上傳原始圖片
pub struct RemoveBgAdapter {
    config: SegmentationConfig,
    client: Client,
}

impl RemoveBgAdapter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: SegmentationConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn build_form(&self, request: &RemovalRequest) -> Form {
        let image = &request.image;
        let file_name = format!("image.{}", image.extension());
        let part = match Part::bytes(image.bytes().to_vec())
            .file_name(file_name.clone())
            .mime_str(image.mime_type())
        {
            Ok(part) => part,
            Err(_) => Part::bytes(image.bytes().to_vec()).file_name(file_name),
        };

        Form::new()
            .part("image_file", part)
            .text("size", self.config.size.clone())
            .text("format", self.config.format.clone())
    }
}

/// 402/429 是呼叫端可處理的計費與限流狀況，其他一律視為上游拒絕
fn classify_status(status: StatusCode) -> TransportErrorKind {
    match status {
        StatusCode::PAYMENT_REQUIRED => TransportErrorKind::QuotaExceeded,
        StatusCode::TOO_MANY_REQUESTS => TransportErrorKind::RateLimited,
        _ => TransportErrorKind::UpstreamRejected,
    }
}

#[async_trait]
impl ProviderAdapter for RemoveBgAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.config.credential().is_some()
    }

    async fn call(
        &self,
        request: &RemovalRequest,
        budget: &Budget,
    ) -> Result<ProviderResponse, TransportError> {
        let api_key = self
            .config
            .credential()
            .ok_or_else(|| TransportError::unconfigured(PROVIDER))?;
        let form = self.build_form(request);

        tracing::info!(
            "✂️ Uploading {} bytes to {} ({}), {:?} left in budget",
            request.image.bytes().len(),
            PROVIDER,
            self.config.size,
            budget.remaining()
        );

        within_budget(PROVIDER, budget, async {
            let response = self
                .client
                .post(&self.config.endpoint)
                .header("X-Api-Key", api_key)
                .multipart(form)
                .send()
                .await
                .map_err(|e| map_send_error(PROVIDER, budget, e))?;
            let status = response.status();
            tracing::debug!("{} response status: {}", PROVIDER, status);

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                tracing::error!("❌ {} API error: {} {}", PROVIDER, status, error_text);
                return Err(TransportError::with_status(
                    PROVIDER,
                    classify_status(status),
                    status.as_u16(),
                    &error_text,
                ));
            }

            let remaining_quota = response
                .headers()
                .get(REMAINING_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok());
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_default();

            let bytes = response
                .bytes()
                .await
                .map_err(|e| map_send_error(PROVIDER, budget, e))?;

            let body = if content_type.contains("json") {
                match serde_json::from_slice(&bytes) {
                    Ok(json) => ResponseBody::Json(json),
                    Err(_) => ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
                }
            } else {
                let mime_type = if content_type.starts_with("image/") {
                    content_type
                        .split(';')
                        .next()
                        .unwrap_or("image/png")
                        .trim()
                        .to_string()
                } else {
                    format!("image/{}", self.config.format.replace("jpg", "jpeg"))
                };
                ResponseBody::Image {
                    bytes: bytes.to_vec(),
                    mime_type,
                }
            };

            Ok::<_, TransportError>(ProviderResponse::new(body).with_remaining_quota(remaining_quota))
        })
        .await
    }
}
