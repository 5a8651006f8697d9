use crate::adapters::http::{map_send_error, within_budget};
use crate::config::GenerativeConfig;
use crate::domain::model::{Budget, ProviderResponse, RemovalRequest, ResponseBody};
use crate::domain::ports::ProviderAdapter;
use crate::utils::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

const PROVIDER: &str = "openrouter";

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub modalities: Vec<&'static str>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// 透過 chat completion 介面呼叫生成式影像模型
pub struct OpenRouterAdapter {
    config: GenerativeConfig,
    client: Client,
}

impl OpenRouterAdapter {
    pub fn new(config: GenerativeConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: GenerativeConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn build_request(&self, request: &RemovalRequest) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            modalities: vec!["image", "text"],
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: build_prompt(
                            request.subject_hint.as_deref(),
                            request.subject_hint_localized.as_deref(),
                        ),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.to_data_uri(),
                        },
                    },
                ],
            }],
        }
    }
}

/// 去背指令，有提示詞時指名要保留的主體
pub fn build_prompt(subject_hint: Option<&str>, subject_hint_localized: Option<&str>) -> String {
    let subject = subject_hint
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(|hint| format!("the {}", hint))
        .unwrap_or_else(|| "the main object".to_string());

    let localized = subject_hint_localized
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(|hint| format!(" ({})", hint))
        .unwrap_or_default();

    format!(
        "Remove the background and keep only {}{}. \
         Do not change the subject itself: keep its pose, colors and proportions exactly as they are. \
         Add a white outline and output the result as a transparent PNG sticker.",
        subject, localized
    )
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
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
        let body = self.build_request(request);

        tracing::info!(
            "✂️ Requesting sticker from {} ({}), {:?} left in budget",
            PROVIDER,
            self.config.model,
            budget.remaining()
        );

        within_budget(PROVIDER, budget, async {
            let mut http_request = self
                .client
                .post(&self.config.endpoint)
                .bearer_auth(api_key)
                .json(&body);
            if let Some(site_url) = &self.config.site_url {
                http_request = http_request.header("HTTP-Referer", site_url);
            }

            let response = http_request
                .send()
                .await
                .map_err(|e| map_send_error(PROVIDER, budget, e))?;
            let status = response.status();
            tracing::debug!("{} response status: {}", PROVIDER, status);

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                tracing::error!("❌ {} API error: {} {}", PROVIDER, status, error_text);
                return Err(TransportError::rejected(
                    PROVIDER,
                    status.as_u16(),
                    &error_text,
                ));
            }

            let text = response
                .text()
                .await
                .map_err(|e| map_send_error(PROVIDER, budget, e))?;
            let body = match serde_json::from_str(&text) {
                Ok(json) => ResponseBody::Json(json),
                Err(_) => ResponseBody::Text(text),
            };
            Ok::<_, TransportError>(ProviderResponse::new(body))
        })
        .await
    }
}
