use crate::domain::model::{ProviderResponse, ResponseBody};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static EMBEDDED_DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/[^;\s]+;base64,[A-Za-z0-9+/=]+").expect("valid embedded regex")
});

static BARE_BASE64: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+/]{100,}={0,2}$").expect("valid bare base64 regex")
});

const MISS_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Hit(String),
    Miss,
}

/// 一種上游可能使用的圖片編碼方式
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, response: &ProviderResponse) -> Option<String>;
}

/// 直接回傳圖片二進位內容的服務
pub struct BinaryImageBody;

impl ExtractionStrategy for BinaryImageBody {
    fn name(&self) -> &'static str {
        "binary_image_body"
    }

    fn extract(&self, response: &ProviderResponse) -> Option<String> {
        match &response.body {
            ResponseBody::Image { bytes, mime_type } if !bytes.is_empty() => Some(format!(
                "data:{};base64,{}",
                mime_type,
                STANDARD.encode(bytes)
            )),
            _ => None,
        }
    }
}

/// `choices[0].message.images[*].image_url.url`
pub struct GeneratedImagesField;

impl ExtractionStrategy for GeneratedImagesField {
    fn name(&self) -> &'static str {
        "generated_images_field"
    }

    fn extract(&self, response: &ProviderResponse) -> Option<String> {
        let ResponseBody::Json(json) = &response.body else {
            return None;
        };

        first_message(json)?
            .get("images")?
            .as_array()?
            .iter()
            .filter_map(|image| match image {
                Value::String(url) => Some(url.as_str()),
                other => other
                    .pointer("/image_url/url")
                    .or_else(|| other.get("url"))
                    .and_then(Value::as_str),
            })
            .map(str::trim)
            .find(|url| !url.is_empty())
            .map(str::to_string)
    }
}

/// 文字內容中夾帶的 `data:image/...;base64,...`
pub struct EmbeddedDataUri;

impl ExtractionStrategy for EmbeddedDataUri {
    fn name(&self) -> &'static str {
        "embedded_data_uri"
    }

    fn extract(&self, response: &ProviderResponse) -> Option<String> {
        let text = free_text(response)?;
        EMBEDDED_DATA_URI
            .find(&text)
            .map(|m| m.as_str().to_string())
    }
}

/// 整段文字內容就是一個夠長的 base64 字串
pub struct BareBase64Content;

impl ExtractionStrategy for BareBase64Content {
    fn name(&self) -> &'static str {
        "bare_base64_content"
    }

    fn extract(&self, response: &ProviderResponse) -> Option<String> {
        let text = free_text(response)?;
        let token = text.trim();
        BARE_BASE64
            .is_match(token)
            .then(|| format!("data:image/png;base64,{}", token))
    }
}

pub struct ResponseInterpreter {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(BinaryImageBody),
                Box::new(GeneratedImagesField),
                Box::new(EmbeddedDataUri),
                Box::new(BareBase64Content),
            ],
        }
    }
}

impl ResponseInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在現有策略之後追加新的編碼方式
    pub fn with_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn extract(&self, response: &ProviderResponse) -> Extraction {
        for strategy in &self.strategies {
            if let Some(image_ref) = strategy.extract(response) {
                tracing::debug!("Image located via {}", strategy.name());
                return Extraction::Hit(image_ref);
            }
        }

        // 不是錯誤，但要能觀察到上游格式的變化
        tracing::info!("⚠️ Provider response contained no usable image");
        tracing::debug!(
            "📦 Response preview: {}",
            response.preview(MISS_PREVIEW_CHARS)
        );
        Extraction::Miss
    }
}

fn first_message(json: &Value) -> Option<&Value> {
    json.get("choices")?.get(0)?.get("message")
}

/// 取出回應中的自由文字內容
fn free_text(response: &ProviderResponse) -> Option<String> {
    match &response.body {
        ResponseBody::Text(text) => Some(text.clone()),
        ResponseBody::Json(json) => match first_message(json)?.get("content")? {
            Value::String(text) => Some(text.clone()),
            Value::Array(parts) => {
                let joined = parts
                    .iter()
                    .filter_map(|part| match part {
                        Value::String(text) => Some(text.as_str()),
                        other => other.get("text").and_then(Value::as_str),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                (!joined.is_empty()).then_some(joined)
            }
            _ => None,
        },
        ResponseBody::Image { .. } => None,
    }
}
