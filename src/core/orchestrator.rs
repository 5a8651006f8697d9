use crate::core::interpreter::{Extraction, ResponseInterpreter};
use crate::core::normalizer::normalize;
use crate::domain::model::{Budget, CutoutPayload, RemovalRequest, RemovalResult};
use crate::domain::ports::ProviderAdapter;
use crate::utils::error::{CutoutError, Result};
use std::time::Duration;

/// 單一請求的處理階段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Invoking,
    Interpreting,
    Done,
}

/// 擁有單次請求的時間預算，呼叫一個 Adapter 並決定對外回應
///
/// 上游的逾時、拒絕與格式不符都降級為回傳原圖 (`isSimulated = true`)；
/// 只有輸入錯誤、配額/限流與本地錯誤會成為非 200 回應。
pub struct Orchestrator<A: ProviderAdapter> {
    adapter: A,
    interpreter: ResponseInterpreter,
    timeout: Duration,
}

impl<A: ProviderAdapter> Orchestrator<A> {
    pub fn new(adapter: A, timeout: Duration) -> Self {
        Self {
            adapter,
            interpreter: ResponseInterpreter::default(),
            timeout,
        }
    }

    pub fn with_interpreter(mut self, interpreter: ResponseInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(name = "cutout", skip_all, fields(provider = self.adapter.name()))]
    pub async fn remove_background(&self, payload: CutoutPayload) -> Result<RemovalResult> {
        trace_stage(Stage::Validating);
        let original = payload
            .image_base64
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| CutoutError::validation("Missing image data"))?;

        if !self.adapter.is_configured() {
            tracing::info!(
                "⚠️ {} credential not configured, returning original image",
                self.adapter.name()
            );
            trace_stage(Stage::Done);
            return Ok(RemovalResult::fallback(original, None));
        }

        let request = RemovalRequest {
            image: normalize(original)?,
            subject_hint: clean_hint(payload.subject_hint),
            subject_hint_localized: clean_hint(payload.subject_hint_localized),
        };

        trace_stage(Stage::Invoking);
        let budget = Budget::new(self.timeout);
        let response = match self.adapter.call(&request, &budget).await {
            Ok(response) => response,
            Err(err) if err.degrades_softly() => {
                tracing::warn!("⚠️ {}, returning original image", err);
                trace_stage(Stage::Done);
                return Ok(RemovalResult::fallback(original, Some(err.summary())));
            }
            Err(err) => {
                tracing::warn!("🚫 {}", err);
                trace_stage(Stage::Done);
                return Err(err.into());
            }
        };

        trace_stage(Stage::Interpreting);
        let result = match self.interpreter.extract(&response) {
            Extraction::Hit(image_ref) => {
                tracing::info!("✅ Sticker generated by {}", self.adapter.name());
                RemovalResult::generated(image_ref, response.remaining_quota)
            }
            Extraction::Miss => RemovalResult::fallback(
                original,
                Some(format!("{} returned no usable image", self.adapter.name())),
            ),
        };

        trace_stage(Stage::Done);
        Ok(result)
    }
}

fn trace_stage(stage: Stage) {
    tracing::debug!(?stage, "stage transition");
}

fn clean_hint(hint: Option<String>) -> Option<String> {
    hint.map(|h| h.trim().to_string()).filter(|h| !h.is_empty())
}
