use crate::domain::model::{Budget, ProviderResponse, RemovalRequest};
use crate::utils::error::TransportError;
use async_trait::async_trait;

/// 單一上游服務的整合
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// 未設定憑證時 Orchestrator 直接回傳原圖，不發出網路請求
    fn is_configured(&self) -> bool;

    async fn call(
        &self,
        request: &RemovalRequest,
        budget: &Budget,
    ) -> std::result::Result<ProviderResponse, TransportError>;
}
