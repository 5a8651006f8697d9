use crate::domain::model::Budget;
use crate::utils::error::TransportError;
use std::future::Future;

/// 在預算內完成整個上游呼叫（送出與讀取回應）
///
/// 逾時時 future 會被 drop，進行中的連線隨之釋放。
pub async fn within_budget<F, T>(
    provider: &'static str,
    budget: &Budget,
    call: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout_at(budget.deadline(), call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("❌ {} request timed out after {:?}", provider, budget.limit());
            Err(TransportError::timeout(provider, budget.limit()))
        }
    }
}

pub fn map_send_error(provider: &'static str, budget: &Budget, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(provider, budget.limit())
    } else {
        tracing::error!("❌ {} request failed: {}", provider, err);
        TransportError::unreachable(provider, &err)
    }
}
