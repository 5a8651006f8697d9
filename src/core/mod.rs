pub mod interpreter;
pub mod normalizer;
pub mod orchestrator;

pub use crate::domain::model::{
    Budget, CutoutPayload, ImageAsset, ProviderResponse, RemovalRequest, RemovalResult,
    ResponseBody,
};
pub use crate::domain::ports::ProviderAdapter;
pub use crate::utils::error::Result;
