// Adapters layer: one implementation per upstream provider.

pub mod http;
pub mod openrouter;
pub mod removebg;

pub use openrouter::OpenRouterAdapter;
pub use removebg::RemoveBgAdapter;
