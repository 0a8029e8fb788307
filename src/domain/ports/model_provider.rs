use crate::domain::error::ModelCallError;
use async_trait::async_trait;

/// A text-generation backend. One provider name shares one rate-limit budget.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Whether calls count against the provider's rate limit. Local providers
    /// that never reach a remote service return false.
    fn rate_limited(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelCallError>;
}
