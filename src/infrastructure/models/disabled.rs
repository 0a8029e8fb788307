use crate::domain::error::ModelCallError;
use crate::domain::ports::model_provider::ModelProvider;

/// Used when no model is configured. Every call fails, so analyses are stored
/// with a score and a model-call warning but no recommendation.
pub struct DisabledProvider;

#[async_trait::async_trait]
impl ModelProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    fn model(&self) -> &str {
        "none"
    }

    fn rate_limited(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ModelCallError> {
        Err(ModelCallError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_never_answers() {
        let provider = DisabledProvider;
        assert!(!provider.rate_limited());
        assert!(matches!(
            provider.generate("prompt").await,
            Err(ModelCallError::Disabled)
        ));
    }
}
