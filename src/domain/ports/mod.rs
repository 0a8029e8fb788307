pub mod analysis_repository;
pub mod cache_store;
pub mod clock;
pub mod model_provider;
pub mod prompt_adapter;
pub mod source_adapter;
