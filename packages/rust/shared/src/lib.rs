//! Shared types, error model, and configuration for QuestGuide.
//!
//! This crate is the foundation depended on by all other QuestGuide crates.
//! It provides:
//! - [`QuestGuideError`]: the unified error type
//! - Domain types ([`Quest`], [`Guide`], [`ImageSet`], [`EnrichmentResult`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CacheSection, GeneratorConfig, GeneratorSection, ImageConfig,
    ImagesSection, OpenRouterConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{QuestGuideError, Result};
pub use types::{
    EnrichmentResult, Guide, ImageKind, ImageRef, ImageSet, ImageSource, ItemRef, Location,
    Objective, Quest, ReputationDelta, RewardItem, Rewards, ScoredImageRef, TraderRequirement,
};
