//! Guide generation for QuestGuide.
//!
//! This crate provides:
//! - [`TextModel`]: the generative model seam, with [`OpenRouterModel`]
//! - [`PromptBuilder`]: prompt construction, including special categories
//! - [`segment`]: splitting a free-text response into a [`Guide`](questguide_shared::Guide)
//! - [`GuideGenerator`]: bounded-retry generation tying the above together

pub mod generator;
pub mod model;
pub mod prompt;
pub mod segment;

pub use generator::GuideGenerator;
pub use model::{OpenRouterModel, TextModel};
pub use prompt::{PromptBuilder, SpecialCategory};
pub use segment::{Segmentation, Strategy, segment};
