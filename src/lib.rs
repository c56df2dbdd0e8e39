//! Recipe extraction from videos, web pages and photos, plus a tool-calling
//! cooking assistant.
//!
//! Most callers go through [`RecipeImporter::builder`]; [`Workflow`] and
//! [`Assistant`] can also be driven directly with custom models and
//! collaborators.

pub mod assistant;
pub mod builder;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod model;
pub mod providers;
pub mod workflow;

pub use assistant::{Assistant, ChatRequest, LoopState, ToolBox, TurnReport};
pub use builder::{ImportResult, InputSource, RecipeImporter, RecipeImporterBuilder};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use model::{AgentResponse, Ingredient, Recipe, RecipeStep, UiType};
pub use providers::{LlmProvider, Models};
pub use workflow::{ExtractionInput, ExtractionReport, Outcome, Workflow};
