use crate::model::{Ingredient, Recipe, RecipeStep};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verdict of the metadata sufficiency gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sufficiency {
    Yes,
    No,
}

/// Working memory of one extraction request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub url: String,
    pub video_id: Option<String>,
    pub description: Option<String>,
    pub transcript: Option<String>,
    pub text_content: Option<String>,
    pub video_file_path: Option<PathBuf>,
    pub image_file_path: Option<PathBuf>,
    pub video_thumbnail: Option<String>,
    pub ingredients_detected: Vec<String>,
    pub dish_description: Option<String>,
    pub raw_recipe_text: Option<String>,
    pub recipe: Option<Recipe>,
    pub enriched_ingredients: Option<Vec<Ingredient>>,
    pub enriched_steps: Option<Vec<RecipeStep>>,
    pub metadata_sufficient: Option<Sufficiency>,
    /// Recoverable problems met along the way, in order
    pub notes: Vec<String>,
}

/// Fields a stage changes. Unset fields leave the running state alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub video_id: Option<String>,
    pub description: Option<String>,
    pub transcript: Option<String>,
    pub text_content: Option<String>,
    pub video_file_path: Option<PathBuf>,
    pub image_file_path: Option<PathBuf>,
    pub video_thumbnail: Option<String>,
    pub ingredients_detected: Option<Vec<String>>,
    pub dish_description: Option<String>,
    pub raw_recipe_text: Option<String>,
    pub recipe: Option<Recipe>,
    pub enriched_ingredients: Option<Vec<Ingredient>>,
    pub enriched_steps: Option<Vec<RecipeStep>>,
    pub metadata_sufficient: Option<Sufficiency>,
    pub notes: Vec<String>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        *self == StatePatch::default()
    }

    /// A patch carrying only a note
    pub fn note(message: impl Into<String>) -> Self {
        StatePatch {
            notes: vec![message.into()],
            ..Default::default()
        }
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(message.into());
        self
    }
}

impl AgentState {
    pub fn for_url(url: impl Into<String>) -> Self {
        AgentState {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn for_image(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        AgentState {
            url: path.to_string_lossy().into_owned(),
            image_file_path: Some(path),
            ..Default::default()
        }
    }

    /// Shallow merge: every field the patch sets replaces the running value,
    /// notes accumulate.
    pub fn merge(self, patch: StatePatch) -> AgentState {
        let mut notes = self.notes;
        notes.extend(patch.notes);

        AgentState {
            url: self.url,
            video_id: patch.video_id.or(self.video_id),
            description: patch.description.or(self.description),
            transcript: patch.transcript.or(self.transcript),
            text_content: patch.text_content.or(self.text_content),
            video_file_path: patch.video_file_path.or(self.video_file_path),
            image_file_path: patch.image_file_path.or(self.image_file_path),
            video_thumbnail: patch.video_thumbnail.or(self.video_thumbnail),
            ingredients_detected: patch
                .ingredients_detected
                .unwrap_or(self.ingredients_detected),
            dish_description: patch.dish_description.or(self.dish_description),
            raw_recipe_text: patch.raw_recipe_text.or(self.raw_recipe_text),
            recipe: patch.recipe.or(self.recipe),
            enriched_ingredients: patch.enriched_ingredients.or(self.enriched_ingredients),
            enriched_steps: patch.enriched_steps.or(self.enriched_steps),
            metadata_sufficient: patch.metadata_sufficient.or(self.metadata_sufficient),
            notes,
        }
    }
}
