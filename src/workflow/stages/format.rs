use crate::error::Result;
use crate::model::{recipe_schema, Recipe};
use crate::providers::{LlmRequest, Message};
use crate::workflow::graph::Stage;
use crate::workflow::prompts;
use crate::workflow::stages::contain;
use crate::workflow::state::{AgentState, StatePatch};
use crate::workflow::Workflow;
use log::{debug, info, warn};

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Fill `source` and `source_image` from the request unless the model set them
fn inject_source(mut recipe: Recipe, state: &AgentState) -> Recipe {
    if blank(&recipe.source) && !state.url.is_empty() {
        recipe.source = Some(state.url.clone());
    }
    if blank(&recipe.source_image) {
        if let Some(thumbnail) = state.video_thumbnail.clone() {
            recipe.source_image = Some(thumbnail);
        }
    }
    recipe
}

/// Free text to a schema-validated recipe
pub async fn format_recipe(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(raw) = state
        .raw_recipe_text
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
    else {
        return StatePatch::default();
    };
    contain(Stage::FormatRecipe, structure(flow, raw, state).await)
}

async fn structure(flow: &Workflow, raw: &str, state: &AgentState) -> Result<StatePatch> {
    let request = LlmRequest::prompt(prompts::FORMAT_SYSTEM.trim(), raw).with_schema("recipe", recipe_schema());
    let response = flow.models.worker.complete(&request).await?;
    debug!("Formatted recipe: {}", response.content);

    let recipe = inject_source(Recipe::from_model_json(&response.content)?, state);
    info!(
        "Formatted '{}' with {} ingredients and {} steps",
        recipe.name,
        recipe.ingredients.len(),
        recipe.steps.len()
    );
    Ok(StatePatch {
        recipe: Some(recipe),
        ..Default::default()
    })
}

/// Prose cleanup. Any failure or structural change leaves the recipe as it was.
pub async fn polish_recipe(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(recipe) = state.recipe.as_ref() else {
        return StatePatch::default();
    };
    contain(Stage::PolishRecipe, polish(flow, recipe).await)
}

async fn polish(flow: &Workflow, recipe: &Recipe) -> Result<StatePatch> {
    let recipe_json = serde_json::to_string(recipe)?;
    let request = LlmRequest::new(vec![Message::user(prompts::polish_prompt(&recipe_json))]);
    let response = flow.models.refiner.complete(&request).await?;
    let polished = Recipe::from_model_json(&response.content)?;

    match recipe.with_polished_prose(&polished) {
        Some(recipe) => Ok(StatePatch {
            recipe: Some(recipe),
            ..Default::default()
        }),
        None => {
            warn!("Polish changed more than prose, keeping the original");
            Ok(StatePatch::note(format!(
                "{}: polished copy altered structure",
                Stage::PolishRecipe
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_source_never_overwrites() {
        let state = AgentState {
            video_thumbnail: Some("https://img.youtube.com/vi/x/hqdefault.jpg".to_string()),
            ..AgentState::for_url("https://youtu.be/x")
        };

        let filled = inject_source(Recipe::default(), &state);
        assert_eq!(filled.source.as_deref(), Some("https://youtu.be/x"));
        assert_eq!(
            filled.source_image.as_deref(),
            Some("https://img.youtube.com/vi/x/hqdefault.jpg")
        );

        let own = Recipe {
            source: Some("https://blog.example/original".to_string()),
            source_image: Some("https://blog.example/hero.jpg".to_string()),
            ..Default::default()
        };
        let kept = inject_source(own.clone(), &state);
        assert_eq!(kept, own);

        let blank_source = Recipe {
            source: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            inject_source(blank_source, &state).source.as_deref(),
            Some("https://youtu.be/x")
        );
    }
}
