use crate::error::{Error, Result};
use crate::workflow::graph::Stage;
use crate::workflow::prompts;
use crate::workflow::stages::contain;
use crate::workflow::state::{AgentState, StatePatch};
use crate::workflow::Workflow;
use log::{debug, info, warn};

/// Free-text generation with the chef persona. The result is prose, never a
/// structured recipe.
async fn generate(flow: &Workflow, prompt: String) -> Result<StatePatch> {
    let text = flow.models.orchestrator.generate(prompts::CHEF_SYSTEM.trim(), &prompt).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Schema("generation returned no text".to_string()));
    }
    debug!("Generated recipe text ({} chars)", text.len());
    Ok(StatePatch {
        raw_recipe_text: Some(text.to_string()),
        ..Default::default()
    })
}

pub async fn from_ingredients(flow: &Workflow, state: &AgentState) -> StatePatch {
    if state.ingredients_detected.is_empty() {
        return StatePatch::default();
    }

    let matches = match flow
        .collaborators
        .recipes
        .find_by_ingredients(&state.ingredients_detected)
        .await
    {
        Ok(matches) => matches,
        Err(e) => {
            warn!("Ingredient search failed, generating without candidates: {}", e);
            Vec::new()
        }
    };
    info!(
        "{} candidate recipe(s) for {}",
        matches.len(),
        state.ingredients_detected.join(", ")
    );

    let prompt = prompts::ingredients_prompt(&state.ingredients_detected, &matches);
    contain(Stage::RecipeFromIngredients, generate(flow, prompt).await)
}

pub async fn from_dish(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(description) = state
        .dish_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    else {
        return StatePatch::note(format!("{}: nothing recognised in the image", Stage::RecipeFromDish));
    };
    contain(Stage::RecipeFromDish, generate(flow, prompts::dish_prompt(description)).await)
}

/// Content handed to the generic text stage: scraped or gated text wins,
/// otherwise whatever transcript and description are known
fn text_source(state: &AgentState) -> Option<String> {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    if let Some(text) = present(&state.text_content) {
        return Some(format!("Content: {}", text));
    }
    let transcript = present(&state.transcript);
    let description = present(&state.description);
    if transcript.is_none() && description.is_none() {
        return None;
    }
    Some(format!(
        "Transcript: {}\nDescription: {}",
        transcript.unwrap_or("None"),
        description.unwrap_or("None")
    ))
}

pub async fn from_text(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(content) = text_source(state) else {
        return StatePatch::note(format!("{}: no text to work from", Stage::ExtractFromText));
    };
    contain(Stage::ExtractFromText, generate(flow, prompts::text_prompt(&content)).await)
}
