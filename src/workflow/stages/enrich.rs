use crate::model::{Ingredient, RecipeStep};
use crate::workflow::graph::Stage;
use crate::workflow::state::{AgentState, StatePatch};
use crate::workflow::Workflow;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};

/// Attach images to ingredients that lack an `http` URL. Each ingredient is
/// looked up independently; a miss leaves that one image empty.
pub async fn enrich_ingredients(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(recipe) = state.recipe.as_ref().filter(|r| !r.ingredients.is_empty()) else {
        return StatePatch::default();
    };
    let chain = &flow.collaborators.ingredient_images;
    let missing = recipe.ingredients.iter().filter(|i| !i.has_image()).count();
    info!("{} of {} ingredients need an image", missing, recipe.ingredients.len());

    let enriched: Vec<Ingredient> = stream::iter(recipe.ingredients.iter().cloned())
        .map(|ingredient| async move {
            if ingredient.has_image() {
                return ingredient;
            }
            let image_url = match chain.first(&ingredient.name).await {
                Ok(url) => Some(url),
                Err(unavailable) => {
                    debug!("No image for '{}': {}", ingredient.name, unavailable);
                    None
                }
            };
            Ingredient {
                image_url,
                ..ingredient
            }
        })
        .buffered(flow.concurrency)
        .collect()
        .await;

    StatePatch {
        enriched_ingredients: Some(enriched),
        ..Default::default()
    }
}

/// Attach images to steps that have none, searching by visual query or,
/// failing that, the instruction text
pub async fn enrich_steps(flow: &Workflow, state: &AgentState) -> StatePatch {
    let Some(recipe) = state.recipe.as_ref().filter(|r| !r.steps.is_empty()) else {
        return StatePatch::default();
    };
    let chain = &flow.collaborators.step_images;

    let enriched: Vec<RecipeStep> = stream::iter(recipe.steps.iter().cloned())
        .map(|step| async move {
            if step.has_image() {
                return step;
            }
            let Some(query) = step.image_query().map(str::to_string) else {
                return step;
            };
            match chain.first(&query).await {
                Ok(url) => RecipeStep {
                    image_url: Some(url),
                    ..step
                },
                Err(unavailable) => {
                    debug!("No image for step '{}': {}", query, unavailable);
                    step
                }
            }
        })
        .buffered(flow.concurrency)
        .collect()
        .await;

    StatePatch {
        enriched_steps: Some(enriched),
        ..Default::default()
    }
}

/// Overlay enriched sequences onto the recipe. A sequence whose length does
/// not match the recipe's is discarded.
pub fn merge(state: &AgentState) -> StatePatch {
    let Some(recipe) = state.recipe.as_ref() else {
        return StatePatch::default();
    };
    let mut merged = recipe.clone();
    let mut patch = StatePatch::default();

    if let Some(ingredients) = &state.enriched_ingredients {
        if ingredients.len() == merged.ingredients.len() {
            merged.ingredients = ingredients.clone();
        } else {
            warn!("Discarding enriched ingredients: count changed");
            patch.notes.push(format!("{}: ingredient count changed", Stage::MergeEnrichment));
        }
    }
    if let Some(steps) = &state.enriched_steps {
        if steps.len() == merged.steps.len() {
            merged.steps = steps.clone();
        } else {
            warn!("Discarding enriched steps: count changed");
            patch.notes.push(format!("{}: step count changed", Stage::MergeEnrichment));
        }
    }

    if merged != *recipe {
        patch.recipe = Some(merged);
    }
    patch
}
