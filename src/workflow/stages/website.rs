use crate::collaborators::{ExtractedRecipe, StepItem, EQUIPMENT_IMAGE_BASE, INGREDIENT_IMAGE_BASE};
use crate::model::{Ingredient, Recipe, RecipeStep};
use crate::workflow::graph::Stage;
use crate::workflow::state::{AgentState, StatePatch};
use crate::workflow::Workflow;
use log::{info, warn};

/// Structured extraction first; on failure hand the page text to the
/// generic text stage.
pub async fn scrape(flow: &Workflow, state: &AgentState) -> StatePatch {
    let reason = match flow.collaborators.recipes.extract(&state.url).await {
        Ok(extracted) if extracted.is_usable() => {
            let recipe = recipe_from_extraction(&state.url, extracted);
            info!(
                "Structured extraction found {} ingredients and {} steps",
                recipe.ingredients.len(),
                recipe.steps.len()
            );
            return StatePatch {
                recipe: Some(recipe),
                ..Default::default()
            };
        }
        Ok(_) => "extraction returned no usable recipe".to_string(),
        Err(e) => e.to_string(),
    };

    warn!("Structured extraction failed for {}: {}. Trying raw scrape", state.url, reason);
    let note = format!("{}: {}", Stage::ScrapeWebsite, reason);

    match flow.collaborators.pages.text(&state.url).await {
        Ok(text) => StatePatch {
            text_content: Some(text),
            ..Default::default()
        }
        .with_note(note),
        Err(e) => StatePatch::note(note).with_note(format!("{} (raw text): {}", Stage::ScrapeWebsite, e)),
    }
}

/// Map an extraction result onto a [`Recipe`] without any model call.
///
/// Step images come from the first ingredient image mentioned in the step,
/// then the first equipment image.
pub fn recipe_from_extraction(url: &str, extracted: ExtractedRecipe) -> Recipe {
    let ingredients = extracted
        .extended_ingredients
        .into_iter()
        .filter(|item| !item.name.trim().is_empty())
        .map(|item| Ingredient {
            amount: format_amount(item.amount, &item.unit),
            image_url: item.image.as_deref().and_then(|image| image_url(INGREDIENT_IMAGE_BASE, image)),
            name: item.name,
        })
        .collect();

    let steps = extracted
        .analyzed_instructions
        .into_iter()
        .flat_map(|set| set.steps)
        .filter(|step| !step.step.trim().is_empty())
        .map(|step| RecipeStep {
            image_url: first_image(&step.ingredients, INGREDIENT_IMAGE_BASE)
                .or_else(|| first_image(&step.equipment, EQUIPMENT_IMAGE_BASE)),
            instruction: step.step.trim().to_string(),
            visual_query: None,
        })
        .collect();

    Recipe {
        name: extracted.title.unwrap_or_else(|| "Unknown Recipe".to_string()),
        steps,
        ingredients,
        total_time: extracted.ready_in_minutes.map(|minutes| format!("{} mins", minutes)),
        source: Some(url.to_string()),
        source_image: extracted.image.filter(|image| !image.is_empty()),
    }
}

fn first_image(items: &[StepItem], base: &str) -> Option<String> {
    items
        .iter()
        .filter_map(|item| item.image.as_deref())
        .find_map(|image| image_url(base, image))
}

fn image_url(base: &str, image: &str) -> Option<String> {
    let image = image.trim();
    if image.is_empty() {
        None
    } else if image.starts_with("http") {
        Some(image.to_string())
    } else {
        Some(format!("{}{}", base, image))
    }
}

/// `2.0, "cups"` -> `"2 cups"`, `0.5, "tsp"` -> `"0.5 tsp"`
fn format_amount(amount: f64, unit: &str) -> String {
    let number = if amount <= 0.0 {
        String::new()
    } else if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{}", (amount * 100.0).round() / 100.0)
    };
    format!("{} {}", number, unit.trim()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ExtendedIngredient, InstructionSet, InstructionStep};

    fn item(image: &str) -> StepItem {
        StepItem {
            image: Some(image.to_string()),
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(2.0, "cups"), "2 cups");
        assert_eq!(format_amount(0.333333, "tsp"), "0.33 tsp");
        assert_eq!(format_amount(3.0, ""), "3");
        assert_eq!(format_amount(0.0, "pinch"), "pinch");
    }

    #[test]
    fn test_recipe_from_extraction_maps_images() {
        let extracted = ExtractedRecipe {
            title: Some("Pancakes".to_string()),
            image: Some("https://blog.example/pancakes.jpg".to_string()),
            ready_in_minutes: Some(20),
            extended_ingredients: vec![
                ExtendedIngredient {
                    name: "flour".to_string(),
                    amount: 1.5,
                    unit: "cups".to_string(),
                    image: Some("flour.png".to_string()),
                },
                ExtendedIngredient {
                    name: "salt".to_string(),
                    amount: 1.0,
                    unit: "pinch".to_string(),
                    image: None,
                },
            ],
            analyzed_instructions: vec![
                InstructionSet {
                    steps: vec![InstructionStep {
                        step: "Whisk the batter.".to_string(),
                        ingredients: vec![StepItem { image: None }, item("egg.png")],
                        equipment: vec![item("whisk.png")],
                    }],
                },
                InstructionSet {
                    steps: vec![
                        InstructionStep {
                            step: "Heat the pan.".to_string(),
                            ingredients: vec![],
                            equipment: vec![item("frying-pan.png")],
                        },
                        InstructionStep {
                            step: "  ".to_string(),
                            ..Default::default()
                        },
                        InstructionStep {
                            step: "Serve.".to_string(),
                            ..Default::default()
                        },
                    ],
                },
            ],
        };

        let recipe = recipe_from_extraction("https://blog.example/pancakes", extracted);
        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.total_time.as_deref(), Some("20 mins"));
        assert_eq!(recipe.source.as_deref(), Some("https://blog.example/pancakes"));
        assert_eq!(recipe.source_image.as_deref(), Some("https://blog.example/pancakes.jpg"));

        assert_eq!(recipe.ingredients[0].amount, "1.5 cups");
        assert_eq!(
            recipe.ingredients[0].image_url.as_deref(),
            Some("https://img.spoonacular.com/ingredients_100x100/flour.png")
        );
        assert_eq!(recipe.ingredients[1].image_url, None);

        assert_eq!(recipe.steps.len(), 3);
        assert_eq!(
            recipe.steps[0].image_url.as_deref(),
            Some("https://img.spoonacular.com/ingredients_100x100/egg.png")
        );
        assert_eq!(
            recipe.steps[1].image_url.as_deref(),
            Some("https://img.spoonacular.com/equipment_100x100/frying-pan.png")
        );
        assert_eq!(recipe.steps[2].image_url, None);
        assert_eq!(recipe.steps[2].instruction, "Serve.");
    }
}
