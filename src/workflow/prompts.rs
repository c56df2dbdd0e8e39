//! Prompt texts for the extraction stages.
//!
//! The texts live in `prompts/*.txt` and are embedded at compile time with
//! `include_str!`, so they can be edited without touching Rust string syntax.

use crate::collaborators::RecipeMatch;

pub const CHEF_SYSTEM: &str = include_str!("prompts/chef_system.txt");
pub const FORMAT_SYSTEM: &str = include_str!("prompts/format_system.txt");
pub const VIDEO_PROMPT: &str = include_str!("prompts/from_video.txt");
pub const CLASSIFY_IMAGE_PROMPT: &str = include_str!("prompts/classify_image.txt");

const VISUAL_QUERY_RULE: &str = include_str!("prompts/visual_query_rule.txt");
const FROM_CANDIDATES: &str = include_str!("prompts/from_candidates.txt");
const FROM_INGREDIENTS_ONLY: &str = include_str!("prompts/from_ingredients_only.txt");
const FROM_DISH: &str = include_str!("prompts/from_dish.txt");
const FROM_TEXT: &str = include_str!("prompts/from_text.txt");
const SUFFICIENCY: &str = include_str!("prompts/sufficiency.txt");
const POLISH: &str = include_str!("prompts/polish.txt");

fn with_visual_query_rule(prompt: &str) -> String {
    format!("{}\n\n{}", prompt.trim(), VISUAL_QUERY_RULE.trim())
}

/// Generation prompt for a detected ingredient list. With candidate matches the
/// model picks the best one; without, it invents a dish from the list alone.
pub fn ingredients_prompt(ingredients: &[String], matches: &[RecipeMatch]) -> String {
    let available = format!("Ingredients available: {}.", ingredients.join(", "));
    if matches.is_empty() {
        format!("{}\n\n{}", available, with_visual_query_rule(FROM_INGREDIENTS_ONLY))
    } else {
        let candidates: Vec<String> = matches.iter().map(RecipeMatch::summary_line).collect();
        format!(
            "{}\n\nPotential Recipes Found:\n{}\n\n{}",
            available,
            candidates.join("\n"),
            with_visual_query_rule(FROM_CANDIDATES)
        )
    }
}

pub fn dish_prompt(description: &str) -> String {
    with_visual_query_rule(&FROM_DISH.replace("{description}", description.trim()))
}

pub fn text_prompt(content: &str) -> String {
    with_visual_query_rule(&FROM_TEXT.replace("{content}", content.trim()))
}

pub fn sufficiency_prompt(content: &str) -> String {
    SUFFICIENCY.replace("{content}", content)
}

pub fn polish_prompt(recipe_json: &str) -> String {
    POLISH.replace("{recipe}", recipe_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_embedded() {
        assert!(CHEF_SYSTEM.contains("expert chef"));
        assert!(VIDEO_PROMPT.contains("Watch this video"));
        assert!(CLASSIFY_IMAGE_PROMPT.contains("\"ingredients\""));
        assert!(FORMAT_SYSTEM.contains("JSON"));
    }

    #[test]
    fn test_ingredients_prompt_variants() {
        let ingredients = vec!["egg".to_string(), "flour".to_string(), "milk".to_string()];

        let creative = ingredients_prompt(&ingredients, &[]);
        assert!(creative.starts_with("Ingredients available: egg, flour, milk."));
        assert!(creative.contains("using ONLY these ingredients"));
        assert!(!creative.contains("Potential Recipes Found"));
        assert!(creative.contains("visual_query"));

        let matches = vec![RecipeMatch {
            id: 7,
            title: "Crepes".to_string(),
            image: None,
            missing: vec!["butter".to_string()],
        }];
        let constrained = ingredients_prompt(&ingredients, &matches);
        assert!(constrained.contains("ID: 7 | Title: Crepes | Image: None | Missing: butter"));
        assert!(constrained.contains("best match"));
        assert!(!constrained.contains("using ONLY these ingredients"));
        assert!(constrained.contains("visual_query"));
    }

    #[test]
    fn test_templates_fill_placeholders() {
        let dish = dish_prompt("  a bowl of pho ");
        assert!(dish.contains("an image of: a bowl of pho."));
        assert!(dish.contains("visual_query"));

        let text = text_prompt("Title: Stew");
        assert!(text.starts_with("Based on: Title: Stew."));
        assert!(!text.contains("{content}"));

        assert!(sufficiency_prompt("Title: Stew").contains("Content:\nTitle: Stew"));
        assert!(polish_prompt("{\"name\":\"x\"}").contains("{\"name\":\"x\"}"));
        assert!(!polish_prompt("{}").contains("{recipe}"));
    }
}
