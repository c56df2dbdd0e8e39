use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;

/// A structured recipe, the canonical output of the extraction workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub steps: Vec<RecipeStep>,
    pub ingredients: Vec<Ingredient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub instruction: String,
    /// Short keyword phrase used only to drive image search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_query: Option<String>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, amount: impl Into<String>) -> Self {
        Ingredient {
            name: name.into(),
            amount: amount.into(),
            image_url: None,
        }
    }

    /// True when the ingredient already carries a usable `http` image URL
    pub fn has_image(&self) -> bool {
        self.image_url
            .as_deref()
            .is_some_and(|url| url.contains("http"))
    }
}

impl RecipeStep {
    pub fn new(instruction: impl Into<String>) -> Self {
        RecipeStep {
            instruction: instruction.into(),
            visual_query: None,
            image_url: None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Query used for step image search: the visual query when present, else the instruction
    pub fn image_query(&self) -> Option<&str> {
        self.visual_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .or_else(|| Some(self.instruction.trim()).filter(|q| !q.is_empty()))
    }
}

impl Recipe {
    /// Parse structured model output into a recipe, rejecting anything off-schema
    pub fn from_model_json(content: &str) -> Result<Recipe> {
        let recipe: Recipe = serde_json::from_str(strip_code_fences(content))
            .map_err(|e| Error::Schema(format!("recipe: {e}")))?;
        recipe.validate()
    }

    pub fn validate(self) -> Result<Recipe> {
        if self.name.trim().is_empty() {
            return Err(Error::Schema("recipe name is empty".to_string()));
        }
        if let Some(step) = self.steps.iter().find(|s| s.instruction.trim().is_empty()) {
            return Err(Error::Schema(format!(
                "step without instruction (visual query {:?})",
                step.visual_query
            )));
        }
        if self.ingredients.iter().any(|i| i.name.trim().is_empty()) {
            return Err(Error::Schema("ingredient without name".to_string()));
        }
        Ok(self)
    }

    /// Overlay the prose of a polished copy onto this recipe.
    ///
    /// Only the recipe name, step instructions and ingredient name casing are taken from
    /// `polished`. Returns `None` when the polished copy changed structure, measurements,
    /// ingredient identity or `total_time`.
    pub fn with_polished_prose(&self, polished: &Recipe) -> Option<Recipe> {
        if polished.steps.len() != self.steps.len()
            || polished.ingredients.len() != self.ingredients.len()
            || polished.total_time != self.total_time
            || polished.name.trim().is_empty()
        {
            return None;
        }

        let mut ingredients = Vec::with_capacity(self.ingredients.len());
        for (original, new) in self.ingredients.iter().zip(&polished.ingredients) {
            if new.amount.trim() != original.amount.trim()
                || identity_key(&new.name) != identity_key(&original.name)
            {
                return None;
            }
            ingredients.push(Ingredient {
                name: new.name.trim().to_string(),
                ..original.clone()
            });
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for (original, new) in self.steps.iter().zip(&polished.steps) {
            if new.instruction.trim().is_empty() {
                return None;
            }
            steps.push(RecipeStep {
                instruction: new.instruction.trim().to_string(),
                ..original.clone()
            });
        }

        Some(Recipe {
            name: polished.name.trim().to_string(),
            steps,
            ingredients,
            ..self.clone()
        })
    }
}

fn identity_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Remove a surrounding markdown code fence (```json ... ```) from model output
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// JSON schema for [`Recipe`], used for structured-output requests
pub fn recipe_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": "Name of the recipe"},
            "steps": {
                "type": "array",
                "description": "List of cooking steps",
                "items": {
                    "type": "object",
                    "properties": {
                        "instruction": {"type": "string", "description": "The cooking instruction text"},
                        "visual_query": {"type": "string", "description": "A short 3-5 word keyword search query to find an image for this step, e.g. 'chopped onions on board'"},
                        "imageUrl": {"type": "string", "description": "URL of the step image"}
                    },
                    "required": ["instruction", "visual_query"]
                }
            },
            "ingredients": {
                "type": "array",
                "description": "List of ingredients",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Name of the ingredient, e.g. 'onions'"},
                        "amount": {"type": "string", "description": "Quantity and unit, e.g. '1 cup'"},
                        "imageUrl": {"type": "string", "description": "URL of the ingredient image"}
                    },
                    "required": ["name", "amount"]
                }
            },
            "total_time": {"type": "string", "description": "Total preparation and cooking time, e.g. '45 mins'"},
            "source": {"type": "string", "description": "URL of the original recipe source"},
            "source_image": {"type": "string", "description": "URL of the source image or thumbnail"}
        },
        "required": ["name", "steps", "ingredients"]
    })
}

/// Kind of widget the client renders under the chat bubble
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiType {
    RecipeList,
    IngredientList,
    VideoList,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCard {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ready_in_minutes: Option<i64>,
    #[serde(default)]
    pub missed_ingredient_count: Option<i64>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeListPayload {
    pub items: Vec<RecipeCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientListPayload {
    pub items: Vec<IngredientItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoListPayload {
    pub items: Vec<VideoItem>,
}

/// Terminal output of an assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Text shown and spoken to the user; never carries URLs
    pub chat_bubble: String,
    #[serde(default)]
    pub ui_type: UiType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_data: Option<RecipeListPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_data: Option<IngredientListPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_data: Option<VideoListPayload>,
}

impl AgentResponse {
    pub fn text(chat_bubble: impl Into<String>) -> Self {
        AgentResponse {
            chat_bubble: chat_bubble.into(),
            ui_type: UiType::None,
            recipe_data: None,
            ingredient_data: None,
            video_data: None,
        }
    }

    /// Parse structured model output, check payload consistency and scrub URLs
    /// out of the chat bubble.
    pub fn from_model_json(content: &str) -> Result<AgentResponse> {
        let response: AgentResponse = serde_json::from_str(strip_code_fences(content))
            .map_err(|e| Error::Schema(format!("agent response: {e}")))?;
        response.validate()
    }

    pub fn validate(mut self) -> Result<AgentResponse> {
        let populated = (
            self.recipe_data.is_some(),
            self.ingredient_data.is_some(),
            self.video_data.is_some(),
        );
        let expected = match self.ui_type {
            UiType::RecipeList => (true, false, false),
            UiType::IngredientList => (false, true, false),
            UiType::VideoList => (false, false, true),
            UiType::None => (false, false, false),
        };
        if populated != expected {
            return Err(Error::Schema(format!(
                "ui_type {:?} does not match populated payloads {:?}",
                self.ui_type, populated
            )));
        }

        self.chat_bubble = strip_urls(&self.chat_bubble);
        if self.chat_bubble.is_empty() {
            if self.ui_type == UiType::None {
                return Err(Error::Schema("chat_bubble is empty".to_string()));
            }
            self.chat_bubble = "Here's what I found!".to_string();
        }
        Ok(self)
    }
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r#"(?i)\b(?:https?://|www\.)[^\s)\]>]*[^\s)\]>.,!?;:'"]"#,
            // host and path without a scheme, e.g. youtu.be/abc123
            r#"|\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}/(?:[^\s)\]>]*[^\s)\]>.,!?;:'"])?"#,
        ))
        .expect("static regex")
    })
}

fn markdown_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("static regex"))
}

/// True when `text` contains anything that looks like a URL
pub fn contains_url(text: &str) -> bool {
    url_pattern().is_match(text)
}

/// Remove URLs (bare or as markdown links) from conversational text
pub fn strip_urls(text: &str) -> String {
    let without_links = markdown_link_pattern().replace_all(text, "$1");
    let without_urls = url_pattern().replace_all(&without_links, "");
    without_urls
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .replace(" .", ".")
        .replace(" ,", ",")
        .replace("()", "")
        .trim()
        .to_string()
}

/// JSON schema for [`AgentResponse`], used for structured-output requests
pub fn agent_response_schema() -> Value {
    let recipe_card = json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer", "description": "The unique ID of the recipe"},
            "title": {"type": "string", "description": "The name of the dish"},
            "image_url": {"type": "string", "description": "URL of the recipe image"},
            "ready_in_minutes": {"type": "integer", "description": "Preparation time in minutes"},
            "missed_ingredient_count": {"type": "integer", "description": "Number of missing ingredients"},
            "source_url": {"type": "string", "description": "URL to the original recipe source"}
        },
        "required": ["id", "title"]
    });
    let ingredient_item = json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string", "description": "Name of the ingredient"},
            "image": {"type": "string", "description": "URL of the ingredient image"},
            "amount": {"type": "string", "description": "Amount needed or available, e.g. '2 cups'"}
        },
        "required": ["id", "name"]
    });
    let video_item = json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "url": {"type": "string", "description": "YouTube or video URL"},
            "thumbnail": {"type": "string"}
        },
        "required": ["title", "url"]
    });
    let list = |items: Value| {
        json!({
            "type": "object",
            "properties": {"items": {"type": "array", "items": items}},
            "required": ["items"]
        })
    };

    json!({
        "type": "object",
        "properties": {
            "chat_bubble": {"type": "string", "description": "The friendly text response to the user. Never include URLs."},
            "ui_type": {
                "type": "string",
                "enum": ["recipe_list", "ingredient_list", "video_list", "none"],
                "description": "The type of UI widget to display below the text."
            },
            "recipe_data": list(recipe_card),
            "ingredient_data": list(ingredient_item),
            "video_data": list(video_item)
        },
        "required": ["chat_bubble", "ui_type"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe() -> Recipe {
        Recipe {
            name: "pancakes".to_string(),
            steps: vec![
                RecipeStep {
                    instruction: "whisk the eggs".to_string(),
                    visual_query: Some("whisking eggs".to_string()),
                    image_url: Some("https://img.example.com/whisk.jpg".to_string()),
                },
                RecipeStep::new("fry in butter"),
            ],
            ingredients: vec![
                Ingredient::new("egg", "2"),
                Ingredient {
                    image_url: Some("https://img.example.com/flour.jpg".to_string()),
                    ..Ingredient::new("flour", "1 cup")
                },
            ],
            total_time: Some("20 mins".to_string()),
            source: Some("https://example.com/pancakes".to_string()),
            source_image: None,
        }
    }

    #[test]
    fn test_recipe_wire_names() {
        let json = serde_json::to_value(sample_recipe()).unwrap();
        assert_eq!(
            json["ingredients"][1]["imageUrl"],
            "https://img.example.com/flour.jpg"
        );
        assert_eq!(json["steps"][0]["visual_query"], "whisking eggs");
        assert!(json.get("source_image").is_none());
    }

    #[test]
    fn test_from_model_json_strips_fences() {
        let content = "```json\n{\"name\": \"Soup\", \"steps\": [], \"ingredients\": []}\n```";
        let recipe = Recipe::from_model_json(content).unwrap();
        assert_eq!(recipe.name, "Soup");
        assert!(recipe.steps.is_empty());
    }

    #[test]
    fn test_from_model_json_rejects_missing_fields() {
        assert!(Recipe::from_model_json(r#"{"name": "Soup"}"#).is_err());
        assert!(Recipe::from_model_json(r#"{"name": " ", "steps": [], "ingredients": []}"#).is_err());
        assert!(Recipe::from_model_json("not json").is_err());
    }

    #[test]
    fn test_ingredient_has_image() {
        let mut ingredient = Ingredient::new("salt", "1 tsp");
        assert!(!ingredient.has_image());
        ingredient.image_url = Some("salt.jpg".to_string());
        assert!(!ingredient.has_image());
        ingredient.image_url = Some("https://cdn.example.com/salt.jpg".to_string());
        assert!(ingredient.has_image());
    }

    #[test]
    fn test_step_image_query_prefers_visual_query() {
        let mut step = RecipeStep::new("Chop the onions finely.");
        assert_eq!(step.image_query(), Some("Chop the onions finely."));
        step.visual_query = Some("chopped onions".to_string());
        assert_eq!(step.image_query(), Some("chopped onions"));
        step.visual_query = Some("  ".to_string());
        assert_eq!(step.image_query(), Some("Chop the onions finely."));
    }

    #[test]
    fn test_polished_prose_overlay_keeps_images() {
        let original = sample_recipe();
        let mut polished = original.clone();
        polished.name = "Pancakes".to_string();
        polished.steps[0].instruction = "Whisk the eggs.".to_string();
        polished.steps[0].image_url = None;
        polished.ingredients[0].name = "Egg".to_string();
        polished.source = None;

        let merged = original.with_polished_prose(&polished).unwrap();
        assert_eq!(merged.name, "Pancakes");
        assert_eq!(merged.steps[0].instruction, "Whisk the eggs.");
        assert_eq!(merged.steps[0].image_url, original.steps[0].image_url);
        assert_eq!(merged.ingredients[0].name, "Egg");
        assert_eq!(merged.source, original.source);
    }

    #[test]
    fn test_polished_prose_rejects_changed_measurements() {
        let original = sample_recipe();

        let mut polished = original.clone();
        polished.ingredients[1].amount = "2 cups".to_string();
        assert!(original.with_polished_prose(&polished).is_none());

        let mut polished = original.clone();
        polished.ingredients[0].name = "Duck egg".to_string();
        assert!(original.with_polished_prose(&polished).is_none());

        let mut polished = original.clone();
        polished.total_time = Some("25 mins".to_string());
        assert!(original.with_polished_prose(&polished).is_none());

        let mut polished = original.clone();
        polished.steps.pop();
        assert!(original.with_polished_prose(&polished).is_none());
    }

    #[test]
    fn test_strip_urls() {
        assert_eq!(
            strip_urls("Try this one: https://youtube.com/watch?v=abc it's great!"),
            "Try this one: it's great!"
        );
        assert_eq!(
            strip_urls("See [the recipe](https://example.com/r) for details."),
            "See the recipe for details."
        );
        assert_eq!(strip_urls("Visit www.example.com."), "Visit.");
        assert!(!contains_url(&strip_urls("a http://x.y/z b")));
    }

    #[test]
    fn test_strip_urls_without_scheme() {
        assert_eq!(strip_urls("See youtu.be/abc123"), "See");
        assert_eq!(strip_urls("Watch youtube.com/watch?v=abc now."), "Watch now.");
        assert_eq!(strip_urls("Full recipe at allrecipes.com/recipe/1."), "Full recipe at.");
        for text in ["youtu.be/abc123", "youtube.com/watch?v=abc", "allrecipes.com/recipe/1"] {
            assert!(contains_url(text), "{text}");
        }
        assert!(!contains_url("Use 1/2 cup of butter and/or oil, e.g. ghee."));
    }

    #[test]
    fn test_agent_response_validation() {
        let ok = AgentResponse::from_model_json(
            r#"{"chat_bubble": "Here are some ideas!", "ui_type": "video_list",
                "video_data": {"items": [{"title": "Pasta", "url": "https://youtu.be/x"}]}}"#,
        )
        .unwrap();
        assert_eq!(ok.ui_type, UiType::VideoList);

        let mismatched = AgentResponse::from_model_json(
            r#"{"chat_bubble": "Here", "ui_type": "recipe_list"}"#,
        );
        assert!(mismatched.is_err());

        let extra = AgentResponse::from_model_json(
            r#"{"chat_bubble": "Here", "ui_type": "none",
                "video_data": {"items": []}}"#,
        );
        assert!(extra.is_err());
    }

    #[test]
    fn test_agent_response_scrubs_urls() {
        let response = AgentResponse::from_model_json(
            r#"{"chat_bubble": "Watch https://youtu.be/abc now", "ui_type": "none"}"#,
        )
        .unwrap();
        assert_eq!(response.chat_bubble, "Watch now");
    }

    #[test]
    fn test_schemas_declare_required_fields() {
        assert_eq!(recipe_schema()["required"][0], "name");
        let ui = &agent_response_schema()["properties"]["ui_type"]["enum"];
        assert_eq!(ui.as_array().unwrap().len(), 4);
    }
}
