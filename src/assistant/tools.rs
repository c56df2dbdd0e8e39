//! Tools the reasoning model may call during an assistant turn.
//!
//! Every tool returns plain text for the model to read. Failures are
//! reported back as `Error: ...` results so one broken lookup never ends the
//! turn.

use crate::collaborators::{
    ImageStrategy, InMemoryUserContext, RecipeInformation, RecipeSource, RecipeSummary, SerpClient,
    SpoonacularClient, UserContext, YouTubeClient,
};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::providers::{ToolCall, ToolDefinition};
use crate::workflow::recipe_from_extraction;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

/// Per-turn facts a tool may need beyond its arguments
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub user_id: Option<String>,
}

/// A capability exposed to the reasoning model
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, args: &Value, ctx: &ToolContext) -> Result<String>;
}

/// External services behind the built-in tools
#[derive(Clone)]
pub struct Backends {
    pub spoonacular: Arc<SpoonacularClient>,
    pub serp: Arc<SerpClient>,
    pub youtube: Arc<YouTubeClient>,
    pub users: Arc<dyn UserContext>,
}

/// The built-in tool catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    SearchRecipes,
    SearchByNutrients,
    FindByIngredients,
    GetRecipeInformation,
    FindSimilarRecipes,
    GetRandomRecipes,
    ExtractRecipeFromUrl,
    SearchIngredients,
    GetIngredientInformation,
    CreateRecipeCard,
    WebSearch,
    ImageSearch,
    SearchYoutube,
    GetUserContext,
}

impl Builtin {
    pub const ALL: [Builtin; 14] = [
        Builtin::SearchRecipes,
        Builtin::SearchByNutrients,
        Builtin::FindByIngredients,
        Builtin::GetRecipeInformation,
        Builtin::FindSimilarRecipes,
        Builtin::GetRandomRecipes,
        Builtin::ExtractRecipeFromUrl,
        Builtin::SearchIngredients,
        Builtin::GetIngredientInformation,
        Builtin::CreateRecipeCard,
        Builtin::WebSearch,
        Builtin::ImageSearch,
        Builtin::SearchYoutube,
        Builtin::GetUserContext,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::SearchRecipes => "search_recipes",
            Builtin::SearchByNutrients => "search_by_nutrients",
            Builtin::FindByIngredients => "find_by_ingredients",
            Builtin::GetRecipeInformation => "get_recipe_information",
            Builtin::FindSimilarRecipes => "find_similar_recipes",
            Builtin::GetRandomRecipes => "get_random_recipes",
            Builtin::ExtractRecipeFromUrl => "extract_recipe_from_url",
            Builtin::SearchIngredients => "search_ingredients",
            Builtin::GetIngredientInformation => "get_ingredient_information",
            Builtin::CreateRecipeCard => "create_recipe_card",
            Builtin::WebSearch => "web_search",
            Builtin::ImageSearch => "image_search",
            Builtin::SearchYoutube => "search_youtube",
            Builtin::GetUserContext => "get_user_context",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Builtin::SearchRecipes => "Search recipes by dish name or keyword, optionally filtered by cuisine and diet.",
            Builtin::SearchByNutrients => "Find recipes with at least the given protein (g) and at most the given calories.",
            Builtin::FindByIngredients => "Find recipes that use the given comma separated ingredients.",
            Builtin::GetRecipeInformation => "Get the ingredients and instructions of a recipe by ID.",
            Builtin::FindSimilarRecipes => "Find recipes similar to the given recipe ID.",
            Builtin::GetRandomRecipes => "Get random recipes, optionally limited by comma separated tags such as 'vegetarian, dessert'.",
            Builtin::ExtractRecipeFromUrl => "Extract a structured recipe from a website URL.",
            Builtin::SearchIngredients => "Search for an ingredient to get its ID and image.",
            Builtin::GetIngredientInformation => "Get nutrition per 100g for an ingredient ID.",
            Builtin::CreateRecipeCard => "Get the URL of an image card for a recipe. Only use when the user asks for a visual card.",
            Builtin::WebSearch => "Search the web for cooking facts, techniques or anything not covered by the recipe tools.",
            Builtin::ImageSearch => "Find an image URL for a food, dish or cooking technique.",
            Builtin::SearchYoutube => "Search YouTube for cooking videos and shorts.",
            Builtin::GetUserContext => "Get the user's dietary preferences, allergies and pantry.",
        }
    }

    fn parameters(self) -> Value {
        let object = |properties: Value, required: &[&str]| {
            json!({"type": "object", "properties": properties, "required": required})
        };
        match self {
            Builtin::SearchRecipes => object(
                json!({
                    "query": {"type": "string"},
                    "cuisine": {"type": "string"},
                    "diet": {"type": "string"},
                    "number": {"type": "integer", "default": 3}
                }),
                &["query"],
            ),
            Builtin::SearchByNutrients => object(
                json!({
                    "min_protein": {"type": "integer", "default": 10},
                    "max_calories": {"type": "integer", "default": 800},
                    "number": {"type": "integer", "default": 3}
                }),
                &[],
            ),
            Builtin::FindByIngredients => object(json!({"ingredients": {"type": "string"}}), &["ingredients"]),
            Builtin::GetRecipeInformation | Builtin::CreateRecipeCard => {
                object(json!({"recipe_id": {"type": "integer"}}), &["recipe_id"])
            }
            Builtin::FindSimilarRecipes => object(
                json!({
                    "recipe_id": {"type": "integer"},
                    "number": {"type": "integer", "default": 3}
                }),
                &["recipe_id"],
            ),
            Builtin::GetRandomRecipes => object(
                json!({
                    "tags": {"type": "string"},
                    "number": {"type": "integer", "default": 3}
                }),
                &[],
            ),
            Builtin::ExtractRecipeFromUrl => object(json!({"url": {"type": "string"}}), &["url"]),
            Builtin::SearchIngredients => object(
                json!({
                    "query": {"type": "string"},
                    "number": {"type": "integer", "default": 5}
                }),
                &["query"],
            ),
            Builtin::GetIngredientInformation => {
                object(json!({"ingredient_id": {"type": "integer"}}), &["ingredient_id"])
            }
            Builtin::WebSearch | Builtin::ImageSearch => object(json!({"query": {"type": "string"}}), &["query"]),
            Builtin::SearchYoutube => object(
                json!({
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "default": 5}
                }),
                &["query"],
            ),
            Builtin::GetUserContext => object(json!({"user_id": {"type": "string"}}), &[]),
        }
    }
}

/// A built-in tool bound to its backends
pub struct BuiltinTool {
    kind: Builtin,
    backends: Arc<Backends>,
}

impl BuiltinTool {
    pub fn new(kind: Builtin, backends: Arc<Backends>) -> Self {
        BuiltinTool { kind, backends }
    }
}

#[async_trait]
impl Tool for BuiltinTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.kind.name().to_string(),
            description: self.kind.description().to_string(),
            parameters: self.kind.parameters(),
        }
    }

    async fn call(&self, args: &Value, ctx: &ToolContext) -> Result<String> {
        let b = &self.backends;
        match self.kind {
            Builtin::SearchRecipes => {
                let recipes = b
                    .spoonacular
                    .search_recipes(
                        arg_str(args, "query")?,
                        opt_str(args, "cuisine"),
                        opt_str(args, "diet"),
                        arg_u32(args, "number", 3),
                    )
                    .await?;
                Ok(listing(&recipes, "No recipes found.", |r| {
                    format!(
                        "ID: {} | Title: {} | Image: {} | Time: {}m | Source: {}",
                        r.id,
                        r.title,
                        or_none(&r.image),
                        r.ready_in_minutes.map_or("?".to_string(), |m| m.to_string()),
                        source_of(r)
                    )
                }))
            }
            Builtin::SearchByNutrients => {
                let recipes = b
                    .spoonacular
                    .search_by_nutrients(
                        arg_u32(args, "min_protein", 10),
                        arg_u32(args, "max_calories", 800),
                        arg_u32(args, "number", 3),
                    )
                    .await?;
                Ok(listing(&recipes, "No recipes found.", |r| {
                    format!(
                        "ID: {} | Title: {} | Image: {} | Cal: {} | Protein: {}",
                        r.id,
                        r.title,
                        or_none(&r.image),
                        r.calories.map_or("?".to_string(), |c| format!("{}", c.round())),
                        r.protein.as_deref().unwrap_or("?")
                    )
                }))
            }
            Builtin::FindByIngredients => {
                let ingredients: Vec<String> = arg_str(args, "ingredients")?
                    .split(',')
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty())
                    .collect();
                let matches = b.spoonacular.find_by_ingredients(&ingredients).await?;
                Ok(listing(&matches, "No recipes found.", |m| m.summary_line()))
            }
            Builtin::GetRecipeInformation => {
                let info = b.spoonacular.recipe_information(arg_i64(args, "recipe_id")?).await?;
                Ok(describe_recipe(&info))
            }
            Builtin::FindSimilarRecipes => {
                let recipes = b
                    .spoonacular
                    .similar_recipes(arg_i64(args, "recipe_id")?, arg_u32(args, "number", 3))
                    .await?;
                Ok(listing(&recipes, "No similar recipes found.", short_line))
            }
            Builtin::GetRandomRecipes => {
                let recipes = b
                    .spoonacular
                    .random_recipes(opt_str(args, "tags"), arg_u32(args, "number", 3))
                    .await?;
                Ok(listing(&recipes, "No recipes found.", short_line))
            }
            Builtin::ExtractRecipeFromUrl => {
                let url = arg_str(args, "url")?;
                let extracted = b.spoonacular.extract(url).await?;
                Ok(serde_json::to_string(&recipe_from_extraction(url, extracted))?)
            }
            Builtin::SearchIngredients => {
                let items = b
                    .spoonacular
                    .search_ingredients(arg_str(args, "query")?, arg_u32(args, "number", 5))
                    .await?;
                Ok(listing(&items, "No ingredients found.", |i| {
                    format!("ID: {} | Name: {} | Image: {}", i.id, i.name, or_none(&i.image))
                }))
            }
            Builtin::GetIngredientInformation => {
                let info = b
                    .spoonacular
                    .ingredient_information(arg_i64(args, "ingredient_id")?)
                    .await?;
                let nutrients: Vec<String> = info
                    .nutrition
                    .iter()
                    .flat_map(|n| n.nutrients.iter())
                    .filter(|n| ["Calories", "Fat", "Protein", "Carbohydrates"].contains(&n.name.as_str()))
                    .map(|n| format!("{}: {}{}", n.name, n.amount, n.unit))
                    .collect();
                Ok(format!(
                    "Ingredient: {}\nNutrition (per 100g):\n{}",
                    info.name,
                    nutrients.join("\n")
                ))
            }
            Builtin::CreateRecipeCard => Ok(b
                .spoonacular
                .recipe_card(arg_i64(args, "recipe_id")?)
                .await?
                .unwrap_or_else(|| "No card URL returned.".to_string())),
            Builtin::WebSearch => {
                let results = b.serp.web_search(arg_str(args, "query")?, 5).await?;
                Ok(listing(&results, "No results found.", |r| {
                    format!("Title: {}\nLink: {}\nSnippet: {}\n", r.title, r.link, r.snippet)
                }))
            }
            Builtin::ImageSearch => match b.serp.attempt(arg_str(args, "query")?).await {
                Ok(url) => Ok(url),
                Err(unavailable) => {
                    debug!("Image search missed: {}", unavailable);
                    Ok("No image found.".to_string())
                }
            },
            Builtin::SearchYoutube => {
                let limit = arg_u32(args, "max_results", 5) as usize;
                let videos = b.youtube.search(arg_str(args, "query")?, limit).await?;
                Ok(listing(&videos, "No videos found.", |v| {
                    format!(
                        "Title: {}\nLink: {}\nThumbnail: {}\nChannel: {}\nViews: {}\nLength: {}\n",
                        v.title,
                        v.link,
                        or_none(&v.thumbnail),
                        v.channel,
                        v.views,
                        v.length
                    )
                }))
            }
            Builtin::GetUserContext => {
                let user_id = opt_str(args, "user_id")
                    .or(ctx.user_id.as_deref())
                    .ok_or_else(|| Error::Agent("no user id for get_user_context".to_string()))?;
                Ok(match b.users.lookup(user_id).await? {
                    Some(profile) => profile.describe(),
                    None => "No profile found for this user.".to_string(),
                })
            }
        }
    }
}

/// Registered tools, looked up by name when the model asks for them
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolBox {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        ToolBox { tools }
    }

    /// Every built-in tool over the same backends
    pub fn standard(backends: Backends) -> Self {
        let backends = Arc::new(backends);
        ToolBox::new(
            Builtin::ALL
                .into_iter()
                .map(|kind| Arc::new(BuiltinTool::new(kind, backends.clone())) as Arc<dyn Tool>)
                .collect(),
        )
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let timeouts = &config.timeouts;
        let services = &config.services;
        let users: Arc<dyn UserContext> = match &config.assistant.profiles_path {
            Some(path) => Arc::new(InMemoryUserContext::from_json_file(Path::new(path)).await?),
            None => Arc::new(InMemoryUserContext::new()),
        };
        Ok(ToolBox::standard(Backends {
            spoonacular: Arc::new(SpoonacularClient::new(services, timeouts.http())?),
            serp: Arc::new(SerpClient::new(services, timeouts.http())?),
            youtube: Arc::new(YouTubeClient::new(services, timeouts.http())?),
            users,
        }))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one requested call. Unknown tools and failures come back as text
    /// starting with `Error:`.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let Some(tool) = self.tools.iter().find(|tool| tool.definition().name == call.name) else {
            warn!("Model asked for unknown tool '{}'", call.name);
            return format!("Error: unknown tool '{}'", call.name);
        };
        info!("Calling tool {} with {}", call.name, call.arguments);
        match tool.call(&call.arguments, ctx).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                format!("Error: {}", e)
            }
        }
    }
}

fn listing<T>(items: &[T], empty: &str, line: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.iter().map(line).collect::<Vec<_>>().join("\n")
    }
}

fn short_line(r: &RecipeSummary) -> String {
    format!("ID: {} | Title: {} | Image: {}", r.id, r.title, or_none(&r.image))
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

fn source_of(r: &RecipeSummary) -> &str {
    r.source_url
        .as_deref()
        .or(r.spoonacular_source_url.as_deref())
        .unwrap_or("None")
}

fn describe_recipe(info: &RecipeInformation) -> String {
    let ingredients: Vec<String> = info
        .extended_ingredients
        .iter()
        .map(|line| format!("- {}", line.original))
        .collect();
    let instructions = info
        .instructions
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            info.analyzed_instructions
                .iter()
                .flat_map(|set| set.steps.iter())
                .map(|step| format!("{}. {}", step.number, step.step))
                .collect::<Vec<_>>()
                .join("\n")
        });

    format!(
        "Title: {}\nServings: {}\nTime: {}m\nSource: {}\nIngredients:\n{}\nInstructions:\n{}",
        info.title,
        info.servings.map_or("?".to_string(), |s| s.to_string()),
        info.ready_in_minutes.map_or("?".to_string(), |m| m.to_string()),
        or_none(&info.source_url),
        ingredients.join("\n"),
        instructions
    )
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    opt_str(args, key).ok_or_else(|| Error::Agent(format!("missing argument '{}'", key)))
}

/// Integers arrive as numbers or, from some models, numeric strings
fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn arg_i64(args: &Value, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(as_i64)
        .ok_or_else(|| Error::Agent(format!("missing integer argument '{}'", key)))
}

fn arg_u32(args: &Value, key: &str, default: u32) -> u32 {
    args.get(key)
        .and_then(as_i64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(default)
}
