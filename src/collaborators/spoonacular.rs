use crate::collaborators::{ImageStrategy, RecipeMatch, RecipeSource};
use crate::config::ServicesConfig;
use crate::error::{Error, Result, Unavailable};
use async_trait::async_trait;
use html_escape::decode_html_entities;
use log::{debug, warn};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const INGREDIENT_IMAGE_BASE: &str = "https://img.spoonacular.com/ingredients_100x100/";
pub const EQUIPMENT_IMAGE_BASE: &str = "https://img.spoonacular.com/equipment_100x100/";

/// Recipe as returned by the extraction endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecipe {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ready_in_minutes: Option<u32>,
    #[serde(default)]
    pub extended_ingredients: Vec<ExtendedIngredient>,
    #[serde(default)]
    pub analyzed_instructions: Vec<InstructionSet>,
}

impl ExtractedRecipe {
    /// Whether the extraction carried anything worth building a recipe from
    pub fn is_usable(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
            && (!self.extended_ingredients.is_empty() || !self.analyzed_instructions.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedIngredient {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// A named block of instructions ("For the sauce", ...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstructionSet {
    #[serde(default)]
    pub steps: Vec<InstructionStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstructionStep {
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub ingredients: Vec<StepItem>,
    #[serde(default)]
    pub equipment: Vec<StepItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepItem {
    #[serde(default)]
    pub image: Option<String>,
}

/// Row of the list endpoints (search, similar, random, by nutrients)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ready_in_minutes: Option<i64>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub spoonacular_source_url: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MatchRow {
    id: i64,
    title: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default, rename = "missedIngredients")]
    missed_ingredients: Vec<NamedItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInformation {
    pub title: String,
    #[serde(default)]
    pub servings: Option<i64>,
    #[serde(default, rename = "readyInMinutes")]
    pub ready_in_minutes: Option<i64>,
    #[serde(default, rename = "sourceUrl")]
    pub source_url: Option<String>,
    #[serde(default, rename = "extendedIngredients")]
    pub extended_ingredients: Vec<OriginalLine>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default, rename = "analyzedInstructions")]
    pub analyzed_instructions: Vec<NumberedSteps>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginalLine {
    #[serde(default)]
    pub original: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumberedSteps {
    #[serde(default)]
    pub steps: Vec<NumberedStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumberedStep {
    pub number: i64,
    pub step: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientInformation {
    pub name: String,
    #[serde(default)]
    pub nutrition: Option<Nutrition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nutrition {
    #[serde(default)]
    pub nutrients: Vec<Nutrient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
}

#[derive(Deserialize)]
struct Results<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct RandomRecipes {
    #[serde(default)]
    recipes: Vec<RecipeSummary>,
}

#[derive(Deserialize)]
struct Card {
    #[serde(default)]
    url: Option<String>,
}

/// Client for the Spoonacular recipe and food API
pub struct SpoonacularClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl SpoonacularClient {
    pub fn new(services: &ServicesConfig, timeout: Duration) -> Result<Self> {
        Ok(SpoonacularClient {
            client: Client::builder()
                .timeout(timeout)
                .user_agent("Mozilla/5.0 (compatible; PlateItBot/1.0)")
                .build()?,
            api_key: services.spoonacular_key(),
            base_url: services.spoonacular_url.trim_end_matches('/').to_string(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: &str, base_url: String) -> Self {
        SpoonacularClient {
            client: Client::new(),
            api_key: Some(api_key.to_string()),
            base_url,
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, String)]) -> Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::collaborator("spoonacular", "SPOONACULAR_API_KEY not configured"))?;

        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .query(params)
            .query(&[("apiKey", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::collaborator(
                "spoonacular",
                format!("{} returned {}: {}", endpoint, status, body),
            ));
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn search_recipes(
        &self,
        query: &str,
        cuisine: Option<&str>,
        diet: Option<&str>,
        number: u32,
    ) -> Result<Vec<RecipeSummary>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("number", number.to_string()),
            ("addRecipeInformation", "true".to_string()),
            ("instructionsRequired", "true".to_string()),
        ];
        if let Some(cuisine) = cuisine {
            params.push(("cuisine", cuisine.to_string()));
        }
        if let Some(diet) = diet {
            params.push(("diet", diet.to_string()));
        }
        let page: Results<RecipeSummary> = self.get("/recipes/complexSearch", &params).await?;
        Ok(page.results)
    }

    pub async fn search_by_nutrients(
        &self,
        min_protein: u32,
        max_calories: u32,
        number: u32,
    ) -> Result<Vec<RecipeSummary>> {
        self.get(
            "/recipes/findByNutrients",
            &[
                ("minProtein", min_protein.to_string()),
                ("maxCalories", max_calories.to_string()),
                ("number", number.to_string()),
                ("random", "true".to_string()),
            ],
        )
        .await
    }

    pub async fn recipe_information(&self, recipe_id: i64) -> Result<RecipeInformation> {
        self.get(
            &format!("/recipes/{}/information", recipe_id),
            &[("includeNutrition", "false".to_string())],
        )
        .await
    }

    pub async fn similar_recipes(&self, recipe_id: i64, number: u32) -> Result<Vec<RecipeSummary>> {
        self.get(
            &format!("/recipes/{}/similar", recipe_id),
            &[("number", number.to_string())],
        )
        .await
    }

    pub async fn random_recipes(&self, tags: Option<&str>, number: u32) -> Result<Vec<RecipeSummary>> {
        let mut params = vec![("number", number.to_string())];
        if let Some(tags) = tags {
            params.push(("tags", tags.to_string()));
        }
        let random: RandomRecipes = self.get("/recipes/random", &params).await?;
        Ok(random.recipes)
    }

    pub async fn search_ingredients(&self, query: &str, number: u32) -> Result<Vec<IngredientSummary>> {
        let page: Results<IngredientSummary> = self
            .get(
                "/food/ingredients/search",
                &[("query", query.to_string()), ("number", number.to_string())],
            )
            .await?;
        Ok(page.results)
    }

    pub async fn ingredient_information(&self, ingredient_id: i64) -> Result<IngredientInformation> {
        self.get(
            &format!("/food/ingredients/{}/information", ingredient_id),
            &[("amount", "100".to_string()), ("unit", "grams".to_string())],
        )
        .await
    }

    pub async fn recipe_card(&self, recipe_id: i64) -> Result<Option<String>> {
        let card: Card = self.get(&format!("/recipes/{}/card", recipe_id), &[]).await?;
        Ok(card.url)
    }

    /// Open Graph or Twitter card image of a page
    async fn page_image(&self, url: &str) -> Option<String> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let html = response.text().await.ok()?;
        meta_image(&html)
    }
}

fn meta_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    ["meta[property=\"og:image\"]", "meta[name=\"twitter:image\"]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(|content| decode_html_entities(content.trim()).to_string())
                .find(|content| !content.is_empty())
        })
}

#[async_trait]
impl RecipeSource for SpoonacularClient {
    async fn extract(&self, url: &str) -> Result<ExtractedRecipe> {
        let mut recipe: ExtractedRecipe = self
            .get("/recipes/extract", &[("url", url.to_string())])
            .await?;

        if recipe.image.as_deref().map_or(true, str::is_empty) {
            debug!("No image in extraction for {}, checking page meta tags", url);
            recipe.image = self.page_image(url).await;
        }
        Ok(recipe)
    }

    async fn find_by_ingredients(&self, ingredients: &[String]) -> Result<Vec<RecipeMatch>> {
        let rows: Vec<MatchRow> = self
            .get(
                "/recipes/findByIngredients",
                &[
                    ("ingredients", ingredients.join(", ")),
                    ("number", "5".to_string()),
                    ("ranking", "2".to_string()),
                    ("ignorePantry", "true".to_string()),
                ],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RecipeMatch {
                id: row.id,
                title: row.title,
                image: row.image,
                missing: row.missed_ingredients.into_iter().map(|i| i.name).collect(),
            })
            .collect())
    }
}

/// Paid ingredient image lookup through the ingredient search endpoint
#[async_trait]
impl ImageStrategy for SpoonacularClient {
    fn name(&self) -> &str {
        "spoonacular_ingredient_search"
    }

    async fn attempt(&self, query: &str) -> Result<String, Unavailable> {
        let results = self.search_ingredients(query, 1).await.map_err(|e| {
            warn!("Ingredient image search failed for '{}': {}", query, e);
            Unavailable::new(self.name(), e.to_string())
        })?;

        results
            .into_iter()
            .find_map(|r| r.image)
            .filter(|image| !image.is_empty())
            .map(|image| format!("{}{}", INGREDIENT_IMAGE_BASE, image))
            .ok_or_else(|| Unavailable::new(self.name(), format!("no ingredient named '{}'", query)))
    }
}
