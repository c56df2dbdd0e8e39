use log::error;
use plateit::{ChatRequest, ImportResult, Recipe, RecipeImporter};
use std::env;
use std::process::ExitCode;

const USAGE: &str = "Usage:
  plateit extract <url|image-path>
  plateit chat <message> [recipe.json] [step]";

async fn run(args: &[String]) -> Result<ImportResult, Box<dyn std::error::Error>> {
    let builder = RecipeImporter::builder();
    let builder = match args {
        [command, target] if command == "extract" => {
            if target.starts_with("http://") || target.starts_with("https://") {
                builder.url(target.as_str())
            } else {
                builder.image(target.as_str())
            }
        }
        [command, message, rest @ ..] if command == "chat" && rest.len() <= 2 => {
            let mut request = ChatRequest::new(message.as_str());
            if let Some(path) = rest.first() {
                let recipe: Recipe = serde_json::from_str(&tokio::fs::read_to_string(path).await?)?;
                request.recipe = Some(recipe);
            }
            if let Some(step) = rest.get(1) {
                request.current_step = step.parse()?;
            }
            builder.chat(request)
        }
        _ => return Err(USAGE.into()),
    };
    Ok(builder.build().await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();

    let printed = match run(&args).await {
        Ok(ImportResult::Recipe(report)) => serde_json::to_string_pretty(&report),
        Ok(ImportResult::Reply(turn)) => serde_json::to_string_pretty(&turn.response),
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    match printed {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
