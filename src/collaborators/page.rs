use crate::collaborators::PageFetcher;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node};
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Plain HTTP page access with a browser user agent
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::collaborator(
                "page fetch",
                format!("{} returned {}", url, response.status()),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn text(&self, url: &str) -> Result<String> {
        let html = self.get(url).await?.text().await?;
        let text = visible_text(&html);
        if text.is_empty() {
            return Err(Error::collaborator("page fetch", format!("no text on {}", url)));
        }
        Ok(text)
    }

    async fn bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }
}

/// Visible text of a document, one line per block element
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    collect_text(&document.root_element(), &mut current, &mut blocks);
    flush(&mut current, &mut blocks);
    blocks.join("\n")
}

fn collect_text(element: &ElementRef, current: &mut Vec<String>, blocks: &mut Vec<String>) {
    if is_hidden(element) || should_skip_element(element) {
        return;
    }

    let tag_name = element.value().name().to_lowercase();
    if tag_name == "br" {
        flush(current, blocks);
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !normalized.is_empty() {
                    current.push(normalized);
                }
            }
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(&child_ref, current, blocks);
                }
            }
            _ => {}
        }
    }

    if is_block_element(&tag_name) {
        flush(current, blocks);
    }
}

fn flush(current: &mut Vec<String>, blocks: &mut Vec<String>) {
    let merged = current.join(" ").trim().to_string();
    if !merged.is_empty() {
        blocks.push(merged);
    }
    current.clear();
}

fn is_hidden(element: &ElementRef) -> bool {
    element.value().attr("hidden").is_some()
        || element
            .value()
            .attr("style")
            .map(|s| s.contains("display: none") || s.contains("visibility: hidden"))
            .unwrap_or(false)
}

fn is_block_element(tag: &str) -> bool {
    matches!(
        tag,
        "article"
            | "aside"
            | "blockquote"
            | "dd"
            | "div"
            | "dl"
            | "dt"
            | "figcaption"
            | "figure"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hr"
            | "li"
            | "main"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "tr"
            | "ul"
    )
}

// Navigation and footers carry menus and link farms, never recipe content
fn should_skip_element(element: &ElementRef) -> bool {
    matches!(
        element.value().name().to_lowercase().as_str(),
        "script" | "style" | "noscript" | "iframe" | "svg" | "nav" | "footer" | "head"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_visible_text_blocks() {
        let html = r#"
            <html>
                <head><title>Ignored</title></head>
                <body>
                    <nav><a href="/">Home</a> <a href="/about">About</a></nav>
                    <h1>Pasta   Recipe</h1>
                    <ul><li>200g pasta</li><li>1 jar <b>sauce</b></li></ul>
                    <p>Cook pasta with sauce</p>
                    <footer>Copyright</footer>
                </body>
            </html>
        "#;

        assert_eq!(
            visible_text(html),
            "Pasta Recipe\n200g pasta\n1 jar sauce\nCook pasta with sauce"
        );
    }

    #[test]
    fn test_hidden_and_script_elements() {
        let html = r#"
            <div>Visible</div>
            <div hidden>Hidden</div>
            <div style="display: none">Also Hidden</div>
            <script>console.log('Skip this');</script>
            <style>body { color: red; }</style>
            <div>More content</div>
        "#;
        assert_eq!(visible_text(html), "Visible\nMore content");
    }

    #[tokio::test]
    async fn test_fetch_text_and_errors() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/recipe")
            .with_status(200)
            .with_body("<html><body><p>Whisk the eggs.</p></body></html>")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let text = fetcher.text(&format!("{}/recipe", server.url())).await.unwrap();
        assert_eq!(text, "Whisk the eggs.");
        assert!(fetcher.text(&format!("{}/gone", server.url())).await.is_err());
    }
}
