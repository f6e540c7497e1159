//! Splitting the documentation page into sections.

use std::collections::HashSet;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::DocsError;

/// Where the API documentation is published.
pub const DEFAULT_DOCS_URL: &str = "https://twelvedata.com/docs";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One `<section id=...>` block of the documentation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSection {
    /// The section's `id` attribute.
    pub section_id: String,
    /// First `h2`, `h3` or `h1` heading, or the id when there is none.
    pub title: String,
    /// Text content, one text node per line.
    pub content: String,
}

/// Download the documentation page.
///
/// # Errors
///
/// Returns an error on network failure or a non-success status.
#[instrument]
pub async fn fetch_docs(url: &str) -> Result<String, DocsError> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DocsError::Fetch(format!("{url} returned {status}")));
    }

    let html = response.text().await?;
    info!(bytes = html.len(), "Documentation downloaded");
    Ok(html)
}

/// Every `section[id]` of `html`, in document order.
///
/// Nested sections are returned as well, so a parent's content includes its
/// children's text. Repeated ids keep the first occurrence; sections without
/// text are dropped.
///
/// # Errors
///
/// Returns [`DocsError::Parse`] if a selector cannot be compiled.
pub fn parse_sections(html: &str) -> Result<Vec<DocSection>, DocsError> {
    let document = Html::parse_document(html);
    let section_selector = selector("section[id]")?;
    let headings = [selector("h2")?, selector("h3")?, selector("h1")?];

    let mut seen = HashSet::new();
    let mut sections = Vec::new();

    for element in document.select(&section_selector) {
        let Some(section_id) = element
            .value()
            .attr("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            continue;
        };
        if !seen.insert(section_id.to_string()) {
            debug!(section_id, "Skipping repeated section id");
            continue;
        }

        let content = text_lines(element);
        if content.is_empty() {
            continue;
        }

        let title = headings
            .iter()
            .find_map(|heading| element.select(heading).next())
            .map(inline_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| section_id.to_string());

        sections.push(DocSection {
            section_id: section_id.to_string(),
            title,
            content,
        });
    }

    debug!(count = sections.len(), "Parsed documentation sections");
    Ok(sections)
}

fn selector(css: &str) -> Result<Selector, DocsError> {
    Selector::parse(css).map_err(|e| DocsError::Parse(e.to_string()))
}

/// Trimmed text nodes, one per line.
fn text_lines(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text with runs of whitespace collapsed to single spaces.
fn inline_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
