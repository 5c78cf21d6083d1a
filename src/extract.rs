use scraper::{ElementRef, Html, Selector};

use crate::db::{CategoryBatch, CategoryRecord, NOT_AVAILABLE};

const CATEGORY_CELL: &str = "td.category";
const NAME: &str = "h3";
const LINK: &str = "a[href]";
const DESCRIPTION: &str = r#"div[itemprop="description"]"#;

struct CategorySelectors {
    cell: Selector,
    name: Selector,
    link: Selector,
    description: Selector,
}

impl CategorySelectors {
    fn new() -> Self {
        Self {
            cell: parse_static(CATEGORY_CELL),
            name: parse_static(NAME),
            link: parse_static(LINK),
            description: parse_static(DESCRIPTION),
        }
    }
}

fn parse_static(css: &'static str) -> Selector {
    Selector::parse(css).expect("static category selector")
}

/// Extract one record per `td.category` cell, in document order.
///
/// Returns an empty batch when the page has no category cells; deciding
/// whether that is fatal is left to the caller.
pub fn extract_categories(html: &str, base_url: &str) -> CategoryBatch {
    let document = Html::parse_document(html);
    let selectors = CategorySelectors::new();

    let mut batch = CategoryBatch::default();
    for cell in document.select(&selectors.cell) {
        batch.push(extract_record(cell, &selectors, base_url));
    }
    batch
}

// Each field is looked up independently; a missing heading has no effect on
// the link or description.
fn extract_record(
    cell: ElementRef<'_>,
    selectors: &CategorySelectors,
    base_url: &str,
) -> CategoryRecord {
    let name = cell
        .select(&selectors.name)
        .next()
        .map(element_text)
        .unwrap_or_else(not_available);

    let link = cell
        .select(&selectors.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| join_link(base_url, href))
        .unwrap_or_else(not_available);

    let description = cell
        .select(&selectors.description)
        .next()
        .map(element_text)
        .unwrap_or_else(not_available);

    CategoryRecord {
        name,
        link,
        description,
    }
}

/// Plain concatenation of base URL and href, with no URL resolution.
/// An href that is already absolute yields a malformed link.
pub fn join_link(base_url: &str, href: &str) -> String {
    format!("{}{}", base_url, href)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}
