use thiserror::Error;
use tracing::{debug, info};

use crate::db::{self, CategoryBatch, PersistOutcome, Session, NOT_AVAILABLE};
use crate::extract::extract_categories;
use crate::fetch::{fetch_page, FetchError};
use crate::summarize::Summarizer;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("No categories found in the HTML page.")]
    NoCategories,
}

pub struct RunReport {
    pub extracted: usize,
    pub outcome: PersistOutcome,
}

impl RunReport {
    pub fn print(&self) {
        match &self.outcome {
            PersistOutcome::Completed { table_created, .. } => {
                if *table_created {
                    println!("Created table {}.", db::TABLE_NAME);
                }
                println!(
                    "Extracted {} categories, inserted {} rows into {}.",
                    self.extracted,
                    self.outcome.inserted(),
                    db::TABLE_NAME
                );
            }
            PersistOutcome::Failed {
                cause,
                inserted_before_failure,
            } => {
                println!(
                    "Extracted {} categories, inserted 0 rows ({} rolled back): {}",
                    self.extracted, inserted_before_failure, cause
                );
            }
        }
    }
}

/// fetch → extract → (summarize) → persist, for a single page.
pub struct Pipeline {
    client: reqwest::Client,
    page_url: String,
    summarizer: Option<Summarizer>,
}

impl Pipeline {
    pub fn new(client: reqwest::Client, page_url: impl Into<String>) -> Self {
        Self {
            client,
            page_url: page_url.into(),
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Fetch the page and extract its categories. The page URL doubles as
    /// the base for links.
    pub async fn scrape(&self) -> Result<CategoryBatch, PipelineError> {
        let html = fetch_page(&self.client, &self.page_url).await?;
        let batch = extract_categories(&html, &self.page_url);
        if batch.is_empty() {
            return Err(PipelineError::NoCategories);
        }
        info!("Extracted {} categories", batch.len());
        for (name, link, _) in batch.rows() {
            debug!("{} -> {}", name, link);
        }
        Ok(batch)
    }

    /// Run every stage against an already open session.
    ///
    /// The session is closed on every path: here when scraping fails, by
    /// [`db::persist`] otherwise. Persistence failures come back inside the
    /// report instead of as an error.
    pub async fn run<S: Session>(&self, session: S) -> Result<RunReport, PipelineError> {
        let mut batch = match self.scrape().await {
            Ok(batch) => batch,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        if let Some(summarizer) = &self.summarizer {
            summarize_descriptions(summarizer, &mut batch).await;
        }

        let extracted = batch.len();
        let outcome = db::persist(session, &batch).await;
        Ok(RunReport { extracted, outcome })
    }
}

async fn summarize_descriptions(summarizer: &Summarizer, batch: &mut CategoryBatch) {
    for i in 0..batch.len() {
        let description = &batch.descriptions()[i];
        if description == NOT_AVAILABLE {
            continue;
        }
        let summary = summarizer.summarize(description).await;
        batch.set_description(i, summary);
    }
    info!("Summarized descriptions for {} categories", batch.len());
}
