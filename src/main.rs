mod config;
mod db;
mod extract;
mod fetch;
mod pipeline;
mod summarize;

use std::time::Instant;

use anyhow::Context;
use tracing::info;

use config::{DbSettings, Settings};
use db::{MySqlSession, SqliteSession};
use pipeline::Pipeline;
use summarize::Summarizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let settings = Settings::from_env().context("Error during configuration")?;
    info!(
        url = %settings.scrape_url,
        backend = %settings.db.backend(),
        database = %settings.db.redacted_url(),
        summarize = settings.summarize_descriptions,
        "Starting category scraper"
    );

    let client = reqwest::Client::new();
    let mut pipeline = Pipeline::new(client.clone(), settings.scrape_url.clone());
    if settings.summarize_descriptions {
        let summarizer = Summarizer::new(client, settings.api_key)
            .with_api_base(settings.gemini_api_base)
            .with_model(settings.gemini_model);
        pipeline = pipeline.with_summarizer(summarizer);
    }

    let report = match &settings.db {
        DbSettings::MySql(mysql) => {
            let session = MySqlSession::connect(mysql)
                .await
                .context("Error during configuration: could not connect to MySQL")?;
            println!("Database connected successfully.");
            pipeline.run(session).await
        }
        DbSettings::Sqlite { path } => {
            let session = SqliteSession::open(path).with_context(|| {
                format!("Error during configuration: could not open {:?}", path)
            })?;
            println!("Database connected successfully.");
            pipeline.run(session).await
        }
    }
    .context("Error in main execution")?;

    report.print();
    println!("\nDone in {:.1}s", t0.elapsed().as_secs_f64());
    Ok(())
}
