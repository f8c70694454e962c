//! Prints the Webflow collection schema so field slugs can be checked against
//! what the sync writes (`key`, `name`, `slug`, `ticker`, `sector`, `event_url`,
//! `event_date`, `event_heading`).

use anyhow::{Context, Result};
use calendar_sync::cms::webflow::WebflowClient;
use calendar_sync::SyncConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    calendar_sync::init_tracing();

    let config = SyncConfig::from_env()?;
    let client = WebflowClient::new(&config, config.http_client()?);

    let schema = client
        .collection_schema()
        .await
        .with_context(|| format!("fetching schema for collection {}", config.collection_id))?;

    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
