//! `acontext session`: session management.

use acontext_config::AppConfig;

use super::open_store;

pub async fn new(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let session_id = store.create_session().await?;
    println!("{session_id}");
    Ok(())
}
