use std::path::PathBuf;

use animedex_catalog::{ANIMEDEX_CATALOG_MOCK_DATA_VAR, Client, JikanClient, MockClient};
use anyhow::{Context, bail};
use tracing::debug;

use crate::config::Config;

/// Initialize the catalog client
///
/// - Initialize a mock client if `$ANIMEDEX_CATALOG_MOCK_DATA` points to mock data
/// - Initialize a real client otherwise
pub fn init_catalog_client(config: &Config) -> Result<Client, anyhow::Error> {
    if let Ok(path_str) = std::env::var(ANIMEDEX_CATALOG_MOCK_DATA_VAR) {
        let path = PathBuf::from(path_str);
        if !path.exists() {
            bail!("path to mock data file doesn't exist: {}", path.display());
        }

        debug!(mock_data_path = %path.display(), "using mock catalog client");
        Ok(MockClient::new(Some(&path))
            .with_context(|| format!("Could not load mock data from {}", path.display()))?
            .into())
    } else {
        let client =
            JikanClient::new(config.catalog_client_config()).context("Could not create catalog client")?;
        debug!("using catalog client with url: {}", client.catalog_url());
        Ok(client.into())
    }
}
