pub mod openfoodfacts;
pub mod traits;
pub mod upcitemdb;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::config::ScanConfig;
use crate::providers::openfoodfacts::OpenFoodFactsClient;
use crate::providers::traits::ProductProvider;
use crate::providers::upcitemdb::UpcItemDbClient;

/// Build the ordered provider list the cascade walks. The free primary is
/// always present; the paid secondary joins only when its credential was
/// configured. Adding a provider means appending here, not touching the
/// cascade.
pub fn build_providers(config: &ScanConfig) -> Result<Vec<Arc<dyn ProductProvider>>> {
    let mut providers: Vec<Arc<dyn ProductProvider>> =
        vec![Arc::new(OpenFoodFactsClient::new(config)?)];
    match &config.upcitemdb_api_key {
        Some(key) => {
            providers.push(Arc::new(UpcItemDbClient::new(config, key.clone())?));
        }
        None => info!("UPCItemDB not configured, secondary provider disabled"),
    }
    Ok(providers)
}
