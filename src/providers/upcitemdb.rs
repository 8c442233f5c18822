use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::config::ScanConfig;
use crate::providers::traits::{
    Confidence, LookupOutcome, NutritionFacts, ProductProvider, ProviderKind, ProviderResult,
};

/// Paid secondary source. Constructed only when a credential was
/// configured; a missing key means this provider does not exist.
#[derive(Debug, Clone)]
pub struct UpcItemDbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl UpcItemDbClient {
    pub fn new(config: &ScanConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://api.upcitemdb.com/prod/trial/lookup".to_string(),
        })
    }

    fn parse_item(&self, data: Value) -> Option<ProviderResult> {
        if data.get("code").and_then(|c| c.as_str()) != Some("OK") {
            return None;
        }
        let item = data.get("items").and_then(|i| i.as_array())?.first()?.clone();
        let text = |key: &str| -> Option<String> {
            item.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Some(ProviderResult {
            provider: ProviderKind::Secondary,
            provider_name: "upcitemdb".to_string(),
            confidence: Confidence::Medium,
            name: text("title")?,
            brand: text("brand"),
            category: text("category"),
            country_origin: None,
            ingredients: None,
            image_url: item
                .get("images")
                .and_then(|i| i.as_array())
                .and_then(|imgs| imgs.first())
                .and_then(|v| v.as_str())
                .map(String::from),
            serving_size: None,
            packaging: None,
            labels: None,
            allergens: None,
            nova_group: None,
            nutriscore: None,
            // The catalog carries no nutriment data at all.
            nutrition_per_100g: NutritionFacts::default(),
            raw: item,
        })
    }
}

#[async_trait]
impl ProductProvider for UpcItemDbClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Secondary
    }

    fn name(&self) -> &'static str {
        "upcitemdb"
    }

    async fn lookup(&self, barcode: &str) -> Result<LookupOutcome> {
        debug!("upcitemdb lookup for {}", barcode);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("upc", barcode)])
            .header("user_key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("upcitemdb returned status {}", response.status()));
        }

        let data: Value = response.json().await?;
        Ok(match self.parse_item(data) {
            Some(result) => LookupOutcome::Found(result),
            None => LookupOutcome::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn client() -> UpcItemDbClient {
        let config = ScanConfig {
            gemini_api_key: None,
            upcitemdb_api_key: Some("key".to_string()),
            provider_timeout: Duration::from_secs(5),
            request_deadline: Duration::from_secs(10),
            user_agent: "test".to_string(),
        };
        UpcItemDbClient::new(&config, "key".to_string()).unwrap()
    }

    #[test]
    fn parses_the_first_item() {
        let payload = json!({
            "code": "OK",
            "items": [{
                "title": "Inca Kola 500ml",
                "brand": "Inca Kola",
                "category": "Beverages",
                "images": ["https://example.com/inca.jpg"]
            }]
        });
        let result = client().parse_item(payload).unwrap();
        assert_eq!(result.provider, ProviderKind::Secondary);
        assert_eq!(result.name, "Inca Kola 500ml");
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.nutrition_per_100g.is_empty());
    }

    #[test]
    fn empty_item_list_is_not_found() {
        assert!(client().parse_item(json!({ "code": "OK", "items": [] })).is_none());
        assert!(client().parse_item(json!({ "code": "INVALID_UPC" })).is_none());
    }
}
