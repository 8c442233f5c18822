use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::config::ScanConfig;
use crate::providers::traits::{
    Confidence, LookupOutcome, NutritionFacts, ProductProvider, ProviderKind, ProviderResult,
};

/// Free, always-attempted primary source. No credential required.
#[derive(Debug, Clone)]
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: "https://world.openfoodfacts.org/api/v0/product".to_string(),
        })
    }

    fn parse_product(&self, barcode: &str, data: Value) -> Option<ProviderResult> {
        // status == 1 marks a hit in the v0 API.
        if data.get("status").and_then(|s| s.as_i64()) != Some(1) {
            return None;
        }
        let product = data.get("product").cloned().unwrap_or(Value::Null);
        let text = |key: &str| -> Option<String> {
            product
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let name = text("product_name").unwrap_or_else(|| format!("Producto {}", barcode));
        Some(ProviderResult {
            provider: ProviderKind::Primary,
            provider_name: "openfoodfacts".to_string(),
            confidence: Confidence::High,
            name,
            brand: text("brands"),
            category: text("categories"),
            country_origin: text("countries"),
            ingredients: text("ingredients_text"),
            image_url: text("image_url"),
            serving_size: text("serving_size"),
            packaging: text("packaging"),
            labels: text("labels"),
            allergens: text("allergens"),
            nova_group: product
                .get("nova_group")
                .and_then(|v| v.as_u64())
                .map(|g| g as u8),
            nutriscore: text("nutriscore_grade").map(|g| g.to_uppercase()),
            nutrition_per_100g: extract_nutriments(&product),
            raw: product,
        })
    }
}

#[async_trait]
impl ProductProvider for OpenFoodFactsClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Primary
    }

    fn name(&self) -> &'static str {
        "openfoodfacts"
    }

    async fn lookup(&self, barcode: &str) -> Result<LookupOutcome> {
        let url = format!("{}/{}.json", self.base_url, barcode);
        debug!("openfoodfacts lookup: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openfoodfacts returned status {}",
                response.status()
            ));
        }

        let data: Value = response.json().await?;
        Ok(match self.parse_product(barcode, data) {
            Some(result) => LookupOutcome::Found(result),
            None => LookupOutcome::NotFound,
        })
    }
}

fn extract_nutriments(product: &Value) -> NutritionFacts {
    let nutriments = product.get("nutriments").cloned().unwrap_or(Value::Null);
    let get = |key: &str| nutriments.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    NutritionFacts {
        calories: get("energy-kcal_100g"),
        protein: get("proteins_100g"),
        carbs: get("carbohydrates_100g"),
        fat: get("fat_100g"),
        fiber: get("fiber_100g"),
        sugar: get("sugars_100g"),
        sodium: get("sodium_100g"),
        salt: get("salt_100g"),
        saturated_fat: get("saturated-fat_100g"),
        calcium: get("calcium_100g"),
        iron: get("iron_100g"),
        vitamin_c: get("vitamin-c_100g"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn client() -> OpenFoodFactsClient {
        let config = ScanConfig {
            gemini_api_key: None,
            upcitemdb_api_key: None,
            provider_timeout: Duration::from_secs(5),
            request_deadline: Duration::from_secs(10),
            user_agent: "test".to_string(),
        };
        OpenFoodFactsClient::new(&config).unwrap()
    }

    #[test]
    fn parses_a_hit() {
        let payload = json!({
            "status": 1,
            "product": {
                "product_name": "Leche Gloria Entera",
                "brands": "Gloria",
                "categories": "Lácteos",
                "countries": "Perú",
                "serving_size": "200ml",
                "nova_group": 3,
                "nutriscore_grade": "b",
                "nutriments": {
                    "energy-kcal_100g": 61.0,
                    "proteins_100g": 3.1,
                    "sugars_100g": 4.7
                }
            }
        });
        let result = client().parse_product("7751271001234", payload).unwrap();
        assert_eq!(result.provider, ProviderKind::Primary);
        assert_eq!(result.name, "Leche Gloria Entera");
        assert_eq!(result.brand.as_deref(), Some("Gloria"));
        assert_eq!(result.nova_group, Some(3));
        assert_eq!(result.nutriscore.as_deref(), Some("B"));
        assert_eq!(result.nutrition_per_100g.calories, 61.0);
        assert_eq!(result.nutrition_per_100g.protein, 3.1);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn status_zero_is_not_found() {
        let payload = json!({ "status": 0, "status_verbose": "product not found" });
        assert!(client().parse_product("7751271001234", payload).is_none());
    }

    #[test]
    fn blank_fields_become_none() {
        let payload = json!({
            "status": 1,
            "product": { "product_name": "X", "brands": "  ", "categories": "" }
        });
        let result = client().parse_product("7751271001234", payload).unwrap();
        assert!(result.brand.is_none());
        assert!(result.category.is_none());
        assert!(result.nutrition_per_100g.is_empty());
    }
}
