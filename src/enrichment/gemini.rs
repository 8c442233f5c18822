use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;

use crate::config::ScanConfig;
use crate::enrichment::{
    build_profile, sustainability_for, AnalysisBundle, HealthAnalysis, NutritionAnalyzer,
};
use crate::providers::traits::{NutritionFacts, ProviderResult};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Generative enrichment backend. One `generateContent` call per scan;
/// failures are reported to the cascade, never retried here.
pub struct GeminiAnalyzer {
    client: Client,
    api_key: String,
    model: String,
}

/// The strict-JSON reply shape the prompt asks for.
#[derive(Debug, Deserialize)]
struct GeminiVerdict {
    health_score: f64,
    processing_level: String,
    #[serde(default)]
    benefits: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    consumption_recommendation: String,
    #[serde(default)]
    healthier_alternatives: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    estimated_nutrition_per_100g: Option<NutritionFacts>,
    #[serde(default)]
    serving_size: Option<String>,
}

impl GeminiAnalyzer {
    pub fn new(config: &ScanConfig, api_key: String) -> Result<Self> {
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_prompt(&self, product: Option<&ProviderResult>, barcode: &str) -> String {
        let mut prompt = String::from(
            "Analiza este producto alimenticio y responde SOLO con un objeto JSON \
             (sin markdown, sin texto adicional) con esta estructura:\n\
             {\"health_score\": 7.5, \"processing_level\": \"moderado\", \
             \"benefits\": [], \"concerns\": [], \
             \"consumption_recommendation\": \"...\", \
             \"healthier_alternatives\": [], \"summary\": \"...\", \
             \"estimated_nutrition_per_100g\": {\"calories\": 0, \"protein\": 0, \
             \"carbs\": 0, \"fat\": 0, \"fiber\": 0, \"sugar\": 0, \"sodium\": 0}, \
             \"serving_size\": \"100g\"}\n\
             Todas las respuestas en ESPAÑOL.\n\n",
        );
        match product {
            Some(product) => {
                prompt.push_str(&format!("Producto: {}\n", product.name));
                if let Some(brand) = &product.brand {
                    prompt.push_str(&format!("Marca: {}\n", brand));
                }
                if let Some(category) = &product.category {
                    prompt.push_str(&format!("Categoría: {}\n", category));
                }
                if let Some(ingredients) = &product.ingredients {
                    prompt.push_str(&format!("Ingredientes: {}\n", ingredients));
                }
                if !product.nutrition_per_100g.is_empty() {
                    prompt.push_str(&format!(
                        "Información nutricional por 100g: {}\n",
                        serde_json::to_string(&product.nutrition_per_100g).unwrap_or_default()
                    ));
                    prompt.push_str(
                        "Usa estos datos reales; omite estimated_nutrition_per_100g.\n",
                    );
                } else {
                    prompt.push_str(
                        "No hay datos nutricionales; estima valores típicos para esta \
                         categoría en estimated_nutrition_per_100g.\n",
                    );
                }
            }
            None => {
                prompt.push_str(&format!(
                    "Ningún catálogo reconoce el código de barras {}. Estima un perfil \
                     nutricional plausible a partir del código (su prefijo indica el país \
                     de origen) y de la imagen adjunta si la hay. Llena \
                     estimated_nutrition_per_100g con tu mejor estimación.\n",
                    barcode
                ));
            }
        }
        prompt
    }

    async fn request_verdict(
        &self,
        prompt: String,
        image: Option<&[u8]>,
    ) -> Result<GeminiVerdict> {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(image) = image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": "image/jpeg",
                    "data": STANDARD.encode(image)
                }
            }));
        }

        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "contents": [{ "role": "user", "parts": parts }] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("gemini returned status {}: {}", status, body));
        }

        let reply: Value = response.json().await?;
        let text = reply
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("gemini reply missing candidate text"))?;
        debug!("gemini verdict text: {}", text);
        parse_verdict(text)
    }
}

#[async_trait]
impl NutritionAnalyzer for GeminiAnalyzer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn estimates_unidentified(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        product: Option<&ProviderResult>,
        barcode: &str,
        image: Option<&[u8]>,
    ) -> Result<AnalysisBundle> {
        let prompt = self.build_prompt(product, barcode);
        let verdict = self.request_verdict(prompt, image).await?;

        let provider_facts = product
            .map(|p| p.nutrition_per_100g.clone())
            .filter(|facts| !facts.is_empty());
        let estimated = provider_facts.is_none();
        let facts = provider_facts
            .or(verdict.estimated_nutrition_per_100g)
            .unwrap_or_default();
        let serving = product
            .and_then(|p| p.serving_size.clone())
            .or(verdict.serving_size);

        Ok(AnalysisBundle {
            nutrition: build_profile(facts, serving.as_deref(), estimated),
            health: HealthAnalysis {
                health_score: verdict.health_score.max(1.0).min(10.0),
                processing_level: verdict.processing_level,
                benefits: verdict.benefits,
                concerns: verdict.concerns,
                consumption_recommendation: verdict.consumption_recommendation,
                healthier_alternatives: verdict.healthier_alternatives,
                summary: verdict.summary,
            },
            sustainability: sustainability_for(product),
        })
    }
}

/// Models wrap JSON in markdown fences despite instructions; take the
/// outermost object literally.
fn parse_verdict(text: &str) -> Result<GeminiVerdict> {
    let start = text
        .find('{')
        .ok_or_else(|| anyhow!("no JSON object in gemini reply"))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| anyhow!("unterminated JSON object in gemini reply"))?;
    let verdict: GeminiVerdict = serde_json::from_str(&text[start..=end])
        .map_err(|e| anyhow!("gemini reply is not the expected JSON: {}", e))?;
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::tests::product_with;
    use std::time::Duration;

    fn analyzer() -> GeminiAnalyzer {
        let config = ScanConfig {
            gemini_api_key: Some("key".to_string()),
            upcitemdb_api_key: None,
            provider_timeout: Duration::from_secs(5),
            request_deadline: Duration::from_secs(10),
            user_agent: "test".to_string(),
        };
        GeminiAnalyzer::new(&config, "key".to_string()).unwrap()
    }

    #[test]
    fn parses_fenced_replies() {
        let text = "```json\n{\"health_score\": 6.5, \"processing_level\": \"moderado\", \
                    \"summary\": \"ok\"}\n```";
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.health_score, 6.5);
        assert_eq!(verdict.processing_level, "moderado");
        assert!(verdict.benefits.is_empty());
    }

    #[test]
    fn parses_partial_estimated_nutrition() {
        let text = "{\"health_score\": 3.0, \"processing_level\": \"alto\", \
                    \"estimated_nutrition_per_100g\": {\"calories\": 450.0, \"sugar\": 30.0}}";
        let verdict = parse_verdict(text).unwrap();
        let facts = verdict.estimated_nutrition_per_100g.unwrap();
        assert_eq!(facts.calories, 450.0);
        assert_eq!(facts.sugar, 30.0);
        assert_eq!(facts.protein, 0.0);
    }

    #[test]
    fn rejects_non_json_replies() {
        assert!(parse_verdict("lo siento, no puedo ayudar").is_err());
    }

    #[test]
    fn prompt_carries_provider_data() {
        let facts = NutritionFacts {
            calories: 61.0,
            protein: 3.1,
            ..Default::default()
        };
        let mut product = product_with(None, Some("Perú"), facts);
        product.name = "Leche Gloria Entera".to_string();
        product.brand = Some("Gloria".to_string());
        let prompt = analyzer().build_prompt(Some(&product), "7751271001234");
        assert!(prompt.contains("Leche Gloria Entera"));
        assert!(prompt.contains("Marca: Gloria"));
        assert!(prompt.contains("Usa estos datos reales"));
    }

    #[test]
    fn prompt_asks_for_estimation_when_unresolved() {
        let prompt = analyzer().build_prompt(None, "7751271001234");
        assert!(prompt.contains("7751271001234"));
        assert!(prompt.contains("estimated_nutrition_per_100g"));
    }
}
