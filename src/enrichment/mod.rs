pub mod gemini;
pub mod heuristic;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::enrichment::gemini::GeminiAnalyzer;
use crate::enrichment::heuristic::HeuristicAnalyzer;
use crate::providers::traits::{NutritionFacts, ProviderResult};

/// Structured nutrition view: facts per 100 g plus the same facts scaled
/// to the declared serving when the serving size is parseable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionalProfile {
    pub per_100g: NutritionFacts,
    pub serving_size: String,
    pub per_serving: NutritionFacts,
    /// True when the facts were estimated rather than provider-reported.
    pub estimated: bool,
}

/// The judgment layer provider data cannot supply on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthAnalysis {
    /// 1 (avoid) to 10 (excellent).
    pub health_score: f64,
    pub processing_level: String,
    pub benefits: Vec<String>,
    pub concerns: Vec<String>,
    pub consumption_recommendation: String,
    pub healthier_alternatives: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SustainabilityAnalysis {
    pub features: Vec<String>,
    pub carbon_footprint: String,
    pub packaging: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisBundle {
    pub nutrition: NutritionalProfile,
    pub health: HealthAnalysis,
    pub sustainability: SustainabilityAnalysis,
}

/// The generative-reasoning seam. Runs for every scan, identified product
/// or not; one outbound call, no automatic retry.
#[async_trait]
pub trait NutritionAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend can produce a meaningful profile for a
    /// product no provider identified. Decides between the
    /// `ai-estimated` and `unresolved` resolution sources.
    fn estimates_unidentified(&self) -> bool;

    async fn analyze(
        &self,
        product: Option<&ProviderResult>,
        barcode: &str,
        image: Option<&[u8]>,
    ) -> Result<AnalysisBundle>;
}

/// Pick the enrichment backend once at startup: Gemini when a key is
/// configured, the deterministic heuristic otherwise.
pub fn build_analyzer(config: &ScanConfig) -> Result<Arc<dyn NutritionAnalyzer>> {
    match &config.gemini_api_key {
        Some(key) => {
            let analyzer = GeminiAnalyzer::new(config, key.clone())?;
            info!("enrichment backend: gemini ({})", analyzer.model());
            Ok(Arc::new(analyzer))
        }
        None => {
            info!("GEMINI_API_KEY not configured, using heuristic enrichment");
            Ok(Arc::new(HeuristicAnalyzer))
        }
    }
}

/// Grams (or milliliters) named by a serving-size string like "30g" or
/// "200 ml". Non-numeric strings scale nothing.
pub(crate) fn serving_grams(serving: &str) -> Option<f64> {
    let digits: String = serving
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse::<f64>().ok().filter(|g| *g > 0.0)
}

pub(crate) fn build_profile(
    facts: NutritionFacts,
    serving_size: Option<&str>,
    estimated: bool,
) -> NutritionalProfile {
    let serving = serving_size.unwrap_or("100g").to_string();
    let per_serving = match serving_grams(&serving) {
        Some(grams) if serving != "100g" => facts.scaled(grams / 100.0),
        _ => facts.clone(),
    };
    NutritionalProfile {
        per_100g: facts,
        serving_size: serving,
        per_serving,
        estimated,
    }
}

/// Sustainability signals come straight from the label text and origin;
/// they are deterministic regardless of the enrichment backend.
pub(crate) fn sustainability_for(product: Option<&ProviderResult>) -> SustainabilityAnalysis {
    let labels = product
        .and_then(|p| p.labels.as_deref())
        .unwrap_or("")
        .to_lowercase();
    let local = product
        .map(|p| {
            p.country_origin
                .as_deref()
                .map(|c| c.eq_ignore_ascii_case("perú") || c.eq_ignore_ascii_case("peru"))
                .unwrap_or(false)
        })
        .unwrap_or(false);

    let mut features = Vec::new();
    if labels.contains("orgánico") || labels.contains("organic") {
        features.push("Producto orgánico".to_string());
    }
    if labels.contains("comercio justo") || labels.contains("fair trade") {
        features.push("Comercio justo".to_string());
    }
    if labels.contains("local") || local {
        features.push("Producto local".to_string());
    }

    SustainabilityAnalysis {
        features,
        carbon_footprint: if local {
            "Bajo".to_string()
        } else {
            "No determinado".to_string()
        },
        packaging: product
            .and_then(|p| p.packaging.clone())
            .unwrap_or_else(|| "No especificado".to_string()),
    }
}
