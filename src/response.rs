use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::barcode::validator::{self, BarcodeInfo};
use crate::barcode::DetectionMethod;
use crate::capability::CapabilitySet;
use crate::enrichment::{HealthAnalysis, NutritionalProfile, SustainabilityAnalysis};
use crate::providers::traits::Confidence;
use crate::resolver::{ProductSource, ScanOutcome};

/// The authoritative product block of a response. `source` always tells
/// the caller how (or whether) the product was identified; the remaining
/// fields are the winning provider's, or absent.
#[derive(Debug, Clone, Serialize)]
pub struct ProductInfo {
    pub source: ProductSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergens: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutriscore: Option<String>,
}

/// Final payload handed to the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub detection_method: DetectionMethod,
    pub barcode_info: BarcodeInfo,
    pub product_info: ProductInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutritional_analysis: Option<NutritionalProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_analysis: Option<HealthAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sustainability: Option<SustainabilityAnalysis>,
    pub capabilities: CapabilitySet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// Combine cascade outcome, enrichment output and request metadata into
/// the final payload. Pure assembly, no I/O.
pub fn assemble(
    outcome: ScanOutcome,
    method: DetectionMethod,
    capabilities: CapabilitySet,
) -> ScanResponse {
    let barcode_info = validator::analyze(&outcome.resolved.barcode);
    let provider = outcome.resolved.provider;

    let product_info = ProductInfo {
        source: outcome.resolved.source,
        provider: provider.as_ref().map(|p| p.provider_name.clone()),
        confidence: provider.as_ref().map(|p| p.confidence),
        name: provider.as_ref().map(|p| p.name.clone()),
        brand: provider.as_ref().and_then(|p| p.brand.clone()),
        category: provider.as_ref().and_then(|p| p.category.clone()),
        country_origin: provider.as_ref().and_then(|p| p.country_origin.clone()),
        ingredients: provider.as_ref().and_then(|p| p.ingredients.clone()),
        image_url: provider.as_ref().and_then(|p| p.image_url.clone()),
        packaging: provider.as_ref().and_then(|p| p.packaging.clone()),
        labels: provider.as_ref().and_then(|p| p.labels.clone()),
        allergens: provider.as_ref().and_then(|p| p.allergens.clone()),
        nutriscore: provider.as_ref().and_then(|p| p.nutriscore.clone()),
    };

    let (nutrition, health, sustainability) = match outcome.analysis {
        Some(bundle) => (
            Some(bundle.nutrition),
            Some(bundle.health),
            Some(bundle.sustainability),
        ),
        None => (None, None, None),
    };

    ScanResponse {
        success: outcome.enrichment_error.is_none(),
        detection_method: method,
        barcode_info,
        product_info,
        nutritional_analysis: nutrition,
        health_analysis: health,
        sustainability,
        capabilities,
        error: outcome.enrichment_error,
        scanned_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::heuristic::HeuristicAnalyzer;
    use crate::providers::traits::{
        LookupOutcome, NutritionFacts, ProductProvider, ProviderKind, ProviderResult,
    };
    use crate::resolver::ResolutionCascade;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct GloriaPrimary;

    #[async_trait]
    impl ProductProvider for GloriaPrimary {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Primary
        }

        fn name(&self) -> &'static str {
            "openfoodfacts"
        }

        async fn lookup(&self, barcode: &str) -> Result<LookupOutcome> {
            Ok(LookupOutcome::Found(ProviderResult {
                provider: ProviderKind::Primary,
                provider_name: "openfoodfacts".to_string(),
                confidence: crate::providers::traits::Confidence::High,
                name: "Leche Gloria Entera".to_string(),
                brand: Some("Gloria".to_string()),
                category: Some("Lácteos".to_string()),
                country_origin: Some("Perú".to_string()),
                ingredients: Some("Leche entera de vaca".to_string()),
                image_url: None,
                serving_size: Some("200ml".to_string()),
                packaging: Some("Lata".to_string()),
                labels: None,
                allergens: Some("Leche".to_string()),
                nova_group: Some(1),
                nutriscore: Some("B".to_string()),
                nutrition_per_100g: NutritionFacts {
                    calories: 61.0,
                    protein: 3.1,
                    fat: 3.5,
                    carbs: 4.7,
                    sugar: 4.7,
                    calcium: 120.0,
                    ..Default::default()
                },
                raw: serde_json::json!({ "code": barcode }),
            }))
        }
    }

    fn capabilities() -> CapabilitySet {
        CapabilitySet {
            optical_decoding_available: true,
            secondary_provider_enabled: false,
        }
    }

    #[tokio::test]
    async fn manual_gloria_scan_end_to_end() {
        let cascade = ResolutionCascade::new(
            vec![Arc::new(GloriaPrimary)],
            Arc::new(HeuristicAnalyzer),
        );
        let outcome = cascade.scan("7751271001234", None).await.unwrap();
        let response = assemble(outcome, DetectionMethod::Manual, capabilities());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["product_info"]["source"], "primary");
        assert_eq!(json["product_info"]["name"], "Leche Gloria Entera");
        assert_eq!(json["product_info"]["brand"], "Gloria");
        assert_eq!(json["detection_method"], "manual");
        assert_eq!(json["barcode_info"]["country"], "Perú");
        // The enrichment block is present and populated.
        assert!(json["nutritional_analysis"]["per_100g"]["calories"].as_f64().unwrap() > 0.0);
        assert!(json["health_analysis"]["health_score"].as_f64().is_some());
        assert_eq!(json["sustainability"]["carbon_footprint"], "Bajo");
    }

    #[tokio::test]
    async fn unresolved_scan_keeps_the_source_tag() {
        struct Miss;
        #[async_trait]
        impl ProductProvider for Miss {
            fn kind(&self) -> ProviderKind {
                ProviderKind::Primary
            }
            fn name(&self) -> &'static str {
                "openfoodfacts"
            }
            async fn lookup(&self, _barcode: &str) -> Result<LookupOutcome> {
                Ok(LookupOutcome::NotFound)
            }
        }

        let cascade =
            ResolutionCascade::new(vec![Arc::new(Miss)], Arc::new(HeuristicAnalyzer));
        let outcome = cascade.scan("7751271001234", None).await.unwrap();
        let response = assemble(outcome, DetectionMethod::Manual, capabilities());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["product_info"]["source"], "unresolved");
        assert!(json["product_info"].get("name").is_none());
        // Conservative analysis defaults are still attached.
        assert_eq!(json["health_analysis"]["health_score"], 5.0);
    }

    #[test]
    fn degraded_response_is_flagged_but_partial() {
        use crate::resolver::{ResolvedProduct, ScanOutcome};

        let outcome = ScanOutcome {
            resolved: ResolvedProduct {
                barcode: "7751271001234".to_string(),
                source: ProductSource::Primary,
                provider: None,
            },
            analysis: None,
            enrichment_error: Some("reasoning backend exploded".to_string()),
        };
        let response = assemble(outcome, DetectionMethod::ImageScan, capabilities());
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("reasoning backend exploded")
        );
        assert!(response.nutritional_analysis.is_none());
        assert_eq!(response.product_info.source, ProductSource::Primary);
    }
}
