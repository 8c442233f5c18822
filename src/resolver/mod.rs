use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::barcode::validator;
use crate::enrichment::{AnalysisBundle, NutritionAnalyzer};
use crate::error::ScanError;
use crate::providers::traits::{LookupOutcome, ProductProvider, ProviderKind, ProviderResult};

/// How (or whether) the product was identified. This is the only trace of
/// provider behavior the caller ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductSource {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "secondary")]
    Secondary,
    #[serde(rename = "ai-estimated")]
    AiEstimated,
    #[serde(rename = "unresolved")]
    Unresolved,
}

/// The authoritative view of one scanned product. Providers are never
/// merged field-by-field: `provider` is the single winning result, or
/// nothing at all.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProduct {
    pub barcode: String,
    pub source: ProductSource,
    pub provider: Option<ProviderResult>,
}

/// Resolution plus enrichment. `enrichment_error` set means the scan is
/// degraded: product data survives, analysis does not.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub resolved: ResolvedProduct,
    pub analysis: Option<AnalysisBundle>,
    pub enrichment_error: Option<String>,
}

/// Walks the ranked providers in strict priority order, stopping at the
/// first success, then always runs the enrichment pass. Sequential on
/// purpose: the secondary provider bills per call and must only be
/// reached when genuinely needed.
pub struct ResolutionCascade {
    providers: Vec<Arc<dyn ProductProvider>>,
    analyzer: Arc<dyn NutritionAnalyzer>,
}

impl ResolutionCascade {
    pub fn new(
        providers: Vec<Arc<dyn ProductProvider>>,
        analyzer: Arc<dyn NutritionAnalyzer>,
    ) -> Self {
        Self {
            providers,
            analyzer,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    /// Resolve a raw barcode and enrich the result. Validation failures
    /// are terminal and reach no provider; provider failures are absorbed
    /// here and only the final outcome is visible.
    pub async fn scan(&self, raw: &str, image: Option<&[u8]>) -> Result<ScanOutcome, ScanError> {
        let code = validator::normalize(raw)?;

        let provider_hit = self.query_providers(&code).await;
        let source = match &provider_hit {
            Some(result) => match result.provider {
                ProviderKind::Primary => ProductSource::Primary,
                ProviderKind::Secondary => ProductSource::Secondary,
            },
            None if self.analyzer.estimates_unidentified() => ProductSource::AiEstimated,
            None => ProductSource::Unresolved,
        };

        // Enrichment always runs: identified products still need the
        // judgment pass, unidentified ones get estimated from the bare
        // barcode (and image, when one was supplied).
        match self
            .analyzer
            .analyze(provider_hit.as_ref(), &code, image)
            .await
        {
            Ok(analysis) => Ok(ScanOutcome {
                resolved: ResolvedProduct {
                    barcode: code,
                    source,
                    provider: provider_hit,
                },
                analysis: Some(analysis),
                enrichment_error: None,
            }),
            Err(e) => {
                warn!("enrichment failed for {}: {:#}", code, e);
                let source = if provider_hit.is_some() {
                    source
                } else {
                    ProductSource::Unresolved
                };
                Ok(ScanOutcome {
                    resolved: ResolvedProduct {
                        barcode: code,
                        source,
                        provider: provider_hit,
                    },
                    analysis: None,
                    enrichment_error: Some(e.to_string()),
                })
            }
        }
    }

    async fn query_providers(&self, code: &str) -> Option<ProviderResult> {
        for provider in &self.providers {
            match provider.lookup(code).await {
                Ok(LookupOutcome::Found(result)) => {
                    info!("{} resolved {}", provider.name(), code);
                    return Some(result);
                }
                Ok(LookupOutcome::NotFound) => {
                    info!("{} has no entry for {}", provider.name(), code);
                }
                Err(e) => {
                    warn!("{} unavailable for {}: {:#}", provider.name(), code, e);
                }
            }
        }
        None
    }
}
