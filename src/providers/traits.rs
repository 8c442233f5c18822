use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Rank of a provider inside the cascade. Selection is strictly ordinal;
/// there is no scoring or voting across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Primary,
    Secondary,
}

/// How much the provider's data can be trusted. OpenFoodFacts carries
/// community-maintained nutriments, UPCItemDB only catalog metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Raw nutrition facts per 100 g as reported by a provider. Missing
/// nutriments stay at zero, matching the upstream payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionFacts {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub sodium: f64,
    pub salt: f64,
    pub saturated_fat: f64,
    pub calcium: f64,
    pub iron: f64,
    pub vitamin_c: f64,
}

impl NutritionFacts {
    pub fn is_empty(&self) -> bool {
        self == &NutritionFacts::default()
    }

    /// Scale every nutriment, used to derive per-serving values.
    pub fn scaled(&self, factor: f64) -> Self {
        let round1 = |v: f64| (v * factor * 10.0).round() / 10.0;
        Self {
            calories: round1(self.calories),
            protein: round1(self.protein),
            carbs: round1(self.carbs),
            fat: round1(self.fat),
            fiber: round1(self.fiber),
            sugar: round1(self.sugar),
            sodium: round1(self.sodium),
            salt: round1(self.salt),
            saturated_fat: round1(self.saturated_fat),
            calcium: round1(self.calcium),
            iron: round1(self.iron),
            vitamin_c: round1(self.vitamin_c),
        }
    }
}

/// One provider's view of a product. Ephemeral, produced per lookup call;
/// exactly one of these becomes authoritative for a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: ProviderKind,
    pub provider_name: String,
    pub confidence: Confidence,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub country_origin: Option<String>,
    pub ingredients: Option<String>,
    pub image_url: Option<String>,
    pub serving_size: Option<String>,
    pub packaging: Option<String>,
    pub labels: Option<String>,
    pub allergens: Option<String>,
    pub nova_group: Option<u8>,
    pub nutriscore: Option<String>,
    pub nutrition_per_100g: NutritionFacts,
    /// The provider's payload as received, for clients that want fields
    /// the structured view drops.
    pub raw: serde_json::Value,
}

/// Outcome of a single provider lookup. Transport and HTTP failures are
/// `Err` on the call itself and never abort the cascade.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(ProviderResult),
    NotFound,
}

/// Uniform lookup capability the cascade walks in priority order.
#[async_trait]
pub trait ProductProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &'static str;

    async fn lookup(&self, barcode: &str) -> Result<LookupOutcome>;
}
