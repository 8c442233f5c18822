use anyhow::Result;
use async_trait::async_trait;

use crate::enrichment::{
    build_profile, sustainability_for, AnalysisBundle, HealthAnalysis, NutritionAnalyzer,
};
use crate::providers::traits::{NutritionFacts, ProviderResult};

/// Deterministic enrichment backend used when no Gemini key is
/// configured. Scores straight from the nutrition facts; it cannot
/// estimate anything for a product no provider identified.
pub struct HeuristicAnalyzer;

#[async_trait]
impl NutritionAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn estimates_unidentified(&self) -> bool {
        false
    }

    async fn analyze(
        &self,
        product: Option<&ProviderResult>,
        _barcode: &str,
        _image: Option<&[u8]>,
    ) -> Result<AnalysisBundle> {
        let bundle = match product {
            Some(product) => AnalysisBundle {
                nutrition: build_profile(
                    product.nutrition_per_100g.clone(),
                    product.serving_size.as_deref(),
                    false,
                ),
                health: analyze_facts(product),
                sustainability: sustainability_for(Some(product)),
            },
            None => AnalysisBundle {
                nutrition: build_profile(NutritionFacts::default(), None, true),
                health: default_analysis(),
                sustainability: sustainability_for(None),
            },
        };
        Ok(bundle)
    }
}

fn analyze_facts(product: &ProviderResult) -> HealthAnalysis {
    let facts = &product.nutrition_per_100g;
    let category = product.category.as_deref().unwrap_or("").to_lowercase();

    let mut score: f64 = 5.0;
    if facts.protein > 10.0 {
        score += 1.0;
    }
    if facts.fiber > 3.0 {
        score += 1.0;
    }
    if facts.calories > 0.0 && facts.calories < 100.0 {
        score += 0.5;
    }
    if facts.sugar > 15.0 {
        score -= 1.5;
    }
    if facts.sodium > 500.0 {
        score -= 1.0;
    }
    if facts.fat > 20.0 {
        score -= 0.5;
    }
    if facts.calories > 400.0 {
        score -= 1.0;
    }
    if category.contains("bebida") && facts.sugar > 10.0 {
        score -= 2.0;
    }
    if category.contains("snack") || category.contains("dulce") {
        score -= 1.0;
    }
    let score = (score.max(1.0).min(10.0) * 10.0).round() / 10.0;

    let processing_level = processing_level(product);
    HealthAnalysis {
        health_score: score,
        processing_level: processing_level.clone(),
        benefits: benefits(facts),
        concerns: concerns(facts),
        consumption_recommendation: recommendation(score),
        healthier_alternatives: alternatives(&category, score),
        summary: summary(&product.name, score, &processing_level),
    }
}

/// NOVA group when the provider reports one, nutriment thresholds
/// otherwise.
fn processing_level(product: &ProviderResult) -> String {
    if let Some(nova) = product.nova_group {
        return match nova {
            1 => "mínimo".to_string(),
            2 | 3 => "procesado".to_string(),
            4 => "ultra-procesado".to_string(),
            _ => "no determinado".to_string(),
        };
    }
    let facts = &product.nutrition_per_100g;
    if facts.sodium > 600.0 || facts.sugar > 20.0 {
        "alto".to_string()
    } else if facts.sodium > 300.0 || facts.sugar > 10.0 {
        "moderado".to_string()
    } else {
        "mínimo".to_string()
    }
}

fn benefits(facts: &NutritionFacts) -> Vec<String> {
    let mut benefits = Vec::new();
    if facts.protein > 10.0 {
        benefits.push("Buena fuente de proteína".to_string());
    }
    if facts.fiber > 3.0 {
        benefits.push("Rico en fibra".to_string());
    }
    if facts.calcium > 100.0 {
        benefits.push("Fuente de calcio".to_string());
    }
    if facts.iron > 2.0 {
        benefits.push("Contiene hierro".to_string());
    }
    if facts.vitamin_c > 10.0 {
        benefits.push("Fuente de vitamina C".to_string());
    }
    if facts.calories > 0.0 && facts.calories < 100.0 {
        benefits.push("Bajo en calorías".to_string());
    }
    if benefits.is_empty() {
        benefits.push("Proporciona energía".to_string());
    }
    benefits
}

fn concerns(facts: &NutritionFacts) -> Vec<String> {
    let mut concerns = Vec::new();
    if facts.sugar > 15.0 {
        concerns.push("Alto contenido de azúcar".to_string());
    }
    if facts.sodium > 500.0 {
        concerns.push("Alto contenido de sodio".to_string());
    }
    if facts.saturated_fat > 5.0 {
        concerns.push("Alto en grasas saturadas".to_string());
    }
    if facts.calories > 400.0 {
        concerns.push("Alto en calorías".to_string());
    }
    if concerns.is_empty() {
        concerns.push("Sin preocupaciones nutricionales significativas".to_string());
    }
    concerns
}

fn recommendation(score: f64) -> String {
    if score >= 8.0 {
        "Excelente opción, puede consumirse regularmente como parte de una dieta equilibrada"
    } else if score >= 6.0 {
        "Buena opción, consumir con moderación dentro de una dieta balanceada"
    } else if score >= 4.0 {
        "Consumir ocasionalmente, no como parte regular de la dieta"
    } else {
        "Limitar el consumo, buscar alternativas más saludables"
    }
    .to_string()
}

fn alternatives(category: &str, score: f64) -> Vec<String> {
    if score >= 7.0 {
        return vec!["El producto ya es una opción saludable".to_string()];
    }
    let options: &[&str] = if category.contains("bebida") {
        &["Agua natural", "Agua con limón", "Té sin azúcar"]
    } else if category.contains("snack") {
        &["Frutas frescas", "Frutos secos", "Yogur natural"]
    } else if category.contains("dulce") {
        &["Frutas frescas", "Chocolate negro 70%+", "Frutos secos"]
    } else {
        &["Opciones integrales", "Productos con menos azúcar", "Alternativas caseras"]
    };
    options.iter().map(|s| s.to_string()).collect()
}

fn summary(name: &str, score: f64, processing: &str) -> String {
    if score >= 8.0 {
        format!("{} es una excelente opción nutricional con procesamiento {}.", name, processing)
    } else if score >= 6.0 {
        format!(
            "{} es una buena opción con procesamiento {}, adecuado para consumo moderado.",
            name, processing
        )
    } else if score >= 4.0 {
        format!("{} tiene procesamiento {} y debe consumirse ocasionalmente.", name, processing)
    } else {
        format!("{} es un producto {} que debe limitarse en la dieta.", name, processing)
    }
}

fn default_analysis() -> HealthAnalysis {
    HealthAnalysis {
        health_score: 5.0,
        processing_level: "no determinado".to_string(),
        benefits: vec!["Información nutricional limitada".to_string()],
        concerns: vec!["Análisis completo no disponible".to_string()],
        consumption_recommendation: "Consulta la información nutricional del empaque".to_string(),
        healthier_alternatives: vec!["Productos con información nutricional completa".to_string()],
        summary: "Análisis limitado debido a información insuficiente".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::tests::product_with;

    #[tokio::test]
    async fn sugary_beverages_score_low() {
        let facts = NutritionFacts {
            calories: 180.0,
            sugar: 25.0,
            sodium: 40.0,
            ..Default::default()
        };
        let mut product = product_with(None, None, facts);
        product.category = Some("Bebidas gaseosas".to_string());
        let bundle = HeuristicAnalyzer
            .analyze(Some(&product), "7751271001234", None)
            .await
            .unwrap();
        assert!(bundle.health.health_score < 4.0);
        assert!(bundle
            .health
            .concerns
            .iter()
            .any(|c| c == "Alto contenido de azúcar"));
        assert_eq!(bundle.health.processing_level, "alto");
    }

    #[tokio::test]
    async fn lean_protein_scores_high() {
        let facts = NutritionFacts {
            calories: 90.0,
            protein: 18.0,
            fiber: 4.0,
            sugar: 1.0,
            sodium: 60.0,
            ..Default::default()
        };
        let product = product_with(None, None, facts);
        let bundle = HeuristicAnalyzer
            .analyze(Some(&product), "7751271001234", None)
            .await
            .unwrap();
        assert!(bundle.health.health_score > 6.0);
        assert!(bundle
            .health
            .benefits
            .iter()
            .any(|b| b == "Buena fuente de proteína"));
    }

    #[tokio::test]
    async fn score_clamps_to_range() {
        let facts = NutritionFacts {
            calories: 600.0,
            sugar: 50.0,
            sodium: 1500.0,
            fat: 35.0,
            saturated_fat: 20.0,
            ..Default::default()
        };
        let mut product = product_with(None, None, facts);
        product.category = Some("Snacks dulces".to_string());
        let bundle = HeuristicAnalyzer
            .analyze(Some(&product), "7751271001234", None)
            .await
            .unwrap();
        assert!(bundle.health.health_score >= 1.0);
    }

    #[tokio::test]
    async fn nova_group_wins_over_thresholds() {
        let mut product = product_with(None, None, NutritionFacts::default());
        product.nova_group = Some(4);
        let bundle = HeuristicAnalyzer
            .analyze(Some(&product), "7751271001234", None)
            .await
            .unwrap();
        assert_eq!(bundle.health.processing_level, "ultra-procesado");
    }

    #[tokio::test]
    async fn unidentified_product_gets_conservative_defaults() {
        let bundle = HeuristicAnalyzer
            .analyze(None, "7751271001234", None)
            .await
            .unwrap();
        assert_eq!(bundle.health.health_score, 5.0);
        assert!(bundle.nutrition.estimated);
        assert!(bundle.nutrition.per_100g.is_empty());
    }
}
