use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Prefix assigned to Peruvian products by GS1.
const PERU_PREFIX: &str = "775";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "GTIN-14")]
    Gtin14,
}

impl Symbology {
    fn from_len(len: usize) -> Option<Self> {
        match len {
            8 => Some(Symbology::Ean8),
            12 => Some(Symbology::UpcA),
            13 => Some(Symbology::Ean13),
            14 => Some(Symbology::Gtin14),
            _ => None,
        }
    }
}

/// Advisory analysis of a normalized barcode, surfaced in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeInfo {
    pub barcode: String,
    pub format: Symbology,
    pub country: String,
    pub check_digit_valid: bool,
    pub is_local_product: bool,
}

/// Strip every non-digit character and gate on the supported lengths.
/// Runs before any network call; failures here are terminal and consume
/// no provider quota.
pub fn normalize(raw: &str) -> Result<String, ScanError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match Symbology::from_len(digits.len()) {
        Some(_) => Ok(digits),
        None => Err(ScanError::InvalidBarcodeFormat(format!(
            "expected 8, 12, 13 or 14 digits, got {} in '{}'",
            digits.len(),
            raw
        ))),
    }
}

/// Analyze an already-normalized code. The check digit is advisory only:
/// upstream data sources accept codes with non-standard check digits, so
/// an invalid one is reported, never rejected.
pub fn analyze(code: &str) -> BarcodeInfo {
    let format = Symbology::from_len(code.len()).unwrap_or(Symbology::Ean13);
    // GTIN-14 prepends a packaging indicator digit to the EAN-13 body.
    let gs1_prefix = match format {
        Symbology::Ean13 => &code[..3],
        Symbology::Gtin14 => &code[1..4],
        _ => "",
    };
    let country = match format {
        Symbology::UpcA => "Estados Unidos/Canadá".to_string(),
        Symbology::Ean8 => "Variable".to_string(),
        _ => country_by_prefix(gs1_prefix),
    };
    BarcodeInfo {
        barcode: code.to_string(),
        format,
        country,
        check_digit_valid: check_digit_valid(code),
        is_local_product: gs1_prefix == PERU_PREFIX,
    }
}

/// GS1 mod-10: alternating 3/1 weights from the right, excluding the
/// check digit itself.
pub fn check_digit_valid(code: &str) -> bool {
    let digits: Vec<u32> = code.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != code.len() || digits.is_empty() {
        return false;
    }
    let check = digits[digits.len() - 1];
    let sum: u32 = digits[..digits.len() - 1]
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10 == check
}

/// Country hint for the most common GS1 prefixes, with the Latin American
/// ranges the original market cares about listed first.
fn country_by_prefix(prefix: &str) -> String {
    let ranges: &[(&str, &str, &str)] = &[
        ("775", "775", "Perú"),
        ("770", "771", "Colombia"),
        ("773", "773", "Uruguay"),
        ("779", "779", "Argentina"),
        ("780", "789", "Chile"),
        ("740", "745", "Guatemala"),
        ("750", "750", "México"),
        ("690", "699", "China"),
        ("300", "379", "Francia"),
        ("400", "440", "Alemania"),
        ("800", "839", "Italia"),
        ("500", "509", "Reino Unido"),
    ];
    for (start, end, country) in ranges {
        if prefix >= *start && prefix <= *end {
            return (*country).to_string();
        }
    }
    "No identificado".to_string()
}
