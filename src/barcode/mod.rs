pub mod validator;

#[cfg(feature = "optical")]
pub mod optical;

use serde::{Deserialize, Serialize};

/// How the barcode reached us. Manual entry always wins over an attached
/// image when a request carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "image_scan")]
    ImageScan,
}

/// A barcode as it entered the current request. Lives only for the
/// request's duration.
#[derive(Debug, Clone)]
pub struct BarcodeInput {
    pub raw: String,
    pub origin: DetectionMethod,
}

impl BarcodeInput {
    pub fn manual(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            origin: DetectionMethod::Manual,
        }
    }

    pub fn decoded(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            origin: DetectionMethod::ImageScan,
        }
    }
}
