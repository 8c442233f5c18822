use thiserror::Error;

/// Everything a scan can fail with. Provider-level errors never appear
/// here directly: the cascade absorbs them and only the final outcome is
/// visible to the caller.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid barcode format: {0}")]
    InvalidBarcodeFormat(String),
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Enrichment failed: {0}")]
    EnrichmentFailure(String),
}
