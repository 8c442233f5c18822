use std::env;
use std::time::Duration;

/// Immutable service configuration, captured once at startup and passed
/// explicitly to the clients that need it. Secrets are never re-read from
/// the environment at call time.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Gemini API key. Absent means the heuristic enrichment backend runs.
    pub gemini_api_key: Option<String>,
    /// UPCItemDB API key. Absent means the secondary provider is skipped
    /// for every request, for the lifetime of the process.
    pub upcitemdb_api_key: Option<String>,
    /// Per provider/enrichment call timeout.
    pub provider_timeout: Duration,
    /// Whole-request deadline enforced around the scan.
    pub request_deadline: Duration,
    pub user_agent: String,
}

impl ScanConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            upcitemdb_api_key: env::var("UPC_DATABASE_API_KEY").ok().filter(|k| !k.is_empty()),
            provider_timeout: Duration::from_secs(
                env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(5),
            ),
            request_deadline: Duration::from_secs(
                env::var("REQUEST_DEADLINE_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(10),
            ),
            user_agent: env::var("SCAN_USER_AGENT")
                .unwrap_or_else(|_| "NutriScan/1.0 (Peru Food Scanner)".to_string()),
        }
    }
}
