use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;

/// Process-lifetime capability flags. Detected once at startup and shared
/// read-only across every request; the environment does not change at
/// runtime, so nothing here is ever re-probed or mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub optical_decoding_available: bool,
    pub secondary_provider_enabled: bool,
}

impl CapabilitySet {
    pub fn detect(config: &ScanConfig) -> Self {
        let caps = Self {
            optical_decoding_available: cfg!(feature = "optical"),
            secondary_provider_enabled: config.upcitemdb_api_key.is_some(),
        };
        info!(
            "capabilities: optical decoding {}, secondary provider {}",
            if caps.optical_decoding_available { "available" } else { "unavailable" },
            if caps.secondary_provider_enabled { "enabled" } else { "disabled" },
        );
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(upc_key: Option<&str>) -> ScanConfig {
        ScanConfig {
            gemini_api_key: None,
            upcitemdb_api_key: upc_key.map(String::from),
            provider_timeout: Duration::from_secs(5),
            request_deadline: Duration::from_secs(10),
            user_agent: "test".to_string(),
        }
    }

    #[test]
    fn secondary_follows_the_configured_credential() {
        assert!(!CapabilitySet::detect(&config(None)).secondary_provider_enabled);
        assert!(CapabilitySet::detect(&config(Some("key"))).secondary_provider_enabled);
    }

    #[test]
    fn optical_flag_matches_the_build() {
        let caps = CapabilitySet::detect(&config(None));
        assert_eq!(caps.optical_decoding_available, cfg!(feature = "optical"));
    }
}
