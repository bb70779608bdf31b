//! # Settlement Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fogon_core::access_key::Environment;
use fogon_core::DOC_TYPE_INVOICE;

/// Configuration for the settlement service.
///
/// Deserializable so the embedding surface can load it from its config
/// file. Issuer identity (tax id, establishment, emission point) lives on
/// [`fogon_core::CompanyProfile`], not here.
///
/// ```rust,ignore
/// let config = SettlementConfig::default().environment(Environment::Production);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Authority environment stamped into every access key.
    pub environment: Environment,

    /// Document type issued at settlement. Default: invoice ("01").
    pub doc_type: String,

    /// How long to wait for an authority verdict before declaring the
    /// submission indeterminate. Default: 10 seconds.
    pub submit_timeout: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        SettlementConfig {
            environment: Environment::Test,
            doc_type: DOC_TYPE_INVOICE.to_string(),
            submit_timeout: Duration::from_secs(10),
        }
    }
}

impl SettlementConfig {
    /// Sets the authority environment.
    pub fn environment(mut self, env: Environment) -> Self {
        self.environment = env;
        self
    }

    /// Sets the submission timeout.
    pub fn submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }
}
