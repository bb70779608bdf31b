//! # Tax Authority Gateway
//!
//! The [`AuthorityClient`] trait is the seam between the settlement
//! pipeline and the tax authority's reception service. The production
//! transport is out of scope; [`SimulatedAuthority`] stands in for it with
//! configurable latency and approval behavior, and remembers every verdict
//! so a status query after a lost response returns the same answer the
//! original submission got.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::error::FiscalResult;
use fogon_core::access_key::verify_access_key;

// =============================================================================
// Verdict
// =============================================================================

/// The authority's answer to a submission or status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityVerdict {
    Authorized {
        authorization_code: String,
        raw_response: String,
    },
    Rejected {
        reason: String,
        raw_response: String,
    },
    /// No verdict yet (only meaningful for status queries).
    Pending,
}

// =============================================================================
// Client Trait
// =============================================================================

/// Transport to the tax authority's reception service.
///
/// `submit` sends a signed document; `query_status` asks for the current
/// verdict on an access key, used to resolve documents left pending by a
/// lost submission response.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    async fn submit(&self, access_key: &str, signed_text: &str) -> FiscalResult<AuthorityVerdict>;

    async fn query_status(&self, access_key: &str) -> FiscalResult<AuthorityVerdict>;
}

// =============================================================================
// Simulated Authority
// =============================================================================

/// In-process stand-in for the authority's reception service.
///
/// Behavior:
/// - sleeps `latency` per call
/// - rejects any document whose access key fails the checksum
/// - otherwise authorizes with probability `approval_rate`
/// - remembers verdicts, so `query_status` is consistent with the original
///   submission
pub struct SimulatedAuthority {
    approval_rate: f64,
    latency: Duration,
    verdicts: Mutex<HashMap<String, AuthorityVerdict>>,
}

impl SimulatedAuthority {
    pub fn new(approval_rate: f64, latency: Duration) -> Self {
        SimulatedAuthority {
            approval_rate: approval_rate.clamp(0.0, 1.0),
            latency,
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    /// An authority that approves every well-formed document immediately.
    pub fn always_approving() -> Self {
        Self::new(1.0, Duration::ZERO)
    }

    fn decide(&self, access_key: &str) -> AuthorityVerdict {
        if !verify_access_key(access_key) {
            return AuthorityVerdict::Rejected {
                reason: "CLAVE ACCESO REGISTRADA: checksum invalido".to_string(),
                raw_response: format!("{{\"estado\":\"DEVUELTA\",\"claveAcceso\":\"{access_key}\"}}"),
            };
        }

        let approved = rand::thread_rng().gen_bool(self.approval_rate);
        if approved {
            let code = format!("{}-{}", Utc::now().format("%d%m%Y%H%M%S"), &access_key[..10]);
            AuthorityVerdict::Authorized {
                authorization_code: code.clone(),
                raw_response: format!(
                    "{{\"estado\":\"AUTORIZADO\",\"numeroAutorizacion\":\"{code}\"}}"
                ),
            }
        } else {
            AuthorityVerdict::Rejected {
                reason: "DOCUMENTO DEVUELTO".to_string(),
                raw_response: format!("{{\"estado\":\"DEVUELTA\",\"claveAcceso\":\"{access_key}\"}}"),
            }
        }
    }
}

#[async_trait]
impl AuthorityClient for SimulatedAuthority {
    async fn submit(&self, access_key: &str, _signed_text: &str) -> FiscalResult<AuthorityVerdict> {
        tokio::time::sleep(self.latency).await;

        let verdict = {
            let mut verdicts = self.verdicts.lock().unwrap_or_else(|e| e.into_inner());
            verdicts
                .entry(access_key.to_string())
                .or_insert_with(|| self.decide(access_key))
                .clone()
        };

        debug!(access_key = %access_key, verdict = ?verdict_kind(&verdict), "Simulated submission");
        Ok(verdict)
    }

    async fn query_status(&self, access_key: &str) -> FiscalResult<AuthorityVerdict> {
        tokio::time::sleep(self.latency).await;

        let verdict = {
            let verdicts = self.verdicts.lock().unwrap_or_else(|e| e.into_inner());
            verdicts
                .get(access_key)
                .cloned()
                .unwrap_or(AuthorityVerdict::Pending)
        };

        debug!(access_key = %access_key, verdict = ?verdict_kind(&verdict), "Simulated status query");
        Ok(verdict)
    }
}

fn verdict_kind(verdict: &AuthorityVerdict) -> &'static str {
    match verdict {
        AuthorityVerdict::Authorized { .. } => "authorized",
        AuthorityVerdict::Rejected { .. } => "rejected",
        AuthorityVerdict::Pending => "pending",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
