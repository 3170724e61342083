//! Provisioning wire types.

use serde::{Deserialize, Serialize};

/// Function name every provisioning call targets.
pub const PROVISION_TARGET: &str = "lambda-handler";

/// Seconds a provisioned worker keeps serving before it exits on its own.
pub const MAX_SERVE_SECONDS: i64 = 15;

/// Payload sent to a newly provisioned worker.
///
/// Field names are fixed by the worker side, which decodes
/// `{"CallBackServer": "...", "MaxServeTime": 15}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Address the worker dials back to receive work.
    #[serde(rename = "CallBackServer")]
    pub callback_address: String,
    #[serde(rename = "MaxServeTime")]
    pub max_serve_seconds: i64,
}

impl ProvisionRequest {
    /// Build a request with the standard serve window.
    pub fn new(callback_address: impl Into<String>) -> Self {
        Self {
            callback_address: callback_address.into(),
            max_serve_seconds: MAX_SERVE_SECONDS,
        }
    }

    /// Encode to the JSON payload the provisioner forwards verbatim.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
