//! Canonicalization of agent result payloads.
//!
//! Pure functions only; reading and writing the files lives in
//! [`crate::io::result_store`].

use crate::core::types::{AgentResult, ArtifactInfo, DEFAULT_RISK, LegacyStatus, SignalInfo};

impl AgentResult {
    /// Return the canonical form of this result.
    ///
    /// Lists are always present after deserialization, so the remaining work is
    /// trimming `signals.risk` and defaulting it to [`DEFAULT_RISK`]. Applying
    /// this twice yields the same value as applying it once.
    pub fn normalize(mut self) -> Self {
        let risk = self.signals.risk.trim();
        self.signals.risk = if risk.is_empty() {
            DEFAULT_RISK.to_string()
        } else {
            risk.to_string()
        };
        self
    }

    /// Upgrade a legacy status payload to the canonical schema.
    pub fn from_status(status: LegacyStatus) -> Self {
        let notes = status.reason.clone();
        AgentResult {
            summary: status.summary,
            work: status.work,
            artifacts: ArtifactInfo::default(),
            signals: SignalInfo {
                plateau_suspected: false,
                risk: DEFAULT_RISK.to_string(),
                notes,
            },
            errors: status.errors,
            decision: status.decision,
            reason: status.reason,
        }
        .normalize()
    }
}

impl From<LegacyStatus> for AgentResult {
    fn from(status: LegacyStatus) -> Self {
        AgentResult::from_status(status)
    }
}
