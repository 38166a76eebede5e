//! Structured audit records for discovery jobs

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    StartDiscovery,
    CompleteDiscovery,
    FailDiscovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Started,
    Success,
    Failed,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::StartDiscovery => "START_DISCOVERY",
            AuditAction::CompleteDiscovery => "COMPLETE_DISCOVERY",
            AuditAction::FailDiscovery => "FAIL_DISCOVERY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: String,
    pub action: AuditAction,
    /// Networks the job covers, comma separated; the job id goes in `details`
    pub target: String,
    pub details: serde_json::Value,
    pub result: AuditResult,
}

/// Fire-and-forget audit destination. Implementations must not block or fail the caller.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Writes audit records as structured log events on the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "audit",
            actor = %record.actor,
            action = %record.action,
            target_id = %record.target,
            result = ?record.result,
            details = %record.details,
            "discovery audit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes() {
        let record = AuditRecord {
            actor: "system".into(),
            action: AuditAction::FailDiscovery,
            target: "10.0.0.0/24".into(),
            details: serde_json::json!({"error": "boom"}),
            result: AuditResult::Failed,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "FAIL_DISCOVERY");
        assert_eq!(json["result"], "failed");
        assert_eq!(record.action.to_string(), "FAIL_DISCOVERY");
    }
}
