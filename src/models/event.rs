use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a decoded security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Cloudtrail,
    GuarddutyFinding,
    AwsEvent,
    Custom,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Cloudtrail => "cloudtrail",
            EventKind::GuarddutyFinding => "guardduty-finding",
            EventKind::AwsEvent => "aws-event",
            EventKind::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// A decoded security event envelope, prior to enrichment.
///
/// Fields are optional because the supported source shapes (CloudTrail
/// record batches, GuardDuty findings, generic AWS events, flat custom
/// events) each carry a different subset. The full source payload is
/// retained in `event_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_id: Uuid,
    pub event_type: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// GuardDuty severity (0-10) or the numeric mapping of a named
    /// custom severity level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<serde_json::Value>,
    /// Original payload as received.
    pub event_data: serde_json::Value,
}

impl SecurityEvent {
    /// New envelope of the given kind wrapping the raw payload.
    pub fn new(event_type: EventKind, event_data: serde_json::Value) -> Self {
        SecurityEvent {
            event_id: Uuid::new_v4(),
            event_type,
            event_time: None,
            source_ip: None,
            user_identity: None,
            account: None,
            region: None,
            severity: None,
            finding_id: None,
            finding_type: None,
            finding_confidence: None,
            detail_type: None,
            resource_type: None,
            event_name: None,
            event_source: None,
            user_agent: None,
            error_code: None,
            error_message: None,
            read_only: None,
            resources: Vec::new(),
            event_data,
        }
    }

    /// Finding type or event name, whichever the source provided.
    /// This is the string the keyword-based risk rules match against.
    pub fn type_label(&self) -> &str {
        self.finding_type
            .as_deref()
            .or(self.event_name.as_deref())
            .unwrap_or("")
    }
}

/// Threat intelligence verdict attached during enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreatIntel {
    pub is_known_threat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<String>,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Keyword-derived threat categories found in the raw payload
    /// (failed_login, malware, network_anomaly, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl ThreatIntel {
    /// Verdict for an event with no blocklist or pattern match.
    pub fn clear() -> Self {
        ThreatIntel {
            is_known_threat: false,
            threat_type: None,
            confidence: 0,
            sources: Vec::new(),
            categories: Vec::new(),
        }
    }
}

/// Geographic context for a source IP address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoInfo {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_malicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// A security event after enrichment. Persisted write-once as a single
/// JSON object under a time-partitioned key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: SecurityEvent,
    pub processed_at: DateTime<Utc>,
    /// Risk score clamped to [0, 100].
    pub risk_score: u8,
    pub threat_intel: ThreatIntel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_info: Option<GeoInfo>,
}

impl EnrichedEvent {
    /// Timestamp used for partitioning: the event's own time when it
    /// carries one, otherwise the processing time.
    pub fn partition_time(&self) -> DateTime<Utc> {
        self.event.event_time.unwrap_or(self.processed_at)
    }
}

/// Outcome counters for one batch of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed_records: usize,
    pub failed_records: usize,
    pub alerts_generated: usize,
}

impl BatchSummary {
    pub fn merge(&mut self, other: BatchSummary) {
        self.processed_records += other.processed_records;
        self.failed_records += other.failed_records;
        self.alerts_generated += other.alerts_generated;
    }
}
