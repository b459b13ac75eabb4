use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EnrichedEvent;

/// Priority label carried on outbound alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    High,
    Medium,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::High => f.write_str("HIGH"),
            AlertSeverity::Medium => f.write_str("MEDIUM"),
        }
    }
}

/// Condensed view of the triggering event embedded in an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: Uuid,
    pub event_type: String,
    pub risk_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Formatted alert dispatched to the configured notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub alert_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub event_summary: EventSummary,
    pub recommendations: Vec<String>,
}

impl AlertMessage {
    /// Subject line for the alert, named after the finding when known.
    pub fn subject(&self) -> String {
        let label = self
            .event_summary
            .finding_type
            .as_deref()
            .unwrap_or("Unknown Event");
        format!("Security Alert: {}", label)
    }
}

impl EventSummary {
    pub fn from_event(event: &EnrichedEvent) -> Self {
        EventSummary {
            event_id: event.event.event_id,
            event_type: event.event.event_type.to_string(),
            risk_score: event.risk_score,
            source_ip: event.event.source_ip.clone(),
            finding_type: event.event.finding_type.clone(),
            account: event.event.account.clone(),
            region: event.event.region.clone(),
        }
    }
}
