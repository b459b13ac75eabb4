//! Alerting
//!
//! Decides which enriched events warrant an alert, formats the alert
//! message, and dispatches it asynchronously to the configured
//! notification channels (Slack and generic webhooks). Delivery
//! failures are logged and never fail the pipeline.

use crate::config::{AlertingConfig, SlackConfig, WebhookConfig};
use crate::models::{AlertMessage, AlertSeverity, EnrichedEvent, EventSummary};
use chrono::Utc;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Event names / finding types that always alert, regardless of score
pub const CRITICAL_EVENT_TYPES: &[&str] = &[
    "RootCredentialUsage",
    "UnauthorizedAPICall",
    "InstanceCredentialExfiltration",
];

/// Risk score at or above which an alert is labeled HIGH
const HIGH_SEVERITY_SCORE: u8 = 80;

/// Errors that can occur during alert dispatch
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Alert channel closed")]
    ChannelClosed,
}

/// Decides whether an enriched event should generate an alert
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    /// Minimum risk score that triggers an alert
    pub min_risk_score: u8,
    /// Minimum GuardDuty-style severity that triggers an alert
    pub min_severity: f64,
}

impl AlertPolicy {
    pub fn from_config(config: &AlertingConfig) -> Self {
        AlertPolicy {
            min_risk_score: config.min_risk_score,
            min_severity: config.min_severity,
        }
    }

    /// Alert on high risk scores, high-severity findings, known
    /// threats, and critical event types
    pub fn should_alert(&self, event: &EnrichedEvent) -> bool {
        if event.risk_score >= self.min_risk_score {
            return true;
        }
        if event.event.severity.unwrap_or(0.0) >= self.min_severity {
            return true;
        }
        if event.threat_intel.is_known_threat {
            return true;
        }

        let label = event.event.type_label();
        CRITICAL_EVENT_TYPES.iter().any(|t| label.contains(t))
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy {
            min_risk_score: 70,
            min_severity: 7.0,
        }
    }
}

/// Format an alert message for an enriched event
pub fn build_alert(event: &EnrichedEvent) -> AlertMessage {
    let severity = if event.risk_score >= HIGH_SEVERITY_SCORE {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    };

    AlertMessage {
        alert_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        severity,
        event_summary: EventSummary::from_event(event),
        recommendations: recommendations_for(event.event.type_label()),
    }
}

/// Recommendation text keyed on finding-type families
fn recommendations_for(type_label: &str) -> Vec<String> {
    let label = type_label.to_lowercase();
    let mut recommendations = Vec::new();

    if label.contains("credential") {
        recommendations.extend([
            "Immediately rotate affected credentials".to_string(),
            "Review IAM policies for excessive permissions".to_string(),
            "Enable API audit logging".to_string(),
        ]);
    }
    if label.contains("unauthorized") {
        recommendations.extend([
            "Block source IP address if malicious".to_string(),
            "Review network security groups".to_string(),
            "Implement additional access controls".to_string(),
        ]);
    }
    if label.contains("cryptocurrency") {
        recommendations.extend([
            "Terminate affected instances immediately".to_string(),
            "Scan for malware and backdoors".to_string(),
            "Review instance launch permissions".to_string(),
        ]);
    }

    if recommendations.is_empty() {
        recommendations = vec![
            "Review event details for context".to_string(),
            "Check related events in timeframe".to_string(),
            "Verify if activity was authorized".to_string(),
        ];
    }

    recommendations
}

/// Async alert dispatcher
///
/// Runs as a tokio task, receiving alert messages from the queue and
/// delivering them to all configured notification channels.
pub struct AlertDispatcher {
    config: AlertingConfig,
    client: Client,
}

impl AlertDispatcher {
    /// Create a new alert dispatcher with the given configuration
    pub fn new(config: AlertingConfig) -> Self {
        AlertDispatcher {
            config,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create the queue channel feeding a dispatcher
    pub fn create_channel() -> (mpsc::Sender<AlertMessage>, mpsc::Receiver<AlertMessage>) {
        mpsc::channel(100)
    }

    /// Run the alert dispatch loop
    ///
    /// This method should be called as a tokio task. It drains the
    /// channel until all senders are dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<AlertMessage>) {
        log::info!("Alert dispatcher started");

        while let Some(alert) = rx.recv().await {
            if !self.config.enabled {
                continue;
            }

            log::info!(
                "Dispatching alert {} ({}, score {})",
                alert.alert_id,
                alert.severity,
                alert.event_summary.risk_score
            );

            if let Err(e) = self.dispatch_alert(&alert).await {
                log::error!("Failed to dispatch alert: {}", e);
            }
        }

        log::info!("Alert dispatcher stopped");
    }

    /// Dispatch an alert to all configured channels
    async fn dispatch_alert(&self, alert: &AlertMessage) -> Result<(), AlertError> {
        let mut errors = Vec::new();

        if let Some(ref slack) = self.config.slack {
            if let Err(e) = self.send_slack_alert(slack, alert).await {
                log::error!("Slack alert failed: {}", e);
                errors.push(e);
            }
        }

        for webhook in &self.config.webhooks {
            if let Err(e) = self.send_generic_webhook(webhook, alert).await {
                log::error!("Webhook {} failed: {}", webhook.name, e);
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            // Return the first error (could be improved to aggregate)
            Err(errors.remove(0))
        }
    }

    /// Send an alert to Slack
    async fn send_slack_alert(
        &self,
        config: &SlackConfig,
        alert: &AlertMessage,
    ) -> Result<(), AlertError> {
        let color = match alert.severity {
            AlertSeverity::High => "danger",
            AlertSeverity::Medium => "warning",
        };

        let summary = &alert.event_summary;
        let payload = serde_json::json!({
            "channel": config.channel,
            "username": config.username.as_deref().unwrap_or("Vigil"),
            "icon_emoji": ":shield:",
            "attachments": [{
                "color": color,
                "title": alert.subject(),
                "fields": [
                    { "title": "Risk Score", "value": summary.risk_score.to_string(), "short": true },
                    { "title": "Severity", "value": alert.severity.to_string(), "short": true },
                    { "title": "Source IP", "value": summary.source_ip.as_deref().unwrap_or("N/A"), "short": true },
                    { "title": "Account", "value": summary.account.as_deref().unwrap_or("N/A"), "short": true },
                    { "title": "Region", "value": summary.region.as_deref().unwrap_or("N/A"), "short": true },
                ],
                "text": alert.recommendations.join("\n"),
                "ts": alert.timestamp.timestamp(),
            }]
        });

        let response = self
            .client
            .post(&config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!("Slack returned non-success status: {}", response.status());
        }

        Ok(())
    }

    /// Send an alert to a generic webhook
    async fn send_generic_webhook(
        &self,
        config: &WebhookConfig,
        alert: &AlertMessage,
    ) -> Result<(), AlertError> {
        let method = config.method.as_deref().unwrap_or("POST");

        let mut request = match method.to_uppercase().as_str() {
            "PUT" => self.client.put(&config.url),
            _ => self.client.post(&config.url),
        };

        if let Some(ref headers) = config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(alert).send().await?;

        if !response.status().is_success() {
            log::warn!(
                "Webhook {} returned non-success status: {}",
                config.name,
                response.status()
            );
        }

        Ok(())
    }
}

/// Synchronous alert queue for use in sync code
///
/// This wrapper provides a sync-friendly interface to queue alerts
/// that will be dispatched by the async AlertDispatcher.
#[derive(Clone)]
pub struct AlertQueue {
    tx: mpsc::Sender<AlertMessage>,
}

impl AlertQueue {
    /// Create a new alert queue with the given sender
    pub fn new(tx: mpsc::Sender<AlertMessage>) -> Self {
        AlertQueue { tx }
    }

    /// Queue an alert for dispatch (non-blocking)
    ///
    /// Uses try_send to avoid blocking the pipeline. If the queue is
    /// full, the alert is dropped and a warning logged.
    pub fn queue_alert(&self, alert: AlertMessage) {
        if let Err(e) = self.tx.try_send(alert) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    log::warn!("Alert queue full, dropping alert");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    log::warn!("Alert queue closed");
                }
            }
        }
    }

    /// Queue an alert (async version)
    pub async fn queue_alert_async(&self, alert: AlertMessage) -> Result<(), AlertError> {
        self.tx
            .send(alert)
            .await
            .map_err(|_| AlertError::ChannelClosed)
    }

    /// Check if the queue is closed
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
