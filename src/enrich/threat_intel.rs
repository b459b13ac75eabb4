//! Threat intelligence checks
//!
//! Two signals are attached to every event: an IP blocklist verdict and
//! a keyword classification of the raw payload into threat categories.
//! Both are static lookups, so re-running enrichment on the same input
//! produces the same verdict.

use regex::RegexSet;
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{SecurityEvent, ThreatIntel};

/// Confidence reported for a blocklist hit
pub const BLOCKLIST_CONFIDENCE: u8 = 85;

/// Errors that can occur while loading threat intelligence data
#[derive(Error, Debug)]
pub enum ThreatIntelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address in blocklist line {line}: {value}")]
    InvalidAddress { line: usize, value: String },

    #[error("Pattern compile error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Known-bad IP blocklist plus payload keyword classifier
pub struct ThreatIntelService {
    blocklist: HashSet<IpAddr>,
    categories: Vec<(String, RegexSet)>,
}

/// Keyword families used to classify payload text into categories.
/// Matching is case-insensitive against the serialized event.
const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    (
        "failed_login",
        &["authentication failed", "login failed", "invalid credentials"],
    ),
    (
        "malware",
        &["virus detected", "trojan", "malware", "suspicious file"],
    ),
    (
        "network_anomaly",
        &["port scan", "ddos", "unusual traffic", "network intrusion"],
    ),
    (
        "privilege_escalation",
        &["admin access", "privilege escalation", "unauthorized access"],
    ),
    (
        "data_exfiltration",
        &["large download", "data export", "file transfer", "sensitive data"],
    ),
];

/// Addresses flagged regardless of any configured blocklist file
const BUILTIN_BLOCKLIST: &[&str] = &["192.168.1.100", "10.0.0.50"];

impl ThreatIntelService {
    /// Create a service with the built-in blocklist only
    pub fn builtin() -> Self {
        // Built-in patterns and addresses are known-valid
        Self::build(BUILTIN_BLOCKLIST.iter().map(|s| {
            IpAddr::from_str(s).expect("built-in blocklist entry must parse")
        }))
    }

    /// Create a service whose blocklist extends the built-in entries
    /// with addresses from a file (one per line, `#` starts a comment)
    pub fn with_blocklist_file<P: AsRef<Path>>(path: P) -> Result<Self, ThreatIntelError> {
        let contents = std::fs::read_to_string(path)?;
        let mut extra = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let entry = line.split('#').next().unwrap_or("").trim();
            if entry.is_empty() {
                continue;
            }
            let ip = IpAddr::from_str(entry).map_err(|_| ThreatIntelError::InvalidAddress {
                line: idx + 1,
                value: entry.to_string(),
            })?;
            extra.push(ip);
        }

        let builtin = BUILTIN_BLOCKLIST
            .iter()
            .map(|s| IpAddr::from_str(s).expect("built-in blocklist entry must parse"));
        Ok(Self::build(builtin.chain(extra)))
    }

    fn build(blocklist: impl IntoIterator<Item = IpAddr>) -> Self {
        let categories = CATEGORY_PATTERNS
            .iter()
            .map(|(name, patterns)| {
                let escaped: Vec<String> = patterns
                    .iter()
                    .map(|p| format!("(?i){}", regex::escape(p)))
                    .collect();
                let set = RegexSet::new(&escaped).expect("category patterns must compile");
                (name.to_string(), set)
            })
            .collect();

        ThreatIntelService {
            blocklist: blocklist.into_iter().collect(),
            categories,
        }
    }

    /// Evaluate an event against the blocklist and category patterns
    pub fn check(&self, event: &SecurityEvent) -> ThreatIntel {
        let mut intel = ThreatIntel::clear();

        if let Some(ip_str) = event.source_ip.as_deref() {
            if ip_str != "unknown" {
                if let Ok(ip) = IpAddr::from_str(ip_str) {
                    if self.blocklist.contains(&ip) {
                        intel.is_known_threat = true;
                        intel.threat_type = Some("malicious_ip".to_string());
                        intel.confidence = BLOCKLIST_CONFIDENCE;
                        intel.sources = vec!["internal_blocklist".to_string()];
                    }
                }
            }
        }

        let payload_text = event.event_data.to_string().to_lowercase();
        for (name, set) in &self.categories {
            if set.is_match(&payload_text) {
                intel.categories.push(name.clone());
            }
        }

        intel
    }

    /// Whether an address string is on the blocklist
    pub fn is_listed(&self, ip_str: &str) -> bool {
        IpAddr::from_str(ip_str)
            .map(|ip| self.blocklist.contains(&ip))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use std::io::Write;

    fn event_with_ip(ip: &str) -> SecurityEvent {
        let mut event = SecurityEvent::new(EventKind::Custom, serde_json::json!({}));
        event.source_ip = Some(ip.to_string());
        event
    }

    #[test]
    fn test_builtin_blocklist_hit() {
        let service = ThreatIntelService::builtin();
        let intel = service.check(&event_with_ip("192.168.1.100"));

        assert!(intel.is_known_threat);
        assert_eq!(intel.threat_type.as_deref(), Some("malicious_ip"));
        assert_eq!(intel.confidence, 85);
        assert_eq!(intel.sources, vec!["internal_blocklist"]);
    }

    #[test]
    fn test_clean_ip_miss() {
        let service = ThreatIntelService::builtin();
        let intel = service.check(&event_with_ip("203.0.113.12"));

        assert!(!intel.is_known_threat);
        assert_eq!(intel.confidence, 0);
        assert!(intel.threat_type.is_none());
        assert!(intel.sources.is_empty());
    }

    #[test]
    fn test_missing_and_unknown_ip() {
        let service = ThreatIntelService::builtin();
        let event = SecurityEvent::new(EventKind::Custom, serde_json::json!({}));
        assert!(!service.check(&event).is_known_threat);
        assert!(!service.check(&event_with_ip("unknown")).is_known_threat);
    }

    #[test]
    fn test_blocklist_file_extends_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# bad actors").unwrap();
        writeln!(file, "198.51.100.7").unwrap();
        writeln!(file, "2001:db8::bad # ipv6 entry").unwrap();
        writeln!(file).unwrap();

        let service = ThreatIntelService::with_blocklist_file(file.path()).unwrap();
        assert!(service.is_listed("198.51.100.7"));
        assert!(service.is_listed("2001:db8::bad"));
        // built-in entries survive
        assert!(service.is_listed("10.0.0.50"));
    }

    #[test]
    fn test_blocklist_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-an-address").unwrap();

        let result = ThreatIntelService::with_blocklist_file(file.path());
        assert!(matches!(
            result,
            Err(ThreatIntelError::InvalidAddress { line: 1, .. })
        ));
    }

    #[test]
    fn test_category_classification() {
        let service = ThreatIntelService::builtin();
        let mut event = SecurityEvent::new(
            EventKind::Custom,
            serde_json::json!({
                "description": "Authentication failed for admin, Trojan dropper detected"
            }),
        );
        event.source_ip = Some("203.0.113.12".to_string());

        let intel = service.check(&event);
        assert!(intel.categories.contains(&"failed_login".to_string()));
        assert!(intel.categories.contains(&"malware".to_string()));
        assert!(!intel.categories.contains(&"network_anomaly".to_string()));
    }

    #[test]
    fn test_check_is_deterministic() {
        let service = ThreatIntelService::builtin();
        let event = event_with_ip("10.0.0.50");
        assert_eq!(service.check(&event), service.check(&event));
    }
}
