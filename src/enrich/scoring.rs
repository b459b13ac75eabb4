//! Risk scoring
//!
//! Produces a 0-100 score as a pure function of the extracted event and
//! the static threat-intel / geo lookups. No wall-clock reads: the
//! after-hours adjustment uses the event's own timestamp and is skipped
//! when the event carries none, so scoring the same input twice always
//! yields the same result.

use chrono::Timelike;

use crate::models::{GeoInfo, SecurityEvent, ThreatIntel};

/// Substrings of finding types / event names that mark high-risk
/// activity. Matched case-insensitively.
pub const HIGH_RISK_KEYWORDS: &[&str] = &[
    "UnauthorizedAPICall",
    "InstanceCredentialExfiltration",
    "CryptoCurrency",
    "Stealth",
    "Backdoor",
];

const KEYWORD_POINTS: i32 = 30;
const MALICIOUS_GEO_POINTS: i32 = 25;
const HIGH_RISK_COUNTRY_POINTS: i32 = 10;
const AFTER_HOURS_POINTS: i32 = 5;
const ERROR_POINTS: i32 = 10;

/// Risk scorer with a configurable high-risk country set
pub struct RiskScorer {
    high_risk_countries: Vec<String>,
}

impl RiskScorer {
    /// Scorer with the default high-risk country set
    pub fn new() -> Self {
        RiskScorer {
            high_risk_countries: vec!["CN".to_string(), "RU".to_string(), "KP".to_string()],
        }
    }

    /// Scorer with a custom high-risk country set
    pub fn with_countries(high_risk_countries: Vec<String>) -> Self {
        RiskScorer {
            high_risk_countries,
        }
    }

    /// Compute the risk score for an event given its lookups.
    ///
    /// Components:
    /// - base: severity x 10 (GuardDuty 0-10 scale), clamped;
    /// - +30 for a high-risk keyword in the finding type / event name;
    /// - +25 for a malicious geo verdict, +10 for a high-risk country;
    /// - +5 for after-hours activity (event-time hour < 6 or > 22 UTC);
    /// - +10 when the event carries an error code or message;
    /// - a blocklist hit raises the score to at least the match
    ///   confidence;
    /// - final clamp to [0, 100].
    pub fn score(
        &self,
        event: &SecurityEvent,
        geo: Option<&GeoInfo>,
        threat: &ThreatIntel,
    ) -> u8 {
        let mut score: i32 = 0;

        if let Some(severity) = event.severity {
            score += ((severity * 10.0).round() as i32).clamp(0, 100);
        }

        let label = event.type_label().to_lowercase();
        if HIGH_RISK_KEYWORDS
            .iter()
            .any(|kw| label.contains(&kw.to_lowercase()))
        {
            score += KEYWORD_POINTS;
        }

        if let Some(geo) = geo {
            if geo.is_malicious {
                score += MALICIOUS_GEO_POINTS;
            }
            if let Some(country) = geo.country.as_deref() {
                if self.high_risk_countries.iter().any(|c| c == country) {
                    score += HIGH_RISK_COUNTRY_POINTS;
                }
            }
        }

        if let Some(event_time) = event.event_time {
            let hour = event_time.hour();
            if hour < 6 || hour > 22 {
                score += AFTER_HOURS_POINTS;
            }
        }

        if event.error_code.is_some() || event.error_message.is_some() {
            score += ERROR_POINTS;
        }

        if threat.is_known_threat {
            score = score.max(i32::from(threat.confidence));
        }

        score.clamp(0, 100) as u8
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use chrono::{TimeZone, Utc};

    fn base_event() -> SecurityEvent {
        SecurityEvent::new(EventKind::GuarddutyFinding, serde_json::json!({}))
    }

    fn blocklist_hit() -> ThreatIntel {
        ThreatIntel {
            is_known_threat: true,
            threat_type: Some("malicious_ip".to_string()),
            confidence: 85,
            sources: vec!["internal_blocklist".to_string()],
            categories: vec![],
        }
    }

    fn geo(country: &str, malicious: bool) -> GeoInfo {
        GeoInfo {
            ip: "203.0.113.12".to_string(),
            country: Some(country.to_string()),
            city: None,
            latitude: 0.0,
            longitude: 0.0,
            is_malicious: malicious,
            asn: None,
            organization: None,
        }
    }

    #[test]
    fn test_documented_sample_severity_85() {
        // {event_type: guardduty-finding, severity: 8.5, source_ip: <known-bad>}
        // must score exactly 85
        let mut event = base_event();
        event.severity = Some(8.5);
        event.source_ip = Some("192.168.1.100".to_string());

        let scorer = RiskScorer::new();
        assert_eq!(scorer.score(&event, None, &blocklist_hit()), 85);
    }

    #[test]
    fn test_high_severity_known_bad_at_least_80() {
        let scorer = RiskScorer::new();
        for severity in [8.0, 8.5, 9.0, 10.0] {
            let mut event = base_event();
            event.severity = Some(severity);
            let score = scorer.score(&event, None, &blocklist_hit());
            assert!(score >= 80, "severity {} scored {}", severity, score);
        }
    }

    #[test]
    fn test_keyword_bonus_clamps_at_100() {
        let mut event = base_event();
        event.severity = Some(8.5);
        event.finding_type = Some("UnauthorizedAPICall:EC2/MaliciousIPCaller.Custom".to_string());

        let scorer = RiskScorer::new();
        // 85 + 30 exceeds the cap
        assert_eq!(scorer.score(&event, None, &blocklist_hit()), 100);
    }

    #[test]
    fn test_benign_login_stays_low() {
        let mut event = SecurityEvent::new(EventKind::AwsEvent, serde_json::json!({}));
        event.event_name = Some("ConsoleLogin".to_string());
        event.source_ip = Some("203.0.113.12".to_string());
        event.event_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, 23, 30, 0).unwrap());

        let scorer = RiskScorer::new();
        let score = scorer.score(&event, Some(&geo("US", false)), &ThreatIntel::clear());
        assert!(score <= 20, "benign login scored {}", score);
    }

    #[test]
    fn test_score_always_in_bounds() {
        let scorer = RiskScorer::new();
        for tenth in 0..=150 {
            let mut event = base_event();
            event.severity = Some(f64::from(tenth) / 10.0);
            event.finding_type = Some("Backdoor:EC2/C&CActivity".to_string());
            event.error_code = Some("AccessDenied".to_string());
            event.event_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, 3, 0, 0).unwrap());

            let score = scorer.score(&event, Some(&geo("KP", true)), &blocklist_hit());
            assert!(score <= 100);
        }
    }

    #[test]
    fn test_negative_severity_does_not_underflow() {
        let mut event = base_event();
        event.severity = Some(-3.0);
        let scorer = RiskScorer::new();
        assert_eq!(scorer.score(&event, None, &ThreatIntel::clear()), 0);
    }

    #[test]
    fn test_geo_adjustments() {
        let scorer = RiskScorer::new();
        let mut event = base_event();
        event.severity = Some(2.0);

        let clear = ThreatIntel::clear();
        assert_eq!(scorer.score(&event, None, &clear), 20);
        assert_eq!(scorer.score(&event, Some(&geo("US", false)), &clear), 20);
        assert_eq!(scorer.score(&event, Some(&geo("RU", false)), &clear), 30);
        assert_eq!(scorer.score(&event, Some(&geo("US", true)), &clear), 45);
        assert_eq!(scorer.score(&event, Some(&geo("CN", true)), &clear), 55);
    }

    #[test]
    fn test_after_hours_adjustment() {
        let scorer = RiskScorer::new();
        let clear = ThreatIntel::clear();

        let mut event = base_event();
        event.severity = Some(1.0);
        event.event_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, 3, 0, 0).unwrap());
        assert_eq!(scorer.score(&event, None, &clear), 15);

        event.event_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap());
        assert_eq!(scorer.score(&event, None, &clear), 15);

        event.event_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(scorer.score(&event, None, &clear), 10);

        // no event time, no adjustment
        event.event_time = None;
        assert_eq!(scorer.score(&event, None, &clear), 10);
    }

    #[test]
    fn test_error_adjustment() {
        let scorer = RiskScorer::new();
        let mut event = SecurityEvent::new(EventKind::Cloudtrail, serde_json::json!({}));
        event.error_message = Some("Access denied".to_string());
        assert_eq!(scorer.score(&event, None, &ThreatIntel::clear()), 10);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let mut event = base_event();
        event.severity = Some(6.5);
        event.finding_type = Some("Stealth:IAMUser/CloudTrailLoggingDisabled".to_string());
        event.event_time = Some(Utc.with_ymd_and_hms(2025, 6, 1, 23, 30, 0).unwrap());

        let scorer = RiskScorer::new();
        let threat = blocklist_hit();
        let geo = geo("RU", false);
        let first = scorer.score(&event, Some(&geo), &threat);
        let second = scorer.score(&event, Some(&geo), &threat);
        assert_eq!(first, second);
        // 65 + 30 + 10 + 5 = 100 cap
        assert_eq!(first, 100);
    }

    #[test]
    fn test_blocklist_floor_not_additive() {
        // confidence floors the score, it does not stack on top
        let mut event = base_event();
        event.severity = Some(9.0);
        let scorer = RiskScorer::new();
        assert_eq!(scorer.score(&event, None, &blocklist_hit()), 90);

        event.severity = Some(3.0);
        assert_eq!(scorer.score(&event, None, &blocklist_hit()), 85);
    }
}
