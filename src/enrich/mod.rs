//! Event enrichment
//!
//! Turns a decoded payload into an `EnrichedEvent`: shape classification
//! and field extraction, threat-intel verdict, geo lookup, and the risk
//! score. Enrichment happens exactly once per record.

pub mod extract;
pub mod scoring;
pub mod threat_intel;

pub use extract::{extract_event, ExtractError};
pub use scoring::{RiskScorer, HIGH_RISK_KEYWORDS};
pub use threat_intel::{ThreatIntelService, ThreatIntelError, BLOCKLIST_CONFIDENCE};

use chrono::Utc;
use thiserror::Error;

use crate::config::EnrichmentConfig;
use crate::geolocation::{GeoError, GeoIpService};
use crate::models::{EnrichedEvent, SecurityEvent};

/// Errors raised while building the enricher from configuration
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Geolocation setup failed: {0}")]
    Geo(#[from] GeoError),

    #[error("Threat intel setup failed: {0}")]
    ThreatIntel(#[from] ThreatIntelError),
}

/// Bundles the stateless enrichment services.
pub struct EventEnricher {
    scorer: RiskScorer,
    threat_intel: ThreatIntelService,
    geo: GeoIpService,
}

impl EventEnricher {
    /// Enricher with built-in lookups only (no external files)
    pub fn builtin() -> Self {
        EventEnricher {
            scorer: RiskScorer::new(),
            threat_intel: ThreatIntelService::builtin(),
            geo: GeoIpService::builtin(),
        }
    }

    /// Build the enricher from daemon configuration
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, EnrichError> {
        let geo = match &config.geoip_db_path {
            Some(path) => GeoIpService::from_database(path)?,
            None => GeoIpService::builtin(),
        };
        let threat_intel = match &config.blocklist_path {
            Some(path) => ThreatIntelService::with_blocklist_file(path)?,
            None => ThreatIntelService::builtin(),
        };

        Ok(EventEnricher {
            scorer: RiskScorer::with_countries(config.high_risk_countries.clone()),
            threat_intel,
            geo,
        })
    }

    /// Enrich an extracted event with geo, threat intel, and risk score
    pub fn enrich(&self, event: SecurityEvent) -> EnrichedEvent {
        let geo_info = event
            .source_ip
            .as_deref()
            .and_then(|ip| self.geo.lookup(ip));
        let threat_intel = self.threat_intel.check(&event);
        let risk_score = self.scorer.score(&event, geo_info.as_ref(), &threat_intel);

        EnrichedEvent {
            event,
            processed_at: Utc::now(),
            risk_score,
            threat_intel,
            geo_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enrich_documented_sample() {
        // guardduty-finding with severity 8.5 from a blocklisted IP
        let raw = json!({
            "event_type": "guardduty-finding",
            "severity": 8.5,
            "source_ip": "192.168.1.100"
        });

        let enricher = EventEnricher::builtin();
        let event = extract_event(raw).unwrap();
        let enriched = enricher.enrich(event);

        assert_eq!(enriched.risk_score, 85);
        assert!(enriched.threat_intel.is_known_threat);
        assert_eq!(enriched.threat_intel.confidence, 85);
        // private source IP gets no geo context
        assert!(enriched.geo_info.is_none());
    }

    #[test]
    fn test_enrich_is_idempotent_on_risk_fields() {
        let raw = json!({
            "event_type": "guardduty-finding",
            "severity": 8.5,
            "source_ip": "192.168.1.100",
            "timestamp": "2025-06-01T14:30:00Z"
        });

        let enricher = EventEnricher::builtin();
        let first = enricher.enrich(extract_event(raw.clone()).unwrap());
        let second = enricher.enrich(extract_event(raw).unwrap());

        assert_eq!(first.risk_score, second.risk_score);
        assert_eq!(first.threat_intel, second.threat_intel);
        assert_eq!(first.geo_info, second.geo_info);
    }

    #[test]
    fn test_enrich_public_ip_gets_geo() {
        let raw = json!({
            "event_type": "failed_login",
            "severity": "medium",
            "source_ip": "203.0.113.12"
        });

        let enricher = EventEnricher::builtin();
        let enriched = enricher.enrich(extract_event(raw).unwrap());

        let geo = enriched.geo_info.expect("public IP should resolve");
        assert_eq!(geo.country.as_deref(), Some("US"));
        assert!(!enriched.threat_intel.is_known_threat);
        // medium maps to 5.0 -> base 50
        assert_eq!(enriched.risk_score, 50);
    }

    #[test]
    fn test_from_config_builtin_paths() {
        let config = EnrichmentConfig {
            geoip_db_path: None,
            blocklist_path: None,
            high_risk_countries: vec!["CN".to_string()],
        };
        let enricher = EventEnricher::from_config(&config).unwrap();
        let raw = json!({ "event_type": "data_access", "source_ip": "8.8.8.8" });
        let enriched = enricher.enrich(extract_event(raw).unwrap());
        assert_eq!(enriched.risk_score, 0);
    }

    #[test]
    fn test_from_config_missing_geo_db_errors() {
        let config = EnrichmentConfig {
            geoip_db_path: Some("does-not-exist.mmdb".into()),
            blocklist_path: None,
            high_risk_countries: vec![],
        };
        assert!(matches!(
            EventEnricher::from_config(&config),
            Err(EnrichError::Geo(_))
        ));
    }
}
