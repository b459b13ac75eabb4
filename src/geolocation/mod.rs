//! IP geolocation enrichment
//!
//! Source IPs are resolved against a MaxMind GeoLite2-City database when
//! one is configured. Without a database the service falls back to a
//! built-in static table so enrichment stays deterministic in demo and
//! test environments. Users must download the database file separately
//! from MaxMind (free with registration).

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::models::GeoInfo;

/// Errors that can occur while opening a geolocation database
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

#[derive(Clone)]
enum Backend {
    MaxMind(Arc<Reader<Vec<u8>>>),
    Static,
}

/// Geo lookup service for source-IP enrichment
///
/// Lookups never fail a record: addresses that are private, loopback,
/// unparseable, or absent from the database yield `None` and the event
/// is stored without geo context.
#[derive(Clone)]
pub struct GeoIpService {
    backend: Backend,
}

impl GeoIpService {
    /// Create a service backed by a MaxMind GeoLite2-City database file
    pub fn from_database<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(GeoIpService {
            backend: Backend::MaxMind(Arc::new(reader)),
        })
    }

    /// Create a service backed by the built-in static table
    pub fn builtin() -> Self {
        GeoIpService {
            backend: Backend::Static,
        }
    }

    /// Look up geographic context for a source IP string
    ///
    /// Returns `None` for addresses that should not be enriched
    /// (unknown placeholder, localhost, RFC 1918 ranges) or that the
    /// backend cannot resolve.
    pub fn lookup(&self, source_ip: &str) -> Option<GeoInfo> {
        if source_ip.is_empty() || source_ip == "unknown" || source_ip == "localhost" {
            return None;
        }

        let ip = IpAddr::from_str(source_ip).ok()?;
        if Self::is_internal(&ip) {
            return None;
        }

        match &self.backend {
            Backend::MaxMind(reader) => self.lookup_maxmind(reader, &ip, source_ip),
            Backend::Static => Some(Self::static_entry(source_ip)),
        }
    }

    fn lookup_maxmind(
        &self,
        reader: &Reader<Vec<u8>>,
        ip: &IpAddr,
        source_ip: &str,
    ) -> Option<GeoInfo> {
        let city: geoip2::City = match reader.lookup(*ip) {
            Ok(city) => city,
            Err(maxminddb::MaxMindDBError::AddressNotFoundError(_)) => return None,
            Err(e) => {
                log::warn!("GeoIP lookup failed for {}: {}", source_ip, e);
                return None;
            }
        };

        let location = city.location?;
        Some(GeoInfo {
            ip: source_ip.to_string(),
            country: city
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .map(String::from),
            city: city
                .city
                .and_then(|c| c.names)
                .and_then(|n| n.get("en").copied())
                .map(String::from),
            latitude: location.latitude.unwrap_or(0.0),
            longitude: location.longitude.unwrap_or(0.0),
            is_malicious: false,
            asn: None,
            organization: None,
        })
    }

    /// Static table entry used when no database is configured.
    /// Values mirror the demo environment's fixed lookup.
    fn static_entry(source_ip: &str) -> GeoInfo {
        GeoInfo {
            ip: source_ip.to_string(),
            country: Some("US".to_string()),
            city: Some("Seattle".to_string()),
            latitude: 47.6062,
            longitude: -122.3321,
            is_malicious: false,
            asn: Some("AS16509".to_string()),
            organization: Some("Amazon.com, Inc.".to_string()),
        }
    }

    fn is_internal(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_unspecified(),
            IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
        }
    }
}
