pub mod alert;
pub mod event;

pub use alert::{AlertMessage, AlertSeverity, EventSummary};
pub use event::{
    BatchSummary, EnrichedEvent, EventKind, GeoInfo, SecurityEvent, ThreatIntel,
};
