pub mod alerting;
pub mod config;
pub mod enrich;
pub mod geolocation;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod storage;

// Re-export commonly used types
pub use alerting::{AlertDispatcher, AlertPolicy, AlertQueue};
pub use config::Config;
pub use enrich::EventEnricher;
pub use geolocation::GeoIpService;
pub use models::{BatchSummary, EnrichedEvent, SecurityEvent};
pub use pipeline::EventPipeline;
pub use storage::{DataLake, EventCatalog, FsObjectStore};
