use std::path::PathBuf;
use structopt::StructOpt;

use vigil::config::Config;
use vigil::enrich::{extract_event, EventEnricher};
use vigil::ingest::{decode_record, FileTailer};
use vigil::producer::{self, EventProducer};
use vigil::storage::EventCatalog;

/// Vigil security event pipeline command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "vigil", about = "Security event pipeline CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Generate sample security events
    Produce {
        /// Number of randomized events to generate
        #[structopt(short, long, default_value = "10")]
        count: usize,
        /// RNG seed for reproducible output
        #[structopt(short, long)]
        seed: Option<u64>,
        /// Append events to a JSONL file
        #[structopt(short, long)]
        output: Option<PathBuf>,
        /// Send events as UDP datagrams to this address
        #[structopt(short, long)]
        udp: Option<String>,
        /// Emit the three canonical fixture events instead
        #[structopt(long)]
        canonical: bool,
    },
    /// Enrich records from a JSONL file and print the results
    Enrich {
        /// Path to a JSONL record file
        #[structopt(short, long)]
        file: PathBuf,
        /// Number of records to display
        #[structopt(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show recently processed events or alerts from the catalog
    Recent {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Number of rows to display
        #[structopt(short, long, default_value = "10")]
        limit: usize,
        /// Show alerts instead of events
        #[structopt(short, long)]
        alerts: bool,
    },
    /// Delete events past the retention window
    Prune {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Override the configured retention window, in days
        #[structopt(short, long)]
        days: Option<u32>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Produce {
            count,
            seed,
            output,
            udp,
            canonical,
        } => {
            let events = if canonical {
                EventProducer::canonical_events()
            } else {
                let mut producer = match seed {
                    Some(seed) => EventProducer::with_seed(seed),
                    None => EventProducer::new(),
                };
                producer.generate_batch(count)
            };

            match (output, udp) {
                (Some(path), _) => {
                    producer::write_jsonl(&path, &events)?;
                    println!("Wrote {} event(s) to {:?}", events.len(), path);
                }
                (None, Some(address)) => {
                    producer::send_udp(&address, &events)?;
                    println!("Sent {} event(s) to {}", events.len(), address);
                }
                (None, None) => {
                    for event in &events {
                        println!("{}", serde_json::to_string(event)?);
                    }
                }
            }
        }
        Cli::Enrich { file, limit } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }

            let enricher = EventEnricher::builtin();
            let mut tailer = FileTailer::new(file);
            tailer.initialize_from_start()?;

            let records = tailer.read_records()?;
            let display_count = std::cmp::min(limit, records.len());
            println!(
                "Read {} record(s) (showing {}):\n",
                records.len(),
                display_count
            );

            for record in records.iter().take(display_count) {
                match decode_record(record.as_bytes()).map_err(Into::into).and_then(
                    |decoded| extract_event(decoded).map_err(Box::<dyn std::error::Error>::from),
                ) {
                    Ok(event) => {
                        let enriched = enricher.enrich(event);
                        println!(
                            "  {} score={} type={} ip={} threat={}",
                            enriched.event.event_id,
                            enriched.risk_score,
                            enriched.event.event_type,
                            enriched.event.source_ip.as_deref().unwrap_or("-"),
                            enriched.threat_intel.is_known_threat
                        );
                    }
                    Err(e) => eprintln!("  skipped malformed record: {}", e),
                }
            }
        }
        Cli::Recent {
            config,
            limit,
            alerts,
        } => {
            let config = load_config(&config)?;
            let catalog = EventCatalog::new(&config.storage.catalog_path)?;

            if alerts {
                let rows = catalog.recent_alerts(limit)?;
                println!("{} recent alert(s):\n", rows.len());
                for row in rows {
                    println!(
                        "  {} severity={} score={} event={}",
                        row.alert_id, row.severity, row.risk_score, row.event_id
                    );
                }
            } else {
                let rows = catalog.recent_events(limit)?;
                println!("{} recent event(s):\n", rows.len());
                for row in rows {
                    println!(
                        "  {} type={} score={} ip={} key={}",
                        row.event_id,
                        row.event_type,
                        row.risk_score,
                        row.source_ip.as_deref().unwrap_or("-"),
                        row.object_key
                    );
                }
            }
        }
        Cli::Prune { config, days } => {
            let config = load_config(&config)?;
            let retention_days = days.unwrap_or(config.storage.retention_days);
            let cutoff =
                chrono::Utc::now().timestamp() - i64::from(retention_days) * 24 * 60 * 60;

            let pipeline = vigil::pipeline::EventPipeline::from_config(&config, None)?;
            let pruned = pipeline.prune(cutoff)?;
            println!(
                "Pruned {} event(s) older than {} day(s)",
                pruned, retention_days
            );
        }
    }

    Ok(())
}

fn load_config(path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Config::from_file(path)
    } else {
        eprintln!("Configuration file not found: {:?}, using defaults", path);
        Ok(Config::default())
    }
}
