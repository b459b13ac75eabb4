use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vigil::alerting::{AlertDispatcher, AlertQueue};
use vigil::config::Config;
use vigil::ingest::{FileTailer, UdpRecordListener};
use vigil::pipeline::EventPipeline;

/// Main daemon entry point for the security event pipeline
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Vigil daemon...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file not found, using defaults");
        Config::default()
    };

    // Setup graceful shutdown signal handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, gracefully stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    // Spawn the alert dispatcher when alerting is enabled
    let (alert_queue, dispatcher_handle) = if config.alerting.enabled {
        let (tx, rx) = AlertDispatcher::create_channel();
        let dispatcher = AlertDispatcher::new(config.alerting.clone());
        let handle = tokio::spawn(dispatcher.run(rx));
        (Some(AlertQueue::new(tx)), Some(handle))
    } else {
        log::info!("Alert dispatch disabled");
        (None, None)
    };

    let pipeline = EventPipeline::from_config(&config, alert_queue)?;
    log::info!(
        "Pipeline initialized (data lake: {:?}, catalog: {:?})",
        config.storage.data_lake_root,
        config.storage.catalog_path
    );

    // Initialize input source
    let mut file_tailer: Option<FileTailer> = None;
    let mut udp_listener: Option<UdpRecordListener> = None;

    match config.input.source_type.as_str() {
        "file" => {
            if let Some(ref path) = config.input.file_path {
                let mut tailer = FileTailer::new(path.clone());
                tailer.initialize()?;
                file_tailer = Some(tailer);
                log::info!("Tailing record file: {:?}", path);
            }
        }
        "udp" => {
            if let Some(ref address) = config.input.udp_address {
                let listener = UdpRecordListener::new(address)?;
                log::info!("Listening for records on udp://{}", address);
                udp_listener = Some(listener);
            }
        }
        _ => {
            log::warn!("Unknown input source type: {}", config.input.source_type);
        }
    }

    // Main record processing loop
    while running.load(Ordering::SeqCst) {
        let mut records: Vec<Vec<u8>> = Vec::new();

        if let Some(ref mut tailer) = file_tailer {
            if tailer.is_valid() {
                match tailer.read_records() {
                    Ok(lines) => {
                        records.extend(lines.into_iter().map(String::into_bytes));
                    }
                    Err(e) => log::error!("Error reading from file: {}", e),
                }
            }
        } else if let Some(ref mut listener) = udp_listener {
            loop {
                match listener.read_record() {
                    Ok(Some(datagram)) => records.push(datagram),
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("Error reading datagram: {}", e);
                        break;
                    }
                }
            }
        }

        if !records.is_empty() {
            pipeline.process_batch(records);
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Dropping the pipeline closes the alert queue so the dispatcher
    // can drain and exit
    drop(pipeline);
    if let Some(handle) = dispatcher_handle {
        let _ = handle.await;
    }

    log::info!("Vigil daemon stopped");
    Ok(())
}
