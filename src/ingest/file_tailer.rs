use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

/// Tail a JSONL record file, one wire record per line
pub struct FileTailer {
    file_path: PathBuf,
    reader: Option<BufReader<File>>,
    file_position: u64,
}

impl FileTailer {
    /// Create a new file tailer
    pub fn new(file_path: PathBuf) -> Self {
        FileTailer {
            file_path,
            reader: None,
            file_position: 0,
        }
    }

    /// Open the file and seek to the end to start tailing
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let file = File::open(&self.file_path)?;
        let mut reader = BufReader::new(file);

        reader.seek(SeekFrom::End(0))?;
        self.file_position = reader.stream_position()?;
        self.reader = Some(reader);

        Ok(())
    }

    /// Open the file and read from the beginning (replay mode)
    pub fn initialize_from_start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let file = File::open(&self.file_path)?;
        self.reader = Some(BufReader::new(file));
        self.file_position = 0;
        Ok(())
    }

    /// Read any new records appended since the last call.
    ///
    /// Blank lines are skipped; decoding happens downstream so a bad
    /// record cannot stall the tailer.
    pub fn read_records(&mut self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        if self.reader.is_none() {
            self.initialize()?;
        }

        let reader = self.reader.as_mut().ok_or("Reader not initialized")?;
        let mut records = Vec::new();

        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;

            if bytes_read == 0 {
                break; // EOF
            }

            self.file_position += bytes_read as u64;

            let record = line.trim();
            if !record.is_empty() {
                records.push(record.to_string());
            }
        }

        Ok(records)
    }

    /// Check if the file still exists and is readable
    pub fn is_valid(&self) -> bool {
        self.file_path.exists()
    }
}

// ============================================
// Async File Tailer
// ============================================

use tokio::fs::File as AsyncFile;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader as AsyncBufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration as TokioDuration};

/// Async version of FileTailer for use with tokio
pub struct AsyncFileTailer {
    file_path: PathBuf,
}

impl AsyncFileTailer {
    /// Create a new async file tailer
    pub fn new(file_path: PathBuf) -> Self {
        AsyncFileTailer { file_path }
    }

    /// Run the file tailer, sending raw records through the channel
    ///
    /// This method runs indefinitely until the channel is closed or
    /// an unrecoverable error occurs.
    pub async fn run(
        &mut self,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let file = AsyncFile::open(&self.file_path).await?;
        let mut reader = AsyncBufReader::new(file);

        // Seek to end of file to start tailing
        reader.seek(std::io::SeekFrom::End(0)).await?;

        log::info!("Async file tailer started for {:?}", self.file_path);

        loop {
            let mut line = String::new();

            match reader.read_line(&mut line).await {
                Ok(0) => {
                    // EOF - wait for more data
                    sleep(TokioDuration::from_millis(100)).await;
                }
                Ok(_) => {
                    let record = line.trim();
                    if record.is_empty() {
                        continue;
                    }
                    if tx.send(record.as_bytes().to_vec()).await.is_err() {
                        log::info!("Channel closed, stopping file tailer");
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Error reading file: {}", e);
                    sleep(TokioDuration::from_secs(1)).await;
                }
            }
        }

        Ok(())
    }
}
