use std::net::UdpSocket;
use std::time::Duration;

/// Maximum accepted datagram size. GuardDuty-style findings run to a
/// few kilobytes; anything larger is truncated by the socket.
const MAX_DATAGRAM: usize = 64 * 1024;

/// UDP listener for receiving wire records, one record per datagram
pub struct UdpRecordListener {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl UdpRecordListener {
    /// Create a new listener bound to the given address
    pub fn new(address: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind(address)?;
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;

        Ok(UdpRecordListener {
            socket,
            buffer: vec![0; MAX_DATAGRAM],
        })
    }

    /// Read a single record (non-blocking beyond the read timeout)
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((size, _addr)) => Ok(Some(self.buffer[..size].to_vec())),
            Err(e) => {
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut
                {
                    Ok(None)
                } else {
                    Err(Box::new(e))
                }
            }
        }
    }

    /// Local address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }
}

// ============================================
// Async UDP Listener
// ============================================

use tokio::net::UdpSocket as AsyncUdpSocket;
use tokio::sync::mpsc;

/// Async version of UdpRecordListener for use with tokio
pub struct AsyncUdpRecordListener {
    socket: AsyncUdpSocket,
}

impl AsyncUdpRecordListener {
    /// Create a new async listener bound to the given address
    pub async fn new(address: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let socket = AsyncUdpSocket::bind(address).await?;
        Ok(AsyncUdpRecordListener { socket })
    }

    /// Run the listener, sending raw records through the channel
    ///
    /// This method runs indefinitely until the channel is closed or
    /// an unrecoverable error occurs.
    pub async fn run(
        &mut self,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        log::info!("Async UDP record listener started");

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((size, _addr)) => {
                    if tx.send(buf[..size].to_vec()).await.is_err() {
                        log::info!("Channel closed, stopping UDP listener");
                        break;
                    }
                }
                Err(e) => {
                    log::error!("UDP recv error: {}", e);
                }
            }
        }

        Ok(())
    }
}
