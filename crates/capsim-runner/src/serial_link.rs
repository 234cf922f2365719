//! TCP serial bridge.
//!
//! Exposes the emulated sensor's serial port on a TCP port so a host
//! monitor (or a terminal program) can connect and exchange raw protocol
//! bytes. One client at a time; frames emitted while no client is connected
//! are dropped, like a serial line with nothing plugged in.
//!
//! The listener runs on a tokio runtime; the control loop stays synchronous
//! and talks to it through a [`SerialHandle`] with non-blocking reads.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Handle for exchanging bytes with the connected host.
#[derive(Clone)]
pub struct SerialHandle {
    tx_sender: mpsc::Sender<Vec<u8>>,
    rx_receiver: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    connected: Arc<AtomicBool>,
}

impl SerialHandle {
    /// Whether a host is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Send bytes to the connected host (sensor TX → TCP).
    ///
    /// Silently dropped when no client is connected; logged and dropped if
    /// the outgoing buffer is full.
    pub fn send(&self, data: &[u8]) {
        if !self.is_connected() {
            return;
        }
        if let Err(err) = self.tx_sender.try_send(data.to_vec()) {
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!("serial TX buffer full, dropping {} bytes", data.len());
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::warn!("serial bridge task gone, dropping {} bytes", data.len());
                }
            }
        }
    }

    /// Take any bytes received from the host (TCP → sensor RX).
    ///
    /// Non-blocking; returns `None` when nothing is available.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        if let Ok(mut receiver) = self.rx_receiver.try_lock() {
            receiver.try_recv().ok()
        } else {
            None
        }
    }
}

/// Bind the bridge and spawn its accept loop on the given runtime.
///
/// Returns the synchronous handle the control loop polls.
pub fn start(runtime: &tokio::runtime::Handle, port: u16) -> io::Result<SerialHandle> {
    let (tx_sender, tx_receiver) = mpsc::channel::<Vec<u8>>(256);
    let (rx_sender, rx_receiver) = mpsc::channel::<Vec<u8>>(256);
    let connected = Arc::new(AtomicBool::new(false));

    let listener = runtime.block_on(async {
        TcpListener::bind(("0.0.0.0", port)).await
    })?;
    tracing::info!("serial bridge listening on port {port}");

    let handle = SerialHandle {
        tx_sender,
        rx_receiver: Arc::new(Mutex::new(rx_receiver)),
        connected: connected.clone(),
    };

    runtime.spawn(async move {
        run_listener(listener, tx_receiver, rx_sender, connected).await;
    });

    Ok(handle)
}

async fn run_listener(
    listener: TcpListener,
    mut tx_receiver: mpsc::Receiver<Vec<u8>>,
    rx_sender: mpsc::Sender<Vec<u8>>,
    connected: Arc<AtomicBool>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::error!("serial bridge accept failed: {err}");
                return;
            }
        };
        tracing::info!("host connected from {peer}");
        connected.store(true, Ordering::Relaxed);

        // Frames queued while disconnected are stale; flush them.
        while tx_receiver.try_recv().is_ok() {}

        let result = handle_connection(stream, &mut tx_receiver, &rx_sender).await;
        connected.store(false, Ordering::Relaxed);

        match result {
            Ok(()) => tracing::info!("host disconnected"),
            Err(err) => tracing::warn!("host connection error: {err}"),
        }
    }
}

/// Shuttle bytes between the TCP stream and the control loop's channels.
async fn handle_connection(
    mut stream: TcpStream,
    tx_receiver: &mut mpsc::Receiver<Vec<u8>>,
    rx_sender: &mpsc::Sender<Vec<u8>>,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = [0u8; 1024];

    loop {
        tokio::select! {
            // Host -> sensor RX
            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) => return Ok(()),
                    Ok(n) => {
                        tracing::trace!("rx {}", hex::encode(&read_buf[..n]));
                        if rx_sender.send(read_buf[..n].to_vec()).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(err) => return Err(err),
                }
            }

            // Sensor TX -> host
            Some(data) = tx_receiver.recv() => {
                tracing::trace!("tx {}", hex::encode(&data));
                writer.write_all(&data).await?;
                writer.flush().await?;
            }
        }
    }
}
