//! RTP receive path
//!
//! Binds a local UDP endpoint, parses each datagram as RTP and hands the
//! payload to the registered callback as float PCM. No reordering and no
//! duplicate suppression: every well-formed datagram yields exactly one
//! callback invocation, in arrival order.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::NetworkError;
use crate::net::rtp;
use crate::net::validate_host;

/// Receive-path mode. The transport is one-directional; the flag exists so
/// call sites state the direction explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverFlags {
    #[default]
    ReceiveOnly,
}

/// Snapshot of receive counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub invalid_packets: u64,
}

#[derive(Default)]
struct StatsInner {
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    invalid_packets: AtomicU64,
}

type AudioCallback = Arc<dyn Fn(&[f32]) + Send + Sync>;

/// Bound-UDP RTP receiver with a swappable audio callback.
pub struct RtpReceiver {
    socket: Option<Arc<UdpSocket>>,
    callback: Arc<Mutex<Option<AudioCallback>>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<StatsInner>,
    flags: ReceiverFlags,
}

impl RtpReceiver {
    pub fn new() -> Self {
        Self {
            socket: None,
            callback: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            stats: Arc::new(StatsInner::default()),
            flags: ReceiverFlags::ReceiveOnly,
        }
    }

    /// Bind the local receive endpoint.
    ///
    /// `local_ip` must be a dotted IPv4 literal or `localhost` and `port`
    /// nonzero. The socket carries a short read timeout so `stop` can join
    /// the parse loop promptly.
    pub fn init(
        &mut self,
        local_ip: &str,
        port: u16,
        flags: ReceiverFlags,
    ) -> Result<(), NetworkError> {
        validate_host(local_ip)?;
        if port == 0 {
            return Err(NetworkError::InvalidArgument("port is zero".into()));
        }
        self.stop();

        let socket = UdpSocket::bind((local_ip, port))
            .map_err(|e| NetworkError::SocketOpen(e.to_string()))?;
        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .map_err(|e| NetworkError::SocketOpen(e.to_string()))?;

        self.socket = Some(Arc::new(socket));
        self.flags = flags;
        self.stats = Arc::new(StatsInner::default());
        debug!(local_ip, port, "rtp receiver bound");
        Ok(())
    }

    /// Install the parse loop. Idempotent.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if self.is_active() {
            return Ok(());
        }
        let socket = self
            .socket
            .clone()
            .ok_or(NetworkError::NotInitialized)?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let callback = self.callback.clone();
        let stats = self.stats.clone();

        let worker = thread::Builder::new()
            .name("rtp-receiver".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; 65_535];
                let mut samples: Vec<f32> = Vec::new();
                while running.load(Ordering::SeqCst) {
                    let n = match socket.recv_from(&mut buf) {
                        Ok((n, _)) => n,
                        Err(e)
                            if e.kind() == ErrorKind::WouldBlock
                                || e.kind() == ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            if running.load(Ordering::SeqCst) {
                                warn!("receive failed: {e}");
                            }
                            break;
                        }
                    };

                    let parsed = match rtp::parse(&buf[..n]) {
                        Some(p) if p.payload.len() % 2 == 0 && !p.payload.is_empty() => p,
                        _ => {
                            stats.invalid_packets.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };

                    samples.clear();
                    for pair in parsed.payload.chunks_exact(2) {
                        let pcm = i16::from_be_bytes([pair[0], pair[1]]);
                        samples.push(pcm as f32 / 32767.0);
                    }

                    stats.packets_received.fetch_add(1, Ordering::Relaxed);
                    stats.bytes_received.fetch_add(n as u64, Ordering::Relaxed);

                    // Snapshot the current callback; a concurrent
                    // replacement is observed by the next datagram
                    let cb = callback.lock().unwrap().clone();
                    if let Some(cb) = cb {
                        cb(&samples);
                    }
                }
            })
            .map_err(|e| NetworkError::SocketOpen(e.to_string()))?;

        self.worker = Some(worker);
        Ok(())
    }

    /// Tear down the parse loop. Idempotent; the binding survives for a
    /// later `start`.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn flags(&self) -> ReceiverFlags {
        self.flags
    }

    /// Atomically replace the audio callback. Only the most recently
    /// installed callback is invoked for subsequent frames.
    pub fn set_audio_callback<F>(&self, callback: F)
    where
        F: Fn(&[f32]) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            packets_received: self.stats.packets_received.load(Ordering::Relaxed),
            bytes_received: self.stats.bytes_received.load(Ordering::Relaxed),
            invalid_packets: self.stats.invalid_packets.load(Ordering::Relaxed),
        }
    }
}

impl Default for RtpReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RtpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}
