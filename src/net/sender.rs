//! RTP sender over a connected UDP socket
//!
//! Converts float PCM to big-endian 16-bit samples, wraps them in RTP
//! packets and transmits each one exactly once. The persistent packet
//! header keeps its SSRC for the sender's whole lifetime; sequence numbers
//! and timestamps advance per transmitted packet.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::NetworkError;
use crate::net::ring::PacketRing;
use crate::net::rtp::RtpPacket;
use crate::net::validate_host;

/// Transmission counters, reset by `init`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
}

/// Push-mode RTP/UDP audio sender.
pub struct RtpSender {
    host: String,
    port: u16,
    /// Maximum RTP payload per datagram, in bytes
    payload_size: usize,
    /// Split oversized payloads into successive packets when set
    fragment: bool,
    socket: Option<UdpSocket>,
    packet: Option<RtpPacket>,
    ring: PacketRing,
    active: Arc<AtomicBool>,
    /// Next non-empty send starts a talkspurt
    marker_pending: bool,
    stats: SenderStats,
}

impl RtpSender {
    pub fn new() -> Self {
        Self {
            host: String::new(),
            port: 0,
            payload_size: 0,
            fragment: true,
            socket: None,
            packet: None,
            ring: PacketRing::new(),
            active: Arc::new(AtomicBool::new(false)),
            marker_pending: true,
            stats: SenderStats::default(),
        }
    }

    /// Validate the destination and open a connected-mode UDP socket.
    ///
    /// `host` must be a dotted IPv4 literal or `localhost`; `port` and
    /// `payload_size` must be nonzero. The packet header created here (and
    /// with it the SSRC) survives later `start`/`stop` cycles.
    pub fn init(&mut self, host: &str, port: u16, payload_size: u32) -> Result<(), NetworkError> {
        validate_host(host)?;
        if port == 0 {
            return Err(NetworkError::InvalidArgument("port is zero".into()));
        }
        if payload_size == 0 {
            return Err(NetworkError::InvalidArgument("payload_size is zero".into()));
        }

        self.stop();
        self.host = host.to_string();
        self.port = port;
        self.payload_size = payload_size as usize;
        self.socket = Some(self.open_socket()?);
        self.packet = Some(RtpPacket::new());
        self.stats = SenderStats::default();
        debug!(host, port, payload_size, "rtp sender initialized");
        Ok(())
    }

    fn open_socket(&self) -> Result<UdpSocket, NetworkError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .map_err(|e| NetworkError::SocketOpen(e.to_string()))?;
        socket
            .connect((self.host.as_str(), self.port))
            .map_err(|e| NetworkError::SocketOpen(e.to_string()))?;
        Ok(socket)
    }

    /// Arm the sender. Idempotent; re-opens the socket after a `stop`.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if self.is_active() {
            return Ok(());
        }
        if self.packet.is_none() {
            return Err(NetworkError::NotInitialized);
        }
        if self.socket.is_none() {
            self.socket = Some(self.open_socket()?);
        }
        self.marker_pending = true;
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Disarm the sender and close the socket. Idempotent.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.socket = None;
        self.ring.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Toggle payload fragmentation. When disabled, payloads above
    /// `payload_size` bytes are rejected instead of split.
    pub fn set_fragmentation(&mut self, enabled: bool) {
        self.fragment = enabled;
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn sequence_number(&self) -> Option<u16> {
        self.packet.as_ref().map(|p| p.sequence_number())
    }

    pub fn timestamp(&self) -> Option<u32> {
        self.packet.as_ref().map(|p| p.timestamp())
    }

    pub fn ssrc(&self) -> Option<u32> {
        self.packet.as_ref().map(|p| p.ssrc())
    }

    /// Transmit one sample vector.
    ///
    /// Empty input is a successful no-op that records an underflow window,
    /// so the next audible packet carries the talkspurt marker. Payloads
    /// above `payload_size` bytes are split into successive packets (or
    /// rejected when fragmentation is disabled). Each packet advances the
    /// timestamp by its own sample count before serialization and the
    /// sequence number after its transmission.
    pub fn send_audio(&mut self, samples: &[f32]) -> Result<(), NetworkError> {
        if !self.is_active() {
            return Err(NetworkError::NotRunning);
        }
        let socket = self.socket.as_ref().ok_or(NetworkError::NotRunning)?;
        let packet = self.packet.as_mut().ok_or(NetworkError::NotInitialized)?;

        if samples.is_empty() {
            self.marker_pending = true;
            return Ok(());
        }

        let total_bytes = samples.len() * 2;
        if total_bytes > self.payload_size && !self.fragment {
            return Err(NetworkError::PayloadTooLarge {
                bytes: total_bytes,
                max: self.payload_size,
            });
        }

        let samples_per_packet = (self.payload_size / 2).max(1);
        let mut payload = Vec::with_capacity(self.payload_size);

        for chunk in samples.chunks(samples_per_packet) {
            payload.clear();
            for &sample in chunk {
                let pcm = (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16;
                payload.extend_from_slice(&pcm.to_be_bytes());
            }

            packet.set_marker(self.marker_pending);
            self.marker_pending = false;
            packet.increment_timestamp(chunk.len() as u32);
            packet.set_payload(&payload);

            if !self.ring.push(Bytes::from(packet.serialize())) {
                warn!("packet ring full, dropping datagram");
                continue;
            }
            while let Some(datagram) = self.ring.pop() {
                let sent = socket
                    .send(&datagram)
                    .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
                if sent < datagram.len() {
                    return Err(NetworkError::TransmitShort {
                        sent,
                        expected: datagram.len(),
                    });
                }
                packet.increment_sequence_number();
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += sent as u64;
            }
        }
        Ok(())
    }
}

impl Default for RtpSender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::rtp;
    use std::time::Duration;

    fn sink() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn recv_datagram(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = vec![0u8; 2048];
        let n = socket.recv(&mut buf).expect("datagram within timeout");
        buf.truncate(n);
        buf
    }

    fn sine(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).sin())
            .collect()
    }

    #[test]
    fn test_init_validation() {
        let mut sender = RtpSender::new();
        assert!(sender.init("not an ip", 5004, 512).is_err());
        assert!(sender.init("127.0.0.1", 0, 512).is_err());
        assert!(sender.init("127.0.0.1", 5004, 0).is_err());
        assert!(sender.init("127.0.0.1", 5004, 512).is_ok());
        assert!(sender.init("localhost", 5004, 512).is_ok());
    }

    #[test]
    fn test_send_requires_start() {
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", 5004, 512).unwrap();
        assert!(matches!(
            sender.send_audio(&sine(480)),
            Err(NetworkError::NotRunning)
        ));
    }

    #[test]
    fn test_send_before_init_fails() {
        let mut sender = RtpSender::new();
        assert!(sender.send_audio(&sine(16)).is_err());
        assert!(sender.start().is_err());
    }

    #[test]
    fn test_empty_send_is_noop() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 512).unwrap();
        sender.start().unwrap();

        let seq = sender.sequence_number().unwrap();
        assert!(sender.send_audio(&[]).is_ok());
        assert_eq!(sender.sequence_number().unwrap(), seq);
        assert_eq!(sender.stats().packets_sent, 0);

        let mut buf = [0u8; 64];
        assert!(sink.recv(&mut buf).is_err(), "no datagram expected");
    }

    #[test]
    fn test_marker_and_sequence_progression() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 1024).unwrap();
        sender.start().unwrap();

        sender.send_audio(&sine(480)).unwrap();
        sender.send_audio(&sine(480)).unwrap();

        let first = recv_datagram(&sink);
        let second = recv_datagram(&sink);

        let p1 = rtp::parse(&first).unwrap();
        let p2 = rtp::parse(&second).unwrap();

        // Marker only on the talkspurt start
        assert!(p1.marker);
        assert!(!p2.marker);

        assert_eq!(p2.sequence_number, p1.sequence_number.wrapping_add(1));
        assert_eq!(p2.timestamp, p1.timestamp.wrapping_add(480));
        assert_eq!(p1.ssrc, p2.ssrc);
        assert_eq!(p1.payload.len(), 960);
    }

    #[test]
    fn test_marker_returns_after_underflow_window() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 1024).unwrap();
        sender.start().unwrap();

        sender.send_audio(&sine(160)).unwrap();
        sender.send_audio(&[]).unwrap();
        sender.send_audio(&sine(160)).unwrap();

        let first = rtp::parse(&recv_datagram(&sink)).map(|p| p.marker);
        let second = rtp::parse(&recv_datagram(&sink)).map(|p| p.marker);
        assert_eq!(first, Some(true));
        assert_eq!(second, Some(true));
    }

    #[test]
    fn test_payload_too_large_without_fragmentation() {
        let (_sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 512).unwrap();
        sender.set_fragmentation(false);
        sender.start().unwrap();

        // 480 samples are 960 bytes, over the 512-byte cap
        assert!(matches!(
            sender.send_audio(&sine(480)),
            Err(NetworkError::PayloadTooLarge { bytes: 960, max: 512 })
        ));
        assert_eq!(sender.stats().packets_sent, 0);
    }

    #[test]
    fn test_fragmentation_splits_and_numbers_packets() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 64).unwrap();
        sender.start().unwrap();

        // 80 samples at 32 samples per packet: 32 + 32 + 16
        sender.send_audio(&sine(80)).unwrap();

        let datagrams: Vec<_> = (0..3).map(|_| recv_datagram(&sink)).collect();
        let parsed: Vec<_> = datagrams.iter().map(|d| rtp::parse(d).unwrap()).collect();

        assert_eq!(parsed[0].payload.len(), 64);
        assert_eq!(parsed[1].payload.len(), 64);
        assert_eq!(parsed[2].payload.len(), 32);

        assert!(parsed[0].marker);
        assert!(!parsed[1].marker);
        assert!(!parsed[2].marker);

        assert_eq!(
            parsed[1].sequence_number,
            parsed[0].sequence_number.wrapping_add(1)
        );
        assert_eq!(
            parsed[2].sequence_number,
            parsed[0].sequence_number.wrapping_add(2)
        );
        assert_eq!(parsed[1].timestamp, parsed[0].timestamp.wrapping_add(32));
        assert_eq!(parsed[2].timestamp, parsed[1].timestamp.wrapping_add(16));
    }

    #[test]
    fn test_restart_reopens_socket_and_keeps_ssrc() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 1024).unwrap();
        sender.start().unwrap();
        let ssrc = sender.ssrc().unwrap();
        sender.send_audio(&sine(160)).unwrap();
        let _ = recv_datagram(&sink);

        sender.stop();
        assert!(!sender.is_active());
        assert!(matches!(
            sender.send_audio(&sine(160)),
            Err(NetworkError::NotRunning)
        ));

        assert!(sender.start().is_ok());
        assert_eq!(sender.ssrc().unwrap(), ssrc);
        sender.send_audio(&sine(160)).unwrap();
        let datagram = recv_datagram(&sink);
        let parsed = rtp::parse(&datagram).unwrap();
        assert_eq!(parsed.ssrc, ssrc);
        // A fresh start opens a new talkspurt
        assert!(parsed.marker);
    }

    #[test]
    fn test_sequence_contiguous_over_long_run() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 1024).unwrap();
        sender.start().unwrap();

        let tone = sine(160);
        let mut previous: Option<(u16, u32)> = None;
        for _ in 0..300 {
            sender.send_audio(&tone).unwrap();
            let datagram = recv_datagram(&sink);
            let parsed = rtp::parse(&datagram).unwrap();
            if let Some((seq, ts)) = previous {
                assert_eq!(parsed.sequence_number, seq.wrapping_add(1));
                assert_eq!(parsed.timestamp, ts.wrapping_add(160));
            }
            previous = Some((parsed.sequence_number, parsed.timestamp));
        }
        assert_eq!(sender.stats().packets_sent, 300);
    }

    #[test]
    fn test_pcm_conversion_clamps() {
        let (sink, port) = sink();
        let mut sender = RtpSender::new();
        sender.init("127.0.0.1", port, 64).unwrap();
        sender.start().unwrap();

        sender.send_audio(&[1.0, -1.0, 0.0, 1.5, -1.5]).unwrap();
        let datagram = recv_datagram(&sink);
        let payload = rtp::parse(&datagram).unwrap().payload.to_vec();

        let pcm: Vec<i16> = payload
            .chunks_exact(2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, -32767, 0, 32767, -32768]);
    }
}
