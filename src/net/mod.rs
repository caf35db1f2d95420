//! RTP/UDP transport subsystem

pub mod receiver;
pub mod ring;
pub mod rtp;
pub mod sender;

pub use receiver::{ReceiverFlags, RtpReceiver};
pub use ring::PacketRing;
pub use rtp::RtpPacket;
pub use sender::RtpSender;

use crate::error::NetworkError;

/// Accept a dotted IPv4 literal (four octets, each 0..=255) or the literal
/// `localhost`; everything else is rejected at init time.
pub fn validate_host(host: &str) -> Result<(), NetworkError> {
    if host == "localhost" || is_ipv4_literal(host) {
        Ok(())
    } else {
        Err(NetworkError::InvalidArgument(format!(
            "invalid host literal: {host}"
        )))
    }
}

fn is_ipv4_literal(host: &str) -> bool {
    let mut octets = 0;
    for part in host.split('.') {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match part.parse::<u16>() {
            Ok(v) if v <= 255 => octets += 1,
            _ => return false,
        }
    }
    octets == 4
}
