//! RTP packet structure and serialization (RFC 3550)
//!
//! One `RtpPacket` persists for the lifetime of a stream: the sender mutates
//! its payload, marker, timestamp and sequence number between transmissions,
//! and the SSRC chosen at construction never changes.

use rand::Rng;

/// RTP protocol version carried in every header
pub const RTP_VERSION: u8 = 2;

/// Payload type for linear 16-bit PCM audio (RFC 3551 L16 convention)
pub const AUDIO_PAYLOAD_TYPE: u8 = 11;

/// Maximum CSRC entries representable in the 4-bit count field
pub const MAX_CSRC: usize = 15;

/// Fixed RTP header length in bytes, before the CSRC list
pub const HEADER_LEN: usize = 12;

/// An RTP packet with mutable header state and an opaque payload.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    version: u8,
    padding: bool,
    extension: bool,
    marker: bool,
    payload_type: u8,
    sequence_number: u16,
    timestamp: u32,
    ssrc: u32,
    csrc_list: Vec<u32>,
    payload: Vec<u8>,
}

impl RtpPacket {
    /// Construct with a random initial sequence number and SSRC drawn from
    /// an OS-seeded RNG.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            marker: false,
            payload_type: AUDIO_PAYLOAD_TYPE,
            sequence_number: rng.gen(),
            timestamp: 0,
            ssrc: rng.gen(),
            csrc_list: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn set_payload(&mut self, data: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(data);
    }

    pub fn set_marker(&mut self, marker: bool) {
        self.marker = marker;
    }

    /// Append a contributing source. Inserts beyond the 4-bit count limit
    /// are silently clamped so the list never exceeds 15 entries.
    pub fn add_csrc(&mut self, csrc: u32) {
        if self.csrc_list.len() < MAX_CSRC {
            self.csrc_list.push(csrc);
        }
    }

    pub fn increment_sequence_number(&mut self) {
        self.sequence_number = self.sequence_number.wrapping_add(1);
    }

    pub fn increment_timestamp(&mut self, samples: u32) {
        self.timestamp = self.timestamp.wrapping_add(samples);
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn marker(&self) -> bool {
        self.marker
    }

    pub fn csrc_count(&self) -> usize {
        self.csrc_list.len()
    }

    #[cfg(test)]
    pub(crate) fn force_sequence_number(&mut self, seq: u16) {
        self.sequence_number = seq;
    }

    /// Serialize to wire format.
    ///
    /// ```text
    /// byte 0  : (version << 6) | (padding << 5) | (extension << 4) | csrc count
    /// byte 1  : (marker << 7) | payload type
    /// 2 ..= 3 : sequence number, big-endian
    /// 4 ..= 7 : timestamp, big-endian
    /// 8 ..=11 : ssrc, big-endian
    /// 12 ..   : csrc list entries, each big-endian, then the payload
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(HEADER_LEN + self.csrc_list.len() * 4 + self.payload.len());

        buf.push(
            (self.version << 6)
                | ((self.padding as u8) << 5)
                | ((self.extension as u8) << 4)
                | (self.csrc_list.len() as u8 & 0x0F),
        );
        buf.push(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in &self.csrc_list {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }
        buf.extend_from_slice(&self.payload);
        buf
    }
}

impl Default for RtpPacket {
    fn default() -> Self {
        Self::new()
    }
}

/// Header fields recovered from a received datagram, with the payload span.
pub struct ParsedRtp<'a> {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: &'a [u8],
}

/// Parse a received datagram.
///
/// Returns `None` for anything the receive path must drop: short datagrams,
/// versions other than 2, padding or extension flags, or a CSRC list that
/// overruns the datagram.
pub fn parse(data: &[u8]) -> Option<ParsedRtp<'_>> {
    if data.len() < HEADER_LEN {
        return None;
    }
    if (data[0] >> 6) & 0x03 != RTP_VERSION {
        return None;
    }
    if data[0] & 0x30 != 0 {
        // Padding or extension present; neither is part of this profile
        return None;
    }
    let csrc_count = (data[0] & 0x0F) as usize;
    let payload_start = HEADER_LEN + csrc_count * 4;
    if data.len() < payload_start {
        return None;
    }

    Some(ParsedRtp {
        marker: data[1] & 0x80 != 0,
        payload_type: data[1] & 0x7F,
        sequence_number: u16::from_be_bytes([data[2], data[3]]),
        timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
        ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        payload: &data[payload_start..],
    })
}
