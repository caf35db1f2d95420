//! Audio and stream configuration
//!
//! Both structs are value-like: the client reads them at the state
//! transition that consumes them and never re-reads them afterward.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::NetworkError;

/// Capture-side audio parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate requested from the audio host
    pub sample_rate: u32,
    /// Channel count; the capture pipeline is mono
    pub channels: u16,
    /// Bits per sample on the wire (linear PCM)
    pub bits_per_sample: u16,
    /// Capture window retained by the circular buffer, in ms
    pub buffer_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            bits_per_sample: 16,
            buffer_ms: DEFAULT_BUFFER_MS,
        }
    }
}

impl AudioConfig {
    /// Check the configuration for values the pipeline cannot operate with.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.sample_rate == 0 {
            return Err(NetworkError::InvalidArgument("sample_rate is zero".into()));
        }
        if self.buffer_ms == 0 {
            return Err(NetworkError::InvalidArgument("buffer_ms is zero".into()));
        }
        Ok(())
    }
}

/// Streaming and control endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Remote server address (dotted IPv4 literal or "localhost")
    pub server_ip: String,
    /// RTP destination port
    pub rtp_port: u16,
    /// MQTT control port
    pub control_port: u16,
    /// Maximum RTP payload size in bytes
    pub packet_size: u32,
    /// Topic carrying server status messages
    pub control_topic: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            server_ip: String::new(),
            rtp_port: DEFAULT_RTP_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            packet_size: DEFAULT_PACKET_SIZE,
            control_topic: DEFAULT_CONTROL_TOPIC.to_string(),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.rtp_port == 0 {
            return Err(NetworkError::InvalidArgument("rtp_port is zero".into()));
        }
        if self.control_port == 0 {
            return Err(NetworkError::InvalidArgument("control_port is zero".into()));
        }
        if self.packet_size == 0 {
            return Err(NetworkError::InvalidArgument("packet_size is zero".into()));
        }
        Ok(())
    }
}
