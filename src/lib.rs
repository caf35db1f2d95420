//! # voxlink
//!
//! Edge-side voice streaming client. A microphone feeds a bounded-latency
//! pipeline that packetizes PCM audio into RTP datagrams addressed to a
//! remote server, while a parallel MQTT control channel carries status
//! messages. The complementary receive path reconstructs PCM from RTP
//! payloads and hands it to a consumer callback.
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌────────────┐ realtime cb  ┌─────────────────────┐    10 ms drain
//!  │ Microphone ├─────────────▶│ CircularAudioBuffer │◀─────────────────┐
//!  └────────────┘              └─────────────────────┘                  │
//!                                                             ┌─────────┴────┐
//!  ┌────────────┐ MQTT status  ┌─────────────────────┐        │  VoxClient   │
//!  │   Broker   │◀────────────▶│   ControlChannel    │◀──────▶│   facade     │
//!  └────────────┘              └─────────────────────┘        └─────────┬────┘
//!                                                                       │
//!                              ┌─────────────────────┐    send_audio    │
//!                              │      RtpSender      │◀─────────────────┘
//!                              │  f32 → i16be → RTP  │
//!                              └──────────┬──────────┘
//!                                         │ UDP
//!                                         ▼
//!                              ┌─────────────────────┐    audio cb
//!                              │     RtpReceiver     ├──────────────▶ consumer
//!                              │  RTP → i16be → f32  │
//!                              └─────────────────────┘
//! ```
//!
//! The capture side keeps only the most recent window of audio: the device
//! callback pushes into a mutex-guarded ring and an application drain thread
//! pulls 10 ms slices and ships them as RFC 3550 packets. Receive is
//! symmetric and stateless; every well-formed datagram becomes exactly one
//! callback invocation, in arrival order.

pub mod audio;
pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod net;

pub use client::VoxClient;
pub use config::{AudioConfig, StreamConfig};
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for capture and playback
    pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

    /// Default channel count (mono voice)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Default capture window retained by the circular buffer, in ms
    pub const DEFAULT_BUFFER_MS: u32 = 30;

    /// Default RTP destination port
    pub const DEFAULT_RTP_PORT: u16 = 5004;

    /// Default MQTT control port
    pub const DEFAULT_CONTROL_PORT: u16 = 1883;

    /// Default maximum RTP payload size in bytes
    pub const DEFAULT_PACKET_SIZE: u32 = 512;

    /// Topic the control channel subscribes to for server status
    pub const DEFAULT_CONTROL_TOPIC: &str = "status/server";

    /// Topic the control channel publishes commands on
    pub const COMMAND_TOPIC: &str = "control";

    /// Cadence of the streaming drain loop, in ms
    pub const DRAIN_INTERVAL_MS: u64 = 10;

    /// Frames per device buffer requested from the audio host
    pub const FRAMES_PER_BUFFER: u32 = 1024;

    /// Packet ring capacity; about one second of audio at 10 ms packets
    pub const PACKET_RING_CAPACITY: usize = 100;
}
