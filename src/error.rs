//! Error types for the voice streaming client

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Configuration busy: {0}")]
    Busy(&'static str),

    #[error("Client is not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to open device: {0}")]
    DeviceOpen(String),

    #[error("Capture device was never opened")]
    NoDevice,

    #[error("Audio buffer has no backing storage")]
    NotInitialized,

    #[error("Audio is not running")]
    NotRunning,

    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// Network subsystem errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to open socket: {0}")]
    SocketOpen(String),

    #[error("Endpoint is not initialized")]
    NotInitialized,

    #[error("Sender is not running")]
    NotRunning,

    #[error("Short transmit: sent {sent} of {expected} bytes")]
    TransmitShort { sent: usize, expected: usize },

    #[error("Payload of {bytes} bytes exceeds {max} and fragmentation is disabled")]
    PayloadTooLarge { bytes: usize, max: usize },

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Control channel errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Broker connection failed: {0}")]
    ConnectFailed(String),

    #[error("Control channel is not connected")]
    NotConnected,

    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
