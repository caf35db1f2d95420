//! Audio capture and playback subsystem

pub mod adapter;
pub mod buffer;
pub mod device;

pub use adapter::AudioDeviceAdapter;
pub use buffer::CircularAudioBuffer;
pub use device::{list_devices, DeviceInfo};
