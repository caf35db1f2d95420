//! Audio device enumeration by numeric id
//!
//! Devices are addressed by their position in the host's enumeration order;
//! a negative id selects the system default.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// Summary of an enumerated device, for listing in the example binaries
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: usize,
    pub name: String,
    pub is_input: bool,
    pub is_default: bool,
}

/// Resolve a capture device. `id < 0` selects the host default.
pub fn capture_device(id: i32) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    if id < 0 {
        return host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceOpen("no default capture device".to_string()));
    }
    host.input_devices()
        .map_err(|e| AudioError::DeviceOpen(e.to_string()))?
        .nth(id as usize)
        .ok_or_else(|| AudioError::DeviceOpen(format!("no capture device with id {id}")))
}

/// Resolve a playback device. `id < 0` selects the host default.
pub fn playback_device(id: i32) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    if id < 0 {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceOpen("no default playback device".to_string()));
    }
    host.output_devices()
        .map_err(|e| AudioError::DeviceOpen(e.to_string()))?
        .nth(id as usize)
        .ok_or_else(|| AudioError::DeviceOpen(format!("no playback device with id {id}")))
}

/// List capture and playback devices with their numeric ids.
pub fn list_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_input = host.default_input_device().and_then(|d| d.name().ok());
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(inputs) = host.input_devices() {
        for (id, device) in inputs.enumerate() {
            if let Ok(name) = device.name() {
                devices.push(DeviceInfo {
                    id,
                    is_default: default_input.as_ref() == Some(&name),
                    name,
                    is_input: true,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for (id, device) in outputs.enumerate() {
            if let Ok(name) = device.name() {
                devices.push(DeviceInfo {
                    id,
                    is_default: default_output.as_ref() == Some(&name),
                    name,
                    is_input: false,
                });
            }
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_id_fails() {
        // Whatever hardware is present, id 10_000 is past the enumeration
        assert!(capture_device(10_000).is_err());
        assert!(playback_device(10_000).is_err());
    }

    #[test]
    fn test_list_ids_are_positional() {
        for (i, info) in list_devices().iter().filter(|d| d.is_input).enumerate() {
            assert_eq!(info.id, i);
        }
    }
}
