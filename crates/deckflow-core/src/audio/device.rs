//! Audio device enumeration
//!
//! Devices are listed from every available cpal host so the same hardware can
//! be picked through ALSA, PipeWire or JACK on Linux.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn get_host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

/// An output device as shown in a settings list
#[derive(Debug, Clone)]
pub struct OutputDevice {
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    /// Whether this is the default device of its host
    pub is_default: bool,
    pub max_channels: u16,
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// All output devices from all hosts, defaults first
pub fn get_output_devices() -> AudioResult<Vec<OutputDevice>> {
    let mut all_devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let default_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        let devices = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };

        for device in devices {
            let Ok(name) = device.name() else {
                continue;
            };
            let max_channels = match device.supported_output_configs() {
                Ok(configs) => configs.map(|c| c.channels()).max().unwrap_or(0),
                Err(_) => continue,
            };
            if max_channels == 0 {
                continue;
            }
            all_devices.push(OutputDevice {
                id: DeviceId::with_host(&name, &host_label),
                is_default: default_name.as_ref() == Some(&name),
                name,
                host: host_label.clone(),
                max_channels,
            });
        }
    }

    if all_devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    all_devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });
    log::info!("Enumerated {} audio output devices", all_devices.len());
    Ok(all_devices)
}

/// Find a device by its ID
///
/// Uses the host named in the ID if there is one, otherwise searches every
/// host by device name.
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(host) = id.host.as_deref().and_then(get_host_by_name) {
        return host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
            .ok_or_else(|| AudioError::DeviceNotFound(id.name.clone()));
    }

    cpal::available_hosts()
        .into_iter()
        .filter_map(|host_id| cpal::host_from_id(host_id).ok())
        .filter_map(|host| host.output_devices().ok())
        .flatten()
        .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
        .ok_or_else(|| AudioError::DeviceNotFound(id.name.clone()))
}

/// Default output device of the default host
pub fn get_cpal_default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_enumeration() {
        // No devices is the normal case on CI machines
        match get_output_devices() {
            Ok(devices) => {
                assert!(devices.iter().all(|d| d.max_channels > 0));
                for device in &devices {
                    println!("  - {} (default: {})", device, device.is_default);
                }
            }
            Err(AudioError::NoDevices) => println!("No audio devices available"),
            Err(e) => println!("Error enumerating devices: {}", e),
        }
    }

    #[test]
    fn test_unknown_device_is_not_found() {
        let id = DeviceId::new("no such device 7f3a");
        assert!(find_device_by_id(&id).is_err());
    }
}
