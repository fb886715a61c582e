use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};
use log::debug;

use crate::stream::{DeviceId, StreamError, StreamResult};

/// Rates probed against each device's supported ranges.
const COMMON_SAMPLE_RATES: [u32; 11] = [
    8000, 11025, 16000, 22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the host's device list, stable for one enumeration.
    pub id: DeviceId,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub supported_sample_rates: Vec<u32>,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

impl DeviceInfo {
    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }

    pub fn is_output(&self) -> bool {
        self.max_output_channels > 0
    }

    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        self.supported_sample_rates.contains(&rate)
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (in {}ch / out {}ch){}",
            self.id,
            self.name,
            self.max_input_channels,
            self.max_output_channels,
            if self.is_default_input || self.is_default_output { " (default)" } else { "" }
        )
    }
}

/// Snapshot of the default host's devices.
pub struct DeviceEnumerator {
    devices: Vec<(cpal::Device, DeviceInfo)>,
}

impl DeviceEnumerator {
    pub fn new() -> StreamResult<Self> {
        Self::with_host(&cpal::default_host())
    }

    pub fn with_host(host: &cpal::Host) -> StreamResult<Self> {
        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        let mut devices = Vec::new();
        for (index, device) in host.devices().map_err(StreamError::backend)?.enumerate() {
            let id = index as DeviceId;
            let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
            let info = Self::query_device_info(
                &device,
                id,
                name.clone(),
                default_input.as_deref() == Some(name.as_str()),
                default_output.as_deref() == Some(name.as_str()),
            );
            debug!("found audio device {}", info);
            devices.push((device, info));
        }

        Ok(Self { devices })
    }

    fn query_device_info(
        device: &cpal::Device,
        id: DeviceId,
        name: String,
        is_default_input: bool,
        is_default_output: bool,
    ) -> DeviceInfo {
        let mut max_input_channels = 0u16;
        let mut max_output_channels = 0u16;
        let mut sample_rates = Vec::new();

        let mut probe_rates = |range: &cpal::SupportedStreamConfigRange| {
            let min = range.min_sample_rate().0;
            let max = range.max_sample_rate().0;
            sample_rates.extend(COMMON_SAMPLE_RATES.iter().filter(|&&rate| rate >= min && rate <= max));
        };

        // A device that fails to report configs for a direction simply has
        // no channels in that direction.
        if let Ok(configs) = device.supported_input_configs() {
            for range in configs {
                max_input_channels = max_input_channels.max(range.channels());
                probe_rates(&range);
            }
        }
        if let Ok(configs) = device.supported_output_configs() {
            for range in configs {
                max_output_channels = max_output_channels.max(range.channels());
                probe_rates(&range);
            }
        }

        sample_rates.sort_unstable();
        sample_rates.dedup();

        DeviceInfo {
            id,
            name,
            max_input_channels,
            max_output_channels,
            supported_sample_rates: sample_rates,
            is_default_input,
            is_default_output,
        }
    }

    fn infos(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().map(|(_, info)| info)
    }

    pub fn all_devices(&self) -> Vec<&DeviceInfo> {
        self.infos().collect()
    }

    pub fn input_devices(&self) -> Vec<&DeviceInfo> {
        self.infos().filter(|info| info.is_input()).collect()
    }

    pub fn output_devices(&self) -> Vec<&DeviceInfo> {
        self.infos().filter(|info| info.is_output()).collect()
    }

    pub fn default_input_device(&self) -> StreamResult<&DeviceInfo> {
        self.infos()
            .find(|info| info.is_input() && info.is_default_input)
            .ok_or_else(|| StreamError::Backend("No default input device available".into()))
    }

    pub fn default_output_device(&self) -> StreamResult<&DeviceInfo> {
        self.infos()
            .find(|info| info.is_output() && info.is_default_output)
            .ok_or_else(|| StreamError::Backend("No default output device available".into()))
    }

    pub fn device_info(&self, id: DeviceId) -> StreamResult<&DeviceInfo> {
        self.devices
            .get(id as usize)
            .map(|(_, info)| info)
            .ok_or(StreamError::DeviceNotFound(id))
    }

    /// Case-insensitive; exact name first, then substring.
    pub fn find_device_by_name(&self, name: &str) -> Option<&DeviceInfo> {
        let needle = name.to_lowercase();
        self.infos()
            .find(|info| info.name.to_lowercase() == needle)
            .or_else(|| self.infos().find(|info| info.name.to_lowercase().contains(&needle)))
    }

    /// The cpal handle behind `id`.
    pub fn select_device(&self, id: DeviceId) -> StreamResult<&cpal::Device> {
        self.devices
            .get(id as usize)
            .map(|(device, _)| device)
            .ok_or(StreamError::DeviceNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface() -> DeviceInfo {
        DeviceInfo {
            id: 2,
            name: "Scarlett 2i2 USB".into(),
            max_input_channels: 2,
            max_output_channels: 2,
            supported_sample_rates: vec![44100, 48000, 96000],
            is_default_input: true,
            is_default_output: false,
        }
    }

    #[test]
    fn direction_follows_channel_counts() {
        let mut info = interface();
        assert!(info.is_input() && info.is_output());

        info.max_output_channels = 0;
        assert!(!info.is_output());
    }

    #[test]
    fn sample_rate_lookup() {
        let info = interface();
        assert!(info.supports_sample_rate(48000));
        assert!(!info.supports_sample_rate(22050));
    }

    #[test]
    fn display_marks_default() {
        assert_eq!(
            interface().to_string(),
            "[2] Scarlett 2i2 USB (in 2ch / out 2ch) (default)"
        );
    }
}
