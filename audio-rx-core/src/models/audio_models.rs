use serde::{Deserialize, Serialize};

use super::config::PcmFormat;
use crate::processing::volume;

/// An audio input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// A fixed-size slice of consecutive PCM bytes, tagged with its position in
/// the session's frame sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl PcmFrame {
    /// First sample of the first channel, decoded per byte depth: signed for
    /// 16-bit, unsigned (0..=255) for 8-bit.
    pub fn first_sample(&self, format: &PcmFormat) -> Option<i32> {
        match format.byte_depth {
            2 if self.data.len() >= 2 => Some(i16::from_le_bytes([self.data[0], self.data[1]]) as i32),
            1 => self.data.first().map(|&b| b as i32),
            _ => None,
        }
    }

    /// Volume of the frame in dBFS, floored at `floor_dbfs`.
    pub fn volume_dbfs(&self, format: &PcmFormat, floor_dbfs: f64) -> f64 {
        volume::dbfs(&self.data, format.byte_depth, floor_dbfs)
    }

    /// Number of packets (one sample per channel) in the frame.
    pub fn packet_count(&self, format: &PcmFormat) -> usize {
        self.data.len() / format.packet_size()
    }
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureDiagnostics {
    pub callback_count: u64,
    pub bytes_captured: u64,
    pub frames_processed: u64,
    pub bytes_written: u64,
    pub overrun_count: u64,
    pub dropped_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO_16: PcmFormat = PcmFormat { sample_rate: 8000, channels: 1, byte_depth: 2 };
    const STEREO_8: PcmFormat = PcmFormat { sample_rate: 8000, channels: 2, byte_depth: 1 };

    #[test]
    fn first_sample_is_signed_for_16_bit() {
        let frame = PcmFrame { sequence: 0, data: (-1234i16).to_le_bytes().to_vec() };
        assert_eq!(frame.first_sample(&MONO_16), Some(-1234));
    }

    #[test]
    fn first_sample_is_unsigned_for_8_bit() {
        let frame = PcmFrame { sequence: 0, data: vec![200, 10] };
        assert_eq!(frame.first_sample(&STEREO_8), Some(200));
        assert_eq!(frame.packet_count(&STEREO_8), 1);
    }

    #[test]
    fn first_sample_of_empty_frame() {
        let frame = PcmFrame { sequence: 0, data: Vec::new() };
        assert_eq!(frame.first_sample(&MONO_16), None);
        assert_eq!(frame.first_sample(&STEREO_8), None);
    }
}
