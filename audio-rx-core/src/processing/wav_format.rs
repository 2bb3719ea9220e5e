//! WAV file format utilities.
//!
//! Generates the canonical 44-byte RIFF/PCM header and patches its size and
//! format fields once a recording completes.

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest data chunk a RIFF file can describe.
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64 - (WAV_HEADER_SIZE as u64 - 8);

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian. 8-bit data is unsigned,
/// 16-bit data is signed, as the format requires.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36u32.saturating_add(data_size)).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    patch_format(&mut header, sample_rate, channels, bit_depth);

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Patch the file-size field at offset 4 (RIFF chunk size = file_size - 8).
pub fn patch_file_size(header: &mut [u8], total_file_size: u64) {
    let chunk_size = total_file_size.saturating_sub(8).min(u32::MAX as u64) as u32;
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
}

/// Patch the data-size field at offset 40.
pub fn patch_data_size(header: &mut [u8], data_size: u64) {
    let data_size_u32 = data_size.min(MAX_DATA_SIZE) as u32;
    header[40..44].copy_from_slice(&data_size_u32.to_le_bytes());
}

/// Patch channels (22), sample rate (24), byte rate (28), block align (32)
/// and bit depth (34).
pub fn patch_format(header: &mut [u8], sample_rate: u32, channels: u16, bit_depth: u16) {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;

    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(header: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([header[offset], header[offset + 1]])
    }

    fn u32_at(header: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([header[offset], header[offset + 1], header[offset + 2], header[offset + 3]])
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(16000, 8, 1, 0);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u16_at(&header, 20), 1);
        assert_eq!(u32_at(&header, 16), 16);
    }

    #[test]
    fn header_44khz_stereo_16bit() {
        let header = generate_wav_header(44100, 16, 2, 9600);

        assert_eq!(u16_at(&header, 22), 2);
        assert_eq!(u32_at(&header, 24), 44100);
        assert_eq!(u32_at(&header, 28), 176_400); // 44100 * 2 * 16/8
        assert_eq!(u16_at(&header, 32), 4);
        assert_eq!(u16_at(&header, 34), 16);
        assert_eq!(u32_at(&header, 40), 9600);
        assert_eq!(u32_at(&header, 4), 36 + 9600);
    }

    #[test]
    fn header_16khz_mono_8bit() {
        let header = generate_wav_header(16000, 8, 1, 0);
        assert_eq!(u32_at(&header, 28), 16000);
        assert_eq!(u16_at(&header, 32), 1);
        assert_eq!(u16_at(&header, 34), 8);
    }

    #[test]
    fn patch_sizes() {
        let mut header = generate_wav_header(48000, 16, 2, 0);

        patch_data_size(&mut header, 19200);
        assert_eq!(u32_at(&header, 40), 19200);

        patch_file_size(&mut header, 19200 + 44);
        assert_eq!(u32_at(&header, 4), 19200 + 36);
    }

    #[test]
    fn oversized_data_is_clamped() {
        let mut header = generate_wav_header(48000, 16, 2, 0);
        patch_data_size(&mut header, u64::MAX);
        assert_eq!(u32_at(&header, 40) as u64, MAX_DATA_SIZE);
    }

    #[test]
    fn patch_format_updates_derived_fields() {
        let mut header = generate_wav_header(48000, 16, 2, 0);
        patch_format(&mut header, 16000, 1, 8);

        assert_eq!(u32_at(&header, 24), 16000);
        assert_eq!(u32_at(&header, 28), 16000);
        assert_eq!(u16_at(&header, 22), 1);
        assert_eq!(u16_at(&header, 34), 8);
    }
}
