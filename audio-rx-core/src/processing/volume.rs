//! RMS volume metering in dBFS.
//!
//! 16-bit samples are signed little-endian with full scale 32768; 8-bit
//! samples are unsigned with the midpoint at 128 and full scale 128. Every
//! sample of every channel contributes to the RMS.

/// Full-scale magnitude for 16-bit signed samples.
const FULL_SCALE_I16: f64 = 32768.0;

/// Midpoint and full-scale magnitude for 8-bit unsigned samples.
const MIDPOINT_U8: f64 = 128.0;

/// Normalized samples (`-1.0..=1.0`) decoded from raw PCM bytes.
///
/// A trailing odd byte in 16-bit data is ignored.
pub fn normalized_samples(bytes: &[u8], byte_depth: u16) -> impl Iterator<Item = f64> + '_ {
    let step = if byte_depth == 2 { 2 } else { 1 };
    bytes.chunks_exact(step).map(move |chunk| match chunk {
        [lo, hi] => i16::from_le_bytes([*lo, *hi]) as f64 / FULL_SCALE_I16,
        [b] => (*b as f64 - MIDPOINT_U8) / MIDPOINT_U8,
        _ => 0.0,
    })
}

/// Root mean square of the normalized samples, 0.0 for empty input.
pub fn rms(bytes: &[u8], byte_depth: u16) -> f64 {
    let (sum, count) = normalized_samples(bytes, byte_depth)
        .fold((0.0f64, 0usize), |(sum, count), s| (sum + s * s, count + 1));
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

/// Convert a normalized RMS level to dBFS, clamped to `[floor_dbfs, 0]`.
pub fn rms_to_dbfs(rms: f64, floor_dbfs: f64) -> f64 {
    if rms <= 0.0 {
        return floor_dbfs;
    }
    (20.0 * rms.log10()).clamp(floor_dbfs, 0.0)
}

/// Volume of a block of raw PCM in dBFS. Silence yields `floor_dbfs`.
pub fn dbfs(bytes: &[u8], byte_depth: u16, floor_dbfs: f64) -> f64 {
    rms_to_dbfs(rms(bytes, byte_depth), floor_dbfs)
}
