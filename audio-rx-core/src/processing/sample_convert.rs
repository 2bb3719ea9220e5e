//! Pure-math sample conversion for backends whose native stream format
//! differs from the session's requested PCM format.
//!
//! All functions work on interleaved `f32` buffers in `[-1.0, 1.0]`.

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Duplicate a mono signal into interleaved stereo `[L0, R0, L1, R1, ...]`.
pub fn upmix_to_stereo(mono: &[f32]) -> Vec<f32> {
    let mut stereo = Vec::with_capacity(mono.len() * 2);
    for &sample in mono {
        stereo.push(sample);
        stereo.push(sample);
    }
    stereo
}

/// Map `source_channels` to `target_channels` (1 or 2).
///
/// More than two source channels are folded to mono first.
pub fn adapt_channels(samples: &[f32], source_channels: usize, target_channels: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples.len());
    adapt_channels_into(samples, source_channels, target_channels, &mut out);
    out
}

/// [`adapt_channels`], appending to `out` instead of allocating.
pub fn adapt_channels_into(samples: &[f32], source_channels: usize, target_channels: usize, out: &mut Vec<f32>) {
    if source_channels == target_channels || source_channels == 0 {
        out.extend_from_slice(samples);
        return;
    }
    let scale = 1.0 / source_channels as f32;
    for frame in samples.chunks_exact(source_channels) {
        let mono = frame.iter().sum::<f32>() * scale;
        out.push(mono);
        if target_channels == 2 {
            out.push(mono);
        }
    }
}

/// Linear interpolation resampling for a complete interleaved buffer.
///
/// Returns input unchanged if rates match. The last input frame is held
/// to fill the tail, so this suits whole files; audio that arrives in
/// chunks goes through [`Resampler`].
pub fn resample(samples: &[f32], channels: usize, source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() || channels == 0 {
        return samples.to_vec();
    }

    let frame_count = samples.len() / channels;
    let ratio = target_rate as f64 / source_rate as f64;
    let output_frames = (frame_count as f64 * ratio) as usize;
    if output_frames == 0 {
        return Vec::new();
    }

    let mut output = vec![0.0f32; output_frames * channels];
    for i in 0..output_frames {
        let source_index = i as f64 / ratio;
        let index = source_index as usize;
        let fraction = (source_index - index as f64) as f32;

        for ch in 0..channels {
            let current = samples[index * channels + ch];
            output[i * channels + ch] = if index + 1 < frame_count {
                let next = samples[(index + 1) * channels + ch];
                current * (1.0 - fraction) + next * fraction
            } else {
                current
            };
        }
    }
    output
}

/// Streaming linear resampler for interleaved audio delivered in chunks.
///
/// The read position and the last input frame carry over between calls, so
/// chunk boundaries neither drop nor repeat output: `n` input frames yield
/// `n × target_rate / source_rate` output frames, give or take one.
#[derive(Debug, Clone)]
pub struct Resampler {
    channels: usize,
    source_rate: i64,
    target_rate: i64,
    /// Next output position in input frames, scaled by `target_rate` and
    /// relative to the start of the next chunk. Between -target_rate and 0
    /// it lies between the previous chunk's last frame and the next chunk.
    position: i64,
    previous: Vec<f32>,
}

impl Resampler {
    pub fn new(channels: usize, source_rate: u32, target_rate: u32) -> Self {
        Self {
            channels: channels.max(1),
            source_rate: source_rate.max(1) as i64,
            target_rate: target_rate.max(1) as i64,
            position: 0,
            previous: Vec::new(),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate
    }

    /// Resample the next chunk, appending to `out`.
    pub fn process_into(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }
        let channels = self.channels;
        let frames = input.len() / channels;
        if frames == 0 {
            return;
        }

        let previous = &self.previous;
        let sample = |index: i64, ch: usize| -> f32 {
            if index < 0 {
                previous.get(ch).copied().unwrap_or(0.0)
            } else {
                input[index as usize * channels + ch]
            }
        };

        let last = (frames as i64 - 1) * self.target_rate;
        let mut position = self.position;
        while position <= last {
            let index = position.div_euclid(self.target_rate);
            let offset = position.rem_euclid(self.target_rate);
            let fraction = offset as f32 / self.target_rate as f32;
            for ch in 0..channels {
                let current = sample(index, ch);
                out.push(if offset == 0 {
                    current
                } else {
                    current + (sample(index + 1, ch) - current) * fraction
                });
            }
            position += self.source_rate;
        }

        self.position = position - frames as i64 * self.target_rate;
        self.previous.clear();
        self.previous
            .extend_from_slice(&input[(frames - 1) * channels..frames * channels]);
    }

    /// Forget the carried-over position and frame.
    pub fn reset(&mut self) {
        self.position = 0;
        self.previous.clear();
    }
}

/// Encode samples as PCM bytes of the given depth, appending to `out`.
///
/// 2 bytes: signed 16-bit little-endian. 1 byte: unsigned 8-bit, midpoint 128.
/// Out-of-range values are clamped.
pub fn encode_pcm(samples: &[f32], byte_depth: u16, out: &mut Vec<u8>) {
    out.reserve(samples.len() * byte_depth as usize);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        if byte_depth == 2 {
            let value = (clamped * i16::MAX as f32) as i16;
            out.extend_from_slice(&value.to_le_bytes());
        } else {
            let value = (clamped * 127.0 + 128.0).round() as u8;
            out.push(value);
        }
    }
}
