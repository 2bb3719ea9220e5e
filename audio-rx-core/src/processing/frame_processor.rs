use crate::models::audio_models::PcmFrame;
use crate::models::config::PcmFormat;

/// Slices a byte stream into fixed-size PCM frames.
///
/// Frames always hold exactly `packet_size × frame_sample_count` bytes. A
/// trailing partial frame is kept and completed by the next call, so frame
/// boundaries do not depend on how the producer chunked its writes.
/// Sequence numbers increase by one per frame; after an overrun they jump by
/// the number of frames lost, which leaves a visible gap.
#[derive(Debug)]
pub struct FrameProcessor {
    format: PcmFormat,
    frame_bytes: usize,
    pending: Vec<u8>,
    next_sequence: u64,
}

/// Result of [`FrameProcessor::note_overrun`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrunGap {
    /// Sequence numbers that will never be emitted.
    pub skipped_frames: u64,
    /// Whole packets of the abandoned partial frame.
    pub salvaged: Vec<u8>,
}

impl FrameProcessor {
    pub fn new(format: PcmFormat, frame_sample_count: usize) -> Self {
        let frame_bytes = format.packet_size() * frame_sample_count.max(1);
        Self {
            format,
            frame_bytes,
            pending: Vec::with_capacity(frame_bytes),
            next_sequence: 0,
        }
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Sequence number the next complete frame will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Bytes retained from previous calls, always less than one frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append `bytes` and return every frame completed by them.
    pub fn process(&mut self, bytes: &[u8]) -> Vec<PcmFrame> {
        self.pending.extend_from_slice(bytes);

        let complete = self.pending.len() / self.frame_bytes;
        if complete == 0 {
            return Vec::new();
        }

        let mut frames = Vec::with_capacity(complete);
        for chunk in self.pending.chunks_exact(self.frame_bytes) {
            frames.push(PcmFrame {
                sequence: self.next_sequence,
                data: chunk.to_vec(),
            });
            self.next_sequence += 1;
        }
        self.pending.drain(..complete * self.frame_bytes);
        frames
    }

    /// Account for `dropped_bytes` lost upstream.
    ///
    /// The retained partial frame can no longer be completed. Its whole
    /// packets are handed back in the returned gap so the caller can still
    /// store them, and the sequence jumps past every frame the loss touched.
    pub fn note_overrun(&mut self, dropped_bytes: u64) -> OverrunGap {
        let lost = self.pending.len() as u64 + dropped_bytes;
        let skipped_frames = lost.div_ceil(self.frame_bytes as u64).max(1);
        self.next_sequence += skipped_frames;
        OverrunGap {
            skipped_frames,
            salvaged: self.take_remainder(),
        }
    }

    /// Take the retained partial frame, trimmed to whole packets.
    ///
    /// Used at shutdown so the tail of the recording reaches the file.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        let whole = self.pending.len() / self.format.packet_size() * self.format.packet_size();
        self.pending.truncate(whole);
        std::mem::take(&mut self.pending)
    }
}
