/// Fixed-capacity circular buffer of raw PCM bytes.
///
/// Shared between the capture callback (producer) and the consumer thread
/// as `Arc<parking_lot::Mutex<RingBuffer>>`; both sides hold the lock only
/// for a copy, so the producer never waits on processing work.
///
/// Overflow behavior: the oldest unread bytes are overwritten and the
/// overrun counters are bumped. Callers keep writes packet-aligned and the
/// capacity a whole number of frames, which keeps overflow drops aligned too.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Vec<u8>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
    overruns: u64,
    dropped_bytes: u64,
}

/// Overruns observed since the previous [`RingBuffer::take_overruns`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrunReport {
    pub overruns: u64,
    pub dropped_bytes: u64,
}

impl OverrunReport {
    pub fn is_empty(&self) -> bool {
        self.overruns == 0
    }
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            buffer: vec![0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
            overruns: 0,
            dropped_bytes: 0,
        }
    }

    /// Write bytes into the ring buffer. Never blocks and never fails.
    ///
    /// If the buffer overflows, the oldest bytes are dropped.
    /// If `bytes` is larger than capacity, only the last `capacity` bytes are kept.
    pub fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let mut dropped = 0;
        let bytes = if bytes.len() > self.capacity {
            dropped += bytes.len() - self.capacity;
            &bytes[bytes.len() - self.capacity..]
        } else {
            bytes
        };

        let overflow = (self.available + bytes.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % self.capacity;
            self.available -= overflow;
            dropped += overflow;
        }
        if dropped > 0 {
            self.overruns += 1;
            self.dropped_bytes += dropped as u64;
        }

        // At most two contiguous segments: up to the end, then from the start.
        let first = bytes.len().min(self.capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        if rest > 0 {
            self.buffer[..rest].copy_from_slice(&bytes[first..]);
        }
        self.write_index = (self.write_index + bytes.len()) % self.capacity;
        self.available += bytes.len();
    }

    /// Read and remove up to `max_bytes` bytes.
    ///
    /// Returns fewer bytes if fewer are available, or an empty vec.
    pub fn read(&mut self, max_bytes: usize) -> Vec<u8> {
        let to_read = max_bytes.min(self.available);
        if to_read == 0 {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(to_read);
        let first = to_read.min(self.capacity - self.read_index);
        result.extend_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        result.extend_from_slice(&self.buffer[..to_read - first]);

        self.read_index = (self.read_index + to_read) % self.capacity;
        self.available -= to_read;
        result
    }

    /// Number of bytes currently available for reading.
    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Total overruns since creation or the last reset.
    pub fn overrun_count(&self) -> u64 {
        self.overruns
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Return the overruns recorded since the last call and clear them.
    pub fn take_overruns(&mut self) -> OverrunReport {
        let report = OverrunReport {
            overruns: self.overruns,
            dropped_bytes: self.dropped_bytes,
        };
        self.overruns = 0;
        self.dropped_bytes = 0;
        report
    }

    /// Reset the buffer to empty state.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
        self.overruns = 0;
        self.dropped_bytes = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1, 2, 3]);

        assert_eq!(buf.count(), 3);
        assert_eq!(buf.read(3), vec![1, 2, 3]);
        assert!(buf.is_empty());
        assert_eq!(buf.overrun_count(), 0);
    }

    #[test]
    fn read_partial() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1, 2, 3, 4, 5]);

        assert_eq!(buf.read(3), vec![1, 2, 3]);
        assert_eq!(buf.count(), 2);

        let rest = buf.read(10); // request more than available
        assert_eq!(rest, vec![4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1, 2, 3, 4]);
        buf.write(&[5, 6]); // overflow: drops 1, 2

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3, 4, 5, 6]);
        assert_eq!(buf.overrun_count(), 1);
        assert_eq!(buf.dropped_bytes(), 2);
    }

    #[test]
    fn write_larger_than_capacity() {
        let mut buf = RingBuffer::new(3);
        buf.write(&[1, 2, 3, 4, 5]); // only last 3 kept

        assert_eq!(buf.count(), 3);
        assert_eq!(buf.read(3), vec![3, 4, 5]);
        assert_eq!(buf.dropped_bytes(), 2);
    }

    #[test]
    fn oversized_write_on_top_of_unread_data() {
        let mut buf = RingBuffer::new(3);
        buf.write(&[9, 9]);
        buf.write(&[1, 2, 3, 4]);

        assert_eq!(buf.read(3), vec![2, 3, 4]);
        // 1 byte cut from the write itself plus the 2 unread bytes
        assert_eq!(buf.take_overruns(), OverrunReport { overruns: 1, dropped_bytes: 3 });
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::new(4);

        buf.write(&[1, 2, 3]);
        buf.read(2); // read_index = 2

        buf.write(&[4, 5, 6]); // wraps around

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3, 4, 5, 6]);
        assert_eq!(buf.overrun_count(), 0);
    }

    #[test]
    fn take_overruns_resets_counters() {
        let mut buf = RingBuffer::new(2);
        buf.write(&[1, 2]);
        buf.write(&[3, 4]);
        buf.write(&[5, 6]);

        let report = buf.take_overruns();
        assert_eq!(report.overruns, 2);
        assert_eq!(report.dropped_bytes, 4);
        assert!(buf.take_overruns().is_empty());
    }

    #[test]
    fn reset_clears_buffer() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1, 2, 3]);
        buf.reset();

        assert!(buf.is_empty());
        assert!(buf.read(10).is_empty());
    }

    #[test]
    fn empty_operations() {
        let mut buf = RingBuffer::new(10);

        assert!(buf.read(5).is_empty());
        buf.write(&[]);
        assert!(buf.is_empty());
    }
}
