// BUFFER COMPONENT ------------------------------------------------------------

/// Fixed-capacity sliding window. Always holds exactly `capacity` samples,
/// oldest first; `push` discards the oldest one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer<T> {
    buffer: Vec<T>,
    capacity: usize,
    start: usize,
}

/// Acquisition times in seconds, one per sample of a parallel buffer.
pub type TimestampBuffer = SampleBuffer<f64>;

impl<T: Copy + Default> SampleBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self::filled(capacity, T::default())
    }

    pub fn filled(capacity: usize, value: T) -> Self {
        Self {
            buffer: vec![value; capacity],
            capacity,
            start: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, element: T) {
        if self.capacity == 0 {
            return;
        }
        self.buffer[self.start] = element;
        self.start = (self.start + 1) % self.capacity;
    }

    /// Sample at logical position `index`, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.capacity {
            return None;
        }
        Some(self.buffer[(self.start + index) % self.capacity])
    }

    /// Newest sample.
    pub fn last(&self) -> Option<T> {
        self.capacity.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let (newer, older) = self.buffer.split_at(self.start);
        older.iter().chain(newer.iter()).copied()
    }

    /// Owned copy in time order.
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Start index actually used by [`window`](Self::window): requests running
    /// past the end slide back to the last full-length window.
    pub fn clamp_start(&self, start: usize, len: usize) -> usize {
        clamp_window_start(self.capacity, start, len)
    }

    pub fn window(&self, start: usize, len: usize) -> Vec<T> {
        let len = len.min(self.capacity);
        let start = self.clamp_start(start, len);
        self.iter().skip(start).take(len).collect()
    }
}

/// Largest start `<= start` at which a window of `len` (capped at `total`)
/// still fits inside `total` samples.
pub fn clamp_window_start(total: usize, start: usize, len: usize) -> usize {
    start.min(total - len.min(total))
}

/// Sub-slice of `series` under the same clamping rule as [`SampleBuffer::window`].
pub fn clamped_window(series: &[f64], start: usize, len: usize) -> &[f64] {
    let len = len.min(series.len());
    let start = clamp_window_start(series.len(), start, len);
    &series[start..start + len]
}

/// Times shifted so the first one is zero.
pub fn rezero(times: &[f64]) -> Vec<f64> {
    let origin = times.first().copied().unwrap_or(0.0);
    times.iter().map(|t| t - origin).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_zeroed_at_full_length() {
        let buffer: SampleBuffer<f64> = SampleBuffer::new(5);
        assert_eq!(buffer.snapshot(), vec![0.0; 5]);
        assert_eq!(buffer.capacity(), 5);
    }

    #[test]
    fn push_shifts_left_and_appends() {
        let mut buffer = SampleBuffer::new(3);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.snapshot(), vec![0, 1, 2]);
        buffer.push(3);
        buffer.push(4);
        assert_eq!(buffer.snapshot(), vec![2, 3, 4]);
        assert_eq!(buffer.get(0), Some(2));
        assert_eq!(buffer.last(), Some(4));
        assert_eq!(buffer.get(3), None);
    }

    #[test]
    fn window_clamps_to_last_full_window() {
        let mut buffer = SampleBuffer::new(6);
        for v in 1..=6 {
            buffer.push(v);
        }
        assert_eq!(buffer.window(1, 3), vec![2, 3, 4]);
        assert_eq!(buffer.window(5, 3), vec![4, 5, 6]);
        assert_eq!(buffer.clamp_start(5, 3), 3);
        assert_eq!(buffer.window(0, 10), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn slice_windows_follow_buffer_clamping() {
        let series = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(clamped_window(&series, 1, 2), &[1.0, 2.0]);
        assert_eq!(clamped_window(&series, 4, 2), &[3.0, 4.0]);
        assert_eq!(clamped_window(&series, 0, 9), &series[..]);
        assert_eq!(rezero(&[2.5, 3.0, 4.0]), vec![0.0, 0.5, 1.5]);
    }

    #[test]
    fn zero_capacity_ignores_pushes() {
        let mut buffer: SampleBuffer<u8> = SampleBuffer::new(0);
        buffer.push(1);
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.last(), None);
    }

    proptest! {
        #[test]
        fn push_is_fifo(
            capacity in 1usize..64,
            values in proptest::collection::vec(-1e6f64..1e6, 1..200),
        ) {
            let mut buffer = SampleBuffer::new(capacity);
            for &v in &values {
                buffer.push(v);
            }
            let snapshot = buffer.snapshot();
            prop_assert_eq!(snapshot.len(), capacity);
            prop_assert_eq!(snapshot.last().copied(), values.last().copied());

            let kept = values.len().min(capacity);
            prop_assert_eq!(&snapshot[capacity - kept..], &values[values.len() - kept..]);
        }
    }
}
