use tracing::warn;

/// FIFO of synthesized bytes waiting to be read by the client.
///
/// `offset` marks the next unread byte. Once everything has been read the
/// queue snaps back to empty so storage does not creep across round trips;
/// capacity is kept for reuse.
#[derive(Debug, Default)]
pub struct InjectedRx {
    data: Vec<u8>,
    offset: usize,
}

impl InjectedRx {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` to the tail.
    ///
    /// Returns `false`, leaving the queue untouched, when storage cannot grow.
    pub fn enqueue(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        if self.offset > 0 && self.offset == self.data.len() {
            self.reset();
        }
        if let Err(e) = self.data.try_reserve(bytes.len()) {
            warn!(
                requested = bytes.len(),
                queued = self.pending(),
                "Injected RX growth failed, dropping reply: {e}"
            );
            return false;
        }
        self.data.extend_from_slice(bytes);
        true
    }

    /// Copies up to `dst.len()` unread bytes into `dst` and returns the count.
    pub fn dequeue_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.pending());
        if n == 0 {
            return 0;
        }
        dst[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
        self.offset += n;
        if self.offset == self.data.len() {
            self.reset();
        }
        n
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.data.len() - self.offset
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Frees the backing storage. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.offset = 0;
    }

    fn reset(&mut self) {
        self.data.clear();
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut rx = InjectedRx::new();
        assert!(rx.enqueue(&[1, 2]));
        assert!(rx.enqueue(&[3]));

        let mut buf = [0u8; 8];
        assert_eq!(rx.dequeue_into(&mut buf[..2]), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(rx.dequeue_into(&mut buf), 1);
        assert_eq!(buf[0], 3);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_reset_when_drained() {
        let mut rx = InjectedRx::new();
        rx.enqueue(&[0x20, 0x02, 0x00, 0x00]);

        let mut buf = [0u8; 3];
        assert_eq!(rx.dequeue_into(&mut buf), 3);
        assert_eq!(rx.offset(), 3);
        assert_eq!(rx.len(), 4);

        assert_eq!(rx.dequeue_into(&mut buf), 1);
        assert_eq!(rx.offset(), 0);
        assert_eq!(rx.len(), 0);
        assert!(rx.capacity() >= 4);
    }

    #[test]
    fn test_partial_read_then_enqueue_keeps_unread_bytes() {
        let mut rx = InjectedRx::new();
        rx.enqueue(&[1, 2, 3]);
        let mut buf = [0u8; 1];
        rx.dequeue_into(&mut buf);

        rx.enqueue(&[4]);
        assert_eq!(rx.offset(), 1);
        assert_eq!(rx.pending(), 3);

        let mut rest = [0u8; 3];
        assert_eq!(rx.dequeue_into(&mut rest), 3);
        assert_eq!(rest, [2, 3, 4]);
    }

    #[test]
    fn test_storage_bounded_across_round_trips() {
        let mut rx = InjectedRx::new();
        let mut buf = [0u8; 2];
        for _ in 0..10_000 {
            rx.enqueue(&[0xD0, 0x00]);
            assert_eq!(rx.dequeue_into(&mut buf), 2);
        }
        assert_eq!(rx.len(), 0);
        assert!(rx.capacity() < 64);
    }

    #[test]
    fn test_dequeue_empty() {
        let mut rx = InjectedRx::new();
        let mut buf = [0u8; 4];
        assert_eq!(rx.dequeue_into(&mut buf), 0);
        assert_eq!(rx.dequeue_into(&mut []), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut rx = InjectedRx::new();
        rx.enqueue(&[1, 2, 3]);
        rx.release();
        rx.release();
        assert!(rx.is_empty());
        assert_eq!(rx.capacity(), 0);
    }
}
