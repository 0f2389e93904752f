/// Append-only byte buffer whose capacity only ever grows.
///
/// Geometry is rebuilt every frame, so the buffer is written in passes:
/// `begin()` rewinds the cursor without releasing memory, `put_*` append raw
/// little-endian values (growing on demand), and `end()` finalizes the pass
/// and reports whether it grew capacity. The caller uses that flag to decide
/// between a full GPU buffer respecification and a cheap sub-range update.
///
/// Capacity grows by doubling, or to the exact required size when doubling is
/// still insufficient. It never shrinks; memory is released on drop.
#[derive(Debug)]
pub struct GrowableBuffer {
    /// Backing storage; `data.len()` is the capacity, `cursor` the write head.
    data: Vec<u8>,
    cursor: usize,
    count: usize,
    grown: bool,
    in_pass: bool,
}

impl GrowableBuffer {
    /// Creates a buffer with `initial_capacity` bytes of backing storage.
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            data: vec![0; initial_capacity],
            cursor: 0,
            count: 0,
            grown: false,
            in_pass: false,
        }
    }

    /// Starts a write pass: rewinds the cursor and element count.
    ///
    /// Never changes capacity. Calling `begin()` on an already-open pass
    /// simply restarts it; `end()` requires an open pass.
    pub fn begin(&mut self) {
        self.cursor = 0;
        self.count = 0;
        self.grown = false;
        self.in_pass = true;
    }

    /// Finalizes the current write pass.
    ///
    /// Returns whether this pass grew capacity.
    pub fn end(&mut self) -> bool {
        debug_assert!(self.in_pass, "end() without a matching begin()");
        self.in_pass = false;
        self.grown
    }

    /// Appends one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.put_bytes(&[value]);
        self.count += 1;
    }

    /// Appends one little-endian u32.
    pub fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_le_bytes());
        self.count += 1;
    }

    /// Appends one little-endian f32.
    pub fn put_f32(&mut self, value: f32) {
        self.put_bytes(&value.to_le_bytes());
        self.count += 1;
    }

    /// Appends a run of bytes as `bytes.len()` elements.
    ///
    /// A single oversized run can outgrow doubling; capacity then jumps to
    /// the exact required size.
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.put_bytes(bytes);
        self.count += bytes.len();
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of logical elements written since the last `begin()`.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The bytes written since the last `begin()`.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.cursor]
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(self.in_pass, "write outside begin()/end()");
        let needed = self.cursor + bytes.len();
        if needed > self.data.len() {
            let new_capacity = (self.data.len() * 2).max(needed);
            self.data.resize(new_capacity, 0);
            self.grown = true;
        }
        self.data[self.cursor..needed].copy_from_slice(bytes);
        self.cursor = needed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIB: usize = 1024;

    fn fill(buffer: &mut GrowableBuffer, bytes: usize) {
        buffer.put_slice(&vec![0xab; bytes]);
    }

    // ── growth policy ─────────────────────────────────────────────────────

    #[test]
    fn overflow_grows_and_reports_it() {
        let mut buffer = GrowableBuffer::new(256 * KIB);

        buffer.begin();
        fill(&mut buffer, 300 * KIB);
        assert!(buffer.end());
        assert!(buffer.capacity() >= 300 * KIB);

        // The next pass fits in the grown capacity: no further growth.
        let capacity = buffer.capacity();
        buffer.begin();
        fill(&mut buffer, 100 * KIB);
        assert!(!buffer.end());
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn growth_doubles_when_sufficient() {
        let mut buffer = GrowableBuffer::new(16);
        buffer.begin();
        fill(&mut buffer, 17);
        assert!(buffer.end());
        assert_eq!(buffer.capacity(), 32);
    }

    #[test]
    fn growth_is_exact_fit_when_doubling_is_not_enough() {
        let mut buffer = GrowableBuffer::new(16);
        buffer.begin();
        // One 100-byte run: doubling to 32 is insufficient, so capacity
        // jumps straight to the required size.
        fill(&mut buffer, 100);
        assert!(buffer.end());
        assert_eq!(buffer.capacity(), 100);
    }

    #[test]
    fn capacity_is_monotonic_and_covers_written_bytes() {
        let mut buffer = GrowableBuffer::new(8);
        let mut last_capacity = buffer.capacity();

        for pass in 1..6 {
            buffer.begin();
            fill(&mut buffer, pass * 10);
            buffer.end();

            assert!(buffer.capacity() >= last_capacity);
            assert!(buffer.capacity() >= pass * 10);
            last_capacity = buffer.capacity();
        }
    }

    // ── pass bookkeeping ──────────────────────────────────────────────────

    #[test]
    fn begin_rewinds_without_changing_capacity() {
        let mut buffer = GrowableBuffer::new(64);
        buffer.begin();
        buffer.put_u32(7);
        buffer.end();

        buffer.begin();
        assert_eq!(buffer.capacity(), 64);
        assert_eq!(buffer.count(), 0);
        assert!(buffer.written().is_empty());
    }

    #[test]
    fn contents_are_preserved_across_growth() {
        let mut buffer = GrowableBuffer::new(4);
        buffer.begin();
        buffer.put_u32(0xdeadbeef);
        buffer.put_u32(0x01020304);
        buffer.end();

        assert_eq!(
            buffer.written(),
            &[0xef, 0xbe, 0xad, 0xde, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn count_tracks_elements_not_bytes() {
        let mut buffer = GrowableBuffer::new(64);
        buffer.begin();
        buffer.put_f32(1.0);
        buffer.put_u32(2);
        buffer.put_u8(3);
        buffer.end();

        assert_eq!(buffer.count(), 3);
        assert_eq!(buffer.written().len(), 9);
    }
}
