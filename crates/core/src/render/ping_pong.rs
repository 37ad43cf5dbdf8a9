//! Read/write slot tracking for a pair of double-buffered targets.
//!
//! The mask chain renders each new mask into the write slot, then swaps so
//! the frame composite always reads the most recently finished mask.

/// Which of two slots is read from and which is written to.
/// `read_index() != write_index()` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingPong {
    read: usize,
}

impl PingPong {
    /// Reads slot 0, writes slot 1.
    pub fn new() -> Self {
        Self { read: 0 }
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        1 - self.read
    }

    /// Publishes the write slot as the new read slot.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Borrows the current read element of `pair`.
    pub fn read<'a, T>(&self, pair: &'a [T; 2]) -> &'a T {
        &pair[self.read]
    }

    /// Mutably borrows the current write element of `pair`.
    pub fn write<'a, T>(&self, pair: &'a mut [T; 2]) -> &'a mut T {
        &mut pair[self.write_index()]
    }
}
