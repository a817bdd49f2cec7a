/// Running modulo 256 sum over the bytes of a block.
///
/// The window runs from the newline pair opening the first field of a block
/// through the checksum byte, inclusive. A block is intact if the final sum is 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumAccumulator {
    sum: u8,
    count: usize,
}

impl ChecksumAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, b: u8) {
        self.sum = self.sum.wrapping_add(b);
        self.count += 1;
    }

    pub fn extend(&mut self, dat: &[u8]) {
        for b in dat {
            self.add(*b);
        }
    }

    pub fn reset(&mut self) {
        self.sum = 0;
        self.count = 0;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.sum == 0
    }

    #[must_use]
    pub fn sum(&self) -> u8 {
        self.sum
    }

    /// Number of bytes added since the last reset.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// The checksum byte that would bring the current sum to 0.
    #[must_use]
    pub fn complement(&self) -> u8 {
        0u8.wrapping_sub(self.sum)
    }
}
