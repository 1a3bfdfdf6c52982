use crate::error::BitmapError;
use rand::Rng;

/// Fixed-size bit array, one bit per batch. Bit `i` lives at byte `i >> 3`,
/// position `i % 8` (LSB first). Bits past `size` in the last byte are set
/// at construction and stay set, so the empty-bit search never lands on
/// padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    bytes: Vec<u8>,
    size: usize,
}

impl Bitmap {
    pub fn new(size: usize) -> Self {
        let mut bytes = vec![0u8; size.div_ceil(8)];
        if size % 8 != 0 {
            // Tail guard: unused high bits of the last byte read as taken.
            let last = bytes.len() - 1;
            bytes[last] = !((1u8 << (size % 8)) - 1);
        }
        Self { bytes, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn check_index(&self, index: usize) -> Result<(), BitmapError> {
        if index >= self.size {
            return Err(BitmapError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        Ok(())
    }

    pub fn set(&mut self, index: usize) -> Result<(), BitmapError> {
        self.check_index(index)?;
        self.bytes[index >> 3] |= 1 << (index % 8);
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<(), BitmapError> {
        self.check_index(index)?;
        self.bytes[index >> 3] &= !(1 << (index % 8));
        Ok(())
    }

    pub fn is_set(&self, index: usize) -> Result<bool, BitmapError> {
        self.check_index(index)?;
        Ok(self.bytes[index >> 3] & (1 << (index % 8)) != 0)
    }

    /// A uniformly random zero bit, or `None` when every bit is taken.
    /// Starts at a random byte and scans forward with wraparound; within the
    /// first non-full byte the zero position is picked at random too. Racing
    /// workers that share the same view land on different batches most of
    /// the time.
    pub fn find_random_empty(&self) -> Option<usize> {
        if self.bytes.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let start = rng.gen_range(0..self.bytes.len());
        for offset in 0..self.bytes.len() {
            let byte_idx = (start + offset) % self.bytes.len();
            let byte = self.bytes[byte_idx];
            if byte == 0xff {
                continue;
            }
            let zero_bits: Vec<usize> = (0..8).filter(|bit| byte & (1u8 << bit) == 0).collect();
            let pick = zero_bits[rng.gen_range(0..zero_bits.len())];
            return Some((byte_idx << 3) + pick);
        }
        None
    }

    /// Bitwise OR of `other` into `self`. Sizes must agree.
    pub fn merge(&mut self, other: &Bitmap) -> Result<(), BitmapError> {
        if self.size != other.size {
            return Err(BitmapError::SizeMismatch {
                left: self.size,
                right: other.size,
            });
        }
        for (dst, src) in self.bytes.iter_mut().zip(&other.bytes) {
            *dst |= src;
        }
        Ok(())
    }

    /// Set bits within `[0, size)`; padding does not count.
    pub fn count_set(&self) -> usize {
        let ones: usize = self.bytes.iter().map(|b| b.count_ones() as usize).sum();
        let padding = match self.size % 8 {
            0 => 0,
            used => 8 - used,
        };
        ones - padding
    }

    /// Byte-exact snapshot encoding: payload bytes, then the logical bit
    /// count as u64 little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + 8);
        out.extend_from_slice(&self.bytes);
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BitmapError> {
        if bytes.len() < 8 {
            return Err(BitmapError::Truncated(bytes.len()));
        }
        let (payload, tail) = bytes.split_at(bytes.len() - 8);
        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(tail);
        let size = u64::from_le_bytes(size_bytes) as usize;
        if payload.len() != size.div_ceil(8) {
            return Err(BitmapError::LengthMismatch {
                payload: payload.len(),
                size,
            });
        }
        let mut bitmap = Self {
            bytes: payload.to_vec(),
            size,
        };
        // Re-arm the tail guard; a snapshot written by anyone honest already
        // has it, but the invariant must hold regardless of input.
        if size % 8 != 0 {
            let last = bitmap.bytes.len() - 1;
            bitmap.bytes[last] |= !((1u8 << (size % 8)) - 1);
        }
        Ok(bitmap)
    }
}
