//! Forward-only bit packer producing base64 symbols
//!
//! Bits are written least-significant first. Every 6 bits form one symbol of
//! the standard base64 alphabet, with the first bit written landing in the
//! symbol's lowest bit. There is no padding.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Bits per output symbol
pub const SYMBOL_BITS: u32 = 6;

#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    out: String,
    /// Total bits written so far
    head: u64,
    /// Partially filled symbol
    pending: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value`, LSB first
    ///
    /// Bits past the 64th are zero, so wide zero-filled fields are exact.
    pub fn put(&mut self, width: u32, value: u64) {
        for i in 0..width {
            let bit = if i < u64::BITS { (value >> i) & 1 } else { 0 };
            let slot = (self.head % u64::from(SYMBOL_BITS)) as u8;
            self.pending |= (bit as u8) << slot;
            self.head += 1;

            if u32::from(slot) == SYMBOL_BITS - 1 {
                self.out.push(ALPHABET[self.pending as usize] as char);
                self.pending = 0;
            }
        }
    }

    /// Append a single bit
    pub fn put_flag(&mut self, set: bool) {
        self.put(1, u64::from(set));
    }

    pub fn bits_written(&self) -> u64 {
        self.head
    }

    /// Flush a partial trailing symbol and return the string
    pub fn finish(mut self) -> String {
        if self.head % u64::from(SYMBOL_BITS) != 0 {
            self.out.push(ALPHABET[self.pending as usize] as char);
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_zero_bit() {
        let mut w = BitWriter::new();
        w.put(1, 0);
        assert_eq!(w.finish(), "A");
    }

    #[test]
    fn test_empty_writer() {
        assert_eq!(BitWriter::new().finish(), "");
    }

    #[test]
    fn test_lsb_first_within_symbol() {
        let mut w = BitWriter::new();
        // bits 0,1 then 1 → value 0b100 = 4 → 'E'
        w.put_flag(false);
        w.put_flag(false);
        w.put_flag(true);
        assert_eq!(w.finish(), "E");
    }

    #[test]
    fn test_full_symbol_emitted_without_finish_padding() {
        let mut w = BitWriter::new();
        w.put(6, 63);
        assert_eq!(w.bits_written(), 6);
        assert_eq!(w.finish(), "/");
    }

    #[test]
    fn test_field_spanning_symbols() {
        let mut w = BitWriter::new();
        w.put(8, 2);
        // low 6 bits = 2 → 'C', high 2 bits = 0 → 'A'
        assert_eq!(w.finish(), "CA");
    }

    #[test]
    fn test_only_low_bits_consulted() {
        let mut a = BitWriter::new();
        a.put(6, 0b1100_0101);
        let mut b = BitWriter::new();
        b.put(6, 0b0000_0101);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_wide_zero_field() {
        let mut w = BitWriter::new();
        w.put(128, 0);
        assert_eq!(w.bits_written(), 128);
        // 21 full symbols plus a 2-bit remainder
        assert_eq!(w.finish(), "A".repeat(22));
    }

    #[test]
    fn test_bits_above_64_are_zero() {
        let mut w = BitWriter::new();
        w.put(72, u64::MAX);
        let s = w.finish();
        // 64 ones: ten '/' symbols, then 4 ones + 2 zeros = 15 → 'P', then six zeros
        assert_eq!(s, format!("{}PA", "/".repeat(10)));
    }

    proptest! {
        #[test]
        fn prop_length_is_ceil_of_bits(widths in proptest::collection::vec(0u32..80, 0..20)) {
            let mut w = BitWriter::new();
            let mut total = 0u64;
            for width in &widths {
                w.put(*width, 0x5555_5555_5555_5555);
                total += u64::from(*width);
            }
            let expected = total.div_ceil(u64::from(SYMBOL_BITS)) as usize;
            prop_assert_eq!(w.finish().len(), expected);
        }

        #[test]
        fn prop_split_writes_match_single_write(value in 0u64..(1 << 20), split in 0u32..20) {
            let mut whole = BitWriter::new();
            whole.put(20, value);

            let mut parts = BitWriter::new();
            parts.put(split, value & ((1 << split) - 1));
            parts.put(20 - split, value >> split);

            prop_assert_eq!(whole.finish(), parts.finish());
        }
    }
}
